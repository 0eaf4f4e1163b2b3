//! Runs a computation in the background and reports progress over a channel.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{self, Receiver},
    Arc,
};

use tracing::{error, info};

use crate::error::Error;
use crate::pi::{self, PiDigits};
use crate::reference::Reference;
use crate::Diagnostics;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(PiDigits),
    Cancelled,
    Failed(Error),
}

/// Everything a run reports, in order: zero or more increasing progress
/// percentages, then exactly one `Finished`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Progress(u8),
    Finished(Outcome),
}

/// Starts runs against one reference value.
#[derive(Debug, Clone)]
pub struct Calculator {
    reference: Arc<Reference>,
}

impl Calculator {
    pub fn new(reference: Reference) -> Self {
        Self {
            reference: Arc::new(reference),
        }
    }

    /// Spawns a run on the rayon pool and returns immediately.
    pub fn start(&self, digits: u64, diagnostics: Diagnostics) -> Handle {
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();
        let reference = Arc::clone(&self.reference);
        let flag = Arc::clone(&cancel);

        rayon::spawn(move || {
            let progress = tx.clone();
            let outcome = settle(digits, || {
                pi::compute(digits, diagnostics, &reference, &flag, |pct| {
                    // a dropped handle is not the worker's problem
                    let _ = progress.send(Event::Progress(pct));
                })
            });
            let _ = tx.send(Event::Finished(outcome));
        });

        Handle { cancel, events: rx }
    }
}

/// Runs `run` to its outcome; a panic inside it becomes `Failed(WorkerLost)`.
fn settle(digits: u64, run: impl FnOnce() -> Result<PiDigits, Error>) -> Outcome {
    match panic::catch_unwind(AssertUnwindSafe(run)) {
        Ok(Ok(pi)) => Outcome::Success(pi),
        Ok(Err(Error::Cancelled)) => {
            info!(digits, "run cancelled");
            Outcome::Cancelled
        }
        Ok(Err(e)) => {
            error!(digits, "run failed: {e}");
            Outcome::Failed(e)
        }
        Err(_) => {
            error!(digits, "run panicked");
            Outcome::Failed(Error::WorkerLost)
        }
    }
}

/// One outstanding run.
pub struct Handle {
    cancel: Arc<AtomicBool>,
    events: Receiver<Event>,
}

impl Handle {
    /// Asks the run to stop at its next leaf.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn events(&self) -> &Receiver<Event> {
        &self.events
    }

    /// Blocks until the terminal outcome, forwarding progress on the way.
    pub fn wait(self, mut on_progress: impl FnMut(u8)) -> Outcome {
        for event in self.events.iter() {
            match event {
                Event::Progress(pct) => on_progress(pct),
                Event::Finished(outcome) => return outcome,
            }
        }
        // the channel closed without a terminal event
        Outcome::Failed(Error::WorkerLost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_then_single_outcome() {
        let calc = Calculator::new(Reference::mpfr(2000));
        let handle = calc.start(2000, Diagnostics::NONE);

        let events: Vec<Event> = handle.events().iter().collect();
        let (last, progress) = events.split_last().unwrap();

        let Event::Finished(Outcome::Success(pi)) = last else {
            panic!("unexpected terminal event {last:?}");
        };
        assert!(pi.error_exponent < -1995);

        let pcts: Vec<u8> = progress
            .iter()
            .map(|e| match e {
                Event::Progress(p) => *p,
                other => panic!("{other:?} before the end"),
            })
            .collect();
        assert!(pcts.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(pcts.last(), Some(&100));
    }

    #[test]
    fn panicking_run_fails_instead_of_aborting() {
        let outcome = settle(100, || panic!("limb allocation failed"));
        assert_eq!(outcome, Outcome::Failed(Error::WorkerLost));
        assert_eq!(settle(100, || Err(Error::Cancelled)), Outcome::Cancelled);
    }

    #[test]
    fn invalid_request_fails() {
        let calc = Calculator::new(Reference::mpfr(10));
        let outcome = calc.start(0, Diagnostics::NONE).wait(|_| {});
        assert_eq!(outcome, Outcome::Failed(Error::InvalidDigits));
    }
}
