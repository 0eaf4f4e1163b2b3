use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pi_chudnovsky::{Calculator, Diagnostics, Outcome, Reference, DEFAULT_DIGITS};
use tracing::error;
use tracing_chrome::ChromeLayerBuilder;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compute digits of π with Chudnovsky's series and binary splitting.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Number of decimal digits, `_` separators allowed
    #[arg(default_value_t = DEFAULT_DIGITS, value_parser = parse_digits)]
    digits: u64,

    /// Diagnostics bitmask: 1 = show values, 2 = trace splitting
    #[arg(short = 'o', long, default_value_t = 1)]
    flags: u32,

    /// Decimal file to check the result against instead of MPFR's π
    #[arg(long)]
    reference: Option<PathBuf>,

    /// Write a Chrome trace of the computation phases to this file
    #[arg(long)]
    chrome_trace: Option<PathBuf>,

    /// Don't draw the progress bar
    #[arg(long)]
    no_progress: bool,
}

fn parse_digits(arg: &str) -> Result<u64, String> {
    match arg.replace('_', "").parse() {
        Ok(0) => Err("digits should be positive".into()),
        Ok(d) => Ok(d),
        Err(e) => Err(format!("digits should be a valid number: {e}")),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let (chrome, _guard) = match &args.chrome_trace {
        Some(path) => {
            let (layer, guard) = ChromeLayerBuilder::new().file(path).build();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(chrome)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let reference = match &args.reference {
        Some(path) => match Reference::from_file(path) {
            Ok(r) => r,
            Err(e) => {
                error!("{e}");
                return ExitCode::FAILURE;
            }
        },
        None => Reference::mpfr(args.digits),
    };

    let calc = Calculator::new(reference);
    let handle = calc.start(args.digits, Diagnostics::from_bits(args.flags));

    let pb = if args.no_progress {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(100)
    };
    pb.set_style(
        ProgressStyle::with_template("{spinner} [{elapsed_precise}] [{bar:40}] {pos:>3}%")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let outcome = handle.wait(|pct| pb.set_position(u64::from(pct)));
    pb.finish_and_clear();

    match outcome {
        Outcome::Success(pi) => {
            println!("{}", pi.to_decimal());
            println!("Error < 1E{}", pi.error_exponent);
            ExitCode::SUCCESS
        }
        Outcome::Cancelled => {
            error!("cancelled");
            ExitCode::FAILURE
        }
        Outcome::Failed(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
