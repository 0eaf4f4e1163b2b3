use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// A big-number operation could not be carried out.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArithmeticFault {
    #[error("precision of {bits} bits is outside the supported range")]
    InvalidPrecision { bits: u64 },

    #[error("division by zero")]
    DivisionByZero,

    #[error("sieve bound {0} does not fit in 32 bits")]
    SieveOverflow(u64),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("digit count must be positive")]
    InvalidDigits,

    #[error("arithmetic fault: {0}")]
    Arithmetic(#[from] ArithmeticFault),

    #[error("reference value unavailable: {0}")]
    ReferenceUnavailable(String),

    /// Not a fault: the run observed its cancellation flag.
    #[error("computation cancelled")]
    Cancelled,

    #[error("worker panicked or stopped without reporting an outcome")]
    WorkerLost,
}
