//! Crate-wide error type.
//!
//! Every fallible operation returns `AppError`, which carries the process exit
//! code alongside a human-readable message:
//!
//! - `2`: input, schema, or configuration problems (missing columns, bad flags)
//! - `3`: data-quality problems (duplicate keys, no usable rows, bad groups)
//! - `4`: numerical problems (singular systems, non-finite results)

/// Exit code for input/schema/configuration errors.
pub const EXIT_INPUT: u8 = 2;
/// Exit code for data-quality errors.
pub const EXIT_DATA: u8 = 3;
/// Exit code for numerical failures.
pub const EXIT_NUMERIC: u8 = 4;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
