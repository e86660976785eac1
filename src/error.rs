//! Application error type and the mapping from library errors to exit codes.
//!
//! Exit codes:
//! - `2`: invalid input, usage or I/O problems
//! - `3`: no usable data remained
//! - `4`: a numerical step failed (no convergence, singular system, ...)

use crate::domain::DomainError;
use crate::fit::FitError;
use crate::obs2d::SpectrumError;
use crate::spectral::ConversionError;
use crate::star::StarError;

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

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        AppError::new(2, err.to_string())
    }
}

impl From<ConversionError> for AppError {
    fn from(err: ConversionError) -> Self {
        match err {
            ConversionError::NoConvergence { .. } => AppError::new(4, err.to_string()),
            _ => AppError::new(2, err.to_string()),
        }
    }
}

impl From<SpectrumError> for AppError {
    fn from(err: SpectrumError) -> Self {
        AppError::new(2, err.to_string())
    }
}

impl From<StarError> for AppError {
    fn from(err: StarError) -> Self {
        match err {
            StarError::NotLoaded(_) | StarError::ModelNotApplied(_) => AppError::new(3, err.to_string()),
            _ => AppError::new(2, err.to_string()),
        }
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        match err {
            FitError::TooFewPoints { .. } => AppError::new(3, err.to_string()),
            _ => AppError::new(4, err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_errors_map_to_exit_codes() {
        let err: AppError = DomainError::UnknownElement("Xx".to_string()).into();
        assert_eq!(err.exit_code(), 2);

        let err: AppError = ConversionError::NoConvergence {
            wavelength: 5000.0,
            iterations: 100,
        }
        .into();
        assert_eq!(err.exit_code(), 4);

        let err: AppError = StarError::NotLoaded("HD 1".to_string()).into();
        assert_eq!(err.exit_code(), 3);

        let err: AppError = FitError::TooFewPoints { got: 1, needed: 2 }.into();
        assert_eq!(err.exit_code(), 3);
        assert!(err.message().contains("1"));
    }
}
