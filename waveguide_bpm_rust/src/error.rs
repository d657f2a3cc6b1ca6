use std::fmt::Display;
use thiserror::Error;

/// Errors raised by the mode solver, the propagation engine and the samplers.
#[derive(Debug, Error)]
pub enum BpmError {
    #[error("invalid parameter `{name}` = {value}: {constraint}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        constraint: &'static str,
    },

    #[error("no guided slab modes found for beta in ({beta_min:.6}, {beta_max:.6})")]
    NoGuidedMode { beta_min: f64, beta_max: f64 },

    #[error("dimension mismatch in {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
}

impl BpmError {
    pub fn invalid(name: &'static str, value: impl Display, constraint: &'static str) -> Self {
        BpmError::InvalidParameter {
            name,
            value: value.to_string(),
            constraint,
        }
    }

    pub fn mismatch(what: &'static str, expected: usize, found: usize) -> Self {
        BpmError::DimensionMismatch {
            what,
            expected,
            found,
        }
    }
}

pub type Result<T> = std::result::Result<T, BpmError>;

/// Fails with [`BpmError::DimensionMismatch`] unless `found == expected`.
pub(crate) fn ensure_len(what: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(BpmError::mismatch(what, expected, found));
    }
    Ok(())
}
