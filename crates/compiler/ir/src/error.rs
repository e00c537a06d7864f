//! Errors reported by the validator and the transform pipeline.
//!
//! Builder misuse is a compiler bug and panics; these errors cover modules
//! that were built successfully but violate a structural rule.

use std::fmt;

use thiserror::Error;

/// One violated structural rule
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{location}: {message}")]
pub struct ValidationFailure {
    /// Where the failure was found, e.g. `function 'main', block %b2`
    pub location: String,
    pub message: String,
}

/// Every failure found while validating a module
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationError {
    pub failures: Vec<ValidationFailure>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module is invalid ({} failures)", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "\n  {failure}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("invalid module before {pass}: {source}")]
    InvalidInput {
        pass: &'static str,
        source: ValidationError,
    },
    #[error("{pass} produced an invalid module: {source}")]
    InvalidOutput {
        pass: &'static str,
        source: ValidationError,
    },
    #[error("entry point '{0}' does not exist")]
    MissingEntryPoint(String),
}
