//! Backend trait for pluggable shader emitters
//!
//! Backends only read the module: functions, entry blocks and instruction
//! walks. Everything they need rewritten is done by the transform pipeline
//! selected for their [`Target`].

use thiserror::Error;

use crate::error::{TransformError, ValidationError};
use crate::module::Module;
use crate::pipeline::Target;
use crate::validator::validate;

/// Errors that can occur while preparing or emitting a module
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("module rejected by the backend: {0}")]
    InvalidModule(#[from] ValidationError),
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
    #[error("code generation failed: {0}")]
    CodeGeneration(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Metadata about a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendInfo {
    /// Unique name for this backend
    pub name: String,
    pub description: String,
    /// Target whose transform preset the backend expects
    pub target: Target,
}

/// Trait for pluggable code generation backends
pub trait Backend {
    /// Type of the final emitted output
    type Output;

    fn info(&self) -> &BackendInfo;

    /// Check that this backend can handle `module` before any pass runs
    fn validate_module(&self, module: &Module) -> BackendResult<()> {
        validate(module)?;
        if module.entry_points().next().is_none() {
            return Err(BackendError::UnsupportedFeature(
                "module has no entry point".to_string(),
            ));
        }
        Ok(())
    }

    /// Emit a module that went through the target's transform pipeline
    fn generate_code(&mut self, module: &Module) -> BackendResult<Self::Output>;
}
