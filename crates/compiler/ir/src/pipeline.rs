//! Transform pipeline with per-target presets and pluggable backends

use crate::backend::{Backend, BackendResult};
use crate::error::TransformError;
use crate::module::Module;
use crate::passes::single_entry_point::find_entry_point;
use crate::passes::{
    module_has_dynamic_access, module_has_integer_division, module_uses_matrices, BuiltinStyle,
    CanonicalizeEntryPointIo, EntryPointIoConfig, HandleMatrixArithmetic, PassManager,
    RobustAccess, RobustIntegerDivision, SingleEntryPoint,
};

/// Backend a module is prepared for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Target {
    #[default]
    Spirv,
    Hlsl,
    Msl,
    Glsl,
}

impl Target {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Spirv => "spirv",
            Self::Hlsl => "hlsl",
            Self::Msl => "msl",
            Self::Glsl => "glsl",
        }
    }

    /// How entry point builtins are declared, `None` for targets that keep
    /// the attributes on the entry point itself
    pub const fn builtin_style(self) -> Option<BuiltinStyle> {
        match self {
            Self::Spirv => None,
            Self::Hlsl | Self::Glsl => Some(BuiltinStyle::StructMember),
            Self::Msl => Some(BuiltinStyle::Parameter),
        }
    }
}

/// Which WGSL robustness guarantees the pipeline enforces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RobustnessConfig {
    /// Clamp dynamic access indices
    pub clamp_accesses: bool,
    /// Guard integer division and modulo
    pub guard_integer_division: bool,
}

impl Default for RobustnessConfig {
    fn default() -> Self {
        Self {
            clamp_accesses: true,
            guard_integer_division: true,
        }
    }
}

/// Configuration for the transform pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub target: Target,
    pub robustness: RobustnessConfig,
    /// Strip the module down to this entry point first
    pub entry_point: Option<String>,
    /// Validate the module before and after every pass
    pub validate: bool,
    /// Combined into the sample mask of fragment shaders on targets that
    /// canonicalize entry point IO
    pub fixed_sample_mask: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target: Target::default(),
            robustness: RobustnessConfig::default(),
            entry_point: None,
            validate: true,
            fixed_sample_mask: u32::MAX,
        }
    }
}

impl PipelineConfig {
    pub fn for_target(target: Target) -> Self {
        Self {
            target,
            ..Self::default()
        }
    }
}

/// The passes selected by a [`PipelineConfig`], run in a fixed order:
/// entry point selection, robustness, then the target's raise passes and
/// entry point IO canonicalization
pub struct Pipeline {
    config: PipelineConfig,
    passes: PassManager,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let mut passes = PassManager::new().with_validation(config.validate);
        if let Some(name) = &config.entry_point {
            passes = passes.add_pass(SingleEntryPoint::new(name.clone()));
        }
        if config.robustness.clamp_accesses {
            passes = passes.add_conditional_pass(RobustAccess::new(), module_has_dynamic_access);
        }
        if config.robustness.guard_integer_division {
            passes = passes
                .add_conditional_pass(RobustIntegerDivision::new(), module_has_integer_division);
        }
        if config.target == Target::Spirv {
            passes =
                passes.add_conditional_pass(HandleMatrixArithmetic::new(), module_uses_matrices);
        }
        if let Some(builtin_style) = config.target.builtin_style() {
            passes = passes.add_pass(CanonicalizeEntryPointIo::new(EntryPointIoConfig {
                builtin_style,
                fixed_sample_mask: config.fixed_sample_mask,
            }));
        }
        Self { config, passes }
    }

    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.pass_names()
    }

    /// Run every selected pass on `module`.
    /// Returns true if any pass modified it
    pub fn run(&mut self, module: &mut Module) -> Result<bool, TransformError> {
        if let Some(name) = &self.config.entry_point {
            if find_entry_point(module, name).is_none() {
                return Err(TransformError::MissingEntryPoint(name.clone()));
            }
        }
        let modified = self.passes.run(module)?;
        log::debug!(
            "{} pipeline finished, module {}",
            self.config.target.name(),
            if modified { "modified" } else { "unchanged" }
        );
        Ok(modified)
    }
}

/// A transform pipeline feeding a backend
pub struct CompilationPipeline<B: Backend> {
    backend: B,
    config: PipelineConfig,
}

impl<B: Backend> CompilationPipeline<B> {
    /// Create a pipeline with the default configuration for the backend's target
    pub fn new(backend: B) -> Self {
        let config = PipelineConfig::for_target(backend.info().target);
        Self { backend, config }
    }

    /// Replace the configuration; the target always follows the backend
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = PipelineConfig {
            target: self.backend.info().target,
            ..config
        };
        self
    }

    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Transform `module` for the backend, then hand it over for emission
    pub fn compile(&mut self, mut module: Module) -> BackendResult<B::Output> {
        self.backend.validate_module(&module)?;
        Pipeline::new(self.config.clone()).run(&mut module)?;
        self.backend.generate_code(&module)
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
