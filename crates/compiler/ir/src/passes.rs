//! # IR Transforms
//!
//! Transforms rewrite a module in place through the [`crate::Builder`]. Each
//! one scans the module in program order for the shapes it handles, rewrites
//! them, and reports whether anything changed. Running a transform a second
//! time finds nothing left to rewrite.

pub mod canonicalize_entry_point_io;
pub mod handle_matrix_arithmetic;
pub mod robust_access;
pub mod robust_integer_division;
pub mod single_entry_point;

pub use canonicalize_entry_point_io::{BuiltinStyle, CanonicalizeEntryPointIo, EntryPointIoConfig};
pub use handle_matrix_arithmetic::HandleMatrixArithmetic;
pub use robust_access::RobustAccess;
pub use robust_integer_division::RobustIntegerDivision;
pub use single_entry_point::SingleEntryPoint;

use crate::error::TransformError;
use crate::instruction::InstructionKind;
use crate::module::Module;
use crate::ops::BinaryOp;
use crate::validator::validate;
use crate::InstId;

/// A transform over a whole module
pub trait Transform {
    /// Apply this transform to `module`.
    /// Returns true if the module was modified
    fn run(&mut self, module: &mut Module) -> bool;

    /// Name used in logs and errors
    fn name(&self) -> &'static str;
}

/// Instructions of `module` in program order for which `matches` holds
pub(crate) fn collect_instructions(
    module: &Module,
    matches: impl Fn(&Module, InstId) -> bool,
) -> Vec<InstId> {
    module
        .instructions_in_program_order()
        .into_iter()
        .filter(|inst| matches(module, *inst))
        .collect()
}

/// Whether any instruction reads or produces a matrix
pub fn module_uses_matrices(module: &Module) -> bool {
    module.instructions_in_program_order().into_iter().any(|inst| {
        let data = module.instruction(inst);
        data.operands()
            .iter()
            .chain(data.results())
            .any(|v| module.types.is_matrix(module.type_of(*v)))
    })
}

/// Whether the module divides integers
pub fn module_has_integer_division(module: &Module) -> bool {
    module
        .instructions_in_program_order()
        .into_iter()
        .any(|inst| robust_integer_division::is_integer_division(module, inst))
}

/// Whether any access uses a non-constant index
pub fn module_has_dynamic_access(module: &Module) -> bool {
    module.instructions_in_program_order().into_iter().any(|inst| {
        let data = module.instruction(inst);
        matches!(data.kind(), InstructionKind::Access)
            && data.operands()[1..]
                .iter()
                .any(|index| module.constant(*index).is_none())
    })
}

/// A transform that only runs when a module-level condition holds
pub struct ConditionalPass {
    pass: Box<dyn Transform>,
    condition: fn(&Module) -> bool,
}

impl ConditionalPass {
    pub fn new(pass: Box<dyn Transform>, condition: fn(&Module) -> bool) -> Self {
        Self { pass, condition }
    }
}

impl Transform for ConditionalPass {
    fn run(&mut self, module: &mut Module) -> bool {
        if (self.condition)(module) {
            self.pass.run(module)
        } else {
            false
        }
    }

    fn name(&self) -> &'static str {
        self.pass.name()
    }
}

/// Runs transforms in order, optionally validating around each one
pub struct PassManager {
    passes: Vec<Box<dyn Transform>>,
    validate: bool,
}

impl PassManager {
    /// Create an empty pass manager that validates around every pass
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            validate: true,
        }
    }

    pub fn add_pass<P: Transform + 'static>(mut self, pass: P) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    /// Add a pass that only runs when `condition` holds for the module
    pub fn add_conditional_pass<P: Transform + 'static>(
        mut self,
        pass: P,
        condition: fn(&Module) -> bool,
    ) -> Self {
        self.passes
            .push(Box::new(ConditionalPass::new(Box::new(pass), condition)));
        self
    }

    pub const fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    /// Run all passes on the module.
    /// Returns true if any pass modified it
    pub fn run(&mut self, module: &mut Module) -> Result<bool, TransformError> {
        let mut modified = false;

        for pass in &mut self.passes {
            if self.validate {
                validate(module).map_err(|source| TransformError::InvalidInput {
                    pass: pass.name(),
                    source,
                })?;
            }

            if pass.run(module) {
                modified = true;
                log::debug!("Pass '{}' modified the module", pass.name());
            }

            if self.validate {
                validate(module).map_err(|source| TransformError::InvalidOutput {
                    pass: pass.name(),
                    source,
                })?;
            }
        }

        Ok(modified)
    }
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a binary operator is applied to a matrix operand
pub(crate) fn is_matrix_binary(module: &Module, inst: InstId, ops: &[BinaryOp]) -> bool {
    let data = module.instruction(inst);
    match data.kind() {
        InstructionKind::Binary(op) if ops.contains(op) => data
            .operands()
            .iter()
            .any(|v| module.types.is_matrix(module.type_of(*v))),
        _ => false,
    }
}

#[cfg(test)]
#[path = "passes_tests.rs"]
mod tests;
