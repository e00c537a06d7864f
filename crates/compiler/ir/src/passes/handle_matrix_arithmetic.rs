//! # Handle Matrix Arithmetic
//!
//! SPIR-V has no matrix addition or subtraction, multiplies matrices through
//! dedicated opcodes and converts only scalars and vectors. This pass lowers
//! the matrix forms of `add`, `sub`, `mul` and `convert`:
//!
//! - `add`/`sub` become one column-wise operation per column, rebuilt with `construct`
//! - `mul` becomes the matching `spirv.*` primitive, with the scalar operand of
//!   a matrix-scalar product moved to the right
//! - `convert` becomes one column conversion per column, rebuilt with `construct`

use crate::instruction::InstructionKind;
use crate::module::Module;
use crate::ops::{BinaryOp, Shape, SpirvOp};
use crate::passes::{collect_instructions, is_matrix_binary, Transform};
use crate::{Builder, InstId, ValueId};

#[derive(Debug, Default)]
pub struct HandleMatrixArithmetic;

impl HandleMatrixArithmetic {
    pub const fn new() -> Self {
        Self
    }
}

impl Transform for HandleMatrixArithmetic {
    fn run(&mut self, module: &mut Module) -> bool {
        let worklist = collect_instructions(module, is_matrix_operation);
        if worklist.is_empty() {
            return false;
        }

        let mut b = Builder::new(module);
        for inst in worklist {
            let data = b.module().instruction(inst);
            let kind = data.kind().clone();
            let operands = data.operands().to_vec();
            b.position_before(inst);
            let replacement = match kind {
                InstructionKind::Binary(op @ (BinaryOp::Add | BinaryOp::Sub)) => {
                    columnwise_binary(&mut b, inst, op, operands[0], operands[1])
                }
                InstructionKind::Binary(BinaryOp::Mul) => {
                    matrix_product(&mut b, operands[0], operands[1])
                }
                InstructionKind::Convert => columnwise_convert(&mut b, inst, operands[0]),
                other => unreachable!("{} is not a matrix operation", other.mnemonic()),
            };
            log::trace!("lowered matrix {} in {inst:?}", kind.mnemonic());
            b.replace_and_remove(inst, replacement);
        }
        true
    }

    fn name(&self) -> &'static str {
        "HandleMatrixArithmetic"
    }
}

fn is_matrix_operation(module: &Module, inst: InstId) -> bool {
    let data = module.instruction(inst);
    match data.kind() {
        InstructionKind::Binary(_) => {
            is_matrix_binary(module, inst, &[BinaryOp::Add, BinaryOp::Sub, BinaryOp::Mul])
        }
        InstructionKind::Convert => data
            .result()
            .is_some_and(|result| module.types.is_matrix(module.type_of(result))),
        _ => false,
    }
}

/// Result type and column count of a matrix-producing instruction
fn matrix_result(b: &Builder<'_>, inst: InstId) -> (crate::TypeId, u32) {
    let module = b.module();
    let ty = module
        .instruction(inst)
        .result()
        .map(|result| module.type_of(result))
        .unwrap_or_else(|| panic!("matrix operation {inst:?} has no result"));
    let (columns, _) = module
        .types
        .matrix_shape(ty)
        .unwrap_or_else(|| panic!("{} is not a matrix type", module.types.name(ty)));
    (ty, columns)
}

fn columnwise_binary(
    b: &mut Builder<'_>,
    inst: InstId,
    op: BinaryOp,
    lhs: ValueId,
    rhs: ValueId,
) -> ValueId {
    let (ty, columns) = matrix_result(b, inst);
    let mut parts = Vec::with_capacity(columns as usize);
    for column in 0..columns {
        let index = b.u32(column);
        let l = b.access(lhs, &[index]);
        let index = b.u32(column);
        let r = b.access(rhs, &[index]);
        parts.push(b.binary(op, l, r));
    }
    b.construct(ty, &parts)
}

fn columnwise_convert(b: &mut Builder<'_>, inst: InstId, value: ValueId) -> ValueId {
    let (ty, columns) = matrix_result(b, inst);
    let column_ty = b
        .module()
        .types
        .column_type(ty)
        .unwrap_or_else(|| panic!("matrix type without a column type"));
    let mut parts = Vec::with_capacity(columns as usize);
    for column in 0..columns {
        let index = b.u32(column);
        let source = b.access(value, &[index]);
        parts.push(b.convert(column_ty, source));
    }
    b.construct(ty, &parts)
}

fn matrix_product(b: &mut Builder<'_>, lhs: ValueId, rhs: ValueId) -> ValueId {
    let types = &b.module().types;
    let shapes = (
        Shape::of(types, b.type_of(lhs)),
        Shape::of(types, b.type_of(rhs)),
    );
    match shapes {
        (Shape::Matrix(..), Shape::Scalar(_)) => b.spirv(SpirvOp::MatrixTimesScalar, lhs, rhs),
        (Shape::Scalar(_), Shape::Matrix(..)) => b.spirv(SpirvOp::MatrixTimesScalar, rhs, lhs),
        (Shape::Matrix(..), Shape::Vector(..)) => b.spirv(SpirvOp::MatrixTimesVector, lhs, rhs),
        (Shape::Vector(..), Shape::Matrix(..)) => b.spirv(SpirvOp::VectorTimesMatrix, lhs, rhs),
        (Shape::Matrix(..), Shape::Matrix(..)) => b.spirv(SpirvOp::MatrixTimesMatrix, lhs, rhs),
        (l, r) => panic!("unsupported matrix multiplication of {l:?} by {r:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{matrix_function, run_and_dump};

    #[test]
    fn test_add_is_split_per_column() {
        let (mut module, _) = matrix_function(BinaryOp::Add, 2, 3);
        let dump = run_and_dump(&mut HandleMatrixArithmetic::new(), &mut module);
        assert!(dump.contains("%4:vec3<f32> = access %arg1, 0u"));
        assert!(dump.contains("%10:mat2x3<f32> = construct %6, %9"));
        assert!(!dump.contains("mat2x3<f32> = add"));
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let (mut module, _) = matrix_function(BinaryOp::Sub, 4, 2);
        assert!(HandleMatrixArithmetic::new().run(&mut module));
        assert!(!HandleMatrixArithmetic::new().run(&mut module));
    }

    #[test]
    fn test_integer_arithmetic_is_untouched() {
        let mut module = Module::new();
        let mut b = Builder::new(&mut module);
        let i32 = b.types().i32();
        let f = b.function("f", i32, None);
        let x = b.add_param(f, "x", i32);
        let body = b.function_body(f);
        b.append_to(body);
        let sum = b.binary(BinaryOp::Add, x, x);
        b.return_(f, Some(sum));
        assert!(!HandleMatrixArithmetic::new().run(&mut module));
    }
}
