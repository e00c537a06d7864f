//! # Robust Integer Division
//!
//! WGSL defines integer `/` and `%` for every operand: a zero divisor yields
//! `lhs` for division and `0` for modulo, and `MIN / -1` yields `MIN` (with a
//! `0` remainder). Backends trap or leave these undefined, so this pass
//! replaces the divisor by `1` wherever it would misbehave:
//!
//! ```text
//! %bad = eq %rhs, 0                        (or %rhs == 0 | (%lhs == MIN & %rhs == -1))
//! %safe = select %rhs, 1, %bad
//! %r = div %lhs, %safe
//! ```
//!
//! Dividing by one gives `lhs` and a zero remainder, which are exactly the
//! defined results. Vector divisions with a scalar operand have that operand
//! splatted first so the guard works component-wise.

use crate::constant::Scalar;
use crate::instruction::InstructionKind;
use crate::module::Module;
use crate::ops::{BinaryOp, BuiltinFn};
use crate::passes::{collect_instructions, Transform};
use crate::types::ScalarKind;
use crate::{Builder, InstId, ValueId};

#[derive(Debug, Default)]
pub struct RobustIntegerDivision;

impl RobustIntegerDivision {
    pub const fn new() -> Self {
        Self
    }
}

impl Transform for RobustIntegerDivision {
    fn run(&mut self, module: &mut Module) -> bool {
        let worklist = collect_instructions(module, |module, inst| {
            is_integer_division(module, inst) && !is_guarded(module, inst)
        });
        if worklist.is_empty() {
            return false;
        }

        let mut b = Builder::new(module);
        for inst in worklist {
            guard(&mut b, inst);
        }
        true
    }

    fn name(&self) -> &'static str {
        "RobustIntegerDivision"
    }
}

/// `div` or `mod` producing an integer scalar or vector
pub(crate) fn is_integer_division(module: &Module, inst: InstId) -> bool {
    let data = module.instruction(inst);
    match data.kind() {
        InstructionKind::Binary(op) if op.is_division() => data
            .result()
            .is_some_and(|r| module.types.is_integer_scalar_or_vector(module.type_of(r))),
        _ => false,
    }
}

/// A division needs no guard when its divisor is a constant that can neither
/// be zero nor overflow, or is the `select` a previous run built for it
fn is_guarded(module: &Module, inst: InstId) -> bool {
    let operands = module.instruction(inst).operands();
    let (lhs, rhs) = (operands[0], operands[1]);
    if let Some(id) = module.value(rhs).constant() {
        return module.constants.all_scalars(id, &mut |scalar| {
            matches!(scalar, Some(Scalar::U32(v)) if v != 0)
                || matches!(scalar, Some(Scalar::I32(v)) if v != 0 && v != -1)
        });
    }
    let Some(select) = module.producer(rhs) else {
        return false;
    };
    if !matches!(select.kind(), InstructionKind::BuiltinCall(BuiltinFn::Select)) {
        return false;
    }
    let &[divisor, one, bad] = select.operands() else {
        return false;
    };
    if !is_integer(module, one, 1) {
        return false;
    }
    match module.types.scalar_of(module.type_of(divisor)) {
        Some(ScalarKind::I32) => is_overflow_check(module, bad, lhs, divisor),
        Some(ScalarKind::U32) => is_comparison(module, bad, divisor, 0),
        _ => false,
    }
}

/// `or(eq(rhs, 0), and(eq(lhs, MIN), eq(rhs, -1)))`
fn is_overflow_check(module: &Module, cond: ValueId, lhs: ValueId, rhs: ValueId) -> bool {
    let Some([is_zero, overflow]) = binary_operands(module, cond, BinaryOp::Or) else {
        return false;
    };
    let Some([lhs_is_min, rhs_is_minus_one]) = binary_operands(module, overflow, BinaryOp::And)
    else {
        return false;
    };
    is_comparison(module, is_zero, rhs, 0)
        && is_comparison(module, lhs_is_min, lhs, i64::from(i32::MIN))
        && is_comparison(module, rhs_is_minus_one, rhs, -1)
}

/// `eq(value, expected)`
fn is_comparison(module: &Module, cond: ValueId, value: ValueId, expected: i64) -> bool {
    binary_operands(module, cond, BinaryOp::Eq)
        .is_some_and(|[a, b]| a == value && is_integer(module, b, expected))
}

fn binary_operands(module: &Module, value: ValueId, op: BinaryOp) -> Option<[ValueId; 2]> {
    let producer = module.producer(value)?;
    match (producer.kind(), producer.operands()) {
        (InstructionKind::Binary(kind), &[a, b]) if *kind == op => Some([a, b]),
        _ => None,
    }
}

/// An integer constant whose every component is `expected`
fn is_integer(module: &Module, value: ValueId, expected: i64) -> bool {
    module.value(value).constant().is_some_and(|id| {
        module.constants.all_scalars(id, &mut |scalar| match scalar {
            Some(Scalar::I32(v)) => i64::from(v) == expected,
            Some(Scalar::U32(v)) => i64::from(v) == expected,
            None => expected == 0,
            Some(_) => false,
        })
    })
}

fn guard(b: &mut Builder<'_>, inst: InstId) {
    let data = b.module().instruction(inst);
    let (mut lhs, mut rhs) = (data.operands()[0], data.operands()[1]);
    let Some(result) = data.result() else {
        return;
    };
    let ty = b.type_of(result);
    let Some(kind) = b.module().types.scalar_of(ty) else {
        return;
    };

    b.position_before(inst);
    if b.module().types.is_vector(ty) {
        if !b.module().types.is_vector(b.type_of(lhs)) {
            lhs = b.construct(ty, &[lhs]);
            b.set_operand(inst, 0, lhs);
        }
        if !b.module().types.is_vector(b.type_of(rhs)) {
            rhs = b.construct(ty, &[rhs]);
            b.set_operand(inst, 1, rhs);
        }
    }

    let zero = b.splat(ty, Scalar::zero(kind));
    let is_zero = b.binary(BinaryOp::Eq, rhs, zero);
    let (bad, one) = match kind {
        ScalarKind::I32 => {
            let min = b.splat(ty, Scalar::I32(i32::MIN));
            let lhs_is_min = b.binary(BinaryOp::Eq, lhs, min);
            let minus_one = b.splat(ty, Scalar::I32(-1));
            let rhs_is_minus_one = b.binary(BinaryOp::Eq, rhs, minus_one);
            let overflow = b.binary(BinaryOp::And, lhs_is_min, rhs_is_minus_one);
            (b.binary(BinaryOp::Or, is_zero, overflow), Scalar::I32(1))
        }
        _ => (is_zero, Scalar::U32(1)),
    };
    let one = b.splat(ty, one);
    let safe = b.builtin(BuiltinFn::Select, &[rhs, one, bad]);
    b.set_operand(inst, 1, safe);
    log::trace!("guarded divisor of {inst:?}");
}
