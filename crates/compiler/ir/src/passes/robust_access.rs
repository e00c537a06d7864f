//! # Robust Access
//!
//! Clamps every dynamic index of an `access` into the bounds of the type it
//! indexes, so out-of-bounds reads and writes land on the last element:
//!
//! - fixed-size vectors, matrices and arrays: `min(u32(index), N - 1u)`
//! - runtime-sized arrays: `min(u32(index), arrayLength(ptr) - 1u)`, where `ptr`
//!   is the partial access up to the runtime array
//!
//! Constant indices are range-checked when the access is built and are left
//! alone. `i32` indices are converted to `u32` first, which sends negative
//! indices to large values that the clamp then pulls back in range.

use crate::constant::Scalar;
use crate::instruction::InstructionKind;
use crate::module::Module;
use crate::ops::{BinaryOp, BuiltinFn};
use crate::passes::{collect_instructions, Transform};
use crate::types::ScalarKind;
use crate::{Builder, InstId, TypeId, ValueId};

#[derive(Debug, Default)]
pub struct RobustAccess;

impl RobustAccess {
    pub const fn new() -> Self {
        Self
    }
}

/// Bound a dynamic index is clamped against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Limit {
    /// Highest valid index of a fixed-size type
    Fixed(u32),
    /// Runtime-sized array reached after the first `depth` indices
    Runtime { depth: usize },
}

impl Transform for RobustAccess {
    fn run(&mut self, module: &mut Module) -> bool {
        let worklist = collect_instructions(module, |module, inst| {
            matches!(module.instruction(inst).kind(), InstructionKind::Access)
        });

        let mut modified = false;
        let mut b = Builder::new(module);
        for inst in worklist {
            for (position, limit) in unclamped_indices(b.module(), inst) {
                clamp(&mut b, inst, position, limit);
                modified = true;
            }
        }
        modified
    }

    fn name(&self) -> &'static str {
        "RobustAccess"
    }
}

/// Operand positions of the dynamic indices of `inst` that still need a
/// clamp, with the bound for each
fn unclamped_indices(module: &Module, inst: InstId) -> Vec<(usize, Limit)> {
    let operands = module.instruction(inst).operands();
    let object_ty = module.type_of(operands[0]);
    let mut current = module.types.store_type(object_ty).unwrap_or(object_ty);
    let mut out = Vec::new();

    for (depth, &index) in operands[1..].iter().enumerate() {
        let constant = crate::ops::constant_index(module.scalar_constant(index));
        if constant.is_none() {
            let limit = match module.types.element_count(current) {
                Some(count) => Some(Limit::Fixed(count.saturating_sub(1))),
                None if module.types.is_runtime_array(current) => Some(Limit::Runtime { depth }),
                None => None,
            };
            if let Some(limit) = limit.filter(|limit| !is_clamped(module, operands, index, *limit))
            {
                out.push((depth + 1, limit));
            }
        }
        match module.types.indexed(current, constant) {
            Some(next) => current = next,
            None => break,
        }
    }
    out
}

/// Whether `index` is already the output of a clamp against `limit`, for the
/// access whose operands are `operands`
fn is_clamped(module: &Module, operands: &[ValueId], index: ValueId, limit: Limit) -> bool {
    let Some(producer) = module.producer(index) else {
        return false;
    };
    if !matches!(producer.kind(), InstructionKind::BuiltinCall(BuiltinFn::Min)) {
        return false;
    }
    let bound = producer.operands()[1];
    match limit {
        Limit::Fixed(max) => {
            matches!(module.scalar_constant(bound), Some(Scalar::U32(v)) if v <= max)
        }
        Limit::Runtime { depth } => runtime_bound_array(module, bound)
            .is_some_and(|array| is_prefix(module, array, &operands[..=depth])),
    }
}

/// The `array` of a `sub(arrayLength(array), 1u)` bound
fn runtime_bound_array(module: &Module, bound: ValueId) -> Option<ValueId> {
    let sub = module.producer(bound)?;
    let &[length, one] = sub.operands() else {
        return None;
    };
    if !matches!(sub.kind(), InstructionKind::Binary(BinaryOp::Sub))
        || module.scalar_constant(one) != Some(Scalar::U32(1))
    {
        return None;
    }
    let call = module.producer(length)?;
    match (call.kind(), call.operands()) {
        (InstructionKind::BuiltinCall(BuiltinFn::ArrayLength), &[array]) => Some(array),
        _ => None,
    }
}

/// Whether `pointer` is the object of an access, or a partial access with the
/// same object and leading indices
fn is_prefix(module: &Module, pointer: ValueId, prefix: &[ValueId]) -> bool {
    if prefix.len() == 1 {
        return pointer == prefix[0];
    }
    module.producer(pointer).is_some_and(|access| {
        matches!(access.kind(), InstructionKind::Access)
            && access.operands().len() == prefix.len()
            && access
                .operands()
                .iter()
                .zip(prefix)
                .all(|(&a, &b)| same_value(module, a, b))
    })
}

fn same_value(module: &Module, a: ValueId, b: ValueId) -> bool {
    a == b
        || matches!(
            (module.value(a).constant(), module.value(b).constant()),
            (Some(x), Some(y)) if x == y
        )
}

fn clamp(b: &mut Builder<'_>, inst: InstId, position: usize, limit: Limit) {
    let index = b.module().instruction(inst).operands()[position];
    let u32_ty: TypeId = b.types().u32();
    b.position_before(inst);

    let index = match b.module().types.as_scalar(b.type_of(index)) {
        Some(ScalarKind::U32) => index,
        _ => b.convert(u32_ty, index),
    };
    let bound = match limit {
        Limit::Fixed(max) => b.u32(max),
        Limit::Runtime { depth } => {
            let operands = b.module().instruction(inst).operands().to_vec();
            let object = operands[0];
            let array = if depth == 0 {
                object
            } else {
                b.access(object, &operands[1..=depth])
            };
            let length = b.builtin(BuiltinFn::ArrayLength, &[array]);
            let one = b.u32(1);
            b.binary(BinaryOp::Sub, length, one)
        }
    };
    let clamped = b.builtin(BuiltinFn::Min, &[index, bound]);
    b.set_operand(inst, position, clamped);
    log::trace!("clamped index {position} of {inst:?}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Access, AddressSpace};
    use crate::{disassemble, validate};

    #[test]
    fn test_array_index_is_clamped() {
        let mut module = Module::new();
        let mut b = Builder::new(&mut module);
        let u32 = b.types().u32();
        let array = b.types().array(u32, 4);
        let f = b.function("f", u32, None);
        let values = b.add_param(f, "values", array);
        let i = b.add_param(f, "i", u32);
        let body = b.function_body(f);
        b.append_to(body);
        let element = b.access(values, &[i]);
        b.return_(f, Some(element));

        assert!(RobustAccess::new().run(&mut module));
        validate(&module).unwrap();
        let dump = disassemble(&module);
        assert!(dump.contains("%4:u32 = min %i, 3u"), "{dump}");
        assert!(dump.contains("%5:u32 = access %values, %4"), "{dump}");
        assert!(!RobustAccess::new().run(&mut module));
    }

    #[test]
    fn test_signed_index_is_converted() {
        let mut module = Module::new();
        let mut b = Builder::new(&mut module);
        let f32 = b.types().f32();
        let i32 = b.types().i32();
        let v4 = b.types().vec4(f32);
        let f = b.function("f", f32, None);
        let v = b.add_param(f, "v", v4);
        let i = b.add_param(f, "i", i32);
        let body = b.function_body(f);
        b.append_to(body);
        let element = b.access(v, &[i]);
        b.return_(f, Some(element));

        assert!(RobustAccess::new().run(&mut module));
        let dump = disassemble(&module);
        assert!(dump.contains("%4:u32 = convert %i"), "{dump}");
        assert!(dump.contains("%5:u32 = min %4, 3u"), "{dump}");
    }

    #[test]
    fn test_runtime_array_uses_array_length() {
        let mut module = Module::new();
        let mut b = Builder::new(&mut module);
        let u32 = b.types().u32();
        let runtime = b.types().runtime_array(u32);
        let ptr = b.types().ptr(AddressSpace::Storage, runtime, Access::ReadWrite);
        let root = b.module().root_block();
        b.append_to(root);
        let buffer = b.var("buffer", ptr, None);
        b.set_binding_point(buffer, 0, 0);
        let f = b.function("f", u32, None);
        let i = b.add_param(f, "i", u32);
        let body = b.function_body(f);
        b.append_to(body);
        let element_ptr = b.access(buffer, &[i]);
        let value = b.load(element_ptr);
        b.return_(f, Some(value));

        assert!(RobustAccess::new().run(&mut module));
        validate(&module).unwrap();
        let dump = disassemble(&module);
        assert!(dump.contains("arrayLength %buffer"), "{dump}");
        assert!(dump.contains("sub"), "{dump}");
        assert!(!RobustAccess::new().run(&mut module));
    }

    #[test]
    fn test_user_min_against_another_bound_is_clamped() {
        let mut module = Module::new();
        let mut b = Builder::new(&mut module);
        let u32 = b.types().u32();
        let runtime = b.types().runtime_array(u32);
        let ptr = b.types().ptr(AddressSpace::Storage, runtime, Access::ReadWrite);
        let root = b.module().root_block();
        b.append_to(root);
        let buffer = b.var("buffer", ptr, None);
        b.set_binding_point(buffer, 0, 0);
        let f = b.function("f", u32, None);
        let i = b.add_param(f, "i", u32);
        let a = b.add_param(f, "a", u32);
        let body = b.function_body(f);
        b.append_to(body);
        let one = b.u32(1);
        let limit = b.binary(BinaryOp::Sub, a, one);
        let index = b.builtin(BuiltinFn::Min, &[i, limit]);
        let element_ptr = b.access(buffer, &[index]);
        let value = b.load(element_ptr);
        b.return_(f, Some(value));

        assert!(RobustAccess::new().run(&mut module));
        validate(&module).unwrap();
        let dump = disassemble(&module);
        assert!(dump.contains("arrayLength %buffer"), "{dump}");
        assert!(!RobustAccess::new().run(&mut module));
    }
}
