//! # Instruction Builder
//!
//! Value-producing instructions. Each helper deduces the result type from the
//! operand types, creates the instruction and places it at the cursor.
//! Helpers for single-result instructions return the result value.

use super::Builder;
use crate::instruction::{InstructionKind, VarAttributes};
use crate::ops::{self, BinaryOp, BuiltinFn, SpirvOp, UnaryOp};
use crate::{FunctionId, InstId, TypeId, ValueId};

impl Builder<'_> {
    /// Creates `kind` and places it at the cursor
    pub fn emit(
        &mut self,
        kind: InstructionKind,
        operands: &[ValueId],
        result_types: &[TypeId],
    ) -> InstId {
        let inst = self.create_instruction(kind, operands, result_types);
        self.place(inst);
        inst
    }

    fn emit_value(&mut self, kind: InstructionKind, operands: &[ValueId], ty: TypeId) -> ValueId {
        let inst = self.emit(kind, operands, &[ty]);
        self.module.instructions[inst].results[0]
    }

    fn incoherent(&self, what: &str, operands: &[ValueId]) -> ! {
        let names: Vec<_> = operands
            .iter()
            .map(|v| self.module.types.name(self.module.type_of(*v)))
            .collect();
        panic!("incoherent operand types for {what}: {}", names.join(", "))
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        let (l, r) = (self.type_of(lhs), self.type_of(rhs));
        let Some(ty) = ops::binary_result_type(&mut self.module.types, op, l, r) else {
            self.incoherent(op.name(), &[lhs, rhs]);
        };
        self.emit_value(InstructionKind::Binary(op), &[lhs, rhs], ty)
    }

    pub fn unary(&mut self, op: UnaryOp, operand: ValueId) -> ValueId {
        let ty = self.type_of(operand);
        if ops::unary_result_type(&self.module.types, op, ty).is_none() {
            self.incoherent(op.name(), &[operand]);
        }
        self.emit_value(InstructionKind::Unary(op), &[operand], ty)
    }

    /// Indexes `object` (a composite value or a pointer to one) with `indices`
    pub fn access(&mut self, object: ValueId, indices: &[ValueId]) -> ValueId {
        let constant_indices: Vec<_> = indices
            .iter()
            .map(|index| ops::constant_index(self.module.scalar_constant(*index)))
            .collect();
        let object_ty = self.type_of(object);
        let Some(ty) =
            ops::access_result_type(&mut self.module.types, object_ty, &constant_indices)
        else {
            let mut operands = vec![object];
            operands.extend_from_slice(indices);
            self.incoherent("access", &operands);
        };
        let mut operands = Vec::with_capacity(indices.len() + 1);
        operands.push(object);
        operands.extend_from_slice(indices);
        self.emit_value(InstructionKind::Access, &operands, ty)
    }

    /// Shuffles components of a vector
    pub fn swizzle(&mut self, object: ValueId, indices: &[u32]) -> ValueId {
        let object_ty = self.type_of(object);
        let Some(ty) = ops::swizzle_result_type(&mut self.module.types, object_ty, indices) else {
            self.incoherent("swizzle", &[object]);
        };
        self.emit_value(InstructionKind::Swizzle(indices.to_vec()), &[object], ty)
    }

    pub fn construct(&mut self, ty: TypeId, args: &[ValueId]) -> ValueId {
        self.emit_value(InstructionKind::Construct, args, ty)
    }

    /// Element-wise numeric conversion to `ty`
    pub fn convert(&mut self, ty: TypeId, value: ValueId) -> ValueId {
        self.emit_value(InstructionKind::Convert, &[value], ty)
    }

    pub fn bitcast(&mut self, ty: TypeId, value: ValueId) -> ValueId {
        self.emit_value(InstructionKind::Bitcast, &[value], ty)
    }

    /// Binds `value` to a name
    pub fn let_(&mut self, name: impl Into<String>, value: ValueId) -> ValueId {
        let ty = self.type_of(value);
        let result = self.emit_value(InstructionKind::Let, &[value], ty);
        self.set_name(result, name);
        result
    }

    /// Declares a variable; `ty` is the pointer type of the result
    pub fn var(
        &mut self,
        name: impl Into<String>,
        ty: TypeId,
        initializer: Option<ValueId>,
    ) -> ValueId {
        let operands: Vec<_> = initializer.into_iter().collect();
        let result = self.emit_value(
            InstructionKind::Var(VarAttributes::default()),
            &operands,
            ty,
        );
        self.set_name(result, name);
        result
    }

    /// Sets the `@group`/`@binding` of a variable declared by [`Builder::var`]
    pub fn set_binding_point(&mut self, var: ValueId, group: u32, binding: u32) {
        let inst = self.module.values[var]
            .producer()
            .unwrap_or_else(|| panic!("{var:?} is not the result of a var"));
        match &mut self.module.instructions[inst].kind {
            InstructionKind::Var(attributes) => attributes.binding_point = Some((group, binding)),
            other => panic!("{var:?} is produced by {}, not var", other.mnemonic()),
        }
    }

    pub fn load(&mut self, pointer: ValueId) -> ValueId {
        let ptr_ty = self.type_of(pointer);
        let Some(ty) = self.module.types.store_type(ptr_ty) else {
            self.incoherent("load", &[pointer]);
        };
        self.emit_value(InstructionKind::Load, &[pointer], ty)
    }

    pub fn store(&mut self, pointer: ValueId, value: ValueId) -> InstId {
        self.emit(InstructionKind::Store, &[pointer, value], &[])
    }

    /// Calls a user function; the result, if any, is the instruction's only result
    pub fn call(&mut self, function: FunctionId, args: &[ValueId]) -> InstId {
        let return_type = self.module.function(function).return_type();
        let results = if self.module.types.is_void(return_type) {
            Vec::new()
        } else {
            vec![return_type]
        };
        self.emit(InstructionKind::UserCall(function), args, &results)
    }

    pub fn builtin(&mut self, func: BuiltinFn, args: &[ValueId]) -> ValueId {
        let arg_types: Vec<_> = args.iter().map(|a| self.type_of(*a)).collect();
        let Some(ty) = ops::builtin_result_type(&mut self.module.types, func, &arg_types) else {
            self.incoherent(func.name(), args);
        };
        self.emit_value(InstructionKind::BuiltinCall(func), args, ty)
    }

    pub fn discard(&mut self) -> InstId {
        self.emit(InstructionKind::Discard, &[], &[])
    }

    pub fn spirv(&mut self, op: SpirvOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        let (l, r) = (self.type_of(lhs), self.type_of(rhs));
        let Some(ty) = ops::spirv_result_type(&mut self.module.types, op, l, r) else {
            self.incoherent(op.name(), &[lhs, rhs]);
        };
        self.emit_value(InstructionKind::Spirv(op), &[lhs, rhs], ty)
    }
}
