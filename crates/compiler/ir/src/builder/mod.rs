//! # IR Builder
//!
//! The builder is the only way to mutate a [`Module`]. It allocates values,
//! instructions and blocks, places instructions at a cursor, and keeps use
//! lists, parent links and inbound-branch registries consistent across edits.
//!
//! The builder is split by concern:
//! - this module: cursor and placement, constants, functions, rewrites
//! - `instr_builder`: value-producing instructions
//! - `cfg_builder`: control constructs and terminators
//!
//! Misuse (a second terminator, a branch with the wrong arguments, removing a
//! value that is still used) is a compiler bug and panics immediately.

mod cfg_builder;
mod instr_builder;

use crate::block::{Block, BlockRole};
use crate::constant::{Constant, ConstantValue, Scalar};
use crate::function::{Function, IoAttributes, PipelineStage};
use crate::instruction::{Instruction, InstructionKind};
use crate::module::Module;
use crate::types::{Type, TypeManager};
use crate::validator::{check_operation, OperationContext};
use crate::value::{Usage, ValueData, ValueKind};
use crate::{BlockId, ConstantId, FunctionId, InstId, TypeId, ValueId};

/// Where newly created instructions are placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertionPoint {
    /// Instructions are created but not inserted
    Detached,
    /// At the end of a block
    AppendTo(BlockId),
    /// Immediately before an instruction
    Before(InstId),
    /// Immediately after an instruction; the cursor then follows the new instruction
    After(InstId),
}

/// Mutation interface over a [`Module`]
pub struct Builder<'m> {
    module: &'m mut Module,
    cursor: InsertionPoint,
}

impl<'m> Builder<'m> {
    pub fn new(module: &'m mut Module) -> Self {
        Self {
            module,
            cursor: InsertionPoint::Detached,
        }
    }

    /// Read access to the module being built
    pub fn module(&self) -> &Module {
        &*self.module
    }

    pub fn types(&mut self) -> &mut TypeManager {
        &mut self.module.types
    }

    pub fn type_of(&self, value: ValueId) -> TypeId {
        self.module.type_of(value)
    }

    // --- Cursor ---

    pub const fn cursor(&self) -> InsertionPoint {
        self.cursor
    }

    pub fn set_cursor(&mut self, cursor: InsertionPoint) -> &mut Self {
        self.cursor = cursor;
        self
    }

    /// Places subsequent instructions at the end of `block`
    pub fn append_to(&mut self, block: BlockId) -> &mut Self {
        self.set_cursor(InsertionPoint::AppendTo(block))
    }

    /// Places subsequent instructions before `inst`
    pub fn position_before(&mut self, inst: InstId) -> &mut Self {
        self.set_cursor(InsertionPoint::Before(inst))
    }

    /// Places subsequent instructions after `inst`, in creation order
    pub fn position_after(&mut self, inst: InstId) -> &mut Self {
        self.set_cursor(InsertionPoint::After(inst))
    }

    // --- Creation and placement ---

    /// Creates an un-inserted instruction of `kind` reading `operands` and
    /// producing one result per entry of `result_types`.
    ///
    /// Panics if the operands and results do not fit the kind's signature.
    pub fn create_instruction(
        &mut self,
        kind: InstructionKind,
        operands: &[ValueId],
        result_types: &[TypeId],
    ) -> InstId {
        let inst = self.module.instructions.alloc(Instruction::new(kind));
        for &operand in operands {
            self.push_operand(inst, operand);
        }
        for (index, &ty) in result_types.iter().enumerate() {
            let result = self.module.values.alloc(ValueData::new(
                ty,
                ValueKind::InstructionResult {
                    instruction: inst,
                    index,
                },
            ));
            self.module.instructions[inst].results.push(result);
        }

        let module = &mut *self.module;
        let mut cx = OperationContext {
            types: &mut module.types,
            constants: &module.constants,
            values: &module.values,
            functions: &module.functions,
        };
        let data = &module.instructions[inst];
        if let Err(err) = check_operation(&mut cx, data) {
            panic!("invalid {} instruction: {err}", data.kind.mnemonic());
        }
        inst
    }

    /// Inserts `inst` at the end of `block`.
    ///
    /// Panics if the block already ends in a terminator.
    pub fn append(&mut self, block: BlockId, inst: InstId) {
        self.assert_detached(inst);
        assert!(
            self.module.terminator(block).is_none(),
            "cannot append {} to a block that already has a terminator",
            self.module.instructions[inst].kind.mnemonic()
        );
        self.module.blocks[block].instructions.push(inst);
        self.module.instructions[inst].block = Some(block);
    }

    /// Inserts `inst` immediately before `anchor`
    pub fn insert_before(&mut self, anchor: InstId, inst: InstId) {
        self.assert_detached(inst);
        let (block, pos) = self.position_of(anchor);
        self.module.blocks[block].instructions.insert(pos, inst);
        self.module.instructions[inst].block = Some(block);
    }

    /// Inserts `inst` immediately after `anchor`.
    ///
    /// Panics if `anchor` is a terminator.
    pub fn insert_after(&mut self, anchor: InstId, inst: InstId) {
        self.assert_detached(inst);
        assert!(
            !self.module.instructions[anchor].is_terminator(),
            "cannot insert after a terminator"
        );
        let (block, pos) = self.position_of(anchor);
        self.module.blocks[block].instructions.insert(pos + 1, inst);
        self.module.instructions[inst].block = Some(block);
    }

    /// Takes `inst` out of its block without destroying it
    pub fn detach(&mut self, inst: InstId) {
        if let Some(block) = self.module.instructions[inst].block.take() {
            self.module.blocks[block].instructions.retain(|i| *i != inst);
        }
    }

    /// Places `inst` at the cursor
    pub(crate) fn place(&mut self, inst: InstId) {
        match self.cursor {
            InsertionPoint::Detached => {}
            InsertionPoint::AppendTo(block) => self.append(block, inst),
            InsertionPoint::Before(anchor) => self.insert_before(anchor, inst),
            InsertionPoint::After(anchor) => {
                self.insert_after(anchor, inst);
                self.cursor = InsertionPoint::After(inst);
            }
        }
    }

    fn assert_detached(&self, inst: InstId) {
        assert!(
            self.module.instructions[inst].block.is_none(),
            "instruction is already inserted in a block"
        );
    }

    fn position_of(&self, anchor: InstId) -> (BlockId, usize) {
        let block = self.module.instructions[anchor]
            .block
            .unwrap_or_else(|| panic!("anchor instruction {anchor:?} is not inserted"));
        let pos = self.module.blocks[block]
            .position(anchor)
            .unwrap_or_else(|| panic!("anchor instruction {anchor:?} is missing from its block"));
        (block, pos)
    }

    pub(crate) fn alloc_block(&mut self, role: BlockRole, parent: Option<InstId>) -> BlockId {
        let mut block = Block::new(role);
        block.parent = parent;
        self.module.blocks.alloc(block)
    }

    fn push_operand(&mut self, inst: InstId, operand: ValueId) {
        let index = self.module.instructions[inst].operands.len();
        self.module.values[operand].add_use(Usage::new(inst, index));
        self.module.instructions[inst].operands.push(operand);
    }

    // --- Constants ---

    /// A new value holding interned constant data.
    ///
    /// Panics if the payload does not fit the constant's type.
    pub fn constant(&mut self, constant: Constant) -> ValueId {
        self.check_constant(&constant);
        let ty = constant.ty;
        let id = self.module.constants.get(constant);
        self.constant_value(ty, id)
    }

    fn constant_value(&mut self, ty: TypeId, id: ConstantId) -> ValueId {
        self.module
            .values
            .alloc(ValueData::new(ty, ValueKind::Constant(id)))
    }

    pub fn scalar(&mut self, scalar: Scalar) -> ValueId {
        let ty = self.module.types.scalar(scalar.kind());
        self.constant(Constant {
            ty,
            value: ConstantValue::Scalar(scalar),
        })
    }

    pub fn bool(&mut self, value: bool) -> ValueId {
        self.scalar(Scalar::Bool(value))
    }

    pub fn i32(&mut self, value: i32) -> ValueId {
        self.scalar(Scalar::I32(value))
    }

    pub fn u32(&mut self, value: u32) -> ValueId {
        self.scalar(Scalar::U32(value))
    }

    pub fn f32(&mut self, value: f32) -> ValueId {
        self.scalar(Scalar::f32(value))
    }

    pub fn f16(&mut self, value: f32) -> ValueId {
        self.scalar(Scalar::f16(value))
    }

    /// `scalar` if `ty` is a scalar type, otherwise a vector of `ty` with every
    /// element equal to `scalar`
    pub fn splat(&mut self, ty: TypeId, scalar: Scalar) -> ValueId {
        if self.module.types.is_scalar(ty) {
            assert_eq!(
                self.module.types.as_scalar(ty),
                Some(scalar.kind()),
                "splat scalar does not match the target type"
            );
            return self.scalar(scalar);
        }
        let count = self
            .module
            .types
            .vector_width(ty)
            .unwrap_or_else(|| panic!("cannot splat into {}", self.module.types.name(ty)));
        let element_ty = self.module.types.scalar(scalar.kind());
        let element = self.module.constants.get(Constant {
            ty: element_ty,
            value: ConstantValue::Scalar(scalar),
        });
        self.constant(Constant {
            ty,
            value: ConstantValue::Splat { element, count },
        })
    }

    /// The zero value of `ty`
    pub fn zero(&mut self, ty: TypeId) -> ValueId {
        self.constant(Constant {
            ty,
            value: ConstantValue::Zero,
        })
    }

    fn check_constant(&self, constant: &Constant) {
        let types = &self.module.types;
        let ok = match &constant.value {
            ConstantValue::Scalar(scalar) => types.as_scalar(constant.ty) == Some(scalar.kind()),
            ConstantValue::Composite(elements) => {
                let expected = match &types[constant.ty] {
                    Type::Struct { members, .. } => members.len(),
                    _ => types.element_count(constant.ty).unwrap_or(0) as usize,
                };
                elements.len() == expected
                    && elements.iter().enumerate().all(|(i, element)| {
                        types.indexed(constant.ty, Some(i as u32))
                            == Some(self.module.constants[*element].ty)
                    })
            }
            ConstantValue::Splat { element, count } => {
                types.element_count(constant.ty) == Some(*count)
                    && types.indexed(constant.ty, Some(0))
                        == Some(self.module.constants[*element].ty)
            }
            ConstantValue::Zero => types.is_sized(constant.ty),
        };
        assert!(
            ok,
            "constant payload does not fit type {}",
            types.name(constant.ty)
        );
    }

    // --- Names ---

    pub fn set_name(&mut self, value: ValueId, name: impl Into<String>) {
        self.module.values[value].name = Some(name.into());
    }

    // --- Functions ---

    /// Creates a function with an empty body block.
    ///
    /// Panics if a function with the same name exists.
    pub fn function(
        &mut self,
        name: impl Into<String>,
        return_type: TypeId,
        stage: Option<PipelineStage>,
    ) -> FunctionId {
        let name = name.into();
        assert!(
            !self.module.function_names.contains_key(&name),
            "function '{name}' already exists"
        );
        let block = self.alloc_block(BlockRole::FunctionBody, None);
        let id = self.module.functions.alloc(Function {
            name: name.clone(),
            params: Vec::new(),
            param_attributes: Vec::new(),
            return_type,
            return_attributes: IoAttributes::default(),
            block,
            stage,
        });
        self.module.blocks[block].function = Some(id);
        self.module.function_names.insert(name, id);
        id
    }

    /// The body block of `function`
    pub fn function_body(&self, function: FunctionId) -> BlockId {
        self.module.functions[function].block
    }

    /// Appends a named parameter to `function`
    pub fn add_param(
        &mut self,
        function: FunctionId,
        name: impl Into<String>,
        ty: TypeId,
    ) -> ValueId {
        let index = self.module.functions[function].params.len();
        let param = self
            .module
            .values
            .alloc(ValueData::new(ty, ValueKind::FunctionParam { function, index }));
        self.set_name(param, name);
        let data = &mut self.module.functions[function];
        data.params.push(param);
        data.param_attributes.push(IoAttributes::default());
        param
    }

    /// Sets the IO attributes of a function parameter
    pub fn set_param_attributes(&mut self, param: ValueId, attributes: IoAttributes) {
        let ValueKind::FunctionParam { function, index } = self.module.values[param].kind else {
            panic!("{param:?} is not a function parameter");
        };
        self.module.functions[function].param_attributes[index] = attributes;
    }

    pub fn set_return_attributes(&mut self, function: FunctionId, attributes: IoAttributes) {
        self.module.functions[function].return_attributes = attributes;
    }

    /// Makes `function` an entry point of `stage`, or an ordinary function
    pub fn set_stage(&mut self, function: FunctionId, stage: Option<PipelineStage>) {
        self.module.functions[function].stage = stage;
    }

    /// Panics if another function already has the name
    pub fn rename_function(&mut self, function: FunctionId, name: impl Into<String>) {
        let name = name.into();
        assert!(
            !self.module.function_names.contains_key(&name),
            "function '{name}' already exists"
        );
        let old = std::mem::replace(&mut self.module.functions[function].name, name.clone());
        self.module.function_names.remove(&old);
        self.module.function_names.insert(name, function);
    }

    /// Destroys `function` together with its body.
    ///
    /// Calls to the function elsewhere are left dangling; the validator reports them.
    pub fn remove_function(&mut self, function: FunctionId) {
        let data = self
            .module
            .functions
            .free(function)
            .unwrap_or_else(|| panic!("function {function:?} does not exist"));
        self.destroy_block(data.block);
        for param in data.params {
            self.module.values.free(param);
        }
        self.module.function_names.remove(&data.name);
    }

    // --- Rewrites ---

    /// Replaces operand `index` of `inst` with `value`, moving the use edge
    pub fn set_operand(&mut self, inst: InstId, index: usize, value: ValueId) {
        let old = self.module.instructions[inst]
            .operand(index)
            .unwrap_or_else(|| panic!("instruction {inst:?} has no operand {index}"));
        if old == value {
            return;
        }
        let usage = Usage::new(inst, index);
        self.module.values[old].remove_use(usage);
        self.module.values[value].add_use(usage);
        self.module.instructions[inst].operands[index] = value;
    }

    /// Rewrites every use of `old` to read `new` instead.
    ///
    /// Panics if the two values have different types.
    pub fn replace_all_uses_with(&mut self, old: ValueId, new: ValueId) {
        assert!(
            self.module.type_of(old) == self.module.type_of(new),
            "replacement value has type {} but the replaced value has type {}",
            self.module.types.name(self.module.type_of(new)),
            self.module.types.name(self.module.type_of(old))
        );
        if old == new {
            return;
        }
        let uses = std::mem::take(&mut self.module.values[old].uses);
        for usage in uses {
            self.module.instructions[usage.instruction].operands[usage.operand] = new;
            self.module.values[new].add_use(usage);
        }
    }

    /// Destroys `inst`, releasing its operand uses and, for control
    /// instructions, every block it owns.
    ///
    /// Panics if any result of `inst` is still used.
    pub fn remove(&mut self, inst: InstId) {
        for &result in self.module.instructions[inst].results.iter() {
            assert!(
                !self.module.values[result].is_used(),
                "cannot remove {} while its result {result:?} is still used",
                self.module.instructions[inst].kind.mnemonic()
            );
        }
        self.detach(inst);
        self.destroy_instruction(inst);
    }

    /// Replaces every use of the single result of `inst` with `value`, then
    /// removes `inst`
    pub fn replace_and_remove(&mut self, inst: InstId, value: ValueId) {
        let result = self.module.instructions[inst]
            .result()
            .unwrap_or_else(|| panic!("replace_and_remove needs a single-result instruction"));
        self.replace_all_uses_with(result, value);
        self.remove(inst);
    }

    fn destroy_block(&mut self, block: BlockId) {
        let Some(data) = self.module.blocks.free(block) else {
            return;
        };
        for &inst in data.instructions.iter().rev() {
            self.destroy_instruction(inst);
        }
        for param in data.params {
            self.module.values.free(param);
        }
    }

    fn destroy_instruction(&mut self, inst: InstId) {
        if matches!(
            self.cursor,
            InsertionPoint::Before(anchor) | InsertionPoint::After(anchor) if anchor == inst
        ) {
            self.cursor = InsertionPoint::Detached;
        }
        let Some(data) = self.module.instructions.free(inst) else {
            return;
        };
        for (index, &operand) in data.operands.iter().enumerate() {
            if let Some(value) = self.module.values.get_mut(operand) {
                value.remove_use(Usage::new(inst, index));
            }
        }
        for destination in self.module.branch_destinations(&data.kind) {
            if let Some(block) = self.module.blocks.get_mut(destination) {
                block.remove_inbound_branch(inst);
            }
        }
        for nested in data.kind.owned_blocks() {
            self.destroy_block(nested);
        }
        if let Some(merge) = data.kind.merge_block() {
            // Merge params are the construct results, freed below
            if let Some(block) = self.module.blocks.free(merge) {
                debug_assert_eq!(block.params.as_slice(), data.results.as_slice());
            }
        }
        for result in data.results {
            self.module.values.free(result);
        }
    }
}
