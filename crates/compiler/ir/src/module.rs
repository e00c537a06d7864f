//! # IR Module
//!
//! The module is the top-level container of a compilation. It owns the type
//! and constant managers, the arenas of values, instructions, blocks and
//! functions, and the root block holding module-scope variables.
//!
//! Everything here is a read-only query. Mutation goes through
//! [`crate::Builder`].

use std::fmt;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::arena::Slots;
use crate::block::{Block, BlockRole};
use crate::constant::{Constant, ConstantManager, Scalar};
use crate::function::Function;
use crate::instruction::{Instruction, InstructionKind};
use crate::types::TypeManager;
use crate::value::{Usage, ValueData};
use crate::{BlockId, FunctionId, InstId, TypeId, ValueId};

#[derive(Debug, Clone)]
pub struct Module {
    pub types: TypeManager,
    pub constants: ConstantManager,
    pub(crate) values: Slots<ValueId, ValueData>,
    pub(crate) instructions: Slots<InstId, Instruction>,
    pub(crate) blocks: Slots<BlockId, Block>,
    pub(crate) functions: Slots<FunctionId, Function>,
    pub(crate) function_names: FxHashMap<String, FunctionId>,
    pub(crate) root_block: BlockId,
}

impl Module {
    /// Creates an empty module with an empty root block
    pub fn new() -> Self {
        let mut blocks = Slots::new();
        let root_block = blocks.alloc(Block::new(BlockRole::Root));
        Self {
            types: TypeManager::new(),
            constants: ConstantManager::new(),
            values: Slots::new(),
            instructions: Slots::new(),
            blocks,
            functions: Slots::new(),
            function_names: FxHashMap::default(),
            root_block,
        }
    }

    /// Drops all content, leaving an empty module ready for reuse
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// The block holding module-scope `var` declarations
    pub const fn root_block(&self) -> BlockId {
        self.root_block
    }

    // --- Functions ---

    /// Functions in creation order
    pub fn functions(&self) -> impl Iterator<Item = (FunctionId, &Function)> + '_ {
        self.functions.iter()
    }

    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id]
    }

    pub fn get_function(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(id)
    }

    pub fn lookup_function(&self, name: &str) -> Option<FunctionId> {
        self.function_names.get(name).copied()
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Entry points in creation order
    pub fn entry_points(&self) -> impl Iterator<Item = (FunctionId, &Function)> + '_ {
        self.functions().filter(|(_, f)| f.is_entry_point())
    }

    // --- Blocks and instructions ---

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id]
    }

    pub fn get_block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id)
    }

    pub fn instruction(&self, id: InstId) -> &Instruction {
        &self.instructions[id]
    }

    pub fn get_instruction(&self, id: InstId) -> Option<&Instruction> {
        self.instructions.get(id)
    }

    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// The terminator ending `block`, if its last instruction is one
    pub fn terminator(&self, block: BlockId) -> Option<InstId> {
        let last = self.blocks[block].back()?;
        self.instructions[last].is_terminator().then_some(last)
    }

    /// Blocks a branch terminator of `kind` enters. Empty for non-branches and
    /// for branches whose construct no longer exists.
    pub fn branch_destinations(&self, kind: &InstructionKind) -> SmallVec<[BlockId; 2]> {
        let construct = |target: &InstId| self.instructions.get(*target).map(Instruction::kind);
        let mut out = SmallVec::new();
        match kind {
            InstructionKind::ExitIf(target)
            | InstructionKind::ExitLoop(target)
            | InstructionKind::ExitSwitch(target) => {
                out.extend(construct(target).and_then(InstructionKind::merge_block));
            }
            InstructionKind::NextIteration(target) => {
                if let Some(InstructionKind::Loop(l)) = construct(target) {
                    out.push(l.body);
                }
            }
            InstructionKind::Continue(target) => {
                if let Some(InstructionKind::Loop(l)) = construct(target) {
                    out.push(l.continuing);
                }
            }
            InstructionKind::BreakIf { target, .. } => {
                if let Some(InstructionKind::Loop(l)) = construct(target) {
                    out.push(l.body);
                    out.push(l.merge);
                }
            }
            _ => {}
        }
        out
    }

    /// The function whose body (transitively) contains `block`
    pub fn enclosing_function(&self, block: BlockId) -> Option<FunctionId> {
        let mut current = block;
        loop {
            let data = self.blocks.get(current)?;
            if let Some(function) = data.function {
                return Some(function);
            }
            let parent = data.parent?;
            current = self.instructions.get(parent)?.block?;
        }
    }

    /// The control instructions enclosing `block`, innermost first
    pub fn enclosing_constructs(&self, block: BlockId) -> Vec<InstId> {
        let mut constructs = Vec::new();
        let mut current = block;
        while let Some(parent) = self.blocks.get(current).and_then(|b| b.parent) {
            constructs.push(parent);
            match self.instructions.get(parent).and_then(|i| i.block) {
                Some(outer) => current = outer,
                None => break,
            }
        }
        constructs
    }

    /// Instructions of `block` and of every block nested in it, in program order
    pub fn walk_block(&self, block: BlockId) -> Vec<InstId> {
        let mut out = Vec::new();
        self.walk_into(block, &mut out);
        out
    }

    fn walk_into(&self, block: BlockId, out: &mut Vec<InstId>) {
        for &inst in self.blocks[block].instructions() {
            out.push(inst);
            for nested in self.instructions[inst].kind().owned_blocks() {
                self.walk_into(nested, out);
            }
        }
    }

    /// Every inserted instruction of the module in program order: the root
    /// block first, then each function body in creation order
    pub fn instructions_in_program_order(&self) -> Vec<InstId> {
        let mut out = self.walk_block(self.root_block);
        for (_, function) in self.functions() {
            self.walk_into(function.block, &mut out);
        }
        out
    }

    // --- Values ---

    pub fn value(&self, id: ValueId) -> &ValueData {
        &self.values[id]
    }

    pub fn get_value(&self, id: ValueId) -> Option<&ValueData> {
        self.values.get(id)
    }

    pub fn values(&self) -> impl Iterator<Item = (ValueId, &ValueData)> + '_ {
        self.values.iter()
    }

    pub fn type_of(&self, value: ValueId) -> TypeId {
        self.values[value].ty
    }

    pub fn uses(&self, value: ValueId) -> &[Usage] {
        self.values[value].uses()
    }

    /// Constant data of a constant value
    pub fn constant(&self, value: ValueId) -> Option<&Constant> {
        self.values[value].constant().map(|id| &self.constants[id])
    }

    /// Scalar payload of a scalar constant value
    pub fn scalar_constant(&self, value: ValueId) -> Option<Scalar> {
        self.values[value]
            .constant()
            .and_then(|id| self.constants.as_scalar(id))
    }

    /// The instruction producing `value`, if it is an instruction result
    pub fn producer(&self, value: ValueId) -> Option<&Instruction> {
        self.values[value]
            .producer()
            .and_then(|inst| self.instructions.get(inst))
    }
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::disassemble(self))
    }
}
