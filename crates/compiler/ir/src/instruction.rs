//! # Instructions
//!
//! An instruction is a typed operation node: an ordered list of operand values,
//! a fixed list of result values and a closed kind tag. Control constructs are
//! instructions too, carrying the blocks they own in their kind payload.
//!
//! ## Operand layout
//!
//! | Kind | Operands |
//! |---|---|
//! | `binary` | lhs, rhs |
//! | `access` | object, indices... |
//! | `var` | initializer? |
//! | `load` | pointer |
//! | `store` | pointer, value |
//! | `call` / `builtin` | arguments... |
//! | `if` / `switch` | condition / selector |
//! | `exit_*`, `next_iteration`, `continue` | branch arguments... |
//! | `break_if` | condition, next-iteration arguments..., exit arguments... |
//! | `return` | value? |

use smallvec::SmallVec;

use crate::control::{If, Loop, Switch};
use crate::ops::{BinaryOp, BuiltinFn, SpirvOp, UnaryOp};
use crate::{BlockId, FunctionId, InstId, ValueId};

/// Resource binding of a module-scope variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VarAttributes {
    /// `(group, binding)`
    pub binding_point: Option<(u32, u32)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionKind {
    Binary(BinaryOp),
    Unary(UnaryOp),
    Access,
    Swizzle(Vec<u32>),
    Construct,
    Convert,
    Bitcast,
    Let,
    Var(VarAttributes),
    Load,
    Store,
    UserCall(FunctionId),
    BuiltinCall(BuiltinFn),
    Discard,
    Spirv(SpirvOp),

    // Control constructs
    If(If),
    Loop(Loop),
    Switch(Switch),

    // Terminators
    Return(FunctionId),
    ExitIf(InstId),
    ExitLoop(InstId),
    ExitSwitch(InstId),
    NextIteration(InstId),
    Continue(InstId),
    BreakIf {
        target: InstId,
        next_iteration_args: usize,
    },
    Unreachable,
}

impl InstructionKind {
    /// Disassembly mnemonic
    pub const fn mnemonic(&self) -> &'static str {
        match self {
            Self::Binary(op) => op.name(),
            Self::Unary(op) => op.name(),
            Self::Access => "access",
            Self::Swizzle(_) => "swizzle",
            Self::Construct => "construct",
            Self::Convert => "convert",
            Self::Bitcast => "bitcast",
            Self::Let => "let",
            Self::Var(_) => "var",
            Self::Load => "load",
            Self::Store => "store",
            Self::UserCall(_) => "call",
            Self::BuiltinCall(func) => func.name(),
            Self::Discard => "discard",
            Self::Spirv(op) => op.name(),
            Self::If(_) => "if",
            Self::Loop(_) => "loop",
            Self::Switch(_) => "switch",
            Self::Return(_) => "ret",
            Self::ExitIf(_) => "exit_if",
            Self::ExitLoop(_) => "exit_loop",
            Self::ExitSwitch(_) => "exit_switch",
            Self::NextIteration(_) => "next_iteration",
            Self::Continue(_) => "continue",
            Self::BreakIf { .. } => "break_if",
            Self::Unreachable => "unreachable",
        }
    }

    pub const fn is_terminator(&self) -> bool {
        matches!(
            self,
            Self::Return(_)
                | Self::ExitIf(_)
                | Self::ExitLoop(_)
                | Self::ExitSwitch(_)
                | Self::NextIteration(_)
                | Self::Continue(_)
                | Self::BreakIf { .. }
                | Self::Unreachable
        )
    }

    pub const fn is_control(&self) -> bool {
        matches!(self, Self::If(_) | Self::Loop(_) | Self::Switch(_))
    }

    /// The control instruction a branch terminator exits or re-enters
    pub const fn branch_target(&self) -> Option<InstId> {
        match self {
            Self::ExitIf(target)
            | Self::ExitLoop(target)
            | Self::ExitSwitch(target)
            | Self::NextIteration(target)
            | Self::Continue(target)
            | Self::BreakIf { target, .. } => Some(*target),
            _ => None,
        }
    }

    /// Blocks owned by a control instruction, in print order (merge excluded)
    pub fn owned_blocks(&self) -> SmallVec<[BlockId; 4]> {
        match self {
            Self::If(i) => SmallVec::from_slice(&[i.true_block, i.false_block]),
            Self::Loop(l) => SmallVec::from_slice(&[l.initializer, l.body, l.continuing]),
            Self::Switch(s) => s.cases.iter().map(|case| case.block).collect(),
            _ => SmallVec::new(),
        }
    }

    /// Merge block of a control instruction
    pub const fn merge_block(&self) -> Option<BlockId> {
        match self {
            Self::If(i) => Some(i.merge),
            Self::Loop(l) => Some(l.merge),
            Self::Switch(s) => Some(s.merge),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub(crate) kind: InstructionKind,
    pub(crate) operands: Vec<ValueId>,
    pub(crate) results: SmallVec<[ValueId; 1]>,
    pub(crate) block: Option<BlockId>,
}

impl Instruction {
    pub(crate) fn new(kind: InstructionKind) -> Self {
        Self {
            kind,
            operands: Vec::new(),
            results: SmallVec::new(),
            block: None,
        }
    }

    pub const fn kind(&self) -> &InstructionKind {
        &self.kind
    }

    pub fn operands(&self) -> &[ValueId] {
        &self.operands
    }

    pub fn operand(&self, index: usize) -> Option<ValueId> {
        self.operands.get(index).copied()
    }

    pub fn results(&self) -> &[ValueId] {
        &self.results
    }

    /// The single result of a value-producing instruction
    pub fn result(&self) -> Option<ValueId> {
        match self.results.as_slice() {
            [result] => Some(*result),
            _ => None,
        }
    }

    /// The block this instruction is inserted in
    pub const fn block(&self) -> Option<BlockId> {
        self.block
    }

    pub const fn is_terminator(&self) -> bool {
        self.kind.is_terminator()
    }

    pub const fn as_if(&self) -> Option<&If> {
        match &self.kind {
            InstructionKind::If(i) => Some(i),
            _ => None,
        }
    }

    pub const fn as_loop(&self) -> Option<&Loop> {
        match &self.kind {
            InstructionKind::Loop(l) => Some(l),
            _ => None,
        }
    }

    pub const fn as_switch(&self) -> Option<&Switch> {
        match &self.kind {
            InstructionKind::Switch(s) => Some(s),
            _ => None,
        }
    }

    /// Arguments passed to the branch target, excluding any condition
    pub fn branch_args(&self) -> &[ValueId] {
        match self.kind {
            InstructionKind::BreakIf { .. } => &self.operands[1..],
            InstructionKind::Return(_) => &[],
            _ if self.kind.branch_target().is_some() => &self.operands,
            _ => &[],
        }
    }
}

#[cfg(test)]
#[path = "instruction_tests.rs"]
mod tests;
