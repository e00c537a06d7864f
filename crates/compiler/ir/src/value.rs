//! # Values
//!
//! A value is anything an instruction can read: an instruction result, a
//! constant, a function parameter or a block parameter. Every value keeps a
//! non-owning list of its uses, maintained by the [`crate::Builder`].

use smallvec::SmallVec;

use crate::{BlockId, ConstantId, FunctionId, InstId, TypeId};

/// One read of a value: operand `operand` of `instruction`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Usage {
    pub instruction: InstId,
    pub operand: usize,
}

impl Usage {
    pub const fn new(instruction: InstId, operand: usize) -> Self {
        Self {
            instruction,
            operand,
        }
    }
}

/// Where a value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Result `index` of `instruction`
    InstructionResult { instruction: InstId, index: usize },
    Constant(ConstantId),
    FunctionParam { function: FunctionId, index: usize },
    BlockParam { block: BlockId, index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueData {
    pub(crate) ty: TypeId,
    pub(crate) kind: ValueKind,
    pub(crate) name: Option<String>,
    pub(crate) uses: SmallVec<[Usage; 2]>,
}

impl ValueData {
    pub(crate) fn new(ty: TypeId, kind: ValueKind) -> Self {
        Self {
            ty,
            kind,
            name: None,
            uses: SmallVec::new(),
        }
    }

    pub const fn ty(&self) -> TypeId {
        self.ty
    }

    pub const fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn uses(&self) -> &[Usage] {
        &self.uses
    }

    pub fn is_used(&self) -> bool {
        !self.uses.is_empty()
    }

    /// The instruction producing this value, if it is an instruction result
    pub const fn producer(&self) -> Option<InstId> {
        match self.kind {
            ValueKind::InstructionResult { instruction, .. } => Some(instruction),
            _ => None,
        }
    }

    pub const fn constant(&self) -> Option<ConstantId> {
        match self.kind {
            ValueKind::Constant(id) => Some(id),
            _ => None,
        }
    }

    pub(crate) fn add_use(&mut self, usage: Usage) {
        self.uses.push(usage);
    }

    pub(crate) fn remove_use(&mut self, usage: Usage) {
        if let Some(pos) = self.uses.iter().position(|u| *u == usage) {
            self.uses.remove(pos);
        }
    }
}
