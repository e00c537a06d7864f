//! # Blocks
//!
//! A block is an ordered list of instructions ending in a single terminator.
//! Blocks never float: each one is the root block, a function body, or owned
//! by exactly one control instruction, recorded in `parent`.
//!
//! Multi-in blocks (loop bodies, continuing blocks and merge blocks) can be
//! entered by several sibling branches. They carry block parameters and keep a
//! registry of those inbound branches.

use crate::{FunctionId, InstId, ValueId};

/// The place a block occupies in its owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockRole {
    /// Module-scope declarations
    Root,
    FunctionBody,
    True,
    False,
    Initializer,
    Body,
    Continuing,
    Case,
    Merge,
}

impl BlockRole {
    pub const fn is_multi_in(self) -> bool {
        matches!(self, Self::Body | Self::Continuing | Self::Merge)
    }

    /// Trailing disassembly comment
    pub const fn comment(self) -> Option<&'static str> {
        match self {
            Self::Root => Some("root"),
            Self::FunctionBody => None,
            Self::True => Some("true"),
            Self::False => Some("false"),
            Self::Initializer => Some("initializer"),
            Self::Body => Some("body"),
            Self::Continuing => Some("continuing"),
            Self::Case => Some("case"),
            Self::Merge => Some("merge"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub(crate) role: BlockRole,
    pub(crate) instructions: Vec<InstId>,
    pub(crate) params: Vec<ValueId>,
    pub(crate) inbound_branches: Vec<InstId>,
    /// Owning control instruction
    pub(crate) parent: Option<InstId>,
    /// Owning function, for function bodies
    pub(crate) function: Option<FunctionId>,
}

impl Block {
    pub(crate) const fn new(role: BlockRole) -> Self {
        Self {
            role,
            instructions: Vec::new(),
            params: Vec::new(),
            inbound_branches: Vec::new(),
            parent: None,
            function: None,
        }
    }

    pub const fn role(&self) -> BlockRole {
        self.role
    }

    pub const fn is_multi_in(&self) -> bool {
        self.role.is_multi_in()
    }

    pub fn instructions(&self) -> &[InstId] {
        &self.instructions
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Block parameters; for merge blocks these are the construct's results
    pub fn params(&self) -> &[ValueId] {
        &self.params
    }

    pub fn inbound_branches(&self) -> &[InstId] {
        &self.inbound_branches
    }

    pub const fn parent(&self) -> Option<InstId> {
        self.parent
    }

    pub const fn function(&self) -> Option<FunctionId> {
        self.function
    }

    pub fn front(&self) -> Option<InstId> {
        self.instructions.first().copied()
    }

    pub fn back(&self) -> Option<InstId> {
        self.instructions.last().copied()
    }

    pub(crate) fn add_inbound_branch(&mut self, branch: InstId) {
        assert!(
            self.is_multi_in(),
            "inbound branches can only target a multi-in block, got a {:?} block",
            self.role
        );
        self.inbound_branches.push(branch);
    }

    pub(crate) fn remove_inbound_branch(&mut self, branch: InstId) {
        self.inbound_branches.retain(|b| *b != branch);
    }

    pub(crate) fn position(&self, inst: InstId) -> Option<usize> {
        self.instructions.iter().position(|i| *i == inst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_in_roles() {
        let multi: Vec<_> = [
            BlockRole::Root,
            BlockRole::FunctionBody,
            BlockRole::True,
            BlockRole::False,
            BlockRole::Initializer,
            BlockRole::Body,
            BlockRole::Continuing,
            BlockRole::Case,
            BlockRole::Merge,
        ]
        .into_iter()
        .filter(|role| role.is_multi_in())
        .collect();
        assert_eq!(
            multi,
            vec![BlockRole::Body, BlockRole::Continuing, BlockRole::Merge]
        );
    }

    #[test]
    #[should_panic(expected = "inbound branches can only target a multi-in block")]
    fn test_inbound_branch_on_plain_block_panics() {
        let mut block = Block::new(BlockRole::True);
        block.add_inbound_branch(InstId::new(0));
    }
}
