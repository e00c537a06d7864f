//! # Structured Control Constructs
//!
//! Payloads of the `if`, `loop` and `switch` instructions. Each construct owns
//! its nested blocks and a merge block; the merge block's parameters are the
//! construct's result values.

use crate::{BlockId, ConstantId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct If {
    pub true_block: BlockId,
    pub false_block: BlockId,
    pub merge: BlockId,
}

/// `loop`: initializer runs once, then body and continuing repeat
///
/// The initializer and continuing blocks are always allocated; an empty one is
/// treated as absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Loop {
    pub initializer: BlockId,
    pub body: BlockId,
    pub continuing: BlockId,
    pub merge: BlockId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaseSelector {
    Value(ConstantId),
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Case {
    pub selectors: Vec<CaseSelector>,
    pub block: BlockId,
}

impl Case {
    pub fn is_default(&self) -> bool {
        self.selectors.contains(&CaseSelector::Default)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Switch {
    pub cases: Vec<Case>,
    pub merge: BlockId,
}
