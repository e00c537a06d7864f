//! # Tincture Shader Intermediate Representation
//!
//! This crate defines the intermediate representation used between the WGSL
//! front-end and the shader backends. The IR is typed, block-structured and
//! SSA-like, with explicit structured control flow.
//!
//! ## Design Principles
//!
//! 1. **Structured control flow**: `if`, `loop` and `switch` are instructions that own
//!    their nested blocks and an explicit merge block. There is no arbitrary CFG.
//! 2. **Values and use lists**: every operand is a value; every value records the
//!    `(instruction, operand)` pairs that read it, so rewrites stay cheap.
//! 3. **Arena handles**: values, instructions, blocks and functions live in slot
//!    arenas owned by the [`Module`] and are referenced by typed indices.
//! 4. **Builder-only mutation**: all edits go through the [`Builder`], which keeps
//!    use lists, parent links and inbound-branch registries consistent.
//!
//! ## Architecture
//!
//! ```text
//! Module
//! types:        TypeManager       (interned types)
//! constants:    ConstantManager   (interned constant data)
//! values:       Slots<ValueId, ValueData>
//! instructions: Slots<InstId, Instruction>
//! blocks:       Slots<BlockId, Block>
//! functions:    Slots<FunctionId, Function>
//! root_block:   BlockId           (module-scope vars)
//!
//! Function
//! params: Vec<ValueId>
//! block:  BlockId
//!
//! Block
//! instructions: Vec<InstId>   (last one is the terminator)
//! params:       Vec<ValueId>  (multi-in blocks only)
//! ```
//!
//! Transforms implement [`Transform`] and are composed by a [`PassManager`]; the
//! [`Pipeline`] picks the passes for a [`Target`] and validates around each one.

#![allow(clippy::option_if_let_else)]

pub use block::{Block, BlockRole};
pub use builder::{Builder, InsertionPoint};
pub use constant::{Constant, ConstantManager, ConstantValue, Scalar};
pub use control::{Case, CaseSelector, If, Loop, Switch};
pub use disassembler::disassemble;
pub use error::{TransformError, ValidationError, ValidationFailure};
pub use function::{BuiltinValue, Function, IoAttributes, PipelineStage};
pub use instruction::{Instruction, InstructionKind, VarAttributes};
pub use module::Module;
pub use ops::{BinaryOp, BuiltinFn, SpirvOp, UnaryOp};
pub use passes::{
    BuiltinStyle, CanonicalizeEntryPointIo, EntryPointIoConfig, HandleMatrixArithmetic,
    PassManager, RobustAccess, RobustIntegerDivision, SingleEntryPoint, Transform,
};
pub use pipeline::{Pipeline, PipelineConfig, RobustnessConfig, Target};
pub use types::{
    Access, AddressSpace, ArrayCount, SamplerKind, ScalarKind, StructMember, TexelFormat,
    TextureDimension, TextureKind, Type, TypeManager,
};
pub use validator::validate;
pub use value::{Usage, ValueData, ValueKind};

pub mod arena;
pub mod backend;
pub mod block;
pub mod builder;
pub mod constant;
pub mod control;
pub mod disassembler;
pub mod error;
pub mod function;
pub mod instruction;
pub mod layout;
pub mod module;
pub mod ops;
pub mod passes;
pub mod pipeline;
pub mod types;
pub mod validator;
pub mod value;

#[cfg(test)]
pub mod testing;

// --- Core Identifiers ---

index_vec::define_index_type! {
    /// Handle of an interned type within a [`TypeManager`]
    pub struct TypeId = u32;
}

index_vec::define_index_type! {
    /// Handle of interned constant data within a [`ConstantManager`]
    pub struct ConstantId = u32;
}

index_vec::define_index_type! {
    /// Handle of a value (operand) within a module
    pub struct ValueId = u32;
}

index_vec::define_index_type! {
    /// Handle of an instruction within a module
    pub struct InstId = u32;
}

index_vec::define_index_type! {
    /// Handle of a block within a module
    pub struct BlockId = u32;
}

index_vec::define_index_type! {
    /// Handle of a function within a module
    pub struct FunctionId = u32;
}

/// Helper function to create indentation
pub(crate) fn indent_str(level: usize) -> String {
    "  ".repeat(level)
}
