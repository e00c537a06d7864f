//! # Functions
//!
//! A function owns its parameters, its return type and a single body block.
//! Entry points additionally carry a pipeline stage and IO attributes on their
//! parameters and return value.

use std::fmt;

use crate::{BlockId, TypeId, ValueId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Compute { workgroup_size: [u32; 3] },
    Fragment,
    Vertex,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compute {
                workgroup_size: [x, y, z],
            } => write!(f, "@compute @workgroup_size({x}, {y}, {z})"),
            Self::Fragment => write!(f, "@fragment"),
            Self::Vertex => write!(f, "@vertex"),
        }
    }
}

/// Shader IO builtins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinValue {
    Position,
    FragDepth,
    FrontFacing,
    GlobalInvocationId,
    LocalInvocationId,
    LocalInvocationIndex,
    NumWorkgroups,
    WorkgroupId,
    VertexIndex,
    InstanceIndex,
    SampleIndex,
    SampleMask,
}

impl BuiltinValue {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::FragDepth => "frag_depth",
            Self::FrontFacing => "front_facing",
            Self::GlobalInvocationId => "global_invocation_id",
            Self::LocalInvocationId => "local_invocation_id",
            Self::LocalInvocationIndex => "local_invocation_index",
            Self::NumWorkgroups => "num_workgroups",
            Self::WorkgroupId => "workgroup_id",
            Self::VertexIndex => "vertex_index",
            Self::InstanceIndex => "instance_index",
            Self::SampleIndex => "sample_index",
            Self::SampleMask => "sample_mask",
        }
    }
}

/// Attributes of an entry point parameter or return value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IoAttributes {
    pub builtin: Option<BuiltinValue>,
    pub location: Option<u32>,
    pub invariant: bool,
}

impl IoAttributes {
    pub const fn builtin(value: BuiltinValue) -> Self {
        Self {
            builtin: Some(value),
            location: None,
            invariant: false,
        }
    }

    pub const fn location(location: u32) -> Self {
        Self {
            builtin: None,
            location: Some(location),
            invariant: false,
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.builtin.is_none() && self.location.is_none() && !self.invariant
    }
}

impl fmt::Display for IoAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.invariant {
            parts.push("@invariant".to_string());
        }
        if let Some(location) = self.location {
            parts.push(format!("@location({location})"));
        }
        if let Some(builtin) = self.builtin {
            parts.push(format!("@{}", builtin.name()));
        }
        write!(f, "[{}]", parts.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub(crate) name: String,
    pub(crate) params: Vec<ValueId>,
    pub(crate) param_attributes: Vec<IoAttributes>,
    pub(crate) return_type: TypeId,
    pub(crate) return_attributes: IoAttributes,
    pub(crate) block: BlockId,
    pub(crate) stage: Option<PipelineStage>,
}

impl Function {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[ValueId] {
        &self.params
    }

    pub fn param_attributes(&self, index: usize) -> IoAttributes {
        self.param_attributes.get(index).copied().unwrap_or_default()
    }

    pub const fn return_type(&self) -> TypeId {
        self.return_type
    }

    pub const fn return_attributes(&self) -> IoAttributes {
        self.return_attributes
    }

    /// The body block
    pub const fn block(&self) -> BlockId {
        self.block
    }

    pub const fn stage(&self) -> Option<PipelineStage> {
        self.stage
    }

    pub const fn is_entry_point(&self) -> bool {
        self.stage.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_attributes() {
        let compute = PipelineStage::Compute {
            workgroup_size: [8, 4, 1],
        };
        assert_eq!(compute.to_string(), "@compute @workgroup_size(8, 4, 1)");
        assert_eq!(PipelineStage::Fragment.to_string(), "@fragment");
    }

    #[test]
    fn test_io_attributes() {
        let mut attrs = IoAttributes::builtin(BuiltinValue::Position);
        attrs.invariant = true;
        assert_eq!(attrs.to_string(), "[@invariant, @position]");
        assert_eq!(IoAttributes::location(1).to_string(), "[@location(1)]");
        assert!(IoAttributes::default().is_empty());
    }
}
