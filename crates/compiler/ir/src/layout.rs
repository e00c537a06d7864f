//! # Data Layout
//!
//! Byte sizes and alignments of IR types, following the WGSL memory layout
//! rules. Layouts are computed when a type is interned; element types are
//! always interned first, so their layouts are already known.

use crate::types::{ArrayCount, Type, TypeManager};

/// Size and alignment of a type, in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Layout {
    pub size: u32,
    pub align: u32,
}

impl Layout {
    pub const fn new(size: u32, align: u32) -> Self {
        Self { size, align }
    }

    /// Layout of `ty`, whose component types are already interned in `types`
    pub fn of(types: &TypeManager, ty: &Type) -> Self {
        match ty {
            Type::Scalar(kind) => Self::new(kind.size(), kind.size()),
            Type::Vector { element, width } => {
                let element_size = types.size(*element);
                let align = if *width == 2 {
                    2 * element_size
                } else {
                    4 * element_size
                };
                Self::new(width * element_size, align)
            }
            Type::Matrix {
                column, columns, ..
            } => {
                let align = types.align(*column);
                let stride = round_up(align, types.size(*column));
                Self::new(columns * stride, align)
            }
            Type::Array {
                element,
                count,
                stride,
            } => {
                let align = types.align(*element);
                match count {
                    ArrayCount::Constant(count) => Self::new(count * stride, align),
                    // Runtime-sized arrays report a single element stride
                    ArrayCount::Runtime => Self::new(*stride, align),
                }
            }
            Type::Struct { members, .. } => {
                let align = members.iter().map(|member| member.align).max().unwrap_or(0);
                let end = members
                    .last()
                    .map_or(0, |member| member.offset + member.size);
                Self::new(round_up(align, end), align)
            }
            Type::Atomic { element } => Self::new(types.size(*element), types.align(*element)),
            Type::Void | Type::Pointer { .. } | Type::Sampler(_) | Type::Texture(_) => {
                Self::default()
            }
        }
    }
}

/// Rounds `value` up to the next multiple of `alignment`
pub const fn round_up(alignment: u32, value: u32) -> u32 {
    if alignment == 0 {
        value
    } else {
        value.div_ceil(alignment) * alignment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_up() {
        assert_eq!(round_up(4, 0), 0);
        assert_eq!(round_up(4, 1), 4);
        assert_eq!(round_up(8, 12), 16);
        assert_eq!(round_up(16, 16), 16);
        assert_eq!(round_up(0, 7), 7);
    }
}
