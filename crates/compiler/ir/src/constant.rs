//! # Constant Manager
//!
//! Constant data is interned by type and value. Floating point values are
//! keyed on their bit patterns, so `-0.0` and `0.0` are distinct constants and
//! hashing agrees with equality.

use std::fmt;
use std::ops::Index;

use index_vec::IndexVec;
use rustc_hash::FxHashMap;

use crate::types::ScalarKind;
use crate::{ConstantId, TypeId};

/// A scalar literal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scalar {
    Bool(bool),
    I32(i32),
    U32(u32),
    /// Bit pattern of an `f32`
    F32(u32),
    /// Bit pattern of the `f32` widening of an `f16`
    F16(u32),
}

impl Scalar {
    pub fn f32(value: f32) -> Self {
        Self::F32(value.to_bits())
    }

    /// Rounds `value` to the nearest `f16`
    pub fn f16(value: f32) -> Self {
        Self::F16(half::f16::from_f32(value).to_f32().to_bits())
    }

    pub const fn kind(self) -> ScalarKind {
        match self {
            Self::Bool(_) => ScalarKind::Bool,
            Self::I32(_) => ScalarKind::I32,
            Self::U32(_) => ScalarKind::U32,
            Self::F32(_) => ScalarKind::F32,
            Self::F16(_) => ScalarKind::F16,
        }
    }

    /// The zero value of a scalar kind
    pub const fn zero(kind: ScalarKind) -> Self {
        match kind {
            ScalarKind::Bool => Self::Bool(false),
            ScalarKind::I32 => Self::I32(0),
            ScalarKind::U32 => Self::U32(0),
            ScalarKind::F32 => Self::F32(0),
            ScalarKind::F16 => Self::F16(0),
        }
    }

    /// Widened to `i64` for integer and boolean literals
    pub const fn as_i64(self) -> Option<i64> {
        match self {
            Self::Bool(value) => Some(value as i64),
            Self::I32(value) => Some(value as i64),
            Self::U32(value) => Some(value as i64),
            Self::F32(_) | Self::F16(_) => None,
        }
    }

    pub fn as_f32(self) -> Option<f32> {
        match self {
            Self::F32(bits) | Self::F16(bits) => Some(f32::from_bits(bits)),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::I32(value) => write!(f, "{value}i"),
            Self::U32(value) => write!(f, "{value}u"),
            Self::F32(bits) => write!(f, "{}f", FloatLiteral(f32::from_bits(*bits))),
            Self::F16(bits) => write!(f, "{}h", FloatLiteral(f32::from_bits(*bits))),
        }
    }
}

struct FloatLiteral(f32);

impl fmt::Display for FloatLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.0;
        if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
            write!(f, "{value:.1}")
        } else {
            write!(f, "{value:?}")
        }
    }
}

/// The payload of a constant
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstantValue {
    Scalar(Scalar),
    /// One constant per element, in order
    Composite(Vec<ConstantId>),
    /// Every element equal to `element`
    Splat { element: ConstantId, count: u32 },
    /// The zero value of the type
    Zero,
}

/// Typed constant data
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Constant {
    pub ty: TypeId,
    pub value: ConstantValue,
}

/// Interns constant data
#[derive(Debug, Clone, Default)]
pub struct ConstantManager {
    constants: IndexVec<ConstantId, Constant>,
    lookup: FxHashMap<Constant, ConstantId>,
}

impl ConstantManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the canonical handle for `constant`, interning it on first request
    pub fn get(&mut self, constant: Constant) -> ConstantId {
        if let Some(&id) = self.lookup.get(&constant) {
            return id;
        }
        let id = self.constants.push(constant.clone());
        self.lookup.insert(constant, id);
        id
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    /// The scalar payload of a scalar constant
    pub fn as_scalar(&self, id: ConstantId) -> Option<Scalar> {
        match self.constants[id].value {
            ConstantValue::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    /// Calls `f` on every scalar leaf, returning whether all of them satisfy it.
    ///
    /// Zero constants are reported as `None`, since their leaves are not stored.
    pub fn all_scalars(&self, id: ConstantId, f: &mut impl FnMut(Option<Scalar>) -> bool) -> bool {
        match &self.constants[id].value {
            ConstantValue::Scalar(scalar) => f(Some(*scalar)),
            ConstantValue::Composite(elements) => {
                elements.iter().all(|element| self.all_scalars(*element, f))
            }
            ConstantValue::Splat { element, .. } => self.all_scalars(*element, f),
            ConstantValue::Zero => f(None),
        }
    }
}

impl Index<ConstantId> for ConstantManager {
    type Output = Constant;

    fn index(&self, id: ConstantId) -> &Constant {
        &self.constants[id]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeManager;

    #[test]
    fn test_scalar_literals() {
        assert_eq!(Scalar::U32(0).to_string(), "0u");
        assert_eq!(Scalar::I32(-3).to_string(), "-3i");
        assert_eq!(Scalar::f32(2.0).to_string(), "2.0f");
        assert_eq!(Scalar::f32(0.5).to_string(), "0.5f");
        assert_eq!(Scalar::f16(1.0).to_string(), "1.0h");
        assert_eq!(Scalar::Bool(true).to_string(), "true");
    }

    #[test]
    fn test_interning_by_type_and_value() {
        let mut types = TypeManager::new();
        let u32 = types.u32();
        let i32 = types.i32();
        let mut constants = ConstantManager::new();

        let a = constants.get(Constant {
            ty: u32,
            value: ConstantValue::Scalar(Scalar::U32(1)),
        });
        let b = constants.get(Constant {
            ty: u32,
            value: ConstantValue::Scalar(Scalar::U32(1)),
        });
        let c = constants.get(Constant {
            ty: i32,
            value: ConstantValue::Scalar(Scalar::I32(1)),
        });
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(constants.len(), 2);
    }

    #[test]
    fn test_float_keyed_on_bits() {
        let mut types = TypeManager::new();
        let f32 = types.f32();
        let mut constants = ConstantManager::new();
        let zero = constants.get(Constant {
            ty: f32,
            value: ConstantValue::Scalar(Scalar::f32(0.0)),
        });
        let neg_zero = constants.get(Constant {
            ty: f32,
            value: ConstantValue::Scalar(Scalar::f32(-0.0)),
        });
        assert_ne!(zero, neg_zero);
    }

    #[test]
    fn test_f16_is_interned_after_rounding() {
        let mut types = TypeManager::new();
        let f16 = types.f16();
        let mut constants = ConstantManager::new();
        let a = constants.get(Constant {
            ty: f16,
            value: ConstantValue::Scalar(Scalar::f16(0.1)),
        });
        let b = constants.get(Constant {
            ty: f16,
            value: ConstantValue::Scalar(Scalar::f16(0.09999)),
        });
        assert_eq!(a, b);
        assert_eq!(
            constants.as_scalar(a).and_then(Scalar::as_f32),
            Some(0.099_975_586)
        );
        assert_ne!(Scalar::f16(0.1), Scalar::f16(0.1001));
    }

    #[test]
    fn test_all_scalars_walks_splats() {
        let mut types = TypeManager::new();
        let u32 = types.u32();
        let v3 = types.vec3(u32);
        let mut constants = ConstantManager::new();
        let one = constants.get(Constant {
            ty: u32,
            value: ConstantValue::Scalar(Scalar::U32(1)),
        });
        let splat = constants.get(Constant {
            ty: v3,
            value: ConstantValue::Splat {
                element: one,
                count: 3,
            },
        });
        assert!(constants.all_scalars(splat, &mut |s| s == Some(Scalar::U32(1))));
        assert!(!constants.all_scalars(splat, &mut |s| s == Some(Scalar::U32(0))));
    }
}
