//! # Operators and Result Type Deduction
//!
//! The closed sets of binary, unary, builtin and backend-primitive operators,
//! with the WGSL typing rules that deduce an operation's result type from its
//! operand types. A `None` deduction means the operand types are incoherent
//! for that operator.

use crate::constant::Scalar;
use crate::types::{ArrayCount, ScalarKind, Type, TypeManager};
use crate::TypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Eq,
    Neq,
    Lt,
    Gt,
    Lte,
    Gte,
    Shl,
    Shr,
}

impl BinaryOp {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Mod => "mod",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Lt => "lt",
            Self::Gt => "gt",
            Self::Lte => "lte",
            Self::Gte => "gte",
            Self::Shl => "shl",
            Self::Shr => "shr",
        }
    }

    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Neq | Self::Lt | Self::Gt | Self::Lte | Self::Gte
        )
    }

    /// Division and modulo, the operators guarded against a zero divisor
    pub const fn is_division(self) -> bool {
        matches!(self, Self::Div | Self::Mod)
    }

    pub const fn is_bitwise(self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Xor)
    }

    pub const fn is_shift(self) -> bool {
        matches!(self, Self::Shl | Self::Shr)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Negation,
    Complement,
    Not,
}

impl UnaryOp {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Negation => "negation",
            Self::Complement => "complement",
            Self::Not => "not",
        }
    }
}

/// Core builtin functions the transforms need to emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinFn {
    /// `select(f, t, cond)`
    Select,
    Min,
    Max,
    Clamp,
    Abs,
    ArrayLength,
    Dot,
}

impl BuiltinFn {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Min => "min",
            Self::Max => "max",
            Self::Clamp => "clamp",
            Self::Abs => "abs",
            Self::ArrayLength => "arrayLength",
            Self::Dot => "dot",
        }
    }
}

/// SPIR-V matrix primitives produced by the SPIR-V raise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpirvOp {
    MatrixTimesScalar,
    MatrixTimesVector,
    VectorTimesMatrix,
    MatrixTimesMatrix,
}

impl SpirvOp {
    pub const fn name(self) -> &'static str {
        match self {
            Self::MatrixTimesScalar => "spirv.matrix_times_scalar",
            Self::MatrixTimesVector => "spirv.matrix_times_vector",
            Self::VectorTimesMatrix => "spirv.vector_times_matrix",
            Self::MatrixTimesMatrix => "spirv.matrix_times_matrix",
        }
    }
}

/// The arithmetic shape of a type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Scalar(ScalarKind),
    Vector(ScalarKind, u32),
    /// `(element, columns, rows)`
    Matrix(ScalarKind, u32, u32),
    Other,
}

impl Shape {
    pub fn of(types: &TypeManager, ty: TypeId) -> Self {
        match &types[ty] {
            Type::Scalar(kind) => Self::Scalar(*kind),
            Type::Vector { element, width } => match types.as_scalar(*element) {
                Some(kind) => Self::Vector(kind, *width),
                None => Self::Other,
            },
            Type::Matrix { columns, rows, .. } => match types.scalar_of(ty) {
                Some(kind) => Self::Matrix(kind, *columns, *rows),
                None => Self::Other,
            },
            _ => Self::Other,
        }
    }

    pub const fn element(self) -> Option<ScalarKind> {
        match self {
            Self::Scalar(kind) | Self::Vector(kind, _) | Self::Matrix(kind, _, _) => Some(kind),
            Self::Other => None,
        }
    }

    /// Scalar or vector
    pub const fn is_scalar_or_vector(self) -> bool {
        matches!(self, Self::Scalar(_) | Self::Vector(_, _))
    }
}

/// Interns the type with the same shape as `like` but element `kind`
fn with_element(types: &mut TypeManager, like: Shape, kind: ScalarKind) -> Option<TypeId> {
    let element = types.scalar(kind);
    match like {
        Shape::Scalar(_) => Some(element),
        Shape::Vector(_, width) => Some(types.vec(element, width)),
        Shape::Matrix(_, columns, rows) => Some(types.mat(element, columns, rows)),
        Shape::Other => None,
    }
}

/// Result type of `lhs op rhs`
pub fn binary_result_type(
    types: &mut TypeManager,
    op: BinaryOp,
    lhs: TypeId,
    rhs: TypeId,
) -> Option<TypeId> {
    let (l, r) = (Shape::of(types, lhs), Shape::of(types, rhs));
    match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Div | BinaryOp::Mod => {
            if matches!(op, BinaryOp::Add | BinaryOp::Sub)
                && matches!(l, Shape::Matrix(..))
                && lhs == rhs
            {
                return Some(lhs);
            }
            numeric_broadcast(l, r, lhs, rhs)
        }
        BinaryOp::Mul => match (l, r) {
            (Shape::Matrix(a, ..), Shape::Scalar(b)) if a == b => Some(lhs),
            (Shape::Scalar(a), Shape::Matrix(b, ..)) if a == b => Some(rhs),
            (Shape::Matrix(a, columns, rows), Shape::Vector(b, width))
                if a == b && width == columns =>
            {
                with_element(types, Shape::Vector(a, rows), a)
            }
            (Shape::Vector(b, width), Shape::Matrix(a, columns, rows))
                if a == b && width == rows =>
            {
                with_element(types, Shape::Vector(a, columns), a)
            }
            (Shape::Matrix(a, k, rows), Shape::Matrix(b, columns, k2)) if a == b && k == k2 => {
                with_element(types, Shape::Matrix(a, columns, rows), a)
            }
            _ => numeric_broadcast(l, r, lhs, rhs),
        },
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => {
            let element = l.element()?;
            let ok = lhs == rhs
                && l.is_scalar_or_vector()
                && (element == ScalarKind::Bool || element.is_integer());
            ok.then_some(lhs)
        }
        BinaryOp::Eq | BinaryOp::Neq | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Lte
        | BinaryOp::Gte => {
            let element = l.element()?;
            let ordered = !matches!(op, BinaryOp::Eq | BinaryOp::Neq);
            if lhs != rhs || !l.is_scalar_or_vector() || (ordered && !element.is_numeric()) {
                return None;
            }
            with_element(types, l, ScalarKind::Bool)
        }
        BinaryOp::Shl | BinaryOp::Shr => {
            let element = l.element()?;
            let shift_ok = match (l, r) {
                (Shape::Scalar(_), Shape::Scalar(ScalarKind::U32)) => true,
                (Shape::Vector(_, n), Shape::Vector(ScalarKind::U32, m)) => n == m,
                _ => false,
            };
            (shift_ok && element.is_integer()).then_some(lhs)
        }
    }
}

/// Same-element numeric scalar/vector arithmetic, with scalar broadcast
fn numeric_broadcast(l: Shape, r: Shape, lhs: TypeId, rhs: TypeId) -> Option<TypeId> {
    match (l, r) {
        (Shape::Scalar(a), Shape::Scalar(b)) if a == b && a.is_numeric() => Some(lhs),
        (Shape::Vector(a, n), Shape::Vector(b, m)) if a == b && n == m && a.is_numeric() => {
            Some(lhs)
        }
        (Shape::Vector(a, _), Shape::Scalar(b)) if a == b && a.is_numeric() => Some(lhs),
        (Shape::Scalar(a), Shape::Vector(b, _)) if a == b && a.is_numeric() => Some(rhs),
        _ => None,
    }
}

/// Result type of `op operand`
pub fn unary_result_type(types: &TypeManager, op: UnaryOp, operand: TypeId) -> Option<TypeId> {
    let shape = Shape::of(types, operand);
    if !shape.is_scalar_or_vector() {
        return None;
    }
    let element = shape.element()?;
    let ok = match op {
        UnaryOp::Negation => element.is_signed_integer() || element.is_float(),
        UnaryOp::Complement => element.is_integer(),
        UnaryOp::Not => element == ScalarKind::Bool,
    };
    ok.then_some(operand)
}

/// Result type of a builtin call with `args`
pub fn builtin_result_type(
    types: &mut TypeManager,
    func: BuiltinFn,
    args: &[TypeId],
) -> Option<TypeId> {
    match (func, args) {
        (BuiltinFn::Select, &[f, t, cond]) => {
            let value = Shape::of(types, f);
            let cond_ok = match (value, Shape::of(types, cond)) {
                (_, Shape::Scalar(ScalarKind::Bool)) => true,
                (Shape::Vector(_, n), Shape::Vector(ScalarKind::Bool, m)) => n == m,
                _ => false,
            };
            (f == t && value.is_scalar_or_vector() && cond_ok).then_some(f)
        }
        (BuiltinFn::Min | BuiltinFn::Max, &[a, b]) => (a == b && is_numeric_value(types, a)).then_some(a),
        (BuiltinFn::Clamp, &[e, low, high]) => {
            (e == low && e == high && is_numeric_value(types, e)).then_some(e)
        }
        (BuiltinFn::Abs, &[e]) => is_numeric_value(types, e).then_some(e),
        (BuiltinFn::Dot, &[a, b]) => match Shape::of(types, a) {
            Shape::Vector(kind, _) if a == b && kind.is_numeric() => Some(types.scalar(kind)),
            _ => None,
        },
        (BuiltinFn::ArrayLength, &[ptr]) => {
            let store = types.store_type(ptr)?;
            if types.is_runtime_array(store) {
                Some(types.u32())
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Numeric scalar or vector
fn is_numeric_value(types: &TypeManager, ty: TypeId) -> bool {
    let shape = Shape::of(types, ty);
    shape.is_scalar_or_vector() && shape.element().is_some_and(ScalarKind::is_numeric)
}

/// Result type of a SPIR-V matrix primitive
pub fn spirv_result_type(
    types: &mut TypeManager,
    op: SpirvOp,
    lhs: TypeId,
    rhs: TypeId,
) -> Option<TypeId> {
    let (l, r) = (Shape::of(types, lhs), Shape::of(types, rhs));
    match (op, l, r) {
        (SpirvOp::MatrixTimesScalar, Shape::Matrix(a, ..), Shape::Scalar(b)) if a == b => {
            Some(lhs)
        }
        (SpirvOp::MatrixTimesVector, Shape::Matrix(a, columns, rows), Shape::Vector(b, width))
            if a == b && width == columns =>
        {
            with_element(types, Shape::Vector(a, rows), a)
        }
        (SpirvOp::VectorTimesMatrix, Shape::Vector(b, width), Shape::Matrix(a, columns, rows))
            if a == b && width == rows =>
        {
            with_element(types, Shape::Vector(a, columns), a)
        }
        (SpirvOp::MatrixTimesMatrix, Shape::Matrix(a, k, rows), Shape::Matrix(b, columns, k2))
            if a == b && k == k2 =>
        {
            with_element(types, Shape::Matrix(a, columns, rows), a)
        }
        _ => None,
    }
}

/// Index value of a constant access index. Negative constants map to an index
/// that is out of bounds for every type.
pub fn constant_index(scalar: Option<Scalar>) -> Option<u32> {
    match scalar? {
        Scalar::U32(index) => Some(index),
        Scalar::I32(index) => Some(u32::try_from(index).unwrap_or(u32::MAX)),
        _ => None,
    }
}

/// Result type of indexing `object` with `indices` (`None` for a dynamic index).
///
/// Indexing through a pointer yields a pointer into the same address space.
pub fn access_result_type(
    types: &mut TypeManager,
    object: TypeId,
    indices: &[Option<u32>],
) -> Option<TypeId> {
    if indices.is_empty() {
        return None;
    }
    let (base, pointer) = match types[object] {
        Type::Pointer {
            space,
            store,
            access,
        } => (store, Some((space, access))),
        _ => (object, None),
    };
    let mut current = base;
    for &index in indices {
        current = types.indexed(current, index)?;
    }
    match pointer {
        Some((space, access)) => Some(types.ptr(space, current, access)),
        None => Some(current),
    }
}

/// Result type of swizzling `object` with component `indices`
pub fn swizzle_result_type(
    types: &mut TypeManager,
    object: TypeId,
    indices: &[u32],
) -> Option<TypeId> {
    let Shape::Vector(kind, width) = Shape::of(types, object) else {
        return None;
    };
    if indices.is_empty() || indices.len() > 4 || indices.iter().any(|i| *i >= width) {
        return None;
    }
    let element = types.scalar(kind);
    match indices.len() {
        1 => Some(element),
        n => Some(types.vec(element, n as u32)),
    }
}

/// Whether `from` converts element-wise to `to`
pub fn is_valid_conversion(types: &TypeManager, from: TypeId, to: TypeId) -> bool {
    match (Shape::of(types, from), Shape::of(types, to)) {
        (Shape::Scalar(_), Shape::Scalar(_)) => true,
        (Shape::Vector(_, n), Shape::Vector(_, m)) => n == m,
        (Shape::Matrix(_, c1, r1), Shape::Matrix(_, c2, r2)) => c1 == c2 && r1 == r2,
        _ => false,
    }
}

/// Whether `to` reinterprets the bits of `from`
pub fn is_valid_bitcast(types: &TypeManager, from: TypeId, to: TypeId) -> bool {
    let (f, t) = (Shape::of(types, from), Shape::of(types, to));
    let numeric = |shape: Shape| {
        shape.is_scalar_or_vector() && shape.element().is_some_and(ScalarKind::is_numeric)
    };
    numeric(f) && numeric(t) && types.size(from) == types.size(to)
}

/// Whether `args` construct a value of type `ty`
///
/// An empty argument list constructs the zero value.
pub fn is_valid_construct(types: &TypeManager, ty: TypeId, args: &[TypeId]) -> bool {
    if args.is_empty() {
        return types.is_sized(ty);
    }
    match &types[ty] {
        Type::Scalar(_) => args == [ty],
        Type::Vector { element, width } => {
            if args == [*element] {
                return true;
            }
            let mut count = 0;
            for &arg in args {
                if arg == *element {
                    count += 1;
                } else if types.is_vector(arg) && types.indexed(arg, Some(0)) == Some(*element) {
                    count += types.vector_width(arg).unwrap_or(0);
                } else {
                    return false;
                }
            }
            count == *width
        }
        Type::Matrix {
            column,
            columns,
            rows,
        } => {
            let element = types.indexed(*column, Some(0));
            let all_columns = args.len() == *columns as usize && args.iter().all(|a| a == column);
            let all_scalars = args.len() == (*columns * *rows) as usize
                && args.iter().all(|a| Some(*a) == element);
            all_columns || all_scalars
        }
        Type::Array {
            element,
            count: ArrayCount::Constant(count),
            ..
        } => args.len() == *count as usize && args.iter().all(|a| a == element),
        Type::Struct { members, .. } => {
            args.len() == members.len() && args.iter().zip(members).all(|(a, m)| *a == m.ty)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_products() {
        let mut types = TypeManager::new();
        let f32 = types.f32();
        let m4x2 = types.mat(f32, 4, 2);
        let m2x4 = types.mat(f32, 2, 4);
        let m2x2 = types.mat(f32, 2, 2);
        let m3x4 = types.mat(f32, 3, 4);
        let v3 = types.vec3(f32);
        let v4 = types.vec4(f32);

        assert_eq!(
            binary_result_type(&mut types, BinaryOp::Mul, m4x2, m2x4),
            Some(m2x2)
        );
        assert_eq!(
            binary_result_type(&mut types, BinaryOp::Mul, m3x4, v3),
            Some(v4)
        );
        assert_eq!(
            binary_result_type(&mut types, BinaryOp::Mul, v4, m3x4),
            Some(v3)
        );
        assert_eq!(
            binary_result_type(&mut types, BinaryOp::Mul, f32, m3x4),
            Some(m3x4)
        );
        assert_eq!(binary_result_type(&mut types, BinaryOp::Mul, m3x4, v4), None);
        assert_eq!(
            spirv_result_type(&mut types, SpirvOp::MatrixTimesMatrix, m4x2, m2x4),
            Some(m2x2)
        );
    }

    #[test]
    fn test_matrix_add_requires_same_type() {
        let mut types = TypeManager::new();
        let f32 = types.f32();
        let a = types.mat(f32, 2, 3);
        let b = types.mat(f32, 3, 2);
        assert_eq!(binary_result_type(&mut types, BinaryOp::Add, a, a), Some(a));
        assert_eq!(binary_result_type(&mut types, BinaryOp::Sub, a, b), None);
        assert_eq!(binary_result_type(&mut types, BinaryOp::Div, a, a), None);
    }

    #[test]
    fn test_comparisons_produce_bool_shape() {
        let mut types = TypeManager::new();
        let i32 = types.i32();
        let v3 = types.vec3(i32);
        let bool = types.bool();
        let bv3 = types.vec3(bool);
        assert_eq!(
            binary_result_type(&mut types, BinaryOp::Lt, i32, i32),
            Some(bool)
        );
        assert_eq!(
            binary_result_type(&mut types, BinaryOp::Eq, v3, v3),
            Some(bv3)
        );
        assert_eq!(binary_result_type(&mut types, BinaryOp::Lt, bool, bool), None);
    }

    #[test]
    fn test_vector_scalar_broadcast() {
        let mut types = TypeManager::new();
        let u32 = types.u32();
        let v2 = types.vec2(u32);
        assert_eq!(
            binary_result_type(&mut types, BinaryOp::Div, v2, u32),
            Some(v2)
        );
        assert_eq!(
            binary_result_type(&mut types, BinaryOp::Mod, u32, v2),
            Some(v2)
        );
    }

    #[test]
    fn test_select_and_min() {
        let mut types = TypeManager::new();
        let u32 = types.u32();
        let bool = types.bool();
        let v2 = types.vec2(u32);
        let bv2 = types.vec2(bool);
        assert_eq!(
            builtin_result_type(&mut types, BuiltinFn::Select, &[v2, v2, bv2]),
            Some(v2)
        );
        assert_eq!(
            builtin_result_type(&mut types, BuiltinFn::Select, &[v2, v2, bool]),
            Some(v2)
        );
        assert_eq!(
            builtin_result_type(&mut types, BuiltinFn::Min, &[u32, u32]),
            Some(u32)
        );
        assert_eq!(builtin_result_type(&mut types, BuiltinFn::Min, &[u32]), None);
    }

    #[test]
    fn test_construct_shapes() {
        let mut types = TypeManager::new();
        let f32 = types.f32();
        let v2 = types.vec2(f32);
        let v3 = types.vec3(f32);
        let v4 = types.vec4(f32);
        let m = types.mat(f32, 2, 3);

        assert!(is_valid_construct(&types, v4, &[v2, v2]));
        assert!(is_valid_construct(&types, v4, &[f32, v3]));
        assert!(is_valid_construct(&types, v4, &[f32]));
        assert!(!is_valid_construct(&types, v4, &[v3]));
        assert!(is_valid_construct(&types, m, &[v3, v3]));
        assert!(is_valid_construct(&types, m, &[f32; 6]));
        assert!(!is_valid_construct(&types, m, &[v2, v2]));
        assert!(is_valid_construct(&types, m, &[]));
    }
}
