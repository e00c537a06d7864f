//! # Type Manager
//!
//! Types are immutable and interned: structurally equal requests yield the same
//! [`TypeId`], so handle equality is type equality. Size and alignment are
//! computed once at interning time following the WGSL memory layout rules.

use std::fmt;
use std::ops::Index;

use index_vec::IndexVec;
use rustc_hash::FxHashMap;

use crate::function::IoAttributes;
use crate::layout::{round_up, Layout};
use crate::TypeId;

/// Scalar element kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarKind {
    Bool,
    I32,
    U32,
    F32,
    F16,
}

impl ScalarKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::F32 => "f32",
            Self::F16 => "f16",
        }
    }

    /// Size in bytes
    pub const fn size(self) -> u32 {
        match self {
            Self::F16 => 2,
            Self::Bool | Self::I32 | Self::U32 | Self::F32 => 4,
        }
    }

    pub const fn is_integer(self) -> bool {
        matches!(self, Self::I32 | Self::U32)
    }

    pub const fn is_signed_integer(self) -> bool {
        matches!(self, Self::I32)
    }

    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F16)
    }

    /// Integers and floats
    pub const fn is_numeric(self) -> bool {
        !matches!(self, Self::Bool)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressSpace {
    Function,
    Private,
    Workgroup,
    Uniform,
    Storage,
    Handle,
}

impl AddressSpace {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Private => "private",
            Self::Workgroup => "workgroup",
            Self::Uniform => "uniform",
            Self::Storage => "storage",
            Self::Handle => "handle",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

impl Access {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::ReadWrite => "read_write",
        }
    }

    pub const fn is_readable(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    pub const fn is_writable(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    D1,
    D2,
    D2Array,
    D3,
    Cube,
    CubeArray,
}

impl TextureDimension {
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::D1 => "1d",
            Self::D2 => "2d",
            Self::D2Array => "2d_array",
            Self::D3 => "3d",
            Self::Cube => "cube",
            Self::CubeArray => "cube_array",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TexelFormat {
    Rgba8Unorm,
    Rgba8Snorm,
    Rgba8Uint,
    Rgba8Sint,
    Rgba16Float,
    R32Uint,
    R32Sint,
    R32Float,
    Rg32Float,
    Rgba32Float,
    Bgra8Unorm,
}

impl TexelFormat {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rgba8Unorm => "rgba8unorm",
            Self::Rgba8Snorm => "rgba8snorm",
            Self::Rgba8Uint => "rgba8uint",
            Self::Rgba8Sint => "rgba8sint",
            Self::Rgba16Float => "rgba16float",
            Self::R32Uint => "r32uint",
            Self::R32Sint => "r32sint",
            Self::R32Float => "r32float",
            Self::Rg32Float => "rg32float",
            Self::Rgba32Float => "rgba32float",
            Self::Bgra8Unorm => "bgra8unorm",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Sampled {
        dim: TextureDimension,
        sample_type: TypeId,
    },
    Multisampled {
        dim: TextureDimension,
        sample_type: TypeId,
    },
    Depth {
        dim: TextureDimension,
    },
    DepthMultisampled,
    Storage {
        dim: TextureDimension,
        format: TexelFormat,
        access: Access,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerKind {
    Sampler,
    Comparison,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayCount {
    Constant(u32),
    Runtime,
}

/// A laid-out struct member
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructMember {
    pub name: String,
    pub ty: TypeId,
    /// Shader IO attributes, set on entry point interface structs
    pub attributes: IoAttributes,
    pub index: u32,
    pub offset: u32,
    pub align: u32,
    pub size: u32,
}

/// A type in the IR
///
/// Composite types refer to their element types by handle, so a `Type` is only
/// meaningful together with the [`TypeManager`] that interned it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    Scalar(ScalarKind),
    Vector {
        element: TypeId,
        width: u32,
    },
    /// `matCxR<T>`: `columns` columns of type `vecR<T>`
    Matrix {
        column: TypeId,
        columns: u32,
        rows: u32,
    },
    Array {
        element: TypeId,
        count: ArrayCount,
        stride: u32,
    },
    Struct {
        name: String,
        members: Vec<StructMember>,
    },
    Pointer {
        space: AddressSpace,
        store: TypeId,
        access: Access,
    },
    Atomic {
        element: TypeId,
    },
    Sampler(SamplerKind),
    Texture(TextureKind),
}

#[derive(Debug, Clone)]
struct TypeEntry {
    ty: Type,
    layout: Layout,
}

/// Interns types and answers structural queries about them
#[derive(Debug, Clone, Default)]
pub struct TypeManager {
    types: IndexVec<TypeId, TypeEntry>,
    lookup: FxHashMap<Type, TypeId>,
}

impl TypeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the canonical handle for `ty`, interning it on first request.
    ///
    /// Panics if the request is incoherent (e.g. a vector of a non-scalar).
    pub fn get(&mut self, ty: Type) -> TypeId {
        if let Some(&id) = self.lookup.get(&ty) {
            return id;
        }
        self.check_coherent(&ty);
        let layout = Layout::of(self, &ty);
        let id = self.types.push(TypeEntry {
            ty: ty.clone(),
            layout,
        });
        self.lookup.insert(ty, id);
        id
    }

    /// Returns the handle for `ty` if it was already interned
    pub fn find(&self, ty: &Type) -> Option<TypeId> {
        self.lookup.get(ty).copied()
    }

    /// Number of distinct interned types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    // --- Convenience constructors ---

    pub fn void(&mut self) -> TypeId {
        self.get(Type::Void)
    }

    pub fn bool(&mut self) -> TypeId {
        self.scalar(ScalarKind::Bool)
    }

    pub fn i32(&mut self) -> TypeId {
        self.scalar(ScalarKind::I32)
    }

    pub fn u32(&mut self) -> TypeId {
        self.scalar(ScalarKind::U32)
    }

    pub fn f32(&mut self) -> TypeId {
        self.scalar(ScalarKind::F32)
    }

    pub fn f16(&mut self) -> TypeId {
        self.scalar(ScalarKind::F16)
    }

    pub fn scalar(&mut self, kind: ScalarKind) -> TypeId {
        self.get(Type::Scalar(kind))
    }

    pub fn vec(&mut self, element: TypeId, width: u32) -> TypeId {
        self.get(Type::Vector { element, width })
    }

    pub fn vec2(&mut self, element: TypeId) -> TypeId {
        self.vec(element, 2)
    }

    pub fn vec3(&mut self, element: TypeId) -> TypeId {
        self.vec(element, 3)
    }

    pub fn vec4(&mut self, element: TypeId) -> TypeId {
        self.vec(element, 4)
    }

    /// `matCxR<element>`
    pub fn mat(&mut self, element: TypeId, columns: u32, rows: u32) -> TypeId {
        let column = self.vec(element, rows);
        self.get(Type::Matrix {
            column,
            columns,
            rows,
        })
    }

    pub fn ptr(&mut self, space: AddressSpace, store: TypeId, access: Access) -> TypeId {
        self.get(Type::Pointer {
            space,
            store,
            access,
        })
    }

    pub fn array(&mut self, element: TypeId, count: u32) -> TypeId {
        let stride = self.stride_of(element);
        self.get(Type::Array {
            element,
            count: ArrayCount::Constant(count),
            stride,
        })
    }

    pub fn runtime_array(&mut self, element: TypeId) -> TypeId {
        let stride = self.stride_of(element);
        self.get(Type::Array {
            element,
            count: ArrayCount::Runtime,
            stride,
        })
    }

    /// Lays out `members` in declaration order and interns the struct
    pub fn structure<S: Into<String>>(
        &mut self,
        name: S,
        members: impl IntoIterator<Item = (String, TypeId)>,
    ) -> TypeId {
        let members = members
            .into_iter()
            .map(|(name, ty)| (name, ty, IoAttributes::default()));
        self.io_structure(name, members)
    }

    /// A struct whose members carry shader IO attributes
    pub fn io_structure<S: Into<String>>(
        &mut self,
        name: S,
        members: impl IntoIterator<Item = (String, TypeId, IoAttributes)>,
    ) -> TypeId {
        let mut offset = 0;
        let mut laid_out = Vec::new();
        for (index, (member_name, ty, attributes)) in members.into_iter().enumerate() {
            let align = self.align(ty);
            let size = self.size(ty);
            offset = round_up(align, offset);
            laid_out.push(StructMember {
                name: member_name,
                ty,
                attributes,
                index: index as u32,
                offset,
                align,
                size,
            });
            offset += size;
        }
        self.get(Type::Struct {
            name: name.into(),
            members: laid_out,
        })
    }

    pub fn atomic(&mut self, element: TypeId) -> TypeId {
        self.get(Type::Atomic { element })
    }

    pub fn sampler(&mut self, kind: SamplerKind) -> TypeId {
        self.get(Type::Sampler(kind))
    }

    pub fn texture(&mut self, kind: TextureKind) -> TypeId {
        self.get(Type::Texture(kind))
    }

    // --- Layout ---

    /// Size in bytes
    pub fn size(&self, id: TypeId) -> u32 {
        self.types[id].layout.size
    }

    /// Alignment in bytes
    pub fn align(&self, id: TypeId) -> u32 {
        self.types[id].layout.align
    }

    fn stride_of(&self, element: TypeId) -> u32 {
        round_up(self.align(element), self.size(element))
    }

    // --- Queries ---

    pub fn is_void(&self, id: TypeId) -> bool {
        matches!(self[id], Type::Void)
    }

    pub fn as_scalar(&self, id: TypeId) -> Option<ScalarKind> {
        match self[id] {
            Type::Scalar(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn is_scalar(&self, id: TypeId) -> bool {
        self.as_scalar(id).is_some()
    }

    pub fn is_vector(&self, id: TypeId) -> bool {
        matches!(self[id], Type::Vector { .. })
    }

    pub fn is_matrix(&self, id: TypeId) -> bool {
        matches!(self[id], Type::Matrix { .. })
    }

    pub fn is_pointer(&self, id: TypeId) -> bool {
        matches!(self[id], Type::Pointer { .. })
    }

    /// Element count of a vector, or `None`
    pub fn vector_width(&self, id: TypeId) -> Option<u32> {
        match self[id] {
            Type::Vector { width, .. } => Some(width),
            _ => None,
        }
    }

    /// The scalar at the bottom of a scalar, vector or matrix type
    pub fn scalar_of(&self, id: TypeId) -> Option<ScalarKind> {
        match self[id] {
            Type::Scalar(kind) => Some(kind),
            Type::Vector { element, .. } => self.scalar_of(element),
            Type::Matrix { column, .. } => self.scalar_of(column),
            _ => None,
        }
    }

    /// Scalar or vector of integers
    pub fn is_integer_scalar_or_vector(&self, id: TypeId) -> bool {
        !self.is_matrix(id) && self.scalar_of(id).is_some_and(ScalarKind::is_integer)
    }

    /// Scalar or vector of `bool`
    pub fn is_bool_scalar_or_vector(&self, id: TypeId) -> bool {
        !self.is_matrix(id) && self.scalar_of(id) == Some(ScalarKind::Bool)
    }

    /// Column vector type of a matrix
    pub fn column_type(&self, id: TypeId) -> Option<TypeId> {
        match self[id] {
            Type::Matrix { column, .. } => Some(column),
            _ => None,
        }
    }

    /// `(columns, rows)` of a matrix
    pub fn matrix_shape(&self, id: TypeId) -> Option<(u32, u32)> {
        match self[id] {
            Type::Matrix { columns, rows, .. } => Some((columns, rows)),
            _ => None,
        }
    }

    /// Store type of a pointer
    pub fn store_type(&self, id: TypeId) -> Option<TypeId> {
        match self[id] {
            Type::Pointer { store, .. } => Some(store),
            _ => None,
        }
    }

    /// Number of elements addressable by a dynamic index, `None` for runtime
    /// arrays and non-indexable types
    pub fn element_count(&self, id: TypeId) -> Option<u32> {
        match self[id] {
            Type::Vector { width, .. } => Some(width),
            Type::Matrix { columns, .. } => Some(columns),
            Type::Array {
                count: ArrayCount::Constant(count),
                ..
            } => Some(count),
            _ => None,
        }
    }

    pub fn is_runtime_array(&self, id: TypeId) -> bool {
        matches!(
            self[id],
            Type::Array {
                count: ArrayCount::Runtime,
                ..
            }
        )
    }

    /// Members of a struct type
    pub fn struct_members(&self, id: TypeId) -> Option<&[StructMember]> {
        match &self[id] {
            Type::Struct { members, .. } => Some(members),
            _ => None,
        }
    }

    /// Type obtained by indexing into `id` with `index`, `None` for a dynamic index.
    ///
    /// Returns `None` when the type cannot be indexed that way.
    pub fn indexed(&self, id: TypeId, index: Option<u32>) -> Option<TypeId> {
        match &self[id] {
            Type::Vector { element, width } => in_bounds(index, *width).then_some(*element),
            Type::Matrix {
                column, columns, ..
            } => in_bounds(index, *columns).then_some(*column),
            Type::Array { element, count, .. } => match count {
                ArrayCount::Constant(count) => in_bounds(index, *count).then_some(*element),
                ArrayCount::Runtime => Some(*element),
            },
            Type::Struct { members, .. } => members.get(index? as usize).map(|member| member.ty),
            _ => None,
        }
    }

    /// Can be stored in memory and used as an array or struct element
    pub fn is_sized(&self, id: TypeId) -> bool {
        match &self[id] {
            Type::Scalar(_) | Type::Vector { .. } | Type::Matrix { .. } | Type::Atomic { .. } => {
                true
            }
            Type::Array { count, .. } => matches!(count, ArrayCount::Constant(_)),
            Type::Struct { members, .. } => members.iter().all(|member| self.is_sized(member.ty)),
            Type::Void | Type::Pointer { .. } | Type::Sampler(_) | Type::Texture(_) => false,
        }
    }

    /// The WGSL spelling of a type, as printed by the disassembler
    pub fn name(&self, id: TypeId) -> String {
        TypeName { types: self, id }.to_string()
    }

    fn check_coherent(&self, ty: &Type) {
        match ty {
            Type::Void | Type::Scalar(_) | Type::Sampler(_) => {}
            Type::Vector { element, width } => {
                assert!(
                    self.is_scalar(*element),
                    "vector element must be a scalar, got {}",
                    self.name(*element)
                );
                assert!(
                    (2..=4).contains(width),
                    "vector width must be in 2..=4, got {width}"
                );
            }
            Type::Matrix {
                column,
                columns,
                rows,
            } => {
                assert!(
                    (2..=4).contains(columns) && (2..=4).contains(rows),
                    "matrix dimensions must be in 2..=4, got {columns}x{rows}"
                );
                assert!(
                    self.vector_width(*column) == Some(*rows)
                        && self.scalar_of(*column).is_some_and(ScalarKind::is_float),
                    "matrix column must be a float vector with {rows} rows, got {}",
                    self.name(*column)
                );
            }
            Type::Array { element, count, .. } => {
                assert!(
                    self.is_sized(*element),
                    "array element must be sized, got {}",
                    self.name(*element)
                );
                assert!(
                    *count != ArrayCount::Constant(0),
                    "array element count must be positive"
                );
            }
            Type::Struct { members, .. } => {
                assert!(!members.is_empty(), "struct must have at least one member");
                let last = members.len() - 1;
                for (i, member) in members.iter().enumerate() {
                    let runtime_tail = i == last && self.is_runtime_array(member.ty);
                    assert!(
                        runtime_tail || self.is_sized(member.ty),
                        "struct member '{}' must be sized, got {}",
                        member.name,
                        self.name(member.ty)
                    );
                }
            }
            Type::Pointer { store, .. } => {
                assert!(
                    !self.is_void(*store) && !self.is_pointer(*store),
                    "pointer store type must be a storable type, got {}",
                    self.name(*store)
                );
            }
            Type::Atomic { element } => {
                assert!(
                    self.as_scalar(*element).is_some_and(ScalarKind::is_integer),
                    "atomic element must be i32 or u32, got {}",
                    self.name(*element)
                );
            }
            Type::Texture(kind) => match kind {
                TextureKind::Sampled { sample_type, .. }
                | TextureKind::Multisampled { sample_type, .. } => {
                    assert!(
                        matches!(
                            self.as_scalar(*sample_type),
                            Some(ScalarKind::F32 | ScalarKind::I32 | ScalarKind::U32)
                        ),
                        "texture sample type must be f32, i32 or u32, got {}",
                        self.name(*sample_type)
                    );
                }
                TextureKind::Depth { .. }
                | TextureKind::DepthMultisampled
                | TextureKind::Storage { .. } => {}
            },
        }
    }
}

const fn in_bounds(index: Option<u32>, count: u32) -> bool {
    match index {
        Some(index) => index < count,
        None => true,
    }
}

impl Index<TypeId> for TypeManager {
    type Output = Type;

    fn index(&self, id: TypeId) -> &Type {
        &self.types[id].ty
    }
}

struct TypeName<'a> {
    types: &'a TypeManager,
    id: TypeId,
}

impl fmt::Display for TypeName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = |id| self.types.name(id);
        match &self.types[self.id] {
            Type::Void => write!(f, "void"),
            Type::Scalar(kind) => write!(f, "{}", kind.name()),
            Type::Vector { element, width } => write!(f, "vec{width}<{}>", name(*element)),
            Type::Matrix {
                column,
                columns,
                rows,
            } => {
                let element = self.types.indexed(*column, Some(0)).map_or_else(String::new, name);
                write!(f, "mat{columns}x{rows}<{element}>")
            }
            Type::Array { element, count, .. } => match count {
                ArrayCount::Constant(count) => write!(f, "array<{}, {count}>", name(*element)),
                ArrayCount::Runtime => write!(f, "array<{}>", name(*element)),
            },
            Type::Struct { name, .. } => write!(f, "{name}"),
            Type::Pointer {
                space,
                store,
                access,
            } => write!(
                f,
                "ptr<{}, {}, {}>",
                space.name(),
                name(*store),
                access.name()
            ),
            Type::Atomic { element } => write!(f, "atomic<{}>", name(*element)),
            Type::Sampler(SamplerKind::Sampler) => write!(f, "sampler"),
            Type::Sampler(SamplerKind::Comparison) => write!(f, "sampler_comparison"),
            Type::Texture(kind) => match kind {
                TextureKind::Sampled { dim, sample_type } => {
                    write!(f, "texture_{}<{}>", dim.suffix(), name(*sample_type))
                }
                TextureKind::Multisampled { dim, sample_type } => write!(
                    f,
                    "texture_multisampled_{}<{}>",
                    dim.suffix(),
                    name(*sample_type)
                ),
                TextureKind::Depth { dim } => write!(f, "texture_depth_{}", dim.suffix()),
                TextureKind::DepthMultisampled => write!(f, "texture_depth_multisampled_2d"),
                TextureKind::Storage {
                    dim,
                    format,
                    access,
                } => write!(
                    f,
                    "texture_storage_{}<{}, {}>",
                    dim.suffix(),
                    format.name(),
                    access.name()
                ),
            },
        }
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
