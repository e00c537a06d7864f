use super::*;

#[test]
fn test_interning_returns_same_handle() {
    let mut types = TypeManager::new();
    let f32 = types.f32();
    let a = types.vec3(f32);
    let b = types.get(Type::Vector {
        element: f32,
        width: 3,
    });
    assert_eq!(a, b);

    let m1 = types.mat(f32, 2, 3);
    let m2 = types.mat(f32, 2, 3);
    let m3 = types.mat(f32, 3, 2);
    assert_eq!(m1, m2);
    assert_ne!(m1, m3);
}

#[test]
fn test_distinct_structs_by_name() {
    let mut types = TypeManager::new();
    let u32 = types.u32();
    let a = types.structure("A", [("x".to_string(), u32)]);
    let b = types.structure("B", [("x".to_string(), u32)]);
    let a2 = types.structure("A", [("x".to_string(), u32)]);
    assert_ne!(a, b);
    assert_eq!(a, a2);
}

#[test]
fn test_scalar_and_vector_layout() {
    let mut types = TypeManager::new();
    let f32 = types.f32();
    let f16 = types.f16();
    let v2 = types.vec2(f32);
    let v3 = types.vec3(f32);
    let v4 = types.vec4(f32);
    let h3 = types.vec3(f16);

    assert_eq!((types.size(f32), types.align(f32)), (4, 4));
    assert_eq!((types.size(f16), types.align(f16)), (2, 2));
    assert_eq!((types.size(v2), types.align(v2)), (8, 8));
    assert_eq!((types.size(v3), types.align(v3)), (12, 16));
    assert_eq!((types.size(v4), types.align(v4)), (16, 16));
    assert_eq!((types.size(h3), types.align(h3)), (6, 8));
}

#[test]
fn test_matrix_layout() {
    let mut types = TypeManager::new();
    let f32 = types.f32();
    let f16 = types.f16();
    let m2x3 = types.mat(f32, 2, 3);
    let m4x2 = types.mat(f32, 4, 2);
    let h3x3 = types.mat(f16, 3, 3);

    assert_eq!((types.size(m2x3), types.align(m2x3)), (32, 16));
    assert_eq!((types.size(m4x2), types.align(m4x2)), (32, 8));
    assert_eq!((types.size(h3x3), types.align(h3x3)), (24, 8));
}

#[test]
fn test_array_and_struct_layout() {
    let mut types = TypeManager::new();
    let f32 = types.f32();
    let u32 = types.u32();
    let v3 = types.vec3(f32);

    let arr = types.array(v3, 4);
    assert_eq!((types.size(arr), types.align(arr)), (64, 16));
    let runtime = types.runtime_array(u32);
    assert_eq!((types.size(runtime), types.align(runtime)), (4, 4));

    let s = types.structure(
        "S",
        [
            ("a".to_string(), u32),
            ("b".to_string(), v3),
            ("c".to_string(), f32),
        ],
    );
    let Type::Struct { members, .. } = &types[s] else {
        panic!("expected struct");
    };
    let offsets: Vec<_> = members.iter().map(|m| m.offset).collect();
    assert_eq!(offsets, vec![0, 16, 28]);
    assert_eq!((types.size(s), types.align(s)), (32, 16));
}

#[test]
fn test_handle_types_have_no_layout() {
    let mut types = TypeManager::new();
    let f32 = types.f32();
    let ptr = types.ptr(AddressSpace::Private, f32, Access::ReadWrite);
    let sampler = types.sampler(SamplerKind::Sampler);
    let void = types.void();
    for ty in [ptr, sampler, void] {
        assert_eq!((types.size(ty), types.align(ty)), (0, 0));
    }
}

#[test]
fn test_type_names() {
    let mut types = TypeManager::new();
    let f32 = types.f32();
    let u32 = types.u32();
    let i32 = types.i32();
    let m = types.mat(f32, 2, 3);
    let ptr = types.ptr(AddressSpace::Private, u32, Access::ReadWrite);
    let arr = types.array(f32, 4);
    let rt = types.runtime_array(i32);
    let atomic = types.atomic(u32);
    let tex = types.texture(TextureKind::Sampled {
        dim: TextureDimension::D2,
        sample_type: f32,
    });
    let storage = types.texture(TextureKind::Storage {
        dim: TextureDimension::D2,
        format: TexelFormat::Rgba8Unorm,
        access: Access::Write,
    });

    assert_eq!(types.name(m), "mat2x3<f32>");
    assert_eq!(types.name(ptr), "ptr<private, u32, read_write>");
    assert_eq!(types.name(arr), "array<f32, 4>");
    assert_eq!(types.name(rt), "array<i32>");
    assert_eq!(types.name(atomic), "atomic<u32>");
    assert_eq!(types.name(tex), "texture_2d<f32>");
    assert_eq!(types.name(storage), "texture_storage_2d<rgba8unorm, write>");
}

#[test]
fn test_indexed_types() {
    let mut types = TypeManager::new();
    let f32 = types.f32();
    let v3 = types.vec3(f32);
    let m = types.mat(f32, 4, 3);
    let arr = types.array(m, 2);

    assert_eq!(types.indexed(arr, None), Some(m));
    assert_eq!(types.indexed(arr, Some(2)), None);
    assert_eq!(types.indexed(m, Some(3)), Some(v3));
    assert_eq!(types.indexed(v3, Some(2)), Some(f32));
    assert_eq!(types.indexed(f32, Some(0)), None);
    assert_eq!(types.element_count(m), Some(4));
}

#[test]
#[should_panic(expected = "atomic element must be i32 or u32")]
fn test_atomic_of_float_panics() {
    let mut types = TypeManager::new();
    let f32 = types.f32();
    types.atomic(f32);
}

#[test]
#[should_panic(expected = "vector width must be in 2..=4")]
fn test_vector_width_out_of_range_panics() {
    let mut types = TypeManager::new();
    let f32 = types.f32();
    types.vec(f32, 5);
}

#[test]
#[should_panic(expected = "matrix column must be a float vector")]
fn test_integer_matrix_panics() {
    let mut types = TypeManager::new();
    let i32 = types.i32();
    types.mat(i32, 2, 2);
}

#[test]
#[should_panic(expected = "vector element must be a scalar")]
fn test_vector_of_vector_panics() {
    let mut types = TypeManager::new();
    let f32 = types.f32();
    let v2 = types.vec2(f32);
    types.vec(v2, 2);
}
