//! Module factories shared by the integration tests

#![allow(dead_code)]

use tincture_compiler_ir::ops::binary_result_type;
use tincture_compiler_ir::{
    disassemble, validate, BinaryOp, Builder, FunctionId, Module, PipelineStage, Transform,
    TypeId,
};

/// `%foo = func(%arg1:lhs, %arg2:rhs)` returning `arg1 op arg2`
pub fn binary_function(module: &mut Module, op: BinaryOp, lhs: TypeId, rhs: TypeId) -> FunctionId {
    let result_ty = binary_result_type(&mut module.types, op, lhs, rhs)
        .unwrap_or_else(|| panic!("{} is not defined on these operands", op.name()));
    let mut b = Builder::new(module);
    let f = b.function("foo", result_ty, None);
    let arg1 = b.add_param(f, "arg1", lhs);
    let arg2 = b.add_param(f, "arg2", rhs);
    let body = b.function_body(f);
    b.append_to(body);
    let result = b.binary(op, arg1, arg2);
    b.return_(f, Some(result));
    f
}

/// `%foo = func(%arg:from):to` returning `convert(arg)`
pub fn convert_function(module: &mut Module, from: TypeId, to: TypeId) -> FunctionId {
    let mut b = Builder::new(module);
    let f = b.function("foo", to, None);
    let arg = b.add_param(f, "arg", from);
    let body = b.function_body(f);
    b.append_to(body);
    let result = b.convert(to, arg);
    b.return_(f, Some(result));
    f
}

/// An empty `@compute @workgroup_size(1, 1, 1)` entry point
pub fn empty_entry_point(module: &mut Module, name: &str) -> FunctionId {
    let mut b = Builder::new(module);
    let void = b.types().void();
    let f = b.function(
        name,
        void,
        Some(PipelineStage::Compute {
            workgroup_size: [1, 1, 1],
        }),
    );
    let body = b.function_body(f);
    b.append_to(body);
    b.return_(f, None);
    f
}

/// Validates `module`, panicking with its disassembly on failure
pub fn assert_valid(module: &Module) {
    if let Err(err) = validate(module) {
        panic!("{err}\n{}", disassemble(module));
    }
}

/// Runs `pass` and returns whether it changed the module together with the
/// disassembly of the result
pub fn run(pass: &mut impl Transform, module: &mut Module) -> (bool, String) {
    assert_valid(module);
    let changed = pass.run(module);
    assert_valid(module);
    (changed, disassemble(module))
}
