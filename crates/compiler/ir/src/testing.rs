//! # Testing Utilities for the IR
//!
//! Small module factories shared by the unit tests.

use crate::function::PipelineStage;
use crate::ops::{self, BinaryOp};
use crate::passes::Transform;
use crate::{disassemble, validate, Builder, FunctionId, Module, TypeId};

/// `%foo = func(%arg1:lhs, %arg2:rhs)` returning `arg1 op arg2`
pub fn binary_function(module: &mut Module, op: BinaryOp, lhs: TypeId, rhs: TypeId) -> FunctionId {
    let result_ty = ops::binary_result_type(&mut module.types, op, lhs, rhs)
        .expect("operand types are incoherent for the operator");
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

/// [`binary_function`] over two `mat<columns>x<rows><f32>` operands
pub fn matrix_function(op: BinaryOp, columns: u32, rows: u32) -> (Module, FunctionId) {
    let mut module = Module::new();
    let f32 = module.types.f32();
    let mat = module.types.mat(f32, columns, rows);
    let f = binary_function(&mut module, op, mat, mat);
    (module, f)
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

/// Runs `pass`, checks the result validates and returns its disassembly
pub fn run_and_dump(pass: &mut impl Transform, module: &mut Module) -> String {
    pass.run(module);
    if let Err(err) = validate(module) {
        panic!("{} produced an invalid module: {err}\n{}", pass.name(), disassemble(module));
    }
    disassemble(module)
}
