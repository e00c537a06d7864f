//! Disassembly of structured control flow

mod common;

use common::{assert_valid, empty_entry_point};
use tincture_compiler_ir::{
    disassemble, Access, AddressSpace, BinaryOp, Builder, Module, PipelineStage,
};
use tincture_test_utils::assert_golden;

#[test]
fn test_if_with_results() {
    let mut module = Module::new();
    let mut b = Builder::new(&mut module);
    let i32 = b.types().i32();
    let bool = b.types().bool();
    let f = b.function("foo", i32, None);
    let c = b.add_param(f, "c", bool);
    let body = b.function_body(f);
    b.append_to(body);

    let if_ = b.create_if(c, &[i32]);
    let i = *b.module().instruction(if_).as_if().unwrap();
    b.append_to(i.true_block);
    let one = b.i32(1);
    b.exit_if(if_, &[one]);
    b.append_to(i.false_block);
    let two = b.i32(2);
    b.exit_if(if_, &[two]);

    b.append_to(body);
    let result = b.module().instruction(if_).results()[0];
    b.return_(f, Some(result));

    assert_valid(&module);
    assert_golden("control_flow/if_with_results.ir", &disassemble(&module));
}

#[test]
fn test_counting_loop() {
    let mut module = Module::new();
    let mut b = Builder::new(&mut module);
    let i32 = b.types().i32();
    let f = b.function("foo", i32, None);
    let n = b.add_param(f, "n", i32);
    let body = b.function_body(f);
    b.append_to(body);

    let loop_ = b.create_loop(&[i32]);
    let l = *b.module().instruction(loop_).as_loop().unwrap();
    let counter = b.add_block_param(l.body, i32);
    let next = b.add_block_param(l.continuing, i32);

    b.append_to(l.initializer);
    let zero = b.i32(0);
    b.next_iteration(loop_, &[zero]);

    b.append_to(l.body);
    let done = b.binary(BinaryOp::Gte, counter, n);
    let if_ = b.create_if(done, &[]);
    let i = *b.module().instruction(if_).as_if().unwrap();
    b.append_to(i.true_block);
    b.exit_loop(loop_, &[counter]);
    b.append_to(i.false_block);
    b.exit_if(if_, &[]);
    b.append_to(l.body);
    let one = b.i32(1);
    let incremented = b.binary(BinaryOp::Add, counter, one);
    b.continue_to(loop_, &[incremented]);

    b.append_to(l.continuing);
    let never = b.bool(false);
    b.break_if(loop_, never, &[next], &[next]);

    b.append_to(body);
    let result = b.module().instruction(loop_).results()[0];
    b.return_(f, Some(result));

    assert_valid(&module);
    assert_golden("control_flow/counting_loop.ir", &disassemble(&module));
}

#[test]
fn test_switch_cases() {
    let mut module = Module::new();
    let mut b = Builder::new(&mut module);
    let void = b.types().void();
    let i32 = b.types().i32();
    let f = b.function("foo", void, None);
    let x = b.add_param(f, "x", i32);
    let body = b.function_body(f);
    b.append_to(body);

    let switch = b.create_switch(x, &[]);
    let one = b.i32(1);
    let two = b.i32(2);
    let case = b.add_case(switch, &[Some(one), Some(two)]);
    b.append_to(case);
    b.exit_switch(switch, &[]);
    let default = b.add_case(switch, &[None]);
    b.append_to(default);
    b.exit_switch(switch, &[]);

    b.append_to(body);
    b.return_(f, None);

    assert_valid(&module);
    assert_golden("control_flow/switch_cases.ir", &disassemble(&module));
}

#[test]
fn test_root_block_and_entry_point() {
    let mut module = Module::new();
    let mut b = Builder::new(&mut module);
    let u32 = b.types().u32();
    let ptr = b.types().ptr(AddressSpace::Private, u32, Access::ReadWrite);
    let root = b.module().root_block();
    b.append_to(root);
    let v = b.var("v", ptr, None);

    let void = b.types().void();
    let main = b.function(
        "main",
        void,
        Some(PipelineStage::Compute {
            workgroup_size: [1, 1, 1],
        }),
    );
    let body = b.function_body(main);
    b.append_to(body);
    b.load(v);
    b.return_(main, None);

    assert_valid(&module);
    insta::assert_snapshot!(disassemble(&module), @r"
%b1 = block {  # root
  %v:ptr<private, u32, read_write> = var
}

%main = @compute @workgroup_size(1, 1, 1) func():void -> %b2 {
  %b2 = block {
    %3:u32 = load %v
    ret
  }
}
");
}

#[test]
fn test_functions_print_in_creation_order() {
    let mut module = Module::new();
    empty_entry_point(&mut module, "first");
    empty_entry_point(&mut module, "second");
    let dump = disassemble(&module);
    let first = dump.find("%first").unwrap();
    let second = dump.find("%second").unwrap();
    assert!(first < second, "{dump}");
    assert!(dump.contains("-> %b2 {\n  %b2 = block {"), "{dump}");
}

#[test]
fn test_repeated_dumps_are_identical() {
    let mut module = Module::new();
    let mut b = Builder::new(&mut module);
    let f32 = b.types().f32();
    let f = b.function("foo", f32, None);
    let x = b.add_param(f, "x", f32);
    let body = b.function_body(f);
    b.append_to(body);
    let half = b.f32(0.5);
    let scaled = b.binary(BinaryOp::Mul, x, half);
    b.return_(f, Some(scaled));

    let first = disassemble(&module);
    assert_eq!(first, disassemble(&module));
    assert!(first.contains("%3:f32 = mul %x, 0.5f"), "{first}");
}
