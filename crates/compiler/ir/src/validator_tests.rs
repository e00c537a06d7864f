use super::*;
use crate::function::PipelineStage;
use crate::ops::BinaryOp;
use crate::testing::{binary_function, empty_entry_point};
use crate::Builder;

fn messages(module: &Module) -> Vec<String> {
    match validate(module) {
        Ok(()) => Vec::new(),
        Err(err) => err.failures.iter().map(ToString::to_string).collect(),
    }
}

fn assert_fails_with(module: &Module, needle: &str) {
    let messages = messages(module);
    assert!(
        messages.iter().any(|m| m.contains(needle)),
        "expected a failure containing '{needle}', got {messages:#?}"
    );
}

#[test]
fn test_well_formed_module_validates() {
    let mut module = Module::new();
    let u32 = module.types.u32();
    binary_function(&mut module, BinaryOp::Add, u32, u32);
    empty_entry_point(&mut module, "main");
    assert_eq!(validate(&module), Ok(()));
}

#[test]
fn test_control_flow_validates() {
    let mut module = Module::new();
    let mut b = Builder::new(&mut module);
    let i32 = b.types().i32();
    let f = b.function("f", i32, None);
    let x = b.add_param(f, "x", i32);
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
    let done = b.binary(BinaryOp::Gte, counter, x);
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

    assert_eq!(validate(&module), Ok(()), "{}", crate::disassemble(&module));
}

#[test]
fn test_missing_terminator() {
    let mut module = Module::new();
    let mut b = Builder::new(&mut module);
    let u32 = b.types().u32();
    let f = b.function("f", u32, None);
    let x = b.add_param(f, "x", u32);
    let body = b.function_body(f);
    b.append_to(body);
    b.binary(BinaryOp::Add, x, x);
    assert_fails_with(&module, "does not end in a terminator");
}

#[test]
fn test_empty_function_body() {
    let mut module = Module::new();
    let mut b = Builder::new(&mut module);
    let void = b.types().void();
    b.function("f", void, None);
    assert_fails_with(&module, "the function body is empty");
}

#[test]
fn test_instruction_after_terminator() {
    let mut module = Module::new();
    let f = empty_entry_point(&mut module, "main");
    let body = module.function(f).block();
    let mut b = Builder::new(&mut module);
    let inst = b.create_instruction(InstructionKind::Discard, &[], &[]);
    module.blocks[body].instructions.push(inst);
    module.instructions[inst].block = Some(body);
    assert_fails_with(&module, "ret in");
    assert_fails_with(&module, "does not end in a terminator");
}

#[test]
fn test_corrupt_use_list() {
    let mut module = Module::new();
    let u32 = module.types.u32();
    let f = binary_function(&mut module, BinaryOp::Mul, u32, u32);
    let arg1 = module.function(f).params()[0];
    module.values[arg1].uses.clear();
    assert_fails_with(&module, "operand 0 is missing from the use list");
}

#[test]
fn test_module_scope_let_rejected() {
    let mut module = Module::new();
    let mut b = Builder::new(&mut module);
    let root = b.module().root_block();
    b.append_to(root);
    let one = b.u32(1);
    b.let_("one", one);
    let failure = validate(&module).unwrap_err().failures.remove(0);
    assert_eq!(failure.location, "root block");
    assert!(failure.message.contains("let is not allowed at module scope"));
}

#[test]
fn test_function_space_var_at_module_scope() {
    let mut module = Module::new();
    let mut b = Builder::new(&mut module);
    let u32 = b.types().u32();
    let ptr = b.types().ptr(AddressSpace::Function, u32, crate::Access::ReadWrite);
    let root = b.module().root_block();
    b.append_to(root);
    b.var("v", ptr, None);
    assert_fails_with(&module, "module-scope var in the function address space");
}

#[test]
fn test_switch_needs_exactly_one_default() {
    let mut module = Module::new();
    let mut b = Builder::new(&mut module);
    let void = b.types().void();
    let i32 = b.types().i32();
    let f = b.function("f", void, None);
    let x = b.add_param(f, "x", i32);
    let body = b.function_body(f);
    b.append_to(body);
    let switch = b.create_switch(x, &[]);
    let one = b.i32(1);
    let case = b.add_case(switch, &[Some(one)]);
    b.append_to(case);
    b.exit_switch(switch, &[]);
    b.append_to(body);
    b.return_(f, None);
    assert_fails_with(&module, "has 0 default cases");
}

#[test]
fn test_duplicate_case_selector() {
    let mut module = Module::new();
    let mut b = Builder::new(&mut module);
    let void = b.types().void();
    let u32 = b.types().u32();
    let f = b.function("f", void, None);
    let x = b.add_param(f, "x", u32);
    let body = b.function_body(f);
    b.append_to(body);
    let switch = b.create_switch(x, &[]);
    let first = b.u32(3);
    let second = b.u32(3);
    let case = b.add_case(switch, &[Some(first), None]);
    b.append_to(case);
    b.exit_switch(switch, &[]);
    let case = b.add_case(switch, &[Some(second)]);
    b.append_to(case);
    b.exit_switch(switch, &[]);
    b.append_to(body);
    b.return_(f, None);
    assert_fails_with(&module, "duplicate case selector");
}

#[test]
fn test_exit_if_across_a_loop() {
    let mut module = Module::new();
    let mut b = Builder::new(&mut module);
    let void = b.types().void();
    let bool = b.types().bool();
    let f = b.function("f", void, None);
    let c = b.add_param(f, "c", bool);
    let body = b.function_body(f);
    b.append_to(body);
    let if_ = b.create_if(c, &[]);
    let i = *b.module().instruction(if_).as_if().unwrap();
    b.append_to(i.true_block);
    let loop_ = b.create_loop(&[]);
    let l = *b.module().instruction(loop_).as_loop().unwrap();
    b.append_to(l.body);
    b.exit_if(if_, &[]);
    b.append_to(i.true_block);
    b.exit_if(if_, &[]);
    b.append_to(i.false_block);
    b.exit_if(if_, &[]);
    b.append_to(body);
    b.return_(f, None);
    assert_fails_with(&module, "exit_if in loop body block jumps over a nested loop");
    assert!(
        messages(&module).iter().all(|m| !m.contains("Id(")),
        "{:#?}",
        messages(&module)
    );
}

#[test]
fn test_continue_from_switch_in_loop_body() {
    let mut module = Module::new();
    let mut b = Builder::new(&mut module);
    let void = b.types().void();
    let i32 = b.types().i32();
    let f = b.function("f", void, None);
    let x = b.add_param(f, "x", i32);
    let body = b.function_body(f);
    b.append_to(body);

    let loop_ = b.create_loop(&[]);
    let l = *b.module().instruction(loop_).as_loop().unwrap();
    b.append_to(l.body);
    let switch = b.create_switch(x, &[]);
    let default = b.add_case(switch, &[None]);
    b.append_to(default);
    b.continue_to(loop_, &[]);
    b.append_to(l.body);
    b.exit_loop(loop_, &[]);

    b.append_to(l.continuing);
    let never = b.bool(false);
    b.break_if(loop_, never, &[], &[]);

    b.append_to(body);
    b.return_(f, None);

    assert_eq!(validate(&module), Ok(()), "{}", crate::disassemble(&module));
}

#[test]
fn test_continue_across_an_inner_loop() {
    let mut module = Module::new();
    let mut b = Builder::new(&mut module);
    let void = b.types().void();
    let f = b.function("f", void, None);
    let body = b.function_body(f);
    b.append_to(body);

    let outer = b.create_loop(&[]);
    let o = *b.module().instruction(outer).as_loop().unwrap();
    b.append_to(o.body);
    let inner = b.create_loop(&[]);
    let i = *b.module().instruction(inner).as_loop().unwrap();
    b.append_to(i.body);
    b.continue_to(outer, &[]);
    b.append_to(o.body);
    b.exit_loop(outer, &[]);

    b.append_to(body);
    b.return_(f, None);

    assert_fails_with(&module, "continue in loop body block jumps over a nested loop");
}

#[test]
fn test_break_if_outside_continuing() {
    let mut module = Module::new();
    let mut b = Builder::new(&mut module);
    let void = b.types().void();
    let f = b.function("f", void, None);
    let body = b.function_body(f);
    b.append_to(body);
    let loop_ = b.create_loop(&[]);
    let l = *b.module().instruction(loop_).as_loop().unwrap();
    b.append_to(l.body);
    let yes = b.bool(true);
    b.break_if(loop_, yes, &[], &[]);
    b.append_to(body);
    b.return_(f, None);
    assert_fails_with(&module, "break_if");
    assert_fails_with(&module, "is not allowed in this block of the loop");
}

#[test]
fn test_dangling_call_after_function_removal() {
    let mut module = Module::new();
    let helper = empty_entry_point(&mut module, "helper");
    let mut b = Builder::new(&mut module);
    let void = b.types().void();
    let main = b.function("main", void, Some(PipelineStage::Fragment));
    let body = b.function_body(main);
    b.append_to(body);
    b.call(helper, &[]);
    b.return_(main, None);
    assert_eq!(validate(&module), Ok(()));

    Builder::new(&mut module).remove_function(helper);
    assert_fails_with(&module, "call to removed function");
}

#[test]
fn test_all_failures_are_reported() {
    let mut module = Module::new();
    let mut b = Builder::new(&mut module);
    let void = b.types().void();
    b.function("a", void, None);
    b.function("b", void, None);
    let err = validate(&module).unwrap_err();
    assert_eq!(err.failures.len(), 2);
    assert_eq!(err.failures[0].location, "function 'a'");
    assert_eq!(err.failures[1].location, "function 'b'");
    assert!(err.to_string().starts_with("module is invalid (2 failures)\n  function 'a': "));
}
