//! # IR Validator
//!
//! Structural checks over a whole module. The builder already rejects most
//! malformed single operations; the validator checks what only holds once a
//! module is complete:
//!
//! - every block ends in exactly one terminator (empty loop initializer and
//!   continuing blocks are absent and allowed)
//! - operand and result use lists agree with the instructions
//! - blocks are owned by the construct that names them
//! - exits are nested in the construct they name, pass arguments matching the
//!   target parameters, and are registered in the target's inbound branches
//! - calls and returns match the function signatures
//!
//! All failures are collected; validation never stops at the first one.

use rustc_hash::FxHashSet;

use crate::arena::Slots;
use crate::block::BlockRole;
use crate::constant::ConstantManager;
use crate::control::CaseSelector;
use crate::error::{ValidationError, ValidationFailure};
use crate::function::Function;
use crate::instruction::{Instruction, InstructionKind};
use crate::module::Module;
use crate::ops;
use crate::types::{AddressSpace, ScalarKind, Type, TypeManager};
use crate::value::{Usage, ValueData, ValueKind};
use crate::{BlockId, FunctionId, InstId, TypeId, ValueId};

/// The module state an operation signature is checked against
pub(crate) struct OperationContext<'a> {
    pub types: &'a mut TypeManager,
    pub constants: &'a ConstantManager,
    pub values: &'a Slots<ValueId, ValueData>,
    pub functions: &'a Slots<FunctionId, Function>,
}

fn value_type(values: &Slots<ValueId, ValueData>, value: ValueId) -> Result<TypeId, String> {
    values
        .get(value)
        .map(ValueData::ty)
        .ok_or_else(|| "uses a removed value".to_string())
}

fn arity(inst: &Instruction, operands: usize, results: usize) -> Result<(), String> {
    if inst.operands.len() != operands {
        return Err(format!(
            "expected {operands} operands, got {}",
            inst.operands.len()
        ));
    }
    if inst.results.len() != results {
        return Err(format!(
            "expected {results} results, got {}",
            inst.results.len()
        ));
    }
    Ok(())
}

fn expect_type(types: &TypeManager, deduced: Option<TypeId>, result: TypeId) -> Result<(), String> {
    match deduced {
        Some(ty) if ty == result => Ok(()),
        Some(ty) => Err(format!(
            "result type {} does not match the deduced type {}",
            types.name(result),
            types.name(ty)
        )),
        None => Err("incoherent operand types".to_string()),
    }
}

/// Checks the operand and result types of `inst` against its kind's signature
pub(crate) fn check_operation(
    cx: &mut OperationContext<'_>,
    inst: &Instruction,
) -> Result<(), String> {
    let operand_types = inst
        .operands
        .iter()
        .map(|v| value_type(cx.values, *v))
        .collect::<Result<Vec<_>, _>>()?;
    let result_types = inst
        .results
        .iter()
        .map(|v| value_type(cx.values, *v))
        .collect::<Result<Vec<_>, _>>()?;
    let types = &mut *cx.types;

    match &inst.kind {
        InstructionKind::Binary(op) => {
            arity(inst, 2, 1)?;
            let deduced =
                ops::binary_result_type(types, *op, operand_types[0], operand_types[1]);
            expect_type(types, deduced, result_types[0])
        }
        InstructionKind::Unary(op) => {
            arity(inst, 1, 1)?;
            let deduced = ops::unary_result_type(types, *op, operand_types[0]);
            expect_type(types, deduced, result_types[0])
        }
        InstructionKind::Access => {
            if inst.operands.len() < 2 || inst.results.len() != 1 {
                return Err("access takes an object, at least one index and one result".into());
            }
            let mut indices = Vec::with_capacity(inst.operands.len() - 1);
            for (&index, &ty) in inst.operands[1..].iter().zip(&operand_types[1..]) {
                if !matches!(types.as_scalar(ty), Some(ScalarKind::I32 | ScalarKind::U32)) {
                    return Err(format!("index of type {} is not i32 or u32", types.name(ty)));
                }
                let scalar = cx.values[index]
                    .constant()
                    .and_then(|id| cx.constants.as_scalar(id));
                indices.push(ops::constant_index(scalar));
            }
            let deduced = ops::access_result_type(types, operand_types[0], &indices);
            expect_type(types, deduced, result_types[0])
        }
        InstructionKind::Swizzle(components) => {
            arity(inst, 1, 1)?;
            let deduced = ops::swizzle_result_type(types, operand_types[0], components);
            expect_type(types, deduced, result_types[0])
        }
        InstructionKind::Construct => {
            if inst.results.len() != 1 {
                return Err("construct produces one result".into());
            }
            if ops::is_valid_construct(types, result_types[0], &operand_types) {
                Ok(())
            } else {
                Err(format!(
                    "arguments do not construct {}",
                    types.name(result_types[0])
                ))
            }
        }
        InstructionKind::Convert | InstructionKind::Bitcast => {
            arity(inst, 1, 1)?;
            let (from, to) = (operand_types[0], result_types[0]);
            let ok = if matches!(inst.kind, InstructionKind::Convert) {
                ops::is_valid_conversion(types, from, to)
            } else {
                ops::is_valid_bitcast(types, from, to)
            };
            if ok {
                Ok(())
            } else {
                Err(format!(
                    "cannot {} {} to {}",
                    inst.kind.mnemonic(),
                    types.name(from),
                    types.name(to)
                ))
            }
        }
        InstructionKind::Let => {
            arity(inst, 1, 1)?;
            expect_type(types, Some(operand_types[0]), result_types[0])
        }
        InstructionKind::Var(_) => {
            if inst.operands.len() > 1 || inst.results.len() != 1 {
                return Err("var takes an optional initializer and one result".into());
            }
            let Some(store) = types.store_type(result_types[0]) else {
                return Err(format!(
                    "var result {} is not a pointer",
                    types.name(result_types[0])
                ));
            };
            match operand_types.first() {
                Some(&init) if init != store => Err(format!(
                    "initializer of type {} does not match the store type {}",
                    types.name(init),
                    types.name(store)
                )),
                _ => Ok(()),
            }
        }
        InstructionKind::Load => {
            arity(inst, 1, 1)?;
            match types[operand_types[0]] {
                Type::Pointer { store, access, .. } => {
                    if !access.is_readable() {
                        return Err("load from a write-only pointer".into());
                    }
                    expect_type(types, Some(store), result_types[0])
                }
                _ => Err("load from a non-pointer".into()),
            }
        }
        InstructionKind::Store => {
            arity(inst, 2, 0)?;
            match types[operand_types[0]] {
                Type::Pointer { store, access, .. } => {
                    if !access.is_writable() {
                        return Err("store to a read-only pointer".into());
                    }
                    if store != operand_types[1] {
                        return Err(format!(
                            "stored value of type {} does not match the store type {}",
                            types.name(operand_types[1]),
                            types.name(store)
                        ));
                    }
                    Ok(())
                }
                _ => Err("store to a non-pointer".into()),
            }
        }
        InstructionKind::UserCall(function) => {
            let Some(callee) = cx.functions.get(*function) else {
                return Err("call to removed function".to_string());
            };
            let param_types = callee
                .params
                .iter()
                .map(|p| value_type(cx.values, *p))
                .collect::<Result<Vec<_>, _>>()?;
            if param_types != operand_types {
                return Err(format!(
                    "arguments do not match the signature of '{}'",
                    callee.name
                ));
            }
            let expected: &[TypeId] = if types.is_void(callee.return_type) {
                &[]
            } else {
                std::slice::from_ref(&callee.return_type)
            };
            if result_types != expected {
                return Err(format!(
                    "results do not match the return type of '{}'",
                    callee.name
                ));
            }
            Ok(())
        }
        InstructionKind::BuiltinCall(func) => {
            if inst.results.len() != 1 {
                return Err(format!("{} produces one result", func.name()));
            }
            let deduced = ops::builtin_result_type(types, *func, &operand_types);
            expect_type(types, deduced, result_types[0])
        }
        InstructionKind::Discard | InstructionKind::Unreachable => arity(inst, 0, 0),
        InstructionKind::Spirv(op) => {
            arity(inst, 2, 1)?;
            let deduced = ops::spirv_result_type(types, *op, operand_types[0], operand_types[1]);
            expect_type(types, deduced, result_types[0])
        }
        InstructionKind::If(_) => {
            if inst.operands.len() != 1 || types.as_scalar(operand_types[0]) != Some(ScalarKind::Bool)
            {
                return Err("if condition must be a single bool".into());
            }
            Ok(())
        }
        InstructionKind::Loop(_) => arity(inst, 0, inst.results.len()),
        InstructionKind::Switch(_) => {
            let selector = operand_types.first().and_then(|ty| types.as_scalar(*ty));
            if inst.operands.len() != 1
                || !matches!(selector, Some(ScalarKind::I32 | ScalarKind::U32))
            {
                return Err("switch selector must be a single i32 or u32".into());
            }
            Ok(())
        }
        InstructionKind::Return(function) => {
            arity(inst, inst.operands.len(), 0)?;
            let Some(callee) = cx.functions.get(*function) else {
                return Err("return from removed function".to_string());
            };
            let expected: &[TypeId] = if types.is_void(callee.return_type) {
                &[]
            } else {
                std::slice::from_ref(&callee.return_type)
            };
            if operand_types != expected {
                return Err(format!(
                    "return value does not match the return type {}",
                    types.name(callee.return_type)
                ));
            }
            Ok(())
        }
        InstructionKind::BreakIf { .. } => {
            if operand_types.first().and_then(|ty| types.as_scalar(*ty)) != Some(ScalarKind::Bool)
            {
                return Err("break_if condition must be a bool".into());
            }
            arity(inst, inst.operands.len(), 0)
        }
        InstructionKind::ExitIf(_)
        | InstructionKind::ExitLoop(_)
        | InstructionKind::ExitSwitch(_)
        | InstructionKind::NextIteration(_)
        | InstructionKind::Continue(_) => arity(inst, inst.operands.len(), 0),
    }
}

/// Validates the structure of `module`, reporting every failure found
pub fn validate(module: &Module) -> Result<(), ValidationError> {
    let mut validator = Validator {
        module,
        types: module.types.clone(),
        failures: Vec::new(),
        location: String::new(),
        function: None,
        stack: Vec::new(),
    };
    validator.run();
    if validator.failures.is_empty() {
        Ok(())
    } else {
        Err(ValidationError {
            failures: validator.failures,
        })
    }
}

struct Validator<'m> {
    module: &'m Module,
    /// Scratch copy; deductions may intern types the module never uses
    types: TypeManager,
    failures: Vec<ValidationFailure>,
    location: String,
    function: Option<FunctionId>,
    /// Enclosing constructs with the owned block entered, innermost last
    stack: Vec<(InstId, BlockId)>,
}

impl Validator<'_> {
    fn fail(&mut self, message: impl Into<String>) {
        self.failures.push(ValidationFailure {
            location: self.location.clone(),
            message: message.into(),
        });
    }

    fn run(&mut self) {
        let module = self.module;
        self.location = "root block".to_string();
        self.check_root();
        let functions: Vec<_> = module.functions().map(|(id, _)| id).collect();
        for function in functions {
            self.check_function(function);
        }
    }

    fn check_root(&mut self) {
        let module = self.module;
        let root = module.root_block();
        for &inst in module.block(root).instructions() {
            let Some(data) = module.get_instruction(inst) else {
                self.fail("a removed instruction is still listed");
                continue;
            };
            self.check_instruction(root, inst, data);
            let InstructionKind::Var(_) = data.kind else {
                self.fail(format!("{} is not allowed at module scope", data.kind.mnemonic()));
                continue;
            };
            let space = data
                .result()
                .map(|v| module.type_of(v))
                .map(|ty| &module.types[ty]);
            if let Some(Type::Pointer {
                space: AddressSpace::Function,
                ..
            }) = space
            {
                self.fail("module-scope var in the function address space");
            }
        }
    }

    fn check_function(&mut self, id: FunctionId) {
        let module = self.module;
        let function = module.function(id);
        self.location = format!("function '{}'", function.name());
        self.function = Some(id);

        for (index, &param) in function.params().iter().enumerate() {
            match module.get_value(param).map(ValueData::kind) {
                Some(ValueKind::FunctionParam { function: f, index: i }) if f == id && i == index => {}
                Some(_) => self.fail(format!("parameter {index} is not owned by this function")),
                None => self.fail(format!("parameter {index} was removed")),
            }
        }

        let body = function.block();
        match module.get_block(body) {
            Some(block) if block.role() == BlockRole::FunctionBody && block.function() == Some(id) => {
                self.check_block(body);
            }
            Some(_) => self.fail("body block is not a function body of this function"),
            None => self.fail("body block was removed"),
        }
        self.function = None;
    }

    fn check_block(&mut self, block: BlockId) {
        let module = self.module;
        let data = module.block(block);
        let count = data.instructions().len();
        if count == 0 {
            if !matches!(data.role(), BlockRole::Initializer | BlockRole::Continuing) {
                self.fail(format!("{} is empty", self.block_name(block)));
            }
            return;
        }
        for (position, &inst) in data.instructions().iter().enumerate() {
            let Some(inst_data) = module.get_instruction(inst) else {
                self.fail(format!(
                    "a removed instruction is still listed in {}",
                    self.block_name(block)
                ));
                continue;
            };
            let last = position + 1 == count;
            if inst_data.is_terminator() && !last {
                self.fail(format!(
                    "{} in {} is followed by more instructions",
                    inst_data.kind.mnemonic(),
                    self.block_name(block)
                ));
            }
            if last && !inst_data.is_terminator() {
                self.fail(format!("{} does not end in a terminator", self.block_name(block)));
            }
            self.check_instruction(block, inst, inst_data);
        }
    }

    /// `the function body`, or `<construct> <role> block`
    fn block_name(&self, block: BlockId) -> String {
        let module = self.module;
        let Some(data) = module.get_block(block) else {
            return "a removed block".to_string();
        };
        let role = data.role().comment().unwrap_or("function");
        match data.role() {
            BlockRole::Root => "the root block".to_string(),
            BlockRole::FunctionBody => "the function body".to_string(),
            _ => match data.parent().and_then(|p| module.get_instruction(p)) {
                Some(parent) => format!("{} {role} block", parent.kind.mnemonic()),
                None => format!("a detached {role} block"),
            },
        }
    }

    /// `<mnemonic> in <block>`, naming `inst` the way a reader of the
    /// disassembly finds it
    fn describe(&self, data: &Instruction) -> String {
        match data.block() {
            Some(block) => format!("{} in {}", data.kind.mnemonic(), self.block_name(block)),
            None => format!("detached {}", data.kind.mnemonic()),
        }
    }

    fn check_instruction(&mut self, block: BlockId, inst: InstId, data: &Instruction) {
        let module = self.module;
        if data.block() != Some(block) {
            self.fail(format!(
                "{} in {} does not point back at its block",
                data.kind.mnemonic(),
                self.block_name(block)
            ));
        }
        let desc = self.describe(data);

        let mut cx = OperationContext {
            types: &mut self.types,
            constants: &module.constants,
            values: &module.values,
            functions: &module.functions,
        };
        if let Err(err) = check_operation(&mut cx, data) {
            self.fail(format!("{desc}: {err}"));
        }

        self.check_uses(inst, data, &desc);

        match &data.kind {
            InstructionKind::If(_) | InstructionKind::Loop(_) | InstructionKind::Switch(_) => {
                self.check_construct(inst, data, &desc);
            }
            InstructionKind::Return(function) => {
                if Some(*function) != self.function {
                    self.fail(format!("{desc} returns from another function"));
                }
            }
            kind if kind.branch_target().is_some() => self.check_branch(block, inst, data, &desc),
            _ => {}
        }
    }

    fn check_uses(&mut self, inst: InstId, data: &Instruction, desc: &str) {
        let module = self.module;
        for (index, &operand) in data.operands().iter().enumerate() {
            let Some(value) = module.get_value(operand) else {
                continue;
            };
            if !value.uses().contains(&Usage::new(inst, index)) {
                self.fail(format!("{desc}: operand {index} is missing from the use list"));
            }
            match value.kind() {
                ValueKind::InstructionResult { instruction, .. } => {
                    let placed = self
                        .module
                        .get_instruction(instruction)
                        .is_some_and(|producer| producer.block().is_some());
                    if !placed {
                        self.fail(format!(
                            "{desc}: operand {index} is produced by an instruction that is not in a block"
                        ));
                    }
                }
                ValueKind::BlockParam { block, .. } => {
                    if module.get_block(block).is_none() {
                        self.fail(format!(
                            "{desc}: operand {index} is a parameter of a removed block"
                        ));
                    }
                }
                ValueKind::FunctionParam { function, .. } => {
                    if Some(function) != self.function {
                        self.fail(format!(
                            "{desc}: operand {index} is a parameter of another function"
                        ));
                    }
                }
                ValueKind::Constant(_) => {}
            }
        }
        for (index, &result) in data.results().iter().enumerate() {
            let expected = ValueKind::InstructionResult {
                instruction: inst,
                index,
            };
            if module.get_value(result).map(ValueData::kind) != Some(expected) {
                self.fail(format!("{desc}: result {index} is not owned by the instruction"));
            }
        }
    }

    fn check_construct(&mut self, inst: InstId, data: &Instruction, desc: &str) {
        let module = self.module;
        let expected_roles: &[BlockRole] = match &data.kind {
            InstructionKind::If(_) => &[BlockRole::True, BlockRole::False],
            InstructionKind::Loop(_) => {
                &[BlockRole::Initializer, BlockRole::Body, BlockRole::Continuing]
            }
            _ => &[],
        };
        let owned = data.kind.owned_blocks();

        if let Some(merge) = data.kind.merge_block() {
            match module.get_block(merge) {
                Some(block) => {
                    if block.role() != BlockRole::Merge || block.parent() != Some(inst) {
                        self.fail(format!("{desc}: merge block is not owned by it"));
                    }
                    if block.params() != data.results() {
                        self.fail(format!(
                            "{desc}: merge block parameters differ from its results"
                        ));
                    }
                    if !block.is_empty() {
                        self.fail(format!("{desc}: merge block holds instructions"));
                    }
                    self.check_inbound(merge);
                }
                None => self.fail(format!("{desc}: merge block was removed")),
            }
        }

        if let InstructionKind::Switch(switch) = &data.kind {
            let defaults = switch.cases.iter().filter(|case| case.is_default()).count();
            if defaults != 1 {
                self.fail(format!(
                    "{desc} has {defaults} default cases, expected exactly one"
                ));
            }
            let selector_ty = data.operand(0).map(|v| module.type_of(v));
            let mut seen = FxHashSet::default();
            for selector in switch.cases.iter().flat_map(|case| &case.selectors) {
                let CaseSelector::Value(constant) = selector else {
                    continue;
                };
                if Some(module.constants[*constant].ty) != selector_ty {
                    self.fail(format!(
                        "{desc}: case selector type differs from the selector"
                    ));
                }
                if !seen.insert(*constant) {
                    self.fail(format!("{desc}: duplicate case selector"));
                }
            }
        }

        for (position, &block) in owned.iter().enumerate() {
            let Some(block_data) = module.get_block(block) else {
                self.fail(format!("{desc}: owned block {position} was removed"));
                continue;
            };
            let role = expected_roles.get(position).copied().unwrap_or(BlockRole::Case);
            if block_data.role() != role || block_data.parent() != Some(inst) {
                self.fail(format!(
                    "{desc}: owned block {position} is not its {} block",
                    role.comment().unwrap_or("function")
                ));
            }
            if block_data.is_multi_in() {
                self.check_inbound(block);
            }
            self.stack.push((inst, block));
            self.check_block(block);
            self.stack.pop();
        }
    }

    fn check_inbound(&mut self, block: BlockId) {
        let module = self.module;
        for &branch in module.block(block).inbound_branches() {
            let branch = module.get_instruction(branch);
            let registered =
                branch.is_some_and(|b| module.branch_destinations(&b.kind).contains(&block));
            if !registered {
                let name = branch.map_or("removed instruction", |b| b.kind.mnemonic());
                self.fail(format!(
                    "{} lists a {name} as an inbound branch but it does not branch there",
                    self.block_name(block)
                ));
            }
        }
    }

    fn check_branch(&mut self, block: BlockId, inst: InstId, data: &Instruction, desc: &str) {
        let module = self.module;
        let Some(target) = data.kind.branch_target() else {
            return;
        };
        let Some(construct) = module.get_instruction(target) else {
            self.fail(format!("{desc} targets a removed construct"));
            return;
        };

        let kind_matches = match (&data.kind, &construct.kind) {
            (InstructionKind::ExitIf(_), InstructionKind::If(_))
            | (InstructionKind::ExitSwitch(_), InstructionKind::Switch(_))
            | (
                InstructionKind::ExitLoop(_)
                | InstructionKind::NextIteration(_)
                | InstructionKind::Continue(_)
                | InstructionKind::BreakIf { .. },
                InstructionKind::Loop(_),
            ) => true,
            _ => false,
        };
        if !kind_matches {
            self.fail(format!("{desc} targets a {}", construct.kind.mnemonic()));
            return;
        }

        // Exits may leave nested ifs; continue and exit_loop may also leave
        // nested switches
        let Some(depth) = self.stack.iter().rposition(|(c, _)| *c == target) else {
            self.fail(format!("{desc} is not nested in the construct it names"));
            return;
        };
        let entered = self.stack[depth].1;
        let leaves_switches = matches!(
            data.kind,
            InstructionKind::Continue(_) | InstructionKind::ExitLoop(_)
        );
        let crossed = self.stack[depth + 1..].iter().find_map(|(c, _)| {
            match module.instruction(*c).kind {
                InstructionKind::If(_) => None,
                InstructionKind::Switch(_) if leaves_switches => None,
                ref kind => Some(kind.mnemonic()),
            }
        });
        if let Some(crossed) = crossed {
            self.fail(format!("{desc} jumps over a nested {crossed}"));
        }

        if let Some(l) = construct.as_loop() {
            let placement_ok = match &data.kind {
                InstructionKind::NextIteration(_) => {
                    block == l.initializer || block == l.continuing
                }
                InstructionKind::BreakIf { .. } => block == l.continuing,
                InstructionKind::Continue(_) | InstructionKind::ExitLoop(_) => entered == l.body,
                _ => true,
            };
            if !placement_ok {
                self.fail(format!("{desc} is not allowed in this block of the loop"));
            }
        }

        let destinations = module.branch_destinations(&data.kind);
        let args = data.branch_args();
        let mut arg_groups: Vec<&[ValueId]> = Vec::with_capacity(2);
        match data.kind {
            InstructionKind::BreakIf {
                next_iteration_args,
                ..
            } => {
                let split = next_iteration_args.min(args.len());
                arg_groups.push(&args[..split]);
                arg_groups.push(&args[split..]);
            }
            _ => arg_groups.push(args),
        }
        for (destination, args) in destinations.iter().zip(arg_groups) {
            let target_block = module.block(*destination);
            let param_types: Vec<_> = target_block
                .params()
                .iter()
                .map(|p| module.type_of(*p))
                .collect();
            let arg_types: Vec<_> = args
                .iter()
                .filter_map(|a| module.get_value(*a).map(ValueData::ty))
                .collect();
            if param_types != arg_types {
                self.fail(format!(
                    "{desc} passes {} arguments but {} takes {}",
                    args.len(),
                    self.block_name(*destination),
                    param_types.len()
                ));
            }
            if !target_block.inbound_branches().contains(&inst) {
                self.fail(format!(
                    "{desc} is missing from the inbound branches of {}",
                    self.block_name(*destination)
                ));
            }
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;

