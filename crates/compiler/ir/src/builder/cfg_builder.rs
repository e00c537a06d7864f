//! # Control Flow Builder
//!
//! Structured control constructs and the terminators that leave them.
//!
//! `create_if`, `create_loop` and `create_switch` allocate the construct with
//! every block it owns and place it at the cursor; callers then fill the
//! blocks. Branches register themselves in the inbound registry of the
//! multi-in block they enter and are checked against its parameters.

use super::{Builder, InsertionPoint};
use crate::block::BlockRole;
use crate::control::{Case, CaseSelector, If, Loop, Switch};
use crate::instruction::InstructionKind;
use crate::value::{ValueData, ValueKind};
use crate::{BlockId, FunctionId, InstId, TypeId, ValueId};

impl Builder<'_> {
    // --- Constructs ---

    /// Creates an `if` on `condition` whose merge block yields `result_types`
    pub fn create_if(&mut self, condition: ValueId, result_types: &[TypeId]) -> InstId {
        let true_block = self.alloc_block(BlockRole::True, None);
        let false_block = self.alloc_block(BlockRole::False, None);
        let merge = self.alloc_block(BlockRole::Merge, None);
        let kind = InstructionKind::If(If {
            true_block,
            false_block,
            merge,
        });
        let inst = self.create_instruction(kind, &[condition], result_types);
        self.adopt(inst, &[true_block, false_block], merge);
        self.place(inst);
        inst
    }

    /// Creates a `loop` whose merge block yields `result_types`. The
    /// initializer and continuing blocks start out empty.
    pub fn create_loop(&mut self, result_types: &[TypeId]) -> InstId {
        let initializer = self.alloc_block(BlockRole::Initializer, None);
        let body = self.alloc_block(BlockRole::Body, None);
        let continuing = self.alloc_block(BlockRole::Continuing, None);
        let merge = self.alloc_block(BlockRole::Merge, None);
        let kind = InstructionKind::Loop(Loop {
            initializer,
            body,
            continuing,
            merge,
        });
        let inst = self.create_instruction(kind, &[], result_types);
        self.adopt(inst, &[initializer, body, continuing], merge);
        self.place(inst);
        inst
    }

    /// Creates a `switch` on `selector` with no cases yet
    pub fn create_switch(&mut self, selector: ValueId, result_types: &[TypeId]) -> InstId {
        let merge = self.alloc_block(BlockRole::Merge, None);
        let kind = InstructionKind::Switch(Switch {
            cases: Vec::new(),
            merge,
        });
        let inst = self.create_instruction(kind, &[selector], result_types);
        self.adopt(inst, &[], merge);
        self.place(inst);
        inst
    }

    /// Appends a case to `switch` and returns its block. Each selector is a
    /// constant value, or `None` for `default`.
    pub fn add_case(&mut self, switch: InstId, selectors: &[Option<ValueId>]) -> BlockId {
        let selectors: Vec<_> = selectors
            .iter()
            .map(|selector| match selector {
                Some(value) => CaseSelector::Value(
                    self.module.values[*value]
                        .constant()
                        .unwrap_or_else(|| panic!("case selector {value:?} is not a constant")),
                ),
                None => CaseSelector::Default,
            })
            .collect();
        let block = self.alloc_block(BlockRole::Case, Some(switch));
        match &mut self.module.instructions[switch].kind {
            InstructionKind::Switch(s) => s.cases.push(Case { selectors, block }),
            other => panic!("cannot add a case to {}", other.mnemonic()),
        }
        block
    }

    /// Adds a parameter to a loop body or continuing block
    pub fn add_block_param(&mut self, block: BlockId, ty: TypeId) -> ValueId {
        let role = self.module.blocks[block].role;
        assert!(
            matches!(role, BlockRole::Body | BlockRole::Continuing),
            "block parameters can only be added to loop body and continuing blocks, got a {role:?} block"
        );
        let index = self.module.blocks[block].params.len();
        let param = self
            .module
            .values
            .alloc(ValueData::new(ty, ValueKind::BlockParam { block, index }));
        self.module.blocks[block].params.push(param);
        param
    }

    fn adopt(&mut self, inst: InstId, owned: &[BlockId], merge: BlockId) {
        for &block in owned {
            self.module.blocks[block].parent = Some(inst);
        }
        let results = self.module.instructions[inst].results.to_vec();
        let merge_block = &mut self.module.blocks[merge];
        merge_block.parent = Some(inst);
        merge_block.params = results;
    }

    // --- Branches ---

    /// Terminates `block` with the branch entering the multi-in block `target`.
    ///
    /// The branch kind follows from the target: a merge block is left with the
    /// exit of its construct, a loop body is entered with `next_iteration` and
    /// a continuing block with `continue`. Panics if `block` already has a
    /// terminator or if `args` do not match the target's parameters.
    pub fn branch(&mut self, block: BlockId, target: BlockId, args: &[ValueId]) -> InstId {
        let target_data = &self.module.blocks[target];
        let role = target_data.role;
        assert!(
            role.is_multi_in(),
            "branch target must be a multi-in block, got a {role:?} block"
        );
        let owner = target_data
            .parent
            .unwrap_or_else(|| panic!("branch target {target:?} has no owning construct"));
        let kind = match (role, &self.module.instructions[owner].kind) {
            (BlockRole::Merge, InstructionKind::If(_)) => InstructionKind::ExitIf(owner),
            (BlockRole::Merge, InstructionKind::Loop(_)) => InstructionKind::ExitLoop(owner),
            (BlockRole::Merge, InstructionKind::Switch(_)) => InstructionKind::ExitSwitch(owner),
            (BlockRole::Body, _) => InstructionKind::NextIteration(owner),
            (BlockRole::Continuing, _) => InstructionKind::Continue(owner),
            (_, other) => panic!("merge block owned by {}", other.mnemonic()),
        };
        self.check_branch_args(kind.mnemonic(), target, args);
        let inst = self.create_instruction(kind, args, &[]);
        self.append(block, inst);
        self.module.blocks[target].add_inbound_branch(inst);
        inst
    }

    /// `exit_if` from the cursor block, passing `args` to the if's results
    pub fn exit_if(&mut self, if_: InstId, args: &[ValueId]) -> InstId {
        let merge = match self.module.instructions[if_].as_if() {
            Some(i) => i.merge,
            None => panic!("exit_if must name an if instruction"),
        };
        let block = self.cursor_block("exit_if");
        self.branch(block, merge, args)
    }

    /// `exit_loop` from the cursor block, passing `args` to the loop's results
    pub fn exit_loop(&mut self, loop_: InstId, args: &[ValueId]) -> InstId {
        let merge = self.loop_blocks(loop_, "exit_loop").merge;
        let block = self.cursor_block("exit_loop");
        self.branch(block, merge, args)
    }

    /// `exit_switch` from the cursor block, passing `args` to the switch's results
    pub fn exit_switch(&mut self, switch: InstId, args: &[ValueId]) -> InstId {
        let merge = match self.module.instructions[switch].as_switch() {
            Some(s) => s.merge,
            None => panic!("exit_switch must name a switch instruction"),
        };
        let block = self.cursor_block("exit_switch");
        self.branch(block, merge, args)
    }

    /// `next_iteration` from the cursor block into the loop body
    pub fn next_iteration(&mut self, loop_: InstId, args: &[ValueId]) -> InstId {
        let body = self.loop_blocks(loop_, "next_iteration").body;
        let block = self.cursor_block("next_iteration");
        self.branch(block, body, args)
    }

    /// `continue` from the cursor block into the loop's continuing block
    pub fn continue_to(&mut self, loop_: InstId, args: &[ValueId]) -> InstId {
        let continuing = self.loop_blocks(loop_, "continue").continuing;
        let block = self.cursor_block("continue");
        self.branch(block, continuing, args)
    }

    /// `break_if` at the end of the cursor block: exits `loop_` with
    /// `exit_args` when `condition` holds, otherwise starts the next iteration
    /// with `next_iteration_args`
    pub fn break_if(
        &mut self,
        loop_: InstId,
        condition: ValueId,
        next_iteration_args: &[ValueId],
        exit_args: &[ValueId],
    ) -> InstId {
        let blocks = self.loop_blocks(loop_, "break_if");
        let block = self.cursor_block("break_if");
        self.check_branch_args("break_if", blocks.body, next_iteration_args);
        self.check_branch_args("break_if", blocks.merge, exit_args);

        let mut operands = Vec::with_capacity(1 + next_iteration_args.len() + exit_args.len());
        operands.push(condition);
        operands.extend_from_slice(next_iteration_args);
        operands.extend_from_slice(exit_args);
        let kind = InstructionKind::BreakIf {
            target: loop_,
            next_iteration_args: next_iteration_args.len(),
        };
        let inst = self.create_instruction(kind, &operands, &[]);
        self.append(block, inst);
        self.module.blocks[blocks.body].add_inbound_branch(inst);
        self.module.blocks[blocks.merge].add_inbound_branch(inst);
        inst
    }

    /// `ret` at the end of the cursor block.
    ///
    /// Panics if `value` does not match the function's return type.
    pub fn return_(&mut self, function: FunctionId, value: Option<ValueId>) -> InstId {
        let block = self.cursor_block("ret");
        let return_type = self.module.functions[function].return_type;
        match value {
            Some(value) => {
                let ty = self.type_of(value);
                assert!(
                    ty == return_type,
                    "ret value has type {} but the function returns {}",
                    self.module.types.name(ty),
                    self.module.types.name(return_type)
                );
            }
            None => assert!(
                self.module.types.is_void(return_type),
                "ret without a value in a function returning {}",
                self.module.types.name(return_type)
            ),
        }
        let operands: Vec<_> = value.into_iter().collect();
        let inst = self.create_instruction(InstructionKind::Return(function), &operands, &[]);
        self.append(block, inst);
        inst
    }

    /// `unreachable` at the end of the cursor block
    pub fn unreachable(&mut self) -> InstId {
        let block = self.cursor_block("unreachable");
        let inst = self.create_instruction(InstructionKind::Unreachable, &[], &[]);
        self.append(block, inst);
        inst
    }

    fn cursor_block(&self, what: &str) -> BlockId {
        match self.cursor {
            InsertionPoint::AppendTo(block) => block,
            other => panic!("{what} needs the cursor at the end of a block, got {other:?}"),
        }
    }

    fn loop_blocks(&self, loop_: InstId, what: &str) -> Loop {
        match self.module.instructions[loop_].as_loop() {
            Some(l) => *l,
            None => panic!("{what} must name a loop instruction"),
        }
    }

    fn check_branch_args(&self, what: &str, target: BlockId, args: &[ValueId]) {
        let params = &self.module.blocks[target].params;
        assert!(
            params.len() == args.len(),
            "{what} passes {} arguments but the target block takes {}",
            args.len(),
            params.len()
        );
        for (index, (&arg, &param)) in args.iter().zip(params).enumerate() {
            let (arg_ty, param_ty) = (self.type_of(arg), self.type_of(param));
            assert!(
                arg_ty == param_ty,
                "{what} argument {index} has type {} but the target parameter has type {}",
                self.module.types.name(arg_ty),
                self.module.types.name(param_ty)
            );
        }
    }
}
