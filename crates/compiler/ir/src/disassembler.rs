//! # Disassembler
//!
//! Renders a module in the canonical text form used by golden tests:
//!
//! ```text
//! %b1 = block {  # root
//!   %v:ptr<private, u32, read_write> = var
//! }
//!
//! %foo = func(%arg:u32):u32 -> %b2 {
//!   %b2 = block {
//!     %4:u32 = add %arg, 1u
//!     ret %4
//!   }
//! }
//! ```
//!
//! Values and functions share one id counter and blocks have their own. Ids
//! are handed out on first reference while printing, so the text depends only
//! on the module's structure and is identical across repeated dumps. Named
//! values print their name but still consume an id. Constants print as
//! literals and consume none.
//!
//! Value and function names share one namespace. A name already printed gets
//! the first free `_N` suffix (`%x`, `%x_1`), as does a purely numeric name, so
//! it can never read as an id.

use itertools::Itertools;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::block::BlockRole;
use crate::constant::{ConstantValue, Scalar};
use crate::control::CaseSelector;
use crate::instruction::{Instruction, InstructionKind};
use crate::module::Module;
use crate::types::Type;
use crate::value::ValueKind;
use crate::{indent_str, BlockId, ConstantId, FunctionId, InstId, ValueId};

/// Renders `module` as text
pub fn disassemble(module: &Module) -> String {
    let mut disassembler = Disassembler {
        module,
        out: String::new(),
        next_id: 1,
        value_ids: FxHashMap::default(),
        function_ids: FxHashMap::default(),
        names: FxHashSet::default(),
        next_block: 1,
        block_ids: FxHashMap::default(),
        construct_names: FxHashMap::default(),
        construct_counts: [0; 3],
    };
    disassembler.run();
    disassembler.out
}

struct Disassembler<'m> {
    module: &'m Module,
    out: String,
    next_id: usize,
    value_ids: FxHashMap<ValueId, String>,
    function_ids: FxHashMap<FunctionId, String>,
    /// Names handed out so far, without the `%`
    names: FxHashSet<String>,
    next_block: usize,
    block_ids: FxHashMap<BlockId, usize>,
    /// `if_N`, `loop_N`, `switch_N`
    construct_names: FxHashMap<InstId, String>,
    construct_counts: [usize; 3],
}

impl Disassembler<'_> {
    fn run(&mut self) {
        let module = self.module;
        let root = module.root_block();
        if !module.block(root).is_empty() {
            let id = self.block_id(root);
            self.line(0, &format!("%{id} = block {{  # root"));
            for &inst in module.block(root).instructions() {
                self.instruction(1, inst);
            }
            self.line(0, "}");
            self.out.push('\n');
        }
        for (id, _) in module.functions() {
            self.function(id);
        }
    }

    fn line(&mut self, indent: usize, text: &str) {
        self.out.push_str(&indent_str(indent));
        self.out.push_str(text);
        self.out.push('\n');
    }

    // --- Ids ---

    fn fresh_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn value_name(&mut self, value: ValueId) -> String {
        if let Some(name) = self.value_ids.get(&value) {
            return name.clone();
        }
        let module = self.module;
        let Some(data) = module.get_value(value) else {
            return "undef".to_string();
        };
        if let ValueKind::Constant(constant) = data.kind() {
            return self.constant(constant);
        }
        let id = self.fresh_id();
        let name = match data.name() {
            Some(name) if !name.is_empty() => format!("%{}", self.unique(name)),
            _ => format!("%{id}"),
        };
        self.value_ids.insert(value, name.clone());
        name
    }

    /// `%name:type`
    fn value_def(&mut self, value: ValueId) -> String {
        let name = self.value_name(value);
        match self.module.get_value(value) {
            Some(data) => format!("{name}:{}", self.module.types.name(data.ty())),
            None => name,
        }
    }

    fn function_name(&mut self, function: FunctionId) -> String {
        if let Some(name) = self.function_ids.get(&function) {
            return name.clone();
        }
        self.fresh_id();
        let module = self.module;
        let name = match module.get_function(function) {
            Some(data) => format!("%{}", self.unique(data.name())),
            None => "%undef_function".to_string(),
        };
        self.function_ids.insert(function, name.clone());
        name
    }

    fn unique(&mut self, name: &str) -> String {
        let numeric = name.bytes().all(|c| c.is_ascii_digit());
        if !numeric && self.names.insert(name.to_string()) {
            return name.to_string();
        }
        let mut suffix = 1;
        loop {
            let candidate = format!("{name}_{suffix}");
            if self.names.insert(candidate.clone()) {
                return candidate;
            }
            suffix += 1;
        }
    }

    fn block_id(&mut self, block: BlockId) -> String {
        let next = self.next_block;
        let id = *self.block_ids.entry(block).or_insert(next);
        if id == next {
            self.next_block += 1;
        }
        format!("b{id}")
    }

    fn construct_name(&mut self, inst: InstId) -> String {
        if let Some(name) = self.construct_names.get(&inst) {
            return name.clone();
        }
        let (slot, prefix) = match self.module.get_instruction(inst).map(Instruction::kind) {
            Some(InstructionKind::If(_)) => (0, "if"),
            Some(InstructionKind::Loop(_)) => (1, "loop"),
            Some(InstructionKind::Switch(_)) => (2, "switch"),
            _ => return "undef".to_string(),
        };
        self.construct_counts[slot] += 1;
        let name = format!("{prefix}_{}", self.construct_counts[slot]);
        self.construct_names.insert(inst, name.clone());
        name
    }

    // --- Constants ---

    fn constant(&self, id: ConstantId) -> String {
        let constant = &self.module.constants[id];
        let types = &self.module.types;
        let ty_name = types.name(constant.ty);
        match &constant.value {
            ConstantValue::Scalar(scalar) => scalar.to_string(),
            ConstantValue::Composite(elements) => {
                format!("{ty_name}({})", elements.iter().map(|e| self.constant(*e)).join(", "))
            }
            ConstantValue::Splat { element, .. } => {
                format!("{ty_name}({})", self.constant(*element))
            }
            ConstantValue::Zero => match (&types[constant.ty], types.scalar_of(constant.ty)) {
                (Type::Scalar(kind), _) => Scalar::zero(*kind).to_string(),
                (Type::Vector { .. }, Some(kind)) => format!("{ty_name}({})", Scalar::zero(kind)),
                _ => format!("{ty_name}()"),
            },
        }
    }

    // --- Functions and blocks ---

    fn function(&mut self, id: FunctionId) {
        let module = self.module;
        let function = module.function(id);
        let name = self.function_name(id);
        let params: Vec<_> = function
            .params()
            .iter()
            .enumerate()
            .map(|(index, &param)| {
                let def = self.value_def(param);
                let attributes = function.param_attributes(index);
                if attributes.is_empty() {
                    def
                } else {
                    format!("{def} {attributes}")
                }
            })
            .collect();

        let mut header = format!("{name} = ");
        if let Some(stage) = function.stage() {
            header.push_str(&format!("{stage} "));
        }
        header.push_str(&format!(
            "func({}):{}",
            params.join(", "),
            module.types.name(function.return_type())
        ));
        let return_attributes = function.return_attributes();
        if !return_attributes.is_empty() {
            header.push_str(&format!(" {return_attributes}"));
        }
        let body = self.block_id(function.block());
        header.push_str(&format!(" -> %{body} {{"));
        self.line(0, &header);
        self.block(1, function.block());
        self.line(0, "}");
    }

    fn block(&mut self, indent: usize, block: BlockId) {
        let module = self.module;
        let data = module.block(block);
        let id = self.block_id(block);
        let mut header = format!("%{id} = block");
        if !data.params().is_empty() {
            let params = data.params().iter().map(|p| self.value_def(*p)).join(", ");
            header.push_str(&format!(" ({params})"));
        }
        header.push_str(" {");
        match data.role() {
            BlockRole::FunctionBody => {}
            role => {
                if let Some(comment) = role.comment() {
                    header.push_str(&format!("  # {comment}"));
                }
            }
        }
        self.line(indent, &header);
        for &inst in data.instructions() {
            self.instruction(indent + 1, inst);
        }
        self.line(indent, "}");
    }

    // --- Instructions ---

    fn operand_list(&mut self, values: &[ValueId]) -> String {
        values.iter().map(|v| self.value_name(*v)).join(", ")
    }

    fn instruction(&mut self, indent: usize, inst: InstId) {
        let module = self.module;
        let Some(data) = module.get_instruction(inst) else {
            self.line(indent, "<removed instruction>");
            return;
        };
        match &data.kind {
            InstructionKind::If(_) | InstructionKind::Loop(_) | InstructionKind::Switch(_) => {
                self.construct(indent, inst, data);
                return;
            }
            _ => {}
        }

        let results: Vec<_> = data.results().iter().map(|r| self.value_def(*r)).collect();
        let mut text = String::new();
        if !results.is_empty() {
            text.push_str(&format!("{} = ", results.join(", ")));
        }
        text.push_str(data.kind.mnemonic());
        let body = self.instruction_body(data);
        if !body.is_empty() {
            text.push(' ');
            text.push_str(&body);
        }
        if let Some(target) = data.kind.branch_target() {
            if !matches!(
                data.kind,
                InstructionKind::NextIteration(_) | InstructionKind::Continue(_)
            ) {
                let construct = self.construct_name(target);
                text.push_str(&format!("  # {construct}"));
            }
        }
        self.line(indent, &text);
    }

    /// Everything after the mnemonic
    fn instruction_body(&mut self, data: &Instruction) -> String {
        let module = self.module;
        match &data.kind {
            InstructionKind::Swizzle(components) => {
                let object = self.operand_list(data.operands());
                let components: String = components
                    .iter()
                    .map(|c| ['x', 'y', 'z', 'w'].get(*c as usize).copied().unwrap_or('?'))
                    .collect();
                format!("{object}, {components}")
            }
            InstructionKind::Var(attributes) => {
                let mut body = self.operand_list(data.operands());
                if let Some((group, binding)) = attributes.binding_point {
                    if !body.is_empty() {
                        body.push(' ');
                    }
                    body.push_str(&format!("@binding_point({group}, {binding})"));
                }
                body
            }
            InstructionKind::UserCall(function) => {
                let mut body = self.function_name(*function);
                if !data.operands().is_empty() {
                    body.push_str(", ");
                    body.push_str(&self.operand_list(data.operands()));
                }
                body
            }
            InstructionKind::NextIteration(_) | InstructionKind::Continue(_) => {
                let destination = module.branch_destinations(&data.kind);
                let mut body = match destination.first() {
                    Some(block) => format!("%{}", self.block_id(*block)),
                    None => "%undef".to_string(),
                };
                if !data.operands().is_empty() {
                    body.push(' ');
                    body.push_str(&self.operand_list(data.operands()));
                }
                body
            }
            InstructionKind::BreakIf {
                next_iteration_args,
                ..
            } => {
                let operands = data.operands();
                let condition = self.operand_list(&operands[..1.min(operands.len())]);
                let args = data.branch_args();
                let split = (*next_iteration_args).min(args.len());
                let mut body = condition;
                if let Some(body_block) = module.branch_destinations(&data.kind).first() {
                    body.push_str(&format!(" %{}", self.block_id(*body_block)));
                }
                if split > 0 {
                    let next = self.operand_list(&args[..split]);
                    body.push_str(&format!(" next_iteration: [{next}]"));
                }
                if split < args.len() {
                    let exit = self.operand_list(&args[split..]);
                    body.push_str(&format!(" exit_loop: [{exit}]"));
                }
                body
            }
            _ => self.operand_list(data.operands()),
        }
    }

    fn construct(&mut self, indent: usize, inst: InstId, data: &Instruction) {
        let module = self.module;
        let name = self.construct_name(inst);
        let results: Vec<_> = data.results().iter().map(|r| self.value_def(*r)).collect();
        let mut text = String::new();
        if !results.is_empty() {
            text.push_str(&format!("{} = ", results.join(", ")));
        }
        text.push_str(data.kind.mnemonic());

        let mut blocks = Vec::new();
        match &data.kind {
            InstructionKind::If(i) => {
                let condition = self.operand_list(data.operands());
                let t = self.block_id(i.true_block);
                let mut labels = format!("t: %{t}");
                if !self.is_bare_exit(i.false_block) {
                    let f = self.block_id(i.false_block);
                    labels.push_str(&format!(", f: %{f}"));
                    blocks.extend([i.true_block, i.false_block]);
                } else {
                    blocks.push(i.true_block);
                }
                text.push_str(&format!(" {condition} [{labels}]"));
            }
            InstructionKind::Loop(l) => {
                let mut labels = Vec::new();
                if !module.block(l.initializer).is_empty() {
                    labels.push(format!("i: %{}", self.block_id(l.initializer)));
                    blocks.push(l.initializer);
                }
                labels.push(format!("b: %{}", self.block_id(l.body)));
                blocks.push(l.body);
                if !module.block(l.continuing).is_empty() {
                    labels.push(format!("c: %{}", self.block_id(l.continuing)));
                    blocks.push(l.continuing);
                }
                text.push_str(&format!(" [{}]", labels.join(", ")));
            }
            InstructionKind::Switch(s) => {
                let selector = self.operand_list(data.operands());
                let mut cases = Vec::with_capacity(s.cases.len());
                for case in &s.cases {
                    let selectors: Vec<_> = case
                        .selectors
                        .iter()
                        .map(|selector| match selector {
                            CaseSelector::Value(constant) => self.constant(*constant),
                            CaseSelector::Default => "default".to_string(),
                        })
                        .collect();
                    let block = self.block_id(case.block);
                    cases.push(format!("c: ({}, %{block})", selectors.join(" ")));
                    blocks.push(case.block);
                }
                text.push_str(&format!(" {selector} [{}]", cases.join(", ")));
            }
            _ => {}
        }
        text.push_str(&format!(" {{  # {name}"));
        self.line(indent, &text);
        for block in blocks {
            self.block(indent + 1, block);
        }
        self.line(indent, "}");
    }

    /// A false block holding only an `exit_if` without arguments
    fn is_bare_exit(&self, block: BlockId) -> bool {
        match self.module.block(block).instructions() {
            [only] => self.module.get_instruction(*only).is_some_and(|exit| {
                matches!(exit.kind, InstructionKind::ExitIf(_)) && exit.operands().is_empty()
            }),
            _ => false,
        }
    }
}
