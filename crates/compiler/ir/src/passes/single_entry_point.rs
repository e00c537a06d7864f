//! # Single Entry Point
//!
//! Strips a module down to one entry point: every function not reachable from
//! it through `call` is removed, other entry points included, and then every
//! module-scope variable left without a use.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;

use crate::instruction::InstructionKind;
use crate::module::Module;
use crate::passes::Transform;
use crate::{Builder, FunctionId};

#[derive(Debug, Clone)]
pub struct SingleEntryPoint {
    entry_point: String,
}

impl SingleEntryPoint {
    pub fn new(entry_point: impl Into<String>) -> Self {
        Self {
            entry_point: entry_point.into(),
        }
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }
}

/// The entry point called `name`, if the module has one
pub fn find_entry_point(module: &Module, name: &str) -> Option<FunctionId> {
    module
        .lookup_function(name)
        .filter(|f| module.function(*f).is_entry_point())
}

/// Functions reachable from `entry` through user calls, `entry` included
fn reachable_functions(module: &Module, entry: FunctionId) -> FxHashSet<FunctionId> {
    let mut reachable = FxHashSet::default();
    let mut queue = VecDeque::from([entry]);
    while let Some(function) = queue.pop_front() {
        if !reachable.insert(function) {
            continue;
        }
        for inst in module.walk_block(module.function(function).block()) {
            if let InstructionKind::UserCall(callee) = module.instruction(inst).kind() {
                if module.get_function(*callee).is_some() {
                    queue.push_back(*callee);
                }
            }
        }
    }
    reachable
}

impl Transform for SingleEntryPoint {
    /// Panics if the module has no entry point with the configured name
    fn run(&mut self, module: &mut Module) -> bool {
        let entry = find_entry_point(module, &self.entry_point)
            .unwrap_or_else(|| panic!("entry point '{}' not found", self.entry_point));
        let reachable = reachable_functions(module, entry);
        let unreachable: Vec<_> = module
            .functions()
            .map(|(id, _)| id)
            .filter(|id| !reachable.contains(id))
            .collect();

        let mut b = Builder::new(module);
        for &function in &unreachable {
            log::trace!("removing function '{}'", b.module().function(function).name());
            b.remove_function(function);
        }

        let root = b.module().root_block();
        let unused_vars: Vec<_> = b
            .module()
            .block(root)
            .instructions()
            .iter()
            .copied()
            .filter(|inst| {
                let data = b.module().instruction(*inst);
                matches!(data.kind(), InstructionKind::Var(_))
                    && data.results().iter().all(|r| !b.module().value(*r).is_used())
            })
            .collect();
        for &var in &unused_vars {
            b.remove(var);
        }

        !unreachable.is_empty() || !unused_vars.is_empty()
    }

    fn name(&self) -> &'static str {
        "SingleEntryPoint"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::PipelineStage;

    fn compute() -> Option<PipelineStage> {
        Some(PipelineStage::Compute {
            workgroup_size: [1, 1, 1],
        })
    }

    #[test]
    fn test_keeps_callees_of_the_entry_point() {
        let mut module = Module::new();
        let mut b = Builder::new(&mut module);
        let void = b.types().void();
        let helper = b.function("helper", void, None);
        let body = b.function_body(helper);
        b.append_to(body);
        b.return_(helper, None);

        let main = b.function("main", void, compute());
        let body = b.function_body(main);
        b.append_to(body);
        b.call(helper, &[]);
        b.return_(main, None);

        let other = b.function("other", void, compute());
        let body = b.function_body(other);
        b.append_to(body);
        b.return_(other, None);

        assert!(SingleEntryPoint::new("main").run(&mut module));
        let names: Vec<_> = module.functions().map(|(_, f)| f.name().to_string()).collect();
        assert_eq!(names, vec!["helper", "main"]);
        assert!(!SingleEntryPoint::new("main").run(&mut module));
    }

    #[test]
    #[should_panic(expected = "entry point 'missing' not found")]
    fn test_missing_entry_point_panics() {
        let mut module = Module::new();
        SingleEntryPoint::new("missing").run(&mut module);
    }
}
