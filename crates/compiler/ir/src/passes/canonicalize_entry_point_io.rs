//! # Canonicalize Entry Point IO
//!
//! HLSL, MSL and GLSL read shader inputs and write shader outputs through
//! structs whose members carry the IO attributes. This pass moves the
//! attributes of every entry point that still has them onto such structs.
//!
//! ```text
//! %main = @fragment func(%coord:vec4<f32> [@position], %uv:vec2<f32> [@location(0)]):vec4<f32> [@location(0)]
//! ```
//!
//! becomes an ordinary `%main_inner` with the original body and signature, and
//! a new `%main` entry point that unpacks its `main_in` parameter, calls
//! `%main_inner` and packs the result into `main_out`:
//!
//! ```text
//! %main = @fragment func(%in:main_in):main_out -> %b2 {
//!   %b2 = block {
//!     %6:vec4<f32> = access %in, 0u
//!     %7:vec2<f32> = access %in, 1u
//!     %8:vec4<f32> = call %main_inner, %6, %7
//!     %9:main_out = construct %8
//!     ret %9
//!   }
//! }
//! ```
//!
//! With [`BuiltinStyle::Parameter`] builtin inputs stay separate parameters of
//! the wrapper. Parameters that are already structs pass through unchanged.
//! Fragment shaders fold a fixed sample mask into their `sample_mask` output,
//! adding one if they have none.

use crate::function::{BuiltinValue, Function, IoAttributes, PipelineStage};
use crate::module::Module;
use crate::ops::BinaryOp;
use crate::passes::Transform;
use crate::{Builder, FunctionId, TypeId, ValueId};

/// How builtin inputs reach the wrapper entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BuiltinStyle {
    /// Separate parameters, as MSL declares them
    Parameter,
    /// Members of the input struct
    #[default]
    StructMember,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPointIoConfig {
    pub builtin_style: BuiltinStyle,
    /// Combined into the sample mask of every fragment shader; `u32::MAX`
    /// leaves the masks alone
    pub fixed_sample_mask: u32,
}

impl Default for EntryPointIoConfig {
    fn default() -> Self {
        Self {
            builtin_style: BuiltinStyle::default(),
            fixed_sample_mask: u32::MAX,
        }
    }
}

#[derive(Debug, Default)]
pub struct CanonicalizeEntryPointIo {
    config: EntryPointIoConfig,
}

impl CanonicalizeEntryPointIo {
    pub const fn new(config: EntryPointIoConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &EntryPointIoConfig {
        &self.config
    }

    /// Whether a parameter of type `ty` is kept as a parameter of the wrapper
    fn stays_parameter(&self, module: &Module, ty: TypeId, attributes: IoAttributes) -> bool {
        if attributes.is_empty() {
            return module.types.struct_members(ty).is_some();
        }
        self.config.builtin_style == BuiltinStyle::Parameter
            && attributes.builtin.is_some()
            && attributes.location.is_none()
    }

    fn needs_sample_mask(&self, stage: Option<PipelineStage>) -> bool {
        stage == Some(PipelineStage::Fragment) && self.config.fixed_sample_mask != u32::MAX
    }

    /// Whether the return value of `function` is already an IO struct, or
    /// nothing when no output is needed
    fn has_canonical_output(&self, module: &Module, function: &Function) -> bool {
        let needs_mask = self.needs_sample_mask(function.stage());
        let ty = function.return_type();
        if module.types.is_void(ty) {
            return !needs_mask;
        }
        if !function.return_attributes().is_empty() {
            return false;
        }
        module.types.struct_members(ty).is_some_and(|members| {
            !needs_mask
                || members
                    .iter()
                    .any(|m| m.attributes.builtin == Some(BuiltinValue::SampleMask))
        })
    }

    fn is_canonical(&self, module: &Module, function: &Function) -> bool {
        let params_ok = function.params().iter().enumerate().all(|(index, &param)| {
            self.stays_parameter(module, module.type_of(param), function.param_attributes(index))
        });
        params_ok && self.has_canonical_output(module, function)
    }

    fn wrap(&self, b: &mut Builder<'_>, inner: FunctionId) {
        let function = b.module().function(inner).clone();
        let name = function.name().to_string();
        let canonical_output = self.has_canonical_output(b.module(), &function);

        let inner_name = unused_function_name(b.module(), &format!("{name}_inner"));
        b.rename_function(inner, inner_name);
        b.set_stage(inner, None);
        b.set_return_attributes(inner, IoAttributes::default());

        // Each original parameter is either a wrapper parameter or a member
        // of the input struct
        let mut separate = Vec::new();
        let mut members = Vec::new();
        for (index, &param) in function.params().iter().enumerate() {
            let ty = b.type_of(param);
            let attributes = function.param_attributes(index);
            b.set_param_attributes(param, IoAttributes::default());
            if self.stays_parameter(b.module(), ty, attributes) {
                separate.push(index);
            } else {
                let member = b
                    .module()
                    .value(param)
                    .name()
                    .map_or_else(|| format!("param{index}"), str::to_string);
                members.push((index, member, ty, attributes));
            }
        }

        let ty = function.return_type();
        let return_attributes = function.return_attributes();
        let needs_mask = self.needs_sample_mask(function.stage());
        let mut outputs = Vec::new();
        if !canonical_output {
            if !b.module().types.is_void(ty) {
                outputs.push((output_name(return_attributes), ty, return_attributes));
            }
            let has_mask = return_attributes.builtin == Some(BuiltinValue::SampleMask);
            if needs_mask && !has_mask {
                let u32 = b.types().u32();
                outputs.push((
                    "sample_mask".to_string(),
                    u32,
                    IoAttributes::builtin(BuiltinValue::SampleMask),
                ));
            }
        }

        let input_ty = (!members.is_empty()).then(|| {
            let fields = members
                .iter()
                .map(|(_, member, ty, attributes)| (member.clone(), *ty, *attributes));
            b.types().io_structure(format!("{name}_in"), fields)
        });
        let return_ty = if canonical_output {
            ty
        } else if outputs.is_empty() {
            b.types().void()
        } else {
            b.types().io_structure(format!("{name}_out"), outputs)
        };

        let wrapper = b.function(name.as_str(), return_ty, function.stage());
        let input = input_ty.map(|ty| b.add_param(wrapper, "in", ty));
        let mut args: Vec<Option<ValueId>> = vec![None; function.params().len()];
        for index in separate {
            let param = function.params()[index];
            let ty = b.type_of(param);
            let param_name = b.module().value(param).name().unwrap_or("param").to_string();
            let forwarded = b.add_param(wrapper, param_name, ty);
            b.set_param_attributes(forwarded, function.param_attributes(index));
            args[index] = Some(forwarded);
        }

        let body = b.function_body(wrapper);
        b.append_to(body);
        if let Some(input) = input {
            for (position, (index, ..)) in members.iter().enumerate() {
                let position = b.u32(position as u32);
                args[*index] = Some(b.access(input, &[position]));
            }
        }
        let args: Vec<ValueId> = args.into_iter().flatten().collect();
        let call = b.call(inner, &args);
        let result = b.module().instruction(call).result();

        if canonical_output {
            b.return_(wrapper, result);
        } else if b.module().types.is_void(return_ty) {
            b.return_(wrapper, None);
        } else {
            let mut values: Vec<ValueId> = result.into_iter().collect();
            if needs_mask {
                let mask = b.u32(self.config.fixed_sample_mask);
                match return_attributes.builtin {
                    Some(BuiltinValue::SampleMask) => {
                        values[0] = b.binary(BinaryOp::And, values[0], mask);
                    }
                    _ => values.push(mask),
                }
            }
            let output = b.construct(return_ty, &values);
            b.return_(wrapper, Some(output));
        }
        log::trace!("wrapped entry point '{name}'");
    }
}

impl Transform for CanonicalizeEntryPointIo {
    fn run(&mut self, module: &mut Module) -> bool {
        let worklist: Vec<_> = module
            .entry_points()
            .filter(|(_, function)| !self.is_canonical(module, function))
            .map(|(id, _)| id)
            .collect();
        if worklist.is_empty() {
            return false;
        }

        let mut b = Builder::new(module);
        for function in worklist {
            self.wrap(&mut b, function);
        }
        true
    }

    fn name(&self) -> &'static str {
        "CanonicalizeEntryPointIo"
    }
}

/// Member name of an output: the builtin, or `location<N>`
fn output_name(attributes: IoAttributes) -> String {
    match (attributes.builtin, attributes.location) {
        (Some(builtin), _) => builtin.name().to_string(),
        (None, Some(location)) => format!("location{location}"),
        (None, None) => "value".to_string(),
    }
}

/// `base`, or `base_N` for the first `N` no function is named yet
fn unused_function_name(module: &Module, base: &str) -> String {
    if module.lookup_function(base).is_none() {
        return base.to_string();
    }
    (1..)
        .map(|suffix| format!("{base}_{suffix}"))
        .find(|name| module.lookup_function(name).is_none())
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{empty_entry_point, run_and_dump};

    /// `@fragment main(coord [@position], uv [@location(0)]) -> [@location(0)]`
    /// returning `coord`
    fn fragment_shader(module: &mut Module) -> FunctionId {
        let mut b = Builder::new(module);
        let f32 = b.types().f32();
        let vec4 = b.types().vec4(f32);
        let vec2 = b.types().vec(f32, 2);
        let main = b.function("main", vec4, Some(PipelineStage::Fragment));
        let coord = b.add_param(main, "coord", vec4);
        b.set_param_attributes(coord, IoAttributes::builtin(BuiltinValue::Position));
        let uv = b.add_param(main, "uv", vec2);
        b.set_param_attributes(uv, IoAttributes::location(0));
        b.set_return_attributes(main, IoAttributes::location(0));
        let body = b.function_body(main);
        b.append_to(body);
        b.return_(main, Some(coord));
        main
    }

    #[test]
    fn test_inputs_and_outputs_become_structs() {
        let mut module = Module::new();
        let inner = fragment_shader(&mut module);
        let mut pass = CanonicalizeEntryPointIo::default();
        let dump = run_and_dump(&mut pass, &mut module);
        for line in [
            "%main_inner = func(%coord:vec4<f32>, %uv:vec2<f32>):vec4<f32> -> %b1 {",
            "%main = @fragment func(%in:main_in):main_out -> %b2 {",
            "%6:vec4<f32> = access %in, 0u",
            "%7:vec2<f32> = access %in, 1u",
            "%8:vec4<f32> = call %main_inner, %6, %7",
            "%9:main_out = construct %8",
            "ret %9",
        ] {
            assert!(dump.contains(line), "missing '{line}' in\n{dump}");
        }
        assert!(!module.function(inner).is_entry_point());

        let wrapper = module.lookup_function("main").unwrap();
        let input = module.type_of(module.function(wrapper).params()[0]);
        let members = module.types.struct_members(input).unwrap();
        assert_eq!(members[0].name, "coord");
        assert_eq!(
            members[0].attributes,
            IoAttributes::builtin(BuiltinValue::Position)
        );
        assert_eq!(members[1].attributes, IoAttributes::location(0));
        let output = module.function(wrapper).return_type();
        let members = module.types.struct_members(output).unwrap();
        assert_eq!(members[0].name, "location0");
        assert_eq!(members[0].attributes, IoAttributes::location(0));

        assert!(!pass.run(&mut module));
    }

    #[test]
    fn test_builtins_as_parameters() {
        let mut module = Module::new();
        fragment_shader(&mut module);
        let mut pass = CanonicalizeEntryPointIo::new(EntryPointIoConfig {
            builtin_style: BuiltinStyle::Parameter,
            ..EntryPointIoConfig::default()
        });
        let dump = run_and_dump(&mut pass, &mut module);
        for line in [
            "%main = @fragment func(%in:main_in, %coord_1:vec4<f32> [@position]):main_out -> %b2 {",
            "%7:vec2<f32> = access %in, 0u",
            "%8:vec4<f32> = call %main_inner, %coord_1, %7",
        ] {
            assert!(dump.contains(line), "missing '{line}' in\n{dump}");
        }
        assert!(!pass.run(&mut module));
    }

    #[test]
    fn test_fixed_sample_mask_is_added() {
        let mut module = Module::new();
        let mut b = Builder::new(&mut module);
        let void = b.types().void();
        let main = b.function("main", void, Some(PipelineStage::Fragment));
        let body = b.function_body(main);
        b.append_to(body);
        b.return_(main, None);

        let mut pass = CanonicalizeEntryPointIo::new(EntryPointIoConfig {
            fixed_sample_mask: 0xF,
            ..EntryPointIoConfig::default()
        });
        let dump = run_and_dump(&mut pass, &mut module);
        assert!(dump.contains("%main = @fragment func():main_out -> %b2 {"), "{dump}");
        assert!(dump.contains("%3:main_out = construct 15u"), "{dump}");
        assert!(!pass.run(&mut module));
    }

    #[test]
    fn test_fixed_sample_mask_is_combined() {
        let mut module = Module::new();
        let mut b = Builder::new(&mut module);
        let u32 = b.types().u32();
        let main = b.function("main", u32, Some(PipelineStage::Fragment));
        let mask = b.add_param(main, "mask", u32);
        b.set_param_attributes(mask, IoAttributes::builtin(BuiltinValue::SampleMask));
        b.set_return_attributes(main, IoAttributes::builtin(BuiltinValue::SampleMask));
        let body = b.function_body(main);
        b.append_to(body);
        b.return_(main, Some(mask));

        let mut pass = CanonicalizeEntryPointIo::new(EntryPointIoConfig {
            fixed_sample_mask: 0xF,
            ..EntryPointIoConfig::default()
        });
        let dump = run_and_dump(&mut pass, &mut module);
        for line in [
            "%5:u32 = access %in, 0u",
            "%6:u32 = call %main_inner, %5",
            "%7:u32 = and %6, 15u",
            "%8:main_out = construct %7",
        ] {
            assert!(dump.contains(line), "missing '{line}' in\n{dump}");
        }
    }

    #[test]
    fn test_entry_points_without_io_are_left_alone() {
        let mut module = Module::new();
        empty_entry_point(&mut module, "main");
        assert!(!CanonicalizeEntryPointIo::default().run(&mut module));
        assert_eq!(module.function_count(), 1);
    }
}
