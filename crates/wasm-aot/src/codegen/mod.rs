//! AOT code generation: WASM module → LLVM IR → native object.

mod atomic;
mod context;
mod function;
mod memory;
mod numeric;
mod reference;
mod simd;

pub use context::{Capabilities, CompileContext};
pub use function::FunctionTranslator;

use std::path::Path;

use inkwell::context::Context;
use inkwell::module::{Linkage, Module};
use inkwell::passes::PassBuilderOptions;
use inkwell::targets::{
    CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetMachine,
};
use inkwell::values::BasicMetadataValueEnum;
use inkwell::OptimizationLevel;

use crate::abi::{self, Intrinsic};
use crate::module::WasmModule;
use crate::{Error, Result};

/// LLVM pass-pipeline level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptLevel {
    O0,
    O1,
    #[default]
    O2,
    O3,
    Os,
    Oz,
}

impl OptLevel {
    fn passes(self) -> &'static str {
        match self {
            Self::O0 => "default<O0>,function(tailcallelim)",
            Self::O1 => "default<O1>,function(tailcallelim)",
            Self::O2 => "default<O2>",
            Self::O3 => "default<O3>",
            Self::Os => "default<Os>",
            Self::Oz => "default<Oz>",
        }
    }

    fn codegen_level(self) -> OptimizationLevel {
        match self {
            Self::O0 => OptimizationLevel::None,
            Self::O1 => OptimizationLevel::Less,
            Self::O3 => OptimizationLevel::Aggressive,
            _ => OptimizationLevel::Default,
        }
    }
}

/// Compiler configuration.
#[derive(Debug, Clone, Default)]
pub struct CompilerConfig {
    pub opt_level: OptLevel,
    /// Build for the architecture baseline instead of the host CPU.
    pub generic_binary: bool,
    /// Emit the per-function instruction counter.
    pub instruction_counting: bool,
    /// Emit gas accounting against the cost table and gas limit.
    pub gas_metering: bool,
    /// Poll the stop token at block entries and loop back-edges.
    pub interruptible: bool,
    /// Request the exception-handling proposal. Not supported; compilation
    /// is refused up front rather than failing mid-module.
    pub exception_handling: bool,
}

/// Ahead-of-time compiler for validated WASM modules.
pub struct Compiler {
    config: CompilerConfig,
}

impl Compiler {
    #[must_use]
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    fn check_config(&self) -> Result<()> {
        if self.config.exception_handling {
            return Err(Error::UnsupportedProposal("exception-handling"));
        }
        Ok(())
    }

    /// Lower a validated WASM binary into an optimised LLVM module owned by
    /// `llctx`.
    pub fn compile<'ctx>(&self, llctx: &'ctx Context, wasm: &[u8]) -> Result<Module<'ctx>> {
        self.check_config()?;
        let module = WasmModule::parse(wasm)?;

        let capabilities = if self.config.generic_binary {
            Capabilities::generic()
        } else {
            Capabilities::host()
        };
        let mut ctx = CompileContext::new(llctx, "wasm_aot", capabilities)?;
        ctx.composite_types = module.types.clone();
        let global_types = module
            .globals
            .iter()
            .map(|g| ctx.value_type(g.content_type))
            .collect();
        ctx.globals = global_types;

        self.declare_functions(&mut ctx, &module)?;
        self.build_type_wrappers(&ctx)?;

        for (local_idx, body) in module.functions.iter().enumerate() {
            let func_idx = module.num_imported_funcs as usize + local_idx;
            let (type_idx, function) = ctx.functions[func_idx];
            let results = ctx.func_type(type_idx).results().to_vec();
            tracing::trace!(func_idx, "translating function");

            let mut local_decls = Vec::new();
            for local in body.get_locals_reader()? {
                let (count, ty) = local?;
                local_decls.push((count, ty));
            }

            let costs = instruction_costs(wasm, body)?;
            let translator =
                FunctionTranslator::new(&ctx, &self.config, function, &local_decls)?;
            translator.compile(body, &results, &costs)?;
        }

        ctx.module
            .verify()
            .map_err(|e| Error::Verify(e.to_string()))?;

        self.optimize(&ctx.module)?;
        tracing::debug!(functions = module.functions.len(), "module compiled");
        Ok(ctx.module)
    }

    /// Declare `f{i}` for every function index. Imported functions get a
    /// private marshalling stub around the `Call` intrinsic so call sites
    /// are uniform.
    fn declare_functions(&self, ctx: &mut CompileContext<'_>, module: &WasmModule<'_>) -> Result<()> {
        for (i, &type_idx) in module.function_types.iter().enumerate() {
            let fty = ctx.func_type(type_idx).clone();
            let ir_ty = ctx.function_type(&fty);
            let is_import = (i as u32) < module.num_imported_funcs;
            let linkage = if is_import { Some(Linkage::Private) } else { None };
            let function = ctx.module.add_function(&format!("f{i}"), ir_ty, linkage);
            ctx.functions.push((type_idx, function));
        }

        for i in 0..module.num_imported_funcs {
            self.build_import_stub(ctx, i)?;
            tracing::trace!(
                import = %module.imported_func_names[i as usize],
                func_idx = i,
                "declared import stub"
            );
        }
        Ok(())
    }

    /// The body of an imported function: box the arguments into a scratch
    /// array, call through the `Call` intrinsic, unbox the results.
    fn build_import_stub(&self, ctx: &CompileContext<'_>, func_idx: u32) -> Result<()> {
        let (type_idx, function) = ctx.functions[func_idx as usize];
        let fty = ctx.func_type(type_idx).clone();
        let builder = ctx.llctx.create_builder();
        let entry = ctx.llctx.append_basic_block(function, "entry");
        builder.position_at_end(entry);

        let slot = u64::from(abi::VALUE_SLOT_SIZE);
        let args_ty = ctx.i8.array_type(fty.params().len() as u32 * abi::VALUE_SLOT_SIZE);
        let rets_ty = ctx.i8.array_type(fty.results().len() as u32 * abi::VALUE_SLOT_SIZE);
        let args = builder.build_alloca(args_ty, "args")?;
        let rets = builder.build_alloca(rets_ty, "rets")?;
        for i in 0..fty.params().len() {
            let param = function
                .get_nth_param(i as u32 + 1)
                .ok_or_else(|| Error::Internal("import stub missing parameter".into()))?;
            let ptr = unsafe {
                builder.build_in_bounds_gep(
                    ctx.i8,
                    args,
                    &[ctx.i64.const_int(i as u64 * slot, false)],
                    "",
                )?
            };
            builder.build_store(ptr, param)?;
        }

        let call_ty = ctx.llctx.void_type().fn_type(
            &[ctx.i32.into(), ctx.ptr.into(), ctx.ptr.into()],
            false,
        );
        ctx.build_intrinsic_call(
            &builder,
            Intrinsic::Call,
            call_ty,
            &[
                ctx.i32.const_int(func_idx.into(), false).into(),
                args.into(),
                rets.into(),
            ],
        )?;

        match fty.results() {
            [] => {
                builder.build_return(None)?;
            }
            results => {
                let mut values = Vec::with_capacity(results.len());
                for (i, ty) in results.iter().enumerate() {
                    let ptr = unsafe {
                        builder.build_in_bounds_gep(
                            ctx.i8,
                            rets,
                            &[ctx.i64.const_int(i as u64 * slot, false)],
                            "",
                        )?
                    };
                    values.push(builder.build_load(ctx.value_type(*ty), ptr, "")?);
                }
                if values.len() == 1 {
                    builder.build_return(Some(&values[0]))?;
                } else {
                    builder.build_aggregate_return(&values)?;
                }
            }
        }
        Ok(())
    }

    /// Exported wrappers `t{j}`: `(exec_ctx, callee, args, rets)` entry
    /// points the runtime uses to invoke a native function with boxed
    /// arguments.
    fn build_type_wrappers(&self, ctx: &CompileContext<'_>) -> Result<()> {
        let slot = u64::from(abi::VALUE_SLOT_SIZE);
        for (j, sub) in ctx.composite_types.iter().enumerate() {
            let wasmparser::CompositeInnerType::Func(fty) = &sub.composite_type.inner else {
                continue;
            };
            let fty = fty.clone();
            let wrapper_ty = ctx.llctx.void_type().fn_type(
                &[ctx.ptr.into(), ctx.ptr.into(), ctx.ptr.into(), ctx.ptr.into()],
                false,
            );
            let wrapper = ctx.module.add_function(&format!("t{j}"), wrapper_ty, None);
            let builder = ctx.llctx.create_builder();
            let entry = ctx.llctx.append_basic_block(wrapper, "entry");
            builder.position_at_end(entry);

            let exec_ctx = wrapper
                .get_nth_param(0)
                .ok_or_else(|| Error::Internal("wrapper missing exec ctx".into()))?;
            let callee = wrapper
                .get_nth_param(1)
                .ok_or_else(|| Error::Internal("wrapper missing callee".into()))?
                .into_pointer_value();
            let args = wrapper
                .get_nth_param(2)
                .ok_or_else(|| Error::Internal("wrapper missing args".into()))?
                .into_pointer_value();
            let rets = wrapper
                .get_nth_param(3)
                .ok_or_else(|| Error::Internal("wrapper missing rets".into()))?
                .into_pointer_value();

            let mut call_args: Vec<BasicMetadataValueEnum> =
                Vec::with_capacity(fty.params().len() + 1);
            call_args.push(exec_ctx.into());
            for (i, ty) in fty.params().iter().enumerate() {
                let ptr = unsafe {
                    builder.build_in_bounds_gep(
                        ctx.i8,
                        args,
                        &[ctx.i64.const_int(i as u64 * slot, false)],
                        "",
                    )?
                };
                call_args.push(builder.build_load(ctx.value_type(*ty), ptr, "")?.into());
            }

            let ret = builder
                .build_indirect_call(ctx.function_type(&fty), callee, &call_args, "")?
                .try_as_basic_value()
                .left();

            let store_ret = |i: usize, value: inkwell::values::BasicValueEnum| -> Result<()> {
                let ptr = unsafe {
                    builder.build_in_bounds_gep(
                        ctx.i8,
                        rets,
                        &[ctx.i64.const_int(i as u64 * slot, false)],
                        "",
                    )?
                };
                builder.build_store(ptr, value)?;
                Ok(())
            };
            match ret {
                None => {}
                Some(inkwell::values::BasicValueEnum::StructValue(packed))
                    if fty.results().len() > 1 =>
                {
                    for i in 0..fty.results().len() {
                        let field = builder.build_extract_value(packed, i as u32, "")?;
                        store_ret(i, field)?;
                    }
                }
                Some(single) => store_ret(0, single)?,
            }
            builder.build_return(None)?;
        }
        Ok(())
    }

    /// Run the LLVM pass pipeline for the configured level. A failing
    /// pipeline is logged, not fatal: the unoptimised module is still a
    /// correct compilation result.
    fn optimize(&self, module: &Module<'_>) -> Result<()> {
        let machine = self.target_machine()?;
        if let Err(e) = module.run_passes(
            self.config.opt_level.passes(),
            &machine,
            PassBuilderOptions::create(),
        ) {
            tracing::warn!(error = %e, "pass pipeline failed, emitting unoptimised module");
        }
        Ok(())
    }

    fn target_machine(&self) -> Result<TargetMachine> {
        Target::initialize_all(&InitializationConfig::default());
        let triple = TargetMachine::get_default_triple();
        let target = Target::from_triple(&triple).map_err(|e| Error::Target(e.to_string()))?;
        let (cpu, features) = if self.config.generic_binary {
            (String::from("generic"), String::new())
        } else {
            (
                TargetMachine::get_host_cpu_name().to_string(),
                TargetMachine::get_host_cpu_features().to_string(),
            )
        };
        target
            .create_target_machine(
                &triple,
                &cpu,
                &features,
                self.config.opt_level.codegen_level(),
                RelocMode::PIC,
                CodeModel::Default,
            )
            .ok_or_else(|| Error::Target("failed to create target machine".into()))
    }

    /// Write the compiled module as a relocatable object file.
    pub fn emit_object(&self, module: &Module<'_>, path: &Path) -> Result<()> {
        let machine = self.target_machine()?;
        machine
            .write_to_file(module, FileType::Object, path)
            .map_err(|e| Error::Target(e.to_string()))?;
        tracing::info!(path = %path.display(), "object file written");
        Ok(())
    }
}

/// Cost-table index for each instruction of a function body, in stream
/// order. Indexing is by wire opcode; see [`abi::cost_index`].
fn instruction_costs(wasm: &[u8], body: &wasmparser::FunctionBody<'_>) -> Result<Vec<u16>> {
    let reader = body.get_operators_reader()?;
    let mut costs = Vec::new();
    for pair in reader.into_iter_with_offsets() {
        let (_, offset) = pair?;
        costs.push(abi::cost_index(&wasm[offset..]));
    }
    Ok(costs)
}

/// Compile with the default configuration.
pub fn compile<'ctx>(llctx: &'ctx Context, wasm: &[u8]) -> Result<Module<'ctx>> {
    Compiler::new(CompilerConfig::default()).compile(llctx, wasm)
}
