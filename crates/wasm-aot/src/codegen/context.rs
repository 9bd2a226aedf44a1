use inkwell::attributes::Attribute;
use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::{Linkage, Module};
use inkwell::types::{
    ArrayType, BasicMetadataTypeEnum, BasicType, BasicTypeEnum, FloatType, FunctionType, IntType,
    PointerType, StructType, VectorType,
};
use inkwell::values::{
    BasicValueEnum, FunctionValue, GlobalValue, InstructionValue, IntValue, PointerValue,
    StructValue,
};
use inkwell::AddressSpace;
use wasmparser::{BlockType, CompositeInnerType, FuncType, StorageType, SubType, ValType};

use crate::abi::{self, Intrinsic, TrapCode};
use crate::Result;

/// Host SIMD capabilities, computed once per module and consulted by the
/// vector lowerings to choose between platform intrinsics and portable IR.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    pub xop: bool,
    pub sse2: bool,
    pub ssse3: bool,
    pub sse4_1: bool,
    pub neon: bool,
}

impl Capabilities {
    /// Detect the capabilities of the machine we are running on.
    #[must_use]
    pub fn host() -> Self {
        #[cfg(target_arch = "x86_64")]
        {
            Self {
                xop: std::arch::is_x86_feature_detected!("xop"),
                sse2: std::arch::is_x86_feature_detected!("sse2"),
                ssse3: std::arch::is_x86_feature_detected!("ssse3"),
                sse4_1: std::arch::is_x86_feature_detected!("sse4.1"),
                neon: false,
            }
        }
        #[cfg(target_arch = "aarch64")]
        {
            Self {
                neon: std::arch::is_aarch64_feature_detected!("neon"),
                ..Self::default()
            }
        }
        #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
        {
            Self::default()
        }
    }

    /// Capabilities for a portable binary: only the architecture baseline.
    #[must_use]
    pub fn generic() -> Self {
        Self {
            sse2: cfg!(target_arch = "x86_64"),
            neon: cfg!(target_arch = "aarch64"),
            ..Self::default()
        }
    }
}

/// Per-module compile state: canonical IR types, attribute objects, the
/// composite-type table, per-function IR handles, and the shared trap
/// helper. One `CompileContext` outlives every function translation of the
/// module it owns.
pub struct CompileContext<'ctx> {
    pub llctx: &'ctx Context,
    pub module: Module<'ctx>,

    // Attributes applied to trap paths and runtime callees.
    pub cold: Attribute,
    pub noinline: Attribute,
    pub noreturn: Attribute,
    pub noalias: Attribute,

    // Canonical scalar types.
    pub i1: IntType<'ctx>,
    pub i8: IntType<'ctx>,
    pub i16: IntType<'ctx>,
    pub i32: IntType<'ctx>,
    pub i64: IntType<'ctx>,
    pub i128: IntType<'ctx>,
    pub f32: FloatType<'ctx>,
    pub f64: FloatType<'ctx>,
    pub ptr: PointerType<'ctx>,

    // 128-bit vector lane views. `i64x2` doubles as the value
    // representation for `v128` and for references.
    pub i8x16: VectorType<'ctx>,
    pub i16x8: VectorType<'ctx>,
    pub i32x4: VectorType<'ctx>,
    pub i64x2: VectorType<'ctx>,
    pub f32x4: VectorType<'ctx>,
    pub f64x2: VectorType<'ctx>,

    pub exec_ctx_ty: StructType<'ctx>,
    pub intrinsics_table_ty: ArrayType<'ctx>,
    intrinsics_table: GlobalValue<'ctx>,
    trap_fn: FunctionValue<'ctx>,

    pub capabilities: Capabilities,

    /// Type-section entries, indexed by composite-type index.
    pub composite_types: Vec<SubType>,
    /// `(type index, IR function)` per function index, imports first.
    pub functions: Vec<(u32, FunctionValue<'ctx>)>,
    /// IR value type of each global slot.
    pub globals: Vec<BasicTypeEnum<'ctx>>,
}

impl<'ctx> CompileContext<'ctx> {
    pub fn new(llctx: &'ctx Context, module_name: &str, capabilities: Capabilities) -> Result<Self> {
        let module = llctx.create_module(module_name);

        let enum_attr = |name: &str| {
            llctx.create_enum_attribute(Attribute::get_named_enum_kind_id(name), 0)
        };

        let i64 = llctx.i64_type();
        let ptr = llctx.ptr_type(AddressSpace::default());

        // Field order is part of the ABI; see `abi::exec_ctx`.
        let exec_ctx_ty = llctx.opaque_struct_type("ExecCtx");
        exec_ctx_ty.set_body(
            &[
                ptr.into(), // memory base array
                ptr.into(), // global slot array
                ptr.into(), // instruction counter
                ptr.into(), // cost table
                ptr.into(), // gas accumulator
                i64.into(), // gas limit
                ptr.into(), // stop token
            ],
            false,
        );

        let intrinsics_table_ty = ptr.array_type(abi::INTRINSIC_COUNT);
        let intrinsics_table = module.add_global(ptr, None, "intrinsics");

        let version = module.add_global(llctx.i32_type(), None, "version");
        version.set_initializer(&llctx.i32_type().const_int(abi::BINARY_VERSION.into(), false));
        version.set_constant(true);

        let trap_ty = llctx.void_type().fn_type(&[llctx.i32_type().into()], false);
        let trap_fn = module.add_function("trap", trap_ty, Some(Linkage::Private));

        let mut ctx = Self {
            llctx,
            module,
            cold: enum_attr("cold"),
            noinline: enum_attr("noinline"),
            noreturn: enum_attr("noreturn"),
            noalias: enum_attr("noalias"),
            i1: llctx.bool_type(),
            i8: llctx.i8_type(),
            i16: llctx.i16_type(),
            i32: llctx.i32_type(),
            i64,
            i128: llctx.i128_type(),
            f32: llctx.f32_type(),
            f64: llctx.f64_type(),
            ptr,
            i8x16: llctx.i8_type().vec_type(16),
            i16x8: llctx.i16_type().vec_type(8),
            i32x4: llctx.i32_type().vec_type(4),
            i64x2: llctx.i64_type().vec_type(2),
            f32x4: llctx.f32_type().vec_type(4),
            f64x2: llctx.f64_type().vec_type(2),
            exec_ctx_ty,
            intrinsics_table_ty,
            intrinsics_table,
            trap_fn,
            capabilities,
            composite_types: Vec::new(),
            functions: Vec::new(),
            globals: Vec::new(),
        };
        ctx.build_trap_helper()?;
        Ok(ctx)
    }

    /// The shared trap helper: forwards the error code to the trap
    /// intrinsic and never returns. Cold and non-inlinable so trap paths do
    /// not inhibit optimisation of the hot path.
    fn build_trap_helper(&mut self) -> Result<()> {
        use inkwell::attributes::AttributeLoc;

        self.trap_fn.add_attribute(AttributeLoc::Function, self.noreturn);
        self.trap_fn.add_attribute(AttributeLoc::Function, self.cold);
        self.trap_fn.add_attribute(AttributeLoc::Function, self.noinline);

        let builder = self.llctx.create_builder();
        let entry = self.llctx.append_basic_block(self.trap_fn, "entry");
        builder.position_at_end(entry);

        let code = self
            .trap_fn
            .get_nth_param(0)
            .expect("trap helper takes the error code")
            .into_int_value();
        let fn_ty = self.llctx.void_type().fn_type(&[self.i32.into()], false);
        let call = self.build_intrinsic_call(&builder, Intrinsic::Trap, fn_ty, &[code.into()])?;
        call.add_attribute(AttributeLoc::Function, self.noreturn);
        builder.build_unreachable()?;
        Ok(())
    }

    /// Emit a call to the function's trap block helper with a constant code.
    /// Used by the trap epilogue; instruction sites branch to trap blocks
    /// instead of calling this directly.
    pub fn build_trap_call(&self, builder: &Builder<'ctx>, code: TrapCode) -> Result<()> {
        use inkwell::attributes::AttributeLoc;
        let call = builder.build_call(
            self.trap_fn,
            &[self.i32.const_int(code.as_u32().into(), false).into()],
            "",
        )?;
        call.add_attribute(AttributeLoc::Function, self.noreturn);
        builder.build_unreachable()?;
        Ok(())
    }

    /// Load an intrinsic callee out of the process-wide dispatch table.
    /// The table pointer is an immutable relocation once the module is
    /// loaded, so the load carries an invariant-group marker.
    pub fn get_intrinsic(
        &self,
        builder: &Builder<'ctx>,
        intrinsic: Intrinsic,
    ) -> Result<PointerValue<'ctx>> {
        let table = builder.build_load(
            self.ptr,
            self.intrinsics_table.as_pointer_value(),
            "intr.table",
        )?;
        self.mark_invariant_group(table.as_instruction_value());
        let slot = unsafe {
            builder.build_in_bounds_gep(
                self.intrinsics_table_ty,
                table.into_pointer_value(),
                &[
                    self.i64.const_zero(),
                    self.i64.const_int(intrinsic.as_u32().into(), false),
                ],
                "intr.slot",
            )?
        };
        let callee = builder.build_load(self.ptr, slot, "intr.fn")?;
        self.mark_invariant_group(callee.as_instruction_value());
        Ok(callee.into_pointer_value())
    }

    /// Call an intrinsic with the given signature.
    pub fn build_intrinsic_call(
        &self,
        builder: &Builder<'ctx>,
        intrinsic: Intrinsic,
        fn_ty: FunctionType<'ctx>,
        args: &[inkwell::values::BasicMetadataValueEnum<'ctx>],
    ) -> Result<inkwell::values::CallSiteValue<'ctx>> {
        let callee = self.get_intrinsic(builder, intrinsic)?;
        Ok(builder.build_indirect_call(fn_ty, callee, args, "")?)
    }

    // ── Execution-context accessors ──
    //
    // The translator keeps the whole record in registers (one aggregate
    // load in the prologue); these just project fields out of it.

    pub fn get_memory(
        &self,
        builder: &Builder<'ctx>,
        exec_ctx: StructValue<'ctx>,
        index: u32,
    ) -> Result<PointerValue<'ctx>> {
        let array = builder
            .build_extract_value(exec_ctx, abi::exec_ctx::MEMORIES, "mem.array")?
            .into_pointer_value();
        let slot = unsafe {
            builder.build_in_bounds_gep(
                self.ptr,
                array,
                &[self.i64.const_int(index.into(), false)],
                "mem.slot",
            )?
        };
        let base = builder.build_load(self.ptr, slot, "mem.base")?;
        self.mark_invariant_group(base.as_instruction_value());
        Ok(base.into_pointer_value())
    }

    pub fn get_global(
        &self,
        builder: &Builder<'ctx>,
        exec_ctx: StructValue<'ctx>,
        index: u32,
    ) -> Result<(BasicTypeEnum<'ctx>, PointerValue<'ctx>)> {
        let ty = self.globals[index as usize];
        let array = builder
            .build_extract_value(exec_ctx, abi::exec_ctx::GLOBALS, "glob.array")?
            .into_pointer_value();
        let slot = unsafe {
            builder.build_in_bounds_gep(
                self.ptr,
                array,
                &[self.i64.const_int(index.into(), false)],
                "glob.slot",
            )?
        };
        let cell = builder.build_load(self.ptr, slot, "glob.cell")?;
        self.mark_invariant_group(cell.as_instruction_value());
        Ok((ty, cell.into_pointer_value()))
    }

    pub fn get_instr_count(
        &self,
        builder: &Builder<'ctx>,
        exec_ctx: StructValue<'ctx>,
    ) -> Result<PointerValue<'ctx>> {
        Ok(builder
            .build_extract_value(exec_ctx, abi::exec_ctx::INSTR_COUNT, "instr.count")?
            .into_pointer_value())
    }

    pub fn get_cost_table(
        &self,
        builder: &Builder<'ctx>,
        exec_ctx: StructValue<'ctx>,
    ) -> Result<PointerValue<'ctx>> {
        Ok(builder
            .build_extract_value(exec_ctx, abi::exec_ctx::COST_TABLE, "cost.table")?
            .into_pointer_value())
    }

    pub fn get_gas(
        &self,
        builder: &Builder<'ctx>,
        exec_ctx: StructValue<'ctx>,
    ) -> Result<PointerValue<'ctx>> {
        Ok(builder
            .build_extract_value(exec_ctx, abi::exec_ctx::GAS, "gas")?
            .into_pointer_value())
    }

    pub fn get_gas_limit(
        &self,
        builder: &Builder<'ctx>,
        exec_ctx: StructValue<'ctx>,
    ) -> Result<IntValue<'ctx>> {
        Ok(builder
            .build_extract_value(exec_ctx, abi::exec_ctx::GAS_LIMIT, "gas.limit")?
            .into_int_value())
    }

    pub fn get_stop_token(
        &self,
        builder: &Builder<'ctx>,
        exec_ctx: StructValue<'ctx>,
    ) -> Result<PointerValue<'ctx>> {
        Ok(builder
            .build_extract_value(exec_ctx, abi::exec_ctx::STOP_TOKEN, "stop.token")?
            .into_pointer_value())
    }

    // ── Type mapping ──

    /// Resolve a block type into `(params, results)`.
    pub fn resolve_block_type(&self, bt: &BlockType) -> (Vec<ValType>, Vec<ValType>) {
        match bt {
            BlockType::Empty => (Vec::new(), Vec::new()),
            BlockType::Type(ty) => (Vec::new(), vec![*ty]),
            BlockType::FuncType(idx) => {
                let fty = self.func_type(*idx);
                (fty.params().to_vec(), fty.results().to_vec())
            }
        }
    }

    /// The function signature behind a composite-type index. The input is
    /// validated, so the index always names a function type here.
    #[must_use]
    pub fn func_type(&self, type_idx: u32) -> &FuncType {
        match &self.composite_types[type_idx as usize].composite_type.inner {
            CompositeInnerType::Func(f) => f,
            _ => unreachable!("validated module: type index does not name a function type"),
        }
    }

    /// Whether a composite-type index names a function type.
    #[must_use]
    pub fn is_func_type(&self, type_idx: u32) -> bool {
        matches!(
            self.composite_types[type_idx as usize].composite_type.inner,
            CompositeInnerType::Func(_)
        )
    }

    /// The storage type of a struct field or array element.
    #[must_use]
    pub fn storage_type(&self, type_idx: u32, field: u32) -> StorageType {
        match &self.composite_types[type_idx as usize].composite_type.inner {
            CompositeInnerType::Struct(s) => s.fields[field as usize].element_type,
            CompositeInnerType::Array(a) => a.0.element_type,
            CompositeInnerType::Func(_) => {
                unreachable!("validated module: field access on a function type")
            }
        }
    }

    /// Map a WASM value type to its IR representation.
    /// `v128` and references are both `<2 x i64>`.
    #[must_use]
    pub fn value_type(&self, ty: ValType) -> BasicTypeEnum<'ctx> {
        match ty {
            ValType::I32 => self.i32.into(),
            ValType::I64 => self.i64.into(),
            ValType::F32 => self.f32.into(),
            ValType::F64 => self.f64.into(),
            ValType::V128 | ValType::Ref(_) => self.i64x2.into(),
        }
    }

    /// The zero of a value type; locals start out holding this.
    #[must_use]
    pub fn const_zero(&self, ty: ValType) -> BasicValueEnum<'ctx> {
        match ty {
            ValType::I32 => self.i32.const_zero().into(),
            ValType::I64 => self.i64.const_zero().into(),
            ValType::F32 => self.f32.const_zero().into(),
            ValType::F64 => self.f64.const_zero().into(),
            ValType::V128 | ValType::Ref(_) => self.i64x2.const_zero().into(),
        }
    }

    /// IR return type for a result list: void, a single value, or a struct
    /// packing the multi-value results.
    #[must_use]
    pub fn rets_type(&self, results: &[ValType]) -> Option<BasicTypeEnum<'ctx>> {
        match results {
            [] => None,
            [single] => Some(self.value_type(*single)),
            many => {
                let fields: Vec<BasicTypeEnum> =
                    many.iter().map(|ty| self.value_type(*ty)).collect();
                Some(self.llctx.struct_type(&fields, false).into())
            }
        }
    }

    /// IR signature of a compiled function: the execution-context pointer
    /// followed by the WASM parameters.
    #[must_use]
    pub fn function_type(&self, fty: &FuncType) -> FunctionType<'ctx> {
        let mut params: Vec<BasicMetadataTypeEnum> = Vec::with_capacity(fty.params().len() + 1);
        params.push(self.ptr.into());
        params.extend(fty.params().iter().map(|ty| self.value_type(*ty).into()));
        match self.rets_type(fty.results()) {
            None => self.llctx.void_type().fn_type(&params, false),
            Some(ret) => ret.fn_type(&params, false),
        }
    }

    /// Tag a load as `invariant.group`: the loaded pointer never changes
    /// for the lifetime of the function call.
    pub fn mark_invariant_group(&self, inst: Option<InstructionValue<'ctx>>) {
        if let Some(inst) = inst {
            let kind = self.llctx.get_kind_id("invariant.group");
            let _ = inst.set_metadata(self.llctx.metadata_node(&[]), kind);
        }
    }

    /// Annotate a condition as expected-true via `llvm.expect`, steering
    /// block layout so trap edges leave the hot path.
    pub fn expect_true(
        &self,
        builder: &Builder<'ctx>,
        cond: IntValue<'ctx>,
    ) -> Result<IntValue<'ctx>> {
        let Some(expect) = inkwell::intrinsics::Intrinsic::find("llvm.expect") else {
            return Ok(cond);
        };
        let Some(decl) = expect.get_declaration(&self.module, &[self.i1.into()]) else {
            return Ok(cond);
        };
        let call = builder.build_call(
            decl,
            &[cond.into(), self.i1.const_int(1, false).into()],
            "expect",
        )?;
        Ok(call
            .try_as_basic_value()
            .left()
            .map_or(cond, |v| v.into_int_value()))
    }
}
