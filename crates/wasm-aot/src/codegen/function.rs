use std::collections::BTreeMap;

use inkwell::basic_block::BasicBlock;
use inkwell::builder::Builder;
use inkwell::types::BasicTypeEnum;
use inkwell::values::{
    BasicMetadataValueEnum, BasicValue, BasicValueEnum, FunctionValue, IntValue, PhiValue,
    PointerValue, StructValue,
};
use inkwell::{AtomicOrdering, AtomicRMWBinOp, IntPredicate};
use wasmparser::{FunctionBody, Operator, ValType};

use crate::abi::{self, Intrinsic, TrapCode};
use crate::codegen::context::CompileContext;
use crate::codegen::CompilerConfig;
use crate::{Error, Result};

/// One structured block on the control stack.
///
/// `jump_block` is where a branch targeting this frame transfers to: the end
/// block for `block`/`if`, the loop header for `loop` (in which case
/// `next_block` holds the block to position at once the frame ends).
/// Branch results are collected in `return_phi` as `(values, source)` pairs
/// and reconciled into end-block PHIs when the frame is left.
pub(crate) struct ControlFrame<'ctx> {
    stack_base: usize,
    unreachable: bool,
    jump_block: BasicBlock<'ctx>,
    next_block: Option<BasicBlock<'ctx>>,
    else_block: Option<BasicBlock<'ctx>>,
    /// Values introduced at the frame's top of stack on entry. For loops
    /// these are the header PHIs (mirrored in `loop_phis`).
    args: Vec<BasicValueEnum<'ctx>>,
    loop_phis: Vec<PhiValue<'ctx>>,
    param_types: Vec<ValType>,
    result_types: Vec<ValType>,
    return_phi: Vec<(Vec<BasicValueEnum<'ctx>>, BasicBlock<'ctx>)>,
}

/// Per-function translator: converts one validated instruction stream into
/// IR. Owns the operand stack, the control stack, local slots, the
/// trap-block cache, and the scratch counters.
pub struct FunctionTranslator<'ctx, 'm> {
    pub(crate) ctx: &'m CompileContext<'ctx>,
    pub(crate) builder: Builder<'ctx>,
    pub(crate) function: FunctionValue<'ctx>,
    pub(crate) exec_ctx: StructValue<'ctx>,
    locals: Vec<(BasicTypeEnum<'ctx>, PointerValue<'ctx>)>,
    stack: Vec<BasicValueEnum<'ctx>>,
    control: Vec<ControlFrame<'ctx>>,
    trap_blocks: BTreeMap<TrapCode, BasicBlock<'ctx>>,
    local_instr_count: Option<PointerValue<'ctx>>,
    local_gas: Option<PointerValue<'ctx>>,
    interruptible: bool,
    body_unreachable: bool,
}

impl<'ctx, 'm> FunctionTranslator<'ctx, 'm> {
    /// Set up the entry prologue: load the execution context, allocate
    /// counter slots, and spill parameters and zero-initialised locals into
    /// stack slots.
    pub fn new(
        ctx: &'m CompileContext<'ctx>,
        config: &CompilerConfig,
        function: FunctionValue<'ctx>,
        local_decls: &[(u32, ValType)],
    ) -> Result<Self> {
        let builder = ctx.llctx.create_builder();
        let entry = ctx.llctx.append_basic_block(function, "entry");
        builder.position_at_end(entry);

        let exec_ctx_ptr = function
            .get_nth_param(0)
            .ok_or_else(|| Error::Internal("function without execution context".into()))?
            .into_pointer_value();
        let exec_ctx = builder
            .build_load(ctx.exec_ctx_ty, exec_ctx_ptr, "exec_ctx")?
            .into_struct_value();

        let mut local_instr_count = None;
        if config.instruction_counting {
            let slot = builder.build_alloca(ctx.i64, "instr_count")?;
            builder.build_store(slot, ctx.i64.const_zero())?;
            local_instr_count = Some(slot);
        }
        let mut local_gas = None;
        if config.gas_metering {
            let slot = builder.build_alloca(ctx.i64, "gas")?;
            builder.build_store(slot, ctx.i64.const_zero())?;
            local_gas = Some(slot);
        }

        let mut locals = Vec::new();
        for i in 1..function.count_params() {
            let arg = function
                .get_nth_param(i)
                .ok_or_else(|| Error::Internal(format!("missing parameter {i}")))?;
            let ty = arg.get_type();
            let slot = builder.build_alloca(ty, "")?;
            builder.build_store(slot, arg)?;
            locals.push((ty, slot));
        }
        for &(count, wasm_ty) in local_decls {
            let ty = ctx.value_type(wasm_ty);
            for _ in 0..count {
                let slot = builder.build_alloca(ty, "")?;
                builder.build_store(slot, ctx.const_zero(wasm_ty))?;
                locals.push((ty, slot));
            }
        }

        Ok(Self {
            ctx,
            builder,
            function,
            exec_ctx,
            locals,
            stack: Vec::new(),
            control: Vec::new(),
            trap_blocks: BTreeMap::new(),
            local_instr_count,
            local_gas,
            interruptible: config.interruptible,
            body_unreachable: false,
        })
    }

    /// Translate a function body. `results` are the function's result types;
    /// `cost_of` yields the cost-table index of each instruction in stream
    /// order (see [`abi`] for the index encoding).
    pub fn compile(
        mut self,
        body: &FunctionBody<'_>,
        results: &[ValType],
        costs: &[u16],
    ) -> Result<()> {
        let ret_block = self.ctx.llctx.append_basic_block(self.function, "ret");
        self.enter_block(
            ret_block,
            None,
            None,
            Vec::new(),
            Vec::new(),
            Vec::new(),
            results.to_vec(),
            Vec::new(),
        );

        let reader = body.get_operators_reader()?;
        for (i, op) in reader.into_iter().enumerate() {
            let op = op?;
            self.bump_counters(costs.get(i).copied().unwrap_or(0))?;
            self.translate_operator(&op)?;
        }
        debug_assert!(self.control.is_empty(), "control stack unbalanced");
        self.build_return()?;

        self.emit_trap_epilogue()
    }

    /// Advance the scratch instruction counter and gas accumulator.
    fn bump_counters(&mut self, cost_index: u16) -> Result<()> {
        if let Some(slot) = self.local_instr_count {
            let count = self.builder.build_load(self.ctx.i64, slot, "ic")?.into_int_value();
            let next = self
                .builder
                .build_int_add(count, self.ctx.i64.const_int(1, false), "ic.next")?;
            self.builder.build_store(slot, next)?;
        }
        if let Some(slot) = self.local_gas {
            let table = self.ctx.get_cost_table(&self.builder, self.exec_ctx)?;
            let entry = unsafe {
                self.builder.build_in_bounds_gep(
                    self.ctx.i64,
                    table,
                    &[self.ctx.i64.const_int(cost_index.into(), false)],
                    "cost.entry",
                )?
            };
            let cost = self.builder.build_load(self.ctx.i64, entry, "cost")?.into_int_value();
            let gas = self.builder.build_load(self.ctx.i64, slot, "gas.cur")?.into_int_value();
            let next = self.builder.build_int_add(gas, cost, "gas.next")?;
            self.builder.build_store(slot, next)?;
        }
        Ok(())
    }

    // ── Operand stack ──

    pub(crate) fn push(&mut self, value: impl Into<BasicValueEnum<'ctx>>) {
        self.stack.push(value.into());
    }

    pub(crate) fn pop(&mut self) -> Result<BasicValueEnum<'ctx>> {
        self.stack
            .pop()
            .ok_or_else(|| Error::Internal("operand stack underflow".into()))
    }

    pub(crate) fn pop_int(&mut self) -> Result<IntValue<'ctx>> {
        Ok(self.pop()?.into_int_value())
    }

    pub(crate) fn peek(&self) -> Result<BasicValueEnum<'ctx>> {
        self.stack
            .last()
            .copied()
            .ok_or_else(|| Error::Internal("operand stack underflow".into()))
    }

    pub(crate) fn undef(&self, ty: BasicTypeEnum<'ctx>) -> BasicValueEnum<'ctx> {
        match ty {
            BasicTypeEnum::IntType(t) => t.get_undef().into(),
            BasicTypeEnum::FloatType(t) => t.get_undef().into(),
            BasicTypeEnum::VectorType(t) => t.get_undef().into(),
            BasicTypeEnum::PointerType(t) => t.get_undef().into(),
            BasicTypeEnum::StructType(t) => t.get_undef().into(),
            BasicTypeEnum::ArrayType(t) => t.get_undef().into(),
            BasicTypeEnum::ScalableVectorType(t) => t.get_undef().into(),
        }
    }

    // ── Unreachability ──

    fn set_unreachable(&mut self) {
        match self.control.last_mut() {
            Some(frame) => frame.unreachable = true,
            None => self.body_unreachable = true,
        }
    }

    pub(crate) fn is_unreachable(&self) -> bool {
        self.control
            .last()
            .map_or(self.body_unreachable, |frame| frame.unreachable)
    }

    /// After an unconditional terminator: mark the frame unreachable and
    /// keep emitting into a fresh, never-entered block so stack-height
    /// bookkeeping stays uniform.
    fn continue_unreachable(&mut self, name: &str) {
        self.set_unreachable();
        let bb = self.ctx.llctx.append_basic_block(self.function, name);
        self.builder.position_at_end(bb);
    }

    // ── Trap blocks ──

    /// The shared trap block for an error kind; created on first use.
    pub(crate) fn trap_block(&mut self, code: TrapCode) -> BasicBlock<'ctx> {
        if let Some(bb) = self.trap_blocks.get(&code) {
            return *bb;
        }
        let bb = self.ctx.llctx.append_basic_block(self.function, "trap");
        self.trap_blocks.insert(code, bb);
        bb
    }

    /// Branch to the trap block for `code` unless `ok` holds; continue in a
    /// fresh block on the success edge.
    pub(crate) fn trap_unless(
        &mut self,
        ok: IntValue<'ctx>,
        code: TrapCode,
        cont_name: &str,
    ) -> Result<()> {
        let likely = self.ctx.expect_true(&self.builder, ok)?;
        let cont = self.ctx.llctx.append_basic_block(self.function, cont_name);
        let trap = self.trap_block(code);
        self.builder.build_conditional_branch(likely, cont, trap)?;
        self.builder.position_at_end(cont);
        Ok(())
    }

    /// After the body: materialise one block per encountered error kind.
    /// Each flushes the counters and calls the shared trap helper.
    fn emit_trap_epilogue(&mut self) -> Result<()> {
        let blocks = std::mem::take(&mut self.trap_blocks);
        for (code, bb) in blocks {
            self.builder.position_at_end(bb);
            self.flush_instr_count()?;
            self.flush_gas_at_trap()?;
            self.ctx.build_trap_call(&self.builder, code)?;
        }
        Ok(())
    }

    // ── Counters ──

    /// Flush the scratch instruction counter into the shared cell.
    pub(crate) fn flush_instr_count(&mut self) -> Result<()> {
        if let Some(slot) = self.local_instr_count {
            let pending = self.builder.build_load(self.ctx.i64, slot, "ic.pending")?;
            let shared = self.ctx.get_instr_count(&self.builder, self.exec_ctx)?;
            let rmw = self.builder.build_atomicrmw(
                AtomicRMWBinOp::Add,
                shared,
                pending.into_int_value(),
                AtomicOrdering::Monotonic,
            )?;
            let _ = rmw.as_instruction_value().map(|i| i.set_alignment(8));
            self.builder.build_store(slot, self.ctx.i64.const_zero())?;
        }
        Ok(())
    }

    /// Flush the scratch gas accumulator into the shared cell via a CAS
    /// loop; overrunning the limit transfers to the cost-limit trap.
    pub(crate) fn flush_gas(&mut self) -> Result<()> {
        let Some(slot) = self.local_gas else {
            return Ok(());
        };
        let curr = self.current_block()?;
        let check = self.ctx.llctx.append_basic_block(self.function, "gas.check");
        let ok = self.ctx.llctx.append_basic_block(self.function, "gas.ok");
        let end = self.ctx.llctx.append_basic_block(self.function, "gas.end");

        let cost = self.builder.build_load(self.ctx.i64, slot, "gas.pending")?.into_int_value();
        let gas_ptr = self.ctx.get_gas(&self.builder, self.exec_ctx)?;
        let gas_limit = self.ctx.get_gas_limit(&self.builder, self.exec_ctx)?;
        let gas = self.builder.build_load(self.ctx.i64, gas_ptr, "gas.shared")?;
        if let Some(inst) = gas.as_instruction_value() {
            let _ = inst.set_atomic_ordering(AtomicOrdering::Monotonic);
            let _ = inst.set_alignment(8);
        }
        self.builder.build_unconditional_branch(check)?;

        self.builder.position_at_end(check);
        let old_gas = self.builder.build_phi(self.ctx.i64, "gas.old")?;
        let new_gas = self
            .builder
            .build_int_add(old_gas.as_basic_value().into_int_value(), cost, "gas.new")?;
        let within = self.builder.build_int_compare(
            IntPredicate::ULE,
            new_gas,
            gas_limit,
            "gas.within",
        )?;
        let within = self.ctx.expect_true(&self.builder, within)?;
        let trap = self.trap_block(TrapCode::CostLimitExceeded);
        self.builder.build_conditional_branch(within, ok, trap)?;

        self.builder.position_at_end(ok);
        let xchg = self.builder.build_cmpxchg(
            gas_ptr,
            old_gas.as_basic_value().into_int_value(),
            new_gas,
            AtomicOrdering::Monotonic,
            AtomicOrdering::Monotonic,
        )?;
        let seen = self
            .builder
            .build_extract_value(xchg, 0, "gas.seen")?
            .into_int_value();
        let swapped = self
            .builder
            .build_extract_value(xchg, 1, "gas.swapped")?
            .into_int_value();
        let swapped = self.ctx.expect_true(&self.builder, swapped)?;
        self.builder.build_conditional_branch(swapped, end, check)?;

        old_gas.add_incoming(&[(&gas, curr), (&seen, ok)]);

        self.builder.position_at_end(end);
        self.builder.build_store(slot, self.ctx.i64.const_zero())?;
        Ok(())
    }

    /// Best-effort gas flush on the trap path: a plain atomic add, since the
    /// limit check is moot once we are trapping anyway.
    fn flush_gas_at_trap(&mut self) -> Result<()> {
        if let Some(slot) = self.local_gas {
            let pending = self.builder.build_load(self.ctx.i64, slot, "gas.pending")?;
            let shared = self.ctx.get_gas(&self.builder, self.exec_ctx)?;
            let rmw = self.builder.build_atomicrmw(
                AtomicRMWBinOp::Add,
                shared,
                pending.into_int_value(),
                AtomicOrdering::Monotonic,
            )?;
            let _ = rmw.as_instruction_value().map(|i| i.set_alignment(8));
        }
        Ok(())
    }

    /// Poll the stop token: swap it with 0 and trap if it was set.
    pub(crate) fn check_stop(&mut self) -> Result<()> {
        if !self.interruptible {
            return Ok(());
        }
        let token_ptr = self.ctx.get_stop_token(&self.builder, self.exec_ctx)?;
        let token = self.builder.build_atomicrmw(
            AtomicRMWBinOp::Xchg,
            token_ptr,
            self.ctx.i32.const_zero(),
            AtomicOrdering::Monotonic,
        )?;
        let not_stopped = self.builder.build_int_compare(
            IntPredicate::EQ,
            token,
            self.ctx.i32.const_zero(),
            "not_stopped",
        )?;
        self.trap_unless(not_stopped, TrapCode::Interrupted, "no_stop")
    }

    pub(crate) fn current_block(&self) -> Result<BasicBlock<'ctx>> {
        self.builder
            .get_insert_block()
            .ok_or_else(|| Error::Internal("builder has no insertion block".into()))
    }

    // ── Structured control flow ──

    #[allow(clippy::too_many_arguments)]
    fn enter_block(
        &mut self,
        jump_block: BasicBlock<'ctx>,
        next_block: Option<BasicBlock<'ctx>>,
        else_block: Option<BasicBlock<'ctx>>,
        args: Vec<BasicValueEnum<'ctx>>,
        loop_phis: Vec<PhiValue<'ctx>>,
        param_types: Vec<ValType>,
        result_types: Vec<ValType>,
        return_phi: Vec<(Vec<BasicValueEnum<'ctx>>, BasicBlock<'ctx>)>,
    ) {
        debug_assert_eq!(param_types.len(), args.len());
        let unreachable = self.is_unreachable();
        for &arg in &args {
            self.push(arg);
        }
        self.control.push(ControlFrame {
            stack_base: self.stack.len() - args.len(),
            unreachable,
            jump_block,
            next_block,
            else_block,
            args,
            loop_phis,
            param_types,
            result_types,
            return_phi,
        });
    }

    /// Pop the innermost frame: record the fall-through results (or close
    /// the dead block), position at the frame's continuation block, and
    /// restore the operand stack to the frame's base height.
    fn leave_block(&mut self) -> Result<ControlFrame<'ctx>> {
        let mut frame = self
            .control
            .pop()
            .ok_or_else(|| Error::Internal("control stack underflow".into()))?;
        let next = frame.next_block.unwrap_or(frame.jump_block);
        if frame.unreachable {
            self.builder.build_unreachable()?;
        } else {
            if !frame.result_types.is_empty() {
                let mut rets = Vec::with_capacity(frame.result_types.len());
                for _ in 0..frame.result_types.len() {
                    rets.push(self.pop()?);
                }
                rets.reverse();
                frame.return_phi.push((rets, self.current_block()?));
            }
            self.builder.build_unconditional_branch(next)?;
        }
        self.builder.position_at_end(next);
        self.stack.truncate(frame.stack_base);
        Ok(frame)
    }

    /// Build the end-block PHIs for a frame's result types and push them.
    /// One incoming collapses to the values themselves; zero incomings (only
    /// possible under unreachability) degrade to undef.
    fn build_result_phis(
        &mut self,
        result_types: &[ValType],
        incomings: Vec<(Vec<BasicValueEnum<'ctx>>, BasicBlock<'ctx>)>,
    ) -> Result<()> {
        if result_types.is_empty() {
            return Ok(());
        }
        let values: Vec<BasicValueEnum> = match incomings.len() {
            0 => result_types
                .iter()
                .map(|ty| self.undef(self.ctx.value_type(*ty)))
                .collect(),
            1 => incomings.into_iter().next().expect("one incoming").0,
            _ => {
                let mut values = Vec::with_capacity(result_types.len());
                for (i, ty) in result_types.iter().enumerate() {
                    let phi = self.builder.build_phi(self.ctx.value_type(*ty), "")?;
                    for (incoming, block) in &incomings {
                        phi.add_incoming(&[(&incoming[i], *block)]);
                    }
                    values.push(phi.as_basic_value());
                }
                values
            }
        };
        for value in values {
            self.push(value);
        }
        Ok(())
    }

    /// Record the values a branch carries to the frame `depth` levels out.
    /// Loop targets feed the header PHIs; other targets collect return-PHI
    /// incomings on the frame. Leaves the operand stack unchanged.
    fn set_branch_values(&mut self, depth: u32) -> Result<()> {
        let idx = self.control.len() - 1 - depth as usize;
        let is_loop = self.control[idx].next_block.is_some();
        if is_loop {
            let arity = self.control[idx].param_types.len();
            let mut args = Vec::with_capacity(arity);
            for _ in 0..arity {
                args.push(self.pop()?);
            }
            args.reverse();
            let block = self.current_block()?;
            for (i, arg) in args.iter().enumerate() {
                self.control[idx].loop_phis[i].add_incoming(&[(arg, block)]);
            }
            for arg in args {
                self.push(arg);
            }
        } else if !self.control[idx].result_types.is_empty() {
            let arity = self.control[idx].result_types.len();
            let mut rets = Vec::with_capacity(arity);
            for _ in 0..arity {
                rets.push(self.pop()?);
            }
            rets.reverse();
            for &ret in &rets {
                self.push(ret);
            }
            let block = self.current_block()?;
            self.control[idx].return_phi.push((rets, block));
        }
        Ok(())
    }

    fn branch_target(&self, depth: u32) -> BasicBlock<'ctx> {
        self.control[self.control.len() - 1 - depth as usize].jump_block
    }

    /// Pop a frame's entry arguments off the stack in reverse, or undefs
    /// when the surrounding code is unreachable.
    fn pop_block_args(&mut self, params: &[ValType]) -> Result<Vec<BasicValueEnum<'ctx>>> {
        if self.is_unreachable() {
            return Ok(params
                .iter()
                .map(|ty| self.undef(self.ctx.value_type(*ty)))
                .collect());
        }
        let mut args = Vec::with_capacity(params.len());
        for _ in params {
            args.push(self.pop()?);
        }
        args.reverse();
        Ok(args)
    }

    fn translate_block(&mut self, blockty: &wasmparser::BlockType) -> Result<()> {
        let body = self.ctx.llctx.append_basic_block(self.function, "block");
        let end = self.ctx.llctx.append_basic_block(self.function, "block.end");
        self.builder.build_unconditional_branch(body)?;
        self.builder.position_at_end(body);

        let (params, results) = self.ctx.resolve_block_type(blockty);
        let args = self.pop_block_args(&params)?;
        self.enter_block(end, None, None, args, Vec::new(), params, results, Vec::new());
        self.check_stop()?;
        self.flush_gas()
    }

    fn translate_loop(&mut self, blockty: &wasmparser::BlockType) -> Result<()> {
        let preheader = self.current_block()?;
        let header = self.ctx.llctx.append_basic_block(self.function, "loop");
        let end = self.ctx.llctx.append_basic_block(self.function, "loop.end");
        self.builder.build_unconditional_branch(header)?;
        self.builder.position_at_end(header);

        let (params, results) = self.ctx.resolve_block_type(blockty);
        let entry_args = self.pop_block_args(&params)?;
        let mut phis = Vec::with_capacity(params.len());
        let mut args = Vec::with_capacity(params.len());
        for (value, ty) in entry_args.into_iter().zip(&params) {
            // Loop parameters become header PHIs so back-edges can feed them.
            // The pop happens in the preheader, but the PHI lives here.
            let phi = {
                let phi = self.builder.build_phi(self.ctx.value_type(*ty), "")?;
                phi.add_incoming(&[(&value, preheader)]);
                phi
            };
            args.push(phi.as_basic_value());
            phis.push(phi);
        }
        self.enter_block(header, Some(end), None, args, phis, params, results, Vec::new());
        self.check_stop()?;
        self.flush_gas()
    }

    fn translate_if(&mut self, blockty: &wasmparser::BlockType) -> Result<()> {
        let then_bb = self.ctx.llctx.append_basic_block(self.function, "then");
        let else_bb = self.ctx.llctx.append_basic_block(self.function, "else");
        let end = self.ctx.llctx.append_basic_block(self.function, "if.end");

        let cond = if self.is_unreachable() {
            self.ctx.i1.get_undef()
        } else {
            let value = self.pop_int()?;
            self.builder.build_int_compare(
                IntPredicate::NE,
                value,
                self.ctx.i32.const_zero(),
                "if.cond",
            )?
        };
        self.builder.build_conditional_branch(cond, then_bb, else_bb)?;
        self.builder.position_at_end(then_bb);

        let (params, results) = self.ctx.resolve_block_type(blockty);
        let args = self.pop_block_args(&params)?;
        self.enter_block(end, None, Some(else_bb), args, Vec::new(), params, results, Vec::new());
        Ok(())
    }

    fn translate_else(&mut self) -> Result<()> {
        let frame = self.leave_block()?;
        let else_block = frame
            .else_block
            .ok_or_else(|| Error::Internal("else without matching if".into()))?;
        self.builder.position_at_end(else_block);
        self.enter_block(
            frame.jump_block,
            None,
            None,
            frame.args,
            Vec::new(),
            frame.param_types,
            frame.result_types,
            frame.return_phi,
        );
        Ok(())
    }

    fn translate_end(&mut self) -> Result<()> {
        let mut frame = self.leave_block()?;
        if let Some(else_block) = frame.else_block {
            // `if` without `else`: run the implicit empty alternative, which
            // forwards the entry arguments as its results.
            let end = self.current_block()?;
            self.builder.position_at_end(else_block);
            self.enter_block(
                end,
                None,
                None,
                frame.args,
                Vec::new(),
                frame.param_types,
                frame.result_types,
                frame.return_phi,
            );
            frame = self.leave_block()?;
        }
        let ControlFrame {
            result_types,
            return_phi,
            ..
        } = frame;
        self.build_result_phis(&result_types, return_phi)
    }

    /// Emit the function return: flush counters, then return void, the
    /// single value, or the packed multi-value aggregate.
    fn build_return(&mut self) -> Result<()> {
        self.flush_instr_count()?;
        self.flush_gas()?;
        match self.function.get_type().get_return_type() {
            None => {
                self.builder.build_return(None)?;
            }
            Some(BasicTypeEnum::StructType(sty)) => {
                let count = sty.count_fields() as usize;
                let mut rets = Vec::with_capacity(count);
                for _ in 0..count {
                    rets.push(self.pop()?);
                }
                rets.reverse();
                self.builder.build_aggregate_return(&rets)?;
            }
            Some(_) => {
                let value = self.pop()?;
                self.builder.build_return(Some(&value))?;
            }
        }
        Ok(())
    }

    // ── Calls ──

    /// Pop `params` call operands in reverse and prepend the current
    /// execution-context pointer.
    fn pop_call_args(&mut self, params: &[ValType]) -> Result<Vec<BasicMetadataValueEnum<'ctx>>> {
        let exec_ctx = self
            .function
            .get_nth_param(0)
            .ok_or_else(|| Error::Internal("function without execution context".into()))?;
        let mut popped = Vec::with_capacity(params.len());
        for _ in params {
            popped.push(self.pop()?.into());
        }
        let mut args = Vec::with_capacity(params.len() + 1);
        args.push(exec_ctx.into());
        args.extend(popped.into_iter().rev());
        Ok(args)
    }

    /// Push call results, unpacking the aggregate for multi-value returns.
    fn push_call_results(
        &mut self,
        ret: Option<BasicValueEnum<'ctx>>,
        result_count: usize,
    ) -> Result<()> {
        match ret {
            None => {}
            Some(BasicValueEnum::StructValue(packed)) => {
                for i in 0..result_count {
                    let field = self
                        .builder
                        .build_extract_value(packed, i as u32, "")?;
                    self.push(field);
                }
            }
            Some(single) => self.push(single),
        }
        Ok(())
    }

    fn translate_call(&mut self, func_idx: u32) -> Result<()> {
        self.flush_instr_count()?;
        self.flush_gas()?;
        let (type_idx, callee) = self.ctx.functions[func_idx as usize];
        let fty = self.ctx.func_type(type_idx).clone();
        let args = self.pop_call_args(fty.params())?;
        let ret = self
            .builder
            .build_call(callee, &args, "")?
            .try_as_basic_value()
            .left();
        self.push_call_results(ret, fty.results().len())
    }

    fn translate_return_call(&mut self, func_idx: u32) -> Result<()> {
        self.flush_instr_count()?;
        self.flush_gas()?;
        let (type_idx, callee) = self.ctx.functions[func_idx as usize];
        let fty = self.ctx.func_type(type_idx).clone();
        let args = self.pop_call_args(fty.params())?;
        let ret = self
            .builder
            .build_call(callee, &args, "")?
            .try_as_basic_value()
            .left();
        match ret {
            None => self.builder.build_return(None)?,
            Some(value) => self.builder.build_return(Some(&value))?,
        };
        self.continue_unreachable("ret_call.end");
        Ok(())
    }

    /// Store already-popped call arguments (execution context excluded) into
    /// a fresh scratch array of 16-byte slots.
    pub(crate) fn build_args_array(
        &mut self,
        args: &[BasicMetadataValueEnum<'ctx>],
    ) -> Result<PointerValue<'ctx>> {
        let count = args.len().saturating_sub(1) as u32;
        let array_ty = self.ctx.i8.array_type(count * abi::VALUE_SLOT_SIZE);
        let array = self.builder.build_alloca(array_ty, "args")?;
        for (i, arg) in args.iter().skip(1).enumerate() {
            let slot = unsafe {
                self.builder.build_in_bounds_gep(
                    self.ctx.i8,
                    array,
                    &[self
                        .ctx
                        .i64
                        .const_int(i as u64 * u64::from(abi::VALUE_SLOT_SIZE), false)],
                    "arg.slot",
                )?
            };
            let value: BasicValueEnum = match *arg {
                BasicMetadataValueEnum::IntValue(v) => v.into(),
                BasicMetadataValueEnum::FloatValue(v) => v.into(),
                BasicMetadataValueEnum::VectorValue(v) => v.into(),
                BasicMetadataValueEnum::PointerValue(v) => v.into(),
                _ => return Err(Error::Internal("unexpected call argument kind".into())),
            };
            self.builder.build_store(slot, value)?;
        }
        Ok(array)
    }

    /// Allocate the scratch array boxed calls write their results into.
    pub(crate) fn build_rets_array(&mut self, count: usize) -> Result<PointerValue<'ctx>> {
        let array_ty = self.ctx.i8.array_type(count as u32 * abi::VALUE_SLOT_SIZE);
        Ok(self.builder.build_alloca(array_ty, "rets")?)
    }

    /// Load boxed call results back out of the scratch array.
    pub(crate) fn load_rets_array(
        &mut self,
        array: PointerValue<'ctx>,
        results: &[ValType],
    ) -> Result<Vec<BasicValueEnum<'ctx>>> {
        let mut values = Vec::with_capacity(results.len());
        for (i, ty) in results.iter().enumerate() {
            let slot = unsafe {
                self.builder.build_in_bounds_gep(
                    self.ctx.i8,
                    array,
                    &[self
                        .ctx
                        .i64
                        .const_int(i as u64 * u64::from(abi::VALUE_SLOT_SIZE), false)],
                    "ret.slot",
                )?
            };
            values.push(self.builder.build_load(self.ctx.value_type(*ty), slot, "")?);
        }
        Ok(values)
    }

    /// `call_indirect`: resolve the concrete callee through the
    /// `TableGetFuncSymbol` intrinsic and call it directly when present;
    /// fall back to the boxed `CallIndirect` path otherwise. Both paths join
    /// on PHIs for the results.
    fn translate_call_indirect(&mut self, type_idx: u32, table_idx: u32) -> Result<()> {
        self.flush_instr_count()?;
        self.flush_gas()?;

        let fty = self.ctx.func_type(type_idx).clone();
        let ir_fty = self.ctx.function_type(&fty);
        let func_index = self.pop_int()?;
        let args = self.pop_call_args(fty.params())?;

        let not_null_bb = self.ctx.llctx.append_basic_block(self.function, "c_i.not_null");
        let is_null_bb = self.ctx.llctx.append_basic_block(self.function, "c_i.is_null");
        let end_bb = self.ctx.llctx.append_basic_block(self.function, "c_i.end");

        let symbol_ty = self.ctx.ptr.fn_type(
            &[self.ctx.i32.into(), self.ctx.i32.into(), self.ctx.i32.into()],
            false,
        );
        let fptr = self
            .ctx
            .build_intrinsic_call(
                &self.builder,
                Intrinsic::TableGetFuncSymbol,
                symbol_ty,
                &[
                    self.ctx.i32.const_int(table_idx.into(), false).into(),
                    self.ctx.i32.const_int(type_idx.into(), false).into(),
                    func_index.into(),
                ],
            )?
            .try_as_basic_value()
            .left()
            .ok_or_else(|| Error::Internal("TableGetFuncSymbol returned void".into()))?
            .into_pointer_value();
        let known = self.builder.build_is_not_null(fptr, "c_i.known")?;
        let known = self.ctx.expect_true(&self.builder, known)?;
        self.builder.build_conditional_branch(known, not_null_bb, is_null_bb)?;

        // Fast path: the table entry resolves to a native symbol.
        self.builder.position_at_end(not_null_bb);
        let direct_ret = self
            .builder
            .build_indirect_call(ir_fty, fptr, &args, "")?
            .try_as_basic_value()
            .left();
        let mut direct_rets = Vec::new();
        match direct_ret {
            None => {}
            Some(BasicValueEnum::StructValue(packed)) if fty.results().len() > 1 => {
                for i in 0..fty.results().len() {
                    direct_rets.push(self.builder.build_extract_value(packed, i as u32, "")?);
                }
            }
            Some(single) => direct_rets.push(single),
        }
        let not_null_exit = self.current_block()?;
        self.builder.build_unconditional_branch(end_bb)?;

        // Slow path: marshal through scratch arrays and let the runtime
        // dispatch (it also performs the type and bounds checks).
        self.builder.position_at_end(is_null_bb);
        let args_array = self.build_args_array(&args)?;
        let rets_array = self.build_rets_array(fty.results().len())?;
        let boxed_ty = self.ctx.llctx.void_type().fn_type(
            &[
                self.ctx.i32.into(),
                self.ctx.i32.into(),
                self.ctx.i32.into(),
                self.ctx.ptr.into(),
                self.ctx.ptr.into(),
            ],
            false,
        );
        self.ctx.build_intrinsic_call(
            &self.builder,
            Intrinsic::CallIndirect,
            boxed_ty,
            &[
                self.ctx.i32.const_int(table_idx.into(), false).into(),
                self.ctx.i32.const_int(type_idx.into(), false).into(),
                func_index.into(),
                args_array.into(),
                rets_array.into(),
            ],
        )?;
        let boxed_rets = self.load_rets_array(rets_array, fty.results())?;
        let is_null_exit = self.current_block()?;
        self.builder.build_unconditional_branch(end_bb)?;

        self.builder.position_at_end(end_bb);
        for (i, ty) in fty.results().iter().enumerate() {
            let phi = self.builder.build_phi(self.ctx.value_type(*ty), "")?;
            phi.add_incoming(&[(&direct_rets[i], not_null_exit), (&boxed_rets[i], is_null_exit)]);
            self.push(phi.as_basic_value());
        }
        Ok(())
    }

    fn translate_return_call_indirect(&mut self, type_idx: u32, table_idx: u32) -> Result<()> {
        self.flush_instr_count()?;
        self.flush_gas()?;

        let fty = self.ctx.func_type(type_idx).clone();
        let ir_fty = self.ctx.function_type(&fty);
        let func_index = self.pop_int()?;
        let args = self.pop_call_args(fty.params())?;

        let not_null_bb = self.ctx.llctx.append_basic_block(self.function, "rc_i.not_null");
        let is_null_bb = self.ctx.llctx.append_basic_block(self.function, "rc_i.is_null");

        let symbol_ty = self.ctx.ptr.fn_type(
            &[self.ctx.i32.into(), self.ctx.i32.into(), self.ctx.i32.into()],
            false,
        );
        let fptr = self
            .ctx
            .build_intrinsic_call(
                &self.builder,
                Intrinsic::TableGetFuncSymbol,
                symbol_ty,
                &[
                    self.ctx.i32.const_int(table_idx.into(), false).into(),
                    self.ctx.i32.const_int(type_idx.into(), false).into(),
                    func_index.into(),
                ],
            )?
            .try_as_basic_value()
            .left()
            .ok_or_else(|| Error::Internal("TableGetFuncSymbol returned void".into()))?
            .into_pointer_value();
        let known = self.builder.build_is_not_null(fptr, "rc_i.known")?;
        let known = self.ctx.expect_true(&self.builder, known)?;
        self.builder.build_conditional_branch(known, not_null_bb, is_null_bb)?;

        self.builder.position_at_end(not_null_bb);
        let ret = self
            .builder
            .build_indirect_call(ir_fty, fptr, &args, "")?
            .try_as_basic_value()
            .left();
        match ret {
            None => self.builder.build_return(None)?,
            Some(value) => self.builder.build_return(Some(&value))?,
        };

        self.builder.position_at_end(is_null_bb);
        let args_array = self.build_args_array(&args)?;
        let rets_array = self.build_rets_array(fty.results().len())?;
        let boxed_ty = self.ctx.llctx.void_type().fn_type(
            &[
                self.ctx.i32.into(),
                self.ctx.i32.into(),
                self.ctx.i32.into(),
                self.ctx.ptr.into(),
                self.ctx.ptr.into(),
            ],
            false,
        );
        self.ctx.build_intrinsic_call(
            &self.builder,
            Intrinsic::CallIndirect,
            boxed_ty,
            &[
                self.ctx.i32.const_int(table_idx.into(), false).into(),
                self.ctx.i32.const_int(type_idx.into(), false).into(),
                func_index.into(),
                args_array.into(),
                rets_array.into(),
            ],
        )?;
        self.return_boxed_results(rets_array, fty.results())?;

        self.continue_unreachable("rc_i.end");
        Ok(())
    }

    /// Return the results a boxed call left in the scratch array.
    fn return_boxed_results(
        &mut self,
        rets_array: PointerValue<'ctx>,
        results: &[ValType],
    ) -> Result<()> {
        let values = self.load_rets_array(rets_array, results)?;
        match values.len() {
            0 => {
                self.builder.build_return(None)?;
            }
            1 => {
                self.builder.build_return(Some(&values[0]))?;
            }
            _ => {
                self.builder.build_aggregate_return(&values)?;
            }
        }
        Ok(())
    }

    /// `call_ref`: trap on a null reference, then the same fast/slow split
    /// as `call_indirect` keyed on `RefGetFuncSymbol`.
    fn translate_call_ref(&mut self, type_idx: u32, tail: bool) -> Result<()> {
        self.flush_instr_count()?;
        self.flush_gas()?;

        let reference = self.pop()?.into_vector_value();
        let payload = self
            .builder
            .build_extract_element(reference, self.ctx.i64.const_int(1, false), "ref.payload")?
            .into_int_value();
        let non_null = self.builder.build_int_compare(
            IntPredicate::NE,
            payload,
            self.ctx.i64.const_zero(),
            "ref.non_null",
        )?;
        self.trap_unless(non_null, TrapCode::AccessNullFunc, "c_r.ref_ok")?;

        let fty = self.ctx.func_type(type_idx).clone();
        let ir_fty = self.ctx.function_type(&fty);
        let args = self.pop_call_args(fty.params())?;

        let not_null_bb = self.ctx.llctx.append_basic_block(self.function, "c_r.not_null");
        let is_null_bb = self.ctx.llctx.append_basic_block(self.function, "c_r.is_null");

        let symbol_ty = self.ctx.ptr.fn_type(&[self.ctx.i64x2.into()], false);
        let fptr = self
            .ctx
            .build_intrinsic_call(
                &self.builder,
                Intrinsic::RefGetFuncSymbol,
                symbol_ty,
                &[reference.into()],
            )?
            .try_as_basic_value()
            .left()
            .ok_or_else(|| Error::Internal("RefGetFuncSymbol returned void".into()))?
            .into_pointer_value();
        let known = self.builder.build_is_not_null(fptr, "c_r.known")?;
        let known = self.ctx.expect_true(&self.builder, known)?;
        self.builder.build_conditional_branch(known, not_null_bb, is_null_bb)?;

        let boxed_ty = self.ctx.llctx.void_type().fn_type(
            &[self.ctx.i64x2.into(), self.ctx.ptr.into(), self.ctx.ptr.into()],
            false,
        );

        if tail {
            self.builder.position_at_end(not_null_bb);
            let ret = self
                .builder
                .build_indirect_call(ir_fty, fptr, &args, "")?
                .try_as_basic_value()
                .left();
            match ret {
                None => self.builder.build_return(None)?,
                Some(value) => self.builder.build_return(Some(&value))?,
            };

            self.builder.position_at_end(is_null_bb);
            let args_array = self.build_args_array(&args)?;
            let rets_array = self.build_rets_array(fty.results().len())?;
            self.ctx.build_intrinsic_call(
                &self.builder,
                Intrinsic::CallRef,
                boxed_ty,
                &[reference.into(), args_array.into(), rets_array.into()],
            )?;
            self.return_boxed_results(rets_array, fty.results())?;
            self.continue_unreachable("rc_r.end");
            return Ok(());
        }

        let end_bb = self.ctx.llctx.append_basic_block(self.function, "c_r.end");

        self.builder.position_at_end(not_null_bb);
        let direct_ret = self
            .builder
            .build_indirect_call(ir_fty, fptr, &args, "")?
            .try_as_basic_value()
            .left();
        let mut direct_rets = Vec::new();
        match direct_ret {
            None => {}
            Some(BasicValueEnum::StructValue(packed)) if fty.results().len() > 1 => {
                for i in 0..fty.results().len() {
                    direct_rets.push(self.builder.build_extract_value(packed, i as u32, "")?);
                }
            }
            Some(single) => direct_rets.push(single),
        }
        let not_null_exit = self.current_block()?;
        self.builder.build_unconditional_branch(end_bb)?;

        self.builder.position_at_end(is_null_bb);
        let args_array = self.build_args_array(&args)?;
        let rets_array = self.build_rets_array(fty.results().len())?;
        self.ctx.build_intrinsic_call(
            &self.builder,
            Intrinsic::CallRef,
            boxed_ty,
            &[reference.into(), args_array.into(), rets_array.into()],
        )?;
        let boxed_rets = self.load_rets_array(rets_array, fty.results())?;
        let is_null_exit = self.current_block()?;
        self.builder.build_unconditional_branch(end_bb)?;

        self.builder.position_at_end(end_bb);
        for (i, ty) in fty.results().iter().enumerate() {
            let phi = self.builder.build_phi(self.ctx.value_type(*ty), "")?;
            phi.add_incoming(&[(&direct_rets[i], not_null_exit), (&boxed_rets[i], is_null_exit)]);
            self.push(phi.as_basic_value());
        }
        Ok(())
    }

    // ── Branches ──

    fn translate_br(&mut self, depth: u32) -> Result<()> {
        self.set_branch_values(depth)?;
        let target = self.branch_target(depth);
        self.builder.build_unconditional_branch(target)?;
        self.continue_unreachable("br.end");
        Ok(())
    }

    fn translate_br_if(&mut self, depth: u32) -> Result<()> {
        let value = self.pop_int()?;
        let cond = self.builder.build_int_compare(
            IntPredicate::NE,
            value,
            self.ctx.i32.const_zero(),
            "br_if.cond",
        )?;
        self.set_branch_values(depth)?;
        let target = self.branch_target(depth);
        let next = self.ctx.llctx.append_basic_block(self.function, "br_if.end");
        self.builder.build_conditional_branch(cond, target, next)?;
        self.builder.position_at_end(next);
        Ok(())
    }

    fn translate_br_table(&mut self, targets: &wasmparser::BrTable<'_>) -> Result<()> {
        let index = self.pop_int()?;
        let default_depth = targets.default();
        self.set_branch_values(default_depth)?;
        let default_block = self.branch_target(default_depth);

        let mut cases = Vec::with_capacity(targets.len() as usize);
        for (i, depth) in targets.targets().enumerate() {
            let depth = depth?;
            self.set_branch_values(depth)?;
            cases.push((
                self.ctx.i32.const_int(i as u64, false),
                self.branch_target(depth),
            ));
        }
        self.builder.build_switch(index, default_block, &cases)?;
        self.continue_unreachable("br_table.end");
        Ok(())
    }

    /// Branch on the reference payload lane: `br_on_null` jumps on zero
    /// (consuming the reference), `br_on_non_null` jumps on non-zero
    /// (keeping it for the target).
    fn translate_br_on_null(&mut self, depth: u32, on_null: bool) -> Result<()> {
        let reference = self.pop()?.into_vector_value();
        let payload = self
            .builder
            .build_extract_element(reference, self.ctx.i64.const_int(1, false), "ref.payload")?
            .into_int_value();
        let pred = if on_null { IntPredicate::EQ } else { IntPredicate::NE };
        let cond = self.builder.build_int_compare(
            pred,
            payload,
            self.ctx.i64.const_zero(),
            "ref.null_test",
        )?;
        if !on_null {
            // The branch carries the reference.
            self.push(reference);
        }
        self.set_branch_values(depth)?;
        if !on_null {
            self.pop()?;
        }
        let target = self.branch_target(depth);
        let next = self.ctx.llctx.append_basic_block(self.function, "br_on_null.end");
        self.builder.build_conditional_branch(cond, target, next)?;
        self.builder.position_at_end(next);
        if on_null {
            // The fall-through path keeps the (non-null) reference.
            self.push(reference);
        }
        Ok(())
    }

    /// `br_on_cast` / `br_on_cast_fail`: ask the runtime whether the
    /// reference matches the target heap type and branch on the answer.
    fn translate_br_on_cast(
        &mut self,
        depth: u32,
        to_type: &wasmparser::RefType,
        on_success: bool,
    ) -> Result<()> {
        let reference = self.peek()?.into_vector_value();
        let descriptor = self.heap_type_descriptor(to_type);
        let test_ty = self
            .ctx
            .i32
            .fn_type(&[self.ctx.i64x2.into(), self.ctx.i64.into()], false);
        let matched = self
            .ctx
            .build_intrinsic_call(
                &self.builder,
                Intrinsic::RefTest,
                test_ty,
                &[reference.into(), self.ctx.i64.const_int(descriptor, false).into()],
            )?
            .try_as_basic_value()
            .left()
            .ok_or_else(|| Error::Internal("RefTest returned void".into()))?
            .into_int_value();
        let pred = if on_success { IntPredicate::NE } else { IntPredicate::EQ };
        let cond = self.builder.build_int_compare(
            pred,
            matched,
            self.ctx.i32.const_zero(),
            "cast.test",
        )?;
        self.set_branch_values(depth)?;
        let target = self.branch_target(depth);
        let next = self.ctx.llctx.append_basic_block(self.function, "br_on_cast.end");
        self.builder.build_conditional_branch(cond, target, next)?;
        self.builder.position_at_end(next);
        Ok(())
    }

    fn translate_return(&mut self) -> Result<()> {
        self.build_return()?;
        self.continue_unreachable("ret.end");
        Ok(())
    }

    // ── Dispatch ──

    /// Lower one instruction. Frame bookkeeping operators run even inside
    /// unreachable code; everything else is skipped there.
    pub fn translate_operator(&mut self, op: &Operator<'_>) -> Result<()> {
        match op {
            Operator::Block { blockty } => return self.translate_block(blockty),
            Operator::Loop { blockty } => return self.translate_loop(blockty),
            Operator::If { blockty } => return self.translate_if(blockty),
            Operator::Else => return self.translate_else(),
            Operator::End => return self.translate_end(),
            _ => {}
        }
        if self.is_unreachable() {
            return Ok(());
        }

        match op {
            // === Control ===
            Operator::Unreachable => {
                let trap = self.trap_block(TrapCode::Unreachable);
                self.builder.build_unconditional_branch(trap)?;
                self.continue_unreachable("unreachable.end");
                Ok(())
            }
            Operator::Nop => Ok(()),
            Operator::Br { relative_depth } => self.translate_br(*relative_depth),
            Operator::BrIf { relative_depth } => self.translate_br_if(*relative_depth),
            Operator::BrTable { targets } => self.translate_br_table(targets),
            Operator::BrOnNull { relative_depth } => {
                self.translate_br_on_null(*relative_depth, true)
            }
            Operator::BrOnNonNull { relative_depth } => {
                self.translate_br_on_null(*relative_depth, false)
            }
            Operator::BrOnCast {
                relative_depth,
                to_ref_type,
                ..
            } => self.translate_br_on_cast(*relative_depth, to_ref_type, true),
            Operator::BrOnCastFail {
                relative_depth,
                to_ref_type,
                ..
            } => self.translate_br_on_cast(*relative_depth, to_ref_type, false),
            Operator::Return => self.translate_return(),
            Operator::Call { function_index } => self.translate_call(*function_index),
            Operator::ReturnCall { function_index } => {
                self.translate_return_call(*function_index)
            }
            Operator::CallIndirect {
                type_index,
                table_index,
            } => self.translate_call_indirect(*type_index, *table_index),
            Operator::ReturnCallIndirect {
                type_index,
                table_index,
            } => self.translate_return_call_indirect(*type_index, *table_index),
            Operator::CallRef { type_index } => self.translate_call_ref(*type_index, false),
            Operator::ReturnCallRef { type_index } => self.translate_call_ref(*type_index, true),

            // === Parametric ===
            Operator::Drop => {
                self.pop()?;
                Ok(())
            }
            Operator::Select | Operator::TypedSelect { .. } => {
                let cond = self.pop_int()?;
                let on_false = self.pop()?;
                let on_true = self.pop()?;
                let test = self.builder.build_int_compare(
                    IntPredicate::NE,
                    cond,
                    self.ctx.i32.const_zero(),
                    "select.cond",
                )?;
                let value = self.builder.build_select(test, on_true, on_false, "select")?;
                self.push(value);
                Ok(())
            }

            // === Variables ===
            Operator::LocalGet { local_index } => {
                let (ty, slot) = self.locals[*local_index as usize];
                let value = self.builder.build_load(ty, slot, "")?;
                self.push(value);
                Ok(())
            }
            Operator::LocalSet { local_index } => {
                let value = self.pop()?;
                let (_, slot) = self.locals[*local_index as usize];
                self.builder.build_store(slot, value)?;
                Ok(())
            }
            Operator::LocalTee { local_index } => {
                let value = self.peek()?;
                let (_, slot) = self.locals[*local_index as usize];
                self.builder.build_store(slot, value)?;
                Ok(())
            }
            Operator::GlobalGet { global_index } => {
                let (ty, cell) = self.ctx.get_global(&self.builder, self.exec_ctx, *global_index)?;
                let value = self.builder.build_load(ty, cell, "")?;
                self.push(value);
                Ok(())
            }
            Operator::GlobalSet { global_index } => {
                let value = self.pop()?;
                let (_, cell) = self.ctx.get_global(&self.builder, self.exec_ctx, *global_index)?;
                self.builder.build_store(cell, value)?;
                Ok(())
            }

            _ => self.translate_value_operator(op),
        }
    }
}
