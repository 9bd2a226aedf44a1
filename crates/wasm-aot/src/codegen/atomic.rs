//! Atomic operator lowerings.
//!
//! Every atomic access validates that the effective address is aligned to
//! the access width; the static alignment annotation is not trusted. All
//! orderings are sequentially consistent, matching the WASM threads
//! proposal.

use inkwell::types::IntType;
use inkwell::values::{IntValue, PointerValue};
use inkwell::{AtomicOrdering, AtomicRMWBinOp, IntPredicate};
use wasmparser::{MemArg, Operator};

use crate::abi::{Intrinsic, TrapCode};
use crate::codegen::function::FunctionTranslator;
use crate::{Error, Result};

impl<'ctx, 'm> FunctionTranslator<'ctx, 'm> {
    /// Trap unless `addr` is aligned to the access width.
    fn check_atomic_alignment(&mut self, addr: IntValue<'ctx>, width_bits: u32) -> Result<()> {
        let mask = self
            .ctx
            .i64
            .const_int(u64::from(width_bits / 8) - 1, false);
        let low = self.builder.build_and(addr, mask, "")?;
        let aligned = self.builder.build_int_compare(
            IntPredicate::EQ,
            low,
            self.ctx.i64.const_zero(),
            "aligned",
        )?;
        self.trap_unless(aligned, TrapCode::UnalignedAtomicAccess, "align.ok")
    }

    /// Pop the address operand and produce the (checked) pointer for an
    /// atomic access of `width_bits`.
    fn atomic_ptr(&mut self, memarg: &MemArg, width_bits: u32) -> Result<PointerValue<'ctx>> {
        let addr = self.effective_address(memarg.offset)?;
        self.check_atomic_alignment(addr, width_bits)?;
        self.memory_ptr(memarg.memory, addr)
    }

    fn atomic_load(
        &mut self,
        memarg: &MemArg,
        width_bits: u32,
        result_ty: IntType<'ctx>,
    ) -> Result<()> {
        let ptr = self.atomic_ptr(memarg, width_bits)?;
        let ty = self.ctx.llctx.custom_width_int_type(width_bits);
        let value = self.builder.build_load(ty, ptr, "")?;
        if let Some(inst) = inkwell::values::BasicValue::as_instruction_value(&value) {
            let _ = inst.set_alignment(width_bits / 8);
            let _ = inst.set_atomic_ordering(AtomicOrdering::SequentiallyConsistent);
        }
        let value = value.into_int_value();
        let wide = if width_bits < result_ty.get_bit_width() {
            self.builder.build_int_z_extend(value, result_ty, "")?
        } else {
            value
        };
        self.push(wide);
        Ok(())
    }

    fn atomic_store(&mut self, memarg: &MemArg, width_bits: u32) -> Result<()> {
        let value = self.pop_int()?;
        let ty = self.ctx.llctx.custom_width_int_type(width_bits);
        let narrow = if width_bits < value.get_type().get_bit_width() {
            self.builder.build_int_truncate(value, ty, "")?
        } else {
            value
        };
        let ptr = self.atomic_ptr(memarg, width_bits)?;
        let inst = self.builder.build_store(ptr, narrow)?;
        let _ = inst.set_alignment(width_bits / 8);
        let _ = inst.set_atomic_ordering(AtomicOrdering::SequentiallyConsistent);
        Ok(())
    }

    fn atomic_rmw(
        &mut self,
        memarg: &MemArg,
        op: AtomicRMWBinOp,
        width_bits: u32,
        result_ty: IntType<'ctx>,
    ) -> Result<()> {
        let value = self.pop_int()?;
        let ty = self.ctx.llctx.custom_width_int_type(width_bits);
        let narrow = if width_bits < value.get_type().get_bit_width() {
            self.builder.build_int_truncate(value, ty, "")?
        } else {
            value
        };
        let ptr = self.atomic_ptr(memarg, width_bits)?;
        let old = self
            .builder
            .build_atomicrmw(op, ptr, narrow, AtomicOrdering::SequentiallyConsistent)?;
        let wide = if width_bits < result_ty.get_bit_width() {
            self.builder.build_int_z_extend(old, result_ty, "")?
        } else {
            old
        };
        self.push(wide);
        Ok(())
    }

    fn atomic_cmpxchg(
        &mut self,
        memarg: &MemArg,
        width_bits: u32,
        result_ty: IntType<'ctx>,
    ) -> Result<()> {
        let replacement = self.pop_int()?;
        let expected = self.pop_int()?;
        let ty = self.ctx.llctx.custom_width_int_type(width_bits);
        let (expected, replacement) = if width_bits < result_ty.get_bit_width() {
            (
                self.builder.build_int_truncate(expected, ty, "")?,
                self.builder.build_int_truncate(replacement, ty, "")?,
            )
        } else {
            (expected, replacement)
        };
        let ptr = self.atomic_ptr(memarg, width_bits)?;
        let pair = self.builder.build_cmpxchg(
            ptr,
            expected,
            replacement,
            AtomicOrdering::SequentiallyConsistent,
            AtomicOrdering::SequentiallyConsistent,
        )?;
        let old = self
            .builder
            .build_extract_value(pair, 0, "")?
            .into_int_value();
        let wide = if width_bits < result_ty.get_bit_width() {
            self.builder.build_int_z_extend(old, result_ty, "")?
        } else {
            old
        };
        self.push(wide);
        Ok(())
    }

    /// `memory.atomic.wait32/64`: `[addr, expected, timeout]`, runtime
    /// returns 0 (woken), 1 (mismatch) or 2 (timed out).
    fn atomic_wait(&mut self, memarg: &MemArg, width_bits: u32) -> Result<()> {
        let timeout = self.pop_int()?;
        let expected = self.pop_int()?;
        let expected = if width_bits < 64 {
            self.builder.build_int_z_extend(expected, self.ctx.i64, "")?
        } else {
            expected
        };
        let addr = self.effective_address(memarg.offset)?;
        self.check_atomic_alignment(addr, width_bits)?;

        let fn_ty = self.ctx.i32.fn_type(
            &[
                self.ctx.i32.into(),
                self.ctx.i64.into(),
                self.ctx.i64.into(),
                self.ctx.i64.into(),
                self.ctx.i32.into(),
            ],
            false,
        );
        let result = self
            .ctx
            .build_intrinsic_call(
                &self.builder,
                Intrinsic::MemAtomicWait,
                fn_ty,
                &[
                    self.ctx.i32.const_int(memarg.memory.into(), false).into(),
                    addr.into(),
                    expected.into(),
                    timeout.into(),
                    self.ctx.i32.const_int(width_bits.into(), false).into(),
                ],
            )?
            .try_as_basic_value()
            .left()
            .ok_or_else(|| Error::Internal("MemAtomicWait returned void".into()))?;
        self.push(result);
        Ok(())
    }

    pub(crate) fn translate_atomic_operator(&mut self, op: &Operator<'_>) -> Result<()> {
        use AtomicRMWBinOp::{Add, And, Or, Sub, Xchg, Xor};
        let i32t = self.ctx.i32;
        let i64t = self.ctx.i64;

        match op {
            Operator::AtomicFence => {
                self.builder
                    .build_fence(AtomicOrdering::SequentiallyConsistent, "")?;
                Ok(())
            }
            Operator::MemoryAtomicNotify { memarg } => {
                let count = self.pop_int()?;
                let addr = self.effective_address(memarg.offset)?;
                self.check_atomic_alignment(addr, 32)?;
                let fn_ty = i32t.fn_type(
                    &[i32t.into(), self.ctx.i64.into(), i32t.into()],
                    false,
                );
                let woken = self
                    .ctx
                    .build_intrinsic_call(
                        &self.builder,
                        Intrinsic::MemAtomicNotify,
                        fn_ty,
                        &[
                            i32t.const_int(memarg.memory.into(), false).into(),
                            addr.into(),
                            count.into(),
                        ],
                    )?
                    .try_as_basic_value()
                    .left()
                    .ok_or_else(|| Error::Internal("MemAtomicNotify returned void".into()))?;
                self.push(woken);
                Ok(())
            }
            Operator::MemoryAtomicWait32 { memarg } => self.atomic_wait(memarg, 32),
            Operator::MemoryAtomicWait64 { memarg } => self.atomic_wait(memarg, 64),

            Operator::I32AtomicLoad { memarg } => self.atomic_load(memarg, 32, i32t),
            Operator::I32AtomicLoad8U { memarg } => self.atomic_load(memarg, 8, i32t),
            Operator::I32AtomicLoad16U { memarg } => self.atomic_load(memarg, 16, i32t),
            Operator::I64AtomicLoad { memarg } => self.atomic_load(memarg, 64, i64t),
            Operator::I64AtomicLoad8U { memarg } => self.atomic_load(memarg, 8, i64t),
            Operator::I64AtomicLoad16U { memarg } => self.atomic_load(memarg, 16, i64t),
            Operator::I64AtomicLoad32U { memarg } => self.atomic_load(memarg, 32, i64t),

            Operator::I32AtomicStore { memarg } => self.atomic_store(memarg, 32),
            Operator::I32AtomicStore8 { memarg } => self.atomic_store(memarg, 8),
            Operator::I32AtomicStore16 { memarg } => self.atomic_store(memarg, 16),
            Operator::I64AtomicStore { memarg } => self.atomic_store(memarg, 64),
            Operator::I64AtomicStore8 { memarg } => self.atomic_store(memarg, 8),
            Operator::I64AtomicStore16 { memarg } => self.atomic_store(memarg, 16),
            Operator::I64AtomicStore32 { memarg } => self.atomic_store(memarg, 32),

            Operator::I32AtomicRmwAdd { memarg } => self.atomic_rmw(memarg, Add, 32, i32t),
            Operator::I32AtomicRmw8AddU { memarg } => self.atomic_rmw(memarg, Add, 8, i32t),
            Operator::I32AtomicRmw16AddU { memarg } => self.atomic_rmw(memarg, Add, 16, i32t),
            Operator::I64AtomicRmwAdd { memarg } => self.atomic_rmw(memarg, Add, 64, i64t),
            Operator::I64AtomicRmw8AddU { memarg } => self.atomic_rmw(memarg, Add, 8, i64t),
            Operator::I64AtomicRmw16AddU { memarg } => self.atomic_rmw(memarg, Add, 16, i64t),
            Operator::I64AtomicRmw32AddU { memarg } => self.atomic_rmw(memarg, Add, 32, i64t),

            Operator::I32AtomicRmwSub { memarg } => self.atomic_rmw(memarg, Sub, 32, i32t),
            Operator::I32AtomicRmw8SubU { memarg } => self.atomic_rmw(memarg, Sub, 8, i32t),
            Operator::I32AtomicRmw16SubU { memarg } => self.atomic_rmw(memarg, Sub, 16, i32t),
            Operator::I64AtomicRmwSub { memarg } => self.atomic_rmw(memarg, Sub, 64, i64t),
            Operator::I64AtomicRmw8SubU { memarg } => self.atomic_rmw(memarg, Sub, 8, i64t),
            Operator::I64AtomicRmw16SubU { memarg } => self.atomic_rmw(memarg, Sub, 16, i64t),
            Operator::I64AtomicRmw32SubU { memarg } => self.atomic_rmw(memarg, Sub, 32, i64t),

            Operator::I32AtomicRmwAnd { memarg } => self.atomic_rmw(memarg, And, 32, i32t),
            Operator::I32AtomicRmw8AndU { memarg } => self.atomic_rmw(memarg, And, 8, i32t),
            Operator::I32AtomicRmw16AndU { memarg } => self.atomic_rmw(memarg, And, 16, i32t),
            Operator::I64AtomicRmwAnd { memarg } => self.atomic_rmw(memarg, And, 64, i64t),
            Operator::I64AtomicRmw8AndU { memarg } => self.atomic_rmw(memarg, And, 8, i64t),
            Operator::I64AtomicRmw16AndU { memarg } => self.atomic_rmw(memarg, And, 16, i64t),
            Operator::I64AtomicRmw32AndU { memarg } => self.atomic_rmw(memarg, And, 32, i64t),

            Operator::I32AtomicRmwOr { memarg } => self.atomic_rmw(memarg, Or, 32, i32t),
            Operator::I32AtomicRmw8OrU { memarg } => self.atomic_rmw(memarg, Or, 8, i32t),
            Operator::I32AtomicRmw16OrU { memarg } => self.atomic_rmw(memarg, Or, 16, i32t),
            Operator::I64AtomicRmwOr { memarg } => self.atomic_rmw(memarg, Or, 64, i64t),
            Operator::I64AtomicRmw8OrU { memarg } => self.atomic_rmw(memarg, Or, 8, i64t),
            Operator::I64AtomicRmw16OrU { memarg } => self.atomic_rmw(memarg, Or, 16, i64t),
            Operator::I64AtomicRmw32OrU { memarg } => self.atomic_rmw(memarg, Or, 32, i64t),

            Operator::I32AtomicRmwXor { memarg } => self.atomic_rmw(memarg, Xor, 32, i32t),
            Operator::I32AtomicRmw8XorU { memarg } => self.atomic_rmw(memarg, Xor, 8, i32t),
            Operator::I32AtomicRmw16XorU { memarg } => self.atomic_rmw(memarg, Xor, 16, i32t),
            Operator::I64AtomicRmwXor { memarg } => self.atomic_rmw(memarg, Xor, 64, i64t),
            Operator::I64AtomicRmw8XorU { memarg } => self.atomic_rmw(memarg, Xor, 8, i64t),
            Operator::I64AtomicRmw16XorU { memarg } => self.atomic_rmw(memarg, Xor, 16, i64t),
            Operator::I64AtomicRmw32XorU { memarg } => self.atomic_rmw(memarg, Xor, 32, i64t),

            Operator::I32AtomicRmwXchg { memarg } => self.atomic_rmw(memarg, Xchg, 32, i32t),
            Operator::I32AtomicRmw8XchgU { memarg } => self.atomic_rmw(memarg, Xchg, 8, i32t),
            Operator::I32AtomicRmw16XchgU { memarg } => self.atomic_rmw(memarg, Xchg, 16, i32t),
            Operator::I64AtomicRmwXchg { memarg } => self.atomic_rmw(memarg, Xchg, 64, i64t),
            Operator::I64AtomicRmw8XchgU { memarg } => self.atomic_rmw(memarg, Xchg, 8, i64t),
            Operator::I64AtomicRmw16XchgU { memarg } => self.atomic_rmw(memarg, Xchg, 16, i64t),
            Operator::I64AtomicRmw32XchgU { memarg } => self.atomic_rmw(memarg, Xchg, 32, i64t),

            Operator::I32AtomicRmwCmpxchg { memarg } => self.atomic_cmpxchg(memarg, 32, i32t),
            Operator::I32AtomicRmw8CmpxchgU { memarg } => self.atomic_cmpxchg(memarg, 8, i32t),
            Operator::I32AtomicRmw16CmpxchgU { memarg } => self.atomic_cmpxchg(memarg, 16, i32t),
            Operator::I64AtomicRmwCmpxchg { memarg } => self.atomic_cmpxchg(memarg, 64, i64t),
            Operator::I64AtomicRmw8CmpxchgU { memarg } => self.atomic_cmpxchg(memarg, 8, i64t),
            Operator::I64AtomicRmw16CmpxchgU { memarg } => self.atomic_cmpxchg(memarg, 16, i64t),
            Operator::I64AtomicRmw32CmpxchgU { memarg } => self.atomic_cmpxchg(memarg, 32, i64t),

            _ => Err(Error::UnsupportedOperator(format!("{op:?}"))),
        }
    }
}
