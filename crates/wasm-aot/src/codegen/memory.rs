//! Memory and table operator lowerings.
//!
//! Non-atomic accesses are emitted with alignment 1: the static alignment
//! hint in the instruction is advisory and misaligned pointers must still
//! work. Bounds checking is the runtime's concern (guard pages); the
//! compiler only computes effective addresses.

use inkwell::types::BasicTypeEnum;
use inkwell::values::{BasicValueEnum, IntValue, PointerValue};
use wasmparser::{MemArg, Operator};

use crate::abi::Intrinsic;
use crate::codegen::function::FunctionTranslator;
use crate::{Error, Result};

impl<'ctx, 'm> FunctionTranslator<'ctx, 'm> {
    /// Pop the address operand, widen it to 64 bits, and add the static
    /// offset.
    pub(crate) fn effective_address(&mut self, offset: u64) -> Result<IntValue<'ctx>> {
        let addr = self.pop_int()?;
        let wide = self.builder.build_int_z_extend(addr, self.ctx.i64, "addr")?;
        if offset == 0 {
            return Ok(wide);
        }
        Ok(self.builder.build_int_add(
            wide,
            self.ctx.i64.const_int(offset, false),
            "addr.off",
        )?)
    }

    /// Pointer into linear memory `memory_index` at `addr`.
    pub(crate) fn memory_ptr(
        &mut self,
        memory_index: u32,
        addr: IntValue<'ctx>,
    ) -> Result<PointerValue<'ctx>> {
        let base = self.ctx.get_memory(&self.builder, self.exec_ctx, memory_index)?;
        Ok(unsafe {
            self.builder
                .build_in_bounds_gep(self.ctx.i8, base, &[addr], "mem.ptr")?
        })
    }

    /// Plain (non-atomic) load: volatile, alignment forced to 1.
    pub(crate) fn load_from_memory(
        &mut self,
        memarg: &MemArg,
        ty: BasicTypeEnum<'ctx>,
    ) -> Result<BasicValueEnum<'ctx>> {
        let addr = self.effective_address(memarg.offset)?;
        let ptr = self.memory_ptr(memarg.memory, addr)?;
        let value = self.builder.build_load(ty, ptr, "")?;
        if let Some(inst) = inkwell::values::BasicValue::as_instruction_value(&value) {
            let _ = inst.set_volatile(true);
            let _ = inst.set_alignment(1);
        }
        Ok(value)
    }

    /// Plain (non-atomic) store: volatile, alignment forced to 1.
    pub(crate) fn store_to_memory(
        &mut self,
        memarg: &MemArg,
        value: BasicValueEnum<'ctx>,
    ) -> Result<()> {
        let addr = self.effective_address(memarg.offset)?;
        let ptr = self.memory_ptr(memarg.memory, addr)?;
        let inst = self.builder.build_store(ptr, value)?;
        let _ = inst.set_volatile(true);
        let _ = inst.set_alignment(1);
        Ok(())
    }

    fn load(&mut self, memarg: &MemArg, ty: BasicTypeEnum<'ctx>) -> Result<()> {
        let value = self.load_from_memory(memarg, ty)?;
        self.push(value);
        Ok(())
    }

    /// Narrow load followed by an extension to the operand type.
    fn load_extend(
        &mut self,
        memarg: &MemArg,
        narrow_bits: u32,
        wide: inkwell::types::IntType<'ctx>,
        signed: bool,
    ) -> Result<()> {
        let narrow_ty = self.ctx.llctx.custom_width_int_type(narrow_bits);
        let value = self.load_from_memory(memarg, narrow_ty.into())?.into_int_value();
        let extended = if signed {
            self.builder.build_int_s_extend(value, wide, "")?
        } else {
            self.builder.build_int_z_extend(value, wide, "")?
        };
        self.push(extended);
        Ok(())
    }

    fn store(&mut self, memarg: &MemArg) -> Result<()> {
        let value = self.pop()?;
        self.store_to_memory(memarg, value)
    }

    /// Truncate to the narrow width, then store.
    fn store_narrow(&mut self, memarg: &MemArg, narrow_bits: u32) -> Result<()> {
        let value = self.pop_int()?;
        let narrow_ty = self.ctx.llctx.custom_width_int_type(narrow_bits);
        let narrow = self.builder.build_int_truncate(value, narrow_ty, "")?;
        self.store_to_memory(memarg, narrow.into())
    }

    pub(crate) fn translate_memory_operator(&mut self, op: &Operator<'_>) -> Result<()> {
        match op {
            // === Loads ===
            Operator::I32Load { memarg } => self.load(memarg, self.ctx.i32.into()),
            Operator::I64Load { memarg } => self.load(memarg, self.ctx.i64.into()),
            Operator::F32Load { memarg } => self.load(memarg, self.ctx.f32.into()),
            Operator::F64Load { memarg } => self.load(memarg, self.ctx.f64.into()),
            Operator::I32Load8S { memarg } => self.load_extend(memarg, 8, self.ctx.i32, true),
            Operator::I32Load8U { memarg } => self.load_extend(memarg, 8, self.ctx.i32, false),
            Operator::I32Load16S { memarg } => self.load_extend(memarg, 16, self.ctx.i32, true),
            Operator::I32Load16U { memarg } => self.load_extend(memarg, 16, self.ctx.i32, false),
            Operator::I64Load8S { memarg } => self.load_extend(memarg, 8, self.ctx.i64, true),
            Operator::I64Load8U { memarg } => self.load_extend(memarg, 8, self.ctx.i64, false),
            Operator::I64Load16S { memarg } => self.load_extend(memarg, 16, self.ctx.i64, true),
            Operator::I64Load16U { memarg } => self.load_extend(memarg, 16, self.ctx.i64, false),
            Operator::I64Load32S { memarg } => self.load_extend(memarg, 32, self.ctx.i64, true),
            Operator::I64Load32U { memarg } => self.load_extend(memarg, 32, self.ctx.i64, false),

            // === Stores ===
            Operator::I32Store { memarg }
            | Operator::I64Store { memarg }
            | Operator::F32Store { memarg }
            | Operator::F64Store { memarg } => self.store(memarg),
            Operator::I32Store8 { memarg } | Operator::I64Store8 { memarg } => {
                self.store_narrow(memarg, 8)
            }
            Operator::I32Store16 { memarg } | Operator::I64Store16 { memarg } => {
                self.store_narrow(memarg, 16)
            }
            Operator::I64Store32 { memarg } => self.store_narrow(memarg, 32),

            // === Memory management ===
            Operator::MemorySize { mem } => {
                let fn_ty = self.ctx.i32.fn_type(&[self.ctx.i32.into()], false);
                let pages = self
                    .ctx
                    .build_intrinsic_call(
                        &self.builder,
                        Intrinsic::MemorySize,
                        fn_ty,
                        &[self.ctx.i32.const_int((*mem).into(), false).into()],
                    )?
                    .try_as_basic_value()
                    .left()
                    .ok_or_else(|| Error::Internal("MemorySize returned void".into()))?;
                self.push(pages);
                Ok(())
            }
            Operator::MemoryGrow { mem } => {
                let delta = self.pop_int()?;
                let fn_ty = self
                    .ctx
                    .i32
                    .fn_type(&[self.ctx.i32.into(), self.ctx.i32.into()], false);
                let prev = self
                    .ctx
                    .build_intrinsic_call(
                        &self.builder,
                        Intrinsic::MemoryGrow,
                        fn_ty,
                        &[
                            self.ctx.i32.const_int((*mem).into(), false).into(),
                            delta.into(),
                        ],
                    )?
                    .try_as_basic_value()
                    .left()
                    .ok_or_else(|| Error::Internal("MemoryGrow returned void".into()))?;
                self.push(prev);
                Ok(())
            }
            Operator::MemoryInit { data_index, mem } => {
                let len = self.pop_int()?;
                let src = self.pop_int()?;
                let dst = self.pop_int()?;
                let i32t = self.ctx.i32;
                let fn_ty = self.ctx.llctx.void_type().fn_type(
                    &[i32t.into(), i32t.into(), i32t.into(), i32t.into(), i32t.into()],
                    false,
                );
                self.ctx.build_intrinsic_call(
                    &self.builder,
                    Intrinsic::MemoryInit,
                    fn_ty,
                    &[
                        i32t.const_int((*mem).into(), false).into(),
                        i32t.const_int((*data_index).into(), false).into(),
                        dst.into(),
                        src.into(),
                        len.into(),
                    ],
                )?;
                Ok(())
            }
            Operator::MemoryCopy { dst_mem, src_mem } => {
                let len = self.pop_int()?;
                let src = self.pop_int()?;
                let dst = self.pop_int()?;
                let i32t = self.ctx.i32;
                let fn_ty = self.ctx.llctx.void_type().fn_type(
                    &[i32t.into(), i32t.into(), i32t.into(), i32t.into(), i32t.into()],
                    false,
                );
                self.ctx.build_intrinsic_call(
                    &self.builder,
                    Intrinsic::MemoryCopy,
                    fn_ty,
                    &[
                        i32t.const_int((*dst_mem).into(), false).into(),
                        i32t.const_int((*src_mem).into(), false).into(),
                        dst.into(),
                        src.into(),
                        len.into(),
                    ],
                )?;
                Ok(())
            }
            Operator::MemoryFill { mem } => {
                let len = self.pop_int()?;
                let value = self.pop_int()?;
                let dst = self.pop_int()?;
                let i32t = self.ctx.i32;
                let fn_ty = self.ctx.llctx.void_type().fn_type(
                    &[i32t.into(), i32t.into(), i32t.into(), i32t.into()],
                    false,
                );
                self.ctx.build_intrinsic_call(
                    &self.builder,
                    Intrinsic::MemoryFill,
                    fn_ty,
                    &[
                        i32t.const_int((*mem).into(), false).into(),
                        dst.into(),
                        value.into(),
                        len.into(),
                    ],
                )?;
                Ok(())
            }
            Operator::DataDrop { data_index } => {
                let fn_ty = self
                    .ctx
                    .llctx
                    .void_type()
                    .fn_type(&[self.ctx.i32.into()], false);
                self.ctx.build_intrinsic_call(
                    &self.builder,
                    Intrinsic::DataDrop,
                    fn_ty,
                    &[self.ctx.i32.const_int((*data_index).into(), false).into()],
                )?;
                Ok(())
            }

            // === Tables ===
            Operator::TableGet { table } => {
                let index = self.pop_int()?;
                let fn_ty = self
                    .ctx
                    .i64x2
                    .fn_type(&[self.ctx.i32.into(), self.ctx.i32.into()], false);
                let value = self
                    .ctx
                    .build_intrinsic_call(
                        &self.builder,
                        Intrinsic::TableGet,
                        fn_ty,
                        &[
                            self.ctx.i32.const_int((*table).into(), false).into(),
                            index.into(),
                        ],
                    )?
                    .try_as_basic_value()
                    .left()
                    .ok_or_else(|| Error::Internal("TableGet returned void".into()))?;
                self.push(value);
                Ok(())
            }
            Operator::TableSet { table } => {
                let value = self.pop()?;
                let index = self.pop_int()?;
                let fn_ty = self.ctx.llctx.void_type().fn_type(
                    &[self.ctx.i32.into(), self.ctx.i32.into(), self.ctx.i64x2.into()],
                    false,
                );
                self.ctx.build_intrinsic_call(
                    &self.builder,
                    Intrinsic::TableSet,
                    fn_ty,
                    &[
                        self.ctx.i32.const_int((*table).into(), false).into(),
                        index.into(),
                        value.into(),
                    ],
                )?;
                Ok(())
            }
            Operator::TableInit { elem_index, table } => {
                let len = self.pop_int()?;
                let src = self.pop_int()?;
                let dst = self.pop_int()?;
                let i32t = self.ctx.i32;
                let fn_ty = self.ctx.llctx.void_type().fn_type(
                    &[i32t.into(), i32t.into(), i32t.into(), i32t.into(), i32t.into()],
                    false,
                );
                self.ctx.build_intrinsic_call(
                    &self.builder,
                    Intrinsic::TableInit,
                    fn_ty,
                    &[
                        i32t.const_int((*table).into(), false).into(),
                        i32t.const_int((*elem_index).into(), false).into(),
                        dst.into(),
                        src.into(),
                        len.into(),
                    ],
                )?;
                Ok(())
            }
            Operator::TableCopy { dst_table, src_table } => {
                let len = self.pop_int()?;
                let src = self.pop_int()?;
                let dst = self.pop_int()?;
                let i32t = self.ctx.i32;
                let fn_ty = self.ctx.llctx.void_type().fn_type(
                    &[i32t.into(), i32t.into(), i32t.into(), i32t.into(), i32t.into()],
                    false,
                );
                self.ctx.build_intrinsic_call(
                    &self.builder,
                    Intrinsic::TableCopy,
                    fn_ty,
                    &[
                        i32t.const_int((*dst_table).into(), false).into(),
                        i32t.const_int((*src_table).into(), false).into(),
                        dst.into(),
                        src.into(),
                        len.into(),
                    ],
                )?;
                Ok(())
            }
            Operator::TableGrow { table } => {
                let delta = self.pop_int()?;
                let init = self.pop()?;
                let fn_ty = self.ctx.i32.fn_type(
                    &[self.ctx.i32.into(), self.ctx.i64x2.into(), self.ctx.i32.into()],
                    false,
                );
                let prev = self
                    .ctx
                    .build_intrinsic_call(
                        &self.builder,
                        Intrinsic::TableGrow,
                        fn_ty,
                        &[
                            self.ctx.i32.const_int((*table).into(), false).into(),
                            init.into(),
                            delta.into(),
                        ],
                    )?
                    .try_as_basic_value()
                    .left()
                    .ok_or_else(|| Error::Internal("TableGrow returned void".into()))?;
                self.push(prev);
                Ok(())
            }
            Operator::TableSize { table } => {
                let fn_ty = self.ctx.i32.fn_type(&[self.ctx.i32.into()], false);
                let size = self
                    .ctx
                    .build_intrinsic_call(
                        &self.builder,
                        Intrinsic::TableSize,
                        fn_ty,
                        &[self.ctx.i32.const_int((*table).into(), false).into()],
                    )?
                    .try_as_basic_value()
                    .left()
                    .ok_or_else(|| Error::Internal("TableSize returned void".into()))?;
                self.push(size);
                Ok(())
            }
            Operator::TableFill { table } => {
                let len = self.pop_int()?;
                let value = self.pop()?;
                let dst = self.pop_int()?;
                let fn_ty = self.ctx.llctx.void_type().fn_type(
                    &[
                        self.ctx.i32.into(),
                        self.ctx.i32.into(),
                        self.ctx.i64x2.into(),
                        self.ctx.i32.into(),
                    ],
                    false,
                );
                self.ctx.build_intrinsic_call(
                    &self.builder,
                    Intrinsic::TableFill,
                    fn_ty,
                    &[
                        self.ctx.i32.const_int((*table).into(), false).into(),
                        dst.into(),
                        value.into(),
                        len.into(),
                    ],
                )?;
                Ok(())
            }
            Operator::ElemDrop { elem_index } => {
                let fn_ty = self
                    .ctx
                    .llctx
                    .void_type()
                    .fn_type(&[self.ctx.i32.into()], false);
                self.ctx.build_intrinsic_call(
                    &self.builder,
                    Intrinsic::ElemDrop,
                    fn_ty,
                    &[self.ctx.i32.const_int((*elem_index).into(), false).into()],
                )?;
                Ok(())
            }

            _ => self.translate_reference_operator(op),
        }
    }
}
