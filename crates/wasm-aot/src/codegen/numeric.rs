//! Numeric operator lowerings: constants, integer and float arithmetic,
//! comparisons, conversions, and the trapping/saturating truncations.

use inkwell::types::BasicTypeEnum;
use inkwell::values::{BasicMetadataValueEnum, BasicValueEnum, FloatValue, IntValue};
use inkwell::{FloatPredicate, IntPredicate};
use wasmparser::Operator;

use crate::abi::TrapCode;
use crate::codegen::function::FunctionTranslator;
use crate::{Error, Result};

impl<'ctx, 'm> FunctionTranslator<'ctx, 'm> {
    /// Call a named LLVM intrinsic, e.g. `llvm.ctpop` overloaded on `i32`.
    pub(crate) fn call_llvm_intrinsic(
        &mut self,
        name: &str,
        overload: &[BasicTypeEnum<'ctx>],
        args: &[BasicMetadataValueEnum<'ctx>],
    ) -> Result<BasicValueEnum<'ctx>> {
        let intrinsic = inkwell::intrinsics::Intrinsic::find(name)
            .ok_or_else(|| Error::Internal(format!("LLVM intrinsic {name} not found")))?;
        let decl = intrinsic
            .get_declaration(&self.ctx.module, overload)
            .ok_or_else(|| Error::Internal(format!("{name} declaration failed")))?;
        self.builder
            .build_call(decl, args, "")?
            .try_as_basic_value()
            .left()
            .ok_or_else(|| Error::Internal(format!("{name} returned void")))
    }

    fn binop(
        &mut self,
        f: impl FnOnce(&Self, IntValue<'ctx>, IntValue<'ctx>) -> Result<IntValue<'ctx>>,
    ) -> Result<()> {
        let rhs = self.pop_int()?;
        let lhs = self.pop_int()?;
        let result = f(self, lhs, rhs)?;
        self.push(result);
        Ok(())
    }

    fn fbinop(
        &mut self,
        f: impl FnOnce(&Self, FloatValue<'ctx>, FloatValue<'ctx>) -> Result<FloatValue<'ctx>>,
    ) -> Result<()> {
        let rhs = self.pop()?.into_float_value();
        let lhs = self.pop()?.into_float_value();
        let result = f(self, lhs, rhs)?;
        self.push(result);
        Ok(())
    }

    /// Comparison producing the WASM `i32` boolean.
    fn icmp(&mut self, pred: IntPredicate) -> Result<()> {
        let rhs = self.pop_int()?;
        let lhs = self.pop_int()?;
        let cmp = self.builder.build_int_compare(pred, lhs, rhs, "")?;
        let ext = self.builder.build_int_z_extend(cmp, self.ctx.i32, "")?;
        self.push(ext);
        Ok(())
    }

    fn fcmp(&mut self, pred: FloatPredicate) -> Result<()> {
        let rhs = self.pop()?.into_float_value();
        let lhs = self.pop()?.into_float_value();
        let cmp = self.builder.build_float_compare(pred, lhs, rhs, "")?;
        let ext = self.builder.build_int_z_extend(cmp, self.ctx.i32, "")?;
        self.push(ext);
        Ok(())
    }

    fn eqz(&mut self) -> Result<()> {
        let value = self.pop_int()?;
        let zero = value.get_type().const_zero();
        let cmp = self
            .builder
            .build_int_compare(IntPredicate::EQ, value, zero, "")?;
        let ext = self.builder.build_int_z_extend(cmp, self.ctx.i32, "")?;
        self.push(ext);
        Ok(())
    }

    /// Shift with the amount masked modulo the bit width.
    fn shift(
        &mut self,
        f: impl FnOnce(&Self, IntValue<'ctx>, IntValue<'ctx>) -> Result<IntValue<'ctx>>,
    ) -> Result<()> {
        let amount = self.pop_int()?;
        let lhs = self.pop_int()?;
        let mask = lhs
            .get_type()
            .const_int(u64::from(lhs.get_type().get_bit_width()) - 1, false);
        let amount = self.builder.build_and(amount, mask, "")?;
        let result = f(self, lhs, amount)?;
        self.push(result);
        Ok(())
    }

    /// Rotation via the funnel-shift intrinsics.
    fn rotate(&mut self, name: &str) -> Result<()> {
        let amount = self.pop_int()?;
        let lhs = self.pop_int()?;
        let ty = lhs.get_type();
        let result = self.call_llvm_intrinsic(
            name,
            &[ty.into()],
            &[lhs.into(), lhs.into(), amount.into()],
        )?;
        self.push(result);
        Ok(())
    }

    /// `clz`/`ctz` (zero is defined, not poison) and `popcnt`.
    fn count_bits(&mut self, name: &str, has_poison_arg: bool) -> Result<()> {
        let value = self.pop_int()?;
        let ty = value.get_type();
        let result = if has_poison_arg {
            let no_poison = self.ctx.i1.const_zero();
            self.call_llvm_intrinsic(name, &[ty.into()], &[value.into(), no_poison.into()])?
        } else {
            self.call_llvm_intrinsic(name, &[ty.into()], &[value.into()])?
        };
        self.push(result);
        Ok(())
    }

    fn funary(&mut self, name: &str) -> Result<()> {
        let value = self.pop()?.into_float_value();
        let result =
            self.call_llvm_intrinsic(name, &[value.get_type().into()], &[value.into()])?;
        self.push(result);
        Ok(())
    }

    /// Guard a division against a zero divisor.
    fn guard_div_by_zero(&mut self, rhs: IntValue<'ctx>) -> Result<()> {
        let zero = rhs.get_type().const_zero();
        let non_zero = self
            .builder
            .build_int_compare(IntPredicate::NE, rhs, zero, "")?;
        self.trap_unless(non_zero, TrapCode::DivideByZero, "div.nozero")
    }

    /// Signed division: divide-by-zero, then INT_MIN / -1 overflow.
    fn signed_div(&mut self) -> Result<()> {
        let rhs = self.pop_int()?;
        let lhs = self.pop_int()?;
        let ty = lhs.get_type();
        self.guard_div_by_zero(rhs)?;

        let int_min = ty.const_int(1u64 << (ty.get_bit_width() - 1), false);
        let minus_one = ty.const_all_ones();
        let lhs_not_min = self
            .builder
            .build_int_compare(IntPredicate::NE, lhs, int_min, "")?;
        let rhs_not_m1 = self
            .builder
            .build_int_compare(IntPredicate::NE, rhs, minus_one, "")?;
        let no_overflow = self.builder.build_or(lhs_not_min, rhs_not_m1, "")?;
        self.trap_unless(no_overflow, TrapCode::IntegerOverflow, "div.ok")?;

        let result = self.builder.build_int_signed_div(lhs, rhs, "")?;
        self.push(result);
        Ok(())
    }

    fn unsigned_div(&mut self) -> Result<()> {
        let rhs = self.pop_int()?;
        let lhs = self.pop_int()?;
        self.guard_div_by_zero(rhs)?;
        let result = self.builder.build_int_unsigned_div(lhs, rhs, "")?;
        self.push(result);
        Ok(())
    }

    /// Signed remainder. INT_MIN % -1 is defined as 0, so the overflow case
    /// is folded through a PHI rather than a trap.
    fn signed_rem(&mut self) -> Result<()> {
        let rhs = self.pop_int()?;
        let lhs = self.pop_int()?;
        let ty = lhs.get_type();
        self.guard_div_by_zero(rhs)?;

        let int_min = ty.const_int(1u64 << (ty.get_bit_width() - 1), false);
        let minus_one = ty.const_all_ones();
        let lhs_not_min = self
            .builder
            .build_int_compare(IntPredicate::NE, lhs, int_min, "")?;
        let rhs_not_m1 = self
            .builder
            .build_int_compare(IntPredicate::NE, rhs, minus_one, "")?;
        let no_overflow = self.builder.build_or(lhs_not_min, rhs_not_m1, "")?;
        let no_overflow = self.ctx.expect_true(&self.builder, no_overflow)?;

        let curr = self.current_block()?;
        let rem_bb = self.ctx.llctx.append_basic_block(self.function, "rem.norm");
        let end_bb = self.ctx.llctx.append_basic_block(self.function, "rem.end");
        self.builder.build_conditional_branch(no_overflow, rem_bb, end_bb)?;

        self.builder.position_at_end(rem_bb);
        let rem = self.builder.build_int_signed_rem(lhs, rhs, "")?;
        self.builder.build_unconditional_branch(end_bb)?;

        self.builder.position_at_end(end_bb);
        let phi = self.builder.build_phi(ty, "")?;
        phi.add_incoming(&[(&rem, rem_bb), (&ty.const_zero(), curr)]);
        self.push(phi.as_basic_value());
        Ok(())
    }

    fn unsigned_rem(&mut self) -> Result<()> {
        let rhs = self.pop_int()?;
        let lhs = self.pop_int()?;
        self.guard_div_by_zero(rhs)?;
        let result = self.builder.build_int_unsigned_rem(lhs, rhs, "")?;
        self.push(result);
        Ok(())
    }

    /// Float min/max with WASM NaN-propagation and signed-zero rules:
    /// equal operands are merged bitwise (or for min, and for max) so that
    /// -0.0 wins the right way; unordered operands produce the propagated
    /// NaN via addition; everything else goes to minnum/maxnum.
    fn float_min_max(&mut self, is_min: bool) -> Result<()> {
        let rhs = self.pop()?.into_float_value();
        let lhs = self.pop()?.into_float_value();
        let fp_ty = lhs.get_type();
        let int_ty = if fp_ty == self.ctx.f32 { self.ctx.i32 } else { self.ctx.i64 };

        let ueq = self
            .builder
            .build_float_compare(FloatPredicate::UEQ, lhs, rhs, "")?;
        let uno = self
            .builder
            .build_float_compare(FloatPredicate::UNO, lhs, rhs, "")?;

        let lhs_bits = self.builder.build_bit_cast(lhs, int_ty, "")?.into_int_value();
        let rhs_bits = self.builder.build_bit_cast(rhs, int_ty, "")?.into_int_value();
        let merged_bits = if is_min {
            self.builder.build_or(lhs_bits, rhs_bits, "")?
        } else {
            self.builder.build_and(lhs_bits, rhs_bits, "")?
        };
        let merged = self.builder.build_bit_cast(merged_bits, fp_ty, "")?;

        let nan = self.builder.build_float_add(lhs, rhs, "")?;

        let name = if is_min { "llvm.minnum" } else { "llvm.maxnum" };
        let ordered =
            self.call_llvm_intrinsic(name, &[fp_ty.into()], &[lhs.into(), rhs.into()])?;

        let on_equal = self.builder.build_select(uno, nan.into(), merged, "")?;
        let result = self.builder.build_select(ueq, on_equal, ordered, "")?;
        self.push(result);
        Ok(())
    }

    /// Round to nearest, ties to even. Prefers the dedicated round-even
    /// intrinsic; on hosts without it, SSE4.1 round (mode 8) or NEON frintn;
    /// `nearbyint` is the last resort (correct under the default FP
    /// environment).
    fn float_nearest(&mut self) -> Result<()> {
        let value = self.pop()?.into_float_value();
        let fp_ty = value.get_type();

        if inkwell::intrinsics::Intrinsic::find("llvm.roundeven").is_some() {
            let result =
                self.call_llvm_intrinsic("llvm.roundeven", &[fp_ty.into()], &[value.into()])?;
            self.push(result);
            return Ok(());
        }

        if self.ctx.capabilities.sse4_1 {
            let is_f32 = fp_ty == self.ctx.f32;
            let (vec_ty, name) = if is_f32 {
                (self.ctx.f32x4, "llvm.x86.sse41.round.ss")
            } else {
                (self.ctx.f64x2, "llvm.x86.sse41.round.sd")
            };
            let vec = self.builder.build_insert_element(
                vec_ty.get_undef(),
                value,
                self.ctx.i32.const_zero(),
                "",
            )?;
            // Rounding mode 8: round to nearest even, suppress exceptions.
            let rounded = self.call_llvm_intrinsic(
                name,
                &[],
                &[vec.into(), vec.into(), self.ctx.i32.const_int(8, false).into()],
            )?;
            let result = self.builder.build_extract_element(
                rounded.into_vector_value(),
                self.ctx.i32.const_zero(),
                "",
            )?;
            self.push(result);
            return Ok(());
        }

        if self.ctx.capabilities.neon {
            let result = self.call_llvm_intrinsic(
                "llvm.aarch64.neon.frintn",
                &[fp_ty.into()],
                &[value.into()],
            )?;
            self.push(result);
            return Ok(());
        }

        let result =
            self.call_llvm_intrinsic("llvm.nearbyint", &[fp_ty.into()], &[value.into()])?;
        self.push(result);
        Ok(())
    }

    /// Bounds for the trunc family. `precise` is set when the integer bound
    /// is exactly representable in the float type, which turns the overflow
    /// compare non-strict.
    fn trunc_bounds(int_bits: u32, signed: bool, fp_is_f32: bool) -> (bool, f64, f64) {
        let (min, max) = if signed {
            match int_bits {
                32 => (f64::from(i32::MIN), f64::from(i32::MAX)),
                _ => (i64::MIN as f64, i64::MAX as f64),
            }
        } else {
            match int_bits {
                32 => (0.0, f64::from(u32::MAX)),
                _ => (0.0, u64::MAX as f64),
            }
        };
        let mantissa = if fp_is_f32 { 24 } else { 53 };
        (int_bits <= mantissa, min, max)
    }

    /// Trapping float→int truncation: NaN traps as invalid conversion,
    /// out-of-range traps as integer overflow.
    fn trunc_to_int(&mut self, int_ty: inkwell::types::IntType<'ctx>, signed: bool) -> Result<()> {
        let value = self.pop()?.into_float_value();
        let fp_ty = value.get_type();
        let (precise, min, max) =
            Self::trunc_bounds(int_ty.get_bit_width(), signed, fp_ty == self.ctx.f32);

        let not_nan = self
            .builder
            .build_float_compare(FloatPredicate::ORD, value, value, "")?;
        self.trap_unless(not_nan, TrapCode::InvalidConvToInt, "trunc.norm")?;

        let trunc = self
            .call_llvm_intrinsic("llvm.trunc", &[fp_ty.into()], &[value.into()])?
            .into_float_value();
        let above_min = self.builder.build_float_compare(
            FloatPredicate::OGE,
            trunc,
            fp_ty.const_float(min),
            "",
        )?;
        self.trap_unless(above_min, TrapCode::IntegerOverflow, "trunc.notmin")?;

        let max_pred = if precise { FloatPredicate::OLE } else { FloatPredicate::OLT };
        let below_max = self.builder.build_float_compare(
            max_pred,
            trunc,
            fp_ty.const_float(max),
            "",
        )?;
        self.trap_unless(below_max, TrapCode::IntegerOverflow, "trunc.notmax")?;

        let result = if signed {
            self.builder.build_float_to_signed_int(trunc, int_ty, "")?
        } else {
            self.builder.build_float_to_unsigned_int(trunc, int_ty, "")?
        };
        self.push(result);
        Ok(())
    }

    /// Saturating truncation: the same range walk, but every early exit
    /// feeds a clamp value into the result PHI instead of trapping.
    fn trunc_sat_to_int(
        &mut self,
        int_ty: inkwell::types::IntType<'ctx>,
        signed: bool,
    ) -> Result<()> {
        let value = self.pop()?.into_float_value();
        let fp_ty = value.get_type();
        let bits = int_ty.get_bit_width();
        let (precise, min, max) = Self::trunc_bounds(bits, signed, fp_ty == self.ctx.f32);
        let (min_int, max_int) = if signed {
            (
                int_ty.const_int(1u64 << (bits - 1), false),
                int_ty.const_int((1u64 << (bits - 1)) - 1, false),
            )
        } else {
            (int_ty.const_zero(), int_ty.const_all_ones())
        };

        let curr = self.current_block()?;
        let norm_bb = self.ctx.llctx.append_basic_block(self.function, "sat.norm");
        let not_min_bb = self.ctx.llctx.append_basic_block(self.function, "sat.notmin");
        let not_max_bb = self.ctx.llctx.append_basic_block(self.function, "sat.notmax");
        let end_bb = self.ctx.llctx.append_basic_block(self.function, "sat.end");

        // NaN saturates to zero for the signed form; the unsigned form gets
        // it for free because NaN fails the ordered min compare.
        if signed {
            let not_nan = self
                .builder
                .build_float_compare(FloatPredicate::ORD, value, value, "")?;
            let not_nan = self.ctx.expect_true(&self.builder, not_nan)?;
            self.builder.build_conditional_branch(not_nan, norm_bb, end_bb)?;
            self.builder.position_at_end(norm_bb);
        }

        let trunc = self
            .call_llvm_intrinsic("llvm.trunc", &[fp_ty.into()], &[value.into()])?
            .into_float_value();
        let above_min = self.builder.build_float_compare(
            FloatPredicate::OGE,
            trunc,
            fp_ty.const_float(min),
            "",
        )?;
        let above_min = self.ctx.expect_true(&self.builder, above_min)?;
        let min_src = self.current_block()?;
        self.builder.build_conditional_branch(above_min, not_min_bb, end_bb)?;

        self.builder.position_at_end(not_min_bb);
        let max_pred = if precise { FloatPredicate::OLE } else { FloatPredicate::OLT };
        let below_max = self.builder.build_float_compare(
            max_pred,
            trunc,
            fp_ty.const_float(max),
            "",
        )?;
        let below_max = self.ctx.expect_true(&self.builder, below_max)?;
        self.builder.build_conditional_branch(below_max, not_max_bb, end_bb)?;

        self.builder.position_at_end(not_max_bb);
        let converted = if signed {
            self.builder.build_float_to_signed_int(trunc, int_ty, "")?
        } else {
            self.builder.build_float_to_unsigned_int(trunc, int_ty, "")?
        };
        self.builder.build_unconditional_branch(end_bb)?;

        self.builder.position_at_end(end_bb);
        let phi = self.builder.build_phi(int_ty, "")?;
        if signed {
            phi.add_incoming(&[
                (&int_ty.const_zero(), curr),
                (&min_int, min_src),
                (&max_int, not_min_bb),
                (&converted, not_max_bb),
            ]);
        } else {
            phi.add_incoming(&[
                (&min_int, min_src),
                (&max_int, not_min_bb),
                (&converted, not_max_bb),
            ]);
        }
        self.push(phi.as_basic_value());
        Ok(())
    }

    fn sign_extend_from(&mut self, from_bits: u32) -> Result<()> {
        let value = self.pop_int()?;
        let ty = value.get_type();
        let narrow_ty = self.ctx.llctx.custom_width_int_type(from_bits);
        let narrow = self.builder.build_int_truncate(value, narrow_ty, "")?;
        let extended = self.builder.build_int_s_extend(narrow, ty, "")?;
        self.push(extended);
        Ok(())
    }

    /// Dispatch continuation for value-producing operators; falls through
    /// the family files until one claims the opcode.
    pub(crate) fn translate_value_operator(&mut self, op: &Operator<'_>) -> Result<()> {
        match op {
            // === Constants ===
            Operator::I32Const { value } => {
                self.push(self.ctx.i32.const_int(u64::from(*value as u32), false));
                Ok(())
            }
            Operator::I64Const { value } => {
                self.push(self.ctx.i64.const_int(*value as u64, false));
                Ok(())
            }
            Operator::F32Const { value } => {
                // Bit-pattern construction preserves NaN payloads.
                let bits = self.ctx.i32.const_int(u64::from(value.bits()), false);
                let value = self.builder.build_bit_cast(bits, self.ctx.f32, "")?;
                self.push(value);
                Ok(())
            }
            Operator::F64Const { value } => {
                let bits = self.ctx.i64.const_int(value.bits(), false);
                let value = self.builder.build_bit_cast(bits, self.ctx.f64, "")?;
                self.push(value);
                Ok(())
            }

            // === Integer comparisons ===
            Operator::I32Eqz | Operator::I64Eqz => self.eqz(),
            Operator::I32Eq | Operator::I64Eq => self.icmp(IntPredicate::EQ),
            Operator::I32Ne | Operator::I64Ne => self.icmp(IntPredicate::NE),
            Operator::I32LtS | Operator::I64LtS => self.icmp(IntPredicate::SLT),
            Operator::I32LtU | Operator::I64LtU => self.icmp(IntPredicate::ULT),
            Operator::I32GtS | Operator::I64GtS => self.icmp(IntPredicate::SGT),
            Operator::I32GtU | Operator::I64GtU => self.icmp(IntPredicate::UGT),
            Operator::I32LeS | Operator::I64LeS => self.icmp(IntPredicate::SLE),
            Operator::I32LeU | Operator::I64LeU => self.icmp(IntPredicate::ULE),
            Operator::I32GeS | Operator::I64GeS => self.icmp(IntPredicate::SGE),
            Operator::I32GeU | Operator::I64GeU => self.icmp(IntPredicate::UGE),

            // === Float comparisons ===
            Operator::F32Eq | Operator::F64Eq => self.fcmp(FloatPredicate::OEQ),
            Operator::F32Ne | Operator::F64Ne => self.fcmp(FloatPredicate::UNE),
            Operator::F32Lt | Operator::F64Lt => self.fcmp(FloatPredicate::OLT),
            Operator::F32Gt | Operator::F64Gt => self.fcmp(FloatPredicate::OGT),
            Operator::F32Le | Operator::F64Le => self.fcmp(FloatPredicate::OLE),
            Operator::F32Ge | Operator::F64Ge => self.fcmp(FloatPredicate::OGE),

            // === Integer arithmetic ===
            Operator::I32Clz | Operator::I64Clz => self.count_bits("llvm.ctlz", true),
            Operator::I32Ctz | Operator::I64Ctz => self.count_bits("llvm.cttz", true),
            Operator::I32Popcnt | Operator::I64Popcnt => self.count_bits("llvm.ctpop", false),
            Operator::I32Add | Operator::I64Add => {
                self.binop(|s, l, r| Ok(s.builder.build_int_add(l, r, "")?))
            }
            Operator::I32Sub | Operator::I64Sub => {
                self.binop(|s, l, r| Ok(s.builder.build_int_sub(l, r, "")?))
            }
            Operator::I32Mul | Operator::I64Mul => {
                self.binop(|s, l, r| Ok(s.builder.build_int_mul(l, r, "")?))
            }
            Operator::I32DivS | Operator::I64DivS => self.signed_div(),
            Operator::I32DivU | Operator::I64DivU => self.unsigned_div(),
            Operator::I32RemS | Operator::I64RemS => self.signed_rem(),
            Operator::I32RemU | Operator::I64RemU => self.unsigned_rem(),
            Operator::I32And | Operator::I64And => {
                self.binop(|s, l, r| Ok(s.builder.build_and(l, r, "")?))
            }
            Operator::I32Or | Operator::I64Or => {
                self.binop(|s, l, r| Ok(s.builder.build_or(l, r, "")?))
            }
            Operator::I32Xor | Operator::I64Xor => {
                self.binop(|s, l, r| Ok(s.builder.build_xor(l, r, "")?))
            }
            Operator::I32Shl | Operator::I64Shl => {
                self.shift(|s, l, r| Ok(s.builder.build_left_shift(l, r, "")?))
            }
            Operator::I32ShrS | Operator::I64ShrS => {
                self.shift(|s, l, r| Ok(s.builder.build_right_shift(l, r, true, "")?))
            }
            Operator::I32ShrU | Operator::I64ShrU => {
                self.shift(|s, l, r| Ok(s.builder.build_right_shift(l, r, false, "")?))
            }
            Operator::I32Rotl | Operator::I64Rotl => self.rotate("llvm.fshl"),
            Operator::I32Rotr | Operator::I64Rotr => self.rotate("llvm.fshr"),

            // === Float arithmetic ===
            Operator::F32Abs | Operator::F64Abs => self.funary("llvm.fabs"),
            Operator::F32Neg | Operator::F64Neg => {
                let value = self.pop()?.into_float_value();
                let result = self.builder.build_float_neg(value, "")?;
                self.push(result);
                Ok(())
            }
            Operator::F32Ceil | Operator::F64Ceil => self.funary("llvm.ceil"),
            Operator::F32Floor | Operator::F64Floor => self.funary("llvm.floor"),
            Operator::F32Trunc | Operator::F64Trunc => self.funary("llvm.trunc"),
            Operator::F32Nearest | Operator::F64Nearest => self.float_nearest(),
            Operator::F32Sqrt | Operator::F64Sqrt => self.funary("llvm.sqrt"),
            Operator::F32Add | Operator::F64Add => {
                self.fbinop(|s, l, r| Ok(s.builder.build_float_add(l, r, "")?))
            }
            Operator::F32Sub | Operator::F64Sub => {
                self.fbinop(|s, l, r| Ok(s.builder.build_float_sub(l, r, "")?))
            }
            Operator::F32Mul | Operator::F64Mul => {
                self.fbinop(|s, l, r| Ok(s.builder.build_float_mul(l, r, "")?))
            }
            Operator::F32Div | Operator::F64Div => {
                self.fbinop(|s, l, r| Ok(s.builder.build_float_div(l, r, "")?))
            }
            Operator::F32Min | Operator::F64Min => self.float_min_max(true),
            Operator::F32Max | Operator::F64Max => self.float_min_max(false),
            Operator::F32Copysign | Operator::F64Copysign => {
                let rhs = self.pop()?.into_float_value();
                let lhs = self.pop()?.into_float_value();
                let result = self.call_llvm_intrinsic(
                    "llvm.copysign",
                    &[lhs.get_type().into()],
                    &[lhs.into(), rhs.into()],
                )?;
                self.push(result);
                Ok(())
            }

            // === Conversions ===
            Operator::I32WrapI64 => {
                let value = self.pop_int()?;
                let result = self.builder.build_int_truncate(value, self.ctx.i32, "")?;
                self.push(result);
                Ok(())
            }
            Operator::I64ExtendI32S => {
                let value = self.pop_int()?;
                let result = self.builder.build_int_s_extend(value, self.ctx.i64, "")?;
                self.push(result);
                Ok(())
            }
            Operator::I64ExtendI32U => {
                let value = self.pop_int()?;
                let result = self.builder.build_int_z_extend(value, self.ctx.i64, "")?;
                self.push(result);
                Ok(())
            }
            Operator::I32TruncF32S | Operator::I32TruncF64S => {
                self.trunc_to_int(self.ctx.i32, true)
            }
            Operator::I32TruncF32U | Operator::I32TruncF64U => {
                self.trunc_to_int(self.ctx.i32, false)
            }
            Operator::I64TruncF32S | Operator::I64TruncF64S => {
                self.trunc_to_int(self.ctx.i64, true)
            }
            Operator::I64TruncF32U | Operator::I64TruncF64U => {
                self.trunc_to_int(self.ctx.i64, false)
            }
            Operator::I32TruncSatF32S | Operator::I32TruncSatF64S => {
                self.trunc_sat_to_int(self.ctx.i32, true)
            }
            Operator::I32TruncSatF32U | Operator::I32TruncSatF64U => {
                self.trunc_sat_to_int(self.ctx.i32, false)
            }
            Operator::I64TruncSatF32S | Operator::I64TruncSatF64S => {
                self.trunc_sat_to_int(self.ctx.i64, true)
            }
            Operator::I64TruncSatF32U | Operator::I64TruncSatF64U => {
                self.trunc_sat_to_int(self.ctx.i64, false)
            }
            Operator::F32ConvertI32S | Operator::F32ConvertI64S => {
                let value = self.pop_int()?;
                let result = self
                    .builder
                    .build_signed_int_to_float(value, self.ctx.f32, "")?;
                self.push(result);
                Ok(())
            }
            Operator::F32ConvertI32U | Operator::F32ConvertI64U => {
                let value = self.pop_int()?;
                let result = self
                    .builder
                    .build_unsigned_int_to_float(value, self.ctx.f32, "")?;
                self.push(result);
                Ok(())
            }
            Operator::F64ConvertI32S | Operator::F64ConvertI64S => {
                let value = self.pop_int()?;
                let result = self
                    .builder
                    .build_signed_int_to_float(value, self.ctx.f64, "")?;
                self.push(result);
                Ok(())
            }
            Operator::F64ConvertI32U | Operator::F64ConvertI64U => {
                let value = self.pop_int()?;
                let result = self
                    .builder
                    .build_unsigned_int_to_float(value, self.ctx.f64, "")?;
                self.push(result);
                Ok(())
            }
            Operator::F32DemoteF64 => {
                let value = self.pop()?.into_float_value();
                let result = self.builder.build_float_trunc(value, self.ctx.f32, "")?;
                self.push(result);
                Ok(())
            }
            Operator::F64PromoteF32 => {
                let value = self.pop()?.into_float_value();
                let result = self.builder.build_float_ext(value, self.ctx.f64, "")?;
                self.push(result);
                Ok(())
            }
            Operator::I32ReinterpretF32 => {
                let value = self.pop()?;
                let result = self.builder.build_bit_cast(value, self.ctx.i32, "")?;
                self.push(result);
                Ok(())
            }
            Operator::I64ReinterpretF64 => {
                let value = self.pop()?;
                let result = self.builder.build_bit_cast(value, self.ctx.i64, "")?;
                self.push(result);
                Ok(())
            }
            Operator::F32ReinterpretI32 => {
                let value = self.pop()?;
                let result = self.builder.build_bit_cast(value, self.ctx.f32, "")?;
                self.push(result);
                Ok(())
            }
            Operator::F64ReinterpretI64 => {
                let value = self.pop()?;
                let result = self.builder.build_bit_cast(value, self.ctx.f64, "")?;
                self.push(result);
                Ok(())
            }
            Operator::I32Extend8S | Operator::I64Extend8S => self.sign_extend_from(8),
            Operator::I32Extend16S | Operator::I64Extend16S => self.sign_extend_from(16),
            Operator::I64Extend32S => self.sign_extend_from(32),

            _ => self.translate_memory_operator(op),
        }
    }
}
