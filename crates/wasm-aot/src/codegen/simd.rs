//! SIMD operator lowerings.
//!
//! `v128` lives on the operand stack as `<2 x i64>` and is bitcast to the
//! lane type each operator needs. Operators with a well-matching generic
//! LLVM intrinsic use it (saturating arithmetic, abs, min/max, fptoint.sat);
//! the handful with no generic form (average-rounded, Q15 multiply, swizzle,
//! pairwise add, narrow) pick an SSE/NEON intrinsic from the capability
//! flags and fall back to portable IR. Relaxed operators reuse the exact
//! sequences of their strict counterparts.

use inkwell::types::VectorType;
use inkwell::values::{BasicValueEnum, IntValue, VectorValue};
use inkwell::{FloatPredicate, IntPredicate};
use wasmparser::{MemArg, Operator};

use crate::codegen::function::FunctionTranslator;
use crate::Result;

impl<'ctx, 'm> FunctionTranslator<'ctx, 'm> {
    pub(crate) fn pop_vec(&mut self, ty: VectorType<'ctx>) -> Result<VectorValue<'ctx>> {
        let value = self.pop()?;
        Ok(self.builder.build_bit_cast(value, ty, "")?.into_vector_value())
    }

    pub(crate) fn push_vec(&mut self, value: VectorValue<'ctx>) -> Result<()> {
        let canonical = self.builder.build_bit_cast(value, self.ctx.i64x2, "")?;
        self.push(canonical);
        Ok(())
    }

    /// Replicate a scalar into every lane.
    fn splat_value(
        &mut self,
        ty: VectorType<'ctx>,
        scalar: BasicValueEnum<'ctx>,
    ) -> Result<VectorValue<'ctx>> {
        let seeded = self.builder.build_insert_element(
            ty.get_undef(),
            scalar,
            self.ctx.i32.const_zero(),
            "",
        )?;
        let zero_mask = VectorType::const_vector(
            &vec![self.ctx.i32.const_zero(); ty.get_size() as usize],
        );
        Ok(self
            .builder
            .build_shuffle_vector(seeded, ty.get_undef(), zero_mask, "")?)
    }

    fn splat_const(&self, ty: VectorType<'ctx>, value: u64) -> VectorValue<'ctx> {
        let lane = ty.get_element_type().into_int_type().const_int(value, false);
        VectorType::const_vector(&vec![lane; ty.get_size() as usize])
    }

    fn splat(&mut self, ty: VectorType<'ctx>, narrow_to: Option<u32>) -> Result<()> {
        let mut scalar = self.pop()?;
        if let Some(bits) = narrow_to {
            let narrow_ty = self.ctx.llctx.custom_width_int_type(bits);
            scalar = self
                .builder
                .build_int_truncate(scalar.into_int_value(), narrow_ty, "")?
                .into();
        }
        let vec = self.splat_value(ty, scalar)?;
        self.push_vec(vec)
    }

    fn vec_unop(
        &mut self,
        ty: VectorType<'ctx>,
        f: impl FnOnce(&Self, VectorValue<'ctx>) -> Result<VectorValue<'ctx>>,
    ) -> Result<()> {
        let value = self.pop_vec(ty)?;
        let result = f(self, value)?;
        self.push_vec(result)
    }

    fn vec_binop(
        &mut self,
        ty: VectorType<'ctx>,
        f: impl FnOnce(&Self, VectorValue<'ctx>, VectorValue<'ctx>) -> Result<VectorValue<'ctx>>,
    ) -> Result<()> {
        let rhs = self.pop_vec(ty)?;
        let lhs = self.pop_vec(ty)?;
        let result = f(self, lhs, rhs)?;
        self.push_vec(result)
    }

    /// Call a named intrinsic on two vectors of the same type.
    fn vec_intrinsic_binop(
        &mut self,
        ty: VectorType<'ctx>,
        name: &str,
        overloaded: bool,
    ) -> Result<()> {
        let rhs = self.pop_vec(ty)?;
        let lhs = self.pop_vec(ty)?;
        let overload = if overloaded { vec![ty.into()] } else { Vec::new() };
        let result = self.call_llvm_intrinsic(name, &overload, &[lhs.into(), rhs.into()])?;
        self.push_vec(result.into_vector_value())
    }

    /// Integer comparison producing the all-ones lane mask.
    fn vec_icmp(&mut self, ty: VectorType<'ctx>, pred: IntPredicate) -> Result<()> {
        let rhs = self.pop_vec(ty)?;
        let lhs = self.pop_vec(ty)?;
        let cmp = self.builder.build_int_compare(pred, lhs, rhs, "")?;
        let mask = self.builder.build_int_s_extend(cmp, ty, "")?;
        self.push_vec(mask)
    }

    fn vec_fcmp(
        &mut self,
        fty: VectorType<'ctx>,
        ity: VectorType<'ctx>,
        pred: FloatPredicate,
    ) -> Result<()> {
        let rhs = self.pop_vec(fty)?;
        let lhs = self.pop_vec(fty)?;
        let cmp = self.builder.build_float_compare(pred, lhs, rhs, "")?;
        let mask = self.builder.build_int_s_extend(cmp, ity, "")?;
        self.push_vec(mask)
    }

    /// Lane shift: the scalar amount is masked modulo the lane width and
    /// splatted.
    fn vec_shift(
        &mut self,
        ty: VectorType<'ctx>,
        f: impl FnOnce(&Self, VectorValue<'ctx>, VectorValue<'ctx>) -> Result<VectorValue<'ctx>>,
    ) -> Result<()> {
        let lane_bits = ty.get_element_type().into_int_type().get_bit_width();
        let amount = self.pop_int()?;
        let amount = self.builder.build_and(
            amount,
            self.ctx.i32.const_int(u64::from(lane_bits) - 1, false),
            "",
        )?;
        let lane_ty = ty.get_element_type().into_int_type();
        let amount: IntValue = if lane_bits < 32 {
            self.builder.build_int_truncate(amount, lane_ty, "")?
        } else if lane_bits > 32 {
            self.builder.build_int_z_extend(amount, lane_ty, "")?
        } else {
            amount
        };
        let splat = self.splat_value(ty, amount.into())?;
        let value = self.pop_vec(ty)?;
        let result = f(self, value, splat)?;
        self.push_vec(result)
    }

    fn extract_lane(
        &mut self,
        ty: VectorType<'ctx>,
        lane: u8,
        extend_signed: Option<bool>,
    ) -> Result<()> {
        let value = self.pop_vec(ty)?;
        let extracted = self.builder.build_extract_element(
            value,
            self.ctx.i32.const_int(lane.into(), false),
            "",
        )?;
        match extend_signed {
            None => self.push(extracted),
            Some(true) => {
                let wide = self.builder.build_int_s_extend(
                    extracted.into_int_value(),
                    self.ctx.i32,
                    "",
                )?;
                self.push(wide);
            }
            Some(false) => {
                let wide = self.builder.build_int_z_extend(
                    extracted.into_int_value(),
                    self.ctx.i32,
                    "",
                )?;
                self.push(wide);
            }
        }
        Ok(())
    }

    fn replace_lane(
        &mut self,
        ty: VectorType<'ctx>,
        lane: u8,
        narrow_to: Option<u32>,
    ) -> Result<()> {
        let mut scalar = self.pop()?;
        if let Some(bits) = narrow_to {
            let narrow_ty = self.ctx.llctx.custom_width_int_type(bits);
            scalar = self
                .builder
                .build_int_truncate(scalar.into_int_value(), narrow_ty, "")?
                .into();
        }
        let vec = self.pop_vec(ty)?;
        let replaced = self.builder.build_insert_element(
            vec,
            scalar,
            self.ctx.i32.const_int(lane.into(), false),
            "",
        )?;
        self.push_vec(replaced)
    }

    /// Shuffle the low or high half of a vector into the front.
    fn half_shuffle(
        &mut self,
        value: VectorValue<'ctx>,
        lanes: u32,
        high: bool,
    ) -> Result<VectorValue<'ctx>> {
        let base = if high { lanes } else { 0 };
        let mask: Vec<IntValue> = (0..lanes)
            .map(|i| self.ctx.i32.const_int(u64::from(base + i), false))
            .collect();
        let ty = value.get_type();
        Ok(self.builder.build_shuffle_vector(
            value,
            ty.get_undef(),
            VectorType::const_vector(&mask),
            "",
        )?)
    }

    /// `extend_low`/`extend_high`: take one half and widen every lane.
    fn vec_extend(
        &mut self,
        from: VectorType<'ctx>,
        to: VectorType<'ctx>,
        high: bool,
        signed: bool,
    ) -> Result<()> {
        let value = self.pop_vec(from)?;
        let half = self.half_shuffle(value, to.get_size(), high)?;
        let wide = if signed {
            self.builder.build_int_s_extend(half, to, "")?
        } else {
            self.builder.build_int_z_extend(half, to, "")?
        };
        self.push_vec(wide)
    }

    /// `extmul_*`: widen both halves, then multiply.
    fn vec_extmul(
        &mut self,
        from: VectorType<'ctx>,
        to: VectorType<'ctx>,
        high: bool,
        signed: bool,
    ) -> Result<()> {
        let rhs = self.pop_vec(from)?;
        let lhs = self.pop_vec(from)?;
        let mut widened = Vec::with_capacity(2);
        for value in [lhs, rhs] {
            let half = self.half_shuffle(value, to.get_size(), high)?;
            let wide = if signed {
                self.builder.build_int_s_extend(half, to, "")?
            } else {
                self.builder.build_int_z_extend(half, to, "")?
            };
            widened.push(wide);
        }
        let product = self.builder.build_int_mul(widened[0], widened[1], "")?;
        self.push_vec(product)
    }

    /// Split a vector into its even and odd lanes, widened to `to` lanes.
    fn even_odd_extend(
        &mut self,
        value: VectorValue<'ctx>,
        to: VectorType<'ctx>,
        signed: bool,
    ) -> Result<(VectorValue<'ctx>, VectorValue<'ctx>)> {
        let lanes = to.get_size();
        let pick = |start: u32, s: &Self| -> Vec<IntValue<'ctx>> {
            (0..lanes)
                .map(|i| s.ctx.i32.const_int(u64::from(start + 2 * i), false))
                .collect()
        };
        let ty = value.get_type();
        let even = self.builder.build_shuffle_vector(
            value,
            ty.get_undef(),
            VectorType::const_vector(&pick(0, self)),
            "",
        )?;
        let odd = self.builder.build_shuffle_vector(
            value,
            ty.get_undef(),
            VectorType::const_vector(&pick(1, self)),
            "",
        )?;
        let widen = |s: &Self, v: VectorValue<'ctx>| -> Result<VectorValue<'ctx>> {
            Ok(if signed {
                s.builder.build_int_s_extend(v, to, "")?
            } else {
                s.builder.build_int_z_extend(v, to, "")?
            })
        };
        Ok((widen(self, even)?, widen(self, odd)?))
    }

    /// `extadd_pairwise`: SSSE3 `pmadd` against a vector of ones where
    /// available, otherwise the even/odd split.
    fn vec_extadd_pairwise(
        &mut self,
        from: VectorType<'ctx>,
        to: VectorType<'ctx>,
        signed: bool,
    ) -> Result<()> {
        let value = self.pop_vec(from)?;
        if self.ctx.capabilities.ssse3 && from == self.ctx.i8x16 && signed {
            // pmaddubsw is unsigned*signed; feed the ones on the unsigned side.
            let ones = self.splat_const(self.ctx.i8x16, 1);
            let result = self.call_llvm_intrinsic(
                "llvm.x86.ssse3.pmadd.ub.sw.128",
                &[],
                &[ones.into(), value.into()],
            )?;
            return self.push_vec(result.into_vector_value());
        }
        if self.ctx.capabilities.sse2 && from == self.ctx.i16x8 && signed {
            let ones = self.splat_const(self.ctx.i16x8, 1);
            let result = self.call_llvm_intrinsic(
                "llvm.x86.sse2.pmadd.wd",
                &[],
                &[value.into(), ones.into()],
            )?;
            return self.push_vec(result.into_vector_value());
        }
        let (even, odd) = self.even_odd_extend(value, to, signed)?;
        let sum = self.builder.build_int_add(even, odd, "")?;
        self.push_vec(sum)
    }

    /// Saturating narrow of two vectors into one of twice the lane count.
    fn vec_narrow(&mut self, from: VectorType<'ctx>, signed: bool) -> Result<()> {
        let rhs = self.pop_vec(from)?;
        let lhs = self.pop_vec(from)?;

        if self.ctx.capabilities.sse2 {
            let name = match (from == self.ctx.i16x8, signed) {
                (true, true) => Some("llvm.x86.sse2.packsswb.128"),
                (true, false) => Some("llvm.x86.sse2.packuswb.128"),
                (false, true) => Some("llvm.x86.sse2.packssdw.128"),
                (false, false) if self.ctx.capabilities.sse4_1 => {
                    Some("llvm.x86.sse41.packusdw")
                }
                (false, false) => None,
            };
            if let Some(name) = name {
                let result =
                    self.call_llvm_intrinsic(name, &[], &[lhs.into(), rhs.into()])?;
                return self.push_vec(result.into_vector_value());
            }
        }

        // Portable: clamp both inputs to the target range (signed compares,
        // since the sources are signed lanes), truncate, concat.
        let lane_bits = from.get_element_type().into_int_type().get_bit_width();
        let narrow_bits = lane_bits / 2;
        let (lo, hi) = if signed {
            // Two's-complement bounds, sign-extended to the source width.
            (
                (1u64 << lane_bits) - (1u64 << (narrow_bits - 1)),
                (1u64 << (narrow_bits - 1)) - 1,
            )
        } else {
            (0, (1u64 << narrow_bits) - 1)
        };
        let lo_splat = self.splat_const(from, lo);
        let hi_splat = self.splat_const(from, hi);
        let mut clamped = Vec::with_capacity(2);
        for value in [lhs, rhs] {
            let capped = self
                .call_llvm_intrinsic("llvm.smin", &[from.into()], &[value.into(), hi_splat.into()])?
                .into_vector_value();
            let floored = self
                .call_llvm_intrinsic("llvm.smax", &[from.into()], &[capped.into(), lo_splat.into()])?
                .into_vector_value();
            clamped.push(floored);
        }
        let narrow_lane = self.ctx.llctx.custom_width_int_type(narrow_bits);
        let narrow_ty = narrow_lane.vec_type(from.get_size());
        let lhs_narrow = self.builder.build_int_truncate(clamped[0], narrow_ty, "")?;
        let rhs_narrow = self.builder.build_int_truncate(clamped[1], narrow_ty, "")?;
        let mask: Vec<IntValue> = (0..from.get_size() * 2)
            .map(|i| self.ctx.i32.const_int(u64::from(i), false))
            .collect();
        let joined = self.builder.build_shuffle_vector(
            lhs_narrow,
            rhs_narrow,
            VectorType::const_vector(&mask),
            "",
        )?;
        self.push_vec(joined)
    }

    /// Rounding average: `pavg` / `urhadd` when available, otherwise the
    /// widened `(a + b + 1) >> 1`.
    fn vec_avgr(&mut self, ty: VectorType<'ctx>) -> Result<()> {
        if self.ctx.capabilities.sse2 {
            let name = if ty == self.ctx.i8x16 {
                "llvm.x86.sse2.pavg.b"
            } else {
                "llvm.x86.sse2.pavg.w"
            };
            return self.vec_intrinsic_binop(ty, name, false);
        }
        if self.ctx.capabilities.neon {
            return self.vec_intrinsic_binop(ty, "llvm.aarch64.neon.urhadd", true);
        }
        let rhs = self.pop_vec(ty)?;
        let lhs = self.pop_vec(ty)?;
        let lane_bits = ty.get_element_type().into_int_type().get_bit_width();
        let wide_lane = self.ctx.llctx.custom_width_int_type(lane_bits * 2);
        let wide_ty = wide_lane.vec_type(ty.get_size());
        let lhs_w = self.builder.build_int_z_extend(lhs, wide_ty, "")?;
        let rhs_w = self.builder.build_int_z_extend(rhs, wide_ty, "")?;
        let sum = self.builder.build_int_add(lhs_w, rhs_w, "")?;
        let bump = self.builder.build_int_add(sum, self.splat_const(wide_ty, 1), "")?;
        let avg = self
            .builder
            .build_right_shift(bump, self.splat_const(wide_ty, 1), false, "")?;
        let result = self.builder.build_int_truncate(avg, ty, "")?;
        self.push_vec(result)
    }

    /// Q15 rounding saturating multiply: `pmulhrsw` / `sqrdmulh` when
    /// available, otherwise widen-multiply-round-clamp.
    fn vec_q15mulr_sat(&mut self) -> Result<()> {
        let ty = self.ctx.i16x8;
        if self.ctx.capabilities.ssse3 {
            // pmulhrsw differs from the WASM semantics only on
            // 0x8000 * 0x8000, which saturation makes unobservable.
            return self.vec_intrinsic_binop(ty, "llvm.x86.ssse3.pmul.hr.sw.128", false);
        }
        if self.ctx.capabilities.neon {
            return self.vec_intrinsic_binop(ty, "llvm.aarch64.neon.sqrdmulh", true);
        }
        let rhs = self.pop_vec(ty)?;
        let lhs = self.pop_vec(ty)?;
        let wide_ty = self.ctx.i32.vec_type(8);
        let lhs_w = self.builder.build_int_s_extend(lhs, wide_ty, "")?;
        let rhs_w = self.builder.build_int_s_extend(rhs, wide_ty, "")?;
        let product = self.builder.build_int_mul(lhs_w, rhs_w, "")?;
        let rounded = self
            .builder
            .build_int_add(product, self.splat_const(wide_ty, 0x4000), "")?;
        let shifted = self
            .builder
            .build_right_shift(rounded, self.splat_const(wide_ty, 15), true, "")?;
        let hi = self.splat_const(wide_ty, 0x7FFF);
        let lo = self.splat_const(wide_ty, 0xFFFF_8000);
        let capped = self
            .call_llvm_intrinsic("llvm.smin", &[wide_ty.into()], &[shifted.into(), hi.into()])?
            .into_vector_value();
        let clamped = self
            .call_llvm_intrinsic("llvm.smax", &[wide_ty.into()], &[capped.into(), lo.into()])?
            .into_vector_value();
        let result = self.builder.build_int_truncate(clamped, ty, "")?;
        self.push_vec(result)
    }

    /// `i8x16.swizzle`: `pshufb` (with the out-of-range saturation trick) or
    /// NEON `tbl`; the portable path selects lane by lane.
    fn vec_swizzle(&mut self) -> Result<()> {
        let ty = self.ctx.i8x16;
        let indices = self.pop_vec(ty)?;
        let value = self.pop_vec(ty)?;

        if self.ctx.capabilities.ssse3 {
            // Saturating-add 0x70 forces every index >= 16 to have its MSB
            // set, which pshufb turns into a zero lane.
            let bias = self.splat_const(ty, 0x70);
            let adjusted = self
                .call_llvm_intrinsic(
                    "llvm.uadd.sat",
                    &[ty.into()],
                    &[indices.into(), bias.into()],
                )?
                .into_vector_value();
            let result = self.call_llvm_intrinsic(
                "llvm.x86.ssse3.pshuf.b.128",
                &[],
                &[value.into(), adjusted.into()],
            )?;
            return self.push_vec(result.into_vector_value());
        }
        if self.ctx.capabilities.neon {
            let result = self.call_llvm_intrinsic(
                "llvm.aarch64.neon.tbl1",
                &[ty.into()],
                &[value.into(), indices.into()],
            )?;
            return self.push_vec(result.into_vector_value());
        }

        let mut result = ty.const_zero();
        for lane in 0..16u64 {
            let idx = self.builder.build_extract_element(
                indices,
                self.ctx.i32.const_int(lane, false),
                "",
            )?;
            let idx = self
                .builder
                .build_int_z_extend(idx.into_int_value(), self.ctx.i32, "")?;
            let in_range = self.builder.build_int_compare(
                IntPredicate::ULT,
                idx,
                self.ctx.i32.const_int(16, false),
                "",
            )?;
            // Clamp the index so the extract stays in bounds; the select
            // zeroes the out-of-range lanes afterwards.
            let safe_idx = self
                .builder
                .build_and(idx, self.ctx.i32.const_int(15, false), "")?;
            let picked = self.builder.build_extract_element(value, safe_idx, "")?;
            let lane_val = self.builder.build_select(
                in_range,
                picked,
                self.ctx.i8.const_zero().into(),
                "",
            )?;
            result = self.builder.build_insert_element(
                result,
                lane_val,
                self.ctx.i32.const_int(lane, false),
                "",
            )?;
        }
        self.push_vec(result)
    }

    /// `dot_i16x8_s`: `pmaddwd` or the even/odd widen-multiply-add.
    fn vec_dot_i16x8(&mut self) -> Result<()> {
        let ty = self.ctx.i16x8;
        if self.ctx.capabilities.sse2 {
            return self.vec_intrinsic_binop(ty, "llvm.x86.sse2.pmadd.wd", false);
        }
        let rhs = self.pop_vec(ty)?;
        let lhs = self.pop_vec(ty)?;
        let to = self.ctx.i32x4;
        let (le, lo) = self.even_odd_extend(lhs, to, true)?;
        let (re, ro) = self.even_odd_extend(rhs, to, true)?;
        let even = self.builder.build_int_mul(le, re, "")?;
        let odd = self.builder.build_int_mul(lo, ro, "")?;
        let dot = self.builder.build_int_add(even, odd, "")?;
        self.push_vec(dot)
    }

    /// Relaxed i8 dot product into i16 lanes (signed lhs, 7-bit rhs).
    fn vec_dot_i8x16_i7x16(&mut self) -> Result<()> {
        let ty = self.ctx.i8x16;
        let rhs = self.pop_vec(ty)?;
        let lhs = self.pop_vec(ty)?;
        let dot = self.dot_i8_pairs(lhs, rhs)?;
        self.push_vec(dot)
    }

    fn dot_i8_pairs(
        &mut self,
        lhs: VectorValue<'ctx>,
        rhs: VectorValue<'ctx>,
    ) -> Result<VectorValue<'ctx>> {
        if self.ctx.capabilities.ssse3 {
            // pmaddubsw multiplies unsigned lhs by signed rhs; WASM wants
            // signed lhs by (effectively unsigned) rhs, so the operands swap.
            return Ok(self
                .call_llvm_intrinsic(
                    "llvm.x86.ssse3.pmadd.ub.sw.128",
                    &[],
                    &[rhs.into(), lhs.into()],
                )?
                .into_vector_value());
        }
        let to = self.ctx.i16x8;
        let (le, lo) = self.even_odd_extend(lhs, to, true)?;
        let (re, ro) = self.even_odd_extend(rhs, to, true)?;
        let even = self.builder.build_int_mul(le, re, "")?;
        let odd = self.builder.build_int_mul(lo, ro, "")?;
        Ok(self.builder.build_int_add(even, odd, "")?)
    }

    /// Relaxed i8 dot product accumulated into i32 lanes.
    fn vec_dot_i8x16_i7x16_add(&mut self) -> Result<()> {
        let acc = self.pop_vec(self.ctx.i32x4)?;
        let rhs = self.pop_vec(self.ctx.i8x16)?;
        let lhs = self.pop_vec(self.ctx.i8x16)?;
        let pairs = self.dot_i8_pairs(lhs, rhs)?;
        let (even, odd) = self.even_odd_extend(pairs, self.ctx.i32x4, true)?;
        let sums = self.builder.build_int_add(even, odd, "")?;
        let total = self.builder.build_int_add(sums, acc, "")?;
        self.push_vec(total)
    }

    /// All-ones mask test per lane, reduced to a scalar bitmask.
    fn vec_bitmask(&mut self, ty: VectorType<'ctx>) -> Result<()> {
        let value = self.pop_vec(ty)?;
        let negative = self
            .builder
            .build_int_compare(IntPredicate::SLT, value, ty.const_zero(), "")?;
        let bits_ty = self.ctx.llctx.custom_width_int_type(ty.get_size());
        let bits = self.builder.build_bit_cast(negative, bits_ty, "")?;
        let mask =
            self.builder
                .build_int_z_extend(bits.into_int_value(), self.ctx.i32, "")?;
        self.push(mask);
        Ok(())
    }

    fn vec_all_true(&mut self, ty: VectorType<'ctx>) -> Result<()> {
        let value = self.pop_vec(ty)?;
        let non_zero = self
            .builder
            .build_int_compare(IntPredicate::NE, value, ty.const_zero(), "")?;
        let bits_ty = self.ctx.llctx.custom_width_int_type(ty.get_size());
        let bits = self.builder.build_bit_cast(non_zero, bits_ty, "")?;
        let all = self.builder.build_int_compare(
            IntPredicate::EQ,
            bits.into_int_value(),
            bits_ty.const_all_ones(),
            "",
        )?;
        let ext = self.builder.build_int_z_extend(all, self.ctx.i32, "")?;
        self.push(ext);
        Ok(())
    }

    /// Saturating float-to-int lane conversion via `fptosi.sat`.
    fn vec_trunc_sat(
        &mut self,
        from: VectorType<'ctx>,
        signed: bool,
        zero_pad: bool,
    ) -> Result<()> {
        let value = self.pop_vec(from)?;
        let name = if signed { "llvm.fptosi.sat" } else { "llvm.fptoui.sat" };
        if !zero_pad {
            let result = self.call_llvm_intrinsic(
                name,
                &[self.ctx.i32x4.into(), from.into()],
                &[value.into()],
            )?;
            return self.push_vec(result.into_vector_value());
        }
        // f64x2 source: two converted lanes, the upper half zeroed.
        let narrow_ty = self.ctx.i32.vec_type(2);
        let pair = self
            .call_llvm_intrinsic(name, &[narrow_ty.into(), from.into()], &[value.into()])?
            .into_vector_value();
        let mask: Vec<IntValue> = (0..4)
            .map(|i| self.ctx.i32.const_int(u64::from(i), false))
            .collect();
        let padded = self.builder.build_shuffle_vector(
            pair,
            narrow_ty.const_zero(),
            VectorType::const_vector(&mask),
            "",
        )?;
        self.push_vec(padded)
    }

    fn memarg_load_vec(
        &mut self,
        memarg: &MemArg,
        ty: inkwell::types::BasicTypeEnum<'ctx>,
    ) -> Result<BasicValueEnum<'ctx>> {
        self.load_from_memory(memarg, ty)
    }

    pub(crate) fn translate_simd_operator(&mut self, op: &Operator<'_>) -> Result<()> {
        let i8x16 = self.ctx.i8x16;
        let i16x8 = self.ctx.i16x8;
        let i32x4 = self.ctx.i32x4;
        let i64x2 = self.ctx.i64x2;
        let f32x4 = self.ctx.f32x4;
        let f64x2 = self.ctx.f64x2;

        match op {
            // === Loads and stores ===
            Operator::V128Load { memarg } => {
                let value = self.memarg_load_vec(memarg, i64x2.into())?;
                self.push(value);
                Ok(())
            }
            Operator::V128Load8x8S { memarg } | Operator::V128Load8x8U { memarg } => {
                let narrow = self.ctx.i8.vec_type(8);
                let value = self.memarg_load_vec(memarg, narrow.into())?.into_vector_value();
                let signed = matches!(op, Operator::V128Load8x8S { .. });
                let wide = if signed {
                    self.builder.build_int_s_extend(value, i16x8, "")?
                } else {
                    self.builder.build_int_z_extend(value, i16x8, "")?
                };
                self.push_vec(wide)
            }
            Operator::V128Load16x4S { memarg } | Operator::V128Load16x4U { memarg } => {
                let narrow = self.ctx.i16.vec_type(4);
                let value = self.memarg_load_vec(memarg, narrow.into())?.into_vector_value();
                let signed = matches!(op, Operator::V128Load16x4S { .. });
                let wide = if signed {
                    self.builder.build_int_s_extend(value, i32x4, "")?
                } else {
                    self.builder.build_int_z_extend(value, i32x4, "")?
                };
                self.push_vec(wide)
            }
            Operator::V128Load32x2S { memarg } | Operator::V128Load32x2U { memarg } => {
                let narrow = self.ctx.i32.vec_type(2);
                let value = self.memarg_load_vec(memarg, narrow.into())?.into_vector_value();
                let signed = matches!(op, Operator::V128Load32x2S { .. });
                let wide = if signed {
                    self.builder.build_int_s_extend(value, i64x2, "")?
                } else {
                    self.builder.build_int_z_extend(value, i64x2, "")?
                };
                self.push_vec(wide)
            }
            Operator::V128Load8Splat { memarg } => {
                let scalar = self.memarg_load_vec(memarg, self.ctx.i8.into())?;
                let vec = self.splat_value(i8x16, scalar)?;
                self.push_vec(vec)
            }
            Operator::V128Load16Splat { memarg } => {
                let scalar = self.memarg_load_vec(memarg, self.ctx.i16.into())?;
                let vec = self.splat_value(i16x8, scalar)?;
                self.push_vec(vec)
            }
            Operator::V128Load32Splat { memarg } => {
                let scalar = self.memarg_load_vec(memarg, self.ctx.i32.into())?;
                let vec = self.splat_value(i32x4, scalar)?;
                self.push_vec(vec)
            }
            Operator::V128Load64Splat { memarg } => {
                let scalar = self.memarg_load_vec(memarg, self.ctx.i64.into())?;
                let vec = self.splat_value(i64x2, scalar)?;
                self.push_vec(vec)
            }
            Operator::V128Load32Zero { memarg } => {
                let scalar = self.memarg_load_vec(memarg, self.ctx.i32.into())?;
                let vec = self.builder.build_insert_element(
                    i32x4.const_zero(),
                    scalar,
                    self.ctx.i32.const_zero(),
                    "",
                )?;
                self.push_vec(vec)
            }
            Operator::V128Load64Zero { memarg } => {
                let scalar = self.memarg_load_vec(memarg, self.ctx.i64.into())?;
                let vec = self.builder.build_insert_element(
                    i64x2.const_zero(),
                    scalar,
                    self.ctx.i32.const_zero(),
                    "",
                )?;
                self.push_vec(vec)
            }
            Operator::V128Load8Lane { memarg, lane } => self.load_lane(memarg, *lane, i8x16),
            Operator::V128Load16Lane { memarg, lane } => self.load_lane(memarg, *lane, i16x8),
            Operator::V128Load32Lane { memarg, lane } => self.load_lane(memarg, *lane, i32x4),
            Operator::V128Load64Lane { memarg, lane } => self.load_lane(memarg, *lane, i64x2),
            Operator::V128Store { memarg } => {
                let value = self.pop()?;
                self.store_to_memory(memarg, value)
            }
            Operator::V128Store8Lane { memarg, lane } => self.store_lane(memarg, *lane, i8x16),
            Operator::V128Store16Lane { memarg, lane } => self.store_lane(memarg, *lane, i16x8),
            Operator::V128Store32Lane { memarg, lane } => self.store_lane(memarg, *lane, i32x4),
            Operator::V128Store64Lane { memarg, lane } => self.store_lane(memarg, *lane, i64x2),

            // === Constants and lane juggling ===
            Operator::V128Const { value } => {
                let bytes = value.bytes();
                let lo = u64::from_le_bytes(bytes[0..8].try_into().expect("8 bytes"));
                let hi = u64::from_le_bytes(bytes[8..16].try_into().expect("8 bytes"));
                let vec = VectorType::const_vector(&[
                    self.ctx.i64.const_int(lo, false),
                    self.ctx.i64.const_int(hi, false),
                ]);
                self.push(vec);
                Ok(())
            }
            Operator::I8x16Shuffle { lanes } => {
                let rhs = self.pop_vec(i8x16)?;
                let lhs = self.pop_vec(i8x16)?;
                let mask: Vec<IntValue> = lanes
                    .iter()
                    .map(|&l| self.ctx.i32.const_int(u64::from(l), false))
                    .collect();
                let shuffled = self.builder.build_shuffle_vector(
                    lhs,
                    rhs,
                    VectorType::const_vector(&mask),
                    "",
                )?;
                self.push_vec(shuffled)
            }
            Operator::I8x16Swizzle | Operator::I8x16RelaxedSwizzle => self.vec_swizzle(),
            Operator::I8x16Splat => self.splat(i8x16, Some(8)),
            Operator::I16x8Splat => self.splat(i16x8, Some(16)),
            Operator::I32x4Splat => self.splat(i32x4, None),
            Operator::I64x2Splat => self.splat(i64x2, None),
            Operator::F32x4Splat => self.splat(f32x4, None),
            Operator::F64x2Splat => self.splat(f64x2, None),
            Operator::I8x16ExtractLaneS { lane } => self.extract_lane(i8x16, *lane, Some(true)),
            Operator::I8x16ExtractLaneU { lane } => self.extract_lane(i8x16, *lane, Some(false)),
            Operator::I16x8ExtractLaneS { lane } => self.extract_lane(i16x8, *lane, Some(true)),
            Operator::I16x8ExtractLaneU { lane } => self.extract_lane(i16x8, *lane, Some(false)),
            Operator::I32x4ExtractLane { lane } => self.extract_lane(i32x4, *lane, None),
            Operator::I64x2ExtractLane { lane } => self.extract_lane(i64x2, *lane, None),
            Operator::F32x4ExtractLane { lane } => self.extract_lane(f32x4, *lane, None),
            Operator::F64x2ExtractLane { lane } => self.extract_lane(f64x2, *lane, None),
            Operator::I8x16ReplaceLane { lane } => self.replace_lane(i8x16, *lane, Some(8)),
            Operator::I16x8ReplaceLane { lane } => self.replace_lane(i16x8, *lane, Some(16)),
            Operator::I32x4ReplaceLane { lane } => self.replace_lane(i32x4, *lane, None),
            Operator::I64x2ReplaceLane { lane } => self.replace_lane(i64x2, *lane, None),
            Operator::F32x4ReplaceLane { lane } => self.replace_lane(f32x4, *lane, None),
            Operator::F64x2ReplaceLane { lane } => self.replace_lane(f64x2, *lane, None),

            // === Integer comparisons ===
            Operator::I8x16Eq => self.vec_icmp(i8x16, IntPredicate::EQ),
            Operator::I8x16Ne => self.vec_icmp(i8x16, IntPredicate::NE),
            Operator::I8x16LtS => self.vec_icmp(i8x16, IntPredicate::SLT),
            Operator::I8x16LtU => self.vec_icmp(i8x16, IntPredicate::ULT),
            Operator::I8x16GtS => self.vec_icmp(i8x16, IntPredicate::SGT),
            Operator::I8x16GtU => self.vec_icmp(i8x16, IntPredicate::UGT),
            Operator::I8x16LeS => self.vec_icmp(i8x16, IntPredicate::SLE),
            Operator::I8x16LeU => self.vec_icmp(i8x16, IntPredicate::ULE),
            Operator::I8x16GeS => self.vec_icmp(i8x16, IntPredicate::SGE),
            Operator::I8x16GeU => self.vec_icmp(i8x16, IntPredicate::UGE),
            Operator::I16x8Eq => self.vec_icmp(i16x8, IntPredicate::EQ),
            Operator::I16x8Ne => self.vec_icmp(i16x8, IntPredicate::NE),
            Operator::I16x8LtS => self.vec_icmp(i16x8, IntPredicate::SLT),
            Operator::I16x8LtU => self.vec_icmp(i16x8, IntPredicate::ULT),
            Operator::I16x8GtS => self.vec_icmp(i16x8, IntPredicate::SGT),
            Operator::I16x8GtU => self.vec_icmp(i16x8, IntPredicate::UGT),
            Operator::I16x8LeS => self.vec_icmp(i16x8, IntPredicate::SLE),
            Operator::I16x8LeU => self.vec_icmp(i16x8, IntPredicate::ULE),
            Operator::I16x8GeS => self.vec_icmp(i16x8, IntPredicate::SGE),
            Operator::I16x8GeU => self.vec_icmp(i16x8, IntPredicate::UGE),
            Operator::I32x4Eq => self.vec_icmp(i32x4, IntPredicate::EQ),
            Operator::I32x4Ne => self.vec_icmp(i32x4, IntPredicate::NE),
            Operator::I32x4LtS => self.vec_icmp(i32x4, IntPredicate::SLT),
            Operator::I32x4LtU => self.vec_icmp(i32x4, IntPredicate::ULT),
            Operator::I32x4GtS => self.vec_icmp(i32x4, IntPredicate::SGT),
            Operator::I32x4GtU => self.vec_icmp(i32x4, IntPredicate::UGT),
            Operator::I32x4LeS => self.vec_icmp(i32x4, IntPredicate::SLE),
            Operator::I32x4LeU => self.vec_icmp(i32x4, IntPredicate::ULE),
            Operator::I32x4GeS => self.vec_icmp(i32x4, IntPredicate::SGE),
            Operator::I32x4GeU => self.vec_icmp(i32x4, IntPredicate::UGE),
            Operator::I64x2Eq => self.vec_icmp(i64x2, IntPredicate::EQ),
            Operator::I64x2Ne => self.vec_icmp(i64x2, IntPredicate::NE),
            Operator::I64x2LtS => self.vec_icmp(i64x2, IntPredicate::SLT),
            Operator::I64x2GtS => self.vec_icmp(i64x2, IntPredicate::SGT),
            Operator::I64x2LeS => self.vec_icmp(i64x2, IntPredicate::SLE),
            Operator::I64x2GeS => self.vec_icmp(i64x2, IntPredicate::SGE),

            // === Float comparisons ===
            Operator::F32x4Eq => self.vec_fcmp(f32x4, i32x4, FloatPredicate::OEQ),
            Operator::F32x4Ne => self.vec_fcmp(f32x4, i32x4, FloatPredicate::UNE),
            Operator::F32x4Lt => self.vec_fcmp(f32x4, i32x4, FloatPredicate::OLT),
            Operator::F32x4Gt => self.vec_fcmp(f32x4, i32x4, FloatPredicate::OGT),
            Operator::F32x4Le => self.vec_fcmp(f32x4, i32x4, FloatPredicate::OLE),
            Operator::F32x4Ge => self.vec_fcmp(f32x4, i32x4, FloatPredicate::OGE),
            Operator::F64x2Eq => self.vec_fcmp(f64x2, i64x2, FloatPredicate::OEQ),
            Operator::F64x2Ne => self.vec_fcmp(f64x2, i64x2, FloatPredicate::UNE),
            Operator::F64x2Lt => self.vec_fcmp(f64x2, i64x2, FloatPredicate::OLT),
            Operator::F64x2Gt => self.vec_fcmp(f64x2, i64x2, FloatPredicate::OGT),
            Operator::F64x2Le => self.vec_fcmp(f64x2, i64x2, FloatPredicate::OLE),
            Operator::F64x2Ge => self.vec_fcmp(f64x2, i64x2, FloatPredicate::OGE),

            // === Bitwise ===
            Operator::V128Not => self.vec_unop(i64x2, |s, v| Ok(s.builder.build_not(v, "")?)),
            Operator::V128And => {
                self.vec_binop(i64x2, |s, l, r| Ok(s.builder.build_and(l, r, "")?))
            }
            Operator::V128AndNot => self.vec_binop(i64x2, |s, l, r| {
                let inverted = s.builder.build_not(r, "")?;
                Ok(s.builder.build_and(l, inverted, "")?)
            }),
            Operator::V128Or => {
                self.vec_binop(i64x2, |s, l, r| Ok(s.builder.build_or(l, r, "")?))
            }
            Operator::V128Xor => {
                self.vec_binop(i64x2, |s, l, r| Ok(s.builder.build_xor(l, r, "")?))
            }
            Operator::V128Bitselect
            | Operator::I8x16RelaxedLaneselect
            | Operator::I16x8RelaxedLaneselect
            | Operator::I32x4RelaxedLaneselect
            | Operator::I64x2RelaxedLaneselect => {
                let mask = self.pop_vec(i64x2)?;
                let rhs = self.pop_vec(i64x2)?;
                let lhs = self.pop_vec(i64x2)?;
                let picked = self.builder.build_and(lhs, mask, "")?;
                let inverted = self.builder.build_not(mask, "")?;
                let dropped = self.builder.build_and(rhs, inverted, "")?;
                let result = self.builder.build_or(picked, dropped, "")?;
                self.push_vec(result)
            }
            Operator::V128AnyTrue => {
                let value = self.pop()?;
                let bits = self.builder.build_bit_cast(value, self.ctx.i128, "")?;
                let any = self.builder.build_int_compare(
                    IntPredicate::NE,
                    bits.into_int_value(),
                    self.ctx.i128.const_zero(),
                    "",
                )?;
                let ext = self.builder.build_int_z_extend(any, self.ctx.i32, "")?;
                self.push(ext);
                Ok(())
            }

            // === Lane-wise integer ===
            Operator::I8x16Abs => self.vec_abs(i8x16),
            Operator::I16x8Abs => self.vec_abs(i16x8),
            Operator::I32x4Abs => self.vec_abs(i32x4),
            Operator::I64x2Abs => self.vec_abs(i64x2),
            Operator::I8x16Neg => self.vec_neg(i8x16),
            Operator::I16x8Neg => self.vec_neg(i16x8),
            Operator::I32x4Neg => self.vec_neg(i32x4),
            Operator::I64x2Neg => self.vec_neg(i64x2),
            Operator::I8x16Popcnt => {
                let value = self.pop_vec(i8x16)?;
                let result =
                    self.call_llvm_intrinsic("llvm.ctpop", &[i8x16.into()], &[value.into()])?;
                self.push_vec(result.into_vector_value())
            }
            Operator::I8x16AllTrue => self.vec_all_true(i8x16),
            Operator::I16x8AllTrue => self.vec_all_true(i16x8),
            Operator::I32x4AllTrue => self.vec_all_true(i32x4),
            Operator::I64x2AllTrue => self.vec_all_true(i64x2),
            Operator::I8x16Bitmask => self.vec_bitmask(i8x16),
            Operator::I16x8Bitmask => self.vec_bitmask(i16x8),
            Operator::I32x4Bitmask => self.vec_bitmask(i32x4),
            Operator::I64x2Bitmask => self.vec_bitmask(i64x2),
            Operator::I8x16NarrowI16x8S => self.vec_narrow(i16x8, true),
            Operator::I8x16NarrowI16x8U => self.vec_narrow(i16x8, false),
            Operator::I16x8NarrowI32x4S => self.vec_narrow(i32x4, true),
            Operator::I16x8NarrowI32x4U => self.vec_narrow(i32x4, false),
            Operator::I8x16Shl => {
                self.vec_shift(i8x16, |s, l, r| Ok(s.builder.build_left_shift(l, r, "")?))
            }
            Operator::I8x16ShrS => {
                self.vec_shift(i8x16, |s, l, r| Ok(s.builder.build_right_shift(l, r, true, "")?))
            }
            Operator::I8x16ShrU => {
                self.vec_shift(i8x16, |s, l, r| Ok(s.builder.build_right_shift(l, r, false, "")?))
            }
            Operator::I16x8Shl => {
                self.vec_shift(i16x8, |s, l, r| Ok(s.builder.build_left_shift(l, r, "")?))
            }
            Operator::I16x8ShrS => {
                self.vec_shift(i16x8, |s, l, r| Ok(s.builder.build_right_shift(l, r, true, "")?))
            }
            Operator::I16x8ShrU => {
                self.vec_shift(i16x8, |s, l, r| Ok(s.builder.build_right_shift(l, r, false, "")?))
            }
            Operator::I32x4Shl => {
                self.vec_shift(i32x4, |s, l, r| Ok(s.builder.build_left_shift(l, r, "")?))
            }
            Operator::I32x4ShrS => {
                self.vec_shift(i32x4, |s, l, r| Ok(s.builder.build_right_shift(l, r, true, "")?))
            }
            Operator::I32x4ShrU => {
                self.vec_shift(i32x4, |s, l, r| Ok(s.builder.build_right_shift(l, r, false, "")?))
            }
            Operator::I64x2Shl => {
                self.vec_shift(i64x2, |s, l, r| Ok(s.builder.build_left_shift(l, r, "")?))
            }
            Operator::I64x2ShrS => {
                self.vec_shift(i64x2, |s, l, r| Ok(s.builder.build_right_shift(l, r, true, "")?))
            }
            Operator::I64x2ShrU => {
                self.vec_shift(i64x2, |s, l, r| Ok(s.builder.build_right_shift(l, r, false, "")?))
            }
            Operator::I8x16Add => {
                self.vec_binop(i8x16, |s, l, r| Ok(s.builder.build_int_add(l, r, "")?))
            }
            Operator::I16x8Add => {
                self.vec_binop(i16x8, |s, l, r| Ok(s.builder.build_int_add(l, r, "")?))
            }
            Operator::I32x4Add => {
                self.vec_binop(i32x4, |s, l, r| Ok(s.builder.build_int_add(l, r, "")?))
            }
            Operator::I64x2Add => {
                self.vec_binop(i64x2, |s, l, r| Ok(s.builder.build_int_add(l, r, "")?))
            }
            Operator::I8x16Sub => {
                self.vec_binop(i8x16, |s, l, r| Ok(s.builder.build_int_sub(l, r, "")?))
            }
            Operator::I16x8Sub => {
                self.vec_binop(i16x8, |s, l, r| Ok(s.builder.build_int_sub(l, r, "")?))
            }
            Operator::I32x4Sub => {
                self.vec_binop(i32x4, |s, l, r| Ok(s.builder.build_int_sub(l, r, "")?))
            }
            Operator::I64x2Sub => {
                self.vec_binop(i64x2, |s, l, r| Ok(s.builder.build_int_sub(l, r, "")?))
            }
            Operator::I16x8Mul => {
                self.vec_binop(i16x8, |s, l, r| Ok(s.builder.build_int_mul(l, r, "")?))
            }
            Operator::I32x4Mul => {
                self.vec_binop(i32x4, |s, l, r| Ok(s.builder.build_int_mul(l, r, "")?))
            }
            Operator::I64x2Mul => {
                self.vec_binop(i64x2, |s, l, r| Ok(s.builder.build_int_mul(l, r, "")?))
            }
            Operator::I8x16AddSatS => self.vec_intrinsic_binop(i8x16, "llvm.sadd.sat", true),
            Operator::I8x16AddSatU => self.vec_intrinsic_binop(i8x16, "llvm.uadd.sat", true),
            Operator::I16x8AddSatS => self.vec_intrinsic_binop(i16x8, "llvm.sadd.sat", true),
            Operator::I16x8AddSatU => self.vec_intrinsic_binop(i16x8, "llvm.uadd.sat", true),
            Operator::I8x16SubSatS => self.vec_intrinsic_binop(i8x16, "llvm.ssub.sat", true),
            Operator::I8x16SubSatU => self.vec_intrinsic_binop(i8x16, "llvm.usub.sat", true),
            Operator::I16x8SubSatS => self.vec_intrinsic_binop(i16x8, "llvm.ssub.sat", true),
            Operator::I16x8SubSatU => self.vec_intrinsic_binop(i16x8, "llvm.usub.sat", true),
            Operator::I8x16MinS => self.vec_intrinsic_binop(i8x16, "llvm.smin", true),
            Operator::I8x16MinU => self.vec_intrinsic_binop(i8x16, "llvm.umin", true),
            Operator::I8x16MaxS => self.vec_intrinsic_binop(i8x16, "llvm.smax", true),
            Operator::I8x16MaxU => self.vec_intrinsic_binop(i8x16, "llvm.umax", true),
            Operator::I16x8MinS => self.vec_intrinsic_binop(i16x8, "llvm.smin", true),
            Operator::I16x8MinU => self.vec_intrinsic_binop(i16x8, "llvm.umin", true),
            Operator::I16x8MaxS => self.vec_intrinsic_binop(i16x8, "llvm.smax", true),
            Operator::I16x8MaxU => self.vec_intrinsic_binop(i16x8, "llvm.umax", true),
            Operator::I32x4MinS => self.vec_intrinsic_binop(i32x4, "llvm.smin", true),
            Operator::I32x4MinU => self.vec_intrinsic_binop(i32x4, "llvm.umin", true),
            Operator::I32x4MaxS => self.vec_intrinsic_binop(i32x4, "llvm.smax", true),
            Operator::I32x4MaxU => self.vec_intrinsic_binop(i32x4, "llvm.umax", true),
            Operator::I8x16AvgrU => self.vec_avgr(i8x16),
            Operator::I16x8AvgrU => self.vec_avgr(i16x8),
            Operator::I16x8Q15MulrSatS | Operator::I16x8RelaxedQ15mulrS => {
                self.vec_q15mulr_sat()
            }
            Operator::I16x8ExtAddPairwiseI8x16S => {
                self.vec_extadd_pairwise(i8x16, i16x8, true)
            }
            Operator::I16x8ExtAddPairwiseI8x16U => {
                self.vec_extadd_pairwise(i8x16, i16x8, false)
            }
            Operator::I32x4ExtAddPairwiseI16x8S => {
                self.vec_extadd_pairwise(i16x8, i32x4, true)
            }
            Operator::I32x4ExtAddPairwiseI16x8U => {
                self.vec_extadd_pairwise(i16x8, i32x4, false)
            }
            Operator::I16x8ExtendLowI8x16S => self.vec_extend(i8x16, i16x8, false, true),
            Operator::I16x8ExtendHighI8x16S => self.vec_extend(i8x16, i16x8, true, true),
            Operator::I16x8ExtendLowI8x16U => self.vec_extend(i8x16, i16x8, false, false),
            Operator::I16x8ExtendHighI8x16U => self.vec_extend(i8x16, i16x8, true, false),
            Operator::I32x4ExtendLowI16x8S => self.vec_extend(i16x8, i32x4, false, true),
            Operator::I32x4ExtendHighI16x8S => self.vec_extend(i16x8, i32x4, true, true),
            Operator::I32x4ExtendLowI16x8U => self.vec_extend(i16x8, i32x4, false, false),
            Operator::I32x4ExtendHighI16x8U => self.vec_extend(i16x8, i32x4, true, false),
            Operator::I64x2ExtendLowI32x4S => self.vec_extend(i32x4, i64x2, false, true),
            Operator::I64x2ExtendHighI32x4S => self.vec_extend(i32x4, i64x2, true, true),
            Operator::I64x2ExtendLowI32x4U => self.vec_extend(i32x4, i64x2, false, false),
            Operator::I64x2ExtendHighI32x4U => self.vec_extend(i32x4, i64x2, true, false),
            Operator::I16x8ExtMulLowI8x16S => self.vec_extmul(i8x16, i16x8, false, true),
            Operator::I16x8ExtMulHighI8x16S => self.vec_extmul(i8x16, i16x8, true, true),
            Operator::I16x8ExtMulLowI8x16U => self.vec_extmul(i8x16, i16x8, false, false),
            Operator::I16x8ExtMulHighI8x16U => self.vec_extmul(i8x16, i16x8, true, false),
            Operator::I32x4ExtMulLowI16x8S => self.vec_extmul(i16x8, i32x4, false, true),
            Operator::I32x4ExtMulHighI16x8S => self.vec_extmul(i16x8, i32x4, true, true),
            Operator::I32x4ExtMulLowI16x8U => self.vec_extmul(i16x8, i32x4, false, false),
            Operator::I32x4ExtMulHighI16x8U => self.vec_extmul(i16x8, i32x4, true, false),
            Operator::I64x2ExtMulLowI32x4S => self.vec_extmul(i32x4, i64x2, false, true),
            Operator::I64x2ExtMulHighI32x4S => self.vec_extmul(i32x4, i64x2, true, true),
            Operator::I64x2ExtMulLowI32x4U => self.vec_extmul(i32x4, i64x2, false, false),
            Operator::I64x2ExtMulHighI32x4U => self.vec_extmul(i32x4, i64x2, true, false),
            Operator::I32x4DotI16x8S => self.vec_dot_i16x8(),
            Operator::I16x8RelaxedDotI8x16I7x16S => self.vec_dot_i8x16_i7x16(),
            Operator::I32x4RelaxedDotI8x16I7x16AddS => self.vec_dot_i8x16_i7x16_add(),

            // === Lane-wise float ===
            Operator::F32x4Ceil => self.vec_funary(f32x4, "llvm.ceil"),
            Operator::F32x4Floor => self.vec_funary(f32x4, "llvm.floor"),
            Operator::F32x4Trunc => self.vec_funary(f32x4, "llvm.trunc"),
            Operator::F32x4Nearest => self.vec_funary(f32x4, "llvm.roundeven"),
            Operator::F64x2Ceil => self.vec_funary(f64x2, "llvm.ceil"),
            Operator::F64x2Floor => self.vec_funary(f64x2, "llvm.floor"),
            Operator::F64x2Trunc => self.vec_funary(f64x2, "llvm.trunc"),
            Operator::F64x2Nearest => self.vec_funary(f64x2, "llvm.roundeven"),
            Operator::F32x4Abs => self.vec_funary(f32x4, "llvm.fabs"),
            Operator::F64x2Abs => self.vec_funary(f64x2, "llvm.fabs"),
            Operator::F32x4Sqrt => self.vec_funary(f32x4, "llvm.sqrt"),
            Operator::F64x2Sqrt => self.vec_funary(f64x2, "llvm.sqrt"),
            Operator::F32x4Neg => self.vec_unop(f32x4, |s, v| {
                Ok(s.builder.build_float_neg(v, "")?)
            }),
            Operator::F64x2Neg => self.vec_unop(f64x2, |s, v| {
                Ok(s.builder.build_float_neg(v, "")?)
            }),
            Operator::F32x4Add => {
                self.vec_binop(f32x4, |s, l, r| Ok(s.builder.build_float_add(l, r, "")?))
            }
            Operator::F64x2Add => {
                self.vec_binop(f64x2, |s, l, r| Ok(s.builder.build_float_add(l, r, "")?))
            }
            Operator::F32x4Sub => {
                self.vec_binop(f32x4, |s, l, r| Ok(s.builder.build_float_sub(l, r, "")?))
            }
            Operator::F64x2Sub => {
                self.vec_binop(f64x2, |s, l, r| Ok(s.builder.build_float_sub(l, r, "")?))
            }
            Operator::F32x4Mul => {
                self.vec_binop(f32x4, |s, l, r| Ok(s.builder.build_float_mul(l, r, "")?))
            }
            Operator::F64x2Mul => {
                self.vec_binop(f64x2, |s, l, r| Ok(s.builder.build_float_mul(l, r, "")?))
            }
            Operator::F32x4Div => {
                self.vec_binop(f32x4, |s, l, r| Ok(s.builder.build_float_div(l, r, "")?))
            }
            Operator::F64x2Div => {
                self.vec_binop(f64x2, |s, l, r| Ok(s.builder.build_float_div(l, r, "")?))
            }
            Operator::F32x4Min | Operator::F32x4RelaxedMin => {
                self.vec_intrinsic_binop(f32x4, "llvm.minimum", true)
            }
            Operator::F32x4Max | Operator::F32x4RelaxedMax => {
                self.vec_intrinsic_binop(f32x4, "llvm.maximum", true)
            }
            Operator::F64x2Min | Operator::F64x2RelaxedMin => {
                self.vec_intrinsic_binop(f64x2, "llvm.minimum", true)
            }
            Operator::F64x2Max | Operator::F64x2RelaxedMax => {
                self.vec_intrinsic_binop(f64x2, "llvm.maximum", true)
            }
            Operator::F32x4PMin => self.vec_pminmax(f32x4, true),
            Operator::F32x4PMax => self.vec_pminmax(f32x4, false),
            Operator::F64x2PMin => self.vec_pminmax(f64x2, true),
            Operator::F64x2PMax => self.vec_pminmax(f64x2, false),
            Operator::F32x4RelaxedMadd => self.vec_madd(f32x4, false),
            Operator::F32x4RelaxedNmadd => self.vec_madd(f32x4, true),
            Operator::F64x2RelaxedMadd => self.vec_madd(f64x2, false),
            Operator::F64x2RelaxedNmadd => self.vec_madd(f64x2, true),

            // === Conversions ===
            Operator::I32x4TruncSatF32x4S | Operator::I32x4RelaxedTruncF32x4S => {
                self.vec_trunc_sat(f32x4, true, false)
            }
            Operator::I32x4TruncSatF32x4U | Operator::I32x4RelaxedTruncF32x4U => {
                self.vec_trunc_sat(f32x4, false, false)
            }
            Operator::I32x4TruncSatF64x2SZero | Operator::I32x4RelaxedTruncF64x2SZero => {
                self.vec_trunc_sat(f64x2, true, true)
            }
            Operator::I32x4TruncSatF64x2UZero | Operator::I32x4RelaxedTruncF64x2UZero => {
                self.vec_trunc_sat(f64x2, false, true)
            }
            Operator::F32x4ConvertI32x4S => {
                let value = self.pop_vec(i32x4)?;
                let result = self.builder.build_signed_int_to_float(value, f32x4, "")?;
                self.push_vec(result)
            }
            Operator::F32x4ConvertI32x4U => {
                let value = self.pop_vec(i32x4)?;
                let result = self.builder.build_unsigned_int_to_float(value, f32x4, "")?;
                self.push_vec(result)
            }
            Operator::F64x2ConvertLowI32x4S => {
                let value = self.pop_vec(i32x4)?;
                let low = self.half_shuffle(value, 2, false)?;
                let result = self
                    .builder
                    .build_signed_int_to_float(low, f64x2, "")?;
                self.push_vec(result)
            }
            Operator::F64x2ConvertLowI32x4U => {
                let value = self.pop_vec(i32x4)?;
                let low = self.half_shuffle(value, 2, false)?;
                let result = self
                    .builder
                    .build_unsigned_int_to_float(low, f64x2, "")?;
                self.push_vec(result)
            }
            Operator::F32x4DemoteF64x2Zero => {
                let value = self.pop_vec(f64x2)?;
                let narrow_ty = self.ctx.f32.vec_type(2);
                let pair = self.builder.build_float_trunc(value, narrow_ty, "")?;
                let mask: Vec<IntValue> = (0..4)
                    .map(|i| self.ctx.i32.const_int(u64::from(i), false))
                    .collect();
                let padded = self.builder.build_shuffle_vector(
                    pair,
                    narrow_ty.const_zero(),
                    VectorType::const_vector(&mask),
                    "",
                )?;
                self.push_vec(padded)
            }
            Operator::F64x2PromoteLowF32x4 => {
                let value = self.pop_vec(f32x4)?;
                let low = self.half_shuffle(value, 2, false)?;
                let result = self.builder.build_float_ext(low, f64x2, "")?;
                self.push_vec(result)
            }

            _ => self.translate_atomic_operator(op),
        }
    }

    fn vec_abs(&mut self, ty: VectorType<'ctx>) -> Result<()> {
        let value = self.pop_vec(ty)?;
        let result = self.call_llvm_intrinsic(
            "llvm.abs",
            &[ty.into()],
            &[value.into(), self.ctx.i1.const_zero().into()],
        )?;
        self.push_vec(result.into_vector_value())
    }

    fn vec_neg(&mut self, ty: VectorType<'ctx>) -> Result<()> {
        let value = self.pop_vec(ty)?;
        let result = self.builder.build_int_sub(ty.const_zero(), value, "")?;
        self.push_vec(result)
    }

    fn vec_funary(&mut self, ty: VectorType<'ctx>, name: &str) -> Result<()> {
        let value = self.pop_vec(ty)?;
        let result = self.call_llvm_intrinsic(name, &[ty.into()], &[value.into()])?;
        self.push_vec(result.into_vector_value())
    }

    /// Pseudo-min/max: `pmin` is `b < a ? b : a`, `pmax` is `a < b ? b : a`.
    fn vec_pminmax(&mut self, ty: VectorType<'ctx>, is_min: bool) -> Result<()> {
        let rhs = self.pop_vec(ty)?;
        let lhs = self.pop_vec(ty)?;
        let cond = if is_min {
            self.builder
                .build_float_compare(FloatPredicate::OLT, rhs, lhs, "")?
        } else {
            self.builder
                .build_float_compare(FloatPredicate::OLT, lhs, rhs, "")?
        };
        let result = self.builder.build_select(cond, rhs, lhs, "")?;
        self.push_vec(result.into_vector_value())
    }

    /// Relaxed fused multiply-add: plain multiply and add, letting the
    /// optimiser contract when profitable.
    fn vec_madd(&mut self, ty: VectorType<'ctx>, negate: bool) -> Result<()> {
        let addend = self.pop_vec(ty)?;
        let rhs = self.pop_vec(ty)?;
        let mut lhs = self.pop_vec(ty)?;
        if negate {
            lhs = self.builder.build_float_neg(lhs, "")?;
        }
        let product = self.builder.build_float_mul(lhs, rhs, "")?;
        let result = self.builder.build_float_add(product, addend, "")?;
        self.push_vec(result)
    }

    fn load_lane(&mut self, memarg: &MemArg, lane: u8, ty: VectorType<'ctx>) -> Result<()> {
        let vec = self.pop_vec(ty)?;
        let scalar_ty = ty.get_element_type();
        let value = self.load_from_memory(memarg, scalar_ty)?;
        let replaced = self.builder.build_insert_element(
            vec,
            value,
            self.ctx.i32.const_int(lane.into(), false),
            "",
        )?;
        self.push_vec(replaced)
    }

    fn store_lane(&mut self, memarg: &MemArg, lane: u8, ty: VectorType<'ctx>) -> Result<()> {
        let vec = self.pop_vec(ty)?;
        let value = self.builder.build_extract_element(
            vec,
            self.ctx.i32.const_int(lane.into(), false),
            "",
        )?;
        let addr = self.effective_address(memarg.offset)?;
        let ptr = self.memory_ptr(memarg.memory, addr)?;
        let inst = self.builder.build_store(ptr, value)?;
        let _ = inst.set_volatile(true);
        let _ = inst.set_alignment(1);
        Ok(())
    }
}
