//! Reference and GC operator lowerings.
//!
//! References are 128-bit values: lane 0 carries the heap-type descriptor,
//! lane 1 the payload. A zero payload is null, except for i31 references
//! which tag bit 31. Aggregate operations delegate to runtime intrinsics;
//! getters pass a signedness byte and setters marshal through scratch
//! slots, because field storage types are erased at this boundary.

use inkwell::types::BasicTypeEnum;
use inkwell::values::{BasicValueEnum, IntValue, VectorValue};
use inkwell::IntPredicate;
use wasmparser::{AbstractHeapType, HeapType, Operator, RefType, StorageType};

use crate::abi::{heap_type, Intrinsic, TrapCode, I31_TAG, NULLABLE_FLAG};
use crate::codegen::function::FunctionTranslator;
use crate::{Error, Result};

impl<'ctx, 'm> FunctionTranslator<'ctx, 'm> {
    /// The descriptor constant for a reference type, as passed to the
    /// runtime cast intrinsics.
    pub(crate) fn heap_type_descriptor(&self, rt: &RefType) -> u64 {
        self.heap_descriptor(&rt.heap_type(), rt.is_nullable())
    }

    fn heap_descriptor(&self, hty: &HeapType, nullable: bool) -> u64 {
        let base = match hty {
            HeapType::Abstract { ty, .. } => match ty {
                AbstractHeapType::Func => heap_type::FUNC,
                AbstractHeapType::Extern => heap_type::EXTERN,
                AbstractHeapType::Any => heap_type::ANY,
                AbstractHeapType::Eq => heap_type::EQ,
                AbstractHeapType::I31 => heap_type::I31,
                AbstractHeapType::Struct => heap_type::STRUCT,
                AbstractHeapType::Array => heap_type::ARRAY,
                AbstractHeapType::NoFunc => heap_type::NULL_FUNC,
                AbstractHeapType::NoExtern => heap_type::NULL_EXTERN,
                _ => heap_type::NULL,
            },
            HeapType::Concrete(index) => {
                heap_type::indexed(index.as_module_index().unwrap_or(0))
            }
        };
        if nullable {
            base | NULLABLE_FLAG
        } else {
            base
        }
    }

    /// Descriptor for a null value of the given heap type: the dynamic type
    /// scales down to the bottom of its hierarchy.
    fn null_descriptor(&self, hty: &HeapType) -> u64 {
        match hty {
            HeapType::Abstract { ty, .. } => match ty {
                AbstractHeapType::Func | AbstractHeapType::NoFunc => heap_type::NULL_FUNC,
                AbstractHeapType::Extern | AbstractHeapType::NoExtern => heap_type::NULL_EXTERN,
                _ => heap_type::NULL,
            },
            HeapType::Concrete(index) => {
                if self.ctx.is_func_type(index.as_module_index().unwrap_or(0)) {
                    heap_type::NULL_FUNC
                } else {
                    heap_type::NULL
                }
            }
        }
    }

    /// Build the `<2 x i64>` for a constant descriptor and payload.
    fn make_reference(&self, descriptor: u64, payload: IntValue<'ctx>) -> Result<VectorValue<'ctx>> {
        let desc = self.ctx.i64.const_int(descriptor, false);
        let vec = self.ctx.i64x2.const_zero();
        let vec = self.builder.build_insert_element(vec, desc, self.ctx.i32.const_zero(), "")?;
        let vec =
            self.builder
                .build_insert_element(vec, payload, self.ctx.i32.const_int(1, false), "")?;
        Ok(vec)
    }

    pub(crate) fn reference_payload(&self, reference: VectorValue<'ctx>) -> Result<IntValue<'ctx>> {
        Ok(self
            .builder
            .build_extract_element(reference, self.ctx.i64.const_int(1, false), "ref.payload")?
            .into_int_value())
    }

    /// The IR type a getter's scratch slot is read back with; packed i8/i16
    /// fields come back extended to i32 by the runtime.
    fn storage_value_type(&self, storage: &StorageType) -> BasicTypeEnum<'ctx> {
        match storage {
            StorageType::I8 | StorageType::I16 => self.ctx.i32.into(),
            StorageType::Val(ty) => self.ctx.value_type(*ty),
        }
    }

    /// Marshal a value into a fresh 16-byte scratch slot.
    fn spill_to_slot(
        &mut self,
        value: BasicValueEnum<'ctx>,
    ) -> Result<inkwell::values::PointerValue<'ctx>> {
        let slot = self.builder.build_alloca(self.ctx.i64x2, "boxed")?;
        self.builder.build_store(slot, value)?;
        Ok(slot)
    }

    /// Shared body of `struct.get` and `array.get`: call the getter with a
    /// signedness byte and a scratch slot, then load the slot back with the
    /// field's value type.
    fn aggregate_get(
        &mut self,
        which: Intrinsic,
        type_idx: u32,
        index_arg: IntValue<'ctx>,
        signed: bool,
        storage: &StorageType,
        reference: VectorValue<'ctx>,
    ) -> Result<()> {
        let slot = self.builder.build_alloca(self.ctx.i64x2, "field")?;
        let fn_ty = self.ctx.llctx.void_type().fn_type(
            &[
                self.ctx.i64x2.into(),
                self.ctx.i32.into(),
                self.ctx.i32.into(),
                self.ctx.i8.into(),
                self.ctx.ptr.into(),
            ],
            false,
        );
        self.ctx.build_intrinsic_call(
            &self.builder,
            which,
            fn_ty,
            &[
                reference.into(),
                self.ctx.i32.const_int(type_idx.into(), false).into(),
                index_arg.into(),
                self.ctx.i8.const_int(u64::from(signed), false).into(),
                slot.into(),
            ],
        )?;
        let value = self
            .builder
            .build_load(self.storage_value_type(storage), slot, "")?;
        self.push(value);
        Ok(())
    }

    pub(crate) fn translate_reference_operator(&mut self, op: &Operator<'_>) -> Result<()> {
        match op {
            Operator::RefNull { hty } => {
                let descriptor = self.null_descriptor(hty);
                let value = self.make_reference(descriptor, self.ctx.i64.const_zero())?;
                self.push(value);
                Ok(())
            }
            Operator::RefIsNull => {
                let reference = self.pop()?.into_vector_value();
                let payload = self.reference_payload(reference)?;
                let is_null = self.builder.build_int_compare(
                    IntPredicate::EQ,
                    payload,
                    self.ctx.i64.const_zero(),
                    "",
                )?;
                let ext = self.builder.build_int_z_extend(is_null, self.ctx.i32, "")?;
                self.push(ext);
                Ok(())
            }
            Operator::RefFunc { function_index } => {
                let fn_ty = self.ctx.i64x2.fn_type(&[self.ctx.i32.into()], false);
                let value = self
                    .ctx
                    .build_intrinsic_call(
                        &self.builder,
                        Intrinsic::RefFunc,
                        fn_ty,
                        &[self
                            .ctx
                            .i32
                            .const_int((*function_index).into(), false)
                            .into()],
                    )?
                    .try_as_basic_value()
                    .left()
                    .ok_or_else(|| Error::Internal("RefFunc returned void".into()))?;
                self.push(value);
                Ok(())
            }
            Operator::RefEq => {
                let rhs = self.pop()?.into_vector_value();
                let lhs = self.pop()?.into_vector_value();
                let rhs = self.reference_payload(rhs)?;
                let lhs = self.reference_payload(lhs)?;
                let eq = self
                    .builder
                    .build_int_compare(IntPredicate::EQ, lhs, rhs, "")?;
                let ext = self.builder.build_int_z_extend(eq, self.ctx.i32, "")?;
                self.push(ext);
                Ok(())
            }
            Operator::RefAsNonNull => {
                let reference = self.peek()?.into_vector_value();
                let payload = self.reference_payload(reference)?;
                let non_null = self.builder.build_int_compare(
                    IntPredicate::NE,
                    payload,
                    self.ctx.i64.const_zero(),
                    "",
                )?;
                self.trap_unless(non_null, TrapCode::CastNullToNonNull, "ref_as_non_null.ok")
            }
            Operator::RefTestNonNull { hty } | Operator::RefTestNullable { hty } => {
                let reference = self.pop()?.into_vector_value();
                let nullable = matches!(op, Operator::RefTestNullable { .. });
                let descriptor = self.heap_descriptor(hty, nullable);
                let fn_ty = self
                    .ctx
                    .i32
                    .fn_type(&[self.ctx.i64x2.into(), self.ctx.i64.into()], false);
                let matched = self
                    .ctx
                    .build_intrinsic_call(
                        &self.builder,
                        Intrinsic::RefTest,
                        fn_ty,
                        &[
                            reference.into(),
                            self.ctx.i64.const_int(descriptor, false).into(),
                        ],
                    )?
                    .try_as_basic_value()
                    .left()
                    .ok_or_else(|| Error::Internal("RefTest returned void".into()))?;
                self.push(matched);
                Ok(())
            }
            Operator::RefCastNonNull { hty } | Operator::RefCastNullable { hty } => {
                let reference = self.pop()?.into_vector_value();
                let nullable = matches!(op, Operator::RefCastNullable { .. });
                let descriptor = self.heap_descriptor(hty, nullable);
                let fn_ty = self
                    .ctx
                    .i64x2
                    .fn_type(&[self.ctx.i64x2.into(), self.ctx.i64.into()], false);
                let cast = self
                    .ctx
                    .build_intrinsic_call(
                        &self.builder,
                        Intrinsic::RefCast,
                        fn_ty,
                        &[
                            reference.into(),
                            self.ctx.i64.const_int(descriptor, false).into(),
                        ],
                    )?
                    .try_as_basic_value()
                    .left()
                    .ok_or_else(|| Error::Internal("RefCast returned void".into()))?;
                self.push(cast);
                Ok(())
            }

            // === Struct ===
            Operator::StructNew { struct_type_index } => {
                let field_count = match &self.ctx.composite_types
                    [*struct_type_index as usize]
                    .composite_type
                    .inner
                {
                    wasmparser::CompositeInnerType::Struct(s) => s.fields.len(),
                    _ => 0,
                };
                let mut fields = vec![None; field_count];
                for slot in fields.iter_mut().rev() {
                    *slot = Some(self.pop()?);
                }
                let array_ty = self.ctx.i64x2.array_type(field_count as u32);
                let args = self.builder.build_alloca(array_ty, "fields")?;
                for (i, field) in fields.into_iter().enumerate() {
                    let slot = unsafe {
                        self.builder.build_in_bounds_gep(
                            self.ctx.i64x2,
                            args,
                            &[self.ctx.i64.const_int(i as u64, false)],
                            "",
                        )?
                    };
                    self.builder
                        .build_store(slot, field.ok_or_else(|| Error::Internal("struct.new arity".into()))?)?;
                }
                self.struct_new_call(*struct_type_index, args.into(), field_count as u32)
            }
            Operator::StructNewDefault { struct_type_index } => {
                let null = self.ctx.ptr.const_null();
                self.struct_new_call(*struct_type_index, null.into(), 0)
            }
            Operator::StructGet {
                struct_type_index,
                field_index,
            }
            | Operator::StructGetS {
                struct_type_index,
                field_index,
            }
            | Operator::StructGetU {
                struct_type_index,
                field_index,
            } => {
                let signed = matches!(op, Operator::StructGetS { .. });
                let storage = self.ctx.storage_type(*struct_type_index, *field_index);
                let reference = self.pop()?.into_vector_value();
                let field = self.ctx.i32.const_int((*field_index).into(), false);
                self.aggregate_get(
                    Intrinsic::StructGet,
                    *struct_type_index,
                    field,
                    signed,
                    &storage,
                    reference,
                )
            }
            Operator::StructSet {
                struct_type_index,
                field_index,
            } => {
                let value = self.pop()?;
                let reference = self.pop()?.into_vector_value();
                let slot = self.spill_to_slot(value)?;
                let fn_ty = self.ctx.llctx.void_type().fn_type(
                    &[
                        self.ctx.i64x2.into(),
                        self.ctx.i32.into(),
                        self.ctx.i32.into(),
                        self.ctx.ptr.into(),
                    ],
                    false,
                );
                self.ctx.build_intrinsic_call(
                    &self.builder,
                    Intrinsic::StructSet,
                    fn_ty,
                    &[
                        reference.into(),
                        self.ctx.i32.const_int((*struct_type_index).into(), false).into(),
                        self.ctx.i32.const_int((*field_index).into(), false).into(),
                        slot.into(),
                    ],
                )?;
                Ok(())
            }

            // === Array ===
            Operator::ArrayNew { array_type_index } => {
                let length = self.pop_int()?;
                let value = self.pop()?;
                let slot = self.spill_to_slot(value)?;
                self.array_new_call(*array_type_index, length, slot.into(), 1)
            }
            Operator::ArrayNewDefault { array_type_index } => {
                let length = self.pop_int()?;
                let null = self.ctx.ptr.const_null();
                self.array_new_call(*array_type_index, length, null.into(), 0)
            }
            Operator::ArrayNewFixed {
                array_type_index,
                array_size,
            } => {
                let count = *array_size as usize;
                let mut values = vec![None; count];
                for slot in values.iter_mut().rev() {
                    *slot = Some(self.pop()?);
                }
                let array_ty = self.ctx.i64x2.array_type(*array_size);
                let args = self.builder.build_alloca(array_ty, "elems")?;
                for (i, value) in values.into_iter().enumerate() {
                    let slot = unsafe {
                        self.builder.build_in_bounds_gep(
                            self.ctx.i64x2,
                            args,
                            &[self.ctx.i64.const_int(i as u64, false)],
                            "",
                        )?
                    };
                    self.builder.build_store(
                        slot,
                        value.ok_or_else(|| Error::Internal("array.new_fixed arity".into()))?,
                    )?;
                }
                let length = self.ctx.i32.const_int((*array_size).into(), false);
                self.array_new_call(*array_type_index, length, args.into(), *array_size)
            }
            Operator::ArrayNewData {
                array_type_index,
                array_data_index,
            } => self.array_new_segment(
                Intrinsic::ArrayNewData,
                *array_type_index,
                *array_data_index,
            ),
            Operator::ArrayNewElem {
                array_type_index,
                array_elem_index,
            } => self.array_new_segment(
                Intrinsic::ArrayNewElem,
                *array_type_index,
                *array_elem_index,
            ),
            Operator::ArrayGet { array_type_index }
            | Operator::ArrayGetS { array_type_index }
            | Operator::ArrayGetU { array_type_index } => {
                let signed = matches!(op, Operator::ArrayGetS { .. });
                let storage = self.ctx.storage_type(*array_type_index, 0);
                let index = self.pop_int()?;
                let reference = self.pop()?.into_vector_value();
                self.aggregate_get(
                    Intrinsic::ArrayGet,
                    *array_type_index,
                    index,
                    signed,
                    &storage,
                    reference,
                )
            }
            Operator::ArraySet { array_type_index } => {
                let value = self.pop()?;
                let index = self.pop_int()?;
                let reference = self.pop()?.into_vector_value();
                let slot = self.spill_to_slot(value)?;
                let fn_ty = self.ctx.llctx.void_type().fn_type(
                    &[
                        self.ctx.i64x2.into(),
                        self.ctx.i32.into(),
                        self.ctx.i32.into(),
                        self.ctx.ptr.into(),
                    ],
                    false,
                );
                self.ctx.build_intrinsic_call(
                    &self.builder,
                    Intrinsic::ArraySet,
                    fn_ty,
                    &[
                        reference.into(),
                        self.ctx.i32.const_int((*array_type_index).into(), false).into(),
                        index.into(),
                        slot.into(),
                    ],
                )?;
                Ok(())
            }
            Operator::ArrayLen => {
                let reference = self.pop()?.into_vector_value();
                let fn_ty = self.ctx.i32.fn_type(&[self.ctx.i64x2.into()], false);
                let len = self
                    .ctx
                    .build_intrinsic_call(
                        &self.builder,
                        Intrinsic::ArrayLen,
                        fn_ty,
                        &[reference.into()],
                    )?
                    .try_as_basic_value()
                    .left()
                    .ok_or_else(|| Error::Internal("ArrayLen returned void".into()))?;
                self.push(len);
                Ok(())
            }
            Operator::ArrayFill { array_type_index } => {
                let len = self.pop_int()?;
                let value = self.pop()?;
                let offset = self.pop_int()?;
                let reference = self.pop()?.into_vector_value();
                let slot = self.spill_to_slot(value)?;
                let fn_ty = self.ctx.llctx.void_type().fn_type(
                    &[
                        self.ctx.i64x2.into(),
                        self.ctx.i32.into(),
                        self.ctx.i32.into(),
                        self.ctx.ptr.into(),
                        self.ctx.i32.into(),
                    ],
                    false,
                );
                self.ctx.build_intrinsic_call(
                    &self.builder,
                    Intrinsic::ArrayFill,
                    fn_ty,
                    &[
                        reference.into(),
                        self.ctx.i32.const_int((*array_type_index).into(), false).into(),
                        offset.into(),
                        slot.into(),
                        len.into(),
                    ],
                )?;
                Ok(())
            }
            Operator::ArrayCopy {
                array_type_index_dst,
                array_type_index_src,
            } => {
                let len = self.pop_int()?;
                let src_offset = self.pop_int()?;
                let src = self.pop()?.into_vector_value();
                let dst_offset = self.pop_int()?;
                let dst = self.pop()?.into_vector_value();
                let fn_ty = self.ctx.llctx.void_type().fn_type(
                    &[
                        self.ctx.i64x2.into(),
                        self.ctx.i32.into(),
                        self.ctx.i32.into(),
                        self.ctx.i64x2.into(),
                        self.ctx.i32.into(),
                        self.ctx.i32.into(),
                        self.ctx.i32.into(),
                    ],
                    false,
                );
                self.ctx.build_intrinsic_call(
                    &self.builder,
                    Intrinsic::ArrayCopy,
                    fn_ty,
                    &[
                        dst.into(),
                        self.ctx.i32.const_int((*array_type_index_dst).into(), false).into(),
                        dst_offset.into(),
                        src.into(),
                        self.ctx.i32.const_int((*array_type_index_src).into(), false).into(),
                        src_offset.into(),
                        len.into(),
                    ],
                )?;
                Ok(())
            }
            Operator::ArrayInitData {
                array_type_index,
                array_data_index,
            } => self.array_init_segment(
                Intrinsic::ArrayInitData,
                *array_type_index,
                *array_data_index,
            ),
            Operator::ArrayInitElem {
                array_type_index,
                array_elem_index,
            } => self.array_init_segment(
                Intrinsic::ArrayInitElem,
                *array_type_index,
                *array_elem_index,
            ),

            // === Conversions between hierarchies ===
            Operator::AnyConvertExtern => self.convert_reference(heap_type::ANY, heap_type::NULL),
            Operator::ExternConvertAny => {
                self.convert_reference(heap_type::EXTERN, heap_type::NULL_EXTERN)
            }

            // === i31 ===
            Operator::RefI31 => {
                let value = self.pop_int()?;
                let wide = self.builder.build_int_z_extend(value, self.ctx.i64, "")?;
                let low = self.builder.build_and(
                    wide,
                    self.ctx.i64.const_int(0x7FFF_FFFF, false),
                    "",
                )?;
                let payload =
                    self.builder
                        .build_or(low, self.ctx.i64.const_int(I31_TAG, false), "")?;
                let reference = self.make_reference(heap_type::I31, payload)?;
                self.push(reference);
                Ok(())
            }
            Operator::I31GetS | Operator::I31GetU => {
                let reference = self.pop()?.into_vector_value();
                let payload = self.reference_payload(reference)?;
                let tag = self.builder.build_and(
                    payload,
                    self.ctx.i64.const_int(I31_TAG, false),
                    "",
                )?;
                let tagged = self.builder.build_int_compare(
                    IntPredicate::NE,
                    tag,
                    self.ctx.i64.const_zero(),
                    "",
                )?;
                self.trap_unless(tagged, TrapCode::AccessNullI31, "i31.ok")?;

                let narrow = self.builder.build_int_truncate(payload, self.ctx.i32, "")?;
                let result = if matches!(op, Operator::I31GetS) {
                    // Sign-extend from bit 30.
                    let shifted = self.builder.build_left_shift(
                        narrow,
                        self.ctx.i32.const_int(1, false),
                        "",
                    )?;
                    self.builder.build_right_shift(
                        shifted,
                        self.ctx.i32.const_int(1, false),
                        true,
                        "",
                    )?
                } else {
                    self.builder.build_and(
                        narrow,
                        self.ctx.i32.const_int(0x7FFF_FFFF, false),
                        "",
                    )?
                };
                self.push(result);
                Ok(())
            }

            _ => self.translate_simd_operator(op),
        }
    }

    fn struct_new_call(
        &mut self,
        type_idx: u32,
        args: inkwell::values::BasicMetadataValueEnum<'ctx>,
        count: u32,
    ) -> Result<()> {
        let fn_ty = self.ctx.i64x2.fn_type(
            &[self.ctx.i32.into(), self.ctx.ptr.into(), self.ctx.i32.into()],
            false,
        );
        let value = self
            .ctx
            .build_intrinsic_call(
                &self.builder,
                Intrinsic::StructNew,
                fn_ty,
                &[
                    self.ctx.i32.const_int(type_idx.into(), false).into(),
                    args,
                    self.ctx.i32.const_int(count.into(), false).into(),
                ],
            )?
            .try_as_basic_value()
            .left()
            .ok_or_else(|| Error::Internal("StructNew returned void".into()))?;
        self.push(value);
        Ok(())
    }

    fn array_new_call(
        &mut self,
        type_idx: u32,
        length: IntValue<'ctx>,
        values: inkwell::values::BasicMetadataValueEnum<'ctx>,
        count: u32,
    ) -> Result<()> {
        let fn_ty = self.ctx.i64x2.fn_type(
            &[
                self.ctx.i32.into(),
                self.ctx.i32.into(),
                self.ctx.ptr.into(),
                self.ctx.i32.into(),
            ],
            false,
        );
        let value = self
            .ctx
            .build_intrinsic_call(
                &self.builder,
                Intrinsic::ArrayNew,
                fn_ty,
                &[
                    self.ctx.i32.const_int(type_idx.into(), false).into(),
                    length.into(),
                    values,
                    self.ctx.i32.const_int(count.into(), false).into(),
                ],
            )?
            .try_as_basic_value()
            .left()
            .ok_or_else(|| Error::Internal("ArrayNew returned void".into()))?;
        self.push(value);
        Ok(())
    }

    /// `array.new_data` / `array.new_elem`: `[start, length]` popped, the
    /// segment index is an immediate.
    fn array_new_segment(
        &mut self,
        which: Intrinsic,
        type_idx: u32,
        segment: u32,
    ) -> Result<()> {
        let length = self.pop_int()?;
        let start = self.pop_int()?;
        let i32t = self.ctx.i32;
        let fn_ty = self.ctx.i64x2.fn_type(
            &[i32t.into(), i32t.into(), i32t.into(), i32t.into()],
            false,
        );
        let value = self
            .ctx
            .build_intrinsic_call(
                &self.builder,
                which,
                fn_ty,
                &[
                    i32t.const_int(type_idx.into(), false).into(),
                    i32t.const_int(segment.into(), false).into(),
                    start.into(),
                    length.into(),
                ],
            )?
            .try_as_basic_value()
            .left()
            .ok_or_else(|| Error::Internal("array segment constructor returned void".into()))?;
        self.push(value);
        Ok(())
    }

    /// `array.init_data` / `array.init_elem`: `[ref, dst, src, length]`.
    fn array_init_segment(
        &mut self,
        which: Intrinsic,
        type_idx: u32,
        segment: u32,
    ) -> Result<()> {
        let length = self.pop_int()?;
        let src = self.pop_int()?;
        let dst = self.pop_int()?;
        let reference = self.pop()?.into_vector_value();
        let i32t = self.ctx.i32;
        let fn_ty = self.ctx.llctx.void_type().fn_type(
            &[
                self.ctx.i64x2.into(),
                i32t.into(),
                i32t.into(),
                i32t.into(),
                i32t.into(),
                i32t.into(),
            ],
            false,
        );
        self.ctx.build_intrinsic_call(
            &self.builder,
            which,
            fn_ty,
            &[
                reference.into(),
                i32t.const_int(type_idx.into(), false).into(),
                i32t.const_int(segment.into(), false).into(),
                dst.into(),
                src.into(),
                length.into(),
            ],
        )?;
        Ok(())
    }

    /// Rewrite the descriptor lane between the extern and any hierarchies,
    /// preserving null (which maps to the target's bottom type).
    fn convert_reference(&mut self, non_null_desc: u64, null_desc: u64) -> Result<()> {
        let reference = self.pop()?.into_vector_value();
        let payload = self.reference_payload(reference)?;
        let is_null = self.builder.build_int_compare(
            IntPredicate::EQ,
            payload,
            self.ctx.i64.const_zero(),
            "",
        )?;
        let descriptor = self.builder.build_select(
            is_null,
            self.ctx.i64.const_int(null_desc, false),
            self.ctx.i64.const_int(non_null_desc, false),
            "",
        )?;
        let rewritten = self.builder.build_insert_element(
            reference,
            descriptor.into_int_value(),
            self.ctx.i32.const_zero(),
            "",
        )?;
        self.push(rewritten);
        Ok(())
    }
}
