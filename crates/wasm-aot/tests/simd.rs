//! SIMD lowering: lane types, splats, shuffles, masks, and saturating
//! conversions.

use inkwell::context::Context;
use wasm_aot::test_harness::*;

fn v128_binop(op: &str) -> String {
    format!(
        r#"(module (func (export "main") (param v128 v128) (result v128)
            local.get 0
            local.get 1
            {op}))"#
    )
}

#[test]
fn v128_is_represented_as_two_i64_lanes() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (func (export "main") (param v128) (result v128)
            local.get 0))"#,
    )
    .expect("compile");

    assert_ir_contains(&ir, "define <2 x i64> @f0(ptr %0, <2 x i64> %1)");
}

#[test]
fn splat_replicates_the_scalar() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (func (export "main") (param i32) (result v128)
            local.get 0
            i32x4.splat))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, "insertelement <4 x i32>");
    assert_ir_contains(&body, "shufflevector <4 x i32>");
}

#[test]
fn integer_add_uses_the_lane_type() {
    let llctx = Context::create();
    let ir = compile_wat_ir(&llctx, &v128_binop("i8x16.add")).expect("compile");
    assert_ir_contains(&function_ir(&ir, "f0"), "add <16 x i8>");

    let ir = compile_wat_ir(&llctx, &v128_binop("f64x2.mul")).expect("compile");
    assert_ir_contains(&function_ir(&ir, "f0"), "fmul <2 x double>");
}

#[test]
fn comparisons_produce_all_ones_masks() {
    let llctx = Context::create();
    let ir = compile_wat_ir(&llctx, &v128_binop("i16x8.lt_s")).expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, "icmp slt <8 x i16>");
    assert_ir_contains(&body, "sext <8 x i1>");
}

#[test]
fn shuffle_reads_the_immediate_mask() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        &v128_binop("i8x16.shuffle 0 16 1 17 2 18 3 19 4 20 5 21 6 22 7 23"),
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, "shufflevector <16 x i8>");
    assert_ir_contains(&body, "i32 16");
}

#[test]
fn saturating_arithmetic_uses_generic_intrinsics() {
    let llctx = Context::create();
    let ir = compile_wat_ir(&llctx, &v128_binop("i8x16.add_sat_s")).expect("compile");
    assert_ir_contains(&ir, "llvm.sadd.sat");

    let ir = compile_wat_ir(&llctx, &v128_binop("i16x8.sub_sat_u")).expect("compile");
    assert_ir_contains(&ir, "llvm.usub.sat");
}

#[test]
fn extract_lane_sign_extends_when_asked() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (func (export "main") (param v128) (result i32)
            local.get 0
            i8x16.extract_lane_s 3))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, "extractelement <16 x i8>");
    assert_ir_contains(&body, "sext i8");
}

#[test]
fn bitmask_collapses_sign_bits() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (func (export "main") (param v128) (result i32)
            local.get 0
            i8x16.bitmask))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, "icmp slt <16 x i8>");
    assert_ir_contains(&body, "bitcast <16 x i1>");
    assert_ir_contains(&body, "to i16");
}

#[test]
fn any_true_tests_the_whole_register() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (func (export "main") (param v128) (result i32)
            local.get 0
            v128.any_true))"#,
    )
    .expect("compile");

    assert_ir_contains(&function_ir(&ir, "f0"), "i128");
}

#[test]
fn trunc_sat_lanes_use_fptosi_sat() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (func (export "main") (param v128) (result v128)
            local.get 0
            i32x4.trunc_sat_f32x4_s))"#,
    )
    .expect("compile");

    assert_ir_contains(&ir, "llvm.fptosi.sat");
}

#[test]
fn extend_low_widens_half_the_lanes() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (func (export "main") (param v128) (result v128)
            local.get 0
            i16x8.extend_low_i8x16_s))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, "shufflevector <16 x i8>");
    assert_ir_contains(&body, "sext <8 x i8> ");
}

#[test]
fn v128_loads_are_unaligned_and_volatile() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module
            (memory 1)
            (func (export "main") (param i32) (result v128)
                local.get 0
                v128.load))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, "load volatile <2 x i64>");
    assert_ir_contains(&body, "align 1");
}

#[test]
fn bitselect_mixes_with_and_or() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (func (export "main") (param v128 v128 v128) (result v128)
            local.get 0
            local.get 1
            local.get 2
            v128.bitselect))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, "and <2 x i64>");
    assert_ir_contains(&body, "or <2 x i64>");
}
