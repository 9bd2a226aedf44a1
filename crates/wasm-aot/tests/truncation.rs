//! Trapping and saturating float-to-integer truncation.
//!
//! Trap codes: 3 = integer-overflow, 4 = invalid-conversion-to-integer.

use inkwell::context::Context;
use wasm_aot::test_harness::*;

fn trunc_module(op: &str, from: &str, to: &str) -> String {
    format!(
        r#"(module (func (export "main") (param {from}) (result {to})
            local.get 0
            {op}))"#
    )
}

#[test]
fn trapping_trunc_checks_nan_then_range() {
    let llctx = Context::create();
    let ir =
        compile_wat_ir(&llctx, &trunc_module("i32.trunc_f32_s", "f32", "i32")).expect("compile");

    let body = function_ir(&ir, "f0");
    // NaN first (ordered self-compare), then both range bounds.
    assert_ir_contains(&body, "fcmp ord");
    assert_ir_contains(&body, "call void @trap(i32 4)");
    assert_ir_contains(&body, "call void @trap(i32 3)");
    assert_ir_contains(&body, "fcmp oge");
    // i32 bounds are not exactly representable in f32, so the upper
    // comparison is strict.
    assert_ir_contains(&body, "fcmp olt");
    assert_ir_contains(&body, "fptosi");
}

#[test]
fn trunc_f64_to_i32_compares_non_strict() {
    let llctx = Context::create();
    let ir =
        compile_wat_ir(&llctx, &trunc_module("i32.trunc_f64_s", "f64", "i32")).expect("compile");

    let body = function_ir(&ir, "f0");
    // 2^31-1 is exact in f64: the overflow-side comparison is OLE.
    assert_ir_contains(&body, "fcmp ole");
}

#[test]
fn unsigned_trunc_traps_on_negative_input() {
    let llctx = Context::create();
    let ir =
        compile_wat_ir(&llctx, &trunc_module("i64.trunc_f64_u", "f64", "i64")).expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, "call void @trap(i32 3)");
    assert_ir_contains(&body, "fptoui");
}

#[test]
fn saturating_trunc_never_traps() {
    let llctx = Context::create();
    let ir = compile_wat_ir(&llctx, &trunc_module("i32.trunc_sat_f32_s", "f32", "i32"))
        .expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_lacks(&body, "@trap");
    // NaN, underflow, overflow and the converted value all meet in a PHI.
    assert_ir_contains(&body, "phi i32");
    assert_ir_contains(&body, "sat.end");
    assert_ir_contains(&body, "-2147483648");
    assert_ir_contains(&body, "2147483647");
}

#[test]
fn saturating_unsigned_clamps_to_zero_and_max() {
    let llctx = Context::create();
    let ir = compile_wat_ir(&llctx, &trunc_module("i32.trunc_sat_f32_u", "f32", "i32"))
        .expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_lacks(&body, "@trap");
    assert_ir_contains(&body, "fptoui");
    assert_ir_contains(&body, "-1"); // u32::MAX printed as the signed -1
}

#[test]
fn i64_saturating_uses_wide_clamps() {
    let llctx = Context::create();
    let ir = compile_wat_ir(&llctx, &trunc_module("i64.trunc_sat_f64_s", "f64", "i64"))
        .expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, "phi i64");
    assert_ir_contains(&body, "-9223372036854775808");
    assert_ir_contains(&body, "9223372036854775807");
}

#[test]
fn wrap_and_extend_have_no_guards() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (func (export "main") (param i64) (result i64)
            local.get 0
            i32.wrap_i64
            i64.extend_i32_s))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_lacks(&body, "@trap");
    assert_ir_contains(&body, "trunc i64");
    assert_ir_contains(&body, "sext i32");
}

#[test]
fn sign_extension_operators_narrow_and_extend() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (func (export "main") (param i32) (result i32)
            local.get 0
            i32.extend8_s))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, "trunc i32");
    assert_ir_contains(&body, "sext i8");
}

#[test]
fn reinterpret_is_a_bitcast() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (func (export "main") (param f32) (result i32)
            local.get 0
            i32.reinterpret_f32))"#,
    )
    .expect("compile");

    assert_ir_contains(&function_ir(&ir, "f0"), "bitcast float");
}
