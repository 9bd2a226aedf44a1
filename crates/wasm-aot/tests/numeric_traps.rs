//! Division/remainder guards, shift masking, and float min/max rules.
//!
//! Trap codes asserted below: 2 = divide-by-zero, 3 = integer-overflow.

use inkwell::context::Context;
use wasm_aot::test_harness::*;

fn div_module(op: &str, ty: &str) -> String {
    format!(
        r#"(module (func (export "main") (param {ty} {ty}) (result {ty})
            local.get 0
            local.get 1
            {op}))"#
    )
}

#[test]
fn signed_div_guards_zero_and_overflow() {
    let llctx = Context::create();
    let ir = compile_wat_ir(&llctx, &div_module("i32.div_s", "i32")).expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, "call void @trap(i32 2)");
    assert_ir_contains(&body, "call void @trap(i32 3)");
    assert_ir_contains(&body, "sdiv i32");
    // INT_MIN and -1 show up in the overflow compare.
    assert_ir_contains(&body, "-2147483648");
    assert_ir_contains(&body, "-1");
}

#[test]
fn unsigned_div_guards_zero_only() {
    let llctx = Context::create();
    let ir = compile_wat_ir(&llctx, &div_module("i32.div_u", "i32")).expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, "call void @trap(i32 2)");
    assert_ir_lacks(&body, "call void @trap(i32 3)");
    assert_ir_contains(&body, "udiv i32");
}

#[test]
fn i64_signed_div_uses_wide_bounds() {
    let llctx = Context::create();
    let ir = compile_wat_ir(&llctx, &div_module("i64.div_s", "i64")).expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, "sdiv i64");
    assert_ir_contains(&body, "-9223372036854775808");
}

#[test]
fn signed_rem_folds_overflow_to_zero() {
    let llctx = Context::create();
    let ir = compile_wat_ir(&llctx, &div_module("i32.rem_s", "i32")).expect("compile");

    let body = function_ir(&ir, "f0");
    // Divide-by-zero still traps, but INT_MIN % -1 produces 0 via a PHI.
    assert_ir_contains(&body, "call void @trap(i32 2)");
    assert_ir_lacks(&body, "call void @trap(i32 3)");
    assert_ir_contains(&body, "srem i32");
    assert_ir_contains(&body, "phi i32");
}

#[test]
fn unsigned_rem_guards_zero() {
    let llctx = Context::create();
    let ir = compile_wat_ir(&llctx, &div_module("i64.rem_u", "i64")).expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, "call void @trap(i32 2)");
    assert_ir_contains(&body, "urem i64");
}

#[test]
fn shift_amounts_are_masked() {
    let llctx = Context::create();
    let ir = compile_wat_ir(&llctx, &div_module("i32.shl", "i32")).expect("compile");
    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, ", 31");
    assert_ir_contains(&body, "shl i32");

    let ir = compile_wat_ir(&llctx, &div_module("i64.shr_s", "i64")).expect("compile");
    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, ", 63");
    assert_ir_contains(&body, "ashr i64");
}

#[test]
fn rotates_use_funnel_shifts() {
    let llctx = Context::create();
    let ir = compile_wat_ir(&llctx, &div_module("i32.rotl", "i32")).expect("compile");
    assert_ir_contains(&ir, "llvm.fshl");

    let ir = compile_wat_ir(&llctx, &div_module("i64.rotr", "i64")).expect("compile");
    assert_ir_contains(&ir, "llvm.fshr");
}

#[test]
fn float_min_merges_sign_bits_and_propagates_nan() {
    let llctx = Context::create();
    let ir = compile_wat_ir(&llctx, &div_module("f32.min", "f32")).expect("compile");

    let body = function_ir(&ir, "f0");
    // Equality and unordered compares select between the bitwise merge
    // (signed zero), the NaN-propagating add, and minnum.
    assert_ir_contains(&body, "fcmp ueq");
    assert_ir_contains(&body, "fcmp uno");
    assert_ir_contains(&body, "fadd float");
    assert_ir_contains(&ir, "llvm.minnum");
    assert_ir_contains(&body, "or i32");
}

#[test]
fn float_max_uses_bitwise_and() {
    let llctx = Context::create();
    let ir = compile_wat_ir(&llctx, &div_module("f64.max", "f64")).expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&ir, "llvm.maxnum");
    assert_ir_contains(&body, "and i64");
}

#[test]
fn clz_is_defined_for_zero() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (func (export "main") (param i32) (result i32)
            local.get 0
            i32.clz))"#,
    )
    .expect("compile");
    // The is-zero-poison argument must be false.
    assert_ir_contains(&ir, "llvm.ctlz");
    assert_ir_contains(&function_ir(&ir, "f0"), "i1 false");
}

#[test]
fn division_by_constant_still_compiles_with_guards() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (func (export "main") (result i32)
            i32.const 10
            i32.const 3
            i32.div_s))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, "sdiv i32");
    assert_ir_contains(&body, "call void @trap(i32 2)");
}
