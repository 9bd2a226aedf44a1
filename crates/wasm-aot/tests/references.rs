//! Reference and GC lowering: null encodings, i31 packing, aggregate
//! accessors.
//!
//! Trap codes: 11 = cast-null-to-non-null, 12 = access-null-i31.

use inkwell::context::Context;
use wasm_aot::test_harness::*;

#[test]
fn ref_null_is_a_zero_payload_vector() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (func (export "main") (result funcref)
            ref.null func))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    // Descriptor 0x73 (nofunc) in lane 0, zero payload in lane 1; the
    // whole value constant-folds to a vector literal.
    assert_ir_contains(&body, "i64 115");
    assert_ir_contains(&body, "<2 x i64>");
}

#[test]
fn ref_is_null_tests_the_payload_lane() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (func (export "main") (param externref) (result i32)
            local.get 0
            ref.is_null))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, "extractelement <2 x i64>");
    assert_ir_contains(&body, "icmp eq i64");
}

#[test]
fn ref_as_non_null_traps_on_null() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (func (export "main") (param funcref) (result (ref func))
            local.get 0
            ref.as_non_null))"#,
    )
    .expect("compile");

    assert_ir_contains(&function_ir(&ir, "f0"), "call void @trap(i32 11)");
}

#[test]
fn i31_packs_the_tag_bit() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (func (export "main") (param i32) (result (ref i31))
            local.get 0
            ref.i31))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    // Mask to 31 bits, then set the non-null tag (bit 31 = 2147483648).
    assert_ir_contains(&body, "2147483647");
    assert_ir_contains(&body, "2147483648");
}

#[test]
fn i31_get_s_traps_on_missing_tag_and_sign_extends() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (func (export "main") (param i31ref) (result i32)
            local.get 0
            i31.get_s))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, "call void @trap(i32 12)");
    // Sign extension from bit 30: shl 1 then ashr 1.
    assert_ir_contains(&body, "shl i32");
    assert_ir_contains(&body, "ashr i32");
}

#[test]
fn i31_get_u_masks_instead() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (func (export "main") (param i31ref) (result i32)
            local.get 0
            i31.get_u))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, "and i32");
    assert_ir_lacks(&body, "ashr i32");
}

#[test]
fn struct_ops_marshal_through_the_runtime() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module
            (type $p (struct (field (mut i32)) (field (mut i64))))
            (func (export "main") (param (ref $p)) (result i32)
                local.get 0
                struct.get $p 0))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    // Getter writes into a scratch slot which is read back typed.
    assert_ir_contains(&body, "alloca <2 x i64>");
    assert_ir_contains(&body, "@intrinsics");
    assert_ir_contains(&body, "load i32");
}

#[test]
fn array_len_returns_an_i32() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module
            (type $a (array (mut i32)))
            (func (export "main") (param (ref $a)) (result i32)
                local.get 0
                array.len))"#,
    )
    .expect("compile");

    assert_ir_contains(&function_ir(&ir, "f0"), "@intrinsics");
}

#[test]
fn extern_conversions_rewrite_the_descriptor() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (func (export "main") (param externref) (result anyref)
            local.get 0
            any.convert_extern))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    // Null stays null (descriptor 0x71); everything else becomes anyref
    // (0x6E).
    assert_ir_contains(&body, "select i1");
    assert_ir_contains(&body, "i64 113");
    assert_ir_contains(&body, "i64 110");
}

#[test]
fn br_on_null_splits_on_the_payload() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (func (export "main") (param externref) (result i32)
            (block (result i32)
                i32.const 7
                local.get 0
                br_on_null 0
                drop)))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, "br_on_null.end");
    assert_ir_contains(&body, "extractelement <2 x i64>");
}
