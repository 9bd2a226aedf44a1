//! Direct, indirect, reference and tail calls, import stubs, and the
//! exported type wrappers.

use inkwell::context::Context;
use wasm_aot::test_harness::*;

#[test]
fn direct_call_passes_the_execution_context() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module
            (func $add (param i32 i32) (result i32)
                local.get 0
                local.get 1
                i32.add)
            (func (export "main") (param i32) (result i32)
                local.get 0
                i32.const 1
                call $add))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f1");
    // The callee receives the caller's exec-ctx pointer as argument 0.
    assert_ir_contains(&body, "call i32 @f0(ptr %0,");
}

#[test]
fn indirect_call_splits_fast_and_boxed_paths() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module
            (type $t (func (param i32) (result i32)))
            (table 1 funcref)
            (func $f (type $t) local.get 0)
            (elem (i32.const 0) $f)
            (func (export "main") (param i32) (result i32)
                local.get 0
                i32.const 0
                call_indirect (type $t)))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f1");
    // Fast path calls the resolved symbol, slow path marshals through
    // scratch arrays; the result joins in a PHI.
    assert_ir_contains(&body, "c_i.not_null");
    assert_ir_contains(&body, "c_i.is_null");
    assert_ir_contains(&body, "c_i.end");
    assert_ir_contains(&body, "phi i32");
    assert_ir_contains(&body, "alloca [16 x i8]"); // one-slot args array
}

#[test]
fn call_ref_traps_on_null_reference() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module
            (type $t (func (param i32) (result i32)))
            (func $f (type $t) local.get 0)
            (elem declare func $f)
            (func (export "main") (param i32) (result i32)
                local.get 0
                ref.func $f
                call_ref $t))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f1");
    // 13 = access-null-function.
    assert_ir_contains(&body, "call void @trap(i32 13)");
    assert_ir_contains(&body, "c_r.not_null");
    assert_ir_contains(&body, "c_r.is_null");
}

#[test]
fn return_call_emits_a_direct_return() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module
            (func $leaf (param i32) (result i32)
                local.get 0)
            (func (export "main") (param i32) (result i32)
                local.get 0
                return_call $leaf))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f1");
    assert_ir_contains(&body, "call i32 @f0");
    // The frame ends at the call; the epilogue is a plain return.
    assert_ir_contains(&body, "ret i32");
    assert_ir_contains(&body, "ret_call.end");
}

#[test]
fn imported_functions_get_marshalling_stubs() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module
            (import "env" "host" (func $host (param i32) (result i32)))
            (func (export "main") (param i32) (result i32)
                local.get 0
                call $host))"#,
    )
    .expect("compile");

    // The stub is private and boxes its argument into a 16-byte slot.
    assert_ir_contains(&ir, "define private i32 @f0");
    let stub = function_ir(&ir, "f0");
    assert_ir_contains(&stub, "alloca [16 x i8]");
    // Call sites do not care that f0 is an import.
    assert_ir_contains(&function_ir(&ir, "f1"), "call i32 @f0");
}

#[test]
fn type_wrappers_are_exported_per_function_type() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module
            (type $a (func (param i32) (result i32)))
            (type $b (func (param i64 i64) (result i64)))
            (func (type $a) local.get 0)
            (func (type $b) local.get 0))"#,
    )
    .expect("compile");

    assert_ir_contains(&ir, "define void @t0(ptr %0, ptr %1, ptr %2, ptr %3)");
    assert_ir_contains(&ir, "define void @t1(ptr %0, ptr %1, ptr %2, ptr %3)");
    // The wrapper loads boxed arguments and stores boxed results.
    let wrapper = function_ir(&ir, "t1");
    assert_ir_contains(&wrapper, "load i64");
    assert_ir_contains(&wrapper, "store i64");
}

#[test]
fn multi_value_call_results_are_unpacked() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module
            (func $pair (result i32 i32)
                i32.const 1
                i32.const 2)
            (func (export "main") (result i32)
                call $pair
                i32.add))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f1");
    assert_ir_contains(&body, "extractvalue { i32, i32 }");
    assert_ir_contains(&body, "add i32");
}
