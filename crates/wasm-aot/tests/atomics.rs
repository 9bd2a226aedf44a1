//! Atomic memory operators: alignment traps, seq-cst ordering, RMW and
//! compare-exchange shapes.
//!
//! Trap code 10 = unaligned-atomic-access.

use inkwell::context::Context;
use wasm_aot::test_harness::*;

fn shared_mem_module(body: &str, params: &str, results: &str) -> String {
    format!(
        r#"(module
            (memory 1 1 shared)
            (func (export "main") {params} {results}
                {body}))"#
    )
}

#[test]
fn atomic_load_is_seq_cst_and_checks_alignment() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        &shared_mem_module(
            "local.get 0 i32.atomic.load",
            "(param i32)",
            "(result i32)",
        ),
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, "load atomic i32");
    assert_ir_contains(&body, "seq_cst");
    assert_ir_contains(&body, "call void @trap(i32 10)");
    // Alignment test masks the low address bits.
    assert_ir_contains(&body, "and i64");
}

#[test]
fn alignment_is_checked_even_with_aligned_annotation() {
    let llctx = Context::create();
    // align=2 is the natural (and only valid) annotation for i32 loads; the
    // dynamic check must be emitted anyway.
    let ir = compile_wat_ir(
        &llctx,
        &shared_mem_module(
            "local.get 0 i32.atomic.load align=2",
            "(param i32)",
            "(result i32)",
        ),
    )
    .expect("compile");

    assert_ir_contains(&function_ir(&ir, "f0"), "call void @trap(i32 10)");
}

#[test]
fn atomic_store_is_seq_cst() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        &shared_mem_module(
            "local.get 0 local.get 1 i64.atomic.store",
            "(param i32 i64)",
            "",
        ),
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, "store atomic i64");
    assert_ir_contains(&body, "seq_cst");
}

#[test]
fn narrow_rmw_truncates_and_zero_extends() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        &shared_mem_module(
            "local.get 0 local.get 1 i32.atomic.rmw8.add_u",
            "(param i32 i32)",
            "(result i32)",
        ),
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, "atomicrmw add ptr");
    assert_ir_contains(&body, "trunc i32");
    assert_ir_contains(&body, "zext i8");
}

#[test]
fn cmpxchg_returns_the_observed_value() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        &shared_mem_module(
            "local.get 0 local.get 1 local.get 2 i32.atomic.rmw.cmpxchg",
            "(param i32 i32 i32)",
            "(result i32)",
        ),
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, "cmpxchg ptr");
    assert_ir_contains(&body, "seq_cst seq_cst");
    assert_ir_contains(&body, "extractvalue");
}

#[test]
fn fence_is_sequentially_consistent() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        &shared_mem_module("atomic.fence", "", ""),
    )
    .expect("compile");

    assert_ir_contains(&function_ir(&ir, "f0"), "fence seq_cst");
}

#[test]
fn notify_and_wait_call_the_runtime() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        &shared_mem_module(
            "local.get 0 i32.const 1 memory.atomic.notify",
            "(param i32)",
            "(result i32)",
        ),
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    // Dispatched through the intrinsics table.
    assert_ir_contains(&body, "@intrinsics");
    assert_ir_contains(&body, "call void @trap(i32 10)");

    let ir = compile_wat_ir(
        &llctx,
        &shared_mem_module(
            "local.get 0 i64.const 0 i64.const -1 memory.atomic.wait64",
            "(param i32)",
            "(result i32)",
        ),
    )
    .expect("compile");
    assert_ir_contains(&function_ir(&ir, "f0"), "@intrinsics");
}

#[test]
fn plain_loads_have_no_alignment_trap() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module
            (memory 1)
            (func (export "main") (param i32) (result i32)
                local.get 0
                i32.load))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_lacks(&body, "@trap");
    assert_ir_contains(&body, "load volatile i32");
    assert_ir_contains(&body, "align 1");
}
