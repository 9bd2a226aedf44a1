//! Instruction counting, gas accounting, and interrupt polling.
//!
//! Trap codes: 14 = cost-limit-exceeded, 15 = interrupted.

use inkwell::context::Context;
use wasm_aot::test_harness::*;
use wasm_aot::CompilerConfig;

const LOOP_WAT: &str = r#"(module (func (export "main") (param i32) (result i32)
    local.get 0
    (loop (param i32) (result i32)
        br 0)))"#;

#[test]
fn plain_config_emits_no_counters() {
    let llctx = Context::create();
    let ir = compile_wat_ir(&llctx, LOOP_WAT).expect("compile");

    assert_ir_lacks(&ir, "atomicrmw");
    assert_ir_lacks(&ir, "cmpxchg");
}

#[test]
fn instruction_counter_flushes_with_atomic_add() {
    let llctx = Context::create();
    let config = CompilerConfig {
        instruction_counting: true,
        ..harness_config()
    };
    let module = compile_wat_with(&llctx, LOOP_WAT, config).expect("compile");
    let ir = ir_text(&module);

    let body = function_ir(&ir, "f0");
    // Local bumps are plain adds; the flush is a monotonic atomic add.
    assert_ir_contains(&body, "atomicrmw add ptr");
    assert_ir_contains(&body, "monotonic");
}

#[test]
fn gas_flush_is_a_cas_loop_with_limit_trap() {
    let llctx = Context::create();
    let config = CompilerConfig {
        gas_metering: true,
        ..harness_config()
    };
    let module = compile_wat_with(&llctx, LOOP_WAT, config).expect("compile");
    let ir = ir_text(&module);

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, "cmpxchg ptr");
    assert_ir_contains(&body, "gas.check");
    assert_ir_contains(&body, "call void @trap(i32 14)");
    // Per-instruction accrual reads the cost table.
    assert_ir_contains(&body, "cost.entry");
}

#[test]
fn stop_token_polls_at_the_back_edge() {
    let llctx = Context::create();
    let config = CompilerConfig {
        interruptible: true,
        ..harness_config()
    };
    let module = compile_wat_with(&llctx, LOOP_WAT, config).expect("compile");
    let ir = ir_text(&module);

    let body = function_ir(&ir, "f0");
    // The poll swaps the token with zero and traps on a non-zero result.
    assert_ir_contains(&body, "atomicrmw xchg ptr");
    assert_ir_contains(&body, "call void @trap(i32 15)");
}

#[test]
fn metered_loop_has_all_three_mechanisms() {
    let llctx = Context::create();
    let ir = compile_wat_metered_ir(&llctx, LOOP_WAT).expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, "atomicrmw add ptr");
    assert_ir_contains(&body, "atomicrmw xchg ptr");
    assert_ir_contains(&body, "cmpxchg ptr");
}

#[test]
fn counters_flush_before_calls() {
    let llctx = Context::create();
    let config = CompilerConfig {
        instruction_counting: true,
        ..harness_config()
    };
    let wat = r#"(module
        (func $leaf)
        (func (export "main")
            call $leaf))"#;
    let module = compile_wat_with(&llctx, wat, config).expect("compile");
    let ir = ir_text(&module);

    let caller = function_ir(&ir, "f1");
    let flush_pos = caller.find("atomicrmw add ptr").expect("flush present");
    let call_pos = caller.find("call void @f0").expect("call present");
    assert!(
        flush_pos < call_pos,
        "counter must flush before the call:\n{caller}"
    );
}

#[test]
fn trap_blocks_flush_counters_best_effort() {
    let llctx = Context::create();
    let ir = compile_wat_metered_ir(
        &llctx,
        r#"(module (func (export "main") (param i32 i32) (result i32)
            local.get 0
            local.get 1
            i32.div_u))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    // The divide-by-zero trap block flushes both counters with atomic adds
    // (no CAS on the way out) before raising the trap.
    assert_ir_contains(&body, "call void @trap(i32 2)");
    assert!(
        count(&body, "atomicrmw add ptr") >= 2,
        "instruction and gas flush in the trap epilogue:\n{body}"
    );
}
