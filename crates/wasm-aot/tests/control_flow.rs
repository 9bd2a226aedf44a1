//! Structured control flow: block/loop/if lowering, PHI reconciliation,
//! and unreachability handling.

use inkwell::context::Context;
use wasm_aot::test_harness::*;

#[test]
fn empty_function_branches_to_return_block() {
    let llctx = Context::create();
    let ir = compile_wat_ir(&llctx, r#"(module (func (export "main")))"#).expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, "br label %ret");
    assert_ir_contains(&body, "ret void");
    // No trap blocks in a function that cannot trap.
    assert_ir_lacks(&body, "@trap");
}

#[test]
fn identity_loads_the_local_slot() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (func (export "main") (param i32) (result i32)
            local.get 0))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, "alloca i32");
    assert_ir_contains(&body, "load i32");
    assert_ir_contains(&body, "ret i32");
}

#[test]
fn loop_parameters_become_header_phis() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (func (export "main") (param i32) (result i32)
            local.get 0
            (loop (param i32) (result i32)
                br 0)))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    // The loop parameter is a header PHI fed by the preheader and the
    // back-edge.
    assert_ir_contains(&body, "loop:");
    assert_ir_contains(&body, "phi i32");
    assert!(
        count(&body, "br label %loop") >= 2,
        "expected preheader entry and back-edge branches:\n{body}"
    );
}

#[test]
fn infinite_loop_end_block_gets_no_fallthrough() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (func (export "main") (param i32) (result i32)
            (loop (result i32)
                local.get 0
                br 0)))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    // The fall-through edge out of the loop body is unreachable, so the
    // loop's end block is entered by nothing and the body block terminates
    // with unreachable.
    assert_ir_contains(&body, "unreachable");
    assert_ir_contains(&body, "loop.end");
}

#[test]
fn if_else_multi_value_joins_both_arms() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (func (export "main") (result i32 i32)
            i32.const 0
            (if (result i32 i32)
                (then i32.const 1 i32.const 2)
                (else i32.const 3 i32.const 4))))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    assert_eq!(
        count(&body, "phi i32"),
        2,
        "one PHI per result type at the merge:\n{body}"
    );
    assert_ir_contains(&body, "if.end");
    // Multi-value results are packed into an aggregate return.
    assert_ir_contains(&body, "ret { i32, i32 }");
}

#[test]
fn if_without_else_forwards_entry_arguments() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (func (export "main") (param i32 i32) (result i32)
            local.get 0
            local.get 1
            (if (param i32) (result i32)
                (then i32.const 1 i32.add))))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    // Both the then arm and the implicit else arm reach the merge.
    assert_ir_contains(&body, "phi i32");
    assert_ir_contains(&body, "if.end");
}

#[test]
fn br_if_continues_in_fallthrough_block() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (func (export "main") (param i32) (result i32)
            (block (result i32)
                i32.const 7
                local.get 0
                br_if 0
                drop
                i32.const 9)))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, "br_if.end");
    assert_ir_contains(&body, "block.end");
    assert_ir_contains(&body, "phi i32");
}

#[test]
fn br_table_lowers_to_switch() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (func (export "main") (param i32) (result i32)
            (block (result i32)
                (block (result i32)
                    i32.const 5
                    local.get 0
                    br_table 0 1 0)
                i32.const 1
                i32.add)))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, "switch i32");
    assert_ir_contains(&body, "br_table.end");
}

#[test]
fn code_after_return_is_skipped() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (func (export "main") (result i32)
            i32.const 1
            return
            i32.const 2
            i32.add))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    // The dead add after `return` emits no IR.
    assert_ir_lacks(&body, "add i32");
}

#[test]
fn unreachable_branches_to_its_trap_block() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (func (export "main")
            unreachable))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    assert_ir_contains(&body, "call void @trap(i32 1)");
    assert_ir_contains(&body, "unreachable");
}

#[test]
fn nested_blocks_keep_stack_heights() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (func (export "main") (param i32) (result i32)
            (block (result i32)
                (block (result i32)
                    (block (result i32)
                        local.get 0
                        br 2)))))"#,
    )
    .expect("compile");

    let body = function_ir(&ir, "f0");
    // br 2 skips two frames; its value flows into the outermost merge.
    assert!(count(&body, "block.end") >= 3, "three nested merges:\n{body}");
}
