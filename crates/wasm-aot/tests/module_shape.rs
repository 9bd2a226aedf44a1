//! Module-level contract: symbol naming, the version constant, the
//! intrinsics relocation, and the execution-context record.

use inkwell::context::Context;
use wasm_aot::test_harness::*;
use wasm_aot::{Compiler, CompilerConfig, Error};

#[test]
fn exported_symbols_follow_the_naming_scheme() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module
            (func (param i32) (result i32) local.get 0)
            (func (result i32) i32.const 3))"#,
    )
    .expect("compile");

    assert_ir_contains(&ir, "@f0");
    assert_ir_contains(&ir, "@f1");
    assert_ir_contains(&ir, "@t0");
    assert_ir_contains(&ir, "@t1");
}

#[test]
fn version_global_is_a_constant() {
    let llctx = Context::create();
    let ir = compile_wat_ir(&llctx, "(module)").expect("compile");
    assert_ir_contains(&ir, "@version = constant i32");
}

#[test]
fn intrinsics_global_is_an_external_relocation() {
    let llctx = Context::create();
    let ir = compile_wat_ir(&llctx, "(module)").expect("compile");
    assert_ir_contains(&ir, "@intrinsics = external global ptr");
}

#[test]
fn exec_ctx_record_has_seven_fields() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (memory 1) (func (export "main") (result i32)
            memory.size))"#,
    )
    .expect("compile");

    assert_ir_contains(&ir, "%ExecCtx = type { ptr, ptr, ptr, ptr, ptr, i64, ptr }");
}

#[test]
fn memory_base_loads_carry_invariant_group() {
    let llctx = Context::create();
    let ir = compile_wat_ir(
        &llctx,
        r#"(module (memory 1) (func (export "main") (param i32) (result i32)
            local.get 0
            i32.load))"#,
    )
    .expect("compile");

    assert_ir_contains(&ir, "!invariant.group");
}

#[test]
fn trap_helper_is_cold_noreturn_noinline() {
    let llctx = Context::create();
    let ir = compile_wat_ir(&llctx, "(module)").expect("compile");

    assert_ir_contains(&ir, "define private void @trap(i32");
    // The attribute group attached to @trap carries all three attributes.
    assert_ir_contains(&ir, "cold");
    assert_ir_contains(&ir, "noreturn");
    assert_ir_contains(&ir, "noinline");
}

#[test]
fn compiled_modules_verify() {
    let llctx = Context::create();
    let module = compile_wat(
        &llctx,
        r#"(module
            (memory 1)
            (table 4 funcref)
            (func $f (param i32) (result i32)
                local.get 0
                (if (result i32) (then i32.const 1) (else i32.const 2))
                i32.add)
            (elem (i32.const 0) $f))"#,
    )
    .expect("compile");
    module.verify().expect("module verifies after compilation");
}

#[test]
fn recompilation_is_deterministic() {
    let llctx = Context::create();
    let wat = r#"(module (func (export "main") (param i32 i32) (result i32)
        local.get 0
        local.get 1
        i32.div_s))"#;
    let first = compile_wat_ir(&llctx, wat).expect("compile");
    let second = compile_wat_ir(&llctx, wat).expect("compile");
    assert_eq!(first, second);
}

#[test]
fn exception_handling_is_a_configuration_error() {
    let llctx = Context::create();
    let config = CompilerConfig {
        exception_handling: true,
        ..harness_config()
    };
    let wasm = wat_to_wasm("(module)").expect("wat");
    let err = Compiler::new(config)
        .compile(&llctx, &wasm)
        .expect_err("exception handling must be refused");
    assert!(matches!(err, Error::UnsupportedProposal(_)));
}

#[test]
fn unvalidated_garbage_is_an_input_error() {
    let llctx = Context::create();
    let err = Compiler::new(harness_config())
        .compile(&llctx, b"\0asm not a module")
        .expect_err("garbage must be rejected");
    assert!(matches!(err, Error::NotValidated(_)));
}
