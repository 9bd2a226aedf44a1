//! Property-based tests: randomly assembled (valid) modules always compile
//! to IR that verifies, and compilation never panics.

use std::fmt::Write;

use inkwell::context::Context;
use proptest::prelude::*;
use wasm_aot::test_harness::*;

/// A small expression language that always produces one i32 from two i32
/// parameters, so every generated module validates by construction.
#[derive(Debug, Clone)]
enum Expr {
    Const(i32),
    Param(bool),
    Binary(&'static str, Box<Expr>, Box<Expr>),
    Unary(&'static str, Box<Expr>),
    IfElse(Box<Expr>, Box<Expr>, Box<Expr>),
}

fn expr_strategy() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![
        any::<i32>().prop_map(Expr::Const),
        any::<bool>().prop_map(Expr::Param),
    ];
    leaf.prop_recursive(4, 24, 3, |inner| {
        let binop = prop_oneof![
            Just("i32.add"),
            Just("i32.sub"),
            Just("i32.mul"),
            Just("i32.and"),
            Just("i32.or"),
            Just("i32.xor"),
            Just("i32.shl"),
            Just("i32.shr_u"),
            Just("i32.rotl"),
            Just("i32.eq"),
            Just("i32.lt_s"),
            Just("i32.div_s"),
            Just("i32.rem_u"),
        ];
        let unop = prop_oneof![
            Just("i32.clz"),
            Just("i32.ctz"),
            Just("i32.popcnt"),
            Just("i32.eqz"),
            Just("i32.extend8_s"),
        ];
        prop_oneof![
            (binop, inner.clone(), inner.clone())
                .prop_map(|(op, l, r)| Expr::Binary(op, Box::new(l), Box::new(r))),
            (unop, inner.clone()).prop_map(|(op, e)| Expr::Unary(op, Box::new(e))),
            (inner.clone(), inner.clone(), inner).prop_map(|(c, t, e)| {
                Expr::IfElse(Box::new(c), Box::new(t), Box::new(e))
            }),
        ]
    })
}

fn emit(expr: &Expr, out: &mut String) {
    match expr {
        Expr::Const(v) => writeln!(out, "i32.const {v}").unwrap(),
        Expr::Param(second) => writeln!(out, "local.get {}", u32::from(*second)).unwrap(),
        Expr::Binary(op, lhs, rhs) => {
            emit(lhs, out);
            emit(rhs, out);
            writeln!(out, "{op}").unwrap();
        }
        Expr::Unary(op, inner) => {
            emit(inner, out);
            writeln!(out, "{op}").unwrap();
        }
        Expr::IfElse(cond, then, other) => {
            emit(cond, out);
            out.push_str("(if (result i32) (then\n");
            emit(then, out);
            out.push_str(") (else\n");
            emit(other, out);
            out.push_str("))\n");
        }
    }
}

fn module_wat(expr: &Expr) -> String {
    let mut body = String::new();
    emit(expr, &mut body);
    format!(
        r#"(module (func (export "main") (param i32 i32) (result i32)
{body}))"#
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn generated_modules_compile_and_verify(expr in expr_strategy()) {
        let llctx = Context::create();
        let wat = module_wat(&expr);
        let module = compile_wat(&llctx, &wat).expect("valid module must compile");
        prop_assert!(module.verify().is_ok());
    }

    #[test]
    fn metering_never_changes_compilability(expr in expr_strategy()) {
        let llctx = Context::create();
        let wat = module_wat(&expr);
        prop_assert!(compile_wat_metered_ir(&llctx, &wat).is_ok());
    }
}
