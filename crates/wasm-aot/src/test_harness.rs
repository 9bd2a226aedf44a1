//! Test harness for wasm-aot unit and integration tests.
//!
//! Compiles WAT snippets and exposes the produced IR as text so tests can
//! assert on its shape: which trap blocks exist, where PHIs join, which
//! atomic orderings were emitted.
//!
//! # Example
//!
//! ```rust
//! use inkwell::context::Context;
//! use wasm_aot::test_harness::*;
//!
//! let llctx = Context::create();
//! let ir = compile_wat_ir(
//!     &llctx,
//!     r#"(module (func (export "main") (param i32) (result i32)
//!         local.get 0))"#,
//! )
//! .expect("compile");
//! assert!(ir.contains("define i32 @f0"));
//! ```

#![allow(clippy::missing_panics_doc, clippy::must_use_candidate)]

use inkwell::context::Context;
use inkwell::module::Module;

use crate::{Compiler, CompilerConfig, Error, OptLevel, Result};

/// Parse WAT (WebAssembly Text) format to a WASM binary.
pub fn wat_to_wasm(wat: &str) -> Result<Vec<u8>> {
    wat::parse_str(wat).map_err(|e| Error::Internal(format!("WAT parse error: {e}")))
}

/// The harness config keeps the pass pipeline at O0 so tests observe the
/// translator's output, not the optimiser's.
pub fn harness_config() -> CompilerConfig {
    CompilerConfig {
        opt_level: OptLevel::O0,
        ..CompilerConfig::default()
    }
}

/// Compile a WAT module with the harness configuration.
pub fn compile_wat<'ctx>(llctx: &'ctx Context, wat: &str) -> Result<Module<'ctx>> {
    compile_wat_with(llctx, wat, harness_config())
}

/// Compile a WAT module with an explicit configuration.
pub fn compile_wat_with<'ctx>(
    llctx: &'ctx Context,
    wat: &str,
    config: CompilerConfig,
) -> Result<Module<'ctx>> {
    let wasm = wat_to_wasm(wat)?;
    Compiler::new(config).compile(llctx, &wasm)
}

/// Compile a WAT module and return the IR as text.
pub fn compile_wat_ir(llctx: &Context, wat: &str) -> Result<String> {
    Ok(ir_text(&compile_wat(llctx, wat)?))
}

/// Compile with metering (instruction counting + gas + interrupts) enabled.
pub fn compile_wat_metered_ir(llctx: &Context, wat: &str) -> Result<String> {
    let config = CompilerConfig {
        instruction_counting: true,
        gas_metering: true,
        interruptible: true,
        ..harness_config()
    };
    Ok(ir_text(&compile_wat_with(llctx, wat, config)?))
}

/// Print a module's IR.
pub fn ir_text(module: &Module<'_>) -> String {
    module.print_to_string().to_string()
}

/// The textual body of one function, from its `define` line to the closing
/// brace. Panics if the function is missing, which in a test means the
/// module shape is already wrong.
pub fn function_ir(ir: &str, name: &str) -> String {
    let needle = format!("@{name}(");
    let start = ir
        .lines()
        .position(|l| l.starts_with("define") && l.contains(&needle))
        .unwrap_or_else(|| panic!("function {name} not found in module IR:\n{ir}"));
    let lines: Vec<&str> = ir.lines().collect();
    let mut body = Vec::new();
    for line in &lines[start..] {
        body.push(*line);
        if *line == "}" {
            break;
        }
    }
    body.join("\n")
}

/// Number of non-overlapping occurrences of `needle`.
pub fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

/// Assert that `ir` contains `needle`, with the IR in the failure message.
pub fn assert_ir_contains(ir: &str, needle: &str) {
    assert!(
        ir.contains(needle),
        "expected IR to contain {needle:?}.\n\nActual IR:\n{ir}"
    );
}

/// Assert that `ir` does not contain `needle`.
pub fn assert_ir_lacks(ir: &str, needle: &str) {
    assert!(
        !ir.contains(needle),
        "expected IR not to contain {needle:?}.\n\nActual IR:\n{ir}"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wat_to_wasm_emits_magic() {
        let wasm = wat_to_wasm(r#"(module (func (export "main") (result i32) i32.const 42))"#)
            .expect("parse");
        assert_eq!(&wasm[0..4], &[0x00, 0x61, 0x73, 0x6D]);
    }

    #[test]
    fn count_counts() {
        assert_eq!(count("phi phi phi", "phi"), 3);
        assert_eq!(count("none here", "phi"), 0);
    }
}
