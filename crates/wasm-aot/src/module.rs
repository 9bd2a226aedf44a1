use wasmparser::{
    CompositeInnerType, FuncType, FunctionBody, GlobalType, MemoryType, Parser, Payload, SubType,
    TableType, Validator, WasmFeatures,
};

use crate::{Error, Result};

/// Parsed and pre-processed WASM module.
///
/// All sections the code generator consumes are pulled out of the binary up
/// front; instruction streams stay borrowed from the input buffer. Indices
/// follow the WASM index spaces, so imported entities precede local ones.
pub struct WasmModule<'a> {
    /// Every type-section entry, including struct and array types.
    pub types: Vec<SubType>,
    /// Type index for each function, imports first.
    pub function_types: Vec<u32>,
    /// Number of imported functions (they precede local functions).
    pub num_imported_funcs: u32,
    /// `module.name` strings of imported functions, for diagnostics.
    pub imported_func_names: Vec<String>,
    /// Table types, imports first.
    pub tables: Vec<TableType>,
    /// Memory types, imports first.
    pub memories: Vec<MemoryType>,
    /// Global types, imports first.
    pub globals: Vec<GlobalType>,
    /// Function bodies from the code section (local functions only).
    pub functions: Vec<FunctionBody<'a>>,
}

/// The proposals this backend accepts. Exception handling is deliberately
/// absent; see [`crate::codegen::CompilerConfig`].
fn supported_features() -> WasmFeatures {
    WasmFeatures::MUTABLE_GLOBAL
        | WasmFeatures::SATURATING_FLOAT_TO_INT
        | WasmFeatures::SIGN_EXTENSION
        | WasmFeatures::MULTI_VALUE
        | WasmFeatures::BULK_MEMORY
        | WasmFeatures::REFERENCE_TYPES
        | WasmFeatures::SIMD
        | WasmFeatures::RELAXED_SIMD
        | WasmFeatures::THREADS
        | WasmFeatures::TAIL_CALL
        | WasmFeatures::FUNCTION_REFERENCES
        | WasmFeatures::GC
        | WasmFeatures::GC_TYPES
}

impl<'a> WasmModule<'a> {
    /// Parse and validate a WASM binary.
    ///
    /// Validation runs exactly once, here; the code generator relies on the
    /// validated invariants (indices in range, stacks well-typed) and never
    /// re-checks them.
    pub fn parse(wasm: &'a [u8]) -> Result<Self> {
        Validator::new_with_features(supported_features())
            .validate_all(wasm)
            .map_err(|e| Error::NotValidated(e.to_string()))?;

        let mut types = Vec::new();
        let mut function_types = Vec::new();
        let mut num_imported_funcs = 0u32;
        let mut imported_func_names = Vec::new();
        let mut tables = Vec::new();
        let mut memories = Vec::new();
        let mut globals = Vec::new();
        let mut functions = Vec::new();

        for payload in Parser::new(0).parse_all(wasm) {
            match payload? {
                Payload::TypeSection(reader) => {
                    for rec_group in reader {
                        for sub_type in rec_group?.into_types() {
                            types.push(sub_type);
                        }
                    }
                }
                Payload::ImportSection(reader) => {
                    for import in reader {
                        let import = import?;
                        match import.ty {
                            wasmparser::TypeRef::Func(type_idx) => {
                                num_imported_funcs += 1;
                                function_types.push(type_idx);
                                imported_func_names
                                    .push(format!("{}.{}", import.module, import.name));
                            }
                            wasmparser::TypeRef::Table(ty) => tables.push(ty),
                            wasmparser::TypeRef::Memory(ty) => memories.push(ty),
                            wasmparser::TypeRef::Global(ty) => globals.push(ty),
                            wasmparser::TypeRef::Tag(_) => {
                                return Err(Error::UnsupportedProposal("exception-handling"));
                            }
                        }
                    }
                }
                Payload::FunctionSection(reader) => {
                    for type_idx in reader {
                        function_types.push(type_idx?);
                    }
                }
                Payload::TableSection(reader) => {
                    for table in reader {
                        tables.push(table?.ty);
                    }
                }
                Payload::MemorySection(reader) => {
                    for memory in reader {
                        memories.push(memory?);
                    }
                }
                Payload::GlobalSection(reader) => {
                    for global in reader {
                        globals.push(global?.ty);
                    }
                }
                Payload::CodeSectionEntry(body) => {
                    functions.push(body);
                }
                Payload::TagSection(_) => {
                    return Err(Error::UnsupportedProposal("exception-handling"));
                }
                _ => {}
            }
        }

        tracing::debug!(
            types = types.len(),
            functions = function_types.len(),
            imports = num_imported_funcs,
            globals = globals.len(),
            "parsed module"
        );

        Ok(WasmModule {
            types,
            function_types,
            num_imported_funcs,
            imported_func_names,
            tables,
            memories,
            globals,
            functions,
        })
    }

    /// The function signature behind a type index.
    ///
    /// Validation guarantees every function's type index names a function
    /// type, so this only returns `None` for struct/array indices.
    #[must_use]
    pub fn func_type(&self, type_idx: u32) -> Option<&FuncType> {
        match &self.types.get(type_idx as usize)?.composite_type.inner {
            CompositeInnerType::Func(f) => Some(f),
            _ => None,
        }
    }

    /// The signature of the function at `func_idx` (imports included).
    #[must_use]
    pub fn func_type_of(&self, func_idx: u32) -> Option<&FuncType> {
        self.func_type(*self.function_types.get(func_idx as usize)?)
    }
}
