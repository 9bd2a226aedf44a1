#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("WASM parsing error: {0}")]
    WasmParse(#[from] wasmparser::BinaryReaderError),

    #[error("LLVM builder error: {0}")]
    Builder(#[from] inkwell::builder::BuilderError),

    #[error("Module is not valid: {0}")]
    NotValidated(String),

    #[error("Proposal {0} is not supported by the AOT backend")]
    UnsupportedProposal(&'static str),

    #[error("Unsupported WASM operator: {0}")]
    UnsupportedOperator(String),

    #[error("LLVM verification failed: {0}")]
    Verify(String),

    #[error("Target machine error: {0}")]
    Target(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
