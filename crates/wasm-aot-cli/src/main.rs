use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::PathBuf;

use wasm_aot::{Compiler, CompilerConfig, OptLevel};

const COMPILER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "wasm-aot")]
#[command(about = "Ahead-of-time WebAssembly compiler (WASM -> native object)")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OptArg {
    O0,
    O1,
    O2,
    O3,
    Os,
    Oz,
}

impl From<OptArg> for OptLevel {
    fn from(value: OptArg) -> Self {
        match value {
            OptArg::O0 => OptLevel::O0,
            OptArg::O1 => OptLevel::O1,
            OptArg::O2 => OptLevel::O2,
            OptArg::O3 => OptLevel::O3,
            OptArg::Os => OptLevel::Os,
            OptArg::Oz => OptLevel::Oz,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    Compile {
        #[arg(help = "Input WASM or WAT file")]
        input: PathBuf,

        #[arg(short, long, help = "Output object file")]
        output: PathBuf,

        #[arg(long, value_enum, default_value = "o2", help = "Optimization level")]
        opt: OptArg,

        #[arg(long, help = "Build for the architecture baseline, not the host CPU")]
        generic: bool,

        #[arg(long, help = "Emit instruction counting")]
        instruction_counting: bool,

        #[arg(long, help = "Emit gas metering")]
        gas: bool,

        #[arg(long, help = "Emit stop-token polling (interruptible execution)")]
        interruptible: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compile {
            input,
            output,
            opt,
            generic,
            instruction_counting,
            gas,
            interruptible,
        } => {
            let wasm = read_wasm(&input)?;

            let config = CompilerConfig {
                opt_level: opt.into(),
                generic_binary: generic,
                instruction_counting,
                gas_metering: gas,
                interruptible,
                ..CompilerConfig::default()
            };
            let compiler = Compiler::new(config);

            let llctx = inkwell::context::Context::create();
            let module = compiler
                .compile(&llctx, &wasm)
                .context("Compilation failed")?;
            compiler
                .emit_object(&module, &output)
                .with_context(|| format!("Failed to write {}", output.display()))?;

            println!(
                "Compiled {} -> {} (wasm-aot {COMPILER_VERSION})",
                input.display(),
                output.display(),
            );
        }
    }

    Ok(())
}

fn read_wasm(path: &PathBuf) -> Result<Vec<u8>> {
    let contents = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    if path.extension().is_some_and(|e| e == "wat") {
        wat::parse_bytes(&contents)
            .map(std::borrow::Cow::into_owned)
            .map_err(|e| anyhow::anyhow!("WAT parse error: {e}"))
    } else {
        Ok(contents)
    }
}
