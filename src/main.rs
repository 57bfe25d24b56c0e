//! ecmabc CLI
//!
//! Compiles the JSON form of an ECMAScript syntax tree into a QuickJS
//! bytecode object, and lists the contents of existing objects.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use ecmabc::bytecode::OptimizerConfig;
use ecmabc::{compile_json, read_bytes, CompileOptions, ReadOptions, WriteOptions, VERSION};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ecmabc")]
#[command(author, version, about = "ECMAScript compiler backend emitting QuickJS bytecode", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a JSON syntax tree to a bytecode object
    Compile {
        /// JSON syntax tree
        input: PathBuf,

        /// Output file, `<input stem>.qbc` by default
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,

        /// Compile as an ES module
        #[arg(long)]
        module: bool,

        /// Omit debug information
        #[arg(long)]
        strip_debug: bool,

        /// Omit function source text
        #[arg(long)]
        strip_source: bool,

        /// Print the bytecode listing to stdout
        #[arg(long)]
        dump: bool,

        /// Disable every optimizer pass
        #[arg(long)]
        no_optimize: bool,
    },

    /// Print the listing of a bytecode object
    Dump {
        /// Bytecode object
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let result = match cli.command {
        Commands::Compile {
            input,
            out,
            module,
            strip_debug,
            strip_source,
            dump,
            no_optimize,
        } => {
            let options = CompileOptions {
                module,
                strip_debug,
                strip_source,
                filename: input.display().to_string(),
                optimize: if no_optimize {
                    OptimizerConfig::disabled()
                } else {
                    OptimizerConfig::default()
                },
            };
            let out = out.unwrap_or_else(|| default_output(&input));
            compile_file(&input, &out, &options, dump)
        }
        Commands::Dump { file } => dump_file(&file),
    };

    if let Err(e) = result {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

/// Install the stderr subscriber; `RUST_LOG` overrides the `-v` level
fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn default_output(input: &Path) -> PathBuf {
    input.with_extension("qbc")
}

fn compile_file(input: &Path, out: &Path, options: &CompileOptions, dump: bool) -> anyhow::Result<()> {
    let json = fs::read_to_string(input).with_context(|| format!("reading '{}'", input.display()))?;
    debug!(input = %input.display(), bytes = json.len(), "read syntax tree");

    let compiled = compile_json(&json, options).with_context(|| format!("compiling '{}'", input.display()))?;
    let write_options = WriteOptions {
        allow_reference: false,
        strip_debug: options.strip_debug,
        strip_source: options.strip_source,
    };
    let bytes = compiled.to_bytes(&write_options)?;
    fs::write(out, &bytes).with_context(|| format!("writing '{}'", out.display()))?;
    info!(output = %out.display(), bytes = bytes.len(), version = VERSION, "wrote bytecode object");

    if dump {
        print!("{}", compiled.disassemble()?);
    }
    Ok(())
}

fn dump_file(file: &Path) -> anyhow::Result<()> {
    let bytes = fs::read(file).with_context(|| format!("reading '{}'", file.display()))?;
    if bytes.is_empty() {
        bail!("'{}' is empty", file.display());
    }
    let object = read_bytes(&bytes, &ReadOptions::default())
        .with_context(|| format!("decoding '{}'", file.display()))?;
    print!("{}", object.disassemble()?);
    Ok(())
}
