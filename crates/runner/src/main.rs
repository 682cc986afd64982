use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::str::FromStr;

use anyhow::{Context, Error, Result};
use clap::{Parser, ValueHint};
use tracing::Level;
use x86e_common::Kernel;
use x86e_runner::{load_program, prepare_vm, RunnerOptions, RunnerOutput, DEFAULT_MAX_STEPS};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "x86e - Run Intel-syntax x86-64 assembly and exit with its status",
    long_about = None
)]
struct Args {
    /// Path to the assembly file
    #[arg(value_hint = ValueHint::FilePath)]
    file: PathBuf,

    /// Syscall numbering the program was compiled for: linux or darwin
    #[arg(short, long, default_value_t = Kernel::Linux, value_parser = Kernel::from_str)]
    kernel: Kernel,

    /// Label called by the generated `_start` routine (default: main, then _main)
    #[arg(short, long)]
    entrypoint: Option<String>,

    /// Maximum number of instructions to execute
    #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
    max_steps: usize,

    /// Log every executed instruction
    #[arg(long)]
    debug_instructions: bool,

    /// Write the (rip, rsp) execution trace to this file as JSON
    #[arg(long, value_hint = ValueHint::FilePath)]
    trace_output: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Error> {
    let args = Args::parse();
    let level = if args.verbose || args.debug_instructions {
        Level::INFO
    } else {
        Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    let source = fs::read_to_string(&args.file)
        .with_context(|| format!("Error reading file '{}'", args.file.display()))?;

    let options = RunnerOptions {
        max_steps: args.max_steps,
        kernel: args.kernel,
        entrypoint: args.entrypoint,
        debug_instructions: args.debug_instructions,
        ..Default::default()
    };

    let program = load_program(&source, &options)
        .with_context(|| format!("Failed to assemble '{}'", args.file.display()))?
        .with_source_file(args.file.display().to_string());
    let (mut vm, entrypoint) = prepare_vm(program, &options)?;
    let result = vm.run_from_entrypoint(entrypoint, options.max_steps);

    // Output written before a failure is still the program's output.
    io::stdout().write_all(&vm.output.stdout)?;
    io::stdout().flush()?;
    io::stderr().write_all(&vm.output.stderr)?;

    if let Some(path) = &args.trace_output {
        vm.write_json_trace(path)
            .with_context(|| format!("Failed to write trace to '{}'", path.display()))?;
    }

    let exit_status = result.with_context(|| {
        let source_file = vm.program.metadata.source_file.as_deref().unwrap_or("<input>");
        format!("Execution of '{source_file}' failed")
    })?;
    let output = RunnerOutput::from_vm(vm, exit_status);

    tracing::info!(
        status = output.exit_status,
        steps = output.steps,
        "program exited"
    );
    process::exit(output.exit_code());
}
