pub mod memory;
pub mod vm;

use tracing::{debug, warn};
use vm::{VmError, VM};
use x86e_common::{start_stub, Kernel, ParseError, Program, START_LABEL};

use crate::memory::DEFAULT_MEMORY_SIZE;

/// Result type for runner operations
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Default instruction budget of a run.
pub const DEFAULT_MAX_STEPS: usize = (1 << 20) - 1;

/// Labels tried, in order, when no entry point is given.
const DEFAULT_MAIN_LABELS: [&str; 2] = ["main", "_main"];

/// Errors that can occur during program execution
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("VM error: {0}")]
    Vm(#[from] VmError),

    #[error("Entry point '{0}' not found. Available labels: {1:?}")]
    EntryPointNotFound(String, Vec<String>),
}

/// Options for running an assembly program
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// The maximum number of steps to execute, [`DEFAULT_MAX_STEPS`] by default.
    pub max_steps: usize,
    /// Syscall numbering the program was compiled for.
    pub kernel: Kernel,
    /// Size of the emulated memory, in bytes.
    pub memory_size: usize,
    /// Label called by the generated `_start` routine. Defaults to `main`,
    /// then `_main`.
    pub entrypoint: Option<String>,
    /// Log every executed instruction.
    pub debug_instructions: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            kernel: Kernel::default(),
            memory_size: DEFAULT_MEMORY_SIZE,
            entrypoint: None,
            debug_instructions: false,
        }
    }
}

/// Result of running an assembly program
#[derive(Debug)]
pub struct RunnerOutput {
    /// The `exit` argument, or `rax` if the program ran off its end
    pub exit_status: u64,
    /// Bytes written to file descriptor 1
    pub stdout: Vec<u8>,
    /// Bytes written to file descriptor 2
    pub stderr: Vec<u8>,
    /// Number of executed instructions
    pub steps: usize,
    /// The final VM
    pub vm: VM,
}

impl RunnerOutput {
    /// Moves the captured output out of a halted VM.
    pub fn from_vm(mut vm: VM, exit_status: u64) -> Self {
        debug!(exit_status, steps = vm.steps(), "execution finished");
        let output = std::mem::take(&mut vm.output);
        Self {
            exit_status,
            stdout: output.stdout,
            stderr: output.stderr,
            steps: vm.steps(),
            vm,
        }
    }

    /// The exit status as a process exit code: its low 32 bits.
    pub const fn exit_code(&self) -> i32 {
        self.exit_status as i32
    }
}

/// Picks the label the `_start` routine should call.
fn resolve_main_label(program: &Program, options: &RunnerOptions) -> Result<String> {
    let not_found =
        |name: &str| RunnerError::EntryPointNotFound(name.to_string(), program.label_names());

    match &options.entrypoint {
        Some(name) => program
            .label(name)
            .map(|_| name.clone())
            .ok_or_else(|| not_found(name)),
        None => DEFAULT_MAIN_LABELS
            .into_iter()
            .find(|name| program.label(name).is_some())
            .map(str::to_string)
            .ok_or_else(|| not_found(DEFAULT_MAIN_LABELS[0])),
    }
}

/// Parses `source`, appending a `_start` routine when it has none.
///
/// ## Errors
///
/// Returns [`RunnerError::Parse`] if the source does not assemble, and
/// [`RunnerError::EntryPointNotFound`] if `_start` is missing and the main
/// label cannot be found.
pub fn load_program(source: &str, options: &RunnerOptions) -> Result<Program> {
    let program = Program::parse(source)?;
    if program.has_start() {
        if let Some(entrypoint) = &options.entrypoint {
            warn!(%entrypoint, "program defines {START_LABEL}, ignoring entry point");
        }
        return Ok(program);
    }

    let main_label = resolve_main_label(&program, options)?;
    debug!(%main_label, "appending {START_LABEL} routine");
    let stub = start_stub(options.kernel, &main_label);
    Ok(Program::parse(&format!("{source}\n{stub}"))?)
}

/// Creates the VM for a loaded program and returns it with the index of
/// its `_start` label.
///
/// ## Errors
///
/// Returns [`RunnerError::EntryPointNotFound`] if the program has no
/// `_start` label.
pub fn prepare_vm(program: Program, options: &RunnerOptions) -> Result<(VM, usize)> {
    let entrypoint = program.label(START_LABEL).ok_or_else(|| {
        RunnerError::EntryPointNotFound(START_LABEL.to_string(), program.label_names())
    })?;

    let mut vm = VM::new(program, options.kernel, options.memory_size);
    vm.debug_instructions = options.debug_instructions;
    Ok((vm, entrypoint))
}

/// Runs a loaded program from its `_start` label.
///
/// The captured output of a failed run is dropped with the VM; callers that
/// need it should drive the VM from [`prepare_vm`].
///
/// ## Errors
///
/// Returns [`RunnerError::EntryPointNotFound`] if the program has no
/// `_start` label, or [`RunnerError::Vm`] if execution fails.
pub fn execute_program(program: Program, options: &RunnerOptions) -> Result<RunnerOutput> {
    let (mut vm, entrypoint) = prepare_vm(program, options)?;
    let exit_status = vm.run_from_entrypoint(entrypoint, options.max_steps)?;
    Ok(RunnerOutput::from_vm(vm, exit_status))
}

/// Assembles and runs `source`.
///
/// ## Arguments
/// * `source` - Intel-syntax assembly
/// * `options` - Execution options (kernel, max steps, entry point)
///
/// ## Returns
/// `RunnerOutput` containing the exit status, captured output and final VM
pub fn run_program(source: &str, options: RunnerOptions) -> Result<RunnerOutput> {
    let program = load_program(source, &options)?;
    execute_program(program, &options)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLUS_PROGRAM: &str = "
        .section __TEXT,__text,regular,pure_instructions
        .globl _plus
    _plus:
        push rbp
        mov rbp, rsp
        mov dword ptr [rbp - 4], edi
        mov dword ptr [rbp - 8], esi
        mov eax, dword ptr [rbp - 4]
        add eax, dword ptr [rbp - 8]
        pop rbp
        ret
        .globl _main
    _main:
        push rbp
        mov rbp, rsp
        sub rsp, 16
        mov dword ptr [rbp - 4], 0
        mov edi, 2
        mov esi, 4
        call _plus
        add rsp, 16
        pop rbp
        ret
    ";

    #[test]
    fn test_run_darwin_program() -> Result<()> {
        let options = RunnerOptions {
            kernel: Kernel::Darwin,
            ..Default::default()
        };

        let output = run_program(PLUS_PROGRAM, options)?;

        assert_eq!(output.exit_status, 6);
        assert_eq!(output.exit_code(), 6);
        assert!(output.stdout.is_empty());
        assert_eq!(output.steps, output.vm.trace.len());
        Ok(())
    }

    #[test]
    fn test_start_routine_is_appended() -> Result<()> {
        let program = load_program("main:\nmov eax, 1\nret", &RunnerOptions::default())?;

        assert_eq!(program.label(START_LABEL), Some(2));
        assert_eq!(program.len(), 6);
        Ok(())
    }

    #[test]
    fn test_main_is_preferred_over_underscore_main() -> Result<()> {
        let source = "_main:\nmov eax, 1\nret\nmain:\nmov eax, 2\nret";
        let output = run_program(source, RunnerOptions::default())?;
        assert_eq!(output.exit_status, 2);
        Ok(())
    }

    #[test]
    fn test_explicit_entrypoint() -> Result<()> {
        let source = "main:\nmov eax, 1\nret\nother:\nmov eax, 9\nret";
        let options = RunnerOptions {
            entrypoint: Some("other".to_string()),
            ..Default::default()
        };
        let output = run_program(source, options)?;
        assert_eq!(output.exit_status, 9);
        Ok(())
    }

    #[test]
    fn test_missing_entrypoint() {
        let result = run_program("helper:\nret", RunnerOptions::default());
        match result {
            Err(RunnerError::EntryPointNotFound(name, available)) => {
                assert_eq!(name, "main");
                assert_eq!(available, vec!["helper".to_string()]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_existing_start_is_kept() -> Result<()> {
        let source = "_start:\nmov rdi, 4\nmov rax, 60\nsyscall";
        let output = run_program(source, RunnerOptions::default())?;
        assert_eq!(output.exit_status, 4);
        assert_eq!(output.steps, 3);
        Ok(())
    }

    #[test]
    fn test_exit_code_keeps_low_32_bits() -> Result<()> {
        let output = run_program("main:\nmov rax, -1\nret", RunnerOptions::default())?;
        assert_eq!(output.exit_status, u64::MAX);
        assert_eq!(output.exit_code(), -1);
        Ok(())
    }

    #[test]
    fn test_step_limit_option() {
        let options = RunnerOptions {
            max_steps: 10,
            ..Default::default()
        };
        let result = run_program("main:\njmp main", options);
        assert!(matches!(
            result,
            Err(RunnerError::Vm(VmError::StepLimitExceeded(10)))
        ));
    }

    #[test]
    fn test_failed_run_keeps_captured_output() -> Result<()> {
        let source = "_start:\npush 104\nmov rsi, rsp\nmov rdx, 1\nmov rdi, 1\nmov rax, 1\nsyscall\n.Lspin:\njmp .Lspin";
        let options = RunnerOptions {
            max_steps: 50,
            ..Default::default()
        };
        let (mut vm, entrypoint) = prepare_vm(load_program(source, &options)?, &options)?;

        let result = vm.run_from_entrypoint(entrypoint, options.max_steps);

        assert!(matches!(result, Err(VmError::StepLimitExceeded(50))));
        assert_eq!(vm.output.stdout, b"h");
        assert!(vm.output.stderr.is_empty());
        Ok(())
    }

    #[test]
    fn test_prepare_vm_requires_start() -> Result<()> {
        let program = Program::parse("main:\nret")?;
        let result = prepare_vm(program, &RunnerOptions::default());
        assert!(matches!(
            result,
            Err(RunnerError::EntryPointNotFound(name, _)) if name == START_LABEL
        ));
        Ok(())
    }

    #[test]
    fn test_parse_error_is_reported() {
        let result = run_program("main:\nimul eax, 2", RunnerOptions::default());
        assert!(matches!(
            result,
            Err(RunnerError::Parse(ParseError::UnknownMnemonic { line: 2, .. }))
        ));
    }

    #[test]
    fn test_small_memory_overflows_the_stack() {
        let options = RunnerOptions {
            memory_size: 8,
            ..Default::default()
        };
        let result = run_program("main:\npush rbp\npop rbp\nret", options);
        assert!(matches!(result, Err(RunnerError::Vm(_))));
    }
}
