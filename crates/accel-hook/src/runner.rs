use std::io::{BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc;

use crate::error::{Error, Result};
use crate::log_sanitize::{redact_argv, sanitize_log_line};

/// One external command invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub argv: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub success_label: Option<String>,
    pub error_label: Option<String>,
    /// Indices into `argv` that hold credentials.
    pub secret_args: Vec<usize>,
}

impl CommandSpec {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn labels(mut self, success: impl Into<String>, error: impl Into<String>) -> Self {
        self.success_label = Some(success.into());
        self.error_label = Some(error.into());
        self
    }

    /// Append `value` as a credential argument, masked wherever the command is shown.
    pub fn secret_arg(mut self, value: impl Into<String>) -> Self {
        self.secret_args.push(self.argv.len());
        self.argv.push(value.into());
        self
    }

    pub fn shown_argv(&self) -> Vec<String> {
        redact_argv(&self.argv, &self.secret_args)
    }
}

/// Result of a finished process: exit code (`None` if killed by a signal) and
/// stdout/stderr merged in arrival order.
#[derive(Debug, Clone, Default)]
pub struct Execution {
    pub code: Option<i32>,
    pub output: String,
}

impl Execution {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

pub trait CommandRunner: Send + Sync {
    fn execute(&self, spec: &CommandSpec) -> Result<Execution>;
}

/// Runs commands with `std::process`, never through a shell.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn execute(&self, spec: &CommandSpec) -> Result<Execution> {
        let Some((program, args)) = spec.argv.split_first() else {
            return Err(Error::msg("empty command"));
        };
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::Io(format!("failed to spawn {program}: {e}")))?;

        let (tx, rx) = mpsc::channel::<String>();
        let mut readers = Vec::with_capacity(2);
        if let Some(out) = child.stdout.take() {
            let tx = tx.clone();
            readers.push(std::thread::spawn(move || read_output_stream(out, tx)));
        }
        if let Some(err) = child.stderr.take() {
            let tx = tx.clone();
            readers.push(std::thread::spawn(move || read_output_stream(err, tx)));
        }
        drop(tx);

        let mut output = String::new();
        for line in rx {
            output.push_str(&line);
            output.push('\n');
        }
        for r in readers {
            let _ = r.join();
        }

        let status = child
            .wait()
            .map_err(|e| Error::Io(format!("failed to wait for {program}: {e}")))?;
        Ok(Execution {
            code: status.code(),
            output,
        })
    }
}

fn read_output_stream<R: Read>(reader: R, tx: mpsc::Sender<String>) {
    const MAX_PENDING_BYTES: usize = 16 * 1024;
    let mut r = BufReader::new(reader);
    let mut buf = [0u8; 8192];
    let mut pending = Vec::with_capacity(1024);

    let flush = |pending: &mut Vec<u8>| {
        let line = String::from_utf8_lossy(&pending[..]).into_owned();
        pending.clear();
        let _ = tx.send(line);
    };

    loop {
        let n = match r.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        for b in &buf[..n] {
            if *b == b'\n' {
                flush(&mut pending);
            } else {
                pending.push(*b);
                if pending.len() >= MAX_PENDING_BYTES {
                    flush(&mut pending);
                }
            }
        }
    }
    if !pending.is_empty() {
        flush(&mut pending);
    }
}

/// Execute `spec` once, log its merged output and map the exit code.
pub fn run(runner: &dyn CommandRunner, spec: &CommandSpec) -> Result<()> {
    let shown = spec.shown_argv().join(" ");
    tracing::debug!(command = %shown, cwd = ?spec.cwd, "running command");

    let exec = runner.execute(spec)?;
    for line in exec.output.lines() {
        let line = sanitize_log_line(line);
        if !line.is_empty() {
            tracing::info!(target: "accel_hook::output", "{line}");
        }
    }

    if exec.success() {
        if let Some(label) = &spec.success_label {
            tracing::info!("{label}");
        }
        return Ok(());
    }
    if let Some(label) = &spec.error_label {
        tracing::error!("{label}");
    }
    Err(Error::command(&spec.shown_argv(), exec.code))
}
