//! External analysis tools (`nm`, `strings`, `objdump`, `file`).
//!
//! Tools are black boxes with a text-output contract. Each invocation is
//! blocking, capped in captured output, and optionally bounded in time. Any
//! failure is returned to the caller as a `ToolError`; nothing here is fatal
//! to the pipeline.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::{ExtractionConfig, ToolPaths};

/// Cap on captured stderr, used only for diagnostics.
const MAX_STDERR_BYTES: usize = 64 * 1024;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// The external tools the pipeline consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// Lists undefined (imported) symbols.
    Symbols,
    /// Extracts printable strings.
    Strings,
    /// Produces a disassembly listing.
    Disassembly,
    /// Describes the binary format.
    Format,
}

impl Tool {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tool::Symbols => "symbols",
            Tool::Strings => "strings",
            Tool::Disassembly => "disassembly",
            Tool::Format => "format",
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to spawn {program} ({tool}): {source}")]
    Spawn {
        tool: &'static str,
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} ({tool}) exited with {status}: {stderr}")]
    Exit { tool: &'static str, program: String, status: ExitStatus, stderr: String },
    #[error("{program} ({tool}) produced more than {limit} bytes of output")]
    OutputOverflow { tool: &'static str, program: String, limit: usize },
    #[error("{program} ({tool}) timed out after {secs}s")]
    Timeout { tool: &'static str, program: String, secs: u64 },
    #[error("{program} ({tool}) I/O error: {source}")]
    Io {
        tool: &'static str,
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Runs one external tool against one binary and returns its stdout.
///
/// Implemented by `SystemToolRunner` for real subprocesses; tests supply
/// canned output.
pub trait ToolRunner {
    fn run(&self, tool: Tool, binary: &Path) -> Result<String, ToolError>;
}

/// Shells out to the configured programs.
#[derive(Debug, Clone)]
pub struct SystemToolRunner {
    pub paths: ToolPaths,
    pub max_output_bytes: usize,
    pub timeout: Option<Duration>,
}

impl SystemToolRunner {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            paths: config.tools.clone(),
            max_output_bytes: config.max_output_bytes,
            timeout: config.tool_timeout(),
        }
    }

    fn program(&self, tool: Tool) -> &str {
        match tool {
            Tool::Symbols => &self.paths.symbols,
            Tool::Strings => &self.paths.strings,
            Tool::Disassembly => &self.paths.disassembly,
            Tool::Format => &self.paths.format,
        }
    }
}

/// Arguments placed before the binary path.
fn tool_args(tool: Tool) -> &'static [&'static str] {
    match tool {
        // Dynamic symbol table only exists on ELF; Mach-O nm has no -D.
        Tool::Symbols if cfg!(target_os = "macos") => &["-u"],
        Tool::Symbols => &["-D", "-u"],
        Tool::Strings => &["-a"],
        Tool::Disassembly => &["-d"],
        Tool::Format => &["-b"],
    }
}

impl ToolRunner for SystemToolRunner {
    fn run(&self, tool: Tool, binary: &Path) -> Result<String, ToolError> {
        let program = self.program(tool).to_string();
        tracing::debug!(tool = tool.as_str(), %program, binary = %binary.display(), "running tool");

        let mut child = Command::new(&program)
            .args(tool_args(tool))
            .arg(binary)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ToolError::Spawn {
                tool: tool.as_str(),
                program: program.clone(),
                source,
            })?;

        // Readers stop at limit + 1 and drop the pipe, so a runaway child
        // gets EPIPE instead of blocking forever on a full pipe.
        let stdout_reader =
            child.stdout.take().map(|out| spawn_capped_reader(out, self.max_output_bytes + 1));
        let stderr_reader =
            child.stderr.take().map(|err| spawn_capped_reader(err, MAX_STDERR_BYTES));

        let status = match wait_with_timeout(&mut child, self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ToolError::Timeout {
                    tool: tool.as_str(),
                    program,
                    secs: self.timeout.map(|t| t.as_secs()).unwrap_or_default(),
                });
            }
            Err(source) => {
                let _ = child.kill();
                return Err(ToolError::Io { tool: tool.as_str(), program, source });
            }
        };

        let stdout = join_reader(stdout_reader);
        let stderr = join_reader(stderr_reader);

        if stdout.len() > self.max_output_bytes {
            return Err(ToolError::OutputOverflow {
                tool: tool.as_str(),
                program,
                limit: self.max_output_bytes,
            });
        }
        if !status.success() {
            return Err(ToolError::Exit {
                tool: tool.as_str(),
                program,
                status,
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

fn spawn_capped_reader<R: Read + Send + 'static>(
    source: R,
    limit: usize,
) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = source.take(limit as u64).read_to_end(&mut buf);
        buf
    })
}

fn join_reader(handle: Option<thread::JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

/// `Ok(None)` means the deadline passed with the child still running.
fn wait_with_timeout(
    child: &mut Child,
    timeout: Option<Duration>,
) -> std::io::Result<Option<ExitStatus>> {
    let Some(timeout) = timeout else {
        return child.wait().map(Some);
    };
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn runner_with(
        program: &str,
        max_output_bytes: usize,
        timeout: Option<Duration>,
    ) -> SystemToolRunner {
        SystemToolRunner {
            paths: ToolPaths {
                symbols: program.into(),
                strings: program.into(),
                disassembly: program.into(),
                format: program.into(),
            },
            max_output_bytes,
            timeout,
        }
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let runner = runner_with("definitely-not-a-real-tool-xyz", 1024, None);
        let err = runner.run(Tool::Format, Path::new("/bin/sh")).unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }), "unexpected: {err}");
    }

    #[test]
    fn echo_like_tool_returns_stdout() {
        // `echo -b /path` prints its arguments and exits 0.
        let runner = runner_with("echo", 1024, Some(Duration::from_secs(5)));
        let out = runner.run(Tool::Format, Path::new("/tmp/x")).unwrap();
        assert!(out.contains("/tmp/x"));
    }

    #[test]
    fn output_over_limit_is_rejected() {
        let runner = runner_with("echo", 4, Some(Duration::from_secs(5)));
        let err = runner.run(Tool::Format, Path::new("/a/long/path/argument")).unwrap_err();
        assert!(matches!(err, ToolError::OutputOverflow { limit: 4, .. }), "unexpected: {err}");
    }

    fn write_script(dir: &Path, name: &str, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    #[test]
    fn slow_tool_is_killed_at_the_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let sleeper = write_script(dir.path(), "sleeper", "exec sleep 5");
        let runner = runner_with(&sleeper, 1024, Some(Duration::from_secs(1)));

        let started = Instant::now();
        let err = runner.run(Tool::Symbols, Path::new("/tmp/x")).unwrap_err();

        assert!(matches!(err, ToolError::Timeout { secs: 1, .. }), "unexpected: {err}");
        assert!(err.to_string().contains("timed out after 1s"));
        assert!(started.elapsed() < Duration::from_secs(4), "took {:?}", started.elapsed());
    }

    #[test]
    fn no_timeout_waits_for_completion() {
        let dir = tempfile::tempdir().unwrap();
        let slowish = write_script(dir.path(), "slowish", "sleep 1; echo done");
        let runner = runner_with(&slowish, 1024, None);
        assert_eq!(runner.run(Tool::Strings, Path::new("/tmp/x")).unwrap().trim(), "done");
    }

    #[test]
    fn non_zero_exit_is_an_error() {
        let runner = runner_with("false", 1024, None);
        let err = runner.run(Tool::Strings, Path::new("/tmp/x")).unwrap_err();
        assert!(matches!(err, ToolError::Exit { .. }), "unexpected: {err}");
    }
}
