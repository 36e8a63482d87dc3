// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the “License”);
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an “AS IS” BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the MIND project (Machine Intelligence Native Design).

//! Scoped build directories for just-in-time kernel compilation.
//!
//! A [`BuildDir`] is a uniquely named scratch directory under the system temp
//! directory. It is removed when dropped, on success and on error alike.
//! Commands run inside it through [`BuildDir::execute`], which enforces a
//! timeout and writes `build.log` next to the build products.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Name of the log file written into the build directory.
pub const BUILD_LOG: &str = "build.log";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    #[error("tool not found: {0}")]
    ToolMissing(String),
    #[error("{tool} exited with {status}: {stderr}")]
    Subprocess {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("timeout while running {0}")]
    Timeout(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Captured output of one command run in a build directory.
#[derive(Debug, Clone)]
pub struct BuildLog {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
}

impl BuildLog {
    fn render(&self) -> String {
        format!(
            "$ {}\n--- stdout ---\n{}\n--- stderr ---\n{}\n",
            self.command, self.stdout, self.stderr
        )
    }
}

pub struct BuildDir {
    dir: Option<TempDir>,
    path: PathBuf,
    timeout: Duration,
}

impl BuildDir {
    /// Creates `<tmp>/mind-<prefix>-XXXXXX`.
    pub fn new(prefix: &str) -> Result<Self, BuildError> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("mind-{prefix}-"))
            .tempdir()?;
        let path = dir.path().to_path_buf();
        info!(path = %path.display(), "created build directory");
        Ok(BuildDir {
            dir: Some(dir),
            path,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Disarms cleanup and returns the directory path.
    pub fn keep(mut self) -> PathBuf {
        match self.dir.take() {
            Some(dir) => dir.keep(),
            None => self.path.clone(),
        }
    }

    /// Runs `program` with `args` inside the directory.
    pub fn execute(&self, program: &str, args: &[String]) -> Result<BuildLog, BuildError> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&self.path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let command = std::iter::once(program)
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        debug!(dir = %self.path.display(), %command, "executing build command");

        let mut child = cmd.spawn().map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => BuildError::ToolMissing(program.to_string()),
            _ => BuildError::Io(err),
        })?;

        // Drain both pipes while waiting so a chatty child never blocks on write.
        let stdout = Capture::spawn(child.stdout.take());
        let stderr = Capture::spawn(child.stderr.take());

        let Some(status) = wait_with_timeout(&mut child, self.timeout)? else {
            let log = BuildLog {
                command,
                stdout: decode_to_string(&stdout.snapshot()),
                stderr: decode_to_string(&stderr.snapshot()),
            };
            self.append_log(&log)?;
            warn!(
                dir = %self.path.display(),
                timeout = ?self.timeout,
                "build command timed out"
            );
            return Err(BuildError::Timeout(program.to_string()));
        };

        let log = BuildLog {
            command,
            stdout: decode_to_string(&stdout.finish()?),
            stderr: decode_to_string(&stderr.finish()?),
        };
        self.append_log(&log)?;

        if !status.success() {
            return Err(BuildError::Subprocess {
                tool: program.to_string(),
                status,
                stderr: log.stderr,
            });
        }
        Ok(log)
    }

    fn append_log(&self, log: &BuildLog) -> Result<(), BuildError> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path.join(BUILD_LOG))?;
        file.write_all(log.render().as_bytes())?;
        Ok(())
    }
}

impl Drop for BuildDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            match dir.close() {
                Ok(()) => debug!(path = %self.path.display(), "removed build directory"),
                Err(err) => {
                    warn!(path = %self.path.display(), error = %err, "failed to remove build directory")
                }
            }
        }
    }
}

/// Binary produced by [`KernelCompiler::compile`].
#[derive(Debug, Clone)]
pub struct CompiledKernel {
    pub name: String,
    pub binary: Vec<u8>,
    pub log: BuildLog,
}

/// External compiler used to build device kernels.
#[derive(Clone, Debug)]
pub struct KernelCompiler {
    pub program: String,
    pub timeout: Duration,
}

impl KernelCompiler {
    /// Environment variable overriding the compiler path.
    pub const ENV: &'static str = "MIND_KERNEL_CC";

    pub fn with_program(program: impl Into<String>) -> Self {
        KernelCompiler {
            program: program.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Locates the compiler from [`Self::ENV`], falling back to `clang`.
    pub fn resolve() -> Result<Self, BuildError> {
        if let Ok(value) = std::env::var(Self::ENV) {
            if !value.trim().is_empty() {
                return match which::which(value.trim()) {
                    Ok(path) => Ok(Self::with_program(path.to_string_lossy())),
                    Err(_) => Err(BuildError::ToolMissing(value)),
                };
            }
        }
        let path = which::which("clang").map_err(|_| BuildError::ToolMissing("clang".into()))?;
        Ok(Self::with_program(path.to_string_lossy()))
    }

    /// Compiles `source` as `file_name` and returns the produced binary.
    ///
    /// The compiler is invoked as `<program> <flags..> <file_name> -o <out>`
    /// inside a fresh build directory that is removed afterwards.
    pub fn compile(
        &self,
        file_name: &str,
        source: &str,
        flags: &[String],
    ) -> Result<CompiledKernel, BuildError> {
        let name = Path::new(file_name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "kernel".to_string());
        let dir = BuildDir::new(&name)?.with_timeout(self.timeout);
        fs::write(dir.path().join(file_name), source)?;

        let output = format!("{name}.bin");
        let mut args = flags.to_vec();
        args.push(file_name.to_string());
        args.push("-o".into());
        args.push(output.clone());

        let log = dir.execute(&self.program, &args)?;
        let binary = fs::read(dir.path().join(&output))?;
        info!(kernel = %name, bytes = binary.len(), "compiled kernel");
        Ok(CompiledKernel { name, binary, log })
    }
}

/// Output of one child pipe, accumulated by a reader thread.
struct Capture {
    buf: Arc<Mutex<Vec<u8>>>,
    reader: JoinHandle<io::Result<()>>,
}

impl Capture {
    fn spawn<R: Read + Send + 'static>(pipe: Option<R>) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let reader = thread::spawn(move || {
            let Some(mut pipe) = pipe else {
                return Ok(());
            };
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk) {
                    Ok(0) => return Ok(()),
                    Ok(n) => sink.lock().extend_from_slice(&chunk[..n]),
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => return Err(err),
                }
            }
        });
        Capture { buf, reader }
    }

    /// Bytes read so far. The reader stays detached and exits once every
    /// holder of the pipe's write end is gone.
    fn snapshot(&self) -> Vec<u8> {
        self.buf.lock().clone()
    }

    /// Waits for end of stream and returns everything read.
    fn finish(self) -> Result<Vec<u8>, BuildError> {
        match self.reader.join() {
            Ok(result) => result?,
            Err(_) => {
                return Err(BuildError::Io(io::Error::new(
                    io::ErrorKind::Other,
                    "output reader thread panicked",
                )))
            }
        }
        let bytes = std::mem::take(&mut *self.buf.lock());
        Ok(bytes)
    }
}

/// Waits for `child`, killing it once `timeout` elapses. `None` means the
/// child was killed.
fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
) -> Result<Option<ExitStatus>, BuildError> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Ok(None);
                }
                thread::sleep(Duration::from_millis(10));
            }
            Err(err) => return Err(BuildError::Io(err)),
        }
    }
}

fn decode_to_string(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        String::new()
    } else {
        String::from_utf8_lossy(bytes).trim().to_string()
    }
}
