//! Shell-pipe emulation across independently started processes.
//!
//! `run(&[a, b, c])` behaves like `a | b | c`: each stage's stdout is wired to
//! the next stage's stdin, every stage's stderr is appended to one shared
//! buffer and the last stage's stdout is collected as the pipeline output.
//!
//! All stages are spawned before any of them is waited on. Waiting on an
//! upstream stage first would deadlock once it fills the OS pipe towards a
//! consumer that has not been started yet.

use std::io::Read;
use std::process::{Child, ChildStderr, ChildStdout, Stdio};
use std::sync::{Mutex, PoisonError};
use std::thread;

use crate::error::{Error, Result};
use crate::process::{exit_code_of, CommandSpec};

const READ_CHUNK: usize = 8 * 1024;

/// Bytes produced by a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineOutput {
    /// Standard output of the last stage.
    pub stdout: Vec<u8>,
    /// Standard error of every stage, in arrival order.
    pub stderr: Vec<u8>,
}

impl PipelineOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}

/// Outcome of a pipeline run. `output` holds whatever was captured even
/// when `error` is set, so it may be incomplete on failure.
#[derive(Debug, Default)]
pub struct PipelineRun {
    pub output: PipelineOutput,
    pub error: Option<Error>,
}

impl PipelineRun {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<PipelineOutput> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.output),
        }
    }
}

struct Started {
    index: usize,
    command: String,
    child: Child,
}

/// Execute `stages` as a pipe. An empty slice is a no-op.
pub fn run(stages: &[CommandSpec]) -> PipelineRun {
    if stages.is_empty() {
        return PipelineRun::default();
    }

    let last = stages.len() - 1;
    let shared_stderr = Mutex::new(Vec::new());
    let mut error: Option<Error> = None;
    let mut stdout = Vec::new();

    thread::scope(|scope| {
        let mut started: Vec<Started> = Vec::with_capacity(stages.len());
        let mut stderr_readers = Vec::with_capacity(stages.len());
        let mut stdout_reader = None;
        let mut upstream: Option<ChildStdout> = None;

        for (index, stage) in stages.iter().enumerate() {
            let command = stage.display();
            log::info!("run pipeline stage {}: {}", index, command);

            let stdin = match upstream.take() {
                Some(prev) => Stdio::from(prev),
                None => match stage.open_stdin() {
                    Ok(stdin) => stdin,
                    Err(e) => {
                        error = Some(Error::pipeline_failed(index, command, e.to_string()));
                        break;
                    }
                },
            };

            let spawned = stage
                .to_command()
                .stdin(stdin)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn();

            let mut child = match spawned {
                Ok(child) => child,
                Err(e) => {
                    error = Some(Error::pipeline_failed(index, command, e.to_string()));
                    break;
                }
            };

            if let Some(err_pipe) = child.stderr.take() {
                let sink = &shared_stderr;
                stderr_readers.push(scope.spawn(move || append_stderr(err_pipe, sink)));
            }

            let out_pipe = child.stdout.take();
            if index == last {
                stdout_reader = out_pipe.map(|pipe| scope.spawn(move || read_all(pipe)));
            } else {
                upstream = out_pipe;
            }

            started.push(Started {
                index,
                command,
                child,
            });
        }

        // A stage that never started leaves its upstream without a reader;
        // dropping the handle lets the producer see a broken pipe and exit.
        drop(upstream);

        for Started {
            index,
            command,
            mut child,
        } in started
        {
            match child.wait() {
                Ok(status) if status.success() => {}
                Ok(status) => {
                    if error.is_none() {
                        error = Some(Error::pipeline_failed(
                            index,
                            command,
                            format!("exit status {}", exit_code_of(status)),
                        ));
                    }
                }
                Err(e) => {
                    if error.is_none() {
                        error = Some(Error::pipeline_failed(index, command, e.to_string()));
                    }
                }
            }
        }

        for reader in stderr_readers {
            if reader.join().is_err() && error.is_none() {
                error = Some(Error::internal_unexpected("stderr reader panicked"));
            }
        }

        if let Some(reader) = stdout_reader {
            match reader.join() {
                Ok(Ok(bytes)) => stdout = bytes,
                Ok(Err(e)) => {
                    if error.is_none() {
                        error = Some(Error::pipeline_failed(
                            last,
                            stages[last].display(),
                            format!("reading stdout: {}", e),
                        ));
                    }
                }
                Err(_) => {
                    if error.is_none() {
                        error = Some(Error::internal_unexpected("stdout reader panicked"));
                    }
                }
            }
        }
    });

    let stderr = shared_stderr
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner);

    if let Some(err) = &error {
        log::error!("pipeline failed: {}", err.message);
    }

    PipelineRun {
        output: PipelineOutput { stdout, stderr },
        error,
    }
}

fn read_all(mut pipe: ChildStdout) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    pipe.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Copy a stage's stderr into the shared buffer chunk by chunk, so stages
/// running at the same time interleave instead of racing on one write.
fn append_stderr(mut pipe: ChildStderr, sink: &Mutex<Vec<u8>>) {
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match pipe.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => sink
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
}
