use crate::apply::remove_partial_output;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

// <program> <leading_args..> -q <quality> <source> <destination>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterOptions {
    pub program: String,
    pub leading_args: Vec<String>,
    pub quality: u8,
    pub timeout: Duration,
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("failed to start {program}: {source}")]
    Spawn { program: String, source: io::Error },
    #[error("failed to wait for {program}: {source}")]
    Wait { program: String, source: io::Error },
    #[error("{program} timed out after {}s", .timeout.as_secs_f64())]
    Timeout { program: String, timeout: Duration },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("{program} reported success but did not write {}", .path.display())]
    MissingOutput { program: String, path: PathBuf },
}

/// Runs the converter and waits for it. On timeout the child is killed. Any
/// output left behind by a failed run is removed so the name stays free.
pub fn convert_file(
    options: &ConverterOptions,
    source: &Path,
    destination: &Path,
) -> Result<(), ConvertError> {
    let program = options.program.clone();
    let mut child = Command::new(&options.program)
        .args(&options.leading_args)
        .arg("-q")
        .arg(options.quality.to_string())
        .arg(source)
        .arg(destination)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ConvertError::Spawn {
            program: program.clone(),
            source,
        })?;

    let stderr = child.stderr.take();
    let stderr_thread = thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut stderr) = stderr {
            let _ = stderr.read_to_end(&mut buf);
        }
        buf
    });

    let start = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if start.elapsed() >= options.timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    remove_partial_output(destination);
                    return Err(ConvertError::Timeout {
                        program,
                        timeout: options.timeout,
                    });
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(source) => {
                let _ = child.kill();
                let _ = child.wait();
                remove_partial_output(destination);
                return Err(ConvertError::Wait { program, source });
            }
        }
    };

    let stderr = stderr_thread.join().unwrap_or_default();
    debug!(
        program = %program,
        elapsed_ms = start.elapsed().as_millis() as u64,
        %status,
        "converter finished"
    );

    if !status.success() {
        remove_partial_output(destination);
        return Err(ConvertError::Failed {
            program,
            status,
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        });
    }

    if !destination.is_file() {
        return Err(ConvertError::MissingOutput {
            program,
            path: destination.to_path_buf(),
        });
    }

    Ok(())
}
