use std::process::Stdio;

use log::{debug, error, info, trace};
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("{program} is not installed or not on PATH")]
    NotFound { program: String },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {code}: {stderr}")]
    Failed {
        program: String,
        code: String,
        stderr: String,
    },
}

impl ProcessError {
    #[must_use]
    pub fn program(&self) -> &str {
        match self {
            Self::NotFound { program }
            | Self::Spawn { program, .. }
            | Self::Failed { program, .. } => program,
        }
    }
}

/// Render a command as `program arg1 arg2` for logs and error messages.
#[must_use]
pub fn describe(cmd: &Command) -> String {
    let std_cmd = cmd.as_std();
    let mut rendered = std_cmd.get_program().to_string_lossy().into_owned();
    for arg in std_cmd.get_args() {
        rendered.push(' ');
        rendered.push_str(&arg.to_string_lossy());
    }
    rendered
}

fn program_name(cmd: &Command) -> String {
    let program = cmd.as_std().get_program();
    std::path::Path::new(program)
        .file_name()
        .unwrap_or(program)
        .to_string_lossy()
        .into_owned()
}

/// Run a command to completion and capture its output.
///
/// The child is killed when the returned future is dropped, so callers can
/// bound it with `tokio::time::timeout` or race it against a cancellation
/// token without leaking processes.
///
/// # Errors
/// Returns [`ProcessError::NotFound`] when the program does not exist,
/// [`ProcessError::Spawn`] for other spawn failures and
/// [`ProcessError::Failed`] for a non-zero exit.
pub async fn capture(cmd: Command) -> Result<ProcessOutput, ProcessError> {
    capture_accepting(cmd, &[]).await
}

/// Like [`capture`], but also treats the listed exit codes as success.
/// Some tools report "work pending" through a dedicated non-zero status.
///
/// # Errors
/// Same as [`capture`].
pub async fn capture_accepting(
    mut cmd: Command,
    accepted_codes: &[i32],
) -> Result<ProcessOutput, ProcessError> {
    let rendered = describe(&cmd);
    let program = program_name(&cmd);
    info!("Executing: {rendered}");

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = cmd.output().await.map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ProcessError::NotFound {
                program: program.clone(),
            }
        } else {
            ProcessError::Spawn {
                program: program.clone(),
                source,
            }
        }
    })?;

    debug!("{program} exit status: {:?}", output.status);
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    trace!("{program} stdout: {stdout}");
    if !stderr.is_empty() {
        trace!("{program} stderr: {stderr}");
    }

    let accepted = output
        .status
        .code()
        .is_some_and(|code| accepted_codes.contains(&code));
    if output.status.success() || accepted {
        Ok(ProcessOutput { stdout, stderr })
    } else {
        let code = output
            .status
            .code()
            .map_or_else(|| "signal".to_string(), |code| format!("status {code}"));
        error!("Command failed: {rendered} ({code})");
        Err(ProcessError::Failed {
            program,
            code,
            stderr: stderr.trim().to_string(),
        })
    }
}
