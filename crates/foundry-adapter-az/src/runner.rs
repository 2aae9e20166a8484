//! Running the provider CLI as a subprocess.

use async_trait::async_trait;
use foundry_core::ProviderError;
use std::process::Stdio;
use tokio::process::Command;

/// Captured result of one CLI invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Executes provider CLI commands.
///
/// Implementations handle the actual process spawning, so the adapter can be
/// driven by canned output in tests.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run with captured output and no stdin.
    async fn output(&self, args: &[String]) -> Result<CommandOutput, ProviderError>;

    /// Run attached to the terminal, for flows that need the user.
    async fn interactive(&self, args: &[String]) -> Result<(), ProviderError>;
}

/// Spawns the real CLI binary.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: String,
}

impl ProcessRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn spawn_error(&self, e: std::io::Error) -> ProviderError {
        ProviderError::new(format!("failed to run '{}': {e}", self.program))
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn output(&self, args: &[String]) -> Result<CommandOutput, ProviderError> {
        tracing::debug!(program = %self.program, args = ?args, "Running provider CLI");
        let out = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        Ok(CommandOutput {
            success: out.status.success(),
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        })
    }

    async fn interactive(&self, args: &[String]) -> Result<(), ProviderError> {
        tracing::debug!(
            program = %self.program,
            args = ?args,
            "Running provider CLI interactively"
        );
        let status = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if status.success() {
            Ok(())
        } else {
            Err(ProviderError::new(format!(
                "'{} {}' exited with {status}",
                self.program,
                args.join(" ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_provider_error() {
        let runner = ProcessRunner::new("foundry-deploy-no-such-binary");
        let err = runner.output(&["version".to_string()]).await.unwrap_err();
        assert!(err.message.contains("failed to run 'foundry-deploy-no-such-binary'"));
        assert_eq!(err.code, None);
    }
}
