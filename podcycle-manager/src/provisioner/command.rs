//! Command-line provisioner
//!
//! Drives a singleton-pod provisioning tool through its command line:
//! - `<cmd> --config <file>` starts or confirms the pod and prints its id
//! - `<cmd> --config <file> --terminate` stops and terminates active pods
//! - `<cmd> --config <file> --count` prints `{"total": N, "running": M}`
//!
//! Every invocation is bounded by a timeout and the child is killed if the
//! timeout fires.

use async_trait::async_trait;
use podcycle_core::domain::pod::PodCounts;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error, info};

use super::{ProvisionError, Provisioner, Result};
use crate::config::ProvisionerConfig;

/// Provisioner backed by an external command
#[derive(Debug, Clone)]
pub struct CommandProvisioner {
    program: String,

    /// Arguments placed before `--config`
    base_args: Vec<String>,

    config_path: PathBuf,
    timeout: Duration,
}

impl CommandProvisioner {
    /// Creates a provisioner invoking `program`
    pub fn new(program: impl Into<String>, config_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
            config_path: config_path.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ProvisionerConfig) -> Self {
        Self::new(&config.command, &config.config_path, config.timeout)
    }

    /// Adds arguments passed before `--config`
    #[cfg(test)]
    fn with_base_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Runs the command with `extra` arguments and returns its stdout
    async fn invoke(&self, extra: &[&str]) -> Result<String> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.base_args)
            .arg("--config")
            .arg(&self.config_path)
            .args(extra)
            .kill_on_drop(true);

        debug!("Running provisioner: {} {:?}", self.program, extra);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| ProvisionError::TimedOut(self.timeout))??;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !stdout.trim().is_empty() {
            debug!("provisioner stdout: {}", stdout.trim());
        }
        if !stderr.trim().is_empty() {
            debug!("provisioner stderr: {}", stderr.trim());
        }

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            error!(
                "Provisioner {:?} failed: exit_code={}, stderr='{}'",
                extra,
                exit_code,
                stderr.trim()
            );
            return Err(ProvisionError::Failed {
                exit_code,
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(stdout)
    }
}

/// Last non-empty line of the tool's output
fn last_line(output: &str) -> Option<&str> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .next_back()
}

/// Parses count output, which must be a JSON object with both keys
fn parse_counts(output: &str) -> Result<PodCounts> {
    let line = last_line(output)
        .ok_or_else(|| ProvisionError::InvalidOutput("empty count output".to_string()))?;

    let value: serde_json::Value = serde_json::from_str(line)
        .map_err(|e| ProvisionError::InvalidOutput(format!("{}: {}", e, line)))?;

    if !value.is_object() {
        return Err(ProvisionError::InvalidOutput(format!(
            "expected an object, got {}",
            value
        )));
    }

    serde_json::from_value(value.clone())
        .map_err(|e| ProvisionError::InvalidOutput(format!("{}: {}", e, value)))
}

#[async_trait]
impl Provisioner for CommandProvisioner {
    async fn ensure_running(&self) -> Result<Option<String>> {
        let output = self.invoke(&[]).await?;
        let pod_id = last_line(&output).map(str::to_string);

        if let Some(id) = &pod_id {
            info!("Provisioner reports pod {} running", id);
        }

        Ok(pod_id)
    }

    async fn terminate(&self) -> Result<()> {
        self.invoke(&["--terminate"]).await?;
        info!("Provisioner terminated active pods");
        Ok(())
    }

    async fn count(&self) -> Result<PodCounts> {
        let output = self.invoke(&["--count"]).await?;
        parse_counts(&output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Provisioner whose "tool" is the given shell script
    ///
    /// `sh -c script` receives the appended `--config <file> ...` arguments
    /// as positional parameters, which the scripts below inspect via `$@`.
    fn scripted(script: &str) -> CommandProvisioner {
        CommandProvisioner::new("sh", "pods.yaml", Duration::from_secs(5))
            .with_base_args(["-c", script, "provisioner"])
    }

    #[test]
    fn test_parse_counts() {
        let counts = parse_counts("starting\n{\"total\": 2, \"running\": 1}\n").unwrap();
        assert_eq!(counts, PodCounts { total: 2, running: 1 });

        assert!(parse_counts("").is_err());
        assert!(parse_counts("{\"total\": 2}").is_err());
        assert!(parse_counts("[2, 1]").is_err());
        assert!(parse_counts("not json").is_err());
    }

    #[tokio::test]
    async fn test_ensure_running_returns_last_line() {
        let provisioner = scripted("echo 'Checking pods...'; echo pod-abc123");
        let pod_id = provisioner.ensure_running().await.unwrap();
        assert_eq!(pod_id.as_deref(), Some("pod-abc123"));
    }

    #[tokio::test]
    async fn test_ensure_running_without_output() {
        let provisioner = scripted("true");
        assert_eq!(provisioner.ensure_running().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_config_flag_is_passed() {
        let provisioner = scripted(r#"[ "$1" = "--config" ] && [ "$2" = "pods.yaml" ] && echo ok"#);
        assert_eq!(
            provisioner.ensure_running().await.unwrap().as_deref(),
            Some("ok")
        );
    }

    #[tokio::test]
    async fn test_terminate_and_count_flags() {
        let provisioner = scripted(
            r#"case "$3" in
                 --terminate) echo terminated ;;
                 --count) echo '{"total": 3, "running": 1}' ;;
                 *) exit 9 ;;
               esac"#,
        );

        provisioner.terminate().await.unwrap();
        let counts = provisioner.count().await.unwrap();
        assert_eq!(counts, PodCounts { total: 3, running: 1 });
    }

    #[tokio::test]
    async fn test_failed_command() {
        let provisioner = scripted("echo 'no capacity' >&2; exit 3");
        match provisioner.ensure_running().await {
            Err(ProvisionError::Failed { exit_code, stderr }) => {
                assert_eq!(exit_code, 3);
                assert_eq!(stderr, "no capacity");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program() {
        let provisioner = CommandProvisioner::new(
            "/nonexistent/provisioner",
            "pods.yaml",
            Duration::from_secs(1),
        );
        assert!(matches!(
            provisioner.terminate().await,
            Err(ProvisionError::Spawn(_))
        ));
    }

    #[tokio::test]
    async fn test_timeout() {
        let provisioner = CommandProvisioner::new("sh", "pods.yaml", Duration::from_millis(100))
            .with_base_args(["-c", "sleep 5", "provisioner"]);
        assert!(matches!(
            provisioner.count().await,
            Err(ProvisionError::TimedOut(_))
        ));
    }
}
