use anyhow::{Context, Result, anyhow};
use log::debug;
use std::path::Path;
use std::process::Command;

use crate::shell;

/// One external command of a build phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub description: String,
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl Step {
    pub fn new<I, S>(description: &str, program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Step {
            description: description.to_string(),
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            env: Vec::new(),
        }
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    /// The step as a single shell line, environment assignments first.
    pub fn shell_line(&self) -> String {
        let mut line = String::new();
        for (k, v) in &self.env {
            line.push_str(&format!("{}={} ", k, shell::escape(v)));
        }
        line.push_str(&shell::escape(&self.program));
        if !self.args.is_empty() {
            line.push(' ');
            line.push_str(&shell::join(&self.args));
        }
        line
    }
}

/// Executes steps. Production code uses [`SystemRunner`]; tests record.
pub trait CommandRunner {
    fn run(&mut self, step: &Step, cwd: &Path) -> Result<()>;
}

/// Runs steps as local child processes and fails on any non-zero exit.
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&mut self, step: &Step, cwd: &Path) -> Result<()> {
        debug!("[{}] Executing: {}", cwd.display(), step.shell_line());
        let output = Command::new(&step.program)
            .args(&step.args)
            .envs(step.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(cwd)
            .output()
            .with_context(|| format!("Failed to execute {}", step.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            debug!("Stdout: {}", stdout);
            debug!("Stderr: {}", stderr);
            return Err(anyhow!(
                "Command failed ({}): {}. Error: {}",
                output.status,
                step.shell_line(),
                stderr.trim()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_line_with_env() {
        let step = Step::new("install", "apt-get", ["install", "-y", "curl"])
            .with_env("DEBIAN_FRONTEND", "noninteractive");
        assert_eq!(
            step.shell_line(),
            "DEBIAN_FRONTEND=noninteractive apt-get install -y curl"
        );
    }

    #[test]
    fn test_shell_line_without_args() {
        let step = Step::new("noop", "true", Vec::<String>::new());
        assert_eq!(step.shell_line(), "true");
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let step = Step::new("fail", "sh", ["-c", "echo broken >&2; exit 3"]);
        let err = SystemRunner.run(&step, dir.path()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("broken"), "{}", msg);
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_uses_cwd_and_env() {
        let dir = tempfile::tempdir().unwrap();
        let step = Step::new("touch", "sh", ["-c", "touch \"$MARKER\""]).with_env("MARKER", "done");
        SystemRunner.run(&step, dir.path()).unwrap();
        assert!(dir.path().join("done").exists());
    }
}
