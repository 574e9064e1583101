use anyhow::Context;
use serde::de::DeserializeOwned;
use tokio::process::Command;

/// A cloud vendor CLI (`aws`, `gcloud`) with a fixed set of env vars
/// injected into every invocation.
#[derive(Clone, Debug)]
pub struct CliTool {
    program: String,
    envs: Vec<(String, String)>,
}

impl CliTool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            envs: Vec::new(),
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Run to completion; non-zero exit becomes an error carrying stderr.
    pub async fn run(&self, args: &[&str]) -> anyhow::Result<Vec<u8>> {
        let output = Command::new(&self.program)
            .args(args)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to spawn {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "{} {} failed ({}): {}",
                self.program,
                args.join(" "),
                output.status,
                stderr.trim()
            );
        }

        Ok(output.stdout)
    }

    pub async fn json<T: DeserializeOwned>(&self, args: &[&str]) -> anyhow::Result<T> {
        let stdout = self.run(args).await?;
        serde_json::from_slice(&stdout)
            .with_context(|| format!("unexpected output from {} {}", self.program, args.join(" ")))
    }
}
