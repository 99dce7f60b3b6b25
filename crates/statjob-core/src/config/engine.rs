//! External analysis engine configuration.

use serde::{Deserialize, Serialize};

/// How the worker invokes the external statistics engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Program to execute. Empty means no command engine is configured.
    #[serde(default)]
    pub program: String,
    /// Extra arguments passed before the job directory argument.
    #[serde(default)]
    pub args: Vec<String>,
    /// Kill the engine after this many seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl EngineConfig {
    /// Whether an engine program is configured.
    pub fn is_configured(&self) -> bool {
        !self.program.trim().is_empty()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: String::new(),
            args: Vec::new(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    3600
}
