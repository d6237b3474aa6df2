use loom_core::{LoomError, LoomResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level orchestrator configuration, usually read from `loom.toml`.
///
/// Every section is optional; missing keys fall back to their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoomConfig {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub priority: PriorityConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl LoomConfig {
    pub fn from_toml_str(raw: &str) -> LoomResult<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| LoomError::Config(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> LoomResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
            .map_err(|e| LoomError::Config(format!("{}: {e}", path.display())))
    }

    pub fn validate(&self) -> LoomResult<()> {
        if self.priority.min_priority > self.priority.max_priority {
            return Err(LoomError::Config(format!(
                "priority.min_priority ({}) exceeds priority.max_priority ({})",
                self.priority.min_priority, self.priority.max_priority
            )));
        }
        if self.logging.level.trim().is_empty() {
            return Err(LoomError::Config("logging.level must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Ceiling on live agents. Zero or negative rejects every spawn.
    #[serde(default = "default_max_agents")]
    pub max_agents: i64,
    /// Silence after which an agent is reported as stale.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

fn default_max_agents() -> i64 {
    10
}

fn default_stale_after_secs() -> u64 {
    300
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_agents: default_max_agents(),
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

impl RegistryConfig {
    pub fn stale_after(&self) -> chrono::Duration {
        let secs = i64::try_from(self.stale_after_secs)
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 1000);
        chrono::Duration::seconds(secs)
    }
}

/// Tuning for agent selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Extra selection rounds after a lost hand-off race.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Score per capability shared between agent and task.
    #[serde(default = "default_capability_weight")]
    pub capability_weight: u32,
    /// Score for an agent matching the task's persona hint.
    #[serde(default = "default_role_weight")]
    pub role_weight: u32,
}

fn default_max_retries() -> u32 {
    3
}

fn default_capability_weight() -> u32 {
    1
}

fn default_role_weight() -> u32 {
    5
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            capability_weight: default_capability_weight(),
            role_weight: default_role_weight(),
        }
    }
}

/// Keyword adjustments and bounds for the default priority evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityConfig {
    #[serde(default)]
    pub min_priority: i32,
    #[serde(default = "default_max_priority")]
    pub max_priority: i32,
    #[serde(default = "default_urgency_boost")]
    pub urgency_boost: i32,
    #[serde(default = "default_deferral_penalty")]
    pub deferral_penalty: i32,
    #[serde(default = "default_auto_filed_boost")]
    pub auto_filed_boost: i32,
    #[serde(default = "default_urgency_keywords")]
    pub urgency_keywords: Vec<String>,
    #[serde(default = "default_deferral_keywords")]
    pub deferral_keywords: Vec<String>,
}

fn default_max_priority() -> i32 {
    10
}

fn default_urgency_boost() -> i32 {
    2
}

fn default_deferral_penalty() -> i32 {
    1
}

fn default_auto_filed_boost() -> i32 {
    1
}

fn default_urgency_keywords() -> Vec<String> {
    [
        "urgent", "critical", "blocker", "hotfix", "outage", "security", "asap", "p0",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

fn default_deferral_keywords() -> Vec<String> {
    [
        "nice-to-have",
        "nice to have",
        "someday",
        "chore",
        "cleanup",
        "typo",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            min_priority: 0,
            max_priority: default_max_priority(),
            urgency_boost: default_urgency_boost(),
            deferral_penalty: default_deferral_penalty(),
            auto_filed_boost: default_auto_filed_boost(),
            urgency_keywords: default_urgency_keywords(),
            deferral_keywords: default_deferral_keywords(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
