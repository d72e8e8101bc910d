//! Merged, explicit `Config` value: defaults, then an optional TOML file,
//! then environment overrides — never a hidden singleton, so test fixtures
//! can construct and replace it per-test. Grounded on
//! `atm-core::config::types`'s nested-struct-with-`Default`-impls shape.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub send: SendConfig,
    #[serde(default)]
    pub watcher: WatcherConfig,
    #[serde(default)]
    pub loop_guard: LoopGuardConfig,
    #[serde(default)]
    pub compaction_guard: CompactionGuardConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            send: SendConfig::default(),
            watcher: WatcherConfig::default(),
            loop_guard: LoopGuardConfig::default(),
            compaction_guard: CompactionGuardConfig::default(),
            webhook: WebhookConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendConfig {
    /// Roles whose outbound sends are auto-CC'd to `edit`.
    pub auto_cc_roles: Vec<String>,
}

impl Default for SendConfig {
    fn default() -> Self {
        SendConfig {
            auto_cc_roles: vec!["build".into(), "test".into(), "review".into()],
        }
    }
}

impl SendConfig {
    pub fn auto_cc_set(&self) -> Vec<&str> {
        self.auto_cc_roles.iter().map(String::as_str).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    pub tick_ms: u64,
    pub proc_refresh_every_ticks: u32,
    pub guard_every_ticks: u32,
    pub llm_probe_every_ticks: u32,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        WatcherConfig {
            tick_ms: 2000,
            proc_refresh_every_ticks: 5,
            guard_every_ticks: 15,
            llm_probe_every_ticks: 30,
        }
    }
}

impl WatcherConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopGuardConfig {
    pub command_threshold: u32,
    pub message_threshold: u32,
    pub window_secs: i64,
    pub cooldown_secs: i64,
}

impl Default for LoopGuardConfig {
    fn default() -> Self {
        LoopGuardConfig {
            command_threshold: 3,
            message_threshold: 4,
            window_secs: 300,
            cooldown_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionGuardConfig {
    pub size_threshold_bytes: u64,
    pub age_threshold_hours: i64,
    pub cooldown_secs: i64,
}

impl Default for CompactionGuardConfig {
    fn default() -> Self {
        CompactionGuardConfig {
            size_threshold_bytes: 512 * 1024,
            age_threshold_hours: 2,
            cooldown_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub port: u16,
    pub max_body_bytes: usize,
    pub token_env_var: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        WebhookConfig {
            port: 8787,
            max_body_bytes: 64 * 1024,
            token_env_var: "BUS_WEBHOOK_TOKEN".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub url: String,
    pub probe_timeout_secs: u64,
    pub restart_timeout_secs: u64,
    pub failure_strikes: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            url: std::env::var("MUXCODE_OLLAMA_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            probe_timeout_secs: 10,
            restart_timeout_secs: 15,
            failure_strikes: 3,
        }
    }
}

impl Config {
    /// Defaults, then an optional TOML file, then env overrides.
    pub fn resolve(config_path: Option<&Path>) -> anyhow::Result<Config> {
        let mut config = Config::default();

        if let Some(path) = config_path {
            if path.exists() {
                let text = std::fs::read_to_string(path)?;
                config = toml::from_str(&text)?;
            }
        }

        if let Ok(port) = std::env::var("BUS_WEBHOOK_PORT") {
            if let Ok(p) = port.parse() {
                config.webhook.port = p;
            }
        }
        if let Ok(url) = std::env::var("MUXCODE_OLLAMA_URL") {
            config.llm.url = url;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_thresholds() {
        let config = Config::default();
        assert_eq!(config.compaction_guard.size_threshold_bytes, 512 * 1024);
        assert_eq!(config.compaction_guard.age_threshold_hours, 2);
        assert_eq!(config.compaction_guard.cooldown_secs, 600);
        assert_eq!(config.loop_guard.command_threshold, 3);
        assert_eq!(config.loop_guard.message_threshold, 4);
        assert_eq!(config.send.auto_cc_set(), vec!["build", "test", "review"]);
    }

    #[test]
    fn resolve_without_file_uses_defaults() {
        let config = Config::resolve(None).unwrap();
        assert_eq!(config.webhook.port, 8787);
    }
}
