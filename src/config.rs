use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Storage root used when no config file exists.
pub const DEFAULT_STORAGE_ROOT: &str = "./project_logs";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub root: PathBuf,
    #[serde(default = "default_project_name")]
    pub project_name: String,
}

fn default_project_name() -> String {
    "Unnamed Project".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummaryConfig {
    #[serde(default = "default_window_days")]
    pub default_window_days: i64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            default_window_days: default_window_days(),
        }
    }
}

fn default_window_days() -> i64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Override for the provider endpoint; used to point at a proxy or a
    /// local stub.
    #[serde(default)]
    pub api_url: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_history: default_max_history(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            api_url: None,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_model() -> String {
    "claude-3-opus-20240229".to_string()
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_temperature() -> f64 {
    0.7
}
fn default_max_history() -> usize {
    20
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}

impl ChatConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl Config {
    /// A config rooted at `root` with every other section defaulted.
    ///
    /// `plog init` falls back to this (rooted at [`DEFAULT_STORAGE_ROOT`])
    /// when the config file does not exist yet.
    pub fn minimal(root: impl Into<PathBuf>) -> Self {
        Self {
            storage: StorageConfig {
                root: root.into(),
                project_name: default_project_name(),
            },
            summary: SummaryConfig::default(),
            server: ServerConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.storage.root.as_os_str().is_empty() {
        anyhow::bail!("storage.root must not be empty");
    }
    if config.storage.project_name.trim().is_empty() {
        anyhow::bail!("storage.project_name must not be empty");
    }

    if config.summary.default_window_days < 1 {
        anyhow::bail!("summary.default_window_days must be >= 1");
    }

    match config.chat.provider.as_str() {
        "disabled" | "anthropic" => {}
        other => anyhow::bail!(
            "Unknown chat provider: '{}'. Must be disabled or anthropic.",
            other
        ),
    }

    if config.chat.is_enabled() {
        if config.chat.model.trim().is_empty() {
            anyhow::bail!(
                "chat.model must be specified when provider is '{}'",
                config.chat.provider
            );
        }
        if config.chat.max_tokens == 0 {
            anyhow::bail!("chat.max_tokens must be > 0");
        }
    }

    if !(0.0..=1.0).contains(&config.chat.temperature) {
        anyhow::bail!("chat.temperature must be in [0.0, 1.0]");
    }
    if config.chat.max_history < 2 || config.chat.max_history % 2 != 0 {
        anyhow::bail!(
            "chat.max_history must be an even number >= 2 (user/assistant pairs), got {}",
            config.chat.max_history
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(tmp: &TempDir, body: &str) -> PathBuf {
        let path = tmp.path().join("plog.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn minimal_file_gets_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "[storage]\nroot = \"./data\"\n");
        let cfg = load_config(&path).unwrap();

        assert_eq!(cfg.storage.root, PathBuf::from("./data"));
        assert_eq!(cfg.storage.project_name, "Unnamed Project");
        assert_eq!(cfg.summary.default_window_days, 30);
        assert_eq!(cfg.server.bind, "127.0.0.1:8000");
        assert!(!cfg.chat.is_enabled());
        assert_eq!(cfg.chat.max_history, 20);
    }

    #[test]
    fn full_file_parses() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"
[storage]
root = "/var/lib/plog"
project_name = "Confidant"

[summary]
default_window_days = 14

[server]
bind = "0.0.0.0:9000"

[chat]
provider = "anthropic"
model = "claude-3-opus-20240229"
max_tokens = 512
temperature = 0.2
max_history = 10
"#,
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.storage.project_name, "Confidant");
        assert_eq!(cfg.summary.default_window_days, 14);
        assert_eq!(cfg.server.bind, "0.0.0.0:9000");
        assert!(cfg.chat.is_enabled());
        assert_eq!(cfg.chat.max_tokens, 512);
    }

    #[test]
    fn rejects_bad_values() {
        let tmp = TempDir::new().unwrap();

        let path = write_config(
            &tmp,
            "[storage]\nroot = \"./d\"\n[summary]\ndefault_window_days = 0\n",
        );
        assert!(load_config(&path).is_err());

        let path = write_config(&tmp, "[storage]\nroot = \"./d\"\n[chat]\nprovider = \"gpt\"\n");
        let err = load_config(&path).unwrap_err().to_string();
        assert!(err.contains("Unknown chat provider"));

        let path = write_config(
            &tmp,
            "[storage]\nroot = \"./d\"\n[chat]\ntemperature = 1.5\n",
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn odd_history_size_is_rejected() {
        let tmp = TempDir::new().unwrap();
        for bad in [0, 1, 3, 21] {
            let path = write_config(
                &tmp,
                &format!("[storage]\nroot = \"./d\"\n[chat]\nmax_history = {}\n", bad),
            );
            let err = load_config(&path).unwrap_err().to_string();
            assert!(err.contains("chat.max_history"), "{}: {}", bad, err);
        }

        let path = write_config(&tmp, "[storage]\nroot = \"./d\"\n[chat]\nmax_history = 4\n");
        assert_eq!(load_config(&path).unwrap().chat.max_history, 4);
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = load_config(Path::new("/nonexistent/plog.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/plog.toml"));
    }
}
