//! Configuration management utilities.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dirs_next::config_dir;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::app::sandbox::SandboxLimits;

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static DEFAULT_WORKSPACE_CONFIG_PATH: &str = ".webweaver/config.toml";

/// Layered configuration loaded from defaults, user, workspace, and env.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub sandbox: SandboxLimits,
    #[serde(default)]
    pub console: Console,
}

/// Connection settings for the text-generation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "BackendConfig::default_endpoint")]
    pub endpoint: String,
    #[serde(default = "BackendConfig::default_model")]
    pub model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "BackendConfig::default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "BackendConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl BackendConfig {
    fn default_endpoint() -> String {
        "https://api.openai.com/v1/chat/completions".to_owned()
    }

    fn default_model() -> String {
        "gpt-4o-mini".into()
    }

    fn default_api_key_env() -> String {
        "OPENAI_API_KEY".into()
    }

    fn default_timeout_secs() -> u64 {
        60
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: Self::default_endpoint(),
            model: Self::default_model(),
            api_key_env: Self::default_api_key_env(),
            timeout_secs: Self::default_timeout_secs(),
            temperature: None,
        }
    }
}

/// Console rendering options. An unset field defers to lower config layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Console {
    #[serde(default)]
    show_channel: Option<bool>,
}

impl Console {
    /// Prefix rendered console lines with their channel name.
    pub fn show_channel(&self) -> bool {
        self.show_channel.unwrap_or(false)
    }
}

/// Environment overrides for critical settings.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    model: Option<String>,
    endpoint: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            model: env::var("WEBWEAVER_MODEL").ok(),
            endpoint: env::var("WEBWEAVER_ENDPOINT").ok(),
        }
    }

    #[cfg(test)]
    fn for_tests(model: &str, endpoint: &str) -> Self {
        Self {
            model: Some(model.to_owned()),
            endpoint: Some(endpoint.to_owned()),
        }
    }
}

impl Config {
    /// Load configuration from defaults, user/global config, workspace config, and env overrides.
    pub fn load() -> Result<Self> {
        let env = EnvOverrides::from_env();
        let global = global_config_path();
        let workspace = workspace_config_path()?;
        Self::load_with_layers(global, workspace, env)
    }

    /// Like [`Config::load`], with an explicit file layered on top of the workspace config.
    pub fn load_with_override(path: &Path) -> Result<Self> {
        let base = Self::load()?;
        let overlay = Self::from_file(path)?;
        Ok(apply_env_overrides(
            base.merge(overlay),
            EnvOverrides::from_env(),
        ))
    }

    fn load_with_layers(
        global: Option<PathBuf>,
        workspace: Option<PathBuf>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut layers: Vec<Config> = Vec::new();

        layers.push(Self::from_str(&DEFAULT_CONFIG)?);

        if let Some(global_path) = global.filter(|path| path.exists()) {
            layers.push(Self::from_file(&global_path)?);
        }

        if let Some(workspace_path) = workspace.filter(|path| path.exists()) {
            layers.push(Self::from_file(&workspace_path)?);
        }

        let merged = layers.into_iter().reduce(Config::merge).unwrap_or_default();
        Ok(apply_env_overrides(merged, env_overrides))
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_str(&data)
    }

    fn from_str(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(config)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            backend: merge_backend(self.backend, other.backend),
            sandbox: merge_sandbox(self.sandbox, other.sandbox),
            console: merge_console(self.console, other.console),
        }
    }
}

fn merge_backend(base: BackendConfig, overlay: BackendConfig) -> BackendConfig {
    BackendConfig {
        endpoint: choose(base.endpoint, overlay.endpoint, BackendConfig::default_endpoint),
        model: choose(base.model, overlay.model, BackendConfig::default_model),
        api_key_env: choose(
            base.api_key_env,
            overlay.api_key_env,
            BackendConfig::default_api_key_env,
        ),
        timeout_secs: if overlay.timeout_secs != BackendConfig::default_timeout_secs() {
            overlay.timeout_secs
        } else {
            base.timeout_secs
        },
        temperature: overlay.temperature.or(base.temperature),
    }
}

fn merge_sandbox(base: SandboxLimits, overlay: SandboxLimits) -> SandboxLimits {
    SandboxLimits {
        loop_iteration_limit: if overlay.loop_iteration_limit != 0 {
            overlay.loop_iteration_limit
        } else {
            base.loop_iteration_limit
        },
        recursion_limit: if overlay.recursion_limit != 0 {
            overlay.recursion_limit
        } else {
            base.recursion_limit
        },
    }
}

fn merge_console(mut base: Console, overlay: Console) -> Console {
    if let Some(value) = overlay.show_channel {
        base.show_channel = Some(value);
    }
    base
}

fn choose(base: String, overlay: String, default_fn: fn() -> String) -> String {
    if overlay != default_fn() {
        overlay
    } else {
        base
    }
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("webweaver/config.toml"))
}

fn workspace_config_path() -> Result<Option<PathBuf>> {
    let cwd = env::current_dir()?;
    let root = find_repo_root(&cwd).unwrap_or(cwd);
    Ok(Some(root.join(DEFAULT_WORKSPACE_CONFIG_PATH)))
}

fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let mut current = start;
    loop {
        if current.join(".git").exists() {
            return Some(current.to_path_buf());
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return None,
        }
    }
}

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Config {
    if let Some(model) = env.model {
        config.backend.model = model;
    }
    if let Some(endpoint) = env.endpoint {
        config.backend.endpoint = endpoint;
    }
    config
}
