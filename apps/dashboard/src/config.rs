use std::{collections::HashMap, fs, path::Path, time::Duration};

use anyhow::{bail, Context};
use client_core::{
    AgentDirectory, HttpInvokerOptions, EMAIL_COMPOSER_AGENT_ID, GITHUB_DATA_AGENT_ID,
    MANAGER_AGENT_ID,
};
use shared::domain::AgentId;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "dashboard.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub agent_endpoint: String,
    pub agent_api_key: Option<String>,
    pub manager_agent_id: String,
    pub github_data_agent_id: String,
    pub email_composer_agent_id: String,
    pub request_timeout_secs: Option<u64>,
    pub use_sample_data: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            agent_endpoint: "http://127.0.0.1:3000/api/agent".into(),
            agent_api_key: None,
            manager_agent_id: MANAGER_AGENT_ID.into(),
            github_data_agent_id: GITHUB_DATA_AGENT_ID.into(),
            email_composer_agent_id: EMAIL_COMPOSER_AGENT_ID.into(),
            request_timeout_secs: None,
            use_sample_data: false,
        }
    }
}

impl Settings {
    pub fn endpoint_url(&self) -> anyhow::Result<Url> {
        let url = Url::parse(self.agent_endpoint.trim())
            .with_context(|| format!("invalid agent endpoint '{}'", self.agent_endpoint))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("agent endpoint must be http or https, got '{}'", url.scheme());
        }
        Ok(url)
    }

    pub fn agents(&self) -> AgentDirectory {
        AgentDirectory {
            manager: AgentId::new(self.manager_agent_id.clone()),
            github_data: AgentId::new(self.github_data_agent_id.clone()),
            email_composer: AgentId::new(self.email_composer_agent_id.clone()),
        }
    }

    pub fn invoker_options(&self) -> HttpInvokerOptions {
        HttpInvokerOptions {
            api_key: self.agent_api_key.clone(),
            request_timeout: self.request_timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Defaults, then the config file, then environment variables.
///
/// An explicitly named file must exist; the default `dashboard.toml` is
/// optional.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match config_path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file '{}'", path.display()))?;
            apply_file(&mut settings, &raw)
                .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
        }
        None => {
            if let Ok(raw) = fs::read_to_string(DEFAULT_CONFIG_FILE) {
                apply_file(&mut settings, &raw).with_context(|| {
                    format!("failed to parse config file '{DEFAULT_CONFIG_FILE}'")
                })?;
            }
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

pub(crate) fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg = toml::from_str::<HashMap<String, toml::Value>>(raw)?;
    let get = |key: &str| file_cfg.get(key).map(value_text);

    if let Some(v) = get("agent_endpoint") {
        settings.agent_endpoint = v;
    }
    if let Some(v) = get("agent_api_key") {
        settings.agent_api_key = Some(v);
    }
    if let Some(v) = get("manager_agent_id") {
        settings.manager_agent_id = v;
    }
    if let Some(v) = get("github_data_agent_id") {
        settings.github_data_agent_id = v;
    }
    if let Some(v) = get("email_composer_agent_id") {
        settings.email_composer_agent_id = v;
    }
    if let Some(v) = get("request_timeout_secs") {
        settings.request_timeout_secs = Some(
            v.parse()
                .with_context(|| format!("request_timeout_secs is not a number: '{v}'"))?,
        );
    }
    if let Some(v) = get("use_sample_data") {
        settings.use_sample_data = parse_flag(&v)
            .with_context(|| format!("use_sample_data is not a boolean: '{v}'"))?;
    }
    Ok(())
}

pub(crate) fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("AGENT_ENDPOINT") {
        settings.agent_endpoint = v;
    }
    if let Some(v) = lookup("APP__AGENT_ENDPOINT") {
        settings.agent_endpoint = v;
    }

    if let Some(v) = lookup("AGENT_API_KEY") {
        settings.agent_api_key = Some(v);
    }
    if let Some(v) = lookup("APP__AGENT_API_KEY") {
        settings.agent_api_key = Some(v);
    }

    if let Some(v) = lookup("APP__MANAGER_AGENT_ID") {
        settings.manager_agent_id = v;
    }
    if let Some(v) = lookup("APP__GITHUB_DATA_AGENT_ID") {
        settings.github_data_agent_id = v;
    }
    if let Some(v) = lookup("APP__EMAIL_COMPOSER_AGENT_ID") {
        settings.email_composer_agent_id = v;
    }

    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = Some(parsed);
        }
    }
    if let Some(v) = lookup("APP__USE_SAMPLE_DATA") {
        if let Some(flag) = parse_flag(&v) {
            settings.use_sample_data = flag;
        }
    }
}

fn value_text(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
