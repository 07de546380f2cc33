use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use client_core::TransportOptions;
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "wfs-explorer.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub endpoint: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: "https://geobretagne.fr/geoserver/ows".into(),
            request_timeout_secs: 30,
            user_agent: TransportOptions::default().user_agent,
            log_filter: "info".into(),
        }
    }
}

impl Settings {
    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            timeout: Duration::from_secs(self.request_timeout_secs),
            user_agent: self.user_agent.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    endpoint: Option<String>,
    request_timeout_secs: Option<u64>,
    user_agent: Option<String>,
    log_filter: Option<String>,
}

/// Defaults, then the config file, then the environment.
///
/// An explicit `path` must exist; the default `wfs-explorer.toml` is optional.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let (path, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    match fs::read_to_string(&path) {
        Ok(raw) => apply_file(&mut settings, &raw)
            .with_context(|| format!("invalid config file {}", path.display()))?,
        Err(err) if required => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
        Err(_) => {}
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file.endpoint {
        settings.endpoint = v;
    }
    if let Some(v) = file.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = file.user_agent {
        settings.user_agent = v;
    }
    if let Some(v) = file.log_filter {
        settings.log_filter = v;
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("WFS_ENDPOINT") {
        settings.endpoint = v;
    }
    if let Some(v) = var("APP__ENDPOINT") {
        settings.endpoint = v;
    }

    if let Some(v) = var("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }

    if let Some(v) = var("APP__USER_AGENT") {
        settings.user_agent = v;
    }
    if let Some(v) = var("APP__LOG_FILTER") {
        settings.log_filter = v;
    }
}
