use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub upload_dir: PathBuf,
    pub ollama_url: String,
    pub ollama_model: String,
    pub scheduler_enabled: bool,
    pub max_upload_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            database_url: "sqlite://./data/finance.db".into(),
            upload_dir: PathBuf::from("./uploads/statements"),
            ollama_url: "http://localhost:11434".into(),
            ollama_model: "gemma3:4b".into(),
            scheduler_enabled: true,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("server.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            apply(&mut settings, |key| file_cfg.get(key).cloned());
        }
    }

    apply(&mut settings, |key| {
        let legacy = match key {
            "bind_addr" => Some("SERVER_BIND"),
            "database_url" => Some("DATABASE_URL"),
            "upload_dir" => Some("UPLOAD_DIR"),
            "ollama_url" => Some("OLLAMA_URL"),
            "ollama_model" => Some("OLLAMA_MODEL"),
            _ => None,
        };
        std::env::var(format!("APP__{}", key.to_uppercase()))
            .ok()
            .or_else(|| legacy.and_then(|name| std::env::var(name).ok()))
    });

    settings
}

/// Overlays every key `lookup` knows about. Unparseable numbers and flags keep the previous value.
fn apply(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("bind_addr") {
        settings.server_bind = v;
    }
    if let Some(v) = lookup("database_url") {
        settings.database_url = v;
    }
    if let Some(v) = lookup("upload_dir") {
        settings.upload_dir = PathBuf::from(v);
    }
    if let Some(v) = lookup("ollama_url") {
        settings.ollama_url = v;
    }
    if let Some(v) = lookup("ollama_model") {
        settings.ollama_model = v;
    }
    if let Some(v) = lookup("scheduler_enabled").and_then(|v| parse_flag(&v)) {
        settings.scheduler_enabled = v;
    }
    if let Some(v) = lookup("max_upload_bytes").and_then(|v| v.trim().parse().ok()) {
        settings.max_upload_bytes = v;
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
