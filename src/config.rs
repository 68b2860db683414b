use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::ExamError;

pub const API_KEY_ENV: &str = "API_KEY";
pub const API_URL_ENV: &str = "API_URL";
pub const MODEL_ENV: &str = "MODEL";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub port: u16,
    pub proxy_port: u16,
    pub bind_address: String,
    pub static_dir: PathBuf,
    pub secret_file: PathBuf,
    pub materials_file: PathBuf,
    pub max_upload_bytes: u64,
    pub min_extracted_chars: usize,
    pub max_pdf_pages: usize,
    pub max_prompt_chars: usize,
    pub chunk_size: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay_timeout_secs: Option<u64>,
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: 3000,
            proxy_port: 8080,
            bind_address: "0.0.0.0".to_string(),
            static_dir: PathBuf::from("."),
            secret_file: PathBuf::from("secret.txt"),
            materials_file: PathBuf::from("assets/materials.json"),
            max_upload_bytes: 10 * 1024 * 1024, // 10MB
            min_extracted_chars: 100,
            max_pdf_pages: 50,
            max_prompt_chars: 8000,
            chunk_size: 2000,
            temperature: 0.7,
            max_tokens: 2000,
            relay_timeout_secs: None,
            log_level: LogLevel::Info,
        }
    }
}

impl Settings {
    /// Reads the settings file (if any) and layers environment overrides on top.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        let mut settings = if config_path.exists() {
            let content = fs::read_to_string(&config_path).await?;
            toml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse config file {}: {}", config_path.display(), e))?
        } else {
            Self::default()
        };

        settings.apply_env(|name| std::env::var(name).ok());

        Ok(settings)
    }

    pub async fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;

        fs::write(&config_path, content).await?;

        tracing::info!("Config saved to: {}", config_path.display());
        Ok(config_path)
    }

    fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;

        Ok(home.join(".exam-maker").join("config.toml"))
    }

    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(port) = var("PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.port = port,
                Err(_) => tracing::warn!("Ignoring invalid PORT: {}", port),
            }
        }

        if let Some(port) = var("PROXY_PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.proxy_port = port,
                Err(_) => tracing::warn!("Ignoring invalid PROXY_PORT: {}", port),
            }
        }

        if let Some(address) = var("EXAM_BIND_ADDRESS") {
            self.bind_address = address;
        }

        if let Some(dir) = var("EXAM_STATIC_DIR") {
            self.static_dir = PathBuf::from(dir);
        }

        if let Some(file) = var("EXAM_SECRET_FILE") {
            self.secret_file = PathBuf::from(file);
        }

        if let Some(file) = var("EXAM_MATERIALS_FILE") {
            self.materials_file = PathBuf::from(file);
        }

        if let Some(size) = var("EXAM_MAX_UPLOAD_BYTES") {
            if let Ok(size) = size.parse::<u64>() {
                self.max_upload_bytes = size;
            }
        }

        if let Some(chars) = var("EXAM_MAX_PROMPT_CHARS") {
            if let Ok(chars) = chars.parse::<usize>() {
                self.max_prompt_chars = chars;
            }
        }

        if let Some(secs) = var("EXAM_RELAY_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                self.relay_timeout_secs = Some(secs);
            }
        }

        if let Some(level) = var("EXAM_LOG_LEVEL") {
            match level.to_lowercase().as_str() {
                "error" => self.log_level = LogLevel::Error,
                "warn" => self.log_level = LogLevel::Warn,
                "info" => self.log_level = LogLevel::Info,
                "debug" => self.log_level = LogLevel::Debug,
                "trace" => self.log_level = LogLevel::Trace,
                _ => tracing::warn!("Unknown log level: {}", level),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 || self.proxy_port == 0 {
            return Err(anyhow::anyhow!("Ports must be greater than 0"));
        }

        if self.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("Max upload size must be greater than 0"));
        }

        if self.max_prompt_chars == 0 || self.chunk_size == 0 {
            return Err(anyhow::anyhow!("Prompt and chunk sizes must be greater than 0"));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(anyhow::anyhow!("Temperature must be between 0.0 and 2.0"));
        }

        if !self.static_dir.exists() {
            tracing::warn!("Static directory does not exist: {}", self.static_dir.display());
        }

        Ok(())
    }

    pub fn get_tracing_level(&self) -> tracing::Level {
        match self.log_level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Credentials for the upstream chat-completion API. Immutable once loaded.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Environment,
    SecretFile,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("api_key", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish()
    }
}

impl ApiConfig {
    pub async fn load(secret_file: &Path) -> Result<(Self, ConfigSource), ExamError> {
        let file_contents = match fs::read_to_string(secret_file).await {
            Ok(contents) => Some(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!("Failed to read secret file {}: {}", secret_file.display(), e);
                None
            }
        };

        let resolved = Self::resolve(|name| std::env::var(name).ok(), file_contents.as_deref())
            .ok_or_else(|| ExamError::ConfigurationMissing(secret_file.display().to_string()))?;

        tracing::info!(
            api_url = %resolved.0.api_url,
            model = %resolved.0.model,
            source = ?resolved.1,
            "API configuration loaded"
        );
        Ok(resolved)
    }

    /// First complete source wins. Sources are never combined field by field.
    pub fn resolve<F>(env: F, secret_file: Option<&str>) -> Option<(Self, ConfigSource)>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(config) = Self::from_env(env) {
            return Some((config, ConfigSource::Environment));
        }

        secret_file
            .and_then(Self::parse_secret)
            .map(|config| (config, ConfigSource::SecretFile))
    }

    pub fn from_env<F>(env: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| env(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Some(Self {
            api_key: var(API_KEY_ENV)?,
            api_url: var(API_URL_ENV)?,
            model: var(MODEL_ENV)?,
        })
    }

    /// Parses newline separated `key:value` pairs, splitting at the first colon.
    pub fn parse_secret(text: &str) -> Option<Self> {
        let mut pairs: HashMap<&str, &str> = HashMap::new();

        for line in text.lines() {
            if let Some((key, value)) = line.split_once(':') {
                let (key, value) = (key.trim(), value.trim());
                if !key.is_empty() && !value.is_empty() {
                    pairs.insert(key, value);
                }
            }
        }

        Some(Self {
            api_key: pairs.get("api_key")?.to_string(),
            api_url: pairs.get("api_url")?.to_string(),
            model: pairs.get("model")?.to_string(),
        })
    }

    pub fn to_secret_text(&self) -> String {
        format!(
            "api_key:{}\napi_url:{}\nmodel:{}\n",
            self.api_key, self.api_url, self.model
        )
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_url.trim_end_matches('/'))
    }
}
