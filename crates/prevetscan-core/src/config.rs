// Configuration loading and parsing (prevetscan.toml, credentials.toml,
// environment overrides).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("required value `{field}` is missing (set {env} or add it to config/)")]
    MissingValue { field: String, env: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    /// Resolved BaaS base URL, without a trailing slash.
    pub baas_url: String,
    pub challenge: ChallengeConfig,
    pub credentials: Credentials,
}

// ---------------------------------------------------------------------------
// prevetscan.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire prevetscan.toml file.
#[derive(Debug, Clone, Deserialize)]
struct SettingsFile {
    server: ServerConfig,
    llm: LlmConfig,
    #[serde(default)]
    baas: BaasSection,
    challenge: ChallengeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub api_base: String,
    pub analysis_model: String,
    pub analysis_thinking_budget: u32,
    pub chat_model: String,
    #[serde(default)]
    pub chat_thinking_budget: u32,
    pub reasoning_model: String,
    pub reasoning_thinking_budget: u32,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct BaasSection {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    project: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChallengeConfig {
    pub verify_url: String,
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
struct CredentialsFile {
    gemini_api_key: Option<String>,
    baas_anon_key: Option<String>,
    turnstile_secret_key: Option<String>,
    turnstile_site_key: Option<String>,
}

/// Validated secrets. Every field except the public site key is required.
#[derive(Clone)]
pub struct Credentials {
    pub gemini_api_key: String,
    pub baas_anon_key: String,
    pub turnstile_secret_key: String,
    pub turnstile_site_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("gemini_api_key", &"<redacted>")
            .field("baas_anon_key", &"<redacted>")
            .field("turnstile_secret_key", &"<redacted>")
            .field("turnstile_site_key", &self.turnstile_site_key)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/prevetscan.toml` and
/// (optionally) `config/credentials.toml` under `base_dir`, then apply
/// environment overrides looked up through `env`.
///
/// This is the lower-level loading primitive that does not auto-copy defaults
/// and does not touch the process environment, so tests can drive it.
pub fn load_config_from<F>(base_dir: &Path, env: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let config_dir = base_dir.join("config");

    // --- prevetscan.toml (required) ---
    let settings_path = config_dir.join("prevetscan.toml");
    let settings_text = read_file(&settings_path)?;
    let settings: SettingsFile =
        toml::from_str(&settings_text).map_err(|e| ConfigError::ParseError {
            path: settings_path.clone(),
            source: e,
        })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let file_creds: CredentialsFile = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsFile::default()
    };

    let mut server = settings.server;
    if let Some(port) = non_empty(env("PREVETSCAN_PORT")) {
        server.port = port.parse().map_err(|_| ConfigError::ValidationError {
            field: "PREVETSCAN_PORT".into(),
            message: format!("not a valid port: {port}"),
        })?;
    }
    if let Some(host) = non_empty(env("PREVETSCAN_HOST")) {
        server.host = host;
    }

    let baas_url = resolve_baas_url(
        non_empty(env("SUPABASE_URL")).or(non_empty(settings.baas.url)),
        non_empty(env("SUPABASE_PROJECT")).or(non_empty(settings.baas.project)),
    )
    .ok_or_else(|| ConfigError::MissingValue {
        field: "baas.url".into(),
        env: "SUPABASE_URL or SUPABASE_PROJECT".into(),
    })?;

    let credentials = Credentials {
        gemini_api_key: required(
            env("GEMINI_API_KEY"),
            file_creds.gemini_api_key,
            "gemini_api_key",
            "GEMINI_API_KEY",
        )?,
        baas_anon_key: required(
            env("SUPABASE_ANON_KEY"),
            file_creds.baas_anon_key,
            "baas_anon_key",
            "SUPABASE_ANON_KEY",
        )
        // The anon key is a JWT; embedded whitespace is never significant.
        .map(|k| k.chars().filter(|c| !c.is_whitespace()).collect())?,
        turnstile_secret_key: required(
            env("TURNSTILE_SECRET_KEY"),
            file_creds.turnstile_secret_key,
            "turnstile_secret_key",
            "TURNSTILE_SECRET_KEY",
        )?,
        turnstile_site_key: non_empty(env("TURNSTILE_SITE_KEY"))
            .or(non_empty(file_creds.turnstile_site_key)),
    };

    let config = Config {
        server,
        llm: settings.llm,
        baas_url,
        challenge: settings.challenge,
        credentials,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let mut copied = Vec::new();

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Convenience wrapper: loads config relative to the current working
/// directory with the process environment as the override source.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    let copied = ensure_config_files(&cwd)?;
    for path in &copied {
        tracing::info!("Initialized {} from defaults", path.display());
    }
    load_config_from(&cwd, |key| std::env::var(key).ok())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Environment first, then file; blank values count as missing.
fn required(
    from_env: Option<String>,
    from_file: Option<String>,
    field: &str,
    env_name: &str,
) -> Result<String, ConfigError> {
    non_empty(from_env)
        .or(non_empty(from_file))
        .ok_or_else(|| ConfigError::MissingValue {
            field: field.into(),
            env: env_name.into(),
        })
}

/// An explicit URL wins over a project ref.
fn resolve_baas_url(url: Option<String>, project: Option<String>) -> Option<String> {
    url.map(|u| u.trim_end_matches('/').to_string())
        .or_else(|| project.map(|p| format!("https://{p}.supabase.co")))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError {
            field: "server.port".into(),
            message: "must be greater than 0".into(),
        });
    }

    if !config.baas_url.starts_with("http://") && !config.baas_url.starts_with("https://") {
        return Err(ConfigError::ValidationError {
            field: "baas.url".into(),
            message: format!("must be an http(s) URL, got {}", config.baas_url),
        });
    }

    let llm = &config.llm;
    let text_fields: &[(&str, &str)] = &[
        ("llm.api_base", &llm.api_base),
        ("llm.analysis_model", &llm.analysis_model),
        ("llm.chat_model", &llm.chat_model),
        ("llm.reasoning_model", &llm.reasoning_model),
        ("challenge.verify_url", &config.challenge.verify_url),
    ];
    for (name, val) in text_fields {
        if val.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must not be empty".into(),
            });
        }
    }

    if llm.reasoning_thinking_budget < llm.chat_thinking_budget {
        return Err(ConfigError::ValidationError {
            field: "llm.reasoning_thinking_budget".into(),
            message: format!(
                "must be at least chat_thinking_budget ({}), got {}",
                llm.chat_thinking_budget, llm.reasoning_thinking_budget
            ),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
