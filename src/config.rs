use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub email: EmailConfig,

    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/parishd.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,

    pub port: u16,

    /// Public origin used to build password-setup links sent by email.
    pub base_url: String,

    pub cors_allowed_origins: Vec<String>,

    /// Whether to set the Secure flag on session cookies.
    /// Default: true for production safety. Set to false for local development without HTTPS.
    pub secure_cookies: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8460,
            base_url: "http://localhost:8460".to_string(),
            cors_allowed_origins: vec![
                "http://localhost:8460".to_string(),
                "http://127.0.0.1:8460".to_string(),
            ],
            secure_cookies: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// When disabled, outgoing mail is logged instead of sent. Setup links
    /// still appear in the log so local provisioning stays usable.
    pub enabled: bool,

    pub smtp_host: String,

    pub smtp_port: u16,

    /// Falls back to the SMTP_USERNAME environment variable when unset.
    pub smtp_username: Option<String>,

    /// Falls back to the SMTP_PASSWORD environment variable when unset.
    pub smtp_password: Option<String>,

    pub from_address: String,

    pub from_name: String,

    /// Whether to use STARTTLS for the connection.
    pub use_tls: bool,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: "sandbox.smtp.mailtrap.io".to_string(),
            smtp_port: 2525,
            smtp_username: None,
            smtp_password: None,
            from_address: "noreply@example.com".to_string(),
            from_name: "Parish Management System".to_string(),
            use_tls: true,
        }
    }
}

impl EmailConfig {
    #[must_use]
    pub fn smtp_username(&self) -> Option<String> {
        self.smtp_username
            .clone()
            .or_else(|| std::env::var("SMTP_USERNAME").ok())
    }

    #[must_use]
    pub fn smtp_password(&self) -> Option<String> {
        self.smtp_password
            .clone()
            .or_else(|| std::env::var("SMTP_PASSWORD").ok())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    /// Lower values reduce memory usage but decrease GPU resistance.
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations) - higher = more CPU work
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,

    /// Validity window for password-setup tokens, in hours.
    pub token_validity_hours: i64,

    /// Validity window for login OTP codes, in hours.
    pub otp_validity_hours: i64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
            token_validity_hours: 72,
            otp_validity_hours: 72,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            email: EmailConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("parishd").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".parishd").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.server.base_url)
            .with_context(|| format!("Invalid server.base_url: {}", self.server.base_url))?;

        if self.security.token_validity_hours <= 0 {
            anyhow::bail!("security.token_validity_hours must be > 0");
        }

        if self.security.otp_validity_hours <= 0 {
            anyhow::bail!("security.otp_validity_hours must be > 0");
        }

        if self.email.enabled && self.email.smtp_host.is_empty() {
            anyhow::bail!("email.smtp_host cannot be empty when email is enabled");
        }

        Ok(())
    }

    /// Setup link delivered to members, e.g.
    /// `http://localhost:8460/set-password?token=<secret>`.
    #[must_use]
    pub fn setup_link(&self, token: &str) -> String {
        format!(
            "{}/set-password?token={}",
            self.server.base_url.trim_end_matches('/'),
            token
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.security.token_validity_hours, 72);
        assert_eq!(config.security.otp_validity_hours, 72);
        assert!(!config.email.enabled);
        assert_eq!(config.server.base_url, "http://localhost:8460");
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[email]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [security]
            token_validity_hours = 24
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.security.token_validity_hours, 24);

        assert_eq!(config.server.port, 8460);
    }

    #[test]
    fn test_setup_link_strips_trailing_slash() {
        let mut config = Config::default();
        config.server.base_url = "https://parish.example.org/".to_string();
        assert_eq!(
            config.setup_link("abc123"),
            "https://parish.example.org/set-password?token=abc123"
        );
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        let mut config = Config::default();
        config.server.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }
}
