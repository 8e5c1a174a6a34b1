use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default ceiling for buffered calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
/// Window in which repeated error notifications collapse into one.
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(800);
pub const DEFAULT_PLATFORM: &str = "web";
pub const SESSION_EXPIRED_CODE: i64 = 10001;
pub const SILENT_CODE: i64 = 10002;

/// Which part of the envelope the signature covers.
///
/// One scope is chosen per client and applied to both the buffered and the
/// streaming path; the server must verify over the same subset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureScope {
    /// All envelope fields except `sign`, parameters nested under `parameter.`
    #[default]
    Envelope,
    /// Only the caller's parameter tree, with bare keys.
    Parameters,
}

impl FromStr for SignatureScope {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "envelope" => Ok(Self::Envelope),
            "parameters" | "params" => Ok(Self::Parameters),
            other => Err(ConfigError::InvalidConfiguration(format!(
                "Unknown signature scope '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub platform: String,
    pub timeout: Duration,
    pub debounce_window: Duration,
    pub session_expired_code: i64,
    pub silent_code: i64,
    pub signature_scope: SignatureScope,
    pub sign_secret: Option<Secret<String>>,
    pub user_agent: String,
    pub device_id_path: Option<PathBuf>,
}

// Custom Serialize implementation - never expose secrets in serialization
impl Serialize for ClientConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ClientConfig", 10)?;
        state.serialize_field("base_url", &self.base_url)?;
        state.serialize_field("platform", &self.platform)?;
        state.serialize_field("timeout_ms", &(self.timeout.as_millis() as u64))?;
        state.serialize_field(
            "debounce_window_ms",
            &(self.debounce_window.as_millis() as u64),
        )?;
        state.serialize_field("session_expired_code", &self.session_expired_code)?;
        state.serialize_field("silent_code", &self.silent_code)?;
        state.serialize_field("signature_scope", &self.signature_scope)?;
        state.serialize_field(
            "sign_secret",
            &self.sign_secret.as_ref().map(|_| "[REDACTED]"),
        )?;
        state.serialize_field("user_agent", &self.user_agent)?;
        state.serialize_field("device_id_path", &self.device_id_path)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for ClientConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ClientConfigHelper {
            base_url: String,
            platform: Option<String>,
            timeout_ms: Option<u64>,
            debounce_window_ms: Option<u64>,
            session_expired_code: Option<i64>,
            silent_code: Option<i64>,
            #[serde(default)]
            signature_scope: SignatureScope,
            sign_secret: Option<String>,
            user_agent: Option<String>,
            device_id_path: Option<PathBuf>,
        }

        let helper = ClientConfigHelper::deserialize(deserializer)?;
        let mut config = Self::new(helper.base_url);
        if let Some(platform) = helper.platform {
            config.platform = platform;
        }
        if let Some(ms) = helper.timeout_ms {
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = helper.debounce_window_ms {
            config.debounce_window = Duration::from_millis(ms);
        }
        if let Some(code) = helper.session_expired_code {
            config.session_expired_code = code;
        }
        if let Some(code) = helper.silent_code {
            config.silent_code = code;
        }
        if let Some(user_agent) = helper.user_agent {
            config.user_agent = user_agent;
        }
        config.signature_scope = helper.signature_scope;
        config.sign_secret = helper.sign_secret.map(Secret::new);
        config.device_id_path = helper.device_id_path;
        Ok(config)
    }
}

impl ClientConfig {
    /// Create a configuration with the observed production defaults
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            platform: DEFAULT_PLATFORM.to_string(),
            timeout: DEFAULT_TIMEOUT,
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
            session_expired_code: SESSION_EXPIRED_CODE,
            silent_code: SILENT_CODE,
            signature_scope: SignatureScope::default(),
            sign_secret: None,
            user_agent: format!("signwire/{}", env!("CARGO_PKG_VERSION")),
            device_id_path: None,
        }
    }

    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `{PREFIX}_ENV` (optional, `development` selects the test URL)
    /// - `{PREFIX}_TEST_URL` / `{PREFIX}_PRO_URL`
    /// - `{PREFIX}_PLATFORM` (optional, defaults to `web`)
    /// - `{PREFIX}_TIMEOUT_SECS` (optional, defaults to 15)
    /// - `{PREFIX}_SIGN_SECRET` (optional, switches to HMAC signing)
    /// - `{PREFIX}_SIGN_SCOPE` (optional, `envelope` or `parameters`)
    /// - `{PREFIX}_DEVICE_ID_PATH` (optional)
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let prefix = prefix.to_uppercase();
        let var = |name: &str| env::var(format!("{}_{}", prefix, name)).ok();

        let environment = var("ENV").unwrap_or_else(|| "production".to_string());
        let url_var = if environment.eq_ignore_ascii_case("development") {
            "TEST_URL"
        } else {
            "PRO_URL"
        };
        let base_url = var(url_var).ok_or_else(|| {
            ConfigError::MissingEnvironmentVariable(format!("{}_{}", prefix, url_var))
        })?;

        let mut config = Self::new(base_url);

        if let Some(platform) = var("PLATFORM") {
            config.platform = platform;
        }
        if let Some(secs) = var("TIMEOUT_SECS") {
            let secs = secs.parse::<u64>().map_err(|e| {
                ConfigError::InvalidConfiguration(format!(
                    "{}_TIMEOUT_SECS is not a number: {}",
                    prefix, e
                ))
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(scope) = var("SIGN_SCOPE") {
            config.signature_scope = scope.parse()?;
        }
        config.sign_secret = var("SIGN_SECRET")
            .filter(|s| !s.is_empty())
            .map(Secret::new);
        config.device_id_path = var("DEVICE_ID_PATH").map(PathBuf::from);

        Ok(config)
    }

    /// Create configuration from .env file and environment variables
    ///
    /// **Security Warning**: Never commit .env files to version control!
    #[cfg(feature = "env-file")]
    pub fn from_env_file(prefix: &str) -> Result<Self, ConfigError> {
        Self::from_env_file_with_path(prefix, ".env")
    }

    /// Create configuration from a specific .env file path
    #[cfg(feature = "env-file")]
    pub fn from_env_file_with_path(prefix: &str, env_file_path: &str) -> Result<Self, ConfigError> {
        match dotenv::from_path(env_file_path) {
            Ok(()) => {}
            Err(dotenv::Error::Io(io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {
                // .env file doesn't exist, that's okay - continue with system env vars
            }
            Err(e) => {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "Failed to load .env file '{}': {}",
                    env_file_path, e
                )));
            }
        }

        Self::from_env(prefix)
    }

    /// Load configuration with automatic .env file detection
    ///
    /// Tries `.env.local`, then `.env.{ENVIRONMENT}`, then `.env`; only the
    /// first file found is loaded.
    #[cfg(feature = "env-file")]
    pub fn from_env_auto(prefix: &str) -> Result<Self, ConfigError> {
        let env_files = [
            ".env.local".to_string(),
            format!(
                ".env.{}",
                env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string())
            ),
            ".env".to_string(),
        ];

        for env_file in &env_files {
            match dotenv::from_path(env_file) {
                Ok(()) => break,
                Err(dotenv::Error::Io(io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(ConfigError::InvalidConfiguration(format!(
                        "Failed to load .env file '{}': {}",
                        env_file, e
                    )));
                }
            }
        }

        Self::from_env(prefix)
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    #[must_use]
    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    #[must_use]
    pub fn signature_scope(mut self, scope: SignatureScope) -> Self {
        self.signature_scope = scope;
        self
    }

    /// Sign with HMAC-SHA256 under this shared secret instead of plain SHA-256
    #[must_use]
    pub fn sign_secret(mut self, secret: impl Into<String>) -> Self {
        self.sign_secret = Some(Secret::new(secret.into()));
        self
    }

    #[must_use]
    pub fn device_id_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.device_id_path = Some(path.into());
        self
    }

    /// Whether requests are signed with a keyed digest
    pub fn has_sign_secret(&self) -> bool {
        self.sign_secret
            .as_ref()
            .is_some_and(|s| !s.expose_secret().is_empty())
    }

    /// Get the signing secret (use carefully - exposes secret)
    pub fn sign_secret_str(&self) -> Option<&str> {
        self.sign_secret.as_ref().map(|s| s.expose_secret().as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvironmentVariable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}
