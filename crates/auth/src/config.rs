//! Client configuration
//!
//! [`ClientOptions`] carries everything an
//! [`AuthorizationClient`](crate::AuthorizationClient) needs; every field has
//! a default and [`ClientOptionsBuilder`] merges supplied values over them.
//!
//! [`ClientSettings`] is the serializable subset, loaded from environment
//! variables or a config file.
//!
//! ## Environment Variables
//! - `SESSIONKIT_CLIENT_ID`: client identifier (required)
//! - `SESSIONKIT_ENDPOINT`: authorization endpoint
//! - `SESSIONKIT_SESSION_ENDPOINT`: session (GraphQL) endpoint override
//! - `SESSIONKIT_AS_POPUP`: popup mode (true/false)
//! - `SESSIONKIT_REDIRECT_URI`: redirect URI override for redirect mode
//! - `SESSIONKIT_SCOPE`: requested scope
//! - `SESSIONKIT_STORAGE_PATH`: JSON file used as the storage medium
//! - `SESSIONKIT_REQUIRE_HTTPS`: refuse interactive login off HTTPS
//! - `SESSIONKIT_POPUP_TIMEOUT_SECS`: give up waiting for the popup
//!
//! ## File Locations
//! When no path is given the loader probes `./sessionkit.{json,toml}` and
//! `./config.{json,toml}` in the working directory and its parent, then the
//! same names next to the executable.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sessionkit_common::storage::{FileStorage, MemoryStorage, StorageMedium};
use sessionkit_common::time::{Clock, SystemClock};
use url::Url;

use crate::error::AuthError;
use crate::host::{MemoryHost, DEFAULT_LOCATION};
use crate::traits::{BrowserHost, HttpTransport};
use crate::transport::ReqwestTransport;

/// Default authorization endpoint
pub const DEFAULT_ENDPOINT: &str = "https://weightxreps.net/api/auth";

/// Default requested scope
pub const DEFAULT_SCOPE: &str = "not-set";

/// How often an open popup is checked for having been closed
pub const DEFAULT_POPUP_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Resolved client options
#[derive(Clone)]
pub struct ClientOptions {
    /// Authorization endpoint; the token endpoint is `{endpoint}/token`
    pub endpoint: Url,
    /// Session endpoint override
    pub session_endpoint: Option<Url>,
    /// Open the login page in a popup instead of navigating away
    pub as_popup: bool,
    /// Redirect URI override, ignored in popup mode
    pub redirect_uri: Option<String>,
    pub scope: String,
    pub require_https: bool,
    /// Give up on a popup login after this long; `None` waits indefinitely
    pub popup_timeout: Option<Duration>,
    pub popup_poll_interval: Duration,
    pub storage: Arc<dyn StorageMedium>,
    pub transport: Arc<dyn HttpTransport>,
    pub host: Arc<dyn BrowserHost>,
    pub clock: Arc<dyn Clock>,
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("endpoint", &self.endpoint.as_str())
            .field("session_endpoint", &self.session_endpoint.as_ref().map(Url::as_str))
            .field("as_popup", &self.as_popup)
            .field("redirect_uri", &self.redirect_uri)
            .field("scope", &self.scope)
            .field("require_https", &self.require_https)
            .field("popup_timeout", &self.popup_timeout)
            .finish_non_exhaustive()
    }
}

impl ClientOptions {
    /// Start building options over the defaults
    #[must_use]
    pub fn builder() -> ClientOptionsBuilder {
        ClientOptionsBuilder::default()
    }

    /// All defaults
    ///
    /// # Errors
    /// Returns an error if the default HTTP transport cannot be built
    pub fn defaults() -> Result<Self, AuthError> {
        Self::builder().build()
    }
}

/// Builder for [`ClientOptions`]
#[derive(Default)]
pub struct ClientOptionsBuilder {
    endpoint: Option<String>,
    session_endpoint: Option<String>,
    as_popup: bool,
    redirect_uri: Option<String>,
    scope: Option<String>,
    require_https: Option<bool>,
    popup_timeout: Option<Duration>,
    popup_poll_interval: Option<Duration>,
    storage: Option<Arc<dyn StorageMedium>>,
    transport: Option<Arc<dyn HttpTransport>>,
    host: Option<Arc<dyn BrowserHost>>,
    clock: Option<Arc<dyn Clock>>,
}

impl ClientOptionsBuilder {
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn session_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.session_endpoint = Some(endpoint.into());
        self
    }

    pub fn as_popup(mut self, as_popup: bool) -> Self {
        self.as_popup = as_popup;
        self
    }

    pub fn redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn require_https(mut self, require: bool) -> Self {
        self.require_https = Some(require);
        self
    }

    pub fn popup_timeout(mut self, timeout: Duration) -> Self {
        self.popup_timeout = Some(timeout);
        self
    }

    pub fn popup_poll_interval(mut self, interval: Duration) -> Self {
        self.popup_poll_interval = Some(interval);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn StorageMedium>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn host(mut self, host: Arc<dyn BrowserHost>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Merge the supplied values over the defaults
    ///
    /// # Errors
    /// Returns [`AuthError::Config`] if an endpoint is not an absolute
    /// `http`/`https` URL, or if the default transport cannot be built
    pub fn build(self) -> Result<ClientOptions, AuthError> {
        let endpoint = parse_endpoint(self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT))?;
        let session_endpoint = self.session_endpoint.as_deref().map(parse_endpoint).transpose()?;

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };
        let host: Arc<dyn BrowserHost> = match self.host {
            Some(host) => host,
            None => Arc::new(MemoryHost::parse(DEFAULT_LOCATION)?),
        };

        Ok(ClientOptions {
            endpoint,
            session_endpoint,
            as_popup: self.as_popup,
            redirect_uri: self.redirect_uri,
            scope: self.scope.unwrap_or_else(|| DEFAULT_SCOPE.to_string()),
            require_https: self.require_https.unwrap_or(true),
            popup_timeout: self.popup_timeout,
            popup_poll_interval: self.popup_poll_interval.unwrap_or(DEFAULT_POPUP_POLL_INTERVAL),
            storage: self.storage.unwrap_or_else(|| Arc::new(MemoryStorage::new())),
            transport,
            host,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        })
    }
}

fn parse_endpoint(raw: &str) -> Result<Url, AuthError> {
    let url = Url::parse(raw)
        .map_err(|e| AuthError::Config(format!("Invalid endpoint '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(AuthError::Config(format!("Unsupported endpoint scheme '{other}' in '{raw}'"))),
    }
}

/// Serializable client settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub client_id: String,
    pub endpoint: Option<String>,
    pub session_endpoint: Option<String>,
    pub as_popup: bool,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub storage_path: Option<PathBuf>,
    pub require_https: Option<bool>,
    pub popup_timeout_secs: Option<u64>,
}

impl ClientSettings {
    /// Builder pre-filled from these settings
    ///
    /// A `storage_path` opens a [`FileStorage`] medium at that path.
    ///
    /// # Errors
    /// Returns [`AuthError::Config`] if the storage file cannot be opened
    pub fn to_builder(&self) -> Result<ClientOptionsBuilder, AuthError> {
        let mut builder = ClientOptions::builder().as_popup(self.as_popup);

        if let Some(endpoint) = &self.endpoint {
            builder = builder.endpoint(endpoint);
        }
        if let Some(endpoint) = &self.session_endpoint {
            builder = builder.session_endpoint(endpoint);
        }
        if let Some(uri) = &self.redirect_uri {
            builder = builder.redirect_uri(uri);
        }
        if let Some(scope) = &self.scope {
            builder = builder.scope(scope);
        }
        if let Some(require) = self.require_https {
            builder = builder.require_https(require);
        }
        if let Some(secs) = self.popup_timeout_secs {
            builder = builder.popup_timeout(Duration::from_secs(secs));
        }
        if let Some(path) = &self.storage_path {
            let medium = FileStorage::open(path).map_err(|e| {
                AuthError::Config(format!("Failed to open storage '{}': {e}", path.display()))
            })?;
            builder = builder.storage(Arc::new(medium));
        }

        Ok(builder)
    }
}

/// Load settings with automatic fallback strategy
///
/// First attempts environment variables; if `SESSIONKIT_CLIENT_ID` is
/// missing or a value is invalid, falls back to a config file.
///
/// # Errors
/// Returns [`AuthError::Config`] if neither source yields valid settings
pub fn load() -> Result<ClientSettings, AuthError> {
    match load_from_env() {
        Ok(settings) => {
            tracing::info!("Client settings loaded from environment variables");
            Ok(settings)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load settings from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load settings from environment variables
///
/// # Errors
/// Returns [`AuthError::Config`] if `SESSIONKIT_CLIENT_ID` is missing or a
/// numeric value does not parse
pub fn load_from_env() -> Result<ClientSettings, AuthError> {
    let client_id = env_var("SESSIONKIT_CLIENT_ID")?;
    let popup_timeout_secs = std::env::var("SESSIONKIT_POPUP_TIMEOUT_SECS")
        .ok()
        .map(|s| {
            s.parse::<u64>()
                .map_err(|e| AuthError::Config(format!("Invalid popup timeout: {e}")))
        })
        .transpose()?;

    Ok(ClientSettings {
        client_id,
        endpoint: std::env::var("SESSIONKIT_ENDPOINT").ok(),
        session_endpoint: std::env::var("SESSIONKIT_SESSION_ENDPOINT").ok(),
        as_popup: env_bool("SESSIONKIT_AS_POPUP", false),
        redirect_uri: std::env::var("SESSIONKIT_REDIRECT_URI").ok(),
        scope: std::env::var("SESSIONKIT_SCOPE").ok(),
        storage_path: std::env::var_os("SESSIONKIT_STORAGE_PATH").map(PathBuf::from),
        require_https: std::env::var("SESSIONKIT_REQUIRE_HTTPS").ok().map(|s| parse_bool(&s)),
        popup_timeout_secs,
    })
}

/// Load settings from a file
///
/// If `path` is `None`, probes the standard locations. JSON and TOML are
/// detected by extension.
///
/// # Errors
/// Returns [`AuthError::Config`] if the file is missing, unreadable or
/// invalid, or lacks a `client_id`
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientSettings, AuthError> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(AuthError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            AuthError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading client settings from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| AuthError::Config(format!("Failed to read config file: {e}")))?;

    let settings = parse_settings(&contents, &config_path)?;
    if settings.client_id.is_empty() {
        return Err(AuthError::Config(format!(
            "Missing client_id in {}",
            config_path.display()
        )));
    }
    Ok(settings)
}

fn parse_settings(contents: &str, path: &Path) -> Result<ClientSettings, AuthError> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| AuthError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| AuthError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(AuthError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a settings file
pub fn probe_config_paths() -> Option<PathBuf> {
    const NAMES: [&str; 4] = ["sessionkit.json", "sessionkit.toml", "config.json", "config.toml"];

    let mut dirs = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.clone());
        dirs.push(cwd.join(".."));
    }
    if let Some(exe_dir) =
        std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        dirs.push(exe_dir);
    }

    dirs.iter().flat_map(|dir| NAMES.iter().map(move |name| dir.join(name))).find(|p| p.exists())
}

fn env_var(key: &str) -> Result<String, AuthError> {
    std::env::var(key)
        .map_err(|_| AuthError::Config(format!("Missing required environment variable: {key}")))
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off`
/// (case-insensitive); `default` when unset
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key).ok().map_or(default, |s| parse_bool(&s))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use parking_lot::{const_mutex, Mutex};
    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Mutex<()> = const_mutex(());

    const ENV_KEYS: [&str; 9] = [
        "SESSIONKIT_CLIENT_ID",
        "SESSIONKIT_ENDPOINT",
        "SESSIONKIT_SESSION_ENDPOINT",
        "SESSIONKIT_AS_POPUP",
        "SESSIONKIT_REDIRECT_URI",
        "SESSIONKIT_SCOPE",
        "SESSIONKIT_STORAGE_PATH",
        "SESSIONKIT_REQUIRE_HTTPS",
        "SESSIONKIT_POPUP_TIMEOUT_SECS",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_builder_defaults() {
        let options = ClientOptions::defaults().unwrap();

        assert_eq!(options.endpoint.as_str(), DEFAULT_ENDPOINT);
        assert_eq!(options.scope, DEFAULT_SCOPE);
        assert!(!options.as_popup);
        assert!(options.require_https);
        assert_eq!(options.popup_timeout, None);
        assert_eq!(options.host.location().as_str(), DEFAULT_LOCATION);
    }

    #[test]
    fn test_builder_rejects_bad_endpoints() {
        let relative = ClientOptions::builder().endpoint("/api/auth").build();
        assert!(matches!(relative, Err(AuthError::Config(_))));

        let ftp = ClientOptions::builder().endpoint("ftp://idp.test/auth").build();
        assert!(matches!(ftp, Err(AuthError::Config(message)) if message.contains("ftp")));
    }

    #[test]
    fn test_load_from_env() {
        let _guard = ENV_LOCK.lock();
        clear_env();

        std::env::set_var("SESSIONKIT_CLIENT_ID", "app-1");
        std::env::set_var("SESSIONKIT_AS_POPUP", "yes");
        std::env::set_var("SESSIONKIT_REQUIRE_HTTPS", "off");
        std::env::set_var("SESSIONKIT_POPUP_TIMEOUT_SECS", "90");

        let settings = load_from_env().unwrap();
        assert_eq!(settings.client_id, "app-1");
        assert!(settings.as_popup);
        assert_eq!(settings.require_https, Some(false));
        assert_eq!(settings.popup_timeout_secs, Some(90));
        assert_eq!(settings.endpoint, None);

        std::env::set_var("SESSIONKIT_POPUP_TIMEOUT_SECS", "soon");
        assert!(matches!(load_from_env(), Err(AuthError::Config(_))));

        clear_env();
        assert!(matches!(load_from_env(), Err(AuthError::Config(_))));
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "client_id = \"app-2\"\nendpoint = \"https://idp.test/api/auth\"\nas_popup = true\nscope = \"read\""
        )
        .unwrap();

        let settings = load_from_file(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(settings.client_id, "app-2");
        assert_eq!(settings.endpoint.as_deref(), Some("https://idp.test/api/auth"));
        assert!(settings.as_popup);

        let options = settings.to_builder().unwrap().build().unwrap();
        assert_eq!(options.scope, "read");
        assert!(options.as_popup);
    }

    #[test]
    fn test_load_from_json_file_requires_client_id() {
        let mut file: NamedTempFile = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{{\"scope\":\"read\"}}").unwrap();

        let result = load_from_file(Some(file.path().to_path_buf()));
        assert!(matches!(result, Err(AuthError::Config(message)) if message.contains("client_id")));
    }

    #[test]
    fn test_storage_path_opens_file_medium() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ClientSettings {
            client_id: "app-3".into(),
            storage_path: Some(dir.path().join("session.json")),
            ..ClientSettings::default()
        };

        let options = settings.to_builder().unwrap().build().unwrap();
        options.storage.set_item("app-3--k", "v").unwrap();

        assert!(dir.path().join("session.json").exists());
    }
}
