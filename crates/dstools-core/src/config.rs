//! Configuration module
//!
//! Storage configuration is a single sum type, [`StorageConfig`], with one payload per
//! backend. Validation happens once, in [`StorageConfig::validate`]; nothing downstream
//! re-checks field presence. Process-level settings come from the environment via
//! [`Settings::from_env`].

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{StorageOpError, StorageResult};
use crate::location::{LocationTarget, StorageLocation};
use crate::storage_types::{AclFlavor, StorageType};

pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_S3_REGION: &str = "us-east-1";

pub const SSH_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_MAX_ITEMS: usize = 1000;
const BATCH_MAX_OPERATIONS: usize = 10;

/// Storage configuration, tagged by backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    Local(LocalConfig),
    Ssh(SshConfig),
    S3(S3Config),
}

impl StorageConfig {
    pub fn local() -> Self {
        StorageConfig::Local(LocalConfig::default())
    }

    pub fn storage_type(&self) -> StorageType {
        match self {
            StorageConfig::Local(_) => StorageType::Local,
            StorageConfig::Ssh(_) => StorageType::Ssh,
            StorageConfig::S3(_) => StorageType::S3,
        }
    }

    /// Check required fields for the selected backend. Performs no I/O.
    pub fn validate(&self) -> StorageResult<()> {
        match self {
            StorageConfig::Local(local) => local.validate(),
            StorageConfig::Ssh(ssh) => ssh.validate(),
            StorageConfig::S3(s3) => {
                s3.auth_strategy()?;
                s3.validate()
            }
        }
    }
}

/// Local filesystem configuration. Carries no secrets.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocalConfig {
    /// Principal whose access is evaluated; defaults to the invoking user.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub acl_flavor: AclFlavor,
}

impl LocalConfig {
    fn validate(&self) -> StorageResult<()> {
        if let Some(username) = &self.username {
            validate_principal(username)?;
        }
        Ok(())
    }
}

/// SSH remote filesystem configuration.
///
/// Hostname and username may be omitted when the location (`ssh://user@host/path`)
/// carries them; values set here take precedence over the location.
#[derive(Debug, Clone, Deserialize)]
pub struct SshConfig {
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    /// Path to the private key on this machine (not key material).
    pub key_path: PathBuf,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub acl_flavor: AclFlavor,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_connect_timeout() -> u64 {
    SSH_CONNECT_TIMEOUT_SECS
}

/// Fully resolved SSH endpoint for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub hostname: String,
    pub username: String,
    pub port: u16,
    pub key_path: PathBuf,
    pub connect_timeout: Duration,
    pub acl_flavor: AclFlavor,
}

impl SshConfig {
    pub fn new(
        hostname: impl Into<String>,
        username: impl Into<String>,
        key_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            hostname: Some(hostname.into()),
            username: Some(username.into()),
            key_path: key_path.into(),
            port: None,
            acl_flavor: AclFlavor::default(),
            connect_timeout_secs: SSH_CONNECT_TIMEOUT_SECS,
        }
    }

    fn validate(&self) -> StorageResult<()> {
        if self.key_path.as_os_str().is_empty() {
            return Err(StorageOpError::InvalidCredentials(
                "SSH configuration requires a private key path".to_string(),
            ));
        }
        if matches!(&self.hostname, Some(h) if h.trim().is_empty()) {
            return Err(StorageOpError::InvalidCredentials(
                "SSH hostname must not be empty".to_string(),
            ));
        }
        if let Some(username) = &self.username {
            validate_principal(username).map_err(|e| {
                StorageOpError::InvalidCredentials(format!("SSH username: {}", e.detail()))
            })?;
        }
        if self.port == Some(0) {
            return Err(StorageOpError::InvalidCredentials(
                "SSH port must be between 1 and 65535".to_string(),
            ));
        }
        if self.connect_timeout_secs == 0 {
            return Err(StorageOpError::InvalidCredentials(
                "SSH connect timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }

    /// Merge this configuration with an SSH location into a target and remote path.
    pub fn target_for(&self, location: &StorageLocation) -> StorageResult<(SshTarget, String)> {
        let LocationTarget::Ssh {
            hostname,
            username,
            port,
            path,
        } = location.target()
        else {
            return Err(StorageOpError::Validation(format!(
                "location '{}' is not an SSH location",
                location
            )));
        };

        let hostname = self
            .hostname
            .clone()
            .or_else(|| hostname.clone())
            .ok_or_else(|| {
                StorageOpError::InvalidCredentials(
                    "SSH operations require a hostname (in the location or configuration)"
                        .to_string(),
                )
            })?;
        let username = self
            .username
            .clone()
            .or_else(|| username.clone())
            .ok_or_else(|| {
                StorageOpError::InvalidCredentials(
                    "SSH operations require a username (in the location or configuration)"
                        .to_string(),
                )
            })?;

        check_destination_part("hostname", &hostname)?;
        check_destination_part("username", &username)?;

        let target = SshTarget {
            hostname,
            username,
            port: self.port.or(*port).unwrap_or(DEFAULT_SSH_PORT),
            key_path: self.key_path.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            acl_flavor: self.acl_flavor,
        };
        Ok((target, path.clone()))
    }
}

/// S3-compatible object storage configuration.
#[derive(Clone, Default, Deserialize)]
pub struct S3Config {
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    #[serde(default)]
    pub session_token: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible providers (MinIO, Ceph, DigitalOcean Spaces, ...)
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// Named profile from the shared AWS config files.
    #[serde(default)]
    pub profile: Option<String>,
}

// Secrets stay out of logs.
impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("profile", &self.profile)
            .finish()
    }
}

/// The single authentication strategy an [`S3Config`] resolves to.
#[derive(Clone, PartialEq, Eq)]
pub enum S3AuthStrategy {
    Explicit {
        access_key_id: String,
        secret_access_key: String,
        session_token: Option<String>,
    },
    Profile(String),
    /// Environment variables, instance/task role, or any other default-chain source.
    Ambient,
}

impl fmt::Debug for S3AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            S3AuthStrategy::Explicit { access_key_id, .. } => f
                .debug_struct("Explicit")
                .field("access_key_id", access_key_id)
                .finish_non_exhaustive(),
            S3AuthStrategy::Profile(name) => f.debug_tuple("Profile").field(name).finish(),
            S3AuthStrategy::Ambient => f.write_str("Ambient"),
        }
    }
}

impl S3AuthStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            S3AuthStrategy::Explicit { .. } => "explicit",
            S3AuthStrategy::Profile(_) => "profile",
            S3AuthStrategy::Ambient => "ambient",
        }
    }
}

impl S3Config {
    pub fn region(&self) -> &str {
        self.region
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or(DEFAULT_S3_REGION)
    }

    /// Resolve the active strategy: explicit credentials > named profile > ambient.
    pub fn auth_strategy(&self) -> StorageResult<S3AuthStrategy> {
        let key = non_empty(&self.access_key_id);
        let secret = non_empty(&self.secret_access_key);
        let token = non_empty(&self.session_token);

        match (key, secret) {
            (Some(access_key_id), Some(secret_access_key)) => Ok(S3AuthStrategy::Explicit {
                access_key_id: access_key_id.to_string(),
                secret_access_key: secret_access_key.to_string(),
                session_token: token.map(str::to_string),
            }),
            (Some(_), None) => Err(StorageOpError::InvalidCredentials(
                "S3 access key id supplied without a secret access key".to_string(),
            )),
            (None, Some(_)) => Err(StorageOpError::InvalidCredentials(
                "S3 secret access key supplied without an access key id".to_string(),
            )),
            (None, None) if token.is_some() => Err(StorageOpError::InvalidCredentials(
                "S3 session token requires an access key id and secret access key".to_string(),
            )),
            (None, None) => Ok(match non_empty(&self.profile) {
                Some(profile) => S3AuthStrategy::Profile(profile.to_string()),
                None => S3AuthStrategy::Ambient,
            }),
        }
    }

    fn validate(&self) -> StorageResult<()> {
        if let Some(endpoint) = non_empty(&self.endpoint_url) {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(StorageOpError::InvalidCredentials(format!(
                    "S3 endpoint '{}' must start with http:// or https://",
                    endpoint
                )));
            }
        }
        Ok(())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn validate_principal(username: &str) -> StorageResult<()> {
    if username.trim().is_empty() {
        return Err(StorageOpError::InvalidCredentials(
            "username must not be empty".to_string(),
        ));
    }
    if username.starts_with('-')
        || username
            .chars()
            .any(|c| c.is_whitespace() || c == ':' || c == '\'' || c == '"')
    {
        return Err(StorageOpError::InvalidCredentials(format!(
            "username '{}' contains invalid characters",
            username
        )));
    }
    Ok(())
}

/// Reject SSH destination parts that `ssh` could read as an option or split apart.
fn check_destination_part(field: &str, value: &str) -> StorageResult<()> {
    if value.is_empty() {
        return Err(StorageOpError::InvalidCredentials(format!(
            "SSH {} must not be empty",
            field
        )));
    }
    if value.starts_with('-') || value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(StorageOpError::InvalidCredentials(format!(
            "SSH {} '{}' is not allowed",
            field,
            value.escape_debug()
        )));
    }
    Ok(())
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Process settings read from `DSTOOLS_*` environment variables.
#[derive(Clone, Debug)]
pub struct Settings {
    pub log_level: String,
    pub log_format: LogFormat,
    pub default_timeout_secs: u64,
    pub max_items: usize,
    pub batch_max_operations: usize,
    pub bind_addr: String,
    pub environment: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_items: DEFAULT_MAX_ITEMS,
            batch_max_operations: BATCH_MAX_OPERATIONS,
            bind_addr: "127.0.0.1:8080".to_string(),
            environment: "development".to_string(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let defaults = Settings::default();

        let log_format = match env::var("DSTOOLS_LOG_FORMAT")
            .unwrap_or_else(|_| "text".to_string())
            .to_lowercase()
            .as_str()
        {
            "json" => LogFormat::Json,
            "text" | "pretty" => LogFormat::Text,
            other => {
                return Err(anyhow::anyhow!(
                    "DSTOOLS_LOG_FORMAT must be 'text' or 'json', got '{}'",
                    other
                ))
            }
        };

        let settings = Settings {
            log_level: env::var("DSTOOLS_LOG_LEVEL")
                .unwrap_or(defaults.log_level)
                .to_lowercase(),
            log_format,
            default_timeout_secs: env::var("DSTOOLS_DEFAULT_TIMEOUT_SECS")
                .unwrap_or_else(|_| DEFAULT_TIMEOUT_SECS.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DSTOOLS_DEFAULT_TIMEOUT_SECS must be a number"))?,
            max_items: env::var("DSTOOLS_MAX_ITEMS")
                .unwrap_or_else(|_| DEFAULT_MAX_ITEMS.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DSTOOLS_MAX_ITEMS must be a number"))?,
            batch_max_operations: env::var("DSTOOLS_BATCH_MAX_OPERATIONS")
                .unwrap_or_else(|_| BATCH_MAX_OPERATIONS.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DSTOOLS_BATCH_MAX_OPERATIONS must be a number"))?,
            bind_addr: env::var("DSTOOLS_BIND_ADDR").unwrap_or(defaults.bind_addr),
            environment: env::var("DSTOOLS_ENVIRONMENT").unwrap_or(defaults.environment),
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.default_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "DSTOOLS_DEFAULT_TIMEOUT_SECS must be greater than zero"
            ));
        }
        if self.max_items == 0 {
            return Err(anyhow::anyhow!("DSTOOLS_MAX_ITEMS must be greater than zero"));
        }
        if !(1..=100).contains(&self.batch_max_operations) {
            return Err(anyhow::anyhow!(
                "DSTOOLS_BATCH_MAX_OPERATIONS must be between 1 and 100"
            ));
        }
        Ok(())
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment.to_lowercase().as_str(), "production" | "prod")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn explicit_credentials_win_over_profile() {
        let config = S3Config {
            access_key_id: Some("AKIAEXAMPLE".to_string()),
            secret_access_key: Some("secret".to_string()),
            profile: Some("dev".to_string()),
            ..Default::default()
        };
        assert_eq!(config.auth_strategy().unwrap().name(), "explicit");
    }

    #[test]
    fn profile_wins_over_ambient() {
        let config = S3Config {
            profile: Some("analytics".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.auth_strategy().unwrap(),
            S3AuthStrategy::Profile("analytics".to_string())
        );
        assert_eq!(
            S3Config::default().auth_strategy().unwrap(),
            S3AuthStrategy::Ambient
        );
    }

    #[test]
    fn partial_explicit_credentials_are_invalid() {
        let config = S3Config {
            access_key_id: Some("AKIAEXAMPLE".to_string()),
            ..Default::default()
        };
        let err = config.auth_strategy().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCredentials);

        let token_only = S3Config {
            session_token: Some("token".to_string()),
            ..Default::default()
        };
        assert_eq!(
            token_only.auth_strategy().unwrap_err().kind(),
            ErrorKind::InvalidCredentials
        );
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = S3Config {
            access_key_id: Some("AKIAEXAMPLE".to_string()),
            secret_access_key: Some("very-secret".to_string()),
            session_token: Some("token-value".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?} {:?}", config, config.auth_strategy().unwrap());
        assert!(!debug.contains("very-secret"));
        assert!(!debug.contains("token-value"));
        assert!(debug.contains("AKIAEXAMPLE"));
    }

    #[test]
    fn region_defaults_to_us_east_1() {
        assert_eq!(S3Config::default().region(), DEFAULT_S3_REGION);
    }

    #[test]
    fn bad_endpoint_is_rejected() {
        let config = StorageConfig::S3(S3Config {
            endpoint_url: Some("localhost:9000".to_string()),
            ..Default::default()
        });
        assert_eq!(
            config.validate().unwrap_err().kind(),
            ErrorKind::InvalidCredentials
        );
    }

    #[test]
    fn ssh_target_merges_location_and_config() {
        let location = StorageLocation::parse("ssh://alice@files.example.com:2222/srv").unwrap();
        let config = SshConfig {
            hostname: None,
            username: Some("svc".to_string()),
            key_path: PathBuf::from("/keys/id_ed25519"),
            port: None,
            acl_flavor: AclFlavor::Nfs4,
            connect_timeout_secs: 10,
        };
        let (target, path) = config.target_for(&location).unwrap();
        assert_eq!(target.hostname, "files.example.com");
        assert_eq!(target.username, "svc");
        assert_eq!(target.port, 2222);
        assert_eq!(path, "/srv");
    }

    #[test]
    fn option_like_destination_parts_are_rejected() {
        let config = SshConfig::new("files.example.com", "svc", "/keys/id_ed25519");
        let config = SshConfig {
            hostname: None,
            username: None,
            ..config
        };
        for raw in [
            "ssh://-oProxyCommand=touch marker;false@host/srv",
            "ssh://svc@-oProxyCommand=true/srv",
            "-Fcfg@host:/srv",
        ] {
            let location = StorageLocation::parse(raw).unwrap();
            let err = config.target_for(&location).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidCredentials, "{}", raw);
        }

        let configured = SshConfig::new("files.example.com", "-lroot", "/keys/id_ed25519");
        assert_eq!(
            StorageConfig::Ssh(configured).validate().unwrap_err().kind(),
            ErrorKind::InvalidCredentials
        );
    }

    #[test]
    fn ssh_target_without_host_is_invalid() {
        let location = StorageLocation::resolve("/srv", Some(StorageType::Ssh)).unwrap();
        let config = SshConfig {
            hostname: None,
            username: Some("svc".to_string()),
            key_path: PathBuf::from("/keys/id"),
            port: None,
            acl_flavor: AclFlavor::Posix,
            connect_timeout_secs: 30,
        };
        let err = config.target_for(&location).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
    }

    #[test]
    fn config_deserializes_from_tagged_json() {
        let config: StorageConfig = serde_json::from_str(
            r#"{"type":"ssh","hostname":"h","username":"u","key_path":"/k"}"#,
        )
        .unwrap();
        assert_eq!(config.storage_type(), StorageType::Ssh);
        assert!(config.validate().is_ok());

        let local: StorageConfig =
            serde_json::from_str(r#"{"type":"local","acl_flavor":"nfs4"}"#).unwrap();
        assert!(matches!(
            local,
            StorageConfig::Local(LocalConfig {
                acl_flavor: AclFlavor::Nfs4,
                ..
            })
        ));
    }

    #[test]
    fn default_settings_are_valid() {
        assert!(Settings::default().validate().is_ok());
        let bad = Settings {
            batch_max_operations: 0,
            ..Settings::default()
        };
        assert!(bad.validate().is_err());
    }
}
