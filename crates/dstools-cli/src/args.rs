//! Command-line arguments

use clap::{Args, Parser, Subcommand, ValueEnum};
use dstools_core::{
    AccessOperation, AclFlavor, ContentType, LocalConfig, S3Config, SshConfig, StorageConfig,
    StorageLocation, StorageOpError, StorageResult, StorageType, SSH_CONNECT_TIMEOUT_SECS,
};
use dstools_storage::resolve_request;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "dstools",
    version,
    about = "Storage metrics, listings and access checks for local, SSH and S3 locations"
)]
pub struct Cli {
    /// Log at DSTOOLS_LOG_LEVEL instead of warnings only
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Count regular files and total bytes under a location
    Analyze {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// List the immediate subdirectories or files of a location
    List {
        #[command(flatten)]
        target: TargetArgs,
        /// Content type to list: subdirectories or files
        #[arg(long = "type", value_name = "KIND", default_value = "subdirectories")]
        content_type: ContentType,
        /// Maximum number of items to return (defaults to DSTOOLS_MAX_ITEMS)
        #[arg(long)]
        max_items: Option<usize>,
    },
    /// Check whether a location can be read or written
    #[command(alias = "verify-permissions")]
    VerifyAccess {
        #[command(flatten)]
        target: TargetArgs,
        /// Operation to test: read or write
        #[arg(long, default_value = "read")]
        operation: AccessOperation,
        /// Principal to evaluate on local filesystems (defaults to the invoking user)
        #[arg(long)]
        user: Option<String>,
    },
    /// Run the operations listed in a JSON file
    Batch {
        /// JSON array of operations
        file: PathBuf,
        /// Skip operations that have not started once one fails
        #[arg(long)]
        fail_fast: bool,
    },
}

/// Location plus the connection options for every backend; only the ones relevant to
/// the resolved storage type are used.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Local path, ssh://[user@]host[:port]/path, [user@]host:/path or s3://bucket/prefix
    pub location: String,

    /// Storage type: local, nfs, nfs4, ssh or s3 (inferred from the location when omitted)
    #[arg(short = 't', long)]
    pub storage_type: Option<String>,

    /// SSH hostname (for remote paths)
    #[arg(long, help_heading = "SSH")]
    pub hostname: Option<String>,
    /// SSH username (for remote paths)
    #[arg(long, help_heading = "SSH")]
    pub username: Option<String>,
    /// Path to the SSH private key
    #[arg(long, value_name = "PATH", help_heading = "SSH")]
    pub ssh_key: Option<PathBuf>,
    /// SSH port
    #[arg(long, help_heading = "SSH")]
    pub port: Option<u16>,

    /// AWS access key ID
    #[arg(long, help_heading = "S3")]
    pub access_key_id: Option<String>,
    /// AWS secret access key
    #[arg(long, help_heading = "S3")]
    pub secret_access_key: Option<String>,
    /// AWS session token (requires an explicit key pair)
    #[arg(long, help_heading = "S3")]
    pub session_token: Option<String>,
    /// AWS region
    #[arg(long, help_heading = "S3")]
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible providers
    #[arg(long, help_heading = "S3")]
    pub endpoint_url: Option<String>,
    /// Named profile from the shared AWS config files
    #[arg(long, help_heading = "S3")]
    pub aws_profile: Option<String>,

    /// Operation timeout in seconds (defaults to DSTOOLS_DEFAULT_TIMEOUT_SECS)
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,
}

impl TargetArgs {
    /// Build the location and configuration. `fs_user` is the principal for local ACL
    /// checks.
    pub fn resolve(
        &self,
        fs_user: Option<String>,
    ) -> StorageResult<(StorageLocation, StorageConfig)> {
        let selector = self.storage_type.as_deref();
        let storage_type = match selector {
            Some(selector) => selector.parse::<StorageType>()?,
            None => StorageLocation::infer_type(self.location.trim())?,
        };
        let acl_flavor = selector.map(AclFlavor::from_selector).unwrap_or_default();

        let config = match storage_type {
            StorageType::Local => StorageConfig::Local(LocalConfig {
                username: fs_user,
                acl_flavor,
            }),
            StorageType::Ssh => {
                let key_path = self.ssh_key.clone().ok_or_else(|| {
                    StorageOpError::InvalidCredentials(
                        "SSH storage requires --ssh-key".to_string(),
                    )
                })?;
                StorageConfig::Ssh(SshConfig {
                    hostname: self.hostname.clone(),
                    username: self.username.clone(),
                    key_path,
                    port: self.port,
                    acl_flavor,
                    connect_timeout_secs: SSH_CONNECT_TIMEOUT_SECS,
                })
            }
            StorageType::S3 => StorageConfig::S3(S3Config {
                access_key_id: self.access_key_id.clone(),
                secret_access_key: self.secret_access_key.clone(),
                session_token: self.session_token.clone(),
                region: self.region.clone(),
                endpoint_url: self.endpoint_url.clone(),
                profile: self.aws_profile.clone(),
            }),
        };

        resolve_request(&self.location, selector, Some(config))
    }

    pub fn timeout(&self, default: Duration) -> StorageResult<Duration> {
        match self.timeout {
            Some(0) => Err(StorageOpError::Validation(
                "--timeout must be greater than zero".to_string(),
            )),
            Some(secs) => Ok(Duration::from_secs(secs)),
            None => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dstools_core::ErrorKind;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args.iter().copied()).unwrap()
    }

    #[test]
    fn verify_permissions_is_an_alias() {
        let cli = parse(&["dstools", "verify-permissions", "/data", "--operation", "write"]);
        match cli.command {
            Command::VerifyAccess { operation, .. } => {
                assert_eq!(operation, AccessOperation::Write)
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn list_type_and_global_output() {
        let cli = parse(&["dstools", "list", "s3://b/p", "--type", "files", "--output", "json"]);
        assert_eq!(cli.output, OutputFormat::Json);
        match cli.command {
            Command::List { content_type, .. } => assert_eq!(content_type, ContentType::Files),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn unknown_content_type_is_rejected() {
        assert!(Cli::try_parse_from(["dstools", "list", "/data", "--type", "links"]).is_err());
    }

    #[test]
    fn ssh_requires_a_key() {
        let target = TargetArgs {
            location: "/srv/data".to_string(),
            storage_type: Some("ssh".to_string()),
            hostname: Some("files.internal".to_string()),
            username: Some("svc".to_string()),
            ..TargetArgs::default()
        };
        let err = target.resolve(None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
    }

    #[test]
    fn ssh_flags_fill_the_configuration() {
        let target = TargetArgs {
            location: "/srv/data".to_string(),
            storage_type: Some("ssh".to_string()),
            hostname: Some("files.internal".to_string()),
            username: Some("svc".to_string()),
            ssh_key: Some(PathBuf::from("/home/svc/.ssh/id_ed25519")),
            port: Some(2222),
            ..TargetArgs::default()
        };
        let (location, config) = target.resolve(None).unwrap();
        let StorageConfig::Ssh(ssh) = config else {
            panic!("expected an SSH configuration");
        };
        let (resolved, path) = ssh.target_for(&location).unwrap();
        assert_eq!(resolved.hostname, "files.internal");
        assert_eq!(resolved.port, 2222);
        assert_eq!(path, "/srv/data");
    }

    #[test]
    fn nfs4_selector_uses_nfs4_acls() {
        let target = TargetArgs {
            location: "/mnt/share".to_string(),
            storage_type: Some("nfs4".to_string()),
            ..TargetArgs::default()
        };
        let (location, config) = target.resolve(Some("alice".to_string())).unwrap();
        assert_eq!(location.storage_type(), StorageType::Local);
        let StorageConfig::Local(local) = config else {
            panic!("expected a local configuration");
        };
        assert_eq!(local.acl_flavor, AclFlavor::Nfs4);
        assert_eq!(local.username.as_deref(), Some("alice"));
    }

    #[test]
    fn zero_timeout_is_invalid() {
        let target = TargetArgs {
            timeout: Some(0),
            ..TargetArgs::default()
        };
        let err = target.timeout(Duration::from_secs(300)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
