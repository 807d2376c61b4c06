//! Request resolution shared by every front end (batch, HTTP, CLI).

use dstools_core::{
    AclFlavor, S3Config, StorageConfig, StorageLocation, StorageOpError, StorageResult,
    StorageType,
};

/// Turn a raw location, an optional type selector and an optional configuration into
/// a resolved location and the configuration to use for it.
///
/// A missing configuration defaults to ambient access for local and S3 locations; SSH
/// always needs a key. The `nfs4` selector switches a local configuration to NFSv4 ACLs.
pub fn resolve_request(
    location: &str,
    selector: Option<&str>,
    config: Option<StorageConfig>,
) -> StorageResult<(StorageLocation, StorageConfig)> {
    let explicit = selector.map(str::parse::<StorageType>).transpose()?;
    let location = StorageLocation::resolve(location, explicit)?;

    let mut config = match config {
        Some(config) => config,
        None => match location.storage_type() {
            StorageType::Local => StorageConfig::local(),
            StorageType::S3 => StorageConfig::S3(S3Config::default()),
            StorageType::Ssh => {
                return Err(StorageOpError::InvalidCredentials(
                    "SSH locations require a configuration with a private key path".to_string(),
                ))
            }
        },
    };

    if let (Some(selector), StorageConfig::Local(local)) = (selector, &mut config) {
        if AclFlavor::from_selector(selector) == AclFlavor::Nfs4 {
            local.acl_flavor = AclFlavor::Nfs4;
        }
    }

    Ok((location, config))
}
