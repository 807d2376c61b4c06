//! ACL evaluation for filesystem read checks
//!
//! Read access to a directory needs both `r` (list entries) and `x` (traverse).
//!
//! POSIX (`getfacl`): the owner is judged by `user::`, a named `user:<name>:` entry is
//! limited by `mask::`, anyone else falls through to `other::`. Group membership is not
//! resolved, so a grant that only arrives through a group is reported as denied.
//!
//! NFSv4 (`nfs4_getfacl`): ACEs are walked in order; for each required bit the first
//! `A` (allow) or `D` (deny) entry that names the user, `user@domain`, or `EVERYONE@`
//! decides it. `OWNER@` applies when a `# owner:` header line names the user. Bits no
//! entry decides are denied.

const REQUIRED: [char; 2] = ['r', 'x'];

/// Outcome of evaluating one principal against an ACL listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclDecision {
    pub granted: bool,
    /// Human-readable account of which entries decided the outcome.
    pub reason: String,
}

impl AclDecision {
    fn new(granted: bool, reason: impl Into<String>) -> Self {
        Self {
            granted,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Default)]
struct PosixAcl {
    owner: Option<String>,
    owner_perms: Option<String>,
    named_users: Vec<(String, String)>,
    mask: Option<String>,
    other: Option<String>,
}

fn owner_line(output: &str) -> Option<&str> {
    output
        .lines()
        .find_map(|line| line.trim().strip_prefix("# owner:"))
        .map(str::trim)
        .filter(|owner| !owner.is_empty())
}

fn parse_posix(output: &str) -> PosixAcl {
    let mut acl = PosixAcl {
        owner: owner_line(output).map(str::to_string),
        ..PosixAcl::default()
    };
    for raw in output.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("default:") {
            continue;
        }
        // Drop "#effective:r-x" annotations.
        let entry = line.split('#').next().unwrap_or("").trim();
        let mut parts = entry.splitn(3, ':');
        let (Some(tag), Some(qualifier), Some(perms)) = (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        let perms = perms.trim().to_string();
        match (tag, qualifier) {
            ("user", "") => acl.owner_perms = Some(perms),
            ("user", name) => acl.named_users.push((name.to_string(), perms)),
            ("mask", _) => acl.mask = Some(perms),
            ("other", _) => acl.other = Some(perms),
            _ => {}
        }
    }
    acl
}

fn grants(perms: &str, bit: char) -> bool {
    perms.contains(bit)
}

fn describe_missing(perms: &str) -> String {
    let missing: Vec<String> = REQUIRED
        .iter()
        .filter(|bit| !grants(perms, **bit))
        .map(|bit| bit.to_string())
        .collect();
    missing.join("")
}

/// Evaluate read access for `username` against `getfacl` output.
pub fn evaluate_posix(output: &str, username: &str) -> AclDecision {
    let acl = parse_posix(output);

    let (entry, effective) = if acl.owner.as_deref() == Some(username) {
        let perms = acl.owner_perms.clone().unwrap_or_default();
        (format!("user:: (owner {})", username), perms)
    } else if let Some((name, perms)) = acl.named_users.iter().find(|(name, _)| name == username)
    {
        match &acl.mask {
            Some(mask) => {
                let masked: String = perms
                    .chars()
                    .filter(|c| *c != '-' && mask.contains(*c))
                    .collect();
                (format!("user:{}:{} masked by mask::{}", name, perms, mask), masked)
            }
            None => (format!("user:{}:{}", name, perms), perms.clone()),
        }
    } else {
        let perms = acl.other.clone().unwrap_or_default();
        (format!("other::{}", perms), perms)
    };

    let missing = describe_missing(&effective);
    if missing.is_empty() {
        AclDecision::new(true, format!("granted by {}", entry))
    } else {
        AclDecision::new(
            false,
            format!("{} lacks '{}' needed to read the directory", entry, missing),
        )
    }
}

#[derive(Debug)]
struct Ace<'a> {
    kind: &'a str,
    flags: &'a str,
    principal: &'a str,
    perms: &'a str,
}

fn parse_nfs4(output: &str) -> Vec<Ace<'_>> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let mut parts = line.splitn(4, ':');
            Some(Ace {
                kind: parts.next()?,
                flags: parts.next()?,
                principal: parts.next()?,
                perms: parts.next()?,
            })
        })
        .collect()
}

fn ace_applies(ace: &Ace<'_>, username: &str, owner: Option<&str>) -> bool {
    match ace.principal {
        "EVERYONE@" => return true,
        "OWNER@" => return owner == Some(username),
        _ => {}
    }
    // Group ACEs need membership resolution.
    if ace.flags.contains('g') {
        return false;
    }
    ace.principal == username
        || ace
            .principal
            .split_once('@')
            .is_some_and(|(name, domain)| name == username && !domain.is_empty())
}

/// Evaluate read access for `username` against `nfs4_getfacl` output.
pub fn evaluate_nfs4(output: &str, username: &str) -> AclDecision {
    let aces = parse_nfs4(output);
    let owner = owner_line(output);
    let mut decided: Vec<(char, bool, String)> = Vec::new();

    for bit in REQUIRED {
        let decision = aces
            .iter()
            .filter(|ace| ace_applies(ace, username, owner) && ace.perms.contains(bit))
            .find_map(|ace| {
                let allowed = match ace.kind {
                    "A" => true,
                    "D" => false,
                    // Audit and alarm entries never grant or deny.
                    _ => return None,
                };
                let text = format!("{}:{}:{}:{}", ace.kind, ace.flags, ace.principal, ace.perms);
                Some((allowed, text))
            });
        match decision {
            Some((allowed, ace)) => decided.push((bit, allowed, ace)),
            None => decided.push((bit, false, "no matching ACE".to_string())),
        }
    }

    if decided.iter().all(|(_, allowed, _)| *allowed) {
        let aces: Vec<&str> = decided.iter().map(|(_, _, ace)| ace.as_str()).collect();
        AclDecision::new(true, format!("granted by {}", aces.join(", ")))
    } else {
        let denied: Vec<String> = decided
            .iter()
            .filter(|(_, allowed, _)| !allowed)
            .map(|(bit, _, ace)| format!("'{}' ({})", bit, ace))
            .collect();
        AclDecision::new(
            false,
            format!("{} not granted to {}", denied.join(", "), username),
        )
    }
}
