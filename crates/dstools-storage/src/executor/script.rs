//! Remote shell scripts for the SSH backend
//!
//! Every script starts with the same preflight so the exit-status convention in
//! [`super`] holds on the remote side too.

use dstools_core::{AclFlavor, ContentType};

use super::{
    StorageCommand, EXIT_NOT_A_DIRECTORY, EXIT_NOT_FOUND, EXIT_PERMISSION_DENIED, EXIT_TOOL_MISSING,
};

/// Quote a value for POSIX `sh`.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn preflight(path: &str) -> String {
    format!(
        "p={path}; \
         [ -e \"$p\" ] || {{ echo \"no such file or directory: $p\" >&2; exit {not_found}; }}; \
         [ -d \"$p\" ] || {{ echo \"not a directory: $p\" >&2; exit {not_dir}; }}; \
         [ -r \"$p\" ] && [ -x \"$p\" ] || {{ echo \"permission denied: $p\" >&2; exit {denied}; }}; ",
        path = shell_quote(path),
        not_found = EXIT_NOT_FOUND,
        not_dir = EXIT_NOT_A_DIRECTORY,
        denied = EXIT_PERMISSION_DENIED,
    )
}

/// Render the remote command for a [`StorageCommand`].
///
/// `find -H` follows a symlinked root, as the local walk does, but no symlink below
/// it. Unreadable subtrees are dropped with their stderr.
pub fn render_remote_script(command: &StorageCommand) -> String {
    match command {
        StorageCommand::Metrics { path } => format!(
            "{}find -H \"$p\" -type f -printf '%s\\n' 2>/dev/null \
             | awk '{{ n += 1; s += $1 }} END {{ printf \"%d,%.0f\\n\", n, s }}'",
            preflight(path)
        ),
        StorageCommand::ListChildren {
            path,
            content_type,
            limit,
        } => {
            let kind = match content_type {
                ContentType::Subdirectories => "d",
                ContentType::Files => "f",
            };
            format!(
                "{}find -H \"$p\" -mindepth 1 -maxdepth 1 -type {} -printf '%f\\n' 2>/dev/null | head -n {}",
                preflight(path),
                kind,
                limit
            )
        }
        StorageCommand::Acl { path, flavor } => {
            let tool = flavor.tool();
            let invocation = match flavor {
                AclFlavor::Posix => format!("{} -p \"$p\"", tool),
                // nfs4_getfacl does not print the owner that OWNER@ refers to.
                AclFlavor::Nfs4 => format!(
                    "printf '# owner: %s\\n' \"$(stat -c %U \"$p\" 2>/dev/null)\"; {} \"$p\"",
                    tool
                ),
            };
            format!(
                "command -v {tool} >/dev/null 2>&1 || {{ echo \"{tool}: not installed\" >&2; exit {missing}; }}; {pre}{invocation}",
                tool = tool,
                missing = EXIT_TOOL_MISSING,
                pre = preflight(path),
                invocation = invocation,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_survives_single_quotes() {
        assert_eq!(shell_quote("/data/o'brien"), r"'/data/o'\''brien'");
        assert_eq!(shell_quote("/a b/$(rm -rf)"), "'/a b/$(rm -rf)'");
    }

    #[test]
    fn listing_script_is_capped() {
        let script = render_remote_script(&StorageCommand::ListChildren {
            path: "/srv".to_string(),
            content_type: ContentType::Files,
            limit: 11,
        });
        assert!(script.contains("-type f"));
        assert!(script.ends_with("head -n 11"));
        assert!(script.starts_with("p='/srv';"));
        assert!(script.contains("find -H \"$p\""));
    }

    #[test]
    fn metrics_script_follows_only_the_root_link() {
        let script = render_remote_script(&StorageCommand::Metrics {
            path: "/srv/link".to_string(),
        });
        assert!(script.contains("find -H \"$p\" -type f"));
    }

    #[test]
    fn acl_script_checks_for_tool() {
        let script = render_remote_script(&StorageCommand::Acl {
            path: "/srv".to_string(),
            flavor: AclFlavor::Nfs4,
        });
        assert!(script.starts_with("command -v nfs4_getfacl"));
        assert!(script.contains("exit 127"));
        assert!(script.ends_with("nfs4_getfacl \"$p\""));
        assert!(script.contains("printf '# owner: %s\\n' \"$(stat -c %U \"$p\" 2>/dev/null)\""));
    }
}
