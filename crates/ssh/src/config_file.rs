//! Edits of the SSH client config file.
//!
//! Blocks are appended at the end of the file and removed by alias. Removal
//! rewrites the whole file with blank-line runs collapsed to one and the last
//! line terminated, so that the next appended block gets exactly one blank
//! separator.

use crate::error::SshError;
use ssh2_config::{ParseRule, SshConfig};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::Path;

/// The stanza written for one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostBlock {
    pub alias: String,
    pub user: String,
    pub hostname: String,
    pub proxy_jump: Option<String>,
}

impl fmt::Display for HostBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Host {}", self.alias)?;
        writeln!(f, " User {}", self.user)?;
        writeln!(f, " HostName {}", self.hostname)?;
        if let Some(jump) = self.proxy_jump.as_deref().filter(|j| !j.is_empty()) {
            writeln!(f, " ProxyJump {jump}")?;
        }
        Ok(())
    }
}

/// Appends `block` after a blank separator line.
///
/// No check is made for an existing block with the same alias.
///
/// # Errors
///
/// Returns an error if the file cannot be read or written.
pub fn append_block(path: &Path, block: &HostBlock) -> Result<(), SshError> {
    let existing = if path.exists() {
        fs::read_to_string(path)?
    } else {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        String::new()
    };

    let mut text = String::new();
    if !existing.is_empty() && !existing.ends_with('\n') {
        text.push('\n');
    }
    text.push('\n');
    text.push_str(&block.to_string());

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(text.as_bytes())?;

    tracing::debug!(alias = %block.alias, path = %path.display(), "appended SSH config block");
    Ok(())
}

/// Removes the block of `alias` from the file, normalizing blank lines.
///
/// A missing file or an unknown alias only normalizes the content.
///
/// # Errors
///
/// Returns an error if the file cannot be read or written.
pub fn remove_block(path: &Path, alias: &str) -> Result<(), SshError> {
    if !path.exists() {
        return Ok(());
    }

    let content = fs::read_to_string(path)?;
    fs::write(path, strip_block(&content, alias))?;

    tracing::debug!(alias, path = %path.display(), "removed SSH config block");
    Ok(())
}

/// Returns `content` without the block of `alias`.
///
/// A block starts at the line `Host <alias>` and ends before the next `Host`
/// line or blank line. Runs of blank lines are collapsed to one, and the
/// result never ends with an empty line.
pub fn strip_block(content: &str, alias: &str) -> String {
    let (mut kept, _) = split_block(content, alias);

    if kept.last().is_none_or(|last| !last.is_empty()) {
        kept.push("");
    }

    kept.join("\n")
}

/// Returns the lines [`strip_block`] would remove for `alias`.
pub fn block_lines<'a>(content: &'a str, alias: &str) -> Vec<&'a str> {
    split_block(content, alias).1
}

/// Whether `lines` hold nothing but what a [`HostBlock`] writes.
pub fn is_written_block(lines: &[&str]) -> bool {
    lines.iter().all(|line| {
        line.split_whitespace()
            .next()
            .is_some_and(|keyword| BLOCK_KEYWORDS.contains(&keyword))
    })
}

/// Keywords of the lines written by [`HostBlock`].
const BLOCK_KEYWORDS: [&str; 4] = ["Host", "User", "HostName", "ProxyJump"];

/// Splits `content` into the lines outside and inside the blocks of `alias`.
fn split_block<'a>(content: &'a str, alias: &str) -> (Vec<&'a str>, Vec<&'a str>) {
    let header = format!("Host {alias}");
    let mut kept = Vec::new();
    let mut removed = Vec::new();
    let mut in_block = false;
    let mut blank_run = 0;

    for line in content.lines().map(str::trim_end) {
        if line == header {
            in_block = true;
        } else if is_host_line(line) {
            in_block = false;
        }

        if line.is_empty() {
            in_block = false;
            if blank_run == 0 {
                kept.push(line);
            }
            blank_run += 1;
        } else if in_block {
            removed.push(line);
        } else {
            kept.push(line);
            blank_run = 0;
        }
    }

    (kept, removed)
}

fn is_host_line(line: &str) -> bool {
    line.split_whitespace().next() == Some("Host")
}

fn is_concrete(pattern: &str) -> bool {
    !pattern.contains(['*', '?']) && pattern != "!"
}

/// Returns the concrete host names declared in the SSH config at `path`.
///
/// Wildcard and negated patterns are skipped. A missing file yields an
/// empty list.
///
/// # Errors
///
/// Returns `SshError::Parse` if the file exists but is malformed.
pub fn declared_hosts(path: &Path) -> Result<Vec<String>, SshError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = BufReader::new(File::open(path)?);
    let config = SshConfig::default()
        .parse(&mut reader, ParseRule::ALLOW_UNKNOWN_FIELDS)
        .map_err(|e| SshError::Parse(e.to_string()))?;

    let mut hosts: Vec<String> = config
        .get_hosts()
        .iter()
        .flat_map(|host| &host.pattern)
        .filter(|clause| !clause.negated && is_concrete(&clause.pattern))
        .map(|clause| clause.pattern.clone())
        .collect();

    hosts.sort_by_key(|a| a.to_lowercase());
    hosts.dedup();
    Ok(hosts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn block(alias: &str, jump: Option<&str>) -> HostBlock {
        HostBlock {
            alias: alias.into(),
            user: "alice".into(),
            hostname: format!("{alias}.lab"),
            proxy_jump: jump.map(Into::into),
        }
    }

    fn normalized(content: &str) -> String {
        strip_block(content, "no-such-alias")
    }

    #[test]
    fn test_block_rendering() {
        assert_eq!(
            block("gpu1", None).to_string(),
            "Host gpu1\n User alice\n HostName gpu1.lab\n"
        );
        assert_eq!(
            block("gpu1", Some("login")).to_string(),
            "Host gpu1\n User alice\n HostName gpu1.lab\n ProxyJump login\n"
        );
        assert!(!block("gpu1", Some("")).to_string().contains("ProxyJump"));
    }

    #[test]
    fn test_strip_removes_only_target_block() {
        let content = "Host a\n User u\n\nHost gpu1\n User alice\n HostName gpu1.lab\n\nHost b\n User v\n";
        assert_eq!(
            strip_block(content, "gpu1"),
            "Host a\n User u\n\nHost b\n User v\n"
        );
    }

    #[test]
    fn test_strip_keeps_adjacent_block_without_separator() {
        let content = "Host X\n User u\nHost Y\n User v\n";
        assert_eq!(strip_block(content, "X"), "Host Y\n User v\n");
    }

    #[test]
    fn test_strip_requires_exact_header() {
        let content = "Host gpu10\n User u\n";
        assert_eq!(strip_block(content, "gpu1"), content);
    }

    #[test]
    fn test_strip_collapses_blank_runs() {
        let content = "a\n\n\n\nb\n\n\nHost X\n User u\n\n\nc";
        assert_eq!(strip_block(content, "X"), "a\n\nb\n\nc\n");
    }

    #[test]
    fn test_strip_never_leaves_trailing_blank_line() {
        assert_eq!(normalized("a\n\n\n"), "a\n");
        assert_eq!(normalized("a"), "a\n");
        assert_eq!(normalized(""), "");
    }

    #[test]
    fn test_strip_unknown_alias_is_idempotent() {
        let content = "Host a\n User u\n\n\nHost b\n User v";
        let once = normalized(content);
        assert_eq!(once, "Host a\n User u\n\nHost b\n User v\n");
        assert_eq!(normalized(&once), once);
    }

    #[test]
    fn test_hostname_line_does_not_end_block() {
        let content = "Host X\nHostName x.lab\nUser u\n\nHost Y\n";
        assert_eq!(strip_block(content, "X"), "\nHost Y\n");
    }

    #[test]
    fn test_block_lines() {
        let content = "Host a\n User u\n\nHost gpu1\n User alice\n Port 2222\n\nHost b\n";
        assert_eq!(
            block_lines(content, "gpu1"),
            ["Host gpu1", " User alice", " Port 2222"]
        );
        assert!(block_lines(content, "gpu2").is_empty());
    }

    #[test]
    fn test_is_written_block() {
        let written = block("gpu1", Some("bastion")).to_string();
        assert!(is_written_block(&written.lines().collect::<Vec<_>>()));
        assert!(!is_written_block(&["Host gpu1", " User alice", " Port 2222"]));
    }

    #[test]
    fn test_append_then_remove_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config");

        for original in ["", "Host a\n User u\n", "Host a\n User u", "Host a\n\n\n\nHost b\n"] {
            fs::write(&path, original).unwrap();

            append_block(&path, &block("X", Some("a"))).unwrap();
            assert!(fs::read_to_string(&path).unwrap().contains("\nHost X\n"));

            remove_block(&path, "X").unwrap();
            assert_eq!(fs::read_to_string(&path).unwrap(), normalized(original));
        }
    }

    #[test]
    fn test_append_after_remove_has_single_separator() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config");
        fs::write(&path, "Host a\n User u\n\nHost X\n User u\n").unwrap();

        remove_block(&path, "X").unwrap();
        append_block(&path, &block("X", None)).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Host a\n User u\n\nHost X\n User alice\n HostName X.lab\n"
        );
    }

    #[test]
    fn test_append_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".ssh").join("config");

        append_block(&path, &block("gpu1", None)).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "\nHost gpu1\n User alice\n HostName gpu1.lab\n"
        );
    }

    #[test]
    fn test_append_twice_yields_two_blocks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config");

        append_block(&path, &block("gpu1", None)).unwrap();
        append_block(&path, &block("gpu1", None)).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("Host gpu1\n").count(), 2);
    }

    #[test]
    fn test_remove_missing_file_is_noop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config");
        remove_block(&path, "gpu1").unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_declared_hosts_skips_patterns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config");
        fs::write(
            &path,
            "Host *\n ServerAliveInterval 5\n\nHost gpu1 login\n User alice\n\nHost bastion\n HostName b.lab\n",
        )
        .unwrap();

        let hosts = declared_hosts(&path).unwrap();

        assert_eq!(hosts, vec!["bastion", "gpu1", "login"]);
    }

    #[test]
    fn test_declared_hosts_missing_file() {
        let hosts = declared_hosts(Path::new("/nonexistent/ssh/config")).unwrap();
        assert!(hosts.is_empty());
    }
}
