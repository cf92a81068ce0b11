//! Line-oriented plugin manifests (`skein-plugin.def`).
//!
//! ```text
//! # comment
//! http-client=com.acme.plugins.HttpClientDefine
//! com.acme.plugins.JdbcDefine
//! ```
//!
//! Each non-blank, non-comment line names one plugin definition, either as
//! `name=identity` or as a bare identity (the name then defaults to it).

use skein_core::UnitName;
use thiserror::Error;
use tracing::warn;

/// Default manifest resource name.
pub const DEFAULT_MANIFEST: &str = "skein-plugin.def";

/// One manifest line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub name: String,
    pub identity: String,
}

/// Why a manifest line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestLineError {
    #[error("empty plugin name")]
    EmptyName,

    #[error("empty definition identity")]
    EmptyIdentity,

    #[error("invalid definition identity '{0}'")]
    InvalidIdentity(String),
}

/// Parses one line; `None` for blank lines and comments.
pub fn parse_line(line: &str) -> Option<Result<ManifestEntry, ManifestLineError>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let (name, identity) = match line.split_once('=') {
        Some((name, identity)) => (name.trim(), identity.trim()),
        None => (line, line),
    };
    if name.is_empty() {
        return Some(Err(ManifestLineError::EmptyName));
    }
    if identity.is_empty() {
        return Some(Err(ManifestLineError::EmptyIdentity));
    }
    if UnitName::parse(identity).is_err() {
        return Some(Err(ManifestLineError::InvalidIdentity(identity.to_string())));
    }

    Some(Ok(ManifestEntry {
        name: name.to_string(),
        identity: identity.to_string(),
    }))
}

/// Parses manifest text, logging and skipping malformed lines.
///
/// `origin` only labels log records.
pub fn parse_manifest(origin: &str, text: &str) -> Vec<ManifestEntry> {
    text.lines()
        .enumerate()
        .filter_map(|(i, line)| match parse_line(line)? {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(manifest = %origin, line = i + 1, error = %e, "Skipping malformed manifest line");
                None
            }
        })
        .collect()
}

/// Parses raw manifest bytes; `None` (logged) when they are not UTF-8.
pub fn parse_manifest_bytes(origin: &str, bytes: &[u8]) -> Option<Vec<ManifestEntry>> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Some(parse_manifest(origin, text)),
        Err(e) => {
            warn!(manifest = %origin, error = %e, "Manifest is not valid UTF-8, skipping");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, identity: &str) -> ManifestEntry {
        ManifestEntry {
            name: name.to_string(),
            identity: identity.to_string(),
        }
    }

    #[test]
    fn test_named_and_bare_lines() {
        let text = "\
# plugins shipped with the http archive
http = com.acme.HttpDefine

com.acme.JdbcDefine
   # indented comment
";
        assert_eq!(
            parse_manifest("test", text),
            [
                entry("http", "com.acme.HttpDefine"),
                entry("com.acme.JdbcDefine", "com.acme.JdbcDefine"),
            ]
        );
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let text = "=com.acme.A\nnoid=\nbad=com acme\nok=com.acme.Ok\n";
        assert_eq!(parse_manifest("test", text), [entry("ok", "com.acme.Ok")]);

        assert_eq!(parse_line("=x.Y"), Some(Err(ManifestLineError::EmptyName)));
        assert_eq!(parse_line("n="), Some(Err(ManifestLineError::EmptyIdentity)));
        assert_eq!(parse_line("  "), None);
    }

    #[test]
    fn test_non_utf8_manifest_is_dropped() {
        assert!(parse_manifest_bytes("test", &[b'a', b'=', 0xff, 0xfe]).is_none());
        assert_eq!(parse_manifest_bytes("test", b"a=b.C").map(|e| e.len()), Some(1));
    }
}
