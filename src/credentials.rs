//! Credential tables built from `key:value,key:value` strings.
//!
//! Both the Basic users (`user:bcryptHash`) and the API keys (`key:name`)
//! use the same grammar:
//!
//! - entries are separated by `,` and trimmed;
//! - empty entries are skipped, so a trailing comma is fine;
//! - each entry splits at its first `:` into a non-empty key and value.
//!
//! A malformed entry or a table with no entries is a configuration error.

use std::collections::HashMap;

use tracing::warn;

use crate::{Error, Result};

/// Parse a credential string into a lookup table.
///
/// `kind` names the table in error messages. It never echoes the secret part
/// of an entry. When a key repeats, the last entry wins.
pub fn parse_table(raw: &str, kind: &str) -> Result<HashMap<String, String>> {
    let mut table = HashMap::new();

    for (index, entry) in raw.split(',').map(str::trim).enumerate() {
        if entry.is_empty() {
            continue;
        }

        let Some((key, value)) = entry.split_once(':') else {
            return Err(Error::Config(format!(
                "{kind} entry {} is missing the ':' separator",
                index + 1
            )));
        };
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || value.is_empty() {
            return Err(Error::Config(format!(
                "{kind} entry {} has an empty key or value",
                index + 1
            )));
        }

        if table.insert(key.to_string(), value.to_string()).is_some() {
            warn!(kind, entry = index + 1, "Duplicate credential entry, keeping the last one");
        }
    }

    if table.is_empty() {
        return Err(Error::Config(format!("{kind} configuration has no entries")));
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_pairs_with_whitespace_and_trailing_comma() {
        let table = parse_table(" alice:h1 , bob:h2,", "basic auth").unwrap();
        let mut entries: Vec<_> = table.into_iter().collect();
        entries.sort();
        assert_eq!(
            entries,
            vec![
                ("alice".to_string(), "h1".to_string()),
                ("bob".to_string(), "h2".to_string()),
            ]
        );
    }

    #[test]
    fn value_may_contain_separator_after_the_first() {
        let table = parse_table("key:svc:v2", "api key").unwrap();
        assert_eq!(table["key"], "svc:v2");
    }

    #[test]
    fn rejects_entry_without_separator() {
        let err = parse_table("alice:h1,bob", "basic auth").unwrap_err();
        assert!(err.to_string().contains("entry 2"));
    }

    #[test]
    fn rejects_empty_key_or_value() {
        assert!(parse_table(":hash", "basic auth").is_err());
        assert!(parse_table("alice:", "basic auth").is_err());
        assert!(parse_table("alice: ", "basic auth").is_err());
    }

    #[test]
    fn rejects_empty_table() {
        assert!(parse_table("", "api key").is_err());
        assert!(parse_table(" , ,", "api key").is_err());
    }

    #[test]
    fn error_does_not_echo_secret() {
        let err = parse_table("supersecretvalue", "api key").unwrap_err();
        assert!(!err.to_string().contains("supersecretvalue"));
    }

    #[test]
    fn duplicate_key_keeps_last() {
        let table = parse_table("k:first,k:second", "api key").unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table["k"], "second");
    }
}
