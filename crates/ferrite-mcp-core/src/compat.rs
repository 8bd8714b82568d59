use std::collections::HashMap;

/// Parses the `MCP_COMPAT` environment variable: a comma-separated list of
/// `key=value` pairs toggling narrow compatibility shims (e.g. talking to a
/// peer that predates a given protocol revision). Unknown keys are kept
/// around rather than rejected — a caller-defined shim may read one this
/// crate doesn't know about — but a malformed pair (`key=value` missing
/// either half) is a hard error, since a silently-ignored typo there is
/// exactly the kind of bug this exists to avoid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompatFlags {
    flags: HashMap<String, String>,
}

impl CompatFlags {
    pub fn from_env() -> Result<Self, CompatParseError> {
        match std::env::var("MCP_COMPAT") {
            Ok(raw) => Self::parse(&raw),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, CompatParseError> {
        let mut flags = HashMap::new();
        for pair in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| CompatParseError::Malformed(pair.to_string()))?;
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() || value.is_empty() {
                return Err(CompatParseError::Malformed(pair.to_string()));
            }
            flags.insert(key.to_string(), value.to_string());
        }
        Ok(Self { flags })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.flags.get(key).map(String::as_str)
    }

    pub fn is_set(&self, key: &str) -> bool {
        self.flags.contains_key(key)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CompatParseError {
    #[error("malformed MCP_COMPAT pair: {0:?} (expected key=value)")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multiple_pairs() {
        let flags = CompatFlags::parse("legacy_ids=1, strict_decode=0").unwrap();
        assert_eq!(flags.get("legacy_ids"), Some("1"));
        assert_eq!(flags.get("strict_decode"), Some("0"));
    }

    #[test]
    fn empty_string_is_no_flags() {
        let flags = CompatFlags::parse("").unwrap();
        assert!(!flags.is_set("anything"));
    }

    #[test]
    fn rejects_malformed_pair() {
        assert!(CompatFlags::parse("legacy_ids").is_err());
        assert!(CompatFlags::parse("=1").is_err());
        assert!(CompatFlags::parse("key=").is_err());
    }
}
