//! Configuration for conversion generation.

use serde::{Deserialize, Serialize};

/// Options for a generation run.
///
/// ## Serialization Format
///
/// Fields are serialized in `kebab-case` (e.g., `unsafe-reinterpret`,
/// `base-peer-packages`), matching the on-disk config surface of the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Options {
    /// Permit unsafe reinterpretation of memory-equivalent types.
    /// When false, equivalence is still analyzed (it feeds the copy-only
    /// bypass) but reinterpretation operations are never emitted.
    pub unsafe_reinterpret: bool,
    /// Peer packages appended to every package's own peer list.
    pub base_peer_packages: Vec<String>,
    /// Additional peer packages appended after the base list.
    pub extra_peer_packages: Vec<String>,
    /// Packages scanned for manual conversion functions only; no peers are
    /// looked up in them.
    pub extra_packages: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            unsafe_reinterpret: true,
            base_peer_packages: Vec::new(),
            extra_peer_packages: Vec::new(),
            extra_packages: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_serde_round_trip() {
        let opts = Options {
            unsafe_reinterpret: false,
            base_peer_packages: vec!["example.io/api/base".to_string()],
            extra_peer_packages: Vec::new(),
            extra_packages: vec!["example.io/api/helpers".to_string()],
        };

        let json = serde_json::to_string(&opts).unwrap();

        // Verify kebab-case field names are in the JSON
        assert!(json.contains("\"unsafe-reinterpret\""));
        assert!(json.contains("\"base-peer-packages\""));

        let deserialized: Options = serde_json::from_str(&json).unwrap();
        assert!(!deserialized.unsafe_reinterpret);
        assert_eq!(deserialized.base_peer_packages.len(), 1);
        assert_eq!(deserialized.extra_packages.len(), 1);
    }

    #[test]
    fn test_options_default_allows_unsafe() {
        assert!(Options::default().unsafe_reinterpret);
    }

    #[test]
    fn test_options_missing_fields_take_defaults() {
        let opts: Options = serde_json::from_str("{}").unwrap();
        assert!(opts.unsafe_reinterpret);
        assert!(opts.base_peer_packages.is_empty());
    }
}
