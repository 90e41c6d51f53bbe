//! Core data model (§3): tokens, scans, driver/reader descriptors, devices.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// An immutable record of a single tag read, produced by a reader driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub uid: String,
    pub text: String,
    #[serde(default)]
    pub data: String,
    pub scan_time_ms: u64,
    pub source: String,
    pub reader_id: String,
    #[serde(rename = "type", default)]
    pub token_type: String,
}

impl Token {
    /// The identity used for reader-manager dedup: `(uid, text)`.
    fn identity(&self) -> (&str, &str) {
        (&self.uid, &self.text)
    }

    /// Two tokens are the "same" for dedup purposes iff their `(uid, text)`
    /// pair matches, independent of scan time or other fields.
    pub fn same_identity(&self, other: &Token) -> bool {
        self.identity() == other.identity()
    }
}

pub fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// One observation from a reader driver: token present, token absent
/// (normal removal), or a reader hardware fault.
#[derive(Debug, Clone)]
pub struct Scan {
    pub source: String,
    pub token: Option<Token>,
    pub error: Option<String>,
    /// `true` iff the driver lost its device (hotplug) rather than the user
    /// removing the tag normally.
    pub reader_error: bool,
}

impl Scan {
    pub fn removed(source: impl Into<String>) -> Self {
        Self { source: source.into(), token: None, error: None, reader_error: false }
    }

    pub fn hardware_fault(source: impl Into<String>) -> Self {
        Self { source: source.into(), token: None, error: None, reader_error: true }
    }

    pub fn present(source: impl Into<String>, token: Token) -> Self {
        Self { source: source.into(), token: Some(token), error: None, reader_error: false }
    }

    pub fn failed(source: impl Into<String>, error: impl Into<String>) -> Self {
        Self { source: source.into(), token: None, error: Some(error.into()), reader_error: false }
    }
}

/// Static per-driver-type description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverMetadata {
    pub id: String,
    pub description: String,
    pub default_enabled: bool,
    pub default_auto_detect: bool,
    /// Legacy/alias IDs this driver is also known by (§4.2 ID normalization
    /// strips underscores, e.g. `simple_serial` == `simpleserial`).
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl DriverMetadata {
    /// All IDs (canonical + aliases) normalized by stripping underscores.
    pub fn normalized_ids(&self) -> Vec<String> {
        std::iter::once(self.id.as_str())
            .chain(self.aliases.iter().map(String::as_str))
            .map(normalize_driver_id)
            .collect()
    }
}

/// Strip underscores so legacy IDs (`simple_serial`) match current ones
/// (`simpleserial`) when checked against the auto-detector's failed set.
pub fn normalize_driver_id(id: &str) -> String {
    id.chars().filter(|c| *c != '_').collect::<String>().to_lowercase()
}

/// The configuration of one reader instance, as handed to a driver's `open`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConnect {
    pub driver: String,
    pub path: String,
    #[serde(default)]
    pub id_source: Option<String>,
    #[serde(default)]
    pub extra: serde_json::Value,
}

/// A device record persisted by a successful pairing completion. Owned by
/// the external user database (out of scope); the core only defines the
/// shape and the [`crate::device::DeviceStore`] trait it is written through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub device_id: String,
    pub device_name: String,
    pub auth_token: String,
    /// Hex-encoded 32-byte shared secret derived during pairing.
    pub shared_secret: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(uid: &str, text: &str) -> Token {
        Token {
            uid: uid.to_owned(),
            text: text.to_owned(),
            data: String::new(),
            scan_time_ms: 0,
            source: "test".to_owned(),
            reader_id: "test".to_owned(),
            token_type: String::new(),
        }
    }

    #[test]
    fn same_identity_ignores_scan_time() {
        let mut a = token("A", "T");
        a.scan_time_ms = 1;
        let mut b = token("A", "T");
        b.scan_time_ms = 2;
        assert!(a.same_identity(&b));
    }

    #[test]
    fn same_identity_requires_both_fields() {
        assert!(!token("A", "T").same_identity(&token("A", "U")));
        assert!(!token("A", "T").same_identity(&token("B", "T")));
    }

    #[test]
    fn normalized_ids_strip_underscores_and_lowercase() {
        let meta = DriverMetadata {
            id: "simpleserial".to_owned(),
            description: String::new(),
            default_enabled: true,
            default_auto_detect: true,
            aliases: vec!["simple_serial".to_owned(), "Simple_Serial".to_owned()],
        };
        let ids = meta.normalized_ids();
        assert!(ids.iter().all(|id| id == "simpleserial"));
    }
}
