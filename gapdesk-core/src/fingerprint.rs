//! Report fingerprinting — a stable hash of a report's canonical JSON.
//!
//! Two analysis cycles over identical upstream data at the same clock time
//! produce identical reports, and therefore identical fingerprints. The CLI
//! prints the fingerprint so replays of a fixture can be compared at a glance.

use serde::{Deserialize, Serialize};
use std::fmt;

/// BLAKE3 hex digest of a value's canonical JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    /// Canonical form: `serde_json::Value` keeps object keys sorted, so the
    /// same value always serializes to the same bytes.
    pub fn of<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        let canonical = serde_json::to_value(value)?;
        let hash = blake3::hash(canonical.to_string().as_bytes());
        Ok(Self(hash.to_hex().to_string()))
    }

    /// First 12 hex characters, for display.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Serialize)]
    struct Sample {
        name: &'static str,
        points: f64,
    }

    #[test]
    fn identical_values_hash_identically() {
        let a = Fingerprint::of(&Sample { name: "gap", points: 1.5 }).unwrap();
        let b = Fingerprint::of(&Sample { name: "gap", points: 1.5 }).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.0.len(), 64);
        assert_eq!(a.short().len(), 12);
    }

    #[test]
    fn any_change_changes_hash() {
        let a = Fingerprint::of(&Sample { name: "gap", points: 1.5 }).unwrap();
        let b = Fingerprint::of(&Sample { name: "gap", points: 2.0 }).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn map_order_does_not_matter() {
        let mut first = HashMap::new();
        let mut second = HashMap::new();
        for (k, v) in [("a", 1), ("b", 2), ("c", 3)] {
            first.insert(k, v);
        }
        for (k, v) in [("c", 3), ("a", 1), ("b", 2)] {
            second.insert(k, v);
        }
        assert_eq!(Fingerprint::of(&first).unwrap(), Fingerprint::of(&second).unwrap());
    }
}
