use std::fmt;

use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};

/// Content hash of a subtree.
///
/// `fingerprint = sha256(kind || label || value || child_count || child fingerprints)`
/// with every variable-length field length-prefixed, so two subtrees share a
/// fingerprint iff they agree on structure and text. Ordinals, revisions and
/// provenance are not hashed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Hash one node given its own data and its children's fingerprints.
    #[must_use]
    pub fn of_node<'a>(
        kind: &str,
        label: Option<&str>,
        value: Option<&str>,
        children: impl ExactSizeIterator<Item = &'a Self>,
    ) -> Self {
        let mut hasher = Sha256::new();
        update_field(&mut hasher, Some(kind));
        update_field(&mut hasher, label);
        update_field(&mut hasher, value);
        hasher.update((children.len() as u64).to_be_bytes());
        for child in children {
            hasher.update(child.0);
        }
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&hasher.finalize());
        Self(digest)
    }

    /// Raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex, 64 characters.
    #[must_use]
    pub fn to_hex(&self) -> String {
        use std::fmt::Write as _;
        self.0.iter().fold(String::with_capacity(64), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        })
    }
}

/// Absent fields hash as a distinct tag so `None` never collides with `""`.
fn update_field(hasher: &mut Sha256, field: Option<&str>) {
    match field {
        None => hasher.update([0u8]),
        Some(text) => {
            hasher.update([1u8]);
            hasher.update((text.len() as u64).to_be_bytes());
            hasher.update(text.as_bytes());
        }
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(kind: &str, value: &str) -> Fingerprint {
        Fingerprint::of_node(kind, None, Some(value), std::iter::empty())
    }

    #[test]
    fn absent_and_empty_fields_differ() {
        let absent = Fingerprint::of_node("k", None, None, std::iter::empty());
        let empty = Fingerprint::of_node("k", Some(""), None, std::iter::empty());
        assert_ne!(absent, empty);
    }

    #[test]
    fn field_boundaries_are_unambiguous() {
        let a = Fingerprint::of_node("ab", None, Some("c"), std::iter::empty());
        let b = Fingerprint::of_node("a", None, Some("bc"), std::iter::empty());
        assert_ne!(a, b);
    }

    #[test]
    fn child_order_matters() {
        let x = leaf("t", "x");
        let y = leaf("t", "y");
        let xy = Fingerprint::of_node("p", None, None, [x, y].iter());
        let yx = Fingerprint::of_node("p", None, None, [y, x].iter());
        assert_ne!(xy, yx);
    }

    #[test]
    fn hex_is_64_lowercase_chars() {
        let hex = leaf("t", "x").to_hex();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
