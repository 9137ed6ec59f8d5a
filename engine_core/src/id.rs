//! Resource identifiers.
//!
//! A resource is identified by the 32-bit FNV-1a hash of its logical name.
//! The id is the cache index key and the identity used for equality, so two
//! names that hash alike address the same cache slot.

use std::fmt;

use serde::{Deserialize, Serialize};

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// Stable identifier of a cached resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(pub u32);

impl ResourceId {
    /// Hashes a logical asset name.
    pub fn from_name(name: &str) -> Self {
        let mut h = FNV_OFFSET_BASIS;
        for b in name.bytes() {
            h ^= u32::from(b);
            h = h.wrapping_mul(FNV_PRIME);
        }
        Self(h)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_reference_values() {
        assert_eq!(ResourceId::from_name("").0, 0x811c_9dc5);
        assert_eq!(ResourceId::from_name("a").0, 0xe40c_292c);
        assert_eq!(ResourceId::from_name("foobar").0, 0xbf9c_f968);
    }

    #[test]
    fn same_name_same_id() {
        assert_eq!(
            ResourceId::from_name("sphere.bmh"),
            ResourceId::from_name("sphere.bmh")
        );
        assert_ne!(
            ResourceId::from_name("crack_c.btx"),
            ResourceId::from_name("crack_n.btx")
        );
    }

    #[test]
    fn display_is_fixed_width_hex() {
        assert_eq!(ResourceId(0x2a).to_string(), "0000002a");
    }
}
