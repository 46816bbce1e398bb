use std::fmt;
use std::str::FromStr;

use super::errors::StoreError;

/// Length in bytes of a content address (SHA-256).
pub const HASH_LEN: usize = 32;

/// A fixed-width content address produced by the object store.
///
/// The all-zero value is distinguished: it denotes "absent" or
/// "uninitialized" wherever a hash is expected but nothing has been written.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash([u8; HASH_LEN]);

/// The distinguished zero hash.
pub const ZERO_HASH: Hash = Hash([0; HASH_LEN]);

impl Hash {
    pub fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Hash(bytes)
    }

    /// Parse a lowercase or uppercase hex string into a hash.
    pub fn from_hex(s: &str) -> Result<Self, StoreError> {
        let bytes = hex::decode(s).map_err(|_| StoreError::InvalidHash(s.to_string()))?;
        let bytes: [u8; HASH_LEN] = bytes
            .try_into()
            .map_err(|_| StoreError::InvalidHash(s.to_string()))?;
        Ok(Hash(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn is_zero(&self) -> bool {
        *self == ZERO_HASH
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Hash {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hash::from_hex(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_hash() {
        assert!(ZERO_HASH.is_zero());
        assert_eq!(
            ZERO_HASH.to_hex(),
            "0000000000000000000000000000000000000000000000000000000000000000"
        );
    }

    #[test]
    fn test_hex_roundtrip() {
        let hex = "abcdef1234567890abcdef1234567890abcdef1234567890abcdef1234567890";
        let hash = Hash::from_hex(hex).unwrap();
        assert_eq!(hash.to_hex(), hex);
        assert!(!hash.is_zero());
    }

    #[test]
    fn test_invalid_hex() {
        assert!(Hash::from_hex("not hex").is_err());
        // Wrong width (SHA-1 sized)
        assert!(Hash::from_hex("abcdef12345678900987654321fedcbaabcdef12").is_err());
    }
}
