//! Ed25519 commit signing.
//!
//! Signatures cover the commit encoding without its signature line and are
//! carried as a base64 line inside the commit object, so a signed commit's
//! identity commits to its signature.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use super::errors::StoreError;

/// Load a signing key from a 32-byte ed25519 seed.
pub fn signing_key_from_bytes(bytes: &[u8]) -> Result<SigningKey, StoreError> {
    let seed: [u8; 32] = bytes
        .try_into()
        .map_err(|_| StoreError::Other("signing key must be a 32-byte ed25519 seed".to_string()))?;
    Ok(SigningKey::from_bytes(&seed))
}

/// Sign commit content, returning the base64 signature carried in the
/// commit object.
pub fn sign_commit_content(key: &SigningKey, content: &[u8]) -> String {
    let signature = key.sign(content);
    BASE64.encode(signature.to_bytes())
}

/// Verify a base64 commit signature against the signed content.
pub fn verify_commit_signature(
    key: &VerifyingKey,
    content: &[u8],
    signature_b64: &str,
) -> Result<(), StoreError> {
    let sig_bytes = BASE64
        .decode(signature_b64)
        .map_err(|_| StoreError::Corrupt("commit signature is not valid base64".to_string()))?;
    let signature = Signature::from_slice(&sig_bytes)
        .map_err(|_| StoreError::Corrupt("commit signature has wrong length".to_string()))?;

    key.verify(content, &signature)
        .map_err(|_| StoreError::Other("commit signature verification failed".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let key = signing_key_from_bytes(&[7u8; 32]).unwrap();
        let content = b"tree 0000\n\nmessage";

        let sig = sign_commit_content(&key, content);
        assert!(verify_commit_signature(&key.verifying_key(), content, &sig).is_ok());
    }

    #[test]
    fn test_verify_rejects_other_key() {
        let key = signing_key_from_bytes(&[7u8; 32]).unwrap();
        let other = signing_key_from_bytes(&[8u8; 32]).unwrap();
        let content = b"content";

        let sig = sign_commit_content(&key, content);
        assert!(verify_commit_signature(&other.verifying_key(), content, &sig).is_err());
    }

    #[test]
    fn test_rejects_bad_seed_length() {
        assert!(signing_key_from_bytes(&[0u8; 16]).is_err());
    }
}
