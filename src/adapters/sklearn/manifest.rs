//! Signed manifest binding model artifacts to their SHA-256 digests.
//!
//! `manifest.json` lists every artifact file with its hex digest and is signed
//! with Ed25519; the raw 64-byte signature lives in `models.sig`. Only files
//! named in a verified manifest may be loaded.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use base64::Engine;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::ArtifactError;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const SIGNATURE_FILE: &str = "models.sig";
pub const MANIFEST_VERSION: u32 = 1;

const NONCE_LEN: usize = 16;
/// Allowed clock skew for `created_at`, in seconds.
const MAX_FUTURE_SKEW_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedManifest {
    pub version: u32,
    /// Unix timestamp (seconds) of signing.
    pub created_at: i64,
    /// Random 16-byte nonce, base64.
    pub nonce_b64: String,
    /// File name relative to the model directory -> lowercase hex SHA-256.
    pub files: BTreeMap<String, String>,
}

impl SignedManifest {
    #[must_use]
    pub fn binds(&self, file: &str) -> bool {
        self.files.contains_key(file)
    }
}

#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[must_use]
pub fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

// Constant-time compare for ASCII strings (hex digests).
fn constant_time_eq_str(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes().iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Parse a base64-encoded Ed25519 public key.
///
/// # Errors
/// Returns error on bad base64 or a key that is not 32 valid bytes.
pub fn verifying_key_from_b64(b64: &str) -> Result<VerifyingKey, ArtifactError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64.trim())
        .map_err(|_| ArtifactError::Signature("invalid public key base64".into()))?;
    let key: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| ArtifactError::Signature("public key must be 32 bytes".into()))?;
    VerifyingKey::from_bytes(&key)
        .map_err(|_| ArtifactError::Signature("invalid verifying key".into()))
}

/// Read a verifying key from a file holding its base64 encoding.
///
/// # Errors
/// Returns error if the file cannot be read or does not hold a valid key.
pub fn load_verifying_key(path: &Path) -> Result<VerifyingKey, ArtifactError> {
    let b64 = fs::read_to_string(path)?;
    verifying_key_from_b64(&b64)
}

/// Whether `dir` carries a manifest and a signature.
#[must_use]
pub fn is_signed(dir: &Path) -> bool {
    dir.join(MANIFEST_FILE).exists() && dir.join(SIGNATURE_FILE).exists()
}

/// Verify the signed manifest in `dir` and every file it binds.
///
/// # Errors
/// Fails closed on a bad signature, an unsupported or malformed manifest, or
/// any bound file that is missing or whose digest differs.
pub fn verify(dir: &Path, key: &VerifyingKey) -> Result<SignedManifest, ArtifactError> {
    let sig_bytes = fs::read(dir.join(SIGNATURE_FILE))?;
    let sig_bytes: [u8; 64] = sig_bytes.as_slice().try_into().map_err(|_| {
        ArtifactError::Signature("invalid signature length (expected 64 bytes)".into())
    })?;
    let signature = Signature::from_bytes(&sig_bytes);

    let content = fs::read(dir.join(MANIFEST_FILE))?;
    key.verify(&content, &signature)
        .map_err(|_| ArtifactError::Signature("manifest signature does not verify".into()))?;

    let manifest: SignedManifest = serde_json::from_slice(&content)
        .map_err(|e| ArtifactError::Manifest(format!("invalid {MANIFEST_FILE}: {e}")))?;
    if manifest.version != MANIFEST_VERSION {
        return Err(ArtifactError::Manifest(format!(
            "unsupported manifest version {}",
            manifest.version
        )));
    }
    let nonce = base64::engine::general_purpose::STANDARD
        .decode(manifest.nonce_b64.trim())
        .map_err(|e| ArtifactError::Manifest(format!("invalid nonce base64: {e}")))?;
    if nonce.len() != NONCE_LEN {
        return Err(ArtifactError::Manifest(format!(
            "nonce must decode to exactly {NONCE_LEN} bytes"
        )));
    }
    if manifest.created_at > unix_now() + MAX_FUTURE_SKEW_SECS {
        return Err(ArtifactError::Manifest("manifest created_at is in the future".into()));
    }
    if manifest.files.is_empty() {
        return Err(ArtifactError::Manifest("manifest binds no files".into()));
    }

    for (rel, expected) in &manifest.files {
        if Path::new(rel).components().count() != 1 {
            return Err(ArtifactError::Manifest(format!(
                "manifest entry {rel} is not a plain file name"
            )));
        }
        let bytes = fs::read(dir.join(rel)).map_err(|e| {
            ArtifactError::Manifest(format!("manifest references missing/unreadable file {rel}: {e}"))
        })?;
        if !constant_time_eq_str(&sha256_hex(&bytes), &expected.to_ascii_lowercase()) {
            return Err(ArtifactError::Manifest(format!("file hash mismatch for {rel}")));
        }
    }

    Ok(manifest)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use rand::RngCore;
    use tempfile::tempdir;

    pub(crate) fn signing_key() -> SigningKey {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        SigningKey::from_bytes(&seed)
    }

    /// Sign a manifest binding `files` (already written in `dir`).
    pub(crate) fn write_signed_manifest(dir: &Path, key: &SigningKey, files: &[&str]) {
        let mut map = BTreeMap::new();
        for name in files {
            let bytes = fs::read(dir.join(name)).expect("Should read bound file");
            map.insert((*name).to_string(), sha256_hex(&bytes));
        }
        let manifest = SignedManifest {
            version: MANIFEST_VERSION,
            created_at: unix_now(),
            nonce_b64: base64::engine::general_purpose::STANDARD.encode([7u8; NONCE_LEN]),
            files: map,
        };
        let bytes = serde_json::to_vec(&manifest).expect("Should serialize manifest");
        fs::write(dir.join(MANIFEST_FILE), &bytes).expect("Should write manifest");
        let signature: Signature = key.sign(&bytes);
        fs::write(dir.join(SIGNATURE_FILE), signature.to_bytes()).expect("Should write signature");
    }

    #[test]
    fn test_verify_accepts_signed_manifest() {
        let temp = tempdir().expect("tempdir");
        fs::write(temp.path().join("a.json"), b"[1,2,3]").expect("write");
        let key = signing_key();
        write_signed_manifest(temp.path(), &key, &["a.json"]);

        let manifest = verify(temp.path(), &key.verifying_key()).expect("Should verify");
        assert!(manifest.binds("a.json"));
        assert!(!manifest.binds("b.json"));
    }

    #[test]
    fn test_verify_rejects_tampered_file() {
        let temp = tempdir().expect("tempdir");
        fs::write(temp.path().join("a.json"), b"[1,2,3]").expect("write");
        let key = signing_key();
        write_signed_manifest(temp.path(), &key, &["a.json"]);
        fs::write(temp.path().join("a.json"), b"[1,2,4]").expect("write");

        let err = verify(temp.path(), &key.verifying_key()).expect_err("must fail");
        assert!(err.to_string().contains("hash mismatch"));
    }

    #[test]
    fn test_verify_rejects_other_key() {
        let temp = tempdir().expect("tempdir");
        fs::write(temp.path().join("a.json"), b"{}").expect("write");
        write_signed_manifest(temp.path(), &signing_key(), &["a.json"]);

        assert!(matches!(
            verify(temp.path(), &signing_key().verifying_key()),
            Err(ArtifactError::Signature(_))
        ));
    }

    #[test]
    fn test_verifying_key_round_trips_through_b64() {
        let key = signing_key().verifying_key();
        let b64 = base64::engine::general_purpose::STANDARD.encode(key.to_bytes());
        let parsed = verifying_key_from_b64(&format!("{b64}\n")).expect("Should parse");
        assert_eq!(parsed, key);
        assert!(verifying_key_from_b64("AAAA").is_err());
    }

    #[test]
    fn test_constant_time_eq_str() {
        assert!(constant_time_eq_str("abc", "abc"));
        assert!(!constant_time_eq_str("abc", "abd"));
        assert!(!constant_time_eq_str("abc", "ab"));
    }
}
