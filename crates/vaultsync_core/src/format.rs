//! Vault file container.
//!
//! ```text
//! | magic (4) | version (2, LE) | kdf (12) | salt (16) | nonce (12) || ciphertext || tag (16) |
//! ```
//!
//! The header (magic, version, kdf cost, salt) is authenticated as associated
//! data, so a flipped bit anywhere in the file fails decryption.

use crate::crypto::{generate_salt, CryptoManager, KdfParams, MasterKey, KDF_PARAMS_SIZE, SALT_SIZE};
use crate::error::{CoreError, CoreResult};

/// Magic bytes at the start of every vault file.
pub const VAULT_MAGIC: [u8; 4] = *b"VSDB";
/// Current container version.
pub const VAULT_VERSION: u16 = 1;
/// Header size (magic + version + kdf cost + salt).
pub const HEADER_SIZE: usize = 4 + 2 + KDF_PARAMS_SIZE + SALT_SIZE;

const KDF_OFFSET: usize = 6;
const SALT_OFFSET: usize = KDF_OFFSET + KDF_PARAMS_SIZE;

/// Encrypts a serialized body into a complete vault file image.
///
/// A new salt is generated for every call.
pub fn seal(body: &[u8], master_key: &MasterKey, kdf: &KdfParams) -> CoreResult<Vec<u8>> {
    let salt = generate_salt();

    let mut header = Vec::with_capacity(HEADER_SIZE);
    header.extend_from_slice(&VAULT_MAGIC);
    header.extend_from_slice(&VAULT_VERSION.to_le_bytes());
    header.extend_from_slice(&kdf.to_bytes());
    header.extend_from_slice(&salt);

    let key = master_key.derive_file_key(&salt, kdf)?;
    let sealed = CryptoManager::new(&key).encrypt_with_aad(body, &header)?;

    let mut out = header;
    out.extend(sealed);
    Ok(out)
}

/// Decrypts a vault file image back into the serialized body and the KDF
/// cost it was sealed with.
///
/// # Errors
///
/// - [`CoreError::InvalidFormat`] if the header is missing or damaged
/// - [`CoreError::UnsupportedVersion`] for containers newer than this build
/// - [`CoreError::DecryptionFailed`] for a wrong key or modified ciphertext
pub fn open(data: &[u8], master_key: &MasterKey) -> CoreResult<(Vec<u8>, KdfParams)> {
    if data.len() < HEADER_SIZE {
        return Err(CoreError::invalid_format(format!(
            "file too short: {} bytes",
            data.len()
        )));
    }

    let (header, sealed) = data.split_at(HEADER_SIZE);

    if header[..4] != VAULT_MAGIC {
        return Err(CoreError::invalid_format("bad magic"));
    }

    let version = u16::from_le_bytes([header[4], header[5]]);
    if version > VAULT_VERSION {
        return Err(CoreError::UnsupportedVersion {
            found: version,
            supported: VAULT_VERSION,
        });
    }

    let mut kdf_bytes = [0u8; KDF_PARAMS_SIZE];
    kdf_bytes.copy_from_slice(&header[KDF_OFFSET..SALT_OFFSET]);
    let kdf = KdfParams::from_bytes(&kdf_bytes)?;

    let mut salt = [0u8; SALT_SIZE];
    salt.copy_from_slice(&header[SALT_OFFSET..HEADER_SIZE]);

    let key = master_key.derive_file_key(&salt, &kdf)?;
    let body = CryptoManager::new(&key).decrypt_with_aad(sealed, header)?;
    Ok((body, kdf))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: KdfParams = KdfParams {
        memory_kib: 64,
        iterations: 1,
        lanes: 1,
    };

    #[test]
    fn seal_open_roundtrip() {
        let key = MasterKey::from_password("pw");
        let image = seal(b"body bytes", &key, &FAST).unwrap();

        assert_eq!(&image[..4], b"VSDB");
        let (body, kdf) = open(&image, &key).unwrap();
        assert_eq!(body, b"body bytes");
        assert_eq!(kdf, FAST);
    }

    #[test]
    fn every_seal_differs() {
        let key = MasterKey::from_password("pw");
        assert_ne!(seal(b"x", &key, &FAST).unwrap(), seal(b"x", &key, &FAST).unwrap());
    }

    #[test]
    fn short_file_is_invalid_format() {
        let key = MasterKey::from_password("pw");
        let err = open(b"VSDB", &key).unwrap_err();
        assert!(matches!(err, CoreError::InvalidFormat { .. }));
    }

    #[test]
    fn bad_magic_is_invalid_format() {
        let key = MasterKey::from_password("pw");
        let mut image = seal(b"x", &key, &FAST).unwrap();
        image[0] = b'X';
        assert!(matches!(
            open(&image, &key).unwrap_err(),
            CoreError::InvalidFormat { .. }
        ));
    }

    #[test]
    fn newer_version_is_rejected() {
        let key = MasterKey::from_password("pw");
        let mut image = seal(b"x", &key, &FAST).unwrap();
        image[4..6].copy_from_slice(&(VAULT_VERSION + 1).to_le_bytes());
        assert!(matches!(
            open(&image, &key).unwrap_err(),
            CoreError::UnsupportedVersion { .. }
        ));
    }

    #[test]
    fn tampered_salt_fails_decryption() {
        let key = MasterKey::from_password("pw");
        let mut image = seal(b"x", &key, &FAST).unwrap();
        image[SALT_OFFSET + 3] ^= 0x01;
        assert!(matches!(
            open(&image, &key).unwrap_err(),
            CoreError::DecryptionFailed { .. }
        ));
    }

    #[test]
    fn tampered_kdf_cost_is_rejected() {
        let key = MasterKey::from_password("pw");
        let mut image = seal(b"x", &key, &FAST).unwrap();
        // Same field, different valid cost: the derived key changes.
        image[KDF_OFFSET] = 65;
        assert!(open(&image, &key).unwrap_err().is_integrity_failure());

        // Out-of-range cost never reaches Argon2.
        image[KDF_OFFSET + 3] = 0xFF;
        assert!(matches!(
            open(&image, &key).unwrap_err(),
            CoreError::InvalidFormat { .. }
        ));
    }

    #[test]
    fn wrong_key_fails_decryption() {
        let image = seal(b"x", &MasterKey::from_password("a"), &FAST).unwrap();
        let err = open(&image, &MasterKey::from_password("b")).unwrap_err();
        assert!(err.is_integrity_failure());
    }
}
