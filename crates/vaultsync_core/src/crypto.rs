//! Vault encryption using AES-256-GCM.
//!
//! ## Security Model
//!
//! - The master key is the user's secret; it is never written to disk
//! - Every vault file carries a random salt and its KDF cost; the master key
//!   is stretched with Argon2id over that salt, then expanded into the file
//!   key with HKDF-SHA256
//! - Every save uses a fresh random nonce
//! - The plaintext file header is bound to the ciphertext as associated data
//! - Key material is zeroized on drop

use crate::error::{CoreError, CoreResult};
use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// Size of the GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;
/// Size of the per-file key derivation salt in bytes.
pub const SALT_SIZE: usize = 16;

/// Serialized size of [`KdfParams`].
pub const KDF_PARAMS_SIZE: usize = 12;

const KEY_INFO: &[u8] = b"vaultsync-file-key-v1";

/// Upper bound on the Argon2 memory cost accepted from a file header (1 GiB).
const MAX_MEMORY_KIB: u32 = 1 << 20;
/// Upper bound on Argon2 passes accepted from a file header.
const MAX_ITERATIONS: u32 = 64;
/// Upper bound on Argon2 lanes accepted from a file header.
const MAX_LANES: u32 = 16;

/// Argon2id cost used to stretch the master key.
///
/// Stored in every vault header so a file can be opened with the cost it
/// was written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub lanes: u32,
}

impl Default for KdfParams {
    /// 19 MiB, two passes, one lane.
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            lanes: 1,
        }
    }
}

impl KdfParams {
    /// Creates a parameter set.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::KeyDerivationFailed`] if Argon2 rejects the cost
    /// or it exceeds what a vault header may carry.
    pub fn new(memory_kib: u32, iterations: u32, lanes: u32) -> CoreResult<Self> {
        let params = Self {
            memory_kib,
            iterations,
            lanes,
        };
        params.argon2()?;
        Ok(params)
    }

    /// Serializes as three little-endian `u32`s.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; KDF_PARAMS_SIZE] {
        let mut out = [0u8; KDF_PARAMS_SIZE];
        out[0..4].copy_from_slice(&self.memory_kib.to_le_bytes());
        out[4..8].copy_from_slice(&self.iterations.to_le_bytes());
        out[8..12].copy_from_slice(&self.lanes.to_le_bytes());
        out
    }

    /// Parses parameters read from a vault header.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFormat`] for a cost no valid vault carries.
    pub fn from_bytes(bytes: &[u8; KDF_PARAMS_SIZE]) -> CoreResult<Self> {
        let word =
            |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        let params = Self {
            memory_kib: word(0),
            iterations: word(4),
            lanes: word(8),
        };
        params
            .argon2()
            .map_err(|_| CoreError::invalid_format(format!("bad kdf parameters {params:?}")))?;
        Ok(params)
    }

    fn argon2(&self) -> CoreResult<argon2::Argon2<'static>> {
        if self.memory_kib > MAX_MEMORY_KIB
            || self.iterations > MAX_ITERATIONS
            || self.lanes > MAX_LANES
        {
            return Err(CoreError::key_derivation_failed(format!(
                "kdf cost out of range: {self:?}"
            )));
        }
        let params = argon2::Params::new(
            self.memory_kib,
            self.iterations,
            self.lanes,
            Some(KEY_SIZE),
        )
        .map_err(|e| CoreError::key_derivation_failed(e.to_string()))?;
        Ok(argon2::Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            params,
        ))
    }
}

/// The secret that unlocks a vault.
///
/// Two copies of the same logical vault (local and remote) are expected to
/// share one master key; each file still gets its own derived key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    secret: Vec<u8>,
}

impl MasterKey {
    /// Creates a master key from a password.
    pub fn from_password(password: &str) -> Self {
        Self {
            secret: password.as_bytes().to_vec(),
        }
    }

    /// Derives the file encryption key for the given salt and cost.
    pub fn derive_file_key(
        &self,
        salt: &[u8; SALT_SIZE],
        kdf: &KdfParams,
    ) -> CoreResult<EncryptionKey> {
        use hkdf::Hkdf;
        use sha2::Sha256;

        let mut stretched = [0u8; KEY_SIZE];
        kdf.argon2()?
            .hash_password_into(&self.secret, salt, &mut stretched)
            .map_err(|e| CoreError::key_derivation_failed(e.to_string()))?;

        let hk = Hkdf::<Sha256>::new(Some(salt), &stretched);
        stretched.zeroize();

        let mut bytes = [0u8; KEY_SIZE];
        hk.expand(KEY_INFO, &mut bytes)
            .map_err(|_| CoreError::key_derivation_failed("HKDF expand failed"))?;

        Ok(EncryptionKey { bytes })
    }
}

impl PartialEq for MasterKey {
    fn eq(&self, other: &Self) -> bool {
        self.secret == other.secret
    }
}

impl Eq for MasterKey {}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Generates a fresh random salt.
#[must_use]
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Encryption key for AES-256-GCM.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Creates a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes slice is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> CoreResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CoreError::invalid_key_size(bytes.len(), KEY_SIZE));
        }

        let mut key_bytes = [0u8; KEY_SIZE];
        key_bytes.copy_from_slice(bytes);
        Ok(Self { bytes: key_bytes })
    }

    /// Returns the key as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Encrypts and decrypts vault bodies.
pub struct CryptoManager {
    cipher: Aes256Gcm,
}

impl CryptoManager {
    /// Creates a new crypto manager with the given key.
    #[must_use]
    pub fn new(key: &EncryptionKey) -> Self {
        let key_array = GenericArray::from_slice(key.as_bytes());
        let cipher = Aes256Gcm::new(key_array);
        Self { cipher }
    }

    /// Encrypts `plaintext`, authenticating `aad` alongside it.
    ///
    /// The output format is: `nonce (12 bytes) || ciphertext || tag (16 bytes)`
    pub fn encrypt_with_aad(&self, plaintext: &[u8], aad: &[u8]) -> CoreResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let payload = Payload {
            msg: plaintext,
            aad,
        };

        let ciphertext = self
            .cipher
            .encrypt(nonce, payload)
            .map_err(|_| CoreError::encryption_failed("encryption error"))?;

        let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend(ciphertext);

        Ok(result)
    }

    /// Decrypts data produced by [`encrypt_with_aad`](Self::encrypt_with_aad).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DecryptionFailed`] on a wrong key, a wrong `aad`,
    /// or any modification of the ciphertext.
    pub fn decrypt_with_aad(&self, ciphertext: &[u8], aad: &[u8]) -> CoreResult<Vec<u8>> {
        if ciphertext.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CoreError::decryption_failed("ciphertext too short"));
        }

        let nonce = Nonce::from_slice(&ciphertext[..NONCE_SIZE]);
        let payload = Payload {
            msg: &ciphertext[NONCE_SIZE..],
            aad,
        };

        self.cipher
            .decrypt(nonce, payload)
            .map_err(|_| CoreError::decryption_failed("authentication tag mismatch"))
    }
}

impl std::fmt::Debug for CryptoManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoManager")
            .field("cipher", &"Aes256Gcm")
            .finish()
    }
}
