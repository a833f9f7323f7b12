//! HMAC-SHA256 signing with optional AES-256-GCM encryption.
//!
//! Encoded format: `base64url(date|value|mac)` where
//! `value = base64url(payload)` (payload encrypted when a block key is set)
//! and `mac = HMAC(hash_key, name|date|value)`. Binding the cookie name into
//! the MAC stops a value minted for one name being replayed under another.
//! The date is checked against the codec's max age on decode.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::{ConfigError, DEFAULT_MAX_AGE};

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 12;
const DEFAULT_MAX_LENGTH: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("no codecs configured")]
    NoCodecs,

    #[error("the value is not valid: malformed payload")]
    Malformed,

    #[error("the value is not valid: signature mismatch")]
    InvalidSignature,

    #[error("expired timestamp")]
    Expired,

    #[error("the value is too long: {0} bytes")]
    ValueTooLong(usize),

    #[error("encryption failed")]
    Encryption,

    #[error("decryption failed")]
    Decryption,
}

/// A signing/encryption key pair. The block key enables encryption.
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub hash_key: Vec<u8>,
    pub block_key: Option<Vec<u8>>,
}

impl KeyPair {
    pub fn signing(hash_key: impl Into<Vec<u8>>) -> Self {
        Self {
            hash_key: hash_key.into(),
            block_key: None,
        }
    }
}

/// Codecs whose decoded values carry an age ceiling.
pub trait AgeLimited {
    fn max_age(&self) -> i64;
    fn set_max_age(&mut self, secs: i64);
}

/// Turns named values into web-safe strings and back.
pub trait Codec: Send + Sync {
    fn encode(&self, name: &str, value: &[u8]) -> Result<String, CodecError>;

    fn decode(&self, name: &str, value: &str) -> Result<Vec<u8>, CodecError>;

    /// The age-ceiling capability, if this codec has one.
    fn as_age_limited(&mut self) -> Option<&mut dyn AgeLimited> {
        None
    }
}

/// Signed (and optionally encrypted) values with a timestamp.
pub struct SecureCookie {
    hash_key: Vec<u8>,
    cipher: Option<Aes256Gcm>,
    max_age: i64,
    max_length: usize,
}

impl SecureCookie {
    pub fn new(hash_key: &[u8], block_key: Option<&[u8]>) -> Result<Self, ConfigError> {
        if hash_key.is_empty() {
            return Err(ConfigError::EmptyHashKey);
        }
        let cipher = match block_key {
            Some(key) => Some(
                Aes256Gcm::new_from_slice(key)
                    .map_err(|_| ConfigError::InvalidBlockKey(key.len()))?,
            ),
            None => None,
        };
        Ok(Self {
            hash_key: hash_key.to_vec(),
            cipher,
            max_age: DEFAULT_MAX_AGE,
            max_length: DEFAULT_MAX_LENGTH,
        })
    }

    fn mac(&self, name: &str, date: &[u8], value: &[u8]) -> HmacSha256 {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.hash_key)
            .expect("HMAC key length is always valid");
        mac.update(name.as_bytes());
        mac.update(b"|");
        mac.update(date);
        mac.update(b"|");
        mac.update(value);
        mac
    }

    fn encrypt(&self, value: &[u8]) -> Result<Vec<u8>, CodecError> {
        let Some(cipher) = &self.cipher else {
            return Ok(value.to_vec());
        };
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, value)
            .map_err(|_| CodecError::Encryption)?;
        let mut out = nonce.to_vec();
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn decrypt(&self, value: &[u8]) -> Result<Vec<u8>, CodecError> {
        let Some(cipher) = &self.cipher else {
            return Ok(value.to_vec());
        };
        if value.len() < NONCE_LEN {
            return Err(CodecError::Decryption);
        }
        let (nonce, ciphertext) = value.split_at(NONCE_LEN);
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CodecError::Decryption)
    }

    fn encode_at(&self, name: &str, value: &[u8], timestamp: i64) -> Result<String, CodecError> {
        let value = URL_SAFE_NO_PAD.encode(self.encrypt(value)?);
        let date = timestamp.to_string();
        let signature = self
            .mac(name, date.as_bytes(), value.as_bytes())
            .finalize()
            .into_bytes();

        let mut payload = Vec::with_capacity(date.len() + value.len() + signature.len() + 2);
        payload.extend_from_slice(date.as_bytes());
        payload.push(b'|');
        payload.extend_from_slice(value.as_bytes());
        payload.push(b'|');
        payload.extend_from_slice(&signature);

        let encoded = URL_SAFE_NO_PAD.encode(payload);
        if self.max_length != 0 && encoded.len() > self.max_length {
            return Err(CodecError::ValueTooLong(encoded.len()));
        }
        Ok(encoded)
    }

    fn decode_at(&self, name: &str, value: &str, now: i64) -> Result<Vec<u8>, CodecError> {
        if self.max_length != 0 && value.len() > self.max_length {
            return Err(CodecError::ValueTooLong(value.len()));
        }
        let payload = URL_SAFE_NO_PAD
            .decode(value)
            .map_err(|_| CodecError::Malformed)?;

        let mut parts = payload.splitn(3, |b| *b == b'|');
        let (Some(date), Some(value), Some(signature)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(CodecError::Malformed);
        };

        self.mac(name, date, value)
            .verify_slice(signature)
            .map_err(|_| CodecError::InvalidSignature)?;

        let timestamp = std::str::from_utf8(date)
            .ok()
            .and_then(|d| d.parse::<i64>().ok())
            .ok_or(CodecError::Malformed)?;
        if self.max_age != 0 && timestamp < now.saturating_sub(self.max_age) {
            return Err(CodecError::Expired);
        }

        let value = URL_SAFE_NO_PAD
            .decode(value)
            .map_err(|_| CodecError::Malformed)?;
        self.decrypt(&value)
    }
}

impl Codec for SecureCookie {
    fn encode(&self, name: &str, value: &[u8]) -> Result<String, CodecError> {
        self.encode_at(name, value, chrono::Utc::now().timestamp())
    }

    fn decode(&self, name: &str, value: &str) -> Result<Vec<u8>, CodecError> {
        self.decode_at(name, value, chrono::Utc::now().timestamp())
    }

    fn as_age_limited(&mut self) -> Option<&mut dyn AgeLimited> {
        Some(self)
    }
}

impl AgeLimited for SecureCookie {
    fn max_age(&self) -> i64 {
        self.max_age
    }

    fn set_max_age(&mut self, secs: i64) {
        self.max_age = secs;
    }
}

/// Build one codec per key pair, in the order given.
pub fn codecs_from_pairs(pairs: &[KeyPair]) -> Result<Vec<Box<dyn Codec>>, ConfigError> {
    if pairs.is_empty() {
        return Err(ConfigError::NoKeys);
    }
    pairs
        .iter()
        .map(|pair| {
            SecureCookie::new(&pair.hash_key, pair.block_key.as_deref())
                .map(|codec| Box::new(codec) as Box<dyn Codec>)
        })
        .collect()
}

/// Encode with the first codec that succeeds.
pub fn encode_multi(
    name: &str,
    value: &[u8],
    codecs: &[Box<dyn Codec>],
) -> Result<String, CodecError> {
    let mut last = CodecError::NoCodecs;
    for codec in codecs {
        match codec.encode(name, value) {
            Ok(encoded) => return Ok(encoded),
            Err(e) => last = e,
        }
    }
    Err(last)
}

/// Decode with the first codec that accepts the value, so older keys keep
/// working after rotation.
pub fn decode_multi(
    name: &str,
    value: &str,
    codecs: &[Box<dyn Codec>],
) -> Result<Vec<u8>, CodecError> {
    let mut last = CodecError::NoCodecs;
    for codec in codecs {
        match codec.decode(name, value) {
            Ok(decoded) => return Ok(decoded),
            Err(e) => last = e,
        }
    }
    Err(last)
}
