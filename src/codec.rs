use std::sync::atomic::{AtomicU64, Ordering};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::sign::Signer;
use rand::Rng;

use crate::error::CodecError;

/// Length of a hex encoded 128-bit digest.
pub const CRAM_DIGEST_LEN: usize = 32;

static CHALLENGE_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn decode_base64(s: &str) -> Result<Vec<u8>, CodecError> {
    STANDARD
        .decode(s.trim())
        .map_err(|_| CodecError::InvalidBase64)
}

pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainCredentials {
    pub authzid: String,
    pub authcid: String,
    pub password: String,
}

/// `authzid NUL authcid NUL password`. Exactly two separators.
pub fn decode_plain(bytes: &[u8]) -> Result<PlainCredentials, CodecError> {
    let parts: Vec<&[u8]> = bytes.split(|&b| b == 0).collect();
    match parts.as_slice() {
        [authzid, authcid, password] => Ok(PlainCredentials {
            authzid: String::from_utf8_lossy(authzid).into_owned(),
            authcid: String::from_utf8_lossy(authcid).into_owned(),
            password: String::from_utf8_lossy(password).into_owned(),
        }),
        _ => Err(CodecError::MalformedPlain),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CramResponse {
    pub username: String,
    pub digest: String,
}

/// `username SP hexdigest`, split on the first space.
pub fn decode_cram_response(bytes: &[u8]) -> Result<CramResponse, CodecError> {
    let pos = bytes
        .iter()
        .position(|&b| b == b' ')
        .ok_or(CodecError::MalformedCram)?;
    let (username, digest) = (&bytes[..pos], &bytes[pos + 1..]);
    if digest.len() != CRAM_DIGEST_LEN || !digest.iter().all(u8::is_ascii_hexdigit) {
        return Err(CodecError::MalformedCram);
    }
    Ok(CramResponse {
        username: String::from_utf8_lossy(username).into_owned(),
        digest: String::from_utf8_lossy(digest).to_ascii_lowercase(),
    })
}

/// Fresh `<random.counter.timestamp@domain>` token, unique per call within a process.
pub fn generate_cram_challenge(domain_tag: &str) -> Vec<u8> {
    let seq = CHALLENGE_COUNTER.fetch_add(1, Ordering::Relaxed);
    let nonce: u32 = rand::thread_rng().gen();
    format!(
        "<{}.{}.{}@{}>",
        nonce,
        seq,
        Utc::now().timestamp(),
        domain_tag
    )
    .into_bytes()
}

/// HMAC-MD5 of the raw challenge keyed by the secret, as a client computes it.
pub fn cram_md5_digest(secret: &[u8], challenge: &[u8]) -> Result<String, ErrorStack> {
    let key = PKey::hmac(secret)?;
    let mut signer = Signer::new(MessageDigest::md5(), &key)?;
    signer.update(challenge)?;
    let mac = signer.sign_to_vec()?;
    Ok(hex::encode(mac))
}
