// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Sealing of the stored access token.
//!
//! Layout: base64(nonce[24] || XChaCha20-Poly1305 ciphertext and tag). The
//! key is derived from the secret with blake3. The secret ships with the
//! application, so this only keeps the token out of casual view.

use base64::{engine::general_purpose, Engine as _};
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};

use crate::{Result, VisualError};

const KEY_CONTEXT: &str = "visual-supports 2025-01 access token key";
const AAD: &[u8] = b"visual-supports access token v2";
const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;

fn cipher_for(secret: &str) -> XChaCha20Poly1305 {
    let key = blake3::derive_key(KEY_CONTEXT, secret.as_bytes());
    XChaCha20Poly1305::new(Key::from_slice(&key))
}

/// Encrypt `token` under `secret` with a random nonce
pub fn seal(secret: &str, token: &str) -> Result<String> {
    seal_with_nonce(secret, token, &XChaCha20Poly1305::generate_nonce(&mut OsRng))
}

fn seal_with_nonce(secret: &str, token: &str, nonce: &XNonce) -> Result<String> {
    let body = cipher_for(secret)
        .encrypt(nonce, Payload { msg: token.as_bytes(), aad: AAD })
        .map_err(|_| VisualError::Config("Could not encrypt access token".to_string()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + body.len());
    out.extend_from_slice(nonce);
    out.extend_from_slice(&body);
    Ok(general_purpose::STANDARD.encode(out))
}

/// Decrypt a sealed token; a wrong secret fails authentication
pub fn open(secret: &str, sealed: &str) -> Result<String> {
    let raw = general_purpose::STANDARD
        .decode(sealed.trim())
        .map_err(|e| VisualError::Auth(format!("Malformed ciphertext: {}", e)))?;
    if raw.len() < NONCE_LEN + TAG_LEN {
        return Err(VisualError::Auth("Malformed ciphertext: too short".to_string()));
    }

    let (nonce, body) = raw.split_at(NONCE_LEN);
    let plain = cipher_for(secret)
        .decrypt(XNonce::from_slice(nonce), Payload { msg: body, aad: AAD })
        .map_err(|_| VisualError::Auth("Could not decrypt access token".to_string()))?;
    String::from_utf8(plain)
        .map_err(|_| VisualError::Auth("Decrypted token is not valid UTF-8".to_string()))
}
