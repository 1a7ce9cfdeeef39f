/*
 * token_store.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Scadenziario, a mailbox date-extraction exporter.
 *
 * Scadenziario is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Scadenziario is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Scadenziario.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Token cache with transparent refresh.
//!
//! Tokens live in an encrypted file: magic "SCENC" + 24-byte nonce +
//! XChaCha20-Poly1305 ciphertext of a JSON blob, with the key in a sibling
//! `.key` file (mode 0600). `get`-style access goes through the
//! `TokenProvider` trait so the pipeline can be driven by a fake in tests;
//! refresh happens automatically inside the provider when the access token
//! is within the expiry threshold.

use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::XChaCha20Poly1305;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::oauth::flow::{refresh_access_token, OAuthTokens};
use crate::oauth::provider::OAuthProvider;

#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

/// Magic header for the encrypted cache file (5 bytes).
const ENCRYPTED_MAGIC: &[u8] = b"SCENC";
const NONCE_LEN: usize = 24;
const KEY_LEN: usize = 32;

/// Refresh the token when it expires within this window.
const REFRESH_THRESHOLD_SECS: i64 = 300; // 5 minutes

/// Cached token data, serialized as JSON inside the encrypted file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenCacheEntry {
    pub provider: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Unix timestamp (seconds) when the access token expires.
    pub expires_at: i64,
    #[serde(default)]
    pub scopes: String,
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

impl TokenCacheEntry {
    pub fn from_tokens(provider_id: &str, tokens: &OAuthTokens, scopes: &str) -> Self {
        Self {
            provider: provider_id.to_string(),
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone().unwrap_or_default(),
            expires_at: now_secs() + tokens.expires_in.unwrap_or(3600) as i64,
            scopes: scopes.to_string(),
        }
    }

    /// True if the access token is expired or expires within the threshold.
    pub fn is_expired(&self) -> bool {
        now_secs() >= self.expires_at - REFRESH_THRESHOLD_SECS
    }
}

// ── Encrypted file I/O ────────────────────────────────────────────────

fn key_path(cache_path: &Path) -> Option<PathBuf> {
    cache_path.parent().map(|p| p.join(".key"))
}

fn read_key(key_path: &Path) -> Result<[u8; KEY_LEN], String> {
    let buf = fs::read(key_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            "encrypted token cache but key file not found".to_string()
        } else {
            e.to_string()
        }
    })?;
    if buf.len() != KEY_LEN {
        return Err("key file has wrong length".to_string());
    }
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&buf[..KEY_LEN]);
    Ok(key)
}

/// Read 32 bytes if present, otherwise generate with getrandom and write
/// (mode 0o600, parent 0o700).
fn get_or_create_key(key_path: &Path, parent_dir: &Path) -> Result<[u8; KEY_LEN], String> {
    match read_key(key_path) {
        Ok(key) => return Ok(key),
        Err(e) if e.contains("not found") => {}
        Err(e) => return Err(e),
    }
    fs::create_dir_all(parent_dir).map_err(|e| e.to_string())?;
    #[cfg(unix)]
    drop(fs::set_permissions(parent_dir, PermissionsExt::from_mode(0o700)));
    let mut key = [0u8; KEY_LEN];
    getrandom::getrandom(&mut key).map_err(|e| e.to_string())?;
    let mut f = open_private_file(key_path).map_err(|e| e.to_string())?;
    f.write_all(&key).map_err(|e| e.to_string())?;
    f.flush().map_err(|e| e.to_string())?;
    Ok(key)
}

/// Open a file for writing with owner-only permissions on Unix.
fn open_private_file(path: &Path) -> Result<File, std::io::Error> {
    #[cfg(unix)]
    {
        use std::fs::OpenOptions;
        OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .mode(0o600)
            .open(path)
    }
    #[cfg(not(unix))]
    {
        File::create(path)
    }
}

/// Load the cache entry. Missing file is `None`; a corrupt or undecryptable
/// file is an error (the caller decides whether to force a fresh login).
pub fn load_cache(path: &Path) -> Result<Option<TokenCacheEntry>, String> {
    let raw = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.to_string()),
    };
    if !raw.starts_with(ENCRYPTED_MAGIC) {
        return Err("token cache is not in the expected format".to_string());
    }
    if raw.len() < ENCRYPTED_MAGIC.len() + NONCE_LEN + 16 {
        return Err("encrypted token cache too short".to_string());
    }
    let key_path = key_path(path).ok_or("no parent for cache path")?;
    let key = read_key(&key_path)?;
    let cipher = XChaCha20Poly1305::new_from_slice(&key).map_err(|e| e.to_string())?;
    let nonce_slice = &raw[ENCRYPTED_MAGIC.len()..ENCRYPTED_MAGIC.len() + NONCE_LEN];
    let nonce = chacha20poly1305::XNonce::from_slice(nonce_slice);
    let ciphertext = &raw[ENCRYPTED_MAGIC.len() + NONCE_LEN..];
    let plain = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| "decryption failed (wrong key or tampered file)".to_string())?;
    let entry: TokenCacheEntry =
        serde_json::from_slice(&plain).map_err(|e| format!("invalid token cache JSON: {}", e))?;
    Ok(Some(entry))
}

/// Write the cache entry encrypted. Key is created on first use.
pub fn save_cache(path: &Path, entry: &TokenCacheEntry) -> Result<(), String> {
    let plain = serde_json::to_vec(entry).map_err(|e| e.to_string())?;
    let parent = path.parent().ok_or("no parent dir")?;
    let key_path = key_path(path).ok_or("no parent for cache path")?;
    let key = get_or_create_key(&key_path, parent)?;
    let cipher = XChaCha20Poly1305::new_from_slice(&key).map_err(|e| e.to_string())?;
    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plain.as_ref())
        .map_err(|e| e.to_string())?;
    let mut f = open_private_file(path).map_err(|e| e.to_string())?;
    f.write_all(ENCRYPTED_MAGIC).map_err(|e| e.to_string())?;
    f.write_all(nonce.as_slice()).map_err(|e| e.to_string())?;
    f.write_all(&ciphertext).map_err(|e| e.to_string())?;
    f.flush().map_err(|e| e.to_string())?;
    Ok(())
}

/// Remove the cache and key files. No-op when absent.
pub fn clear_cache(path: &Path) {
    let _ = fs::remove_file(path);
    if let Some(kp) = key_path(path) {
        let _ = fs::remove_file(&kp);
    }
}

// ── TokenProvider ─────────────────────────────────────────────────────

/// Capability consumed by the pipeline: a valid bearer token on demand.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn bearer_token(&self) -> Result<String, AuthError>;
}

/// Token provider backed by the encrypted cache, refreshing transparently.
/// Never initiates the interactive grant: with no usable cache entry it
/// fails with `AuthError::NotLoggedIn` and the shell runs the device flow.
pub struct CachedTokenProvider<P: OAuthProvider> {
    provider: P,
    cache_path: PathBuf,
    entry: tokio::sync::Mutex<Option<TokenCacheEntry>>,
}

impl<P: OAuthProvider> CachedTokenProvider<P> {
    pub fn new(provider: P, cache_path: PathBuf) -> Self {
        Self {
            provider,
            cache_path,
            entry: tokio::sync::Mutex::new(None),
        }
    }

    /// True when a cache entry exists on disk, whether or not it is stale.
    pub fn has_cached_login(&self) -> bool {
        matches!(load_cache(&self.cache_path), Ok(Some(_)))
    }

    /// Persist tokens obtained from the interactive grant (called by the
    /// shell after `flow::poll_for_tokens`).
    pub async fn store_tokens(&self, tokens: &OAuthTokens) -> Result<(), AuthError> {
        let entry = TokenCacheEntry::from_tokens(
            self.provider.provider_id(),
            tokens,
            &self.provider.scopes().join(" "),
        );
        save_cache(&self.cache_path, &entry).map_err(AuthError::Transport)?;
        *self.entry.lock().await = Some(entry);
        Ok(())
    }
}

#[async_trait]
impl<P: OAuthProvider> TokenProvider for CachedTokenProvider<P> {
    async fn bearer_token(&self) -> Result<String, AuthError> {
        let mut guard = self.entry.lock().await;
        if guard.is_none() {
            *guard = load_cache(&self.cache_path).map_err(AuthError::Transport)?;
        }
        let entry = guard.as_mut().ok_or(AuthError::NotLoggedIn)?;

        if !entry.is_expired() {
            return Ok(entry.access_token.clone());
        }
        if entry.refresh_token.is_empty() {
            return Err(AuthError::NotLoggedIn);
        }

        tracing::debug!("access token near expiry; refreshing");
        let tokens = refresh_access_token(&self.provider, &entry.refresh_token).await?;
        entry.access_token = tokens.access_token.clone();
        entry.expires_at = now_secs() + tokens.expires_in.unwrap_or(3600) as i64;
        if let Some(rt) = tokens.refresh_token {
            entry.refresh_token = rt;
        }
        save_cache(&self.cache_path, entry).map_err(AuthError::Transport)?;
        Ok(entry.access_token.clone())
    }
}
