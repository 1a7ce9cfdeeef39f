/*
 * error.rs
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

//! Pipeline errors.
//!
//! Lower layers raise the narrow types (`RemoteError`, `AuthError`, ...);
//! the top-level `Error` wraps them and its `Display` names the stage that
//! failed. No layer translates another layer's error.

use std::fmt;
use std::io;
use std::path::PathBuf;

// ── RemoteError ───────────────────────────────────────────────────────

/// Failure talking to the remote mail service. Raised by the HTTP layer
/// after the retry budget is exhausted, or immediately for non-retryable
/// statuses.
#[derive(Debug)]
pub enum RemoteError {
    /// The service answered with a non-success status.
    Status { status: u16, body: String },
    /// The request never produced a response (connect, TLS, or read failure).
    Io(io::Error),
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteError::Status { status, body } => {
                let body = body.trim();
                if body.is_empty() {
                    write!(f, "service returned {}", status)
                } else {
                    write!(f, "service returned {}: {}", status, body)
                }
            }
            RemoteError::Io(e) => write!(f, "request failed: {}", e),
        }
    }
}

impl std::error::Error for RemoteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RemoteError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for RemoteError {
    fn from(e: io::Error) -> Self {
        RemoteError::Io(e)
    }
}

// ── AuthError ─────────────────────────────────────────────────────────

/// Authentication failure. Fatal for the run; the user must complete (or
/// redo) the interactive device-code login.
#[derive(Debug)]
pub enum AuthError {
    /// No usable token in the cache; interactive login has not been done.
    NotLoggedIn,
    /// The authorization server rejected the request (bad client id,
    /// declined consent, expired device code, ...).
    Rejected(String),
    /// Transport or protocol failure while talking to the authorization
    /// server.
    Transport(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::NotLoggedIn => {
                write!(f, "not logged in; run the interactive login first")
            }
            AuthError::Rejected(m) => write!(f, "authorization server rejected the request: {}", m),
            AuthError::Transport(m) => write!(f, "could not reach the authorization server: {}", m),
        }
    }
}

impl std::error::Error for AuthError {}

// ── FolderNotFound ────────────────────────────────────────────────────

/// A folder path segment had no matching child folder. Names exactly the
/// missing segment and the folder it was searched under.
#[derive(Debug)]
pub struct FolderNotFound {
    pub segment: String,
    pub parent: String,
}

impl fmt::Display for FolderNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "folder '{}' not found under '{}'",
            self.segment, self.parent
        )
    }
}

impl std::error::Error for FolderNotFound {}

// ── SinkError ─────────────────────────────────────────────────────────

/// Failure writing the export output. Terminal, never retried.
#[derive(Debug)]
pub enum SinkError {
    /// The target could not be replaced, most likely because another
    /// program holds it open.
    Busy(PathBuf),
    Io(io::Error),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Busy(p) => write!(
                f,
                "cannot write '{}': the file may be open in another program",
                p.display()
            ),
            SinkError::Io(e) => write!(f, "write failed: {}", e),
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SinkError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SinkError {
    fn from(e: io::Error) -> Self {
        SinkError::Io(e)
    }
}

// ── ConfigError ───────────────────────────────────────────────────────

/// Invalid configuration, detected before the pipeline starts.
#[derive(Debug)]
pub struct ConfigError(String);

impl ConfigError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ConfigError {}

// ── Error ─────────────────────────────────────────────────────────────

/// Top-level pipeline error. `Display` identifies the failing stage.
#[derive(Debug)]
pub enum Error {
    Config(ConfigError),
    Auth(AuthError),
    Remote(RemoteError),
    FolderNotFound(FolderNotFound),
    Sink(SinkError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "configuration: {}", e),
            Error::Auth(e) => write!(f, "authentication: {}", e),
            Error::Remote(e) => write!(f, "remote service: {}", e),
            Error::FolderNotFound(e) => write!(f, "folder resolution: {}", e),
            Error::Sink(e) => write!(f, "export: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(e) => Some(e),
            Error::Auth(e) => Some(e),
            Error::Remote(e) => Some(e),
            Error::FolderNotFound(e) => Some(e),
            Error::Sink(e) => Some(e),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<AuthError> for Error {
    fn from(e: AuthError) -> Self {
        Error::Auth(e)
    }
}

impl From<RemoteError> for Error {
    fn from(e: RemoteError) -> Self {
        Error::Remote(e)
    }
}

impl From<FolderNotFound> for Error {
    fn from(e: FolderNotFound) -> Self {
        Error::FolderNotFound(e)
    }
}

impl From<SinkError> for Error {
    fn from(e: SinkError) -> Self {
        Error::Sink(e)
    }
}
