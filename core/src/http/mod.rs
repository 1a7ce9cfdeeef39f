/*
 * mod.rs
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

//! HTTP/1.1 client over TLS with buffered responses.
//!
//! The remote API speaks small JSON documents, so responses are collected
//! whole into `HttpResponse` rather than streamed. The `Transport` trait is
//! the seam the rest of the crate talks through; tests substitute a scripted
//! fake with no network.

mod client;
mod parser;
mod request;
mod response;

use async_trait::async_trait;

use crate::error::RemoteError;

pub use client::{HttpConnection, HttpsTransport};
pub use request::{Method, Request};
pub use response::HttpResponse;

/// One HTTP exchange. Implementations own connection management; retry
/// belongs to the layer above (`retry::RetryingClient`).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<HttpResponse, RemoteError>;
}

/// Shared handles delegate, so a caller can keep a reference to a transport
/// it hands to the client (tests inspect the request log this way).
#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(&self, request: Request) -> Result<HttpResponse, RemoteError> {
        (**self).send(request).await
    }
}

/// Split an `https://` URL into (host, port, path-and-query). The remote
/// API's continuation links are absolute URLs; the request layer needs them
/// relative to the connection's host.
pub fn parse_https_url(url: &str) -> Result<(String, u16, String), RemoteError> {
    let rest = url.strip_prefix("https://").ok_or_else(|| {
        RemoteError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("expected https:// URL: {}", url),
        ))
    })?;
    let (host_port, path) = match rest.find('/') {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, "/"),
    };
    let (host, port) = match host_port.find(':') {
        Some(i) => {
            let port = host_port[i + 1..].parse::<u16>().map_err(|_| {
                RemoteError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("invalid port in URL: {}", url),
                ))
            })?;
            (&host_port[..i], port)
        }
        None => (host_port, 443),
    };
    Ok((host.to_string(), port, path.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_https_url() {
        let (host, port, path) =
            parse_https_url("https://graph.microsoft.com/v1.0/me/messages?$top=50").unwrap();
        assert_eq!(host, "graph.microsoft.com");
        assert_eq!(port, 443);
        assert_eq!(path, "/v1.0/me/messages?$top=50");

        let (host, port, path) = parse_https_url("https://example.com:8443").unwrap();
        assert_eq!(host, "example.com");
        assert_eq!(port, 8443);
        assert_eq!(path, "/");

        assert!(parse_https_url("http://example.com/").is_err());
    }
}
