/*
 * client.rs
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

//! HTTP connection over TLS and the network-backed `Transport`.
//!
//! One persistent keep-alive connection per transport; a request that fails
//! on a reused connection is replayed once on a fresh one (the server may
//! have closed the idle connection between pages).

use bytes::BytesMut;
use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

use crate::error::RemoteError;
use crate::http::parser::ResponseParser;
use crate::http::request::Request;
use crate::http::response::HttpResponse;
use crate::http::Transport;
use crate::net::connect_tls;

const USER_AGENT: &str = concat!("scadenziario/", env!("CARGO_PKG_VERSION"));

/// One TLS connection. Sends a request, reads the complete response.
pub struct HttpConnection {
    stream: TlsStream<TcpStream>,
    host: String,
    port: u16,
    read_buf: BytesMut,
}

impl HttpConnection {
    pub async fn open(host: &str, port: u16) -> io::Result<Self> {
        let stream = connect_tls(host, port).await?;
        Ok(Self {
            stream,
            host: host.to_string(),
            port,
            read_buf: BytesMut::with_capacity(8192),
        })
    }

    /// Send the request and read until the response is complete.
    pub async fn send(&mut self, request: &Request) -> io::Result<HttpResponse> {
        self.write_request(request).await?;

        let mut parser = ResponseParser::new();
        // Leftover bytes from a previous exchange would be a framing bug;
        // each response is consumed fully, so start clean.
        self.read_buf.clear();
        loop {
            let mut tmp = [0u8; 8192];
            let n = self.stream.read(&mut tmp).await?;
            if n == 0 {
                parser.finish_eof()?;
                return Ok(parser.take_response());
            }
            self.read_buf.extend_from_slice(&tmp[..n]);
            parser.feed(&mut self.read_buf)?;
            if parser.is_done() {
                return Ok(parser.take_response());
            }
        }
    }

    async fn write_request(&mut self, request: &Request) -> io::Result<()> {
        let host_header = if self.port != 443 {
            format!("{}:{}", self.host, self.port)
        } else {
            self.host.clone()
        };
        let mut head = format!(
            "{} {} HTTP/1.1\r\nHost: {}\r\nUser-Agent: {}\r\nConnection: keep-alive\r\n",
            request.method.as_str(),
            request.path,
            host_header,
            USER_AGENT,
        );
        for (k, v) in &request.headers {
            head.push_str(k);
            head.push_str(": ");
            head.push_str(v);
            head.push_str("\r\n");
        }
        if let Some(body) = &request.body {
            if request.header_value("content-length").is_none() {
                head.push_str(&format!("Content-Length: {}\r\n", body.len()));
            }
        }
        head.push_str("\r\n");
        self.stream.write_all(head.as_bytes()).await?;
        if let Some(body) = &request.body {
            self.stream.write_all(body).await?;
        }
        self.stream.flush().await
    }
}

/// Network transport bound to one host. Holds the keep-alive connection.
pub struct HttpsTransport {
    host: String,
    port: u16,
    conn: tokio::sync::Mutex<Option<HttpConnection>>,
}

impl HttpsTransport {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            conn: tokio::sync::Mutex::new(None),
        }
    }
}

#[async_trait]
impl Transport for HttpsTransport {
    async fn send(&self, request: Request) -> Result<HttpResponse, RemoteError> {
        let mut guard = self.conn.lock().await;
        let reused = guard.is_some();
        if guard.is_none() {
            *guard = Some(HttpConnection::open(&self.host, self.port).await?);
        }
        let result = guard.as_mut().expect("connection present").send(&request).await;
        let response = match result {
            Ok(r) => r,
            Err(e) if reused => {
                // Idle keep-alive connection was closed server-side; one
                // fresh attempt.
                tracing::debug!(host = %self.host, error = %e, "reconnecting stale connection");
                *guard = None;
                let mut fresh = HttpConnection::open(&self.host, self.port).await?;
                let response = fresh.send(&request).await?;
                *guard = Some(fresh);
                response
            }
            Err(e) => {
                *guard = None;
                return Err(RemoteError::Io(e));
            }
        };
        if response
            .header("connection")
            .is_some_and(|v| v.eq_ignore_ascii_case("close"))
        {
            *guard = None;
        }
        Ok(response)
    }
}
