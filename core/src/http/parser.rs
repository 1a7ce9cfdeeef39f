/*
 * parser.rs
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

//! HTTP/1.1 response state-machine parser: status line, headers, body
//! (Content-Length, chunked, or read-until-close). Feeds from the
//! connection's read buffer and accumulates a complete `HttpResponse`.

use bytes::{Buf, BytesMut};
use std::io;

use crate::http::response::HttpResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    StatusLine,
    Headers,
    Body,
    ChunkSize,
    ChunkData,
    ChunkCrlf,
    ChunkTrailer,
    Done,
}

/// Accumulating parser for one response. Create per exchange, `feed` bytes
/// as they arrive, then `take_response` once `is_done`.
pub struct ResponseParser {
    state: ParseState,
    status: u16,
    reason: Option<String>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    /// Remaining Content-Length body bytes; -1 means read until close.
    content_remaining: i64,
    chunk_remaining: usize,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::StatusLine,
            status: 0,
            reason: None,
            headers: Vec::new(),
            body: Vec::new(),
            content_remaining: -1,
            chunk_remaining: 0,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == ParseState::Done
    }

    /// True once the parser is consuming a body delimited only by
    /// connection close.
    pub fn reading_until_close(&self) -> bool {
        self.state == ParseState::Body && self.content_remaining < 0
    }

    /// Signal end of stream. Completes a read-until-close body; any other
    /// unfinished state is an error.
    pub fn finish_eof(&mut self) -> io::Result<()> {
        if self.reading_until_close() {
            self.state = ParseState::Done;
            Ok(())
        } else if self.is_done() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed mid-response",
            ))
        }
    }

    pub fn take_response(self) -> HttpResponse {
        HttpResponse {
            status: self.status,
            reason: self.reason,
            headers: self.headers,
            body: self.body,
        }
    }

    /// Find CRLF; returns bytes before it, or None if not yet buffered.
    fn find_crlf(buf: &[u8]) -> Option<usize> {
        buf.windows(2).position(|w| w == b"\r\n")
    }

    /// Consume as much as possible from `buf`.
    pub fn feed(&mut self, buf: &mut BytesMut) -> io::Result<()> {
        loop {
            match self.state {
                ParseState::StatusLine => {
                    let line_end = match Self::find_crlf(buf) {
                        Some(n) => n,
                        None => return Ok(()),
                    };
                    let line = buf.split_to(line_end + 2);
                    let line_str = std::str::from_utf8(&line[..line_end]).map_err(|_| {
                        io::Error::new(io::ErrorKind::InvalidData, "invalid status line")
                    })?;
                    // HTTP/1.1 200 OK (reason optional)
                    let mut parts = line_str.splitn(3, ' ');
                    let _version = parts.next();
                    self.status = parts
                        .next()
                        .and_then(|s| s.parse::<u16>().ok())
                        .ok_or_else(|| {
                            io::Error::new(io::ErrorKind::InvalidData, "invalid status code")
                        })?;
                    self.reason = parts.next().map(|s| s.to_string());
                    self.state = ParseState::Headers;
                }
                ParseState::Headers => {
                    let line_end = match Self::find_crlf(buf) {
                        Some(n) => n,
                        None => return Ok(()),
                    };
                    if line_end == 0 {
                        buf.advance(2);
                        self.begin_body();
                        continue;
                    }
                    let line = buf.split_to(line_end + 2);
                    let line_str = std::str::from_utf8(&line[..line_end]).map_err(|_| {
                        io::Error::new(io::ErrorKind::InvalidData, "invalid header")
                    })?;
                    if let Some(colon) = line_str.find(':') {
                        let name = line_str[..colon].trim().to_string();
                        let value = line_str[colon + 1..].trim().to_string();
                        self.headers.push((name, value));
                    }
                }
                ParseState::Body => {
                    if self.content_remaining >= 0 {
                        let to_read = (self.content_remaining as usize).min(buf.len());
                        if to_read > 0 {
                            let chunk = buf.split_to(to_read);
                            self.body.extend_from_slice(&chunk);
                            self.content_remaining -= to_read as i64;
                        }
                        if self.content_remaining == 0 {
                            self.state = ParseState::Done;
                        }
                        if buf.is_empty() || self.state == ParseState::Done {
                            return Ok(());
                        }
                    } else {
                        // Read until close; finish_eof() completes this.
                        if !buf.is_empty() {
                            let chunk = buf.split_to(buf.len());
                            self.body.extend_from_slice(&chunk);
                        }
                        return Ok(());
                    }
                }
                ParseState::ChunkSize => {
                    let line_end = match Self::find_crlf(buf) {
                        Some(n) => n,
                        None => return Ok(()),
                    };
                    let line = buf.split_to(line_end + 2);
                    let line_str = std::str::from_utf8(&line[..line_end]).map_err(|_| {
                        io::Error::new(io::ErrorKind::InvalidData, "invalid chunk size")
                    })?;
                    let hex_part = line_str.split(';').next().unwrap_or(line_str).trim();
                    let size = usize::from_str_radix(hex_part, 16).map_err(|_| {
                        io::Error::new(io::ErrorKind::InvalidData, "invalid chunk size")
                    })?;
                    if size == 0 {
                        self.state = ParseState::ChunkTrailer;
                    } else {
                        self.chunk_remaining = size;
                        self.state = ParseState::ChunkData;
                    }
                }
                ParseState::ChunkData => {
                    let to_read = self.chunk_remaining.min(buf.len());
                    if to_read > 0 {
                        let chunk = buf.split_to(to_read);
                        self.body.extend_from_slice(&chunk);
                        self.chunk_remaining -= to_read;
                    }
                    if self.chunk_remaining == 0 {
                        self.state = ParseState::ChunkCrlf;
                    } else {
                        return Ok(());
                    }
                }
                ParseState::ChunkCrlf => {
                    if buf.len() < 2 {
                        return Ok(());
                    }
                    buf.advance(2);
                    self.state = ParseState::ChunkSize;
                }
                ParseState::ChunkTrailer => {
                    let line_end = match Self::find_crlf(buf) {
                        Some(n) => n,
                        None => return Ok(()),
                    };
                    // Trailer headers are dropped; the blank line ends the response.
                    buf.advance(line_end + 2);
                    if line_end == 0 {
                        self.state = ParseState::Done;
                        return Ok(());
                    }
                }
                ParseState::Done => return Ok(()),
            }
        }
    }

    /// Decide the body framing once the blank line after headers arrives.
    fn begin_body(&mut self) {
        let chunked = self
            .headers
            .iter()
            .any(|(k, v)| k.eq_ignore_ascii_case("transfer-encoding") && v.contains("chunked"));
        let content_length = self
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.trim().parse::<i64>().ok());

        let bodyless = self.status == 204 || self.status == 304 || self.status / 100 == 1;
        if bodyless {
            self.state = ParseState::Done;
        } else if chunked {
            self.state = ParseState::ChunkSize;
        } else if let Some(cl) = content_length {
            if cl == 0 {
                self.state = ParseState::Done;
            } else {
                self.content_remaining = cl;
                self.state = ParseState::Body;
            }
        } else {
            self.content_remaining = -1;
            self.state = ParseState::Body;
        }
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}
