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

//! Push-event JSON parsing for API response bodies.
//!
//! Responses are buffered whole before parsing, so the parser takes one
//! complete byte slice and delivers events to a `JsonContentHandler` —
//! no DOM tree, no serde on the wire. serde_json is reserved for local
//! persisted state (the token cache).

mod error;
mod handler;
mod number;
mod parser;

pub use error::JsonError;
pub use handler::JsonContentHandler;
pub use number::JsonNumber;
pub use parser::parse;
