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

//! OAuth2 device-code authentication and token caching.
//!
//! The pipeline only ever consumes bearer tokens through `TokenProvider`;
//! the interactive grant lives here but is initiated by the shell, never by
//! the core.

pub mod flow;
pub mod provider;
pub mod token_store;

pub use flow::{DeviceCodeGrant, OAuthTokens};
pub use provider::{MicrosoftProvider, OAuthProvider};
pub use token_store::{CachedTokenProvider, TokenProvider};
