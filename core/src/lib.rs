/*
 * lib.rs
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

//! Scadenziario core: export recent mailbox messages from Microsoft Graph,
//! extract the calendar dates mentioned in their bodies, and write a
//! tabular file.
//!
//! Pipeline: configuration → folder resolution → filtered paginated query →
//! per-message date extraction → row projection → sink. Authentication and
//! the sink are capabilities injected at the edges; see `run::run_export`.

pub mod body;
pub mod config;
pub mod error;
pub mod extract;
pub mod graph;
pub mod http;
pub mod json;
pub mod net;
pub mod oauth;
pub mod project;
pub mod retry;
pub mod run;
pub mod sink;

pub use config::{Overrides, RunConfig};
pub use error::Error;
pub use run::{run_export, RunSummary};
