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

//! Microsoft Graph mail access: folder resolution and message querying.
//!
//! Communicates with `https://graph.microsoft.com/v1.0`. Every request goes
//! through the retrying client and carries a bearer token from the injected
//! provider; responses are parsed with the in-tree push parser.

pub mod folders;
mod handlers;
pub mod query;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{Error, RemoteError};
use crate::http::{Request, Transport};
use crate::json::{self, JsonContentHandler};
use crate::oauth::TokenProvider;
use crate::retry::{RetryPolicy, RetryingClient};

pub use folders::FolderResolver;
pub use handlers::FolderEntry;
pub use query::{MessageQuery, MessageStream};

pub const GRAPH_HOST: &str = "graph.microsoft.com";
pub const GRAPH_BASE_PATH: &str = "/v1.0";

/// One message as consumed by the pipeline. Immutable; never persisted.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub id: String,
    pub subject: String,
    /// Sender display name, or address when no display name is set.
    pub from: String,
    pub received_utc: DateTime<Utc>,
    /// Body as plain text (HTML already stripped).
    pub body_text: String,
    pub web_link: String,
}

/// Graph API client: bearer-authenticated GETs with retry and push parsing.
pub struct GraphClient<T: Transport> {
    http: RetryingClient<T>,
    tokens: Arc<dyn TokenProvider>,
}

impl<T: Transport> GraphClient<T> {
    pub fn new(transport: T, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            http: RetryingClient::new(transport),
            tokens,
        }
    }

    pub fn with_policy(transport: T, policy: RetryPolicy, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            http: RetryingClient::with_policy(transport, policy),
            tokens,
        }
    }

    /// GET `path_query` and feed the JSON response body to `handler`.
    /// `eventual` attaches the consistency directive the service requires
    /// for full-text search queries.
    pub(crate) async fn get_parsed<H: JsonContentHandler>(
        &self,
        path_query: &str,
        eventual: bool,
        handler: &mut H,
    ) -> Result<(), Error> {
        let token = self.tokens.bearer_token().await?;
        let mut request = Request::get(path_query)
            .header("Authorization", format!("Bearer {}", token))
            .header("Accept", "application/json");
        if eventual {
            request = request.header("ConsistencyLevel", "eventual");
        }
        let response = self.http.send(request).await?;
        json::parse(&response.body, handler).map_err(|e| {
            Error::Remote(RemoteError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("malformed response for {}: {}", path_query, e),
            )))
        })
    }
}
