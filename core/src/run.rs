/*
 * run.rs
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

//! The export pipeline, end to end: resolve folder → stream query pages →
//! extract and project per message → hand ordered rows to the sink.
//!
//! Strictly sequential; the only suspension points are the network awaits
//! inside the HTTP client. Row order is the service's yield order.

use chrono::{Duration, Utc};

use crate::config::RunConfig;
use crate::error::Error;
use crate::extract::extract;
use crate::graph::{FolderResolver, GraphClient, MessageQuery, MessageStream};
use crate::http::Transport;
use crate::project::project;
use crate::sink::RowSink;

/// Counters reported after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Messages yielded by the query.
    pub messages: usize,
    /// Rows handed to the sink (one per message).
    pub rows_written: usize,
    /// Total extracted dates across all rows.
    pub dates_found: usize,
}

/// Run one export. The window's lower bound is inclusive: a message received
/// exactly `window_days` ago is included.
pub async fn run_export<T: Transport>(
    config: &RunConfig,
    client: &GraphClient<T>,
    sink: &mut dyn RowSink,
) -> Result<RunSummary, Error> {
    let since = Utc::now() - Duration::days(config.window_days as i64);

    tracing::info!(folder = %config.folder_path, "resolving folder path");
    let mut resolver = FolderResolver::new(client);
    let folder_id = resolver.resolve(&config.folder_path).await?;

    tracing::info!(
        folder_id = %folder_id,
        since = %since.format("%Y-%m-%dT%H:%M:%SZ"),
        keywords = config.keywords.len(),
        "querying messages"
    );
    let query = MessageQuery {
        folder_id,
        keywords: config.keywords.clone(),
        since,
    };
    let mut stream = MessageStream::new(client, &query);

    let mut rows = Vec::new();
    let mut dates_found = 0usize;
    while let Some(message) = stream.try_next().await? {
        let dates = extract(&message.body_text, message.received_utc.date_naive());
        dates_found += dates.len();
        rows.push(project(&message, dates));
    }

    let summary = RunSummary {
        messages: rows.len(),
        rows_written: rows.len(),
        dates_found,
    };
    sink.write_rows(&rows)?;
    tracing::info!(
        messages = summary.messages,
        dates = summary.dates_found,
        "export complete"
    );
    Ok(summary)
}
