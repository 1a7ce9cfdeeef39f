/*
 * folders.rs
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

//! Folder path resolution: walk slash-separated display names down to a
//! service folder id.
//!
//! One listing per path segment, paginated; display-name matching is
//! case-insensitive exact, no fuzzy fallback. A `(parent id, name)` cache
//! avoids re-listing a segment repeated within one run. A first segment
//! absent from the top-level list is retried as a service well-known folder
//! name before failing.

use std::collections::HashMap;

use crate::error::{Error, FolderNotFound, RemoteError};
use crate::graph::handlers::{FolderPageHandler, SingleFolderHandler};
use crate::graph::{GraphClient, GRAPH_BASE_PATH};
use crate::http::{parse_https_url, Transport};

/// Display name used in errors for the top level of the mailbox.
const ROOT_DISPLAY: &str = "mailbox root";

/// Well-known folder id accepted by the service in place of a real id.
const WELL_KNOWN_INBOX: &str = "inbox";

pub struct FolderResolver<'a, T: Transport> {
    client: &'a GraphClient<T>,
    /// (parent folder id or "" for top level, lowercased segment) → folder id.
    cache: HashMap<(String, String), String>,
}

impl<'a, T: Transport> FolderResolver<'a, T> {
    pub fn new(client: &'a GraphClient<T>) -> Self {
        Self {
            client,
            cache: HashMap::new(),
        }
    }

    /// Resolve a slash-separated folder path to a folder id. An empty path
    /// is the mailbox root folder, resolved without any remote call.
    pub async fn resolve(&mut self, folder_path: &str) -> Result<String, Error> {
        let segments: Vec<&str> = folder_path
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if segments.is_empty() {
            return Ok(WELL_KNOWN_INBOX.to_string());
        }

        let mut parent_id = String::new();
        let mut parent_display = ROOT_DISPLAY.to_string();
        for segment in segments {
            let folder_id = self.resolve_segment(&parent_id, &parent_display, segment).await?;
            tracing::debug!(segment, folder_id = %folder_id, "resolved folder segment");
            parent_id = folder_id;
            parent_display = segment.to_string();
        }
        Ok(parent_id)
    }

    async fn resolve_segment(
        &mut self,
        parent_id: &str,
        parent_display: &str,
        segment: &str,
    ) -> Result<String, Error> {
        let cache_key = (parent_id.to_string(), segment.to_lowercase());
        if let Some(id) = self.cache.get(&cache_key) {
            return Ok(id.clone());
        }

        let mut path = if parent_id.is_empty() {
            format!(
                "{}/me/mailFolders?$top=100&$select=id,displayName",
                GRAPH_BASE_PATH
            )
        } else {
            format!(
                "{}/me/mailFolders/{}/childFolders?$top=100&$select=id,displayName",
                GRAPH_BASE_PATH, parent_id
            )
        };

        loop {
            let mut page = FolderPageHandler::new();
            self.client.get_parsed(&path, false, &mut page).await?;
            for entry in &page.entries {
                // Populate the cache with the whole page; sibling segments
                // repeated later in the run hit it without a remote call.
                self.cache
                    .entry((parent_id.to_string(), entry.display_name.to_lowercase()))
                    .or_insert_with(|| entry.id.clone());
            }
            if let Some(id) = self.cache.get(&cache_key) {
                return Ok(id.clone());
            }
            match page.next_link {
                Some(link) => {
                    let (_host, _port, next_path) = parse_https_url(&link)?;
                    path = next_path;
                }
                None => break,
            }
        }

        if parent_id.is_empty() {
            if let Some(id) = self.try_well_known(segment).await? {
                self.cache.insert(cache_key, id.clone());
                return Ok(id);
            }
        }

        Err(Error::FolderNotFound(FolderNotFound {
            segment: segment.to_string(),
            parent: parent_display.to_string(),
        }))
    }

    /// Probe a top-level segment as a service well-known folder name
    /// (e.g. "inbox", "sentitems"). Returns the real folder id, or None if
    /// the service does not know the name.
    async fn try_well_known(&self, segment: &str) -> Result<Option<String>, Error> {
        let candidate: String = segment
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        if candidate.is_empty() {
            return Ok(None);
        }
        let path = format!(
            "{}/me/mailFolders/{}?$select=id,displayName",
            GRAPH_BASE_PATH, candidate
        );
        let mut handler = SingleFolderHandler::new();
        match self.client.get_parsed(&path, false, &mut handler).await {
            Ok(()) => Ok(handler.id),
            Err(Error::Remote(RemoteError::Status { status: 404, .. })) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
