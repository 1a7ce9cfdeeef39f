/*
 * query.rs
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

//! Filtered, paginated message query.
//!
//! Builds one filter expression (folder scope + inclusive receive-time lower
//! bound + optional full-text search) and follows the service's opaque
//! continuation link until absent. Records stream in service order; a page
//! failure after retries aborts only the unconsumed remainder.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use crate::body::html_to_text;
use crate::error::Error;
use crate::graph::handlers::{MessagePageHandler, RawMessage};
use crate::graph::{GraphClient, MessageRecord, GRAPH_BASE_PATH};
use crate::http::{parse_https_url, Transport};

/// Messages fetched per page.
const PAGE_SIZE: u32 = 50;

/// Wire fields the pipeline consumes.
const SELECT_FIELDS: &str = "id,subject,from,receivedDateTime,body,bodyPreview,webLink";

/// Parameters for one message query.
#[derive(Debug, Clone)]
pub struct MessageQuery {
    pub folder_id: String,
    /// Search keywords; empty means no search clause (and no consistency
    /// directive).
    pub keywords: Vec<String>,
    /// Inclusive lower bound on receive time.
    pub since: DateTime<Utc>,
}

impl MessageQuery {
    /// Path and query string for the first page.
    fn first_page_path(&self) -> String {
        let filter = format!(
            "receivedDateTime ge {}",
            self.since.format("%Y-%m-%dT%H:%M:%SZ")
        );
        let mut path = format!(
            "{}/me/mailFolders/{}/messages?$top={}&$select={}&$filter={}",
            GRAPH_BASE_PATH,
            self.folder_id,
            PAGE_SIZE,
            SELECT_FIELDS,
            utf8_percent_encode(&filter, NON_ALPHANUMERIC),
        );
        if !self.keywords.is_empty() {
            // The service wants the phrase group quoted: "a OR b".
            let phrase = format!("\"{}\"", self.keywords.join(" OR "));
            path.push_str("&$search=");
            path.push_str(&utf8_percent_encode(&phrase, NON_ALPHANUMERIC).to_string());
        }
        path
    }

    fn needs_eventual_consistency(&self) -> bool {
        !self.keywords.is_empty()
    }
}

/// Lazy, finite, non-restartable sequence of message records.
///
/// Pull with `try_next()`; `Ok(None)` is end of data. An error fails only
/// the remainder — records already yielded stay valid.
pub struct MessageStream<'a, T: Transport> {
    client: &'a GraphClient<T>,
    eventual: bool,
    /// Path of the next page to fetch; None when pagination is exhausted.
    next_path: Option<String>,
    buffered: VecDeque<MessageRecord>,
}

impl<'a, T: Transport> MessageStream<'a, T> {
    pub fn new(client: &'a GraphClient<T>, query: &MessageQuery) -> Self {
        Self {
            client,
            eventual: query.needs_eventual_consistency(),
            next_path: Some(query.first_page_path()),
            buffered: VecDeque::new(),
        }
    }

    /// Next record in service order, fetching pages as needed.
    pub async fn try_next(&mut self) -> Result<Option<MessageRecord>, Error> {
        loop {
            if let Some(record) = self.buffered.pop_front() {
                return Ok(Some(record));
            }
            let Some(path) = self.next_path.take() else {
                return Ok(None);
            };
            let mut page = MessagePageHandler::new();
            self.client.get_parsed(&path, self.eventual, &mut page).await?;
            tracing::debug!(items = page.messages.len(), "fetched message page");
            for raw in page.messages {
                if let Some(record) = to_record(raw) {
                    self.buffered.push_back(record);
                }
            }
            if let Some(link) = page.next_link {
                let (_host, _port, next_path) = parse_https_url(&link)?;
                self.next_path = Some(next_path);
            }
        }
    }
}

/// Convert a wire message to a pipeline record. Bodies delivered as HTML
/// are flattened to text; a missing body falls back to the preview.
fn to_record(raw: RawMessage) -> Option<MessageRecord> {
    let id = raw.id?;
    let received_utc = match raw
        .received
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
    {
        Some(dt) => dt.with_timezone(&Utc),
        None => {
            tracing::warn!(id = %id, "skipping message without a parseable receive time");
            return None;
        }
    };

    let body_text = match (raw.body_content, raw.body_content_type) {
        (Some(content), Some(kind)) if kind.eq_ignore_ascii_case("html") => html_to_text(&content),
        (Some(content), _) => content,
        (None, _) => raw.body_preview.unwrap_or_default(),
    };

    let from = raw
        .from_name
        .filter(|n| !n.trim().is_empty())
        .or(raw.from_address)
        .unwrap_or_default();

    Some(MessageRecord {
        id,
        subject: raw.subject.unwrap_or_default(),
        from,
        received_utc,
        body_text,
        web_link: raw.web_link.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn query(keywords: &[&str]) -> MessageQuery {
        MessageQuery {
            folder_id: "FID".to_string(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            since: Utc.with_ymd_and_hms(2025, 3, 1, 6, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_first_page_path_without_keywords() {
        let path = query(&[]).first_page_path();
        assert!(path.starts_with("/v1.0/me/mailFolders/FID/messages?"));
        assert!(path.contains("$top=50"));
        assert!(path.contains("$select=id,subject,from,receivedDateTime,body,bodyPreview,webLink"));
        assert!(path.contains("$filter=receivedDateTime%20ge%202025%2D03%2D01T06%3A30%3A00Z"));
        assert!(!path.contains("$search"));
        assert!(!query(&[]).needs_eventual_consistency());
    }

    #[test]
    fn test_first_page_path_with_keywords() {
        let q = query(&["invoice", "receipt"]);
        let path = q.first_page_path();
        assert!(path.contains("&$search=%22invoice%20OR%20receipt%22"));
        assert!(q.needs_eventual_consistency());
    }

    #[test]
    fn test_to_record_strips_html() {
        let raw = RawMessage {
            id: Some("M1".to_string()),
            subject: Some("hello".to_string()),
            received: Some("2025-03-05T08:30:00Z".to_string()),
            body_content: Some("<p>due <b>15th March 2025</b></p>".to_string()),
            body_content_type: Some("html".to_string()),
            ..RawMessage::default()
        };
        let record = to_record(raw).unwrap();
        assert_eq!(record.body_text, "due 15th March 2025");
        assert_eq!(
            record.received_utc,
            Utc.with_ymd_and_hms(2025, 3, 5, 8, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_to_record_preview_fallback_and_sender() {
        let raw = RawMessage {
            id: Some("M2".to_string()),
            received: Some("2025-03-05T08:30:00.0000000Z".to_string()),
            body_preview: Some("preview text".to_string()),
            from_address: Some("billing@acme.example".to_string()),
            ..RawMessage::default()
        };
        let record = to_record(raw).unwrap();
        assert_eq!(record.body_text, "preview text");
        assert_eq!(record.from, "billing@acme.example");
        assert_eq!(record.subject, "");
    }

    #[test]
    fn test_to_record_drops_bad_receive_time() {
        let raw = RawMessage {
            id: Some("M3".to_string()),
            received: Some("not a date".to_string()),
            ..RawMessage::default()
        };
        assert!(to_record(raw).is_none());
    }
}
