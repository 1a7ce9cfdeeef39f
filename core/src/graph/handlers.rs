/*
 * handlers.rs
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

//! `JsonContentHandler` implementations for Graph API responses.
//!
//! Each handler is a small state machine tracking nesting depth and the
//! current key, extracting only the fields the pipeline consumes plus the
//! `@odata.nextLink` continuation cursor. No DOM tree.

use crate::json::{JsonContentHandler, JsonNumber};

/// One folder from a folder listing page.
#[derive(Debug, Clone)]
pub struct FolderEntry {
    pub id: String,
    pub display_name: String,
}

// ── FolderPageHandler ─────────────────────────────────────────────────

/// Parses one page of `{"value":[{"id","displayName",...},...],
/// "@odata.nextLink":"..."}`.
#[derive(Default)]
pub(crate) struct FolderPageHandler {
    pub entries: Vec<FolderEntry>,
    pub next_link: Option<String>,

    depth: usize,
    in_value: bool,
    current_key: Option<String>,
    folder_id: Option<String>,
    display_name: Option<String>,
}

impl FolderPageHandler {
    pub fn new() -> Self {
        Self::default()
    }

    fn emit(&mut self) {
        if let (Some(id), Some(display_name)) = (self.folder_id.take(), self.display_name.take()) {
            self.entries.push(FolderEntry { id, display_name });
        }
    }
}

impl JsonContentHandler for FolderPageHandler {
    fn start_object(&mut self) {
        self.depth += 1;
        if self.in_value && self.depth == 3 {
            self.folder_id = None;
            self.display_name = None;
        }
    }

    fn end_object(&mut self) {
        if self.in_value && self.depth == 3 {
            self.emit();
        }
        self.depth -= 1;
    }

    fn start_array(&mut self) {
        self.depth += 1;
        if self.depth == 2 && self.current_key.as_deref() == Some("value") {
            self.in_value = true;
        }
        self.current_key = None;
    }

    fn end_array(&mut self) {
        if self.in_value && self.depth == 2 {
            self.in_value = false;
        }
        self.depth -= 1;
    }

    fn key(&mut self, key: &str) {
        self.current_key = Some(key.to_string());
    }

    fn string_value(&mut self, value: &str) {
        if self.in_value && self.depth == 3 {
            match self.current_key.as_deref() {
                Some("id") => self.folder_id = Some(value.to_string()),
                Some("displayName") => self.display_name = Some(value.to_string()),
                _ => {}
            }
        } else if self.depth == 1 && self.current_key.as_deref() == Some("@odata.nextLink") {
            self.next_link = Some(value.to_string());
        }
        self.current_key = None;
    }

    fn number_value(&mut self, _number: JsonNumber) {
        self.current_key = None;
    }

    fn boolean_value(&mut self, _value: bool) {
        self.current_key = None;
    }

    fn null_value(&mut self) {
        self.current_key = None;
    }
}

// ── SingleFolderHandler ───────────────────────────────────────────────

/// Parses a single folder object (well-known-name lookup):
/// `{"id":"...","displayName":"..."}`.
#[derive(Default)]
pub(crate) struct SingleFolderHandler {
    pub id: Option<String>,
    pub display_name: Option<String>,

    depth: usize,
    current_key: Option<String>,
}

impl SingleFolderHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JsonContentHandler for SingleFolderHandler {
    fn start_object(&mut self) {
        self.depth += 1;
    }

    fn end_object(&mut self) {
        self.depth -= 1;
    }

    fn start_array(&mut self) {
        self.depth += 1;
        self.current_key = None;
    }

    fn end_array(&mut self) {
        self.depth -= 1;
    }

    fn key(&mut self, key: &str) {
        self.current_key = Some(key.to_string());
    }

    fn string_value(&mut self, value: &str) {
        if self.depth == 1 {
            match self.current_key.as_deref() {
                Some("id") => self.id = Some(value.to_string()),
                Some("displayName") => self.display_name = Some(value.to_string()),
                _ => {}
            }
        }
        self.current_key = None;
    }

    fn number_value(&mut self, _number: JsonNumber) {
        self.current_key = None;
    }

    fn boolean_value(&mut self, _value: bool) {
        self.current_key = None;
    }

    fn null_value(&mut self) {
        self.current_key = None;
    }
}

// ── MessagePageHandler ────────────────────────────────────────────────

/// Raw message fields as they appear on the wire, before the pipeline's
/// record conversion (HTML stripping, date parsing).
#[derive(Debug, Default, Clone)]
pub(crate) struct RawMessage {
    pub id: Option<String>,
    pub subject: Option<String>,
    pub from_name: Option<String>,
    pub from_address: Option<String>,
    pub received: Option<String>,
    pub body_content: Option<String>,
    pub body_content_type: Option<String>,
    pub body_preview: Option<String>,
    pub web_link: Option<String>,
}

/// Parses one page of `{"value":[{message},...],"@odata.nextLink":"..."}`.
///
/// Nesting: root (1) → value array (2) → message (3) → from/body (4) →
/// emailAddress (5).
#[derive(Default)]
pub(crate) struct MessagePageHandler {
    pub messages: Vec<RawMessage>,
    pub next_link: Option<String>,

    depth: usize,
    in_value: bool,
    in_from: bool,
    in_email_address: bool,
    in_body: bool,
    current_key: Option<String>,
    msg: RawMessage,
}

impl MessagePageHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JsonContentHandler for MessagePageHandler {
    fn start_object(&mut self) {
        self.depth += 1;
        if self.in_value {
            match self.depth {
                3 => self.msg = RawMessage::default(),
                4 => match self.current_key.as_deref() {
                    Some("from") => self.in_from = true,
                    Some("body") => self.in_body = true,
                    _ => {}
                },
                5 => {
                    if self.in_from && self.current_key.as_deref() == Some("emailAddress") {
                        self.in_email_address = true;
                    }
                }
                _ => {}
            }
        }
        self.current_key = None;
    }

    fn end_object(&mut self) {
        if self.in_value {
            match self.depth {
                3 => self.messages.push(std::mem::take(&mut self.msg)),
                4 => {
                    self.in_from = false;
                    self.in_body = false;
                }
                5 => self.in_email_address = false,
                _ => {}
            }
        }
        self.depth -= 1;
    }

    fn start_array(&mut self) {
        self.depth += 1;
        if self.depth == 2 && self.current_key.as_deref() == Some("value") {
            self.in_value = true;
        }
        self.current_key = None;
    }

    fn end_array(&mut self) {
        if self.in_value && self.depth == 2 {
            self.in_value = false;
        }
        self.depth -= 1;
    }

    fn key(&mut self, key: &str) {
        self.current_key = Some(key.to_string());
    }

    fn string_value(&mut self, value: &str) {
        let key = self.current_key.take();
        if !self.in_value {
            if self.depth == 1 && key.as_deref() == Some("@odata.nextLink") {
                self.next_link = Some(value.to_string());
            }
            return;
        }
        if self.in_email_address && self.depth == 5 {
            match key.as_deref() {
                Some("name") => self.msg.from_name = Some(value.to_string()),
                Some("address") => self.msg.from_address = Some(value.to_string()),
                _ => {}
            }
        } else if self.in_body && self.depth == 4 {
            match key.as_deref() {
                Some("contentType") => self.msg.body_content_type = Some(value.to_string()),
                Some("content") => self.msg.body_content = Some(value.to_string()),
                _ => {}
            }
        } else if self.depth == 3 {
            match key.as_deref() {
                Some("id") => self.msg.id = Some(value.to_string()),
                Some("subject") => self.msg.subject = Some(value.to_string()),
                Some("receivedDateTime") => self.msg.received = Some(value.to_string()),
                Some("bodyPreview") => self.msg.body_preview = Some(value.to_string()),
                Some("webLink") => self.msg.web_link = Some(value.to_string()),
                _ => {}
            }
        }
    }

    fn number_value(&mut self, _number: JsonNumber) {
        self.current_key = None;
    }

    fn boolean_value(&mut self, _value: bool) {
        self.current_key = None;
    }

    fn null_value(&mut self) {
        self.current_key = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json;

    #[test]
    fn test_folder_page() {
        let body = br#"{
            "value": [
                {"id": "AAA", "displayName": "Inbox", "childFolderCount": 2},
                {"id": "BBB", "displayName": "Archive", "childFolderCount": 0}
            ],
            "@odata.nextLink": "https://graph.microsoft.com/v1.0/me/mailFolders?$skip=100"
        }"#;
        let mut handler = FolderPageHandler::new();
        json::parse(body, &mut handler).unwrap();
        assert_eq!(handler.entries.len(), 2);
        assert_eq!(handler.entries[0].id, "AAA");
        assert_eq!(handler.entries[1].display_name, "Archive");
        assert!(handler.next_link.as_deref().unwrap().contains("$skip=100"));
    }

    #[test]
    fn test_folder_page_without_next_link() {
        let mut handler = FolderPageHandler::new();
        json::parse(br#"{"value": []}"#, &mut handler).unwrap();
        assert!(handler.entries.is_empty());
        assert!(handler.next_link.is_none());
    }

    #[test]
    fn test_single_folder() {
        let mut handler = SingleFolderHandler::new();
        json::parse(br#"{"id": "XYZ", "displayName": "Inbox"}"#, &mut handler).unwrap();
        assert_eq!(handler.id.as_deref(), Some("XYZ"));
        assert_eq!(handler.display_name.as_deref(), Some("Inbox"));
    }

    #[test]
    fn test_message_page() {
        let body = br#"{
            "value": [
                {
                    "id": "MSG1",
                    "subject": "Invoice due",
                    "receivedDateTime": "2025-03-05T08:30:00Z",
                    "from": {"emailAddress": {"name": "Acme Billing", "address": "billing@acme.example"}},
                    "body": {"contentType": "html", "content": "<p>Pay by 15th March 2025</p>"},
                    "bodyPreview": "Pay by 15th March 2025",
                    "webLink": "https://outlook.office365.com/owa/?ItemID=MSG1"
                }
            ]
        }"#;
        let mut handler = MessagePageHandler::new();
        json::parse(body, &mut handler).unwrap();
        assert_eq!(handler.messages.len(), 1);
        let msg = &handler.messages[0];
        assert_eq!(msg.id.as_deref(), Some("MSG1"));
        assert_eq!(msg.subject.as_deref(), Some("Invoice due"));
        assert_eq!(msg.from_name.as_deref(), Some("Acme Billing"));
        assert_eq!(msg.from_address.as_deref(), Some("billing@acme.example"));
        assert_eq!(msg.body_content_type.as_deref(), Some("html"));
        assert!(msg.body_content.as_deref().unwrap().contains("15th March"));
        assert!(handler.next_link.is_none());
    }

    #[test]
    fn test_message_page_ignores_unknown_nested_fields() {
        let body = br#"{
            "value": [
                {
                    "id": "MSG2",
                    "flag": {"flagStatus": "notFlagged"},
                    "toRecipients": [{"emailAddress": {"name": "Me", "address": "me@x.example"}}],
                    "receivedDateTime": "2025-03-06T09:00:00Z"
                }
            ]
        }"#;
        let mut handler = MessagePageHandler::new();
        json::parse(body, &mut handler).unwrap();
        let msg = &handler.messages[0];
        assert_eq!(msg.id.as_deref(), Some("MSG2"));
        // toRecipients' emailAddress must not bleed into the sender fields.
        assert!(msg.from_name.is_none());
        assert!(msg.from_address.is_none());
    }
}
