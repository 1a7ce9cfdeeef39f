/*
 * project.rs
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

//! Projection of a message plus its extracted dates into an export row.
//! Pure and total: no I/O, no failure path.

use chrono::FixedOffset;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use crate::graph::MessageRecord;

/// Display timezone: UTC+5:30 (IST). The single fixed offset this tool
/// formats receive times in.
fn display_offset() -> FixedOffset {
    FixedOffset::east_opt(5 * 3600 + 30 * 60).expect("static offset")
}

/// One row of the export, in sink order.
#[derive(Debug, Clone)]
pub struct ExportRow {
    pub subject: String,
    /// Receive time in the display timezone, `YYYY-MM-DD HH:MM`.
    pub received_local: String,
    /// Extracted ISO dates, deduplicated, first-seen order.
    pub dates: Vec<String>,
    pub from: String,
    pub link: String,
}

impl ExportRow {
    /// Dates joined for display, preserving order.
    pub fn display_dates(&self) -> String {
        self.dates.join(", ")
    }
}

/// Build the export row for one message.
pub fn project(message: &MessageRecord, dates: Vec<String>) -> ExportRow {
    let link = if message.web_link.is_empty() {
        deep_link(&message.id)
    } else {
        message.web_link.clone()
    };
    ExportRow {
        subject: message.subject.clone(),
        received_local: message
            .received_utc
            .with_timezone(&display_offset())
            .format("%Y-%m-%d %H:%M")
            .to_string(),
        dates,
        from: message.from.clone(),
        link,
    }
}

/// Deep link into the service's web client, built from the message id.
fn deep_link(id: &str) -> String {
    format!(
        "https://outlook.office.com/mail/deeplink/read/{}",
        utf8_percent_encode(id, NON_ALPHANUMERIC)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn message() -> MessageRecord {
        MessageRecord {
            id: "AAMkAD/+x=".to_string(),
            subject: "Invoice".to_string(),
            from: "Acme Billing".to_string(),
            received_utc: Utc.with_ymd_and_hms(2025, 3, 5, 8, 30, 0).unwrap(),
            body_text: String::new(),
            web_link: String::new(),
        }
    }

    #[test]
    fn test_received_local_offset() {
        // 08:30 UTC is 14:00 at +05:30.
        let row = project(&message(), vec![]);
        assert_eq!(row.received_local, "2025-03-05 14:00");
    }

    #[test]
    fn test_offset_can_roll_the_date() {
        let mut msg = message();
        msg.received_utc = Utc.with_ymd_and_hms(2025, 3, 5, 20, 45, 0).unwrap();
        let row = project(&msg, vec![]);
        assert_eq!(row.received_local, "2025-03-06 02:15");
    }

    #[test]
    fn test_deep_link_fallback_escapes_id() {
        let row = project(&message(), vec![]);
        assert_eq!(
            row.link,
            "https://outlook.office.com/mail/deeplink/read/AAMkAD%2F%2Bx%3D"
        );
    }

    #[test]
    fn test_web_link_passthrough() {
        let mut msg = message();
        msg.web_link = "https://outlook.office365.com/owa/?ItemID=1".to_string();
        let row = project(&msg, vec![]);
        assert_eq!(row.link, msg.web_link);
    }

    #[test]
    fn test_display_dates_preserves_order() {
        let row = project(
            &message(),
            vec!["2025-03-15".to_string(), "2025-03-10".to_string()],
        );
        assert_eq!(row.display_dates(), "2025-03-15, 2025-03-10");
        assert_eq!(row.dates, vec!["2025-03-15", "2025-03-10"]);
    }
}
