/*
 * grammar.rs
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

//! Grammar-based date scanner: spelled-out and relative expressions.
//!
//! Recognized forms:
//! - `15th March 2025`, `3 Mar`, `21 November, 1997` (day month [year])
//! - `March 3, 2025`, `Mar 3` (month day [, year])
//! - `today`, `tomorrow`, `yesterday`
//! - `next monday` (strictly after the anchor date, 1–7 days ahead)
//!
//! A missing year resolves to the anchor year. Two-digit years use the
//! 00–49/50–99 windowing rule. Expressions that survive scanning but do not
//! form a real calendar date (e.g. `31 February 2025`) are dropped.

use chrono::{Datelike, Days, NaiveDate};

use crate::extract::{
    expand_two_digit_year, month_from_token, weekday_from_token, DateCandidate, Strategy,
};

/// Scan `text` for grammar-form dates anchored at `anchor`.
pub(crate) fn scan(text: &str, anchor: NaiveDate) -> Vec<DateCandidate> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let at_boundary = pos == 0 || !bytes[pos - 1].is_ascii_alphanumeric();
        if at_boundary {
            let matched = if bytes[pos].is_ascii_digit() {
                try_day_first(text, pos, anchor)
            } else if bytes[pos].is_ascii_alphabetic() {
                try_word_form(text, pos, anchor)
            } else {
                None
            };
            if let Some((date, end)) = matched {
                out.push(DateCandidate {
                    date,
                    position: pos,
                    strategy: Strategy::Grammar,
                });
                pos = end;
                continue;
            }
        }
        pos += 1;
    }
    out
}

/// `<day>[st|nd|rd|th] <month-name>[,] [<year>]` starting at `pos`.
/// Returns the date and the byte offset just past the match.
fn try_day_first(text: &str, pos: usize, anchor: NaiveDate) -> Option<(NaiveDate, usize)> {
    let mut cur = Cursor::new(text, pos);
    let day = cur.take_number(2)?;
    if !(1..=31).contains(&day) {
        return None;
    }
    cur.take_ordinal_suffix();
    if !cur.skip_whitespace() {
        return None;
    }
    let month_token = cur.take_word()?;
    let month = month_from_token(&month_token)?;
    let end_without_year = cur.pos;

    // Optional year, possibly after a comma.
    let mut year_cur = cur.clone();
    year_cur.take_comma();
    year_cur.skip_whitespace();
    if let Some((year, end)) = year_cur.take_year() {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day as u32) {
            return Some((date, end));
        }
        // Real month/day but impossible date; dropped at normalization.
        return None;
    }

    NaiveDate::from_ymd_opt(anchor.year(), month, day as u32).map(|d| (d, end_without_year))
}

/// Word-led forms at `pos`: month-first dates, `today`-class words, and
/// `next <weekday>`.
fn try_word_form(text: &str, pos: usize, anchor: NaiveDate) -> Option<(NaiveDate, usize)> {
    let mut cur = Cursor::new(text, pos);
    let word = cur.take_word()?;
    let lower = word.to_lowercase();

    match lower.as_str() {
        "today" => return Some((anchor, cur.pos)),
        "tomorrow" => return anchor.checked_add_days(Days::new(1)).map(|d| (d, cur.pos)),
        "yesterday" => return anchor.checked_sub_days(Days::new(1)).map(|d| (d, cur.pos)),
        "next" => {
            if !cur.skip_whitespace() {
                return None;
            }
            let weekday_token = cur.take_word()?;
            let target = weekday_from_token(&weekday_token)?;
            let current = anchor.weekday().num_days_from_monday();
            let days_ahead = ((target + 7 - current - 1) % 7) + 1;
            return anchor
                .checked_add_days(Days::new(days_ahead as u64))
                .map(|d| (d, cur.pos));
        }
        _ => {}
    }

    // `<month-name> <day>[st|nd|rd|th][, <year>]`
    let month = month_from_token(&word)?;
    if !cur.skip_whitespace() {
        return None;
    }
    let day = cur.take_number(2)?;
    if !(1..=31).contains(&day) {
        return None;
    }
    cur.take_ordinal_suffix();
    let end_without_year = cur.pos;

    let mut year_cur = cur.clone();
    year_cur.take_comma();
    year_cur.skip_whitespace();
    if let Some((year, end)) = year_cur.take_year() {
        return NaiveDate::from_ymd_opt(year, month, day as u32).map(|d| (d, end));
    }

    NaiveDate::from_ymd_opt(anchor.year(), month, day as u32).map(|d| (d, end_without_year))
}

// ── Cursor ────────────────────────────────────────────────────────────

/// Byte cursor over the source text with token-level helpers.
#[derive(Clone)]
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str, pos: usize) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    /// Consume up to `max_digits` digits; fails on none or on a digit run
    /// longer than `max_digits` (no boundary).
    fn take_number(&mut self, max_digits: usize) -> Option<i32> {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        let len = self.pos - start;
        if len == 0 || len > max_digits {
            self.pos = start;
            return None;
        }
        std::str::from_utf8(&self.bytes[start..self.pos])
            .ok()?
            .parse()
            .ok()
    }

    /// A 4-digit year, or a 2-digit year expanded by the windowing rule.
    /// The digit run must end at a word boundary.
    fn take_year(&mut self) -> Option<(i32, usize)> {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        let len = self.pos - start;
        let year = match len {
            4 => std::str::from_utf8(&self.bytes[start..self.pos])
                .ok()?
                .parse::<i32>()
                .ok()?,
            2 => {
                let yy = std::str::from_utf8(&self.bytes[start..self.pos])
                    .ok()?
                    .parse::<i32>()
                    .ok()?;
                expand_two_digit_year(yy)
            }
            _ => {
                self.pos = start;
                return None;
            }
        };
        if self.peek().is_some_and(|b| b.is_ascii_alphanumeric()) {
            self.pos = start;
            return None;
        }
        Some((year, self.pos))
    }

    /// Consume an ASCII letter run.
    fn take_word(&mut self) -> Option<String> {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_alphabetic()) {
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        std::str::from_utf8(&self.bytes[start..self.pos])
            .ok()
            .map(str::to_string)
    }

    /// Consume `st`/`nd`/`rd`/`th` after a day number, if present.
    fn take_ordinal_suffix(&mut self) {
        const SUFFIXES: [&[u8; 2]; 4] = [b"st", b"nd", b"rd", b"th"];
        if self.bytes.len() - self.pos < 2 {
            return;
        }
        let pair = [
            self.bytes[self.pos].to_ascii_lowercase(),
            self.bytes[self.pos + 1].to_ascii_lowercase(),
        ];
        if SUFFIXES.iter().any(|s| **s == pair) {
            // Must not be the start of a longer word ("3rdparty" is not a day).
            let after = self.bytes.get(self.pos + 2);
            if !after.is_some_and(|b| b.is_ascii_alphanumeric()) {
                self.pos += 2;
            }
        }
    }

    /// Consume one optional comma.
    fn take_comma(&mut self) {
        if self.peek() == Some(b',') {
            self.pos += 1;
        }
    }

    /// Consume spaces/tabs; true if at least one was consumed.
    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(|b| b == b' ' || b == b'\t') {
            self.pos += 1;
        }
        self.pos > start
    }
}
