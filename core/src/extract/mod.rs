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

//! Two-strategy calendar date extraction.
//!
//! Two independent scanners produce tagged candidates: a grammar scanner for
//! spelled-out and relative expressions (`grammar`), and a fixed template
//! set (`patterns`). A single reconciliation pass normalizes, deduplicates
//! by value keeping the earliest source position, and orders by first
//! appearance; the grammar candidate wins an exact position tie.
//!
//! Total function: any text in, ISO date strings out, never an error.
//! Candidates that do not normalize to a real calendar date are dropped.

mod grammar;
mod patterns;

use chrono::NaiveDate;

/// Which scanner produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Strategy {
    /// Grammar scanner: carries more context, wins position ties.
    Grammar,
    Pattern,
}

/// One recognized date, scoped to a single extraction pass.
#[derive(Debug, Clone)]
pub(crate) struct DateCandidate {
    pub date: NaiveDate,
    /// Byte offset of the match start in the source text.
    pub position: usize,
    pub strategy: Strategy,
}

/// Extract the dates mentioned in `text`, in order of first appearance.
/// Relative expressions ("tomorrow", "next monday") are anchored to
/// `anchor` — the message's receipt date.
pub fn extract(text: &str, anchor: NaiveDate) -> Vec<String> {
    let mut candidates = grammar::scan(text, anchor);
    candidates.extend(patterns::scan(text, anchor));

    // Stable order: position, then grammar before pattern on a tie.
    candidates.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then(a.strategy.cmp(&b.strategy))
    });

    let mut out: Vec<String> = Vec::new();
    let mut seen: Vec<NaiveDate> = Vec::new();
    for candidate in candidates {
        if !seen.contains(&candidate.date) {
            seen.push(candidate.date);
            out.push(candidate.date.format("%Y-%m-%d").to_string());
        }
    }
    out
}

// ── Shared name tables ────────────────────────────────────────────────

const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

const WEEKDAY_NAMES: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

/// Month number for a name token. Accepts the full name or any prefix of at
/// least three letters ("mar", "sept", "september"), case-insensitive.
pub(crate) fn month_from_token(token: &str) -> Option<u32> {
    if token.len() < 3 {
        return None;
    }
    let lower = token.to_lowercase();
    MONTH_NAMES
        .iter()
        .position(|name| name.starts_with(&lower))
        .map(|i| i as u32 + 1)
}

/// Weekday number (0 = Monday) for a name token, same prefix rule.
pub(crate) fn weekday_from_token(token: &str) -> Option<u32> {
    if token.len() < 3 {
        return None;
    }
    let lower = token.to_lowercase();
    WEEKDAY_NAMES
        .iter()
        .position(|name| name.starts_with(&lower))
        .map(|i| i as u32)
}

/// Expand a two-digit year: 00–49 → 2000s, 50–99 → 1900s.
pub(crate) fn expand_two_digit_year(yy: i32) -> i32 {
    if yy <= 49 {
        2000 + yy
    } else {
        1900 + yy
    }
}
