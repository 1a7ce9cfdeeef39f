/*
 * patterns.rs
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

//! Pattern-based date scanner: a fixed set of lexical templates.
//!
//! Templates (day-first numeric order):
//! - `DD/MM/YYYY`, `DD-MM-YY` — separators `/` or `-`, 2- or 4-digit year
//! - `YYYY-MM-DD`
//! - `D Mon YYYY` — month-name forms
//! - `Wed, 21 Nov` — weekday-prefixed, year from the anchor
//!
//! Each match is normalized independently; anything that is not a real
//! calendar date (`32/13/2025`) is dropped here, not reported.

use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::extract::{expand_two_digit_year, month_from_token, DateCandidate, Strategy};

struct Template {
    regex: Regex,
    normalize: fn(&regex::Captures<'_>, NaiveDate) -> Option<NaiveDate>,
}

fn templates() -> &'static [Template] {
    static TEMPLATES: OnceLock<Vec<Template>> = OnceLock::new();
    TEMPLATES.get_or_init(|| {
        vec![
            // 10/03/2025, 9-3-25
            Template {
                regex: Regex::new(r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{2,4})\b").unwrap(),
                normalize: normalize_numeric_day_first,
            },
            // 2025-03-10
            Template {
                regex: Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").unwrap(),
                normalize: normalize_iso,
            },
            // 10 Mar 2025, 10 March 25
            Template {
                regex: Regex::new(
                    r"(?i)\b(\d{1,2})\s+(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\s+(\d{2,4})\b",
                )
                .unwrap(),
                normalize: normalize_day_month_year,
            },
            // Fri, 21 Nov (year from the anchor)
            Template {
                regex: Regex::new(
                    r"(?i)\b(?:Mon|Tue|Wed|Thu|Fri|Sat|Sun)[a-z]*,\s*(\d{1,2})\s+(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\b",
                )
                .unwrap(),
                normalize: normalize_weekday_day_month,
            },
        ]
    })
}

/// Scan `text` with every template.
pub(crate) fn scan(text: &str, anchor: NaiveDate) -> Vec<DateCandidate> {
    let mut out = Vec::new();
    for template in templates() {
        for captures in template.regex.captures_iter(text) {
            let position = captures.get(0).map(|m| m.start()).unwrap_or(0);
            if let Some(date) = (template.normalize)(&captures, anchor) {
                out.push(DateCandidate {
                    date,
                    position,
                    strategy: Strategy::Pattern,
                });
            }
        }
    }
    out
}

/// Year field as written: 4-digit kept, 2-digit windowed, 3-digit dropped.
fn year_field(raw: &str) -> Option<i32> {
    match raw.len() {
        4 => raw.parse().ok(),
        2 => raw.parse().ok().map(expand_two_digit_year),
        _ => None,
    }
}

fn normalize_numeric_day_first(
    captures: &regex::Captures<'_>,
    _anchor: NaiveDate,
) -> Option<NaiveDate> {
    let day: u32 = captures[1].parse().ok()?;
    let month: u32 = captures[2].parse().ok()?;
    let year = year_field(&captures[3])?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn normalize_iso(captures: &regex::Captures<'_>, _anchor: NaiveDate) -> Option<NaiveDate> {
    let year: i32 = captures[1].parse().ok()?;
    let month: u32 = captures[2].parse().ok()?;
    let day: u32 = captures[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn normalize_day_month_year(
    captures: &regex::Captures<'_>,
    _anchor: NaiveDate,
) -> Option<NaiveDate> {
    let day: u32 = captures[1].parse().ok()?;
    let month = month_from_token(&captures[2])?;
    let year = year_field(&captures[3])?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn normalize_weekday_day_month(
    captures: &regex::Captures<'_>,
    anchor: NaiveDate,
) -> Option<NaiveDate> {
    let day: u32 = captures[1].parse().ok()?;
    let month = month_from_token(&captures[2])?;
    NaiveDate::from_ymd_opt(anchor.year(), month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 5).unwrap()
    }

    fn dates(text: &str) -> Vec<String> {
        scan(text, anchor())
            .into_iter()
            .map(|c| c.date.to_string())
            .collect()
    }

    #[test]
    fn test_numeric_day_first() {
        assert_eq!(dates("ref 10/03/2025 here"), vec!["2025-03-10"]);
        assert_eq!(dates("short 9-3-25"), vec!["2025-03-09"]);
    }

    #[test]
    fn test_iso() {
        assert_eq!(dates("on 2025-03-10 sharp"), vec!["2025-03-10"]);
    }

    #[test]
    fn test_day_month_name() {
        assert_eq!(dates("pay 10 Mar 2025 latest"), vec!["2025-03-10"]);
        assert_eq!(dates("10 March 25"), vec!["2025-03-10"]);
    }

    #[test]
    fn test_weekday_form_uses_anchor_year() {
        assert_eq!(dates("sent Fri, 21 Nov"), vec!["2025-11-21"]);
        assert_eq!(dates("Wednesday, 3 September"), vec!["2025-09-03"]);
    }

    #[test]
    fn test_invalid_dropped() {
        assert!(dates("32/13/2025").is_empty());
        assert!(dates("2025-02-30").is_empty());
        // 3-digit years have no sane reading.
        assert!(dates("1/2/345").is_empty());
    }

    #[test]
    fn test_no_match_inside_longer_numbers() {
        assert!(dates("order 123/456/78901").is_empty());
        assert!(dates("v1.2.3").is_empty());
    }

    #[test]
    fn test_positions_are_match_starts() {
        let candidates = scan("x 10/03/2025 y 2025-04-01", anchor());
        let positions: Vec<usize> = candidates.iter().map(|c| c.position).collect();
        assert_eq!(positions, vec![2, 15]);
    }
}
