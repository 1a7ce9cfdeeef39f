/*
 * body.rs
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

//! HTML body flattening for date extraction.
//!
//! The service delivers most bodies as HTML. The extractor works on plain
//! text, so tags become word separators, script/style content is dropped,
//! common entities are decoded, and whitespace runs collapse to one space.

/// Strip HTML to whitespace-normalized plain text.
pub fn html_to_text(html: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Text,
        Tag,
        /// Inside <script> or <style>; content skipped until the closing tag.
        Skip(&'static str),
    }

    let mut out = String::with_capacity(html.len() / 2);
    let mut state = State::Text;
    let mut tag = String::new();
    let mut rest = html;

    while let Some(c) = rest.chars().next() {
        match state {
            State::Text => {
                if c == '<' {
                    tag.clear();
                    state = State::Tag;
                } else if c == '&' {
                    let (decoded, consumed) = decode_entity(rest);
                    out.push_str(&decoded);
                    rest = &rest[consumed..];
                    continue;
                } else {
                    out.push(c);
                }
            }
            State::Tag => {
                if c == '>' {
                    let name = tag
                        .trim_start_matches('/')
                        .split(|c: char| c.is_whitespace() || c == '/')
                        .next()
                        .unwrap_or("")
                        .to_ascii_lowercase();
                    state = match name.as_str() {
                        "script" if !tag.starts_with('/') => State::Skip("script"),
                        "style" if !tag.starts_with('/') => State::Skip("style"),
                        _ => State::Text,
                    };
                    // Tags separate words ("<td>15</td><td>March</td>").
                    out.push(' ');
                } else {
                    tag.push(c);
                }
            }
            State::Skip(element) => {
                if c == '<' {
                    let closing = format!("</{}", element);
                    let matches_closing = rest
                        .get(..closing.len())
                        .is_some_and(|p| p.eq_ignore_ascii_case(&closing));
                    if matches_closing {
                        if let Some(end) = rest.find('>') {
                            rest = &rest[end + 1..];
                            state = State::Text;
                            out.push(' ');
                            continue;
                        }
                    }
                }
            }
        }
        rest = &rest[c.len_utf8()..];
    }

    collapse_whitespace(&out)
}

/// Decode one entity at the start of `s` (which begins with `&`).
/// Returns the replacement text and bytes consumed.
fn decode_entity(s: &str) -> (String, usize) {
    let end = match s[1..].find(';') {
        // Entities are short; an unterminated or overlong one is literal text.
        Some(i) if i <= 10 => i + 1,
        _ => return ("&".to_string(), 1),
    };
    let name = &s[1..end];
    let decoded = match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                None
            }
        }
    };
    match decoded {
        Some(c) => (c.to_string(), end + 1),
        None => ("&".to_string(), 1),
    }
}

fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_ws = true; // leading whitespace dropped
    for c in s.chars() {
        if c.is_whitespace() {
            if !in_ws {
                out.push(' ');
                in_ws = true;
            }
        } else {
            out.push(c);
            in_ws = false;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_become_separators() {
        assert_eq!(
            html_to_text("<p>Payment due on <b>15th March 2025</b></p>"),
            "Payment due on 15th March 2025"
        );
    }

    #[test]
    fn test_table_cells_do_not_merge() {
        assert_eq!(html_to_text("<td>15</td><td>March</td>"), "15 March");
    }

    #[test]
    fn test_script_and_style_dropped() {
        assert_eq!(
            html_to_text("<style>p { color: red }</style><p>due 10/03/2025</p><script>var x = '2020-01-01';</script>"),
            "due 10/03/2025"
        );
    }

    #[test]
    fn test_entities_decoded() {
        assert_eq!(
            html_to_text("a &amp; b&nbsp;&lt;c&gt; &#231;a &#x2013; ok"),
            "a & b <c> \u{e7}a \u{2013} ok"
        );
    }

    #[test]
    fn test_stray_ampersand_kept() {
        assert_eq!(html_to_text("AT&T and R&D"), "AT&T and R&D");
    }

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(html_to_text("already plain\n text"), "already plain text");
    }
}
