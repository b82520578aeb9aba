// SPDX-License-Identifier: AGPL-3.0-or-later
// SochMQ - NATS-Compatible Message Streaming
// Copyright (C) 2026 Sushanth Reddy Vanagala (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Subject tokens, wildcard matching, and entity naming
//!
//! Subjects are `.`-separated token strings. `*` matches exactly one token,
//! `>` matches one or more trailing tokens and is only valid in the last
//! position. Entity names (streams, consumers, templates) must not contain
//! token separators or wildcards so they can double as directory names.

/// Token separator within a subject.
pub const TOKEN_SEPARATOR: char = '.';

/// Wildcard matching a single token.
pub const WILDCARD_TOKEN: &str = "*";

/// Wildcard matching one or more trailing tokens.
pub const FULL_WILDCARD_TOKEN: &str = ">";

/// Maximum length for stream, consumer, and template names.
pub const MAX_NAME_LEN: usize = 255;

/// A name is valid when it is non-empty and free of separators and wildcards.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['.', '*', '>'])
}

/// A subject is valid when every token is non-empty and `>` only appears
/// as the final token. Wildcard tokens must stand alone.
pub fn is_valid_subject(subject: &str) -> bool {
    if subject.is_empty() {
        return false;
    }
    let tokens: Vec<&str> = subject.split(TOKEN_SEPARATOR).collect();
    for (i, token) in tokens.iter().enumerate() {
        if token.is_empty() {
            return false;
        }
        if token.len() > 1 && (token.contains('*') || token.contains('>')) {
            return false;
        }
        if *token == FULL_WILDCARD_TOKEN && i != tokens.len() - 1 {
            return false;
        }
    }
    true
}

/// A literal subject contains no wildcard tokens.
pub fn is_literal_subject(subject: &str) -> bool {
    subject
        .split(TOKEN_SEPARATOR)
        .all(|t| t != WILDCARD_TOKEN && t != FULL_WILDCARD_TOKEN)
}

/// Replace all token separators with `_`, turning a multi-token subject
/// into a valid stream or consumer name.
pub fn canonical_name(subject: &str) -> String {
    subject.replace(TOKEN_SEPARATOR, "_")
}

/// Match a literal subject against a filter that may carry wildcards.
pub fn subject_matches(filter: &str, subject: &str) -> bool {
    let mut ft = filter.split(TOKEN_SEPARATOR);
    let mut st = subject.split(TOKEN_SEPARATOR);
    loop {
        match (ft.next(), st.next()) {
            (Some(FULL_WILDCARD_TOKEN), Some(_)) => return true,
            (Some(f), Some(s)) => {
                if f != WILDCARD_TOKEN && f != s {
                    return false;
                }
            }
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Whether two subject patterns can both match at least one common literal
/// subject. Either side may carry wildcards.
pub fn subjects_collide(a: &str, b: &str) -> bool {
    let mut at = a.split(TOKEN_SEPARATOR);
    let mut bt = b.split(TOKEN_SEPARATOR);
    loop {
        match (at.next(), bt.next()) {
            (Some(FULL_WILDCARD_TOKEN), Some(_)) | (Some(_), Some(FULL_WILDCARD_TOKEN)) => {
                return true
            }
            (Some(x), Some(y)) => {
                if x != WILDCARD_TOKEN && y != WILDCARD_TOKEN && x != y {
                    return false;
                }
            }
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("orders"));
        assert!(is_valid_name("orders_new"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("orders.new"));
        assert!(!is_valid_name("orders*"));
        assert!(!is_valid_name("orders>"));
    }

    #[test]
    fn test_valid_subjects() {
        assert!(is_valid_subject("orders.new"));
        assert!(is_valid_subject("orders.*"));
        assert!(is_valid_subject("orders.>"));
        assert!(is_valid_subject("*"));
        assert!(!is_valid_subject(""));
        assert!(!is_valid_subject("orders..new"));
        assert!(!is_valid_subject(".orders"));
        assert!(!is_valid_subject("orders.>.new"));
        assert!(!is_valid_subject("ord*ers.new"));
    }

    #[test]
    fn test_canonical_name() {
        assert_eq!(canonical_name("orders.new"), "orders_new");
        assert_eq!(canonical_name("a.b.c"), "a_b_c");
        assert_eq!(canonical_name("plain"), "plain");
        // The canonical form of any subject is separator-free.
        for subject in ["x", "x.y", "deep.er.still"] {
            assert!(!canonical_name(subject).contains('.'));
            assert!(is_valid_name(&canonical_name(subject)));
        }
    }

    #[test]
    fn test_literal_subjects() {
        assert!(is_literal_subject("orders.new"));
        assert!(!is_literal_subject("orders.*"));
        assert!(!is_literal_subject("orders.>"));
    }

    #[test]
    fn test_subject_matches() {
        assert!(subject_matches("orders.*", "orders.new"));
        assert!(subject_matches("orders.>", "orders.new.paid"));
        assert!(subject_matches("orders.new", "orders.new"));
        assert!(!subject_matches("orders.*", "orders.new.paid"));
        assert!(!subject_matches("orders.new", "orders.paid"));
        assert!(!subject_matches("orders.>", "orders"));
    }

    #[test]
    fn test_subjects_collide() {
        assert!(subjects_collide("orders.*", "orders.new"));
        assert!(subjects_collide("orders.>", "*.new"));
        assert!(subjects_collide("*.*", "orders.new"));
        assert!(subjects_collide("orders.new", "orders.new"));
        assert!(!subjects_collide("orders.new", "orders.paid"));
        assert!(!subjects_collide("orders.*", "billing.*"));
        assert!(!subjects_collide("orders.*", "orders.new.paid"));
    }
}
