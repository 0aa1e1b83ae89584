//! Clause tokenizer - pull column identifiers out of a clause fragment
//!
//! The fragment is the statement text immediately following a clause keyword.
//! This is keyword-anchored scanning, not parsing: WHERE fragments are split on
//! the literal `AND` (`OR` and parentheses are not recognized), GROUP BY and
//! ORDER BY fragments are split on `,`. Only the identifier at the start of each
//! piece survives; operators and comparison values are discarded.

use crate::observation::ClauseKind;

/// Lazy iterator over the column tokens of one clause fragment.
///
/// Cloning the iterator restarts the scan from the clone point.
#[derive(Debug, Clone)]
pub struct ClauseTokens<'a> {
    remaining: Option<&'a str>,
    separator: &'static str,
}

/// Tokenize the fragment that follows the keyword of `clause`
pub fn tokenize(fragment: &str, clause: ClauseKind) -> ClauseTokens<'_> {
    let separator = match clause {
        ClauseKind::Where => "AND",
        ClauseKind::GroupBy | ClauseKind::OrderBy => ",",
        ClauseKind::None => {
            return ClauseTokens {
                remaining: None,
                separator: ",",
            }
        }
    };

    ClauseTokens {
        remaining: Some(fragment),
        separator,
    }
}

impl<'a> Iterator for ClauseTokens<'a> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let rest = self.remaining?;
            let piece = match rest.find(self.separator) {
                Some(pos) => {
                    self.remaining = Some(&rest[pos + self.separator.len()..]);
                    &rest[..pos]
                }
                None => {
                    self.remaining = None;
                    rest
                }
            };

            // Empty pieces come from trailing or doubled separators
            if let Some(token) = leading_identifier(piece) {
                return Some(token);
            }
        }
    }
}

/// Identifier at the start of a piece, with quotes and semicolons removed
fn leading_identifier(piece: &str) -> Option<String> {
    let piece = piece.trim_start_matches(' ');
    let end = piece
        .find(|c: char| matches!(c, ' ' | '=' | '<' | '>' | ';' | '\0'))
        .unwrap_or(piece.len());

    let token: String = piece[..end]
        .chars()
        .filter(|c| *c != '\'' && *c != ';')
        .collect();

    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
