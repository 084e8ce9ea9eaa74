//! Forbidden-construct checking.
//!
//! Plain substring search over the raw source text. A token inside an
//! identifier, comment or string literal still counts as a match.

use cpptest_common::types::CaseMatching;

/// Return the first non-empty token, in list order, that occurs in `source`.
///
/// Tokens are trimmed before matching and the trimmed form is returned.
pub fn check<'a>(source: &str, tokens: &'a [String], matching: CaseMatching) -> Option<&'a str> {
    let haystack = match matching {
        CaseMatching::Insensitive => source.to_lowercase(),
        CaseMatching::Sensitive => source.to_string(),
    };

    tokens
        .iter()
        .map(|token| token.trim())
        .filter(|token| !token.is_empty())
        .find(|token| match matching {
            CaseMatching::Insensitive => haystack.contains(&token.to_lowercase()),
            CaseMatching::Sensitive => haystack.contains(token),
        })
}

/// Whether the program looks like it reads standard input
pub fn reads_stdin(source: &str) -> bool {
    source.to_lowercase().contains("cin")
}
