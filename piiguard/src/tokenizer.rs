//! Splits plaintext values into searchable tokens.

use crate::formats::{
    compiled, EmailSplitter, FormatSplitter, NationalIdSplitter, PhoneSplitter, TaxIdSplitter,
};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

const FALLBACK_SEPARATOR: char = ' ';
const TOKEN_PATTERN: &str = "[a-zA-Z0-9]+";

fn token_regex() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    compiled(&CELL, TOKEN_PATTERN)
}

/// Turns a value into the ordered list of tokens stored in a heap table.
///
/// The first splitter that recognizes the value decides the normalization
/// and separator; otherwise the value is split on spaces. Each part then
/// contributes its maximal ASCII alphanumeric runs.
///
/// # Example
///
/// ```
/// use piiguard::tokenizer::Tokenizer;
///
/// let tokens = Tokenizer::default().tokenize("john.doe@example.com");
/// assert_eq!(tokens, ["john", "doe", "example", "com"]);
/// ```
pub struct Tokenizer {
    splitters: Vec<Box<dyn FormatSplitter>>,
}

impl Tokenizer {
    /// A tokenizer that only splits on whitespace.
    #[must_use]
    pub fn plain() -> Self {
        Self { splitters: Vec::new() }
    }

    /// Appends a splitter; earlier splitters take precedence.
    #[must_use]
    pub fn with_splitter(mut self, splitter: impl FormatSplitter + 'static) -> Self {
        self.splitters.push(Box::new(splitter));
        self
    }

    /// Splits `value` into tokens. Case is preserved.
    #[must_use]
    pub fn tokenize(&self, value: &str) -> Vec<String> {
        let (normalized, separator) = self
            .splitters
            .iter()
            .find_map(|splitter| {
                splitter.split(value).map(|split| {
                    tracing::trace!(format = splitter.name(), "value matched splitter");
                    split
                })
            })
            .unwrap_or_else(|| (value.to_owned(), FALLBACK_SEPARATOR));

        normalized
            .split(separator)
            .flat_map(|part| token_regex().find_iter(part).map(|m| m.as_str().to_owned()))
            .collect()
    }
}

/// Email, phone, NIK and NPWP splitters, in that order.
impl Default for Tokenizer {
    fn default() -> Self {
        Self::plain()
            .with_splitter(EmailSplitter)
            .with_splitter(PhoneSplitter)
            .with_splitter(NationalIdSplitter)
            .with_splitter(TaxIdSplitter)
    }
}

impl fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.splitters.iter().map(|s| s.name()).collect();
        f.debug_struct("Tokenizer").field("splitters", &names).finish()
    }
}
