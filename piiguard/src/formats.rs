//! Format-aware splitters used by the heap tokenizer.
//!
//! A splitter recognizes one value format, normalizes it, and names the
//! separator the tokenizer should split the normalized value on. Splitters
//! are pluggable: the built-ins cover email addresses, phone numbers,
//! Indonesian national IDs (NIK) and tax IDs (NPWP).

use chrono::NaiveDate;
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Recognizes a value format and tells the tokenizer how to split it.
pub trait FormatSplitter: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Returns the normalized value and its separator, or `None` if the
    /// value is not in this format.
    fn split(&self, value: &str) -> Option<(String, char)>;
}

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";
const PHONE_PATTERN: &str = r"^(?:\+?([0-9]{1,3}))?([0-9]{2})([0-9]{4,10})$";
const NIK_PATTERN: &str = r"^([0-9]{2})([0-9]{2})([0-9]{2})([0-9]{6})([0-9]{4})$";
const NPWP_PATTERN: &str = r"^([0-9]{2})([0-9]{3})([0-9]{3})([0-9])([0-9]{3})([0-9]{3})$";

const PHONE_MIN_LENGTH: usize = 10;
const PHONE_MAX_LENGTH: usize = 12;
const NIK_LENGTH: usize = 16;
const NPWP_LENGTH: usize = 15;

/// Registered tax identity prefixes accepted in the first NPWP group.
const TAX_IDENTITY_CODES: &[&str] = &[
    "01", "02", "21", "31", "00", "20", "04", "05", "06", "07", "08", "09", "24", "25", "26",
    "34", "35", "36", "41", "47", "42", "48", "49", "57", "58", "64", "65", "67", "71", "77",
    "78", "79", "87", "88", "89", "91", "97",
];

// Patterns are literals checked by the tests below; compilation cannot fail.
pub(crate) fn compiled(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("literal pattern compiles"))
}

fn email_regex() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    compiled(&CELL, EMAIL_PATTERN)
}

fn phone_regex() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    compiled(&CELL, PHONE_PATTERN)
}

fn nik_regex() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    compiled(&CELL, NIK_PATTERN)
}

fn npwp_regex() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    compiled(&CELL, NPWP_PATTERN)
}

// Non-participating groups join as empty strings.
fn join_groups(caps: &Captures<'_>, separator: char) -> String {
    caps.iter()
        .skip(1)
        .map(|group| group.map_or("", |m| m.as_str()))
        .collect::<Vec<_>>()
        .join(&separator.to_string())
}

/// Email addresses, split into local part and domain on `@`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmailSplitter;

impl FormatSplitter for EmailSplitter {
    fn name(&self) -> &'static str {
        "email"
    }

    fn split(&self, value: &str) -> Option<(String, char)> {
        email_regex().is_match(value).then(|| (value.to_owned(), '@'))
    }
}

/// Phone numbers with an optional country code.
///
/// Dashes and spaces are ignored. The digits are regrouped as
/// `country-area-subscriber` and split on `-`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhoneSplitter;

impl FormatSplitter for PhoneSplitter {
    fn name(&self) -> &'static str {
        "phone"
    }

    fn split(&self, value: &str) -> Option<(String, char)> {
        let cleaned: String = value.chars().filter(|c| *c != '-' && *c != ' ').collect();
        if !phone_regex().is_match(&cleaned) {
            return None;
        }

        let digits: String = cleaned.chars().filter(char::is_ascii_digit).collect();
        let caps = phone_regex().captures(&digits)?;
        let matched = caps.get(0)?.as_str().len();
        if !(PHONE_MIN_LENGTH..=PHONE_MAX_LENGTH).contains(&matched) {
            return None;
        }

        Some((join_groups(&caps, '-'), '-'))
    }
}

/// Indonesian national identity numbers (NIK).
///
/// Sixteen digits: province, city, district, birth date `DDMMYY`, serial.
/// The birth date must be a real calendar date in the 1900s.
#[derive(Debug, Clone, Copy, Default)]
pub struct NationalIdSplitter;

impl FormatSplitter for NationalIdSplitter {
    fn name(&self) -> &'static str {
        "nik"
    }

    fn split(&self, value: &str) -> Option<(String, char)> {
        if value.len() != NIK_LENGTH {
            return None;
        }
        let caps = nik_regex().captures(value)?;
        let birth = caps.get(4)?.as_str();
        let (day, month, year) = (&birth[..2], &birth[2..4], &birth[4..6]);
        NaiveDate::parse_from_str(&format!("19{year}{month}{day}"), "%Y%m%d").ok()?;

        Some((join_groups(&caps, '.'), '.'))
    }
}

/// Indonesian tax identity numbers (NPWP), fifteen digits.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaxIdSplitter;

impl FormatSplitter for TaxIdSplitter {
    fn name(&self) -> &'static str {
        "npwp"
    }

    fn split(&self, value: &str) -> Option<(String, char)> {
        if value.len() != NPWP_LENGTH {
            return None;
        }
        let caps = npwp_regex().captures(value)?;
        let prefix = caps.get(1)?.as_str();
        if !TAX_IDENTITY_CODES.contains(&prefix) {
            return None;
        }

        Some((join_groups(&caps, '.'), '.'))
    }
}
