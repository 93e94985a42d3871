//! Text cleanup and value parsing helpers for Brazilian documents.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use rust_decimal::Decimal;

use super::documents::format_cnpj;
use super::patterns::{BARE_DOCUMENT, CNPJ, CPF, DATETIME, PERCENTAGE, WHITESPACE};

/// Marker used on NFSe layouts for "not applicable".
pub const EMPTY_MARKER: &str = "---";

/// Remove zero-width spaces, collapse whitespace runs and trim.
pub fn clean_text(text: &str) -> String {
    let without_zw = text.replace('\u{200b}', "");
    WHITESPACE.replace_all(&without_zw, " ").trim().to_string()
}

/// Return `None` for empty strings and the `---` marker.
pub fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value == EMPTY_MARKER {
        None
    } else {
        Some(value.to_string())
    }
}

/// Text between the end of `start` and the first match of `stop` after it.
///
/// Runs to the end of `text` when `stop` does not match.
pub fn slice_between<'a>(text: &'a str, start: &Regex, stop: &Regex) -> Option<&'a str> {
    let begin = start.find(text)?.end();
    Some(slice_until(&text[begin..], stop))
}

/// Text from the start of `rest` up to the first match of `stop`, trimmed.
pub fn slice_until<'a>(rest: &'a str, stop: &Regex) -> &'a str {
    let end = stop.find(rest).map(|m| m.start()).unwrap_or(rest.len());
    rest[..end].trim()
}

/// A section of the document from its title up to the next section title.
pub fn section<'a>(text: &'a str, start: &Regex, end: &Regex) -> Option<&'a str> {
    let m = start.find(text)?;
    let rest = &text[m.end()..];
    let stop = end.find(rest).map(|e| e.start()).unwrap_or(rest.len());
    Some(&text[m.start()..m.end() + stop])
}

/// Parse a Brazilian currency amount.
///
/// `"R$ 1.500,00"` becomes `1500.00`. Returns `None` for empty values,
/// the `---` marker, or text without digits.
pub fn parse_brl_amount(text: &str) -> Option<Decimal> {
    let text = clean_text(text);
    if text.is_empty() || text == EMPTY_MARKER {
        return None;
    }

    let normalized: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    if !normalized.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    Decimal::from_str(normalized.trim_end_matches('.')).ok()
}

/// Parse a percentage into a fraction: `"2%"` becomes `0.02`.
pub fn parse_percentage(text: &str) -> Option<Decimal> {
    let text = clean_text(text);
    if text.is_empty() || text == EMPTY_MARKER {
        return None;
    }

    let caps = PERCENTAGE.captures(&text)?;
    let value = Decimal::from_str(&caps[1].replace(',', ".")).ok()?;
    Some(value / Decimal::ONE_HUNDRED)
}

/// Parse `dd/mm/yyyy hh:mm` or `dd/mm/yyyy` (midnight).
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = clean_text(text);
    let caps = DATETIME.captures(&text)?;

    let date = NaiveDate::parse_from_str(&caps[1], "%d/%m/%Y").ok()?;
    let time = match caps.get(2) {
        Some(t) => NaiveTime::parse_from_str(t.as_str(), "%H:%M").ok()?,
        None => NaiveTime::from_hms_opt(0, 0, 0)?,
    };

    Some(date.and_time(time))
}

/// Find a CNPJ or CPF in text.
///
/// Formatted CNPJ first, then formatted CPF, then a bare 14 or 11 digit
/// number following a `CNPJ`/`CPF` label. Bare CNPJs come back punctuated.
pub fn extract_cnpj_cpf(text: &str) -> Option<String> {
    if let Some(m) = CNPJ.find(text) {
        return Some(m.as_str().to_string());
    }
    if let Some(m) = CPF.find(text) {
        return Some(m.as_str().to_string());
    }
    BARE_DOCUMENT.captures(text).map(|c| format_cnpj(&c[1]))
}
