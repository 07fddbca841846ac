/*
 * Name→string property bag and its textual wire format.
 *
 * Every entry is a string; values that cannot round-trip textually are
 * base64-wrapped by the persistence layer before they get here. The wire
 * form is one `name=value` line per entry with backslash escaping, entries
 * sorted by name, so persisted designer state is diffable and deterministic.
 *
 * Per-property failures during load never abort the batch; they are
 * recorded against an `ErrorLog` with the offending property name.
 */

use std::collections::BTreeMap;

use crate::error::{AxError, Result as AxResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyBag {
    entries: BTreeMap<String, String>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn write(&mut self, name: &str, value: &str) {
        self.entries.insert(name.to_string(), value.to_string());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries.remove(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /*
     * Textual wire form. Escapes: `\\` for backslash, `\n` for newline,
     * `\r` for carriage return, and `\e` for `=` (only required in names,
     * applied uniformly). One entry per line, sorted by name.
     */
    pub fn to_wire(&self) -> Vec<u8> {
        let mut out = String::new();
        for (name, value) in &self.entries {
            escape_into(name, &mut out);
            out.push('=');
            escape_into(value, &mut out);
            out.push('\n');
        }
        out.into_bytes()
    }

    pub fn from_wire(bytes: &[u8]) -> AxResult<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| AxError::Persistence("property bag is not valid UTF-8".into()))?;
        let mut bag = PropertyBag::new();
        for line in text.split('\n') {
            if line.is_empty() {
                continue;
            }
            let (name, value) = split_unescaped_eq(line).ok_or_else(|| {
                AxError::Persistence(format!("property bag line without separator: '{line}'"))
            })?;
            bag.entries.insert(unescape(name)?, unescape(value)?);
        }
        Ok(bag)
    }
}

fn escape_into(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '=' => out.push_str("\\e"),
            other => out.push(other),
        }
    }
}

// Finds the first '=' that is not part of an escape sequence.
fn split_unescaped_eq(line: &str) -> Option<(&str, &str)> {
    let bytes = line.as_bytes();
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' => escaped = true,
            b'=' => return Some((&line[..i], &line[i + 1..])),
            _ => {}
        }
    }
    None
}

fn unescape(text: &str) -> AxResult<String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('e') => out.push('='),
            other => {
                return Err(AxError::Persistence(format!(
                    "bad escape '\\{}' in property bag",
                    other.map(String::from).unwrap_or_default()
                )));
            }
        }
    }
    Ok(out)
}

/*
 * External error sink for per-property load/save failures. The batch keeps
 * going; the log keeps the evidence.
 */
pub trait ErrorLog {
    fn add_error(&mut self, property: &str, source: &str, message: &str);
}

/// Entry recorded by `RecordingErrorLog`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedError {
    pub property: String,
    pub source: String,
    pub message: String,
}

/// In-memory `ErrorLog` for hosts that want to inspect failures afterwards.
#[derive(Debug, Default)]
pub struct RecordingErrorLog {
    errors: Vec<LoggedError>,
}

impl RecordingErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> &[LoggedError] {
        &self.errors
    }
}

impl ErrorLog for RecordingErrorLog {
    fn add_error(&mut self, property: &str, source: &str, message: &str) {
        log::warn!("PropertyBag: '{property}' failed during persistence: {message}");
        self.errors.push(LoggedError {
            property: property.to_string(),
            source: source.to_string(),
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_round_trips_plain_entries() {
        let mut bag = PropertyBag::new();
        bag.write("Text", "hello");
        bag.write("Width", "75");
        let decoded = PropertyBag::from_wire(&bag.to_wire()).unwrap();
        assert_eq!(decoded, bag);
    }

    #[test]
    fn wire_round_trips_separators_and_non_ascii() {
        let mut bag = PropertyBag::new();
        bag.write("Name=With\\Equals", "a=b\nc\r\\d");
        bag.write("Grüße", "日本語");
        let decoded = PropertyBag::from_wire(&bag.to_wire()).unwrap();
        assert_eq!(decoded, bag);
    }

    #[test]
    fn wire_is_deterministic_and_sorted() {
        let mut bag = PropertyBag::new();
        bag.write("b", "2");
        bag.write("a", "1");
        assert_eq!(bag.to_wire(), b"a=1\nb=2\n".to_vec());
        assert_eq!(bag.to_wire(), bag.clone().to_wire());
    }

    #[test]
    fn malformed_line_is_fail_fast() {
        assert!(PropertyBag::from_wire(b"noseparator\n").is_err());
        assert!(PropertyBag::from_wire(b"bad\\q=x\n").is_err());
    }

    #[test]
    fn error_log_records_property_names() {
        let mut log = RecordingErrorLog::new();
        log.add_error("BackColor", "TestWidget", "no converter");
        assert_eq!(log.errors().len(), 1);
        assert_eq!(log.errors()[0].property, "BackColor");
    }
}
