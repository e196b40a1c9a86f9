//! Header and record parsing, plus routing key derivation.
//!
//! Field splitting is positional on the delimiter character. Quoted fields
//! that contain the delimiter are not treated specially and will mis-split.

/// UTF-8 BOM as it appears at the start of a decoded line.
const UTF8_BOM: char = '\u{feff}';

/// Quote character removed from routing keys.
pub const QUOTE: char = '"';

/// The first line of the input, replicated once into every destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    fields: Vec<String>,
}

impl Header {
    /// Parses the header from the first input line.
    ///
    /// A leading byte-order mark is dropped so it is not copied into every
    /// destination file.
    pub fn parse(line: &str, delimiter: char) -> Self {
        let line = line.strip_prefix(UTF8_BOM).unwrap_or(line);
        Self {
            fields: split_fields(line, delimiter)
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }

    /// Header field values in original order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Rejoins the fields with the delimiter, reproducing the header line.
    pub fn to_line(&self, delimiter: char) -> String {
        self.fields.join(delimiter.to_string().as_str())
    }

    pub fn into_fields(self) -> Vec<String> {
        self.fields
    }
}

/// Removes a single trailing `\n` or `\r\n` from a line read from input.
///
/// A `\r` that is not followed by `\n` is part of the record and is kept.
pub fn trim_line_terminator(line: &str) -> &str {
    match line.strip_suffix('\n') {
        Some(line) => line.strip_suffix('\r').unwrap_or(line),
        None => line,
    }
}

/// Splits a line into fields on every occurrence of `delimiter`.
pub fn split_fields(line: &str, delimiter: char) -> Vec<&str> {
    line.split(delimiter).collect()
}

/// Removes every double-quote character, not only the surrounding ones.
pub fn strip_quotes(value: &str) -> String {
    value.chars().filter(|c| *c != QUOTE).collect()
}

/// Derives the routing key of a record line.
///
/// `key_field` is 1-indexed. Rows too short to have that field yield an
/// empty key instead of an error.
pub fn routing_key(line: &str, delimiter: char, key_field: usize) -> String {
    let fields = split_fields(line, delimiter);
    key_field
        .checked_sub(1)
        .and_then(|index| fields.get(index))
        .map(|field| strip_quotes(field))
        .unwrap_or_default()
}

/// Name of the destination file for a routing key.
pub fn destination_name(key: &str, suffix: &str) -> String {
    format!("{}{}", key, suffix)
}
