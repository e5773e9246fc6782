//! Tabular ingestion - delimited text into a [`Dataframe`]
//!
//! The caller declares the ordered `column → type` mapping (label column
//! included) and names the label column. The first row is the header and must
//! name exactly the declared columns; field order follows the header.
//!
//! ```rust
//! use trueno_pipeline::dataframe::DataType;
//! use trueno_pipeline::ingest::{parse_reader, TabularFormat};
//!
//! # fn example() -> trueno_pipeline::Result<()> {
//! let text = "age,sex,sick\n61,M,yes\n42,F,no\n";
//! let df = parse_reader(
//!     text.as_bytes(),
//!     &TabularFormat::default(),
//!     &[("age", DataType::Numerical), ("sex", DataType::Categorical), ("sick", DataType::Boolean)],
//!     Some("sick"),
//! )?;
//! assert_eq!(df.len(), 2);
//! # Ok(())
//! # }
//! ```

use crate::dataframe::{DataType, Dataframe, Record, Schema, Value};
use crate::{Error, Result};
use flate2::read::GzDecoder;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

/// Record terminator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Terminator {
    /// `\n`, `\r` or `\r\n`
    #[default]
    Newline,
    /// A single custom byte
    Byte(u8),
}

/// Delimited-text dialect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabularFormat {
    /// Field delimiter (default `,`)
    pub delimiter: u8,
    /// Quote character (default `"`)
    pub quote: u8,
    /// Record terminator
    pub terminator: Terminator,
    /// Input is gzip-compressed
    pub gzip: bool,
}

impl Default for TabularFormat {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            terminator: Terminator::Newline,
            gzip: false,
        }
    }
}

impl TabularFormat {
    /// Comma-separated, double-quoted.
    #[must_use]
    pub fn csv() -> Self {
        Self::default()
    }

    /// Tab-separated.
    #[must_use]
    pub fn tsv() -> Self {
        Self::default().with_delimiter(b'\t')
    }

    /// Set field delimiter
    #[must_use]
    pub const fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set quote character
    #[must_use]
    pub const fn with_quote(mut self, quote: u8) -> Self {
        self.quote = quote;
        self
    }

    /// Set record terminator
    #[must_use]
    pub const fn with_terminator(mut self, terminator: Terminator) -> Self {
        self.terminator = terminator;
        self
    }

    /// Mark input as gzip-compressed
    #[must_use]
    pub const fn with_gzip(mut self, gzip: bool) -> Self {
        self.gzip = gzip;
        self
    }

    fn reader<R: Read>(&self, input: R) -> csv::Reader<R> {
        let terminator = match self.terminator {
            Terminator::Newline => csv::Terminator::CRLF,
            Terminator::Byte(b) => csv::Terminator::Any(b),
        };
        csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .quote(self.quote)
            .terminator(terminator)
            .has_headers(true)
            .flexible(true)
            .from_reader(input)
    }
}

fn parse_error(line: u64, message: impl std::fmt::Display) -> Error {
    Error::ParseError(format!("line {line}: {message}"))
}

fn parse_value(raw: &str, data_type: DataType) -> std::result::Result<Option<Value>, String> {
    if raw.is_empty() {
        return Ok(None);
    }
    match data_type {
        DataType::Numerical | DataType::Ordinal => raw
            .trim()
            .parse::<f64>()
            .map(|n| Some(Value::Number(n)))
            .map_err(|_| format!("'{raw}' is not a number")),
        DataType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Some(Value::Bool(true))),
            "false" | "0" | "no" => Ok(Some(Value::Bool(false))),
            _ => Err(format!("'{raw}' is not a boolean")),
        },
        DataType::Categorical => Ok(Some(Value::Text(raw.to_string()))),
    }
}

/// Parse delimited text from any reader.
///
/// # Errors
/// Returns `ParseError` for header mismatches, rows with the wrong field
/// count, or unparsable fields; `InvalidInput` for an undeclared label column
pub fn parse_reader<R: Read>(
    input: R,
    format: &TabularFormat,
    columns: &[(&str, DataType)],
    label: Option<&str>,
) -> Result<Dataframe> {
    if format.gzip {
        return parse_plain(GzDecoder::new(input), format, columns, label);
    }
    parse_plain(input, format, columns, label)
}

/// Parse a delimited file; `.gz` paths are decompressed regardless of `format.gzip`.
///
/// # Errors
/// Returns `Io` if the file cannot be opened, otherwise as [`parse_reader`]
pub fn parse_file(
    path: impl AsRef<Path>,
    format: &TabularFormat,
    columns: &[(&str, DataType)],
    label: Option<&str>,
) -> Result<Dataframe> {
    let path = path.as_ref();
    let gz = path.extension().is_some_and(|e| e == "gz");
    let file = BufReader::new(File::open(path)?);
    let format = format.clone().with_gzip(format.gzip || gz);
    let df = parse_reader(file, &format, columns, label)?;
    info!(path = %path.display(), records = df.len(), "ingested file");
    Ok(df)
}

fn parse_plain<R: Read>(
    input: R,
    format: &TabularFormat,
    columns: &[(&str, DataType)],
    label: Option<&str>,
) -> Result<Dataframe> {
    let declared: BTreeMap<&str, DataType> = columns.iter().copied().collect();
    if declared.len() != columns.len() {
        return Err(Error::InvalidInput("duplicate declared column".to_string()));
    }
    let label_type = match label {
        Some(name) => Some(declared.get(name).copied().ok_or_else(|| {
            Error::InvalidInput(format!("label column '{name}' is not declared"))
        })?),
        None => None,
    };

    let mut reader = format.reader(input);
    let header: Vec<String> = reader
        .headers()
        .map_err(|e| parse_error(1, e))?
        .iter()
        .map(str::to_string)
        .collect();
    let header_set: BTreeSet<&str> = header.iter().map(String::as_str).collect();
    let declared_set: BTreeSet<&str> = declared.keys().copied().collect();
    if header_set != declared_set || header_set.len() != header.len() {
        return Err(parse_error(
            1,
            format!(
                "header {header:?} does not name exactly the declared columns {:?}",
                columns.iter().map(|(n, _)| *n).collect::<Vec<_>>()
            ),
        ));
    }

    let schema = Schema::new(
        columns
            .iter()
            .filter(|(n, _)| Some(*n) != label)
            .map(|(n, t)| (*n, *t)),
    )?;
    let mut df = Dataframe::new(schema);
    if let (Some(name), Some(t)) = (label, label_type) {
        df = df.with_label(name, t);
    }

    for row in reader.records() {
        let row = row.map_err(|e| Error::ParseError(e.to_string()))?;
        let line = row.position().map_or(0, csv::Position::line);
        if row.len() != header.len() {
            return Err(parse_error(
                line,
                format!("expected {} fields, got {}", header.len(), row.len()),
            ));
        }

        let mut record = Record::default();
        for (column, raw) in header.iter().zip(row.iter()) {
            let data_type = declared[column.as_str()];
            let value = parse_value(raw, data_type)
                .map_err(|m| parse_error(line, format!("column '{column}': {m}")))?;
            match value {
                Some(v) if Some(column.as_str()) == label => record.set_y(Some(v)),
                Some(v) => record.set_feature(column.as_str(), v),
                None => {}
            }
        }
        df.add(record)?;
    }
    debug!(records = df.len(), columns = header.len(), "parsed delimited text");
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLUMNS: &[(&str, DataType)] = &[
        ("age", DataType::Numerical),
        ("sex", DataType::Categorical),
        ("sick", DataType::Boolean),
    ];

    #[test]
    fn test_parse_with_label() {
        let text = "age,sex,sick\n61,M,yes\n42,F,No\n";
        let df = parse_reader(text.as_bytes(), &TabularFormat::csv(), COLUMNS, Some("sick")).unwrap();

        assert_eq!(df.len(), 2);
        assert_eq!(df.schema().names().collect::<Vec<_>>(), vec!["age", "sex"]);
        assert_eq!(df.label().unwrap().data_type, DataType::Boolean);
        let first = df.get(0).unwrap();
        assert_eq!(first.number("age"), Some(61.0));
        assert_eq!(first.y(), Some(&Value::Bool(true)));
        assert_eq!(df.get(1).unwrap().y(), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_header_order_may_differ() {
        let text = "sick,sex,age\n1,F,30\n";
        let df = parse_reader(text.as_bytes(), &TabularFormat::csv(), COLUMNS, None).unwrap();
        assert_eq!(df.get(0).unwrap().number("age"), Some(30.0));
        assert_eq!(df.get(0).unwrap().feature("sick"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_empty_fields_are_missing() {
        let text = "age,sex,sick\n,M,\n";
        let df = parse_reader(text.as_bytes(), &TabularFormat::csv(), COLUMNS, Some("sick")).unwrap();
        let record = df.get(0).unwrap();
        assert!(record.feature("age").is_none());
        assert!(record.y().is_none());
        assert_eq!(record.feature("sex"), Some(&Value::from("M")));
    }

    #[test]
    fn test_wrong_field_count_names_the_line() {
        let text = "age,sex,sick\n61,M,yes\n42,F\n";
        let err = parse_reader(text.as_bytes(), &TabularFormat::csv(), COLUMNS, None).unwrap_err();
        assert!(matches!(err, Error::ParseError(_)));
        assert!(err.to_string().contains("line 3"), "{err}");
        assert!(err.to_string().contains("expected 3 fields, got 2"));
    }

    #[test]
    fn test_header_mismatch() {
        let text = "age,gender,sick\n61,M,yes\n";
        let err = parse_reader(text.as_bytes(), &TabularFormat::csv(), COLUMNS, None).unwrap_err();
        assert!(err.to_string().contains("header"));
    }

    #[test]
    fn test_unparsable_number() {
        let text = "age,sex,sick\nold,M,yes\n";
        let err = parse_reader(text.as_bytes(), &TabularFormat::csv(), COLUMNS, None).unwrap_err();
        assert!(err.to_string().contains("column 'age'"));
    }

    #[test]
    fn test_undeclared_label() {
        let text = "age,sex,sick\n";
        let err = parse_reader(text.as_bytes(), &TabularFormat::csv(), COLUMNS, Some("y")).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_custom_dialect() {
        let text = "age;sex;sick|'7';'a;b';0|";
        let format = TabularFormat::default()
            .with_delimiter(b';')
            .with_quote(b'\'')
            .with_terminator(Terminator::Byte(b'|'));
        let df = parse_reader(text.as_bytes(), &format, COLUMNS, None).unwrap();
        assert_eq!(df.get(0).unwrap().feature("sex"), Some(&Value::from("a;b")));
        assert_eq!(df.get(0).unwrap().number("age"), Some(7.0));
    }

    #[test]
    fn test_gzip_file() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(b"age,sex,sick\n5,F,false\n").unwrap();
        encoder.finish().unwrap();

        let df = parse_file(&path, &TabularFormat::csv(), COLUMNS, None).unwrap();
        assert_eq!(df.len(), 1);
        assert_eq!(df.get(0).unwrap().feature("sick"), Some(&Value::Bool(false)));
    }
}
