use crate::error::LoadError;
use csv::{Reader, ReaderBuilder, StringRecord, StringRecordIter};
use std::borrow::Cow;
use std::io::Cursor;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Comma,
    Tab,
}

impl Delimiter {
    pub fn as_byte(&self) -> u8 {
        match self {
            Delimiter::Comma => b',',
            Delimiter::Tab => b'\t',
        }
    }
}

impl FromStr for Delimiter {
    type Err = LoadError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "comma" => Ok(Delimiter::Comma),
            "tab" => Ok(Delimiter::Tab),
            _ => Err(LoadError::config(
                "invalid delimiter type. You can only use: comma or tab",
            )),
        }
    }
}

/// Parser-level options for the tabular text reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    pub delimiter: Delimiter,
    /// When false, quotes must follow RFC 4180 placement.
    pub lazy_quotes: bool,
    pub trim_leading_space: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            delimiter: Delimiter::Comma,
            lazy_quotes: true,
            trim_leading_space: true,
        }
    }
}

/// A row lent out by a [`RowSource`].
///
/// The fields borrow the source's internal buffer and are only valid until the
/// next call to [`RowSource::next_row`]; callers that need the text afterwards
/// must copy it.
pub struct Row<'a> {
    line: u64,
    fields: &'a StringRecord,
}

impl<'a> Row<'a> {
    /// 1-based line on which the row starts.
    pub fn line(&self) -> u64 {
        self.line
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> StringRecordIter<'a> {
        self.fields.iter()
    }
}

/// Forward-only sequence of rows. `Ok(None)` signals end of input.
pub trait RowSource {
    fn next_row(&mut self) -> Result<Option<Row<'_>>, LoadError>;
}

/// Reads delimited rows out of a fully buffered input.
pub struct CsvRowSource<'a> {
    reader: Reader<Cursor<Cow<'a, [u8]>>>,
    options: ParserOptions,
    record: StringRecord,
}

impl<'a> CsvRowSource<'a> {
    pub fn new(input: &'a [u8], options: &ParserOptions) -> Self {
        // The csv reader only sees a quote at the first byte of a field, so
        // blanks are dropped before it splits anything.
        let input = if options.trim_leading_space {
            Cow::Owned(trim_field_starts(input, options.delimiter.as_byte()))
        } else {
            Cow::Borrowed(input)
        };

        let reader = ReaderBuilder::new()
            .delimiter(options.delimiter.as_byte())
            .has_headers(false) // header rows are decoded like any other row
            .flexible(true) // field counts are checked by the decoder
            .from_reader(Cursor::new(input));

        Self {
            reader,
            options: options.clone(),
            record: StringRecord::new(),
        }
    }
}

impl RowSource for CsvRowSource<'_> {
    fn next_row(&mut self) -> Result<Option<Row<'_>>, LoadError> {
        let start = self.reader.position().byte() as usize;
        if !self.reader.read_record(&mut self.record)? {
            return Ok(None);
        }
        let end = self.reader.position().byte() as usize;
        let line = self
            .record
            .position()
            .map(|pos| pos.line())
            .unwrap_or_default();

        if !self.options.lazy_quotes {
            let input: &[u8] = self.reader.get_ref().get_ref();
            let raw = &input[start.min(end)..end.min(input.len())];
            check_quotes(raw, self.options.delimiter.as_byte())
                .map_err(|message| LoadError::MalformedRow { line, message })?;
        }

        Ok(Some(Row { line, fields: &self.record }))
    }
}

fn is_blank(b: u8, delimiter: u8) -> bool {
    (b == b' ' || b == b'\t') && b != delimiter
}

/// Drops spaces and tabs at the start of every field. Quoted regions are
/// copied untouched and the delimiter itself is never dropped.
fn trim_field_starts(input: &[u8], delimiter: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    let mut field_start = true;

    while i < input.len() {
        let b = input[i];
        if field_start && is_blank(b, delimiter) {
            i += 1;
            continue;
        }
        if field_start && b == b'"' {
            out.push(b);
            i += 1;
            while let Some(&q) = input.get(i) {
                out.push(q);
                i += 1;
                if q == b'"' {
                    if input.get(i) != Some(&b'"') {
                        break;
                    }
                    out.push(b'"');
                    i += 1;
                }
            }
            field_start = false;
            continue;
        }

        field_start = b == delimiter || b == b'\n' || b == b'\r';
        out.push(b);
        i += 1;
    }
    out
}

/// Rejects stray quotes in the raw bytes of one record.
///
/// A quote may only open a field and, inside a quoted field, must be doubled
/// or close the field.
fn check_quotes(raw: &[u8], delimiter: u8) -> Result<(), &'static str> {
    let mut i = 0;
    let mut field_start = true;

    while i < raw.len() {
        let b = raw[i];
        if field_start && b == b'"' {
            i += 1;
            loop {
                match raw.get(i) {
                    None => return Err("extraneous or missing \" in quoted-field"),
                    Some(b'"') if raw.get(i + 1) == Some(&b'"') => i += 2,
                    Some(b'"') => {
                        i += 1;
                        match raw.get(i) {
                            None | Some(b'\n') | Some(b'\r') => {}
                            Some(&next) if next == delimiter => {}
                            Some(_) => return Err("extraneous or missing \" in quoted-field"),
                        }
                        break;
                    }
                    Some(_) => i += 1,
                }
            }
            field_start = false;
            continue;
        }

        if b == delimiter || b == b'\n' || b == b'\r' {
            field_start = true;
        } else if b == b'"' {
            return Err("bare \" in non-quoted-field");
        } else {
            field_start = false;
        }
        i += 1;
    }
    Ok(())
}
