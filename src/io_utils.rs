//! I/O utilities for reading delimited exports and writing SQL.
//!
//! All file I/O in csv2sql flows through this module. It provides:
//!
//! - **Encoding**: input decoding via `encoding_rs`, defaulting to UTF-8.
//! - **Row source**: [`DelimitedSource`] reads the header record once, then
//!   yields data rows and can rewind to the first data row so the profiling
//!   and INSERT passes both stream the file instead of buffering it.
//! - **SQL destination**: [`SqlWriter`] writes to a file or stdout and can roll
//!   a file destination back to a checkpoint when one input fails midway.

use std::{
    fs::File,
    io::{self, BufWriter, Read, Seek, SeekFrom, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::{ByteRecord, Position};
use encoding_rs::{Encoding, UTF_8};

use crate::error::{ConvertError, ConvertResult};

pub const DEFAULT_DELIMITER: u8 = b'|';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

/// Decodes one field as-is; leading bytes that look like a BOM are data here.
pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Option<String> {
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        None
    } else {
        Some(text.into_owned())
    }
}

/// Drops a file-level byte order mark for UTF-8 or the configured encoding.
fn strip_bom<'a>(bytes: &'a [u8], encoding: &'static Encoding) -> &'a [u8] {
    match Encoding::for_bom(bytes) {
        Some((found, length)) if found == UTF_8 || found == encoding => &bytes[length..],
        _ => bytes,
    }
}

fn decode_record_into(
    record: &ByteRecord,
    encoding: &'static Encoding,
    line: u64,
    row: &mut Vec<String>,
) -> ConvertResult<()> {
    row.clear();
    for (idx, field) in record.iter().enumerate() {
        // only the very first field of the file can carry a BOM
        let field = if line == 1 && idx == 0 {
            strip_bom(field, encoding)
        } else {
            field
        };
        let decoded = decode_bytes(field, encoding).ok_or(ConvertError::Decode {
            line,
            encoding: encoding.name(),
        })?;
        row.push(decoded);
    }
    Ok(())
}

/// Settings for the field reader.
#[derive(Debug, Clone, Copy)]
pub struct ReaderOptions {
    pub delimiter: u8,
    pub buffer_bytes: usize,
    pub encoding: &'static Encoding,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            buffer_bytes: 10 * 1024,
            encoding: UTF_8,
        }
    }
}

pub fn open_delimited_reader<R>(reader: R, options: &ReaderOptions) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(options.delimiter)
        .double_quote(true)
        .buffer_capacity(options.buffer_bytes.max(1))
        // rows with the wrong field count are filtered by the profiler, not rejected here
        .flexible(true);
    builder.from_reader(reader)
}

/// A delimited file whose first record is the header.
pub struct DelimitedSource<R> {
    reader: csv::Reader<R>,
    encoding: &'static Encoding,
    headers: Vec<String>,
    data_start: Position,
    record: ByteRecord,
}

impl DelimitedSource<File> {
    pub fn open(path: &Path, options: &ReaderOptions) -> ConvertResult<Self> {
        if !path.exists() {
            return Err(ConvertError::MissingInput(path.to_path_buf()));
        }
        let file = File::open(path).map_err(|source| ConvertError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file, options)?.ok_or_else(|| ConvertError::MissingHeader(path.to_path_buf()))
    }
}

impl<R> DelimitedSource<R>
where
    R: Read + Seek,
{
    /// Reads the header record. Returns `None` when the input has no records at all.
    pub fn from_reader(inner: R, options: &ReaderOptions) -> ConvertResult<Option<Self>> {
        let mut reader = open_delimited_reader(inner, options);
        let mut record = ByteRecord::new();
        if !reader.read_byte_record(&mut record)? {
            return Ok(None);
        }
        let mut headers = Vec::with_capacity(record.len());
        decode_record_into(&record, options.encoding, 1, &mut headers)?;
        let data_start = reader.position().clone();
        Ok(Some(Self {
            reader,
            encoding: options.encoding,
            headers,
            data_start,
            record,
        }))
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Seeks back to the first record after the header.
    pub fn rewind(&mut self) -> ConvertResult<()> {
        self.reader.seek(self.data_start.clone())?;
        Ok(())
    }

    /// Reads the next data row into `row` and returns the line it started on,
    /// or `None` at end of input.
    pub fn next_row(&mut self, row: &mut Vec<String>) -> ConvertResult<Option<u64>> {
        let line = self.reader.position().line();
        if !self.reader.read_byte_record(&mut self.record)? {
            return Ok(None);
        }
        let line = self
            .record
            .position()
            .map(Position::line)
            .unwrap_or(line);
        decode_record_into(&self.record, self.encoding, line, row)?;
        Ok(Some(line))
    }
}

/// Destination for generated SQL.
pub enum SqlWriter {
    File(BufWriter<File>),
    Stdout(io::StdoutLock<'static>),
}

impl SqlWriter {
    /// Creates (truncating) the destination; `-` selects stdout.
    pub fn create(path: &Path) -> Result<Self> {
        if is_dash(path) {
            return Ok(SqlWriter::Stdout(io::stdout().lock()));
        }
        let file = File::create(path).with_context(|| format!("Creating output file {path:?}"))?;
        Ok(SqlWriter::File(BufWriter::new(file)))
    }

    /// Byte offset that [`SqlWriter::rollback`] can return to, if the destination supports it.
    pub fn checkpoint(&mut self) -> io::Result<Option<u64>> {
        match self {
            SqlWriter::File(writer) => {
                writer.flush()?;
                writer.get_mut().stream_position().map(Some)
            }
            SqlWriter::Stdout(_) => Ok(None),
        }
    }

    /// Discards everything written after `mark`. Returns false when nothing could be undone.
    pub fn rollback(&mut self, mark: Option<u64>) -> io::Result<bool> {
        match (self, mark) {
            (SqlWriter::File(writer), Some(offset)) => {
                writer.flush()?;
                let file = writer.get_mut();
                file.set_len(offset)?;
                file.seek(SeekFrom::Start(offset))?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl Write for SqlWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            SqlWriter::File(writer) => writer.write(buf),
            SqlWriter::Stdout(writer) => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            SqlWriter::File(writer) => writer.flush(),
            SqlWriter::Stdout(writer) => writer.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1252;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn source(text: &str) -> DelimitedSource<Cursor<Vec<u8>>> {
        DelimitedSource::from_reader(Cursor::new(text.as_bytes().to_vec()), &ReaderOptions::default())
            .expect("open source")
            .expect("header present")
    }

    #[test]
    fn rewind_replays_data_rows_without_header() {
        let mut source = source("a|b\n1|2\n3|4\n");
        assert_eq!(source.headers().to_vec(), vec!["a", "b"]);
        let mut row = Vec::new();
        let mut first = Vec::new();
        while source.next_row(&mut row).expect("row").is_some() {
            first.push(row.clone());
        }
        source.rewind().expect("rewind");
        let mut second = Vec::new();
        while source.next_row(&mut row).expect("row").is_some() {
            second.push(row.clone());
        }
        assert_eq!(first, vec![vec!["1", "2"], vec!["3", "4"]]);
        assert_eq!(first, second);
    }

    #[test]
    fn rows_with_extra_fields_are_still_yielded() {
        let mut source = source("a|b\n1|2|3\n4\n");
        let mut row = Vec::new();
        assert_eq!(source.next_row(&mut row).expect("row"), Some(2));
        assert_eq!(row.len(), 3);
        assert_eq!(source.next_row(&mut row).expect("row"), Some(3));
        assert_eq!(row.len(), 1);
        assert_eq!(source.next_row(&mut row).expect("row"), None);
    }

    #[test]
    fn empty_input_has_no_header() {
        let opened =
            DelimitedSource::from_reader(Cursor::new(Vec::new()), &ReaderOptions::default())
                .expect("open");
        assert!(opened.is_none());
    }

    #[test]
    fn open_reports_missing_file() {
        let dir = tempdir().expect("temp dir");
        let err = DelimitedSource::open(&dir.path().join("nope.dat"), &ReaderOptions::default())
            .err()
            .expect("missing file");
        assert!(matches!(err, ConvertError::MissingInput(_)));
    }

    #[test]
    fn decodes_with_configured_encoding() {
        let (encoded, _, _) = WINDOWS_1252.encode("name\nCaf\u{e9}\n");
        let options = ReaderOptions {
            encoding: WINDOWS_1252,
            ..ReaderOptions::default()
        };
        let mut source = DelimitedSource::from_reader(Cursor::new(encoded.into_owned()), &options)
            .expect("open")
            .expect("header");
        let mut row = Vec::new();
        source.next_row(&mut row).expect("row");
        assert_eq!(row, vec!["Caf\u{e9}"]);
    }

    #[test]
    fn leading_bom_is_kept_inside_data_fields() {
        let mut source = source("\u{feff}a|b\nx|\u{feff}val\n");
        assert_eq!(source.headers().to_vec(), vec!["a", "b"]);
        let mut row = Vec::new();
        source.next_row(&mut row).expect("row");
        assert_eq!(row, vec!["x", "\u{feff}val"]);
    }

    #[test]
    fn bom_like_bytes_decode_with_configured_encoding() {
        let (encoded, _, _) = WINDOWS_1252.encode("name\n\u{ff}\u{fe}ab\n");
        let options = ReaderOptions {
            encoding: WINDOWS_1252,
            ..ReaderOptions::default()
        };
        let mut source = DelimitedSource::from_reader(Cursor::new(encoded.into_owned()), &options)
            .expect("open")
            .expect("header");
        let mut row = Vec::new();
        source.next_row(&mut row).expect("row");
        assert_eq!(row, vec!["\u{ff}\u{fe}ab"]);
    }

    #[test]
    fn rollback_truncates_file_destination() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("out.sql");
        let mut writer = SqlWriter::create(&path).expect("create");
        writer.write_all(b"kept;\n").expect("write");
        let mark = writer.checkpoint().expect("checkpoint");
        writer.write_all(b"discarded;\n").expect("write");
        assert!(writer.rollback(mark).expect("rollback"));
        writer.write_all(b"next;\n").expect("write");
        writer.flush().expect("flush");
        drop(writer);
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "kept;\nnext;\n");
    }
}
