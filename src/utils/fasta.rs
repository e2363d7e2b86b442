use std::borrow::Cow;
use std::io::{BufRead, BufReader, Chain, Cursor, Read};
use std::path::Path;
use std::sync::Arc;
use log::{debug, warn};
use seq_io::fasta::{Reader as FastaReader, Record as _};
use crate::cli::OrphanPolicy;
use crate::config::defs::{PipelineError, HEADER_MARKER};
use crate::utils::file::{open_input, FileReader};


/// One FASTA record, tagged with the label of the file it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Header bytes after `>`, verbatim apart from the line terminator.
    pub original_id: Vec<u8>,
    /// All sequence lines concatenated, carriage returns removed.
    pub sequence: Vec<u8>,
    pub source_file: Arc<str>,
}

impl Record {
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Header for log and error messages; invalid UTF-8 is replaced.
    pub fn id_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.original_id)
    }
}

// First header line, then the rest of the input, then a newline so that a
// final header without a terminator still parses as an empty record.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

type Normalized<R> = Chain<Chain<Cursor<Vec<u8>>, BufReader<R>>, &'static [u8]>;

/// Lazy, forward-only reader over the records of one FASTA input.
///
/// Parsing is done by seq_io; this wrapper handles what comes before the first
/// header and turns each record into an owned [`Record`] so only one sequence
/// is held in memory at a time.
pub struct RecordReader<R: Read> {
    inner: Option<FastaReader<Normalized<R>>>,
    label: Arc<str>,
    skipped_lines: usize,
}

impl RecordReader<FileReader> {
    /// Opens a plain or gzipped FASTA file.
    ///
    /// # Arguments
    ///
    /// * `path` - Valid path to a FASTA file.
    /// * `label` - Provenance label carried by every record.
    /// * `policy` - Handling of sequence lines before the first header.
    ///
    /// # Returns
    /// RecordReader over the file, or InputUnreadable / MalformedInput.
    ///
    pub fn from_path(path: &Path, label: &str, policy: OrphanPolicy) -> Result<Self, PipelineError> {
        let reader = open_input(path)?;
        RecordReader::new(reader, label, policy)
    }
}

impl<R: Read> RecordReader<R> {
    pub fn new(reader: R, label: &str, policy: OrphanPolicy) -> Result<Self, PipelineError> {
        let mut buffered = BufReader::new(reader);
        let (first_header, skipped_lines) = seek_first_header(&mut buffered, label, policy)?;

        if skipped_lines > 0 {
            warn!(
                "Skipped {} sequence line(s) preceding the first header in {}",
                skipped_lines, label
            );
        }

        let inner = first_header.map(|header| {
            let normalized = Cursor::new(header).chain(buffered).chain(&b"\n"[..]);
            FastaReader::new(normalized)
        });
        if inner.is_none() {
            debug!("No FASTA header found in {}", label);
        }

        Ok(RecordReader {
            inner,
            label: Arc::from(label),
            skipped_lines,
        })
    }

    /// Number of orphan sequence lines dropped under `OrphanPolicy::Skip`.
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Record, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        let label = &self.label;
        let result = self.inner.as_mut()?.next()?;

        Some(match result {
            Ok(record) => {
                let mut sequence = Vec::with_capacity(record.seq().len());
                for line in record.seq_lines().map(strip_cr) {
                    if !is_blank(line) {
                        sequence.extend_from_slice(line);
                    }
                }
                Ok(Record {
                    original_id: strip_cr(record.head()).to_vec(),
                    sequence,
                    source_file: Arc::clone(label),
                })
            }
            Err(e) => Err(PipelineError::InvalidFastaFormat(format!("{}: {}", label, e))),
        })
    }
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

fn strip_cr(line: &[u8]) -> &[u8] {
    match line.last() {
        Some(b'\r') => &line[..line.len() - 1],
        _ => line,
    }
}

/// Reads up to and including the first header line.
///
/// A UTF-8 byte order mark at the very start is dropped and blank lines are
/// ignored. Any other line before the header is an orphan sequence line,
/// handled per `policy`.
///
/// # Returns
/// Tuple: (first header line if any, number of orphan lines skipped).
///
fn seek_first_header<B: BufRead>(
    reader: &mut B,
    label: &str,
    policy: OrphanPolicy,
) -> Result<(Option<Vec<u8>>, usize), PipelineError> {
    let mut line = Vec::new();
    let mut line_number = 0;
    let mut skipped = 0;

    loop {
        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .map_err(|e| PipelineError::InputUnreadable(format!("{}: {}", label, e)))?;
        if read == 0 {
            return Ok((None, skipped));
        }
        line_number += 1;
        if line_number == 1 && line.starts_with(UTF8_BOM) {
            line.drain(..UTF8_BOM.len());
        }

        if line.first() == Some(&HEADER_MARKER) {
            return Ok((Some(line), skipped));
        }
        if is_blank(&line) {
            continue;
        }
        match policy {
            OrphanPolicy::Fail => {
                return Err(PipelineError::MalformedInput {
                    file: label.to_string(),
                    line: line_number,
                });
            }
            OrphanPolicy::Skip => skipped += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn read_all(data: &[u8], policy: OrphanPolicy) -> Result<Vec<Record>, PipelineError> {
        RecordReader::new(data, "g1", policy)?.collect()
    }

    #[test]
    fn test_multiline_records() {
        let records = read_all(b">ctg1 len=8\nACGT\nACGT\n>ctg2\nTT\n", OrphanPolicy::Fail).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].original_id, b"ctg1 len=8");
        assert_eq!(records[0].sequence, b"ACGTACGT");
        assert_eq!(records[1].original_id, b"ctg2");
        assert_eq!(records[1].sequence, b"TT");
        assert_eq!(&*records[1].source_file, "g1");
    }

    #[test]
    fn test_carriage_returns_stripped() {
        let records = read_all(b">ctg1\r\nAC\r\nGT\r\n", OrphanPolicy::Fail).unwrap();
        assert_eq!(records[0].original_id, b"ctg1");
        assert_eq!(records[0].sequence, b"ACGT");
    }

    #[test]
    fn test_empty_sequences() {
        let records = read_all(b">a\n>b\nAC\n>c", OrphanPolicy::Fail).unwrap();
        let ids: Vec<&[u8]> = records.iter().map(|r| r.original_id.as_slice()).collect();
        assert_eq!(ids, vec![&b"a"[..], &b"b"[..], &b"c"[..]]);
        assert!(records[0].is_empty());
        assert_eq!(records[1].len(), 2);
        assert!(records[2].is_empty());
    }

    #[test]
    fn test_blank_lines_ignored() {
        let records = read_all(b"\n\n>a\nAC\n\nGT\n\n>b\nA\n", OrphanPolicy::Fail).unwrap();
        assert_eq!(records[0].sequence, b"ACGT");
        assert_eq!(records[1].sequence, b"A");
    }

    #[test]
    fn test_whitespace_only_lines_inside_record() {
        let records = read_all(b">a\nAC\n   \nGT\n \t\r\n>b\n  \nA\n", OrphanPolicy::Fail).unwrap();
        assert_eq!(records[0].sequence, b"ACGT");
        assert_eq!(records[1].sequence, b"A");
    }

    #[test]
    fn test_header_bytes_kept_verbatim() {
        let records = read_all(b">x\xff\nA\n>x\xfe\nC\n", OrphanPolicy::Fail).unwrap();
        assert_eq!(records[0].original_id, b"x\xff");
        assert_eq!(records[1].original_id, b"x\xfe");
        assert_ne!(records[0].original_id, records[1].original_id);
        assert_eq!(records[0].id_lossy(), "x\u{FFFD}");
    }

    #[test]
    fn test_leading_byte_order_mark() {
        let records = read_all(b"\xEF\xBB\xBF>a\nAC\n", OrphanPolicy::Fail).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].original_id, b"a");
        assert_eq!(records[0].sequence, b"AC");

        let records = read_all(b"\xEF\xBB\xBF\n>a\nAC\n", OrphanPolicy::Fail).unwrap();
        assert_eq!(records[0].original_id, b"a");
    }

    #[test]
    fn test_no_trailing_newline() {
        let records = read_all(b">a\nACGT", OrphanPolicy::Fail).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sequence, b"ACGT");
    }

    #[test]
    fn test_empty_input() {
        assert!(read_all(b"", OrphanPolicy::Fail).unwrap().is_empty());
        assert!(read_all(b"\n\n", OrphanPolicy::Fail).unwrap().is_empty());
    }

    #[test]
    fn test_orphan_lines_fail() {
        let err = read_all(b"\nACGT\n>a\nAC\n", OrphanPolicy::Fail).unwrap_err();
        match err {
            PipelineError::MalformedInput { file, line } => {
                assert_eq!(file, "g1");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_orphan_lines_skip() {
        let reader = RecordReader::new(&b"ACGT\nTTTT\n>a\nAC\n"[..], "g1", OrphanPolicy::Skip).unwrap();
        assert_eq!(reader.skipped_lines(), 2);
        let records: Vec<Record> = reader.collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].original_id, b"a");
        assert_eq!(records[0].sequence, b"AC");
    }

    #[test]
    fn test_from_path() -> std::io::Result<()> {
        let mut tmp = NamedTempFile::new()?;
        write!(tmp, ">x\nAAAA\nCC\n")?;
        tmp.flush()?;

        let records: Vec<Record> = RecordReader::from_path(tmp.path(), "x_file", OrphanPolicy::Fail)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sequence, b"AAAACC");
        assert_eq!(&*records[0].source_file, "x_file");
        Ok(())
    }
}
