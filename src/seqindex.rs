//! FASTA/FASTQ indexing with random-access sub-sequence retrieval
//!
//! Builds an in-memory index of record id -> (length, byte offset, line
//! geometry) so that any sub-range of a sequence can be fetched without
//! re-scanning the file, using the same offset arithmetic as a .fai index.

use log::warn;
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Read ids beginning with this prefix were produced by tooling that failed
/// to assign unique UUIDs; such input is systemically corrupt and must be
/// fixed upstream before analysis.
pub const PLACEHOLDER_ID: &str = "00000000-0000-0000-0000-000000000000";

/// One indexed sequence record. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceRecord {
    pub id: String,
    pub length: usize,
    /// Byte offset of the first sequence base
    offset: u64,
    /// Bases per full sequence line
    line_bases: usize,
    /// Bytes per full sequence line, including the terminator
    line_bytes: usize,
}

/// Index over one FASTA or FASTQ file, preserving file order
#[derive(Debug)]
pub struct SequenceFileIndex {
    path: PathBuf,
    records: Vec<SequenceRecord>,
    by_id: FxHashMap<String, usize>,
}

/// Record id: header token up to the first whitespace
fn header_id(header: &str) -> String {
    header
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_string()
}

/// A read id matched the placeholder pattern. This marks the whole input as
/// systemically corrupt, so callers must abort the run rather than skip the
/// file.
#[derive(Debug)]
pub struct PlaceholderIdError {
    pub id: String,
    pub path: PathBuf,
}

impl std::fmt::Display for PlaceholderIdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Read '{}' in '{}' has a placeholder id: the reads were generated without unique UUIDs and must be re-extracted with fixed ids",
            self.id,
            self.path.display()
        )
    }
}

impl std::error::Error for PlaceholderIdError {}

/// Whether an indexing error is the run-aborting placeholder-id failure
pub fn is_placeholder_error(e: &io::Error) -> bool {
    e.get_ref().is_some_and(|inner| inner.is::<PlaceholderIdError>())
}

fn placeholder_error(path: &Path, id: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        PlaceholderIdError {
            id: id.to_string(),
            path: path.to_path_buf(),
        },
    )
}

impl SequenceFileIndex {
    /// Index a FASTA file. Fails on unreadable input, irregular line
    /// wrapping, or a placeholder read id.
    pub fn index_fasta(path: &Path) -> io::Result<Self> {
        let file = File::open(path).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("Failed to open FASTA file '{}': {}", path.display(), e),
            )
        })?;
        let mut reader = BufReader::new(file);

        let mut records: Vec<SequenceRecord> = Vec::new();
        let mut by_id = FxHashMap::default();
        let mut pos: u64 = 0;
        let mut line = Vec::new();
        // Set once a short (final) line has been seen for the current record
        let mut short_line_seen = false;

        loop {
            line.clear();
            let bytes = reader.read_until(b'\n', &mut line)?;
            if bytes == 0 {
                break;
            }
            let text = std::str::from_utf8(&line).map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Invalid UTF-8 in '{}'", path.display()),
                )
            })?;
            let trimmed = text.trim_end_matches(['\n', '\r']);

            if let Some(header) = trimmed.strip_prefix('>') {
                let id = header_id(header);
                if id.starts_with(PLACEHOLDER_ID) {
                    return Err(placeholder_error(path, &id));
                }
                by_id.insert(id.clone(), records.len());
                records.push(SequenceRecord {
                    id,
                    length: 0,
                    offset: pos + bytes as u64,
                    line_bases: 0,
                    line_bytes: 0,
                });
                short_line_seen = false;
            } else if !trimmed.is_empty() {
                let record = records.last_mut().ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("Sequence before first header in '{}'", path.display()),
                    )
                })?;
                if record.line_bases == 0 {
                    record.line_bases = trimmed.len();
                    record.line_bytes = bytes;
                } else if short_line_seen || trimmed.len() > record.line_bases {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!(
                            "Record '{}' in '{}' has sequence lines of different length",
                            record.id,
                            path.display()
                        ),
                    ));
                }
                if trimmed.len() < record.line_bases {
                    short_line_seen = true;
                }
                record.length += trimmed.len();
            }
            pos += bytes as u64;
        }

        Ok(SequenceFileIndex {
            path: path.to_path_buf(),
            records,
            by_id,
        })
    }

    /// Index a FASTQ file (four lines per record, single-line sequence)
    pub fn index_fastq(path: &Path) -> io::Result<Self> {
        let file = File::open(path).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("Failed to open FASTQ file '{}': {}", path.display(), e),
            )
        })?;
        let mut reader = BufReader::new(file);

        let mut records: Vec<SequenceRecord> = Vec::new();
        let mut by_id = FxHashMap::default();
        let mut pos: u64 = 0;
        let mut line = Vec::new();
        // Position within the 4-line record: 0 header, 1 sequence, 2 '+', 3 quality
        let mut phase = 0;

        loop {
            line.clear();
            let bytes = reader.read_until(b'\n', &mut line)?;
            if bytes == 0 {
                break;
            }
            let text = std::str::from_utf8(&line).map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Invalid UTF-8 in '{}'", path.display()),
                )
            })?;
            let trimmed = text.trim_end_matches(['\n', '\r']);

            match phase {
                0 => {
                    let header = trimmed.strip_prefix('@').ok_or_else(|| {
                        io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!(
                                "Malformed FASTQ header line in '{}': {}",
                                path.display(),
                                trimmed
                            ),
                        )
                    })?;
                    let id = header_id(header);
                    if id.starts_with(PLACEHOLDER_ID) {
                        return Err(placeholder_error(path, &id));
                    }
                    by_id.insert(id.clone(), records.len());
                    records.push(SequenceRecord {
                        id,
                        length: 0,
                        offset: pos + bytes as u64,
                        line_bases: 0,
                        line_bytes: 0,
                    });
                }
                1 => {
                    let record = records.last_mut().ok_or_else(|| {
                        io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("Sequence before first header in '{}'", path.display()),
                        )
                    })?;
                    record.length = trimmed.len();
                    record.line_bases = trimmed.len();
                    record.line_bytes = bytes;
                }
                _ => {}
            }
            phase = (phase + 1) % 4;
            pos += bytes as u64;
        }

        if phase != 0 {
            warn!(
                "FASTQ file '{}' ends with a truncated record",
                path.display()
            );
        }

        Ok(SequenceFileIndex {
            path: path.to_path_buf(),
            records,
            by_id,
        })
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> impl Iterator<Item = &SequenceRecord> {
        self.records.iter()
    }

    pub fn get(&self, i: usize) -> Option<&SequenceRecord> {
        self.records.get(i)
    }

    pub fn get_length(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).map(|&i| self.records[i].length)
    }

    /// Fetch the sub-sequence [start, end] (0-based, inclusive) of a record.
    ///
    /// `end` past the record is clamped to the last base; `start` outside the
    /// record or `start > end` is an error. Reads only the bytes covering the
    /// requested range.
    pub fn subsequence(&self, id: &str, start: usize, end: usize) -> io::Result<String> {
        let record = self
            .by_id
            .get(id)
            .map(|&i| &self.records[i])
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("Sequence '{}' not found in '{}'", id, self.path.display()),
                )
            })?;

        if start > end || start >= record.length {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "Range ({}, {}) out of bounds for '{}' of length {}",
                    start, end, id, record.length
                ),
            ));
        }
        let end = end.min(record.length - 1);
        let wanted = end - start + 1;

        let file_pos = if record.line_bases > 0 {
            record.offset
                + (start / record.line_bases) as u64 * record.line_bytes as u64
                + (start % record.line_bases) as u64
        } else {
            record.offset
        };

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(file_pos))?;

        let mut sequence = String::with_capacity(wanted);
        let mut buf = [0u8; 4096];
        while sequence.len() < wanted {
            let n = file.read(&mut buf)?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "Sequence data for '{}' ended before position {}",
                        id, end
                    ),
                ));
            }
            for &b in &buf[..n] {
                if b == b'\n' || b == b'\r' {
                    continue;
                }
                sequence.push(b as char);
                if sequence.len() == wanted {
                    break;
                }
            }
        }
        Ok(sequence)
    }
}
