//! SAM parsing for the BWA, BLASR and marginAlign formats
//!
//! The three aligners share the SAM container but not a score scale, so the
//! score of each record is normalized per format (higher is always better
//! within one file): BWA's `AS:i:` is used as-is, BLASR's lower-is-better
//! `AS:i:` is negated, and marginAlign (which emits no `AS`) scores by the
//! number of query bases in aligned columns.

use crate::alignment_record::{
    AlignerFormat, AlignmentFragment, EditOp, ParsedAlignments, Strand,
};
use log::warn;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, Error as IoError};
use std::num::ParseIntError;
use std::path::Path;

const FLAG_UNMAPPED: u16 = 0x4;
const FLAG_REVERSE: u16 = 0x10;

#[derive(Debug)]
pub enum ParseErr {
    NotEnoughFields,
    IoError(IoError),
    InvalidField(ParseIntError),
    InvalidCigarFormat,
    UnsupportedCigarOperation(char),
}

impl std::fmt::Display for ParseErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseErr::NotEnoughFields => write!(f, "Not enough fields in SAM record"),
            ParseErr::IoError(e) => write!(f, "IO error: {}", e),
            ParseErr::InvalidField(e) => write!(f, "Invalid field: {}", e),
            ParseErr::InvalidCigarFormat => write!(f, "Invalid CIGAR format"),
            ParseErr::UnsupportedCigarOperation(c) => {
                write!(f, "Unsupported CIGAR operation '{}'", c)
            }
        }
    }
}

impl std::error::Error for ParseErr {}

/// CIGAR broken down into edit ops plus clip geometry
struct CigarSummary {
    ops: Vec<EditOp>,
    leading_clip: usize,
    trailing_clip: usize,
    hard_clip: usize,
    query_bases: usize,
    hit_bases: usize,
}

fn parse_cigar(cigar: &str) -> Result<CigarSummary, ParseErr> {
    let mut summary = CigarSummary {
        ops: Vec::new(),
        leading_clip: 0,
        trailing_clip: 0,
        hard_clip: 0,
        query_bases: 0,
        hit_bases: 0,
    };
    let mut len = 0usize;
    for c in cigar.chars() {
        if let Some(d) = c.to_digit(10) {
            len = len * 10 + d as usize;
            continue;
        }
        if len == 0 {
            return Err(ParseErr::InvalidCigarFormat);
        }
        match c {
            'M' | '=' | 'X' | 'I' | 'D' => {
                let op = EditOp::new(len, c);
                if op.consumes_query() {
                    summary.query_bases += len;
                }
                if op.consumes_hit() {
                    summary.hit_bases += len;
                }
                summary.ops.push(op);
            }
            'S' | 'H' => {
                if summary.ops.is_empty() {
                    summary.leading_clip += len;
                } else {
                    summary.trailing_clip += len;
                }
                if c == 'H' {
                    summary.hard_clip += len;
                }
            }
            _ => return Err(ParseErr::UnsupportedCigarOperation(c)),
        }
        len = 0;
    }
    if len != 0 || summary.ops.is_empty() {
        return Err(ParseErr::InvalidCigarFormat);
    }
    Ok(summary)
}

fn find_as_tag(fields: &[&str]) -> Option<i64> {
    fields
        .iter()
        .skip(11)
        .find_map(|tag| tag.strip_prefix("AS:i:"))
        .and_then(|v| v.parse::<i64>().ok())
}

/// Parse one SAM record line into an AlignmentFragment, or None for an
/// unaligned read
fn parse_sam_line(
    line: &str,
    format: AlignerFormat,
    hit_lengths: &FxHashMap<String, usize>,
) -> Result<Option<AlignmentFragment>, ParseErr> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 11 {
        return Err(ParseErr::NotEnoughFields);
    }

    let flag = fields[1].parse::<u16>().map_err(ParseErr::InvalidField)?;
    if flag & FLAG_UNMAPPED != 0 || fields[2] == "*" || fields[5] == "*" {
        return Ok(None);
    }

    let query_name = fields[0].to_string();
    let hit_name = fields[2].to_string();
    let pos = fields[3].parse::<usize>().map_err(ParseErr::InvalidField)?;
    let cigar = parse_cigar(fields[5])?;

    // Query length from SEQ plus hard clips (SEQ carries soft-clipped bases
    // but not hard-clipped ones); fall back to the CIGAR when the record
    // omits the sequence
    let seq = fields[9];
    let clipped = cigar.leading_clip + cigar.trailing_clip;
    let query_len = if seq == "*" {
        cigar.query_bases + clipped
    } else {
        (seq.len() + cigar.hard_clip).max(cigar.query_bases + clipped)
    };

    // Clips are stated in aligned orientation; on the reverse strand the
    // leading clip sits at the 3' end of the original read
    let reverse = flag & FLAG_REVERSE != 0;
    let query_start = if reverse {
        cigar.trailing_clip
    } else {
        cigar.leading_clip
    };
    let query_end = query_start + cigar.query_bases;
    let hit_start = pos.saturating_sub(1); // SAM POS is 1-based
    let hit_end = hit_start + cigar.hit_bases;
    let hit_len = hit_lengths.get(&hit_name).copied().unwrap_or(hit_end);

    let mut fragment = AlignmentFragment {
        query_name,
        hit_name,
        query_len,
        hit_len,
        query_start,
        query_end,
        hit_start,
        hit_end,
        strand: if reverse {
            Strand::Reverse
        } else {
            Strand::Forward
        },
        score: 0,
        ops: cigar.ops,
    };
    fragment.score = match format {
        AlignerFormat::Bwa => {
            find_as_tag(&fields).unwrap_or(fragment.aligned_query_bases() as i64)
        }
        // BLASR alignment scores are lower-is-better
        AlignerFormat::Blasr => find_as_tag(&fields)
            .map(|s| -s)
            .unwrap_or(fragment.aligned_query_bases() as i64),
        _ => fragment.aligned_query_bases() as i64,
    };

    Ok(Some(fragment))
}

/// Parse `@SQ` header lines into reference name -> length
fn parse_sq_line(line: &str, hit_lengths: &mut FxHashMap<String, usize>) {
    let mut name = None;
    let mut length = None;
    for field in line.split('\t').skip(1) {
        if let Some(sn) = field.strip_prefix("SN:") {
            name = Some(sn.to_string());
        } else if let Some(ln) = field.strip_prefix("LN:") {
            length = ln.parse::<usize>().ok();
        }
    }
    if let (Some(name), Some(length)) = (name, length) {
        hit_lengths.insert(name, length);
    }
}

pub fn parse_sam<R: BufRead>(
    reader: R,
    format: AlignerFormat,
) -> Result<ParsedAlignments, ParseErr> {
    let mut parsed = ParsedAlignments::default();
    let mut hit_lengths: FxHashMap<String, usize> = FxHashMap::default();
    let mut unaligned_seen: FxHashSet<String> = FxHashSet::default();
    let mut line_number = 0u64;

    for line_result in reader.lines() {
        let line = line_result.map_err(ParseErr::IoError)?;
        line_number += 1;
        if line.is_empty() {
            continue;
        }
        if let Some(header) = line.strip_prefix('@') {
            if header.starts_with("SQ") {
                parse_sq_line(&line, &mut hit_lengths);
            }
            continue;
        }

        let mut record_unaligned = |parsed: &mut ParsedAlignments| {
            let name = line.split('\t').next().unwrap_or("").to_string();
            if !name.is_empty() && unaligned_seen.insert(name.clone()) {
                parsed.unaligned.push(name);
            }
        };

        match parse_sam_line(&line, format, &hit_lengths) {
            Ok(Some(fragment)) => {
                if fragment.is_valid() {
                    parsed
                        .fragments
                        .entry(fragment.query_name.clone())
                        .or_default()
                        .push(fragment);
                } else {
                    warn!(
                        "Skipping SAM record at line {}: coordinates of '{}' out of range",
                        line_number, fragment.query_name
                    );
                    record_unaligned(&mut parsed);
                }
            }
            Ok(None) => record_unaligned(&mut parsed),
            // A skipped record still names its read; keep it in the side
            // table unless another record of the read parses
            Err(e) => {
                warn!("Skipping SAM record at line {}: {}", line_number, e);
                record_unaligned(&mut parsed);
            }
        }
    }

    // A read is only unaligned if no record of it produced a fragment
    parsed
        .unaligned
        .retain(|name| !parsed.fragments.contains_key(name));

    Ok(parsed)
}

/// Parse a SAM file. Open failures are fatal for this file; malformed
/// records inside it are skipped with a warning.
pub fn parse_sam_file(path: &Path, format: AlignerFormat) -> std::io::Result<ParsedAlignments> {
    let file = File::open(path).map_err(|e| {
        IoError::new(
            e.kind(),
            format!("Failed to open SAM file '{}': {}", path.display(), e),
        )
    })?;
    let reader = BufReader::new(file);
    parse_sam(reader, format).map_err(|e| {
        IoError::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to parse SAM from '{}': {}", path.display(), e),
        )
    })
}
