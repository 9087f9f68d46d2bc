//! LAST MAF parsing
//!
//! Parses LAST's MAF output into normalized alignment fragments. A block is
//! an `a score=N` line followed by two `s` rows, reference first, query
//! second; the edit operations are derived exactly by comparing the two
//! aligned text rows column by column.

use crate::alignment_record::{AlignmentFragment, EditOp, ParsedAlignments, Strand};
use log::warn;
use std::fs::File;
use std::io::{BufRead, BufReader, Error as IoError};
use std::num::ParseIntError;
use std::path::Path;

#[derive(Debug)]
pub enum ParseErr {
    NotEnoughFields,
    IoError(IoError),
    InvalidField(ParseIntError),
    InvalidStrand,
    MissingScore,
    RowLengthMismatch,
}

impl std::fmt::Display for ParseErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseErr::NotEnoughFields => write!(f, "Not enough fields in MAF s row"),
            ParseErr::IoError(e) => write!(f, "IO error: {}", e),
            ParseErr::InvalidField(e) => write!(f, "Invalid field: {}", e),
            ParseErr::InvalidStrand => write!(f, "Invalid strand"),
            ParseErr::MissingScore => write!(f, "MAF a line without score"),
            ParseErr::RowLengthMismatch => {
                write!(f, "Aligned rows of a MAF block differ in length")
            }
        }
    }
}

impl std::error::Error for ParseErr {}

/// One `s` row of a MAF block
struct MafRow {
    name: String,
    start: usize,
    size: usize,
    strand: Strand,
    src_size: usize,
    text: String,
}

fn parse_s_row(line: &str) -> Result<MafRow, ParseErr> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 7 {
        return Err(ParseErr::NotEnoughFields);
    }
    let strand = match fields[4] {
        "+" => Strand::Forward,
        "-" => Strand::Reverse,
        _ => return Err(ParseErr::InvalidStrand),
    };
    Ok(MafRow {
        name: fields[1].to_string(),
        start: fields[2].parse::<usize>().map_err(ParseErr::InvalidField)?,
        size: fields[3].parse::<usize>().map_err(ParseErr::InvalidField)?,
        strand,
        src_size: fields[5].parse::<usize>().map_err(ParseErr::InvalidField)?,
        text: fields[6].to_string(),
    })
}

fn parse_score(line: &str) -> Result<i64, ParseErr> {
    line.split_whitespace()
        .find_map(|tok| tok.strip_prefix("score="))
        .ok_or(ParseErr::MissingScore)?
        .parse::<i64>()
        .map_err(ParseErr::InvalidField)
}

/// Derive exact edit runs by comparing the aligned reference and query rows
fn rows_to_ops(hit_text: &str, query_text: &str) -> Result<Vec<EditOp>, ParseErr> {
    if hit_text.len() != query_text.len() {
        return Err(ParseErr::RowLengthMismatch);
    }

    let mut ops = Vec::new();
    let mut run_op = ' ';
    let mut run_len = 0usize;
    for (h, q) in hit_text.chars().zip(query_text.chars()) {
        let op = if q == '-' && h == '-' {
            continue;
        } else if q == '-' {
            'D'
        } else if h == '-' {
            'I'
        } else if q.eq_ignore_ascii_case(&h) {
            '='
        } else {
            'X'
        };
        if op == run_op {
            run_len += 1;
        } else {
            if run_len > 0 {
                ops.push(EditOp::new(run_len, run_op));
            }
            run_op = op;
            run_len = 1;
        }
    }
    if run_len > 0 {
        ops.push(EditOp::new(run_len, run_op));
    }
    Ok(ops)
}

/// Start of a MAF interval on the forward strand. `-` rows carry
/// reverse-strand relative coordinates per the MAF format.
fn forward_start(row: &MafRow) -> usize {
    match row.strand {
        Strand::Forward => row.start,
        Strand::Reverse => row.src_size.saturating_sub(row.start + row.size),
    }
}

/// Build a fragment from one complete MAF block (reference row, query row)
fn block_to_fragment(score: i64, hit: &MafRow, query: &MafRow) -> Result<AlignmentFragment, ParseErr> {
    let ops = rows_to_ops(&hit.text, &query.text)?;
    let query_start = forward_start(query);
    let hit_start = forward_start(hit);
    Ok(AlignmentFragment {
        query_name: query.name.clone(),
        hit_name: hit.name.clone(),
        query_len: query.src_size,
        hit_len: hit.src_size,
        query_start,
        query_end: query_start + query.size,
        hit_start,
        hit_end: hit_start + hit.size,
        strand: query.strand,
        score,
        ops,
    })
}

pub fn parse_maf<R: BufRead>(reader: R) -> Result<ParsedAlignments, ParseErr> {
    let mut parsed = ParsedAlignments::default();
    let mut score: Option<i64> = None;
    let mut rows: Vec<MafRow> = Vec::new();
    let mut line_number = 0u64;

    let mut flush = |score: &mut Option<i64>, rows: &mut Vec<MafRow>, line_number: u64| {
        if let Some(s) = score.take() {
            if rows.len() >= 2 {
                match block_to_fragment(s, &rows[0], &rows[1]) {
                    Ok(fragment) if fragment.is_valid() => {
                        parsed
                            .fragments
                            .entry(fragment.query_name.clone())
                            .or_default()
                            .push(fragment);
                    }
                    Ok(fragment) => {
                        warn!(
                            "Skipping MAF block ending at line {}: coordinates of '{}' out of range",
                            line_number, fragment.query_name
                        );
                    }
                    Err(e) => {
                        warn!("Skipping MAF block ending at line {}: {}", line_number, e);
                    }
                }
            } else {
                warn!(
                    "Skipping truncated MAF block ending at line {}",
                    line_number
                );
            }
        }
        rows.clear();
    };

    for line_result in reader.lines() {
        let line = line_result.map_err(ParseErr::IoError)?;
        line_number += 1;
        let line = line.trim_end();

        if line.starts_with('#') || line.is_empty() {
            flush(&mut score, &mut rows, line_number);
        } else if let Some(rest) = line.strip_prefix("a ") {
            flush(&mut score, &mut rows, line_number);
            match parse_score(rest) {
                Ok(s) => score = Some(s),
                Err(e) => {
                    warn!("Skipping MAF block at line {}: {}", line_number, e);
                    score = None;
                }
            }
        } else if line.starts_with("s ") && score.is_some() && rows.len() < 2 {
            match parse_s_row(line) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    warn!("Skipping MAF block at line {}: {}", line_number, e);
                    score = None;
                    rows.clear();
                }
            }
        }
        // 'q', 'p' and 'i' annotation rows are ignored
    }
    flush(&mut score, &mut rows, line_number);

    Ok(parsed)
}

/// Parse a LAST MAF file. Open failures are fatal for this file; malformed
/// blocks inside it are skipped with a warning.
pub fn parse_maf_file(path: &Path) -> std::io::Result<ParsedAlignments> {
    let file = File::open(path).map_err(|e| {
        IoError::new(
            e.kind(),
            format!("Failed to open MAF file '{}': {}", path.display(), e),
        )
    })?;
    let reader = BufReader::new(file);
    parse_maf(reader).map_err(|e| {
        IoError::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to parse MAF from '{}': {}", path.display(), e),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::AlignmentMerger;
    use std::io::Cursor;

    const BLOCK: &str = "\
# LAST version 959
a score=156
s ref_1 27 14 + 4641652 ACGTAC-GTACGTAC
s read_1 2 14 + 20 ACTTACCGT-CGTAC
";

    #[test]
    fn test_parse_maf_block() {
        let parsed = parse_maf(Cursor::new(BLOCK)).unwrap();
        assert_eq!(parsed.fragment_count(), 1);
        let frags = &parsed.fragments["read_1"];
        let frag = &frags[0];

        assert_eq!(frag.hit_name, "ref_1");
        assert_eq!(frag.score, 156);
        assert_eq!(frag.query_start, 2);
        assert_eq!(frag.query_end, 16);
        assert_eq!(frag.hit_start, 27);
        assert_eq!(frag.hit_end, 41);
        assert_eq!(frag.hit_len, 4641652);
        assert_eq!(frag.query_len, 20);
        assert_eq!(frag.strand, Strand::Forward);

        // Columns: 2=, 1X, 3=, 1I, 2=, 1D, 5=
        assert_eq!(
            frag.ops,
            vec![
                EditOp::new(2, '='),
                EditOp::new(1, 'X'),
                EditOp::new(3, '='),
                EditOp::new(1, 'I'),
                EditOp::new(2, '='),
                EditOp::new(1, 'D'),
                EditOp::new(5, '='),
            ]
        );

        let t = frag.tallies();
        assert_eq!(t.matched, 12);
        assert_eq!(t.mismatched, 1);
        assert_eq!(t.inserted, 1);
        assert_eq!(t.deleted, 1);
    }

    #[test]
    fn test_parse_maf_multiple_blocks_one_read() {
        let input = format!("{}\na score=90\ns ref_2 0 4 + 100 ACGT\ns read_1 0 4 + 20 ACGT\n", BLOCK);
        let parsed = parse_maf(Cursor::new(input)).unwrap();
        assert_eq!(parsed.fragments["read_1"].len(), 2);
        assert_eq!(parsed.fragments["read_1"][1].hit_name, "ref_2");
        assert_eq!(parsed.fragments["read_1"][1].score, 90);
    }

    #[test]
    fn test_reverse_strand_coordinates_mapped_to_forward() {
        // Second block: read bases [12, 32) on the reverse strand of a
        // 100-base read, i.e. forward bases [68, 88)
        let input = "\
a score=30
s ref_1 100 30 + 100000 ACGTACGTACGTACGTACGTACGTACGTAC
s read_1 10 30 + 100 ACGTACGTACGTACGTACGTACGTACGTAC

a score=20
s ref_1 300 20 + 100000 ACGTACGTACGTACGTACGT
s read_1 12 20 - 100 ACGTACGTACGTACGTACGT
";
        let parsed = parse_maf(Cursor::new(input)).unwrap();
        let frags = &parsed.fragments["read_1"];
        assert_eq!(frags.len(), 2);
        assert_eq!(frags[1].strand, Strand::Reverse);
        assert_eq!((frags[1].query_start, frags[1].query_end), (68, 88));

        // The reverse fragment covers read bases disjoint from the forward
        // one, so the merger must fold it rather than discard it
        let mut merger = AlignmentMerger::new(&frags[0]);
        assert!(merger.add_fragment(&frags[1]));
        let profile = merger.finish();
        assert_eq!(profile.fragment_count, 2);
        assert_eq!(profile.total_alignment_bases(), 50);
        assert_eq!((profile.query_start, profile.query_end), (10, 88));
    }

    #[test]
    fn test_malformed_block_is_skipped() {
        let input = "a score=10\ns ref_1 z 4 + 100 ACGT\ns read_1 0 4 + 20 ACGT\n\na score=7\ns ref_1 0 4 + 100 ACGT\ns read_2 0 4 + 20 ACGT\n";
        let parsed = parse_maf(Cursor::new(input)).unwrap();
        // First block has a bad start field and is dropped; second survives
        assert_eq!(parsed.fragment_count(), 1);
        assert!(parsed.fragments.contains_key("read_2"));
    }

    #[test]
    fn test_mismatched_row_lengths_skipped() {
        let input = "a score=10\ns ref_1 0 4 + 100 ACGTA\ns read_1 0 4 + 20 ACGT\n";
        let parsed = parse_maf(Cursor::new(input)).unwrap();
        assert_eq!(parsed.fragment_count(), 0);
    }

    #[test]
    fn test_empty_maf_has_no_fragments() {
        let parsed = parse_maf(Cursor::new("# LAST version 959\n")).unwrap();
        assert_eq!(parsed.fragment_count(), 0);
        assert!(parsed.unaligned.is_empty());
    }
}
