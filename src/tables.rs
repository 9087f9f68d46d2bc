//! Delimited table outputs keyed by source read filename
//!
//! One writer serves both the per-reference merged-alignment tables and the
//! per-type non-aligned table; all outputs are tab-separated plain text for
//! downstream plotting and reporting.

use crate::merge::MergedAlignmentProfile;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

pub const MERGED_HEADER: &str = "Filename\tQueryId\tRefId\tQueryStart\tQueryEnd\tRefStart\tRefEnd\tMatchedBases\tMismatchedBases\tInsertedBases\tDeletedBases\tFragments\tIdentity";
pub const UNALIGNED_HEADER: &str = "Filename\tQueryId\tReason";

pub struct AlignmentsTableFile {
    writer: BufWriter<File>,
}

impl AlignmentsTableFile {
    /// Create the table file (and its parent directory) and write the header
    pub fn new(path: &Path, header: &str) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("Failed to create table file '{}': {}", path.display(), e),
            )
        })?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", header)?;
        Ok(AlignmentsTableFile { writer })
    }

    /// One row for a read whose fragments merged into a profile
    pub fn write_merged_alignment(
        &mut self,
        filename: &str,
        profile: &MergedAlignmentProfile,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.4}",
            filename,
            profile.query_name,
            profile.hit_name,
            profile.query_start,
            profile.query_end,
            profile.hit_start,
            profile.hit_end,
            profile.matched,
            profile.mismatched,
            profile.inserted,
            profile.deleted,
            profile.fragment_count,
            profile.identity()
        )
    }

    /// One row for a read that produced no alignment
    pub fn write_no_alignment(
        &mut self,
        filename: &str,
        query_id: &str,
        reason: &str,
    ) -> io::Result<()> {
        writeln!(self.writer, "{}\t{}\t{}", filename, query_id, reason)
    }

    pub fn close(mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> MergedAlignmentProfile {
        MergedAlignmentProfile {
            query_name: "read_1".to_string(),
            hit_name: "ref_1".to_string(),
            query_len: 200,
            hit_len: 10000,
            matched: 150,
            mismatched: 30,
            inserted: 10,
            deleted: 10,
            hit_start: 100,
            hit_end: 290,
            query_start: 0,
            query_end: 190,
            fragment_count: 2,
        }
    }

    #[test]
    fn test_table_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("table.txt");
        let mut table = AlignmentsTableFile::new(&path, MERGED_HEADER).unwrap();
        table
            .write_merged_alignment("read_1.fasta", &profile())
            .unwrap();
        table.close().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], MERGED_HEADER);
        assert_eq!(
            lines[1],
            "read_1.fasta\tread_1\tref_1\t0\t190\t100\t290\t150\t30\t10\t10\t2\t0.7500"
        );
    }

    #[test]
    fn test_unaligned_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nonaligned.txt");
        let mut table = AlignmentsTableFile::new(&path, UNALIGNED_HEADER).unwrap();
        table
            .write_no_alignment("read_2.fasta", "read_2", "no alignments found")
            .unwrap();
        table.close().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.ends_with("read_2.fasta\tread_2\tno alignments found\n"));
    }
}
