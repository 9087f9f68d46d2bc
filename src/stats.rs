//! Per-read-type running statistics
//!
//! One `ReadSetStats` covers one read-type pass and is freshly initialized
//! for the next type, so re-running a pass can never double-count. Lengths
//! are streamed to the per-type lengths file as they arrive; aggregates are
//! written once at the end of the pass.

use crate::merge::MergedAlignmentProfile;
use crate::options::{Provenance, ReadType};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Summary of a read-length distribution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LengthSummary {
    pub n: usize,
    pub total: u64,
    pub min: usize,
    pub max: usize,
    pub mean: f64,
    pub n50: usize,
}

/// Shortest length such that reads at least that long cover half the bases
fn n50(lengths: &[usize]) -> usize {
    if lengths.is_empty() {
        return 0;
    }
    let mut sorted = lengths.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    let total: u64 = sorted.iter().map(|&l| l as u64).sum();
    let mut running = 0u64;
    for &l in &sorted {
        running += l as u64;
        if running * 2 >= total {
            return l;
        }
    }
    0
}

pub struct ReadSetStats {
    read_type: ReadType,
    n_read_files: usize,
    n_pass_files: usize,
    n_fail_files: usize,
    n_reads: usize,
    n_reads_with_alignments: usize,
    n_reads_without_alignments: usize,
    lengths: Vec<usize>,
    total_matched: u64,
    total_mismatched: u64,
    total_inserted: u64,
    total_deleted: u64,
    total_hit_span: u64,
    total_query_span: u64,
    lengths_writer: Option<BufWriter<File>>,
}

impl ReadSetStats {
    pub fn new(read_type: ReadType) -> Self {
        ReadSetStats {
            read_type,
            n_read_files: 0,
            n_pass_files: 0,
            n_fail_files: 0,
            n_reads: 0,
            n_reads_with_alignments: 0,
            n_reads_without_alignments: 0,
            lengths: Vec::new(),
            total_matched: 0,
            total_mismatched: 0,
            total_inserted: 0,
            total_deleted: 0,
            total_hit_span: 0,
            total_query_span: 0,
            lengths_writer: None,
        }
    }

    pub fn read_type(&self) -> ReadType {
        self.read_type
    }

    pub fn open_lengths_file(&mut self, path: &Path) -> io::Result<()> {
        let file = File::create(path).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("Failed to create lengths file '{}': {}", path.display(), e),
            )
        })?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "Filename\tId\tLength")?;
        self.lengths_writer = Some(writer);
        Ok(())
    }

    /// Record one read's length and stream its lengths-file row
    pub fn add_length(&mut self, filename: &str, id: &str, length: usize) -> io::Result<()> {
        self.lengths.push(length);
        if let Some(writer) = self.lengths_writer.as_mut() {
            writeln!(writer, "{}\t{}\t{}", filename, id, length)?;
        }
        Ok(())
    }

    pub fn add_read_file(&mut self, provenance: Provenance) {
        self.n_read_files += 1;
        match provenance {
            Provenance::Pass => self.n_pass_files += 1,
            Provenance::Fail => self.n_fail_files += 1,
            Provenance::Combined => {}
        }
    }

    pub fn close_lengths_file(&mut self) -> io::Result<()> {
        if let Some(mut writer) = self.lengths_writer.take() {
            writer.flush()?;
        }
        Ok(())
    }

    pub fn add_read_with_alignment(&mut self) {
        self.n_reads += 1;
        self.n_reads_with_alignments += 1;
    }

    pub fn add_read_without_alignment(&mut self) {
        self.n_reads += 1;
        self.n_reads_without_alignments += 1;
    }

    pub fn add_merged_profile(&mut self, profile: &MergedAlignmentProfile) {
        self.total_matched += profile.matched;
        self.total_mismatched += profile.mismatched;
        self.total_inserted += profile.inserted;
        self.total_deleted += profile.deleted;
        self.total_hit_span += profile.hit_span() as u64;
        self.total_query_span += profile.query_span() as u64;
    }

    pub fn n_read_files(&self) -> usize {
        self.n_read_files
    }

    pub fn n_reads(&self) -> usize {
        self.n_reads
    }

    pub fn n_reads_with_alignments(&self) -> usize {
        self.n_reads_with_alignments
    }

    pub fn n_reads_without_alignments(&self) -> usize {
        self.n_reads_without_alignments
    }

    pub fn length_summary(&self) -> LengthSummary {
        let n = self.lengths.len();
        let total: u64 = self.lengths.iter().map(|&l| l as u64).sum();
        LengthSummary {
            n,
            total,
            min: self.lengths.iter().copied().min().unwrap_or(0),
            max: self.lengths.iter().copied().max().unwrap_or(0),
            mean: if n == 0 { 0.0 } else { total as f64 / n as f64 },
            n50: n50(&self.lengths),
        }
    }

    /// Write the per-type aggregate summary
    pub fn write_summary_file(&self, path: &Path) -> io::Result<()> {
        let file = File::create(path).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("Failed to create summary file '{}': {}", path.display(), e),
            )
        })?;
        let mut writer = BufWriter::new(file);
        let lengths = self.length_summary();
        let total_alignment_bases =
            self.total_matched + self.total_mismatched + self.total_inserted + self.total_deleted;
        let mean_identity = if total_alignment_bases == 0 {
            0.0
        } else {
            self.total_matched as f64 / total_alignment_bases as f64
        };

        writeln!(writer, "ReadType\t{}", self.read_type)?;
        writeln!(writer, "nReadFiles\t{}", self.n_read_files)?;
        writeln!(writer, "nPassFiles\t{}", self.n_pass_files)?;
        writeln!(writer, "nFailFiles\t{}", self.n_fail_files)?;
        writeln!(writer, "nReads\t{}", self.n_reads)?;
        writeln!(writer, "nReadsWithAlignments\t{}", self.n_reads_with_alignments)?;
        writeln!(
            writer,
            "nReadsWithoutAlignments\t{}",
            self.n_reads_without_alignments
        )?;
        writeln!(writer, "TotalBases\t{}", lengths.total)?;
        writeln!(writer, "MinLength\t{}", lengths.min)?;
        writeln!(writer, "MaxLength\t{}", lengths.max)?;
        writeln!(writer, "MeanLength\t{:.2}", lengths.mean)?;
        writeln!(writer, "N50\t{}", lengths.n50)?;
        writeln!(writer, "MatchedBases\t{}", self.total_matched)?;
        writeln!(writer, "MismatchedBases\t{}", self.total_mismatched)?;
        writeln!(writer, "InsertedBases\t{}", self.total_inserted)?;
        writeln!(writer, "DeletedBases\t{}", self.total_deleted)?;
        writeln!(writer, "MeanIdentity\t{:.4}", mean_identity)?;
        writeln!(writer, "RefSpanBases\t{}", self.total_hit_span)?;
        writeln!(writer, "QuerySpanBases\t{}", self.total_query_span)?;
        writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(matched: u64, mismatched: u64) -> MergedAlignmentProfile {
        MergedAlignmentProfile {
            query_name: "read".to_string(),
            hit_name: "ref".to_string(),
            query_len: 200,
            hit_len: 10000,
            matched,
            mismatched,
            inserted: 0,
            deleted: 0,
            hit_start: 0,
            hit_end: (matched + mismatched) as usize,
            query_start: 0,
            query_end: (matched + mismatched) as usize,
            fragment_count: 1,
        }
    }

    #[test]
    fn test_n50() {
        assert_eq!(n50(&[]), 0);
        assert_eq!(n50(&[100]), 100);
        // Total 450; descending 200+150 >= 225 at 150
        assert_eq!(n50(&[100, 200, 150]), 150);
    }

    #[test]
    fn test_length_summary() {
        let mut stats = ReadSetStats::new(ReadType::Template);
        for (i, len) in [120usize, 80, 400].iter().enumerate() {
            stats
                .add_length(&format!("read_{}.fasta", i), &format!("read_{}", i), *len)
                .unwrap();
        }
        let summary = stats.length_summary();
        assert_eq!(summary.n, 3);
        assert_eq!(summary.total, 600);
        assert_eq!(summary.min, 80);
        assert_eq!(summary.max, 400);
        assert!((summary.mean - 200.0).abs() < 1e-9);
        assert_eq!(summary.n50, 400);
    }

    #[test]
    fn test_fresh_accumulator_does_not_double_count() {
        let run = || {
            let mut stats = ReadSetStats::new(ReadType::TwoD);
            stats.add_read_file(Provenance::Combined);
            stats.add_length("r.fasta", "r", 500).unwrap();
            stats.add_read_with_alignment();
            stats.add_merged_profile(&profile(400, 100));
            (
                stats.n_reads(),
                stats.n_reads_with_alignments(),
                stats.length_summary(),
            )
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_summary_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.txt");

        let mut stats = ReadSetStats::new(ReadType::Template);
        stats.add_read_file(Provenance::Pass);
        stats.add_length("a.fasta", "a", 300).unwrap();
        stats.add_read_with_alignment();
        stats.add_merged_profile(&profile(270, 30));
        stats.write_summary_file(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("ReadType\tTemplate"));
        assert!(content.contains("nReads\t1"));
        assert!(content.contains("nReadsWithAlignments\t1"));
        assert!(content.contains("MeanIdentity\t0.9000"));
        assert!(content.contains("N50\t300"));
    }
}
