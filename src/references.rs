//! Reference set and per-reference accumulation
//!
//! References are loaded from the reference FASTA through the sequence
//! indexer; each reference carries one accumulator per read type, fed as
//! merged profiles are produced, and is written out once per type at the end
//! of the run.

use crate::merge::MergedAlignmentProfile;
use crate::options::ReadType;
use crate::seqindex::SequenceFileIndex;
use crate::tables::{AlignmentsTableFile, MERGED_HEADER};
use rustc_hash::FxHashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Per-reference, per-read-type accumulator
#[derive(Default)]
struct RefTypeStats {
    n_reads: usize,
    matched: u64,
    mismatched: u64,
    inserted: u64,
    deleted: u64,
    total_hit_span: u64,
    total_query_span: u64,
    table: Option<AlignmentsTableFile>,
}

impl RefTypeStats {
    fn total_alignment_bases(&self) -> u64 {
        self.matched + self.mismatched + self.inserted + self.deleted
    }

    fn mean_identity(&self) -> f64 {
        let total = self.total_alignment_bases();
        if total == 0 {
            0.0
        } else {
            self.matched as f64 / total as f64
        }
    }
}

pub struct ReferenceSequence {
    pub name: String,
    pub length: usize,
    stats: [RefTypeStats; 3],
}

/// Reference name flattened to something usable as a file name
fn safe_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub struct References {
    refs: Vec<ReferenceSequence>,
    by_name: FxHashMap<String, usize>,
    output_dir: PathBuf,
}

impl References {
    /// Index the reference FASTA and set up one entry per record
    pub fn load(reference_file: &Path, output_dir: &Path) -> io::Result<Self> {
        let index = SequenceFileIndex::index_fasta(reference_file)?;
        if index.record_count() == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "No references found in '{}'",
                    reference_file.display()
                ),
            ));
        }

        let mut refs = Vec::with_capacity(index.record_count());
        let mut by_name = FxHashMap::default();
        for record in index.records() {
            by_name.insert(record.id.clone(), refs.len());
            refs.push(ReferenceSequence {
                name: record.id.clone(),
                length: record.length,
                stats: Default::default(),
            });
        }

        Ok(References {
            refs,
            by_name,
            output_dir: output_dir.to_path_buf(),
        })
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    fn table_path(&self, ref_name: &str, read_type: ReadType) -> PathBuf {
        let safe = safe_name(ref_name);
        self.output_dir
            .join(&safe)
            .join(format!("{}_{}_alignments.txt", safe, read_type.dir_name()))
    }

    /// Accumulate one merged profile and append it to the reference's
    /// per-type merged-alignments table. Returns false when the profile's
    /// reference is not part of the loaded set.
    pub fn record_merged_alignment(
        &mut self,
        read_type: ReadType,
        source_filename: &str,
        profile: &MergedAlignmentProfile,
    ) -> io::Result<bool> {
        let Some(&idx) = self.by_name.get(&profile.hit_name) else {
            return Ok(false);
        };
        let table_path = self.table_path(&profile.hit_name, read_type);
        let stats = &mut self.refs[idx].stats[read_type.index()];

        stats.n_reads += 1;
        stats.matched += profile.matched;
        stats.mismatched += profile.mismatched;
        stats.inserted += profile.inserted;
        stats.deleted += profile.deleted;
        stats.total_hit_span += profile.hit_span() as u64;
        stats.total_query_span += profile.query_span() as u64;

        if stats.table.is_none() {
            stats.table = Some(AlignmentsTableFile::new(&table_path, MERGED_HEADER)?);
        }
        if let Some(table) = stats.table.as_mut() {
            table.write_merged_alignment(source_filename, profile)?;
        }
        Ok(true)
    }

    /// Write one stats file per reference for the given type
    pub fn write_reference_stat_files(&self, read_type: ReadType) -> io::Result<()> {
        for reference in &self.refs {
            let stats = &reference.stats[read_type.index()];
            let safe = safe_name(&reference.name);
            let dir = self.output_dir.join(&safe);
            fs::create_dir_all(&dir)?;
            let path = dir.join(format!("{}_{}_stats.txt", safe, read_type.dir_name()));

            let file = File::create(&path)?;
            let mut writer = BufWriter::new(file);
            writeln!(writer, "Reference\t{}", reference.name)?;
            writeln!(writer, "Length\t{}", reference.length)?;
            writeln!(writer, "nReadsAligned\t{}", stats.n_reads)?;
            writeln!(writer, "MatchedBases\t{}", stats.matched)?;
            writeln!(writer, "MismatchedBases\t{}", stats.mismatched)?;
            writeln!(writer, "InsertedBases\t{}", stats.inserted)?;
            writeln!(writer, "DeletedBases\t{}", stats.deleted)?;
            writeln!(writer, "MeanIdentity\t{:.4}", stats.mean_identity())?;
            writeln!(writer, "RefSpanBases\t{}", stats.total_hit_span)?;
            writeln!(writer, "QuerySpanBases\t{}", stats.total_query_span)?;
            writeln!(
                writer,
                "MeanCoverage\t{:.4}",
                if reference.length == 0 {
                    0.0
                } else {
                    stats.total_hit_span as f64 / reference.length as f64
                }
            )?;
            writer.flush()?;
        }
        Ok(())
    }

    /// Write the per-type reference summary, one row per reference in
    /// natural name order
    pub fn write_reference_summary(&self, read_type: ReadType) -> io::Result<()> {
        let path = self
            .output_dir
            .join(format!("{}_reference_summary.txt", read_type.dir_name()));
        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);
        writeln!(
            writer,
            "Reference\tLength\tnReadsAligned\tMatchedBases\tMismatchedBases\tInsertedBases\tDeletedBases\tMeanIdentity"
        )?;

        let mut order: Vec<&ReferenceSequence> = self.refs.iter().collect();
        order.sort_by(|a, b| natord::compare(&a.name, &b.name));

        for reference in order {
            let stats = &reference.stats[read_type.index()];
            writeln!(
                writer,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.4}",
                reference.name,
                reference.length,
                stats.n_reads,
                stats.matched,
                stats.mismatched,
                stats.inserted,
                stats.deleted,
                stats.mean_identity()
            )?;
        }
        writer.flush()
    }

    /// Flush every open merged-alignments table
    pub fn close_alignment_tables(&mut self) -> io::Result<()> {
        for reference in &mut self.refs {
            for stats in &mut reference.stats {
                if let Some(table) = stats.table.take() {
                    table.close()?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn reference_fasta(dir: &Path) -> PathBuf {
        let path = dir.join("refs.fasta");
        let mut file = File::create(&path).unwrap();
        writeln!(file, ">chr2\n{}", "ACGT".repeat(25)).unwrap();
        writeln!(file, ">chr10\n{}", "ACGT".repeat(50)).unwrap();
        file.flush().unwrap();
        path
    }

    fn profile(hit: &str) -> MergedAlignmentProfile {
        MergedAlignmentProfile {
            query_name: "read_1".to_string(),
            hit_name: hit.to_string(),
            query_len: 60,
            hit_len: 100,
            matched: 45,
            mismatched: 5,
            inserted: 0,
            deleted: 0,
            hit_start: 10,
            hit_end: 60,
            query_start: 0,
            query_end: 50,
            fragment_count: 1,
        }
    }

    #[test]
    fn test_load_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let fasta = reference_fasta(dir.path());
        let refs = References::load(&fasta, dir.path()).unwrap();
        assert_eq!(refs.len(), 2);
        assert!(refs.contains("chr2"));
        assert!(refs.contains("chr10"));
        assert!(!refs.contains("chrM"));
    }

    #[test]
    fn test_record_and_emit() {
        let dir = tempfile::tempdir().unwrap();
        let fasta = reference_fasta(dir.path());
        let mut refs = References::load(&fasta, dir.path()).unwrap();

        assert!(refs
            .record_merged_alignment(ReadType::Template, "read_1.fasta", &profile("chr2"))
            .unwrap());
        assert!(!refs
            .record_merged_alignment(ReadType::Template, "read_1.fasta", &profile("chrM"))
            .unwrap());
        refs.close_alignment_tables().unwrap();
        refs.write_reference_stat_files(ReadType::Template).unwrap();
        refs.write_reference_summary(ReadType::Template).unwrap();

        let table = std::fs::read_to_string(
            dir.path().join("chr2").join("chr2_Template_alignments.txt"),
        )
        .unwrap();
        assert_eq!(table.lines().count(), 2);

        let stats = std::fs::read_to_string(
            dir.path().join("chr2").join("chr2_Template_stats.txt"),
        )
        .unwrap();
        assert!(stats.contains("nReadsAligned\t1"));
        assert!(stats.contains("MeanIdentity\t0.9000"));

        let summary =
            std::fs::read_to_string(dir.path().join("Template_reference_summary.txt")).unwrap();
        let lines: Vec<&str> = summary.lines().collect();
        // Natural order puts chr2 before chr10
        assert!(lines[1].starts_with("chr2\t100\t1\t45"));
        assert!(lines[2].starts_with("chr10\t200\t0\t0"));
    }
}
