//! Per-read-type orchestration
//!
//! Walks the read and alignment trees for one read type, runs indexing over
//! every read file and parse/select/merge over every alignment file, and
//! feeds the per-type and per-reference accumulators. Directory-listing
//! order is treated as arbitrary; within one read the score-sorted fragment
//! order of the selector is strict.

use crate::merge::AlignmentMerger;
use crate::options::{Options, Provenance, ReadFormat, ReadType};
use crate::references::References;
use crate::selector;
use crate::seqindex::{self, SequenceFileIndex};
use crate::stats::ReadSetStats;
use crate::tables::{AlignmentsTableFile, UNALIGNED_HEADER};
use log::{debug, info, warn};
use rand::Rng;
use std::io;
use std::path::Path;

pub struct ReadSet<'a> {
    options: &'a Options,
    references: &'a mut References,
    pub stats: ReadSetStats,
}

impl<'a> ReadSet<'a> {
    pub fn new(read_type: ReadType, options: &'a Options, references: &'a mut References) -> Self {
        ReadSet {
            options,
            references,
            stats: ReadSetStats::new(read_type),
        }
    }

    fn read_type(&self) -> ReadType {
        self.stats.read_type()
    }

    /// Index one read file and record its lengths. Returns false when the
    /// file was skipped as unreadable/malformed; a placeholder read id
    /// aborts the run.
    fn read_query_file(&mut self, path: &Path, provenance: Provenance) -> io::Result<bool> {
        let index = match self.options.read_format {
            ReadFormat::Fasta => SequenceFileIndex::index_fasta(path),
            ReadFormat::Fastq => SequenceFileIndex::index_fastq(path),
        };
        let index = match index {
            Ok(index) => index,
            Err(e) if seqindex::is_placeholder_error(&e) => return Err(e),
            Err(e) => {
                warn!("Skipping read file '{}': {}", path.display(), e);
                return Ok(false);
            }
        };

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if index.record_count() > 1 {
            warn!(
                "File '{}' has more than 1 read ({})",
                path.display(),
                index.record_count()
            );
        }

        for record in index.records() {
            self.stats.add_length(filename, &record.id, record.length)?;
        }
        self.stats.add_read_file(provenance);
        Ok(true)
    }

    /// Gather length statistics from every read file of this type.
    /// Returns the number of read files indexed.
    pub fn process_reads(&mut self) -> io::Result<usize> {
        let read_type = self.read_type();
        let lengths_path = self
            .options
            .output_dir
            .join(format!("{}_lengths.txt", read_type.dir_name()));
        self.stats.open_lengths_file(&lengths_path)?;

        let mut n_files = 0usize;
        'dirs: for (base, provenance) in Options::provenance_dirs(&self.options.read_dir) {
            let input_dir = base.join(read_type.dir_name());
            let entries = match std::fs::read_dir(&input_dir) {
                Ok(entries) => entries,
                Err(_) => {
                    warn!("Directory '{}' doesn't exist", input_dir.display());
                    continue;
                }
            };
            info!("Gathering stats from '{}'", input_dir.display());

            for entry in entries {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!(
                            "Skipping unreadable entry in '{}': {}",
                            input_dir.display(),
                            e
                        );
                        continue;
                    }
                };
                let path = entry.path();
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if !path.is_file() || !self.options.read_format.matches(&name) {
                    continue;
                }

                if self.read_query_file(&path, provenance)? {
                    n_files += 1;
                    if n_files % 100 == 0 {
                        info!("Indexed {} read files", n_files);
                    }
                    if self.options.max_reads > 0 && n_files >= self.options.max_reads {
                        break 'dirs;
                    }
                }
            }
        }

        self.stats.close_lengths_file()?;
        Ok(n_files)
    }

    /// Parse every alignment file of this type, select and merge each
    /// read's fragments, and accumulate the outcomes. Returns the number of
    /// reads with at least one alignment.
    pub fn process_alignments<R: Rng>(&mut self, rng: &mut R) -> io::Result<usize> {
        let read_type = self.read_type();
        let nonaligned_path = self
            .options
            .output_dir
            .join("unaligned")
            .join(format!("{}_nonaligned.txt", read_type.dir_name()));
        let mut nonaligned = AlignmentsTableFile::new(&nonaligned_path, UNALIGNED_HEADER)?;

        let mut n_files = 0usize;
        'dirs: for (base, _provenance) in Options::provenance_dirs(&self.options.align_dir) {
            let input_dir = base.join(read_type.dir_name());
            let entries = match std::fs::read_dir(&input_dir) {
                Ok(entries) => entries,
                Err(_) => {
                    warn!("Directory '{}' doesn't exist", input_dir.display());
                    continue;
                }
            };
            info!("Parsing alignments from '{}'", input_dir.display());

            for entry in entries {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!(
                            "Skipping unreadable entry in '{}': {}",
                            input_dir.display(),
                            e
                        );
                        continue;
                    }
                };
                let path = entry.path();
                let name = entry.file_name();
                let name = name.to_string_lossy().to_string();
                if !path.is_file() || !name.ends_with(self.options.format.file_extension()) {
                    continue;
                }

                let parsed = match self.options.format.parse_file(&path) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        warn!("Skipping alignment file '{}': {}", path.display(), e);
                        continue;
                    }
                };
                n_files += 1;
                debug!(
                    "File '{}': {} fragments, {} unaligned reads",
                    name,
                    parsed.fragment_count(),
                    parsed.unaligned.len()
                );

                if parsed.fragments.is_empty() && parsed.unaligned.is_empty() {
                    self.stats.add_read_without_alignment();
                    nonaligned.write_no_alignment(&name, "-", "no alignments found")?;
                }
                for read_id in &parsed.unaligned {
                    self.stats.add_read_without_alignment();
                    nonaligned.write_no_alignment(&name, read_id, "read unaligned")?;
                }

                // Stable read order so a fixed seed reproduces selections
                let mut reads: Vec<_> = parsed.fragments.into_iter().collect();
                reads.sort_by(|a, b| a.0.cmp(&b.0));

                for (read_id, mut fragments) in reads {
                    selector::sort_by_score(&mut fragments);
                    let top = selector::pick_top_alignment(&fragments, rng);
                    debug!(
                        "Read '{}': anchor {} of {} fragments, score {} against '{}'",
                        read_id,
                        top,
                        fragments.len(),
                        fragments[top].score,
                        fragments[top].hit_name
                    );

                    let mut merger = AlignmentMerger::new(&fragments[top]);
                    for fragment in &fragments[top + 1..] {
                        merger.add_fragment(fragment);
                    }
                    let profile = merger.finish();

                    self.stats.add_read_with_alignment();
                    self.stats.add_merged_profile(&profile);
                    if !self
                        .references
                        .record_merged_alignment(read_type, &name, &profile)?
                    {
                        warn!(
                            "Reference '{}' for read '{}' not found in the reference set",
                            profile.hit_name, read_id
                        );
                    }
                }

                if n_files % 100 == 0 {
                    info!("Parsed {} alignment files", n_files);
                }
                if self.options.max_reads > 0 && n_files >= self.options.max_reads {
                    break 'dirs;
                }
            }
        }

        nonaligned.close()?;
        let summary_path = self
            .options
            .output_dir
            .join(format!("{}_alignment_summary.txt", read_type.dir_name()));
        self.stats.write_summary_file(&summary_path)?;

        Ok(self.stats.n_reads_with_alignments())
    }
}
