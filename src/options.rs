use std::path::{Path, PathBuf};

/// Basecall category a read belongs to. Each category lives in its own
/// subdirectory of the read and alignment trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadType {
    Template,
    Complement,
    TwoD,
}

impl ReadType {
    pub const ALL: [ReadType; 3] = [ReadType::Template, ReadType::Complement, ReadType::TwoD];

    /// Directory component and output-file prefix for this type
    pub fn dir_name(&self) -> &'static str {
        match self {
            ReadType::Template => "Template",
            ReadType::Complement => "Complement",
            ReadType::TwoD => "2D",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "template" => Some(ReadType::Template),
            "complement" => Some(ReadType::Complement),
            "2d" => Some(ReadType::TwoD),
            _ => None,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            ReadType::Template => 0,
            ReadType::Complement => 1,
            ReadType::TwoD => 2,
        }
    }
}

impl std::fmt::Display for ReadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// Quality classification assigned by the basecaller, reflected in the
/// directory layout when the input uses a pass/fail split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Pass,
    Fail,
    Combined,
}

impl Provenance {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Provenance::Pass => "pass",
            Provenance::Fail => "fail",
            Provenance::Combined => "",
        }
    }
}

/// On-disk format of the raw read files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFormat {
    Fasta,
    Fastq,
}

impl ReadFormat {
    /// Check whether a filename carries a valid extension for this format
    pub fn matches(&self, filename: &str) -> bool {
        match self {
            ReadFormat::Fasta => filename.ends_with(".fasta") || filename.ends_with(".fa"),
            ReadFormat::Fastq => filename.ends_with(".fastq") || filename.ends_with(".fq"),
        }
    }
}

use crate::alignment_record::AlignerFormat;

/// Run configuration for one analysis pass. Populated by the CLI; directory
/// layout validation beyond existence checks happens upstream.
#[derive(Debug, Clone)]
pub struct Options {
    pub reference_file: PathBuf,
    pub read_dir: PathBuf,
    pub align_dir: PathBuf,
    pub output_dir: PathBuf,
    pub format: AlignerFormat,
    pub read_format: ReadFormat,
    /// Read types to process, in order
    pub read_types: Vec<ReadType>,
    /// Maximum read files to process per directory; 0 means unlimited
    pub max_reads: usize,
}

impl Options {
    /// Input directories to walk under `base`, in pass/fail order when the
    /// tree uses a two-way split, otherwise the single combined directory.
    pub fn provenance_dirs(base: &Path) -> Vec<(PathBuf, Provenance)> {
        if base.join("pass").is_dir() {
            let mut dirs = vec![(base.join("pass"), Provenance::Pass)];
            if base.join("fail").is_dir() {
                dirs.push((base.join("fail"), Provenance::Fail));
            }
            dirs
        } else {
            vec![(base.to_path_buf(), Provenance::Combined)]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_format_extensions() {
        assert!(ReadFormat::Fasta.matches("read_ch21_file0.fasta"));
        assert!(ReadFormat::Fasta.matches("read.fa"));
        assert!(!ReadFormat::Fasta.matches("read.fastq"));
        assert!(ReadFormat::Fastq.matches("read.fastq"));
        assert!(ReadFormat::Fastq.matches("read.fq"));
        assert!(!ReadFormat::Fastq.matches("read.fasta"));
    }

    #[test]
    fn test_type_dir_names() {
        assert_eq!(ReadType::Template.dir_name(), "Template");
        assert_eq!(ReadType::Complement.dir_name(), "Complement");
        assert_eq!(ReadType::TwoD.dir_name(), "2D");
    }

    #[test]
    fn test_type_from_name() {
        assert_eq!(ReadType::from_name("template"), Some(ReadType::Template));
        assert_eq!(ReadType::from_name("complement"), Some(ReadType::Complement));
        assert_eq!(ReadType::from_name("2d"), Some(ReadType::TwoD));
        assert_eq!(ReadType::from_name("3d"), None);
    }
}
