use crate::options::ReadFormat;
use rustc_hash::FxHashMap;
use std::io;
use std::path::Path;

/// Strand orientation for alignments
#[derive(Default, PartialEq, Clone, Copy, Debug)]
#[repr(u8)]
pub enum Strand {
    #[default]
    Forward,
    Reverse,
}

impl std::fmt::Display for Strand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strand::Forward => write!(f, "+"),
            Strand::Reverse => write!(f, "-"),
        }
    }
}

/// One edit operation of an alignment, packed as kind (3 high bits) plus
/// length (29 low bits).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditOp {
    val: u32,
}

impl EditOp {
    /// Largest representable run length; longer runs saturate rather than
    /// overflow into the kind bits
    pub const MAX_LEN: usize = (1 << 29) - 1;

    pub fn new(len: usize, op: char) -> Self {
        let val: u32 = match op {
            '=' => 0,
            'X' => 1,
            'I' => 2,
            'D' => 3,
            'M' => 4,
            _ => panic!("Invalid edit operation: {op}"),
        };
        Self {
            val: (val << 29) | (len.min(Self::MAX_LEN) as u32),
        }
    }

    pub fn op(&self) -> char {
        match self.val >> 29 {
            0 => '=',
            1 => 'X',
            2 => 'I',
            3 => 'D',
            4 => 'M',
            _ => panic!("Invalid edit operation: {}", self.val >> 29),
        }
    }

    pub fn len(&self) -> usize {
        (self.val & ((1 << 29) - 1)) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn consumes_query(&self) -> bool {
        matches!(self.op(), '=' | 'X' | 'I' | 'M')
    }

    pub fn consumes_hit(&self) -> bool {
        matches!(self.op(), '=' | 'X' | 'D' | 'M')
    }
}

/// Base tallies folded out of a list of edit operations
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EditTallies {
    pub matched: u64,
    pub mismatched: u64,
    pub inserted: u64,
    pub deleted: u64,
}

impl EditTallies {
    pub fn from_ops(ops: &[EditOp]) -> Self {
        ops.iter().fold(Self::default(), |mut t, op| {
            let len = op.len() as u64;
            match op.op() {
                // 'M' counts as matched; aligners that only report 'M'
                // overestimate matches and that is accepted per format
                '=' | 'M' => t.matched += len,
                'X' => t.mismatched += len,
                'I' => t.inserted += len,
                'D' => t.deleted += len,
                _ => {}
            }
            t
        })
    }

    pub fn total(&self) -> u64 {
        self.matched + self.mismatched + self.inserted + self.deleted
    }
}

/// A normalized aligned fragment, independent of the source format.
///
/// Coordinates are 0-based half-open. The score is on a per-format scale
/// where higher is better; it is only ever compared against scores of other
/// fragments of the same read parsed from the same format.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentFragment {
    pub query_name: String,
    pub hit_name: String,
    pub query_len: usize,
    pub hit_len: usize,
    pub query_start: usize,
    pub query_end: usize,
    pub hit_start: usize,
    pub hit_end: usize,
    pub strand: Strand,
    pub score: i64,
    pub ops: Vec<EditOp>,
}

impl AlignmentFragment {
    /// Coordinate invariants: start <= end <= total length, on both sides
    pub fn is_valid(&self) -> bool {
        self.query_start <= self.query_end
            && self.query_end <= self.query_len
            && self.hit_start <= self.hit_end
            && self.hit_end <= self.hit_len
    }

    pub fn tallies(&self) -> EditTallies {
        EditTallies::from_ops(&self.ops)
    }

    /// Query bases inside aligned columns (excludes clips and deletions)
    pub fn aligned_query_bases(&self) -> u64 {
        self.ops
            .iter()
            .filter(|op| matches!(op.op(), '=' | 'X' | 'M'))
            .map(|op| op.len() as u64)
            .sum()
    }
}

/// Parser output: fragments grouped by read id, plus reads the aligner
/// reported but could not align.
#[derive(Debug, Default)]
pub struct ParsedAlignments {
    pub fragments: FxHashMap<String, Vec<AlignmentFragment>>,
    pub unaligned: Vec<String>,
}

impl ParsedAlignments {
    pub fn fragment_count(&self) -> usize {
        self.fragments.values().map(|v| v.len()).sum()
    }
}

/// Aligner output format types. Selected once at startup and held for the
/// whole run; an unknown name is rejected before any processing starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlignerFormat {
    Last,
    Bwa,
    Blasr,
    MarginAlign,
}

impl AlignerFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "last" => Some(AlignerFormat::Last),
            "bwa" => Some(AlignerFormat::Bwa),
            "blasr" => Some(AlignerFormat::Blasr),
            "marginalign" => Some(AlignerFormat::MarginAlign),
            _ => None,
        }
    }

    /// Extension of alignment files written by this aligner
    pub fn file_extension(&self) -> &'static str {
        match self {
            AlignerFormat::Last => ".maf",
            AlignerFormat::Bwa | AlignerFormat::Blasr | AlignerFormat::MarginAlign => ".sam",
        }
    }

    /// Read format this aligner was fed with
    pub fn read_format(&self) -> ReadFormat {
        match self {
            AlignerFormat::Last | AlignerFormat::Blasr => ReadFormat::Fasta,
            AlignerFormat::Bwa | AlignerFormat::MarginAlign => ReadFormat::Fastq,
        }
    }

    /// Parse one alignment file into the normalized record set
    pub fn parse_file(&self, path: &Path) -> io::Result<ParsedAlignments> {
        match self {
            AlignerFormat::Last => crate::maf::parse_maf_file(path),
            AlignerFormat::Bwa | AlignerFormat::Blasr | AlignerFormat::MarginAlign => {
                crate::sam::parse_sam_file(path, *self)
            }
        }
    }
}
