// lib.rs
pub mod alignment_record;
pub mod maf;
pub mod merge;
pub mod options;
pub mod read_set;
pub mod references;
pub mod sam;
pub mod selector;
pub mod seqindex;
pub mod stats;
pub mod tables;
