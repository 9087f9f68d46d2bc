use clap::Parser;
use log::{info, warn};
use nanoqc::alignment_record::AlignerFormat;
use nanoqc::options::{Options, ReadFormat, ReadType};
use nanoqc::read_set::ReadSet;
use nanoqc::references::References;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io;
use std::path::PathBuf;

/// Fewer aligned reads than this is reported as a low-confidence warning
const MIN_CONFIDENT_ALIGNMENTS: usize = 1000;

/// Command-line tool for per-read alignment QC statistics.
#[derive(Parser, Debug)]
#[command(author, version, about, disable_help_subcommand = true)]
enum Args {
    /// Analyse read lengths and alignments for each read type
    Analyse {
        /// Reference FASTA file
        #[clap(short = 'r', long, value_parser)]
        reference: PathBuf,

        /// Directory of raw read files, optionally split into pass/fail
        /// subdirectories per read type
        #[clap(long, value_parser)]
        reads: PathBuf,

        /// Directory of aligner output files, same layout as the read directory
        #[clap(long, value_parser)]
        alignments: PathBuf,

        /// Output directory for the analysis tables
        #[clap(short = 'o', long, value_parser)]
        output: PathBuf,

        /// Aligner that produced the alignment files: last, bwa, blasr or marginalign
        #[clap(short = 'a', long, value_parser, default_value = "last")]
        aligner: String,

        /// Read types to process (comma-separated: template, complement, 2d)
        #[clap(short = 't', long, value_parser, default_value = "template,complement,2d")]
        types: String,

        /// Treat read files as FASTQ regardless of the aligner default
        #[clap(long, action)]
        fastq: bool,

        /// Treat read files as FASTA regardless of the aligner default
        #[clap(long, action)]
        fasta: bool,

        /// Maximum read files to process per directory (0 = no limit)
        #[clap(long, value_parser, default_value_t = 0)]
        max_reads: usize,

        /// Seed for the top-alignment tie-break; drawn from entropy when omitted
        #[clap(long, value_parser)]
        seed: Option<u64>,

        /// Verbosity level (0 = error, 1 = info, 2 = debug)
        #[clap(short, long, default_value = "0")]
        verbose: u8,
    },
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    match args {
        Args::Analyse {
            reference,
            reads,
            alignments,
            output,
            aligner,
            types,
            fastq,
            fasta,
            max_reads,
            seed,
            verbose,
        } => {
            env_logger::Builder::new()
                .filter_level(match verbose {
                    0 => log::LevelFilter::Error,
                    1 => log::LevelFilter::Info,
                    _ => log::LevelFilter::Debug,
                })
                .init();

            let format = AlignerFormat::from_name(&aligner).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("Aligner unknown: '{}'", aligner),
                )
            })?;
            let read_format = match (fasta, fastq) {
                (true, true) => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "--fasta and --fastq are mutually exclusive",
                    ))
                }
                (true, false) => ReadFormat::Fasta,
                (false, true) => ReadFormat::Fastq,
                (false, false) => format.read_format(),
            };
            let read_types = parse_read_types(&types)?;

            let options = Options {
                reference_file: reference,
                read_dir: reads,
                align_dir: alignments,
                output_dir: output,
                format,
                read_format,
                read_types,
                max_reads,
            };
            analyse(&options, seed)
        }
    }
}

fn parse_read_types(types: &str) -> io::Result<Vec<ReadType>> {
    types
        .split(',')
        .map(|name| {
            ReadType::from_name(name.trim()).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("Unknown read type: '{}'", name),
                )
            })
        })
        .collect()
}

fn analyse(options: &Options, seed: Option<u64>) -> io::Result<()> {
    std::fs::create_dir_all(&options.output_dir)?;

    info!("Finding references");
    let mut references = References::load(&options.reference_file, &options.output_dir)?;
    info!("Loaded {} references", references.len());

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    for &read_type in &options.read_types {
        info!("Processing {} reads", read_type);
        let mut read_set = ReadSet::new(read_type, options, &mut references);

        let n_reads = read_set.process_reads()?;
        if n_reads < 1 {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Unable to find any {} reads to process", read_type),
            ));
        }

        let n_aligned = read_set.process_alignments(&mut rng)?;
        if n_aligned < 1 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unable to find any {} alignments to process", read_type),
            ));
        } else if n_aligned < MIN_CONFIDENT_ALIGNMENTS {
            warn!("Few alignments ({}) found to process", n_aligned);
        }
    }

    info!("Writing reference analysis files");
    for &read_type in &options.read_types {
        references.write_reference_stat_files(read_type)?;
        references.write_reference_summary(read_type)?;
    }
    references.close_alignment_tables()?;

    info!("Done");
    Ok(())
}
