use clap::{Parser, ValueEnum};
use log::info;
use std::io;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use svref::commands::classify::{run_classify, ClassifyConfig};
use svref::commands::stats::{print_stats, run_stats};
use svref::dispatch::QueryFilter;
use svref::error::SvError;
use svref::reconcile::MatchStrategy;
use svref::writer::{DEFAULT_FOUND_NAME, DEFAULT_NOT_FOUND_NAME};

/// Common options shared between all commands
#[derive(Parser, Debug)]
struct CommonOpts {
    /// Path to the reference catalog VCF (plain or BGZF-compressed)
    #[clap(short = 'r', long, value_parser)]
    reference: PathBuf,

    /// Verbosity level (0 = error, 1 = info, 2 = debug)
    #[clap(short, long, default_value = "0")]
    verbose: u8,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum MatchBy {
    /// File-local record ordinal
    Id,
    /// (chromosome, start, end); duplicates resolve to the last record's decision
    Coordinates,
}

impl From<MatchBy> for MatchStrategy {
    fn from(value: MatchBy) -> Self {
        match value {
            MatchBy::Id => MatchStrategy::RecordId,
            MatchBy::Coordinates => MatchStrategy::Coordinates,
        }
    }
}

/// Classify structural variants as known or novel against a reference catalog.
#[derive(Parser, Debug)]
#[command(author, version, about, disable_help_subcommand = true)]
enum Args {
    /// Classify every query VCF in a directory
    Classify {
        #[clap(flatten)]
        common: CommonOpts,

        /// Directory containing the query files
        #[clap(short = 'i', long, value_parser)]
        input_dir: PathBuf,

        /// Directory receiving the found / not-found outputs
        #[clap(short = 'o', long, value_parser)]
        output_dir: PathBuf,

        /// Minimum overlap, as a percentage of the longer interval, for a variant to be known
        #[clap(short = 'p', long, value_parser, default_value_t = svref::classify::DEFAULT_OVERLAP_THRESHOLD)]
        threshold: f64,

        /// Maximum number of worker threads
        #[clap(short = 't', long, value_parser, default_value_t = NonZeroUsize::new(svref::dispatch::DEFAULT_MAX_WORKERS).unwrap())]
        max_workers: NonZeroUsize,

        /// Extension of the query files to pick up from the input directory
        #[clap(short = 'e', long, value_parser, default_value = "vcf")]
        extension: String,

        /// How output records are matched back to their classification
        #[clap(long, value_enum, default_value_t = MatchBy::Id)]
        match_by: MatchBy,

        /// Exclude query records with a lower QUAL (or no QUAL)
        #[clap(long, value_parser)]
        min_quality: Option<f64>,

        /// Only classify query records whose FILTER is PASS
        #[clap(long, action)]
        pass_only: bool,

        /// Exclude query records flagged IMPRECISE
        #[clap(long, action)]
        skip_imprecise: bool,

        /// File name of the output with variants found in the reference
        #[clap(long, value_parser, default_value = DEFAULT_FOUND_NAME)]
        found_name: String,

        /// File name of the output with variants not found in the reference
        #[clap(long, value_parser, default_value = DEFAULT_NOT_FOUND_NAME)]
        not_found_name: String,
    },
    /// Print reference catalog statistics
    Stats {
        #[clap(flatten)]
        common: CommonOpts,
    },
}

fn init_logger(verbose: u8) {
    env_logger::Builder::new()
        .filter_level(match verbose {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    match args {
        Args::Classify {
            common,
            input_dir,
            output_dir,
            threshold,
            max_workers,
            extension,
            match_by,
            min_quality,
            pass_only,
            skip_imprecise,
            found_name,
            not_found_name,
        } => {
            init_logger(common.verbose);

            let config = ClassifyConfig {
                threshold,
                max_workers: max_workers.get(),
                extension,
                match_strategy: match_by.into(),
                filter: QueryFilter {
                    min_quality,
                    pass_only,
                    skip_imprecise,
                },
                found_name,
                not_found_name,
                ..ClassifyConfig::new(common.reference, input_dir, output_dir)
            };

            match run_classify(&config) {
                Ok(report) => print!("{}", report),
                Err(e @ SvError::EmptyInput { .. }) => {
                    eprintln!("Nothing to classify: {}", e);
                    info!("Exiting without work");
                }
                Err(e) => return Err(io::Error::other(e)),
            }
        }
        Args::Stats { common } => {
            init_logger(common.verbose);

            let stats = run_stats(&common.reference).map_err(io::Error::other)?;
            print_stats(&stats);
        }
    }

    Ok(())
}
