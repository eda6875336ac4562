use anyhow::{Context, Result};
use clap::Parser;
use env_logger::{Env, Target};
use log::{error, info};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;

use extralign::pipeline::{self, PipelineConfig};

/// extralign - extract, align, and re-consense top BLAST hits per TE family
///
/// Takes a genome assembly, a tabular BLAST report of a putative TE library
/// queried against it (outfmt 6, as produced when screening RepeatModeler
/// output), and the TE library itself. For each family it extracts the
/// top-scoring hits with flanking sequence, bundles them behind the input
/// consensus, and optionally aligns the bundle (muscle) and derives a
/// trimmed (trimal) majority-rule consensus (EMBOSS cons) for inspection.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Genome assembly in FASTA format (a .fai index is created if missing)
    #[clap(short = 'g', long = "genome")]
    genome: PathBuf,

    /// BLAST output in tabular format (outfmt 6), optionally gzipped
    #[clap(short = 'b', long = "hits")]
    hits: PathBuf,

    /// TE library of putative consensus sequences, FASTA format
    #[clap(short = 'l', long = "library")]
    library: PathBuf,

    /// Left flank size in bp extracted alongside each hit
    #[clap(long = "left-buffer", default_value = "1000")]
    left_buffer: i64,

    /// Right flank size in bp extracted alongside each hit
    #[clap(long = "right-buffer", default_value = "1000")]
    right_buffer: i64,

    /// Number of top hits to extract per family
    #[clap(short = 'n', long = "hit-number", default_value = "50")]
    hit_number: usize,

    /// Align each family bundle with muscle (y/n)
    #[clap(short = 'a', long = "align", default_value = "y", value_parser = parse_yes_no)]
    align: bool,

    /// Trim low-aligning regions with trimal before the consensus (y/n)
    #[clap(long = "trim", default_value = "y", value_parser = parse_yes_no)]
    trim: bool,

    /// Generate a revised consensus with EMBOSS cons (y/n); requires --align y
    #[clap(short = 'c', long = "consensus", default_value = "y", value_parser = parse_yes_no)]
    consensus: bool,

    /// Output directory for bundles, alignments, and consensus files
    #[clap(short = 'o', long = "outdir", default_value = ".")]
    outdir: PathBuf,

    /// Worker threads for the external-tool stages (1 = fully sequential)
    #[clap(short = 't', long = "threads", default_value = "1")]
    threads: usize,

    /// Log verbosity (error, warn, info, debug, trace)
    #[clap(long = "log-level", default_value = "info")]
    log_level: String,
}

/// Strict y/n parser; anything else is a configuration error, not a default.
fn parse_yes_no(s: &str) -> Result<bool, String> {
    match s.to_lowercase().as_str() {
        "y" | "yes" => Ok(true),
        "n" | "no" => Ok(false),
        other => Err(format!("expected 'y' or 'n', got '{other}'")),
    }
}

/// Tees log output to stderr and the persistent run log.
struct TeeWriter {
    file: File,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

fn init_logging(level: &str, log_path: &std::path::Path) -> Result<()> {
    let file = File::create(log_path)
        .with_context(|| format!("failed to create run log {}", log_path.display()))?;
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .target(Target::Pipe(Box::new(TeeWriter { file })))
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // The run log lives in the output directory, so that has to exist first.
    std::fs::create_dir_all(&args.outdir)
        .with_context(|| format!("failed to create {}", args.outdir.display()))?;
    init_logging(&args.log_level, &args.outdir.join("extralign.log"))?;

    let start = Instant::now();

    info!("extralign started {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
    info!("Genome file: {}", args.genome.display());
    info!("Hit file: {}", args.hits.display());
    info!("TE library: {}", args.library.display());
    info!("Left buffer size: {}", args.left_buffer);
    info!("Right buffer size: {}", args.right_buffer);
    info!("Number of hits evaluated: {}", args.hit_number);
    info!("Muscle alignment: {}", if args.align { "y" } else { "n" });
    info!("Trimal processing: {}", if args.trim { "y" } else { "n" });
    info!("Emboss consensus: {}", if args.consensus { "y" } else { "n" });

    let config = PipelineConfig {
        genome: args.genome,
        hits: args.hits,
        library: args.library,
        left_buffer: args.left_buffer,
        right_buffer: args.right_buffer,
        hit_number: args.hit_number,
        align: args.align,
        trim: args.trim,
        consensus: args.consensus,
        outdir: args.outdir,
        threads: args.threads,
    };

    let status = match pipeline::run(&config) {
        Ok(summary) => {
            info!(
                "Done: {} bundles written ({} families with hits, {} in library)",
                summary.bundles_written,
                summary.families_with_hits,
                summary.families_in_library
            );
            if config.align {
                info!(
                    "Aligned {} families ({} failures)",
                    summary.aligned, summary.align_failures
                );
            }
            if config.consensus {
                info!(
                    "Built {} consensus sequences ({} failures)",
                    summary.consensus_built, summary.consensus_failures
                );
            }
            0
        }
        Err(e) => {
            error!("{e:#}");
            1
        }
    };

    let elapsed = chrono::Duration::from_std(start.elapsed()).unwrap_or_else(|_| chrono::Duration::zero());
    info!(
        "Run time: {:02}:{:02}:{:02}",
        elapsed.num_hours(),
        elapsed.num_minutes() % 60,
        elapsed.num_seconds() % 60
    );

    std::process::exit(status);
}
