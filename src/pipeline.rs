//! Pipeline driver: Indexing -> Scaffolding -> Extracting -> Aligning ->
//! Consensus-Building -> Cleanup.
//!
//! Fatal errors (bad config, unreadable inputs, malformed hits, index
//! inconsistencies) abort the run. Per-family external-tool failures are
//! logged with the family id and skipped, so one pathological family cannot
//! block curation of the rest.

use anyhow::{bail, Context, Result};
use log::{debug, error, info, warn};
use rayon::prelude::*;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use crate::bundle;
use crate::expand;
use crate::genome::{self, GenomeReader, ScaffoldLengths};
use crate::hits;
use crate::library;
use crate::ranking;
use crate::tools::{Aligner, ConsensusBuilder};

/// Immutable run configuration, assembled once from the CLI and threaded
/// through every stage.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub genome: PathBuf,
    pub hits: PathBuf,
    pub library: PathBuf,
    pub left_buffer: i64,
    pub right_buffer: i64,
    pub hit_number: usize,
    pub align: bool,
    pub trim: bool,
    pub consensus: bool,
    pub outdir: PathBuf,
    pub threads: usize,
}

impl PipelineConfig {
    /// Reject contradictory or nonsensical settings before any work starts.
    pub fn validate(&self) -> Result<()> {
        if self.left_buffer < 0 || self.right_buffer < 0 {
            bail!(
                "buffers must be non-negative (got left={}, right={})",
                self.left_buffer,
                self.right_buffer
            );
        }
        if self.consensus && !self.align {
            error!("Input is contradictory: generating a consensus requires alignment");
            bail!("consensus generation requested (-c y) without alignment (-a y)");
        }
        Ok(())
    }
}

/// Counts reported after the terminal state.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunSummary {
    pub families_in_library: usize,
    pub families_with_hits: usize,
    pub bundles_written: usize,
    pub aligned: usize,
    pub align_failures: usize,
    pub consensus_built: usize,
    pub consensus_failures: usize,
}

/// Destroy-and-recreate a directory so reruns are idempotent, never additive.
fn recreate_dir(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to clear {}", path.display()))?;
    }
    fs::create_dir_all(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(())
}

/// Append `first` then `second` into `dest`.
fn concat_files(first: &Path, second: &Path, dest: &Path) -> Result<()> {
    let mut out =
        File::create(dest).with_context(|| format!("failed to create {}", dest.display()))?;
    for part in [first, second] {
        let mut input =
            File::open(part).with_context(|| format!("failed to open {}", part.display()))?;
        io::copy(&mut input, &mut out)?;
    }
    Ok(())
}

/// Trim (optional) and consense one aligned family, landing the concatenated
/// trimmed-alignment + consensus artifact in `final_dir`.
fn build_family_consensus(
    builder: &ConsensusBuilder,
    family: &str,
    aligned: &Path,
    workdir: &Path,
    final_dir: &Path,
) -> Result<()> {
    let source = if builder.trims() {
        let trimmed = workdir.join(format!("{family}_trimal.fa"));
        builder.trim(aligned, &trimmed)?;
        trimmed
    } else {
        aligned.to_path_buf()
    };

    let cons_out = workdir.join(format!("{family}_cons.fa"));
    builder.consensus(&source, &cons_out, &format!("{family}_cons"))?;

    concat_files(&source, &cons_out, &final_dir.join(format!("{family}_cons.fa")))
}

/// Run the whole pipeline. Returns the run summary on reaching the terminal
/// state; any error return means the run produced no trustworthy output.
pub fn run(config: &PipelineConfig) -> Result<RunSummary> {
    config.validate()?;
    let left_buffer = config.left_buffer as u64;
    let right_buffer = config.right_buffer as u64;

    let mut summary = RunSummary::default();

    // Indexing
    info!("Indexing the genome");
    let fai = genome::ensure_faidx(&config.genome)?;
    let lengths = ScaffoldLengths::from_fai(&fai)?;
    debug!("genome has {} scaffolds", lengths.len());

    // Scaffolding: recreate output directories for final artifacts only.
    info!("Creating output directories");
    fs::create_dir_all(&config.outdir)
        .with_context(|| format!("failed to create {}", config.outdir.display()))?;
    lengths.write_table(config.outdir.join("scaffold_lengths.tsv"))?;

    let bundles_dir = config.outdir.join("bundles");
    recreate_dir(&bundles_dir)?;
    let aligned_dir = config.outdir.join("aligned");
    if config.align {
        recreate_dir(&aligned_dir)?;
    }
    let consensus_dir = config.outdir.join("consensus");
    if config.consensus {
        recreate_dir(&consensus_dir)?;
    }

    // Extracting
    let te_library = library::read_library(&config.library)?;
    summary.families_in_library = te_library.len();

    let records = hits::read_hits_file(&config.hits)?;
    let intervals = records.iter().map(hits::normalize).collect();
    let ranked = ranking::rank_hits(intervals, config.hit_number);
    summary.families_with_hits = ranked.len();

    for family in ranked.keys() {
        if !te_library.contains_key(family) {
            bail!(
                "hit table references family {family} which is not in the TE library; \
                 the hit table and library do not match"
            );
        }
    }

    info!(
        "There are {} TE families with hits to process ({} families in the library)",
        ranked.len(),
        te_library.len()
    );

    let mut reader = GenomeReader::open(&config.genome)?;
    let mut bundles: Vec<(String, PathBuf)> = Vec::with_capacity(te_library.len());
    for (family, consensus) in &te_library {
        let family_hits = ranked.get(family).map(Vec::as_slice).unwrap_or(&[]);

        let mut regions = Vec::with_capacity(family_hits.len());
        for interval in family_hits {
            let expanded = expand::expand(interval, left_buffer, right_buffer, &lengths)?;
            let sequence = reader.extract(&expanded)?;
            regions.push((expanded, sequence));
        }

        debug!("extracted {} regions for {family}", regions.len());
        let path = bundles_dir.join(format!("{family}.fa"));
        bundle::aggregate(consensus, &regions).write_fasta(&path)?;
        bundles.push((family.clone(), path));
        summary.bundles_written += 1;
    }

    if !config.align {
        info!("Extraction complete; alignment not requested");
        return Ok(summary);
    }

    // The tool stages are per-family independent, so they share a small pool.
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()
        .context("failed to build worker pool")?;

    // Aligning
    let aligner = Aligner::from_env()?;
    info!("Aligning {} family bundles", bundles.len());
    let aligned: Vec<(String, PathBuf)> = pool.install(|| {
        bundles
            .par_iter()
            .filter_map(|(family, bundle_path)| {
                let out = aligned_dir.join(format!("{family}.fa"));
                match aligner.align(bundle_path, &out) {
                    Ok(()) => {
                        debug!("aligned {family}");
                        Some((family.clone(), out))
                    }
                    Err(e) => {
                        error!("alignment failed for family {family}: {e:#}");
                        None
                    }
                }
            })
            .collect()
    });
    summary.aligned = aligned.len();
    summary.align_failures = bundles.len() - aligned.len();

    if !config.consensus {
        info!(
            "Aligned {} of {} families; consensus not requested",
            aligned.len(),
            bundles.len()
        );
        return Ok(summary);
    }

    // Consensus-Building
    let builder = ConsensusBuilder::from_env(config.trim)?;
    let workdir = tempfile::TempDir::new_in(&config.outdir)
        .context("failed to create intermediate working directory")?;
    info!("Building consensus sequences for {} aligned families", aligned.len());

    let built: usize = pool.install(|| {
        aligned
            .par_iter()
            .map(|(family, aligned_path)| {
                match build_family_consensus(
                    &builder,
                    family,
                    aligned_path,
                    workdir.path(),
                    &consensus_dir,
                ) {
                    Ok(()) => 1,
                    Err(e) => {
                        error!("consensus generation failed for family {family}: {e:#}");
                        0
                    }
                }
            })
            .sum()
    });
    summary.consensus_built = built;
    summary.consensus_failures = aligned.len() - built;

    // Cleanup: final artifacts stay, intermediates go.
    info!("Removing intermediate files");
    if let Err(e) = workdir.close() {
        warn!("failed to remove intermediate working directory: {e}");
    }

    Ok(summary)
}
