//! External tool invocation: muscle (alignment), trimal (alignment
//! trimming), and EMBOSS cons (majority-rule consensus).
//!
//! Resolution order for each binary:
//! 1. An explicit env-var override (`EXTRALIGN_MUSCLE`, `EXTRALIGN_TRIMAL`,
//!    `EXTRALIGN_CONS`)
//! 2. `PATH`
//!
//! All invocations are synchronous; a non-zero exit or an empty output file
//! is reported as an error carrying the tool's captured stderr, and the
//! caller decides whether that is fatal or a per-family skip.

use anyhow::{bail, Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Locate an external binary, preferring an env-var override so users can
/// point at a specific build without touching PATH.
pub fn resolve_tool(name: &str) -> Result<PathBuf> {
    let override_var = format!("EXTRALIGN_{}", name.to_uppercase());
    if let Some(path) = env::var_os(&override_var) {
        let path = PathBuf::from(path);
        if path.is_file() {
            return Ok(path);
        }
        bail!(
            "{override_var} points at {}, which does not exist",
            path.display()
        );
    }

    if let Some(paths) = env::var_os("PATH") {
        for dir in env::split_paths(&paths) {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }

    bail!("could not find `{name}` on PATH (or via {override_var})")
}

/// Run a prepared command, failing with the captured stderr on non-zero exit.
fn run_checked(command: &mut Command, what: &str) -> Result<()> {
    let output = command
        .output()
        .with_context(|| format!("failed to launch {what}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{what} exited with {}: {}", output.status, stderr.trim());
    }

    Ok(())
}

/// A zero-byte artifact means the tool "succeeded" without doing anything
/// (trimal is known to do this); treat it the same as a failed exit.
fn ensure_nonempty(path: &Path, what: &str) -> Result<()> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("{what} produced no output at {}", path.display()))?;
    if metadata.len() == 0 {
        bail!("{what} produced an empty file at {}", path.display());
    }
    Ok(())
}

/// Multiple sequence alignment via muscle.
pub struct Aligner {
    muscle: PathBuf,
}

impl Aligner {
    pub fn new(muscle: PathBuf) -> Self {
        Aligner { muscle }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Aligner::new(resolve_tool("muscle")?))
    }

    /// Align a family bundle into `output`.
    pub fn align(&self, input: &Path, output: &Path) -> Result<()> {
        run_checked(
            Command::new(&self.muscle)
                .arg("-in")
                .arg(input)
                .arg("-out")
                .arg(output),
            "muscle",
        )?;
        ensure_nonempty(output, "muscle")
    }
}

/// Trimming + consensus generation via trimal and EMBOSS cons.
pub struct ConsensusBuilder {
    trimal: Option<PathBuf>,
    cons: PathBuf,
}

impl ConsensusBuilder {
    pub fn new(trimal: Option<PathBuf>, cons: PathBuf) -> Self {
        ConsensusBuilder { trimal, cons }
    }

    /// Resolve the binaries this run needs; trimal only when trimming is on.
    pub fn from_env(trim: bool) -> Result<Self> {
        let trimal = if trim {
            Some(resolve_tool("trimal")?)
        } else {
            None
        };
        Ok(ConsensusBuilder::new(trimal, resolve_tool("cons")?))
    }

    pub fn trims(&self) -> bool {
        self.trimal.is_some()
    }

    /// Remove low-aligning columns from an alignment.
    pub fn trim(&self, input: &Path, output: &Path) -> Result<()> {
        let trimal = self
            .trimal
            .as_ref()
            .context("trimming requested but trimal was not resolved")?;
        run_checked(
            Command::new(trimal)
                .arg("-in")
                .arg(input)
                .arg("-gt")
                .arg("0.6")
                .arg("-cons")
                .arg("60")
                .arg("-fasta")
                .arg("-out")
                .arg(output),
            "trimal",
        )?;
        ensure_nonempty(output, "trimal")
    }

    /// Generate a majority-rule consensus from an alignment.
    pub fn consensus(&self, input: &Path, output: &Path, name: &str) -> Result<()> {
        run_checked(
            Command::new(&self.cons)
                .arg("-sequence")
                .arg(input)
                .arg("-outseq")
                .arg(output)
                .arg("-name")
                .arg(name)
                .arg("-plurality")
                .arg("3")
                .arg("-identity")
                .arg("3"),
            "cons",
        )?;
        ensure_nonempty(output, "cons")
    }
}
