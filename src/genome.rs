//! Genome index handling and strand-aware region extraction.
//!
//! Random access into the assembly goes through the samtools `.fai` index
//! via noodles; the index is created on first use if missing, exactly like
//! the faidx-style tooling this pipeline was built around.

use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;
use noodles::core::{Position, Region};
use noodles::fasta::{self as fasta, fai};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::expand::ExpandedInterval;
use crate::hits::Strand;

/// Scaffold name to total length, read once from the `.fai` and immutable
/// for the rest of the run. Preserves genome order.
#[derive(Debug, Clone, Default)]
pub struct ScaffoldLengths {
    lengths: IndexMap<String, u64>,
}

impl ScaffoldLengths {
    /// Parse the first two columns (name, length) of a `.fai` index.
    pub fn from_fai<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open genome index {}", path.display()))?;

        let mut lengths = IndexMap::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split('\t');
            let name = fields
                .next()
                .ok_or_else(|| anyhow!("empty record at {}:{}", path.display(), idx + 1))?;
            let length: u64 = fields
                .next()
                .ok_or_else(|| anyhow!("missing length at {}:{}", path.display(), idx + 1))?
                .parse()
                .with_context(|| format!("invalid length at {}:{}", path.display(), idx + 1))?;
            lengths.insert(name.to_string(), length);
        }

        if lengths.is_empty() {
            bail!("genome index {} contains no sequences", path.display());
        }

        Ok(ScaffoldLengths { lengths })
    }

    pub fn insert(&mut self, name: &str, length: u64) {
        self.lengths.insert(name.to_string(), length);
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.lengths.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    /// Persist the table as 2-column TSV (scaffold, length).
    pub fn write_table<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(
            File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?,
        );
        for (name, length) in &self.lengths {
            writeln!(writer, "{name}\t{length}")?;
        }
        Ok(())
    }
}

/// Path of the `.fai` companion for a FASTA file (`genome.fa` -> `genome.fa.fai`).
pub fn fai_path(genome: &Path) -> PathBuf {
    let mut name = genome.as_os_str().to_os_string();
    name.push(".fai");
    PathBuf::from(name)
}

/// Index the genome if no `.fai` exists yet, returning the index path.
pub fn ensure_faidx(genome: &Path) -> Result<PathBuf> {
    let index_path = fai_path(genome);
    if !index_path.exists() {
        let index = fasta::index(genome)
            .with_context(|| format!("failed to index genome {}", genome.display()))?;
        let file = File::create(&index_path)
            .with_context(|| format!("failed to create {}", index_path.display()))?;
        let mut writer = fai::Writer::new(file);
        writer.write_index(&index)?;
    }
    Ok(index_path)
}

/// Indexed access into the genome assembly.
pub struct GenomeReader {
    inner: fasta::indexed_reader::IndexedReader<fasta::io::BufReader<File>>,
}

impl GenomeReader {
    /// Open an indexed reader; the `.fai` must already exist (see
    /// [`ensure_faidx`]).
    pub fn open(genome: &Path) -> Result<Self> {
        let inner = fasta::indexed_reader::Builder::default()
            .build_from_path(genome)
            .with_context(|| format!("failed to open indexed genome {}", genome.display()))?;
        Ok(GenomeReader { inner })
    }

    /// Extract the subsequence for an expanded interval. Minus-strand
    /// intervals come back reverse-complemented. A query past the true
    /// sequence end means the index and the length table disagree, which is
    /// fatal for the run.
    pub fn extract(&mut self, interval: &ExpandedInterval) -> Result<Vec<u8>> {
        let start = Position::try_from((interval.start + 1) as usize)
            .with_context(|| format!("invalid interval start for {}", interval.label()))?;
        let end = Position::try_from(interval.stop as usize)
            .with_context(|| format!("invalid interval stop for {}", interval.label()))?;

        let region = Region::new(interval.scaffold.as_str(), start..=end);
        let record = self
            .inner
            .query(&region)
            .with_context(|| format!("failed to extract region {}", interval.label()))?;

        let sequence: &[u8] = record.sequence().as_ref();
        Ok(match interval.strand {
            Strand::Forward => sequence.to_vec(),
            Strand::Reverse => revcomp(sequence),
        })
    }
}

/// Reverse complement with IUPAC ambiguity codes; anything unrecognized
/// becomes `N`.
pub fn revcomp(sequence: &[u8]) -> Vec<u8> {
    sequence.iter().rev().map(|&base| complement(base)).collect()
}

fn complement(base: u8) -> u8 {
    match base {
        b'A' => b'T',
        b'a' => b't',
        b'C' => b'G',
        b'c' => b'g',
        b'G' => b'C',
        b'g' => b'c',
        b'T' => b'A',
        b't' => b'a',
        b'U' => b'A',
        b'u' => b'a',
        b'R' => b'Y',
        b'r' => b'y',
        b'Y' => b'R',
        b'y' => b'r',
        b'S' => b'S',
        b's' => b's',
        b'W' => b'W',
        b'w' => b'w',
        b'K' => b'M',
        b'k' => b'm',
        b'M' => b'K',
        b'm' => b'k',
        b'B' => b'V',
        b'b' => b'v',
        b'V' => b'B',
        b'v' => b'b',
        b'D' => b'H',
        b'd' => b'h',
        b'H' => b'D',
        b'h' => b'd',
        b'N' => b'N',
        b'n' => b'n',
        _ => b'N',
    }
}
