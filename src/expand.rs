//! Flank expansion of ranked intervals, clipped to scaffold bounds.

use anyhow::{anyhow, Result};

use crate::genome::ScaffoldLengths;
use crate::hits::{GenomicInterval, Strand};

/// A buffered interval ready for extraction. Invariant:
/// `start <= stop <= scaffold_length` and `start` never underflows zero.
#[derive(Debug, Clone)]
pub struct ExpandedInterval {
    pub scaffold: String,
    pub start: u64,
    pub stop: u64,
    pub strand: Strand,
    pub family: String,
}

impl ExpandedInterval {
    /// Region label in bedtools `-s` style, e.g. `scaf_1:3000-6000(-)`.
    pub fn label(&self) -> String {
        format!("{}:{}-{}({})", self.scaffold, self.start, self.stop, self.strand)
    }
}

/// Expand an interval by asymmetric flanks, clipping the lower bound at zero
/// and the upper bound at the scaffold length. The strand passes through
/// untouched. A scaffold missing from the length table is an error, never an
/// implicit zero length.
pub fn expand(
    interval: &GenomicInterval,
    left_buffer: u64,
    right_buffer: u64,
    lengths: &ScaffoldLengths,
) -> Result<ExpandedInterval> {
    let scaffold_length = lengths.get(&interval.scaffold).ok_or_else(|| {
        anyhow!(
            "scaffold {} (hit for family {}) is not present in the genome length table",
            interval.scaffold,
            interval.family
        )
    })?;

    Ok(ExpandedInterval {
        scaffold: interval.scaffold.clone(),
        start: interval.start.saturating_sub(left_buffer),
        stop: interval.stop.saturating_add(right_buffer).min(scaffold_length),
        strand: interval.strand,
        family: interval.family.clone(),
    })
}
