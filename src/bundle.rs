//! Per-family aggregation of extracted regions behind the reference consensus.

use anyhow::{Context, Result};
use noodles::fasta::{
    self as fasta,
    record::{Definition, Sequence},
};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::expand::ExpandedInterval;
use crate::library::ConsensusRecord;

/// All sequences for one family, consensus first. Downstream alignment
/// viewers treat the first record as the anchor, so the ordering is part of
/// the contract, not cosmetics.
#[derive(Debug, Clone)]
pub struct FamilyBundle {
    pub family: String,
    /// (header, sequence) pairs; index 0 is always `CONSENSUS-<family>`.
    pub records: Vec<(String, Vec<u8>)>,
}

impl FamilyBundle {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serialize as FASTA.
    pub fn write_fasta<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        let mut writer = fasta::Writer::new(BufWriter::new(file));

        for (name, sequence) in &self.records {
            let record = fasta::Record::new(
                Definition::new(name.as_str(), None),
                Sequence::from(sequence.clone()),
            );
            writer
                .write_record(&record)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }

        Ok(())
    }
}

/// Build a family bundle: the reference consensus followed by the extracted
/// regions in ranked order. A family with no hits yields a consensus-only
/// bundle, which is a valid outcome.
pub fn aggregate(
    consensus: &ConsensusRecord,
    regions: &[(ExpandedInterval, Vec<u8>)],
) -> FamilyBundle {
    let mut records = Vec::with_capacity(regions.len() + 1);
    records.push((
        format!("CONSENSUS-{}", consensus.family),
        consensus.sequence.clone(),
    ));
    for (interval, sequence) in regions {
        records.push((interval.label(), sequence.clone()));
    }

    FamilyBundle {
        family: consensus.family.clone(),
        records,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hits::Strand;
    use pretty_assertions::assert_eq;

    fn consensus() -> ConsensusRecord {
        ConsensusRecord {
            family: "TE1".to_string(),
            sequence: b"ACGTACGT".to_vec(),
        }
    }

    fn region(start: u64, strand: Strand) -> (ExpandedInterval, Vec<u8>) {
        (
            ExpandedInterval {
                scaffold: "scaf_1".to_string(),
                start,
                stop: start + 4,
                strand,
                family: "TE1".to_string(),
            },
            b"GGCC".to_vec(),
        )
    }

    #[test]
    fn consensus_comes_first_then_ranked_regions() {
        let regions = vec![region(100, Strand::Forward), region(50, Strand::Reverse)];
        let bundle = aggregate(&consensus(), &regions);

        assert_eq!(bundle.len(), 3);
        assert_eq!(bundle.records[0].0, "CONSENSUS-TE1");
        assert_eq!(bundle.records[1].0, "scaf_1:100-104(+)");
        assert_eq!(bundle.records[2].0, "scaf_1:50-54(-)");
    }

    #[test]
    fn zero_hit_family_is_consensus_only() {
        let bundle = aggregate(&consensus(), &[]);
        assert_eq!(bundle.len(), 1);
        assert_eq!(bundle.records[0].0, "CONSENSUS-TE1");
        assert_eq!(bundle.records[0].1, b"ACGTACGT".to_vec());
    }

    #[test]
    fn writes_readable_fasta() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("TE1.fa");

        let bundle = aggregate(&consensus(), &[region(0, Strand::Forward)]);
        bundle.write_fasta(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(">CONSENSUS-TE1\n"));
        assert!(text.contains(">scaf_1:0-4(+)\n"));
        assert!(text.contains("GGCC"));
    }
}
