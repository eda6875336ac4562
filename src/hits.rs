//! Tabular BLAST (outfmt 6) hit parsing and coordinate normalization.
//!
//! BLAST reports scaffold coordinates in hit orientation: on minus-strand
//! hits the scaffold start is greater than the scaffold stop. Normalization
//! derives the strand from that ordering once, then stores the interval as
//! an ordered half-open pair so downstream arithmetic never has to care.

use anyhow::{bail, Context, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::library::sanitize_family_id;

/// Orientation of a hit on the target scaffold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn symbol(self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

impl std::fmt::Display for Strand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// One row of 12-column tab-separated BLAST output.
///
/// `scaf_start`/`scaf_stop` are kept exactly as reported and may be in
/// either order; [`normalize`] is the only place that interprets them.
#[derive(Debug, Clone)]
pub struct HitRecord {
    pub query_name: String,
    pub scaffold: String,
    pub query_start: u64,
    pub query_stop: u64,
    pub scaf_start: u64,
    pub scaf_stop: u64,
    pub e_value: f64,
    pub bit_score: f64,
}

/// A strand-annotated, ordered, half-open genomic interval derived from one hit.
#[derive(Debug, Clone)]
pub struct GenomicInterval {
    pub scaffold: String,
    pub start: u64,
    pub stop: u64,
    pub strand: Strand,
    /// Sanitized family identifier (see [`sanitize_family_id`]); this is the
    /// join key against the TE library and all artifact names.
    pub family: String,
    pub e_value: f64,
    pub bit_score: f64,
}

/// Convert a raw hit into an ordered interval.
///
/// Strand is `-` exactly when the raw scaffold stop precedes the raw start.
/// It is derived here, before the coordinates are reordered, and never
/// recomputed afterwards.
pub fn normalize(hit: &HitRecord) -> GenomicInterval {
    let strand = if hit.scaf_stop < hit.scaf_start {
        Strand::Reverse
    } else {
        Strand::Forward
    };
    GenomicInterval {
        scaffold: hit.scaffold.clone(),
        start: hit.scaf_start.min(hit.scaf_stop),
        stop: hit.scaf_start.max(hit.scaf_stop),
        strand,
        family: sanitize_family_id(&hit.query_name),
        e_value: hit.e_value,
        bit_score: hit.bit_score,
    }
}

/// Open a hit table, transparently decompressing `.gz` input.
pub fn open_hits_input<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("failed to open hit table {}", path.display()))?;

    // Detect compression by extension, as for any other tabular input.
    let is_compressed = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext == "gz")
        .unwrap_or(false);

    if is_compressed {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn parse_hit_line(line: &str) -> Result<HitRecord> {
    let fields: Vec<&str> = line.trim_end().split('\t').collect();

    if fields.len() < 12 {
        bail!(
            "hit line has {} fields, expected at least 12 (BLAST outfmt 6)",
            fields.len()
        );
    }

    // Columns 2-5 (identity, length, mismatches, gap opens) are unused.
    Ok(HitRecord {
        query_name: fields[0].to_string(),
        scaffold: fields[1].to_string(),
        query_start: fields[6].parse().context("invalid query start")?,
        query_stop: fields[7].parse().context("invalid query stop")?,
        scaf_start: fields[8].parse().context("invalid scaffold start")?,
        scaf_stop: fields[9].parse().context("invalid scaffold stop")?,
        e_value: fields[10].parse().context("invalid e-value")?,
        bit_score: fields[11].parse().context("invalid bit score")?,
    })
}

/// Read every hit record from a reader. A malformed row fails the whole run:
/// a corrupted coordinate would silently change which region gets extracted.
pub fn read_hits<R: BufRead>(reader: R) -> Result<Vec<HitRecord>> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let record = parse_hit_line(&line)
            .with_context(|| format!("malformed hit record at line {}", idx + 1))?;
        records.push(record);
    }
    Ok(records)
}

/// Read every hit record from a file (auto-detects gzip).
pub fn read_hits_file<P: AsRef<Path>>(path: P) -> Result<Vec<HitRecord>> {
    let input = open_hits_input(&path)?;
    read_hits(input).with_context(|| format!("while reading {}", path.as_ref().display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn hit(scaf_start: u64, scaf_stop: u64) -> HitRecord {
        HitRecord {
            query_name: "TE1#LINE/L1".to_string(),
            scaffold: "scaf_1".to_string(),
            query_start: 1,
            query_stop: 400,
            scaf_start,
            scaf_stop,
            e_value: 1e-50,
            bit_score: 500.0,
        }
    }

    #[test]
    fn forward_hit_keeps_coordinates_and_plus_strand() {
        let iv = normalize(&hit(4000, 5000));
        assert_eq!(iv.start, 4000);
        assert_eq!(iv.stop, 5000);
        assert_eq!(iv.strand, Strand::Forward);
    }

    #[test]
    fn reversed_coordinates_mean_minus_strand() {
        let iv = normalize(&hit(5000, 4000));
        assert_eq!(iv.start, 4000);
        assert_eq!(iv.stop, 5000);
        assert_eq!(iv.strand, Strand::Reverse);
    }

    #[test]
    fn equal_coordinates_are_forward() {
        let iv = normalize(&hit(4000, 4000));
        assert_eq!(iv.strand, Strand::Forward);
        assert_eq!(iv.start, iv.stop);
    }

    #[test]
    fn family_is_sanitized_during_normalization() {
        let iv = normalize(&hit(1, 2));
        assert_eq!(iv.family, "TE1__LINE___L1");
    }

    #[test]
    fn parses_a_full_blast_row() {
        let line = "TE1\tscaf_1\t91.4\t412\t30\t5\t1\t400\t5000\t4600\t2e-150\t541";
        let rec = parse_hit_line(line).unwrap();
        assert_eq!(rec.query_name, "TE1");
        assert_eq!(rec.scaffold, "scaf_1");
        assert_eq!(rec.scaf_start, 5000);
        assert_eq!(rec.scaf_stop, 4600);
        assert_eq!(rec.e_value, 2e-150);
        assert_eq!(rec.bit_score, 541.0);
    }

    #[test]
    fn tolerates_trailing_extra_columns() {
        let line = "TE1\tscaf_1\t91.4\t412\t30\t5\t1\t400\t100\t500\t0.0\t541\textra";
        assert!(parse_hit_line(line).is_ok());
    }

    #[test]
    fn short_row_is_an_error() {
        let line = "TE1\tscaf_1\t91.4\t412";
        assert!(parse_hit_line(line).is_err());
    }

    #[test]
    fn non_numeric_coordinate_is_an_error() {
        let line = "TE1\tscaf_1\t91.4\t412\t30\t5\t1\t400\tNA\t500\t0.0\t541";
        assert!(parse_hit_line(line).is_err());
    }

    #[test]
    fn malformed_row_error_carries_line_number() {
        let data = "TE1\tscaf_1\t91.4\t412\t30\t5\t1\t400\t100\t500\t0.0\t541\nbroken row\n";
        let err = read_hits(data.as_bytes()).unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }

    #[test]
    fn empty_lines_are_skipped() {
        let data = "\nTE1\tscaf_1\t91.4\t412\t30\t5\t1\t400\t100\t500\t0.0\t541\n\n";
        let records = read_hits(data.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
    }
}
