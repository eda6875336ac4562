//! TE library ingestion and family-identifier sanitization.

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use noodles::fasta;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// One reference consensus from the input TE library.
#[derive(Debug, Clone)]
pub struct ConsensusRecord {
    pub family: String,
    pub sequence: Vec<u8>,
}

/// Rewrite the characters that would corrupt filenames or downstream tool
/// input: `#` becomes `__` and `/` becomes `___` (RepeatModeler-style
/// `Family#Class/Subclass` headers). This is the single sanitization point;
/// hit grouping, library keys, and artifact names all go through it.
pub fn sanitize_family_id(raw: &str) -> String {
    raw.replace('#', "__").replace('/', "___")
}

/// Read the TE library into an ordered map keyed by sanitized family id.
///
/// Two headers collapsing onto the same sanitized id would silently merge
/// families, so that is rejected outright.
pub fn read_library<P: AsRef<Path>>(path: P) -> Result<IndexMap<String, ConsensusRecord>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("failed to open TE library {}", path.display()))?;
    let mut reader = fasta::Reader::new(BufReader::new(file));

    let mut library = IndexMap::new();
    for result in reader.records() {
        let record =
            result.with_context(|| format!("failed to read TE library {}", path.display()))?;
        let name = std::str::from_utf8(record.name())
            .with_context(|| format!("non-UTF-8 sequence name in {}", path.display()))?;
        let family = sanitize_family_id(name);
        let sequence: &[u8] = record.sequence().as_ref();

        if library
            .insert(
                family.clone(),
                ConsensusRecord {
                    family: family.clone(),
                    sequence: sequence.to_vec(),
                },
            )
            .is_some()
        {
            bail!(
                "duplicate family id {family} in {} after sanitization",
                path.display()
            );
        }
    }

    if library.is_empty() {
        bail!("TE library {} contains no sequences", path.display());
    }

    Ok(library)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn sanitizes_hash_and_slash() {
        assert_eq!(sanitize_family_id("rnd-1_family-1#LINE/L1"), "rnd-1_family-1__LINE___L1");
        assert_eq!(sanitize_family_id("plain"), "plain");
        assert_eq!(sanitize_family_id("a#b#c"), "a__b__c");
    }

    fn write_library(dir: &Path, fasta_text: &str) -> std::path::PathBuf {
        let path = dir.join("library.fa");
        let mut file = File::create(&path).unwrap();
        file.write_all(fasta_text.as_bytes()).unwrap();
        path
    }

    #[test]
    fn reads_records_in_order_with_sanitized_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_library(dir.path(), ">TE2#LTR/Gypsy\nACGTACGT\n>TE1\nTTTT\n");

        let library = read_library(&path).unwrap();
        let families: Vec<&String> = library.keys().collect();
        assert_eq!(families, vec!["TE2__LTR___Gypsy", "TE1"]);
        assert_eq!(library["TE1"].sequence, b"TTTT".to_vec());
    }

    #[test]
    fn colliding_sanitized_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_library(dir.path(), ">TE1#LINE\nACGT\n>TE1__LINE\nTTTT\n");
        assert!(read_library(&path).is_err());
    }

    #[test]
    fn non_utf8_header_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.fa");
        let mut file = File::create(&path).unwrap();
        file.write_all(b">TE\xff1\nACGT\n").unwrap();

        let err = read_library(&path).unwrap_err();
        assert!(format!("{err:#}").contains("non-UTF-8"));
    }

    #[test]
    fn empty_library_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_library(dir.path(), "");
        assert!(read_library(&path).is_err());
    }
}
