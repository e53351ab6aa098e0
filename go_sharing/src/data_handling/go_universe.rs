use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use tracing::info;

use crate::error::{Result, SharingError};
use crate::models::Dataset;

/// Interned index of a GO term inside a [`GoUniverse`].
pub type TermIdx = u32;

/// Every organism's annotated GO vocabulary, with GO ids interned so that the
/// same term maps to the same index in every organism.
#[derive(Debug, Clone, Default)]
pub struct GoUniverse {
    terms: Vec<String>,
    index: HashMap<String, TermIdx>,
    organisms: BTreeMap<String, Vec<TermIdx>>,
}

impl GoUniverse {
    /// Duplicate ids inside one organism's list are collapsed.
    pub fn from_lists<I, S>(lists: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<S>)>,
        S: AsRef<str>,
    {
        let mut universe = GoUniverse::default();
        for (organism, go_ids) in lists {
            let mut seen = HashSet::new();
            let mut terms = Vec::with_capacity(go_ids.len());
            for go_id in go_ids {
                let idx = universe.intern(go_id.as_ref());
                if seen.insert(idx) {
                    terms.push(idx);
                }
            }
            universe.organisms.insert(organism, terms);
        }
        universe
    }

    fn intern(&mut self, go_id: &str) -> TermIdx {
        if let Some(&idx) = self.index.get(go_id) {
            return idx;
        }
        let idx = self.terms.len() as TermIdx;
        self.terms.push(go_id.to_string());
        self.index.insert(go_id.to_string(), idx);
        idx
    }

    pub fn terms_of(&self, organism: &str) -> Option<&[TermIdx]> {
        self.organisms.get(organism).map(Vec::as_slice)
    }

    pub fn size_of(&self, organism: &str) -> Option<usize> {
        self.organisms.get(organism).map(Vec::len)
    }

    /// Number of distinct GO terms across all organisms.
    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    pub fn organism_codes(&self) -> impl Iterator<Item = &str> {
        self.organisms.keys().map(String::as_str)
    }
}

/// JSON object mapping organism code to its list of annotated GO ids.
pub struct GoUniverseFile {
    pub path: PathBuf,
}

impl Dataset for GoUniverseFile {
    type Output = GoUniverse;

    fn load(&self) -> Result<GoUniverse> {
        info!("Reading GO-term universe from {}", self.path.display());
        let file = File::open(&self.path).map_err(|e| SharingError::io(&self.path, e))?;
        let lists: BTreeMap<String, Vec<String>> = serde_json::from_reader(BufReader::new(file))?;
        let universe = GoUniverse::from_lists(lists);
        for code in universe.organism_codes() {
            info!(
                "{:<15} {:>6} annotated GO terms",
                code,
                universe.size_of(code).unwrap_or(0)
            );
        }
        Ok(universe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn shared_terms_share_an_index() {
        let universe = GoUniverse::from_lists(vec![
            ("A".to_string(), vec!["GO:1", "GO:2", "GO:3"]),
            ("B".to_string(), vec!["GO:3", "GO:4"]),
        ]);
        assert_eq!(universe.term_count(), 4);
        let a = universe.terms_of("A").unwrap();
        let b = universe.terms_of("B").unwrap();
        assert_eq!(a[2], b[0]);
        assert_eq!(universe.index.get("GO:3"), Some(&b[0]));
        assert!(universe.terms_of("C").is_none());
    }

    #[test]
    fn duplicates_within_an_organism_collapse() {
        let universe =
            GoUniverse::from_lists(vec![("A".to_string(), vec!["GO:1", "GO:1", "GO:2"])]);
        assert_eq!(universe.size_of("A"), Some(2));
    }

    #[test]
    fn loads_json_mapping() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("All_Organisms_GOids.json");
        fs::write(
            &path,
            r#"{"Scerevisiae": ["GO:0003723", "GO:0005634"], "Hsapiens": ["GO:0005634"]}"#,
        )
        .unwrap();
        let universe = GoUniverseFile { path }.load().unwrap();
        assert_eq!(universe.size_of("Scerevisiae"), Some(2));
        assert_eq!(universe.size_of("Hsapiens"), Some(1));
        assert_eq!(universe.term_count(), 2);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        let err = GoUniverseFile {
            path: dir.path().join("nope.json"),
        }
        .load()
        .unwrap_err();
        assert!(matches!(err, SharingError::Io { .. }));
    }
}
