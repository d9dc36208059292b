//! Découverte de fichiers locaux (`.gml` ou archives `.zip`)

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::pipeline::FileDiscovery;

use super::{extract_archive, matches_kind};

/// Fichiers ou répertoires fournis sur la ligne de commande
#[derive(Debug, Clone)]
pub struct LocalDiscovery {
    paths: Vec<PathBuf>,
    kinds: Vec<String>,
}

impl LocalDiscovery {
    /// `kinds` vide : tous les fichiers GML sont retenus
    pub fn new(paths: Vec<PathBuf>, kinds: Vec<String>) -> Self {
        Self { paths, kinds }
    }
}

impl FileDiscovery for LocalDiscovery {
    fn discover(&self, staging: &Path) -> Result<Vec<PathBuf>, PipelineError> {
        let mut files = Vec::new();

        for path in &self.paths {
            if !path.exists() {
                return Err(PipelineError::Discovery(format!(
                    "path not found: {}",
                    path.display()
                )));
            }

            let candidates = collect_sources(path).map_err(|e| {
                PipelineError::Discovery(format!("cannot list {}: {}", path.display(), e))
            })?;

            for candidate in candidates {
                if has_extension(&candidate, "zip") {
                    match extract_archive(&candidate, staging) {
                        Ok(gml) => files.extend(gml),
                        Err(e) => warn!(archive = %candidate.display(), error = %e, "Skipping archive"),
                    }
                } else {
                    files.push(candidate);
                }
            }
        }

        files.retain(|f| {
            let keep = matches_kind(f, &self.kinds);
            if !keep {
                debug!(file = %f.display(), "Kind not selected");
            }
            keep
        });
        files.sort();
        files.dedup();

        Ok(files)
    }

    fn inputs(&self) -> Vec<PathBuf> {
        self.paths
            .iter()
            .filter_map(|path| collect_sources(path).ok())
            .flatten()
            .collect()
    }
}

/// Parcourt un chemin récursivement à la recherche de `.gml` et `.zip`
fn collect_sources(path: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut sources = Vec::new();

    if path.is_file() {
        if is_source(path) {
            sources.push(path.to_path_buf());
        }
        return Ok(sources);
    }

    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let entry_path = entry.path();

        if entry_path.is_dir() {
            sources.extend(collect_sources(&entry_path)?);
        } else if is_source(&entry_path) {
            sources.push(entry_path);
        }
    }

    Ok(sources)
}

fn is_source(path: &Path) -> bool {
    has_extension(path, "gml") || has_extension(path, "zip")
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .map_or(false, |e| e.eq_ignore_ascii_case(ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, names: &[&str]) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for name in names {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(b"<gml/>").unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_directory_walk_and_zip_extraction() {
        let data = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();

        let nested = data.path().join("02");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(data.path().join("A.ES.SDGC.BU.28079.building.gml"), b"<gml/>").unwrap();
        std::fs::write(data.path().join("readme.txt"), b"x").unwrap();
        write_zip(
            &nested.join("A.ES.SDGC.BU.02001.zip"),
            &[
                "A.ES.SDGC.BU.02001.building.gml",
                "A.ES.SDGC.BU.02001.buildingpart.gml",
                "A.ES.SDGC.BU.02001.xml",
            ],
        );

        let discovery = LocalDiscovery::new(vec![data.path().to_path_buf()], vec![]);
        let files = discovery.discover(staging.path()).unwrap();

        assert_eq!(files.len(), 3);
        assert!(files.contains(&staging.path().join("A.ES.SDGC.BU.02001.building.gml")));
        assert!(files.contains(&data.path().join("A.ES.SDGC.BU.28079.building.gml")));
    }

    #[test]
    fn test_kind_filter() {
        let data = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        std::fs::write(data.path().join("A.ES.SDGC.BU.28079.building.gml"), b"<gml/>").unwrap();
        std::fs::write(data.path().join("A.ES.SDGC.BU.28079.buildingpart.gml"), b"<gml/>").unwrap();

        let discovery = LocalDiscovery::new(
            vec![data.path().to_path_buf()],
            vec!["buildingpart".to_string()],
        );
        let files = discovery.discover(staging.path()).unwrap();

        assert_eq!(files, vec![data.path().join("A.ES.SDGC.BU.28079.buildingpart.gml")]);
    }

    #[test]
    fn test_invalid_archive_is_skipped() {
        let data = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        std::fs::write(data.path().join("broken.zip"), b"not a zip").unwrap();
        std::fs::write(data.path().join("A.ES.SDGC.BU.28079.building.gml"), b"<gml/>").unwrap();

        let discovery = LocalDiscovery::new(vec![data.path().to_path_buf()], vec![]);
        assert_eq!(discovery.discover(staging.path()).unwrap().len(), 1);
    }

    #[test]
    fn test_inputs_list_user_files() {
        let data = tempfile::tempdir().unwrap();
        std::fs::write(data.path().join("A.ES.SDGC.BU.28079.building.gml"), b"<gml/>").unwrap();
        write_zip(&data.path().join("A.ES.SDGC.BU.02001.zip"), &["A.ES.SDGC.BU.02001.building.gml"]);
        std::fs::write(data.path().join("readme.txt"), b"x").unwrap();

        let discovery = LocalDiscovery::new(vec![data.path().to_path_buf()], vec![]);
        let mut inputs = discovery.inputs();
        inputs.sort();

        assert_eq!(
            inputs,
            vec![
                data.path().join("A.ES.SDGC.BU.02001.zip"),
                data.path().join("A.ES.SDGC.BU.28079.building.gml"),
            ]
        );
    }

    #[test]
    fn test_missing_path() {
        let staging = tempfile::tempdir().unwrap();
        let discovery = LocalDiscovery::new(vec![PathBuf::from("/nonexistent/data")], vec![]);
        assert!(matches!(
            discovery.discover(staging.path()),
            Err(PipelineError::Discovery(_))
        ));
    }
}
