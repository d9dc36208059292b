//! Découverte des fichiers à traiter
//!
//! - [`AtomDiscovery`] : flux ATOM du cadastre, téléchargement et extraction
//!   des archives communales
//! - [`LocalDiscovery`] : fichiers `.gml` ou archives `.zip` locaux
//!
//! Les archives sont extraites dans le répertoire de travail, nettoyé en fin
//! de run par [`cleanup_staging`].

pub mod atom;
pub mod local;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use reqwest::blocking::Client;
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::pipeline::FileDiscovery;

pub use atom::{parse_feed, FeedEntry};
pub use local::LocalDiscovery;

/// Flux racine des bâtiments INSPIRE du cadastre
pub const DEFAULT_FEED_URL: &str =
    "http://www.catastro.minhap.es/INSPIRE/buildings/ES.SDGC.BU.atom.xml";

/// Extensions supprimées du répertoire de travail
const STAGING_EXTENSIONS: &[&str] = &["gfs", "gml", "xml", "zip", "csv"];

/// Découverte par les flux ATOM
#[derive(Debug, Clone)]
pub struct AtomDiscovery {
    client: Client,
    feed_url: String,
    offices: Vec<String>,
    kinds: Vec<String>,
    limit: Option<usize>,
}

impl AtomDiscovery {
    /// `offices` vide : toutes les délégations ; `kinds` vide : tous les thèmes
    pub fn new(client: Client, feed_url: impl Into<String>, offices: Vec<String>, kinds: Vec<String>) -> Self {
        Self {
            client,
            feed_url: feed_url.into(),
            offices,
            kinds,
            limit: None,
        }
    }

    /// Limite le nombre de communes téléchargées
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    fn fetch_feed(&self, url: &str) -> Result<Vec<FeedEntry>, PipelineError> {
        debug!(url, "Fetching feed");
        let body = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.bytes())
            .map_err(|e| PipelineError::Discovery(format!("cannot fetch {}: {}", url, e)))?;
        parse_feed(&body)
    }

    fn download(&self, url: &str, staging: &Path) -> Result<PathBuf, PipelineError> {
        let name = url
            .rsplit('/')
            .next()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| PipelineError::Discovery(format!("no file name in {}", url)))?;
        let target = staging.join(name);

        let mut response = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| PipelineError::Discovery(format!("cannot download {}: {}", url, e)))?;

        let mut file = std::fs::File::create(&target).map_err(|e| {
            PipelineError::Discovery(format!("cannot create {}: {}", target.display(), e))
        })?;
        let bytes = response
            .copy_to(&mut file)
            .map_err(|e| PipelineError::Discovery(format!("cannot download {}: {}", url, e)))?;

        debug!(file = %target.display(), bytes, "Downloaded");
        Ok(target)
    }

    fn selects_office(&self, entry: &FeedEntry) -> bool {
        if self.offices.is_empty() {
            return true;
        }
        match office_code(entry) {
            Some(code) => self.offices.iter().any(|o| *o == code),
            None => false,
        }
    }
}

impl FileDiscovery for AtomDiscovery {
    fn discover(&self, staging: &Path) -> Result<Vec<PathBuf>, PipelineError> {
        let offices: Vec<_> = self
            .fetch_feed(&self.feed_url)?
            .into_iter()
            .filter(|e| self.selects_office(e))
            .collect();

        if offices.is_empty() {
            return Err(PipelineError::Discovery(format!(
                "no territorial office matches {:?}",
                self.offices
            )));
        }

        let mut files = Vec::new();
        let mut municipalities = 0usize;

        'offices: for office in &offices {
            info!(office = %office.title, "Reading office feed");
            let entries = match self.fetch_feed(office.url()) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(office = %office.title, error = %e, "Skipping office");
                    continue;
                }
            };

            for entry in entries {
                if self.limit.is_some_and(|limit| municipalities >= limit) {
                    break 'offices;
                }
                municipalities += 1;

                let extracted = self
                    .download(entry.url(), staging)
                    .and_then(|archive| extract_archive(&archive, staging));
                match extracted {
                    Ok(gml) => {
                        let before = files.len();
                        files.extend(gml.into_iter().filter(|f| matches_kind(f, &self.kinds)));
                        info!(municipality = %entry.title, files = files.len() - before, "Downloaded");
                    }
                    Err(e) => warn!(municipality = %entry.title, error = %e, "Skipping municipality"),
                }
            }
        }

        Ok(files)
    }
}

/// Code de délégation (deux chiffres) depuis `atom_NN.xml` ou le titre
pub fn office_code(entry: &FeedEntry) -> Option<String> {
    static FEED: OnceLock<Option<Regex>> = OnceLock::new();
    static TITLE: OnceLock<Option<Regex>> = OnceLock::new();

    let feed = FEED.get_or_init(|| Regex::new(r"atom_(\d{2})\.xml").ok());
    let title = TITLE.get_or_init(|| Regex::new(r"\b(\d{2})\b").ok());

    [(feed, entry.url()), (feed, entry.id.as_str()), (title, entry.title.as_str())]
        .into_iter()
        .find_map(|(re, text)| {
            re.as_ref()
                .and_then(|re| re.captures(text))
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        })
}

/// Extrait les GML d'une archive dans le répertoire de travail
pub(crate) fn extract_archive(archive: &Path, staging: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    inspire_gml::archive::extract(archive, staging).map_err(|e| {
        PipelineError::Discovery(format!("cannot extract {}: {}", archive.display(), e))
    })
}

/// Vrai si le thème du fichier est sélectionné (`kinds` vide : tous)
pub(crate) fn matches_kind(path: &Path, kinds: &[String]) -> bool {
    if kinds.is_empty() {
        return true;
    }
    inspire_gml::parse_file_name(path).is_some_and(|name| kinds.iter().any(|k| *k == name.kind))
}

/// Supprime archives, GML, `.gfs`, `.xml` et CSV du répertoire de travail,
/// sauf les fichiers de `inputs` ; retourne le nombre de fichiers supprimés
pub fn cleanup_staging(staging: &Path, inputs: &[PathBuf]) -> std::io::Result<usize> {
    if !staging.exists() {
        return Ok(0);
    }

    let inputs: Vec<PathBuf> = inputs.iter().map(|p| canonical(p)).collect();

    let mut removed = 0;
    for entry in std::fs::read_dir(staging)? {
        let path = entry?.path();
        let is_staged = path.is_file()
            && path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| STAGING_EXTENSIONS.iter().any(|s| e.eq_ignore_ascii_case(s)));

        if !is_staged {
            continue;
        }
        if inputs.contains(&canonical(&path)) {
            debug!(file = %path.display(), "Keeping input file");
            continue;
        }

        std::fs::remove_file(&path)?;
        removed += 1;
    }

    Ok(removed)
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
