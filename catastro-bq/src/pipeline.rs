//! Pilotage du traitement : découverte, écriture, dépôt, chargement
//!
//! Les fichiers sont traités l'un après l'autre. L'échec d'un fichier est
//! journalisé et enregistré dans le rapport ; les fichiers suivants sont
//! traités normalement. Le répertoire de travail est nettoyé en fin de run.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::{error, info, warn};

use inspire_gml::{GmlError, SourceFeature};

use crate::config::{Config, TableConfig};
use crate::discovery::cleanup_staging;
use crate::error::PipelineError;
use crate::report::{FileReport, RunReport};
use crate::table::{TableArtifact, TableWriter};

/// Flux de features d'un fichier ouvert
pub struct OpenedSource {
    /// EPSG détecté (None si le fichier ne déclare aucun système)
    pub epsg: Option<u32>,
    pub features: Box<dyn Iterator<Item = Result<SourceFeature, GmlError>>>,
}

/// Ouvre un fichier source
pub trait FeatureSource {
    fn open(&self, path: &Path) -> Result<OpenedSource, GmlError>;
}

/// Liste les fichiers à traiter (après téléchargement éventuel dans `staging`)
pub trait FileDiscovery {
    fn discover(&self, staging: &Path) -> Result<Vec<PathBuf>, PipelineError>;

    /// Fichiers fournis par l'utilisateur, jamais supprimés au nettoyage
    fn inputs(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Dépose un artefact ; retourne son URI
pub trait ArtifactSink {
    fn upload(&self, path: &Path, object_name: &str) -> Result<String, PipelineError>;
}

/// Résultat d'un job de chargement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub job_id: String,
    /// Lignes chargées par le job
    pub output_rows: u64,
    /// Lignes rejetées par l'entrepôt
    pub bad_records: u64,
    /// Nombre de lignes de la table après chargement
    pub table_rows: Option<u64>,
}

/// Charge un artefact déposé dans une table
pub trait WarehouseLoader {
    fn load(&self, uri: &str, table: &TableConfig) -> Result<LoadSummary, PipelineError>;
}

/// Source GML sur disque
#[derive(Debug, Clone, Copy, Default)]
pub struct GmlFileSource;

impl FeatureSource for GmlFileSource {
    fn open(&self, path: &Path) -> Result<OpenedSource, GmlError> {
        let (epsg, reader) = inspire_gml::open(path)?;
        Ok(OpenedSource {
            epsg,
            features: Box::new(reader),
        })
    }
}

/// Paramètres d'un run
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Répertoire de travail (archives, GML extraits, CSV)
    pub staging_dir: PathBuf,
    /// Conserver le répertoire de travail en fin de run
    pub keep_staging: bool,
    /// Préfixe des objets déposés
    pub object_prefix: String,
}

impl PipelineSettings {
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            keep_staging: false,
            object_prefix: String::new(),
        }
    }
}

/// Résultat du traitement d'un fichier
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub table: String,
    pub artifact: TableArtifact,
    pub uri: String,
    pub load: Option<LoadSummary>,
}

/// Pipeline fichier par fichier
pub struct Pipeline {
    config: Config,
    settings: PipelineSettings,
    source: Box<dyn FeatureSource>,
    sink: Box<dyn ArtifactSink>,
    loader: Option<Box<dyn WarehouseLoader>>,
}

impl Pipeline {
    /// Crée un pipeline lisant des fichiers GML ; sans loader, les artefacts
    /// sont seulement déposés
    pub fn new(config: Config, settings: PipelineSettings, sink: Box<dyn ArtifactSink>) -> Self {
        Self {
            config,
            settings,
            source: Box::new(GmlFileSource),
            sink,
            loader: None,
        }
    }

    pub fn with_source(mut self, source: Box<dyn FeatureSource>) -> Self {
        self.source = source;
        self
    }

    pub fn with_loader(mut self, loader: Box<dyn WarehouseLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Exécute le run complet.
    ///
    /// # Errors
    ///
    /// `Discovery` si la liste des fichiers n'a pas pu être établie ; le
    /// répertoire de travail est nettoyé dans tous les cas.
    pub fn run(&self, discovery: &dyn FileDiscovery) -> Result<RunReport, PipelineError> {
        let started_at = Instant::now();
        let mode = if self.loader.is_some() { "load" } else { "upload" };
        let mut report = RunReport::new(mode);

        std::fs::create_dir_all(&self.settings.staging_dir).map_err(|e| {
            PipelineError::Discovery(format!(
                "cannot create staging directory {}: {}",
                self.settings.staging_dir.display(),
                e
            ))
        })?;

        let inputs = discovery.inputs();
        let files = match discovery.discover(&self.settings.staging_dir) {
            Ok(files) => files,
            Err(e) => {
                error!(error = %e, "Discovery failed");
                self.cleanup(&inputs);
                return Err(e);
            }
        };

        info!(files = files.len(), "Files to process");

        for (i, path) in files.iter().enumerate() {
            let label = file_label(path);
            info!(file = %label, "[{}/{}] Processing", i + 1, files.len());

            match self.process_file(path) {
                Ok(outcome) => {
                    report.record_file(FileReport::from_outcome(&label, &outcome));
                }
                Err(e) => {
                    error!(file = %label, error = %e, "File failed");
                    report.record_file(FileReport::failed(&label, &e));
                }
            }
        }

        self.cleanup(&inputs);

        report.set_duration(started_at.elapsed());
        report.finalize();
        Ok(report)
    }

    /// Traite un fichier : table, CSV, dépôt, chargement
    pub fn process_file(&self, path: &Path) -> Result<FileOutcome, PipelineError> {
        let label = file_label(path);

        let table = self
            .config
            .table_for_file(path)
            .ok_or_else(|| PipelineError::NoTable {
                file: label.clone(),
            })?;

        let opened = self
            .source
            .open(path)
            .map_err(|source| PipelineError::FileRead {
                file: label.clone(),
                source,
            })?;

        std::fs::create_dir_all(&self.settings.staging_dir).map_err(|e| PipelineError::ArtifactWrite {
            file: label.clone(),
            reason: format!("cannot create {}: {}", self.settings.staging_dir.display(), e),
        })?;

        let csv_path = self.artifact_path(path);
        let artifact = TableWriter::new()
            .with_prototype(table.columns())
            .write(&label, opened.epsg, opened.features, &csv_path)?;

        if artifact.rows == 0 {
            warn!(file = %label, failed = artifact.failures.len(), "No rows written");
        }

        let object_name = self.object_name(&csv_path);
        let uri = self.sink.upload(&artifact.path, &object_name)?;
        info!(file = %label, uri = %uri, "Artifact uploaded");

        let load = match &self.loader {
            Some(loader) => {
                let summary = loader.load(&uri, table)?;
                info!(
                    file = %label,
                    table = %table.table,
                    rows = summary.output_rows,
                    bad_records = summary.bad_records,
                    table_rows = ?summary.table_rows,
                    "Loaded"
                );
                Some(summary)
            }
            None => None,
        };

        Ok(FileOutcome {
            table: table.table.clone(),
            artifact,
            uri,
            load,
        })
    }

    /// `<staging>/<nom du fichier>.csv`
    fn artifact_path(&self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "artifact".to_string());
        self.settings.staging_dir.join(format!("{}.csv", stem))
    }

    /// `<préfixe>/<nom du CSV>`
    fn object_name(&self, csv_path: &Path) -> String {
        let name = file_label(csv_path);
        let prefix = self.settings.object_prefix.trim_matches('/');
        if prefix.is_empty() {
            name
        } else {
            format!("{}/{}", prefix, name)
        }
    }

    fn cleanup(&self, inputs: &[PathBuf]) {
        if self.settings.keep_staging {
            info!(dir = %self.settings.staging_dir.display(), "Keeping staging directory");
            return;
        }
        match cleanup_staging(&self.settings.staging_dir, inputs) {
            Ok(removed) => info!(removed, "Staging directory cleaned"),
            Err(e) => warn!(error = %e, "Failed to clean staging directory"),
        }
    }
}

/// Nom de fichier pour les logs et les erreurs
fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
