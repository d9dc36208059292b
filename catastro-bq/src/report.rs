//! Rapport de run avec graceful degradation
//!
//! Un enregistrement par fichier traité : table produite, features ignorées,
//! lignes chargées ou cause de l'échec.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

use crate::error::PipelineError;
use crate::pipeline::FileOutcome;
use crate::table::FeatureFailure;

/// Statut global du run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    /// Tous les fichiers traités sans erreur
    Success,
    /// Des fichiers ou des features en erreur, mais des lignes produites
    PartialSuccess,
    /// Aucun fichier n'a abouti
    Failed,
}

/// Issue du traitement d'un fichier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FileStatus {
    /// CSV déposé et chargé
    Loaded,
    /// CSV écrit et déposé, sans chargement
    Written,
    /// Aucune table configurée pour ce fichier
    Skipped,
    /// Fichier abandonné
    Failed,
}

/// Rapport d'un fichier
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub file: String,
    pub status: FileStatus,
    pub table: Option<String>,
    /// URI de l'artefact déposé
    pub uri: Option<String>,
    pub rows_written: usize,
    /// Lignes chargées par le job (None sans chargement)
    pub rows_loaded: Option<u64>,
    /// Lignes rejetées par l'entrepôt
    pub bad_records: u64,
    /// Lignes de la table après chargement
    pub table_rows: Option<u64>,
    pub failed_features: Vec<FeatureFailure>,
    /// Cause de l'échec ou du skip
    pub reason: Option<String>,
}

impl FileReport {
    pub fn from_outcome(file: &str, outcome: &FileOutcome) -> Self {
        let load = outcome.load.as_ref();
        Self {
            file: file.to_string(),
            status: if load.is_some() {
                FileStatus::Loaded
            } else {
                FileStatus::Written
            },
            table: Some(outcome.table.clone()),
            uri: Some(outcome.uri.clone()),
            rows_written: outcome.artifact.rows,
            rows_loaded: load.map(|l| l.output_rows),
            bad_records: load.map(|l| l.bad_records).unwrap_or(0),
            table_rows: load.and_then(|l| l.table_rows),
            failed_features: outcome.artifact.failures.clone(),
            reason: None,
        }
    }

    /// Fichier non abouti ; `NoTable` est un skip, le reste un échec
    pub fn failed(file: &str, error: &PipelineError) -> Self {
        let status = match error {
            PipelineError::NoTable { .. } => FileStatus::Skipped,
            _ => FileStatus::Failed,
        };
        Self {
            file: file.to_string(),
            status,
            table: None,
            uri: None,
            rows_written: 0,
            rows_loaded: None,
            bad_records: 0,
            table_rows: None,
            failed_features: Vec::new(),
            reason: Some(error.to_string()),
        }
    }
}

/// Rapport complet d'un run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// `load` ou `upload`
    pub mode: String,
    pub duration_secs: f64,
    pub status: RunStatus,

    pub files_processed: usize,
    pub files_failed: usize,
    pub files_skipped: usize,
    pub rows_written: usize,
    pub features_failed: usize,
    pub rows_loaded: u64,
    pub bad_records: u64,

    pub files: Vec<FileReport>,
}

impl RunReport {
    pub fn new(mode: &str) -> Self {
        Self {
            mode: mode.to_string(),
            duration_secs: 0.0,
            status: RunStatus::Success,
            files_processed: 0,
            files_failed: 0,
            files_skipped: 0,
            rows_written: 0,
            features_failed: 0,
            rows_loaded: 0,
            bad_records: 0,
            files: Vec::new(),
        }
    }

    /// Enregistre le résultat d'un fichier
    pub fn record_file(&mut self, file: FileReport) {
        self.files_processed += 1;
        match file.status {
            FileStatus::Failed => self.files_failed += 1,
            FileStatus::Skipped => self.files_skipped += 1,
            FileStatus::Loaded | FileStatus::Written => {}
        }
        self.rows_written += file.rows_written;
        self.features_failed += file.failed_features.len();
        self.rows_loaded += file.rows_loaded.unwrap_or(0);
        self.bad_records += file.bad_records;
        self.files.push(file);
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Détermine le statut final
    pub fn finalize(&mut self) {
        let succeeded = self.files_processed - self.files_failed - self.files_skipped;
        let has_errors = self.files_failed > 0 || self.features_failed > 0;

        self.status = if self.files_failed > 0 && succeeded == 0 {
            RunStatus::Failed
        } else if has_errors {
            RunStatus::PartialSuccess
        } else {
            RunStatus::Success
        };
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("RUN REPORT - {}", self.mode);
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);

        println!("\n--- SUMMARY ---");
        println!(
            "Files: {} processed, {} failed, {} skipped",
            self.files_processed, self.files_failed, self.files_skipped
        );
        println!(
            "Rows: {} written, {} features failed, {} loaded, {} bad records",
            self.rows_written, self.features_failed, self.rows_loaded, self.bad_records
        );

        if !self.files.is_empty() {
            println!("\n--- BY FILE ---");
            for f in &self.files {
                match (&f.table, &f.reason) {
                    (_, Some(reason)) => println!("  {:?} {}: {}", f.status, f.file, reason),
                    (Some(table), None) => println!(
                        "  {:?} {} -> {}: {} rows, {} failed",
                        f.status,
                        f.file,
                        table,
                        f.rows_written,
                        f.failed_features.len()
                    ),
                    (None, None) => println!("  {:?} {}", f.status, f.file),
                }
            }
        }

        let failures: Vec<_> = self
            .files
            .iter()
            .flat_map(|f| f.failed_features.iter().map(move |e| (&f.file, e)))
            .collect();
        if !failures.is_empty() {
            println!("\n--- FAILED FEATURES ({}) ---", failures.len());
            for (file, e) in failures.iter().take(20) {
                println!("  [{}:{}] {}", file, e.id, e.reason);
            }
            if failures.len() > 20 {
                println!("  ... and {} more", failures.len() - 20);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        format!(
            "{}: {} files, {} rows written, {} loaded, {} failed features, {} failed files",
            self.mode,
            self.files_processed,
            self.rows_written,
            self.rows_loaded,
            self.features_failed,
            self.files_failed
        )
    }
}
