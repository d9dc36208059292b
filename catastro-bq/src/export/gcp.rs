//! Paramètres Google Cloud (projet, bucket, dataset, identifiants)

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;

use super::auth::{token_provider, AccessTokenProvider};

pub const DEFAULT_STORAGE_URL: &str = "https://storage.googleapis.com";
pub const DEFAULT_BIGQUERY_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// Configuration Google Cloud
#[derive(Debug, Clone)]
pub struct GcpConfig {
    pub project: Option<String>,
    pub bucket: Option<String>,
    /// Préfixe des objets déposés
    pub prefix: String,
    pub dataset: Option<String>,
    /// Région des jobs BigQuery (EU, US, europe-west1, ...)
    pub location: Option<String>,
    /// Jeton OAuth fixe (non renouvelé)
    pub access_token: Option<String>,
    /// Fichier de clé d'un compte de service
    pub credentials: Option<PathBuf>,
    /// Lignes rejetées tolérées par job de chargement
    pub max_bad_records: u32,
    /// Durée maximale d'attente d'un job
    pub job_timeout: Duration,
    pub storage_url: String,
    pub bigquery_url: String,
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            project: None,
            bucket: None,
            prefix: String::new(),
            dataset: None,
            location: None,
            access_token: None,
            credentials: None,
            max_bad_records: 10,
            job_timeout: Duration::from_secs(600),
            storage_url: DEFAULT_STORAGE_URL.into(),
            bigquery_url: DEFAULT_BIGQUERY_URL.into(),
        }
    }
}

impl GcpConfig {
    /// Charge la configuration depuis les variables d'environnement
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Charge la configuration depuis une source de variables
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            project: non_empty("GCP_PROJECT"),
            bucket: non_empty("GCS_BUCKET"),
            prefix: non_empty("GCS_PREFIX").unwrap_or_default(),
            dataset: non_empty("BQ_DATASET"),
            location: non_empty("BQ_LOCATION"),
            access_token: non_empty("GOOGLE_OAUTH_ACCESS_TOKEN"),
            credentials: non_empty("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from),
            max_bad_records: non_empty("BQ_MAX_BAD_RECORDS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_bad_records),
            ..defaults
        }
    }

    /// Vérifie les paramètres nécessaires au chargement
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.project.is_none() {
            missing.push("project (--project / GCP_PROJECT)");
        }
        if self.bucket.is_none() {
            missing.push("bucket (--bucket / GCS_BUCKET)");
        }
        if self.dataset.is_none() {
            missing.push("dataset (--dataset / BQ_DATASET)");
        }
        if !missing.is_empty() {
            bail!("Missing Google Cloud settings: {}", missing.join(", "));
        }
        Ok(())
    }

    /// Source des jetons : jeton fixe, fichier de clé, sinon identifiants
    /// par défaut (gcloud, serveur de métadonnées)
    pub fn token_provider(&self) -> Result<Arc<dyn AccessTokenProvider>> {
        token_provider(self.access_token.as_deref(), self.credentials.as_deref())
    }
}

/// Client HTTP partagé par la découverte et les dépôts
pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(30))
        .user_agent(concat!("catastro-bq/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")
}
