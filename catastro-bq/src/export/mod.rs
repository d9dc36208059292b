//! Dépôt et chargement des tables (Cloud Storage, BigQuery, répertoire local)

pub mod auth;
pub mod bigquery;
pub mod gcp;
pub mod gcs;
pub mod local;

pub use auth::{AccessTokenProvider, GoogleAuth, StaticToken};
pub use bigquery::BigQueryLoader;
pub use gcp::{http_client, GcpConfig};
pub use gcs::GcsUploader;
pub use local::DirectorySink;
