//! # catastro-bq
//!
//! Chargement des bâtiments INSPIRE du cadastre espagnol dans BigQuery.
//!
//! ## Features
//!
//! - Découverte par les flux ATOM du cadastre ou depuis des fichiers locaux
//! - Reprojection vers WGS84 (UTM pur Rust, PROJ en option)
//! - Une table CSV par fichier GML : géométrie GeoJSON puis attributs
//! - Dépôt dans Cloud Storage et job de chargement BigQuery
//! - Rapport de run JSON
//!
//! ## Usage CLI
//!
//! ```bash
//! # Délégations 02 et 28 vers BigQuery
//! catastro-bq load --office 02 --office 28 --project my-project --bucket cadastre --dataset catastro
//!
//! # Conversion locale en CSV
//! catastro-bq to-csv --path ./A.ES.SDGC.BU.02001.zip --output ./csv/
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod report;
pub mod reproject;
pub mod table;
pub mod transform;

pub use config::{Config, FieldConfig, TableConfig};
pub use error::{FeatureError, PipelineError, ReprojectionError};
pub use pipeline::{
    ArtifactSink, FeatureSource, FileDiscovery, GmlFileSource, LoadSummary, Pipeline,
    PipelineSettings, WarehouseLoader,
};
pub use report::{RunReport, RunStatus};
pub use reproject::Reprojector;
pub use table::{TableArtifact, TableWriter};
