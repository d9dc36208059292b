//! Types d'erreurs du pipeline
//!
//! Deux niveaux : les erreurs propres à une feature (`FeatureError`,
//! `ReprojectionError::Domain`) sont journalisées puis ignorées ; les erreurs
//! propres à un fichier (`PipelineError`) abandonnent ce fichier uniquement.

use thiserror::Error;

/// Erreurs de reprojection
#[derive(Debug, Error)]
pub enum ReprojectionError {
    /// Pas de transformation possible entre les deux systèmes (fatal pour le fichier)
    #[error("No transform from EPSG:{from_epsg} to EPSG:{to_epsg}: {reason}")]
    Construction {
        from_epsg: u32,
        to_epsg: u32,
        reason: String,
    },

    /// Coordonnée hors du domaine de la projection (propre à une feature)
    #[error("Coordinate ({x}, {y}) cannot be transformed: {reason}")]
    Domain { x: f64, y: f64, reason: String },
}

/// Erreurs propres à une feature : la feature est ignorée, le fichier continue
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("Unsupported geometry type {geometry_type} for feature {id}")]
    UnsupportedGeometry { id: String, geometry_type: String },

    #[error("Failed to process feature {id}: {reason}")]
    Processing { id: String, reason: String },
}

impl FeatureError {
    /// Identifiant de la feature concernée
    pub fn id(&self) -> &str {
        match self {
            Self::UnsupportedGeometry { id, .. } | Self::Processing { id, .. } => id,
        }
    }
}

/// Erreurs propres à un fichier : le fichier est abandonné, le run continue
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Fichier source illisible ou mal formé
    #[error("Failed to read {file}: {source}")]
    FileRead {
        file: String,
        #[source]
        source: inspire_gml::GmlError,
    },

    /// Pas de transformation pour le système du fichier
    #[error("Cannot reproject {file}: {source}")]
    Reprojection {
        file: String,
        #[source]
        source: ReprojectionError,
    },

    /// Écriture du CSV impossible
    #[error("Failed to write artifact for {file}: {reason}")]
    ArtifactWrite { file: String, reason: String },

    /// Aucune table configurée pour ce type de fichier
    #[error("No destination table for {file}")]
    NoTable { file: String },

    /// Dépôt de l'artefact impossible
    #[error("Failed to upload {file}: {reason}")]
    Upload { file: String, reason: String },

    /// Job de chargement en échec
    #[error("Failed to load {file}: {reason}")]
    Load { file: String, reason: String },

    /// Téléchargement / découverte des fichiers impossible
    #[error("Discovery failed: {0}")]
    Discovery(String),
}

impl PipelineError {
    /// Fichier concerné, s'il y en a un
    pub fn file(&self) -> Option<&str> {
        match self {
            Self::FileRead { file, .. }
            | Self::Reprojection { file, .. }
            | Self::ArtifactWrite { file, .. }
            | Self::NoTable { file }
            | Self::Upload { file, .. }
            | Self::Load { file, .. } => Some(file),
            Self::Discovery(_) => None,
        }
    }
}
