//! Types d'erreurs pour le crate inspire-gml

use quick_xml::events::attributes::AttrError;
use thiserror::Error;

/// Erreurs pouvant survenir lors de la lecture d'un fichier GML
#[derive(Debug, Error)]
pub enum GmlError {
    /// Erreur d'I/O lors de la lecture du fichier
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Document XML mal formé
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Attribut XML mal formé
    #[error("XML attribute error: {0}")]
    Attribute(#[from] AttrError),

    /// Archive zip corrompue
    #[error("Invalid archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Fichier manquant dans l'archive
    #[error("Missing required file: {0}")]
    MissingFile(String),

    /// Géométrie illisible pour une feature (erreur non fatale)
    #[error("Invalid geometry for {entity_id}: {reason}")]
    InvalidGeometry { entity_id: String, reason: String },

    /// Système de référence absent ou non reconnu
    #[error("Unknown CRS: {0}")]
    UnknownCrs(String),
}

impl GmlError {
    /// Crée une erreur de géométrie invalide
    pub fn invalid_geometry(entity_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            entity_id: entity_id.into(),
            reason: reason.into(),
        }
    }

    /// Vrai si l'erreur ne concerne qu'une feature : la lecture du fichier peut continuer
    pub fn is_feature_level(&self) -> bool {
        matches!(self, Self::InvalidGeometry { .. })
    }

    /// Identifiant de la feature concernée, si l'erreur est locale à une feature
    pub fn entity_id(&self) -> Option<&str> {
        match self {
            Self::InvalidGeometry { entity_id, .. } => Some(entity_id),
            _ => None,
        }
    }
}
