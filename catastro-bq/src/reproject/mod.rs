//! Reprojection des géométries vers WGS84
//!
//! Utilise automatiquement la meilleure option disponible :
//! identité, reprojection légère (pure Rust), puis PROJ si le feature
//! `reproject` est activé.

pub mod lite;
#[cfg(feature = "reproject")]
pub mod proj;

use geo::{Coord, LineString};

use crate::error::ReprojectionError;
use lite::LiteTransform;

/// Système cible de toutes les tables (WGS84)
pub const TARGET_EPSG: u32 = 4326;

/// Reprojection construite une fois par fichier
#[derive(Debug)]
pub enum Reprojector {
    /// Pas de reprojection (source == cible, ou fichier sans système déclaré)
    Identity,
    /// Reprojection légère (pure Rust)
    Lite(LiteTransform),
    /// Reprojection via PROJ (si feature activée)
    #[cfg(feature = "reproject")]
    Proj(proj::ProjTransform),
}

impl Reprojector {
    /// Crée un nouveau reprojector
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self, ReprojectionError> {
        if source_epsg == target_epsg {
            return Ok(Self::Identity);
        }

        if LiteTransform::is_supported(source_epsg, target_epsg) {
            if let Some(lite) = LiteTransform::for_epsg(source_epsg) {
                return Ok(Self::Lite(lite));
            }
        }

        // Fallback sur proj si disponible
        #[cfg(feature = "reproject")]
        return proj::ProjTransform::new(source_epsg, target_epsg).map(Self::Proj);

        #[cfg(not(feature = "reproject"))]
        return Err(ReprojectionError::Construction {
            from_epsg: source_epsg,
            to_epsg: target_epsg,
            reason: "supported sources are EPSG:25828-25831, 4082-4083, 32628-32631 \
                     to EPSG:4326; build with --features reproject for other systems"
                .to_string(),
        });
    }

    /// Reprojector pour un fichier dont le système est optionnel
    pub fn for_source(source_epsg: Option<u32>) -> Result<Self, ReprojectionError> {
        match source_epsg {
            Some(epsg) => Self::new(epsg, TARGET_EPSG),
            None => Ok(Self::Identity),
        }
    }

    /// Transforme une coordonnée
    pub fn transform_coord(&self, coord: Coord<f64>) -> Result<Coord<f64>, ReprojectionError> {
        match self {
            Self::Identity => Ok(coord),
            Self::Lite(lite) => lite.transform(coord),
            #[cfg(feature = "reproject")]
            Self::Proj(proj) => proj.transform(coord),
        }
    }

    /// Transforme un anneau en conservant le nombre et l'ordre des points
    pub fn transform_ring(&self, ring: &[Coord<f64>]) -> Result<LineString<f64>, ReprojectionError> {
        match self {
            Self::Identity => Ok(LineString::new(ring.to_vec())),
            Self::Lite(lite) => ring
                .iter()
                .map(|c| lite.transform(*c))
                .collect::<Result<Vec<_>, _>>()
                .map(LineString::new),
            #[cfg(feature = "reproject")]
            Self::Proj(proj) => proj.transform_ring(ring),
        }
    }

    /// Retourne une description du reprojector utilisé
    pub fn description(&self) -> &'static str {
        match self {
            Self::Identity => "identity (no reprojection)",
            Self::Lite(_) => "lite (pure Rust UTM)",
            #[cfg(feature = "reproject")]
            Self::Proj(_) => "proj (PROJ library)",
        }
    }
}
