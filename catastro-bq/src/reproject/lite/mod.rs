//! Reprojection légère en Rust pur (sans dépendances externes)
//!
//! Supporte les projections du cadastre espagnol :
//! - ETRS89 / UTM 28N à 31N (EPSG:25828 à 25831) - Péninsule, Baléares, Ceuta, Melilla
//! - REGCAN95 / UTM 27N et 28N (EPSG:4082, 4083) - Canaries
//! - WGS84 / UTM 28N à 31N (EPSG:32628 à 32631)
//!
//! Cible supportée : WGS84 (EPSG:4326). ETRS89 et REGCAN95 sont confondus avec
//! WGS84 (écart inférieur au mètre), aucune transformation de datum n'est appliquée.

mod ellipsoid;
mod utm;

pub use ellipsoid::Ellipsoid;

use geo::Coord;

use crate::error::ReprojectionError;

/// Point en coordonnées géographiques (radians)
#[derive(Debug, Clone, Copy)]
pub struct Geographic {
    /// Longitude en radians
    pub lon: f64,
    /// Latitude en radians
    pub lat: f64,
}

impl Geographic {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Convertit en degrés
    pub fn to_degrees(self) -> (f64, f64) {
        (self.lon.to_degrees(), self.lat.to_degrees())
    }
}

/// Transformation UTM → WGS84 pour un EPSG source donné
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiteTransform {
    source_epsg: u32,
    zone: u32,
    ellipsoid: Ellipsoid,
}

impl LiteTransform {
    /// Construit la transformation, si l'EPSG source est supporté
    pub fn for_epsg(source_epsg: u32) -> Option<Self> {
        let (zone, ellipsoid) = match source_epsg {
            25828..=25831 => (source_epsg - 25800, Ellipsoid::GRS80),
            4082 => (27, Ellipsoid::GRS80),
            4083 => (28, Ellipsoid::GRS80),
            32628..=32631 => (source_epsg - 32600, Ellipsoid::WGS84),
            _ => return None,
        };

        Some(Self {
            source_epsg,
            zone,
            ellipsoid,
        })
    }

    /// Vérifie si la reprojection est supportée
    pub fn is_supported(source: u32, target: u32) -> bool {
        target == 4326 && Self::for_epsg(source).is_some()
    }

    pub fn source_epsg(&self) -> u32 {
        self.source_epsg
    }

    /// Transforme un point (x, y) en (longitude, latitude) en degrés
    pub fn transform(&self, coord: Coord<f64>) -> Result<Coord<f64>, ReprojectionError> {
        let geo = utm::utm_to_geographic(coord.x, coord.y, self.zone, &self.ellipsoid)?;
        let (x, y) = geo.to_degrees();
        Ok(Coord { x, y })
    }
}
