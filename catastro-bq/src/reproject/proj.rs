//! Reprojection avec PROJ
//!
//! Ce module est disponible uniquement avec le feature `reproject`.

use geo::{Coord, LineString};
use proj::Proj;

use crate::error::ReprojectionError;

/// Transformation PROJ entre deux EPSG
pub struct ProjTransform {
    proj: Proj,
    source_epsg: u32,
    target_epsg: u32,
}

impl std::fmt::Debug for ProjTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjTransform")
            .field("source_epsg", &self.source_epsg)
            .field("target_epsg", &self.target_epsg)
            .finish()
    }
}

impl ProjTransform {
    /// Crée une transformation entre deux EPSG
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self, ReprojectionError> {
        let source = format!("EPSG:{}", source_epsg);
        let target = format!("EPSG:{}", target_epsg);

        let proj = Proj::new_known_crs(&source, &target, None).map_err(|e| {
            ReprojectionError::Construction {
                from_epsg: source_epsg,
                to_epsg: target_epsg,
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            proj,
            source_epsg,
            target_epsg,
        })
    }

    /// Transforme une coordonnée unique
    pub fn transform(&self, coord: Coord<f64>) -> Result<Coord<f64>, ReprojectionError> {
        let (x, y) = self
            .proj
            .convert((coord.x, coord.y))
            .map_err(|e| domain_error(coord, e.to_string()))?;
        check_finite(coord, x, y)?;
        Ok(Coord { x, y })
    }

    /// Transforme un anneau (conversion batch)
    pub fn transform_ring(&self, ring: &[Coord<f64>]) -> Result<LineString<f64>, ReprojectionError> {
        let mut coords: Vec<(f64, f64)> = ring.iter().map(|c| (c.x, c.y)).collect();

        self.proj
            .convert_array(&mut coords)
            .map_err(|e| domain_error(ring.first().copied().unwrap_or_default(), e.to_string()))?;

        ring.iter()
            .zip(coords)
            .map(|(src, (x, y))| {
                check_finite(*src, x, y)?;
                Ok(Coord { x, y })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(LineString::new)
    }
}

fn domain_error(coord: Coord<f64>, reason: String) -> ReprojectionError {
    ReprojectionError::Domain {
        x: coord.x,
        y: coord.y,
        reason,
    }
}

/// PROJ renvoie `inf` pour certains points hors domaine sans lever d'erreur
fn check_finite(src: Coord<f64>, x: f64, y: f64) -> Result<(), ReprojectionError> {
    if x.is_finite() && y.is_finite() {
        Ok(())
    } else {
        Err(domain_error(src, "transform produced a non-finite result".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ed50_utm30_to_wgs84() {
        // Madrid en ED50 / UTM 30N (non couvert par la reprojection légère)
        let t = ProjTransform::new(23030, 4326).unwrap();
        let c = t.transform(Coord { x: 440780.0, y: 4474460.0 }).unwrap();
        assert!((c.x - (-3.70)).abs() < 0.02, "lon={}", c.x);
        assert!((c.y - 40.42).abs() < 0.02, "lat={}", c.y);
    }

    #[test]
    fn test_ring_keeps_point_count() {
        let t = ProjTransform::new(25830, 4326).unwrap();
        let ring = [
            Coord { x: 440670.0, y: 4473400.0 },
            Coord { x: 441520.0, y: 4473400.0 },
            Coord { x: 441520.0, y: 4474510.0 },
            Coord { x: 440670.0, y: 4473400.0 },
        ];
        let ls = t.transform_ring(&ring).unwrap();
        assert_eq!(ls.0.len(), 4);
        assert_eq!(ls.0[0], ls.0[3]);
    }

    #[test]
    fn test_invalid_epsg() {
        assert!(matches!(
            ProjTransform::new(99999, 4326),
            Err(ReprojectionError::Construction { .. })
        ));
    }
}
