//! Projection UTM (Universal Transverse Mercator), hémisphère nord
//!
//! Zones utilisées par le cadastre espagnol :
//! - Zone 27N - Canaries (El Hierro, La Palma)
//! - Zone 28N - Canaries
//! - Zone 29N - Galice, ouest de la Castille-et-León
//! - Zone 30N - Péninsule (centre), Ceuta, Melilla
//! - Zone 31N - Catalogne, Baléares

use super::ellipsoid::Ellipsoid;
use super::Geographic;
use crate::error::ReprojectionError;

/// Facteur d'échelle sur le méridien central
const K0: f64 = 0.9996;

/// False easting
const X0: f64 = 500000.0;

/// Domaine accepté pour les coordonnées projetées
const EASTING_RANGE: std::ops::RangeInclusive<f64> = 0.0..=1_000_000.0;
const NORTHING_RANGE: std::ops::RangeInclusive<f64> = 0.0..=10_000_000.0;

/// Convertit UTM (hémisphère nord) vers coordonnées géographiques
pub fn utm_to_geographic(
    x: f64,
    y: f64,
    zone: u32,
    ellipsoid: &Ellipsoid,
) -> Result<Geographic, ReprojectionError> {
    if !x.is_finite() || !y.is_finite() {
        return Err(domain_error(x, y, "non-finite coordinate"));
    }
    if !EASTING_RANGE.contains(&x) || !NORTHING_RANGE.contains(&y) {
        return Err(domain_error(x, y, "outside UTM zone extent"));
    }

    let a = ellipsoid.a;
    let e2 = ellipsoid.e2();
    let ep2 = ellipsoid.ep2();

    // Longitude centrale de la zone
    let lon0 = ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians();

    let x = x - X0;

    // Latitude du pied de la perpendiculaire
    let m = y / K0;
    let mu = m / (a * (1.0 - e2 / 4.0 - 3.0 * e2.powi(2) / 64.0 - 5.0 * e2.powi(3) / 256.0));

    let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());

    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1.powi(2) / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let sin_phi1 = phi1.sin();
    let cos_phi1 = phi1.cos();
    let tan_phi1 = phi1.tan();

    let n1 = a / (1.0 - e2 * sin_phi1.powi(2)).sqrt();
    let t1 = tan_phi1.powi(2);
    let c1 = ep2 * cos_phi1.powi(2);
    let r1 = a * (1.0 - e2) / (1.0 - e2 * sin_phi1.powi(2)).powf(1.5);
    let d = x / (n1 * K0);

    let lat = phi1
        - (n1 * tan_phi1 / r1)
            * (d.powi(2) / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1.powi(2) - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1.powi(2) - 252.0 * ep2 - 3.0 * c1.powi(2))
                    * d.powi(6)
                    / 720.0);

    let lon = lon0
        + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1.powi(2) + 8.0 * ep2 + 24.0 * t1.powi(2))
                * d.powi(5)
                / 120.0)
            / cos_phi1;

    if !lon.is_finite() || !lat.is_finite() {
        return Err(domain_error(x + X0, y, "transform produced a non-finite result"));
    }

    Ok(Geographic::new(lon, lat))
}

fn domain_error(x: f64, y: f64, reason: &str) -> ReprojectionError {
    ReprojectionError::Domain {
        x,
        y,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_madrid() {
        // Puerta del Sol approximativement
        // UTM Zone 30N: 440300, 4474250
        let geo = utm_to_geographic(440300.0, 4474250.0, 30, &Ellipsoid::GRS80).unwrap();
        let (lon, lat) = geo.to_degrees();

        // Madrid: -3.70°E, 40.42°N
        assert!((lon - (-3.70)).abs() < 0.02, "lon={}", lon);
        assert!((lat - 40.42).abs() < 0.02, "lat={}", lat);
    }

    #[test]
    fn test_barcelona() {
        // UTM Zone 31N: 430500, 4581800
        let geo = utm_to_geographic(430500.0, 4581800.0, 31, &Ellipsoid::GRS80).unwrap();
        let (lon, lat) = geo.to_degrees();

        // Barcelone: 2.17°E, 41.39°N
        assert!((lon - 2.17).abs() < 0.02, "lon={}", lon);
        assert!((lat - 41.39).abs() < 0.02, "lat={}", lat);
    }

    #[test]
    fn test_las_palmas() {
        // UTM Zone 28N: 458000, 3111000
        let geo = utm_to_geographic(458000.0, 3111000.0, 28, &Ellipsoid::GRS80).unwrap();
        let (lon, lat) = geo.to_degrees();

        // Las Palmas de Gran Canaria: -15.43°E, 28.12°N
        assert!((lon - (-15.43)).abs() < 0.02, "lon={}", lon);
        assert!((lat - 28.12).abs() < 0.02, "lat={}", lat);
    }

    #[test]
    fn test_central_meridian() {
        let geo = utm_to_geographic(500000.0, 0.0, 30, &Ellipsoid::WGS84).unwrap();
        let (lon, lat) = geo.to_degrees();
        assert!((lon - (-3.0)).abs() < 1e-9);
        assert!(lat.abs() < 1e-9);
    }

    #[test]
    fn test_domain_errors() {
        let e = &Ellipsoid::GRS80;
        assert!(matches!(
            utm_to_geographic(f64::NAN, 4474250.0, 30, e),
            Err(ReprojectionError::Domain { .. })
        ));
        assert!(utm_to_geographic(f64::INFINITY, 0.0, 30, e).is_err());
        assert!(utm_to_geographic(-5.0, 4474250.0, 30, e).is_err());
        assert!(utm_to_geographic(440300.0, 1.0e8, 30, e).is_err());
    }
}
