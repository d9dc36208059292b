//! Définitions des ellipsoïdes

/// Ellipsoïde de référence, défini par son demi-grand axe et son aplatissement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    /// Demi-grand axe (rayon équatorial) en mètres
    pub a: f64,
    /// Aplatissement
    pub f: f64,
}

impl Ellipsoid {
    /// GRS80 (ETRS89, REGCAN95)
    pub const GRS80: Self = Self {
        a: 6378137.0,
        f: 1.0 / 298.257222101,
    };

    /// WGS84
    pub const WGS84: Self = Self {
        a: 6378137.0,
        f: 1.0 / 298.257223563,
    };

    /// Première excentricité au carré
    pub fn e2(&self) -> f64 {
        2.0 * self.f - self.f * self.f
    }

    /// Deuxième excentricité au carré
    pub fn ep2(&self) -> f64 {
        let e2 = self.e2();
        e2 / (1.0 - e2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excentricities() {
        // sqrt(e2) connu pour WGS84 et GRS80
        assert!((Ellipsoid::WGS84.e2().sqrt() - 0.0818191908426215).abs() < 1e-12);
        assert!((Ellipsoid::GRS80.e2().sqrt() - 0.0818191910428158).abs() < 1e-12);
        assert!(Ellipsoid::GRS80.ep2() > Ellipsoid::GRS80.e2());
    }
}
