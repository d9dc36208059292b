//! # inspire-gml
//!
//! Lecteur en flux pour les fichiers GML INSPIRE Buildings publiés par le
//! cadastre espagnol (Dirección General del Catastro).
//!
//! ## Features
//!
//! - Lecture en flux avec `quick-xml` : une feature à la fois, mémoire constante
//! - Détection du système de référence (`srsName`) du fichier
//! - Géométries surfaciques (`Surface`, `Polygon`, `MultiSurface`) en types `geo`
//! - Attributs typés, dans l'ordre du document
//! - Extraction des fichiers GML depuis les archives zip de téléchargement
//!
//! ## Usage
//!
//! ```rust,ignore
//! use inspire_gml::open;
//! use std::path::Path;
//!
//! let (epsg, features) = open(Path::new("A.ES.SDGC.BU.02001.building.gml"))?;
//! println!("EPSG: {:?}", epsg);
//!
//! for feature in features {
//!     match feature {
//!         Ok(f) => println!("{}: {}", f.id, f.geometry.type_name()),
//!         Err(e) if e.is_feature_level() => eprintln!("skipped: {}", e),
//!         Err(e) => return Err(e),
//!     }
//! }
//! ```

pub mod archive;
pub mod error;
pub mod parser;
pub mod types;

pub use error::GmlError;
pub use parser::FeatureReader;
pub use types::{Properties, PropertyValue, Ring, SourceFeature, SourceGeometry};

use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;

/// Identifiant d'un fichier de téléchargement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileName {
    /// Code INE de la commune (5 chiffres)
    pub municipality: String,
    /// Thème du fichier (ex: "building", "buildingpart", "otherconstruction")
    pub kind: String,
}

/// Extrait la commune et le thème depuis le nom de fichier
/// Format attendu: A.ES.SDGC.BU.MMMMM.<kind>.gml (ou .zip sans thème)
pub fn parse_file_name(path: &Path) -> Option<FileName> {
    let name = path.file_name()?.to_str()?;
    let base = name
        .strip_suffix(".gml")
        .or_else(|| name.strip_suffix(".zip"))
        .unwrap_or(name);

    let pos = base.find("ES.SDGC.")?;
    let mut parts = base[pos..].split('.').skip(3);

    let municipality = parts.next()?;
    if municipality.len() != 5 || !municipality.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let kind = parts.next().unwrap_or("").to_ascii_lowercase();

    Some(FileName {
        municipality: municipality.to_string(),
        kind,
    })
}

/// Ouvre un fichier GML et retourne le système détecté et le flux de features.
///
/// Le fichier est lu deux fois : un pré-scan jusqu'au premier `srsName`, puis
/// la lecture des features.
///
/// # Errors
///
/// Retourne `GmlError` si le fichier est illisible, si le document est mal
/// formé avant le premier `srsName`, ou si le système de référence est inconnu.
pub fn open(path: &Path) -> Result<(Option<u32>, FeatureReader<BufReader<File>>), GmlError> {
    let scan = parser::crs::detect(BufReader::new(File::open(path)?))?;
    let reader = FeatureReader::new(BufReader::new(File::open(path)?), scan.epsg);
    Ok((scan.epsg, reader))
}

/// Comme [`open`], pour un document déjà en mémoire
pub fn from_bytes(data: &[u8]) -> Result<(Option<u32>, FeatureReader<Cursor<&[u8]>>), GmlError> {
    let scan = parser::crs::detect(data)?;
    Ok((scan.epsg, FeatureReader::new(Cursor::new(data), scan.epsg)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_name() {
        assert_eq!(
            parse_file_name(Path::new("tmp/A.ES.SDGC.BU.02001.building.gml")),
            Some(FileName {
                municipality: "02001".into(),
                kind: "building".into()
            })
        );
        assert_eq!(
            parse_file_name(Path::new("A.ES.SDGC.BU.28079.buildingpart.gml"))
                .map(|f| f.kind),
            Some("buildingpart".to_string())
        );
        assert_eq!(
            parse_file_name(Path::new("A.ES.SDGC.BU.02001.zip")),
            Some(FileName {
                municipality: "02001".into(),
                kind: String::new()
            })
        );
        assert_eq!(parse_file_name(Path::new("fichier-invalide.gml")), None);
        assert_eq!(parse_file_name(Path::new("A.ES.SDGC.BU.2001.building.gml")), None);
    }

    #[test]
    fn test_from_bytes_empty_collection() {
        let (epsg, mut features) =
            from_bytes(br#"<FeatureCollection numberMatched="0"/>"#).unwrap();
        assert_eq!(epsg, None);
        assert!(features.next().is_none());
    }
}
