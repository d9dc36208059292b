//! Types de données pour le crate inspire-gml

use std::fmt;

use geo::Coord;

/// Anneau fermé (premier point == dernier point)
pub type Ring = Vec<Coord<f64>>;

/// Une feature INSPIRE lue depuis le fichier source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFeature {
    /// Identifiant `gml:id` de la feature
    pub id: String,

    /// Nom local de l'élément (ex: "Building", "BuildingPart")
    pub feature_type: String,

    /// Géométrie dans le système de référence du fichier
    pub geometry: SourceGeometry,

    /// Attributs, dans l'ordre du document
    pub properties: Properties,
}

/// Géométrie source, avec les anneaux dans le système du fichier
#[derive(Debug, Clone, PartialEq)]
pub enum SourceGeometry {
    /// Anneau extérieur suivi des éventuels trous
    Polygon(Vec<Ring>),
    /// Liste de polygones, chacun étant une liste d'anneaux
    MultiPolygon(Vec<Vec<Ring>>),
    /// Tout autre type GML (le nom de l'élément est conservé)
    Unsupported(String),
}

impl SourceGeometry {
    /// Nom du type de géométrie, pour les logs
    pub fn type_name(&self) -> &str {
        match self {
            Self::Polygon(_) => "Polygon",
            Self::MultiPolygon(_) => "MultiPolygon",
            Self::Unsupported(name) => name,
        }
    }
}

/// Valeur scalaire d'un attribut
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Null,
}

impl PropertyValue {
    /// Type la valeur textuelle d'un élément GML.
    ///
    /// - `true` / `false` → booléen
    /// - entier canonique (`42`, `-3`) → entier ; `007` reste une chaîne
    /// - décimal simple (`0.1`, `12.50`) → flottant
    /// - sinon → chaîne
    pub fn infer(raw: &str) -> Self {
        match raw {
            "true" => return Self::Boolean(true),
            "false" => return Self::Boolean(false),
            _ => {}
        }

        if let Ok(n) = raw.parse::<i64>() {
            if n.to_string() == raw {
                return Self::Integer(n);
            }
        }

        if is_plain_decimal(raw) {
            if let Ok(f) = raw.parse::<f64>() {
                if f.is_finite() {
                    return Self::Float(f);
                }
            }
        }

        Self::String(raw.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// `-?(0|[1-9][0-9]*)\.[0-9]+`
fn is_plain_decimal(raw: &str) -> bool {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    let Some((int_part, frac_part)) = digits.split_once('.') else {
        return false;
    };

    let int_ok = !int_part.is_empty()
        && int_part.bytes().all(|b| b.is_ascii_digit())
        && (int_part == "0" || !int_part.starts_with('0'));
    let frac_ok = !frac_part.is_empty() && frac_part.bytes().all(|b| b.is_ascii_digit());

    int_ok && frac_ok
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Float(x) => write!(f, "{}", x),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Null => Ok(()),
        }
    }
}

/// Attributs ordonnés d'une feature (ordre d'apparition dans le document)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties(Vec<(String, PropertyValue)>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ajoute un attribut. La première occurrence d'un nom est conservée ;
    /// retourne `false` si le nom existait déjà.
    pub fn insert(&mut self, name: impl Into<String>, value: PropertyValue) -> bool {
        let name = name.into();
        if self.contains_key(&name) {
            return false;
        }
        self.0.push((name, value));
        true
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.0.iter().any(|(k, _)| k == name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &PropertyValue> {
        self.0.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, PropertyValue)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, PropertyValue)>>(iter: I) -> Self {
        let mut props = Self::new();
        for (k, v) in iter {
            props.insert(k, v);
        }
        props
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_scalars() {
        assert_eq!(PropertyValue::infer("true"), PropertyValue::Boolean(true));
        assert_eq!(PropertyValue::infer("false"), PropertyValue::Boolean(false));
        assert_eq!(PropertyValue::infer("4"), PropertyValue::Integer(4));
        assert_eq!(PropertyValue::infer("-12"), PropertyValue::Integer(-12));
        assert_eq!(PropertyValue::infer("0.1"), PropertyValue::Float(0.1));
        assert_eq!(PropertyValue::infer("123.50"), PropertyValue::Float(123.5));
    }

    #[test]
    fn test_infer_keeps_identifiers_as_strings() {
        // Références cadastrales et codes à zéros initiaux
        assert_eq!(
            PropertyValue::infer("000100100VK48E"),
            PropertyValue::String("000100100VK48E".into())
        );
        assert_eq!(PropertyValue::infer("007"), PropertyValue::String("007".into()));
        assert_eq!(PropertyValue::infer("01.5"), PropertyValue::String("01.5".into()));
        assert_eq!(PropertyValue::infer("1e5"), PropertyValue::String("1e5".into()));
        assert_eq!(
            PropertyValue::infer("2011-10-24T00:00:00"),
            PropertyValue::String("2011-10-24T00:00:00".into())
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(PropertyValue::Null.to_string(), "");
        assert_eq!(PropertyValue::Boolean(true).to_string(), "true");
        assert_eq!(PropertyValue::Float(0.1).to_string(), "0.1");
        assert_eq!(PropertyValue::Integer(42).to_string(), "42");
    }

    #[test]
    fn test_properties_keep_first_and_order() {
        let mut props = Properties::new();
        assert!(props.insert("b", PropertyValue::Integer(1)));
        assert!(props.insert("a", PropertyValue::Integer(2)));
        assert!(!props.insert("b", PropertyValue::Integer(3)));

        assert_eq!(props.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(props.get("b"), Some(&PropertyValue::Integer(1)));
        assert_eq!(props.len(), 2);
    }
}
