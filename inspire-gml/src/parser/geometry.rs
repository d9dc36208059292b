//! Construction des géométries à partir des éléments GML
//!
//! Le builder reçoit les événements situés sous l'élément géométrique racine
//! d'une feature (`gml:Surface`, `gml:MultiSurface`, ...) et regroupe les
//! anneaux par polygone.

use geo::Coord;

use super::crs::epsg_from_srs_name;
use crate::types::{Ring, SourceGeometry};

/// Éléments GML reconnus comme racine de géométrie
const GEOMETRY_ELEMENTS: &[&str] = &[
    "Point",
    "MultiPoint",
    "LineString",
    "Curve",
    "MultiCurve",
    "MultiLineString",
    "Polygon",
    "Surface",
    "PolygonalSurface",
    "MultiSurface",
    "MultiPolygon",
    "CompositeSurface",
    "MultiGeometry",
    "Solid",
];

/// Vrai si le nom local désigne une géométrie GML
pub fn is_geometry_element(local_name: &str) -> bool {
    GEOMETRY_ELEMENTS.contains(&local_name)
}

/// Accumulateur d'une géométrie en cours de lecture
#[derive(Debug)]
pub struct GeometryBuilder {
    kind: String,
    srs_epsg: Option<u32>,
    dimension: usize,
    polygons: Vec<Vec<Ring>>,
    ring: Option<Vec<Coord<f64>>>,
    coord_text: Option<String>,
    coord_element: &'static str,
    error: Option<String>,
}

impl GeometryBuilder {
    /// Démarre une géométrie racine
    pub fn new(kind: &str, srs_name: Option<&str>, srs_dimension: Option<usize>) -> Self {
        // Un gml:Polygon racine n'émet pas d'ouverture de polygone
        let polygons = if kind == "Polygon" {
            vec![Vec::new()]
        } else {
            Vec::new()
        };

        Self {
            kind: kind.to_string(),
            srs_epsg: srs_name.and_then(epsg_from_srs_name),
            dimension: srs_dimension.unwrap_or(2),
            polygons,
            ring: None,
            coord_text: None,
            coord_element: "",
            error: None,
        }
    }

    /// EPSG déclaré sur l'élément racine, s'il y en a un
    pub fn srs_epsg(&self) -> Option<u32> {
        self.srs_epsg
    }

    fn is_areal(&self) -> bool {
        matches!(
            self.kind.as_str(),
            "Polygon" | "Surface" | "PolygonalSurface" | "MultiSurface" | "MultiPolygon" | "CompositeSurface"
        )
    }

    /// Ouverture d'un élément sous la racine
    pub fn start(&mut self, local_name: &str, srs_dimension: Option<usize>) {
        if !self.is_areal() || self.error.is_some() {
            return;
        }

        match local_name {
            "Polygon" | "PolygonPatch" => self.polygons.push(Vec::new()),
            "LinearRing" | "Ring" => self.ring = Some(Vec::new()),
            "posList" | "pos" | "coordinates" => {
                if let Some(dim) = srs_dimension {
                    self.dimension = dim;
                }
                self.coord_element = match local_name {
                    "posList" => "posList",
                    "pos" => "pos",
                    _ => "coordinates",
                };
                self.coord_text = Some(String::new());
            }
            _ => {}
        }
    }

    /// Texte sous l'élément courant
    pub fn text(&mut self, text: &str) {
        if let Some(buf) = self.coord_text.as_mut() {
            if !buf.is_empty() {
                buf.push(' ');
            }
            buf.push_str(text);
        }
    }

    /// Fermeture d'un élément sous la racine
    pub fn end(&mut self, local_name: &str) {
        if !self.is_areal() || self.error.is_some() {
            return;
        }

        match local_name {
            "posList" | "pos" | "coordinates" => {
                let Some(text) = self.coord_text.take() else {
                    return;
                };
                let parsed = if self.coord_element == "coordinates" {
                    parse_coordinates_tuples(&text)
                } else {
                    parse_pos_list(&text, self.dimension)
                };
                match (parsed, self.ring.as_mut()) {
                    (Ok(coords), Some(ring)) => append_segment(ring, coords),
                    (Ok(_), None) => {
                        self.error = Some(format!("<{}> outside of a ring", local_name))
                    }
                    (Err(reason), _) => self.error = Some(reason),
                }
            }
            "LinearRing" | "Ring" => {
                let Some(ring) = self.ring.take() else {
                    return;
                };
                match self.polygons.last_mut() {
                    Some(polygon) => polygon.push(ring),
                    None => self.error = Some("ring outside of a polygon".into()),
                }
            }
            _ => {}
        }
    }

    /// Termine la géométrie
    pub fn finish(self) -> Result<SourceGeometry, String> {
        if let Some(reason) = self.error {
            return Err(reason);
        }

        if !self.is_areal() {
            return Ok(SourceGeometry::Unsupported(self.kind));
        }

        let mut polygons = self.polygons;
        polygons.retain(|p| !p.is_empty());

        match self.kind.as_str() {
            "Polygon" | "Surface" | "PolygonalSurface" => match polygons.len() {
                0 => Err(format!("empty {}", self.kind)),
                1 => Ok(SourceGeometry::Polygon(polygons.remove(0))),
                _ => Ok(SourceGeometry::MultiPolygon(polygons)),
            },
            _ => {
                if polygons.is_empty() {
                    Err(format!("empty {}", self.kind))
                } else {
                    Ok(SourceGeometry::MultiPolygon(polygons))
                }
            }
        }
    }
}

/// Ajoute un segment de coordonnées à un anneau, sans dupliquer le point de jonction
fn append_segment(ring: &mut Vec<Coord<f64>>, coords: Vec<Coord<f64>>) {
    let skip = match (ring.last(), coords.first()) {
        (Some(last), Some(first)) if last == first => 1,
        _ => 0,
    };
    ring.extend(coords.into_iter().skip(skip));
}

/// Parse un `gml:posList` / `gml:pos` : ordonnées séparées par des espaces
pub fn parse_pos_list(text: &str, dimension: usize) -> Result<Vec<Coord<f64>>, String> {
    if dimension < 2 {
        return Err(format!("unsupported srsDimension {}", dimension));
    }

    let values = text
        .split_ascii_whitespace()
        .map(parse_number)
        .collect::<Result<Vec<f64>, String>>()?;

    if values.len() % dimension != 0 {
        return Err(format!(
            "{} ordinates is not a multiple of dimension {}",
            values.len(),
            dimension
        ));
    }

    Ok(values
        .chunks_exact(dimension)
        .map(|c| Coord { x: c[0], y: c[1] })
        .collect())
}

/// Parse un `gml:coordinates` : tuples `x,y` séparés par des espaces
pub fn parse_coordinates_tuples(text: &str) -> Result<Vec<Coord<f64>>, String> {
    text.split_ascii_whitespace()
        .map(|tuple| {
            let mut parts = tuple.split(',');
            match (parts.next(), parts.next()) {
                (Some(x), Some(y)) => Ok(Coord {
                    x: parse_number(x)?,
                    y: parse_number(y)?,
                }),
                _ => Err(format!("invalid coordinate tuple '{}'", tuple)),
            }
        })
        .collect()
}

fn parse_number(token: &str) -> Result<f64, String> {
    fast_float::parse::<f64, _>(token).map_err(|_| format!("invalid ordinate '{}'", token))
}
