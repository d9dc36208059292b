//! Transformation d'une feature source en ligne de table
//!
//! La géométrie est validée, reprojetée puis sérialisée en GeoJSON avec
//! geozero ; les attributs sont alignés sur l'en-tête de la table.

use geo::{Coord, Geometry, MultiPolygon, Polygon};
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;

use inspire_gml::{PropertyValue, SourceFeature, SourceGeometry};

use crate::error::FeatureError;
use crate::reproject::Reprojector;
use crate::table::Header;

/// Ligne prête à être écrite
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedRow {
    /// Géométrie en GeoJSON (coordonnées WGS84)
    pub geometry_json: String,
    /// Valeurs dans l'ordre de l'en-tête
    pub values: Vec<PropertyValue>,
    /// Colonnes de l'en-tête absentes de la feature (écrites vides)
    pub padded: usize,
    /// Attributs de la feature absents de l'en-tête (ignorés)
    pub dropped: usize,
}

/// Transforme une feature : reprojection, GeoJSON, alignement des attributs
pub fn transform_feature(
    feature: &SourceFeature,
    reprojector: &Reprojector,
    header: &Header,
) -> Result<TransformedRow, FeatureError> {
    let processing = |reason: String| FeatureError::Processing {
        id: feature.id.clone(),
        reason,
    };

    let geometry = match &feature.geometry {
        SourceGeometry::Polygon(rings) => {
            Geometry::Polygon(build_polygon(rings, reprojector).map_err(processing)?)
        }
        SourceGeometry::MultiPolygon(polygons) => {
            let polygons = polygons
                .iter()
                .map(|rings| build_polygon(rings, reprojector))
                .collect::<Result<Vec<_>, _>>()
                .map_err(processing)?;
            Geometry::MultiPolygon(MultiPolygon::new(polygons))
        }
        SourceGeometry::Unsupported(geometry_type) => {
            return Err(FeatureError::UnsupportedGeometry {
                id: feature.id.clone(),
                geometry_type: geometry_type.clone(),
            });
        }
    };

    let geometry_json = to_geojson(&geometry).map_err(processing)?;
    let aligned = header.align(&feature.properties);

    Ok(TransformedRow {
        geometry_json,
        values: aligned.values,
        padded: aligned.padded,
        dropped: aligned.dropped,
    })
}

/// Valide et reprojette les anneaux d'un polygone (extérieur puis trous)
fn build_polygon(rings: &[Vec<Coord<f64>>], reprojector: &Reprojector) -> Result<Polygon<f64>, String> {
    let Some((exterior, interiors)) = rings.split_first() else {
        return Err("polygon without exterior ring".into());
    };

    let exterior = reproject_ring(exterior, reprojector)?;
    let interiors = interiors
        .iter()
        .map(|ring| reproject_ring(ring, reprojector))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Polygon::new(exterior, interiors))
}

fn reproject_ring(ring: &[Coord<f64>], reprojector: &Reprojector) -> Result<geo::LineString<f64>, String> {
    validate_ring(ring)?;
    reprojector.transform_ring(ring).map_err(|e| e.to_string())
}

/// Un anneau a au moins 4 points et se referme sur son premier point
fn validate_ring(ring: &[Coord<f64>]) -> Result<(), String> {
    if ring.len() < 4 {
        return Err(format!("ring has {} points, at least 4 required", ring.len()));
    }
    if ring.first() != ring.last() {
        return Err("ring is not closed".into());
    }
    Ok(())
}

/// Sérialise une géométrie en GeoJSON via geozero
fn to_geojson(geometry: &Geometry<f64>) -> Result<String, String> {
    let mut buf = Vec::new();
    let mut writer = GeoJsonWriter::new(&mut buf);
    geometry
        .process_geom(&mut writer)
        .map_err(|e| format!("GeoJSON serialization failed: {}", e))?;
    String::from_utf8(buf).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use inspire_gml::Properties;

    fn square(x0: f64, y0: f64, size: f64) -> Vec<Coord<f64>> {
        vec![
            Coord { x: x0, y: y0 },
            Coord { x: x0 + size, y: y0 },
            Coord { x: x0 + size, y: y0 + size },
            Coord { x: x0, y: y0 + size },
            Coord { x: x0, y: y0 },
        ]
    }

    fn feature(id: &str, geometry: SourceGeometry) -> SourceFeature {
        SourceFeature {
            id: id.to_string(),
            feature_type: "Building".into(),
            geometry,
            properties: Properties::from_iter([
                ("gml_id", PropertyValue::String(id.to_string())),
                ("currentUse", PropertyValue::String("1_residential".into())),
                ("numberOfDwellings", PropertyValue::Integer(4)),
            ]),
        }
    }

    fn header() -> Header {
        Header::from_columns(["gml_id", "currentUse", "numberOfDwellings"])
    }

    fn parse(json: &str) -> serde_json::Value {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_polygon_with_hole() {
        let f = feature(
            "a",
            SourceGeometry::Polygon(vec![square(0.0, 0.0, 10.0), square(2.0, 2.0, 2.0)]),
        );
        let row = transform_feature(&f, &Reprojector::Identity, &header()).unwrap();

        let json = parse(&row.geometry_json);
        assert_eq!(json["type"], "Polygon");
        let rings = json["coordinates"].as_array().unwrap();
        assert_eq!(rings.len(), 2);
        assert_eq!(rings[0].as_array().unwrap().len(), 5);
        assert_eq!(rings[0][1][0].as_f64(), Some(10.0));
    }

    #[test]
    fn test_multipolygon_keeps_grouping() {
        let f = feature(
            "b",
            SourceGeometry::MultiPolygon(vec![
                vec![square(0.0, 0.0, 10.0)],
                vec![square(20.0, 0.0, 10.0), square(22.0, 2.0, 2.0)],
            ]),
        );
        let row = transform_feature(&f, &Reprojector::Identity, &header()).unwrap();

        let json = parse(&row.geometry_json);
        assert_eq!(json["type"], "MultiPolygon");
        let polygons = json["coordinates"].as_array().unwrap();
        assert_eq!(polygons.len(), 2);
        assert_eq!(polygons[0].as_array().unwrap().len(), 1);
        assert_eq!(polygons[1].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_madrid_building_reprojected() {
        let f = feature(
            "c",
            SourceGeometry::Polygon(vec![vec![
                Coord { x: 440670.0, y: 4473400.0 },
                Coord { x: 441520.0, y: 4473400.0 },
                Coord { x: 441520.0, y: 4474510.0 },
                Coord { x: 440670.0, y: 4474510.0 },
                Coord { x: 440670.0, y: 4473400.0 },
            ]]),
        );
        let reprojector = Reprojector::for_source(Some(25830)).unwrap();
        let row = transform_feature(&f, &reprojector, &header()).unwrap();

        let json = parse(&row.geometry_json);
        let ring = json["coordinates"][0].as_array().unwrap();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring[0], ring[4]);
        for point in ring {
            let lon = point[0].as_f64().unwrap();
            let lat = point[1].as_f64().unwrap();
            assert!((lon - (-3.70)).abs() < 0.02, "lon={}", lon);
            assert!((lat - 40.41).abs() < 0.02, "lat={}", lat);
        }
    }

    #[test]
    fn test_values_in_header_order() {
        let f = feature("d", SourceGeometry::Polygon(vec![square(0.0, 0.0, 1.0)]));
        let header = Header::from_columns(["numberOfDwellings", "gml_id", "missing"]);
        let row = transform_feature(&f, &Reprojector::Identity, &header).unwrap();

        assert_eq!(
            row.values,
            vec![
                PropertyValue::Integer(4),
                PropertyValue::String("d".into()),
                PropertyValue::Null,
            ]
        );
        assert_eq!(row.padded, 1);
        assert_eq!(row.dropped, 1);
    }

    #[test]
    fn test_unsupported_geometry() {
        let f = feature("e", SourceGeometry::Unsupported("Point".into()));
        let err = transform_feature(&f, &Reprojector::Identity, &header()).unwrap_err();
        assert!(matches!(
            err,
            FeatureError::UnsupportedGeometry { ref geometry_type, .. } if geometry_type == "Point"
        ));
        assert_eq!(err.id(), "e");
    }

    #[test]
    fn test_invalid_rings() {
        let open_ring = vec![
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 1.0, y: 0.0 },
            Coord { x: 1.0, y: 1.0 },
            Coord { x: 0.0, y: 1.0 },
        ];
        let too_short = vec![Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 0.0 }, Coord { x: 0.0, y: 0.0 }];

        for rings in [vec![open_ring], vec![too_short], vec![]] {
            let f = feature("f", SourceGeometry::Polygon(rings));
            let err = transform_feature(&f, &Reprojector::Identity, &header()).unwrap_err();
            assert!(matches!(err, FeatureError::Processing { .. }), "{:?}", err);
        }
    }

    #[test]
    fn test_reprojection_failure_is_processing_error() {
        let f = feature("g", SourceGeometry::Polygon(vec![square(-2.0e6, 0.0, 10.0)]));
        let reprojector = Reprojector::for_source(Some(25830)).unwrap();
        let err = transform_feature(&f, &reprojector, &header()).unwrap_err();
        assert!(matches!(err, FeatureError::Processing { .. }));
    }
}
