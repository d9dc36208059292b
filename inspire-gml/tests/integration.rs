//! Tests d'intégration sur des fichiers GML générés

use std::fs::File;
use std::io::Write;
use std::path::Path;

use inspire_gml::{archive, open, parse_file_name, GmlError, PropertyValue, SourceGeometry};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

fn building(id: &str, geometry: &str) -> String {
    format!(
        r#"  <gml:featureMember>
    <bu-ext2d:Building gml:id="{id}">
      <bu-core2d:beginLifespanVersion>2011-10-24T00:00:00</bu-core2d:beginLifespanVersion>
      <bu-core2d:geometry><bu-core2d:BuildingGeometry><bu-core2d:geometry>{geometry}</bu-core2d:geometry></bu-core2d:BuildingGeometry></bu-core2d:geometry>
      <bu-ext2d:numberOfFloorsAboveGround xsi:nil="true"></bu-ext2d:numberOfFloorsAboveGround>
      <bu-ext2d:officialArea><bu-ext2d:OfficialArea><bu-ext2d:value uom="m2">120</bu-ext2d:value></bu-ext2d:OfficialArea></bu-ext2d:officialArea>
    </bu-ext2d:Building>
  </gml:featureMember>
"#
    )
}

fn surface(srs: &str, pos_list: &str) -> String {
    format!(
        r#"<gml:Surface srsName="{srs}"><gml:patches><gml:PolygonPatch><gml:exterior><gml:LinearRing><gml:posList srsDimension="2">{pos_list}</gml:posList></gml:LinearRing></gml:exterior></gml:PolygonPatch></gml:patches></gml:Surface>"#
    )
}

fn document(members: &[String]) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<gml:FeatureCollection xmlns:gml="http://www.opengis.net/gml/3.2" xmlns:bu-ext2d="http://inspire.jrc.ec.europa.eu/schemas/bu-ext2d/2.0" xmlns:bu-core2d="http://inspire.jrc.ec.europa.eu/schemas/bu-core2d/2.0" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
{}</gml:FeatureCollection>
"#,
        members.concat()
    )
}

fn madrid_document() -> String {
    let srs = "http://www.opengis.net/def/crs/EPSG/0/25830";
    let ring = "440670 4473400 441520 4473400 441520 4474510 440670 4474510 440670 4473400";
    let multi = format!(
        r#"<gml:MultiSurface srsName="{srs}"><gml:surfaceMember>{}</gml:surfaceMember><gml:surfaceMember>{}</gml:surfaceMember></gml:MultiSurface>"#,
        surface(srs, ring),
        surface(srs, ring)
    );
    document(&[
        building("ES.SDGC.BU.1", &surface(srs, ring)),
        building("ES.SDGC.BU.2", &multi),
        building("ES.SDGC.BU.3", &surface(srs, "440670 4473400 441520")),
        building("ES.SDGC.BU.4", &surface(srs, ring)),
    ])
}

fn write_zip(path: &Path, name: &str, content: &str) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    zip.start_file(name, SimpleFileOptions::default()).unwrap();
    zip.write_all(content.as_bytes()).unwrap();
    zip.finish().unwrap();
}

#[test]
fn test_open_extracted_archive() {
    let dir = tempfile::tempdir().unwrap();
    let zip_path = dir.path().join("A.ES.SDGC.BU.28079.zip");
    write_zip(&zip_path, "A.ES.SDGC.BU.28079.building.gml", &madrid_document());

    let files = archive::extract(&zip_path, dir.path()).unwrap();
    assert_eq!(files.len(), 1);

    let name = parse_file_name(&files[0]).unwrap();
    assert_eq!(name.municipality, "28079");
    assert_eq!(name.kind, "building");

    let (epsg, features) = open(&files[0]).unwrap();
    assert_eq!(epsg, Some(25830));

    let items: Vec<_> = features.collect();
    assert_eq!(items.len(), 4);

    let first = items[0].as_ref().unwrap();
    assert_eq!(first.properties.get("gml_id"), Some(&PropertyValue::String("ES.SDGC.BU.1".into())));
    assert_eq!(first.properties.get("numberOfFloorsAboveGround"), Some(&PropertyValue::Null));
    assert_eq!(first.properties.get("value"), Some(&PropertyValue::Integer(120)));
    assert_eq!(first.properties.get("value_uom"), Some(&PropertyValue::String("m2".into())));

    match &items[1].as_ref().unwrap().geometry {
        SourceGeometry::MultiPolygon(polygons) => {
            assert_eq!(polygons.len(), 2);
            assert!(polygons.iter().all(|p| p.len() == 1 && p[0].len() == 5));
        }
        other => panic!("Expected MultiPolygon, got {:?}", other),
    }

    // La feature 3 a un nombre impair d'ordonnées
    let err = items[2].as_ref().unwrap_err();
    assert!(err.is_feature_level());
    assert_eq!(err.entity_id(), Some("ES.SDGC.BU.3"));

    assert_eq!(items[3].as_ref().unwrap().id, "ES.SDGC.BU.4");
}

#[test]
fn test_open_missing_file() {
    let result = open(Path::new("nonexistent.building.gml"));
    assert!(matches!(result, Err(GmlError::Io(_))));
}

#[test]
fn test_open_unknown_crs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("A.ES.SDGC.BU.02001.building.gml");
    std::fs::write(&path, document(&[building("a", &surface("CRS84", "0 0 1 0 1 1 0 0"))])).unwrap();

    assert!(matches!(open(&path), Err(GmlError::UnknownCrs(_))));
}
