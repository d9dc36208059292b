//! Écriture d'un fichier source en table CSV
//!
//! Une table par fichier source : une ligne d'en-tête (`geom` puis les noms
//! d'attributs) suivie d'une ligne par feature transformée. Une feature en
//! erreur est journalisée et ignorée ; seule une erreur de lecture du fichier
//! abandonne la table.

use std::path::{Path, PathBuf};

use csv::{StringRecord, Terminator, WriterBuilder};
use serde::Serialize;
use tracing::{debug, info, warn};

use inspire_gml::{GmlError, Properties, PropertyValue, SourceFeature};

use crate::error::PipelineError;
use crate::reproject::Reprojector;
use crate::transform::transform_feature;

/// Nom de la colonne géométrie
pub const GEOMETRY_COLUMN: &str = "geom";

/// Noms d'attributs d'une table, dans l'ordre des colonnes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    attributes: Vec<String>,
}

/// Valeurs d'une feature alignées sur un en-tête
#[derive(Debug, Clone, PartialEq)]
pub struct Aligned {
    pub values: Vec<PropertyValue>,
    /// Colonnes sans valeur dans la feature
    pub padded: usize,
    /// Attributs de la feature hors en-tête
    pub dropped: usize,
}

impl Header {
    /// En-tête dérivé des attributs d'une feature
    pub fn from_properties(properties: &Properties) -> Self {
        Self {
            attributes: properties.keys().map(str::to_string).collect(),
        }
    }

    /// En-tête à partir d'une liste de colonnes (la colonne géométrie est ignorée)
    pub fn from_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attributes: columns
                .into_iter()
                .map(Into::into)
                .filter(|c| c != GEOMETRY_COLUMN)
                .collect(),
        }
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Nombre d'attributs (hors géométrie)
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Colonnes complètes : géométrie puis attributs
    pub fn columns(&self) -> Vec<String> {
        std::iter::once(GEOMETRY_COLUMN.to_string())
            .chain(self.attributes.iter().cloned())
            .collect()
    }

    /// Aligne les attributs d'une feature sur l'en-tête.
    ///
    /// Les valeurs sont prises par nom ; une colonne absente vaut `Null`, un
    /// attribut hors en-tête est ignoré.
    pub fn align(&self, properties: &Properties) -> Aligned {
        let mut padded = 0;
        let values = self
            .attributes
            .iter()
            .map(|name| match properties.get(name) {
                Some(value) => value.clone(),
                None => {
                    padded += 1;
                    PropertyValue::Null
                }
            })
            .collect();

        let dropped = properties
            .keys()
            .filter(|k| !self.attributes.iter().any(|a| a == k))
            .count();

        Aligned {
            values,
            padded,
            dropped,
        }
    }
}

/// Feature ignorée lors de l'écriture
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureFailure {
    pub id: String,
    pub geometry_type: Option<String>,
    pub reason: String,
}

/// Table produite pour un fichier source
#[derive(Debug, Clone)]
pub struct TableArtifact {
    /// Chemin du CSV
    pub path: PathBuf,
    /// Colonnes écrites (vide si aucun en-tête n'a pu être établi)
    pub header: Vec<String>,
    /// Nombre de lignes de données
    pub rows: usize,
    /// Lignes réordonnées ou complétées pour suivre l'en-tête
    pub realigned_rows: usize,
    /// Features ignorées
    pub failures: Vec<FeatureFailure>,
}

/// Écrivain de tables CSV
#[derive(Debug, Clone, Default)]
pub struct TableWriter {
    prototype: Option<Header>,
}

impl TableWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixe l'en-tête à l'avance (colonnes de la table de destination)
    pub fn with_prototype<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prototype = Some(Header::from_columns(columns));
        self
    }

    /// Écrit les features d'un fichier dans `output`.
    ///
    /// `label` identifie le fichier source dans les logs et les erreurs.
    ///
    /// # Errors
    ///
    /// - `Reprojection` si aucune transformation n'existe pour `source_epsg`
    /// - `ArtifactWrite` si le CSV ne peut pas être écrit
    /// - `FileRead` si le flux de features rencontre une erreur fatale ; le CSV
    ///   partiel est alors supprimé
    pub fn write<I>(
        &self,
        label: &str,
        source_epsg: Option<u32>,
        features: I,
        output: &Path,
    ) -> Result<TableArtifact, PipelineError>
    where
        I: IntoIterator<Item = Result<SourceFeature, GmlError>>,
    {
        let reprojector =
            Reprojector::for_source(source_epsg).map_err(|source| PipelineError::Reprojection {
                file: label.to_string(),
                source,
            })?;

        debug!(file = label, epsg = ?source_epsg, reprojector = reprojector.description(), "Writing table");

        let mut writer = WriterBuilder::new()
            .terminator(Terminator::Any(b'\n'))
            .from_path(output)
            .map_err(|e| write_error(label, e))?;

        let mut state = WriteState::new(self.prototype.clone());

        let result = state.run(label, &reprojector, features, &mut writer);
        let result = result.and_then(|()| writer.flush().map_err(|e| write_error(label, e)));

        if let Err(e) = result {
            drop(writer);
            if let Err(rm) = std::fs::remove_file(output) {
                debug!(file = %output.display(), error = %rm, "Failed to remove partial artifact");
            }
            return Err(e);
        }

        if state.dropped_values > 0 || state.realigned_rows > 0 {
            warn!(
                file = label,
                realigned_rows = state.realigned_rows,
                dropped_values = state.dropped_values,
                "Rows realigned to header"
            );
        }

        info!(
            file = label,
            rows = state.rows,
            failed = state.failures.len(),
            "Table written"
        );

        Ok(TableArtifact {
            path: output.to_path_buf(),
            header: state.header.map(|h| h.columns()).unwrap_or_default(),
            rows: state.rows,
            realigned_rows: state.realigned_rows,
            failures: state.failures,
        })
    }
}

/// État d'écriture d'une table
struct WriteState {
    header: Option<Header>,
    header_written: bool,
    rows: usize,
    realigned_rows: usize,
    dropped_values: usize,
    failures: Vec<FeatureFailure>,
}

impl WriteState {
    fn new(prototype: Option<Header>) -> Self {
        Self {
            header: prototype,
            header_written: false,
            rows: 0,
            realigned_rows: 0,
            dropped_values: 0,
            failures: Vec::new(),
        }
    }

    fn run<I, W>(
        &mut self,
        label: &str,
        reprojector: &Reprojector,
        features: I,
        writer: &mut csv::Writer<W>,
    ) -> Result<(), PipelineError>
    where
        I: IntoIterator<Item = Result<SourceFeature, GmlError>>,
        W: std::io::Write,
    {
        if self.header.is_some() {
            self.write_header(label, writer)?;
        }

        for item in features {
            let feature = match item {
                Ok(feature) => feature,
                Err(e) if e.is_feature_level() => {
                    let id = e.entity_id().unwrap_or_default().to_string();
                    warn!(file = label, id = %id, error = %e, "Skipping feature");
                    self.failures.push(FeatureFailure {
                        id,
                        geometry_type: None,
                        reason: e.to_string(),
                    });
                    continue;
                }
                Err(source) => {
                    return Err(PipelineError::FileRead {
                        file: label.to_string(),
                        source,
                    });
                }
            };

            if self.header.is_none() {
                self.header = Some(Header::from_properties(&feature.properties));
                self.write_header(label, writer)?;
            }
            let Some(header) = self.header.as_ref() else {
                continue;
            };

            match transform_feature(&feature, reprojector, header) {
                Ok(row) => {
                    if row.padded > 0 || row.dropped > 0 {
                        debug!(
                            file = label,
                            id = %feature.id,
                            padded = row.padded,
                            dropped = row.dropped,
                            "Feature attributes differ from header"
                        );
                        self.realigned_rows += 1;
                        self.dropped_values += row.dropped;
                    }

                    let mut record = StringRecord::with_capacity(
                        row.geometry_json.len(),
                        row.values.len() + 1,
                    );
                    record.push_field(&row.geometry_json);
                    for value in &row.values {
                        record.push_field(&value.to_string());
                    }
                    writer
                        .write_record(&record)
                        .map_err(|e| write_error(label, e))?;
                    self.rows += 1;
                }
                Err(e) => {
                    let geometry_type = feature.geometry.type_name().to_string();
                    warn!(
                        file = label,
                        id = %feature.id,
                        geometry = %geometry_type,
                        error = %e,
                        "Skipping feature"
                    );
                    self.failures.push(FeatureFailure {
                        id: feature.id.clone(),
                        geometry_type: Some(geometry_type),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    fn write_header<W: std::io::Write>(
        &mut self,
        label: &str,
        writer: &mut csv::Writer<W>,
    ) -> Result<(), PipelineError> {
        if self.header_written {
            return Ok(());
        }
        if let Some(header) = &self.header {
            writer
                .write_record(header.columns())
                .map_err(|e| write_error(label, e))?;
            self.header_written = true;
        }
        Ok(())
    }
}

fn write_error(label: &str, e: impl std::fmt::Display) -> PipelineError {
    PipelineError::ArtifactWrite {
        file: label.to_string(),
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Coord;
    use inspire_gml::SourceGeometry;

    fn square() -> Vec<Coord<f64>> {
        vec![
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 1.0, y: 0.0 },
            Coord { x: 1.0, y: 1.0 },
            Coord { x: 0.0, y: 1.0 },
            Coord { x: 0.0, y: 0.0 },
        ]
    }

    fn feature(id: &str, geometry: SourceGeometry, props: &[(&str, PropertyValue)]) -> SourceFeature {
        SourceFeature {
            id: id.to_string(),
            feature_type: "Building".into(),
            geometry,
            properties: props.iter().cloned().collect(),
        }
    }

    fn building(id: &str) -> SourceFeature {
        feature(
            id,
            SourceGeometry::Polygon(vec![square()]),
            &[
                ("gml_id", PropertyValue::String(id.to_string())),
                ("value", PropertyValue::Integer(120)),
                ("endLifespanVersion", PropertyValue::Null),
            ],
        )
    }

    fn read_csv(path: &Path) -> Vec<Vec<String>> {
        csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .unwrap()
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn test_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("a.csv");

        let features = vec![Ok(building("b1")), Ok(building("b2"))];
        let artifact = TableWriter::new().write("a.gml", None, features, &out).unwrap();

        assert_eq!(artifact.rows, 2);
        assert_eq!(artifact.header, vec!["geom", "gml_id", "value", "endLifespanVersion"]);

        let records = read_csv(&out);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], artifact.header);
        assert!(records.iter().all(|r| r.len() == 4));
        assert_eq!(records[1][1], "b1");
        assert_eq!(records[1][2], "120");
        assert_eq!(records[1][3], "");
        assert!(records[1][0].contains("\"Polygon\""));

        let raw = std::fs::read_to_string(&out).unwrap();
        assert!(!raw.contains('\r'));
        assert!(raw.starts_with("geom,gml_id,value,endLifespanVersion\n"));
    }

    #[test]
    fn test_unsupported_feature_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("a.csv");

        let mut features: Vec<Result<SourceFeature, GmlError>> =
            (1..=10).map(|i| Ok(building(&format!("b{}", i)))).collect();
        features[3] = Ok(feature("b4", SourceGeometry::Unsupported("Point".into()), &[]));

        let artifact = TableWriter::new().write("a.gml", None, features, &out).unwrap();

        assert_eq!(artifact.rows, 9);
        assert_eq!(artifact.failures.len(), 1);
        assert_eq!(artifact.failures[0].id, "b4");
        assert_eq!(artifact.failures[0].geometry_type.as_deref(), Some("Point"));
        assert_eq!(read_csv(&out).len(), 10);
    }

    #[test]
    fn test_all_features_failed_yields_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("a.csv");

        let features = vec![
            Ok(feature(
                "p1",
                SourceGeometry::Unsupported("Point".into()),
                &[("gml_id", PropertyValue::String("p1".into()))],
            )),
            Err(GmlError::invalid_geometry("p2", "odd ordinate count")),
        ];
        let artifact = TableWriter::new().write("a.gml", None, features, &out).unwrap();

        assert_eq!(artifact.rows, 0);
        assert_eq!(artifact.failures.len(), 2);
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "geom,gml_id\n");
    }

    #[test]
    fn test_zero_features() {
        let dir = tempfile::tempdir().unwrap();

        let out = dir.path().join("empty.csv");
        let artifact = TableWriter::new()
            .write("empty.gml", None, Vec::new(), &out)
            .unwrap();
        assert!(artifact.header.is_empty());
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "");

        let out = dir.path().join("proto.csv");
        let artifact = TableWriter::new()
            .with_prototype(["geom", "gml_id", "value"])
            .write("empty.gml", None, Vec::new(), &out)
            .unwrap();
        assert_eq!(artifact.rows, 0);
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "geom,gml_id,value\n");
    }

    #[test]
    fn test_mismatched_properties_are_realigned() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("a.csv");

        let second = feature(
            "b2",
            SourceGeometry::Polygon(vec![square()]),
            &[
                ("value", PropertyValue::Integer(7)),
                ("gml_id", PropertyValue::String("b2".into())),
                ("extra", PropertyValue::Boolean(true)),
            ],
        );
        let artifact = TableWriter::new()
            .write("a.gml", None, vec![Ok(building("b1")), Ok(second)], &out)
            .unwrap();

        assert_eq!(artifact.rows, 2);
        assert_eq!(artifact.realigned_rows, 1);

        let records = read_csv(&out);
        assert_eq!(records[2][1..], ["b2", "7", ""]);
    }

    #[test]
    fn test_prototype_orders_columns() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("a.csv");

        let artifact = TableWriter::new()
            .with_prototype(["geom", "value", "gml_id"])
            .write("a.gml", None, vec![Ok(building("b1"))], &out)
            .unwrap();

        assert_eq!(artifact.header, vec!["geom", "value", "gml_id"]);
        assert_eq!(read_csv(&out)[1][1..], ["120", "b1"]);
    }

    #[test]
    fn test_fatal_stream_error_removes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("a.csv");

        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated");
        let features = vec![Ok(building("b1")), Err(GmlError::Io(io))];
        let err = TableWriter::new()
            .write("a.gml", None, features, &out)
            .unwrap_err();

        assert!(matches!(err, PipelineError::FileRead { .. }));
        assert!(!out.exists());
    }

    #[cfg(not(feature = "reproject"))]
    #[test]
    fn test_unsupported_crs_aborts_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("a.csv");

        let err = TableWriter::new()
            .write("a.gml", Some(23030), vec![Ok(building("b1"))], &out)
            .unwrap_err();

        assert!(matches!(err, PipelineError::Reprojection { .. }));
        assert!(!out.exists());
    }

    #[test]
    fn test_header_align() {
        let header = Header::from_columns(["geom", "a", "b"]);
        assert_eq!(header.len(), 2);

        let props: Properties = [("b", PropertyValue::Integer(1)), ("c", PropertyValue::Null)]
            .into_iter()
            .collect();
        let aligned = header.align(&props);
        assert_eq!(aligned.values, vec![PropertyValue::Null, PropertyValue::Integer(1)]);
        assert_eq!(aligned.padded, 1);
        assert_eq!(aligned.dropped, 1);
    }
}
