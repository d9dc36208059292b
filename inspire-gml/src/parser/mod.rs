//! Lecture en flux des features d'un fichier GML INSPIRE
//!
//! Les features sont les enfants de `wfs:member`, `gml:featureMember` ou
//! `gml:featureMembers`. Le reader est un itérateur : une erreur propre à une
//! feature est émise sans interrompre le flux, une erreur de lecture du
//! document termine l'itération.

pub mod crs;
pub mod geometry;

use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::trace;

use crate::types::{Properties, PropertyValue, SourceFeature};
use crate::GmlError;
use geometry::{is_geometry_element, GeometryBuilder};

/// Éléments enveloppant les features d'une collection
pub(crate) fn is_member_element(local_name: &[u8]) -> bool {
    matches!(local_name, b"member" | b"featureMember" | b"featureMembers")
}

/// Attributs utiles d'un élément
#[derive(Debug, Default)]
struct ElementAttrs {
    id: Option<String>,
    uom: Option<String>,
    href: Option<String>,
    nil: bool,
    srs_name: Option<String>,
    srs_dimension: Option<usize>,
}

fn read_attrs(e: &BytesStart<'_>) -> Result<ElementAttrs, GmlError> {
    let mut attrs = ElementAttrs::default();
    for attr in e.attributes() {
        let attr = attr?;
        match attr.key.local_name().as_ref() {
            b"id" => attrs.id = Some(attr.unescape_value()?.into_owned()),
            b"uom" => attrs.uom = Some(attr.unescape_value()?.into_owned()),
            b"href" => attrs.href = Some(attr.unescape_value()?.into_owned()),
            b"nil" => attrs.nil = attr.unescape_value()? == "true",
            b"srsName" => attrs.srs_name = Some(attr.unescape_value()?.into_owned()),
            b"srsDimension" => attrs.srs_dimension = attr.unescape_value()?.parse().ok(),
            _ => {}
        }
    }
    Ok(attrs)
}

fn local_name_of(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}

/// Élément ouvert à l'intérieur d'une feature
#[derive(Debug)]
struct Frame {
    name: String,
    attrs: ElementAttrs,
    text: String,
    has_children: bool,
}

/// Itérateur sur les features d'un document GML
pub struct FeatureReader<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    file_epsg: Option<u32>,
    member_depth: usize,
    finished: bool,
}

impl<R: BufRead> FeatureReader<R> {
    /// Crée un reader. `file_epsg` est le système détecté pour le fichier
    /// (voir [`crs::detect`]) ; une géométrie déclarant un autre système est rejetée.
    pub fn new(source: R, file_epsg: Option<u32>) -> Self {
        let mut reader = Reader::from_reader(source);
        let config = reader.config_mut();
        config.trim_text(true);
        config.expand_empty_elements = true;

        Self {
            reader,
            buf: Vec::new(),
            file_epsg,
            member_depth: 0,
            finished: false,
        }
    }

    /// EPSG du fichier
    pub fn epsg(&self) -> Option<u32> {
        self.file_epsg
    }

    /// Avance jusqu'à la prochaine feature.
    ///
    /// `Ok(None)` en fin de document ; `Ok(Some(Err(_)))` pour une erreur
    /// locale à une feature ; `Err(_)` pour une erreur fatale.
    fn next_feature(&mut self) -> Result<Option<Result<SourceFeature, GmlError>>, GmlError> {
        loop {
            self.buf.clear();
            let start = match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => {
                    let local = e.local_name();
                    if is_member_element(local.as_ref()) {
                        self.member_depth += 1;
                        None
                    } else if self.member_depth > 0 {
                        Some((local_name_of(local.as_ref()), read_attrs(&e)?))
                    } else {
                        None
                    }
                }
                Event::End(e) => {
                    if is_member_element(e.local_name().as_ref()) {
                        self.member_depth = self.member_depth.saturating_sub(1);
                    }
                    None
                }
                Event::Eof => return Ok(None),
                _ => None,
            };

            if let Some((feature_type, attrs)) = start {
                let id = attrs.id.unwrap_or_default();
                return self.read_feature(id, feature_type).map(Some);
            }
        }
    }

    /// Lit le contenu d'une feature jusqu'à sa balise fermante
    fn read_feature(
        &mut self,
        id: String,
        feature_type: String,
    ) -> Result<Result<SourceFeature, GmlError>, GmlError> {
        let mut properties = Properties::new();
        properties.insert("gml_id", PropertyValue::String(id.clone()));

        let mut stack: Vec<Frame> = Vec::new();
        let mut geometry: Option<(usize, GeometryBuilder)> = None;
        let mut finished_geometry = None;
        let mut feature_error: Option<String> = None;

        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => {
                    let name = local_name_of(e.local_name().as_ref());
                    let attrs = read_attrs(&e)?;

                    if let Some(parent) = stack.last_mut() {
                        parent.has_children = true;
                    }

                    match geometry.as_mut() {
                        Some((_, builder)) => builder.start(&name, attrs.srs_dimension),
                        None if finished_geometry.is_none() && is_geometry_element(&name) => {
                            let builder = GeometryBuilder::new(
                                &name,
                                attrs.srs_name.as_deref(),
                                attrs.srs_dimension,
                            );
                            geometry = Some((stack.len(), builder));
                        }
                        None => {}
                    }

                    stack.push(Frame {
                        name,
                        attrs,
                        text: String::new(),
                        has_children: false,
                    });
                }
                Event::Text(t) => {
                    let text = t.unescape()?;
                    match (geometry.as_mut(), stack.last_mut()) {
                        (Some((_, builder)), _) => builder.text(&text),
                        (None, Some(frame)) => frame.text.push_str(&text),
                        (None, None) => {}
                    }
                }
                Event::CData(c) => {
                    if let (None, Some(frame)) = (geometry.as_ref(), stack.last_mut()) {
                        frame.text.push_str(&String::from_utf8_lossy(&c));
                    }
                }
                Event::End(_) => {
                    let Some(frame) = stack.pop() else {
                        // Fin de la feature
                        break;
                    };

                    match geometry.take() {
                        Some((depth, builder)) if stack.len() == depth => {
                            let checked = check_srs(self.file_epsg, &id, builder.srs_epsg())
                                .and_then(|()| builder.finish());
                            match checked {
                                Ok(g) => finished_geometry = Some(g),
                                Err(reason) => feature_error = Some(reason),
                            }
                        }
                        Some((depth, mut builder)) => {
                            builder.end(&frame.name);
                            geometry = Some((depth, builder));
                        }
                        None => {
                            if !frame.has_children {
                                add_property(&mut properties, frame);
                            }
                        }
                    }
                }
                Event::Eof => {
                    return Err(GmlError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!("unexpected end of document inside feature {}", id),
                    )));
                }
                _ => {}
            }
        }

        if let Some(reason) = feature_error {
            return Ok(Err(GmlError::invalid_geometry(id, reason)));
        }

        let Some(geometry) = finished_geometry else {
            return Ok(Err(GmlError::invalid_geometry(id, "feature has no geometry")));
        };

        trace!(id = %id, geometry = geometry.type_name(), "Feature read");

        Ok(Ok(SourceFeature {
            id,
            feature_type,
            geometry,
            properties,
        }))
    }
}

/// Vérifie que la géométrie est dans le système du fichier
fn check_srs(file_epsg: Option<u32>, id: &str, geometry_epsg: Option<u32>) -> Result<(), String> {
    match (file_epsg, geometry_epsg) {
        (Some(file), Some(geom)) if file != geom => Err(format!(
            "geometry of {} declares EPSG:{} but file is EPSG:{}",
            id, geom, file
        )),
        _ => Ok(()),
    }
}

/// Transforme un élément feuille en attribut(s)
fn add_property(properties: &mut Properties, frame: Frame) {
    let text = frame.text.trim();
    let value = if frame.attrs.nil {
        PropertyValue::Null
    } else if !text.is_empty() {
        PropertyValue::infer(text)
    } else if let Some(href) = frame.attrs.href {
        PropertyValue::String(href)
    } else {
        PropertyValue::Null
    };

    if let Some(uom) = frame.attrs.uom {
        if properties.insert(frame.name.clone(), value) {
            properties.insert(format!("{}_uom", frame.name), PropertyValue::String(uom));
        }
    } else {
        properties.insert(frame.name, value);
    }
}

impl<R: BufRead> Iterator for FeatureReader<R> {
    type Item = Result<SourceFeature, GmlError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.next_feature() {
            Ok(Some(feature)) => Some(feature),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
