//! Détection du système de référence (attribut `srsName`)

use std::io::BufRead;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::GmlError;

/// Extrait le code EPSG d'un `srsName` GML.
///
/// Formes reconnues :
/// - `EPSG:25830`
/// - `urn:ogc:def:crs:EPSG::25830` (et `urn:ogc:def:crs:EPSG:6.6:25830`)
/// - `http://www.opengis.net/def/crs/EPSG/0/25830`
/// - `http://www.opengis.net/gml/srs/epsg.xml#25830`
pub fn epsg_from_srs_name(srs_name: &str) -> Option<u32> {
    let srs = srs_name.trim();
    if !srs.to_ascii_uppercase().contains("EPSG") {
        return None;
    }

    let code = srs.rsplit([':', '/', '#']).next()?;
    if code.is_empty() || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    code.parse().ok()
}

/// Résultat du pré-scan d'un fichier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrsScan {
    /// EPSG du premier `srsName` rencontré
    pub epsg: Option<u32>,
    /// Le document contient-il au moins un membre de collection
    pub has_members: bool,
}

/// Parcourt le document jusqu'au premier `srsName`.
///
/// Retourne `UnknownCrs` si un `srsName` est présent mais illisible, ou si le
/// fichier contient des features sans aucun `srsName`.
pub fn detect<R: BufRead>(source: R) -> Result<CrsScan, GmlError> {
    let mut reader = Reader::from_reader(source);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut has_members = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => {
                if super::is_member_element(e.local_name().as_ref()) {
                    has_members = true;
                }
                for attr in e.attributes() {
                    let attr = attr?;
                    if attr.key.local_name().as_ref() == b"srsName" {
                        let value = attr.unescape_value()?;
                        return match epsg_from_srs_name(&value) {
                            Some(epsg) => Ok(CrsScan {
                                epsg: Some(epsg),
                                has_members,
                            }),
                            None => Err(GmlError::UnknownCrs(value.into_owned())),
                        };
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if has_members {
        return Err(GmlError::UnknownCrs(
            "features found but no srsName in document".into(),
        ));
    }

    Ok(CrsScan {
        epsg: None,
        has_members,
    })
}
