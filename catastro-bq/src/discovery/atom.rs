//! Lecture des flux ATOM du cadastre
//!
//! Le flux racine liste les délégations territoriales, chaque flux de
//! délégation liste les archives des communes. Seuls `id`, `title` et le lien
//! `enclosure` sont lus.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::PipelineError;

/// Entrée d'un flux ATOM
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub id: String,
    pub title: String,
    /// `href` du lien `rel="enclosure"`
    pub enclosure: Option<String>,
}

impl FeedEntry {
    /// URL à suivre : lien `enclosure`, sinon l'identifiant
    pub fn url(&self) -> &str {
        self.enclosure.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    Title,
}

/// Parse un flux ATOM ; une ou plusieurs entrées
pub fn parse_feed(data: &[u8]) -> Result<Vec<FeedEntry>, PipelineError> {
    let mut reader = Reader::from_reader(data);
    reader.config_mut().trim_text(true);
    reader.config_mut().expand_empty_elements = true;

    let mut buf = Vec::new();
    let mut entries = Vec::new();
    let mut current: Option<FeedEntry> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"entry" => current = Some(FeedEntry::default()),
                b"id" if current.is_some() => field = Some(Field::Id),
                b"title" if current.is_some() => field = Some(Field::Title),
                b"link" => {
                    if let Some(entry) = current.as_mut() {
                        if let Some(href) = enclosure_href(&e)? {
                            entry.enclosure = Some(href);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    let text = t.unescape().map_err(feed_error)?;
                    match f {
                        Field::Id => entry.id.push_str(&text),
                        Field::Title => entry.title.push_str(&text),
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"entry" => {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                }
                b"id" | b"title" => field = None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(feed_error(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}

fn enclosure_href(e: &BytesStart<'_>) -> Result<Option<String>, PipelineError> {
    let mut rel = None;
    let mut href = None;
    for attr in e.attributes() {
        let attr = attr.map_err(feed_error)?;
        let value = attr.unescape_value().map_err(feed_error)?.into_owned();
        match attr.key.local_name().as_ref() {
            b"rel" => rel = Some(value),
            b"href" => href = Some(value),
            _ => {}
        }
    }
    Ok(match rel.as_deref() {
        Some("enclosure") => href,
        _ => None,
    })
}

fn feed_error(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Discovery(format!("invalid ATOM feed: {}", e))
}
