//! Extraction des archives de téléchargement (.zip)

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::ZipArchive;

use crate::GmlError;

/// Extrait les fichiers `.gml` d'une archive dans `dest`.
///
/// Les chemins internes sont aplatis : seul le nom de fichier est conservé.
/// Les autres fichiers de l'archive sont ignorés.
///
/// # Returns
///
/// Les chemins des fichiers GML extraits, dans l'ordre de l'archive
///
/// # Errors
///
/// `Archive` si le zip est illisible, `MissingFile` s'il ne contient aucun GML.
pub fn extract(path: &Path, dest: &Path) -> Result<Vec<PathBuf>, GmlError> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;

    let mut extracted = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }

        // Ignorer les chemins suspects (../, absolus)
        let Some(inner) = entry.enclosed_name() else {
            continue;
        };
        let Some(file_name) = inner.file_name() else {
            continue;
        };

        let is_gml = inner
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("gml"));
        if !is_gml {
            continue;
        }

        let target = dest.join(file_name);
        let mut out = File::create(&target)?;
        let bytes = io::copy(&mut entry, &mut out)?;
        debug!(archive = %path.display(), file = %target.display(), bytes, "Extracted");

        extracted.push(target);
    }

    if extracted.is_empty() {
        return Err(GmlError::MissingFile(format!(
            "no .gml file in {}",
            path.display()
        )));
    }

    Ok(extracted)
}
