//! Configuration des tables de destination
//!
//! Une entrée par thème de fichier (`building`, `buildingpart`, ...) : nom de
//! la table BigQuery et schéma, dans l'ordre des colonnes du CSV.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};

use crate::table::GEOMETRY_COLUMN;

/// Configuration principale
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(flatten)]
    pub tables: HashMap<String, TableConfig>,
}

/// Configuration d'une table
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TableConfig {
    /// Nom de la table BigQuery cible
    pub table: String,

    /// Colonnes, géométrie en premier
    pub fields: Vec<FieldConfig>,
}

/// Colonne d'une table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FieldConfig {
    /// Nom de l'attribut GML (et de la colonne)
    pub name: String,

    /// Type BigQuery (STRING, INTEGER, FLOAT, BOOLEAN, TIMESTAMP, GEOGRAPHY)
    #[serde(rename = "type", default = "default_type")]
    pub data_type: String,
}

fn default_type() -> String {
    "STRING".to_string()
}

impl TableConfig {
    /// Noms des colonnes, dans l'ordre
    pub fn columns(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

impl Config {
    /// Charge une configuration depuis un fichier
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: Self = serde_json::from_str(&content).context("Failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Charge une configuration depuis un preset embarqué
    pub fn from_preset(preset: &str) -> Result<Self> {
        match preset {
            "inspire" => Self::load_embedded(include_str!("presets/inspire.json")),
            _ => anyhow::bail!("Unknown preset: {}. Use: inspire", preset),
        }
    }

    /// Preset embarqué ou chemin vers un fichier JSON
    pub fn from_preset_or_path(name: &str) -> Result<Self> {
        match name {
            "inspire" => Self::from_preset(name),
            _ => Self::load(Path::new(name)),
        }
    }

    fn load_embedded(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("Failed to parse embedded config")?;
        config.validate()?;
        Ok(config)
    }

    /// Vérifie que chaque table commence par la colonne géométrie
    fn validate(&self) -> Result<()> {
        for (kind, table) in &self.tables {
            match table.fields.first() {
                Some(f) if f.name == GEOMETRY_COLUMN => {}
                _ => anyhow::bail!(
                    "Table '{}' ({}) must start with a '{}' field",
                    table.table,
                    kind,
                    GEOMETRY_COLUMN
                ),
            }
        }
        Ok(())
    }

    /// Récupère la configuration d'une table par thème
    pub fn get_table_config(&self, kind: &str) -> Option<&TableConfig> {
        self.tables.get(kind)
    }

    /// Table de destination d'un fichier, d'après le suffixe de son nom
    pub fn table_for_file(&self, path: &Path) -> Option<&TableConfig> {
        let kind = inspire_gml::parse_file_name(path)?.kind;
        self.get_table_config(&kind)
    }

    /// Thèmes configurés
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}
