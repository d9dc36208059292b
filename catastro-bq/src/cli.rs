//! Définition et implémentation des commandes CLI
//!
//! - `load` : flux ATOM (ou fichiers locaux) → CSV → Cloud Storage → BigQuery
//! - `to-csv` : fichiers locaux → CSV (sans accès au cloud)

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use tracing::info;

use catastro_bq::discovery::{AtomDiscovery, LocalDiscovery, DEFAULT_FEED_URL};
use catastro_bq::export::{http_client, BigQueryLoader, DirectorySink, GcpConfig, GcsUploader};
use catastro_bq::{Config, FileDiscovery, Pipeline, PipelineSettings, RunReport, RunStatus};

#[derive(Subcommand)]
pub enum Commands {
    /// Download cadastre buildings and load them into BigQuery
    Load(LoadArgs),

    /// Convert local GML files or archives to CSV (no cloud access)
    ToCsv(ToCsvArgs),
}

#[derive(Args)]
pub struct LoadArgs {
    /// Territorial office code (two digits, repeatable; default: all offices)
    #[arg(long)]
    pub office: Vec<String>,

    /// Local GML file, zip archive or directory instead of the ATOM feeds (repeatable)
    #[arg(short, long)]
    pub path: Vec<PathBuf>,

    /// Root ATOM feed
    #[arg(long, default_value = DEFAULT_FEED_URL)]
    pub feed: String,

    /// Maximum number of municipalities downloaded
    #[arg(long)]
    pub limit: Option<usize>,

    /// File kind to process (building, buildingpart, otherconstruction; default: all configured)
    #[arg(long)]
    pub kind: Vec<String>,

    /// Config preset name (inspire) or path to a JSON config
    #[arg(long, default_value = "inspire")]
    pub config: String,

    /// Google Cloud project (défaut : env GCP_PROJECT)
    #[arg(long)]
    pub project: Option<String>,

    /// Cloud Storage bucket (défaut : env GCS_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Object name prefix in the bucket (défaut : env GCS_PREFIX)
    #[arg(long)]
    pub prefix: Option<String>,

    /// BigQuery dataset (défaut : env BQ_DATASET)
    #[arg(long)]
    pub dataset: Option<String>,

    /// BigQuery location, e.g. EU (défaut : env BQ_LOCATION)
    #[arg(long)]
    pub location: Option<String>,

    /// Service account key file (défaut : env GOOGLE_APPLICATION_CREDENTIALS, puis gcloud / serveur de métadonnées)
    #[arg(long)]
    pub credentials: Option<PathBuf>,

    /// Fixed OAuth access token, never renewed (défaut : env GOOGLE_OAUTH_ACCESS_TOKEN)
    #[arg(long)]
    pub token: Option<String>,

    /// Rejected rows tolerated per load job (défaut : env BQ_MAX_BAD_RECORDS / 10)
    #[arg(long)]
    pub max_bad_records: Option<u32>,

    /// Load job timeout in seconds
    #[arg(long)]
    pub job_timeout: Option<u64>,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Args)]
pub struct ToCsvArgs {
    /// GML file, zip archive or directory (repeatable)
    #[arg(short, long, required = true)]
    pub path: Vec<PathBuf>,

    /// Output directory for CSV files
    #[arg(short, long)]
    pub output: PathBuf,

    /// File kind to process (default: all configured)
    #[arg(long)]
    pub kind: Vec<String>,

    /// Config preset name (inspire) or path to a JSON config
    #[arg(long, default_value = "inspire")]
    pub config: String,

    #[command(flatten)]
    pub run: RunArgs,
}

/// Options communes aux deux commandes
#[derive(Args)]
pub struct RunArgs {
    /// Staging directory for archives, extracted GML and CSV files
    #[arg(long)]
    pub staging: Option<PathBuf>,

    /// Keep the staging directory content after the run
    #[arg(long)]
    pub keep_staging: bool,

    /// Write the JSON run report to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl RunArgs {
    fn settings(&self) -> PipelineSettings {
        let staging = self
            .staging
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("catastro-bq"));
        let mut settings = PipelineSettings::new(staging);
        settings.keep_staging = self.keep_staging;
        settings
    }
}

/// Exécute la commande load
pub fn cmd_load(args: &LoadArgs) -> Result<RunReport> {
    let config = Config::from_preset_or_path(&args.config)?;
    let kinds = selected_kinds(&config, &args.kind)?;

    let mut gcp = GcpConfig::from_env();
    apply_gcp_overrides(&mut gcp, args);
    gcp.validate()?;

    let project = gcp.project.clone().context("Missing Google Cloud project")?;
    let bucket = gcp.bucket.clone().context("Missing Cloud Storage bucket")?;
    let dataset = gcp.dataset.clone().context("Missing BigQuery dataset")?;

    let client = http_client(Duration::from_secs(600))?;
    let tokens = gcp.token_provider()?;

    let discovery: Box<dyn FileDiscovery> = if args.path.is_empty() {
        info!(feed = %args.feed, offices = ?args.office, "Discovering files from ATOM feeds");
        Box::new(
            AtomDiscovery::new(client.clone(), &args.feed, args.office.clone(), kinds)
                .with_limit(args.limit),
        )
    } else {
        info!(paths = ?args.path, "Using local files");
        Box::new(LocalDiscovery::new(args.path.clone(), kinds))
    };

    let sink = GcsUploader::new(client.clone(), &gcp.storage_url, bucket, tokens.clone());
    let loader = BigQueryLoader::new(client, &gcp.bigquery_url, project, dataset, tokens)
        .with_location(gcp.location.clone())
        .with_max_bad_records(gcp.max_bad_records)
        .with_timeout(gcp.job_timeout);

    let mut settings = args.run.settings();
    settings.object_prefix = gcp.prefix.clone();

    let report = Pipeline::new(config, settings, Box::new(sink))
        .with_loader(Box::new(loader))
        .run(discovery.as_ref())?;

    finish(report, args.run.report.as_deref())
}

/// Exécute la commande to-csv
pub fn cmd_to_csv(args: &ToCsvArgs) -> Result<RunReport> {
    let config = Config::from_preset_or_path(&args.config)?;
    let kinds = selected_kinds(&config, &args.kind)?;

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("Cannot create {}", args.output.display()))?;

    let discovery = LocalDiscovery::new(args.path.clone(), kinds);
    let sink = DirectorySink::new(&args.output);

    let report = Pipeline::new(config, args.run.settings(), Box::new(sink)).run(&discovery)?;

    finish(report, args.run.report.as_deref())
}

/// Affiche et sauvegarde le rapport ; un run sans aucun fichier abouti est une erreur
fn finish(report: RunReport, path: Option<&Path>) -> Result<RunReport> {
    report.display();

    if let Some(path) = path {
        report
            .save_to_file(path)
            .with_context(|| format!("Cannot write report {}", path.display()))?;
        info!(path = %path.display(), "Report saved");
    }

    if report.status == RunStatus::Failed {
        bail!("Run failed: {}", report.summary());
    }

    info!("{}", report.summary());
    Ok(report)
}

/// Thèmes retenus ; chacun doit avoir une table configurée
fn selected_kinds(config: &Config, requested: &[String]) -> Result<Vec<String>> {
    if requested.is_empty() {
        let mut kinds: Vec<String> = config.kinds().map(str::to_string).collect();
        kinds.sort();
        return Ok(kinds);
    }

    for kind in requested {
        if config.get_table_config(kind).is_none() {
            let mut known: Vec<&str> = config.kinds().collect();
            known.sort();
            bail!("No table configured for kind '{}'. Known kinds: {}", kind, known.join(", "));
        }
    }
    Ok(requested.to_vec())
}

fn apply_gcp_overrides(config: &mut GcpConfig, args: &LoadArgs) {
    if let Some(project) = &args.project {
        config.project = Some(project.clone());
    }
    if let Some(bucket) = &args.bucket {
        config.bucket = Some(bucket.clone());
    }
    if let Some(prefix) = &args.prefix {
        config.prefix = prefix.clone();
    }
    if let Some(dataset) = &args.dataset {
        config.dataset = Some(dataset.clone());
    }
    if let Some(location) = &args.location {
        config.location = Some(location.clone());
    }
    if let Some(credentials) = &args.credentials {
        config.credentials = Some(credentials.clone());
    }
    if let Some(token) = &args.token {
        config.access_token = Some(token.clone());
    }
    if let Some(max) = args.max_bad_records {
        config.max_bad_records = max;
    }
    if let Some(secs) = args.job_timeout {
        config.job_timeout = Duration::from_secs(secs);
    }
}
