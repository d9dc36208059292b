//! Chargement des CSV dans BigQuery (jobs de chargement)
//!
//! Un job par fichier : `jobs.insert` puis `jobs.get` jusqu'à l'état `DONE`,
//! puis `tables.get` pour le nombre de lignes de la table.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::TableConfig;
use crate::error::PipelineError;
use crate::pipeline::{LoadSummary, WarehouseLoader};

use super::auth::AccessTokenProvider;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Destination des chargements
#[derive(Clone)]
pub struct BigQueryLoader {
    client: Client,
    base_url: String,
    project: String,
    dataset: String,
    location: Option<String>,
    tokens: Arc<dyn AccessTokenProvider>,
    max_bad_records: u32,
    timeout: Duration,
}

/// Réponse `jobs.insert` / `jobs.get`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Job {
    job_reference: JobReference,
    status: JobStatus,
    #[serde(default)]
    statistics: Option<JobStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatus {
    state: String,
    #[serde(default)]
    error_result: Option<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct JobStatistics {
    #[serde(default)]
    load: Option<LoadStatistics>,
}

/// Les compteurs sont des chaînes (int64 en JSON)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadStatistics {
    #[serde(default)]
    output_rows: Option<String>,
    #[serde(default)]
    bad_records: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Table {
    #[serde(default)]
    num_rows: Option<String>,
}

impl BigQueryLoader {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        project: impl Into<String>,
        dataset: impl Into<String>,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project: project.into(),
            dataset: dataset.into(),
            location: None,
            tokens,
            max_bad_records: 10,
            timeout: Duration::from_secs(600),
        }
    }

    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }

    pub fn with_max_bad_records(mut self, max_bad_records: u32) -> Self {
        self.max_bad_records = max_bad_records;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Corps de la requête `jobs.insert`
    pub fn load_job_request(&self, uri: &str, table: &TableConfig) -> Value {
        let fields: Vec<Value> = table
            .fields
            .iter()
            .map(|f| json!({ "name": f.name, "type": f.data_type }))
            .collect();

        let mut job_reference = json!({ "projectId": self.project });
        if let Some(location) = &self.location {
            job_reference["location"] = json!(location);
        }

        json!({
            "jobReference": job_reference,
            "configuration": {
                "load": {
                    "sourceUris": [uri],
                    "sourceFormat": "CSV",
                    "skipLeadingRows": 1,
                    "allowQuotedNewlines": true,
                    "writeDisposition": "WRITE_APPEND",
                    "createDisposition": "CREATE_IF_NEEDED",
                    "maxBadRecords": self.max_bad_records,
                    "schema": { "fields": fields },
                    "destinationTable": {
                        "projectId": self.project,
                        "datasetId": self.dataset,
                        "tableId": table.table,
                    }
                }
            }
        })
    }

    /// Ajoute un jeton demandé au moment de la requête
    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, String> {
        let token = self.tokens.access_token().map_err(|e| format!("{:#}", e))?;
        Ok(request.bearer_auth(token))
    }

    fn insert_job(&self, body: &Value) -> Result<Job, String> {
        let url = format!("{}/projects/{}/jobs", self.base_url, self.project);
        let response = self
            .authorized(self.client.post(url))?
            .json(body)
            .send()
            .map_err(|e| e.to_string())?;
        parse_response(response)
    }

    fn get_job(&self, job_id: &str, location: Option<&str>) -> Result<Job, String> {
        let url = format!("{}/projects/{}/jobs/{}", self.base_url, self.project, job_id);
        let mut request = self.authorized(self.client.get(url))?;
        if let Some(location) = location {
            request = request.query(&[("location", location)]);
        }
        parse_response(request.send().map_err(|e| e.to_string())?)
    }

    fn table_rows(&self, table: &str) -> Result<Option<u64>, String> {
        let url = format!(
            "{}/projects/{}/datasets/{}/tables/{}",
            self.base_url, self.project, self.dataset, table
        );
        let response = self
            .authorized(self.client.get(url))?
            .send()
            .map_err(|e| e.to_string())?;
        let table: Table = parse_response(response)?;
        Ok(table.num_rows.and_then(|n| n.parse().ok()))
    }

    /// Attend la fin du job, dans la limite du timeout
    fn wait_for(&self, mut job: Job) -> Result<Job, String> {
        let started = Instant::now();
        let location = job
            .job_reference
            .location
            .clone()
            .or_else(|| self.location.clone());

        while job.status.state != "DONE" {
            if started.elapsed() > self.timeout {
                return Err(format!(
                    "job {} still {} after {}s",
                    job.job_reference.job_id,
                    job.status.state,
                    self.timeout.as_secs()
                ));
            }
            thread::sleep(POLL_INTERVAL);
            job = self.get_job(&job.job_reference.job_id, location.as_deref())?;
            debug!(job = %job.job_reference.job_id, state = %job.status.state, "Polling load job");
        }

        Ok(job)
    }
}

impl WarehouseLoader for BigQueryLoader {
    fn load(&self, uri: &str, table: &TableConfig) -> Result<LoadSummary, PipelineError> {
        let load_error = |reason: String| PipelineError::Load {
            file: uri.to_string(),
            reason,
        };

        let request = self.load_job_request(uri, table);
        let job = self.insert_job(&request).map_err(load_error)?;
        info!(job = %job.job_reference.job_id, table = %table.table, "Load job submitted");

        let job = self.wait_for(job).map_err(load_error)?;
        let mut summary = job_summary(&job).map_err(load_error)?;

        summary.table_rows = self.table_rows(&table.table).map_err(load_error)?;
        Ok(summary)
    }
}

/// Résultat d'un job terminé ; `errorResult` en fait un échec
fn job_summary(job: &Job) -> Result<LoadSummary, String> {
    if let Some(error) = &job.status.error_result {
        return Err(format!(
            "job {} failed ({}): {}",
            job.job_reference.job_id, error.reason, error.message
        ));
    }

    let load = job.statistics.as_ref().and_then(|s| s.load.as_ref());
    let count = |value: Option<&String>| value.and_then(|v| v.parse().ok()).unwrap_or(0);

    Ok(LoadSummary {
        job_id: job.job_reference.job_id.clone(),
        output_rows: count(load.and_then(|l| l.output_rows.as_ref())),
        bad_records: count(load.and_then(|l| l.bad_records.as_ref())),
        table_rows: None,
    })
}

fn parse_response<T: for<'de> Deserialize<'de>>(response: reqwest::blocking::Response) -> Result<T, String> {
    let status = response.status();
    let body = response.text().map_err(|e| e.to_string())?;
    if !status.is_success() {
        return Err(format!("HTTP {}: {}", status, body.trim()));
    }
    serde_json::from_str(&body).map_err(|e| format!("unexpected response: {}", e))
}
