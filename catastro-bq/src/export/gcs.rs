//! Dépôt des CSV dans Cloud Storage (API JSON, upload simple)

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use reqwest::blocking::{Body, Client, RequestBuilder};
use tracing::debug;

use crate::error::PipelineError;
use crate::pipeline::ArtifactSink;

use super::auth::AccessTokenProvider;

/// Dépôt dans un bucket GCS
#[derive(Clone)]
pub struct GcsUploader {
    client: Client,
    base_url: String,
    bucket: String,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl GcsUploader {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        bucket: impl Into<String>,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            bucket: bucket.into(),
            tokens,
        }
    }

    /// Requête d'upload, avec un jeton demandé au moment de l'appel
    fn upload_request(&self, file: File, object_name: &str) -> Result<RequestBuilder, String> {
        let token = self.tokens.access_token().map_err(|e| format!("{:#}", e))?;
        Ok(self
            .client
            .post(self.upload_url())
            .query(&[("uploadType", "media"), ("name", object_name)])
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "text/csv")
            .body(Body::from(file)))
    }

    /// URL d'upload du bucket
    fn upload_url(&self) -> String {
        format!(
            "{}/upload/storage/v1/b/{}/o",
            self.base_url.trim_end_matches('/'),
            self.bucket
        )
    }

    /// URI `gs://` d'un objet
    pub fn object_uri(&self, object_name: &str) -> String {
        format!("gs://{}/{}", self.bucket, object_name)
    }
}

impl ArtifactSink for GcsUploader {
    fn upload(&self, path: &Path, object_name: &str) -> Result<String, PipelineError> {
        let upload_error = |reason: String| PipelineError::Upload {
            file: path.display().to_string(),
            reason,
        };

        let file = File::open(path).map_err(|e| upload_error(e.to_string()))?;
        let size = file.metadata().map(|m| m.len()).unwrap_or(0);

        debug!(object = object_name, bytes = size, "Uploading to GCS");

        let response = self
            .upload_request(file, object_name)
            .map_err(upload_error)?
            .send()
            .map_err(|e| upload_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(upload_error(format!("HTTP {}: {}", status, body.trim())));
        }

        Ok(self.object_uri(object_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::export::auth::StaticToken;

    fn uploader() -> GcsUploader {
        GcsUploader::new(
            Client::new(),
            "https://storage.googleapis.com/",
            "cadastre",
            Arc::new(StaticToken::new("token")),
        )
    }

    #[test]
    fn test_upload_url() {
        assert_eq!(
            uploader().upload_url(),
            "https://storage.googleapis.com/upload/storage/v1/b/cadastre/o"
        );
    }

    #[test]
    fn test_object_uri() {
        assert_eq!(
            uploader().object_uri("buildings/A.ES.SDGC.BU.02001.building.csv"),
            "gs://cadastre/buildings/A.ES.SDGC.BU.02001.building.csv"
        );
    }

    #[test]
    fn test_missing_file_is_upload_error() {
        let err = uploader()
            .upload(Path::new("/nonexistent/a.csv"), "a.csv")
            .unwrap_err();
        assert!(matches!(err, PipelineError::Upload { .. }));
    }

    #[test]
    fn test_token_requested_per_upload() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let tokens = move || -> anyhow::Result<String> {
            Ok(format!("token-{}", counter.fetch_add(1, Ordering::SeqCst) + 1))
        };
        let uploader = GcsUploader::new(Client::new(), DEFAULT_STORAGE_URL, "cadastre", Arc::new(tokens));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.csv");
        std::fs::write(&path, "geom\n").unwrap();

        for expected in ["Bearer token-1", "Bearer token-2"] {
            let request = uploader
                .upload_request(File::open(&path).unwrap(), "a.csv")
                .unwrap()
                .build()
                .unwrap();
            assert_eq!(request.headers()[reqwest::header::AUTHORIZATION], expected);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_token_failure_is_upload_error() {
        let tokens = || -> anyhow::Result<String> { anyhow::bail!("metadata server unreachable") };
        let uploader = GcsUploader::new(Client::new(), DEFAULT_STORAGE_URL, "cadastre", Arc::new(tokens));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.csv");
        std::fs::write(&path, "geom\n").unwrap();

        let err = uploader.upload(&path, "a.csv").unwrap_err();
        assert!(matches!(err, PipelineError::Upload { ref reason, .. } if reason.contains("metadata server")));
    }

    const DEFAULT_STORAGE_URL: &str = crate::export::gcp::DEFAULT_STORAGE_URL;
}
