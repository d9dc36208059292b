//! Jetons d'accès Google Cloud
//!
//! Les dépôts et les jobs demandent un jeton à chaque requête.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use gcp_auth::{CustomServiceAccount, TokenProvider};
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

/// Portée des jetons (Cloud Storage et BigQuery)
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Fournit un jeton valide au moment de la requête
pub trait AccessTokenProvider: Send + Sync {
    fn access_token(&self) -> Result<String>;
}

impl<F> AccessTokenProvider for F
where
    F: Fn() -> Result<String> + Send + Sync,
{
    fn access_token(&self) -> Result<String> {
        self()
    }
}

/// Jeton fourni tel quel, jamais renouvelé
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl AccessTokenProvider for StaticToken {
    fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Jetons `gcp_auth` : mis en cache, renouvelés avant expiration
pub struct GoogleAuth {
    runtime: Runtime,
    provider: Arc<dyn TokenProvider>,
}

impl GoogleAuth {
    /// Compte de service depuis un fichier de clé JSON
    pub fn from_service_account_file(path: &Path) -> Result<Self> {
        let runtime = runtime()?;
        let account = CustomServiceAccount::from_file(path)
            .with_context(|| format!("Cannot read service account key {}", path.display()))?;
        info!(path = %path.display(), "Using service account key");
        Ok(Self {
            runtime,
            provider: Arc::new(account),
        })
    }

    /// Identifiants par défaut : `GOOGLE_APPLICATION_CREDENTIALS`, gcloud,
    /// puis serveur de métadonnées
    pub fn from_environment() -> Result<Self> {
        let runtime = runtime()?;
        let provider = runtime
            .block_on(gcp_auth::provider())
            .context("No Google credentials: use --credentials, GOOGLE_APPLICATION_CREDENTIALS or run on Google Cloud")?;
        info!("Using default Google credentials");
        Ok(Self { runtime, provider })
    }
}

impl AccessTokenProvider for GoogleAuth {
    fn access_token(&self) -> Result<String> {
        let token = self
            .runtime
            .block_on(self.provider.token(&[CLOUD_PLATFORM_SCOPE]))
            .context("Cannot obtain access token")?;
        debug!("Access token obtained");
        Ok(token.as_str().to_string())
    }
}

fn runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create auth runtime")
}

/// Choisit la source des jetons : jeton explicite, fichier de clé, sinon
/// identifiants par défaut
pub fn token_provider(
    access_token: Option<&str>,
    credentials: Option<&Path>,
) -> Result<Arc<dyn AccessTokenProvider>> {
    if let Some(token) = access_token {
        warn!("Using a fixed access token: it will not be renewed during the run");
        return Ok(Arc::new(StaticToken::new(token)));
    }
    match credentials {
        Some(path) => Ok(Arc::new(GoogleAuth::from_service_account_file(path)?)),
        None => Ok(Arc::new(GoogleAuth::from_environment()?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_token_wins() {
        let provider = token_provider(Some("ya29.token"), Some(Path::new("/nonexistent/key.json"))).unwrap();
        assert_eq!(provider.access_token().unwrap(), "ya29.token");
    }

    #[test]
    fn test_missing_key_file() {
        let err = token_provider(None, Some(Path::new("/nonexistent/key.json")))
            .err()
            .unwrap();
        assert!(err.to_string().contains("/nonexistent/key.json"));
    }

    #[test]
    fn test_closure_provider() {
        let provider: Arc<dyn AccessTokenProvider> = Arc::new(|| -> Result<String> { Ok("from-closure".to_string()) });
        assert_eq!(provider.access_token().unwrap(), "from-closure");
    }
}
