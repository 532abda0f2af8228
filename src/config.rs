//! Client configuration and remote environment selection.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{GarError, Result};

/// Remote GAR environment. Endpoint hosts are fixed per environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Preprod,
    Prod,
}

impl Environment {
    /// Host prefix for the subscription/institution service.
    pub fn endpoint_prefix(&self) -> &'static str {
        match self {
            Environment::Prod => "https://abonnement.gar.education.fr",
            Environment::Preprod => "https://abonnement.partenaire.test-gar.education.fr",
        }
    }

    /// Host prefix for the affectation-report service.
    pub fn report_endpoint_prefix(&self) -> &'static str {
        match self {
            Environment::Prod => "https://ws-rapports-affectation.gar.education.fr",
            Environment::Preprod => {
                "https://ws-rapports-affectation.partenaire.test-gar.education.fr"
            }
        }
    }
}

/// Configuration surface of the client.
///
/// The main certificate pair authenticates the distributor against the
/// subscription service; the report pair is a distinct identity and is
/// optional — report operations fail with a configuration error when it
/// is absent.
#[derive(Debug, Clone)]
pub struct GarConfig {
    pub distributor_id: String,
    pub ssl_cert: PathBuf,
    pub ssl_key: PathBuf,
    pub environment: Environment,
    pub cache_directory: PathBuf,
    pub report_ssl_cert: Option<PathBuf>,
    pub report_ssl_key: Option<PathBuf>,
}

impl GarConfig {
    pub fn new(
        distributor_id: impl Into<String>,
        ssl_cert: impl Into<PathBuf>,
        ssl_key: impl Into<PathBuf>,
        cache_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            distributor_id: distributor_id.into(),
            ssl_cert: ssl_cert.into(),
            ssl_key: ssl_key.into(),
            environment: Environment::default(),
            cache_directory: cache_directory.into(),
            report_ssl_cert: None,
            report_ssl_key: None,
        }
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_report_identity(
        mut self,
        cert: impl Into<PathBuf>,
        key: impl Into<PathBuf>,
    ) -> Self {
        self.report_ssl_cert = Some(cert.into());
        self.report_ssl_key = Some(key.into());
        self
    }

    /// Both halves of the report identity are present.
    pub fn has_report_identity(&self) -> bool {
        self.report_ssl_cert.is_some() && self.report_ssl_key.is_some()
    }

    /// Validate certificate paths and make sure the cache directory
    /// exists, creating it if needed.
    pub fn validate(&self) -> Result<()> {
        if self.distributor_id.is_empty() {
            return Err(GarError::Configuration(
                "distributor id must not be empty".into(),
            ));
        }
        require_file(&self.ssl_cert)?;
        require_file(&self.ssl_key)?;
        if let Some(cert) = &self.report_ssl_cert {
            require_file(cert)?;
        }
        if let Some(key) = &self.report_ssl_key {
            require_file(key)?;
        }

        fs::create_dir_all(&self.cache_directory).map_err(|e| {
            GarError::Configuration(format!(
                "could not find or create cache directory {}: {e}",
                self.cache_directory.display()
            ))
        })?;

        Ok(())
    }

    pub fn is_prod(&self) -> bool {
        self.environment == Environment::Prod
    }

    /// Full URL on the subscription service.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.environment.endpoint_prefix(), path)
    }

    /// Full URL on the report service.
    pub fn report_endpoint(&self, path: &str) -> String {
        format!("{}{}", self.environment.report_endpoint_prefix(), path)
    }
}

fn require_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(GarError::CertificateNotFound(path.to_path_buf()))
    }
}
