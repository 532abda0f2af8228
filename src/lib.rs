//! Client for the GAR national education-resource subscription
//! registry.
//!
//! A distributor authenticates with a client certificate and can
//! register, query, update and delete resource subscriptions for
//! institutions (schools identified by their UAI code), look up the
//! institution directory (cached on disk per calendar day), and
//! retrieve affectation reports.
//!
//! ```no_run
//! use gar_api::{GarClient, GarConfig, SubscriptionFilter};
//!
//! # async fn run() -> gar_api::Result<()> {
//! let config = GarConfig::new("DIST-ID", "client.pem", "client.key", "/var/cache/gar");
//! let client = GarClient::new(config)?;
//!
//! let filter = SubscriptionFilter {
//!     uai: Some("0123456A".to_string()),
//!     ..Default::default()
//! };
//! for subscription in client.subscriptions().query(&filter).await? {
//!     println!("{} until {}", subscription.subscription_id, subscription.to);
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod diskcache;
mod error;
mod institutions;
mod reports;
mod subscriptions;
mod transport;
mod types;
mod xml;

use std::fs;
use std::sync::Arc;

pub use config::{Environment, GarConfig};
pub use error::{GarError, Result};
pub use institutions::InstitutionCache;
pub use reports::ReportApi;
pub use subscriptions::SubscriptionApi;
pub use transport::{Method, ReqwestTransport, Transport, TransportResponse};
pub use types::{
    Assignment, Audience, CreatableSubscription, GlobalReportItem, Institution,
    InstitutionDirectory, Report, ReportStatus, Resource, Subscription, SubscriptionFilter,
    SubscriptionRequest,
};
pub use xml::translate;
pub use xml::tree;

/// Entry point: owns the transports, the in-process caches and the
/// three service surfaces (institutions, subscriptions, reports).
pub struct GarClient {
    config: Arc<GarConfig>,
    institutions: InstitutionCache,
    subscriptions: SubscriptionApi,
    reports: ReportApi,
}

impl GarClient {
    /// Build a client with real mutual-TLS transports. Validates the
    /// configuration (certificate files, cache directory) up front.
    pub fn new(config: GarConfig) -> Result<Self> {
        config.validate()?;

        let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(
            &config.ssl_cert,
            &config.ssl_key,
            "application/xml",
        )?);

        let report_transport: Option<Arc<dyn Transport>> =
            match (&config.report_ssl_cert, &config.report_ssl_key) {
                (Some(cert), Some(key)) => Some(Arc::new(ReqwestTransport::new(
                    cert,
                    key,
                    "application/json",
                )?)),
                _ => None,
            };

        Self::with_transports(config, transport, report_transport)
    }

    /// Build a client over caller-supplied transports. Certificate
    /// paths are not touched; the cache directory is still created.
    pub fn with_transports(
        config: GarConfig,
        transport: Arc<dyn Transport>,
        report_transport: Option<Arc<dyn Transport>>,
    ) -> Result<Self> {
        fs::create_dir_all(&config.cache_directory)?;
        let config = Arc::new(config);

        Ok(Self {
            institutions: InstitutionCache::new(transport.clone(), config.clone()),
            subscriptions: SubscriptionApi::new(transport, config.clone()),
            reports: ReportApi::new(report_transport, config.clone()),
            config,
        })
    }

    pub fn config(&self) -> &GarConfig {
        &self.config
    }

    /// Institution directory, cached per calendar day.
    pub fn institutions(&self) -> &InstitutionCache {
        &self.institutions
    }

    /// Subscription CRUD.
    pub fn subscriptions(&self) -> &SubscriptionApi {
        &self.subscriptions
    }

    /// Affectation report listing, download and global-report queries.
    pub fn reports(&self) -> &ReportApi {
        &self.reports
    }
}
