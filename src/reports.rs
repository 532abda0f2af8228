//! Affectation report retrieval.
//!
//! Reports are listed as JSON, downloaded as single-file ZIP archives,
//! and the distributor-wide "global report" is kept under a daily cache
//! partition with a query interface over its XML content.
//!
//! Every operation that touches the network here requires the report
//! transport (a second certificate pair); it is optional at
//! configuration time, so these operations fail with a configuration
//! error when it is absent.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::config::GarConfig;
use crate::diskcache::{persist_atomic, today};
use crate::error::{GarError, Result};
use crate::transport::{Method, Transport};
use crate::types::{GlobalReportItem, Report, ReportStatus};
use crate::xml::tree::parse_document;

/// Creation dates in the listing are day-resolution, French order.
const LISTING_DATE_FORMAT: &str = "%d/%m/%Y";

/// One record of the JSON report listing. `statut` is absent on the
/// global-report entry.
#[derive(Debug, Deserialize)]
struct RawReport {
    #[serde(rename = "nomRapport")]
    name: String,
    #[serde(rename = "dateCreation")]
    date: String,
    #[serde(rename = "taille")]
    size: u64,
    #[serde(rename = "statut")]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReportListing {
    #[serde(rename = "rapportsAffectation", default)]
    reports: Vec<RawReport>,
}

pub struct ReportApi {
    transport: Option<Arc<dyn Transport>>,
    config: Arc<GarConfig>,
}

impl ReportApi {
    pub(crate) fn new(transport: Option<Arc<dyn Transport>>, config: Arc<GarConfig>) -> Self {
        Self { transport, config }
    }

    fn transport(&self) -> Result<&Arc<dyn Transport>> {
        self.transport
            .as_ref()
            .ok_or(GarError::ReportTransportNotConfigured)
    }

    /// List available reports by acknowledgment status. Both flags
    /// false short-circuits to an empty list without a network call.
    pub async fn list_reports(
        &self,
        include_acknowledged: bool,
        include_not_acknowledged: bool,
    ) -> Result<Vec<Report>> {
        let status = match (include_acknowledged, include_not_acknowledged) {
            (false, false) => return Ok(Vec::new()),
            (true, true) => ReportStatus::All,
            (true, false) => ReportStatus::Acknowledged,
            (false, true) => ReportStatus::NotAcknowledged,
        };

        let raw = self.fetch_listing(status).await?;
        raw.into_iter()
            // records without a statut field are not real reports on
            // this path (the global report rides along without one)
            .filter(|r| r.status.is_some())
            .map(report_from_raw)
            .collect()
    }

    /// Download a report archive, extract it into the report cache and
    /// return the path of its (single) payload file.
    pub async fn download_report(&self, name: &str) -> Result<PathBuf> {
        let transport = self.transport()?;
        let url = self
            .config
            .report_endpoint(&format!("/GAR-Affectations/{}/{name}", self.config.distributor_id));
        let response = transport.request(Method::Get, &url, None).await?;

        if !response.is_status(200) {
            return Err(GarError::TransportStatus {
                status: response.status,
                url,
            });
        }

        let directory = self.config.cache_directory.join("reports");
        let zip_path = directory.join(name);
        persist_atomic(&zip_path, &response.body)?;

        let mut archive = zip::ZipArchive::new(fs::File::open(&zip_path)?)?;
        if archive.len() == 0 {
            return Err(GarError::malformed(format!("report archive {name} is empty")));
        }
        let first_entry = archive.by_index(0)?.name().to_string();
        archive.extract(&directory)?;
        drop(archive);
        fs::remove_file(&zip_path)?;

        tracing::debug!(report = name, payload = %first_entry, "report downloaded and extracted");
        Ok(directory.join(first_entry))
    }

    /// Path of today's global report, fetching it if this is the first
    /// call of the day. All other cached global-report files are
    /// removed before the fetch.
    pub async fn ensure_latest_global_report(&self) -> Result<PathBuf> {
        let directory = self.global_report_directory()?;
        let today_path = directory.join(format!("{}.xml", today().format("%Y-%m-%d")));
        if today_path.is_file() {
            return Ok(today_path);
        }

        for entry in fs::read_dir(&directory)? {
            let path = entry?.path();
            if path.extension().map_or(false, |ext| ext == "xml") {
                fs::remove_file(&path)?;
            }
        }

        // The status filter is irrelevant here: the global report rides
        // along in every listing. The server lists it last; that
        // ordering is a server contract, not verified here.
        let raw = self.fetch_listing(ReportStatus::Acknowledged).await?;
        let latest = raw
            .into_iter()
            .last()
            .ok_or_else(|| GarError::malformed("report listing is empty"))?;

        let extracted = self.download_report(&latest.name).await?;
        fs::rename(&extracted, &today_path)?;

        tracing::debug!(path = %today_path.display(), "global report cached for today");
        Ok(today_path)
    }

    /// Query the latest global report: institutions covered by a
    /// subscription, optionally restricted to one resource id and/or a
    /// set of institution codes.
    pub async fn query_global_report(
        &self,
        resource_id: Option<&str>,
        uais: Option<&[String]>,
    ) -> Result<Vec<GlobalReportItem>> {
        let path = self.ensure_latest_global_report().await?;
        let root = parse_document(&fs::read(&path)?)?;

        let mut items = Vec::new();
        for resource in root.descendants_named("GARRessource") {
            let id = resource.attr("idRessource").unwrap_or_default();
            if resource_id.is_some_and(|wanted| wanted != id) {
                continue;
            }
            let title = resource.attr("titreRessource").unwrap_or_default();

            for subscription in resource.children_named("GARAbonnement") {
                let subscription_id = subscription.attr("idAbonnement").unwrap_or_default();
                let end = subscription.attr("finValidite").unwrap_or_default();
                let subscription_end = NaiveDate::parse_from_str(end, "%Y-%m-%d")
                    .map_err(|e| GarError::malformed(format!("bad finValidite {end:?}: {e}")))?;

                for institution in subscription.children_named("GAREtablissement") {
                    let uai = institution.attr("UAI").unwrap_or_default();
                    if uais.is_some_and(|wanted| !wanted.iter().any(|w| w == uai)) {
                        continue;
                    }

                    items.push(GlobalReportItem {
                        resource_id: id.to_string(),
                        resource_title: title.to_string(),
                        subscription_id: subscription_id.to_string(),
                        subscription_end,
                        uai: uai.to_string(),
                        assignment_count: institution.children_named("Affectation").count(),
                    });
                }
            }
        }

        Ok(items)
    }

    async fn fetch_listing(&self, status: ReportStatus) -> Result<Vec<RawReport>> {
        let transport = self.transport()?;
        let url = self.config.report_endpoint(&format!(
            "/rapportsAffectation/{}/{}",
            self.config.distributor_id,
            status.as_str()
        ));
        let response = transport.request(Method::Get, &url, None).await?;

        if !response.is_status(200) {
            return Err(GarError::TransportStatus {
                status: response.status,
                url,
            });
        }

        let listing: ReportListing = serde_json::from_slice(&response.body)?;
        Ok(listing.reports)
    }

    fn global_report_directory(&self) -> Result<PathBuf> {
        let directory = self.config.cache_directory.join("reports").join("global");
        fs::create_dir_all(&directory)?;
        Ok(directory)
    }
}

fn report_from_raw(raw: RawReport) -> Result<Report> {
    let date = NaiveDate::parse_from_str(&raw.date, LISTING_DATE_FORMAT)
        .map_err(|e| GarError::malformed(format!("bad report date {:?}: {e}", raw.date)))?;
    let status = raw.status.as_deref().and_then(ReportStatus::parse);
    Ok(Report {
        name: raw.name,
        date,
        size: raw.size,
        status,
    })
}
