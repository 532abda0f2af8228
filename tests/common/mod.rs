//! Shared test fixtures: a canned transport and payload builders.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::Write as _;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use gar_api::{GarClient, GarConfig, Method, Transport, TransportResponse};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Vec<u8>>,
}

impl RecordedRequest {
    pub fn body_str(&self) -> String {
        String::from_utf8(self.body.clone().unwrap_or_default()).unwrap()
    }
}

/// Transport returning queued responses in order and recording every
/// request. A request against an empty queue fails the test.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<TransportResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, status: u16, body: impl Into<Vec<u8>>) {
        self.responses.lock().unwrap().push_back(TransportResponse {
            status,
            body: body.into(),
        });
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> gar_api::Result<TransportResponse> {
        self.requests.lock().unwrap().push(RecordedRequest {
            method,
            url: url.to_string(),
            body,
        });
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected request: {method} {url}"));
        Ok(response)
    }
}

/// Client over mock transports, caching under `cache_dir`.
pub fn mock_client(
    cache_dir: &Path,
    transport: Arc<MockTransport>,
    report_transport: Option<Arc<MockTransport>>,
) -> GarClient {
    let config = GarConfig::new("DIST", "/unused/cert.pem", "/unused/key.pem", cache_dir);
    GarClient::with_transports(
        config,
        transport,
        report_transport.map(|t| t as Arc<dyn Transport>),
    )
    .unwrap()
}

/// Subscription result-set payload with the given subscription nodes.
pub fn subscriptions_xml(nodes: &[&str]) -> String {
    format!(
        r#"<abonnements xmlns="http://www.atosworldline.com/wsabonnement/v1.0/">{}</abonnements>"#,
        nodes.concat()
    )
}

/// One subscription node in the server's GET-response shape (no
/// namespace on the node itself).
pub fn subscription_node(id: &str, resource_id: &str, uai: &str) -> String {
    format!(
        "<abonnement>\
           <idAbonnement>{id}</idAbonnement>\
           <idDistributeurCom>DIST</idDistributeurCom>\
           <idRessource>{resource_id}</idRessource>\
           <debutValidite>2024-09-01T00:00:00.000+02:00</debutValidite>\
           <finValidite>2025-08-31T23:59:59.000+02:00</finValidite>\
           <uaiEtab>{uai}</uaiEtab>\
           <publicCible>ELEVE</publicCible>\
         </abonnement>"
    )
}

/// Institution directory payload with one node per (uai, name) pair.
pub fn institutions_xml(entries: &[(&str, &str)]) -> String {
    let nodes: String = entries
        .iter()
        .map(|(uai, name)| {
            format!(
                "<etablissement>\
                   <uai>{uai}</uai>\
                   <appellation_officielle>{name}</appellation_officielle>\
                   <commune_libe>Paris</commune_libe>\
                 </etablissement>"
            )
        })
        .collect();
    format!(
        r#"<listEtablissement xmlns="http://www.atosworldline.com/listEtablissement/v1.0/">{nodes}</listEtablissement>"#
    )
}

/// Single-entry ZIP archive bytes.
pub fn zip_archive(entry_name: &str, content: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        writer
            .start_file(entry_name, zip::write::FileOptions::default())
            .unwrap();
        writer.write_all(content).unwrap();
        writer.finish().unwrap();
    }
    buf
}
