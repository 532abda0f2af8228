//! Report listing, ZIP download, the daily global-report cache and the
//! query interface over the global report's XML.

mod common;

use chrono::NaiveDate;
use common::{mock_client, zip_archive, MockTransport};
use gar_api::{GarError, ReportStatus};

fn listing_json(entries: &[(&str, Option<&str>)]) -> String {
    let records: Vec<String> = entries
        .iter()
        .map(|(name, status)| {
            let status_field = status
                .map(|s| format!(r#","statut":"{s}""#))
                .unwrap_or_default();
            format!(r#"{{"nomRapport":"{name}","dateCreation":"15/01/2025","taille":2048{status_field}}}"#)
        })
        .collect();
    format!(r#"{{"rapportsAffectation":[{}]}}"#, records.join(","))
}

const GLOBAL_REPORT_XML: &str = r#"<GAR>
  <GARRessource idRessource="ark:/123/r1" titreRessource="Resource One">
    <GARAbonnement idAbonnement="SUB-1" finValidite="2025-08-31">
      <GAREtablissement UAI="0123456A"><Affectation/><Affectation/></GAREtablissement>
      <GAREtablissement UAI="0654321B"><Affectation/></GAREtablissement>
    </GARAbonnement>
  </GARRessource>
  <GARRessource idRessource="ark:/123/r2" titreRessource="Resource Two">
    <GARAbonnement idAbonnement="SUB-2" finValidite="2026-08-31">
      <GAREtablissement UAI="0123456A"/>
    </GARAbonnement>
  </GARRessource>
</GAR>"#;

#[tokio::test]
async fn both_flags_false_returns_empty_without_any_request() {
    let dir = tempfile::tempdir().unwrap();
    let report_transport = MockTransport::new();
    let client = mock_client(dir.path(), MockTransport::new(), Some(report_transport.clone()));

    let reports = client.reports().list_reports(false, false).await.unwrap();
    assert!(reports.is_empty());
    assert_eq!(report_transport.request_count(), 0);
}

#[tokio::test]
async fn listing_maps_status_to_the_url_and_drops_statusless_records() {
    let cases = [
        (true, false, "/PRIS_EN_COMPTE"),
        (false, true, "/NON_PRIS_EN_COMPTE"),
        (true, true, "/TOUT"),
    ];
    for (ack, nack, suffix) in cases {
        let dir = tempfile::tempdir().unwrap();
        let report_transport = MockTransport::new();
        report_transport.push(
            200,
            listing_json(&[
                ("rapport-1.zip", Some("PRIS_EN_COMPTE")),
                ("global.zip", None),
            ]),
        );
        let client = mock_client(dir.path(), MockTransport::new(), Some(report_transport.clone()));

        let reports = client.reports().list_reports(ack, nack).await.unwrap();
        assert_eq!(reports.len(), 1, "case {suffix}");
        assert_eq!(reports[0].name, "rapport-1.zip");
        assert_eq!(reports[0].date, NaiveDate::from_ymd_opt(2025, 1, 15).unwrap());
        assert_eq!(reports[0].size, 2048);
        assert_eq!(reports[0].status, Some(ReportStatus::Acknowledged));

        let url = &report_transport.requests()[0].url;
        assert!(url.contains("/rapportsAffectation/DIST"), "{url}");
        assert!(url.ends_with(suffix), "{url}");
    }
}

#[tokio::test]
async fn report_operations_require_the_report_transport() {
    let dir = tempfile::tempdir().unwrap();
    let client = mock_client(dir.path(), MockTransport::new(), None);

    assert!(matches!(
        client.reports().list_reports(true, false).await,
        Err(GarError::ReportTransportNotConfigured)
    ));
    assert!(matches!(
        client.reports().download_report("r.zip").await,
        Err(GarError::ReportTransportNotConfigured)
    ));
}

#[tokio::test]
async fn download_extracts_the_payload_and_removes_the_archive() {
    let dir = tempfile::tempdir().unwrap();
    let report_transport = MockTransport::new();
    report_transport.push(200, zip_archive("payload.xml", b"<GAR/>"));
    let client = mock_client(dir.path(), MockTransport::new(), Some(report_transport.clone()));

    let path = client.reports().download_report("rapport-1.zip").await.unwrap();

    assert!(path.ends_with("payload.xml"));
    assert_eq!(std::fs::read(&path).unwrap(), b"<GAR/>");
    assert!(!dir.path().join("reports").join("rapport-1.zip").exists());
    assert!(report_transport.requests()[0]
        .url
        .contains("/GAR-Affectations/DIST/rapport-1.zip"));
}

#[tokio::test]
async fn global_report_is_fetched_once_per_day_and_evicts_older_files() {
    let dir = tempfile::tempdir().unwrap();

    // leftover partition from a previous day
    let global_dir = dir.path().join("reports").join("global");
    std::fs::create_dir_all(&global_dir).unwrap();
    let stale = global_dir.join("2020-01-01.xml");
    std::fs::write(&stale, "old").unwrap();

    let report_transport = MockTransport::new();
    // the global report is the last listed entry
    report_transport.push(
        200,
        listing_json(&[("rapport-1.zip", Some("PRIS_EN_COMPTE")), ("global.zip", None)]),
    );
    report_transport.push(200, zip_archive("global-payload.xml", GLOBAL_REPORT_XML.as_bytes()));
    let client = mock_client(dir.path(), MockTransport::new(), Some(report_transport.clone()));

    let path = client.reports().ensure_latest_global_report().await.unwrap();
    assert!(path.is_file());
    assert!(!stale.exists());
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        GLOBAL_REPORT_XML
    );
    assert_eq!(report_transport.request_count(), 2);

    // same day: served from the partition, no further requests
    let again = client.reports().ensure_latest_global_report().await.unwrap();
    assert_eq!(again, path);
    assert_eq!(report_transport.request_count(), 2);
}

#[tokio::test]
async fn global_report_query_filters_by_resource_and_uai() {
    let dir = tempfile::tempdir().unwrap();

    // pre-seed today's partition so no network traffic is needed
    let global_dir = dir.path().join("reports").join("global");
    std::fs::create_dir_all(&global_dir).unwrap();
    let today = chrono::Local::now().date_naive();
    std::fs::write(
        global_dir.join(format!("{}.xml", today.format("%Y-%m-%d"))),
        GLOBAL_REPORT_XML,
    )
    .unwrap();

    let client = mock_client(dir.path(), MockTransport::new(), Some(MockTransport::new()));

    let all = client.reports().query_global_report(None, None).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].resource_id, "ark:/123/r1");
    assert_eq!(all[0].resource_title, "Resource One");
    assert_eq!(all[0].subscription_id, "SUB-1");
    assert_eq!(
        all[0].subscription_end,
        NaiveDate::from_ymd_opt(2025, 8, 31).unwrap()
    );
    assert_eq!(all[0].uai, "0123456A");
    assert_eq!(all[0].assignment_count, 2);
    assert_eq!(all[1].assignment_count, 1);

    let by_resource = client
        .reports()
        .query_global_report(Some("ark:/123/r2"), None)
        .await
        .unwrap();
    assert_eq!(by_resource.len(), 1);
    assert_eq!(by_resource[0].subscription_id, "SUB-2");
    assert_eq!(by_resource[0].assignment_count, 0);

    let by_uai = client
        .reports()
        .query_global_report(None, Some(&["0654321B".to_string()]))
        .await
        .unwrap();
    assert_eq!(by_uai.len(), 1);
    assert_eq!(by_uai[0].uai, "0654321B");

    let both = client
        .reports()
        .query_global_report(Some("ark:/123/r1"), Some(&["0123456A".to_string()]))
        .await
        .unwrap();
    assert_eq!(both.len(), 1);
    assert_eq!(both[0].assignment_count, 2);
}
