//! The service end to end: a certificate directory on disk, the admin and
//! registration API, a manual run, and chain verification over HTTP.

use std::path::Path;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use http_body_util::BodyExt;
use rcgen::{date_time_ymd, CertificateParams, KeyPair};
use serde_json::{json, Value};
use tower::ServiceExt;
use vfx_api::config::AppConfig;
use vfx_api::state::AppState;
use vfx_core::{
    Amount, InvoiceDirection, InvoiceId, InvoiceLine, InvoiceSnapshot, InvoiceTotals, PartyProfile, Quantity,
    TaxRate,
};
use vfx_transmit::MockAuthorityAdapter;

fn snapshot(n: u64) -> InvoiceSnapshot {
    let mut snap = InvoiceSnapshot {
        invoice_id: InvoiceId::new(format!("inv-{n}")).unwrap(),
        invoice_number: format!("F2026-{n:04}"),
        direction: InvoiceDirection::Issued,
        issue_date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
        currency: "EUR".to_string(),
        issuer: PartyProfile {
            legal_id: "B12345678".to_string(),
            name: "Acme Tools SL".to_string(),
            address: None,
        },
        counterparty: PartyProfile {
            legal_id: "A87654321".to_string(),
            name: "Widgets SA".to_string(),
            address: None,
        },
        lines: vec![InvoiceLine {
            description: "Hammer".to_string(),
            quantity: Quantity::units(n as i64),
            unit_price: Amount::from_minor(1250),
            tax_rate: TaxRate::from_basis_points(2100),
        }],
        totals: InvoiceTotals {
            subtotal: Amount::ZERO,
            tax: Amount::ZERO,
            total: Amount::ZERO,
        },
    };
    snap.totals = snap.derived_totals().unwrap();
    snap
}

fn write_certificate(dir: &Path) {
    let mut params = CertificateParams::new(vec!["acme.test".to_string()]).unwrap();
    params.not_before = date_time_ymd(2024, 1, 1);
    params.not_after = date_time_ymd(2099, 12, 31);
    let key = KeyPair::generate().unwrap();
    let cert = params.self_signed(&key).unwrap();
    std::fs::write(dir.join("acme.pem"), cert.pem()).unwrap();
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&value).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn certificate_check_unblocks_a_manual_run() {
    let certs = tempfile::tempdir().unwrap();
    write_certificate(certs.path());
    let config = AppConfig {
        cert_dir: certs.path().to_path_buf(),
        ..AppConfig::default()
    };
    let mock = MockAuthorityAdapter::new();
    let app = vfx_api::app(AppState::with_config(config, std::sync::Arc::new(mock.clone()), None));

    let (status, _) = call(
        &app,
        "PUT",
        "/v1/businesses/acme/config",
        Some(json!({
            "enabled": true,
            "certificate_ref": "acme.pem",
            "flow_control_interval_seconds": 0,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    for n in 1..=3 {
        let snap = snapshot(n);
        let id = snap.invoice_id.as_str().to_string();
        let (status, _) = call(
            &app,
            "PUT",
            &format!("/v1/businesses/acme/invoices/{id}"),
            Some(serde_json::to_value(&snap).unwrap()),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, record) = call(
            &app,
            "POST",
            &format!("/v1/businesses/acme/invoices/{id}/registration"),
            Some(json!({ "direction": "issued" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(record["sequence_number"], n);
    }

    // Validity has not been read yet, so the certificate counts as missing.
    let (_, cert) = call(&app, "GET", "/v1/businesses/acme/certificate", None).await;
    assert_eq!(cert["health"], "missing");

    let (status, check) = call(&app, "POST", "/v1/certificates/check", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(check["refresh"]["failures"].as_array().unwrap().len(), 0);
    assert_eq!(check["check"]["summary"]["healthy"], 1);

    let (status, run) = call(&app, "POST", "/v1/businesses/acme/transmissions/run", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["succeeded"], 3);
    assert_eq!(mock.attempts().len(), 3);

    let (_, sent) = call(&app, "GET", "/v1/businesses/acme/records?status=sent", None).await;
    assert_eq!(sent.as_array().unwrap().len(), 3);

    let (status, report) = call(&app, "GET", "/v1/businesses/acme/chain/verification", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["records_checked"], 3);
    assert!(report["first_mismatch"].is_null());
}
