//! End-to-end reporter construction through the public library API.

use std::collections::BTreeMap;
use std::fs;

use vigil::error::BuildError;
use vigil::report::Report;
use vigil::reporter::{self, AnyReporter, Reporter};
use vigil::service::{Service, ServiceContext};

fn service() -> Service {
    Service::new(
        "api",
        "10.0.0.5",
        8080,
        "",
        BTreeMap::from([("az".to_string(), "us-east-1a".to_string())]),
    )
}

#[tokio::test]
async fn console_reporter_from_minimal_config() {
    let service = service();
    let mut r = reporter::build(br#"{"type":"console"}"#, &service).await.unwrap();
    assert!(matches!(r, AnyReporter::Console(_)));
    assert_eq!(r.fields().get("type"), Some("console"));
    assert_eq!(r.fields().get("service"), Some("api"));

    let report = Report::from_service(&service, None);
    assert!(report.available);
    assert_eq!(report.host, "10.0.0.5");
    assert_eq!(report.port, 8080);
    assert_eq!(report.labels.get("az").map(String::as_str), Some("us-east-1a"));
    r.report(&report).await.unwrap();
    r.destroy().await;
}

#[tokio::test]
async fn file_reporter_round_trips_reports() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("api.report");
    let raw = serde_json::json!({"type": "file", "path": path, "append": true}).to_string();
    let service = service();

    let mut r = reporter::build(raw.as_bytes(), &service).await.unwrap();
    let err = std::io::Error::other("connection refused");
    let reports = [
        Report::from_service(&service, None),
        Report::from_service(&service, Some(&err)),
    ];
    for report in &reports {
        r.report(report).await.unwrap();
    }
    r.destroy().await;
    r.destroy().await;

    let content = fs::read_to_string(&path).unwrap();
    let read: Vec<Report> = content
        .lines()
        .map(|l| Report::from_json(l.as_bytes()).unwrap())
        .collect();
    assert_eq!(read, reports);
}

#[tokio::test]
async fn build_errors_carry_service_context() {
    let service = service();
    let cases: [(&[u8], &str); 3] = [
        (b"{{{", "unreadable"),
        (br#"{"type":"bogus"}"#, "unsupported"),
        (br#"{"type":"file","path":42}"#, "decode"),
    ];
    for (raw, expected) in cases {
        let err = reporter::build(raw, &service).await.err().unwrap();
        let kind = match &err {
            BuildError::ConfigUnreadable { .. } => "unreadable",
            BuildError::UnsupportedType { .. } => "unsupported",
            BuildError::ConfigDecode { .. } => "decode",
            BuildError::CommonInit { .. } => "common",
            BuildError::SpecificInit { .. } => "specific",
        };
        assert_eq!(kind, expected, "for input {}", String::from_utf8_lossy(raw));
        assert_eq!(err.fields().get("service"), service.fields().get("service"));
    }
}
