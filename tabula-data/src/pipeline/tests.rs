//! Tests for request handling against a stubbed transport.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rstest::{fixture, rstest};
use serde_json::json;
use tabula_core::{
    ApiSource, ConversionRequest, CredentialSpec, DataPath, ErrorKind, FileFormat, FileSource,
    HttpMethod, ParseRequest, ServiceConfig, SourceDescriptor, SourceKind, SqlSource,
};
use tempfile::TempDir;

use super::IngestService;
use crate::fetch::test_support::StubTransport;

const CSV_URL: &str = "https://files.example.com/people.csv?token=t";
const API_URL: &str = "https://api.example.com/items";
const SQL_URL: &str = "https://sql.example.com/query";
const OUTPUT_URL: &str = "https://bucket.example.com/out.parquet?sig=s";

struct Harness {
    dir: TempDir,
    config: ServiceConfig,
}

impl Harness {
    fn service(&self, transport: &StubTransport) -> IngestService {
        IngestService::new(self.config.clone(), Arc::new(transport.clone()))
            .expect("service builds")
    }

    fn with_config(mut self, adjust: impl FnOnce(ServiceConfig) -> ServiceConfig) -> Self {
        self.config = adjust(self.config);
        self
    }
}

#[fixture]
fn harness() -> Harness {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = ServiceConfig::default().with_scratch_dir(dir.path().join("scratch"));
    Harness { dir, config }
}

fn csv_source() -> SourceDescriptor {
    SourceDescriptor::File(FileSource {
        url: CSV_URL.to_owned(),
        format: FileFormat::Csv,
    })
}

fn sql_source(query: &str) -> SourceDescriptor {
    SourceDescriptor::Sql(SqlSource {
        endpoint: SQL_URL.to_owned(),
        database: "warehouse".to_owned(),
        query: query.to_owned(),
        credential: None,
    })
}

const PEOPLE: &str = "name,age\nAda,36\nGrace,45\nLinus,\n";

#[rstest]
#[tokio::test]
async fn previews_csv_file(harness: Harness) {
    let transport = StubTransport::new().with_body(CSV_URL, PEOPLE);
    let service = harness.service(&transport);

    let payload = service
        .try_parse(ParseRequest::new(csv_source()).preview(2))
        .await
        .expect("parse succeeds");

    assert_eq!(payload.data.len(), 2);
    assert_eq!(payload.data[0]["name"], json!("Ada"));
    assert!(payload.metadata.truncated);
    assert_eq!(payload.metadata.columns, ["name", "age"]);
    assert_eq!(payload.metadata.source_type, SourceKind::File);
    assert!(payload.metadata.query_modified.is_none());
}

#[rstest]
#[tokio::test]
async fn full_parse_is_capped_at_default_limit(harness: Harness) {
    let harness = harness.with_config(|config| ServiceConfig {
        default_preview_rows: 2,
        ..config
    });
    let transport = StubTransport::new().with_body(CSV_URL, PEOPLE);

    let payload = harness
        .service(&transport)
        .try_parse(ParseRequest::new(csv_source()))
        .await
        .expect("parse succeeds");

    assert_eq!(payload.metadata.row_count, 2);
    assert!(payload.metadata.truncated);
}

#[rstest]
#[case(Some(0))]
#[case(Some(10_001))]
#[tokio::test]
async fn rejects_out_of_range_limits(harness: Harness, #[case] limit: Option<usize>) {
    let transport = StubTransport::new().with_body(CSV_URL, PEOPLE);
    let mut request = ParseRequest::new(csv_source());
    request.limit = limit;

    let envelope = harness.service(&transport).parse(request).await;

    assert!(!envelope.is_success());
    assert_eq!(envelope.error_kind(), Some(ErrorKind::Validation));
    assert!(transport.requests().is_empty());
}

#[rstest]
#[tokio::test]
async fn sql_preview_fetches_one_row_past_limit(harness: Harness) {
    let rows: Vec<_> = (0..4).map(|id| json!({"id": id})).collect();
    let transport = StubTransport::new().with_json(SQL_URL, &json!({"rows": rows}));

    let payload = harness
        .service(&transport)
        .try_parse(ParseRequest::new(sql_source("SELECT id FROM t;")).preview(3))
        .await
        .expect("parse succeeds");

    let sent = transport.requests_to(SQL_URL);
    assert_eq!(sent[0].method, HttpMethod::Post);
    assert_eq!(
        sent[0].json_body(),
        Some(json!({"query": "SELECT id FROM t LIMIT 4;", "database": "warehouse"}))
    );
    assert_eq!(payload.metadata.row_count, 3);
    assert!(payload.metadata.truncated);
    assert_eq!(payload.metadata.query_modified, Some(true));
}

#[rstest]
#[tokio::test]
async fn full_sql_parse_leaves_query_alone(harness: Harness) {
    let transport = StubTransport::new().with_json(SQL_URL, &json!([{"n": 1}]));

    let payload = harness
        .service(&transport)
        .try_parse(ParseRequest::new(sql_source("SELECT 1 AS n")))
        .await
        .expect("parse succeeds");

    let sent = transport.requests_to(SQL_URL);
    assert_eq!(sent[0].json_body().expect("JSON body")["query"], json!("SELECT 1 AS n"));
    assert_eq!(payload.metadata.query_modified, Some(false));
}

#[rstest]
#[tokio::test]
async fn api_parse_sends_auth_and_follows_data_path(harness: Harness) {
    let body = json!({"result": {"items": [{"id": 1}, {"id": 2}]}});
    let transport = StubTransport::new().with_json(API_URL, &body);
    let source = SourceDescriptor::Api(ApiSource {
        endpoint: API_URL.to_owned(),
        method: HttpMethod::Get,
        headers: [("Authorization".to_owned(), "ignored".to_owned())].into(),
        credential: Some(CredentialSpec::new("bearer", "tok")),
        data_path: Some(DataPath::new("result.items")),
    });

    let payload = harness
        .service(&transport)
        .try_parse(ParseRequest::new(source))
        .await
        .expect("parse succeeds");

    assert_eq!(payload.metadata.row_count, 2);
    let sent = transport.requests_to(API_URL);
    assert_eq!(sent[0].headers.get("authorization"), Some("Bearer tok"));
}

#[rstest]
#[tokio::test]
async fn oversized_download_is_reported(harness: Harness) {
    let harness = harness.with_config(|config| config.with_max_file_size_mb(1));
    let transport =
        StubTransport::new().with_declared_body(CSV_URL, "a\n1\n", Some(2 * 1024 * 1024));

    let envelope = harness
        .service(&transport)
        .parse(ParseRequest::new(csv_source()))
        .await;

    assert_eq!(envelope.error_kind(), Some(ErrorKind::PayloadTooLarge));
    assert!(!envelope.error().unwrap_or_default().contains("token=t"));
}

#[rstest]
#[tokio::test]
async fn converts_and_uploads_parquet(harness: Harness) {
    let transport = StubTransport::new()
        .with_body(CSV_URL, PEOPLE)
        .with_status(OUTPUT_URL, 200);

    let payload = harness
        .service(&transport)
        .try_convert(ConversionRequest::new(csv_source(), OUTPUT_URL))
        .await
        .expect("conversion succeeds");

    assert_eq!(payload.metadata.rows, 3);
    assert_eq!(payload.metadata.columns, 2);
    assert_eq!(payload.metadata.schema.format, "parquet");
    let uploads = transport.requests_to(OUTPUT_URL);
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].method, HttpMethod::Put);
    let artifact = uploads[0].body.as_deref().unwrap_or_default();
    assert!(artifact.starts_with(b"PAR1"));
}

#[rstest]
#[tokio::test]
async fn conversion_applies_default_sql_limit(harness: Harness) {
    let transport = StubTransport::new()
        .with_json(SQL_URL, &json!([{"n": 1}]))
        .with_status(OUTPUT_URL, 200);

    harness
        .service(&transport)
        .try_convert(ConversionRequest::new(sql_source("select n from t"), OUTPUT_URL))
        .await
        .expect("conversion succeeds");

    let sent = transport.requests_to(SQL_URL);
    assert_eq!(
        sent[0].json_body().expect("JSON body")["query"],
        json!("select n from t LIMIT 100000")
    );
}

fn api_source() -> SourceDescriptor {
    SourceDescriptor::Api(ApiSource {
        endpoint: API_URL.to_owned(),
        method: HttpMethod::Get,
        headers: Default::default(),
        credential: None,
        data_path: None,
    })
}

#[rstest]
#[tokio::test]
async fn conversion_calls_get_longer_deadlines(harness: Harness) {
    let transport = StubTransport::new()
        .with_json(API_URL, &json!([{"id": 1}]))
        .with_json(SQL_URL, &json!([{"n": 1}]))
        .with_status(OUTPUT_URL, 200);
    let service = harness.service(&transport);

    for source in [api_source(), sql_source("select n from t")] {
        service
            .try_parse(ParseRequest::new(source.clone()))
            .await
            .expect("parse succeeds");
        service
            .try_convert(ConversionRequest::new(source, OUTPUT_URL))
            .await
            .expect("conversion succeeds");
    }

    let deadlines = |url: &str| {
        transport
            .requests_to(url)
            .iter()
            .map(|request| request.timeout)
            .collect::<Vec<_>>()
    };
    assert_eq!(
        deadlines(API_URL),
        [Duration::from_secs(30), Duration::from_secs(300)]
    );
    assert_eq!(
        deadlines(SQL_URL),
        [Duration::from_secs(30), Duration::from_secs(600)]
    );
}

#[rstest]
#[tokio::test]
async fn repeated_parses_serialize_identically(harness: Harness) {
    let body = json!([
        {"zeta": 1, "alpha": "a", "mid": {"b": 2, "a": 1}},
        {"alpha": "b", "extra": null, "zeta": 2.5},
        {"mid": [1, 2], "zeta": true}
    ]);
    let transport = StubTransport::new().with_json(API_URL, &body);
    let service = harness.service(&transport);
    let request = ParseRequest::new(api_source());

    let first = service.parse(request.clone()).await;
    let second = service.parse(request).await;

    assert!(first.is_success());
    let first = serde_json::to_vec(&first).expect("serialize first envelope");
    let second = serde_json::to_vec(&second).expect("serialize second envelope");
    assert_eq!(first, second);
}

#[rstest]
#[tokio::test]
async fn failed_upload_yields_upload_failure(harness: Harness) {
    let transport = StubTransport::new()
        .with_body(CSV_URL, PEOPLE)
        .with_status(OUTPUT_URL, 403);

    let envelope = harness
        .service(&transport)
        .convert(ConversionRequest::new(csv_source(), OUTPUT_URL))
        .await;

    assert!(!envelope.is_success());
    assert!(envelope.payload().is_none());
    assert_eq!(envelope.error_kind(), Some(ErrorKind::UploadFailure));
}

#[rstest]
#[tokio::test]
async fn processing_deadline_fails_request(harness: Harness) {
    let harness =
        harness.with_config(|config| config.with_max_processing_time(Duration::from_millis(50)));
    let transport = StubTransport::new().with_stall(CSV_URL);

    let envelope = harness
        .service(&transport)
        .parse(ParseRequest::new(csv_source()))
        .await;

    assert_eq!(envelope.error_kind(), Some(ErrorKind::SourceUnavailable));
    assert!(envelope.error().unwrap_or_default().contains("processing"));
    assert_eq!(std::fs::read_dir(harness.dir.path().join("scratch")).map_or(0, Iterator::count), 0);
}

#[rstest]
#[tokio::test]
async fn excess_requests_wait_for_a_permit(harness: Harness) {
    let deadline = Duration::from_millis(100);
    let harness = harness.with_config(|config| {
        config
            .with_max_concurrent_conversions(1)
            .with_max_processing_time(deadline)
    });
    let transport = StubTransport::new().with_stall(CSV_URL);
    let service = harness.service(&transport);

    let started = Instant::now();
    let (first, second) = tokio::join!(
        service.parse(ParseRequest::new(csv_source())),
        service.parse(ParseRequest::new(csv_source())),
    );

    assert!(!first.is_success());
    assert!(!second.is_success());
    assert!(started.elapsed() >= deadline * 2);
}

#[rstest]
#[tokio::test]
async fn parse_rows_include_hidden_geometry(harness: Harness) {
    let url = "https://files.example.com/points.geojson";
    let document = json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {"name": "A"},
            "geometry": {"type": "Point", "coordinates": [0.0, 1.0]}
        }]
    });
    let transport = StubTransport::new().with_json(url, &document);
    let source = SourceDescriptor::File(FileSource {
        url: url.to_owned(),
        format: FileFormat::GeoJson,
    });

    let payload = harness
        .service(&transport)
        .try_parse(ParseRequest::new(source))
        .await
        .expect("parse succeeds");

    assert_eq!(payload.metadata.geo_fields, ["_geometry"]);
    assert_eq!(payload.metadata.hidden_fields, ["_geometry", "_feature_index"]);
    assert!(payload.data[0].contains_key("_geometry"));
    assert!(!payload.metadata.columns.contains(&"_geometry".to_owned()));
}
