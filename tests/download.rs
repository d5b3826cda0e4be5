mod support;

use cdseapi::{Error, Mission, Product, Query};
use reqwest::StatusCode;
use std::collections::BTreeMap;
use support::{blocking, client_for, ids, page};
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "eyJhbGciOi.test.token";

async fn mount_token(server: &MockServer, expected_calls: u64) {
    mount_token_lasting(server, 600, expected_calls).await;
}

async fn mount_token_lasting(server: &MockServer, expires_in: u64, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .and(body_string_contains("grant_type=password"))
        .and(body_string_contains("client_id=cdse-public"))
        .and(body_string_contains("username=alice%40example.org"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": TOKEN,
            "expires_in": expires_in,
            "token_type": "Bearer"
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_payload(server: &MockServer, id: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/zipper/odata/v1/Products({id})/$value")))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .expect(1)
        .mount(server)
        .await;
}

fn product(uri: &str, id: &str, name: &str) -> Product {
    Product {
        id: id.to_string(),
        name: name.to_string(),
        content_type: Some("application/octet-stream".to_string()),
        content_length: None,
        online: Some(true),
        origin_date: None,
        publication_date: None,
        content_start: None,
        content_end: None,
        footprint: None,
        attributes: BTreeMap::new(),
        download_url: format!("{uri}/zipper/odata/v1/Products({id})/$value"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn download_writes_exact_bytes() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    let payload: Vec<u8> = (0..=255u8).cycle().take(200_000).collect();
    mount_payload(&server, "id-0", &payload).await;

    let dir = TempDir::new().unwrap();
    let out_dir = dir.path().join("nested/out");
    let uri = server.uri();
    let p = product(&uri, "id-0", "S1A_EW_GRDM_1SDH_X.SAFE");
    let target = {
        let out_dir = out_dir.clone();
        blocking(move || client_for(&uri).download(&p, &out_dir))
            .await
            .unwrap()
    };

    assert_eq!(target, out_dir.join("S1A_EW_GRDM_1SDH_X.SAFE.zip"));
    assert_eq!(std::fs::read(&target).unwrap(), payload);
    assert!(!out_dir.join("S1A_EW_GRDM_1SDH_X.SAFE.zip.part").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn download_by_id_writes_to_target_path() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_payload(&server, "abc-123", b"zip-bytes").await;

    let dir = TempDir::new().unwrap();
    let target = dir.path().join("product.zip");
    let uri = server.uri();
    let written = {
        let target = target.clone();
        blocking(move || client_for(&uri).download_by_id("abc-123", &target))
            .await
            .unwrap()
    };

    assert_eq!(written, target);
    assert_eq!(std::fs::read(&target).unwrap(), b"zip-bytes");
}

#[tokio::test(flavor = "multi_thread")]
async fn query_then_download_all_reuses_a_live_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/odata/v1/Products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(ids(0..2))))
        .expect(1)
        .mount(&server)
        .await;
    mount_token(&server, 1).await;
    mount_payload(&server, "id-0", b"first").await;
    mount_payload(&server, "id-1", b"second").await;

    let dir = TempDir::new().unwrap();
    let out_dir = dir.path().to_path_buf();
    let uri = server.uri();
    let written = blocking(move || {
        let client = client_for(&uri);
        let query = Query::new(Mission::Sentinel2, "2023-01-01", "2023-01-15").unwrap();
        let products = client.query(&query)?;
        client.download_all(&products, &out_dir)
    })
    .await
    .unwrap();

    assert_eq!(written.len(), 2);
    assert_eq!(std::fs::read(&written[0]).unwrap(), b"first");
    assert_eq!(std::fs::read(&written[1]).unwrap(), b"second");
    assert!(
        written[1]
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("id-1.SAFE.zip")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn download_all_renews_an_expiring_token() {
    let server = MockServer::start().await;
    // 30 s is inside the renewal margin, so every product needs a new token.
    mount_token_lasting(&server, 30, 3).await;
    mount_payload(&server, "a", b"1").await;
    mount_payload(&server, "b", b"2").await;
    mount_payload(&server, "c", b"3").await;

    let dir = TempDir::new().unwrap();
    let out_dir = dir.path().to_path_buf();
    let uri = server.uri();
    let products = vec![
        product(&uri, "a", "first"),
        product(&uri, "b", "second"),
        product(&uri, "c", "third"),
    ];
    let written = blocking(move || client_for(&uri).download_all(&products, &out_dir))
        .await
        .unwrap();

    assert_eq!(written.len(), 3);
    assert_eq!(std::fs::read(&written[2]).unwrap(), b"3");
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_item_keeps_earlier_files_and_surfaces_status() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_payload(&server, "ok", b"kept").await;
    Mock::given(method("GET"))
        .and(path("/zipper/odata/v1/Products(gone)/$value"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(serde_json::json!({"detail": "Product not found"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    // never reached: the batch stops at the first failure
    Mock::given(method("GET"))
        .and(path("/zipper/odata/v1/Products(later)/$value"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let out_dir = dir.path().to_path_buf();
    let uri = server.uri();
    let products = vec![
        product(&uri, "ok", "first"),
        product(&uri, "gone", "second"),
        product(&uri, "later", "third"),
    ];
    let result = {
        let out_dir = out_dir.clone();
        blocking(move || client_for(&uri).download_all(&products, &out_dir)).await
    };

    let err = result.unwrap_err();
    assert!(format!("{err:#}").contains("failed to download second"));
    match err.downcast_ref::<Error>() {
        Some(Error::Http { status, message, .. }) => {
            assert_eq!(*status, StatusCode::NOT_FOUND);
            assert!(message.contains("Product not found"));
        }
        other => panic!("expected HTTP error, got {other:?}"),
    }

    assert_eq!(std::fs::read(out_dir.join("first.zip")).unwrap(), b"kept");
    assert!(!out_dir.join("second.zip").exists());
    assert!(!out_dir.join("second.zip.part").exists());
    assert!(!out_dir.join("third.zip").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_credentials_surface_token_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Invalid user credentials"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let out_dir = dir.path().to_path_buf();
    let uri = server.uri();
    let products = vec![product(&uri, "id-0", "first")];
    let result = blocking(move || client_for(&uri).download_all(&products, &out_dir)).await;

    let err = result.unwrap_err();
    match err.downcast_ref::<Error>() {
        Some(Error::Token { status, message }) => {
            assert_eq!(*status, StatusCode::UNAUTHORIZED);
            assert!(message.contains("Invalid user credentials"));
        }
        other => panic!("expected token error, got {other:?}"),
    }
}

#[test]
fn empty_batch_needs_no_token() {
    // Port 1 is closed, so any request would fail.
    let dir = TempDir::new().unwrap();
    let written = client_for("http://127.0.0.1:1")
        .download_all(&[], dir.path())
        .unwrap();
    assert!(written.is_empty());
}
