#![allow(dead_code)]

use cdseapi::{Client, ClientConfig};
use serde_json::{Value, json};

/// Runs blocking client code off the async test runtime.
pub async fn blocking<F, T>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .expect("blocking task panicked")
}

/// Client pointed at a mock server. Must be created inside [`blocking`].
pub fn client_for(uri: &str) -> Client {
    Client::from_config(ClientConfig {
        username: "alice@example.org".to_string(),
        password: "hunter2".to_string(),
        catalog_url: format!("{uri}/odata/v1"),
        token_url: format!("{uri}/auth/token"),
        download_url: format!("{uri}/zipper/odata/v1"),
        verify: true,
    })
    .expect("client")
    .with_progress(false)
}

pub fn product_entry(id: &str) -> Value {
    json!({
        "@odata.mediaContentType": "application/octet-stream",
        "Id": id,
        "Name": format!("S2A_MSIL2A_20230105T101401_N0509_R022_{id}.SAFE"),
        "ContentType": "application/octet-stream",
        "ContentLength": 11,
        "Online": true,
        "ContentDate": {"Start": "2023-01-05T10:14:01.024Z", "End": "2023-01-05T10:14:01.024Z"},
        "Footprint": "geography'SRID=4326;POLYGON ((10 45, 11 45, 11 46, 10 45))'",
        "Attributes": [
            {"@odata.type": "#OData.CSC.DoubleAttribute", "Name": "cloudCover", "Value": 12.5, "ValueType": "Double"},
            {"@odata.type": "#OData.CSC.StringAttribute", "Name": "tileId", "Value": "32TQM", "ValueType": "String"}
        ]
    })
}

pub fn page(ids: impl IntoIterator<Item = String>) -> Value {
    let value: Vec<Value> = ids.into_iter().map(|id| product_entry(&id)).collect();
    json!({ "@odata.context": "$metadata#Products(Attributes())", "value": value })
}

pub fn ids(range: std::ops::Range<usize>) -> Vec<String> {
    range.map(|i| format!("id-{i}")).collect()
}
