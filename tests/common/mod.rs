//! Mock Data Store endpoints shared by the integration tests.
#![allow(dead_code)]

use eumetsat_datastore::{Client, Credentials, Endpoints};
use httpmock::prelude::*;
use httpmock::Mock;
use serde_json::{json, Value};

pub const COLLECTION: &str = "EO:EUM:DAT:METOP:GLB-SST-NC";
pub const TOKEN: &str = "tok-1";
/// `key:secret`, base64 encoded.
pub const BASIC_AUTH: &str = "Basic a2V5OnNlY3JldA==";
pub const SEARCH_PATH: &str = "/data/search-products/os";

pub fn client(server: &MockServer) -> Client {
    let endpoints = Endpoints::with_base(&server.base_url()).unwrap();
    Client::new(Credentials::new("key", "secret"), endpoints)
}

pub async fn mock_token<'a>(server: &'a MockServer, token: &str, expires_in: u64) -> Mock<'a> {
    let body = json!({
        "access_token": token,
        "token_type": "Bearer",
        "scope": "am_application_scope default",
        "expires_in": expires_in,
    });
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/token")
                .header("authorization", BASIC_AUTH)
                .body("grant_type=client_credentials");
            then.status(200).json_body(body);
        })
        .await
}

pub async fn mock_token_status(server: &MockServer, status: u16) -> Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(POST).path("/token");
            then.status(status)
                .json_body(json!({"error_description": "Client Authentication failed.", "error": "invalid_client"}));
        })
        .await
}

pub fn feature(identifier: &str, size_kib: u64) -> Value {
    json!({
        "type": "Feature",
        "id": identifier,
        "geometry": null,
        "properties": {
            "identifier": identifier,
            "parentIdentifier": COLLECTION,
            "title": identifier,
            "productInformation": {
                "productType": "GLB-SST-NC",
                "size": size_kib,
            },
        },
    })
}

/// `count` features named `product-<n>` for n in `first..first + count`, sized n + 1 KiB.
pub fn features(first: usize, count: usize) -> Vec<Value> {
    (first..first + count)
        .map(|n| feature(&format!("product-{n:04}"), n as u64 + 1))
        .collect()
}

/// A search page starting at `offset`, served only to authorized requests.
pub async fn mock_page(server: &MockServer, offset: usize, features: Vec<Value>) -> Mock<'_> {
    let body = json!({
        "type": "FeatureCollection",
        "totalResults": features.len(),
        "itemsPerPage": 1000,
        "features": features,
    });
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path(SEARCH_PATH)
                .query_param("format", "json")
                .query_param("pi", COLLECTION)
                .query_param("si", offset.to_string())
                .query_param("c", "1000")
                .header("authorization", format!("Bearer {TOKEN}"));
            then.status(200).json_body(body);
        })
        .await
}
