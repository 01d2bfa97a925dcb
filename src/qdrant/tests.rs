use super::*;
use crate::config::QdrantConfig;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(server: &MockServer) -> QdrantClient {
    QdrantClient::new(&QdrantConfig {
        url: server.uri(),
        api_key: "test-key".to_string(),
        collection: "kimia-assess".to_string(),
        top_k: 5,
        vector_dimension: 1536,
    })
    .expect("should create client")
}

#[test]
fn distance_serializes_as_pascal_case() {
    assert_eq!(
        serde_json::to_string(&Distance::Cosine).expect("should serialize"),
        r#""Cosine""#
    );
}

#[test]
fn payload_origin_defaults_to_empty() {
    let payload = DocumentPayload {
        text: "content".to_string(),
        source: None,
    };
    assert_eq!(payload.origin(), "");

    let payload = DocumentPayload {
        text: "content".to_string(),
        source: Some("sample_data".to_string()),
    };
    assert_eq!(payload.origin(), "sample_data");
}

#[tokio::test]
async fn list_collections_returns_names() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/collections"))
        .and(header("api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {
                "collections": [{"name": "kimia-assess"}, {"name": "other"}],
            },
            "status": "ok",
            "time": 0.0,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let collections = client.list_collections().expect("listing should succeed");
    assert_eq!(collections, vec!["kimia-assess", "other"]);
}

#[tokio::test]
async fn collection_exists_checks_membership() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/collections"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"collections": [{"name": "kimia-assess"}]},
            "status": "ok",
            "time": 0.0,
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    assert!(client
        .collection_exists("kimia-assess")
        .expect("check should succeed"));
    assert!(!client
        .collection_exists("missing")
        .expect("check should succeed"));
}

#[tokio::test]
async fn collection_info_reports_point_count() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/collections/kimia-assess"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"status": "green", "points_count": 4},
            "status": "ok",
            "time": 0.0,
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let info = client
        .collection_info("kimia-assess")
        .expect("info should succeed");
    assert_eq!(info.status, "green");
    assert_eq!(info.points_count, Some(4));
}

#[tokio::test]
async fn create_collection_sends_vector_params() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/collections/kimia-assess"))
        .and(body_partial_json(json!({
            "vectors": {"size": 1536, "distance": "Cosine"},
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": true,
            "status": "ok",
            "time": 0.0,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    client
        .create_collection("kimia-assess", 1536, Distance::Cosine)
        .expect("creation should succeed");
}

#[tokio::test]
async fn upsert_points_waits_for_write() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/collections/kimia-assess/points"))
        .and(query_param("wait", "true"))
        .and(body_partial_json(json!({
            "points": [{
                "id": 0,
                "vector": [0.5, 0.5],
                "payload": {"text": "doc", "source": "sample_data"},
            }],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"operation_id": 0, "status": "completed"},
            "status": "ok",
            "time": 0.0,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    client
        .upsert_points(
            "kimia-assess",
            vec![PointStruct {
                id: 0,
                vector: vec![0.5, 0.5],
                payload: DocumentPayload {
                    text: "doc".to_string(),
                    source: Some("sample_data".to_string()),
                },
            }],
        )
        .expect("upsert should succeed");
}

#[tokio::test]
async fn search_preserves_rank_order() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/collections/kimia-assess/points/search"))
        .and(body_partial_json(json!({
            "limit": 2,
            "with_payload": true,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [
                {"id": 3, "score": 0.97, "payload": {"text": "best", "source": "a"}},
                {"id": 1, "score": 0.42, "payload": {"text": "worse", "source": "b"}},
            ],
            "status": "ok",
            "time": 0.0,
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let hits = client
        .search("kimia-assess", vec![0.1, 0.2], 2)
        .expect("search should succeed");

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, PointId::Num(3));
    assert!(hits[0].score > hits[1].score);
    assert_eq!(
        hits[0].payload.as_ref().map(|p| p.text.as_str()),
        Some("best")
    );
}

#[tokio::test]
async fn missing_collection_is_a_vector_store_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/collections/missing/points/search"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "status": {"error": "Collection `missing` doesn't exist!"},
            "time": 0.0,
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client
        .search("missing", vec![0.1], 5)
        .expect_err("search should fail");
    match err {
        ChatError::VectorStore(message) => assert!(message.contains("doesn't exist")),
        other => panic!("Expected vector store error, got {other:?}"),
    }
}

#[tokio::test]
async fn auth_failure_maps_to_network_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/collections"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "status": {"error": "Invalid api-key"},
            "time": 0.0,
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let result = client.list_collections();
    assert!(matches!(result, Err(ChatError::Network(_))));
}

#[test]
fn connection_failure_maps_to_network_error() {
    let client = QdrantClient::new(&QdrantConfig {
        url: "http://127.0.0.1:1".to_string(),
        api_key: "key".to_string(),
        collection: "kimia-assess".to_string(),
        top_k: 5,
        vector_dimension: 1536,
    })
    .expect("should create client");

    let result = client.list_collections();
    assert!(matches!(result, Err(ChatError::Network(_))));
}
