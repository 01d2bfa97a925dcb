use super::*;
use crate::ChatError;
use crate::config::OpenAiConfig;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn qdrant_config(server: &MockServer) -> QdrantConfig {
    QdrantConfig {
        url: server.uri(),
        api_key: "test-key".to_string(),
        collection: "kimia-assess".to_string(),
        top_k: 5,
        vector_dimension: 1536,
    }
}

fn clients(server: &MockServer) -> (QdrantClient, OpenAiClient) {
    let qdrant = QdrantClient::new(&qdrant_config(server)).expect("should create qdrant client");
    let openai = OpenAiClient::new(&OpenAiConfig {
        api_key: "sk-test".to_string(),
        chat_model: "gpt-4".to_string(),
        embedding_model: "text-embedding-ada-002".to_string(),
        temperature: 0.1,
    })
    .expect("should create openai client")
    .with_base_url(Url::parse(&server.uri()).expect("server uri should parse"));
    (qdrant, openai)
}

fn mock_embeddings(count: usize) -> serde_json::Value {
    let data: Vec<serde_json::Value> = (0..count)
        .map(|i| json!({"index": i, "embedding": [0.1, 0.2]}))
        .collect();
    json!({"data": data})
}

#[test]
fn sample_corpus_is_fixed() {
    assert_eq!(SAMPLE_CORPUS.len(), 4);
    assert_eq!(
        SAMPLE_CORPUS[0],
        "KIMIA Assess is a comprehensive assessment platform for medical imaging."
    );
    assert_eq!(SAMPLE_SOURCE, "sample_data");
}

#[tokio::test]
async fn existing_collection_is_a_no_op() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/collections"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"collections": [{"name": "kimia-assess"}]},
            "status": "ok",
            "time": 0.0,
        })))
        .expect(1)
        .mount(&server)
        .await;

    // No create/upsert/embedding mocks mounted: any such call would 404.
    let (qdrant, openai) = clients(&server);
    let outcome =
        ensure_collection(&qdrant, &openai, &qdrant_config(&server)).expect("should succeed");
    assert_eq!(outcome, BootstrapOutcome::AlreadyExists);
}

#[tokio::test]
async fn fresh_collection_is_created_and_seeded_with_ids_zero_to_three() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/collections"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"collections": []},
            "status": "ok",
            "time": 0.0,
        })))
        .mount(&server)
        .await;

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

    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_embeddings(4)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/collections/kimia-assess/points"))
        .and(body_partial_json(json!({
            "points": [
                {"id": 0, "payload": {"text": SAMPLE_CORPUS[0], "source": "sample_data"}},
                {"id": 1, "payload": {"text": SAMPLE_CORPUS[1], "source": "sample_data"}},
                {"id": 2, "payload": {"text": SAMPLE_CORPUS[2], "source": "sample_data"}},
                {"id": 3, "payload": {"text": SAMPLE_CORPUS[3], "source": "sample_data"}},
            ],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"operation_id": 0, "status": "completed"},
            "status": "ok",
            "time": 0.0,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (qdrant, openai) = clients(&server);
    let outcome =
        ensure_collection(&qdrant, &openai, &qdrant_config(&server)).expect("should succeed");
    assert_eq!(
        outcome,
        BootstrapOutcome::Created {
            seeded_documents: 4
        }
    );
}

#[tokio::test]
async fn seeding_failure_after_creation_is_reported_not_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/collections"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"collections": []},
            "status": "ok",
            "time": 0.0,
        })))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/collections/kimia-assess"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": true,
            "status": "ok",
            "time": 0.0,
        })))
        .mount(&server)
        .await;

    // Embedding the sample corpus fails; the collection is still created.
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"message": "The server had an error"},
        })))
        .mount(&server)
        .await;

    let (qdrant, openai) = clients(&server);
    let outcome =
        ensure_collection(&qdrant, &openai, &qdrant_config(&server)).expect("should succeed");
    assert_eq!(
        outcome,
        BootstrapOutcome::Created {
            seeded_documents: 0
        }
    );
}

#[tokio::test]
async fn creation_failure_propagates() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/collections"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"collections": []},
            "status": "ok",
            "time": 0.0,
        })))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/collections/kimia-assess"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "status": {"error": "Bad request"},
            "time": 0.0,
        })))
        .mount(&server)
        .await;

    let (qdrant, openai) = clients(&server);
    let result = ensure_collection(&qdrant, &openai, &qdrant_config(&server));
    assert!(matches!(result, Err(ChatError::VectorStore(_))));
}
