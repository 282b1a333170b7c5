//! Request and response shapes of the collaborator clients, checked against
//! local fakes of the vector store, lexical store and completion endpoint.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::StatusCode;
use axum::routing::{post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use unified_rag::config::{GenerationConfig, LexicalConfig, VectorConfig};
use unified_rag::generation::CompletionClient;
use unified_rag::opensearch::OpenSearchStore;
use unified_rag::qdrant::QdrantStore;
use unified_rag_core::generation::{GenerationError, Generator};
use unified_rag_core::models::{CanonicalDocument, IndexPoint, SearchFilter, SourceKind};
use unified_rag_core::store::{LexicalStore, VectorStore};

type Captured = Arc<Mutex<Vec<(String, String)>>>;

fn captured() -> Captured {
    Arc::new(Mutex::new(Vec::new()))
}

// ─── Qdrant ─────────────────────────────────────────────────────────

async fn qdrant_upsert(
    State(seen): State<Captured>,
    Path(collection): Path<String>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Json<Value> {
    seen.lock().unwrap().push((
        format!("upsert {} {}", collection, query.unwrap_or_default()),
        String::from_utf8(body.to_vec()).unwrap(),
    ));
    Json(json!({ "status": "ok", "result": { "status": "completed" } }))
}

async fn qdrant_search(
    State(seen): State<Captured>,
    Path(collection): Path<String>,
    body: Bytes,
) -> Json<Value> {
    seen.lock().unwrap().push((
        format!("search {}", collection),
        String::from_utf8(body.to_vec()).unwrap(),
    ));
    Json(json!({
        "result": [
            { "id": 1, "score": 0.9, "payload": { "text": "Restart the service", "source": "confluence:123" } }
        ]
    }))
}

#[tokio::test]
async fn test_qdrant_upsert_and_search_shapes() {
    let seen = captured();
    let base = common::spawn(
        Router::new()
            .route("/collections/{c}/points", put(qdrant_upsert))
            .route("/collections/{c}/points/search", post(qdrant_search))
            .with_state(seen.clone()),
    )
    .await;

    let store = QdrantStore::new(&VectorConfig {
        url: base,
        collection: "unified_docs".to_string(),
        timeout_secs: 5,
    })
    .unwrap();

    let doc = CanonicalDocument::wiki_page("123", "Runbook", "Restart the service");
    store
        .upsert(&[IndexPoint::new(doc.clone(), vec![0.0; 4])])
        .await
        .unwrap();

    let hits = store
        .search(
            &[0.0; 4],
            8,
            &SearchFilter {
                kind: Some(SourceKind::Wiki),
            },
        )
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].score, 0.9);
    assert_eq!(hits[0].payload["source"], "confluence:123");

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].0, "upsert unified_docs wait=true");
    let upsert: Value = serde_json::from_str(&seen[0].1).unwrap();
    assert_eq!(upsert["points"][0]["id"], json!(doc.point_id().0));
    assert_eq!(upsert["points"][0]["payload"]["text"], "Runbook\n\nRestart the service");

    assert_eq!(seen[1].0, "search unified_docs");
    let search: Value = serde_json::from_str(&seen[1].1).unwrap();
    assert_eq!(search["limit"], 8);
    assert_eq!(search["with_payload"], true);
    assert_eq!(search["filter"]["must"][0]["match"]["value"], "confluence");
}

#[tokio::test]
async fn test_qdrant_error_status_is_error() {
    let base = common::spawn(Router::new().route(
        "/collections/{c}/points/search",
        post(|| async { (StatusCode::NOT_FOUND, "collection not found") }),
    ))
    .await;
    let store = QdrantStore::new(&VectorConfig {
        url: base,
        collection: "missing".to_string(),
        timeout_secs: 5,
    })
    .unwrap();

    let err = store
        .search(&[0.0; 4], 8, &SearchFilter::default())
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("collection not found"));
}

// ─── OpenSearch ─────────────────────────────────────────────────────

fn opensearch(base: String) -> OpenSearchStore {
    OpenSearchStore::new(&LexicalConfig {
        url: base,
        index: "unified_docs".to_string(),
        timeout_secs: 5,
        accept_invalid_certs: false,
    })
    .unwrap()
}

#[tokio::test]
async fn test_opensearch_bulk_and_search_shapes() {
    let seen = captured();
    let base = common::spawn(
        Router::new()
            .route(
                "/_bulk",
                post(|State(seen): State<Captured>, body: Bytes| async move {
                    seen.lock()
                        .unwrap()
                        .push(("bulk".to_string(), String::from_utf8(body.to_vec()).unwrap()));
                    Json(json!({ "errors": false, "items": [] }))
                }),
            )
            .route(
                "/{index}/_search",
                post(
                    |State(seen): State<Captured>, Path(index): Path<String>, body: Bytes| async move {
                        seen.lock()
                            .unwrap()
                            .push((index, String::from_utf8(body.to_vec()).unwrap()));
                        Json(json!({
                            "hits": { "hits": [
                                { "_score": 3.2, "_source": { "text": "Disk full\n\n", "source": "jira:ENG-7", "kind": "jira" } }
                            ] }
                        }))
                    },
                ),
            )
            .with_state(seen.clone()),
    )
    .await;
    let store = opensearch(base);

    store
        .index(&[CanonicalDocument::issue("ENG-7", "Disk full", None)])
        .await
        .unwrap();
    let hits = store
        .search("disk", 8, &SearchFilter::default())
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].score, 3.2);
    assert_eq!(hits[0].payload["source"], "jira:ENG-7");

    let seen = seen.lock().unwrap();
    let lines: Vec<&str> = seen[0].1.lines().collect();
    let action: Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(action["index"]["_id"], "jira:ENG-7");
    assert_eq!(seen[1].0, "unified_docs");
    let search: Value = serde_json::from_str(&seen[1].1).unwrap();
    assert_eq!(search["query"]["match"]["text"], "disk");
    assert_eq!(search["size"], 8);
}

#[tokio::test]
async fn test_opensearch_bulk_item_errors_fail_the_write() {
    let base = common::spawn(Router::new().route(
        "/_bulk",
        post(|| async {
            Json(json!({
                "errors": true,
                "items": [
                    { "index": { "_id": "jira:ENG-7", "status": 400, "error": { "reason": "mapper_parsing_exception" } } }
                ]
            }))
        }),
    ))
    .await;

    let err = opensearch(base)
        .index(&[CanonicalDocument::issue("ENG-7", "Disk full", None)])
        .await
        .unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("rejected 1 of 1"));
    assert!(message.contains("mapper_parsing_exception"));
}

// ─── Completion endpoint ────────────────────────────────────────────

fn completion_client(base: String, timeout_secs: u64) -> CompletionClient {
    CompletionClient::new(&GenerationConfig {
        url: base,
        model: "llm".to_string(),
        max_tokens: 512,
        temperature: 0.1,
        timeout_secs,
    })
    .unwrap()
}

#[tokio::test]
async fn test_completion_request_shape() {
    let seen = captured();
    let base = common::spawn(
        Router::new()
            .route(
                "/v1/completions",
                post(|State(seen): State<Captured>, body: Bytes| async move {
                    seen.lock()
                        .unwrap()
                        .push(("completion".to_string(), String::from_utf8(body.to_vec()).unwrap()));
                    Json(json!({ "choices": [ { "text": "Restart it [1]." } ] }))
                }),
            )
            .with_state(seen.clone()),
    )
    .await;

    let answer = completion_client(base, 5).generate("PROMPT").await.unwrap();
    assert_eq!(answer, "Restart it [1].");

    let body: Value = serde_json::from_str(&seen.lock().unwrap()[0].1).unwrap();
    assert_eq!(body["model"], "llm");
    assert_eq!(body["prompt"], "PROMPT");
    assert_eq!(body["max_tokens"], 512);
    assert!((body["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
}

#[tokio::test]
async fn test_completion_error_taxonomy() {
    let base = common::spawn(
        Router::new()
            .route(
                "/v1/completions",
                post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "overloaded") }),
            ),
    )
    .await;
    let err = completion_client(base, 5).generate("p").await.unwrap_err();
    assert!(matches!(err, GenerationError::Status { status: 503, .. }));

    let slow = common::spawn(Router::new().route(
        "/v1/completions",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(json!({ "choices": [ { "text": "late" } ] }))
        }),
    ))
    .await;
    let err = completion_client(slow, 1).generate("p").await.unwrap_err();
    assert!(matches!(err, GenerationError::Timeout(_)));

    let empty = common::spawn(Router::new().route(
        "/v1/completions",
        post(|| async { Json(json!({ "choices": [] })) }),
    ))
    .await;
    let err = completion_client(empty, 5).generate("p").await.unwrap_err();
    assert!(matches!(err, GenerationError::Malformed(_)));
}
