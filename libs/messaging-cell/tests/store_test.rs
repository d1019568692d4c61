use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use messaging_cell::models::{MessageContent, MessageKind, MessageScope, NewMessage};
use messaging_cell::services::{
    BlobStorage, MessageStore, SupabaseBlobStorage, SupabaseMessageStore,
};
use shared_utils::test_utils::TestConfig;

fn row(id: Uuid, created_at: &str, kind: &str, text: Option<&str>) -> serde_json::Value {
    json!({
        "id": id,
        "type": kind,
        "text": text,
        "image_url": null,
        "file_url": null,
        "file_name": null,
        "participants": ["doc-1", "pat-1"],
        "participants_key": "doc-1_pat-1",
        "appointment_id": null,
        "sender_id": "pat-1",
        "created_at": created_at
    })
}

#[tokio::test]
async fn list_filters_direct_thread_and_skips_bad_rows() {
    let mock_server = MockServer::start().await;
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/messages"))
        .and(query_param("participants_key", "eq.doc-1_pat-1"))
        .and(query_param("appointment_id", "is.null"))
        .and(query_param("order", "created_at.asc,id.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            row(first, "2025-06-01T09:00:00Z", "text", Some("c1")),
            row(Uuid::new_v4(), "2025-06-01T09:00:30Z", "image", None),
            row(second, "2025-06-01T09:01:00Z", "text", Some("c2"))
        ])))
        .mount(&mock_server)
        .await;

    let store = SupabaseMessageStore::new(&TestConfig::with_supabase_url(mock_server.uri()).to_app_config());
    let records = store
        .list(&MessageScope { participants_key: "doc-1_pat-1".into(), appointment_id: None })
        .await
        .unwrap();

    assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![first, second]);
    assert_eq!(records[0].kind(), MessageKind::Text);
}

#[tokio::test]
async fn list_filters_on_appointment() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/messages"))
        .and(query_param("appointment_id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = SupabaseMessageStore::new(&TestConfig::with_supabase_url(mock_server.uri()).to_app_config());
    let records = store
        .list(&MessageScope { participants_key: "doc-1_pat-1".into(), appointment_id: Some(appointment_id) })
        .await
        .unwrap();

    assert!(records.is_empty());
}

#[tokio::test]
async fn insert_returns_stored_row() {
    let mock_server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/messages"))
        .and(header("Prefer", "return=representation"))
        .and(body_partial_json(json!({ "type": "text", "text": "cipher", "participants_key": "doc-1_pat-1" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            row(id, "2025-06-01T09:00:00Z", "text", Some("cipher"))
        ])))
        .mount(&mock_server)
        .await;

    let store = SupabaseMessageStore::new(&TestConfig::with_supabase_url(mock_server.uri()).to_app_config());
    let record = store
        .insert(&NewMessage {
            sender_id: "pat-1".into(),
            participants: vec!["doc-1".into(), "pat-1".into()],
            participants_key: "doc-1_pat-1".into(),
            appointment_id: None,
            content: MessageContent::Text { text: "cipher".into() },
        })
        .await
        .unwrap();

    assert_eq!(record.id, id);
}

#[tokio::test]
async fn upload_streams_to_bucket() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/storage/v1/object/chat-files/doc-1_pat-1/scan.pdf"))
        .and(header("content-type", "application/pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Key": "chat-files/doc-1_pat-1/scan.pdf" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let storage = SupabaseBlobStorage::new(&TestConfig::with_supabase_url(mock_server.uri()).to_app_config());
    let url = storage
        .upload(
            b"%PDF".to_vec(),
            "doc-1_pat-1/scan.pdf",
            "application/pdf",
            std::sync::Arc::new(|_: messaging_cell::models::UploadProgress| {}),
        )
        .await
        .unwrap();

    assert_eq!(
        url,
        format!("{}/storage/v1/object/public/chat-files/doc-1_pat-1/scan.pdf", mock_server.uri())
    );
}

#[tokio::test]
async fn rejected_upload_is_an_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/storage/v1/object/chat-files/x"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({ "error": "Duplicate" })))
        .mount(&mock_server)
        .await;

    let storage = SupabaseBlobStorage::new(&TestConfig::with_supabase_url(mock_server.uri()).to_app_config());
    let result = storage
        .upload(vec![1], "x", "text/plain", std::sync::Arc::new(|_: messaging_cell::models::UploadProgress| {}))
        .await;

    assert!(result.is_err());
}
