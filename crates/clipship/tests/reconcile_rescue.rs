//! Rescue relocation: write-backs must survive identity drift.

mod common;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use clipship::config::FieldSchema;
use clipship::dispatch::reconcile::{failure_fields, Reconciler, RescueKey, WriteOutcome};
use clipship::store::{JobRecord, TableClient};

use common::builders::RecordBuilder;
use common::harness::{mount_list, mount_token, store_config, update_path};

const SOURCE: &str = "/srv/videos/clip.mp4";
const ACCOUNT: &str = "studio";
const SCHEDULED: i64 = 1_786_075_200_000;

fn original_record() -> JobRecord {
    let raw = RecordBuilder::new("recOLD00001")
        .account(ACCOUNT)
        .source_path(SOURCE)
        .scheduled_at(SCHEDULED)
        .title("Morning run")
        .build();
    let raw: clipship::store::RawRecord = serde_json::from_value(raw).unwrap();
    JobRecord::decode(&raw, &FieldSchema::default())
}

fn write_payload(schema: &FieldSchema) -> serde_json::Map<String, serde_json::Value> {
    failure_fields(
        schema,
        &Default::default(),
        "publish failed",
        "host-abc",
        "2026-08-07T12:00:00+08:00",
    )
}

/// Mounts a one-shot update rejection, then a permanent acceptance.
async fn mount_reject_then_accept(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(update_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 1254043,
            "msg": "RecordIdNotFound",
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(update_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 0, "msg": "ok" })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn rescue_relocates_record_and_writes_once() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_reject_then_accept(&server).await;

    // The snapshot now holds the same logical record under a new identity,
    // with an unrelated field difference (edited title), plus noise.
    mount_list(
        &server,
        vec![
            RecordBuilder::new("recOTHER001")
                .account("someone-else")
                .source_path("/srv/videos/other.mp4")
                .scheduled_at(SCHEDULED)
                .build(),
            RecordBuilder::new("recNEW00002")
                .account(ACCOUNT)
                .source_path(SOURCE)
                .scheduled_at(SCHEDULED)
                .title("Edited by an operator")
                .extra("reviewer_note", json!("moved from the intake table"))
                .build(),
        ],
    )
    .await;

    let schema = FieldSchema::default();
    let client = TableClient::new(store_config(&server)).unwrap();
    let token = client.authenticate().await.unwrap();

    let original = original_record();
    let rescue = RescueKey::of(&original);
    let reconciler = Reconciler::new(&client, &schema);

    let outcome = reconciler
        .reconcile(&token, &original.identity, &rescue, write_payload(&schema))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        WriteOutcome::Rescued {
            identity: "recNEW00002".to_string()
        }
    );

    // Exactly one write landed, and it targeted the relocated identity.
    let bodies = common::harness::update_bodies(&server).await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["records"][0]["record_id"], "recOLD00001");
    assert_eq!(bodies[1]["records"][0]["record_id"], "recNEW00002");
}

#[tokio::test]
async fn direct_write_success_skips_rescue() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("POST"))
        .and(path(update_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 0, "msg": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    // Rescue would need a listing; none may happen.
    Mock::given(method("GET"))
        .and(path(common::harness::records_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": { "items": [], "has_more": false },
        })))
        .expect(0)
        .mount(&server)
        .await;

    let schema = FieldSchema::default();
    let client = TableClient::new(store_config(&server)).unwrap();
    let token = client.authenticate().await.unwrap();

    let original = original_record();
    let rescue = RescueKey::of(&original);
    let reconciler = Reconciler::new(&client, &schema);

    let outcome = reconciler
        .reconcile(&token, &original.identity, &rescue, write_payload(&schema))
        .await
        .unwrap();
    assert_eq!(outcome, WriteOutcome::Direct);
}

#[tokio::test]
async fn rescue_without_match_is_unrecoverable() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("POST"))
        .and(path(update_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 1254043,
            "msg": "RecordIdNotFound",
        })))
        .expect(1)
        .mount(&server)
        .await;

    mount_list(
        &server,
        vec![RecordBuilder::new("recOTHER001")
            .account(ACCOUNT)
            .source_path("/srv/videos/different.mp4")
            .scheduled_at(SCHEDULED)
            .build()],
    )
    .await;

    let schema = FieldSchema::default();
    let client = TableClient::new(store_config(&server)).unwrap();
    let token = client.authenticate().await.unwrap();

    let original = original_record();
    let rescue = RescueKey::of(&original);
    let reconciler = Reconciler::new(&client, &schema);

    let outcome = reconciler
        .reconcile(&token, &original.identity, &rescue, write_payload(&schema))
        .await
        .unwrap();
    assert_eq!(outcome, WriteOutcome::Unrecoverable);
}

#[tokio::test]
async fn rescue_listing_failure_is_unrecoverable_not_fatal() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("POST"))
        .and(path(update_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 1254043,
            "msg": "RecordIdNotFound",
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(common::harness::records_path()))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let schema = FieldSchema::default();
    let client = TableClient::new(store_config(&server)).unwrap();
    let token = client.authenticate().await.unwrap();

    let original = original_record();
    let rescue = RescueKey::of(&original);
    let reconciler = Reconciler::new(&client, &schema);

    let outcome = reconciler
        .reconcile(&token, &original.identity, &rescue, write_payload(&schema))
        .await
        .unwrap();
    assert_eq!(outcome, WriteOutcome::Unrecoverable);
}
