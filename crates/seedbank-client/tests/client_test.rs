//! Contract tests for SeedbankClient against a mocked accession API.
//!
//! | Method | Path | Test |
//! |--------|------|------|
//! | GET    | `/accessions/{id}` | `load_*` |
//! | PUT    | `/accessions/{id}` | `save_*` |
//! | POST   | `/accessions/{id}/checkIn` | `check_in_*` |
//! | POST   | `/accessions/{id}/transfers/nursery` | `nursery_transfer_*` |
//! | POST   | `/accessions/{id}/viabilityTests` | `create_test_*` |
//! | DELETE | `/accessions/{id}/viabilityTests/{testId}` | `delete_test_*` |

use chrono::NaiveDate;
use seedbank_accession::{
    Accession, AccessionEngine, AccessionRepository, AccessionState, EngineConfig, EngineError,
    NurseryTransfer, RepositoryError, ViabilityTestPayload, ViabilityTestType,
};
use seedbank_client::{SeedbankApiConfig, SeedbankClient};
use seedbank_core::{AccessionId, AccessionNumber, FacilityId, ViabilityTestId};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ACCESSION_ID: &str = "550e8400-e29b-41d4-a716-446655440000";

/// Build a client pointed at a wiremock server.
fn test_client(mock_server: &MockServer) -> SeedbankClient {
    let config = SeedbankApiConfig {
        base_url: mock_server.uri().parse().unwrap(),
        api_token: Some(zeroize::Zeroizing::new("test-token".into())),
        timeout_secs: 5,
    };
    SeedbankClient::new(config).unwrap()
}

fn accession_id() -> AccessionId {
    serde_json::from_value(serde_json::json!(ACCESSION_ID)).unwrap()
}

fn accession_json(state: &str, version: u64) -> serde_json::Value {
    serde_json::json!({
        "id": ACCESSION_ID,
        "accessionNumber": "22-1-001",
        "state": state,
        "facilityId": "550e8400-e29b-41d4-a716-446655440001",
        "remainingQuantity": {"quantity": 120, "unit": "Seeds"},
        "version": version
    })
}

fn accessions_path(suffix: &str) -> String {
    format!("/api/v2/seedbank/accessions/{ACCESSION_ID}{suffix}")
}

// ── GET /accessions/{id} ────────────────────────────────────────────

#[tokio::test]
async fn load_sends_bearer_token_and_parses_accession() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(accessions_path("")))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(accession_json("In Storage", 4)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let accession = test_client(&mock_server).load(accession_id()).await.unwrap();
    assert_eq!(accession.state, AccessionState::InStorage);
    assert_eq!(accession.version, 4);
    assert_eq!(accession.accession_number.as_str(), "22-1-001");
}

#[tokio::test]
async fn load_maps_404_to_not_found() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(accessions_path("")))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such accession"))
        .mount(&mock_server)
        .await;

    let err = test_client(&mock_server).load(accession_id()).await.unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound { .. }));
}

#[tokio::test]
async fn load_tolerates_unknown_state() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(accessions_path("")))
        .respond_with(ResponseTemplate::new(200).set_body_json(accession_json("Quarantined", 1)))
        .mount(&mock_server)
        .await;

    let accession = test_client(&mock_server).load(accession_id()).await.unwrap();
    assert_eq!(accession.state, AccessionState::Unknown);
}

#[tokio::test]
async fn load_maps_bad_json_to_transport() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(accessions_path("")))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&mock_server)
        .await;

    let err = test_client(&mock_server).load(accession_id()).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Transport { .. }));
}

// ── PUT /accessions/{id} ────────────────────────────────────────────

#[tokio::test]
async fn save_sends_if_match_version() {
    let mock_server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(accessions_path("")))
        .and(header("if-match", "3"))
        .and(body_partial_json(serde_json::json!({"state": "Drying"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(accession_json("Drying", 4)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut accession: Accession = serde_json::from_value(accession_json("Processing", 3)).unwrap();
    accession.state = AccessionState::Drying;
    let saved = test_client(&mock_server).save(&accession).await.unwrap();
    assert_eq!(saved.version, 4);
}

#[tokio::test]
async fn save_maps_412_to_conflict() {
    let mock_server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(accessions_path("")))
        .respond_with(ResponseTemplate::new(412).set_body_string("version mismatch"))
        .mount(&mock_server)
        .await;

    let accession: Accession = serde_json::from_value(accession_json("Processing", 3)).unwrap();
    let err = test_client(&mock_server).save(&accession).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict { .. }));
}

#[tokio::test]
async fn server_errors_are_not_retried() {
    let mock_server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(accessions_path("")))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let accession: Accession = serde_json::from_value(accession_json("Processing", 3)).unwrap();
    let err = test_client(&mock_server).save(&accession).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Transport { .. }));
}

// ── POST /accessions/{id}/checkIn ───────────────────────────────────

#[tokio::test]
async fn check_in_maps_422_to_rejected() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(accessions_path("/checkIn")))
        .respond_with(ResponseTemplate::new(422).set_body_string("already checked in"))
        .mount(&mock_server)
        .await;

    let err = test_client(&mock_server)
        .check_in(accession_id())
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Rejected { .. }));
}

// ── POST /accessions/{id}/transfers/nursery ─────────────────────────

#[tokio::test]
async fn nursery_transfer_posts_seed_count() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(accessions_path("/transfers/nursery")))
        .and(body_partial_json(serde_json::json!({
            "germinatingQuantity": 40,
            "date": "2026-05-01"
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    test_client(&mock_server)
        .transfer_to_nursery(
            accession_id(),
            &NurseryTransfer {
                date: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
                destination_facility_id: FacilityId::new(),
                germinating_quantity: 40,
                ready_by_date: None,
                notes: None,
                withdrawn_by: None,
            },
        )
        .await
        .unwrap();
}

// ── POST /accessions/{id}/viabilityTests ────────────────────────────

#[tokio::test]
async fn create_test_returns_saved_test() {
    let mock_server = MockServer::start().await;
    let test_id = "550e8400-e29b-41d4-a716-4466554400aa";
    Mock::given(method("POST"))
        .and(path(accessions_path("/viabilityTests")))
        .and(body_partial_json(serde_json::json!({"testType": "Cut", "seedsTested": 10})))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": test_id,
            "accessionId": ACCESSION_ID,
            "testType": "Cut",
            "startDate": "2026-05-01",
            "seedsTested": 10,
            "seedsFilled": 7,
            "seedsCompromised": 2,
            "seedsEmpty": 1
        })))
        .mount(&mock_server)
        .await;

    let payload = ViabilityTestPayload {
        test_type: ViabilityTestType::Cut,
        seed_type: None,
        substrate: None,
        treatment: None,
        start_date: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
        end_date: None,
        seeds_tested: 10,
        seeds_filled: Some(7),
        seeds_compromised: Some(2),
        seeds_empty: Some(1),
        test_results: Vec::new(),
        notes: None,
    };
    let test = test_client(&mock_server)
        .create_viability_test(accession_id(), &payload)
        .await
        .unwrap();
    assert!(test.is_resolved());
    assert_eq!(test.viability_percent(), Some(70));
}

// ── DELETE /accessions/{id}/viabilityTests/{testId} ─────────────────

#[tokio::test]
async fn delete_test_uses_test_path() {
    let mock_server = MockServer::start().await;
    let test_id = ViabilityTestId::new();
    Mock::given(method("DELETE"))
        .and(path(accessions_path(&format!(
            "/viabilityTests/{}",
            test_id.as_uuid()
        ))))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    test_client(&mock_server)
        .delete_viability_test(accession_id(), test_id)
        .await
        .unwrap();
}

// ── Engine over HTTP ────────────────────────────────────────────────

#[tokio::test]
async fn engine_surfaces_conflict_as_stale_aggregate() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(accessions_path("")))
        .respond_with(ResponseTemplate::new(200).set_body_json(accession_json("Processing", 3)))
        .mount(&mock_server)
        .await;
    Mock::given(method("PUT"))
        .and(path(accessions_path("")))
        .respond_with(ResponseTemplate::new(409).set_body_string("changed"))
        .mount(&mock_server)
        .await;

    let engine = AccessionEngine::new(test_client(&mock_server), EngineConfig::default());
    let mut session = engine.open_state_edit(accession_id()).await.unwrap();
    session.draft_mut().target = Some(AccessionState::Drying);
    let err = session.commit().await.unwrap_err();
    assert!(matches!(err, EngineError::StaleAggregate { expected: 3, .. }));
}

#[test]
fn accession_ids_serialize_as_bare_uuids() {
    let a = Accession::new(AccessionNumber::new("22-1-002").unwrap(), FacilityId::new());
    let json = serde_json::to_value(&a).unwrap();
    assert_eq!(json["id"], serde_json::json!(a.id.as_uuid().to_string()));
}
