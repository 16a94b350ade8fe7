//! Route definitions for the accession API stub.
//!
//! Serves the endpoints that `seedbank-client` calls over an
//! [`InMemoryAccessionRepository`], with JSON bodies that deserialize into
//! the engine's types. Repository failures map onto the statuses the
//! client expects: 404 not found, 409/412 conflict, 422 rejected.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use seedbank_accession::{
    Accession, AccessionRepository, AccessionState, InMemoryAccessionRepository, NewWithdrawal,
    NurseryTransfer, Quantity, QuantityLedger, RepositoryError, ViabilityTestPayload,
};
use seedbank_core::{AccessionId, AccessionNumber, FacilityId, ViabilityTestId};

/// Build the complete router over `repository`.
pub fn router(repository: InMemoryAccessionRepository) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v2/seedbank/accessions", post(accession_create))
        .route(
            "/api/v2/seedbank/accessions/{id}",
            get(accession_get)
                .put(accession_update)
                .delete(accession_delete),
        )
        .route(
            "/api/v2/seedbank/accessions/{id}/checkIn",
            post(accession_check_in),
        )
        .route(
            "/api/v2/seedbank/accessions/{id}/withdrawals",
            post(withdrawal_create),
        )
        .route(
            "/api/v2/seedbank/accessions/{id}/transfers/nursery",
            post(nursery_transfer),
        )
        .route(
            "/api/v2/seedbank/accessions/{id}/viabilityTests",
            post(test_create),
        )
        .route(
            "/api/v2/seedbank/accessions/{id}/viabilityTests/{test_id}",
            put(test_update).delete(test_delete),
        )
        .fallback(not_implemented)
        .layer(TraceLayer::new_for_http())
        .with_state(repository)
}

/// A repository failure rendered as an HTTP response.
#[derive(Debug)]
struct ApiError(RepositoryError);

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RepositoryError::NotFound { .. } => StatusCode::NOT_FOUND,
            RepositoryError::Conflict { .. } => StatusCode::CONFLICT,
            RepositoryError::Rejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            RepositoryError::Transport { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::debug!(status = status.as_u16(), error = %self.0, "request failed");
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ── Health ──────────────────────────────────────────────────────────

async fn health() -> StatusCode {
    StatusCode::OK
}

// ── Accessions ──────────────────────────────────────────────────────

/// Body of `POST /api/v2/seedbank/accessions`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateAccessionRequest {
    accession_number: AccessionNumber,
    facility_id: FacilityId,
    #[serde(default)]
    state: Option<AccessionState>,
    #[serde(default)]
    time_zone: Option<Tz>,
    #[serde(default)]
    species_name: Option<String>,
    #[serde(default)]
    collected_date: Option<NaiveDate>,
    #[serde(default)]
    received_date: Option<NaiveDate>,
    #[serde(default)]
    remaining_quantity: Option<Quantity>,
    #[serde(default)]
    subset_weight: Option<Quantity>,
    #[serde(default)]
    subset_count: Option<u64>,
    #[serde(default)]
    notes: Option<String>,
}

async fn accession_create(
    State(repository): State<InMemoryAccessionRepository>,
    Json(body): Json<CreateAccessionRequest>,
) -> Response {
    let mut accession = Accession::new(body.accession_number, body.facility_id);
    if let Some(state) = body.state {
        accession.state = state;
    }
    accession.time_zone = body.time_zone;
    accession.species_name = body.species_name;
    accession.collected_date = body.collected_date;
    accession.received_date = body.received_date;
    accession.remaining_quantity = body.remaining_quantity;
    accession.subset_weight = body.subset_weight;
    accession.subset_count = body.subset_count;
    accession.notes = body.notes;
    QuantityLedger::refresh_estimates(&mut accession);

    let created = repository.insert(accession);
    tracing::info!(accession_id = %created.id, "accession created");
    (StatusCode::CREATED, Json(created)).into_response()
}

async fn accession_get(
    State(repository): State<InMemoryAccessionRepository>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Accession>> {
    Ok(Json(repository.load(AccessionId(id)).await?))
}

/// Version carried by an `If-Match` header, with or without ETag quotes.
fn if_match_version(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(axum::http::header::IF_MATCH)?
        .to_str()
        .ok()?
        .trim()
        .trim_matches('"')
        .parse()
        .ok()
}

async fn accession_update(
    State(repository): State<InMemoryAccessionRepository>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(mut accession): Json<Accession>,
) -> Response {
    if accession.id != AccessionId(id) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "accession id does not match path" })),
        )
            .into_response();
    }
    if let Some(version) = if_match_version(&headers) {
        let current = repository.get(&accession.id).map(|a| a.version);
        if current.is_some_and(|v| v != version) {
            return (
                StatusCode::PRECONDITION_FAILED,
                Json(json!({ "error": format!("version {version} is stale") })),
            )
                .into_response();
        }
        accession.version = version;
    }
    match repository.save(&accession).await {
        Ok(saved) => Json(saved).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

async fn accession_delete(
    State(repository): State<InMemoryAccessionRepository>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    repository.delete(AccessionId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn accession_check_in(
    State(repository): State<InMemoryAccessionRepository>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    repository.check_in(AccessionId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Withdrawals ─────────────────────────────────────────────────────

async fn withdrawal_create(
    State(repository): State<InMemoryAccessionRepository>,
    Path(id): Path<Uuid>,
    Json(body): Json<NewWithdrawal>,
) -> ApiResult<Response> {
    let withdrawal = repository.create_withdrawal(AccessionId(id), &body).await?;
    Ok((StatusCode::CREATED, Json(withdrawal)).into_response())
}

async fn nursery_transfer(
    State(repository): State<InMemoryAccessionRepository>,
    Path(id): Path<Uuid>,
    Json(body): Json<NurseryTransfer>,
) -> ApiResult<StatusCode> {
    repository.transfer_to_nursery(AccessionId(id), &body).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Viability tests ─────────────────────────────────────────────────

async fn test_create(
    State(repository): State<InMemoryAccessionRepository>,
    Path(id): Path<Uuid>,
    Json(body): Json<ViabilityTestPayload>,
) -> ApiResult<Response> {
    let test = repository.create_viability_test(AccessionId(id), &body).await?;
    Ok((StatusCode::CREATED, Json(test)).into_response())
}

async fn test_update(
    State(repository): State<InMemoryAccessionRepository>,
    Path((id, test_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<ViabilityTestPayload>,
) -> ApiResult<Response> {
    let test = repository
        .update_viability_test(AccessionId(id), ViabilityTestId(test_id), &body)
        .await?;
    Ok(Json(test).into_response())
}

async fn test_delete(
    State(repository): State<InMemoryAccessionRepository>,
    Path((id, test_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    repository
        .delete_viability_test(AccessionId(id), ViabilityTestId(test_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Fallback ────────────────────────────────────────────────────────

async fn not_implemented() -> Response {
    (
        StatusCode::NOT_IMPLEMENTED,
        Json(json!({ "error": "not implemented in accession stub" })),
    )
        .into_response()
}
