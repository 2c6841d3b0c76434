//! # Manual Transmission Runs
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `POST` | `/v1/businesses/{id}/transmissions/run` | `run` |

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use vfx_transmit::{RunReport, RunTrigger};

use crate::error::AppError;
use crate::routes::business_id;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/businesses/{id}/transmissions/run", post(run))
}

/// POST /v1/businesses/{id}/transmissions/run: run the worker for one
/// business now, ignoring `auto_submit`. Waits for the run to finish,
/// including flow-control spacing.
#[utoipa::path(
    post,
    path = "/v1/businesses/{id}/transmissions/run",
    params(("id" = String, Path, description = "Business id")),
    responses(
        (status = 200, description = "Run report with every failure"),
        (status = 404, description = "Business not configured", body = crate::error::ErrorBody),
    ),
    tag = "transmissions"
)]
pub async fn run(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<RunReport>, AppError> {
    let business_id = business_id(id)?;
    let report = state.worker.run_business(&business_id, RunTrigger::Manual).await?;
    state.persist(&business_id, &report.touched).await?;
    Ok(Json(report))
}
