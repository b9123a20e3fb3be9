use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::{Json, Router, routing::post};
use rollout_core::decision::DecisionRecord;
use rollout_core::executor::{ExecutionMode, ExecutionRequest};
use rollout_core::message::AnalysisRequest;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/a2a/analyze", post(analyze))
}

/// Analyze a rollout synchronously and return the decision record.
///
/// The request takes the same path as an A2A task. Every failure, including
/// an unreadable body, is answered with 500 and the failure-safe verdict
/// (zero confidence).
#[utoipa::path(
    post,
    path = "/a2a/analyze",
    request_body = AnalysisRequest,
    responses(
        (status = 200, description = "Analysis completed", body = DecisionRecord),
        (status = 500, description = "Analysis failed; failure-safe verdict", body = DecisionRecord)
    ),
    tag = "analysis"
)]
pub async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<Json<DecisionRecord>, AppError> {
    let policy = state.executor.policy();

    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            let reason = rejection.body_text();
            tracing::warn!(status = %rejection.status(), error = %reason, "Unreadable analysis request");
            return Err(AppError::FailureSafe(policy.failure_record(&reason)));
        }
    };

    let task_id = Uuid::now_v7().to_string();
    tracing::info!(task_id = %task_id, "Received synchronous analysis request");

    let outcome = state
        .executor
        .execute(ExecutionRequest {
            task_id: task_id.clone(),
            context_id: task_id,
            existing_task: false,
            message: req.into_message(),
            mode: ExecutionMode::OneShot,
        })
        .await
        .map_err(|err| AppError::FailureSafe(policy.failure_record(&err)))?;

    let Some(decision) = outcome.decision.clone() else {
        let reason = format!(
            "task {} ended {} without a decision",
            outcome.task.id,
            outcome.task.state().as_str()
        );
        return Err(AppError::FailureSafe(policy.failure_record(&reason)));
    };

    if outcome.degraded() {
        return Err(AppError::FailureSafe(decision));
    }
    Ok(Json(decision))
}
