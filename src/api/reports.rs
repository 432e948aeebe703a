use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use std::sync::Arc;
use tracing::{info, warn};

use super::auth::SessionUser;
use super::error::ApiError;
use super::validation::{validate_create_report, validate_update_report};
use crate::auth::SessionClaims;
use crate::db::{CreateReportRequest, Report, ReportResponse, UpdateReportRequest};
use crate::AppState;

/// Only the user recorded as `owner` may modify a report
pub fn ensure_owner(claims: &SessionClaims, report: &Report) -> Result<(), ApiError> {
    if claims.id == report.owner {
        Ok(())
    } else {
        Err(ApiError::forbidden("Only the reporter can edit this report"))
    }
}

/// POST /reports
pub async fn create_report(
    State(state): State<Arc<AppState>>,
    SessionUser(claims): SessionUser,
    body: Result<Json<CreateReportRequest>, JsonRejection>,
) -> Result<Json<ReportResponse>, ApiError> {
    let Json(request) = body?;
    validate_create_report(&request)?;

    let report = Report::create(&state.db, &claims.id, &request).await?;

    info!(report_id = %report.id, owner = %claims.id, "Report created");
    Ok(Json(ReportResponse::from(report)))
}

/// GET /reports
///
/// Requires a valid session but returns every report.
pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    SessionUser(_claims): SessionUser,
) -> Result<Json<Vec<ReportResponse>>, ApiError> {
    let reports = Report::list(&state.db).await?;
    Ok(Json(reports.into_iter().map(ReportResponse::from).collect()))
}

/// GET /reports/:id
pub async fn get_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ReportResponse>, ApiError> {
    let report = Report::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Report not found"))?;
    Ok(Json(ReportResponse::from(report)))
}

/// PUT /reports
pub async fn update_report(
    State(state): State<Arc<AppState>>,
    SessionUser(claims): SessionUser,
    body: Result<Json<UpdateReportRequest>, JsonRejection>,
) -> Result<Json<&'static str>, ApiError> {
    let Json(request) = body?;
    validate_update_report(&request)?;

    let report = Report::find_by_id(&state.db, &request.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Report not found"))?;

    if let Err(e) = ensure_owner(&claims, &report) {
        warn!(report_id = %report.id, user_id = %claims.id, "Rejected edit by non-owner");
        return Err(e);
    }

    Report::update(&state.db, &report.id, &request.changes).await?;

    info!(report_id = %report.id, "Report updated");
    Ok(Json("ok"))
}
