use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::state::AppState;
use crate::store::query::ResumeQuery;
use crate::store::StoredDocument;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub field: Option<String>,
    pub value: Option<String>,
}

/// GET /api/v1/resumes?field=skills&value=Go
/// Without parameters every stored resume is returned.
pub async fn handle_list_resumes(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<StoredDocument>>, AppError> {
    let query = match (params.field.as_deref(), params.value.as_deref()) {
        (None, None) => ResumeQuery::all(),
        (Some(field), Some(value)) if !field.is_empty() => ResumeQuery::for_field(field, value),
        _ => {
            return Err(AppError::Validation(
                "field and value must be given together".to_string(),
            ))
        }
    };
    Ok(Json(state.pipeline.store().find(&query).await?))
}

/// POST /api/v1/resumes/search
pub async fn handle_search_resumes(
    State(state): State<AppState>,
    Json(query): Json<ResumeQuery>,
) -> Result<Json<Vec<StoredDocument>>, AppError> {
    Ok(Json(state.pipeline.store().find(&query).await?))
}
