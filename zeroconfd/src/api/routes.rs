use std::str::FromStr;
use std::sync::Arc;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use hickory_proto::rr::{Name, RecordType};
use serde::{Deserialize, Serialize};
use shared::protocol::API_PREFIX;
use shared::types::{Host, RecordView, ResponderStats};
use crate::mdns::connector::ConnectorStats;
use crate::zone::{Entry, Question, Zone};
use crate::zone_manager::ZoneHandle;

#[derive(Clone)]
pub struct AppState {
    pub zone: ZoneHandle,
    pub host: Arc<Host>,
    /// Instance names of the services we publish
    pub services: Arc<Vec<String>>,
    pub stats: Vec<Arc<ConnectorStats>>,
}

#[derive(Serialize)]
pub struct ConfigResponse {
    pub host: String,
    pub domain: String,
    pub services: Vec<String>,
}

#[derive(Deserialize)]
pub struct RecordQuery {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub record_type: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(&format!("{}/config", API_PREFIX), get(get_config))
        .route(&format!("{}/records", API_PREFIX), get(get_records))
        .route(&format!("{}/stats", API_PREFIX), get(get_stats))
        .with_state(state)
}

async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        host: state.host.fqdn(),
        domain: state.host.domain.clone(),
        services: state.services.as_ref().clone(),
    })
}

fn parse_question(params: &RecordQuery) -> Option<Question> {
    let record_type = match &params.record_type {
        Some(t) => RecordType::from_str(&t.to_uppercase()).ok()?,
        None => RecordType::ANY,
    };

    match &params.name {
        Some(name) => {
            let name = if name.ends_with('.') {
                Name::from_ascii(name)
            } else {
                Name::from_ascii(format!("{}.", name))
            };
            Some(Question::new(name.ok()?, record_type))
        }
        None => Some(Question::any_name(record_type)),
    }
}

async fn get_records(
    State(state): State<AppState>,
    Query(params): Query<RecordQuery>,
) -> Result<Json<Vec<RecordView>>, StatusCode> {
    let question = parse_question(&params).ok_or(StatusCode::BAD_REQUEST)?;

    state
        .zone
        .query(question)
        .await
        .map(|entries| Json(entries.iter().map(Entry::to_view).collect()))
        .map_err(|e| {
            tracing::error!("Failed to query zone: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

async fn get_stats(State(state): State<AppState>) -> Json<Vec<ResponderStats>> {
    Json(state.stats.iter().map(|s| s.snapshot()).collect())
}
