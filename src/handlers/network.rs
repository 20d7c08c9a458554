//! Network topology handler

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct NetworkNode {
    pub id: String,
    pub baseline: f64,
}

#[derive(Serialize)]
pub struct NetworkLink {
    pub id: String,
    pub source: String,
    pub target: String,
}

#[derive(Serialize)]
pub struct NetworkResponse {
    pub nodes: Vec<NetworkNode>,
    pub links: Vec<NetworkLink>,
}

/// Static topology as loaded at startup
pub async fn get(State(state): State<AppState>) -> Json<NetworkResponse> {
    let nodes = state
        .topology
        .nodes
        .iter()
        .map(|n| NetworkNode { id: n.id.clone(), baseline: n.baseline_pressure })
        .collect();
    let links = state
        .topology
        .links
        .iter()
        .map(|l| NetworkLink {
            id: l.id.clone(),
            source: l.source.clone(),
            target: l.target.clone(),
        })
        .collect();

    Json(NetworkResponse { nodes, links })
}
