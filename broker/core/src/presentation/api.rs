// Copyright (c) 2026 Dataverse Broker Contributors
// SPDX-License-Identifier: AGPL-3.0

//! OSB HTTP API
//!
//! Routes `/v2/*` onto a [`ServiceBroker`]. Every `/v2` request passes the
//! optional bearer-token check, then the `X-Broker-API-Version` gate, before
//! its handler decodes the request. `/healthz` and `/metrics` sit outside
//! both.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, Request, State,
    },
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::application::broker::ServiceBroker;
use crate::domain::api_version::API_VERSION_HEADER;
use crate::domain::error::BrokerError;
use crate::domain::instance::{BindingId, InstanceId};
use crate::domain::operation::OperationKey;
use crate::domain::osb::{
    BindRequest, DeprovisionRequest, LastOperationRequest, ProvisionRequest, UnbindRequest,
    UpdateInstanceRequest,
};
use crate::domain::provider::TokenReviewer;
use crate::presentation::auth::require_bearer_token;
use crate::presentation::error::panic_response;

/// Counter incremented once per OSB request, labelled by `action`.
pub const ACTIONS_METRIC: &str = "osb_actions_total";

pub struct AppState {
    pub broker: Arc<dyn ServiceBroker>,
    pub token_reviewer: Option<Arc<dyn TokenReviewer>>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(broker: Arc<dyn ServiceBroker>) -> Self {
        Self {
            broker,
            token_reviewer: None,
            metrics: None,
        }
    }

    pub fn with_token_reviewer(mut self, reviewer: Arc<dyn TokenReviewer>) -> Self {
        self.token_reviewer = Some(reviewer);
        self
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

pub fn app(state: AppState) -> Router {
    let state = Arc::new(state);

    let mut osb = Router::new()
        .route("/v2/catalog", get(catalog_handler))
        .route(
            "/v2/service_instances/{instance_id}",
            put(provision_handler)
                .delete(deprovision_handler)
                .patch(update_handler),
        )
        .route(
            "/v2/service_instances/{instance_id}/last_operation",
            get(last_operation_handler),
        )
        .route(
            "/v2/service_instances/{instance_id}/service_bindings/{binding_id}",
            put(bind_handler).delete(unbind_handler),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), api_version_gate));

    if state.token_reviewer.is_some() {
        osb = osb.route_layer(middleware::from_fn_with_state(state.clone(), require_bearer_token));
    }

    Router::new()
        .route("/healthz", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(osb)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn api_version_gate(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let version = request
        .headers()
        .get(API_VERSION_HEADER)
        .and_then(|v| v.to_str().ok());
    if let Err(err) = state.broker.validate_api_version(version) {
        warn!(path = %request.uri().path(), "Rejected request: {}", err);
        return err.into_response();
    }
    next.run(request).await
}

/// Query parameters any OSB route may carry.
#[derive(Debug, Default, Deserialize)]
struct OsbQuery {
    accepts_incomplete: Option<String>,
    service_id: Option<String>,
    plan_id: Option<String>,
    operation: Option<String>,
}

impl OsbQuery {
    fn accepts_incomplete(&self) -> bool {
        self.accepts_incomplete
            .as_deref()
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }
}

/// Unwrap a path extraction, answering failures in the OSB error shape.
fn path_params<T>(path: Result<Path<T>, PathRejection>) -> Result<T, BrokerError> {
    path.map(|Path(params)| params)
        .map_err(|e| BrokerError::bad_request(format!("invalid path: {}", e.body_text())))
}

fn osb_query(query: Result<Query<OsbQuery>, QueryRejection>) -> Result<OsbQuery, BrokerError> {
    query
        .map(|Query(query)| query)
        .map_err(|e| BrokerError::bad_request(format!("invalid query: {}", e.body_text())))
}

fn decode_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, BrokerError> {
    serde_json::from_slice(body)
        .map_err(|e| BrokerError::bad_request(format!("invalid request body: {}", e)))
}

fn count_action(action: &'static str) {
    metrics::counter!(ACTIONS_METRIC, "action" => action).increment(1);
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn catalog_handler(State(state): State<Arc<AppState>>) -> Result<Response, BrokerError> {
    count_action("catalog");
    info!("Get catalog");
    let catalog = state.broker.get_catalog().await?;
    Ok(Json(catalog).into_response())
}

async fn provision_handler(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<OsbQuery>, QueryRejection>,
    body: Bytes,
) -> Result<Response, BrokerError> {
    count_action("provision");
    let instance_id = path_params(path)?;
    let query = osb_query(query)?;
    info!(instance_id = %instance_id, "Provision");

    let mut request: ProvisionRequest = decode_body(&body)?;
    request.instance_id = InstanceId::new(instance_id);
    request.accepts_incomplete = query.accepts_incomplete();

    let response = state.broker.provision(request).await?;
    let status = if response.is_async {
        StatusCode::ACCEPTED
    } else if response.exists {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(response)).into_response())
}

async fn deprovision_handler(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<OsbQuery>, QueryRejection>,
) -> Result<Response, BrokerError> {
    count_action("deprovision");
    let instance_id = path_params(path)?;
    let query = osb_query(query)?;
    info!(instance_id = %instance_id, "Deprovision");

    let request = DeprovisionRequest {
        instance_id: InstanceId::new(instance_id),
        accepts_incomplete: query.accepts_incomplete(),
        service_id: query.service_id,
        plan_id: query.plan_id,
    };

    let response = state.broker.deprovision(request).await?;
    let status = if response.is_async {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(response)).into_response())
}

async fn update_handler(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<OsbQuery>, QueryRejection>,
    body: Bytes,
) -> Result<Response, BrokerError> {
    count_action("update");
    let instance_id = path_params(path)?;
    let query = osb_query(query)?;
    info!(instance_id = %instance_id, "Update");

    let mut request: UpdateInstanceRequest = decode_body(&body)?;
    request.instance_id = InstanceId::new(instance_id);
    request.accepts_incomplete = query.accepts_incomplete();

    let response = state.broker.update(request).await?;
    let status = if response.is_async {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(response)).into_response())
}

async fn last_operation_handler(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<OsbQuery>, QueryRejection>,
) -> Result<Response, BrokerError> {
    count_action("last_operation");
    let instance_id = path_params(path)?;
    let query = osb_query(query)?;
    info!(instance_id = %instance_id, operation = ?query.operation, "Last operation");

    let request = LastOperationRequest {
        instance_id: InstanceId::new(instance_id),
        service_id: query.service_id,
        plan_id: query.plan_id,
        operation: query.operation.map(OperationKey),
    };

    let response = state.broker.last_operation(request).await?;
    Ok(Json(response).into_response())
}

async fn bind_handler(
    State(state): State<Arc<AppState>>,
    path: Result<Path<(String, String)>, PathRejection>,
    query: Result<Query<OsbQuery>, QueryRejection>,
    body: Bytes,
) -> Result<Response, BrokerError> {
    count_action("bind");
    let (instance_id, binding_id) = path_params(path)?;
    let query = osb_query(query)?;
    info!(instance_id = %instance_id, binding_id = %binding_id, "Bind");

    let mut request: BindRequest = if body.is_empty() {
        BindRequest::default()
    } else {
        decode_body(&body)?
    };
    request.instance_id = InstanceId::new(instance_id);
    request.binding_id = BindingId::new(binding_id);
    request.accepts_incomplete = query.accepts_incomplete();

    let response = state.broker.bind(request).await?;
    let status = if response.exists {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(response)).into_response())
}

async fn unbind_handler(
    State(state): State<Arc<AppState>>,
    path: Result<Path<(String, String)>, PathRejection>,
    query: Result<Query<OsbQuery>, QueryRejection>,
) -> Result<Response, BrokerError> {
    count_action("unbind");
    let (instance_id, binding_id) = path_params(path)?;
    let query = osb_query(query)?;
    info!(instance_id = %instance_id, binding_id = %binding_id, "Unbind");

    let request = UnbindRequest {
        instance_id: InstanceId::new(instance_id),
        binding_id: BindingId::new(binding_id),
        service_id: query.service_id,
        plan_id: query.plan_id,
    };

    let response = state.broker.unbind(request).await?;
    Ok(Json(response).into_response())
}
