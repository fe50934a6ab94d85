//! HTTP control plane.
//!
//! A thin front end over the [`Dispatcher`]: one route that turns
//! `POST /nodes/{node}/{action}` into a control request, and one that
//! exposes the scheduling table for operators. Request shape is checked
//! here; everything about execution happens in the background and is
//! reported through logs, so a well-formed request is answered with
//! `202 Accepted` before its job has done anything.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::dispatch::{CleanMode, ControlRequest, Dispatcher, NodeAction};
use crate::error::{Result, SupervisorError};

/// One row of the scheduling table returned by `GET /jobs`.
#[derive(Debug, Serialize)]
pub struct JobInfo {
    pub key: String,
    pub node: String,
    pub action: NodeAction,
    pub job_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
}

/// Build the control-plane router around a dispatcher.
pub fn router(dispatcher: Dispatcher) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/nodes/:node/:action", post(dispatch_node))
        .route("/jobs", get(list_jobs))
        .layer(cors)
        .with_state(dispatcher)
}

/// Serve the control plane on `addr` until `shutdown` fires.
pub async fn serve(
    dispatcher: Dispatcher,
    addr: SocketAddr,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = router(dispatcher);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Control API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("Control API stopped");
    Ok(())
}

async fn dispatch_node(
    State(dispatcher): State<Dispatcher>,
    Path((node, action)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let request = match build_request(node, &action, &params) {
        Ok(request) => request,
        Err(err) => return (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    };

    match dispatcher.dispatch(request).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(SupervisorError::InvalidRequest(message)) => {
            (StatusCode::BAD_REQUEST, message).into_response()
        }
        Err(err) => {
            tracing::error!(error = %err, "Dispatch failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

/// Assemble a control request from the path and query of a dispatch call.
/// Every query key must be a recognized argument; unknown keys reject the
/// whole request so that a typo cannot silently drop an option.
fn build_request(
    node: String,
    action: &str,
    params: &HashMap<String, String>,
) -> Result<ControlRequest> {
    let action: NodeAction = action.parse()?;
    let mut request = ControlRequest::new(node, action);

    for (key, value) in params {
        match key.as_str() {
            "clean" => {
                let mode: CleanMode = value.parse()?;
                request = request.with_clean(mode);
            }
            other => {
                return Err(SupervisorError::InvalidRequest(format!(
                    "unknown argument: {other}"
                )));
            }
        }
    }

    request.validate()?;
    Ok(request)
}

async fn list_jobs(State(dispatcher): State<Dispatcher>) -> Json<Vec<JobInfo>> {
    let jobs = dispatcher
        .jobs()
        .await
        .into_iter()
        .map(|job| JobInfo {
            key: job.key().to_string(),
            node: job.request().node.clone(),
            action: job.request().action,
            job_id: job.id(),
            scheduled_at: job.scheduled_at(),
        })
        .collect();

    Json(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::RequestArgs;

    #[test]
    fn bare_request_has_no_args() {
        let request = build_request("n1".to_string(), "start", &HashMap::new()).unwrap();
        assert_eq!(request.node, "n1");
        assert_eq!(request.action, NodeAction::Start);
        assert_eq!(request.args, RequestArgs::default());
    }

    #[test]
    fn clean_argument_is_parsed() {
        let params = HashMap::from([("clean".to_string(), "all".to_string())]);
        let request = build_request("n1".to_string(), "stop", &params).unwrap();
        assert_eq!(request.args.clean, Some(CleanMode::All));
    }

    #[test]
    fn unknown_action_is_rejected() {
        let err = build_request("n1".to_string(), "reboot", &HashMap::new()).unwrap_err();
        assert!(matches!(err, SupervisorError::InvalidRequest(_)));
    }

    #[test]
    fn unknown_argument_is_rejected() {
        let params = HashMap::from([("force".to_string(), "1".to_string())]);
        let err = build_request("n1".to_string(), "stop", &params).unwrap_err();
        assert!(err.to_string().contains("force"));
    }

    #[test]
    fn bad_clean_value_is_rejected() {
        let params = HashMap::from([("clean".to_string(), "everything".to_string())]);
        let err = build_request("n1".to_string(), "stop", &params).unwrap_err();
        assert!(matches!(err, SupervisorError::InvalidRequest(_)));
    }
}
