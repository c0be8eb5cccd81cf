//! Fake device server exposing `POST /offer`

use super::{HarnessError, HarnessResult};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// What the fake server replies with
#[derive(Debug, Clone)]
pub enum FakeResponse {
    Answer { sdp: String, video_ids: Vec<String> },
    Status(u16, String),
    /// 200 with this body verbatim
    RawBody(String),
}

#[derive(Clone)]
struct ServerState {
    response: FakeResponse,
    received: Arc<Mutex<Vec<serde_json::Value>>>,
}

pub struct FakeSignalingServer {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<serde_json::Value>>>,
    handle: JoinHandle<()>,
}

impl FakeSignalingServer {
    pub async fn start(response: FakeResponse) -> HarnessResult<Self> {
        let received = Arc::new(Mutex::new(Vec::new()));
        let state = ServerState {
            response,
            received: received.clone(),
        };

        let app = Router::new()
            .route("/offer", post(offer))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Fake signaling server failed: {}", e);
            }
        });

        Ok(Self {
            addr,
            received,
            handle,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Request bodies received so far
    pub fn received(&self) -> Vec<serde_json::Value> {
        self.received.lock().clone()
    }

    pub fn single_request(&self) -> HarnessResult<serde_json::Value> {
        let received = self.received();
        match received.as_slice() {
            [only] => Ok(only.clone()),
            other => Err(HarnessError::ServerError(format!(
                "expected exactly one request, got {}",
                other.len()
            ))),
        }
    }
}

impl Drop for FakeSignalingServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn offer(State(state): State<ServerState>, Json(body): Json<serde_json::Value>) -> Response {
    state.received.lock().push(body);

    match state.response {
        FakeResponse::Answer { sdp, video_ids } => Json(serde_json::json!({
            "sdp": sdp,
            "type": "answer",
            "video_ids": video_ids,
        }))
        .into_response(),
        FakeResponse::Status(code, body) => {
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, body).into_response()
        }
        FakeResponse::RawBody(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
    }
}
