// ===============================
// src/api.rs (query surface)
// ===============================
//
// HTTP API (hyper 0.14):
//   GET  /metrics -> snapshot metrics (totals, daily, weekly, monthly, channels, topChannel, history)
//   GET  /logs    -> 100 log aktivitas terbaru
//   POST /reset   -> reset semua counter
//   GET  /prom    -> Prometheus text format
//   GET  /health  -> status relay
//
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::{
    header::{HeaderValue, CONTENT_TYPE},
    service::{make_service_fn, service_fn},
    Body, Method, Request, Response, Server, StatusCode,
};
use serde::Serialize;
use serde_json::json;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{error, info};

use crate::logbook::{Logbook, LOG_VIEW};
use crate::relay::RelayHandle;
use crate::shutdown::stopped;
use crate::store::MetricsStore;
use crate::telemetry;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<MetricsStore>,
    pub logbook: Arc<Logbook>,
    pub relay: RelayHandle,
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    let (status, buf) = match serde_json::to_vec(body) {
        Ok(buf) => (status, buf),
        Err(e) => {
            error!(?e, "api: serialize failed");
            (StatusCode::INTERNAL_SERVER_ERROR, br#"{"error":"serialize"}"#.to_vec())
        }
    };
    let mut rsp = Response::new(Body::from(buf));
    *rsp.status_mut() = status;
    rsp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    rsp
}

pub async fn route(req: Request<Body>, st: ApiState) -> Response<Body> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => json_response(StatusCode::OK, &st.store.snapshot()),
        (&Method::GET, "/logs") => json_response(StatusCode::OK, &st.logbook.recent(LOG_VIEW)),
        (&Method::POST, "/reset") => {
            st.store.reset();
            st.logbook.system("Metrics reset.");
            json_response(StatusCode::OK, &json!({ "status": "reset" }))
        }
        (&Method::GET, "/prom") => {
            let mut rsp = Response::new(Body::from(telemetry::encode()));
            rsp.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
            );
            rsp
        }
        (&Method::GET, "/health") => {
            json_response(StatusCode::OK, &json!({ "relay": st.relay.state().as_str() }))
        }
        (_, "/metrics" | "/logs" | "/reset" | "/prom" | "/health") => {
            json_response(StatusCode::METHOD_NOT_ALLOWED, &json!({ "error": "method not allowed" }))
        }
        _ => json_response(StatusCode::NOT_FOUND, &json!({ "error": "not found" })),
    }
}

/// Bind now (so a bad port fails startup), serve in the background until shutdown.
pub fn spawn(
    port: u16,
    st: ApiState,
    mut shutdown: watch::Receiver<bool>,
) -> Result<JoinHandle<()>, hyper::Error> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let make_svc = make_service_fn(move |_conn| {
        let st = st.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let st = st.clone();
                async move { Ok::<_, Infallible>(route(req, st).await) }
            }))
        }
    });

    let server = Server::try_bind(&addr)?.serve(make_svc);
    info!(%addr, "api listening (/metrics /logs /reset /prom /health)");

    Ok(tokio::spawn(async move {
        let graceful = server.with_graceful_shutdown(async move { stopped(&mut shutdown).await });
        if let Err(e) = graceful.await {
            error!(?e, "api server error");
        }
    }))
}
