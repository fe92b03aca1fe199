use std::convert::Infallible;
use std::future::Future;
use std::net::TcpListener;

use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, StatusCode};
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::raft::{HeartbeatRequest, NodeRole, RpcHandler, VoteRequest};

/// Serve the election RPCs on `listener` until `shutdown` resolves.
pub async fn run_rpc_server<F>(
    listener: TcpListener,
    handler: RpcHandler,
    shutdown: F,
) -> Result<(), hyper::Error>
where
    F: Future<Output = ()>,
{
    if let Ok(addr) = listener.local_addr() {
        info!("RPC server listening on {addr}");
    }

    let make_svc = make_service_fn(move |_conn| {
        let handler = handler.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let handler = handler.clone();
                async move { handle(req, handler).await }
            }))
        }
    });

    hyper::Server::from_tcp(listener)?
        .serve(make_svc)
        .with_graceful_shutdown(shutdown)
        .await
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    id: String,
    role: NodeRole,
    term: u64,
    leader: Option<String>,
}

async fn handle(req: Request<Body>, handler: RpcHandler) -> Result<Response<Body>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/heartbeat") => match parse_query::<HeartbeatRequest>(&req) {
            Ok(q) if !q.leader.is_empty() => json(StatusCode::OK, &handler.heartbeat(&q)),
            Ok(_) => json_error(StatusCode::BAD_REQUEST, "missing leader"),
            Err(e) => json_error(StatusCode::BAD_REQUEST, &e),
        },
        (&Method::GET, "/vote") => match parse_query::<VoteRequest>(&req) {
            Ok(q) if !q.called_by.is_empty() => json(StatusCode::OK, &handler.request_vote(&q)),
            Ok(_) => json_error(StatusCode::BAD_REQUEST, "missing called_by"),
            Err(e) => json_error(StatusCode::BAD_REQUEST, &e),
        },
        (&Method::GET, "/health") => {
            let snap = handler.state().read();
            let health = Health {
                status: "ok",
                id: handler.state().self_id().to_string(),
                role: snap.role,
                term: snap.current_term,
                leader: snap.leader_id,
            };
            json(StatusCode::OK, &health)
        }
        _ => {
            let mut resp = Response::new(Body::empty());
            *resp.status_mut() = StatusCode::NOT_FOUND;
            resp
        }
    };

    Ok(response)
}

fn parse_query<T: DeserializeOwned>(req: &Request<Body>) -> Result<T, String> {
    let query = req.uri().query().unwrap_or("");
    serde_urlencoded::from_str(query).map_err(|e| {
        debug!("Rejecting {} with query {query:?}: {e}", req.uri().path());
        format!("invalid query: {e}")
    })
}

fn json<T: Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    match serde_json::to_string(body) {
        Ok(body) => respond(status, body),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

fn json_error(status: StatusCode, msg: &str) -> Response<Body> {
    respond(status, serde_json::json!({ "error": msg }).to_string())
}

fn respond(status: StatusCode, body: String) -> Response<Body> {
    let mut resp = Response::new(Body::from(body));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    resp
}
