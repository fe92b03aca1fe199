use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::{Body, Client, Uri};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::NetworkError;
use crate::raft::{
    HeartbeatRequest, HeartbeatResponse, PeerTransport, VoteRequest, VoteResponse,
};

/// [`PeerTransport`] over HTTP `GET` with query parameters and JSON replies.
pub struct HttpTransport {
    client: Client<HttpConnector, Body>,
    peers: HashMap<String, String>, // node_id -> address
}

impl HttpTransport {
    pub fn new(peers: HashMap<String, String>, connect_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        connector.set_nodelay(true);
        Self {
            client: Client::builder().build(connector),
            peers,
        }
    }

    fn uri(&self, peer_id: &str, path: &str, query: &str) -> Result<Uri, NetworkError> {
        let address = self
            .peers
            .get(peer_id)
            .ok_or_else(|| NetworkError::ConnectionError(format!("Unknown peer: {peer_id}")))?;
        Ok(peer_uri(address, path, query)?)
    }

    async fn get<Q, R>(&self, peer_id: &str, path: &str, query: &Q) -> Result<R, NetworkError>
    where
        Q: Serialize,
        R: DeserializeOwned,
    {
        let query = serde_urlencoded::to_string(query)?;
        let uri = self.uri(peer_id, path, &query)?;
        let resp = self.client.get(uri).await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(NetworkError::Status(status.as_u16()));
        }
        let bytes = hyper::body::to_bytes(resp.into_body()).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Fetch the raw `/health` body of the node at `address`.
pub async fn fetch_health(address: &str) -> Result<String, NetworkError> {
    let uri = peer_uri(address, "/health", "")?;
    let resp = Client::new().get(uri).await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(NetworkError::Status(status.as_u16()));
    }
    let bytes = hyper::body::to_bytes(resp.into_body()).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Build `http://<address><path>?<query>`; `address` may already carry a scheme.
/// An empty `query` leaves the `?` off.
pub fn peer_uri(
    address: &str,
    path: &str,
    query: &str,
) -> Result<Uri, hyper::http::uri::InvalidUri> {
    let base = address.trim_end_matches('/');
    let scheme = if base.starts_with("http://") || base.starts_with("https://") {
        ""
    } else {
        "http://"
    };
    if query.is_empty() {
        format!("{scheme}{base}{path}").parse()
    } else {
        format!("{scheme}{base}{path}?{query}").parse()
    }
}

#[async_trait]
impl PeerTransport for HttpTransport {
    async fn heartbeat(
        &self,
        peer_id: &str,
        request: HeartbeatRequest,
    ) -> Result<HeartbeatResponse, NetworkError> {
        self.get(peer_id, "/heartbeat", &request).await
    }

    async fn request_vote(
        &self,
        peer_id: &str,
        request: VoteRequest,
    ) -> Result<VoteResponse, NetworkError> {
        self.get(peer_id, "/vote", &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_uri_adds_scheme_when_missing() {
        let uri = peer_uri("127.0.0.1:8001", "/vote", "term=1&called_by=n1").unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:8001/vote?term=1&called_by=n1");

        let uri = peer_uri("http://localhost:8002/", "/heartbeat", "term=2&leader=n1").unwrap();
        assert_eq!(uri.to_string(), "http://localhost:8002/heartbeat?term=2&leader=n1");

        let uri = peer_uri("127.0.0.1:8000", "/health", "").unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:8000/health");
    }

    #[tokio::test]
    async fn health_fetch_reports_unreachable_node() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = fetch_health(&address).await.unwrap_err();
        assert!(matches!(err, NetworkError::Http(_)), "{err:?}");
    }

    #[test]
    fn query_encoding_escapes_ids() {
        let q = serde_urlencoded::to_string(VoteRequest {
            term: 4,
            called_by: "node a&b".to_string(),
        })
        .unwrap();
        assert_eq!(q, "term=4&called_by=node+a%26b");
    }

    #[tokio::test]
    async fn unknown_peer_fails_without_network() {
        let transport = HttpTransport::new(HashMap::new(), Duration::from_millis(50));
        let err = transport
            .request_vote(
                "ghost",
                VoteRequest {
                    term: 1,
                    called_by: "n1".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, NetworkError::ConnectionError(_)));
    }
}
