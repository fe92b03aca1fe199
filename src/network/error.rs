use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("Invalid peer URI: {0}")]
    InvalidUri(#[from] hyper::http::uri::InvalidUri),

    #[error("Encoding error: {0}")]
    Encode(#[from] serde_urlencoded::ser::Error),

    #[error("Decoding error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Peer answered with status {0}")]
    Status(u16),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Timeout error")]
    Timeout,
}
