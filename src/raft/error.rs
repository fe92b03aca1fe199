use thiserror::Error;

#[derive(Error, Debug)]
pub enum RaftError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
