use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("dial failed: {0}")]
    Dial(#[from] tonic::transport::Error),

    #[error("invalid server address: {0}")]
    InvalidUri(#[from] tonic::codegen::http::uri::InvalidUri),

    #[error("stream send failed: {0}")]
    Send(#[from] tonic::Status),
}
