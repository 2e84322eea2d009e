use thiserror::Error;
use vdb_datas::DatasError;

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("invalid database spec {spec:?}: {reason}")]
    InvalidSpec { spec: String, reason: String },

    #[error("no store registered for protocol {0:?}")]
    UnknownProtocol(String),

    #[error("protocol {0:?} is already registered")]
    AlreadyRegistered(String),

    /// A protocol's configuration table does not match what its backend
    /// accepts.
    #[error("invalid configuration for protocol {protocol}: {reason}")]
    InvalidProtocolConfig { protocol: String, reason: String },

    #[error("database error: {0}")]
    Datas(#[from] DatasError),
}

pub type SpecResult<T> = Result<T, SpecError>;
