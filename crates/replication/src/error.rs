use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReplicationError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReplicationError {
    #[error("no write/read targets available")]
    NoTargets,

    #[error("quorum of {required} unreachable with only {available} replicas placed")]
    QuorumUnreachable { required: usize, available: usize },

    #[error(transparent)]
    Engine(#[from] enginecore::EngineError),
}
