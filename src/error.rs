use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Batch of {size} requests exceeds the limit of {max}")]
    BatchTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, EngineError>;
