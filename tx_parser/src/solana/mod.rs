pub mod classifier;
pub mod known_tokens;
pub mod programs;
pub mod types;

pub use classifier::{ClassifierThresholds, SolanaTransactionClassifier};
pub use known_tokens::{known_token, KnownToken, WRAPPED_SOL_MINT};
pub use types::SolanaTransaction;
