pub mod classifier;
pub mod routers;
pub mod types;

pub use classifier::{BlockTimestampSource, EvmTransferClassifier};
pub use routers::RouterRegistry;
pub use types::AssetTransfer;
