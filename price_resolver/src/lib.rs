pub mod batch;
pub mod dynamic;
pub mod historical;
pub mod live;

#[cfg(test)]
mod test_support;

pub use batch::{
    resolve_contract_batch, resolve_symbol_batch, ContractPriceRequest, SymbolPriceRequest,
};
pub use dynamic::DynamicContractPriceResolver;
pub use historical::HistoricalPriceOrchestrator;
pub use live::LivePriceResolver;
