pub mod memory;
pub mod redis_store;
pub mod tiered;

pub use memory::MemoryCache;
pub use redis_store::RedisCache;
pub use tiered::{CacheTier, CacheTtls, TieredCache};
