pub mod keys;
pub mod pubsub;
pub mod redis_client;

pub use keys::CacheKey;
pub use pubsub::{EventBus, InMemoryBus, RedisBus};
pub use redis_client::{RedisClient, RedisConfig};
