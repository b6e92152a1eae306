//! Market-data access: feeds, the tiered resolver, and supporting plumbing.

pub mod cache;
pub mod circuit_breaker;
pub mod fixture;
pub mod provider;
pub mod proxy;
pub mod rate_limiter;
pub mod resolver;
pub mod snapshot;
pub mod tradier;
pub mod universe;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use fixture::{FixtureFeed, MarketFixture};
pub use provider::{BarInterval, DataError, FeedPayload, FeedRequest, MarketFeed, RequestKind};
pub use proxy::ProxyFeed;
pub use rate_limiter::{NoThrottle, RateLimiter, Throttle};
pub use resolver::{DataResolver, Resolved};
pub use snapshot::{MarketSnapshot, VwapBasis, VwapReading};
pub use tradier::TradierFeed;
pub use universe::{SectorSpec, SectorUniverse};
pub use yahoo::YahooFeed;
