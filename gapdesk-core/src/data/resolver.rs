//! Three-tier data resolver.
//!
//! Tiers are tried in strict order, first success wins:
//! primary feed, secondary feed, static proxy. A feed error, an empty payload
//! or a payload the caller's `accept` check rejects all count as failure and
//! advance to the next tier. Only the proxy tier is guaranteed to answer.

use super::cache::ResponseCache;
use super::provider::{FeedPayload, FeedRequest, MarketFeed};
use super::proxy::ProxyFeed;
use crate::domain::DataSource;
use crate::window::MarketTime;
use log::debug;
use std::sync::Arc;
use std::time::Duration;

/// A value together with the tier that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub source: DataSource,
}

impl<T> Resolved<T> {
    pub fn new(value: T, source: DataSource) -> Self {
        Self { value, source }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolved<U> {
        Resolved {
            value: f(self.value),
            source: self.source,
        }
    }
}

pub struct DataResolver {
    primary: Option<Arc<dyn MarketFeed>>,
    secondary: Option<Arc<dyn MarketFeed>>,
    proxy: ProxyFeed,
    cache: ResponseCache,
    timeout: Duration,
}

impl DataResolver {
    /// Resolver with no live feeds: every request lands on the proxy tier.
    pub fn new(proxy: ProxyFeed, cache_ttl: Duration, timeout: Duration) -> Self {
        Self {
            primary: None,
            secondary: None,
            proxy,
            cache: ResponseCache::new(cache_ttl),
            timeout,
        }
    }

    pub fn with_primary(mut self, feed: Arc<dyn MarketFeed>) -> Self {
        self.primary = Some(feed);
        self
    }

    pub fn with_secondary(mut self, feed: Arc<dyn MarketFeed>) -> Self {
        self.secondary = Some(feed);
        self
    }

    pub fn proxy(&self) -> &ProxyFeed {
        &self.proxy
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    fn live_feeds(&self) -> impl Iterator<Item = &Arc<dyn MarketFeed>> {
        self.primary.iter().chain(self.secondary.iter())
    }

    /// Full three-tier resolution of a raw payload.
    pub fn resolve(&self, request: &FeedRequest, now: &MarketTime) -> Resolved<FeedPayload> {
        self.resolve_with(request, |payload, _| Some(payload), |proxy| {
            proxy.payload(request, now)
        })
    }

    /// Full three-tier resolution. `accept` validates and maps a live payload
    /// (returning `None` fails that tier); `proxy` builds the tier-3 value.
    pub fn resolve_with<T>(
        &self,
        request: &FeedRequest,
        accept: impl Fn(FeedPayload, DataSource) -> Option<T>,
        proxy: impl FnOnce(&ProxyFeed) -> T,
    ) -> Resolved<T> {
        self.resolve_live(request, accept).unwrap_or_else(|| {
            debug!("{request}: live tiers exhausted, using proxy");
            Resolved::new(proxy(&self.proxy), DataSource::Proxy)
        })
    }

    /// Live tiers only, with the default request timeout.
    pub fn resolve_live<T>(
        &self,
        request: &FeedRequest,
        accept: impl Fn(FeedPayload, DataSource) -> Option<T>,
    ) -> Option<Resolved<T>> {
        self.resolve_live_within(request, self.timeout, accept)
    }

    /// Live tiers only. `None` when neither feed produced an acceptable payload.
    pub fn resolve_live_within<T>(
        &self,
        request: &FeedRequest,
        timeout: Duration,
        accept: impl Fn(FeedPayload, DataSource) -> Option<T>,
    ) -> Option<Resolved<T>> {
        let key = request.cache_key();
        if let Some((payload, source)) = self.cache.get(&key) {
            if let Some(value) = accept(payload, source) {
                debug!("{request}: cache hit ({source})");
                return Some(Resolved::new(value, source));
            }
        }

        for feed in self.live_feeds() {
            let tier = feed.tier();
            if !feed.is_available() {
                debug!("{request}: {} unavailable, skipping", feed.name());
                continue;
            }
            match feed.fetch(request, timeout) {
                Ok(payload) if payload.is_empty() => {
                    debug!("{request}: {} returned an empty payload", feed.name());
                }
                Ok(payload) => {
                    self.cache.insert(&key, payload.clone(), tier);
                    match accept(payload, tier) {
                        Some(value) => {
                            debug!("{request}: served by {}", feed.name());
                            return Some(Resolved::new(value, tier));
                        }
                        None => debug!("{request}: {} payload rejected", feed.name()),
                    }
                }
                Err(e) => debug!("{request}: {} failed: {e}", feed.name()),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FallbackConstants;
    use crate::data::fixture::{FixtureFeed, MarketFixture};
    use crate::data::provider::RequestKind;
    use crate::data::universe::SectorUniverse;
    use crate::domain::Quote;
    use crate::window::at;

    fn quote(symbol: &str, last: f64) -> Quote {
        Quote {
            symbol: symbol.into(),
            last,
            change: 0.0,
            change_pct: 0.5,
            volume: 1_000,
            avg_volume: 1_000,
            bid: None,
            ask: None,
        }
    }

    fn fixture_with_spy(tier: DataSource, last: f64) -> Arc<FixtureFeed> {
        let mut fixture = MarketFixture::default();
        fixture.quotes.insert("SPY".into(), quote("SPY", last));
        Arc::new(FixtureFeed::new("fixture", tier, fixture))
    }

    fn resolver() -> DataResolver {
        DataResolver::new(
            ProxyFeed::new("SPY", FallbackConstants::default(), SectorUniverse::default_spdr()),
            Duration::from_secs(30),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn primary_success_short_circuits() {
        let primary = fixture_with_spy(DataSource::Primary, 530.0);
        let secondary = fixture_with_spy(DataSource::Fallback, 529.0);
        let r = resolver()
            .with_primary(primary.clone())
            .with_secondary(secondary.clone());
        let got = r.resolve(&FeedRequest::quote("SPY"), &at(2024, 6, 3, 10, 0));
        assert_eq!(got.source, DataSource::Primary);
        assert_eq!(primary.calls(RequestKind::Quotes), 1);
        assert_eq!(secondary.calls(RequestKind::Quotes), 0);
    }

    #[test]
    fn failing_primary_falls_to_secondary() {
        let primary = fixture_with_spy(DataSource::Primary, 530.0);
        primary.set_failing(true);
        let secondary = fixture_with_spy(DataSource::Fallback, 529.0);
        let r = resolver()
            .with_primary(primary.clone())
            .with_secondary(secondary.clone());
        let got = r.resolve(&FeedRequest::quote("SPY"), &at(2024, 6, 3, 10, 0));
        assert_eq!(got.source, DataSource::Fallback);
        assert_eq!(got.value.into_quotes().unwrap()[0].last, 529.0);
    }

    #[test]
    fn all_live_tiers_failing_yields_proxy() {
        let primary = fixture_with_spy(DataSource::Primary, 530.0);
        primary.set_failing(true);
        let r = resolver().with_primary(primary);
        let got = r.resolve(&FeedRequest::quote("SPY"), &at(2024, 6, 3, 20, 0));
        assert_eq!(got.source, DataSource::Proxy);
        assert_eq!(got.value.into_quotes().unwrap()[0].last, 640.27);
    }

    #[test]
    fn rejected_payload_advances_tier() {
        let primary = fixture_with_spy(DataSource::Primary, 530.0);
        let secondary = fixture_with_spy(DataSource::Fallback, 529.0);
        let r = resolver()
            .with_primary(primary)
            .with_secondary(secondary.clone());
        let got = r.resolve_with(
            &FeedRequest::quote("SPY"),
            |p, tier| (tier == DataSource::Fallback).then_some(p),
            |_| FeedPayload::Quotes(vec![]),
        );
        assert_eq!(got.source, DataSource::Fallback);
        assert_eq!(secondary.calls(RequestKind::Quotes), 1);
    }

    #[test]
    fn cache_hit_keeps_tier_and_skips_feeds() {
        let primary = fixture_with_spy(DataSource::Primary, 530.0);
        let r = resolver().with_primary(primary.clone());
        let now = at(2024, 6, 3, 10, 0);
        r.resolve(&FeedRequest::quote("SPY"), &now);
        let again = r.resolve(&FeedRequest::quote("SPY"), &now);
        assert_eq!(again.source, DataSource::Primary);
        assert_eq!(primary.calls(RequestKind::Quotes), 1);
    }

    #[test]
    fn proxy_results_are_not_cached() {
        let r = resolver();
        r.resolve(&FeedRequest::quote("SPY"), &at(2024, 6, 3, 10, 0));
        assert!(r.cache().is_empty());
    }

    #[test]
    fn resolve_live_never_proxies() {
        let r = resolver();
        let got = r.resolve_live(&FeedRequest::quote("SPY"), |p, _| Some(p));
        assert!(got.is_none());
    }
}
