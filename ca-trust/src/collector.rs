//! Trust collection for every host an overlay graph touched.
//!
//! Flow:
//!   1) graph base URLs → TLS hosts (resolved, deduplicated, sorted)
//!   2) per host: cached chain within TTL, else a live handshake (bounded
//!      concurrency, per-handshake timeout)
//!   3) merge chains in host order into one fingerprint-deduplicated bundle
//!   4) render PEM into `graph.ca_bundle`
//!
//! A host that cannot be reached is logged and left out of the bundle.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use overlay_graph::Graph;
use tracing::{debug, info, warn};

use crate::bundle::TrustBundle;
use crate::cache::ChainCache;
use crate::capture::{ChainSource, DEFAULT_HANDSHAKE_TIMEOUT, TlsChainSource};
use crate::cert::Certificate;
use crate::config::TrustConfig;
use crate::errors::{HandshakeError, TrustResult};
use crate::host::resolve_tls_host;

pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);
const DEFAULT_CONCURRENCY: usize = 4;

/// Distinct TLS hosts behind `graph.base_urls`, sorted.
pub fn unique_hosts(graph: Option<&Graph>) -> Vec<String> {
    let Some(graph) = graph else {
        return Vec::new();
    };
    let mut hosts = BTreeSet::new();
    for (node, base_url) in &graph.base_urls {
        match resolve_tls_host(base_url) {
            Ok(host) => {
                hosts.insert(host);
            }
            Err(e) => warn!(node = %node, error = %e, "skipping unresolvable base url"),
        }
    }
    hosts.into_iter().collect()
}

pub struct Collector<C = TlsChainSource> {
    source: C,
    cache: ChainCache,
    concurrency: usize,
}

impl Collector<TlsChainSource> {
    /// Live handshakes on port 443 with the default timeout.
    pub fn new(ttl: Duration) -> TrustResult<Self> {
        Ok(Self::with_source(TlsChainSource::new(DEFAULT_HANDSHAKE_TIMEOUT)?, ttl))
    }

    pub fn from_config(cfg: &TrustConfig) -> TrustResult<Self> {
        cfg.validate()?;
        let source = TlsChainSource::new(cfg.handshake_timeout)?;
        Ok(Self::with_source(source, cfg.ttl).with_concurrency(cfg.concurrency))
    }
}

impl<C: ChainSource> Collector<C> {
    pub fn with_source(source: C, ttl: Duration) -> Self {
        Self {
            source,
            cache: ChainCache::new(ttl),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Captures and merges the chains of `hosts`, in the given order.
    pub async fn collect_bundle(&self, hosts: &[String]) -> TrustBundle {
        let mut results: Vec<(usize, &str, Result<Vec<Certificate>, HandshakeError>)> =
            stream::iter(hosts.iter().enumerate())
                .map(|(i, host)| async move { (i, host.as_str(), self.chain_for(host).await) })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;
        results.sort_by_key(|(i, _, _)| *i);

        let mut bundle = TrustBundle::new();
        for (_, host, chain) in results {
            match chain {
                Ok(chain) => {
                    let added = chain.into_iter().map(|c| bundle.push(c)).filter(|new| *new).count();
                    debug!(host, added, "chain merged");
                }
                Err(e) => warn!(host, error = %e, "skipping host"),
            }
        }
        bundle
    }

    /// Collects for every host of `graph` and stores the PEM bundle on it.
    pub async fn collect_and_attach(&self, graph: &mut Graph) -> TrustBundle {
        let hosts = unique_hosts(Some(&*graph));
        if hosts.is_empty() {
            debug!("no hosts to collect");
            graph.ca_bundle.clear();
            return TrustBundle::new();
        }

        let bundle = self.collect_bundle(&hosts).await;
        graph.ca_bundle = bundle.to_pem();
        info!(hosts = hosts.len(), certificates = bundle.len(), "trust bundle attached");
        bundle
    }

    async fn chain_for(&self, host: &str) -> Result<Vec<Certificate>, HandshakeError> {
        if let Some(chain) = self.cache.get(host, Utc::now()).await {
            debug!(host, "chain cache hit");
            return Ok(chain);
        }
        let chain = self.source.fetch_chain(host).await?;
        self.cache.put(host, chain.clone(), Utc::now()).await;
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted chains per host; unknown hosts refuse the connection.
    #[derive(Default)]
    struct FakeSource {
        chains: HashMap<String, Vec<Certificate>>,
        dials: Mutex<Vec<String>>,
        delay: Option<Duration>,
    }

    impl FakeSource {
        fn with(mut self, host: &str, ders: &[&[u8]]) -> Self {
            let chain = ders.iter().map(|d| Certificate::from_der(d.to_vec())).collect();
            self.chains.insert(host.to_string(), chain);
            self
        }

        fn dials(&self) -> Vec<String> {
            self.dials.lock().unwrap().clone()
        }
    }

    impl ChainSource for FakeSource {
        async fn fetch_chain(&self, host: &str) -> Result<Vec<Certificate>, HandshakeError> {
            self.dials.lock().unwrap().push(host.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.chains
                .get(host)
                .cloned()
                .ok_or_else(|| HandshakeError::Connect {
                    host: host.to_string(),
                    port: 443,
                    source: std::io::ErrorKind::ConnectionRefused.into(),
                })
        }
    }

    fn graph_with(base_urls: &[(&str, &str)]) -> Graph {
        let mut g = Graph::new();
        for (node, url) in base_urls {
            g.record_base_url(node, url);
        }
        g
    }

    fn hosts(list: &[&str]) -> Vec<String> {
        list.iter().map(|h| h.to_string()).collect()
    }

    #[test]
    fn unique_hosts_of_nothing_is_empty() {
        assert!(unique_hosts(None).is_empty());
        assert!(unique_hosts(Some(&Graph::new())).is_empty());
    }

    #[test]
    fn unique_hosts_are_deduplicated_and_sorted() {
        let g = graph_with(&[
            ("gitlab:a/b@main", "https://gitlab.example.com"),
            ("gitlab:a/b/x@main", "https://gitlab.example.com/"),
            ("github:c/d@main", "https://github.com"),
            ("github:e/f@main", "https://ghe.example.com"),
            ("github:g/h@main", "http://[::1"),
        ]);
        assert_eq!(
            unique_hosts(Some(&g)),
            hosts(&["api.github.com", "ghe.example.com", "gitlab.example.com"])
        );
    }

    #[tokio::test]
    async fn shared_certificates_are_stored_once_in_host_order() {
        let source = FakeSource::default()
            .with("a.example.com", &[b"leaf-a", b"intermediate", b"root"])
            .with("b.example.com", &[b"leaf-b", b"intermediate", b"root"]);
        let collector = Collector::with_source(source, DEFAULT_TTL);

        let bundle = collector
            .collect_bundle(&hosts(&["a.example.com", "b.example.com"]))
            .await;
        let order: Vec<&[u8]> = bundle.iter().map(|c| &c.der()[..]).collect();
        assert_eq!(
            order,
            vec![
                b"leaf-a".as_slice(),
                b"intermediate".as_slice(),
                b"root".as_slice(),
                b"leaf-b".as_slice(),
            ]
        );
    }

    #[tokio::test]
    async fn unreachable_host_is_skipped() {
        let source = FakeSource::default().with("ok.example.com", &[b"leaf", b"root"]);
        let collector = Collector::with_source(source, DEFAULT_TTL).with_concurrency(1);

        let bundle = collector
            .collect_bundle(&hosts(&["down.example.com", "ok.example.com"]))
            .await;
        assert_eq!(bundle.len(), 2);
        assert_eq!(collector.source.dials().len(), 2);
    }

    #[tokio::test]
    async fn cache_hit_avoids_second_dial() {
        let source = FakeSource::default().with("gitlab.example.com", &[b"leaf"]);
        let collector = Collector::with_source(source, DEFAULT_TTL);
        let list = hosts(&["gitlab.example.com"]);

        let first = collector.collect_bundle(&list).await;
        let second = collector.collect_bundle(&list).await;
        assert_eq!(first, second);
        assert_eq!(collector.source.dials(), hosts(&["gitlab.example.com"]));
    }

    #[tokio::test]
    async fn cache_entry_is_stamped_when_the_handshake_finishes() {
        let mut source = FakeSource::default().with("slow.example.com", &[b"leaf"]);
        source.delay = Some(Duration::from_millis(300));
        let collector = Collector::with_source(source, Duration::from_secs(10));

        let started = Utc::now();
        collector.collect_bundle(&hosts(&["slow.example.com"])).await;

        let just_past_ttl_from_start = started + chrono::TimeDelta::milliseconds(10_100);
        assert!(
            collector
                .cache
                .get("slow.example.com", just_past_ttl_from_start)
                .await
                .is_some()
        );
    }

    #[tokio::test]
    async fn zero_ttl_dials_every_time() {
        let source = FakeSource::default().with("gitlab.example.com", &[b"leaf"]);
        let collector = Collector::with_source(source, Duration::ZERO);
        let list = hosts(&["gitlab.example.com"]);

        collector.collect_bundle(&list).await;
        collector.collect_bundle(&list).await;
        assert_eq!(collector.source.dials().len(), 2);
    }

    #[tokio::test]
    async fn attach_is_reproducible() {
        let source = FakeSource::default()
            .with("api.github.com", &[b"gh-leaf", b"gh-root"])
            .with("gitlab.example.com", &[b"gl-leaf", b"gh-root"]);
        let collector = Collector::with_source(source, Duration::ZERO).with_concurrency(8);

        let mut g = graph_with(&[
            ("gitlab:t/app@main", "https://gitlab.example.com"),
            ("github:o/r@main", "https://github.com"),
        ]);
        let bundle = collector.collect_and_attach(&mut g).await;
        assert_eq!(bundle.len(), 3);
        let first = g.ca_bundle.clone();
        assert_eq!(TrustBundle::from_pem(&first).unwrap(), bundle);

        collector.collect_and_attach(&mut g).await;
        assert_eq!(g.ca_bundle, first);
    }

    #[tokio::test]
    async fn empty_graph_keeps_bundle_empty() {
        let collector = Collector::with_source(FakeSource::default(), DEFAULT_TTL);
        let mut g = Graph::new();
        assert!(collector.collect_and_attach(&mut g).await.is_empty());
        assert!(g.ca_bundle.is_empty());
        assert!(collector.source.dials().is_empty());
    }
}
