//! Scanlator group names, resolved from a site-wide id → name table that is
//! fetched lazily in the background.
//!
//! Reads never wait on the network. While the table is missing, readers get
//! the id itself back and at most one refresh runs. A refresh publishes the
//! whole table at once, so readers see either the old table or the new one.

use std::{
    collections::HashMap,
    sync::{
        Arc, RwLock,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use yomu_lib::http::{Request, Response};

use crate::fetch::{Transport, ensure_success};

pub type ScanlatorMap = HashMap<String, String>;

#[async_trait]
pub trait ScanlatorLoader: Send + Sync {
    async fn load(&self) -> anyhow::Result<ScanlatorMap>;
}

/// Loads the table with one request, parsed by an adapter supplied function.
pub struct HttpScanlatorLoader {
    transport: Arc<dyn Transport>,
    request: Request,
    parse: fn(&Response) -> anyhow::Result<ScanlatorMap>,
}

impl HttpScanlatorLoader {
    pub fn new(
        transport: Arc<dyn Transport>,
        request: Request,
        parse: fn(&Response) -> anyhow::Result<ScanlatorMap>,
    ) -> Self {
        Self {
            transport,
            request,
            parse,
        }
    }
}

#[async_trait]
impl ScanlatorLoader for HttpScanlatorLoader {
    async fn load(&self) -> anyhow::Result<ScanlatorMap> {
        let res = ensure_success(self.transport.execute(self.request.clone()).await?)?;
        (self.parse)(&res)
    }
}

struct Inner {
    loader: Arc<dyn ScanlatorLoader>,
    map: RwLock<Option<Arc<ScanlatorMap>>>,
    refreshing: AtomicBool,
}

impl Inner {
    fn current(&self) -> Option<Arc<ScanlatorMap>> {
        match self.map.read() {
            Ok(map) => map.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn publish(&self, map: ScanlatorMap) {
        let map = Some(Arc::new(map));
        match self.map.write() {
            Ok(mut current) => *current = map,
            Err(poisoned) => *poisoned.into_inner() = map,
        }
    }

    /// Runs one load. The caller must hold the `refreshing` flag.
    async fn run_refresh(&self) -> bool {
        let loaded = match self.loader.load().await {
            Ok(map) if !map.is_empty() => {
                info!("loaded {} scanlator groups", map.len());
                self.publish(map);
                true
            }
            Ok(_) => {
                warn!("scanlator table is empty, keeping fallback names");
                false
            }
            Err(e) => {
                warn!("failed to load scanlator table: {e}");
                false
            }
        };
        self.refreshing.store(false, Ordering::Release);
        loaded
    }
}

#[derive(Clone)]
pub struct ScanlatorCache {
    inner: Arc<Inner>,
}

impl ScanlatorCache {
    pub fn new(loader: Arc<dyn ScanlatorLoader>) -> Self {
        Self {
            inner: Arc::new(Inner {
                loader,
                map: RwLock::new(None),
                refreshing: AtomicBool::new(false),
            }),
        }
    }

    fn claim(&self) -> bool {
        self.inner
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Starts a background refresh when the table is missing and none is in
    /// flight. Outside a tokio runtime nothing is started.
    fn trigger(&self) {
        if self.inner.current().is_some() || !self.claim() {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let inner = self.inner.clone();
                handle.spawn(async move {
                    inner.run_refresh().await;
                });
            }
            Err(_) => {
                debug!("no runtime to refresh scanlators on");
                self.inner.refreshing.store(false, Ordering::Release);
            }
        }
    }

    /// Loads the table now. Returns `false` if a refresh was already in
    /// flight or the load failed.
    pub async fn refresh(&self) -> bool {
        if !self.claim() {
            return false;
        }
        self.inner.run_refresh().await
    }

    pub fn is_populated(&self) -> bool {
        self.inner.current().is_some()
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.refreshing.load(Ordering::Acquire)
    }

    /// The current table, if loaded.
    pub fn snapshot(&self) -> Option<Arc<ScanlatorMap>> {
        self.trigger();
        self.inner.current()
    }

    /// Display name of a group id, or the id itself when unknown.
    pub fn display_name(&self, key: &str) -> String {
        self.snapshot()
            .and_then(|map| map.get(key).filter(|name| !name.is_empty()).cloned())
            .unwrap_or_else(|| key.to_string())
    }

    /// Group id of a display name, or the name itself when unknown.
    pub fn key_for_name(&self, name: &str) -> String {
        self.snapshot()
            .and_then(|map| {
                map.iter()
                    .find(|(_, value)| value.as_str() == name)
                    .map(|(key, _)| key.clone())
            })
            .unwrap_or_else(|| name.to_string())
    }

    /// Every known group id, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .snapshot()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

/// Picks the group to read a chapter from: the user's preference when it has
/// the chapter, else the first ranked group that has it, else the first
/// candidate.
///
/// # Panics
///
/// Panics when `candidates` is empty.
pub fn select_best_group<'a, S: AsRef<str>>(
    candidates: &'a [S],
    ranked: &[S],
    user_preferred: Option<&str>,
) -> &'a str {
    assert!(!candidates.is_empty(), "chapter has no scanlator group");

    let has = |key: &str| candidates.iter().find(|c| c.as_ref() == key);

    if let Some(found) = user_preferred.and_then(has) {
        return found.as_ref();
    }
    for key in ranked {
        if let Some(found) = has(key.as_ref()) {
            return found.as_ref();
        }
    }

    candidates[0].as_ref()
}

#[cfg(test)]
mod test {
    use std::{sync::atomic::AtomicUsize, time::Duration};

    use super::*;

    struct CountingLoader {
        calls: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl CountingLoader {
        fn new(delay: Duration, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                fail,
            })
        }
    }

    #[async_trait]
    impl ScanlatorLoader for CountingLoader {
        async fn load(&self) -> anyhow::Result<ScanlatorMap> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                anyhow::bail!("endpoint down");
            }
            Ok(HashMap::from([
                ("1".to_string(), "Psylocke Scans".to_string()),
                ("2".to_string(), "Jaimini's Box".to_string()),
            ]))
        }
    }

    #[tokio::test]
    async fn test_fallback_then_populated() {
        let loader = CountingLoader::new(Duration::from_millis(20), false);
        let cache = ScanlatorCache::new(loader.clone());

        assert_eq!(cache.display_name("1"), "1");
        assert_eq!(cache.key_for_name("Psylocke Scans"), "Psylocke Scans");
        assert!(cache.is_refreshing());

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(cache.is_populated());
        assert_eq!(cache.display_name("1"), "Psylocke Scans");
        assert_eq!(cache.display_name("9"), "9");
        assert_eq!(cache.key_for_name("Jaimini's Box"), "2");
        assert_eq!(cache.keys(), vec!["1".to_string(), "2".to_string()]);
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_flight() {
        let loader = CountingLoader::new(Duration::from_millis(50), false);
        let cache = ScanlatorCache::new(loader.clone());

        for _ in 0..20 {
            let _ = cache.display_name("1");
        }
        assert!(!cache.refresh().await);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_stays_empty() {
        let loader = CountingLoader::new(Duration::ZERO, true);
        let cache = ScanlatorCache::new(loader.clone());

        assert!(!cache.refresh().await);
        assert!(!cache.is_populated());
        assert!(!cache.is_refreshing());
        assert_eq!(cache.display_name("2"), "2");

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reads_outside_runtime() {
        let loader = CountingLoader::new(Duration::ZERO, false);
        let cache = ScanlatorCache::new(loader.clone());

        assert_eq!(cache.display_name("1"), "1");
        assert!(!cache.is_refreshing());
        assert_eq!(loader.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_select_best_group() {
        let candidates = ["3", "1", "2"];

        assert_eq!(select_best_group(&candidates, &["1", "2"], Some("2")), "2");
        assert_eq!(select_best_group(&candidates, &["1", "2"], Some("7")), "1");
        assert_eq!(select_best_group(&candidates, &["9", "2"], None), "2");
        assert_eq!(select_best_group(&candidates, &[], None), "3");
    }

    #[test]
    #[should_panic]
    fn test_select_best_group_empty() {
        let candidates: [&str; 0] = [];
        select_best_group(&candidates, &[], None);
    }
}
