//! Process-wide cache of the identity provider's signing keys.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::JwkSet;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeySetError {
    #[error("key set fetch failed: {0}")]
    Fetch(String),

    #[error("key set fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("key set document is invalid: {0}")]
    Invalid(String),
}

/// Where signing keys come from. The HTTP implementation lives in `infra`.
#[async_trait]
pub trait KeySetSource: Send + Sync {
    /// Fetch the current key set document.
    ///
    /// # Errors
    ///
    /// Returns [`KeySetError`] when the document cannot be fetched or parsed.
    async fn fetch(&self) -> Result<JwkSet, KeySetError>;
}

/// Decoding keys indexed by `kid`.
pub struct SigningKeySet {
    keys: HashMap<String, DecodingKey>,
}

impl SigningKeySet {
    /// Build decoding keys for every usable JWK. Keys without a `kid` or with
    /// unsupported parameters are skipped.
    #[must_use]
    pub fn from_jwks(jwks: &JwkSet) -> Self {
        let mut keys = HashMap::with_capacity(jwks.keys.len());
        for jwk in &jwks.keys {
            let Some(kid) = jwk.common.key_id.as_deref() else {
                tracing::debug!("Skipping JWK without kid");
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    keys.insert(kid.to_owned(), key);
                }
                Err(e) => tracing::warn!(kid, error = %e, "Skipping unusable JWK"),
            }
        }
        Self { keys }
    }

    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&DecodingKey> {
        self.keys.get(kid)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn key_ids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }
}

struct Snapshot {
    keys: Arc<SigningKeySet>,
    fetched_at: Instant,
}

/// State only touched while holding the refresh lock.
#[derive(Default)]
struct RefreshState {
    last_error: Option<KeySetError>,
    last_forced_at: Option<Instant>,
}

/// Timing knobs for [`KeySetCache`].
#[derive(Debug, Clone, Copy)]
pub struct KeySetPolicy {
    pub max_age: Duration,
    pub min_refresh_interval: Duration,
    pub fetch_timeout: Duration,
}

/// Lazily populated, single-flight key set cache.
///
/// Readers take a lock-free snapshot. Fetches are serialized behind one async
/// mutex; a caller that waited on the mutex while another caller's fetch
/// completed returns that outcome instead of fetching again. A failed fetch
/// never replaces a previously good set.
pub struct KeySetCache {
    source: Arc<dyn KeySetSource>,
    policy: KeySetPolicy,
    current: ArcSwapOption<Snapshot>,
    /// Bumped once per completed fetch attempt.
    attempts: AtomicU64,
    refresh_lock: Mutex<RefreshState>,
}

impl KeySetCache {
    #[must_use]
    pub fn new(source: Arc<dyn KeySetSource>, policy: KeySetPolicy) -> Self {
        Self {
            source,
            policy,
            current: ArcSwapOption::empty(),
            attempts: AtomicU64::new(0),
            refresh_lock: Mutex::new(RefreshState::default()),
        }
    }

    /// Current key set, fetching when empty or older than the max age.
    ///
    /// A stale set is still served when the refresh fails.
    ///
    /// # Errors
    ///
    /// Returns [`KeySetError`] only when no key set has ever been fetched.
    pub async fn get(&self) -> Result<Arc<SigningKeySet>, KeySetError> {
        if let Some(keys) = self.fresh() {
            return Ok(keys);
        }
        match self.refresh(false).await {
            Ok(keys) => Ok(keys),
            Err(e) => match self.current.load_full() {
                Some(stale) => {
                    tracing::warn!(error = %e, "Serving stale key set after failed refresh");
                    Ok(Arc::clone(&stale.keys))
                }
                None => Err(e),
            },
        }
    }

    /// Fetch the key set. Without `force` this is a no-op while the set is fresh.
    ///
    /// Forced refreshes closer together than the minimum interval are
    /// suppressed and return the current set.
    ///
    /// # Errors
    ///
    /// Returns the fetch error; the previous set, if any, stays cached.
    pub async fn refresh(&self, force: bool) -> Result<Arc<SigningKeySet>, KeySetError> {
        let observed = self.attempts.load(Ordering::Acquire);
        let mut state = self.refresh_lock.lock().await;

        // Another caller finished a fetch while we were waiting: share its outcome.
        if self.attempts.load(Ordering::Acquire) != observed {
            return match (&state.last_error, self.current.load_full()) {
                (None, Some(snapshot)) => Ok(Arc::clone(&snapshot.keys)),
                (Some(e), _) => Err(e.clone()),
                (None, None) => Err(KeySetError::Fetch("no key set available".to_owned())),
            };
        }

        if !force && let Some(keys) = self.fresh() {
            return Ok(keys);
        }

        if force {
            let now = Instant::now();
            if let Some(last) = state.last_forced_at
                && now.saturating_duration_since(last) < self.policy.min_refresh_interval
                && let Some(snapshot) = self.current.load_full()
            {
                tracing::debug!("Forced key set refresh suppressed by minimum interval");
                return Ok(Arc::clone(&snapshot.keys));
            }
            state.last_forced_at = Some(now);
        }

        let outcome = self.fetch().await;
        self.attempts.fetch_add(1, Ordering::AcqRel);

        match outcome {
            Ok(keys) => {
                state.last_error = None;
                tracing::info!(keys = keys.len(), forced = force, "Key set refreshed");
                self.current.store(Some(Arc::new(Snapshot {
                    keys: Arc::clone(&keys),
                    fetched_at: Instant::now(),
                })));
                Ok(keys)
            }
            Err(e) => {
                tracing::warn!(error = %e, forced = force, "Key set refresh failed");
                state.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    async fn fetch(&self) -> Result<Arc<SigningKeySet>, KeySetError> {
        let jwks = tokio::time::timeout(self.policy.fetch_timeout, self.source.fetch())
            .await
            .map_err(|_| KeySetError::Timeout(self.policy.fetch_timeout))??;
        Ok(Arc::new(SigningKeySet::from_jwks(&jwks)))
    }

    fn fresh(&self) -> Option<Arc<SigningKeySet>> {
        let snapshot = self.current.load_full()?;
        (snapshot.fetched_at.elapsed() < self.policy.max_age).then(|| Arc::clone(&snapshot.keys))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    const N: &str = "yRE6rHuNR0QbHO3H3Kt2pOKGVhQqGZXInOduQNxXzuKlvQTLUTv4l4sggh5_CYYi_cvI-SXVT9kPWSKXxJXBXd_4LkvcPuUakBoAkfh-eiFVMh2VrUyWyj3MFl0HTVF9KwRXLAcwkREiS3npThHRyIxuy0ZMeZfxVL5arMhw1SRELB8HoGfG_AtH89BIE9jDBHZ9dLelK9a184zAf8LwoPLxvJb3Il5nncqPcSfKDDodMFBIMc4lQzDKL5gvmiXLXB1AGLm8KBjfE8s3L5xqi-yUod-j8MtvIj812dkS4QMiRVN_by2h3ZY8LYVGrqZXZTcgn2ujn8uKjXLZVD5TdQ";

    fn jwks(kids: &[&str]) -> JwkSet {
        let keys: Vec<_> = kids
            .iter()
            .map(|kid| {
                serde_json::json!({
                    "kty": "RSA", "use": "sig", "alg": "RS256",
                    "kid": kid, "n": N, "e": "AQAB"
                })
            })
            .collect();
        serde_json::from_value(serde_json::json!({ "keys": keys })).unwrap()
    }

    /// Serves the configured responses in order, repeating the last one.
    struct ScriptedSource {
        responses: std::sync::Mutex<Vec<Result<JwkSet, KeySetError>>>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<JwkSet, KeySetError>>) -> Arc<Self> {
            Self::with_delay(responses, Duration::ZERO)
        }

        fn with_delay(responses: Vec<Result<JwkSet, KeySetError>>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                responses: std::sync::Mutex::new(responses),
                calls: AtomicUsize::new(0),
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl KeySetSource for ScriptedSource {
        async fn fetch(&self) -> Result<JwkSet, KeySetError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let mut responses = self.responses.lock().unwrap();
            if responses.len() > 1 {
                responses.remove(0)
            } else {
                responses[0].clone()
            }
        }
    }

    fn policy() -> KeySetPolicy {
        KeySetPolicy {
            max_age: Duration::from_secs(600),
            min_refresh_interval: Duration::from_secs(30),
            fetch_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_get_fetches_lazily_once() {
        let source = ScriptedSource::new(vec![Ok(jwks(&["k1"]))]);
        let cache = KeySetCache::new(source.clone(), policy());
        assert_eq!(source.calls(), 0);

        let keys = cache.get().await.unwrap();
        assert!(keys.find("k1").is_some());
        cache.get().await.unwrap();

        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn test_jwk_without_kid_is_skipped() {
        let mut set = jwks(&["k1"]);
        set.keys[0].common.key_id = None;
        let keys = SigningKeySet::from_jwks(&set);
        assert!(keys.is_empty());
    }

    #[tokio::test]
    async fn test_unforced_refresh_is_noop_while_fresh() {
        let source = ScriptedSource::new(vec![Ok(jwks(&["k1"]))]);
        let cache = KeySetCache::new(source.clone(), policy());

        cache.get().await.unwrap();
        cache.refresh(false).await.unwrap();

        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_forced_refresh_fetches_new_keys() {
        let source = ScriptedSource::new(vec![Ok(jwks(&["k1"])), Ok(jwks(&["k2"]))]);
        let cache = KeySetCache::new(source.clone(), policy());

        assert!(cache.get().await.unwrap().find("k2").is_none());
        let keys = cache.refresh(true).await.unwrap();

        assert!(keys.find("k2").is_some());
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_forced_refresh_burst_is_suppressed() {
        let source = ScriptedSource::new(vec![Ok(jwks(&["k1"]))]);
        let cache = KeySetCache::new(source.clone(), policy());

        cache.get().await.unwrap();
        cache.refresh(true).await.unwrap();
        cache.refresh(true).await.unwrap();
        cache.refresh(true).await.unwrap();

        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_set() {
        let source = ScriptedSource::new(vec![
            Ok(jwks(&["k1"])),
            Err(KeySetError::Fetch("connection refused".to_owned())),
        ]);
        let cache = KeySetCache::new(source.clone(), policy());

        cache.get().await.unwrap();
        let err = cache.refresh(true).await.err().unwrap();
        assert_eq!(err, KeySetError::Fetch("connection refused".to_owned()));

        let keys = cache.get().await.unwrap();
        assert!(keys.find("k1").is_some());
    }

    #[tokio::test]
    async fn test_stale_set_served_when_refresh_fails() {
        let source = ScriptedSource::new(vec![
            Ok(jwks(&["k1"])),
            Err(KeySetError::Fetch("down".to_owned())),
        ]);
        let cache = KeySetCache::new(
            source.clone(),
            KeySetPolicy {
                max_age: Duration::ZERO,
                ..policy()
            },
        );

        cache.get().await.unwrap();
        let keys = cache.get().await.unwrap();

        assert!(keys.find("k1").is_some());
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_first_fetch_failure_is_reported() {
        let source = ScriptedSource::new(vec![Err(KeySetError::Fetch("down".to_owned()))]);
        let cache = KeySetCache::new(source, policy());

        assert!(cache.get().await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let source =
            ScriptedSource::with_delay(vec![Ok(jwks(&["k1"]))], Duration::from_millis(200));
        let cache = KeySetCache::new(
            source,
            KeySetPolicy {
                fetch_timeout: Duration::from_millis(20),
                ..policy()
            },
        );

        let err = cache.get().await.err().unwrap();
        assert_eq!(err, KeySetError::Timeout(Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn test_concurrent_forced_refreshes_share_one_fetch() {
        let source =
            ScriptedSource::with_delay(vec![Ok(jwks(&["k1"]))], Duration::from_millis(50));
        let cache = Arc::new(KeySetCache::new(source.clone(), policy()));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move { cache.refresh(true).await }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().unwrap().find("k1").is_some());
        }

        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_waiters_share_failure() {
        let source = ScriptedSource::with_delay(
            vec![Err(KeySetError::Fetch("down".to_owned()))],
            Duration::from_millis(50),
        );
        let cache = Arc::new(KeySetCache::new(source.clone(), policy()));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move { cache.refresh(true).await }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_err());
        }

        assert_eq!(source.calls(), 1);
    }
}
