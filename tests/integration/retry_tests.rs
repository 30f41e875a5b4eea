//! Retry and failure handling integration tests
//!
//! Tests for the backoff state machine as seen from callers: how many times
//! the getter is invoked, the delays between attempts, and how terminal
//! failures reach every waiting caller.

#[cfg(test)]
mod tests {
    use crate::common::{
        CountingGetter, FAILURE, assert_elapsed, example_config, ids, retrying_config,
    };
    use async_trait::async_trait;
    use batchstore::{
        BatchConfig, BatchStore, Config, FetchError, Getter, RecordStore, Records, RetryConfig,
        ScaleConfig,
    };
    use serde_json::json;
    use std::time::Duration;

    /// Getter whose responses never line up with the request
    struct Garbled;

    #[async_trait]
    impl Getter for Garbled {
        type Id = u32;
        type Params = ();
        type Value = u32;
        type Response = Vec<u32>;
        type Error = String;

        async fn fetch(&self, _ids: &[u32], _params: &()) -> Result<Vec<u32>, String> {
            Ok(Vec::new())
        }

        fn parse_response(
            &self,
            response: Vec<u32>,
            ids: &[u32],
            _params: &(),
        ) -> Result<Records<u32, u32>, String> {
            Err(format!("got {} values for {} ids", response.len(), ids.len()))
        }
    }

    // ==================== Retries Disabled ====================

    #[tokio::test(start_paused = true)]
    async fn test_disabled_retry_rejects_every_caller() {
        let store = BatchStore::new(example_config(), CountingGetter::failing(1)).unwrap();

        let (a, b) = tokio::join!(
            store.get("a".to_string(), json!({})),
            store.get("b".to_string(), json!({}))
        );

        assert_eq!(a, Err(FetchError::Getter(FAILURE.to_string())));
        assert_eq!(b, Err(FetchError::Getter(FAILURE.to_string())));
        assert_eq!(store.getter().call_ids(), vec![ids(&["a", "b"])]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_ids_are_fresh_misses() {
        let store = BatchStore::new(example_config(), CountingGetter::failing(1)).unwrap();

        assert!(store.get("a".to_string(), json!({})).await.is_err());
        assert!(store.records().is_empty());
        assert_eq!(store.active_contexts(), 0);

        let retried = store.add("a".to_string(), json!({}));
        assert!(!retried.is_ready());
        assert!(retried.await.unwrap().is_some());
        assert_eq!(store.getter().call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_local_to_its_batch_key() {
        let store = BatchStore::new(example_config(), CountingGetter::failing_for("fr")).unwrap();

        let (fr, en) = tokio::join!(
            store.get("abc".to_string(), json!({"language": "fr"})),
            store.get("abc".to_string(), json!({"language": "en"}))
        );

        assert!(fr.unwrap_err().getter_error().is_some());
        assert_eq!(en, Ok(Some("en:abc".to_string())));
    }

    // ==================== Backoff ====================

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_after_max_plus_one_invocations() {
        let store =
            BatchStore::new(retrying_config(3, 5, 3.0), CountingGetter::always_failing()).unwrap();

        let outcome = store.get("foo".to_string(), json!({})).await;
        assert_eq!(outcome, Err(FetchError::Getter(FAILURE.to_string())));

        let calls = store.getter().calls();
        assert_eq!(calls.len(), 4);
        assert!(calls.iter().all(|c| c.ids == ids(&["foo"])));

        // base, base * mult, base * mult^2
        let gaps: Vec<_> = calls.windows(2).map(|w| w[1].at - w[0].at).collect();
        assert_elapsed(gaps[0], 5);
        assert_elapsed(gaps[1], 15);
        assert_elapsed(gaps[2], 45);

        let stats = store.stats();
        assert_eq!(stats.failed, 4);
        assert_eq!(stats.retries, 3);
        assert_eq!(stats.cancelled, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_max_never_retries() {
        let store =
            BatchStore::new(retrying_config(0, 5, 3.0), CountingGetter::always_failing()).unwrap();

        assert!(store.get("foo".to_string(), json!({})).await.is_err());
        assert_eq!(store.getter().call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_and_caches() {
        let store =
            BatchStore::new(retrying_config(3, 5, 2.0), CountingGetter::failing(2)).unwrap();

        let (a, b) = tokio::join!(
            store.get("a".to_string(), json!({"language": "de"})),
            store.get("b".to_string(), json!({"language": "de"}))
        );
        assert_eq!(a, Ok(Some("de:a".to_string())));
        assert_eq!(b, Ok(Some("de:b".to_string())));

        let calls = store.getter().calls();
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|c| c.ids == ids(&["a", "b"])));
        assert_elapsed(calls[2].at - calls[1].at, 10);

        assert!(store.add("a".to_string(), json!({"language": "de"})).is_ready());
        assert_eq!(store.active_contexts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_is_capped() {
        let config = example_config().with_retry(RetryConfig {
            enabled: true,
            max: 3,
            scale: ScaleConfig {
                base_ms: 10,
                mult: 10.0,
            },
            max_delay_ms: 50,
            jitter: false,
        });
        let store = BatchStore::new(config, CountingGetter::always_failing()).unwrap();

        let _ = store.get("foo".to_string(), json!({})).await;

        let calls = store.getter().calls();
        let gaps: Vec<_> = calls.windows(2).map(|w| w[1].at - w[0].at).collect();
        assert_elapsed(gaps[0], 10);
        assert_elapsed(gaps[1], 50);
        assert_elapsed(gaps[2], 50);
    }

    /// Two full sets of one key fail together; each keeps its own episode
    #[tokio::test(start_paused = true)]
    async fn test_concurrent_sets_keep_separate_episodes() {
        let config = retrying_config(2, 5, 3.0).with_batch(BatchConfig {
            enabled: true,
            limit: 2,
            tick_ms: 5,
        });
        let store = BatchStore::new(config, CountingGetter::always_failing()).unwrap();

        let outcome = store.get_many(ids(&["a", "b", "c", "d"]), json!({})).await;
        assert_eq!(outcome, Err(FetchError::Getter(FAILURE.to_string())));
        tokio::time::sleep(Duration::from_millis(100)).await;

        let calls = store.getter().calls();
        for set in [ids(&["a", "b"]), ids(&["c", "d"])] {
            let times: Vec<_> = calls.iter().filter(|c| c.ids == set).map(|c| c.at).collect();
            assert_eq!(times.len(), 3, "calls for {:?}", set);
            assert_elapsed(times[1] - times[0], 5);
            assert_elapsed(times[2] - times[1], 15);
        }
        assert_eq!(calls.len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_of_one_set_leaves_other_episode_alone() {
        let config = retrying_config(1, 5, 3.0).with_batch(BatchConfig {
            enabled: true,
            limit: 2,
            tick_ms: 5,
        });
        // Only the first set's first call fails
        let store = BatchStore::new(config, CountingGetter::failing(1)).unwrap();

        let values = store
            .get_many(ids(&["a", "b", "c", "d"]), json!({}))
            .await
            .unwrap();
        assert!(values.iter().all(Option::is_some));

        let call_ids = store.getter().call_ids();
        assert_eq!(
            call_ids,
            vec![ids(&["a", "b"]), ids(&["c", "d"]), ids(&["a", "b"])]
        );
        assert_eq!(store.stats().retries, 1);
    }

    // ==================== Parser Failures ====================

    #[tokio::test(start_paused = true)]
    async fn test_parser_failure_goes_through_retry() {
        let config = Config::default().with_retry(RetryConfig {
            enabled: true,
            max: 1,
            ..RetryConfig::default()
        });
        let store = BatchStore::new(config, Garbled).unwrap();

        let outcome = store.get_many([1, 2], ()).await;
        assert_eq!(
            outcome,
            Err(FetchError::Getter("got 0 values for 2 ids".to_string()))
        );

        let stats = store.stats();
        assert_eq!(stats.dispatched, 2);
        assert_eq!(stats.cancelled, 1);
    }

    // ==================== Events ====================

    #[tokio::test(start_paused = true)]
    async fn test_retry_lifecycle_events() {
        let store =
            BatchStore::new(retrying_config(3, 5, 3.0), CountingGetter::failing(1)).unwrap();
        let mut events = store.subscribe();

        store.get("foo".to_string(), json!({})).await.unwrap();

        let names: Vec<&str> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|event| event.name())
            .collect();
        assert_eq!(
            names,
            vec!["cacheMiss", "batch", "batchFailed", "batch", "batchSuccess"]
        );
    }
}
