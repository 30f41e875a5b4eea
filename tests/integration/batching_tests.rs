//! Batching and deduplication integration tests
//!
//! Tests for how lookups are grouped into getter calls: the accumulation
//! window, the size limit, batch key partitioning and in-flight joins.

#[cfg(test)]
mod tests {
    use crate::common::{
        CountingGetter, PositionalGetter, assert_elapsed, example_config, ids, value_for,
    };
    use batchstore::{BatchConfig, BatchStore, Config};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    // ==================== Accumulation Window ====================

    /// Two lookups inside the tick go out as one call, in arrival order
    #[tokio::test(start_paused = true)]
    async fn test_example_config_batches_within_tick() {
        let store = BatchStore::new(example_config(), CountingGetter::new()).unwrap();

        let foo = store.add("foo".to_string(), json!({}));
        let abc = store.add("abc".to_string(), json!({}));

        assert_eq!(foo.await, Ok(Some(value_for("foo", &json!({})))));
        assert_eq!(abc.await, Ok(Some(value_for("abc", &json!({})))));
        assert_eq!(store.getter().call_ids(), vec![ids(&["foo", "abc"])]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_waits_for_tick() {
        let store = BatchStore::new(example_config(), CountingGetter::new()).unwrap();
        let start = Instant::now();

        store.get("foo".to_string(), json!({})).await.unwrap();

        let calls = store.getter().calls();
        assert_eq!(calls.len(), 1);
        assert_elapsed(calls[0].at - start, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_union_is_deduplicated_in_arrival_order() {
        let store = BatchStore::new(example_config(), CountingGetter::new()).unwrap();
        let params = json!({"language": "fr"});

        let lookups: Vec<_> = ["c", "a", "c", "b", "a"]
            .iter()
            .map(|id| store.add(id.to_string(), params.clone()))
            .collect();
        for lookup in lookups {
            assert!(lookup.await.unwrap().is_some());
        }

        assert_eq!(store.getter().call_ids(), vec![ids(&["c", "a", "b"])]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_joined_callers_observe_same_value() {
        let store = BatchStore::new(example_config(), CountingGetter::new()).unwrap();

        let first = store.add("foo".to_string(), json!({"language": "en"}));
        let second = store.add("foo".to_string(), json!({"language": "en", "page": 4}));

        let (first, second) = tokio::join!(first, second);
        assert_eq!(first, second);
        assert_eq!(store.getter().call_count(), 1);
        assert_eq!(store.stats().deferred_hits, 1);
    }

    /// A lookup arriving while the previous dispatch runs starts a new batch
    #[tokio::test(start_paused = true)]
    async fn test_arrival_during_dispatch_opens_new_batch() {
        let getter = CountingGetter::new().with_latency(Duration::from_millis(20));
        let store = BatchStore::new(example_config(), getter).unwrap();

        let first = store.add("a".to_string(), json!({}));
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = store.add("b".to_string(), json!({}));

        assert!(first.await.is_ok());
        assert!(second.await.is_ok());
        assert_eq!(store.getter().call_ids(), vec![ids(&["a"]), ids(&["b"])]);
    }

    // ==================== Size Limit ====================

    #[tokio::test(start_paused = true)]
    async fn test_limit_splits_dispatch_sets() {
        let store = BatchStore::new(example_config(), CountingGetter::new()).unwrap();
        let start = Instant::now();

        let all: Vec<String> = (0..25).map(|i| format!("id{:02}", i)).collect();
        let values = store.get_many(all.clone(), json!({})).await.unwrap();
        assert!(values.iter().all(Option::is_some));

        let calls = store.getter().calls();
        let sizes: Vec<usize> = calls.iter().map(|c| c.ids.len()).collect();
        assert_eq!(sizes, vec![10, 10, 5]);

        // Full batches leave at once, the remainder waits for the tick
        assert_eq!(calls[0].at, start);
        assert_eq!(calls[1].at, start);
        assert_elapsed(calls[2].at - start, 5);

        let sent: Vec<String> = calls.into_iter().flat_map(|c| c.ids).collect();
        assert_eq!(sent, all);
    }

    // ==================== Partitioning ====================

    #[tokio::test(start_paused = true)]
    async fn test_distinct_keys_never_share_a_call() {
        let store = BatchStore::new(example_config(), CountingGetter::new()).unwrap();
        let fr = json!({"language": "fr"});
        let en = json!({"language": "en"});

        let (a, b) = tokio::join!(
            store.get("abc".to_string(), fr.clone()),
            store.get("abc".to_string(), en.clone())
        );
        assert_eq!(a, Ok(Some(value_for("abc", &fr))));
        assert_eq!(b, Ok(Some(value_for("abc", &en))));

        let calls = store.getter().calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.ids == ids(&["abc"])));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_unique_params_share_a_batch() {
        let store = BatchStore::new(example_config(), CountingGetter::new()).unwrap();

        let (a, b) = tokio::join!(
            store.get("a".to_string(), json!({"language": "fr", "page": 1})),
            store.get("b".to_string(), json!({"language": "fr", "page": 2}))
        );
        assert!(a.is_ok() && b.is_ok());

        let calls = store.getter().calls();
        assert_eq!(calls.len(), 1);
        // The first admission fixes the context's params
        assert_eq!(calls[0].params["page"], 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_unique_options_batches_everything() {
        let config = example_config();
        let config = Config {
            unique_options: Vec::new(),
            ..config
        };
        let store = BatchStore::new(config, CountingGetter::new()).unwrap();

        let (a, b) = tokio::join!(
            store.get("a".to_string(), json!({"language": "fr"})),
            store.get("b".to_string(), json!({"language": "en"}))
        );
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(store.getter().call_count(), 1);
    }

    // ==================== Batching Disabled ====================

    #[tokio::test(start_paused = true)]
    async fn test_disabled_batching_dispatches_immediately() {
        let config = example_config().with_batch(BatchConfig::disabled());
        let store = BatchStore::new(config, CountingGetter::new()).unwrap();
        let start = Instant::now();

        let values = store
            .get_many(ids(&["a", "b", "a"]), json!({}))
            .await
            .unwrap();
        assert_eq!(values[0], values[2]);

        let calls = store.getter().calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.ids.len() == 1 && c.at == start));
    }

    // ==================== Custom Parser ====================

    #[tokio::test(start_paused = true)]
    async fn test_custom_parser_maps_positional_response() {
        let store = BatchStore::new(Config::default(), PositionalGetter::default()).unwrap();

        let values = store.get_many([1, 2, 3, 4], ()).await.unwrap();
        assert_eq!(values, vec![None, Some(200), None, Some(400)]);
        assert_eq!(store.getter().call_count(), 1);
    }

    // ==================== Concurrency ====================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_tasks_dedupe_across_threads() {
        let store = Arc::new(BatchStore::new(example_config(), CountingGetter::new()).unwrap());

        let tasks: Vec<_> = (0..50)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    let id = format!("id{}", i % 5);
                    store.get(id, json!({"language": "fr"})).await
                })
            })
            .collect();

        for task in tasks {
            assert!(task.await.unwrap().unwrap().is_some());
        }

        let sent: Vec<String> = store
            .getter()
            .calls()
            .into_iter()
            .flat_map(|c| c.ids)
            .collect();
        assert_eq!(sent.len(), 5);
    }
}
