#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use futures::future::join_all;
    use tokio::time::sleep;

    use crate::keeper::{KeeperError, KeeperEvent};
    use crate::tests::common::{
        gated_keeper, gated_keeper_with_cache, sequential_keeper, wait_until_renewing, Probe,
    };

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_gets_on_empty_keeper_resolve_once() {
        let probe = Arc::new(Probe::default());
        let keeper = Arc::new(sequential_keeper(probe.clone(), Duration::from_millis(50)));

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let keeper = keeper.clone();
                tokio::spawn(async move { keeper.get().await })
            })
            .collect();

        for result in join_all(tasks).await {
            assert_eq!(result.unwrap().unwrap(), 1);
        }
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn populated_keeper_serves_concurrent_reads_from_cache() {
        let probe = Arc::new(Probe::default());
        let keeper = Arc::new(sequential_keeper(probe.clone(), Duration::from_millis(5)));
        assert_eq!(keeper.get().await.unwrap(), 1);

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let keeper = keeper.clone();
                tokio::spawn(async move { keeper.get().await })
            })
            .collect();

        for result in join_all(tasks).await {
            assert_eq!(result.unwrap().unwrap(), 1);
        }
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_renews_never_overlap() {
        let probe = Arc::new(Probe::default());
        let keeper = Arc::new(sequential_keeper(probe.clone(), Duration::from_millis(10)));

        let renewals = 16;
        let tasks: Vec<_> = (0..renewals)
            .map(|_| {
                let keeper = keeper.clone();
                tokio::spawn(async move { keeper.renew().await })
            })
            .collect();

        let results: Vec<usize> = join_all(tasks)
            .await
            .into_iter()
            .map(|result| result.unwrap().unwrap())
            .collect();

        assert_eq!(probe.max_active(), 1);
        assert!(probe.calls() >= 1 && probe.calls() <= renewals);
        assert!(results.iter().all(|value| *value >= 1 && *value <= probe.calls()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn callers_overlapping_a_renewal_share_its_result() {
        let probe = Arc::new(Probe::default());
        let keeper = Arc::new(gated_keeper(probe.clone(), false));

        let first = tokio::spawn({
            let keeper = keeper.clone();
            async move { keeper.renew().await }
        });
        wait_until_renewing(&keeper).await;

        let forced = tokio::spawn({
            let keeper = keeper.clone();
            async move { keeper.renew().await }
        });
        let plain = tokio::spawn({
            let keeper = keeper.clone();
            async move { keeper.get().await }
        });
        // let both waiters observe the in-flight attempt
        sleep(Duration::from_millis(50)).await;
        probe.gate.notify_one();

        assert_eq!(first.await.unwrap().unwrap(), 1);
        assert_eq!(forced.await.unwrap().unwrap(), 1);
        assert_eq!(plain.await.unwrap().unwrap(), 1);
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn failure_reaches_only_callers_of_that_attempt() {
        let probe = Arc::new(Probe::default());
        let keeper = Arc::new(gated_keeper(probe.clone(), true));

        let first = tokio::spawn({
            let keeper = keeper.clone();
            async move { keeper.get().await }
        });
        wait_until_renewing(&keeper).await;
        let joined = tokio::spawn({
            let keeper = keeper.clone();
            async move { keeper.get().await }
        });
        sleep(Duration::from_millis(50)).await;
        probe.gate.notify_one();

        let first_err = first.await.unwrap().unwrap_err();
        let joined_err = joined.await.unwrap().unwrap_err();
        assert!(matches!(first_err, KeeperError::Resolve(_)));
        assert_eq!(first_err.to_string(), joined_err.to_string());
        assert_eq!(probe.calls(), 1);

        assert!(!keeper.has_cache());
        assert_eq!(keeper.refresh_date(), None);
        assert!(!keeper.is_renewing());

        // a later call starts a fresh attempt
        probe.gate.notify_one();
        assert!(keeper.get().await.is_err());
        assert_eq!(probe.calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn failed_renewal_does_not_fail_overlapping_reads_of_valid_cache() {
        let probe = Arc::new(Probe::default());
        let keeper = Arc::new(gated_keeper_with_cache(probe.clone(), true, 7));

        let forced = tokio::spawn({
            let keeper = keeper.clone();
            async move { keeper.renew().await }
        });
        wait_until_renewing(&keeper).await;
        let reader = tokio::spawn({
            let keeper = keeper.clone();
            async move { keeper.get().await }
        });
        sleep(Duration::from_millis(50)).await;
        probe.gate.notify_one();

        assert!(matches!(forced.await.unwrap(), Err(KeeperError::Resolve(_))));
        assert_eq!(reader.await.unwrap().unwrap(), 7);
        assert_eq!(probe.calls(), 1);
        assert!(keeper.has_cache());
        assert_eq!(keeper.cache(), Some(7));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn clear_cache_does_not_cancel_in_flight_renewal() {
        let probe = Arc::new(Probe::default());
        let keeper = Arc::new(gated_keeper(probe.clone(), false));
        let mut events = keeper.subscribe();

        let first = tokio::spawn({
            let keeper = keeper.clone();
            async move { keeper.get().await }
        });
        wait_until_renewing(&keeper).await;
        keeper.clear_cache();
        assert!(keeper.is_renewing());
        probe.gate.notify_one();

        assert_eq!(first.await.unwrap().unwrap(), 1);
        assert!(keeper.has_cache());
        assert!(keeper.refresh_date().is_some());

        match events.try_recv().unwrap() {
            KeeperEvent::Renewed(renewal) => {
                assert_eq!(renewal.previous, None);
                assert_eq!(renewal.current, 1);
            }
            KeeperEvent::Failed { .. } => panic!("unexpected failure"),
        }
        assert!(events.try_recv().is_err());

        assert_eq!(keeper.get().await.unwrap(), 1);
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test]
    async fn refresh_date_is_monotonic() {
        let probe = Arc::new(Probe::default());
        let keeper = sequential_keeper(probe, Duration::ZERO);

        let mut previous = None;
        for _ in 0..10 {
            keeper.renew().await.unwrap();
            let current = keeper.refresh_date();
            assert!(current.is_some());
            assert!(current >= previous);
            previous = current;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn subscriber_may_read_keeper_without_deadlock() {
        let probe = Arc::new(Probe::default());
        let keeper = Arc::new(sequential_keeper(probe.clone(), Duration::ZERO));
        let mut events = keeper.subscribe();

        let reader = tokio::spawn({
            let keeper = keeper.clone();
            async move {
                let event = events.recv().await.unwrap();
                let renewal = event.renewal().cloned().unwrap();
                let read = keeper.get().await.unwrap();
                (renewal.current, read)
            }
        });

        keeper.get().await.unwrap();
        let (notified, read) = tokio::time::timeout(Duration::from_secs(5), reader)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(notified, 1);
        assert_eq!(read, 1);
        assert_eq!(probe.calls(), 1);
    }
}
