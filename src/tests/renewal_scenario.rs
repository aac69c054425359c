// Walks a keeper through the usual lifecycle: lazy first resolve, cached
// reads, forced renewal with notification, invalidation and re-resolve.

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::keeper::KeeperEvent;
    use crate::tests::common::{sequential_keeper, Probe};

    #[tokio::test]
    async fn get_renew_clear_sequence() {
        let probe = Arc::new(Probe::default());
        let keeper = sequential_keeper(probe.clone(), Duration::ZERO);
        let mut events = keeper.subscribe();

        assert!(!keeper.has_cache());
        assert_eq!(keeper.get().await.unwrap(), 1);
        assert!(keeper.has_cache());
        let first_refresh = keeper.refresh_date();
        assert!(first_refresh.is_some());

        assert_eq!(keeper.get().await.unwrap(), 1);
        assert_eq!(probe.calls(), 1);

        assert_eq!(keeper.renew().await.unwrap(), 2);
        assert!(keeper.refresh_date() >= first_refresh);

        keeper.clear_cache();
        assert!(!keeper.has_cache());
        assert_eq!(keeper.get().await.unwrap(), 3);

        let mut changes = Vec::new();
        while let Ok(event) = events.try_recv() {
            match event {
                KeeperEvent::Renewed(renewal) => changes.push((renewal.previous, renewal.current)),
                KeeperEvent::Failed { .. } => panic!("unexpected failure"),
            }
        }
        assert_eq!(changes, vec![(None, 1), (Some(1), 2), (Some(2), 3)]);
    }
}
