//! Seed Registry Tests
//!
//! ## Test Scopes
//! - **Table**: ordering, self-exclusion, idempotent removal.
//! - **Service**: registration replies and dead-node reports over real TCP.

#[cfg(test)]
mod tests {
    use crate::event_log::EventSink;
    use crate::protocol::messages::{encode_registration, split_peer_list};
    use crate::protocol::{DeadNodeReport, Endpoint};
    use crate::seed::{SeedMembershipTable, SeedRegistry};
    use crate::shutdown::{self, ShutdownTrigger};
    use crate::transport;
    use std::sync::Arc;
    use std::time::Duration;

    fn ep(port: u16) -> Endpoint {
        Endpoint::new("127.0.0.1", port)
    }

    async fn start_seed() -> (Arc<SeedRegistry>, Arc<EventSink>, ShutdownTrigger) {
        let sink = EventSink::memory();
        let registry = SeedRegistry::new(ep(0), sink.clone()).await.unwrap();
        let (trigger, shutdown) = shutdown::channel();
        tokio::spawn(registry.clone().run(shutdown));
        (registry, sink, trigger)
    }

    async fn register(seed: &Endpoint, peer: &Endpoint) -> Vec<String> {
        let reply = transport::exchange(seed, &encode_registration(peer))
            .await
            .unwrap();
        split_peer_list(&reply).map(str::to_string).collect()
    }

    async fn wait_for_len(table: &SeedMembershipTable, len: usize) {
        for _ in 0..200 {
            if table.len().await == len {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("table never reached {} members", len);
    }

    async fn wait_for_lines(sink: &EventSink, count: usize) -> Vec<String> {
        for _ in 0..200 {
            let lines = sink.lines().await;
            if lines.len() >= count {
                return lines;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("event log never reached {} lines", count);
    }

    // ============================================================
    // TABLE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_snapshot_excludes_registrant() {
        let table = SeedMembershipTable::new();
        table.append(ep(1)).await;
        table.append(ep(2)).await;

        assert_eq!(table.snapshot_for(&ep(3)).await, vec![ep(1), ep(2)]);
        assert_eq!(table.snapshot_for(&ep(1)).await, vec![ep(2)]);
    }

    #[tokio::test]
    async fn test_append_is_not_duplicated() {
        let table = SeedMembershipTable::new();

        assert!(table.append(ep(1)).await);
        assert!(!table.append(ep(1)).await);
        assert_eq!(table.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let table = SeedMembershipTable::new();
        table.append(ep(1)).await;
        table.append(ep(2)).await;

        assert!(table.remove(&ep(1)).await);
        let after_first = table.members().await;

        assert!(!table.remove(&ep(1)).await);
        assert_eq!(table.members().await, after_first);
        assert_eq!(after_first, vec![ep(2)]);

        assert!(!table.remove(&ep(9)).await);
    }

    // ============================================================
    // SERVICE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_first_registration_gets_empty_reply() {
        let (seed, sink, _trigger) = start_seed().await;

        let candidates = register(&seed.endpoint, &ep(6001)).await;
        assert!(candidates.is_empty());

        let lines = wait_for_lines(&sink, 1).await;
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("Peer Addition: 127.0.0.1:6001"));
    }

    #[tokio::test]
    async fn test_registration_reply_lists_earlier_peers_only() {
        let (seed, _sink, _trigger) = start_seed().await;

        register(&seed.endpoint, &ep(6001)).await;
        wait_for_len(&seed.table, 1).await;
        register(&seed.endpoint, &ep(6002)).await;
        wait_for_len(&seed.table, 2).await;

        let candidates = register(&seed.endpoint, &ep(6003)).await;
        assert_eq!(candidates, vec!["127.0.0.1:6001", "127.0.0.1:6002"]);
    }

    #[tokio::test]
    async fn test_reregistration_never_returns_self() {
        let (seed, _sink, _trigger) = start_seed().await;

        register(&seed.endpoint, &ep(6001)).await;
        register(&seed.endpoint, &ep(6002)).await;
        wait_for_len(&seed.table, 2).await;

        let candidates = register(&seed.endpoint, &ep(6001)).await;
        assert_eq!(candidates, vec!["127.0.0.1:6002"]);
        assert_eq!(seed.table.len().await, 2);
    }

    #[tokio::test]
    async fn test_dead_node_report_removes_member_once() {
        let (seed, sink, _trigger) = start_seed().await;

        register(&seed.endpoint, &ep(6001)).await;
        register(&seed.endpoint, &ep(6002)).await;
        wait_for_len(&seed.table, 2).await;

        let report = DeadNodeReport::new(ep(6002), ep(6001)).encode();
        transport::notify(&seed.endpoint, &report).await.unwrap();
        wait_for_len(&seed.table, 1).await;

        transport::notify(&seed.endpoint, &report).await.unwrap();
        // two additions plus two reports
        let lines = wait_for_lines(&sink, 4).await;

        assert_eq!(seed.table.members().await, vec![ep(6001)]);
        let removals = lines
            .into_iter()
            .filter(|line| line.contains("Dead Node 127.0.0.1:6002 reported by 127.0.0.1:6001"))
            .count();
        assert_eq!(removals, 2);
    }

    #[tokio::test]
    async fn test_malformed_request_is_ignored() {
        let (seed, _sink, _trigger) = start_seed().await;

        let reply = transport::exchange(&seed.endpoint, "Not A Message:at:all")
            .await
            .unwrap();
        assert!(reply.is_empty());

        // Still serving afterwards.
        register(&seed.endpoint, &ep(6001)).await;
        wait_for_len(&seed.table, 1).await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_accepting() {
        let (seed, _sink, trigger) = start_seed().await;
        trigger.trigger();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The listener is still owned by the registry, so connects may queue in
        // the backlog, but nothing answers them anymore.
        let attempt = tokio::time::timeout(
            Duration::from_millis(200),
            transport::exchange(&seed.endpoint, &encode_registration(&ep(6001))),
        )
        .await;
        assert!(attempt.is_err() || attempt.unwrap().is_err());
        assert!(seed.table.is_empty().await);
    }
}
