//! Path tracer tests against scripted probers

mod common;

use common::{RecordingGeo, RecordingMap, ScriptedProber};
use futures::StreamExt;
use netpath::geo::{LOCAL_NETWORK, UNKNOWN_LOCATION};
use netpath::map::MapCommand;
use netpath::trace::engine::WARMUP_ADDRESS;
use netpath::{PathTracer, ProbeStatus, TraceOptions, TraceReport, TraceTermination};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    prober: Arc<ScriptedProber>,
    geo: Arc<RecordingGeo>,
    map: Arc<RecordingMap>,
}

impl Harness {
    fn new(prober: ScriptedProber) -> Self {
        Self::with_geo(prober, RecordingGeo::default())
    }

    fn with_geo(prober: ScriptedProber, geo: RecordingGeo) -> Self {
        Self {
            prober: Arc::new(prober),
            geo: Arc::new(geo),
            map: Arc::new(RecordingMap::default()),
        }
    }

    fn tracer(&self) -> PathTracer {
        PathTracer::new(self.prober.clone(), self.geo.clone(), self.map.clone())
    }

    async fn run(&self, target: &str, max_hops: u8) -> TraceReport {
        let options = TraceOptions::default().with_max_hops(max_hops);
        TraceReport::collect(target, self.tracer().trace(target, options)).await
    }
}

#[tokio::test]
async fn test_timeout_then_private_hop_then_destination() {
    let harness = Harness::new(
        ScriptedProber::new(ProbeStatus::TimedOut)
            .hop(1, ProbeStatus::TimedOut, None)
            .hop(2, ProbeStatus::TtlExceeded, Some("192.168.0.1"))
            .hop(3, ProbeStatus::Success, Some("10.0.0.5")),
    );

    let report = harness.run("10.0.0.5", 5).await;

    assert_eq!(report.hops.len(), 3);
    assert_eq!(report.hops[0].address, "*");
    assert_eq!(report.hops[0].network_time_label, "Timeout");
    assert_eq!(report.hops[1].address, "192.168.0.1");
    assert_eq!(report.hops[1].geo_label, LOCAL_NETWORK);
    assert_eq!(report.hops[2].status, ProbeStatus::Success);
    assert_eq!(report.termination, TraceTermination::ReachedDestination);

    // Halted before ttl 4
    assert_eq!(harness.prober.ttls(), vec![1, 2, 3]);
    // Private addresses never reach the geo service
    assert!(harness.geo.lookups().is_empty());
}

#[tokio::test]
async fn test_silent_target_exhausts_max_hops() {
    let harness = Harness::new(ScriptedProber::new(ProbeStatus::TimedOut));

    let report = harness.run("203.0.113.50", 7).await;

    assert_eq!(report.hops.len(), 7);
    assert!(report.hops.iter().all(|hop| hop.address == "*"));
    assert!(report.hops.iter().all(|hop| hop.status != ProbeStatus::Success));
    assert_eq!(report.termination, TraceTermination::Exhausted);
}

#[tokio::test]
async fn test_warmup_and_clear_precede_first_hop() {
    let harness = Harness::new(ScriptedProber::new(ProbeStatus::Success).hop(
        1,
        ProbeStatus::Success,
        Some("127.0.0.1"),
    ));

    harness.run("127.0.0.1", 30).await;

    let calls = harness.prober.calls();
    assert_eq!(calls[0].address, WARMUP_ADDRESS);
    assert_eq!(calls[0].ttl, None);
    assert_eq!(calls[0].timeout, Duration::from_millis(100));
    assert_eq!(calls[1].ttl, Some(1));
    assert_eq!(calls[1].timeout, Duration::from_millis(1000));
    assert_eq!(calls.len(), 2);

    assert_eq!(harness.map.commands(), vec![MapCommand::Clear]);
}

#[tokio::test]
async fn test_stream_is_lazy_and_progressive() {
    let harness = Harness::new(
        ScriptedProber::new(ProbeStatus::TimedOut)
            .hop(1, ProbeStatus::TtlExceeded, Some("10.1.1.1"))
            .hop(2, ProbeStatus::Success, Some("10.2.2.2")),
    );

    let mut hops = harness.tracer().trace("10.2.2.2", TraceOptions::default());
    assert!(harness.prober.calls().is_empty());
    assert!(harness.map.commands().is_empty());

    let first = hops.next().await.unwrap();
    assert_eq!(first.hop_index, 1);
    assert_eq!(harness.prober.ttls(), vec![1]);

    let second = hops.next().await.unwrap();
    assert_eq!(second.hop_index, 2);
    assert!(hops.next().await.is_none());
    assert_eq!(harness.prober.ttls(), vec![1, 2]);
}

#[tokio::test]
async fn test_hostname_resolved_once_for_all_hops() {
    let harness = Harness::new(ScriptedProber::new(ProbeStatus::TimedOut));

    let report = harness.run("localhost", 4).await;

    assert_eq!(report.target, "localhost");
    let hop_addresses: Vec<String> = harness
        .prober
        .calls()
        .into_iter()
        .filter(|call| call.ttl.is_some())
        .map(|call| call.address)
        .collect();
    assert_eq!(hop_addresses.len(), 4);
    let first: std::net::IpAddr = hop_addresses[0].parse().unwrap();
    assert!(first.is_loopback());
    assert!(hop_addresses.iter().all(|address| *address == hop_addresses[0]));
}

#[tokio::test]
async fn test_fatal_hop_stops_trace() {
    let harness = Harness::new(
        ScriptedProber::new(ProbeStatus::TimedOut)
            .hop(1, ProbeStatus::TtlExceeded, Some("10.0.0.1"))
            .failing_hop(2, "DestinationHostUnreachable"),
    );

    let report = harness.run("198.51.100.9", 30).await;

    assert_eq!(report.hops.len(), 2);
    let last = &report.hops[1];
    assert_eq!(last.address, "error");
    assert_eq!(last.status, ProbeStatus::Error);
    assert_eq!(last.network_time_label, "DestinationHostUnreachable");
    assert_eq!(last.geo_label, "DestinationHostUnreachable");
    assert_eq!(report.termination, TraceTermination::Failed);
    assert_eq!(harness.prober.ttls(), vec![1, 2]);
}

#[tokio::test]
async fn test_public_hops_are_enriched_and_plotted_in_order() {
    let harness = Harness::new(
        ScriptedProber::new(ProbeStatus::TimedOut)
            .hop(1, ProbeStatus::TtlExceeded, Some("203.0.113.1"))
            .hop(2, ProbeStatus::TimedOut, None)
            .hop(3, ProbeStatus::Success, Some("198.51.100.7")),
    );

    let report = harness.run("198.51.100.7", 30).await;

    assert_eq!(harness.geo.lookups(), vec!["203.0.113.1", "198.51.100.7"]);
    let first = &report.hops[0];
    assert_eq!(first.geo_label, "Testland, O'Hare (Example <Net>)");
    assert_eq!(first.latitude, Some(41.97));
    assert_eq!(first.longitude, Some(-87.9));
    assert_eq!(first.network_time_label, "3 ms");
    assert_eq!(first.local_time_label, "3.42 ms");

    let commands = harness.map.commands();
    assert_eq!(commands.len(), 3);
    assert_eq!(commands[0], MapCommand::Clear);
    match &commands[1] {
        MapCommand::AddPoint { lat, lon, label } => {
            assert_eq!((*lat, *lon), (41.97, -87.9));
            assert_eq!(label, "Hop 1: 203.0.113.1<br>Testland, O&#39;Hare (Example &lt;Net&gt;)");
        }
        other => panic!("unexpected command {:?}", other),
    }
    match &commands[2] {
        MapCommand::AddPoint { label, .. } => assert!(label.starts_with("Hop 3: 198.51.100.7<br>")),
        other => panic!("unexpected command {:?}", other),
    }
}

#[tokio::test]
async fn test_geo_failure_does_not_abort_trace() {
    let harness = Harness::with_geo(
        ScriptedProber::new(ProbeStatus::TimedOut)
            .hop(1, ProbeStatus::TtlExceeded, Some("203.0.113.1"))
            .hop(2, ProbeStatus::Success, Some("198.51.100.7")),
        RecordingGeo::failing(),
    );

    let report = harness.run("198.51.100.7", 30).await;

    assert_eq!(report.hops.len(), 2);
    assert!(report.hops.iter().all(|hop| hop.geo_label == UNKNOWN_LOCATION));
    assert!(report.hops.iter().all(|hop| hop.latitude.is_none()));
    assert!(report.reached_destination());
    // Only the clear command; nothing to plot
    assert_eq!(harness.map.commands(), vec![MapCommand::Clear]);
}

#[tokio::test]
async fn test_geo_answer_without_coordinates_is_not_plotted() {
    let harness = Harness::with_geo(
        ScriptedProber::new(ProbeStatus::TimedOut).hop(1, ProbeStatus::Success, Some("198.51.100.7")),
        RecordingGeo::without_coordinates(),
    );

    let report = harness.run("198.51.100.7", 30).await;

    assert_eq!(report.hops[0].geo_label, "Testland");
    assert_eq!(report.hops[0].latitude, None);
    assert_eq!(report.hops[0].longitude, None);
    assert_eq!(harness.map.commands(), vec![MapCommand::Clear]);
}

#[tokio::test]
async fn test_loopback_destination_uses_local_placeholder() {
    let harness = Harness::new(ScriptedProber::new(ProbeStatus::TimedOut).hop(
        1,
        ProbeStatus::Success,
        Some("::1"),
    ));

    let report = harness.run("::1", 30).await;

    assert_eq!(report.hops[0].geo_label, "Local host");
    assert!(harness.geo.lookups().is_empty());
}

fn status_strategy() -> impl Strategy<Value = ProbeStatus> {
    prop_oneof![
        4 => Just(ProbeStatus::TimedOut),
        4 => Just(ProbeStatus::TtlExceeded),
        1 => Just(ProbeStatus::Success),
        1 => Just(ProbeStatus::Error),
    ]
}

proptest! {
    #[test]
    fn prop_hop_indices_are_contiguous(
        statuses in prop::collection::vec(status_strategy(), 1..40),
        max_hops in 1u8..40,
    ) {
        let mut prober = ScriptedProber::new(ProbeStatus::TimedOut);
        for (i, status) in statuses.iter().enumerate() {
            let ttl = (i + 1) as u8;
            prober = match status {
                ProbeStatus::Error => prober.failing_hop(ttl, "boom"),
                ProbeStatus::TimedOut => prober.hop(ttl, *status, None),
                _ => prober.hop(ttl, *status, Some("203.0.113.1")),
            };
        }
        let harness = Harness::new(prober);

        let report = tokio_test::block_on(harness.run("203.0.113.1", max_hops));

        prop_assert!(!report.hops.is_empty());
        prop_assert!(report.hops.len() <= max_hops as usize);
        for (i, hop) in report.hops.iter().enumerate() {
            prop_assert_eq!(hop.hop_index as usize, i + 1);
        }

        // Only the last hop may end the trace
        let (last, rest) = report.hops.split_last().unwrap();
        prop_assert!(rest.iter().all(|hop| !hop.is_terminal()));
        if report.hops.len() < max_hops as usize {
            prop_assert!(last.is_terminal());
        }
    }
}
