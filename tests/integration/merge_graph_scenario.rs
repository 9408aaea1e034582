use std::sync::atomic::Ordering;
use std::sync::{Arc, Once};

use bodygraph::{
    BodyId, CounterMetrics, Edge, EdgeTable, InMemoryMembership, MergeGraphError,
    MergeGraphIndex, MergeGraphOptions, QueryPath, RepairOutcome, Result, SupervoxelId,
    VersionContext,
};
use tracing_subscriber::EnvFilter;

const PRIMARY: &str = "a7f3c0de";

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("bodygraph=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

fn primary() -> VersionContext {
    VersionContext::new("emdata:8900", PRIMARY, "segmentation")
}

fn historical() -> VersionContext {
    VersionContext::new("emdata:8900", "99bb", "segmentation")
}

struct Harness {
    source: Arc<InMemoryMembership>,
    metrics: Arc<CounterMetrics>,
    index: MergeGraphIndex,
}

impl Harness {
    fn new(edges: Vec<Edge>) -> Result<Self> {
        init_tracing();
        let source = Arc::new(InMemoryMembership::new());
        let metrics = Arc::new(CounterMetrics::default());
        let index = MergeGraphIndex::new(
            EdgeTable::from_edges(edges)?,
            source.clone(),
            MergeGraphOptions::new()
                .primary_version(PRIMARY)
                .metrics(metrics.clone()),
        );
        Ok(Self {
            source,
            metrics,
            index,
        })
    }

    fn scans(&self) -> u64 {
        self.metrics.slow_path_scans.load(Ordering::Relaxed)
    }
}

fn endpoints(edges: &bodygraph::BodyEdges) -> Vec<(u64, u64)> {
    edges
        .rows
        .iter()
        .map(|row| (row.edge.id_a.0, row.edge.id_b.0))
        .collect()
}

fn three_rows() -> Vec<Edge> {
    vec![
        Edge::new(1, 2, 0.9),
        Edge::new(2, 3, 0.5),
        Edge::new(4, 5, 0.8),
    ]
}

#[test]
fn worked_example_slow_fast_then_drift() -> Result<()> {
    let harness = Harness::new(three_rows())?;
    let body = BodyId(7);
    harness.source.set_members(body, [1, 2, 3]);

    let first = harness.index.extract_edges(&primary().with_mutation(1), body)?;
    assert_eq!(first.path, QueryPath::Slow);
    assert_eq!(endpoints(&first), vec![(1, 2), (2, 3)]);
    assert_eq!(first.repair, RepairOutcome::Applied { cleared: 0, tagged: 2 });
    assert_eq!(
        harness.index.body_column(),
        vec![body, body, BodyId::UNASSIGNED]
    );

    let second = harness.index.extract_edges(&primary().with_mutation(1), body)?;
    assert_eq!(second.path, QueryPath::Fast);
    assert_eq!(endpoints(&second), vec![(1, 2), (2, 3)]);
    assert_eq!(harness.scans(), 1);

    harness.source.set_members(body, [1, 2, 3, 4, 5]);
    let third = harness.index.extract_edges(&primary().with_mutation(2), body)?;
    assert_eq!(third.path, QueryPath::Slow);
    assert_eq!(endpoints(&third), vec![(1, 2), (2, 3), (4, 5)]);
    assert_eq!(third.repair, RepairOutcome::Applied { cleared: 2, tagged: 3 });
    assert_eq!(harness.index.body_column(), vec![body; 3]);
    assert_eq!(harness.source.fetch_count(body), 2);
    Ok(())
}

#[test]
fn repeated_queries_scan_at_most_once() -> Result<()> {
    let harness = Harness::new(vec![
        Edge::new(10, 11, 0.1),
        Edge::new(11, 12, 0.2),
        Edge::new(12, 13, 0.3),
        Edge::new(13, 20, 0.4),
    ])?;
    let body = BodyId(100);
    harness.source.set_members(body, [10, 11, 12, 13, 14]);

    let baseline = harness.index.extract_edges(&primary(), body)?;
    for _ in 0..10 {
        let again = harness.index.extract_edges(&primary(), body)?;
        assert_eq!(again.path, QueryPath::Fast);
        assert_eq!(again.rows, baseline.rows);
        assert_eq!(again.members, baseline.members);
    }
    assert_eq!(harness.scans(), 1);
    assert_eq!(harness.source.fetch_count(body), 1);
    Ok(())
}

#[test]
fn shrinking_body_untags_lost_rows() -> Result<()> {
    let harness = Harness::new(three_rows())?;
    let body = BodyId(7);
    harness.source.set_members(body, [1, 2, 3, 4, 5]);
    harness.index.extract_edges(&primary().with_mutation(1), body)?;

    harness.source.set_members(body, [1, 2]);
    let shrunk = harness.index.extract_edges(&primary().with_mutation(2), body)?;
    assert_eq!(shrunk.path, QueryPath::Slow);
    assert_eq!(endpoints(&shrunk), vec![(1, 2)]);
    assert_eq!(
        harness.index.body_column(),
        vec![body, BodyId::UNASSIGNED, BodyId::UNASSIGNED]
    );
    Ok(())
}

#[test]
fn split_bodies_stay_disjoint() -> Result<()> {
    let harness = Harness::new(three_rows())?;
    let merged = BodyId(7);
    let split_off = BodyId(8);
    harness.source.set_members(merged, [1, 2, 3, 4, 5]);
    harness.index.extract_edges(&primary().with_mutation(1), merged)?;

    // Upstream split: 4 and 5 move to a new body.
    harness.source.set_members(merged, [1, 2, 3]);
    harness.source.set_members(split_off, [4, 5]);
    let new_body = harness.index.extract_edges(&primary().with_mutation(2), split_off)?;
    assert_eq!(endpoints(&new_body), vec![(4, 5)]);

    // Losing row 2 to the split-off body invalidates the old tags.
    let old_body = harness.index.extract_edges(&primary().with_mutation(2), merged)?;
    assert_eq!(old_body.path, QueryPath::Slow);
    assert_eq!(endpoints(&old_body), vec![(1, 2), (2, 3)]);
    let old_positions: Vec<usize> = old_body.rows.iter().map(|r| r.position).collect();
    assert!(new_body
        .rows
        .iter()
        .all(|row| !old_positions.contains(&row.position)));

    assert_eq!(
        harness.index.body_column(),
        vec![merged, merged, split_off]
    );
    Ok(())
}

#[test]
fn cross_body_edges_are_excluded() -> Result<()> {
    let harness = Harness::new(vec![
        Edge::new(1, 2, 0.9),
        Edge::new(2, 3, 0.5),
        Edge::new(3, 4, 0.7),
    ])?;
    harness.source.set_members(BodyId(1), [1, 2, 3]);
    harness.source.set_members(BodyId(2), [4]);

    let first = harness.index.extract_edges(&primary(), BodyId(1))?;
    assert_eq!(endpoints(&first), vec![(1, 2), (2, 3)]);
    let second = harness.index.extract_edges(&primary(), BodyId(2))?;
    assert!(second.rows.is_empty());
    assert_eq!(second.members.as_slice(), &[SupervoxelId(4)]);
    Ok(())
}

#[test]
fn historical_queries_never_touch_the_column() -> Result<()> {
    let harness = Harness::new(three_rows())?;
    let body = BodyId(7);
    harness.source.set_members(body, [1, 2, 3]);
    harness.source.set_members_at("99bb", body, [4, 5]);

    let before = harness.index.body_column();
    for _ in 0..3 {
        let result = harness.index.extract_edges(&historical(), body)?;
        assert_eq!(result.path, QueryPath::Slow);
        assert_eq!(result.repair, RepairOutcome::SkippedReadOnly);
        assert_eq!(endpoints(&result), vec![(4, 5)]);
    }
    assert_eq!(harness.index.body_column(), before);
    assert_eq!(harness.metrics.repairs_skipped.load(Ordering::Relaxed), 3);

    // The primary version still sees its own membership and repairs normally.
    let current = harness.index.extract_edges(&primary(), body)?;
    assert_eq!(endpoints(&current), vec![(1, 2), (2, 3)]);
    assert!(matches!(current.repair, RepairOutcome::Applied { .. }));
    Ok(())
}

#[test]
fn historical_query_after_repair_reads_stale_column_safely() -> Result<()> {
    let harness = Harness::new(three_rows())?;
    let body = BodyId(7);
    harness.source.set_members(body, [1, 2, 3]);
    harness.index.extract_edges(&primary(), body)?;

    harness.source.set_members_at("99bb", body, [1, 2]);
    let old = harness.index.extract_edges(&historical(), body)?;
    assert_eq!(old.path, QueryPath::Slow);
    assert_eq!(endpoints(&old), vec![(1, 2)]);

    let current = harness.index.extract_edges(&primary(), body)?;
    assert_eq!(current.path, QueryPath::Fast);
    assert_eq!(endpoints(&current), vec![(1, 2), (2, 3)]);
    Ok(())
}

#[test]
fn historical_members_matching_primary_tags_skip_the_scan() -> Result<()> {
    let harness = Harness::new(three_rows())?;
    let same = BodyId(7);
    let grown = BodyId(8);
    harness.source.set_members(same, [1, 2, 3]);
    harness.source.set_members(grown, [4, 5]);
    harness.index.extract_edges(&primary(), same)?;
    harness.index.extract_edges(&primary(), grown)?;
    let scans = harness.scans();

    let identical = harness.index.extract_edges(&historical(), same)?;
    assert_eq!(identical.path, QueryPath::Fast);
    assert_eq!(identical.repair, RepairOutcome::NotNeeded);
    assert_eq!(harness.scans(), scans);

    // An edgeless extra member keeps the rows but breaks the match.
    harness.source.set_members_at("99bb", grown, [4, 5, 900]);
    let before = harness.index.body_column();
    let extra = harness.index.extract_edges(&historical(), grown)?;
    assert_eq!(extra.path, QueryPath::Slow);
    assert_eq!(extra.repair, RepairOutcome::SkippedReadOnly);
    assert_eq!(endpoints(&extra), vec![(4, 5)]);
    assert_eq!(harness.scans(), scans + 1);
    assert_eq!(harness.index.body_column(), before);
    Ok(())
}

#[test]
fn unversioned_keys_serve_stale_membership_until_evicted() -> Result<()> {
    let harness = Harness::new(three_rows())?;
    let body = BodyId(7);
    harness.source.set_members(body, [1, 2, 3]);
    harness.index.extract_edges(&primary(), body)?;

    harness.source.set_members(body, [1, 2, 3, 4, 5]);
    let stale = harness.index.extract_edges(&primary(), body)?;
    assert_eq!(stale.members.len(), 3);
    assert_eq!(stale.path, QueryPath::Fast);

    assert!(harness.index.cache().invalidate(&primary().cache_key(body)));
    let fresh = harness.index.extract_edges(&primary(), body)?;
    assert_eq!(fresh.members.len(), 5);
    assert_eq!(fresh.rows.len(), 3);
    Ok(())
}

#[test]
fn missing_body_is_definitive() -> Result<()> {
    let harness = Harness::new(three_rows())?;
    let err = harness
        .index
        .extract_edges(&primary(), BodyId(404))
        .unwrap_err();
    assert!(matches!(err, MergeGraphError::MembershipNotFound { body } if body == BodyId(404)));
    assert!(!err.is_retryable());
    assert!(harness.index.cache().is_empty());
    assert_eq!(harness.index.table_stats().assigned_rows, 0);
    Ok(())
}
