use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use super::context::{versions_match, VersionContext};
use super::plan::{choose_path, QueryPath, RepairOutcome, RepairPlan};
use crate::cache::{MembershipCache, MembershipSource};
use crate::error::{MergeGraphError, Result};
use crate::metrics::{default_metrics, MergeGraphMetrics};
use crate::options::MergeGraphOptions;
use crate::primitives::concurrency::{GuardSnapshot, TableGuard};
use crate::storage::{EdgeRow, EdgeTable, TableStats};
use crate::types::{BodyId, MembershipSet};

/// Edges of one body together with the membership they were derived from.
#[derive(Clone, Debug)]
pub struct BodyEdges {
    /// Body queried.
    pub body: BodyId,
    /// Rows whose endpoints both belong to the body, ascending by position.
    pub rows: Vec<EdgeRow>,
    /// Authoritative members of the body.
    pub members: MembershipSet,
    /// Path that produced `rows`.
    pub path: QueryPath,
    /// What happened to the `body` column.
    pub repair: RepairOutcome,
}

/// Volume-wide merge graph answering per-body edge queries.
///
/// The set of edges is fixed at construction. Which of them belong to a body
/// is decided by the body's current members, fetched through a
/// [`MembershipCache`]. The table's `body` column remembers the last answer
/// per body; it is trusted only after checking it against the members, and
/// rewritten after a full scan when the query targets the primary version.
pub struct MergeGraphIndex {
    table: TableGuard<EdgeTable>,
    cache: MembershipCache,
    primary_version: Option<String>,
    metrics: Arc<dyn MergeGraphMetrics>,
}

impl MergeGraphIndex {
    /// Builds an index over `table`, resolving membership through `source`.
    ///
    /// The table retains at most `cache_capacity` retag witnesses, matching
    /// the membership cache bound.
    pub fn new(
        mut table: EdgeTable,
        source: Arc<dyn MembershipSource>,
        options: MergeGraphOptions,
    ) -> Self {
        let metrics = options.metrics.unwrap_or_else(default_metrics);
        table.set_witness_capacity(options.cache_capacity);
        let cache =
            MembershipCache::new(source, options.cache_capacity).with_metrics(metrics.clone());
        info!(
            rows = table.len(),
            primary_version = options.primary_version.as_deref(),
            cache_capacity = options.cache_capacity,
            "merge_graph.open"
        );
        Self {
            table: TableGuard::new(table),
            cache,
            primary_version: options.primary_version,
            metrics,
        }
    }

    /// Returns the edges whose endpoints both belong to `body` in `ctx`.
    ///
    /// Fails if the membership fetch fails; no result is ever produced
    /// without authoritative membership.
    pub fn extract_edges(&self, ctx: &VersionContext, body: BodyId) -> Result<BodyEdges> {
        if body.is_unassigned() {
            return Err(MergeGraphError::UnassignedBody);
        }
        let members = self.cache.get_members(&ctx.cache_key(body))?;
        let writable = self.is_authoritative(ctx);

        self.table.exclusive(|table| {
            let start = Instant::now();
            let state = table.tag_state(body);

            match choose_path(&members, &state) {
                QueryPath::Fast => {
                    self.metrics.fast_path_hit();
                    debug!(
                        body = body.0,
                        rows = state.positions.len(),
                        "merge_graph.extract.fast_path"
                    );
                    Ok(BodyEdges {
                        body,
                        rows: table.rows(&state.positions),
                        members,
                        path: QueryPath::Fast,
                        repair: RepairOutcome::NotNeeded,
                    })
                }
                QueryPath::Slow => {
                    info!(
                        body = body.0,
                        cached = state.implied.len(),
                        expected = members.len(),
                        intact = state.intact,
                        "merge_graph.extract.stale"
                    );
                    self.metrics.slow_path_scan();
                    let fresh = table.positions_within(&members);
                    let repair = if writable {
                        RepairPlan::new(body, state.positions, fresh.clone(), members.clone())
                            .commit(table)?
                    } else {
                        debug!(
                            body = body.0,
                            version = %ctx.version,
                            primary_version = self.primary_version.as_deref(),
                            "merge_graph.repair.skipped_read_only"
                        );
                        RepairOutcome::SkippedReadOnly
                    };
                    self.metrics
                        .repair(matches!(repair, RepairOutcome::Applied { .. }));
                    info!(
                        body = body.0,
                        rows = fresh.len(),
                        repaired = writable,
                        duration_ms = start.elapsed().as_secs_f64() * 1_000.0,
                        "merge_graph.extract.slow_path"
                    );
                    Ok(BodyEdges {
                        body,
                        rows: table.rows(&fresh),
                        members,
                        path: QueryPath::Slow,
                        repair,
                    })
                }
            }
        })
    }

    /// Whether queries in `ctx` may rewrite the `body` column.
    pub fn is_authoritative(&self, ctx: &VersionContext) -> bool {
        match &self.primary_version {
            None => true,
            Some(primary) => versions_match(primary, &ctx.version),
        }
    }

    /// Version allowed to rewrite the `body` column, if restricted.
    pub fn primary_version(&self) -> Option<&str> {
        self.primary_version.as_deref()
    }

    /// The membership cache backing this index.
    pub fn cache(&self) -> &MembershipCache {
        &self.cache
    }

    /// Copy of the `body` column, taken inside the exclusive region.
    pub fn body_column(&self) -> Vec<BodyId> {
        self.table.exclusive(|table| table.body_column())
    }

    /// Number of retag witnesses the table currently retains.
    pub fn witness_count(&self) -> usize {
        self.table.exclusive(|table| table.witness_count())
    }

    /// Summary counts of the edge table.
    pub fn table_stats(&self) -> TableStats {
        self.table.exclusive(|table| table.stats())
    }

    /// Activity counters of the exclusive region.
    pub fn guard_snapshot(&self) -> GuardSnapshot {
        self.table.snapshot()
    }

    /// Clears every `body` tag, forcing the next query for each body onto the slow path.
    pub fn reset_body_index(&self) {
        self.table.exclusive(|table| table.reset_body_index());
        info!("merge_graph.reset_body_index");
    }
}
