use crate::error::Result;
use crate::storage::{EdgeTable, TagState};
use crate::types::{BodyId, MembershipSet};

/// Which path produced an extraction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum QueryPath {
    /// Rows tagged in the `body` column were confirmed against the member set.
    Fast,
    /// The whole table was scanned against the member set.
    Slow,
}

/// What happened to the `body` column after an extraction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RepairOutcome {
    /// The fast path was valid; nothing to rewrite.
    NotNeeded,
    /// The column was rewritten for the queried body.
    Applied {
        /// Rows whose stale tag was cleared.
        cleared: usize,
        /// Rows tagged with the body.
        tagged: usize,
    },
    /// The query ran against a non-primary version, so the column was left alone.
    SkippedReadOnly,
}

/// Decides whether the tagged rows can stand in for a full scan.
///
/// The endpoints implied by the tagged rows must equal `members` exactly; a
/// subset or superset is stale. A body whose rows were last retagged against
/// exactly `members` also qualifies, which covers members without internal
/// edges. Neither counts once another body's write took some of the rows.
pub fn choose_path(members: &MembershipSet, state: &TagState) -> QueryPath {
    if !state.intact {
        return QueryPath::Slow;
    }
    if members.same_members(&state.implied) || state.verified.as_ref() == Some(members) {
        QueryPath::Fast
    } else {
        QueryPath::Slow
    }
}

/// Rewrite of the `body` column computed by a slow-path extraction.
#[derive(Clone, Debug)]
pub struct RepairPlan {
    body: BodyId,
    stale: Vec<usize>,
    fresh: Vec<usize>,
    members: MembershipSet,
}

impl RepairPlan {
    /// Plans moving `body` off the `stale` rows and onto the `fresh` rows.
    pub fn new(body: BodyId, stale: Vec<usize>, fresh: Vec<usize>, members: MembershipSet) -> Self {
        Self {
            body,
            stale,
            fresh,
            members,
        }
    }

    #[cfg(test)]
    fn stale(&self) -> &[usize] {
        &self.stale
    }

    #[cfg(test)]
    fn fresh(&self) -> &[usize] {
        &self.fresh
    }

    /// Applies the plan. Either every row changes or none does.
    pub(crate) fn commit(self, table: &mut EdgeTable) -> Result<RepairOutcome> {
        let cleared = self.stale.len();
        let tagged = self.fresh.len();
        table.retag(self.body, &self.stale, &self.fresh, self.members)?;
        Ok(RepairOutcome::Applied { cleared, tagged })
    }
}
