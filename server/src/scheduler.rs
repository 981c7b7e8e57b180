//! Master-side bookkeeping: the unassigned queue, one record per connected
//! worker, and the finished set.
//!
//! Every column lives in exactly one of those three places. The scheduler is
//! owned by the coordination task and is never shared, so nothing here locks.

use std::{
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    fmt,
};

use farm_shared::models::column::{ColumnIndex, RenderedColumn};
use thiserror::Error;
use uuid::Uuid;

/// Opaque identity of one worker connection, minted when it is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The first group is plenty to tell sessions apart in logs.
        let full = self.0.simple().to_string();
        f.write_str(&full[..8])
    }
}

/// A broken bookkeeping invariant. These end the job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountingViolation {
    #[error("no session {0}")]
    UnknownSession(SessionId),

    #[error("session {0} opened twice")]
    DuplicateSession(SessionId),

    #[error("column {0} reported finished twice")]
    DuplicateFinish(ColumnIndex),

    #[error("session {session} returned column {column} it was never assigned")]
    UnassignedReturn {
        session: SessionId,
        column: ColumnIndex,
    },

    #[error("session {session} finished without returning columns {columns:?}")]
    MissingReturn {
        session: SessionId,
        columns: Vec<ColumnIndex>,
    },

    #[error("session {session} relinquished {requested} columns but holds {assigned}")]
    RelinquishUnderflow {
        session: SessionId,
        requested: u32,
        assigned: usize,
    },

    #[error("work partition broken: {0}")]
    PartitionBroken(String),
}

/// A worker breaking the protocol. Only that worker's connection pays for it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionFault {
    #[error("asked for more work after being told to finish")]
    WantMoreWhileFinishing,

    #[error("column {column} has {actual} pixels, expected {expected}")]
    WrongHeight {
        column: ColumnIndex,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Fault(#[from] SessionFault),

    #[error(transparent)]
    Violation(#[from] AccountingViolation),
}

/// The reply to a work request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Column(ColumnIndex),
    Finish,
}

#[derive(Debug, Default)]
struct WorkerSession {
    /// Handed out, not yet returned, in grant order.
    assigned: VecDeque<ColumnIndex>,
    finishing: bool,
}

/// Read-only view of one session, for logging and rebalancing decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionView {
    pub id: SessionId,
    pub assigned: usize,
    pub finishing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub width: u32,
    pub unassigned: usize,
    pub in_flight: usize,
    pub finished: usize,
    pub workers: usize,
}

impl Progress {
    pub fn is_complete(&self) -> bool {
        self.finished == self.width as usize
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} columns finished, {} in flight, {} queued, {} workers",
            self.finished, self.width, self.in_flight, self.unassigned, self.workers
        )
    }
}

pub struct Scheduler {
    width: u32,
    height: u32,
    unassigned: VecDeque<ColumnIndex>,
    sessions: HashMap<SessionId, WorkerSession>,
    finished: BTreeMap<ColumnIndex, RenderedColumn>,
}

impl Scheduler {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            unassigned: (0..width).collect(),
            sessions: HashMap::new(),
            finished: BTreeMap::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn has_session(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn session(&self, id: SessionId) -> Option<SessionView> {
        self.sessions.get(&id).map(|session| SessionView {
            id,
            assigned: session.assigned.len(),
            finishing: session.finishing,
        })
    }

    pub fn is_complete(&self) -> bool {
        self.finished.len() == self.width as usize
    }

    pub fn progress(&self) -> Progress {
        Progress {
            width: self.width,
            unassigned: self.unassigned.len(),
            in_flight: self.sessions.values().map(|s| s.assigned.len()).sum(),
            finished: self.finished.len(),
            workers: self.sessions.len(),
        }
    }

    pub fn open_session(&mut self, id: SessionId) -> Result<(), AccountingViolation> {
        if self.sessions.contains_key(&id) {
            return Err(AccountingViolation::DuplicateSession(id));
        }
        self.sessions.insert(id, WorkerSession::default());
        Ok(())
    }

    /// Grants the front of the queue, or tells the worker to finish when the
    /// queue is empty.
    pub fn want_more(&mut self, id: SessionId) -> Result<Grant, SchedulerError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(AccountingViolation::UnknownSession(id))?;
        if session.finishing {
            return Err(SessionFault::WantMoreWhileFinishing.into());
        }

        match self.unassigned.pop_front() {
            Some(column) => {
                session.assigned.push_back(column);
                Ok(Grant::Column(column))
            }
            None => {
                session.finishing = true;
                Ok(Grant::Finish)
            }
        }
    }

    /// Moves the last `count` columns assigned to `id` to the back of the
    /// queue and returns them.
    pub fn relinquish(
        &mut self,
        id: SessionId,
        count: u32,
    ) -> Result<Vec<ColumnIndex>, AccountingViolation> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(AccountingViolation::UnknownSession(id))?;
        let assigned = session.assigned.len();
        if count as usize > assigned {
            return Err(AccountingViolation::RelinquishUnderflow {
                session: id,
                requested: count,
                assigned,
            });
        }

        let returned: Vec<ColumnIndex> =
            session.assigned.split_off(assigned - count as usize).into();
        self.unassigned.extend(returned.iter().copied());
        Ok(returned)
    }

    /// Incorporates a cleanly closed session's results and forgets the
    /// session. The results must be exactly the session's assignment.
    pub fn complete(
        &mut self,
        id: SessionId,
        columns: Vec<RenderedColumn>,
    ) -> Result<(), SchedulerError> {
        let session = self
            .sessions
            .get(&id)
            .ok_or(AccountingViolation::UnknownSession(id))?;

        let expected = self.height as usize;
        if let Some(bad) = columns.iter().find(|c| c.height() != expected) {
            return Err(SessionFault::WrongHeight {
                column: bad.column,
                expected,
                actual: bad.height(),
            }
            .into());
        }

        let mut outstanding: HashSet<ColumnIndex> = session.assigned.iter().copied().collect();
        for rendered in &columns {
            if self.finished.contains_key(&rendered.column) {
                return Err(AccountingViolation::DuplicateFinish(rendered.column).into());
            }
            if !outstanding.remove(&rendered.column) {
                let violation = if session.assigned.contains(&rendered.column) {
                    AccountingViolation::DuplicateFinish(rendered.column)
                } else {
                    AccountingViolation::UnassignedReturn {
                        session: id,
                        column: rendered.column,
                    }
                };
                return Err(violation.into());
            }
        }
        if !outstanding.is_empty() {
            let mut columns: Vec<ColumnIndex> = outstanding.into_iter().collect();
            columns.sort_unstable();
            return Err(AccountingViolation::MissingReturn { session: id, columns }.into());
        }

        self.sessions.remove(&id);
        self.finished
            .extend(columns.into_iter().map(|rendered| (rendered.column, rendered)));
        Ok(())
    }

    /// Forgets a failed session, putting everything it held back on the
    /// queue. Returns the requeued columns; `None` if the session is unknown.
    pub fn fail(&mut self, id: SessionId) -> Option<Vec<ColumnIndex>> {
        let session = self.sessions.remove(&id)?;
        let requeued: Vec<ColumnIndex> = session.assigned.into();
        self.unassigned.extend(requeued.iter().copied());
        Some(requeued)
    }

    /// Verifies that every column is in exactly one place.
    pub fn check_partition(&self) -> Result<(), AccountingViolation> {
        let mut seen = vec![0u8; self.width as usize];
        let held = self.sessions.values().flat_map(|s| s.assigned.iter());
        for &column in self.unassigned.iter().chain(held).chain(self.finished.keys()) {
            let slot = seen.get_mut(column as usize).ok_or_else(|| {
                AccountingViolation::PartitionBroken(format!("column {column} is out of range"))
            })?;
            *slot += 1;
            if *slot > 1 {
                return Err(AccountingViolation::PartitionBroken(format!(
                    "column {column} is in two places"
                )));
            }
        }
        match seen.iter().position(|count| *count == 0) {
            Some(column) => Err(AccountingViolation::PartitionBroken(format!(
                "column {column} is nowhere"
            ))),
            None => Ok(()),
        }
    }

    /// The finished columns in column order.
    pub fn into_finished(self) -> Vec<RenderedColumn> {
        self.finished.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use farm_shared::models::pixel::Pixel;
    use proptest::prelude::*;

    use super::*;

    const HEIGHT: u32 = 3;

    fn rendered(column: ColumnIndex) -> RenderedColumn {
        RenderedColumn::new(column, vec![Pixel::new(column as u8, 0, 0); HEIGHT as usize])
    }

    fn grant(scheduler: &mut Scheduler, id: SessionId) -> Grant {
        scheduler.want_more(id).unwrap()
    }

    #[test]
    fn queue_starts_in_column_order() {
        let mut scheduler = Scheduler::new(4, HEIGHT);
        let id = SessionId::new();
        scheduler.open_session(id).unwrap();
        let grants: Vec<Grant> = (0..5).map(|_| grant(&mut scheduler, id)).collect();
        assert_eq!(
            grants,
            vec![
                Grant::Column(0),
                Grant::Column(1),
                Grant::Column(2),
                Grant::Column(3),
                Grant::Finish
            ]
        );
        assert_eq!(scheduler.session(id).unwrap().assigned, 4);
        assert!(scheduler.session(id).unwrap().finishing);
    }

    #[test]
    fn single_worker_completes_in_width_grants() {
        let mut scheduler = Scheduler::new(4, HEIGHT);
        let id = SessionId::new();
        scheduler.open_session(id).unwrap();
        let mut granted = Vec::new();
        while let Grant::Column(column) = grant(&mut scheduler, id) {
            granted.push(column);
        }
        assert_eq!(granted.len(), 4);

        scheduler
            .complete(id, granted.iter().rev().map(|c| rendered(*c)).collect())
            .unwrap();
        assert!(scheduler.is_complete());
        assert!(!scheduler.has_session(id));
        let columns: Vec<ColumnIndex> =
            scheduler.into_finished().iter().map(|c| c.column).collect();
        assert_eq!(columns, vec![0, 1, 2, 3]);
    }

    #[test]
    fn failure_requeues_only_the_failed_session() {
        let mut scheduler = Scheduler::new(4, HEIGHT);
        let (a, b) = (SessionId::new(), SessionId::new());
        scheduler.open_session(a).unwrap();
        scheduler.open_session(b).unwrap();
        assert_eq!(grant(&mut scheduler, a), Grant::Column(0));
        assert_eq!(grant(&mut scheduler, b), Grant::Column(1));
        assert_eq!(grant(&mut scheduler, a), Grant::Column(2));

        assert_eq!(scheduler.fail(a), Some(vec![0, 2]));
        assert_eq!(scheduler.session(b).unwrap().assigned, 1);
        assert_eq!(grant(&mut scheduler, b), Grant::Column(3));
        assert_eq!(grant(&mut scheduler, b), Grant::Column(0));
        assert_eq!(grant(&mut scheduler, b), Grant::Column(2));
        scheduler.check_partition().unwrap();
    }

    #[test]
    fn failing_an_unknown_session_is_a_no_op() {
        let mut scheduler = Scheduler::new(2, HEIGHT);
        assert_eq!(scheduler.fail(SessionId::new()), None);
        scheduler.check_partition().unwrap();
    }

    #[test]
    fn relinquish_takes_from_the_tail() {
        let mut scheduler = Scheduler::new(5, HEIGHT);
        let id = SessionId::new();
        scheduler.open_session(id).unwrap();
        for _ in 0..3 {
            grant(&mut scheduler, id);
        }
        assert_eq!(scheduler.relinquish(id, 2).unwrap(), vec![1, 2]);
        assert_eq!(scheduler.progress().unassigned, 4);
        assert_eq!(grant(&mut scheduler, id), Grant::Column(3));
        scheduler.check_partition().unwrap();
    }

    #[test]
    fn relinquishing_more_than_held_is_a_violation() {
        let mut scheduler = Scheduler::new(3, HEIGHT);
        let id = SessionId::new();
        scheduler.open_session(id).unwrap();
        grant(&mut scheduler, id);
        assert_eq!(
            scheduler.relinquish(id, 2),
            Err(AccountingViolation::RelinquishUnderflow {
                session: id,
                requested: 2,
                assigned: 1
            })
        );
    }

    #[test]
    fn want_more_after_finish_is_a_fault() {
        let mut scheduler = Scheduler::new(0, HEIGHT);
        let id = SessionId::new();
        scheduler.open_session(id).unwrap();
        assert_eq!(grant(&mut scheduler, id), Grant::Finish);
        assert_eq!(
            scheduler.want_more(id),
            Err(SchedulerError::Fault(SessionFault::WantMoreWhileFinishing))
        );
    }

    #[test]
    fn results_must_match_the_assignment() {
        let mut scheduler = Scheduler::new(4, HEIGHT);
        let id = SessionId::new();
        scheduler.open_session(id).unwrap();
        grant(&mut scheduler, id);
        grant(&mut scheduler, id);

        assert_eq!(
            scheduler.complete(id, vec![rendered(0)]),
            Err(SchedulerError::Violation(AccountingViolation::MissingReturn {
                session: id,
                columns: vec![1]
            }))
        );
        assert_eq!(
            scheduler.complete(id, vec![rendered(0), rendered(3)]),
            Err(SchedulerError::Violation(AccountingViolation::UnassignedReturn {
                session: id,
                column: 3
            }))
        );
        assert_eq!(
            scheduler.complete(id, vec![rendered(1), rendered(1)]),
            Err(SchedulerError::Violation(AccountingViolation::DuplicateFinish(1)))
        );
        // Rejected results leave the session untouched.
        scheduler.check_partition().unwrap();
        assert_eq!(scheduler.session(id).unwrap().assigned, 2);
    }

    #[test]
    fn finished_columns_cannot_be_finished_again() {
        let mut scheduler = Scheduler::new(2, HEIGHT);
        let (a, b) = (SessionId::new(), SessionId::new());
        scheduler.open_session(a).unwrap();
        scheduler.open_session(b).unwrap();
        grant(&mut scheduler, a);
        scheduler.complete(a, vec![rendered(0)]).unwrap();
        assert_eq!(
            scheduler.complete(b, vec![rendered(0)]),
            Err(SchedulerError::Violation(AccountingViolation::DuplicateFinish(0)))
        );
    }

    #[test]
    fn short_columns_are_a_fault() {
        let mut scheduler = Scheduler::new(1, HEIGHT);
        let id = SessionId::new();
        scheduler.open_session(id).unwrap();
        grant(&mut scheduler, id);
        let short = RenderedColumn::new(0, vec![Pixel::default()]);
        assert_eq!(
            scheduler.complete(id, vec![short]),
            Err(SchedulerError::Fault(SessionFault::WrongHeight {
                column: 0,
                expected: 3,
                actual: 1
            }))
        );
    }

    #[test]
    fn sessions_cannot_be_opened_twice() {
        let mut scheduler = Scheduler::new(1, HEIGHT);
        let id = SessionId::new();
        scheduler.open_session(id).unwrap();
        assert_eq!(
            scheduler.open_session(id),
            Err(AccountingViolation::DuplicateSession(id))
        );
    }

    #[derive(Debug, Clone)]
    enum Op {
        Open,
        WantMore(usize),
        Relinquish(usize, u32),
        Complete(usize),
        Fail(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            1 => Just(Op::Open),
            6 => any::<usize>().prop_map(Op::WantMore),
            2 => (any::<usize>(), any::<u32>()).prop_map(|(s, n)| Op::Relinquish(s, n)),
            2 => any::<usize>().prop_map(Op::Complete),
            1 => any::<usize>().prop_map(Op::Fail),
        ]
    }

    proptest! {
        #[test]
        fn partition_holds_under_any_well_behaved_schedule(
            width in 0u32..24,
            ops in proptest::collection::vec(op(), 1..200),
        ) {
            let mut scheduler = Scheduler::new(width, HEIGHT);
            // Mirror of what each live worker holds, in grant order.
            let mut live: Vec<(SessionId, Vec<ColumnIndex>, bool)> = Vec::new();
            let mut finished: HashSet<ColumnIndex> = HashSet::new();

            for op in ops {
                match op {
                    Op::Open => {
                        let id = SessionId::new();
                        scheduler.open_session(id).unwrap();
                        live.push((id, Vec::new(), false));
                    }
                    Op::WantMore(pick) if !live.is_empty() => {
                        let i = pick % live.len();
                        if live[i].2 {
                            continue;
                        }
                        match scheduler.want_more(live[i].0).unwrap() {
                            Grant::Column(column) => {
                                prop_assert!(!finished.contains(&column));
                                prop_assert!(live
                                    .iter()
                                    .all(|(_, held, _)| !held.contains(&column)));
                                live[i].1.push(column);
                            }
                            Grant::Finish => {
                                prop_assert_eq!(scheduler.progress().unassigned, 0);
                                live[i].2 = true;
                            }
                        }
                    }
                    Op::Relinquish(pick, n) if !live.is_empty() => {
                        let i = pick % live.len();
                        let count = n % (live[i].1.len() as u32 + 1);
                        let returned = scheduler.relinquish(live[i].0, count).unwrap();
                        let held = &mut live[i].1;
                        let tail = held.split_off(held.len() - count as usize);
                        prop_assert_eq!(returned, tail);
                    }
                    Op::Complete(pick) if !live.is_empty() => {
                        let (id, held, _) = live.swap_remove(pick % live.len());
                        scheduler
                            .complete(id, held.iter().map(|c| rendered(*c)).collect())
                            .unwrap();
                        finished.extend(held);
                    }
                    Op::Fail(pick) if !live.is_empty() => {
                        let (id, held, _) = live.swap_remove(pick % live.len());
                        prop_assert_eq!(scheduler.fail(id), Some(held));
                    }
                    _ => {}
                }
                prop_assert!(scheduler.check_partition().is_ok());
                let progress = scheduler.progress();
                prop_assert_eq!(
                    progress.unassigned + progress.in_flight + progress.finished,
                    width as usize
                );
            }
        }
    }
}
