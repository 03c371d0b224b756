//! Per-parse session state for the packrat engine
//!
//! A [`Session`] is created once per top-level parse and threaded alongside
//! the scanner into every combinator call. It owns everything the packrat
//! engine mutates: the memo table, the active growth heads, and the stack of
//! in-progress wrapped-rule invocations. Parser values themselves carry no
//! cross-session mutable state.
//!
//! Memo entries are keyed by `(rule, scanner, position)`. The scanner
//! identity partitions the table so results from a derived sub-scanner (used
//! by lookbehind assertions) never leak into the parent scanner's cache.

use std::any::Any;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::peg::scanner::ScannerId;

/// Opaque handle identifying one packrat-wrapped rule, assigned when the
/// rule is constructed. Two separately built but textually identical rules
/// get distinct ids and therefore independent memo entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleId(u64);

impl RuleId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        RuleId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct MemoKey {
    pub rule: RuleId,
    pub scanner: ScannerId,
    pub at: usize,
}

/// Finished parse outcome in type-erased form. Wrapped rules require
/// `T: Clone + 'static` so the value can live in the table as `Rc<dyn Any>`
/// and be handed back on every later visit.
#[derive(Clone)]
pub(crate) enum Cached {
    Hit {
        offset: usize,
        length: usize,
        value: Rc<dyn Any>,
    },
    Miss {
        offset: usize,
        reason: String,
    },
}

impl Cached {
    /// End position the scanner should sit at after replaying this answer
    /// from `entry`.
    pub fn replay_target(&self, entry: usize) -> usize {
        match self {
            Cached::Hit { offset, length, .. } => offset + length,
            Cached::Miss { .. } => entry,
        }
    }
}

/// In-progress invocation of a wrapped rule at one position: the current
/// best ("seed") answer and, once recursion has been detected, the shared
/// growth head.
pub(crate) struct Frame {
    pub rule: RuleId,
    pub seed: Cached,
    pub head: Option<Rc<RefCell<Head>>>,
}

/// Per-position record of an active left-recursion cycle: which rule is the
/// cycle's entry point, which rule ids may legally re-enter during a growth
/// pass, and which of those have not yet been forced to recompute in the
/// current pass.
pub(crate) struct Head {
    pub rule: RuleId,
    pub involved: HashSet<RuleId>,
    pub eval: HashSet<RuleId>,
}

#[derive(Clone)]
pub(crate) enum MemoEntry {
    /// Finished result, replayed on every future visit.
    Done(Cached),
    /// Transient marker: the rule is currently being evaluated at this
    /// position. Finding it on lookup is how re-entrant (left-recursive)
    /// calls are detected.
    Lr(Rc<RefCell<Frame>>),
}

/// Mutable state for one parse: memo table, growth heads, invocation stack.
#[derive(Default)]
pub struct Session {
    pub(crate) memo: HashMap<MemoKey, MemoEntry>,
    pub(crate) heads: HashMap<(ScannerId, usize), Rc<RefCell<Head>>>,
    pub(crate) stack: Vec<Rc<RefCell<Frame>>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of memoized entries. Test and diagnostics helper.
    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("memo_entries", &self.memo.len())
            .field("active_heads", &self.heads.len())
            .field("stack_depth", &self.stack.len())
            .finish()
    }
}
