//! Packrat memoization and left-recursion seed growing
//!
//! [`rule`] wraps a parser with memoization keyed by `(rule, scanner,
//! position)` and with support for direct left recursion: a rule whose own
//! body re-enters it at the same position terminates with the greedy,
//! left-associative result conventional for left-recursive grammars.
//!
//! The algorithm is the seed-growing scheme of Warth, Douglass and
//! Millstein. A `(rule, position)` pair moves through four states:
//! unvisited, in-progress (a frame with a failing seed on the invocation
//! stack), growing (a head is active at the position and the seed is being
//! iteratively extended), and memoized. Re-entry is detected when the memo
//! lookup finds the in-progress frame instead of a finished answer; the
//! re-entrant call receives the provisional failure seed, so the recursive
//! alternative fails there and the grammar falls through to its
//! non-recursive alternative. That first success becomes the seed, and the
//! grow loop re-evaluates the body - with the memo now exposing the seed to
//! self-calls - as long as each pass consumes strictly more input.
//!
//! Only cycles that re-enter the same rule directly are supported. A cycle
//! that passes through another wrapped rule (indirect or mutual left
//! recursion) is detected at head setup and fails loudly instead of
//! guessing a parse.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use crate::peg::parser::Parser;
use crate::peg::result::ParseResult;
use crate::peg::scanner::Scanner;
use crate::peg::session::{Cached, Frame, Head, MemoEntry, MemoKey, RuleId, Session};

const UNSUPPORTED: &str = "unsupported recursive pattern (indirect left recursion)";

/// Wrap a parser as a memoized grammar rule. The rule gets a fresh id, so
/// two separately built but textually identical rules keep independent memo
/// entries. The value type must be `Clone + 'static` to live in the memo
/// table.
pub fn rule<T: Clone + 'static>(body: Parser<T>) -> Parser<T> {
    let id = RuleId::next();
    Parser::new(move |scanner, session| apply(id, &body, scanner, session))
}

fn apply<T: Clone + 'static>(
    id: RuleId,
    body: &Parser<T>,
    scanner: &mut Scanner,
    session: &mut Session,
) -> ParseResult<T> {
    let at = scanner.offset();
    let key = MemoKey {
        rule: id,
        scanner: scanner.id(),
        at,
    };

    match recall(id, body, scanner, session, key) {
        Some(MemoEntry::Done(cached)) => replay(&cached, scanner, at),
        Some(MemoEntry::Lr(frame)) => {
            // Re-entrant call: same rule, same position. Activate the head
            // and answer with the provisional seed.
            setup_recursion(session, &frame);
            let seed = frame.borrow().seed.clone();
            replay(&seed, scanner, at)
        }
        None => {
            let frame = Rc::new(RefCell::new(Frame {
                rule: id,
                seed: Cached::Miss {
                    offset: at,
                    reason: "left-recursive seed".to_string(),
                },
                head: None,
            }));
            session.stack.push(Rc::clone(&frame));
            session.memo.insert(key, MemoEntry::Lr(Rc::clone(&frame)));
            let result = body.run(scanner, session);
            session.stack.pop();

            let head = frame.borrow().head.clone();
            match head {
                None => {
                    // No recursion was detected: plain packrat behavior.
                    let cached = to_cached(&result);
                    session.memo.insert(key, MemoEntry::Done(cached));
                    result
                }
                Some(head) => {
                    frame.borrow_mut().seed = to_cached(&result);
                    lr_answer(id, body, scanner, session, key, &frame, &head, at)
                }
            }
        }
    }
}

/// Memo lookup with the growth-pass refinements: while a head is active at
/// the position, a rule outside the cycle follows the plain memo path, and
/// an involved rule is forced to recompute the first time it is consulted
/// within a pass instead of reusing a stale earlier answer.
fn recall<T: Clone + 'static>(
    id: RuleId,
    body: &Parser<T>,
    scanner: &mut Scanner,
    session: &mut Session,
    key: MemoKey,
) -> Option<MemoEntry> {
    let head = session.heads.get(&(key.scanner, key.at)).cloned();
    let memoized = session.memo.get(&key).cloned();
    let Some(head) = head else { return memoized };

    {
        let head = head.borrow();
        if head.rule != id && !head.involved.contains(&id) {
            return memoized;
        }
    }
    if head.borrow_mut().eval.remove(&id) {
        let result = body.run(scanner, session);
        let cached = to_cached(&result);
        session.memo.insert(key, MemoEntry::Done(cached.clone()));
        return Some(MemoEntry::Done(cached));
    }
    memoized
}

/// Activate (or reuse) the head on the in-progress frame and record every
/// frame between the top of the invocation stack and that frame in the
/// head's involved set.
fn setup_recursion(session: &mut Session, target: &Rc<RefCell<Frame>>) {
    let head = {
        let mut target = target.borrow_mut();
        match &target.head {
            Some(head) => Rc::clone(head),
            None => {
                let head = Rc::new(RefCell::new(Head {
                    rule: target.rule,
                    involved: HashSet::new(),
                    eval: HashSet::new(),
                }));
                target.head = Some(Rc::clone(&head));
                head
            }
        }
    };
    for frame in session.stack.iter().rev() {
        let already_linked = frame
            .borrow()
            .head
            .as_ref()
            .is_some_and(|h| Rc::ptr_eq(h, &head));
        if already_linked {
            break;
        }
        let rule = {
            let mut frame = frame.borrow_mut();
            frame.head = Some(Rc::clone(&head));
            frame.rule
        };
        head.borrow_mut().involved.insert(rule);
    }
}

/// Decide what a completed invocation with an attached head produces:
/// reject unsupported cycles loudly, finalize a failing seed, or enter the
/// grow loop.
#[allow(clippy::too_many_arguments)]
fn lr_answer<T: Clone + 'static>(
    id: RuleId,
    body: &Parser<T>,
    scanner: &mut Scanner,
    session: &mut Session,
    key: MemoKey,
    frame: &Rc<RefCell<Frame>>,
    head: &Rc<RefCell<Head>>,
    at: usize,
) -> ParseResult<T> {
    if !head.borrow().involved.is_empty() {
        // The cycle runs through other wrapped rules: indirect or mutual
        // left recursion, which this engine does not support. Fail loudly
        // rather than guess a parse.
        let cached = Cached::Miss {
            offset: at,
            reason: UNSUPPORTED.to_string(),
        };
        session.memo.insert(key, MemoEntry::Done(cached.clone()));
        return replay(&cached, scanner, at);
    }

    // With an empty involved set the head can only belong to this rule.
    let seed = frame.borrow().seed.clone();
    session.memo.insert(key, MemoEntry::Done(seed.clone()));
    if matches!(seed, Cached::Miss { .. }) {
        return replay(&seed, scanner, at);
    }
    grow(id, body, scanner, session, key, head, at)
}

/// The grow loop: re-evaluate the body from the position with the memo
/// exposing the current seed to self-calls; keep the new result while each
/// pass consumes strictly more input than the seed.
fn grow<T: Clone + 'static>(
    _id: RuleId,
    body: &Parser<T>,
    scanner: &mut Scanner,
    session: &mut Session,
    key: MemoKey,
    head: &Rc<RefCell<Head>>,
    at: usize,
) -> ParseResult<T> {
    session.heads.insert((key.scanner, at), Rc::clone(head));
    loop {
        scanner.jump_to(at);
        {
            let mut head = head.borrow_mut();
            head.eval = head.involved.clone();
        }
        let best_end = match session.memo.get(&key) {
            Some(MemoEntry::Done(cached)) => cached.replay_target(at),
            _ => at,
        };
        let result = body.run(scanner, session);
        match &result {
            ParseResult::Success { offset, length, .. } if offset + length > best_end => {
                session.memo.insert(key, MemoEntry::Done(to_cached(&result)));
            }
            _ => break,
        }
    }
    session.heads.remove(&(key.scanner, at));

    let finalized = match session.memo.get(&key) {
        Some(MemoEntry::Done(cached)) => cached.clone(),
        _ => panic!("packrat fault: growth finished without a memoized answer"),
    };
    replay(&finalized, scanner, at)
}

fn to_cached<T: Clone + 'static>(result: &ParseResult<T>) -> Cached {
    match result {
        ParseResult::Success {
            offset,
            length,
            value,
        } => Cached::Hit {
            offset: *offset,
            length: *length,
            value: Rc::new(value.clone()),
        },
        ParseResult::Failure { offset, reason } => Cached::Miss {
            offset: *offset,
            reason: reason.clone(),
        },
    }
}

/// Rebuild a typed result from the memo table and reposition the cursor:
/// to the end of the match on a hit, back to the entry offset on a miss.
fn replay<T: Clone + 'static>(cached: &Cached, scanner: &mut Scanner, entry: usize) -> ParseResult<T> {
    scanner.jump_to(cached.replay_target(entry));
    match cached {
        Cached::Hit {
            offset,
            length,
            value,
        } => {
            let value = value
                .downcast_ref::<T>()
                .unwrap_or_else(|| {
                    panic!("packrat fault: memoized value type differs from the rule's value type")
                })
                .clone();
            ParseResult::success(*offset, *length, value)
        }
        Cached::Miss { offset, reason } => ParseResult::failure(*offset, reason.clone()),
    }
}
