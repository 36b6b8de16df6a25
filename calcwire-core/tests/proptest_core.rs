//! Property-Based Tests for calcwire core
//!
//! Uses `proptest` to check the cache engine against a reference model, the
//! framer under arbitrary read boundaries, and the evaluator's whitelist.

use proptest::prelude::*;

use calcwire_core::cache::CacheEngine;
use calcwire_core::eval::{self, EvalError};
use calcwire_core::framer::LineFramer;

// ---------------------------------------------------------------------------
// Reference LRU model: a Vec ordered least → most recently used
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Op {
    Get(u8),
    Set(u8, u32),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..12).prop_map(Op::Get),
        (0u8..12, any::<u32>()).prop_map(|(k, v)| Op::Set(k, v)),
    ]
}

struct Model {
    capacity: usize,
    order: Vec<(u8, u32)>,
}

impl Model {
    fn get(&mut self, key: u8) -> Option<u32> {
        let idx = self.order.iter().position(|(k, _)| *k == key)?;
        let entry = self.order.remove(idx);
        self.order.push(entry);
        Some(entry.1)
    }

    fn set(&mut self, key: u8, value: u32) {
        if let Some(idx) = self.order.iter().position(|(k, _)| *k == key) {
            self.order.remove(idx);
        }
        self.order.push((key, value));
        if self.order.len() > self.capacity {
            self.order.remove(0);
        }
    }
}

proptest! {
    #[test]
    fn cache_matches_reference_model(capacity in 1usize..6, ops in prop::collection::vec(arb_op(), 0..200)) {
        let cache = CacheEngine::new(capacity);
        let mut model = Model { capacity, order: Vec::new() };

        for op in ops {
            match op {
                Op::Get(k) => {
                    prop_assert_eq!(cache.get(&k), model.get(k));
                }
                Op::Set(k, v) => {
                    cache.set(k, v);
                    model.set(k, v);
                }
            }
            prop_assert!(cache.len() <= capacity);
            prop_assert_eq!(cache.len(), model.order.len());
        }
    }
}

proptest! {
    #[test]
    fn inserting_capacity_plus_one_evicts_only_the_oldest(capacity in 1usize..32) {
        let cache = CacheEngine::new(capacity);
        for k in 0..=capacity {
            cache.set(k, k);
        }
        prop_assert_eq!(cache.stats().evictions, 1);
        prop_assert_eq!(cache.get(&0), None);
        for k in 1..=capacity {
            prop_assert_eq!(cache.get(&k), Some(k));
        }
    }
}

// ---------------------------------------------------------------------------
// Framer: frames do not depend on how the stream was chunked
// ---------------------------------------------------------------------------

fn join_lines(lines: &[String]) -> Vec<u8> {
    let mut stream = Vec::new();
    for line in lines {
        stream.extend_from_slice(line.as_bytes());
        stream.push(b'\n');
    }
    stream
}

/// Feed `stream` in chunks of the given sizes; `None` marks a rejected frame.
fn frame_in_chunks(framer: &mut LineFramer, stream: &[u8], cuts: &[usize]) -> Vec<Option<Vec<u8>>> {
    let mut frames = Vec::new();
    let mut rest = stream;
    for &cut in cuts {
        if rest.is_empty() {
            break;
        }
        let (chunk, tail) = rest.split_at(cut.min(rest.len()));
        framer.extend(chunk);
        frames.extend(framer.drain_frames().into_iter().map(Result::ok));
        rest = tail;
    }
    framer.extend(rest);
    frames.extend(framer.drain_frames().into_iter().map(Result::ok));
    frames
}

proptest! {
    #[test]
    fn framing_is_independent_of_read_boundaries(
        lines in prop::collection::vec("[a-z0-9{}\":, ]{0,20}", 0..10),
        cuts in prop::collection::vec(1usize..8, 0..40),
    ) {
        let mut framer = LineFramer::new();
        let frames = frame_in_chunks(&mut framer, &join_lines(&lines), &cuts);

        let expected: Vec<Option<Vec<u8>>> = lines.iter().map(|l| Some(l.as_bytes().to_vec())).collect();
        prop_assert_eq!(frames, expected);
        prop_assert_eq!(framer.finish(), 0);
    }

    #[test]
    fn oversized_frames_are_rejected_one_for_one(
        lines in prop::collection::vec("[a-z]{0,20}", 0..10),
        cuts in prop::collection::vec(1usize..8, 0..40),
    ) {
        const LIMIT: usize = 8;
        let mut framer = LineFramer::with_max_frame_len(LIMIT);
        let frames = frame_in_chunks(&mut framer, &join_lines(&lines), &cuts);

        let expected: Vec<Option<Vec<u8>>> = lines
            .iter()
            .map(|l| (l.len() <= LIMIT).then(|| l.as_bytes().to_vec()))
            .collect();
        prop_assert_eq!(frames, expected);
        prop_assert_eq!(framer.finish(), 0);
    }
}

// ---------------------------------------------------------------------------
// Evaluator whitelist
// ---------------------------------------------------------------------------

const ALLOWED: [&str; 11] = ["pi", "e", "sin", "cos", "tan", "sqrt", "log", "exp", "max", "min", "abs"];

proptest! {
    #[test]
    fn unknown_identifiers_are_illegal(name in "[a-z_][a-z0-9_]{0,10}") {
        prop_assume!(!ALLOWED.contains(&name.as_str()));
        let as_name = eval::evaluate(&format!("1 + {name}"));
        prop_assert!(matches!(as_name, Err(EvalError::Illegal(_))), "{name}: {as_name:?}");
        let as_call = eval::evaluate(&format!("{name}(1)"));
        prop_assert_eq!(as_call, Err(EvalError::Illegal("illegal function call".into())));
    }
}

proptest! {
    #[test]
    fn arithmetic_results_are_finite_or_errors(a in -1e6..1e6f64, b in -1e6..1e6f64, op in 0usize..7) {
        let sym = ["+", "-", "*", "/", "//", "%", "**"][op];
        match eval::evaluate(&format!("({a}) {sym} ({b})")) {
            Ok(v) => {
                prop_assert!(v.is_finite());
            }
            Err(e) => {
                prop_assert!(matches!(
                    e,
                    EvalError::DivisionByZero | EvalError::Domain(_) | EvalError::Overflow
                ));
            }
        }
    }
}
