//! Dispatch tree synthesis.
//!
//! The target has no indexed jump, so table lookups (jump destinations,
//! contract entry points, code sizes) are emitted as balanced comparison
//! trees. A tree's code expects the lookup key on top of the stack and
//! replaces it with exactly one value: the matched target, or
//! [`Value::none()`] when the key is absent.

use crate::avm::code::CodeBuilder;
use crate::avm::isa::Opcode;
use crate::avm::value::Value;
use crate::translate::errors::TranslateError;
use alloy_primitives::U256;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchEntry {
    pub key: U256,
    pub target: Value,
}

impl DispatchEntry {
    pub fn new(key: impl Into<U256>, target: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            target: target.into(),
        }
    }
}

/// Comparison tree over entries sorted by key.
///
/// Slices of up to two entries become leaves compared by equality only.
/// Larger slices split at the middle entry, whose key is excluded from both
/// subtrees and matched when the key is neither less nor greater than it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchTree {
    Empty,
    One(DispatchEntry),
    Two(DispatchEntry, DispatchEntry),
    Node {
        pivot: DispatchEntry,
        left: Box<DispatchTree>,
        right: Box<DispatchTree>,
    },
}

impl DispatchTree {
    /// Sorts `entries` by key and builds the tree. Keys must be distinct.
    pub fn from_entries(mut entries: Vec<DispatchEntry>) -> Result<Self, TranslateError> {
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        if let Some(pair) = entries.windows(2).find(|pair| pair[0].key == pair[1].key) {
            return Err(TranslateError::DuplicateDispatchKey { key: pair[0].key });
        }
        Ok(Self::build(&entries))
    }

    /// Builds the tree over `entries`, which must already be sorted by key
    /// with no duplicates.
    pub fn build(entries: &[DispatchEntry]) -> Self {
        match entries {
            [] => DispatchTree::Empty,
            [only] => DispatchTree::One(only.clone()),
            [first, second] => DispatchTree::Two(first.clone(), second.clone()),
            _ => {
                let mid = entries.len() / 2;
                DispatchTree::Node {
                    pivot: entries[mid].clone(),
                    left: Box::new(Self::build(&entries[..mid])),
                    right: Box::new(Self::build(&entries[mid + 1..])),
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            DispatchTree::Empty => 0,
            DispatchTree::One(_) => 1,
            DispatchTree::Two(..) => 2,
            DispatchTree::Node { left, right, .. } => 1 + left.len() + right.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, DispatchTree::Empty)
    }

    /// Longest chain of key comparisons on any lookup path.
    pub fn depth(&self) -> usize {
        match self {
            DispatchTree::Empty => 0,
            DispatchTree::One(_) => 1,
            DispatchTree::Two(..) => 2,
            DispatchTree::Node { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    /// Resolves `key` the way the emitted code does.
    pub fn lookup(&self, key: U256) -> Option<&Value> {
        match self {
            DispatchTree::Empty => None,
            DispatchTree::One(entry) => (entry.key == key).then_some(&entry.target),
            DispatchTree::Two(first, second) => [first, second]
                .into_iter()
                .find(|entry| entry.key == key)
                .map(|entry| &entry.target),
            DispatchTree::Node { pivot, left, right } => {
                if key < pivot.key {
                    left.lookup(key)
                } else if key > pivot.key {
                    right.lookup(key)
                } else {
                    Some(&pivot.target)
                }
            }
        }
    }

    /// Emits the lookup. Stack: `key` -> `target | none`.
    pub fn emit(&self, b: &mut CodeBuilder) {
        match self {
            DispatchTree::Empty => {
                b.op(Opcode::Pop).push(Value::none());
            }
            DispatchTree::One(entry) => {
                b.push(entry.key).op(Opcode::Eq);
                b.if_else(
                    |t| {
                        t.push(entry.target.clone());
                    },
                    |o| {
                        o.push(Value::none());
                    },
                );
            }
            DispatchTree::Two(first, second) => {
                b.op(Opcode::Dup0).push(first.key).op(Opcode::Eq);
                b.if_else(
                    |t| {
                        t.op(Opcode::Pop).push(first.target.clone());
                    },
                    |o| {
                        DispatchTree::One(second.clone()).emit(o);
                    },
                );
            }
            DispatchTree::Node { pivot, left, right } => {
                // key < pivot
                b.push(pivot.key).op(Opcode::Dup1).op(Opcode::Lt);
                b.if_else(
                    |t| left.emit(t),
                    |o| {
                        // key > pivot
                        o.push(pivot.key).op(Opcode::Dup1).op(Opcode::Gt);
                        o.if_else(
                            |t| right.emit(t),
                            |eq| {
                                eq.op(Opcode::Pop).push(pivot.target.clone());
                            },
                        );
                    },
                );
            }
        }
    }
}

/// Pushes 1 above the lookup result if it is the miss sentinel, else 0.
fn push_is_miss(b: &mut CodeBuilder) {
    b.op(Opcode::Dup0).push(Value::none()).op(Opcode::Eq);
}

/// Stack: `target | none` -> jumps to `target`, or halts on a miss.
pub fn emit_jump_or_halt(b: &mut CodeBuilder) {
    push_is_miss(b);
    b.if_else(
        |t| {
            t.op(Opcode::Halt);
        },
        |o| {
            o.op(Opcode::Jump);
        },
    );
}

/// Stack: `target | none, cond` -> jumps to `target` if `cond` is nonzero,
/// or halts on a miss.
pub fn emit_cjump_or_halt(b: &mut CodeBuilder) {
    push_is_miss(b);
    b.if_else(
        |t| {
            t.op(Opcode::Halt);
        },
        |o| {
            o.op(Opcode::Cjump);
        },
    );
}

/// Halts on a miss and leaves a hit on the stack.
pub fn emit_halt_on_miss(b: &mut CodeBuilder) {
    push_is_miss(b);
    b.if_then(|t| {
        t.op(Opcode::Halt);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avm::assembler::assemble;
    use crate::avm::code::{HostCall, Node};
    use crate::avm::errors::AvmError;
    use crate::avm::machine::{Host, HostAction, Machine, Outcome};
    use crate::avm::value::Label;

    struct NoHost;

    impl Host for NoHost {
        fn call(&mut self, call: &HostCall, _: &mut Vec<Value>) -> Result<HostAction, AvmError> {
            Err(AvmError::HostFailure {
                call: call.name(),
                reason: "no host".to_string(),
            })
        }
    }

    fn entries(n: u64) -> Vec<DispatchEntry> {
        (0..n)
            .map(|k| DispatchEntry::new(U256::from(3 * k + 1), Value::int(100 + k)))
            .collect()
    }

    /// Runs `marker, key` through the tree and returns the resulting stack.
    fn run_lookup(tree: &DispatchTree, key: u64) -> Vec<Value> {
        let mut b = CodeBuilder::new();
        tree.emit(&mut b);
        let block = b.finish();
        let listing = assemble(&[&block]).unwrap();
        let mut machine = Machine::new(&listing);
        machine.push(Value::int(7777));
        machine.push(Value::int(key));
        assert_eq!(machine.run(&mut NoHost).unwrap(), Outcome::Finished);
        machine.stack().to_vec()
    }

    #[test]
    fn depth_is_logarithmic() {
        for n in 0..=64u64 {
            let tree = DispatchTree::build(&entries(n));
            let expected = (u64::BITS - n.leading_zeros()) as usize;
            assert_eq!(tree.depth(), expected, "n = {n}");
            assert_eq!(tree.len(), n as usize);
        }
    }

    #[test]
    fn emitted_lookup_matches_table() {
        for n in 0..=20u64 {
            let tree = DispatchTree::build(&entries(n));
            for key in 0..3 * n + 3 {
                let expected = if key % 3 == 1 && key / 3 < n {
                    Value::int(100 + key / 3)
                } else {
                    Value::none()
                };
                assert_eq!(
                    run_lookup(&tree, key),
                    vec![Value::int(7777), expected.clone()],
                    "n = {n}, key = {key}"
                );
                assert_eq!(
                    tree.lookup(U256::from(key)).cloned().unwrap_or_else(Value::none),
                    expected
                );
            }
        }
    }

    #[test]
    fn two_entry_leaf() {
        let x = Value::Label(Label::named("X"));
        let y = Value::Label(Label::named("Y"));
        let tree = DispatchTree::from_entries(vec![
            DispatchEntry::new(U256::from(9u64), y.clone()),
            DispatchEntry::new(U256::from(5u64), x.clone()),
        ])
        .unwrap();
        assert!(matches!(tree, DispatchTree::Two(..)));

        let mut b = CodeBuilder::new();
        tree.emit(&mut b);
        let block = b.finish();
        assert_eq!(block.count(|n| matches!(n, Node::Op(Opcode::Lt | Opcode::Gt))), 0);
        assert_eq!(block.count(|n| matches!(n, Node::Op(Opcode::Eq))), 2);

        let mut b = CodeBuilder::new();
        b.append(block).push(Value::int(0)).op(Opcode::Halt);
        b.label(Label::named("X")).label(Label::named("Y"));
        let block = b.finish();
        let listing = assemble(&[&block]).unwrap();
        for (key, expected) in [(5, x), (9, y), (7, Value::none())] {
            let mut machine = Machine::new(&listing);
            machine.push(Value::int(key));
            machine.run(&mut NoHost).unwrap();
            assert_eq!(machine.stack(), &[expected, Value::int(0)]);
        }
    }

    #[test]
    fn duplicate_keys_rejected() {
        let err = DispatchTree::from_entries(vec![
            DispatchEntry::new(U256::from(4u64), Value::int(1)),
            DispatchEntry::new(U256::from(4u64), Value::int(2)),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            TranslateError::DuplicateDispatchKey {
                key: U256::from(4u64)
            }
        );
    }

    #[test]
    fn pivot_is_middle_entry() {
        let tree = DispatchTree::build(&entries(5));
        match tree {
            DispatchTree::Node { pivot, left, right } => {
                assert_eq!(pivot.key, U256::from(7u64));
                assert_eq!(left.len(), 2);
                assert_eq!(right.len(), 2);
            }
            other => panic!("unexpected tree {other:?}"),
        }
    }

    #[test]
    fn halt_on_miss_keeps_hit() {
        let mut b = CodeBuilder::new();
        emit_halt_on_miss(&mut b);
        let block = b.finish();
        let listing = assemble(&[&block]).unwrap();

        let mut machine = Machine::new(&listing);
        machine.push(Value::int(42));
        assert_eq!(machine.run(&mut NoHost).unwrap(), Outcome::Finished);
        assert_eq!(machine.stack(), &[Value::int(42)]);

        let mut machine = Machine::new(&listing);
        machine.push(Value::none());
        assert_eq!(machine.run(&mut NoHost).unwrap(), Outcome::Halted);
    }
}
