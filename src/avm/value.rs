//! Target values.
//!
//! The target machine has no indexed jumps, so code addresses only exist as
//! [`Label`]s. Composite values are tuples; the empty tuple is the
//! distinguished "not found" value returned by dispatch lookups.

use alloy_primitives::U256;
use evm2avm_derive::BinaryCodec;
use std::fmt;

/// Symbolic code location, resolved by the assembler.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, BinaryCodec)]
pub enum Label {
    Named(String),
    /// Compiler-generated, unique within one assembly.
    Anon(u64),
}

impl Label {
    pub fn named(name: impl Into<String>) -> Label {
        Label::Named(name.into())
    }

    /// Entry point of a compiled contract.
    pub fn contract_entry(contract: U256) -> Label {
        Label::Named(format!("contract_entry_{contract}"))
    }

    /// Location of a `JUMPDEST` at `pc` inside `contract`.
    pub fn jumpdest(contract: U256, pc: usize) -> Label {
        Label::Named(format!("jumpdest_{contract}_{pc}"))
    }

    /// Where execution resumes after the call at `pc` inside `contract` returns.
    pub fn return_site(contract: U256, pc: usize) -> Label {
        Label::Named(format!("return_{contract}_{pc}"))
    }

    /// Head of the message-processing loop.
    pub fn run_loop() -> Label {
        Label::named("run_loop_start")
    }

    /// Where the initial call of each message returns to.
    pub fn message_return() -> Label {
        Label::named("run_loop_message_return")
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Named(name) => f.write_str(name),
            Label::Anon(n) => write!(f, ".L{n}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, BinaryCodec)]
pub enum Value {
    Int(U256),
    Label(Label),
    Tuple(Vec<Value>),
}

impl Value {
    /// The empty tuple. Never a legitimate dispatch target.
    pub fn none() -> Value {
        Value::Tuple(Vec::new())
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::Tuple(items) if items.is_empty())
    }

    pub fn int(value: u64) -> Value {
        Value::Int(U256::from(value))
    }

    pub fn as_int(&self) -> Option<U256> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Short name of the value's kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Label(_) => "label",
            Value::Tuple(_) => "tuple",
        }
    }

    /// Visits every label referenced by this value, including inside tuples.
    pub fn for_each_label(&self, f: &mut impl FnMut(&Label)) {
        match self {
            Value::Int(_) => {}
            Value::Label(label) => f(label),
            Value::Tuple(items) => {
                for item in items {
                    item.for_each_label(f);
                }
            }
        }
    }
}

impl From<U256> for Value {
    fn from(value: U256) -> Self {
        Value::Int(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::int(value)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Int(U256::from(value))
    }
}

impl From<Label> for Value {
    fn from(label: Label) -> Self {
        Value::Label(label)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) if *v < U256::from(1u64 << 32) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v:#x}"),
            Value::Label(label) => write!(f, "@{label}"),
            Value::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_empty_tuple() {
        assert!(Value::none().is_none());
        assert!(!Value::Tuple(vec![Value::int(0)]).is_none());
        assert!(!Value::int(0).is_none());
        assert_ne!(Value::none(), Value::Label(Label::run_loop()));
    }

    #[test]
    fn label_names() {
        let id = U256::from(7u64);
        assert_eq!(Label::contract_entry(id).to_string(), "contract_entry_7");
        assert_eq!(Label::jumpdest(id, 20).to_string(), "jumpdest_7_20");
        assert_eq!(Label::return_site(id, 3).to_string(), "return_7_3");
        assert_eq!(Label::Anon(4).to_string(), ".L4");
    }

    #[test]
    fn display() {
        let v = Value::Tuple(vec![
            Value::int(5),
            Value::Label(Label::named("x")),
            Value::Int(U256::MAX),
        ]);
        assert_eq!(
            v.to_string(),
            format!("(5, @x, {:#x})", U256::MAX)
        );
    }

    #[test]
    fn for_each_label_descends_into_tuples() {
        let v = Value::Tuple(vec![
            Value::Label(Label::named("a")),
            Value::Tuple(vec![Value::Label(Label::Anon(1))]),
        ]);
        let mut seen = Vec::new();
        v.for_each_label(&mut |l| seen.push(l.clone()));
        assert_eq!(seen, vec![Label::named("a"), Label::Anon(1)]);
    }
}
