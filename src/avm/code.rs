//! Structured target code.
//!
//! Translation emits a tree of [`Block`]s through a [`CodeBuilder`]. Blocks
//! keep structured `if/else` nodes and a per-block note naming the source
//! instruction they came from. [`crate::avm::assembler`] later lowers the tree
//! into a flat, label-resolved listing.

use crate::avm::isa::Opcode;
use crate::avm::value::{Label, Value};
use alloy_primitives::U256;
use evm2avm_derive::BinaryCodec;
use std::fmt;

/// Entry points into the host runtime.
///
/// Stack effects are defined by the runtime; the translator only decides
/// where each call is made.
#[derive(Clone, Debug, PartialEq, Eq, BinaryCodec)]
pub enum HostCall {
    /// Registers contracts. Expects the record tuple on the stack.
    Initialize { contracts: u64 },
    /// Blocks until the next inbound message is available.
    NextMessage,
    /// Pushes the id of the contract the current message targets.
    BeginMessage,
    StorageLoad,
    StorageStore,
    MemoryLoad,
    MemoryStore,
    MessageCaller,
    MessageValue,
    MessageTimestamp,
    MessageDataLoad,
    MessageDataSize,
    BalanceGet,
    ReturnDataSize,
    ReturnDataCopy,
    Sha3,
    Log { topics: u8 },
    /// Copies from the code blob on the stack into memory.
    CopyToMemory,
    /// Consumes call arguments and a return-site label, pushes the callee id.
    Call { caller: U256, pc: u64 },
    StaticCall { caller: U256, pc: u64 },
    Stop,
    Revert,
    Return,
    SelfDestruct,
}

impl HostCall {
    pub fn name(&self) -> &'static str {
        match self {
            HostCall::Initialize { .. } => "initialize",
            HostCall::NextMessage => "get_next_message",
            HostCall::BeginMessage => "begin_message",
            HostCall::StorageLoad => "storage_load",
            HostCall::StorageStore => "storage_store",
            HostCall::MemoryLoad => "memory_load",
            HostCall::MemoryStore => "memory_store",
            HostCall::MessageCaller => "message_caller",
            HostCall::MessageValue => "message_value",
            HostCall::MessageTimestamp => "message_timestamp",
            HostCall::MessageDataLoad => "message_data_load",
            HostCall::MessageDataSize => "message_data_size",
            HostCall::BalanceGet => "balance_get",
            HostCall::ReturnDataSize => "return_data_size",
            HostCall::ReturnDataCopy => "return_data_copy",
            HostCall::Sha3 => "evm_sha3",
            HostCall::Log { .. } => "evm_log",
            HostCall::CopyToMemory => "evm_copy_to_memory",
            HostCall::Call { .. } => "call",
            HostCall::StaticCall { .. } => "staticcall",
            HostCall::Stop => "stop",
            HostCall::Revert => "revert",
            HostCall::Return => "ret",
            HostCall::SelfDestruct => "selfdestruct",
        }
    }
}

impl fmt::Display for HostCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostCall::Initialize { contracts } => write!(f, "initialize {contracts}"),
            HostCall::Log { topics } => write!(f, "evm_log{topics}"),
            HostCall::Call { caller, pc } | HostCall::StaticCall { caller, pc } => {
                write!(f, "{} {caller} {pc}", self.name())
            }
            other => f.write_str(other.name()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, BinaryCodec)]
pub enum Node {
    Op(Opcode),
    Push(Value),
    Label(Label),
    /// Pops a condition and runs `then` if it is nonzero, `otherwise` if zero.
    IfElse { then: Block, otherwise: Block },
    Host(HostCall),
    Block(Block),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, BinaryCodec)]
pub struct Block {
    /// Human-readable origin, e.g. `JUMPI @ 42`.
    pub note: Option<String>,
    pub nodes: Vec<Node>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_note(note: impl Into<String>) -> Self {
        Self {
            note: Some(note.into()),
            nodes: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Visits every node depth-first, including those nested in branches.
    pub fn walk(&self, f: &mut impl FnMut(&Node)) {
        for node in &self.nodes {
            f(node);
            match node {
                Node::IfElse { then, otherwise } => {
                    then.walk(f);
                    otherwise.walk(f);
                }
                Node::Block(inner) => inner.walk(f),
                _ => {}
            }
        }
    }

    /// Counts nodes matching `pred` anywhere in the tree.
    pub fn count(&self, mut pred: impl FnMut(&Node) -> bool) -> usize {
        let mut n = 0;
        self.walk(&mut |node| {
            if pred(node) {
                n += 1;
            }
        });
        n
    }
}

/// Appends nodes to a block under construction.
///
/// Methods return `&mut Self` so short sequences can be chained:
///
/// ```ignore
/// b.op(Opcode::Dup0).push(Value::none()).op(Opcode::Eq);
/// ```
#[derive(Debug, Default)]
pub struct CodeBuilder {
    block: Block,
}

impl CodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_note(note: impl Into<String>) -> Self {
        Self {
            block: Block::with_note(note),
        }
    }

    pub fn op(&mut self, op: Opcode) -> &mut Self {
        self.block.nodes.push(Node::Op(op));
        self
    }

    pub fn push(&mut self, value: impl Into<Value>) -> &mut Self {
        self.block.nodes.push(Node::Push(value.into()));
        self
    }

    /// Defines `label` at the current position.
    pub fn label(&mut self, label: Label) -> &mut Self {
        self.block.nodes.push(Node::Label(label));
        self
    }

    pub fn host(&mut self, call: HostCall) -> &mut Self {
        self.block.nodes.push(Node::Host(call));
        self
    }

    /// Pushes `label` and jumps to it.
    pub fn jump_to(&mut self, label: Label) -> &mut Self {
        self.push(label).op(Opcode::Jump)
    }

    /// Pops a condition and emits a two-way branch.
    pub fn if_else(
        &mut self,
        then: impl FnOnce(&mut CodeBuilder),
        otherwise: impl FnOnce(&mut CodeBuilder),
    ) -> &mut Self {
        let mut t = CodeBuilder::new();
        then(&mut t);
        let mut o = CodeBuilder::new();
        otherwise(&mut o);
        self.block.nodes.push(Node::IfElse {
            then: t.finish(),
            otherwise: o.finish(),
        });
        self
    }

    /// Pops a condition and runs `then` only if it is nonzero.
    pub fn if_then(&mut self, then: impl FnOnce(&mut CodeBuilder)) -> &mut Self {
        self.if_else(then, |_| {})
    }

    /// Appends a finished block as a nested child.
    pub fn append(&mut self, block: Block) -> &mut Self {
        self.block.nodes.push(Node::Block(block));
        self
    }

    pub fn finish(self) -> Block {
        self.block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_chains_in_order() {
        let mut b = CodeBuilder::with_note("test");
        b.op(Opcode::Dup0).push(Value::none()).op(Opcode::Eq);
        let block = b.finish();
        assert_eq!(block.note.as_deref(), Some("test"));
        assert_eq!(
            block.nodes,
            vec![
                Node::Op(Opcode::Dup0),
                Node::Push(Value::none()),
                Node::Op(Opcode::Eq),
            ]
        );
    }

    #[test]
    fn if_then_has_empty_else() {
        let mut b = CodeBuilder::new();
        b.if_then(|t| {
            t.op(Opcode::Halt);
        });
        let block = b.finish();
        match &block.nodes[0] {
            Node::IfElse { then, otherwise } => {
                assert_eq!(then.nodes, vec![Node::Op(Opcode::Halt)]);
                assert!(otherwise.is_empty());
            }
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn walk_visits_nested_nodes() {
        let mut inner = CodeBuilder::new();
        inner.host(HostCall::Stop);
        let mut b = CodeBuilder::new();
        b.append(inner.finish());
        b.if_else(
            |t| {
                t.op(Opcode::Halt);
            },
            |o| {
                o.op(Opcode::Halt);
            },
        );
        let block = b.finish();
        assert_eq!(block.count(|n| matches!(n, Node::Op(Opcode::Halt))), 2);
        assert_eq!(block.count(|n| matches!(n, Node::Host(HostCall::Stop))), 1);
    }

    #[test]
    fn host_call_display() {
        assert_eq!(HostCall::Log { topics: 2 }.to_string(), "evm_log2");
        assert_eq!(
            HostCall::Call {
                caller: U256::from(3u64),
                pc: 17
            }
            .to_string(),
            "call 3 17"
        );
        assert_eq!(HostCall::Return.to_string(), "ret");
    }
}
