//! Lowers structured blocks into a flat, label-resolved listing.
//!
//! `if/else` nodes become conditional jumps over compiler-generated labels,
//! nested blocks are spliced in place, and every label a `push` refers to must
//! be defined exactly once across all assembled blocks.

use crate::avm::code::{Block, HostCall, Node};
use crate::avm::errors::AvmError;
use crate::avm::isa::Opcode;
use crate::avm::value::{Label, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// One flat instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AsmInstr {
    Op(Opcode),
    Push(Value),
    Host(HostCall),
}

impl fmt::Display for AsmInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsmInstr::Op(op) => write!(f, "{op}"),
            AsmInstr::Push(value) => write!(f, "push {value}"),
            AsmInstr::Host(call) => write!(f, "host {call}"),
        }
    }
}

/// Assembled program: instructions plus label and note positions.
#[derive(Clone, Debug, Default)]
pub struct Listing {
    instrs: Vec<AsmInstr>,
    labels: HashMap<Label, usize>,
    notes: BTreeMap<usize, Vec<String>>,
}

impl Listing {
    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    pub fn get(&self, pc: usize) -> Option<&AsmInstr> {
        self.instrs.get(pc)
    }

    pub fn instrs(&self) -> &[AsmInstr] {
        &self.instrs
    }

    /// Position of `label`, if defined.
    pub fn position(&self, label: &Label) -> Option<usize> {
        self.labels.get(label).copied()
    }

    pub fn resolve(&self, label: &Label) -> Result<usize, AvmError> {
        self.position(label).ok_or_else(|| AvmError::UndefinedLabel {
            label: label.to_string(),
        })
    }

    /// Notes of the blocks that start at `pc`, outermost first.
    pub fn notes_at(&self, pc: usize) -> &[String] {
        self.notes.get(&pc).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut by_pos: BTreeMap<usize, Vec<&Label>> = BTreeMap::new();
        for (label, &pos) in &self.labels {
            by_pos.entry(pos).or_default().push(label);
        }
        for labels in by_pos.values_mut() {
            labels.sort();
        }

        for pc in 0..=self.instrs.len() {
            for label in by_pos.get(&pc).into_iter().flatten() {
                writeln!(f, "{label}:")?;
            }
            for note in self.notes_at(pc) {
                writeln!(f, "    ; {note}")?;
            }
            if let Some(instr) = self.instrs.get(pc) {
                writeln!(f, "    {instr}")?;
            }
        }
        Ok(())
    }
}

/// Assembly state for label tracking during lowering.
struct AsmContext {
    instrs: Vec<AsmInstr>,
    labels: HashMap<Label, usize>,
    notes: BTreeMap<usize, Vec<String>>,
    next_anon: u64,
}

impl AsmContext {
    fn new() -> Self {
        Self {
            instrs: Vec::new(),
            labels: HashMap::new(),
            notes: BTreeMap::new(),
            next_anon: 0,
        }
    }

    fn define_label(&mut self, label: Label) -> Result<(), AvmError> {
        if self.labels.contains_key(&label) {
            return Err(AvmError::DuplicateLabel {
                label: label.to_string(),
            });
        }
        self.labels.insert(label, self.instrs.len());
        Ok(())
    }

    fn fresh_label(&mut self) -> Label {
        let label = Label::Anon(self.next_anon);
        self.next_anon += 1;
        label
    }

    fn emit(&mut self, instr: AsmInstr) {
        self.instrs.push(instr);
    }

    fn lower_block(&mut self, block: &Block) -> Result<(), AvmError> {
        if let Some(note) = &block.note {
            self.notes
                .entry(self.instrs.len())
                .or_default()
                .push(note.clone());
        }
        for node in &block.nodes {
            self.lower_node(node)?;
        }
        Ok(())
    }

    fn lower_node(&mut self, node: &Node) -> Result<(), AvmError> {
        match node {
            Node::Op(op) => self.emit(AsmInstr::Op(*op)),
            Node::Push(value) => self.emit(AsmInstr::Push(value.clone())),
            Node::Host(call) => self.emit(AsmInstr::Host(call.clone())),
            Node::Label(label) => self.define_label(label.clone())?,
            Node::Block(block) => self.lower_block(block)?,
            Node::IfElse { then, otherwise } => self.lower_if_else(then, otherwise)?,
        }
        Ok(())
    }

    fn lower_if_else(&mut self, then: &Block, otherwise: &Block) -> Result<(), AvmError> {
        match (then.is_empty(), otherwise.is_empty()) {
            (true, true) => self.emit(AsmInstr::Op(Opcode::Pop)),
            (false, true) => {
                // iszero; cjump end; <then>; end:
                let end = self.fresh_label();
                self.emit(AsmInstr::Op(Opcode::IsZero));
                self.emit(AsmInstr::Push(Value::Label(end.clone())));
                self.emit(AsmInstr::Op(Opcode::Cjump));
                self.lower_block(then)?;
                self.define_label(end)?;
            }
            (true, false) => {
                // cjump end; <otherwise>; end:
                let end = self.fresh_label();
                self.emit(AsmInstr::Push(Value::Label(end.clone())));
                self.emit(AsmInstr::Op(Opcode::Cjump));
                self.lower_block(otherwise)?;
                self.define_label(end)?;
            }
            (false, false) => {
                // cjump then; <otherwise>; jump end; then: <then>; end:
                let then_label = self.fresh_label();
                let end = self.fresh_label();
                self.emit(AsmInstr::Push(Value::Label(then_label.clone())));
                self.emit(AsmInstr::Op(Opcode::Cjump));
                self.lower_block(otherwise)?;
                self.emit(AsmInstr::Push(Value::Label(end.clone())));
                self.emit(AsmInstr::Op(Opcode::Jump));
                self.define_label(then_label)?;
                self.lower_block(then)?;
                self.define_label(end)?;
            }
        }
        Ok(())
    }

    /// Checks that every label referenced by a push is defined.
    fn check_references(&self) -> Result<(), AvmError> {
        let mut missing = None;
        for instr in &self.instrs {
            if let AsmInstr::Push(value) = instr {
                value.for_each_label(&mut |label| {
                    if missing.is_none() && !self.labels.contains_key(label) {
                        missing = Some(label.clone());
                    }
                });
            }
            if let Some(label) = missing.take() {
                return Err(AvmError::UndefinedLabel {
                    label: label.to_string(),
                });
            }
        }
        Ok(())
    }

    fn finish(self) -> Listing {
        Listing {
            instrs: self.instrs,
            labels: self.labels,
            notes: self.notes,
        }
    }
}

/// Assembles `blocks` back to back into one listing.
pub fn assemble(blocks: &[&Block]) -> Result<Listing, AvmError> {
    let mut ctx = AsmContext::new();
    for block in blocks {
        ctx.lower_block(block)?;
    }
    ctx.check_references()?;
    Ok(ctx.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avm::code::CodeBuilder;

    #[test]
    fn assemble_empty() {
        let listing = assemble(&[&Block::new()]).unwrap();
        assert!(listing.is_empty());
    }

    #[test]
    fn labels_resolve_to_positions() {
        let mut b = CodeBuilder::new();
        b.push(Value::int(1))
            .label(Label::named("here"))
            .op(Opcode::Pop);
        let listing = assemble(&[&b.finish()]).unwrap();
        assert_eq!(listing.position(&Label::named("here")), Some(1));
        assert_eq!(listing.len(), 2);
    }

    #[test]
    fn duplicate_label() {
        let mut b = CodeBuilder::new();
        b.label(Label::named("x")).label(Label::named("x"));
        let err = assemble(&[&b.finish()]).unwrap_err();
        assert!(matches!(err, AvmError::DuplicateLabel { label } if label == "x"));
    }

    #[test]
    fn duplicate_label_across_blocks() {
        let mut a = CodeBuilder::new();
        a.label(Label::run_loop());
        let mut b = CodeBuilder::new();
        b.label(Label::run_loop());
        let err = assemble(&[&a.finish(), &b.finish()]).unwrap_err();
        assert!(matches!(err, AvmError::DuplicateLabel { .. }));
    }

    #[test]
    fn undefined_label() {
        let mut b = CodeBuilder::new();
        b.jump_to(Label::named("nowhere"));
        let err = assemble(&[&b.finish()]).unwrap_err();
        assert!(matches!(err, AvmError::UndefinedLabel { label } if label == "nowhere"));
    }

    #[test]
    fn undefined_label_inside_tuple() {
        let mut b = CodeBuilder::new();
        b.push(Value::Tuple(vec![Value::Label(Label::named("gone"))]));
        assert!(matches!(
            assemble(&[&b.finish()]),
            Err(AvmError::UndefinedLabel { .. })
        ));
    }

    #[test]
    fn if_else_lowering_shape() {
        let mut b = CodeBuilder::new();
        b.if_else(
            |t| {
                t.push(Value::int(1));
            },
            |o| {
                o.push(Value::int(2));
            },
        );
        let listing = assemble(&[&b.finish()]).unwrap();
        assert_eq!(
            listing.instrs(),
            &[
                AsmInstr::Push(Value::Label(Label::Anon(0))),
                AsmInstr::Op(Opcode::Cjump),
                AsmInstr::Push(Value::int(2)),
                AsmInstr::Push(Value::Label(Label::Anon(1))),
                AsmInstr::Op(Opcode::Jump),
                AsmInstr::Push(Value::int(1)),
            ]
        );
        assert_eq!(listing.position(&Label::Anon(0)), Some(5));
        assert_eq!(listing.position(&Label::Anon(1)), Some(6));
    }

    #[test]
    fn if_then_lowering_shape() {
        let mut b = CodeBuilder::new();
        b.if_then(|t| {
            t.op(Opcode::Halt);
        });
        let listing = assemble(&[&b.finish()]).unwrap();
        assert_eq!(
            listing.instrs(),
            &[
                AsmInstr::Op(Opcode::IsZero),
                AsmInstr::Push(Value::Label(Label::Anon(0))),
                AsmInstr::Op(Opcode::Cjump),
                AsmInstr::Op(Opcode::Halt),
            ]
        );
    }

    #[test]
    fn notes_and_display() {
        let mut inner = CodeBuilder::with_note("STOP @ 0");
        inner.host(HostCall::Stop);
        let mut b = CodeBuilder::new();
        b.label(Label::named("entry")).append(inner.finish());
        let listing = assemble(&[&b.finish()]).unwrap();
        assert_eq!(listing.notes_at(0), &["STOP @ 0".to_string()]);
        assert_eq!(listing.to_string(), "entry:\n    ; STOP @ 0\n    host stop\n");
    }
}
