//! Program assembly: every contract plus the message loop in one unit.

use crate::avm::code::CodeBuilder;
use crate::avm::value::Label;
use crate::config::TranslatorConfig;
use crate::evm::disasm::disassemble;
use crate::evm::instruction::Instruction;
use crate::evm::normalize::{NormalizeReport, normalize};
use crate::storage::StorageMap;
use crate::translate::contract::{CompiledContract, compile_contract};
use crate::translate::dispatch::{DispatchEntry, DispatchTree};
use crate::translate::environment::{ContractRecord, Environment, HostEnvironment};
use crate::translate::errors::TranslateError;
use crate::translate::instruction::SharedTables;
use crate::translate::unit::TranslationUnit;
use crate::{debug, info, warn};
use alloy_primitives::U256;
use std::collections::BTreeMap;

/// One contract after disassembly and normalization.
struct Prepared<'a> {
    id: U256,
    code: &'a [u8],
    instructions: Vec<Instruction>,
    report: NormalizeReport,
}

/// Translates a set of contracts into a single [`TranslationUnit`].
pub struct Translator<E: Environment = HostEnvironment> {
    config: TranslatorConfig,
    env: E,
}

impl Translator {
    pub fn new(config: TranslatorConfig) -> Self {
        Self::with_environment(config, HostEnvironment)
    }
}

impl Default for Translator {
    fn default() -> Self {
        Self::new(TranslatorConfig::default())
    }
}

impl<E: Environment> Translator<E> {
    pub fn with_environment(config: TranslatorConfig, env: E) -> Self {
        Self { config, env }
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    /// Translates `contracts` (id to raw bytecode).
    ///
    /// Every translated contract gets an entry in `storage`; existing
    /// entries are kept as they are. On error `storage` is left untouched.
    pub fn translate(
        &self,
        contracts: &BTreeMap<U256, Vec<u8>>,
        storage: &mut StorageMap,
    ) -> Result<TranslationUnit, TranslateError> {
        let prepared: Vec<Prepared<'_>> = contracts
            .iter()
            .map(|(&id, code)| self.prepare(id, code))
            .collect();

        let contract_dispatch = DispatchTree::from_entries(
            prepared
                .iter()
                .map(|p| DispatchEntry::new(p.id, Label::contract_entry(p.id)))
                .collect(),
        )?;
        let code_sizes = DispatchTree::from_entries(
            prepared
                .iter()
                .map(|p| DispatchEntry::new(p.id, p.instructions.len()))
                .collect(),
        )?;
        let shared = SharedTables {
            contracts: &contract_dispatch,
            code_sizes: &code_sizes,
        };

        let mut compiled = Vec::with_capacity(prepared.len());
        for p in &prepared {
            let contract = compile_contract(
                p.id,
                &p.instructions,
                p.code,
                shared,
                &self.env,
                &self.config,
            )?;
            log_contract(p, &contract);
            compiled.push(contract);
        }

        for contract in &compiled {
            storage.entry(contract.id).or_default();
        }
        let records: Vec<ContractRecord<'_>> = storage
            .iter()
            .filter(|(id, _)| contracts.contains_key(*id))
            .map(|(&id, slots)| ContractRecord { id, storage: slots })
            .collect();

        let mut init = CodeBuilder::with_note("init");
        self.env.initialize(&mut init, &records);
        init.jump_to(Label::run_loop());

        let mut run_loop = CodeBuilder::with_note("run loop");
        run_loop.label(Label::run_loop());
        self.env.get_next_message(&mut run_loop);
        self.env.setup_initial_call(&mut run_loop, &contract_dispatch);
        run_loop.jump_to(Label::run_loop());

        let mut main = CodeBuilder::new();
        main.append(run_loop.finish());
        for contract in compiled {
            main.append(contract.code);
        }

        let unit = TranslationUnit {
            init: init.finish(),
            main: main.finish(),
        };
        info!(
            "translated {} contracts, fingerprint {}",
            contracts.len(),
            unit.fingerprint()
        );
        Ok(unit)
    }

    fn prepare<'a>(&self, id: U256, code: &'a [u8]) -> Prepared<'a> {
        let mut instructions = disassemble(code);
        let report = normalize(&mut instructions, &self.config.normalize);
        if instructions.is_empty() {
            warn!("contract {id} has no instructions after normalization");
        }
        Prepared {
            id,
            code,
            instructions,
            report,
        }
    }
}

fn log_contract(prepared: &Prepared<'_>, contract: &CompiledContract) {
    let report = &prepared.report;
    debug!(
        "contract {}: {} instructions, {} jump destinations, {} metadata instructions stripped, {} self-balance and {} word-hash fusions",
        contract.id,
        contract.instruction_count,
        contract.jump_table.len(),
        report.stripped,
        report.self_balance_fusions,
        report.word_hash_fusions
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avm::code::{HostCall, Node};
    use crate::storage::ContractStorage;

    fn contracts(entries: Vec<(u64, Vec<u8>)>) -> BTreeMap<U256, Vec<u8>> {
        entries
            .into_iter()
            .map(|(id, code)| (U256::from(id), code))
            .collect()
    }

    #[test]
    fn storage_entries_are_only_added() {
        let mut storage = StorageMap::new();
        let mut existing = ContractStorage::new();
        existing.set(U256::from(1u64), U256::from(5u64));
        storage.insert(U256::from(2u64), existing.clone());
        storage.insert(U256::from(99u64), ContractStorage::new());

        Translator::default()
            .translate(&contracts(vec![(1, vec![0x00]), (2, vec![0x00])]), &mut storage)
            .unwrap();

        assert_eq!(storage.len(), 3);
        assert!(storage[&U256::from(1u64)].is_empty());
        assert_eq!(storage[&U256::from(2u64)], existing);
        assert!(storage.contains_key(&U256::from(99u64)));
    }

    #[test]
    fn failed_translation_leaves_storage_alone() {
        let mut storage = StorageMap::new();
        let err = Translator::default()
            .translate(&contracts(vec![(1, vec![0x00]), (2, vec![0x31])]), &mut storage)
            .unwrap_err();
        assert!(matches!(err, TranslateError::UnsupportedOpcode { .. }));
        assert!(storage.is_empty());
    }

    #[test]
    fn init_registers_only_translated_contracts() {
        let mut storage = StorageMap::new();
        storage.insert(U256::from(50u64), ContractStorage::new());
        let unit = Translator::default()
            .translate(&contracts(vec![(3, vec![0x00]), (1, vec![0x00])]), &mut storage)
            .unwrap();
        assert_eq!(
            unit.init.nodes[1],
            Node::Host(HostCall::Initialize { contracts: 2 })
        );
    }

    #[test]
    fn main_starts_with_run_loop() {
        let unit = Translator::default()
            .translate(&contracts(vec![(1, vec![0x00])]), &mut StorageMap::new())
            .unwrap();
        let Node::Block(run_loop) = &unit.main.nodes[0] else {
            panic!("expected run loop block");
        };
        assert_eq!(run_loop.nodes[0], Node::Label(Label::run_loop()));
        assert_eq!(run_loop.nodes[1], Node::Host(HostCall::NextMessage));
        assert_eq!(unit.main.nodes.len(), 2);
        unit.listing().unwrap();
    }

    #[test]
    fn no_contracts() {
        let unit = Translator::default()
            .translate(&BTreeMap::new(), &mut StorageMap::new())
            .unwrap();
        assert_eq!(
            unit.init.nodes[1],
            Node::Host(HostCall::Initialize { contracts: 0 })
        );
        unit.listing().unwrap();
    }
}
