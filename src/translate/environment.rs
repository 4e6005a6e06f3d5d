//! Runtime environment seen by translated code.
//!
//! The translator decides where the runtime is consulted; an [`Environment`]
//! decides what code each consultation becomes. [`HostEnvironment`] lowers
//! every operation to a [`HostCall`] and handles control transfer for calls
//! through the contract dispatch tree.

use crate::avm::code::{CodeBuilder, HostCall};
use crate::avm::value::{Label, Value};
use crate::storage::ContractStorage;
use crate::translate::dispatch::{DispatchTree, emit_jump_or_halt};
use alloy_primitives::U256;

/// A contract as registered with the runtime at start-up.
#[derive(Clone, Copy, Debug)]
pub struct ContractRecord<'a> {
    pub id: U256,
    pub storage: &'a ContractStorage,
}

impl ContractRecord<'_> {
    /// `(id, storage)` tuple.
    pub fn to_value(&self) -> Value {
        Value::Tuple(vec![Value::Int(self.id), self.storage.to_value()])
    }
}

/// Code emitted for each runtime operation.
///
/// Stack effects follow the source instruction the operation stands for.
pub trait Environment {
    /// Registers `records` (sorted by id) with the runtime.
    fn initialize(&self, b: &mut CodeBuilder, records: &[ContractRecord<'_>]);
    /// Waits for the next inbound message.
    fn get_next_message(&self, b: &mut CodeBuilder);
    /// Enters the contract the current message targets and resumes after it.
    fn setup_initial_call(&self, b: &mut CodeBuilder, contracts: &DispatchTree);

    fn storage_load(&self, b: &mut CodeBuilder);
    fn storage_store(&self, b: &mut CodeBuilder);
    fn memory_load(&self, b: &mut CodeBuilder);
    fn memory_store(&self, b: &mut CodeBuilder);

    fn message_caller(&self, b: &mut CodeBuilder);
    fn message_value(&self, b: &mut CodeBuilder);
    fn message_timestamp(&self, b: &mut CodeBuilder);
    fn message_data_load(&self, b: &mut CodeBuilder);
    fn message_data_size(&self, b: &mut CodeBuilder);

    /// Balance of the address on top of the stack (`0` for the running contract).
    fn balance_get(&self, b: &mut CodeBuilder);
    fn return_data_size(&self, b: &mut CodeBuilder);
    fn return_data_copy(&self, b: &mut CodeBuilder);
    fn evm_sha3(&self, b: &mut CodeBuilder);
    fn evm_log(&self, b: &mut CodeBuilder, topics: u8);
    /// Copies from `blob`, the contract's own code, into memory.
    fn evm_copy_to_memory(&self, b: &mut CodeBuilder, blob: &Value);

    fn call(&self, b: &mut CodeBuilder, contracts: &DispatchTree, pc: usize, contract: U256);
    fn staticcall(&self, b: &mut CodeBuilder, contracts: &DispatchTree, pc: usize, contract: U256);

    fn stop(&self, b: &mut CodeBuilder);
    fn revert(&self, b: &mut CodeBuilder);
    fn ret(&self, b: &mut CodeBuilder);
    fn selfdestruct(&self, b: &mut CodeBuilder);
}

/// Lowers runtime operations to host calls.
#[derive(Clone, Copy, Debug, Default)]
pub struct HostEnvironment;

impl HostEnvironment {
    /// Pushes `resume`, runs `call`, enters the callee id it leaves on the
    /// stack and defines `resume` for the callee to return to.
    fn enter_contract(b: &mut CodeBuilder, call: HostCall, contracts: &DispatchTree, resume: Label) {
        b.push(resume.clone()).host(call);
        contracts.emit(b);
        emit_jump_or_halt(b);
        b.label(resume);
    }
}

impl Environment for HostEnvironment {
    fn initialize(&self, b: &mut CodeBuilder, records: &[ContractRecord<'_>]) {
        let table = records.iter().map(ContractRecord::to_value).collect();
        b.push(Value::Tuple(table)).host(HostCall::Initialize {
            contracts: records.len() as u64,
        });
    }

    fn get_next_message(&self, b: &mut CodeBuilder) {
        b.host(HostCall::NextMessage);
    }

    fn setup_initial_call(&self, b: &mut CodeBuilder, contracts: &DispatchTree) {
        Self::enter_contract(b, HostCall::BeginMessage, contracts, Label::message_return());
    }

    fn storage_load(&self, b: &mut CodeBuilder) {
        b.host(HostCall::StorageLoad);
    }

    fn storage_store(&self, b: &mut CodeBuilder) {
        b.host(HostCall::StorageStore);
    }

    fn memory_load(&self, b: &mut CodeBuilder) {
        b.host(HostCall::MemoryLoad);
    }

    fn memory_store(&self, b: &mut CodeBuilder) {
        b.host(HostCall::MemoryStore);
    }

    fn message_caller(&self, b: &mut CodeBuilder) {
        b.host(HostCall::MessageCaller);
    }

    fn message_value(&self, b: &mut CodeBuilder) {
        b.host(HostCall::MessageValue);
    }

    fn message_timestamp(&self, b: &mut CodeBuilder) {
        b.host(HostCall::MessageTimestamp);
    }

    fn message_data_load(&self, b: &mut CodeBuilder) {
        b.host(HostCall::MessageDataLoad);
    }

    fn message_data_size(&self, b: &mut CodeBuilder) {
        b.host(HostCall::MessageDataSize);
    }

    fn balance_get(&self, b: &mut CodeBuilder) {
        b.host(HostCall::BalanceGet);
    }

    fn return_data_size(&self, b: &mut CodeBuilder) {
        b.host(HostCall::ReturnDataSize);
    }

    fn return_data_copy(&self, b: &mut CodeBuilder) {
        b.host(HostCall::ReturnDataCopy);
    }

    fn evm_sha3(&self, b: &mut CodeBuilder) {
        b.host(HostCall::Sha3);
    }

    fn evm_log(&self, b: &mut CodeBuilder, topics: u8) {
        b.host(HostCall::Log { topics });
    }

    fn evm_copy_to_memory(&self, b: &mut CodeBuilder, blob: &Value) {
        b.push(blob.clone()).host(HostCall::CopyToMemory);
    }

    fn call(&self, b: &mut CodeBuilder, contracts: &DispatchTree, pc: usize, contract: U256) {
        let call = HostCall::Call {
            caller: contract,
            pc: pc as u64,
        };
        Self::enter_contract(b, call, contracts, Label::return_site(contract, pc));
    }

    fn staticcall(&self, b: &mut CodeBuilder, contracts: &DispatchTree, pc: usize, contract: U256) {
        let call = HostCall::StaticCall {
            caller: contract,
            pc: pc as u64,
        };
        Self::enter_contract(b, call, contracts, Label::return_site(contract, pc));
    }

    fn stop(&self, b: &mut CodeBuilder) {
        b.host(HostCall::Stop);
    }

    fn revert(&self, b: &mut CodeBuilder) {
        b.host(HostCall::Revert);
    }

    fn ret(&self, b: &mut CodeBuilder) {
        b.host(HostCall::Return);
    }

    fn selfdestruct(&self, b: &mut CodeBuilder) {
        b.host(HostCall::SelfDestruct);
    }
}
