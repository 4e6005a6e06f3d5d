//! EVM to AVM translator CLI.
//!
//! Translates a set of contracts into one translation unit.
//!
//! # Usage
//! ```text
//! evm2avm <ID:HEXFILE>... [OPTIONS]
//! ```
//!
//! # Arguments
//! - `ID:HEXFILE`: Contract id (decimal or 0x-hex) and a file holding its
//!   bytecode as hex text
//!
//! # Options
//! - `-o, --output <file>`: Output file path (defaults to `out.avm`)
//! - `--storage <ID:FILE>`: Initial storage for a contract, `<key> <value>` per line
//! - `--listing`: Print the assembled listing to stdout
//! - `--gas <n>`: Value pushed for `GAS`
//! - `--no-strip-metadata`, `--no-fuse-balance`, `--fuse-word-hash`: Peephole passes
//!
//! # Examples
//! ```text
//! evm2avm 1:token.hex 2:vault.hex
//! evm2avm 1:token.hex --storage 1:token.storage -o token.avm --listing
//! ```

use alloy_primitives::{U256, hex};
use evm2avm::config::{TranslatorConfig, parse_u256};
use evm2avm::storage::{ContractStorage, StorageMap};
use evm2avm::translate::Translator;
use evm2avm::utils::log;
use evm2avm::{error, info};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::process;

const DEFAULT_OUTPUT: &str = "out.avm";

fn main() {
    log::init_from_env();
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let mut config = TranslatorConfig::from_env().unwrap_or_else(|e| fail(&e));
    let mut output_path = DEFAULT_OUTPUT.to_string();
    let mut listing = false;
    let mut contracts: BTreeMap<U256, Vec<u8>> = BTreeMap::new();
    let mut storage = StorageMap::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            k @ ("--output" | "-o") => {
                output_path = value_of(&args, &mut i, k).to_string();
            }
            k @ "--storage" => {
                let (id, path) = split_pair(value_of(&args, &mut i, k));
                let text = read_file(path);
                let slots = ContractStorage::parse(&text)
                    .unwrap_or_else(|e| fail(&format!("{path}: {e}")));
                storage.insert(id, slots);
            }
            k @ "--gas" => {
                config.gas_stub = parse_u256(value_of(&args, &mut i, k))
                    .unwrap_or_else(|e| fail(&format!("{k}: {e}")));
            }
            "--listing" => listing = true,
            "--no-strip-metadata" => config.normalize.strip_metadata = false,
            "--no-fuse-balance" => config.normalize.fuse_self_balance = false,
            "--fuse-word-hash" => config.normalize.fuse_word_hash = true,
            other if other.starts_with('-') => {
                error!("Unexpected argument: {}\n", other);
                print_usage(&args[0]);
                process::exit(1);
            }
            pair => {
                let (id, path) = split_pair(pair);
                let text = read_file(path);
                let code = hex::decode(text.trim())
                    .unwrap_or_else(|e| fail(&format!("{path}: invalid hex: {e}")));
                if contracts.insert(id, code).is_some() {
                    fail(&format!("contract {id} given twice"));
                }
            }
        }
        i += 1;
    }

    if contracts.is_empty() {
        fail("no contracts given");
    }
    for id in storage.keys() {
        if !contracts.contains_key(id) {
            fail(&format!("storage given for unknown contract {id}"));
        }
    }

    let translator = Translator::new(config);
    let unit = translator
        .translate(&contracts, &mut storage)
        .unwrap_or_else(|e| fail(&format!("Translation failed: {e}")));
    let assembled = unit
        .listing()
        .unwrap_or_else(|e| fail(&format!("Translation failed: {e}")));

    if listing {
        print!("{assembled}");
    }

    let bytes = unit.to_bytes();
    if let Err(e) = fs::write(&output_path, &bytes) {
        fail(&format!("Failed to write output file: {e}"));
    }

    info!(
        "Translated {} contracts -> {} ({} bytes, {} instructions, fingerprint {})",
        contracts.len(),
        output_path,
        bytes.len(),
        assembled.len(),
        unit.fingerprint()
    );
}

fn fail(message: &str) -> ! {
    error!("{message}");
    process::exit(1);
}

/// Returns the argument following flag `k`, advancing `i` past it.
fn value_of<'a>(args: &'a [String], i: &mut usize, k: &str) -> &'a str {
    *i += 1;
    match args.get(*i) {
        Some(value) => value,
        None => fail(&format!("{k} requires an argument")),
    }
}

/// Splits `ID:PATH`.
fn split_pair(pair: &str) -> (U256, &str) {
    let Some((id, path)) = pair.split_once(':') else {
        fail(&format!("expected ID:FILE, got '{pair}'"));
    };
    let id = parse_u256(id).unwrap_or_else(|e| fail(&format!("contract id: {e}")));
    (id, path)
}

fn read_file(path: &str) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| fail(&format!("{path}: {e}")))
}

const USAGE: &str = "\
EVM to AVM Translator

USAGE:
    {program} <ID:HEXFILE>... [OPTIONS]

ARGS:
    <ID:HEXFILE>    Contract id and a file with its bytecode in hex

OPTIONS:
    -o, --output <file>      Output file path (default: out.avm)
    --storage <ID:FILE>      Initial storage, one `<key> <value>` per line
    --listing                Print the assembled listing
    --gas <n>                Value pushed for GAS (default: 9999999999)
    --no-strip-metadata      Keep trailing compiler metadata
    --no-fuse-balance        Do not fuse the self-balance idiom
    --fuse-word-hash         Fuse the single-word hash idiom
    -h, --help               Print this help

ENVIRONMENT:
    EVM2AVM_LOG              Minimum log level (debug, info, warn, error)
    EVM2AVM_GAS_STUB         Default for --gas
";

fn print_usage(program: &str) {
    print!("{}", USAGE.replace("{program}", program));
}
