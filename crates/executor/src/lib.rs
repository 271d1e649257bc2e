#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

#[macro_use]
extern crate tracing;

mod errors;
pub use errors::{ExecutorError, ExecutorResult};

mod ruleset;
pub use ruleset::{Activation, Amendments, ChainParams, RuleSetId, RuleSetOracle};

mod env;
pub use env::{BlockContext, BlockHashOracle, Environment, NoopBlockHashOracle, BLOCKHASH_WINDOW};

mod message;
pub use message::{Message, MessageKind, MessageResult, MessageStatus};

mod interpreter;
pub use interpreter::{HandleRegister, Interpreter, RevmInterpreter, StateAdapter};

mod receipt;
pub use receipt::Receipt;

mod tx_runner;
pub use tx_runner::{RecoveredTx, TransactionRunner};

mod block_runner;
pub use block_runner::{Block, BlockOutput, BlockRunner, RunBlockOpts};

mod driver;
pub use driver::{BlockStore, BlockchainDriver, DriverEvent};

mod builder;
pub use builder::{BlockBuilder, SealedBlock};

mod events;
pub use events::{EventSink, NoopEventSink};

mod precompile;
pub use precompile::prime_precompiles;

mod genesis;
pub use genesis::{GenesisAccount, GenesisSpec};

mod engine;
pub use engine::{Engine, EngineBuilder};

pub mod constants;

#[cfg(test)]
pub(crate) mod test_utils;
