#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod account;
pub use account::{storage_key_hash, Account};

pub mod errors;
pub use errors::{StateError, StateResult};

pub(crate) mod journal;
pub use journal::Checkpoint;

pub mod traits;
pub use traits::{Infallible, NoopStateCommitter, StateCommitter};

pub mod db;
pub use db::JournalDb;
