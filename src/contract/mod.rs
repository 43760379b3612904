//! Contracts: named computations whose output becomes ledger data.
//!
//! A contract is a capability, not code shipped as data. `ContractScheduler` invokes
//! one on a fixed period and appends the result as a new block.

pub mod builtin;
pub mod scheduler;

pub use builtin::{deploy, ContractKind, RandomNumberGenerator, ScriptContract};
pub use scheduler::ContractScheduler;

/// A named, zero-argument computation producing a data string.
///
/// Implementations must be cheap to call; `invoke` runs on the scheduler task.
pub trait SmartContract: Send + Sync + 'static {
    fn name(&self) -> &str;
    fn invoke(&self) -> String;
}
