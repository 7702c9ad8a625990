//! Activation service.
//!
//! Tracks pending activations in memory and turns `account.signup` and
//! `account.activate` requests into `account.sendActivationCode` and
//! `account.activated` events.

mod code;
mod record;
mod service;
mod store;

pub use code::{CodeGenerator, FixedCodeGenerator, RandomCodeGenerator, MAX_CODE, MIN_CODE};
pub use record::ActivationRecord;
pub use service::ActivationService;
pub use store::{Activation, ActivationStore};
