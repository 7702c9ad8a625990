//! Accountflow - account activation event pipeline
//!
//! Three cooperating services exchange events over a topic exchange:
//!
//! ```text
//! [gateway] --account.signup-----> [activation] --account.sendActivationCode--> [notification]
//! [gateway] --account.activate---> [activation] --account.activated-----------> [notification]
//! ```
//!
//! The gateway publishes fire-and-forget requests, the activation service
//! owns the in-memory activation store and emits derived events, and the
//! notification service is a pure sink.

pub mod activation;
pub mod bus;
pub mod config;
pub mod events;
pub mod gateway;
pub mod notification;
pub mod utils;
