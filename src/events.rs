//! Account event contract.
//!
//! Routing keys, the message envelope carried by every bus implementation,
//! and correlation id generation.

use std::fmt;

/// Published by the gateway with the raw email as payload.
pub const ACCOUNT_SIGNUP: &str = "account.signup";
/// Published by the gateway with the raw activation code as payload.
pub const ACCOUNT_ACTIVATE: &str = "account.activate";
/// Published by the activation service with a JSON `ActivationRecord`.
pub const ACCOUNT_SEND_ACTIVATION_CODE: &str = "account.sendActivationCode";
/// Published by the activation service once a record flips to activated.
pub const ACCOUNT_ACTIVATED: &str = "account.activated";
/// Binding pattern matching every single-word `account.` routing key.
pub const ALL_ACCOUNT_EVENTS: &str = "account.*";

/// Known account events, keyed by routing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountEvent {
    Signup,
    Activate,
    SendActivationCode,
    Activated,
}

impl AccountEvent {
    /// Resolve a routing key. Unknown keys yield `None`.
    pub fn from_routing_key(key: &str) -> Option<Self> {
        match key {
            ACCOUNT_SIGNUP => Some(Self::Signup),
            ACCOUNT_ACTIVATE => Some(Self::Activate),
            ACCOUNT_SEND_ACTIVATION_CODE => Some(Self::SendActivationCode),
            ACCOUNT_ACTIVATED => Some(Self::Activated),
            _ => None,
        }
    }

    pub fn routing_key(self) -> &'static str {
        match self {
            Self::Signup => ACCOUNT_SIGNUP,
            Self::Activate => ACCOUNT_ACTIVATE,
            Self::SendActivationCode => ACCOUNT_SEND_ACTIVATION_CODE,
            Self::Activated => ACCOUNT_ACTIVATED,
        }
    }
}

impl fmt::Display for AccountEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.routing_key())
    }
}

/// A message as seen on the exchange.
///
/// The payload is opaque bytes; `account.signup` and `account.activate`
/// carry raw UTF-8 strings, the derived events carry JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub routing_key: String,
    pub payload: Vec<u8>,
    pub correlation_id: Option<String>,
}

impl Message {
    pub fn new(routing_key: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            routing_key: routing_key.into(),
            payload: payload.into(),
            correlation_id: None,
        }
    }

    /// Attach a correlation id. `None` leaves the message uncorrelated.
    pub fn with_correlation_id(mut self, correlation_id: Option<String>) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn event(&self) -> Option<AccountEvent> {
        AccountEvent::from_routing_key(&self.routing_key)
    }

    /// Payload as UTF-8 text.
    pub fn payload_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.payload)
    }

    /// Correlation id for logging; empty when absent.
    pub fn correlation(&self) -> &str {
        self.correlation_id.as_deref().unwrap_or("")
    }
}

/// Create a fresh, opaque correlation id.
pub fn new_correlation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
