//! Activation record, the payload of every derived account event.

use serde::{Deserialize, Serialize};

/// A pending or completed activation.
///
/// Serialized as `{"email":..,"activationCode":..,"activated":..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationRecord {
    pub email: String,
    pub activation_code: String,
    pub activated: bool,
}

impl ActivationRecord {
    /// A new, not yet activated record.
    pub fn pending(email: impl Into<String>, activation_code: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            activation_code: activation_code.into(),
            activated: false,
        }
    }
}
