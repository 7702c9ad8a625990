//! In-memory activation store.
//!
//! Records are indexed by activation code. Nothing enforces code uniqueness
//! or deduplicates by email: every signup creates an independent record, and
//! a code shared by several records activates all of them. Records are never
//! removed, so a record's slot under its code is stable for the lifetime of
//! the process.

use std::collections::HashMap;

use super::ActivationRecord;

/// Where one record carrying a code stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// The record is still pending. `record` is the record as it will read
    /// once activated; `slot` identifies it for `mark_activated`.
    Pending { slot: usize, record: ActivationRecord },
    /// The record was activated earlier; nothing to do.
    AlreadyActivated(ActivationRecord),
}

impl Activation {
    pub fn record(&self) -> &ActivationRecord {
        match self {
            Self::Pending { record, .. } | Self::AlreadyActivated(record) => record,
        }
    }
}

#[derive(Debug, Default)]
pub struct ActivationStore {
    by_code: HashMap<String, Vec<ActivationRecord>>,
    len: usize,
}

impl ActivationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pending record and return a copy of it.
    pub fn create(
        &mut self,
        email: impl Into<String>,
        activation_code: impl Into<String>,
    ) -> ActivationRecord {
        let record = ActivationRecord::pending(email, activation_code);
        self.by_code
            .entry(record.activation_code.clone())
            .or_default()
            .push(record.clone());
        self.len += 1;
        record
    }

    /// All records carrying `code`, in creation order.
    pub fn find_by_code(&self, code: &str) -> &[ActivationRecord] {
        self.by_code.get(code).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Inspect every record carrying `code`, in creation order.
    ///
    /// Nothing changes; an empty result means no record carries the code.
    pub fn activations(&self, code: &str) -> Vec<Activation> {
        self.find_by_code(code)
            .iter()
            .enumerate()
            .map(|(slot, record)| {
                if record.activated {
                    Activation::AlreadyActivated(record.clone())
                } else {
                    Activation::Pending {
                        slot,
                        record: ActivationRecord {
                            activated: true,
                            ..record.clone()
                        },
                    }
                }
            })
            .collect()
    }

    /// Flip the record at `slot` among those carrying `code` to activated.
    ///
    /// Returns `false` if there is no such record or it was already activated.
    pub fn mark_activated(&mut self, code: &str, slot: usize) -> bool {
        match self.by_code.get_mut(code).and_then(|records| records.get_mut(slot)) {
            Some(record) if !record.activated => {
                record.activated = true;
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
