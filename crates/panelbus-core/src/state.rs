//! In-memory state store: last applied value per signal.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{DomainError, DomainResult, Oid, SignalValue, ValueType};

/// A stored value together with the time it was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    pub value: SignalValue,
    pub updated_at: DateTime<Utc>,
}

/// Typed key-value memory of the last applied value per signal.
///
/// Writes replace the previous value regardless of its type; reads through
/// a typed accessor fail with [`DomainError::WrongType`] when the stored
/// type differs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateStore {
    entries: HashMap<Oid, StateEntry>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a value, returning the previous one if any.
    pub fn set(&mut self, signal: Oid, value: SignalValue) -> Option<SignalValue> {
        let entry = StateEntry {
            value,
            updated_at: Utc::now(),
        };
        self.entries.insert(signal, entry).map(|old| old.value)
    }

    pub fn set_int(&mut self, signal: Oid, value: i64) -> Option<SignalValue> {
        self.set(signal, SignalValue::Int(value))
    }

    pub fn set_float(&mut self, signal: Oid, value: f64) -> Option<SignalValue> {
        self.set(signal, SignalValue::Float(value))
    }

    pub fn set_bool(&mut self, signal: Oid, value: bool) -> Option<SignalValue> {
        self.set(signal, SignalValue::Bool(value))
    }

    /// Returns the stored value, whatever its type.
    pub fn get(&self, signal: Oid) -> Option<SignalValue> {
        self.entries.get(&signal).map(|entry| entry.value)
    }

    /// Returns the full entry including its write timestamp.
    pub fn entry(&self, signal: Oid) -> Option<&StateEntry> {
        self.entries.get(&signal)
    }

    pub fn get_int(&self, signal: Oid) -> DomainResult<i64> {
        match self.typed(signal, ValueType::Int)? {
            SignalValue::Int(v) => Ok(v),
            other => Err(wrong_type(signal, ValueType::Int, other)),
        }
    }

    pub fn get_float(&self, signal: Oid) -> DomainResult<f64> {
        match self.typed(signal, ValueType::Float)? {
            SignalValue::Float(v) => Ok(v),
            other => Err(wrong_type(signal, ValueType::Float, other)),
        }
    }

    pub fn get_bool(&self, signal: Oid) -> DomainResult<bool> {
        match self.typed(signal, ValueType::Bool)? {
            SignalValue::Bool(v) => Ok(v),
            other => Err(wrong_type(signal, ValueType::Bool, other)),
        }
    }

    pub fn contains(&self, signal: Oid) -> bool {
        self.entries.contains_key(&signal)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates stored entries in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (Oid, &StateEntry)> {
        self.entries.iter().map(|(oid, entry)| (*oid, entry))
    }

    fn typed(&self, signal: Oid, expected: ValueType) -> DomainResult<SignalValue> {
        let value = self.get(signal).ok_or(DomainError::Unset(signal))?;
        if value.value_type() != expected {
            return Err(wrong_type(signal, expected, value));
        }
        Ok(value)
    }
}

fn wrong_type(signal: Oid, expected: ValueType, actual: SignalValue) -> DomainError {
    DomainError::WrongType {
        signal,
        expected,
        actual: actual.value_type(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_round_trip() {
        let mut store = StateStore::new();
        store.set_int(Oid::Oid1, 100);
        store.set_float(Oid::Oid2, 12.5);
        store.set_bool(Oid::Oid3, true);

        assert_eq!(store.get_int(Oid::Oid1), Ok(100));
        assert_eq!(store.get_float(Oid::Oid2), Ok(12.5));
        assert_eq!(store.get_bool(Oid::Oid3), Ok(true));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_wrong_accessor_fails() {
        let mut store = StateStore::new();
        store.set_int(Oid::Oid1, 5);

        let err = store.get_float(Oid::Oid1).unwrap_err();
        assert_eq!(
            err,
            DomainError::WrongType {
                signal: Oid::Oid1,
                expected: ValueType::Float,
                actual: ValueType::Int,
            }
        );
        assert!(store.get_bool(Oid::Oid1).is_err());
    }

    #[test]
    fn test_unset_signal() {
        let store = StateStore::new();
        assert_eq!(store.get_int(Oid::Oid4), Err(DomainError::Unset(Oid::Oid4)));
        assert!(store.get(Oid::Oid4).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_overwrite_changes_type() {
        let mut store = StateStore::new();
        store.set_int(Oid::Oid1, 1);
        let previous = store.set_bool(Oid::Oid1, false);

        assert_eq!(previous, Some(SignalValue::Int(1)));
        assert_eq!(store.get_bool(Oid::Oid1), Ok(false));
        assert!(store.get_int(Oid::Oid1).is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_entry_records_timestamp() {
        let mut store = StateStore::new();
        let before = Utc::now();
        store.set_int(Oid::PedestalTrimWheel, -3);

        let entry = store.entry(Oid::PedestalTrimWheel).expect("entry exists");
        assert!(entry.updated_at >= before);
        assert_eq!(entry.value, SignalValue::Int(-3));
    }
}
