//! Key-value lookup capability and its stub

use crate::Result;

use super::{Expectation, Stub};

/// A collaborator that resolves keys to values
pub trait KeyValueStore {
    /// Get the value stored for `key`
    ///
    /// # Errors
    ///
    /// Returns error if the lookup fails
    fn get(&self, key: &str) -> Result<String>;
}

/// Calls observable on a [`KeyValueStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyValueCall {
    /// `get(key)`
    Get {
        /// Requested key
        key: String,
    },
}

/// Scripted [`KeyValueStore`]
#[derive(Debug, Default)]
pub struct StubKeyValueStore {
    stub: Stub<KeyValueCall, String>,
}

impl StubKeyValueStore {
    /// Create a stub with no expectations
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect `get(key)`
    pub fn expect_get(&mut self, key: impl Into<String>) -> &mut Expectation<KeyValueCall, String> {
        self.stub.expect(KeyValueCall::Get { key: key.into() })
    }

    /// Check every expectation was met
    ///
    /// # Errors
    ///
    /// Returns error if any expectation is unsatisfied
    pub fn verify(&self) -> Result<()> {
        self.stub.verify()
    }

    /// Verify and clear all expectations
    ///
    /// # Errors
    ///
    /// Returns error if any expectation is unsatisfied
    pub fn checkpoint(&mut self) -> Result<()> {
        self.stub.checkpoint()
    }
}

impl KeyValueStore for StubKeyValueStore {
    fn get(&self, key: &str) -> Result<String> {
        self.stub.call(&KeyValueCall::Get {
            key: key.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UnderstudyError;

    fn flavor_of(store: &impl KeyValueStore) -> Result<String> {
        store.get("ice cream")
    }

    #[test]
    fn test_get_returns_programmed_value() {
        let mut store = StubKeyValueStore::new();
        store
            .expect_get("ice cream")
            .returning("chocolate".to_string())
            .once();

        assert_eq!(flavor_of(&store).unwrap(), "chocolate");
        store.verify().unwrap();
    }

    #[test]
    fn test_get_unknown_key() {
        let mut store = StubKeyValueStore::new();
        store
            .expect_get("ice cream")
            .returning("chocolate".to_string())
            .once();

        let err = store.get("vanilla").unwrap_err();
        assert!(matches!(err, UnderstudyError::UnexpectedCall { .. }));
        assert!(err.to_string().contains("vanilla"));

        assert!(store.verify().is_err());
    }

    #[test]
    fn test_usable_as_trait_object() {
        let mut store = StubKeyValueStore::new();
        store.expect_get("k").returning("v".to_string()).any_times();

        let dyn_store: &dyn KeyValueStore = &store;
        assert_eq!(dyn_store.get("k").unwrap(), "v");
        assert_eq!(dyn_store.get("k").unwrap(), "v");
        store.verify().unwrap();
    }
}
