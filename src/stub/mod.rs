//! Expectation-based stubs
//!
//! A [`Stub`] holds a script of expected calls. Each capability describes
//! its methods as a tagged call type (one variant per method, arguments as
//! fields) and matches incoming calls against the script by equality.

mod expectation;
mod kv;

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, error};

use crate::{Result, UnderstudyError};

pub use expectation::{Expectation, Times};
pub use kv::{KeyValueCall, KeyValueStore, StubKeyValueStore};

/// Expectation table for one stubbed collaborator
///
/// Created at test setup and verified at teardown. Dropping a stub that was
/// never verified while it still has unsatisfied expectations panics.
#[derive(Debug)]
pub struct Stub<C, O>
where
    C: Debug + PartialEq,
{
    expectations: Mutex<Vec<Expectation<C, O>>>,
    verified: AtomicBool,
}

impl<C, O> Stub<C, O>
where
    C: Debug + PartialEq,
    O: Clone,
{
    /// Create an empty stub
    #[must_use]
    pub fn new() -> Self {
        Self {
            expectations: Mutex::new(Vec::new()),
            verified: AtomicBool::new(false),
        }
    }

    /// Register an expectation for `call`
    ///
    /// Defaults to exactly one call and no return value.
    pub fn expect(&mut self, call: C) -> &mut Expectation<C, O> {
        self.verified.store(false, Ordering::Relaxed);
        let expectations = self
            .expectations
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        expectations.push(Expectation::new(call));
        let last = expectations.len() - 1;
        &mut expectations[last]
    }

    /// Dispatch a call against the script
    ///
    /// The first registered expectation that equals `call` and still has
    /// remaining count is consumed.
    ///
    /// # Errors
    ///
    /// Returns [`UnderstudyError::UnexpectedCall`] if nothing matches and
    /// [`UnderstudyError::MissingReturnValue`] if the match has no output.
    pub fn call(&self, call: &C) -> Result<O> {
        let mut expectations = self.lock();

        let mut exhausted = false;
        for expectation in expectations.iter_mut() {
            if expectation.call() != call {
                continue;
            }
            if !expectation.has_remaining() {
                exhausted = true;
                continue;
            }

            debug!(
                "Stub call {:?} matched ({} of {})",
                call,
                expectation.call_count() + 1,
                expectation.required()
            );
            return expectation
                .consume()
                .cloned()
                .ok_or_else(|| UnderstudyError::MissingReturnValue {
                    call: format!("{call:?}"),
                });
        }

        let reason = if exhausted {
            "all matching expectations exhausted"
        } else {
            "no expectation registered"
        };
        error!("Unexpected stub call {:?}: {}", call, reason);
        Err(UnderstudyError::UnexpectedCall {
            call: format!("{call:?}"),
            reason: reason.to_string(),
        })
    }

    /// Check that every expectation received its required calls
    ///
    /// # Errors
    ///
    /// Returns [`UnderstudyError::UnsatisfiedExpectation`] for the first
    /// expectation whose count was not met.
    pub fn verify(&self) -> Result<()> {
        self.verified.store(true, Ordering::Relaxed);
        let expectations = self.lock();

        let mut first = None;
        for expectation in expectations.iter().filter(|e| !e.is_satisfied()) {
            error!(
                "Unsatisfied expectation {:?}: expected {}, called {} time(s)",
                expectation.call(),
                expectation.required(),
                expectation.call_count()
            );
            first.get_or_insert_with(|| UnderstudyError::UnsatisfiedExpectation {
                call: format!("{:?}", expectation.call()),
                expected: expectation.required().to_string(),
                actual: expectation.call_count(),
            });
        }

        first.map_or(Ok(()), Err)
    }

    /// Verify, then clear the script so the stub can be reused
    ///
    /// # Errors
    ///
    /// Same as [`Stub::verify`]; the script is cleared either way.
    pub fn checkpoint(&mut self) -> Result<()> {
        let result = self.verify();
        self.expectations
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        result
    }

    /// Number of registered expectations
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no expectations are registered
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Expectation<C, O>>> {
        self.expectations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C, O> Default for Stub<C, O>
where
    C: Debug + PartialEq,
    O: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<C, O> Drop for Stub<C, O>
where
    C: Debug + PartialEq,
{
    fn drop(&mut self) {
        if std::thread::panicking() || self.verified.load(Ordering::Relaxed) {
            return;
        }

        let expectations = self
            .expectations
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(unmet) = expectations.iter().find(|e| !e.is_satisfied()) {
            panic!(
                "Stub dropped without verification: {:?} expected {}, called {} time(s)",
                unmet.call(),
                unmet.required(),
                unmet.call_count()
            );
        }
    }
}
