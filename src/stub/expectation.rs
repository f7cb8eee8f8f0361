//! A single scripted call

use std::fmt;

/// Required number of calls for an expectation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Times {
    /// Exactly `n` calls
    Exactly(usize),
    /// At least `n` calls
    AtLeast(usize),
    /// At most `n` calls
    AtMost(usize),
    /// Any number of calls, including none
    Any,
}

impl Times {
    /// Whether one more call is allowed after `calls` calls
    #[must_use]
    pub fn allows_another(self, calls: usize) -> bool {
        match self {
            Self::Exactly(n) | Self::AtMost(n) => calls < n,
            Self::AtLeast(_) | Self::Any => true,
        }
    }

    /// Whether `calls` calls meet the requirement
    #[must_use]
    pub fn is_satisfied_by(self, calls: usize) -> bool {
        match self {
            Self::Exactly(n) => calls == n,
            Self::AtLeast(n) => calls >= n,
            Self::AtMost(n) => calls <= n,
            Self::Any => true,
        }
    }
}

impl Default for Times {
    fn default() -> Self {
        Self::Exactly(1)
    }
}

impl fmt::Display for Times {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exactly(1) => write!(f, "once"),
            Self::Exactly(n) => write!(f, "exactly {n} time(s)"),
            Self::AtLeast(n) => write!(f, "at least {n} time(s)"),
            Self::AtMost(n) => write!(f, "at most {n} time(s)"),
            Self::Any => write!(f, "any number of times"),
        }
    }
}

/// A declared call with its programmed output and required count
///
/// Setters return `&mut Self` so they chain off [`Stub::expect`]:
///
/// ```
/// use understudy::stub::Stub;
///
/// #[derive(Debug, Clone, PartialEq)]
/// enum Call {
///     Get(String),
/// }
///
/// let mut stub: Stub<Call, String> = Stub::new();
/// stub.expect(Call::Get("ice cream".into()))
///     .returning("chocolate".into())
///     .once();
///
/// assert_eq!(stub.call(&Call::Get("ice cream".into())).unwrap(), "chocolate");
/// stub.verify().unwrap();
/// ```
///
/// [`Stub::expect`]: super::Stub::expect
#[derive(Debug)]
pub struct Expectation<C, O> {
    call: C,
    output: Option<O>,
    times: Times,
    calls: usize,
}

impl<C, O> Expectation<C, O> {
    pub(crate) fn new(call: C) -> Self {
        Self {
            call,
            output: None,
            times: Times::default(),
            calls: 0,
        }
    }

    /// Set the value returned when this expectation matches
    pub fn returning(&mut self, output: O) -> &mut Self {
        self.output = Some(output);
        self
    }

    /// Require exactly one call
    pub fn once(&mut self) -> &mut Self {
        self.times(1)
    }

    /// Require exactly `n` calls
    pub fn times(&mut self, n: usize) -> &mut Self {
        self.times = Times::Exactly(n);
        self
    }

    /// Require at least `n` calls
    pub fn at_least(&mut self, n: usize) -> &mut Self {
        self.times = Times::AtLeast(n);
        self
    }

    /// Allow at most `n` calls
    pub fn at_most(&mut self, n: usize) -> &mut Self {
        self.times = Times::AtMost(n);
        self
    }

    /// Allow any number of calls
    pub fn any_times(&mut self) -> &mut Self {
        self.times = Times::Any;
        self
    }

    /// The declared call
    pub fn call(&self) -> &C {
        &self.call
    }

    /// Required call count
    pub fn required(&self) -> Times {
        self.times
    }

    /// Calls consumed so far
    pub fn call_count(&self) -> usize {
        self.calls
    }

    /// Whether the recorded calls meet the requirement
    pub fn is_satisfied(&self) -> bool {
        self.times.is_satisfied_by(self.calls)
    }

    pub(crate) fn has_remaining(&self) -> bool {
        self.times.allows_another(self.calls)
    }

    pub(crate) fn consume(&mut self) -> Option<&O> {
        self.calls += 1;
        self.output.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_once() {
        let expectation: Expectation<&str, ()> = Expectation::new("get");
        assert_eq!(expectation.required(), Times::Exactly(1));
        assert!(!expectation.is_satisfied());
        assert!(expectation.has_remaining());
    }

    #[test]
    fn test_exactly_exhausts() {
        let mut expectation: Expectation<&str, u8> = Expectation::new("get");
        expectation.returning(7).times(2);

        assert_eq!(expectation.consume(), Some(&7));
        assert!(expectation.has_remaining());
        assert!(!expectation.is_satisfied());

        assert_eq!(expectation.consume(), Some(&7));
        assert!(!expectation.has_remaining());
        assert!(expectation.is_satisfied());
    }

    #[test]
    fn test_times_bounds() {
        assert!(Times::AtLeast(2).allows_another(10));
        assert!(!Times::AtLeast(2).is_satisfied_by(1));
        assert!(Times::AtMost(2).is_satisfied_by(0));
        assert!(!Times::AtMost(2).allows_another(2));
        assert!(Times::Any.is_satisfied_by(0));
        assert!(Times::Exactly(0).is_satisfied_by(0));
        assert!(!Times::Exactly(0).allows_another(0));
    }

    #[test]
    fn test_times_display() {
        assert_eq!(Times::Exactly(1).to_string(), "once");
        assert_eq!(Times::Exactly(3).to_string(), "exactly 3 time(s)");
        assert_eq!(Times::Any.to_string(), "any number of times");
    }
}
