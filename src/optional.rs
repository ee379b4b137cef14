//! A container for results that may be absent.
//!
//! [`OptionalResult`] is what `find_first`, `reduce`, `min_by` and friends
//! return. It is never "absent itself": a value of this type is always either
//! `Present(value)` or `Absent`.

use crate::error::{Error, Result};
use crate::pipeline::Pipeline;

/// Zero or one value.
///
/// Equality and hashing are structural: `Absent == Absent` and
/// `Present(a) == Present(b)` exactly when `a == b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OptionalResult<T> {
    #[default]
    Absent,
    Present(T),
}

pub use OptionalResult::{Absent, Present};

impl<T> OptionalResult<T> {
    /// Wrap a value that is known to exist
    pub fn present(value: T) -> Self {
        Present(value)
    }

    /// The empty result
    pub fn absent() -> Self {
        Absent
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Present(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Absent)
    }

    /// Borrow the value, failing with [`Error::EmptyResult`] when absent.
    pub fn get(&self) -> Result<&T> {
        match self {
            Present(value) => Ok(value),
            Absent => Err(Error::EmptyResult),
        }
    }

    /// Take the value, failing with [`Error::EmptyResult`] when absent.
    pub fn into_value(self) -> Result<T> {
        match self {
            Present(value) => Ok(value),
            Absent => Err(Error::EmptyResult),
        }
    }

    pub fn as_ref(&self) -> OptionalResult<&T> {
        match self {
            Present(value) => Present(value),
            Absent => Absent,
        }
    }

    /// Transform a present value.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> OptionalResult<U> {
        match self {
            Present(value) => Present(f(value)),
            Absent => Absent,
        }
    }

    /// Transform a present value with a function that may itself produce
    /// nothing; a `None` result collapses to `Absent`.
    pub fn map_or_absent<U, F: FnOnce(T) -> Option<U>>(self, f: F) -> OptionalResult<U> {
        match self {
            Present(value) => f(value).into(),
            Absent => Absent,
        }
    }

    /// Chain a function that returns an `OptionalResult` without nesting.
    pub fn flat_map<U, F: FnOnce(T) -> OptionalResult<U>>(self, f: F) -> OptionalResult<U> {
        match self {
            Present(value) => f(value),
            Absent => Absent,
        }
    }

    /// Keep the value only if it matches `predicate`.
    pub fn filter<P: FnOnce(&T) -> bool>(self, predicate: P) -> Self {
        match self {
            Present(value) if predicate(&value) => Present(value),
            _ => Absent,
        }
    }

    /// The value, or `default` when absent. `default` is evaluated eagerly.
    pub fn or_else(self, default: T) -> T {
        match self {
            Present(value) => value,
            Absent => default,
        }
    }

    /// The value, or the supplier's result when absent.
    pub fn or_else_compute<F: FnOnce() -> T>(self, supplier: F) -> T {
        match self {
            Present(value) => value,
            Absent => supplier(),
        }
    }

    /// The value, or the caller-supplied error when absent.
    pub fn or_else_fail<E, F: FnOnce() -> E>(self, error: F) -> std::result::Result<T, E> {
        match self {
            Present(value) => Ok(value),
            Absent => Err(error()),
        }
    }

    /// This result if present, otherwise the supplier's result.
    pub fn or<F: FnOnce() -> OptionalResult<T>>(self, supplier: F) -> Self {
        match self {
            Present(value) => Present(value),
            Absent => supplier(),
        }
    }

    pub fn if_present<F: FnOnce(&T)>(&self, action: F) {
        if let Present(value) = self {
            action(value);
        }
    }

    pub fn if_present_or_else<F, G>(&self, action: F, otherwise: G)
    where
        F: FnOnce(&T),
        G: FnOnce(),
    {
        match self {
            Present(value) => action(value),
            Absent => otherwise(),
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Present(value) => Some(value),
            Absent => None,
        }
    }

    pub fn iter(&self) -> std::option::IntoIter<&T> {
        self.as_ref().into_option().into_iter()
    }

    /// A pipeline of zero or one element.
    pub fn into_pipeline(self) -> Pipeline<T>
    where
        T: Send + 'static,
    {
        Pipeline::of(self.into_option().into_iter().collect())
    }
}

impl<T> From<Option<T>> for OptionalResult<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Present(value),
            None => Absent,
        }
    }
}

impl<T> From<OptionalResult<T>> for Option<T> {
    fn from(value: OptionalResult<T>) -> Self {
        value.into_option()
    }
}

impl<T> IntoIterator for OptionalResult<T> {
    type Item = T;
    type IntoIter = std::option::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.into_option().into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_structural_equality() {
        assert_eq!(OptionalResult::<i32>::absent(), Absent);
        assert_eq!(Present(3), OptionalResult::present(3));
        assert_ne!(Present(3), Present(4));
        assert_ne!(Present(3), Absent);

        let set: HashSet<_> = [Present(1), Present(1), Absent, Absent].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_get_on_absent_is_empty_result() {
        let absent: OptionalResult<String> = Absent;
        assert!(matches!(absent.get(), Err(Error::EmptyResult)));
        assert!(matches!(absent.into_value(), Err(Error::EmptyResult)));
        assert_eq!(Present("x").into_value().unwrap(), "x");
    }

    #[test]
    fn test_map_and_collapse() {
        assert_eq!(Present(2).map(|x| x * 10), Present(20));
        assert_eq!(Absent.map(|x: i32| x * 10), Absent);
        assert_eq!(Present("12").map_or_absent(|s| s.parse::<i32>().ok()), Present(12));
        assert_eq!(Present("nope").map_or_absent(|s| s.parse::<i32>().ok()), Absent);
    }

    #[test]
    fn test_flat_map_and_filter() {
        let half = |x: i32| if x % 2 == 0 { Present(x / 2) } else { Absent };
        assert_eq!(Present(8).flat_map(half).flat_map(half), Present(2));
        assert_eq!(Present(6).flat_map(half).flat_map(half), Absent);
        assert_eq!(Present(5).filter(|x| *x > 3), Present(5));
        assert_eq!(Present(1).filter(|x| *x > 3), Absent);
    }

    #[test]
    fn test_fallbacks() {
        assert_eq!(Absent.or_else(9), 9);
        assert_eq!(Present(1).or_else(9), 1);

        let mut called = false;
        assert_eq!(
            Present(1).or_else_compute(|| {
                called = true;
                2
            }),
            1
        );
        assert!(!called);

        let failed: std::result::Result<i32, String> =
            Absent.or_else_fail(|| "missing".to_string());
        assert_eq!(failed.unwrap_err(), "missing");
        assert_eq!(Absent.or(|| Present(4)), Present(4));
    }

    #[test]
    fn test_if_present() {
        let mut hits = Vec::new();
        Present(7).if_present(|x| hits.push(*x));
        Absent.if_present(|x: &i32| hits.push(*x));
        assert_eq!(hits, vec![7]);

        let mut other = false;
        Absent.if_present_or_else(|_: &i32| {}, || other = true);
        assert!(other);
    }

    #[test]
    fn test_option_conversions() {
        let from_some: OptionalResult<u8> = Some(3).into();
        let from_none: OptionalResult<u8> = None.into();
        assert_eq!(from_some, Present(3));
        assert_eq!(from_none, Absent);
        assert_eq!(Option::from(Present(3)), Some(3));
        assert_eq!(Present(3).into_iter().collect::<Vec<_>>(), vec![3]);
        assert_eq!(Present(3).iter().count(), 1);
    }
}
