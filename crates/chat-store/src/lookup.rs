//! Tri-state statement outcome.

/// Outcome of running a statement.
///
/// "No rows" and "the statement failed" are different answers: a
/// registration that cannot reach the datastore must not be reported as
/// "username taken". Failures are logged where they happen and carry no
/// payload here.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Lookup<T> {
    /// The statement succeeded and produced a result.
    Found(T),
    /// The statement succeeded and produced no rows.
    NotFound,
    /// The statement failed at the datastore.
    Failed,
}

impl<T> Lookup<T> {
    /// Whether a result was found.
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Whether the statement failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Whether the statement ran, with or without rows.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        !self.is_failed()
    }

    /// Transform the found value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Self::Found(v) => Lookup::Found(f(v)),
            Self::NotFound => Lookup::NotFound,
            Self::Failed => Lookup::Failed,
        }
    }

    /// Chain a lookup that may itself find nothing.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Lookup<U>) -> Lookup<U> {
        match self {
            Self::Found(v) => f(v),
            Self::NotFound => Lookup::NotFound,
            Self::Failed => Lookup::Failed,
        }
    }

    /// Collapse to an `Option`, losing the failure distinction.
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(v) => Some(v),
            Self::NotFound | Self::Failed => None,
        }
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::NotFound, Self::Found)
    }
}
