use core::{fmt, num::NonZeroI64};

/// A nonzero 64-bit entity identifier.
///
/// Identifiers are opaque: they are not guaranteed to be sequential,
/// contiguous or time-ordered once more than one allocation strategy is
/// involved. The only structural guarantee is that an `Id` is never zero,
/// which the [`NonZeroI64`] representation enforces at the type level.
///
/// # Example
///
/// ```
/// use idalloc::Id;
///
/// let id = Id::new(42).unwrap();
/// assert_eq!(id.get(), 42);
/// assert_eq!(id.to_string(), "42");
///
/// assert!(Id::new(0).is_none());
/// assert!(Id::try_from(0_i64).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
#[repr(transparent)]
pub struct Id(NonZeroI64);

impl Id {
    /// Wraps `raw`, returning `None` when it is zero.
    #[must_use]
    pub const fn new(raw: i64) -> Option<Self> {
        match NonZeroI64::new(raw) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    /// Returns the raw integer value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0.get()
    }

    /// Returns the value as a [`NonZeroI64`].
    #[must_use]
    pub const fn as_non_zero(self) -> NonZeroI64 {
        self.0
    }
}

impl From<NonZeroI64> for Id {
    fn from(raw: NonZeroI64) -> Self {
        Self(raw)
    }
}

impl From<Id> for i64 {
    fn from(id: Id) -> Self {
        id.get()
    }
}

impl From<Id> for NonZeroI64 {
    fn from(id: Id) -> Self {
        id.0
    }
}

impl TryFrom<i64> for Id {
    type Error = ZeroIdError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        Self::new(raw).ok_or(ZeroIdError)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Returned when converting a zero integer into an [`Id`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("identifiers cannot be zero")]
pub struct ZeroIdError;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_rejected() {
        assert_eq!(Id::new(0), None);
        assert_eq!(Id::try_from(0_i64), Err(ZeroIdError));
    }

    #[test]
    fn negative_values_are_valid_ids() {
        let id = Id::try_from(-7_i64).unwrap();
        assert_eq!(id.get(), -7);
        assert_eq!(i64::from(id), -7);
    }

    #[test]
    fn display_matches_raw_integer() {
        let id = Id::new(i64::MAX).unwrap();
        assert_eq!(id.to_string(), i64::MAX.to_string());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_is_a_plain_integer() {
        let id = Id::new(1234).unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "1234");
        assert_eq!(serde_json::from_str::<Id>("1234").unwrap(), id);
        assert!(serde_json::from_str::<Id>("0").is_err());
    }
}
