//! TagAddress - Cheap-to-clone controller tag identifier
//!
//! Uses Arc<str> internally for O(1) clone operations.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// Controller tag address with cheap cloning.
///
/// Addresses are loaded once at startup and then cloned into every reading
/// of every cycle, so cloning only bumps a reference count.
///
/// # Examples
/// ```
/// use contracts::TagAddress;
///
/// let tag: TagAddress = "Program:Main.Speed".into();
/// let tag2 = tag.clone();
/// assert_eq!(tag, tag2);
/// assert_eq!(tag.as_str(), "Program:Main.Speed");
/// ```
#[derive(Clone, Default)]
pub struct TagAddress(Arc<str>);

impl TagAddress {
    /// Create a new TagAddress from a string slice.
    #[inline]
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    /// Get the underlying string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split the address at its first `.` into (measurement, field).
    ///
    /// `"Motor1.Speed"` becomes `("Motor1", Some("Speed"))`, an address without
    /// a dot yields `(address, None)`.
    pub fn split_member(&self) -> (&str, Option<&str>) {
        match self.0.split_once('.') {
            Some((head, tail)) if !head.is_empty() && !tail.is_empty() => (head, Some(tail)),
            _ => (&self.0, None),
        }
    }
}

impl Deref for TagAddress {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for TagAddress {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TagAddress {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TagAddress {
    #[inline]
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for TagAddress {
    #[inline]
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Display for TagAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TagAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TagAddress({:?})", self.0)
    }
}

impl PartialEq for TagAddress {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        // Fast path: same Arc pointer
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for TagAddress {}

impl PartialEq<str> for TagAddress {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for TagAddress {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

// Hash - same as str hash for HashMap<TagAddress, _>::get(&str)
impl Hash for TagAddress {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl Serialize for TagAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TagAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s))
    }
}
