use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Wrapper for secrets (passwords, bearer tokens) that must never reach the logs.
///
/// `Debug` and `Display` print a fixed mask. Serialization also masks, so a
/// `Masked` field accidentally placed in a response body leaks nothing. Use
/// [`Masked::expose`] at the single point where the real value is needed.
#[derive(Clone, PartialEq, Eq)]
pub struct Masked<T>(T);

const MASK: &str = "********";

impl<T> Masked<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

impl<T> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

impl<T> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(MASK)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Masked<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Masked)
    }
}

impl From<String> for Masked<String> {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Masked<String> {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_and_display_are_masked() {
        let secret = Masked::new("adminpassword123".to_string());
        assert_eq!(format!("{:?}", secret), MASK);
        assert_eq!(format!("{}", secret), MASK);
        assert_eq!(secret.expose(), "adminpassword123");
    }

    #[test]
    fn test_deserialize_keeps_value_serialize_masks() {
        let secret: Masked<String> = serde_json::from_str("\"hunter2\"").unwrap();
        assert_eq!(secret.expose(), "hunter2");
        assert_eq!(serde_json::to_string(&secret).unwrap(), "\"********\"");
    }
}
