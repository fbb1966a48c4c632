//! Macro for node-issued key types.

/// Macro to define a node-issued opaque key.
///
/// The node owns the format of these identifiers and builds some of them
/// from user input (case ids embed the case name verbatim), so the
/// generated newtype keeps the raw string and only rejects empty values.
///
/// # Example
///
/// ```ignore
/// define_key!(CaseId, "case id");
///
/// let case_id = CaseId::new("Merger_1718000000000")?;
/// assert_eq!(case_id.as_str(), "Merger_1718000000000");
/// ```
#[macro_export]
macro_rules! define_key {
    ($name:ident, $kind:literal) => {
        /// A typed, node-issued identifier.
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(String);

        impl $name {
            /// Human readable name of this key type, used in errors.
            pub const KIND: &'static str = $kind;

            /// Wraps a raw key, rejecting only the empty string.
            pub fn new(raw: impl Into<String>) -> Result<Self, $crate::IdError> {
                let raw = raw.into();
                if raw.is_empty() {
                    return Err($crate::IdError::EmptyKey(Self::KIND));
                }
                Ok(Self(raw))
            }

            /// Returns the key as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the key, returning the raw string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Self::new(s).map_err(serde::de::Error::custom)
            }
        }
    };
}
