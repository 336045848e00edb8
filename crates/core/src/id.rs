//! Strongly-typed identifiers used across the domain.
//!
//! Each domain crate declares its own identifiers with [`define_id!`]; they are
//! UUIDv7 newtypes so that ids sort roughly by creation time.

/// Declare a UUID-backed identifier newtype.
///
/// ```ignore
/// larder_core::define_id!(IngredientId, "IngredientId");
/// ```
#[macro_export]
macro_rules! define_id {
    ($(#[$meta:meta])* $t:ident, $name:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $t($crate::uuid::Uuid);

        impl $t {
            /// Create a new identifier (UUIDv7, time-ordered).
            pub fn new() -> Self {
                Self($crate::uuid::Uuid::now_v7())
            }

            pub fn from_uuid(uuid: $crate::uuid::Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &$crate::uuid::Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<$crate::uuid::Uuid> for $t {
            fn from(value: $crate::uuid::Uuid) -> Self {
                Self(value)
            }
        }

        impl core::str::FromStr for $t {
            type Err = $crate::DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = $crate::uuid::Uuid::parse_str(s).map_err(|e| {
                    $crate::DomainError::validation(format!("{}: {}", $name, e))
                })?;
                Ok(Self(uuid))
            }
        }
    };
}
