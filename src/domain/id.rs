//! Domain ID Types with NewType Pattern
//!
//! Type-safe wrappers for identifiers so a secret id can never be passed
//! where a cluster id is expected.

use serde::{Deserialize, Serialize};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef};
use sqlx::{Decode, Encode, Postgres, Type};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Macro to generate NewType ID wrappers with all required traits
macro_rules! domain_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Mint a fresh random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Wrap an existing string (for database retrieval)
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }

            /// Parse and validate a UUID string
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(s)?;
                Ok(Self(s.to_string()))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl Type<Postgres> for $name {
            fn type_info() -> PgTypeInfo {
                <String as Type<Postgres>>::type_info()
            }

            fn compatible(ty: &PgTypeInfo) -> bool {
                <String as Type<Postgres>>::compatible(ty)
            }
        }

        impl<'q> Encode<'q, Postgres> for $name {
            fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
                <String as Encode<'q, Postgres>>::encode_by_ref(&self.0, buf)
            }
        }

        impl<'r> Decode<'r, Postgres> for $name {
            fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
                Ok(Self(<String as Decode<'r, Postgres>>::decode(value)?))
            }
        }
    };
}

domain_id!(
    /// Unique identifier for a registered remote cluster
    ClusterId
);

domain_id!(
    /// Unique identifier for a credential resource
    CredentialId
);

domain_id!(
    /// Opaque identifier of a secret vault entry
    SecretId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_id_creation() {
        let id = ClusterId::new();
        assert!(Uuid::parse_str(id.as_str()).is_ok());
    }

    #[test]
    fn secret_ids_are_never_reused() {
        assert_ne!(SecretId::new(), SecretId::new());
    }

    #[test]
    fn credential_id_from_str() {
        let uuid_str = Uuid::new_v4().to_string();
        let id: CredentialId = uuid_str.parse().expect("Failed to parse UUID");
        assert_eq!(id.as_str(), uuid_str);
        assert!(CredentialId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn secret_id_serializes_as_string() {
        let id = SecretId::from_string("abc".to_string());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
        let back: SecretId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(back, id);
    }
}
