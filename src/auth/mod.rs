//! Authentication: a cached password validator and the Basic-auth middleware
//! that puts it in front of the API.

pub mod middleware;
pub mod password;

pub use middleware::{authenticate, basic_password, PasswordState};
pub use password::{
    hash_password, ClusterHashSource, HashSource, PasswordValidator, StoredHash, DEFAULT_HASH_TTL,
};
