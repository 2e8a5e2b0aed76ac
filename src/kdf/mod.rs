//! Keyed hashing and key derivation
//!
//! [`Hmac`] and [`pbkdf2_with`] work over any [`Hasher`](crate::hash::Hasher);
//! [`argon2`] drives the block-mixing primitive module directly.

pub mod argon2;
mod hmac;
mod pbkdf2;

pub use self::argon2::{
    argon2_verify, argon2d, argon2i, argon2id, Argon2Engine, Argon2Options, Argon2Output,
    Argon2Request, Argon2Variant, EncodedHash, OutputType,
};
pub use self::hmac::{create_hmac, hmac, Hmac};
pub use self::pbkdf2::{pbkdf2, pbkdf2_bytes, pbkdf2_with};
