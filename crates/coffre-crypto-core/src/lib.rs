//! `coffre-crypto-core`: client-side cryptographic core for coffre.
//!
//! This crate is the audit target: zero I/O, zero logging, zero async.
//! Everything the storage backend ever sees has passed through here first.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;
pub mod memory;

pub mod kdf;
pub mod symmetric;

pub mod master_key;

pub use error::CryptoError;
pub use kdf::{derive, generate_salt, Argon2idParams, KdfPreset, RootKey, ROOT_KEY_LEN, SALT_LEN};
pub use master_key::{rewrap, unwrap, wrap, MasterKey, WrappedKey, MASTER_KEY_LEN};
pub use memory::{LockedRegion, SecretBuffer, SecretBytes};
pub use symmetric::{decrypt, encrypt, seal, Nonce, SealedData};
