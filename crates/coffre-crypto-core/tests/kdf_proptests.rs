#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Property-based tests for Argon2id root key derivation.

use coffre_crypto_core::kdf::{derive, Argon2idParams};
use proptest::prelude::*;

/// Small params for fast property tests.
const PROP_PARAMS: Argon2idParams = Argon2idParams {
    m_cost: 32,
    t_cost: 1,
    p_cost: 1,
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Same passphrase + salt + params always yields the same root key.
    #[test]
    fn derive_is_deterministic(
        passphrase in proptest::collection::vec(any::<u8>(), 0..64),
        salt in proptest::collection::vec(any::<u8>(), 16..48),
    ) {
        let a = derive(&passphrase, &salt, &PROP_PARAMS).expect("derive should succeed");
        let b = derive(&passphrase, &salt, &PROP_PARAMS).expect("derive should succeed");
        prop_assert_eq!(a.expose(), b.expose());
    }

    /// Changing the work factor changes the key.
    #[test]
    fn different_params_different_keys(
        passphrase in proptest::collection::vec(any::<u8>(), 1..64),
    ) {
        let salt = b"proptest_salt_16b";
        let slower = Argon2idParams { t_cost: 2, ..PROP_PARAMS };
        let a = derive(&passphrase, salt, &PROP_PARAMS).expect("derive should succeed");
        let b = derive(&passphrase, salt, &slower).expect("derive should succeed");
        prop_assert_ne!(a.expose(), b.expose());
    }
}
