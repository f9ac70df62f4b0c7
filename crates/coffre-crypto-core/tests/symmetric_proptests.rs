#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Property-based tests for AES-256-GCM field encryption.

use coffre_crypto_core::symmetric::{decrypt, encrypt, seal, Nonce, SealedData, KEY_LEN};
use coffre_crypto_core::CryptoError;
use proptest::prelude::*;

const PROP_KEY: [u8; KEY_LEN] = [0xCC; KEY_LEN];

proptest! {
    /// decrypt(K, n, encrypt(K, n, P, aad), aad) == P.
    #[test]
    fn encrypt_decrypt_roundtrip(
        key in proptest::array::uniform32(any::<u8>()),
        nonce in proptest::array::uniform12(any::<u8>()),
        plaintext in proptest::collection::vec(any::<u8>(), 0..2048),
        aad in proptest::collection::vec(any::<u8>(), 0..128),
    ) {
        let sealed = encrypt(&key, &Nonce::from_bytes(nonce), &plaintext, &aad)
            .expect("encrypt should succeed");
        let opened = decrypt(&key, &sealed, &aad).expect("decrypt should succeed");
        prop_assert_eq!(opened.expose(), plaintext.as_slice());
    }

    /// Flipping any single bit of the stored form is detected, never decrypted.
    #[test]
    fn any_single_bit_flip_is_detected(
        plaintext in proptest::collection::vec(any::<u8>(), 0..256),
        bit_seed in any::<usize>(),
    ) {
        let sealed = seal(&PROP_KEY, &plaintext, b"aad").expect("seal should succeed");
        let mut wire = sealed.to_bytes();
        let bit = bit_seed % (wire.len() * 8);
        wire[bit / 8] ^= 1 << (bit % 8);

        let tampered = SealedData::from_bytes(&wire).expect("layout unchanged");
        let result = decrypt(&PROP_KEY, &tampered, b"aad");
        prop_assert!(matches!(result, Err(CryptoError::TamperDetected)));
    }

    /// Sealing the same plaintext twice never yields the same bytes.
    #[test]
    fn fresh_nonce_per_seal(plaintext in proptest::collection::vec(any::<u8>(), 0..256)) {
        let a = seal(&PROP_KEY, &plaintext, &[]).expect("seal should succeed");
        let b = seal(&PROP_KEY, &plaintext, &[]).expect("seal should succeed");
        prop_assert_ne!(a.nonce, b.nonce);
        prop_assert_ne!(a.to_bytes(), b.to_bytes());
    }
}
