//! Fuzz target for the row codecs.
//!
//! Feeds arbitrary JSON objects to the credential, master key and feature
//! request decoders.
//! Rows come from an untrusted store, so decoding must never panic.
//!
//! # Usage
//!
//! ```sh
//! cargo +nightly install cargo-fuzz
//!
//! # Run from the coffre-vault crate directory:
//! cd crates/coffre-vault
//! cargo +nightly fuzz run row_decode -- -max_len=8192
//! ```

#![no_main]

use coffre_vault::{Fields, Row, RowId, UserId, Version};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(fields) = serde_json::from_slice::<Fields>(data) else {
        return;
    };
    let Ok(user_id) = UserId::new("fuzz") else {
        return;
    };
    let row = Row {
        id: RowId::new("fuzz-row"),
        user_id,
        version: Version::INITIAL,
        created_at: String::new(),
        updated_at: String::new(),
        fields,
    };
    let _ = coffre_vault::codec::decode_row(&row);
    let _ = coffre_vault::master_record::decode_row(&row);
    let _ = coffre_vault::features::decode_row(&row);
});
