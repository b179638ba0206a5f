//! Fuzz target: decoding an error body into `TypedError`.
//!
//! Arbitrary bytes must never panic the decoder, and anything that decodes
//! must encode again with a status the dispatcher can send.

#![no_main]

use libfuzzer_sys::fuzz_target;
use switchyard_core::TypedError;

fuzz_target!(|data: &[u8]| {
    let Ok(err) = serde_json::from_slice::<TypedError>(data) else {
        return;
    };
    let status = err.status();
    assert!((100..=999).contains(&status), "status {status} out of range");
    assert!(serde_json::to_vec(&err).is_ok(), "decoded errors must encode");
});
