//! Fuzz target: path normalization and route registration.
//!
//! Normalization must be idempotent, and registering any pair of patterns must
//! never panic: a malformed or overlapping route can only ever be reported.

#![no_main]

use libfuzzer_sys::fuzz_target;
use switchyard_core::Failure;
use switchyard_server::{
    route::{normalize_path, validate_pattern},
    Route, Server, ServerConfig,
};

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let (first, second) = input.split_once('\n').unwrap_or((input, ""));

    let once = normalize_path(first);
    assert_eq!(normalize_path(&once), once, "normalization must be idempotent");
    assert!(once.starts_with('/') && !once.starts_with("//"));
    let _ = validate_pattern(&once);

    let server = Server::new("fuzz", ServerConfig::default()).add_routes([
        Route::get(first, |_req, _reply| async { Ok::<_, Failure>(()) }),
        Route::get(second, |_req, _reply| async { Ok::<_, Failure>(()) }),
        Route::post(second, |_req, _reply| async { Ok::<_, Failure>(()) }),
    ]);
    assert!(server.routes().len() <= 3);
});
