//! Fuzz testing for request header parsing and field validation.
//!
//! Everything here runs on attacker-controlled input before a signature has
//! been checked, so none of it may panic.
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! # Install cargo-fuzz (requires nightly)
//! cargo +nightly install cargo-fuzz
//!
//! # Run the validation fuzz target
//! cargo +nightly fuzz run fuzz_validation
//!
//! # Run with a time limit (e.g., 60 seconds)
//! cargo +nightly fuzz run fuzz_validation -- -max_total_time=60
//! ```
//!
//! # What This Tests
//!
//! - `ReplayWindow::parse_timestamp` / `check_at`: `X-Timestamp` handling
//! - `decode_signature`: `X-Signature` decoding
//! - `boundary_from`: multipart content type parsing
//! - `sanitize_file_name`: staged filenames stay a single path component
//! - `validate_*`: submission field validators

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use submission_gateway::auth::{ReplayWindow, SigningKey, canonical_preamble, decode_signature};
use submission_gateway::ingest::boundary_from;
use submission_gateway::ingest::multipart::sanitize_file_name;
use submission_gateway::validation::{
    split_tags, validate_discord_id, validate_link, validate_title,
};

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    text: &'a str,
    timestamp: i64,
    now: i64,
    body: &'a [u8],
}

fuzz_target!(|input: Input<'_>| {
    let _ = ReplayWindow::parse_timestamp(Some(input.text));
    let _ = ReplayWindow::default().check_at(input.timestamp, input.now);

    // A decoded signature must never verify against an unrelated key.
    if let Ok(signature) = decode_signature(input.text) {
        if let Ok(key) = SigningKey::new(b"fuzz-secret") {
            let mut digest = key.digest(&canonical_preamble(
                "POST",
                "https://fuzz.invalid/actions",
                Some(input.text),
                input.timestamp,
            ));
            digest.update(input.body);
            let _ = digest.verify(&signature);
        }
    }

    let _ = boundary_from(Some(input.text));

    let name = sanitize_file_name(input.text);
    assert!(!name.is_empty());
    assert!(!name.contains('/') && !name.contains('\\'));
    assert!(name != "." && name != "..");

    let _ = validate_discord_id(input.text);
    let _ = validate_title(input.text);
    let _ = validate_link(input.text);
    let _ = split_tags(&[input.text.to_string()]);
});
