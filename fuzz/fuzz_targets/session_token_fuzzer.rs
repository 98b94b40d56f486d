//! Fuzz target for [`SessionCodec::verify`]
//!
//! Prevent authentication bypass via crafted session cookies
//!
//! # Strategy
//!
//! - Raw input: arbitrary text handed straight to `verify`
//! - Splicing: a genuine token with one segment replaced by fuzzer bytes
//! - Bit flips: a genuine token with a single character changed
//!
//! # Invariants
//!
//! - NEVER panic on any input
//! - A token that verifies MUST carry exactly the participant it was issued
//!   for (no forged identities)
//! - Any modified genuine token MUST be rejected

#![no_main]

use arbitrary::Arbitrary;
use d20_core::{Participant, SessionCodec, SessionKey};
use d20_harness::SimEnv;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Input {
    Raw(String),
    Splice { segment: u8, replacement: String },
    Flip { index: usize, replacement: char },
}

fuzz_target!(|input: Input| {
    let env = SimEnv::with_seed(0);
    let key = SessionKey::from_bytes([42u8; 32]);
    let codec = SessionCodec::new(&key, env);

    let issued = Participant::player("Ana", "Data", "10.1.2.x");
    let Ok(genuine) = codec.issue(&issued) else {
        return;
    };

    let candidate = match input {
        Input::Raw(text) => text,
        Input::Splice { segment, replacement } => {
            let mut parts: Vec<&str> = genuine.split("||").collect();
            let slot = usize::from(segment) % parts.len();
            parts[slot] = &replacement;
            parts.join("||")
        },
        Input::Flip { index, replacement } => {
            let mut chars: Vec<char> = genuine.chars().collect();
            let slot = index % chars.len();
            chars[slot] = replacement;
            chars.into_iter().collect()
        },
    };

    match codec.verify(&candidate) {
        Ok(participant) => {
            assert_eq!(candidate, genuine, "modified token accepted");
            assert_eq!(participant, issued);
        },
        Err(_) => assert_ne!(candidate, genuine, "genuine token rejected"),
    }
});
