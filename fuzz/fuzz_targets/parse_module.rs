#![no_main]

use libfuzzer_sys::fuzz_target;

use was::parser;

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    // Malformed text must produce an error, never a panic
    let _ = parser::parse(source);
});
