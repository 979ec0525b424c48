//! Fuzz target for time-expression parsing.
//!
//! Any string must either resolve or return an error; a successful
//! `resolve_range` must be ordered.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use sniffly_view::range::{parse_time_expr, resolve_range};

#[derive(Arbitrary, Debug)]
struct ExprInput {
    from: String,
    to: String,
    base_ms: i64,
}

fuzz_target!(|input: ExprInput| {
    let _ = parse_time_expr(&input.from, input.base_ms);
    if let Ok(range) = resolve_range(&input.from, &input.to, input.base_ms) {
        assert!(range.from_ms() < range.to_ms());
    }
});
