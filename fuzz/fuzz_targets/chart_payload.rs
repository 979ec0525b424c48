//! Fuzz target for chart payload decoding and normalization.
//!
//! Arbitrary JSON must either fail to decode or yield views without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;

use sniffly_view::analytics::{SeriesBudget, chart_views};
use sniffly_view::model::types::ChartsBundle;

fuzz_target!(|data: &[u8]| {
    let Ok(bundle) = serde_json::from_slice::<ChartsBundle>(data) else {
        return;
    };
    let mac = bundle
        .traffic
        .first()
        .map(|i| i.device.mac.clone())
        .unwrap_or_default();
    let _ = chart_views(&bundle.scoped_to(0, i64::from(u32::MAX)), &mac, SeriesBudget::default());
});
