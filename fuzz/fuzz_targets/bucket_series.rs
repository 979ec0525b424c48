//! Fuzz target for the series builder and gap filler.
//!
//! Checks the point budgets and that every emitted series sums to its raw
//! total, for arbitrary (bounded) timestamps and counts.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use sniffly_view::analytics::{Bucket, BucketSeriesBuilder, GapFiller, SeriesBudget};

#[derive(Arbitrary, Debug)]
struct SeriesInput {
    samples: Vec<(u32, u8, u16)>,
    top_n: u8,
    max_timeline_points: u16,
    max_total_points: u16,
    preferred: Vec<u8>,
}

fuzz_target!(|input: SeriesInput| {
    let budget = SeriesBudget {
        max_timeline_points: usize::from(input.max_timeline_points).max(2),
        max_total_points: usize::from(input.max_total_points).max(2),
    };
    let buckets: Vec<Bucket> = input
        .samples
        .iter()
        .map(|(ts, key, v)| Bucket::from_pairs(i64::from(*ts), [(format!("k{}", key % 32), f64::from(*v))]))
        .collect();

    let series = BucketSeriesBuilder::new()
        .top_n(usize::from(input.top_n % 40))
        .preferred_keys(input.preferred.iter().map(|k| format!("k{}", k % 32)))
        .budget(budget)
        .build(&buckets);
    for s in &series {
        assert!(s.len() <= budget.max_timeline_points);
        let raw: f64 = buckets.iter().filter_map(|b| b.counts.get(&s.name)).sum();
        assert_eq!(raw, s.total());
    }

    let points: Vec<(i64, f64)> = input
        .samples
        .iter()
        .map(|(ts, _, v)| (i64::from(*ts), f64::from(*v)))
        .collect();
    let filled = GapFiller::new(budget).fill(&points);
    let raw: f64 = points.iter().map(|(_, v)| v).sum();
    let out: f64 = filled.iter().map(|(_, v)| v).sum();
    assert_eq!(raw, out);
});
