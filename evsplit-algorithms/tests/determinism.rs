#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::unreadable_literal
)]
use evsplit_algorithms::{filter_events, FilterConfig, FilterResult, PartitionStrategy};
use evsplit_core::{
    Event, EventList, EventWorkspace, RunMetadata, SplitterSource, Timestamp,
};

const PULSE_NS: i64 = 16_666_667;

fn synthetic_workspace(spectra: i32, events_per_spectrum: usize) -> EventWorkspace {
    let mut rng_seed: u64 = 12345;
    let mut rand = || {
        rng_seed = (rng_seed.wrapping_mul(1103515245).wrapping_add(12345)) & 0x7fffffff;
        rng_seed
    };

    let mut ws = EventWorkspace::new(RunMetadata::default());
    for spec in 0..spectra {
        let events = (0..events_per_spectrum)
            .map(|_| {
                let pulse = (rand() % 600) as i64 * PULSE_NS;
                let tof = (rand() % 16_000) as f64;
                Event::new(spec, Timestamp(pulse), tof)
            })
            .collect();
        ws = ws.with_spectrum(EventList::new(spec, vec![spec]).with_events(events));
    }
    ws
}

/// Alternating destinations every half pulse, over 600 pulses.
fn per_pulse_matrix() -> SplitterSource {
    let boundaries: Vec<Timestamp> = (0..=1200).map(|i| Timestamp(i * PULSE_NS / 2)).collect();
    let groups = (0..1200).map(|i| i % 3).collect();
    SplitterSource::Matrix { boundaries, groups }
}

fn run(config: FilterConfig) -> FilterResult {
    filter_events(synthetic_workspace(16, 2_000), &per_pulse_matrix(), config)
        .unwrap()
        .completed()
        .unwrap()
}

#[test]
fn test_parallel_matches_sequential() {
    let sequential = run(FilterConfig::new().with_parallel(false));
    let parallel = run(FilterConfig::new().with_parallel(true));
    assert_eq!(sequential.summary, parallel.summary);
    assert_eq!(sequential.outputs, parallel.outputs);
    assert!(parallel.summary.is_complete());
}

#[test]
fn test_strategies_agree_with_stable_order() {
    let search = run(FilterConfig::new().with_strategy(PartitionStrategy::BinarySearch));
    let sweep = run(FilterConfig::new().with_strategy(PartitionStrategy::Sweep));
    assert_eq!(search.outputs, sweep.outputs);
}

#[test]
fn test_unstable_order_gives_same_sets() {
    let stable = run(FilterConfig::new().with_strategy(PartitionStrategy::Sweep));
    let unstable = run(
        FilterConfig::new()
            .with_strategy(PartitionStrategy::Sweep)
            .with_stable_order(false),
    );
    assert_eq!(stable.summary, unstable.summary);

    for (a, b) in stable
        .outputs
        .members()
        .iter()
        .zip(unstable.outputs.members())
    {
        for (sa, sb) in a.workspace.spectra.iter().zip(&b.workspace.spectra) {
            let key = |e: &Event| (e.pulse_time, e.tof.to_bits());
            let mut ea: Vec<_> = sa.events.iter().map(key).collect();
            let mut eb: Vec<_> = sb.events.iter().map(key).collect();
            ea.sort_unstable();
            eb.sort_unstable();
            assert_eq!(ea, eb);

            let times: Vec<_> = sb.events.iter().map(|e| e.full_time(1.0, 0.0)).collect();
            assert!(times.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
