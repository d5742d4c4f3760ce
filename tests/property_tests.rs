use std::time::Duration;

use keyrhythm::keyboard::{classify, KeyCode, Region, TempoSample, TempoTracker};
use keyrhythm::mapping::{DeviceRequest, MapperSettings, PatternMapper};
use proptest::prelude::*;
use tokio::time::Instant;

fn arb_region() -> impl Strategy<Value = Region> {
    prop_oneof![
        Just(Region::Left),
        Just(Region::Right),
        Just(Region::Both),
        Just(Region::None),
    ]
}

fn arb_interval() -> impl Strategy<Value = Option<Duration>> {
    prop::option::of((0u64..5_000).prop_map(Duration::from_millis))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn classification_is_total_and_stable(usage in any::<u16>()) {
        let key = KeyCode(usage);
        let region = classify(key);
        prop_assert_eq!(region, classify(key));
        prop_assert_eq!(region, key.region());
        if !key.is_keyboard_usage() {
            prop_assert_eq!(region, Region::None);
        }
        if region == Region::Both {
            prop_assert_eq!(key, KeyCode::SPACE);
        }
    }

    #[test]
    fn mapped_intervals_stay_within_limits(
        presses in prop::collection::vec((arb_region(), arb_interval()), 1..60)
    ) {
        let settings = MapperSettings::default();
        let mut mapper = PatternMapper::new(settings.clone());

        for (region, interval) in presses {
            let before = mapper.state().clone();
            match mapper.map(region, interval) {
                Some(command) => {
                    prop_assert!(region != Region::None);
                    prop_assert!(command.request != DeviceRequest::NoOp);
                    prop_assert!(command.interval >= settings.min_interval());
                    prop_assert!(command.interval <= settings.max_interval());
                }
                None => {
                    prop_assert_eq!(region, Region::None);
                    prop_assert_eq!(mapper.state(), &before);
                }
            }
            prop_assert!(
                mapper.state().recent_intervals.len() <= settings.trigger_count as usize
            );
        }
    }

    #[test]
    fn intervals_never_include_bounces(
        gaps in prop::collection::vec(0u64..3_000, 1..80)
    ) {
        let mut tracker = TempoTracker::default();
        let bounce = tracker.settings().bounce_threshold();
        let idle = tracker.settings().idle_reset();
        let mut now = Instant::now();
        prop_assert_eq!(tracker.observe(now), TempoSample::First);

        for gap in gaps {
            now += Duration::from_millis(gap);
            if let TempoSample::Interval(interval) = tracker.observe(now) {
                prop_assert!(interval >= bounce);
                prop_assert!(interval < idle);
            }
        }
    }
}
