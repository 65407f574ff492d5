// tests/ring_properties.rs
//! Property tests for the ring cursor's group-granularity guarantees

use daq_hal::acquisition::{RingCursor, ScanBuffer};
use proptest::prelude::*;

proptest! {
    /// The reported index always lands on a group boundary inside the ring,
    /// no matter how the incoming samples are sliced
    #[test]
    fn prop_index_always_on_group_boundary(
        samples_per_channel in 1usize..64,
        num_channels in 1usize..8,
        chunk_sizes in prop::collection::vec(1usize..40, 1..40),
    ) {
        let buffer = ScanBuffer::new(samples_per_channel * num_channels);
        let mut cursor = RingCursor::new(samples_per_channel, num_channels, true);

        let mut sample = 0u64;
        for chunk in chunk_sizes {
            let data: Vec<f64> = (0..chunk).map(|i| (sample + i as u64) as f64).collect();
            sample += chunk as u64;
            cursor.push_samples(&buffer, &data);

            let index = cursor.current_index();
            prop_assert!(index >= -1);
            if index >= 0 {
                prop_assert_eq!(index as usize % num_channels, 0);
                prop_assert!((index as usize) < samples_per_channel * num_channels);
            }
        }
    }

    /// Written-sample accounting is exact across arbitrary slicing
    #[test]
    fn prop_counts_are_group_multiples(
        samples_per_channel in 1usize..64,
        num_channels in 1usize..8,
        total in 0usize..500,
    ) {
        let buffer = ScanBuffer::new(samples_per_channel * num_channels);
        let mut cursor = RingCursor::new(samples_per_channel, num_channels, true);

        let data: Vec<f64> = (0..total).map(|i| i as f64).collect();
        cursor.push_samples(&buffer, &data);

        prop_assert_eq!(cursor.groups_written(), (total / num_channels) as u64);
        prop_assert_eq!(
            cursor.samples_written(),
            (total / num_channels * num_channels) as u64
        );
    }

    /// Finite cursors never write past the requested sample count
    #[test]
    fn prop_finite_cursor_bounded(
        samples_per_channel in 1usize..32,
        num_channels in 1usize..4,
        extra in 0usize..200,
    ) {
        let buffer = ScanBuffer::new(samples_per_channel * num_channels);
        let mut cursor = RingCursor::new(samples_per_channel, num_channels, false);

        let total = samples_per_channel * num_channels + extra;
        let data: Vec<f64> = (0..total).map(|i| i as f64).collect();
        cursor.push_samples(&buffer, &data);

        prop_assert_eq!(cursor.groups_written(), samples_per_channel as u64);
        prop_assert_eq!(cursor.remaining_groups(), 0);
    }
}
