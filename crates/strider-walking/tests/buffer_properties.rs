//! Property-based tests for the trajectory buffer:
//! - merge points count down by exactly one per advance and vanish at zero
//! - splicing at a merge point leaves every earlier sample untouched

use proptest::prelude::*;
use strider_core::types::{FootstepPlan, ReferenceTrajectorySample, TrajectorySegment};
use strider_test_utils::{straight_walk, WalkParams};
use strider_walking::TrajectoryBuffer;

fn samples() -> Vec<ReferenceTrajectorySample> {
    straight_walk(&WalkParams::default()).samples
}

fn segment(samples: &[ReferenceTrajectorySample], merge_points: Vec<usize>) -> TrajectorySegment {
    TrajectorySegment {
        samples: samples.to_vec(),
        merge_points,
        footsteps: FootstepPlan::default(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_merge_points_count_down(
        capacity in 10usize..120,
        merge_points in prop::collection::vec(0usize..150, 0..8),
        ticks in 0usize..200,
    ) {
        let all = samples();
        let mut buffer = TrajectoryBuffer::new(capacity);
        buffer.load(segment(&all[..capacity], merge_points)).unwrap();

        for _ in 0..ticks {
            let before = buffer.merge_points().to_vec();
            prop_assert!(before.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(before.iter().all(|&m| m > 0 && m < capacity));

            buffer.advance();
            let expected: Vec<usize> = before.iter().map(|m| m - 1).filter(|&m| m > 0).collect();
            prop_assert_eq!(buffer.merge_points(), expected.as_slice());
            prop_assert_eq!(buffer.len(), capacity);
        }
    }

    #[test]
    fn prop_splice_preserves_prefix(
        capacity in 10usize..120,
        advance in 0usize..50,
        merge_point in 1usize..120,
        offset in 0usize..100,
        len in 1usize..140,
    ) {
        prop_assume!(merge_point < capacity);
        let all = samples();
        let mut buffer = TrajectoryBuffer::new(capacity);
        buffer.load(segment(&all[..capacity], vec![])).unwrap();
        for _ in 0..advance {
            buffer.advance();
        }

        let before: Vec<ReferenceTrajectorySample> = buffer.iter().cloned().collect();
        let start = offset.min(all.len() - 1);
        let end = (start + len).min(all.len());
        buffer.splice(merge_point, segment(&all[start..end], vec![])).unwrap();

        let after: Vec<ReferenceTrajectorySample> = buffer.iter().cloned().collect();
        prop_assert_eq!(after.len(), capacity);
        prop_assert_eq!(&after[..merge_point], &before[..merge_point]);
        prop_assert_eq!(&after[merge_point], &all[start]);
        let spliced = end - start;
        if spliced < capacity - merge_point {
            // a short segment is held at its last sample
            prop_assert!(after[merge_point + spliced..].iter().all(|s| s == &all[end - 1]));
        }
    }

    #[test]
    fn prop_rejected_splice_leaves_buffer_untouched(
        capacity in 2usize..60,
        merge_point in 0usize..200,
    ) {
        prop_assume!(merge_point >= capacity);
        let all = samples();
        let mut buffer = TrajectoryBuffer::new(capacity);
        buffer.load(segment(&all[..capacity], vec![1])).unwrap();
        let before: Vec<ReferenceTrajectorySample> = buffer.iter().cloned().collect();

        prop_assert!(buffer.splice(merge_point, segment(&all[..3], vec![])).is_err());
        let after: Vec<ReferenceTrajectorySample> = buffer.iter().cloned().collect();
        prop_assert_eq!(after, before);
        prop_assert_eq!(buffer.merge_points(), &[1][..]);
    }
}
