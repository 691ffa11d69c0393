//! Fixed-length lookahead of reference samples.
//!
//! Storage is a ring indexed by tick offset from the front. Advancing rotates
//! the ring and overwrites the newly exposed tail slot with a copy of the old
//! tail, so the horizon length never changes and no allocation happens per
//! tick.

use strider_core::error::ReplanError;
use strider_core::types::{FootstepPlan, ReferenceTrajectorySample, TrajectorySegment};

#[derive(Debug, Clone)]
pub struct TrajectoryBuffer {
    capacity: usize,
    slots: Vec<ReferenceTrajectorySample>,
    head: usize,
    /// Ascending offsets from the front, all in `1..capacity`.
    merge_points: Vec<usize>,
    footsteps: FootstepPlan,
}

impl TrajectoryBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Vec::with_capacity(capacity),
            head: 0,
            merge_points: Vec::new(),
            footsteps: FootstepPlan::default(),
        }
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of samples; either 0 or the capacity.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot(&self, offset: usize) -> usize {
        (self.head + offset) % self.slots.len()
    }

    /// Replace the whole buffer. Short segments are held at their last
    /// sample, long ones truncated.
    pub fn load(&mut self, segment: TrajectorySegment) -> Result<(), ReplanError> {
        let last = segment.samples.last().cloned().ok_or(ReplanError::EmptySegment)?;
        let mut samples = segment.samples;
        samples.resize(self.capacity, last);
        self.slots = samples;
        self.head = 0;
        self.merge_points = sanitize(segment.merge_points, self.capacity);
        self.footsteps = segment.footsteps;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.head = 0;
        self.merge_points.clear();
        self.footsteps = FootstepPlan::default();
    }

    pub fn front(&self) -> Option<&ReferenceTrajectorySample> {
        self.get(0)
    }

    pub fn back(&self) -> Option<&ReferenceTrajectorySample> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    pub fn get(&self, offset: usize) -> Option<&ReferenceTrajectorySample> {
        (offset < self.len()).then(|| &self.slots[self.slot(offset)])
    }

    /// Sample at `offset`, or the tail when `offset` is past it.
    pub fn get_clamped(&self, offset: usize) -> Option<&ReferenceTrajectorySample> {
        self.get(offset.min(self.len().saturating_sub(1)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferenceTrajectorySample> + '_ {
        (0..self.len()).map(move |i| &self.slots[self.slot(i)])
    }

    pub fn merge_points(&self) -> &[usize] {
        &self.merge_points
    }

    pub fn next_merge_point(&self) -> Option<usize> {
        self.merge_points.first().copied()
    }

    pub const fn footsteps(&self) -> &FootstepPlan {
        &self.footsteps
    }

    /// Drop the front sample and repeat the tail. Merge points move one tick
    /// closer; those reaching zero are discarded.
    pub fn advance(&mut self) {
        let Some(tail) = self.back().cloned() else {
            return;
        };
        let head = self.head;
        self.slots[head] = tail;
        self.head = (head + 1) % self.slots.len();
        self.merge_points.retain_mut(|m| {
            *m -= 1;
            *m > 0
        });
    }

    /// Overwrite everything from `merge_point` onward with `segment`.
    ///
    /// Entries before `merge_point` are untouched. On error the buffer is
    /// left as it was.
    pub fn splice(&mut self, merge_point: usize, segment: TrajectorySegment) -> Result<(), ReplanError> {
        if self.is_empty() {
            return Err(ReplanError::EmptyBuffer);
        }
        if merge_point >= self.len() {
            return Err(ReplanError::MergePointOutOfRange {
                merge_point,
                len: self.len(),
            });
        }
        let last = segment.samples.last().cloned().ok_or(ReplanError::EmptySegment)?;

        let mut incoming = segment.samples.into_iter();
        for offset in merge_point..self.len() {
            let slot = self.slot(offset);
            self.slots[slot] = incoming.next().unwrap_or_else(|| last.clone());
        }

        let kept = self.merge_points.iter().copied().filter(|&m| m < merge_point);
        let shifted = segment.merge_points.into_iter().map(|m| m + merge_point);
        self.merge_points = sanitize(kept.chain(shifted).collect(), self.capacity);
        self.footsteps = segment.footsteps;
        Ok(())
    }
}

fn sanitize(mut merge_points: Vec<usize>, capacity: usize) -> Vec<usize> {
    merge_points.retain(|&m| m > 0 && m < capacity);
    merge_points.sort_unstable();
    merge_points.dedup();
    merge_points
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Isometry3, Vector2};
    use strider_core::types::Twist;
    use strider_core::StepPhase;

    #[allow(clippy::cast_precision_loss)]
    fn tagged(tag: usize) -> ReferenceTrajectorySample {
        ReferenceTrajectorySample {
            left_foot_pose: Isometry3::identity(),
            right_foot_pose: Isometry3::identity(),
            left_foot_twist: Twist::zeros(),
            right_foot_twist: Twist::zeros(),
            left_in_contact: true,
            right_in_contact: true,
            is_left_fixed_frame: true,
            left_phase: StepPhase::Stance,
            right_phase: StepPhase::Stance,
            dcm_position: Vector2::new(tag as f64, 0.0),
            dcm_velocity: Vector2::zeros(),
            com_height: 0.53,
            com_height_velocity: 0.0,
        }
    }

    fn segment(range: std::ops::Range<usize>, merge_points: Vec<usize>) -> TrajectorySegment {
        TrajectorySegment {
            samples: range.map(tagged).collect(),
            merge_points,
            footsteps: FootstepPlan::default(),
        }
    }

    fn tags(buffer: &TrajectoryBuffer) -> Vec<f64> {
        buffer.iter().map(|s| s.dcm_position.x).collect()
    }

    #[test]
    fn load_pads_with_last_sample() {
        let mut b = TrajectoryBuffer::new(5);
        b.load(segment(0..3, vec![0, 2, 9])).unwrap();
        assert_eq!(tags(&b), vec![0.0, 1.0, 2.0, 2.0, 2.0]);
        assert_eq!(b.merge_points(), &[2]);
    }

    #[test]
    fn load_truncates_long_segments() {
        let mut b = TrajectoryBuffer::new(3);
        b.load(segment(0..10, vec![])).unwrap();
        assert_eq!(tags(&b), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn empty_segment_is_rejected() {
        let mut b = TrajectoryBuffer::new(3);
        assert_eq!(b.load(segment(0..0, vec![])), Err(ReplanError::EmptySegment));
        assert!(b.is_empty());
        assert!(b.front().is_none());
    }

    #[test]
    fn advance_holds_the_tail() {
        let mut b = TrajectoryBuffer::new(4);
        b.load(segment(0..4, vec![1, 3])).unwrap();
        b.advance();
        assert_eq!(tags(&b), vec![1.0, 2.0, 3.0, 3.0]);
        assert_eq!(b.merge_points(), &[2]);
        for _ in 0..10 {
            b.advance();
        }
        assert_eq!(tags(&b), vec![3.0; 4]);
        assert!(b.merge_points().is_empty());
        assert_eq!(b.len(), 4);
    }

    #[test]
    fn splice_replaces_suffix_only() {
        let mut b = TrajectoryBuffer::new(6);
        b.load(segment(0..6, vec![2, 4])).unwrap();
        b.advance();
        b.splice(2, segment(100..102, vec![3])).unwrap();
        assert_eq!(tags(&b), vec![1.0, 2.0, 100.0, 101.0, 101.0, 101.0]);
        // 1 kept from before, 3 + 2 from the new segment
        assert_eq!(b.merge_points(), &[1, 5]);
    }

    #[test]
    fn out_of_range_splice_leaves_buffer_untouched() {
        let mut b = TrajectoryBuffer::new(4);
        b.load(segment(0..4, vec![2])).unwrap();
        let err = b.splice(4, segment(10..12, vec![])).unwrap_err();
        assert_eq!(err, ReplanError::MergePointOutOfRange { merge_point: 4, len: 4 });
        assert_eq!(tags(&b), vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(b.splice(1, segment(0..0, vec![])), Err(ReplanError::EmptySegment));
        assert_eq!(tags(&b), vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn splice_on_empty_buffer_fails() {
        let mut b = TrajectoryBuffer::new(4);
        assert_eq!(b.splice(0, segment(0..2, vec![])), Err(ReplanError::EmptyBuffer));
    }

    #[test]
    fn clamped_access_returns_tail() {
        let mut b = TrajectoryBuffer::new(3);
        b.load(segment(0..3, vec![])).unwrap();
        assert_eq!(b.get_clamped(50).map(|s| s.dcm_position.x), Some(2.0));
        assert!(b.get(3).is_none());
    }
}
