// src/engine/median.rs
//
// Which frame to sample: the median frame of a coalesced animation, or the
// frame on screen at half the duration of time-based media.

/// Index of the median frame (`frame_count / 2`), `None` when there are no frames.
///
/// The sequence must be coalesced: sampling a delta frame gives meaningless
/// intensities.
pub fn median_frame_index(frame_count: usize) -> Option<usize> {
    (frame_count > 0).then_some(frame_count / 2)
}

/// Timing of one decoded frame, all values in the same time base.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimedFrame {
    pub pts: i64,
    pub duration: i64,
    pub keyframe: bool,
}

impl TimedFrame {
    pub fn covers(&self, timestamp: i64) -> bool {
        timestamp >= self.pts && timestamp < self.pts.saturating_add(self.duration)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MedianPick {
    /// Keyframe to seek to before decoding forward.
    pub seek_index: usize,
    /// Frame to sample.
    pub frame_index: usize,
    /// Half of the total duration.
    pub target: i64,
}

/// Pick the frame displayed at `total_duration / 2`.
///
/// Seeks to the last keyframe at or before the target (the first frame when
/// none qualifies), then walks forward to the first frame whose display
/// interval covers the target. When no interval covers it (gaps, short
/// streams) the last frame starting at or before the target is used.
/// `frames` must be in presentation order.
pub fn select_median_time(frames: &[TimedFrame], total_duration: i64) -> Option<MedianPick> {
    if frames.is_empty() || total_duration <= 0 {
        return None;
    }
    let target = total_duration / 2;

    let seek_index = frames
        .iter()
        .rposition(|f| f.keyframe && f.pts <= target)
        .unwrap_or(0);

    let forward = &frames[seek_index..];
    let frame_index = forward
        .iter()
        .position(|f| f.covers(target))
        .or_else(|| forward.iter().rposition(|f| f.pts <= target))
        .map(|i| seek_index + i)?;

    Some(MedianPick {
        seek_index,
        frame_index,
        target,
    })
}
