//! Debouncing of vision frames

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;
use serde::Serialize;

use comms_if::eqpt::vision::VisionFrame;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Passes on vision frames only once the target has been seen for several consecutive frames.
///
/// A single frame with a tag in view is often a misdetection, requiring a run of visible frames
/// removes most of them. Frames which are not newer than the last forwarded frame are never
/// passed on, so polling the same frame twice is harmless.
#[derive(Debug, Clone)]
pub struct VisionFilter {
    min_consecutive_frames: u32,
    consecutive_frames: u32,
    last_time_s: Option<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The result of filtering one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum FilterOutcome {
    /// No frame has been received.
    NoFrame,

    /// The frame has no target in view or no pose solution.
    NotVisible,

    /// The target is visible but has not been seen for enough consecutive frames.
    Debouncing,

    /// The frame is not newer than the last frame seen.
    NotNewer,

    /// The frame should be fused.
    Forward(VisionFrame),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl VisionFilter {
    pub fn new(min_consecutive_frames: u32) -> Self {
        Self {
            min_consecutive_frames,
            consecutive_frames: 0,
            last_time_s: None,
        }
    }

    /// Number of consecutive visible frames seen so far.
    pub fn consecutive_frames(&self) -> u32 {
        self.consecutive_frames
    }

    /// Filter the latest frame, should be called once per cycle.
    pub fn filter(&mut self, frame: Option<&VisionFrame>) -> FilterOutcome {
        let frame = match frame {
            Some(f) => f,
            None => {
                self.consecutive_frames = 0;
                return FilterOutcome::NoFrame;
            }
        };

        if frame.solution().is_none() {
            self.consecutive_frames = 0;
            return FilterOutcome::NotVisible;
        }

        self.consecutive_frames = self.consecutive_frames.saturating_add(1);

        let newer = match self.last_time_s {
            Some(t) => frame.capture_time_s > t,
            None => true,
        };
        if newer {
            self.last_time_s = Some(frame.capture_time_s);
        }

        let outcome = if !newer {
            FilterOutcome::NotNewer
        } else if self.consecutive_frames < self.min_consecutive_frames {
            FilterOutcome::Debouncing
        } else {
            FilterOutcome::Forward(*frame)
        };

        trace!(
            "Vision frame at {} s ({} consecutive): {:?}",
            frame.capture_time_s,
            self.consecutive_frames,
            outcome
        );

        outcome
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn visible(t: f64) -> VisionFrame {
        VisionFrame {
            botpose: Some([0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            capture_time_s: t,
            visible: true,
        }
    }

    #[test]
    fn test_debounce() {
        let mut filter = VisionFilter::new(2);

        assert_eq!(filter.filter(Some(&visible(1.0))), FilterOutcome::Debouncing);
        assert_eq!(
            filter.filter(Some(&visible(2.0))),
            FilterOutcome::Forward(visible(2.0))
        );
        assert_eq!(
            filter.filter(Some(&visible(3.0))),
            FilterOutcome::Forward(visible(3.0))
        );

        // Losing the target restarts the count
        assert_eq!(
            filter.filter(Some(&VisionFrame::not_visible(4.0))),
            FilterOutcome::NotVisible
        );
        assert_eq!(filter.consecutive_frames(), 0);
        assert_eq!(filter.filter(Some(&visible(5.0))), FilterOutcome::Debouncing);

        assert_eq!(filter.filter(None), FilterOutcome::NoFrame);
        assert_eq!(filter.filter(Some(&visible(6.0))), FilterOutcome::Debouncing);
    }

    #[test]
    fn test_same_frame_not_forwarded_twice() {
        let mut filter = VisionFilter::new(2);

        filter.filter(Some(&visible(1.0)));
        assert!(matches!(filter.filter(Some(&visible(2.0))), FilterOutcome::Forward(_)));
        assert_eq!(filter.filter(Some(&visible(2.0))), FilterOutcome::NotNewer);
        assert_eq!(filter.filter(Some(&visible(1.5))), FilterOutcome::NotNewer);
        assert!(matches!(filter.filter(Some(&visible(2.5))), FilterOutcome::Forward(_)));
    }

    #[test]
    fn test_visible_without_solution() {
        let mut filter = VisionFilter::new(1);
        let frame = VisionFrame {
            botpose: None,
            capture_time_s: 1.0,
            visible: true,
        };

        assert_eq!(filter.filter(Some(&frame)), FilterOutcome::NotVisible);
        assert!(matches!(filter.filter(Some(&visible(1.0))), FilterOutcome::Forward(_)));
    }
}
