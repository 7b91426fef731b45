//! The seam between the harness and the UI toolkit
//!
//! A [`UiHost`] is borrowed by the dispatcher on the UI thread for the
//! duration of one tick. Implementations translate harness operations into
//! toolkit events.

use crate::error::HarnessError;
use crate::screenshot::RawFrame;
use std::fmt::Debug;
use std::time::Duration;
use uiharness_protocol::Point;

/// Axis-aligned widget bounds in screen pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Half-open containment: right and bottom edges are outside
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.y >= self.y
            && i64::from(point.x) < i64::from(self.x) + i64::from(self.width)
            && i64::from(point.y) < i64::from(self.y) + i64::from(self.height)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }
}

/// Result of asking the host for the current frame
#[derive(Debug)]
pub enum FrameState {
    /// A rendered frame is available
    Ready(RawFrame),
    /// The host is still producing a frame; ask again next tick
    Pending,
    /// This host cannot capture frames
    Unavailable,
}

/// UI toolkit operations used by the dispatcher
///
/// Every method runs on the UI thread.
pub trait UiHost {
    /// Widget handle stored in the registry
    type Handle: Clone + Debug;

    fn click(&mut self, widget: &Self::Handle) -> Result<(), HarnessError>;

    /// Press and hold. `center` is the widget's center when its bounds are known.
    fn long_press(
        &mut self,
        widget: &Self::Handle,
        center: Option<Point>,
        duration: Duration,
    ) -> Result<(), HarnessError>;

    fn swipe(&mut self, from: Point, to: Point) -> Result<(), HarnessError>;

    fn drag(&mut self, from: Point, to: Point) -> Result<(), HarnessError> {
        self.swipe(from, to)
    }

    fn move_pointer(&mut self, to: Point) -> Result<(), HarnessError>;

    fn key(&mut self, code: u32) -> Result<(), HarnessError>;

    /// Text content; `None` for widgets that carry no text
    fn text(&self, widget: &Self::Handle) -> Result<Option<String>, HarnessError>;

    fn set_text(&mut self, widget: &Self::Handle, text: &str) -> Result<(), HarnessError>;

    /// Last known on-screen bounds
    fn bounds(&self, _widget: &Self::Handle) -> Option<Rect> {
        None
    }

    /// Force pending layout and rendering so the next snapshot is current
    fn flush_frame(&mut self) {}

    /// Start a new capture
    ///
    /// Frames belonging to an earlier, abandoned capture must not be returned
    /// by later snapshots.
    fn begin_capture(&mut self) {
        self.flush_frame();
    }

    fn snapshot(&mut self) -> Result<FrameState, HarnessError> {
        Ok(FrameState::Unavailable)
    }
}
