//! [`UiHost`] implementation over the watch model and the egui context

use crate::watch::{MEASUREMENT_TIME, Watch, WatchWidget};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use uiharness_core::{FrameState, HarnessError, PixelFormat, Point, RawFrame, Rect, UiHost};

/// Rects of the widgets drawn in the last frame, in points
pub type Layout = HashMap<WatchWidget, egui::Rect>;

/// Viewport screenshots requested from egui
///
/// Each request carries a generation number in its [`egui::UserData`]; only
/// the image answering the latest request is kept.
#[derive(Debug, Default)]
pub struct Capture {
    generation: u64,
    pending: Option<u64>,
    frame: Option<RawFrame>,
}

impl Capture {
    pub fn is_requested(&self) -> bool {
        self.pending.is_some()
    }

    /// Forget any earlier request and its frame, returning the new tag
    fn restart(&mut self) -> u64 {
        self.generation += 1;
        self.pending = Some(self.generation);
        self.frame = None;
        self.generation
    }

    /// Keep a screenshot delivered by the backend if it answers the
    /// outstanding request
    pub fn accept(&mut self, user_data: &egui::UserData, image: &egui::ColorImage) {
        let tag = user_data
            .data
            .as_ref()
            .and_then(|data| data.downcast_ref::<u64>())
            .copied();
        if tag.is_none() || tag != self.pending {
            tracing::debug!("Ignoring screenshot {:?}, waiting for {:?}", tag, self.pending);
            return;
        }
        let [width, height] = image.size;
        let data = image.pixels.iter().flat_map(|c| c.to_array()).collect();
        self.frame = Some(RawFrame::new(
            width as u32,
            height as u32,
            PixelFormat::Rgba8888,
            data,
        ));
    }
}

/// Borrowed view of the app handed to the dispatcher for one tick
pub struct WatchHost<'a> {
    pub watch: &'a mut Watch,
    pub ctx: &'a egui::Context,
    pub layout: &'a Layout,
    pub capture: &'a mut Capture,
    /// Input events replayed into the next frame
    pub pointer_events: &'a mut Vec<egui::Event>,
}

impl WatchHost<'_> {
    fn ensure_visible(&self, widget: WatchWidget) -> Result<(), HarnessError> {
        if self.watch.is_visible(widget) {
            Ok(())
        } else {
            Err(HarnessError::InvalidWidget(format!(
                "{} is not on the {:?} screen",
                widget.id(),
                self.watch.screen()
            )))
        }
    }

    fn to_points(&self, point: Point) -> egui::Pos2 {
        let ppp = self.ctx.pixels_per_point();
        egui::pos2(point.x as f32 / ppp, point.y as f32 / ppp)
    }
}

impl UiHost for WatchHost<'_> {
    type Handle = WatchWidget;

    fn click(&mut self, widget: &WatchWidget) -> Result<(), HarnessError> {
        self.ensure_visible(*widget)?;
        self.watch.click(*widget);
        self.ctx.request_repaint();
        Ok(())
    }

    fn long_press(
        &mut self,
        widget: &WatchWidget,
        center: Option<Point>,
        duration: Duration,
    ) -> Result<(), HarnessError> {
        self.ensure_visible(*widget)?;
        tracing::debug!(
            "Long press on {} at {:?} for {:?}",
            widget.id(),
            center,
            duration
        );
        self.watch.long_press(*widget, Instant::now());
        self.ctx.request_repaint_after(MEASUREMENT_TIME);
        Ok(())
    }

    fn swipe(&mut self, from: Point, to: Point) -> Result<(), HarnessError> {
        self.watch.swipe(from, to);
        self.ctx.request_repaint();
        Ok(())
    }

    fn move_pointer(&mut self, to: Point) -> Result<(), HarnessError> {
        let pos = self.to_points(to);
        self.pointer_events.push(egui::Event::PointerMoved(pos));
        self.ctx.request_repaint();
        Ok(())
    }

    fn key(&mut self, code: u32) -> Result<(), HarnessError> {
        self.watch.key(code);
        self.ctx.request_repaint();
        Ok(())
    }

    fn text(&self, widget: &WatchWidget) -> Result<Option<String>, HarnessError> {
        Ok(self.watch.text(*widget).map(str::to_owned))
    }

    fn set_text(&mut self, widget: &WatchWidget, text: &str) -> Result<(), HarnessError> {
        if !self.watch.set_text(*widget, text) {
            return Err(HarnessError::InvalidWidget(format!(
                "{} has no text",
                widget.id()
            )));
        }
        self.ctx.request_repaint();
        Ok(())
    }

    fn bounds(&self, widget: &WatchWidget) -> Option<Rect> {
        if !self.watch.is_visible(*widget) {
            return None;
        }
        let rect = self.layout.get(widget)?;
        let ppp = self.ctx.pixels_per_point();
        Some(Rect::new(
            (rect.min.x * ppp).round() as i32,
            (rect.min.y * ppp).round() as i32,
            (rect.width() * ppp).round() as i32,
            (rect.height() * ppp).round() as i32,
        ))
    }

    fn flush_frame(&mut self) {
        self.ctx.request_repaint();
    }

    fn begin_capture(&mut self) {
        let tag = self.capture.restart();
        self.ctx
            .send_viewport_cmd(egui::ViewportCommand::Screenshot(egui::UserData::new(tag)));
        self.ctx.request_repaint();
    }

    fn snapshot(&mut self) -> Result<FrameState, HarnessError> {
        match self.capture.frame.take() {
            Some(frame) => {
                self.capture.pending = None;
                Ok(FrameState::Ready(frame))
            }
            None => Ok(FrameState::Pending),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watch::Screen;

    struct Fixture {
        watch: Watch,
        ctx: egui::Context,
        layout: Layout,
        capture: Capture,
        events: Vec<egui::Event>,
    }

    impl Fixture {
        fn new() -> Self {
            let mut layout = Layout::new();
            layout.insert(
                WatchWidget::ActivityButton,
                egui::Rect::from_min_size(egui::pos2(100.0, 110.0), egui::vec2(80.0, 30.0)),
            );
            layout.insert(
                WatchWidget::HrMeasureArea,
                egui::Rect::from_min_size(egui::pos2(180.0, 180.0), egui::vec2(120.0, 120.0)),
            );
            Self {
                watch: Watch::new(),
                ctx: egui::Context::default(),
                layout,
                capture: Capture::default(),
                events: Vec::new(),
            }
        }

        fn host(&mut self) -> WatchHost<'_> {
            WatchHost {
                watch: &mut self.watch,
                ctx: &self.ctx,
                layout: &self.layout,
                capture: &mut self.capture,
                pointer_events: &mut self.events,
            }
        }
    }

    #[test]
    fn test_click_requires_visible_widget() {
        let mut fixture = Fixture::new();
        let mut host = fixture.host();
        let err = host.click(&WatchWidget::HrScreen).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidWidget(_)));

        host.click(&WatchWidget::ActivityButton).unwrap();
        assert_eq!(fixture.watch.screen(), Screen::Activity);
    }

    #[test]
    fn test_bounds_only_for_current_screen() {
        let mut fixture = Fixture::new();
        let host = fixture.host();
        assert_eq!(
            host.bounds(&WatchWidget::ActivityButton),
            Some(Rect::new(100, 110, 80, 30))
        );
        assert_eq!(host.bounds(&WatchWidget::HrMeasureArea), None);
        assert_eq!(host.bounds(&WatchWidget::Battery), None);
    }

    #[test]
    fn test_text_and_set_text() {
        let mut fixture = Fixture::new();
        let mut host = fixture.host();
        assert_eq!(host.text(&WatchWidget::Battery).unwrap().as_deref(), Some("85%"));
        assert_eq!(host.text(&WatchWidget::HeartArea).unwrap(), None);
        host.set_text(&WatchWidget::Battery, "50%").unwrap();
        assert_eq!(host.text(&WatchWidget::Battery).unwrap().as_deref(), Some("50%"));
        assert!(host.set_text(&WatchWidget::MainScreen, "x").is_err());
    }

    #[test]
    fn test_move_pointer_queues_event() {
        let mut fixture = Fixture::new();
        fixture.host().move_pointer(Point::new(120, 60)).unwrap();
        assert!(matches!(
            fixture.events.as_slice(),
            [egui::Event::PointerMoved(pos)] if *pos == egui::pos2(120.0, 60.0)
        ));
    }

    fn pixel(value: u8) -> egui::ColorImage {
        egui::ColorImage::from_rgba_unmultiplied([1, 1], &[value, value, value, 255])
    }

    fn frame_data(host: &mut WatchHost<'_>) -> Option<Vec<u8>> {
        match host.snapshot().unwrap() {
            FrameState::Ready(frame) => Some(frame.data),
            FrameState::Pending => None,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_snapshot_waits_for_delivered_image() {
        let mut fixture = Fixture::new();
        let mut host = fixture.host();
        assert!(matches!(host.snapshot().unwrap(), FrameState::Pending));
        host.begin_capture();
        host.flush_frame();
        assert!(fixture.capture.is_requested());

        let image = egui::ColorImage::from_rgba_unmultiplied([2, 1], &[255, 0, 0, 255, 0, 0, 255, 255]);
        fixture.capture.accept(&egui::UserData::new(1u64), &image);

        let mut host = fixture.host();
        match host.snapshot().unwrap() {
            FrameState::Ready(frame) => {
                assert_eq!((frame.width, frame.height), (2, 1));
                assert_eq!(frame.format, PixelFormat::Rgba8888);
                assert_eq!(frame.data, vec![255, 0, 0, 255, 0, 0, 255, 255]);
            }
            other => panic!("expected a frame, got {:?}", other),
        }
        assert!(!fixture.capture.is_requested());
    }

    #[test]
    fn test_abandoned_capture_frame_is_not_served_later() {
        let mut fixture = Fixture::new();
        // First capture is given up before its image arrives
        fixture.host().begin_capture();
        fixture.capture.accept(&egui::UserData::new(1u64), &pixel(1));

        fixture.host().click(&WatchWidget::ActivityButton).unwrap();

        let mut host = fixture.host();
        host.begin_capture();
        assert_eq!(frame_data(&mut host), None);
        fixture.capture.accept(&egui::UserData::new(1u64), &pixel(1));
        assert_eq!(frame_data(&mut fixture.host()), None);

        fixture.capture.accept(&egui::UserData::new(2u64), &pixel(2));
        assert_eq!(frame_data(&mut fixture.host()), Some(vec![2, 2, 2, 255]));
    }

    #[test]
    fn test_unrequested_screenshot_is_ignored() {
        let mut capture = Capture::default();
        capture.accept(&egui::UserData::default(), &pixel(0));
        capture.accept(&egui::UserData::new(1u64), &pixel(0));
        assert!(capture.frame.is_none());
    }
}
