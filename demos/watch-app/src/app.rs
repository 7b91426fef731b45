//! eframe application drawing the watch face and ticking the dispatcher

use crate::host::{Capture, Layout, WatchHost};
use crate::watch::{KEY_ESC, KEY_NEXT, KEY_PREV, Screen, WIDGET_IDS, Watch, WatchWidget};
use eframe::egui::{self, Color32, RichText, Sense, pos2, vec2};
use std::time::{Duration, Instant};
use uiharness_core::{Dispatcher, Harness, HarnessError, Point};

pub const WINDOW_SIZE: f32 = 480.0;
const FACE_SIZE: f32 = 400.0;

/// Hold time before a press on the measure area counts as long
const LONG_PRESS: Duration = Duration::from_millis(400);

const STEP_GOAL: f32 = 10_000.0;

const FACE_COLOR: Color32 = Color32::from_rgb(0x14, 0x14, 0x1c);
const ACCENT: Color32 = Color32::from_rgb(0x4f, 0xc3, 0xf7);
const HEART: Color32 = Color32::from_rgb(0xef, 0x53, 0x50);

pub struct WatchApp {
    watch: Watch,
    dispatcher: Dispatcher<WatchWidget>,
    layout: Layout,
    capture: Capture,
    pointer_events: Vec<egui::Event>,
    drag_travel: egui::Vec2,
    press: Option<(Instant, bool)>,
}

impl WatchApp {
    pub fn new(cc: &eframe::CreationContext<'_>, harness: &Harness) -> Result<Self, HarnessError> {
        let mut dispatcher = harness.dispatcher();
        for (id, widget) in WIDGET_IDS {
            dispatcher.register(id, *widget)?;
        }
        dispatcher.log_registry();

        let ctx = cc.egui_ctx.clone();
        harness.queue().set_waker(move || ctx.request_repaint());
        cc.egui_ctx.set_visuals(egui::Visuals::dark());

        Ok(Self {
            watch: Watch::new(),
            dispatcher,
            layout: Layout::new(),
            capture: Capture::default(),
            pointer_events: Vec::new(),
            drag_travel: egui::Vec2::ZERO,
            press: None,
        })
    }

    fn draw(&mut self, ui: &mut egui::Ui) {
        let window = ui.max_rect();
        let face = egui::Rect::from_center_size(window.center(), vec2(FACE_SIZE, FACE_SIZE));
        ui.painter()
            .circle_filled(face.center(), FACE_SIZE / 2.0, FACE_COLOR);

        let container = match self.watch.screen() {
            Screen::Main => WatchWidget::MainScreen,
            Screen::HeartRate => WatchWidget::HrScreen,
            Screen::Activity => WatchWidget::ActivityScreen,
        };
        self.background(ui, container, window);

        match self.watch.screen() {
            Screen::Main => self.draw_main(ui, face),
            Screen::HeartRate => self.draw_heart_rate(ui, face),
            Screen::Activity => self.draw_activity(ui, face),
        }
    }

    /// Screen container: click goes to the model, horizontal drags swipe
    fn background(&mut self, ui: &mut egui::Ui, container: WatchWidget, rect: egui::Rect) {
        self.layout.insert(container, rect);
        let response = ui.interact(rect, ui.id().with(container.id()), Sense::click_and_drag());
        if response.dragged() {
            self.drag_travel += response.drag_delta();
        }
        if response.drag_stopped() {
            let travel = std::mem::take(&mut self.drag_travel);
            self.watch.swipe(
                Point::new(0, 0),
                Point::new(travel.x.round() as i32, travel.y.round() as i32),
            );
        } else if response.clicked() {
            self.watch.click(container);
        }
    }

    fn label(
        &mut self,
        ui: &mut egui::Ui,
        widget: WatchWidget,
        rect: egui::Rect,
        size: f32,
        color: Color32,
    ) {
        let text = self.watch.text(widget).unwrap_or_default().to_owned();
        ui.put(
            rect,
            egui::Label::new(RichText::new(text).size(size).color(color)).selectable(false),
        );
        self.layout.insert(widget, rect);
    }

    fn draw_main(&mut self, ui: &mut egui::Ui, face: egui::Rect) {
        let c = face.center();
        self.label(
            ui,
            WatchWidget::Date,
            egui::Rect::from_center_size(c + vec2(0.0, -80.0), vec2(200.0, 24.0)),
            18.0,
            Color32::GRAY,
        );
        self.label(
            ui,
            WatchWidget::Time,
            egui::Rect::from_center_size(c + vec2(0.0, -30.0), vec2(200.0, 56.0)),
            48.0,
            Color32::WHITE,
        );
        self.label(
            ui,
            WatchWidget::Battery,
            egui::Rect::from_min_size(pos2(face.right() - 110.0, face.top() + 70.0), vec2(60.0, 24.0)),
            16.0,
            Color32::LIGHT_GREEN,
        );
        self.label(
            ui,
            WatchWidget::StepsMain,
            egui::Rect::from_center_size(c + vec2(0.0, 20.0), vec2(220.0, 24.0)),
            18.0,
            ACCENT,
        );

        let activity = egui::Rect::from_min_size(pos2(face.left() + 60.0, face.top() + 70.0), vec2(80.0, 30.0));
        let caption = self.watch.text(WatchWidget::ActivityButton).unwrap_or_default().to_owned();
        if ui.put(activity, egui::Button::new(caption)).clicked() {
            self.watch.click(WatchWidget::ActivityButton);
        }
        self.layout.insert(WatchWidget::ActivityButton, activity);

        let heart = egui::Rect::from_center_size(pos2(c.x, face.bottom() - 65.0), vec2(140.0, 50.0));
        let bpm = self.watch.text(WatchWidget::HeartBpm).unwrap_or_default().to_owned();
        if ui
            .put(heart, egui::Button::new(RichText::new(bpm).color(HEART)))
            .clicked()
        {
            self.watch.click(WatchWidget::HeartArea);
        }
        self.layout.insert(WatchWidget::HeartArea, heart);
        self.layout.insert(WatchWidget::HeartBpm, heart.shrink(8.0));
    }

    fn draw_heart_rate(&mut self, ui: &mut egui::Ui, face: egui::Rect) {
        let c = face.center();
        ui.painter().text(
            c + vec2(0.0, -120.0),
            egui::Align2::CENTER_CENTER,
            "HEART RATE",
            egui::FontId::proportional(20.0),
            HEART,
        );

        let area = egui::Rect::from_center_size(c, vec2(120.0, 120.0));
        let response = ui.interact(area, ui.id().with("hr_measure_area"), Sense::click_and_drag());
        let ring = if self.watch.is_measuring() { HEART } else { Color32::DARK_GRAY };
        ui.painter()
            .circle_stroke(area.center(), 58.0, egui::Stroke::new(4.0, ring));
        self.layout.insert(WatchWidget::HrMeasureArea, area);
        self.track_long_press(ui, &response);

        self.label(
            ui,
            WatchWidget::HrValue,
            egui::Rect::from_center_size(c, vec2(110.0, 36.0)),
            24.0,
            Color32::WHITE,
        );
        self.label(
            ui,
            WatchWidget::HrInstruction,
            egui::Rect::from_center_size(pos2(c.x, face.bottom() - 60.0), vec2(260.0, 24.0)),
            16.0,
            Color32::GRAY,
        );
    }

    fn track_long_press(&mut self, ui: &egui::Ui, response: &egui::Response) {
        if !response.is_pointer_button_down_on() {
            self.press = None;
            return;
        }
        let now = Instant::now();
        let (start, fired) = self.press.get_or_insert((now, false));
        if !*fired && now.duration_since(*start) >= LONG_PRESS {
            *fired = true;
            self.watch.long_press(WatchWidget::HrMeasureArea, now);
        }
        ui.ctx().request_repaint_after(Duration::from_millis(50));
    }

    fn draw_activity(&mut self, ui: &mut egui::Ui, face: egui::Rect) {
        let c = face.center();
        ui.painter().text(
            c + vec2(0.0, -80.0),
            egui::Align2::CENTER_CENTER,
            "STEPS",
            egui::FontId::proportional(20.0),
            ACCENT,
        );
        self.label(
            ui,
            WatchWidget::StepsCount,
            egui::Rect::from_center_size(c + vec2(0.0, -25.0), vec2(200.0, 48.0)),
            40.0,
            Color32::WHITE,
        );

        let steps: f32 = self
            .watch
            .text(WatchWidget::StepsCount)
            .map(|t| t.replace(',', ""))
            .and_then(|t| t.parse().ok())
            .unwrap_or(0.0);
        let track = egui::Rect::from_center_size(c + vec2(0.0, 30.0), vec2(200.0, 10.0));
        let mut fill = track;
        fill.set_width(track.width() * (steps / STEP_GOAL).clamp(0.0, 1.0));
        ui.painter().rect_filled(track, 5.0, Color32::DARK_GRAY);
        ui.painter().rect_filled(fill, 5.0, ACCENT);

        self.label(
            ui,
            WatchWidget::Calories,
            egui::Rect::from_center_size(pos2(c.x, face.bottom() - 70.0), vec2(200.0, 24.0)),
            18.0,
            Color32::from_rgb(0xff, 0xb7, 0x4d),
        );
    }

    fn keyboard(&mut self, ctx: &egui::Context) {
        let codes: Vec<u32> = ctx.input(|i| {
            [
                (egui::Key::Escape, KEY_ESC),
                (egui::Key::ArrowRight, KEY_NEXT),
                (egui::Key::ArrowLeft, KEY_PREV),
            ]
            .into_iter()
            .filter(|(key, _)| i.key_pressed(*key))
            .map(|(_, code)| code)
            .collect()
        });
        for code in codes {
            self.watch.key(code);
        }
    }
}

impl eframe::App for WatchApp {
    fn raw_input_hook(&mut self, _ctx: &egui::Context, raw_input: &mut egui::RawInput) {
        raw_input.events.append(&mut self.pointer_events);
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.input(|i| {
            for event in &i.raw.events {
                if let egui::Event::Screenshot {
                    image, user_data, ..
                } = event
                {
                    self.capture.accept(user_data, image);
                }
            }
        });

        self.watch.update(Instant::now());
        self.keyboard(ctx);

        self.layout.clear();
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE.fill(Color32::BLACK))
            .show(ctx, |ui| self.draw(ui));

        // Commands run after layout so bounds match what was just drawn
        let report = self.dispatcher.tick(&mut WatchHost {
            watch: &mut self.watch,
            ctx,
            layout: &self.layout,
            capture: &mut self.capture,
            pointer_events: &mut self.pointer_events,
        });
        if report.completed > 0 {
            tracing::trace!("Completed {} commands, {} pending", report.completed, report.pending);
        }
        if let Some(delay) = report.wake_after {
            ctx.request_repaint_after(delay);
        }

        let refresh = if self.watch.is_measuring() {
            Duration::from_millis(100)
        } else {
            Duration::from_secs(1)
        };
        ctx.request_repaint_after(refresh);
    }
}
