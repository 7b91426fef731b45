//! Smartwatch model: screens, labels and navigation rules
//!
//! Both the rendered UI and the automation host drive the watch through
//! this type, so a scripted click and a real click take the same path.

use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use uiharness_core::Point;

/// Minimum horizontal travel that counts as a swipe
pub const SWIPE_THRESHOLD: i32 = 50;

/// How long a heart rate measurement takes
pub const MEASUREMENT_TIME: Duration = Duration::from_secs(3);

pub const KEY_NEXT: u32 = 19;
pub const KEY_PREV: u32 = 20;
pub const KEY_ESC: u32 = 27;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    Main,
    HeartRate,
    Activity,
}

impl Screen {
    pub fn next(self) -> Self {
        match self {
            Self::Main => Self::HeartRate,
            Self::HeartRate => Self::Activity,
            Self::Activity => Self::Main,
        }
    }

    pub fn previous(self) -> Self {
        match self {
            Self::Main => Self::Activity,
            Self::HeartRate => Self::Main,
            Self::Activity => Self::HeartRate,
        }
    }
}

/// Every addressable element of the watch face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchWidget {
    MainScreen,
    ActivityButton,
    Time,
    Date,
    Battery,
    StepsMain,
    HeartArea,
    HeartBpm,
    HrScreen,
    HrValue,
    HrInstruction,
    HrMeasureArea,
    ActivityScreen,
    StepsCount,
    Calories,
}

/// Registry ids, containers before their children, aliases last
pub const WIDGET_IDS: &[(&str, WatchWidget)] = &[
    ("main_screen", WatchWidget::MainScreen),
    ("btn_activity", WatchWidget::ActivityButton),
    ("lbl_time", WatchWidget::Time),
    ("lbl_date", WatchWidget::Date),
    ("lbl_battery", WatchWidget::Battery),
    ("lbl_steps_main", WatchWidget::StepsMain),
    ("heart_area", WatchWidget::HeartArea),
    ("lbl_heart_bpm", WatchWidget::HeartBpm),
    ("hr_screen", WatchWidget::HrScreen),
    ("lbl_hr_value", WatchWidget::HrValue),
    ("lbl_hr_instruction", WatchWidget::HrInstruction),
    ("hr_measure_area", WatchWidget::HrMeasureArea),
    ("activity_screen", WatchWidget::ActivityScreen),
    ("lbl_steps_count", WatchWidget::StepsCount),
    ("lbl_calories", WatchWidget::Calories),
    ("btn_heart", WatchWidget::HeartArea),
    ("lbl_bpm", WatchWidget::HeartBpm),
    ("lbl_steps", WatchWidget::StepsCount),
];

impl WatchWidget {
    pub fn screen(self) -> Screen {
        match self {
            Self::MainScreen
            | Self::ActivityButton
            | Self::Time
            | Self::Date
            | Self::Battery
            | Self::StepsMain
            | Self::HeartArea
            | Self::HeartBpm => Screen::Main,
            Self::HrScreen | Self::HrValue | Self::HrInstruction | Self::HrMeasureArea => {
                Screen::HeartRate
            }
            Self::ActivityScreen | Self::StepsCount | Self::Calories => Screen::Activity,
        }
    }

    /// Primary registry id
    pub fn id(self) -> &'static str {
        WIDGET_IDS
            .iter()
            .find(|(_, w)| *w == self)
            .map(|(id, _)| *id)
            .unwrap_or("unknown")
    }

    /// Containers and touch areas hold no text of their own
    pub fn has_text(self) -> bool {
        !matches!(
            self,
            Self::MainScreen
                | Self::HrScreen
                | Self::ActivityScreen
                | Self::HeartArea
                | Self::HrMeasureArea
        )
    }

    /// Element that receives a click landing on this one
    fn click_target(self) -> Self {
        match self {
            Self::HeartBpm => Self::HeartArea,
            Self::HrValue | Self::HrInstruction => Self::HrScreen,
            Self::StepsCount | Self::Calories => Self::ActivityScreen,
            Self::Time | Self::Date | Self::Battery | Self::StepsMain => Self::MainScreen,
            other => other,
        }
    }
}

/// Watch state shared by the renderer and the automation host
#[derive(Debug)]
pub struct Watch {
    screen: Screen,
    labels: HashMap<WatchWidget, String>,
    heart_rate: u32,
    measuring_since: Option<Instant>,
    clock: String,
}

impl Default for Watch {
    fn default() -> Self {
        Self::new()
    }
}

impl Watch {
    pub fn new() -> Self {
        let labels = [
            (WatchWidget::ActivityButton, "STEPS"),
            (WatchWidget::Time, "00:00"),
            (WatchWidget::Date, "MON, SEP 8"),
            (WatchWidget::Battery, "85%"),
            (WatchWidget::StepsMain, "STEPS: 1254"),
            (WatchWidget::HeartBpm, "HEART 72 BPM"),
            (WatchWidget::HrValue, "72 BPM"),
            (WatchWidget::HrInstruction, "Hold to measure"),
            (WatchWidget::StepsCount, "1,234"),
            (WatchWidget::Calories, "245 cal"),
        ]
        .into_iter()
        .map(|(w, text)| (w, text.to_string()))
        .collect();

        Self {
            screen: Screen::Main,
            labels,
            heart_rate: 72,
            measuring_since: None,
            clock: String::new(),
        }
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn show(&mut self, screen: Screen) {
        if self.screen != screen {
            tracing::info!("Switched to {:?} screen", screen);
        }
        self.screen = screen;
    }

    pub fn is_visible(&self, widget: WatchWidget) -> bool {
        widget.screen() == self.screen
    }

    pub fn is_measuring(&self) -> bool {
        self.measuring_since.is_some()
    }

    pub fn text(&self, widget: WatchWidget) -> Option<&str> {
        self.labels.get(&widget).map(String::as_str)
    }

    /// Replace a label; returns false for widgets without text
    pub fn set_text(&mut self, widget: WatchWidget, text: &str) -> bool {
        if !widget.has_text() {
            return false;
        }
        self.labels.insert(widget, text.to_string());
        true
    }

    fn set_label(&mut self, widget: WatchWidget, text: impl Into<String>) {
        self.labels.insert(widget, text.into());
    }

    pub fn click(&mut self, widget: WatchWidget) {
        match widget.click_target() {
            WatchWidget::ActivityButton => self.show(Screen::Activity),
            WatchWidget::HeartArea => {
                self.show(Screen::HeartRate);
                self.set_label(WatchWidget::HrInstruction, "Long press to measure");
            }
            WatchWidget::HrScreen | WatchWidget::ActivityScreen => self.show(Screen::Main),
            other => tracing::debug!("Click on {:?} has no effect", other),
        }
    }

    pub fn long_press(&mut self, widget: WatchWidget, now: Instant) {
        if widget != WatchWidget::HrMeasureArea {
            tracing::debug!("Long press on {:?} has no effect", widget);
            return;
        }
        tracing::info!("Heart rate measurement started");
        self.measuring_since = Some(now);
        self.set_label(WatchWidget::HrValue, "Measuring...");
        self.set_label(WatchWidget::HrInstruction, "Hold still... measuring");
    }

    /// Horizontal swipes switch screens; short or vertical ones are ignored
    pub fn swipe(&mut self, from: Point, to: Point) {
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        if dx.abs() <= dy.abs() {
            return;
        }
        if dx < -SWIPE_THRESHOLD {
            self.show(Screen::Activity);
        } else if dx > SWIPE_THRESHOLD {
            self.show(Screen::Main);
        }
    }

    pub fn key(&mut self, code: u32) {
        match code {
            KEY_ESC => self.show(Screen::Main),
            KEY_NEXT => self.show(self.screen.next()),
            KEY_PREV => self.show(self.screen.previous()),
            other => tracing::debug!("Key {} ignored", other),
        }
    }

    /// Advance clocks and timers
    pub fn update(&mut self, now: Instant) {
        let clock = wall_clock();
        if clock != self.clock {
            self.set_label(WatchWidget::Time, clock.clone());
            self.clock = clock;
        }

        if let Some(start) = self.measuring_since {
            if now.duration_since(start) >= MEASUREMENT_TIME {
                self.finish_measurement(65 + pseudo_random() % 30);
            }
        }
    }

    fn finish_measurement(&mut self, bpm: u32) {
        self.measuring_since = None;
        self.heart_rate = bpm;
        self.set_label(WatchWidget::HrValue, format!("{} BPM", bpm));
        self.set_label(WatchWidget::HrInstruction, "Tap to go back");
        self.set_label(WatchWidget::HeartBpm, format!("HEART {} BPM", bpm));
        tracing::info!("Heart rate measured: {} BPM", bpm);
    }

    pub fn heart_rate(&self) -> u32 {
        self.heart_rate
    }
}

/// `HH:MM` in UTC
fn wall_clock() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{:02}:{:02}", (secs / 3600) % 24, (secs / 60) % 60)
}

fn pseudo_random() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0)
}
