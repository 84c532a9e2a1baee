use chrono::{DateTime, Timelike, Utc};

// Follow-the-Sun windows (UTC hours) with dual handoffs.
pub const MORNING_OVERLAP_START_UTC: f64 = 0.5; // 6:00 AM IST / US wrapping up
pub const MORNING_OVERLAP_END_UTC: f64 = 2.5; // 8:00 AM IST
pub const IST_START_UTC: f64 = 2.5; // 8:00 AM IST
pub const EVENING_OVERLAP_START_UTC: f64 = 12.0; // 5:30 PM IST / US starting
pub const EVENING_OVERLAP_END_UTC: f64 = 14.5; // 8:00 PM IST

/// Injectable UTC clock so assignments stay reproducible under test.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fractional UTC hour-of-day in `[0, 24)`.
pub fn utc_hour(now: DateTime<Utc>) -> f64 {
    now.hour() as f64 + now.minute() as f64 / 60.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    MorningOverlap,
    IstOnly,
    EveningOverlap,
    UsOnly,
}

impl TimeWindow {
    pub fn classify(hour_utc: f64) -> Self {
        if (MORNING_OVERLAP_START_UTC..MORNING_OVERLAP_END_UTC).contains(&hour_utc) {
            TimeWindow::MorningOverlap
        } else if (IST_START_UTC..EVENING_OVERLAP_START_UTC).contains(&hour_utc) {
            TimeWindow::IstOnly
        } else if (EVENING_OVERLAP_START_UTC..EVENING_OVERLAP_END_UTC).contains(&hour_utc) {
            TimeWindow::EveningOverlap
        } else {
            TimeWindow::UsOnly
        }
    }

    /// Both regions are on shift during a handoff window.
    pub fn is_overlap(&self) -> bool {
        matches!(self, TimeWindow::MorningOverlap | TimeWindow::EveningOverlap)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::MorningOverlap => "MORNING_OVERLAP",
            TimeWindow::IstOnly => "IST_ONLY",
            TimeWindow::EveningOverlap => "EVENING_OVERLAP",
            TimeWindow::UsOnly => "US_ONLY",
        }
    }
}

/// Coarse member-region classification from the IANA timezone string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TzRegion {
    Ist,
    Us,
    Other,
}

impl TzRegion {
    pub fn classify(timezone: &str) -> Self {
        if timezone.starts_with("Asia/") {
            TzRegion::Ist
        } else if timezone.starts_with("America/") || timezone.starts_with("US/") {
            TzRegion::Us
        } else {
            TzRegion::Other
        }
    }
}

/// Which region should be working right now.
pub fn preferred_region(hour_utc: f64) -> TzRegion {
    if (IST_START_UTC..EVENING_OVERLAP_END_UTC).contains(&hour_utc) {
        TzRegion::Ist
    } else {
        TzRegion::Us
    }
}

#[cfg(test)]
pub struct FixedClock(pub DateTime<Utc>);

#[cfg(test)]
impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.0
    }
}
