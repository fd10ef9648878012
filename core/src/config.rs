//! Engine configuration.
//!
//! Loaded from a JSON file by the runner. Tests use `IntakeConfig::default()`.

use anyhow::{bail, Context};
use chrono::{Duration, FixedOffset};
use serde::{Deserialize, Serialize};

pub const DEFAULT_OTP_MESSAGE: &str =
    "Your OTP for complaint verification is: {otp}. Please enter this to complete your complaint submission.";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// Trailing window used by both the duplicate detector and the escalation linker.
    pub duplicate_window_minutes: i64,
    pub otp_length: usize,
    pub max_otp_attempts: u32,
    /// `None` keeps codes valid until the attempt cap is hit.
    pub otp_ttl_minutes: Option<i64>,
    pub auto_close_after_hours: i64,
    pub min_photos: usize,
    pub max_photos: usize,
    /// Offset in which the reference code's calendar day is taken.
    pub reporting_utc_offset_minutes: i32,
    pub otp_message_template: String,
    pub busy_timeout_ms: u64,
    pub scan_base_url: String,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            duplicate_window_minutes: 15,
            otp_length: 6,
            max_otp_attempts: 3,
            otp_ttl_minutes: Some(10),
            auto_close_after_hours: 24,
            min_photos: 1,
            max_photos: 4,
            reporting_utc_offset_minutes: 0,
            otp_message_template: DEFAULT_OTP_MESSAGE.to_string(),
            busy_timeout_ms: 5_000,
            scan_base_url: "http://localhost:8000".to_string(),
        }
    }
}

impl IntakeConfig {
    /// Load from a JSON file. Missing keys fall back to defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Cannot read {path}"))?;
        let config: IntakeConfig =
            serde_json::from_str(&content).with_context(|| format!("Cannot parse {path}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.duplicate_window_minutes <= 0 {
            bail!("duplicate_window_minutes must be positive");
        }
        if !(4..=10).contains(&self.otp_length) {
            bail!("otp_length must be between 4 and 10, got {}", self.otp_length);
        }
        if self.max_otp_attempts == 0 {
            bail!("max_otp_attempts must be at least 1");
        }
        if matches!(self.otp_ttl_minutes, Some(m) if m <= 0) {
            bail!("otp_ttl_minutes must be positive when set");
        }
        if self.auto_close_after_hours <= 0 {
            bail!("auto_close_after_hours must be positive");
        }
        if self.min_photos > self.max_photos {
            bail!(
                "min_photos ({}) exceeds max_photos ({})",
                self.min_photos,
                self.max_photos
            );
        }
        if self.reporting_offset().is_none() {
            bail!(
                "reporting_utc_offset_minutes out of range: {}",
                self.reporting_utc_offset_minutes
            );
        }
        Ok(())
    }

    pub fn duplicate_window(&self) -> Duration {
        Duration::minutes(self.duplicate_window_minutes)
    }

    pub fn otp_ttl(&self) -> Option<Duration> {
        self.otp_ttl_minutes.map(Duration::minutes)
    }

    pub fn auto_close_after(&self) -> Duration {
        Duration::hours(self.auto_close_after_hours)
    }

    pub fn reporting_offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.reporting_utc_offset_minutes.checked_mul(60)?)
    }

    pub fn render_otp_message(&self, otp: &str) -> String {
        self.otp_message_template.replace("{otp}", otp)
    }
}
