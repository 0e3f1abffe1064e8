use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Brightness recorded for a monitor the first time it is seen.
pub const DEFAULT_BRIGHTNESS: f64 = 1.0;

/// Monitor output name -> brightness fraction (1.0 = full).
pub type BrightnessSettings = BTreeMap<String, f64>;

/// Raise `value` to at least `min`. Values above 1.0 pass through untouched,
/// the display tool accepts them.
pub fn clamp_brightness(value: f64, min: f64) -> f64 {
    if value < min { min } else { value }
}

/// Decimal form handed to the display tool.
pub fn format_fraction(value: f64) -> String {
    value.to_string()
}

pub fn format_percent(value: f64) -> String {
    format!("{:.0}%", value * 100.0)
}

/// A quick-select brightness level in whole percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset(pub u32);

impl Preset {
    pub fn fraction(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Resolve against the configured preset list.
    pub fn checked(self, allowed: &[u32]) -> Result<Self, String> {
        if allowed.contains(&self.0) {
            Ok(self)
        } else {
            let list = allowed
                .iter()
                .map(|p| format!("{}%", p))
                .collect::<Vec<_>>()
                .join(", ");
            Err(format!("{}% is not a preset (available: {})", self.0, list))
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl FromStr for Preset {
    type Err = String;

    /// Accepts `75`, `75%` or `0.75`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (number, is_percent) = match trimmed.strip_suffix('%') {
            Some(rest) => (rest.trim(), true),
            None => (trimmed, false),
        };
        let value: f64 = number
            .parse()
            .map_err(|_| format!("invalid preset '{}'", s))?;

        let percent = if !is_percent && number.contains('.') {
            value * 100.0
        } else {
            value
        };

        let rounded = percent.round();
        if !rounded.is_finite() || (percent - rounded).abs() > 1e-9 || !(1.0..=100.0).contains(&rounded) {
            return Err(format!("invalid preset '{}'", s));
        }
        Ok(Preset(rounded as u32))
    }
}

/// Parse a user-supplied brightness as a fraction; `%` suffix means percent.
pub fn parse_fraction(s: &str) -> Result<f64, String> {
    let trimmed = s.trim();
    let value = match trimmed.strip_suffix('%') {
        Some(percent) => percent.trim().parse::<f64>().map(|p| p / 100.0),
        None => trimmed.parse::<f64>(),
    }
    .map_err(|_| format!("invalid brightness '{}'", s))?;

    if !value.is_finite() || value < 0.0 {
        return Err(format!("invalid brightness '{}'", s));
    }
    Ok(value)
}
