use std::str::FromStr;
use std::time::Duration;
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use strum_macros::{Display, EnumString};
use thiserror::Error;

static CSS_PROPERTY: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"--np-([a-z][a-z0-9-]*)\s*:\s*([^;]*);").ok());

#[derive(Error, Debug, PartialEq)]
pub enum OverlayConfigError {
    #[error("Unknown overlay setting '{0}'")]
    UnknownSetting(String),

    #[error("Invalid value '{value}' for overlay setting '{name}'")]
    InvalidValue { name: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Animation {
    Fade,
    Fly,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TitleAlign {
    Left,
    Center,
    Right,
}

/// Overlay client settings.
///
/// Resolved in layers: defaults, then stylesheet custom properties, then query parameters.
/// A value that does not parse leaves the previous layer's value in place.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayConfig {
    pub animation: Animation,
    pub animation_duration: Duration,
    pub fade_duration: Duration,
    /// Pixels
    pub fly_distance: u32,
    /// Zero keeps the overlay visible
    pub auto_hide: Duration,
    /// Zero never shows the track again after auto-hide
    pub repeat_interval: Duration,
    pub settle_delay: Duration,
    pub poll_interval: Duration,
    pub stale_after: Duration,
    pub title: String,
    pub title_align: TitleAlign,
    pub qr: bool,
    pub qr_url: String,
    pub qr_text: String,
    pub qr_duration: Duration,
    pub qr_interval: Duration,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            animation: Animation::Fade,
            animation_duration: Duration::from_millis(600),
            fade_duration: Duration::from_millis(400),
            fly_distance: 40,
            auto_hide: Duration::ZERO,
            repeat_interval: Duration::ZERO,
            settle_delay: Duration::from_millis(750),
            poll_interval: Duration::from_millis(1000),
            stale_after: Duration::from_secs(15),
            title: String::new(),
            title_align: TitleAlign::Left,
            qr: false,
            qr_url: String::new(),
            qr_text: String::new(),
            qr_duration: Duration::from_secs(10),
            qr_interval: Duration::from_secs(60),
        }
    }
}

/// `250ms`, `1.5s` or a bare number of milliseconds
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim().to_ascii_lowercase();
    let (number, scale) = if let Some(ms) = value.strip_suffix("ms") {
        (ms, 1.0)
    } else if let Some(s) = value.strip_suffix('s') {
        (s, 1000.0)
    } else {
        (value.as_str(), 1.0)
    };
    let number: f64 = number.trim().parse().ok()?;
    if !number.is_finite() || number < 0.0 {
        return None;
    }
    Some(Duration::from_micros((number * scale * 1000.0).round() as u64))
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_pixels(value: &str) -> Option<u32> {
    let value = value.trim();
    value.strip_suffix("px").unwrap_or(value).trim().parse().ok()
}

/// Strip the quotes CSS string values carry
fn unquote(value: &str) -> &str {
    let value = value.trim();
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

impl OverlayConfig {
    /// Set one value by its public name
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), OverlayConfigError> {
        let value = unquote(value);
        let invalid = || OverlayConfigError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
        };
        let duration = || parse_duration(value).ok_or_else(invalid);

        match name {
            "animation" => self.animation = Animation::from_str(value).map_err(|_| invalid())?,
            "animation-duration" => self.animation_duration = duration()?,
            "fade-duration" => self.fade_duration = duration()?,
            "fly-distance" => self.fly_distance = parse_pixels(value).ok_or_else(invalid)?,
            "auto-hide" => self.auto_hide = duration()?,
            "repeat-interval" => self.repeat_interval = duration()?,
            "settle-delay" => self.settle_delay = duration()?,
            "poll-interval" => {
                let interval = duration()?;
                if interval.is_zero() {
                    return Err(invalid());
                }
                self.poll_interval = interval;
            }
            "stale-after" => self.stale_after = duration()?,
            "title" => self.title = value.to_string(),
            "title-align" => self.title_align = TitleAlign::from_str(value).map_err(|_| invalid())?,
            "qr" => self.qr = parse_bool(value).ok_or_else(invalid)?,
            "qr-url" => self.qr_url = value.to_string(),
            "qr-text" => self.qr_text = value.to_string(),
            "qr-duration" => self.qr_duration = duration()?,
            "qr-interval" => {
                let interval = duration()?;
                if interval.is_zero() {
                    return Err(invalid());
                }
                self.qr_interval = interval;
            }
            _ => return Err(OverlayConfigError::UnknownSetting(name.to_string())),
        }
        Ok(())
    }

    fn apply(&mut self, name: &str, value: &str) {
        match self.set(name, value) {
            Ok(()) => {}
            Err(OverlayConfigError::UnknownSetting(name)) => warn!("Ignoring unknown overlay setting '{}'", name),
            Err(e) => warn!("{}, keeping {}", e, self.describe(name)),
        }
    }

    fn describe(&self, name: &str) -> String {
        match name {
            "animation" => self.animation.to_string(),
            "title-align" => self.title_align.to_string(),
            _ => "the previous value".to_string(),
        }
    }

    /// Apply `--np-<name>: <value>;` custom properties found in a stylesheet
    pub fn apply_css(&mut self, css: &str) {
        let Some(property) = CSS_PROPERTY.as_ref() else { return };
        for capture in property.captures_iter(css) {
            self.apply(&capture[1], &capture[2]);
        }
    }

    /// Apply `name=value` query parameters. A leading `?` is allowed.
    pub fn apply_query(&mut self, query: &str) {
        let query = query.trim_start_matches('?');
        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            self.apply(&name, &value);
        }
    }

    /// Defaults, then the stylesheet, then the query string
    pub fn resolve(css: Option<&str>, query: Option<&str>) -> Self {
        let mut config = Self::default();
        if let Some(css) = css {
            config.apply_css(css);
        }
        if let Some(query) = query {
            config.apply_query(query);
        }
        config
    }

    pub fn auto_hide(&self) -> Option<Duration> {
        Some(self.auto_hide).filter(|d| !d.is_zero())
    }

    pub fn repeat_interval(&self) -> Option<Duration> {
        Some(self.repeat_interval).filter(|d| !d.is_zero())
    }

    pub fn settle_delay(&self) -> Option<Duration> {
        Some(self.settle_delay).filter(|d| !d.is_zero())
    }

    pub fn qr_enabled(&self) -> bool {
        self.qr && !self.qr_url.is_empty()
    }

    /// Length of one enter or exit transition
    pub fn transition_duration(&self) -> Duration {
        match self.animation {
            Animation::None => Duration::ZERO,
            Animation::Fade => self.fade_duration,
            Animation::Fly => self.animation_duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration("1.5s"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_duration(" 800 "), Some(Duration::from_millis(800)));
        assert_eq!(parse_duration("0"), Some(Duration::ZERO));
        assert_eq!(parse_duration("-1s"), None);
        assert_eq!(parse_duration("soon"), None);
    }

    #[test]
    fn test_css_layer() {
        let css = r#"
            :root {
              --np-animation: fly;
              --np-settle-delay: 2s;
              --np-title: "Now Playing";
              --np-fly-distance: 80px;
              --np-qr: true;
            }
        "#;
        let config = OverlayConfig::resolve(Some(css), None);
        assert_eq!(config.animation, Animation::Fly);
        assert_eq!(config.settle_delay, Duration::from_secs(2));
        assert_eq!(config.title, "Now Playing");
        assert_eq!(config.fly_distance, 80);
        assert!(config.qr);
        assert!(!config.qr_enabled());
    }

    #[test]
    fn test_query_wins_over_css() {
        let css = "--np-animation: fly; --np-poll-interval: 2s;";
        let config = OverlayConfig::resolve(Some(css), Some("?animation=none&title=On%20Air&qr-url=https%3A%2F%2Fx.y"));
        assert_eq!(config.animation, Animation::None);
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.title, "On Air");
        assert_eq!(config.qr_url, "https://x.y");
        assert_eq!(config.transition_duration(), Duration::ZERO);
    }

    #[test]
    fn test_invalid_values_keep_previous_layer() {
        let css = "--np-animation: fly; --np-auto-hide: 5s;";
        let config = OverlayConfig::resolve(Some(css), Some("animation=spin&auto-hide=later&poll-interval=0&bogus=1"));
        assert_eq!(config.animation, Animation::Fly);
        assert_eq!(config.auto_hide(), Some(Duration::from_secs(5)));
        assert_eq!(config.poll_interval, Duration::from_millis(1000));
    }

    #[test]
    fn test_zero_disables() {
        let config = OverlayConfig::resolve(None, Some("auto-hide=0&repeat-interval=0s&settle-delay=0"));
        assert_eq!(config.auto_hide(), None);
        assert_eq!(config.repeat_interval(), None);
        assert_eq!(config.settle_delay(), None);
    }

    #[test]
    fn test_set_reports_errors() {
        let mut config = OverlayConfig::default();
        assert_eq!(
            config.set("nope", "1"),
            Err(OverlayConfigError::UnknownSetting("nope".into()))
        );
        assert!(matches!(config.set("qr", "maybe"), Err(OverlayConfigError::InvalidValue { .. })));
        config.set("title-align", "Center").unwrap();
        assert_eq!(config.title_align, TitleAlign::Center);
    }
}
