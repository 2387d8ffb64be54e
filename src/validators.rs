//! Input validation and sanitization for rule settings
//!
//! Range checks mirror what the game client accepts; a value outside these
//! ranges would make the whole filter file fail to load in game.

use crate::codec::action::Rgba;
use crate::core::error::{Error, Result};

/// Largest font size the client renders
pub const MAX_FONT_SIZE: f64 = 45.0;

/// Loudest alert sound volume
pub const MAX_VOLUME: u32 = 300;

/// Number of built-in alert sounds
pub const MAX_ALERT_SOUND_ID: u32 = 16;

/// Sanitizes a rule name for use on a `# comment` line.
///
/// Line breaks become spaces and other control characters are dropped, so a
/// name can never spill onto the next line of the filter.
///
/// # Examples
///
/// ```
/// use lootrule::validators::sanitize_comment;
///
/// assert_eq!(sanitize_comment("Divine\nOrbs"), "Divine Orbs");
/// assert_eq!(sanitize_comment("  tabs\tstay  "), "tabs\tstay");
/// ```
pub fn sanitize_comment(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\r' | '\n' => {
                if !out.ends_with(' ') {
                    out.push(' ');
                }
            }
            '\t' => out.push(c),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out.trim().to_string()
}

/// Validates a font size (1 to 45 inclusive).
///
/// # Errors
///
/// Returns `Err` for sizes outside the range or non-finite values.
pub fn validate_font_size(size: f64) -> Result<()> {
    if !size.is_finite() || !(1.0..=MAX_FONT_SIZE).contains(&size) {
        return Err(Error::validation(
            "font_size",
            format!("{size} is outside 1-{MAX_FONT_SIZE}"),
        ));
    }
    Ok(())
}

/// Validates that every color channel, alpha included, is within 0-255.
pub fn validate_color(color: &Rgba) -> Result<()> {
    for (channel, value) in [("r", color.r), ("g", color.g), ("b", color.b), ("a", color.a)] {
        if !value.is_finite() || !(0.0..=255.0).contains(&value) {
            return Err(Error::validation(
                "color",
                format!("channel {channel} = {value} is outside 0-255"),
            ));
        }
    }
    Ok(())
}

pub fn validate_volume(volume: u32) -> Result<()> {
    if volume > MAX_VOLUME {
        return Err(Error::validation(
            "volume",
            format!("{volume} exceeds max ({MAX_VOLUME})"),
        ));
    }
    Ok(())
}

pub fn validate_alert_sound_id(id: u32) -> Result<()> {
    if !(1..=MAX_ALERT_SOUND_ID).contains(&id) {
        return Err(Error::validation(
            "sound",
            format!("alert sound {id} does not exist (1-{MAX_ALERT_SOUND_ID})"),
        ));
    }
    Ok(())
}

/// Validates a custom sound path for use inside a quoted filter token.
///
/// # Errors
///
/// Returns `Err` if the path is empty, contains a double quote, or contains
/// a line break.
pub fn validate_sound_path(path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(Error::validation("sound", "sound path cannot be empty"));
    }
    if path.contains('"') || path.contains('\n') || path.contains('\r') {
        return Err(Error::validation(
            "sound",
            "sound path cannot contain quotes or line breaks",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_comment_collapses_line_breaks() {
        assert_eq!(sanitize_comment("a\r\nb"), "a b");
        assert_eq!(sanitize_comment("a\n\n\nb"), "a b");
        assert_eq!(sanitize_comment("\nlead"), "lead");
    }

    #[test]
    fn test_sanitize_comment_drops_controls() {
        assert_eq!(sanitize_comment("bell\u{7}name"), "bellname");
        assert_eq!(sanitize_comment("[1] Currency"), "[1] Currency");
    }

    #[test]
    fn test_font_size_bounds() {
        assert!(validate_font_size(1.0).is_ok());
        assert!(validate_font_size(45.0).is_ok());
        assert!(validate_font_size(0.0).is_err());
        assert!(validate_font_size(46.0).is_err());
        assert!(validate_font_size(f64::NAN).is_err());
    }

    #[test]
    fn test_color_bounds() {
        assert!(validate_color(&Rgba::new(255.0, 0.0, 0.0, 255.0)).is_ok());
        let err = validate_color(&Rgba::new(0.0, 256.0, 0.0, 255.0)).unwrap_err();
        assert!(err.to_string().contains("channel g"));
        assert!(validate_color(&Rgba::new(0.0, 0.0, 0.0, -1.0)).is_err());
    }

    #[test]
    fn test_volume_and_sound_id() {
        assert!(validate_volume(0).is_ok());
        assert!(validate_volume(300).is_ok());
        assert!(validate_volume(301).is_err());
        assert!(validate_alert_sound_id(0).is_err());
        assert!(validate_alert_sound_id(16).is_ok());
        assert!(validate_alert_sound_id(17).is_err());
    }

    #[test]
    fn test_sound_path() {
        assert!(validate_sound_path("sounds/divine.mp3").is_ok());
        assert!(validate_sound_path("  ").is_err());
        assert!(validate_sound_path("bad\"quote.mp3").is_err());
    }
}
