//! Filter actions (style, sound, icon and beam settings of a block)
//!
//! Every action is optional. An absent or disabled action is left out of the
//! emitted block entirely; the game then applies its own default.
//!
//! # Alpha scales
//!
//! Colors are stored with alpha on a 0-255 scale. `SetBorderColor` and
//! `SetBackgroundColor` emit that byte directly. `SetTextColor` is written on
//! the legacy unit scale (`round(a / 255)`), so an opaque text color is
//! emitted as `SetTextColor 255 0 0 1`. Import reverses the unit scale for
//! alpha values of at most 1.

use crate::codec::lexer::Token;
use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Alpha used when an imported color line omits it
pub const DEFAULT_IMPORT_ALPHA: f64 = 240.0;

/// Volume used when an imported sound line omits it
pub const DEFAULT_VOLUME: u32 = 300;

/// Leading keywords that mark a line inside a block as an action
pub const ACTION_PREFIXES: [&str; 6] = [
    "Set",
    "Play",
    "MinimapIcon",
    "EnableDropSound",
    "DisableDropSound",
    "CustomAlertSound",
];

pub fn is_action_keyword(keyword: &str) -> bool {
    ACTION_PREFIXES.iter().any(|p| keyword.starts_with(p))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Rgba {
    pub const fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }
}

/// How alpha is written for one color action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaScale {
    /// 0-255, same as storage
    Byte,
    /// 0-1 integer, legacy `SetTextColor` form
    Unit,
}

impl AlphaScale {
    pub fn emit(self, alpha: f64) -> i64 {
        let alpha = alpha.clamp(0.0, 255.0);
        match self {
            AlphaScale::Byte => alpha.round() as i64,
            AlphaScale::Unit => (alpha / 255.0).round() as i64,
        }
    }

    pub fn import(self, raw: f64) -> f64 {
        match self {
            AlphaScale::Unit if raw <= 1.0 => (raw * 255.0).clamp(0.0, 255.0),
            _ => raw.clamp(0.0, 255.0),
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
pub enum IconSize {
    Large,
    Medium,
    #[default]
    Small,
}

impl IconSize {
    /// Numeric form used in `MinimapIcon` lines
    pub const fn as_number(self) -> u8 {
        match self {
            IconSize::Large => 0,
            IconSize::Medium => 1,
            IconSize::Small => 2,
        }
    }

    pub const fn from_number(n: i64) -> Option<Self> {
        match n {
            0 => Some(IconSize::Large),
            1 => Some(IconSize::Medium),
            2 => Some(IconSize::Small),
            _ => None,
        }
    }
}

/// Color keyword shared by minimap icons and beams
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
pub enum EffectColor {
    #[default]
    Red,
    Green,
    Blue,
    Brown,
    White,
    Yellow,
    Cyan,
    Grey,
    Orange,
    Pink,
    Purple,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
pub enum IconShape {
    #[default]
    Circle,
    Diamond,
    Hexagon,
    Square,
    Star,
    Triangle,
    Cross,
    Moon,
    Raindrop,
    Kite,
    Pentagon,
    UpsideDownHouse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinimapIcon {
    pub size: IconSize,
    pub color: EffectColor,
    pub shape: IconShape,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beam {
    pub color: EffectColor,
    /// Only shown while the item is dropping
    pub temp: bool,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropSound {
    pub enabled: bool,
    /// `true` emits `EnableDropSound`, `false` emits `DisableDropSound`
    pub toggle: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SoundSource {
    /// One of the game's numbered alert sounds
    Builtin { id: u32 },
    /// A sound file next to the filter
    Custom { path: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertSound {
    pub enabled: bool,
    pub source: SoundSource,
    pub volume: u32,
    /// Builtin only: `PlayAlertSoundPositional`
    #[serde(default)]
    pub positional: bool,
    /// Custom only: `CustomAlertSoundOptional` (no error if the file is missing)
    #[serde(default)]
    pub optional: bool,
}

/// Action keywords understood on import
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, strum::AsRefStr)]
pub enum ActionKind {
    SetFontSize,
    SetTextColor,
    SetBorderColor,
    SetBackgroundColor,
    MinimapIcon,
    PlayEffect,
    PlayAlertSound,
    PlayAlertSoundPositional,
    CustomAlertSound,
    CustomAlertSoundOptional,
    EnableDropSound,
    DisableDropSound,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Actions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<Rgba>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<Rgba>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<Rgba>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<MinimapIcon>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop_sound: Option<DropSound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<AlertSound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beam: Option<Beam>,
}

/// `<keyword> r g b a` with components rounded
pub fn color_line(keyword: &str, color: &Rgba, scale: AlphaScale) -> String {
    let channel = |v: f64| v.clamp(0.0, 255.0).round() as i64;
    format!(
        "{keyword} {} {} {} {}",
        channel(color.r),
        channel(color.g),
        channel(color.b),
        scale.emit(color.a)
    )
}

impl Actions {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Renders every present, enabled action in emission order
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();

        if let Some(size) = self.font_size {
            lines.push(format!("SetFontSize {}", size.round() as i64));
        }
        if let Some(color) = &self.text {
            lines.push(color_line("SetTextColor", color, AlphaScale::Unit));
        }
        if let Some(color) = &self.border {
            lines.push(color_line("SetBorderColor", color, AlphaScale::Byte));
        }
        if let Some(color) = &self.background {
            lines.push(color_line("SetBackgroundColor", color, AlphaScale::Byte));
        }
        if let Some(icon) = self.icon.filter(|i| i.enabled) {
            lines.push(format!(
                "MinimapIcon {} {} {}",
                icon.size.as_number(),
                icon.color,
                icon.shape
            ));
        }
        if let Some(drop) = self.drop_sound.filter(|d| d.enabled) {
            let keyword = if drop.toggle {
                ActionKind::EnableDropSound
            } else {
                ActionKind::DisableDropSound
            };
            lines.push(keyword.to_string());
        }
        if let Some(sound) = self.sound.as_ref().filter(|s| s.enabled) {
            let mut line = String::new();
            match &sound.source {
                SoundSource::Builtin { id } => {
                    let keyword = if sound.positional {
                        ActionKind::PlayAlertSoundPositional
                    } else {
                        ActionKind::PlayAlertSound
                    };
                    let _ = write!(line, "{keyword} {id} {}", sound.volume);
                }
                SoundSource::Custom { path } => {
                    let keyword = if sound.optional {
                        ActionKind::CustomAlertSoundOptional
                    } else {
                        ActionKind::CustomAlertSound
                    };
                    let _ = write!(line, "{keyword} \"{path}\" {}", sound.volume);
                }
            }
            lines.push(line);
        }
        if let Some(beam) = self.beam.filter(|b| b.enabled) {
            let mut line = format!("PlayEffect {}", beam.color);
            if beam.temp {
                line.push_str(" Temp");
            }
            lines.push(line);
        }
        lines
    }

    /// Folds one tokenized action line into these actions.
    ///
    /// A later line for the same action replaces the earlier one, as in game.
    pub fn apply_line(&mut self, tokens: &[Token<'_>], line_no: usize) -> Result<()> {
        let Some((keyword, params)) = tokens.split_first() else {
            return Err(Error::parse(line_no, "empty action"));
        };
        let kind: ActionKind = keyword
            .text
            .parse()
            .map_err(|_| Error::parse(line_no, format!("unknown action '{}'", keyword.text)))?;

        match kind {
            ActionKind::SetFontSize => {
                self.font_size = Some(number_at(params, 0, line_no)?);
            }
            ActionKind::SetTextColor => {
                self.text = Some(parse_color(params, AlphaScale::Unit, line_no)?);
            }
            ActionKind::SetBorderColor => {
                self.border = Some(parse_color(params, AlphaScale::Byte, line_no)?);
            }
            ActionKind::SetBackgroundColor => {
                self.background = Some(parse_color(params, AlphaScale::Byte, line_no)?);
            }
            ActionKind::MinimapIcon => {
                let size = number_at(params, 0, line_no)? as i64;
                if size < 0 {
                    // `MinimapIcon -1` clears an icon set by an earlier block
                    self.icon = None;
                    return Ok(());
                }
                let size = IconSize::from_number(size)
                    .ok_or_else(|| Error::parse(line_no, format!("invalid icon size {size}")))?;
                self.icon = Some(MinimapIcon {
                    size,
                    color: keyword_at(params, 1, line_no)?,
                    shape: keyword_at(params, 2, line_no)?,
                    enabled: true,
                });
            }
            ActionKind::PlayEffect => {
                if params.first().is_some_and(|p| p.text == "None") {
                    self.beam = None;
                    return Ok(());
                }
                self.beam = Some(Beam {
                    color: keyword_at(params, 0, line_no)?,
                    temp: params.get(1).is_some_and(|p| p.text == "Temp"),
                    enabled: true,
                });
            }
            ActionKind::PlayAlertSound | ActionKind::PlayAlertSoundPositional => {
                let id = number_at(params, 0, line_no)?;
                if id < 0.0 {
                    return Err(Error::parse(line_no, "alert sound id must be positive"));
                }
                self.sound = Some(AlertSound {
                    enabled: true,
                    source: SoundSource::Builtin { id: id as u32 },
                    volume: volume_at(params, 1, line_no)?,
                    positional: kind == ActionKind::PlayAlertSoundPositional,
                    optional: false,
                });
            }
            ActionKind::CustomAlertSound | ActionKind::CustomAlertSoundOptional => {
                let path = params
                    .first()
                    .ok_or_else(|| Error::parse(line_no, "missing sound file"))?;
                self.sound = Some(AlertSound {
                    enabled: true,
                    source: SoundSource::Custom {
                        path: path.text.to_string(),
                    },
                    volume: volume_at(params, 1, line_no)?,
                    positional: false,
                    optional: kind == ActionKind::CustomAlertSoundOptional,
                });
            }
            ActionKind::EnableDropSound | ActionKind::DisableDropSound => {
                self.drop_sound = Some(DropSound {
                    enabled: true,
                    toggle: kind == ActionKind::EnableDropSound,
                });
            }
        }
        Ok(())
    }
}

fn number_at(params: &[Token<'_>], index: usize, line_no: usize) -> Result<f64> {
    let token = params
        .get(index)
        .ok_or_else(|| Error::parse(line_no, format!("missing parameter {}", index + 1)))?;
    token
        .text
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| Error::parse(line_no, format!("'{}' is not a number", token.text)))
}

fn keyword_at<T: std::str::FromStr>(params: &[Token<'_>], index: usize, line_no: usize) -> Result<T> {
    let token = params
        .get(index)
        .ok_or_else(|| Error::parse(line_no, format!("missing parameter {}", index + 1)))?;
    token
        .text
        .parse()
        .map_err(|_| Error::parse(line_no, format!("unknown keyword '{}'", token.text)))
}

fn volume_at(params: &[Token<'_>], index: usize, line_no: usize) -> Result<u32> {
    if params.get(index).is_none() {
        return Ok(DEFAULT_VOLUME);
    }
    Ok(number_at(params, index, line_no)?.clamp(0.0, f64::from(u32::MAX)) as u32)
}

fn parse_color(params: &[Token<'_>], scale: AlphaScale, line_no: usize) -> Result<Rgba> {
    let alpha = if params.len() > 3 {
        scale.import(number_at(params, 3, line_no)?)
    } else {
        DEFAULT_IMPORT_ALPHA
    };
    Ok(Rgba::new(
        number_at(params, 0, line_no)?,
        number_at(params, 1, line_no)?,
        number_at(params, 2, line_no)?,
        alpha,
    ))
}
