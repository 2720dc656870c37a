//! Control channel vocabulary: reports sent by panels and commands sent by
//! the coordinator.

use serde::{Deserialize, Serialize};

use crate::ParseError;
use crate::constants::Tag;
use crate::tags::wrap;

/// Mounting direction of a panel's screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelDirection {
    Normal,
    Reflected,
}

impl PanelDirection {
    /// Integer code used on the wire.
    pub fn code(self) -> i32 {
        match self {
            PanelDirection::Normal => 0,
            PanelDirection::Reflected => 1,
        }
    }

    /// Decodes a wire code. Unknown codes are rejected.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(PanelDirection::Normal),
            1 => Some(PanelDirection::Reflected),
            _ => None,
        }
    }
}

/// A message a panel sends on its control connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelReport {
    /// `<getStatus>`: the panel wants the coordinator's current status.
    StatusRequest,
    /// `<pan_tilt>pan,tilt</pan_tilt>`: current camera position.
    PanTilt { pan: i32, tilt: i32 },
    /// `<orientation>code</orientation>`.
    Orientation(PanelDirection),
    /// `<isScoreOnly>flag</isScoreOnly>`.
    ScoreOnly(bool),
}

/// Extracts every report present in a control frame.
///
/// Tags are examined in a fixed order (`getStatus`, `pan_tilt`,
/// `orientation`, `isScoreOnly`); a malformed value yields an `Err` entry
/// without affecting the other tags.
pub fn parse_reports(message: &str) -> Vec<Result<PanelReport, ParseError>> {
    let mut reports = Vec::new();

    if Tag::GetStatus.extract(message).is_some() {
        reports.push(Ok(PanelReport::StatusRequest));
    }
    if let Some(value) = Tag::PanTilt.extract(message) {
        reports.push(parse_pan_tilt(value));
    }
    if let Some(value) = Tag::Orientation.extract(message) {
        reports.push(parse_orientation(value));
    }
    if let Some(value) = Tag::IsScoreOnly.extract(message) {
        reports.push(parse_score_only(value));
    }

    reports
}

fn parse_pan_tilt(value: &str) -> Result<PanelReport, ParseError> {
    let fields: Vec<&str> = value.split(',').filter(|f| !f.is_empty()).collect();
    if fields.len() < 2 {
        return Err(ParseError::MissingFields {
            tag: Tag::PanTilt.as_str(),
            expected: 2,
            got: fields.len(),
        });
    }
    let invalid = || ParseError::InvalidValue {
        tag: Tag::PanTilt.as_str(),
        value: value.to_string(),
    };
    let pan = fields[0].trim().parse().map_err(|_| invalid())?;
    let tilt = fields[1].trim().parse().map_err(|_| invalid())?;
    Ok(PanelReport::PanTilt { pan, tilt })
}

fn parse_orientation(value: &str) -> Result<PanelReport, ParseError> {
    value
        .trim()
        .parse::<i32>()
        .ok()
        .and_then(PanelDirection::from_code)
        .map(PanelReport::Orientation)
        .ok_or_else(|| ParseError::InvalidValue {
            tag: Tag::Orientation.as_str(),
            value: value.to_string(),
        })
}

fn parse_score_only(value: &str) -> Result<PanelReport, ParseError> {
    value
        .trim()
        .parse::<i32>()
        .map(|flag| PanelReport::ScoreOnly(flag != 0))
        .map_err(|_| ParseError::InvalidValue {
            tag: Tag::IsScoreOnly.as_str(),
            value: value.to_string(),
        })
}

/// A command the coordinator sends to one or all panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "value", rename_all = "camelCase")]
pub enum Command {
    SpotLoop,
    EndSpotLoop,
    Live,
    EndLive,
    SlideShow,
    EndSlideShow,
    Kill,
    GetOrientation,
    SetOrientation(PanelDirection),
    GetScoreOnly,
    SetScoreOnly(bool),
    Pan(i32),
    Tilt(i32),
    GetPanTilt,
}

impl Command {
    /// The tag this command is sent under.
    pub fn tag(&self) -> Tag {
        match self {
            Command::SpotLoop => Tag::SpotLoop,
            Command::EndSpotLoop => Tag::EndSpotLoop,
            Command::Live => Tag::Live,
            Command::EndLive => Tag::EndLive,
            Command::SlideShow => Tag::SlideShow,
            Command::EndSlideShow => Tag::EndSlideShow,
            Command::Kill => Tag::Kill,
            Command::GetOrientation => Tag::GetOrientation,
            Command::SetOrientation(_) => Tag::SetOrientation,
            Command::GetScoreOnly => Tag::GetScoreOnly,
            Command::SetScoreOnly(_) => Tag::SetScoreOnly,
            Command::Pan(_) => Tag::Pan,
            Command::Tilt(_) => Tag::Tilt,
            Command::GetPanTilt => Tag::GetPanTilt,
        }
    }

    /// Encodes the command as a text frame. Commands without an argument
    /// carry the value `1`.
    pub fn encode(&self) -> String {
        let tag = self.tag();
        match *self {
            Command::SetOrientation(direction) => wrap(tag, direction.code()),
            Command::SetScoreOnly(flag) => wrap(tag, i32::from(flag)),
            Command::Pan(value) | Command::Tilt(value) => wrap(tag, value),
            _ => wrap(tag, 1),
        }
    }
}
