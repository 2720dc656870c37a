//! Line-based operator console on stdin.

use std::net::IpAddr;

use panelcast_protocol::PanelDirection;

/// One operator action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    ToggleSpots,
    ToggleSlides,
    ToggleCamera,
    StartCamera(IpAddr),
    StopCamera,
    Panels,
    GetOrientation(IpAddr),
    SetOrientation(IpAddr, PanelDirection),
    GetScoreOnly(IpAddr),
    SetScoreOnly(IpAddr, bool),
    Pan(IpAddr, i32),
    Tilt(IpAddr, i32),
    GetPanTilt(IpAddr),
    ShutdownPanels,
    Reload,
    Status,
    Quit,
}

pub const HELP: &str = "\
commands:
  spots | slides | camera           start/stop a mode on every panel
  camera <ip> | camera off          live camera on one panel / stop it
  panels | status                   connected panels / mode and controls
  orientation <ip> [normal|reflected]
  scoreonly <ip> [on|off]
  pan <ip> <value> | tilt <ip> <value> | pantilt <ip>
  reload                            rescan media directories
  shutdown                          power down every panel
  quit";

/// Parses one console line. Returns `None` for blank or unknown input.
pub fn parse(line: &str) -> Option<OperatorCommand> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let ip = |i: usize| words.get(i).and_then(|w| w.parse::<IpAddr>().ok());

    let command = match words.as_slice() {
        ["spots"] => OperatorCommand::ToggleSpots,
        ["slides"] => OperatorCommand::ToggleSlides,
        ["camera"] => OperatorCommand::ToggleCamera,
        ["camera", "off"] => OperatorCommand::StopCamera,
        ["camera", _] => OperatorCommand::StartCamera(ip(1)?),
        ["panels"] => OperatorCommand::Panels,
        ["status"] => OperatorCommand::Status,
        ["orientation", _] => OperatorCommand::GetOrientation(ip(1)?),
        ["orientation", _, direction] => {
            let direction = match *direction {
                "normal" => PanelDirection::Normal,
                "reflected" => PanelDirection::Reflected,
                _ => return None,
            };
            OperatorCommand::SetOrientation(ip(1)?, direction)
        }
        ["scoreonly", _] => OperatorCommand::GetScoreOnly(ip(1)?),
        ["scoreonly", _, flag] => {
            let flag = match *flag {
                "on" => true,
                "off" => false,
                _ => return None,
            };
            OperatorCommand::SetScoreOnly(ip(1)?, flag)
        }
        ["pan", _, value] => OperatorCommand::Pan(ip(1)?, value.parse().ok()?),
        ["tilt", _, value] => OperatorCommand::Tilt(ip(1)?, value.parse().ok()?),
        ["pantilt", _] => OperatorCommand::GetPanTilt(ip(1)?),
        ["reload"] => OperatorCommand::Reload,
        ["shutdown"] => OperatorCommand::ShutdownPanels,
        ["quit"] | ["exit"] => OperatorCommand::Quit,
        _ => return None,
    };
    Some(command)
}
