//! What the panels are currently showing, and which operator controls
//! that allows.

use serde::Serialize;

use panelcast_protocol::Command;

/// Display mode shared by all panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    /// Panels show the score. Nothing is running.
    #[default]
    ShowPanel,
    ShowSpots,
    ShowSlides,
    ShowCamera,
}

/// Operator start/stop buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    SpotLoop,
    SlideShow,
    LiveCamera,
}

impl Toggle {
    /// The mode this toggle turns on.
    pub fn mode(self) -> Mode {
        match self {
            Toggle::SpotLoop => Mode::ShowSpots,
            Toggle::SlideShow => Mode::ShowSlides,
            Toggle::LiveCamera => Mode::ShowCamera,
        }
    }

    pub fn start_command(self) -> Command {
        match self {
            Toggle::SpotLoop => Command::SpotLoop,
            Toggle::SlideShow => Command::SlideShow,
            Toggle::LiveCamera => Command::Live,
        }
    }

    pub fn stop_command(self) -> Command {
        match self {
            Toggle::SpotLoop => Command::EndSpotLoop,
            Toggle::SlideShow => Command::EndSlideShow,
            Toggle::LiveCamera => Command::EndLive,
        }
    }
}

/// Result of applying a toggle to the current mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Enter `mode`, broadcasting `command`.
    Start { mode: Mode, command: Command },
    /// Back to [`Mode::ShowPanel`], broadcasting `command`.
    Stop { command: Command },
    /// Another mode is active.
    Refused,
}

impl Mode {
    pub fn toggle(self, toggle: Toggle) -> Transition {
        if self == Mode::ShowPanel {
            Transition::Start {
                mode: toggle.mode(),
                command: toggle.start_command(),
            }
        } else if self == toggle.mode() {
            Transition::Stop {
                command: toggle.stop_command(),
            }
        } else {
            Transition::Refused
        }
    }

    /// Reply to a panel's `getStatus`: the start command of the running
    /// mode, or an empty message while showing the score.
    pub fn status_message(self) -> String {
        let command = match self {
            Mode::ShowPanel => return String::new(),
            Mode::ShowSpots => Command::SpotLoop,
            Mode::ShowSlides => Command::SlideShow,
            Mode::ShowCamera => Command::Live,
        };
        command.encode()
    }
}

/// Which operator controls are usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enablement {
    pub spot_loop: bool,
    pub slide_show: bool,
    pub live_camera: bool,
    pub panel_control: bool,
    pub general_setup: bool,
    pub shutdown: bool,
}

impl Enablement {
    /// Controls available with `panels` connected panels in `mode`.
    ///
    /// With no panels only the general setup stays available. While a mode
    /// runs, only its own toggle (to stop it) and shutdown are available.
    pub fn compute(mode: Mode, panels: usize) -> Self {
        if panels == 0 {
            return Self {
                spot_loop: false,
                slide_show: false,
                live_camera: false,
                panel_control: false,
                general_setup: true,
                shutdown: false,
            };
        }

        let idle = mode == Mode::ShowPanel;
        Self {
            spot_loop: idle || mode == Mode::ShowSpots,
            slide_show: idle || mode == Mode::ShowSlides,
            live_camera: idle || mode == Mode::ShowCamera,
            panel_control: idle,
            general_setup: idle,
            shutdown: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggles_start_from_panel() {
        assert_eq!(
            Mode::ShowPanel.toggle(Toggle::SpotLoop),
            Transition::Start {
                mode: Mode::ShowSpots,
                command: Command::SpotLoop
            }
        );
        assert_eq!(
            Mode::ShowPanel.toggle(Toggle::LiveCamera),
            Transition::Start {
                mode: Mode::ShowCamera,
                command: Command::Live
            }
        );
    }

    #[test]
    fn same_toggle_stops() {
        assert_eq!(
            Mode::ShowSlides.toggle(Toggle::SlideShow),
            Transition::Stop {
                command: Command::EndSlideShow
            }
        );
    }

    #[test]
    fn other_toggles_refused_while_active() {
        assert_eq!(Mode::ShowSpots.toggle(Toggle::SlideShow), Transition::Refused);
        assert_eq!(Mode::ShowSpots.toggle(Toggle::LiveCamera), Transition::Refused);
        assert_eq!(Mode::ShowCamera.toggle(Toggle::SpotLoop), Transition::Refused);
    }

    #[test]
    fn status_messages() {
        assert_eq!(Mode::ShowPanel.status_message(), "");
        assert_eq!(Mode::ShowSpots.status_message(), "<spotloop>1</spotloop>");
        assert_eq!(Mode::ShowSlides.status_message(), "<slideshow>1</slideshow>");
        assert_eq!(Mode::ShowCamera.status_message(), "<live>1</live>");
    }

    #[test]
    fn nothing_but_setup_without_panels() {
        let e = Enablement::compute(Mode::ShowSpots, 0);
        assert!(e.general_setup);
        assert!(!e.spot_loop && !e.slide_show && !e.live_camera);
        assert!(!e.panel_control && !e.shutdown);
    }

    #[test]
    fn everything_when_idle_with_panels() {
        let e = Enablement::compute(Mode::ShowPanel, 3);
        assert!(e.spot_loop && e.slide_show && e.live_camera);
        assert!(e.panel_control && e.general_setup && e.shutdown);
    }

    #[test]
    fn active_mode_locks_other_controls() {
        let e = Enablement::compute(Mode::ShowSlides, 1);
        assert!(e.slide_show);
        assert!(e.shutdown);
        assert!(!e.spot_loop && !e.live_camera);
        assert!(!e.panel_control && !e.general_setup);
    }
}
