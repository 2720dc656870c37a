use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

/// UDP port panels send `getServer` requests to.
pub const DISCOVERY_PORT: u16 = 45453;

/// WebSocket port of the control channel.
pub const CONTROL_PORT: u16 = 45454;

/// WebSocket port of the spot (video) file service.
pub const SPOT_PORT: u16 = 45455;

/// WebSocket port of the slide (image) file service.
pub const SLIDE_PORT: u16 = 45456;

/// Multicast group joined by the discovery listener.
pub const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 1);

/// How often to ping a connected panel.
pub const WS_PING_PERIOD: Duration = Duration::from_secs(5);

/// Read deadline: a panel that sends nothing (not even a pong) for this
/// long is considered gone.
pub const WS_PONG_WAIT: Duration = Duration::from_secs(60);

/// Maximum frame size accepted from a panel (requests are tiny; chunks are
/// only ever sent by the coordinator).
pub const WS_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Every tag spoken on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    // Discovery
    GetServer,
    ServerIp,

    // Panel -> coordinator
    GetStatus,
    PanTilt,
    Orientation,
    IsScoreOnly,

    // Coordinator -> panel
    SpotLoop,
    EndSpotLoop,
    Live,
    EndLive,
    SlideShow,
    EndSlideShow,
    Kill,
    GetOrientation,
    SetOrientation,
    GetScoreOnly,
    SetScoreOnly,
    Pan,
    Tilt,
    GetPanTilt,

    // File services
    SendFileList,
    FileList,
    Get,
    MissingFile,
}

impl Tag {
    /// Returns the literal element name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Tag::GetServer => "getServer",
            Tag::ServerIp => "serverIP",
            Tag::GetStatus => "getStatus",
            Tag::PanTilt => "pan_tilt",
            Tag::Orientation => "orientation",
            Tag::IsScoreOnly => "isScoreOnly",
            Tag::SpotLoop => "spotloop",
            Tag::EndSpotLoop => "endspotloop",
            Tag::Live => "live",
            Tag::EndLive => "endlive",
            Tag::SlideShow => "slideshow",
            Tag::EndSlideShow => "endslideshow",
            Tag::Kill => "kill",
            Tag::GetOrientation => "getOrientation",
            Tag::SetOrientation => "setOrientation",
            Tag::GetScoreOnly => "getScoreOnly",
            Tag::SetScoreOnly => "setScoreOnly",
            Tag::Pan => "pan",
            Tag::Tilt => "tilt",
            Tag::GetPanTilt => "getPanTilt",
            Tag::SendFileList => "send_file_list",
            Tag::FileList => "file_list",
            Tag::Get => "get",
            Tag::MissingFile => "missingFile",
        }
    }

    /// Returns the value of this tag inside `message`, if present.
    pub fn extract(self, message: &str) -> Option<&str> {
        crate::tags::extract(message, self.as_str())
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ports_are_distinct() {
        let ports = [DISCOVERY_PORT, CONTROL_PORT, SPOT_PORT, SLIDE_PORT];
        for (i, a) in ports.iter().enumerate() {
            for b in &ports[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn tag_display_matches_wire_name() {
        assert_eq!(Tag::PanTilt.to_string(), "pan_tilt");
        assert_eq!(Tag::ServerIp.to_string(), "serverIP");
        assert_eq!(Tag::SendFileList.to_string(), "send_file_list");
    }

    #[test]
    fn tag_extract() {
        assert_eq!(Tag::Get.extract("<get>a.jpg,0,10</get>"), Some("a.jpg,0,10"));
        assert_eq!(Tag::Get.extract("<getStatus>1</getStatus>"), None);
    }
}
