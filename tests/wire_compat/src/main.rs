//! Wire compatibility tests.
//!
//! Pins the exact text and binary frames panels in the field expect. The
//! fixtures under `fixtures/` are the reference; any change to the encoders
//! that alters a frame shows up here first.

fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::path::PathBuf;

    use serde::Deserialize;

    use panelcast_protocol::control::parse_reports;
    use panelcast_protocol::transfer::{
        self, EMPTY_FILE_LIST, FileListing, GetRequest, PREAMBLE_SIZE,
    };
    use panelcast_protocol::{Command, PanelDirection, PanelReport, discovery};

    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn load_fixture<T: for<'de> Deserialize<'de>>(name: &str) -> T {
        let path = fixtures_dir().join(name);
        let content = std::fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&content)
            .unwrap_or_else(|e| panic!("failed to parse fixture {name}: {e}"))
    }

    // ---- Fixture shapes ----

    #[derive(Deserialize)]
    struct CommandCase {
        command: serde_json::Value,
        wire: String,
    }

    #[derive(Deserialize)]
    struct ReportCase {
        wire: String,
        reports: Vec<ExpectedReport>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(tag = "kind", rename_all = "camelCase")]
    enum ExpectedReport {
        Status,
        PanTilt {
            pan: i32,
            tilt: i32,
        },
        Orientation {
            direction: PanelDirection,
        },
        #[serde(rename_all = "camelCase")]
        ScoreOnly {
            score_only: bool,
        },
        Invalid,
    }

    impl ExpectedReport {
        fn matches(&self, actual: &Result<PanelReport, panelcast_protocol::ParseError>) -> bool {
            match (self, actual) {
                (ExpectedReport::Status, Ok(PanelReport::StatusRequest)) => true,
                (ExpectedReport::PanTilt { pan, tilt }, Ok(PanelReport::PanTilt { pan: p, tilt: t })) => {
                    pan == p && tilt == t
                }
                (ExpectedReport::Orientation { direction }, Ok(PanelReport::Orientation(d))) => {
                    direction == d
                }
                (ExpectedReport::ScoreOnly { score_only }, Ok(PanelReport::ScoreOnly(flag))) => {
                    score_only == flag
                }
                (ExpectedReport::Invalid, Err(_)) => true,
                _ => false,
            }
        }
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct TransferFixture {
        file_list: FileListCase,
        empty_file_list: String,
        get: GetCase,
        missing_file: MissingFileCase,
        preamble: PreambleCase,
    }

    #[derive(Deserialize)]
    struct FileListCase {
        files: Vec<FileEntry>,
        wire: String,
    }

    #[derive(Deserialize)]
    struct FileEntry {
        name: String,
        size: u64,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct GetCase {
        wire: String,
        file_name: String,
        start: u64,
        length: u64,
    }

    #[derive(Deserialize)]
    struct MissingFileCase {
        token: String,
        wire: String,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct PreambleCase {
        file_name: String,
        size: u64,
        header: String,
        length: usize,
    }

    #[derive(Deserialize)]
    struct DiscoveryFixture {
        request: String,
        addresses: Vec<Ipv4Addr>,
        reply: String,
    }

    // ---- Control channel ----

    #[test]
    fn command_frames() {
        let cases: Vec<CommandCase> = load_fixture("commands.json");
        assert!(!cases.is_empty());

        for case in cases {
            let command: Command = serde_json::from_value(case.command.clone())
                .unwrap_or_else(|e| panic!("bad command {}: {e}", case.command));
            assert_eq!(command.encode(), case.wire, "encoding {command:?}");

            // The JSON form is what the operator tooling stores.
            let json = serde_json::to_value(command).unwrap();
            assert_eq!(json, case.command, "JSON form of {command:?}");
        }
    }

    #[test]
    fn report_frames() {
        let cases: Vec<ReportCase> = load_fixture("reports.json");

        for case in cases {
            let actual = parse_reports(&case.wire);
            assert_eq!(
                actual.len(),
                case.reports.len(),
                "report count for {:?}: {actual:?}",
                case.wire
            );
            for (expected, actual) in case.reports.iter().zip(&actual) {
                assert!(
                    expected.matches(actual),
                    "{:?}: expected {expected:?}, got {actual:?}",
                    case.wire
                );
            }
        }
    }

    // ---- File services ----

    #[test]
    fn file_list_frames() {
        let fixture: TransferFixture = load_fixture("transfer.json");

        let entries: Vec<FileListing> = fixture
            .file_list
            .files
            .iter()
            .map(|f| FileListing {
                name: f.name.clone(),
                size: f.size,
            })
            .collect();
        assert_eq!(transfer::encode_file_list(&entries), fixture.file_list.wire);
        assert_eq!(
            transfer::parse_file_list(&fixture.file_list.wire),
            Some(entries)
        );

        assert_eq!(fixture.empty_file_list, EMPTY_FILE_LIST);
        assert_eq!(transfer::encode_file_list(&[]), fixture.empty_file_list);
    }

    #[test]
    fn get_and_missing_file_frames() {
        let fixture: TransferFixture = load_fixture("transfer.json");

        let token = panelcast_protocol::Tag::Get
            .extract(&fixture.get.wire)
            .expect("get element");
        let request = GetRequest::parse(token).unwrap();
        assert_eq!(request.file_name, fixture.get.file_name);
        assert_eq!(request.start, fixture.get.start);
        assert_eq!(request.length, fixture.get.length);
        assert_eq!(request.encode(), fixture.get.wire);

        assert_eq!(
            transfer::encode_missing_file(&fixture.missing_file.token),
            fixture.missing_file.wire
        );
    }

    #[test]
    fn preamble_layout() {
        let fixture: TransferFixture = load_fixture("transfer.json");
        let case = fixture.preamble;
        assert_eq!(case.length, PREAMBLE_SIZE);

        let preamble = transfer::encode_preamble(&case.file_name, case.size).unwrap();
        assert_eq!(preamble.len(), case.length);
        assert_eq!(&preamble[..case.header.len()], case.header.as_bytes());
        assert!(preamble[case.header.len()..].iter().all(|&b| b == 0));
        assert_eq!(
            transfer::decode_preamble(&preamble),
            Some((case.file_name, case.size))
        );
    }

    // ---- Discovery ----

    #[test]
    fn discovery_frames() {
        let fixture: DiscoveryFixture = load_fixture("discovery.json");

        assert!(discovery::is_server_request(fixture.request.as_bytes()));
        assert_eq!(
            discovery::encode_server_reply(&fixture.addresses),
            fixture.reply
        );
        assert_eq!(
            discovery::parse_server_reply(&fixture.reply),
            Some(fixture.addresses)
        );
    }
}
