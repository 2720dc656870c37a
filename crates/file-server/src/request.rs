//! Answers `send_file_list` and `get` requests from a catalog.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Component, Path};

use panelcast_catalog::Catalog;
use panelcast_protocol::Tag;
use panelcast_protocol::transfer::{
    GetRequest, encode_file_list, encode_missing_file, encode_preamble,
};

/// A frame to send back to the requesting panel.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Response {
    Text(String),
    Binary(Vec<u8>),
}

/// Handles every request tag in `message`, in the order file list, chunk.
/// Requests that cannot be served are logged and produce no response.
pub(crate) fn handle(catalog: &Catalog, message: &str) -> Vec<Response> {
    let mut responses = Vec::new();

    if Tag::SendFileList.extract(message).is_some() {
        responses.push(Response::Text(encode_file_list(&catalog.listings())));
    }

    if let Some(token) = Tag::Get.extract(message) {
        responses.extend(serve_chunk(catalog, token));
    }

    responses
}

fn serve_chunk(catalog: &Catalog, token: &str) -> Option<Response> {
    let request = match GetRequest::parse(token) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!("malformed get request: {e}");
            return None;
        }
    };

    let path = catalog.resolve(&request.file_name);
    let size = match std::fs::metadata(&path) {
        Ok(meta) if meta.is_file() && is_contained(&request.file_name) => meta.len(),
        _ => {
            tracing::info!(file = %request.file_name, "requested file is missing");
            return Some(Response::Text(encode_missing_file(token)));
        }
    };

    if request.start >= size {
        tracing::warn!(file = %request.file_name, start = request.start, size, "chunk start beyond end of file");
        return None;
    }

    let mut frame = if request.start == 0 {
        match encode_preamble(&request.file_name, size) {
            Ok(preamble) => preamble,
            Err(e) => {
                tracing::warn!(file = %request.file_name, "cannot build preamble: {e}");
                return None;
            }
        }
    } else {
        Vec::new()
    };

    match read_range(&path, request.start, request.length, &mut frame) {
        Ok(0) => {
            tracing::warn!(file = %request.file_name, start = request.start, "no data could be read");
            None
        }
        Ok(_) => Some(Response::Binary(frame)),
        Err(e) => {
            tracing::warn!(file = %request.file_name, start = request.start, "read failed: {e}");
            None
        }
    }
}

/// Appends up to `length` bytes starting at `start` to `buf`.
fn read_range(path: &Path, start: u64, length: u64, buf: &mut Vec<u8>) -> std::io::Result<usize> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(start))?;
    file.take(length).read_to_end(buf)
}

/// Requests may name any file below the catalog directory, but never
/// climb out of it.
fn is_contained(name: &str) -> bool {
    let mut components = Path::new(name).components().peekable();
    components.peek().is_some() && components.all(|c| matches!(c, Component::Normal(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use panelcast_protocol::transfer::{EMPTY_FILE_LIST, PREAMBLE_SIZE, decode_preamble};
    use tempfile::TempDir;

    fn fixture() -> (TempDir, Catalog) {
        let dir = TempDir::new().unwrap();
        let a: Vec<u8> = (0..100u8).collect();
        std::fs::write(dir.path().join("a.jpg"), &a).unwrap();
        std::fs::write(dir.path().join("b.jpg"), vec![7u8; 200]).unwrap();
        let catalog = Catalog::scan(dir.path(), "*.jpg");
        (dir, catalog)
    }

    fn binary(responses: Vec<Response>) -> Vec<u8> {
        match responses.as_slice() {
            [Response::Binary(data)] => data.clone(),
            other => panic!("expected one binary response, got {other:?}"),
        }
    }

    #[test]
    fn file_list_in_catalog_order() {
        let (_dir, catalog) = fixture();
        assert_eq!(
            handle(&catalog, "<send_file_list>1</send_file_list>"),
            vec![Response::Text(
                "<file_list>a.jpg;100,b.jpg;200</file_list>".into()
            )]
        );
    }

    #[test]
    fn empty_catalog_list() {
        let dir = TempDir::new().unwrap();
        let catalog = Catalog::scan(dir.path(), "*.jpg");
        assert_eq!(
            handle(&catalog, "<send_file_list></send_file_list>"),
            vec![Response::Text(EMPTY_FILE_LIST.into())]
        );
    }

    #[test]
    fn first_chunk_carries_preamble() {
        let (_dir, catalog) = fixture();
        let frame = binary(handle(&catalog, "<get>a.jpg,0,100</get>"));

        assert_eq!(frame.len(), PREAMBLE_SIZE + 100);
        assert_eq!(decode_preamble(&frame), Some(("a.jpg".to_string(), 100)));
        assert!(frame[9..PREAMBLE_SIZE].iter().all(|&b| b == 0));
        let expected: Vec<u8> = (0..100u8).collect();
        assert_eq!(&frame[PREAMBLE_SIZE..], expected.as_slice());
    }

    #[test]
    fn later_chunk_is_raw_and_clamped() {
        let (_dir, catalog) = fixture();
        let frame = binary(handle(&catalog, "<get>a.jpg,90,64</get>"));
        assert_eq!(frame, (90..100u8).collect::<Vec<_>>());
    }

    #[test]
    fn start_beyond_end_is_dropped() {
        let (_dir, catalog) = fixture();
        assert!(handle(&catalog, "<get>a.jpg,100,10</get>").is_empty());
        assert!(handle(&catalog, "<get>a.jpg,5000,10</get>").is_empty());
    }

    #[test]
    fn missing_file_gets_explicit_reply() {
        let (_dir, catalog) = fixture();
        assert_eq!(
            handle(&catalog, "<get>nope.jpg,0,10</get>"),
            vec![Response::Text(
                "<missingFile>get,nope.jpg,0,10</missingFile>".into()
            )]
        );
    }

    #[test]
    fn files_outside_the_snapshot_are_still_served() {
        let (dir, catalog) = fixture();
        std::fs::write(dir.path().join("late.png"), b"xyz").unwrap();
        let frame = binary(handle(&catalog, "<get>late.png,1,10</get>"));
        assert_eq!(frame, b"yz");
    }

    #[test]
    fn path_escapes_are_treated_as_missing() {
        let (_dir, catalog) = fixture();
        let responses = handle(&catalog, "<get>../a.jpg,0,10</get>");
        assert_eq!(
            responses,
            vec![Response::Text(
                "<missingFile>get,../a.jpg,0,10</missingFile>".into()
            )]
        );
    }

    #[test]
    fn too_few_fields_dropped() {
        let (_dir, catalog) = fixture();
        assert!(handle(&catalog, "<get>a.jpg,0</get>").is_empty());
        assert!(handle(&catalog, "<get>a.jpg,zero,10</get>").is_empty());
    }

    #[test]
    fn zero_length_request_is_a_read_failure() {
        let (_dir, catalog) = fixture();
        assert!(handle(&catalog, "<get>a.jpg,10,0</get>").is_empty());
    }

    #[test]
    fn both_tags_in_one_frame() {
        let (_dir, catalog) = fixture();
        let responses = handle(
            &catalog,
            "<send_file_list>1</send_file_list><get>b.jpg,199,1</get>",
        );
        assert_eq!(responses.len(), 2);
        assert!(matches!(&responses[0], Response::Text(t) if t.starts_with("<file_list>")));
        assert_eq!(responses[1], Response::Binary(vec![7]));
    }

    #[test]
    fn files_in_subdirectories_are_served() {
        let (dir, catalog) = fixture();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("c.jpg"), b"hello").unwrap();

        let frame = binary(handle(&catalog, "<get>sub/c.jpg,1,10</get>"));
        assert_eq!(frame, b"ello");
    }

    #[test]
    fn contained_names() {
        assert!(is_contained("a.jpg"));
        assert!(is_contained("sub/a.jpg"));
        assert!(!is_contained("../a.jpg"));
        assert!(!is_contained("sub/../../a.jpg"));
        assert!(!is_contained("/etc/passwd"));
        assert!(!is_contained(""));
    }
}
