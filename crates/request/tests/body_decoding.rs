use std::fs;

use micro_request::protocol::body::{BodyAccumulator, BodyConfig, SessionState};
use micro_request::protocol::{DecodeError, Request};

const URL_ENCODED: &str = "application/x-www-form-urlencoded";
const MULTIPART: &str = "multipart/form-data; boundary=----WebKitFormBoundary7MA4YWxkTrZu0gW";

fn upload_body() -> Vec<u8> {
    b"------WebKitFormBoundary7MA4YWxkTrZu0gW\r\n\
Content-Disposition: form-data; name=\"upload\"; filename=\"x.txt\"\r\n\
Content-Type: text/plain\r\n\
\r\n\
hello world\r\n\
------WebKitFormBoundary7MA4YWxkTrZu0gW--\r\n"
        .to_vec()
}

fn decode_in_chunks(config: BodyConfig, content_type: &str, body: &[u8], chunk_size: usize) -> BodyAccumulator {
    let mut accumulator = BodyAccumulator::new(config);
    for chunk in body.chunks(chunk_size) {
        assert_eq!(accumulator.feed(Some(content_type), chunk).unwrap(), chunk.len());
    }
    accumulator.finish().unwrap();
    accumulator
}

#[test]
fn url_encoded_independent_of_chunking() {
    let body = b"a=1&b=2";

    let whole = decode_in_chunks(BodyConfig::default(), URL_ENCODED, body, body.len());
    let bytewise = decode_in_chunks(BodyConfig::default(), URL_ENCODED, body, 1);

    assert_eq!(whole.body().params(), bytewise.body().params());
    assert_eq!(whole.body().param("a"), Some("1"));
    assert_eq!(whole.body().param("b"), Some("2"));
}

#[test]
fn url_encoded_simple_form() {
    let accumulator = decode_in_chunks(BodyConfig::default(), URL_ENCODED, b"name=Alice&age=30", 5);

    assert_eq!(accumulator.body().params().len(), 2);
    assert_eq!(accumulator.body().param("name"), Some("Alice"));
    assert_eq!(accumulator.body().param("age"), Some("30"));
    assert!(accumulator.body().files().is_empty());
}

#[test]
fn multipart_upload_independent_of_chunking() {
    let body = upload_body();

    for chunks in [1, 2, 11] {
        let dir = tempfile::tempdir().unwrap();
        let chunk_size = body.len().div_ceil(chunks);
        let accumulator = decode_in_chunks(BodyConfig::new().temp_dir(dir.path()), MULTIPART, &body, chunk_size);

        assert_eq!(accumulator.body().files().len(), 1, "{chunks} chunks");
        assert!(accumulator.body().params().is_empty());

        let upload = accumulator.body().file("upload").unwrap();
        assert_eq!(upload.filename(), "x.txt");
        assert_eq!(upload.content_type(), "text/plain");
        assert_eq!(upload.len(), 11);
        assert_eq!(upload.read_to_vec().unwrap(), b"hello world");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1, "{chunks} chunks");
    }
}

#[test]
fn multipart_text_and_file() {
    let body: &[u8] = b"--XyZ\r\n\
Content-Disposition: form-data; name=\"note\"\r\n\
\r\n\
hi\r\n\
--XyZ\r\n\
Content-Disposition: form-data; name=\"doc\"; filename=\"a.bin\"\r\n\
\r\n\
\x01\x02\x03\r\n\
--XyZ--\r\n";
    let dir = tempfile::tempdir().unwrap();
    let chunk_size = body.len().div_ceil(5);

    let accumulator =
        decode_in_chunks(BodyConfig::new().temp_dir(dir.path()), "multipart/form-data; boundary=XyZ", body, chunk_size);

    assert_eq!(accumulator.body().params().len(), 1);
    assert_eq!(accumulator.body().param("note"), Some("hi"));

    assert_eq!(accumulator.body().files().len(), 1);
    let doc = accumulator.body().file("doc").unwrap();
    assert_eq!(doc.filename(), "a.bin");
    assert_eq!(doc.read_to_vec().unwrap(), [1, 2, 3]);
}

#[test]
fn empty_filename_is_upload() {
    let body: &[u8] = b"--b\r\n\
Content-Disposition: form-data; name=\"attachment\"; filename=\"\"\r\n\
Content-Type: application/octet-stream\r\n\
\r\n\
\r\n\
--b--\r\n";

    let accumulator = decode_in_chunks(BodyConfig::default(), "multipart/form-data; boundary=b", body, 4);

    assert!(accumulator.body().param("attachment").is_none());
    let upload = accumulator.body().file("attachment").unwrap();
    assert_eq!(upload.filename(), "");
    assert!(upload.is_empty());
}

#[test]
fn feed_after_spool_failure() {
    let config = BodyConfig::new().temp_dir("/nonexistent/micro-request/spool");
    let body = upload_body();
    let data_start = body.windows(5).position(|w| w == b"hello").unwrap();
    let (head, tail) = body.split_at(data_start + 5);
    let mut accumulator = BodyAccumulator::new(config);

    let result = accumulator.feed(Some(MULTIPART), head);
    assert!(matches!(result, Err(DecodeError::SinkWriteFailed { ref field, .. }) if field == "upload"));
    assert_eq!(accumulator.state(), SessionState::Failed);

    assert!(matches!(accumulator.feed(Some(MULTIPART), tail), Err(DecodeError::SessionClosed)));
    assert!(accumulator.body().files().is_empty());
}

#[test]
fn decode_is_monotonic_per_field() {
    let body = b"first=alpha&second=beta+gamma&third=%CE%B4";
    let mut accumulator = BodyAccumulator::default();
    let mut completed: Vec<(String, String)> = Vec::new();

    for (i, chunk) in body.chunks(1).enumerate() {
        accumulator.feed(Some(URL_ENCODED), chunk).unwrap();

        for (name, value) in &completed {
            assert_eq!(accumulator.body().param(name), Some(value.as_str()), "after byte {i}");
        }

        if chunk == b"&" {
            let before = &body[..i];
            let start = before.iter().rposition(|b| *b == b'&').map_or(0, |p| p + 1);
            let (name, _) = std::str::from_utf8(&before[start..]).unwrap().split_once('=').unwrap();
            let value = accumulator.body().param(name).unwrap().to_string();
            completed.push((name.to_string(), value));
        }
    }
    accumulator.finish().unwrap();

    assert_eq!(completed.len(), 2);
    assert_eq!(accumulator.body().param("first"), Some("alpha"));
    assert_eq!(accumulator.body().param("second"), Some("beta gamma"));
    assert_eq!(accumulator.body().param("third"), Some("δ"));
}

#[test]
fn request_decodes_body_with_its_content_type() {
    let dir = tempfile::tempdir().unwrap();
    let mut request = Request::new();
    request.set_body_config(BodyConfig::new().temp_dir(dir.path()));
    request.set_header("Content-Type", MULTIPART);

    for chunk in upload_body().chunks(3) {
        request.parse_body(chunk).unwrap();
    }
    request.finish_body().unwrap();

    let upload = request.body_mut().take_file("upload").unwrap();
    assert!(request.body().file("upload").is_none());

    let target = dir.path().join("kept.txt");
    upload.persist(&target).unwrap();
    assert_eq!(fs::read(&target).unwrap(), b"hello world");
}

#[test]
fn abort_keeps_decoded_fields() {
    let mut request = Request::new();
    request.set_header("content-type", URL_ENCODED);

    request.parse_body(b"a=1&b=tru").unwrap();
    request.abort_body();

    assert_eq!(request.body_state(), SessionState::Closed);
    assert_eq!(request.body().param("a"), Some("1"));
    assert_eq!(request.body().param("b"), Some("tru"));
    assert!(matches!(request.parse_body(b"ncated"), Err(DecodeError::SessionClosed)));
}
