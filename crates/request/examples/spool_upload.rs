use std::error::Error;
use std::mem::MaybeUninit;

use micro_request::protocol::Request;
use micro_request::protocol::body::BodyConfig;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

const RAW_REQUEST: &[u8] = b"POST /upload?album=holiday HTTP/1.1\r\n\
Host: 127.0.0.1:8080\r\n\
Content-Type: multipart/form-data; boundary=----WebKitFormBoundary7MA4YWxkTrZu0gW\r\n\
\r\n\
------WebKitFormBoundary7MA4YWxkTrZu0gW\r\n\
Content-Disposition: form-data; name=\"caption\"\r\n\
\r\n\
sunset at the beach\r\n\
------WebKitFormBoundary7MA4YWxkTrZu0gW\r\n\
Content-Disposition: form-data; name=\"photo\"; filename=\"sunset.txt\"\r\n\
Content-Type: text/plain\r\n\
\r\n\
pretend these are the bytes of a large photo\r\n\
------WebKitFormBoundary7MA4YWxkTrZu0gW--\r\n";

fn main() -> Result<(), Box<dyn Error>> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::TRACE).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let upload_dir = tempfile::tempdir()?;
    let mut headers: [MaybeUninit<httparse::Header>; 16] = [const { MaybeUninit::uninit() }; 16];
    let mut parsed_req = httparse::Request::new(&mut []);
    let httparse::Status::Complete(head_len) = parsed_req.parse_with_uninit_headers(RAW_REQUEST, &mut headers)? else {
        return Err("incomplete request head".into());
    };

    let mut request = Request::try_from(parsed_req)?;
    request.set_body_config(BodyConfig::new().temp_dir(upload_dir.path()));

    info!(method = %request.method(), path = request.path(), query = ?request.query(), "receive request");

    // simulate a slow connection delivering the body in small reads
    for chunk in RAW_REQUEST[head_len..].chunks(13) {
        request.parse_body(chunk)?;
    }
    request.finish_body()?;

    info!(caption = request.body().param("caption"), "decoded text field");

    let photo = request.body_mut().take_file("photo").ok_or("photo missing")?;
    info!(filename = photo.filename(), content_type = photo.content_type(), len = photo.len(), "decoded file field");

    let target = upload_dir.path().join("photo.txt");
    photo.persist(&target)?;
    info!(path = %target.display(), content = %String::from_utf8_lossy(&std::fs::read(&target)?), "persisted upload");

    Ok(())
}
