#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Cursor, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// How the stub answers requests for one path.
#[derive(Clone)]
pub enum Route {
    /// Honours `Range` with 206 responses.
    Ranged(Vec<u8>),
    /// Ignores `Range` and always sends the whole body with 200.
    Whole(Vec<u8>),
    /// Answers 503 while the counter is above zero, then behaves like `Whole`.
    Unavailable(Arc<AtomicUsize>, Vec<u8>),
}

/// Minimal HTTP/1.1 server on a loopback port, one request per connection.
pub struct StubServer {
    base: String,
    routes: Arc<Mutex<HashMap<String, Route>>>,
}

impl StubServer {
    pub fn start(routes: Vec<(&str, Route)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let routes: Arc<Mutex<HashMap<String, Route>>> = Arc::new(Mutex::new(
            routes
                .into_iter()
                .map(|(path, route)| (path.to_string(), route))
                .collect(),
        ));
        let shared = Arc::clone(&routes);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let routes = Arc::clone(&shared);
                thread::spawn(move || handle(stream, &routes));
            }
        });
        Self {
            base: format!("http://{addr}"),
            routes,
        }
    }

    /// Serve `route` at `path` from now on.
    pub fn route(&self, path: &str, route: Route) {
        self.routes.lock().unwrap().insert(path.to_string(), route);
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }
}

fn handle(mut stream: TcpStream, routes: &Mutex<HashMap<String, Route>>) {
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    let path = request_line
        .split_whitespace()
        .nth(1)
        .unwrap_or("/")
        .to_string();

    let mut range = None;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("range") {
                range = parse_range(value.trim());
            }
        }
    }

    let route = routes.lock().unwrap().get(&path).cloned();
    match route {
        Some(Route::Ranged(body)) => match range {
            Some((start, end)) if start < body.len() as u64 => {
                let end = end.min(body.len() as u64 - 1);
                let slice = &body[start as usize..=end as usize];
                let headers = format!(
                    "Content-Range: bytes {start}-{end}/{}\r\n",
                    body.len()
                );
                respond(&mut stream, "206 Partial Content", &headers, slice);
            }
            Some(_) => respond(&mut stream, "416 Range Not Satisfiable", "", b""),
            None => respond(&mut stream, "200 OK", "", &body),
        },
        Some(Route::Whole(body)) => respond(&mut stream, "200 OK", "", &body),
        Some(Route::Unavailable(remaining, body)) => {
            let failing = remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                respond(&mut stream, "503 Service Unavailable", "", b"busy");
            } else {
                respond(&mut stream, "200 OK", "", &body);
            }
        }
        None => respond(&mut stream, "404 Not Found", "", b"not found"),
    }
}

fn parse_range(value: &str) -> Option<(u64, u64)> {
    let spec = value.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}

fn respond(stream: &mut TcpStream, status: &str, extra_headers: &str, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\n{extra_headers}Connection: close\r\n\r\n",
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
    let _ = stream.flush();
}

/// Build a stored (uncompressed) archive with the given members. Names ending
/// in `/` become directory entries.
pub fn build_zip(members: &[(&str, usize)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, size) in members {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(&vec![b'x'; *size]).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

/// One empty stored member whose name bytes are written verbatim, without
/// the UTF-8 flag.
pub fn build_raw_name_zip(name: &[u8]) -> Vec<u8> {
    let name_len = (name.len() as u16).to_le_bytes();
    let dos_date = 0x0021u16.to_le_bytes();

    let mut out = Vec::new();
    out.extend_from_slice(&0x0403_4b50u32.to_le_bytes());
    out.extend_from_slice(&20u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&dos_date);
    out.extend_from_slice(&[0u8; 12]);
    out.extend_from_slice(&name_len);
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(name);

    let directory_offset = out.len() as u32;
    out.extend_from_slice(&0x0201_4b50u32.to_le_bytes());
    out.extend_from_slice(&20u16.to_le_bytes());
    out.extend_from_slice(&20u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&dos_date);
    out.extend_from_slice(&[0u8; 12]);
    out.extend_from_slice(&name_len);
    out.extend_from_slice(&[0u8; 12]);
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(name);
    let directory_size = out.len() as u32 - directory_offset;

    out.extend_from_slice(&0x0605_4b50u32.to_le_bytes());
    out.extend_from_slice(&[0u8; 4]);
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&directory_size.to_le_bytes());
    out.extend_from_slice(&directory_offset.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out
}

/// End records claiming zip64 with a locator that points at `record_offset`.
pub fn build_zip64_tail(record_offset: u64) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&0x0706_4b50u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&record_offset.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());

    out.extend_from_slice(&0x0605_4b50u32.to_le_bytes());
    out.extend_from_slice(&[0u8; 4]);
    out.extend_from_slice(&u16::MAX.to_le_bytes());
    out.extend_from_slice(&u16::MAX.to_le_bytes());
    out.extend_from_slice(&u32::MAX.to_le_bytes());
    out.extend_from_slice(&u32::MAX.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out
}
