use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin;

/// `sabacan` with every SABACAN_* setting cleared so the host environment
/// cannot leak into a test.
pub fn sabacan_cmd() -> Command {
    let mut cmd = Command::new(cargo_bin("sabacan"));
    for var in [
        "SABACAN_URL",
        "SABACAN_PLANTUML_URL",
        "SABACAN_REDPEN_URL",
        "SABACAN_TIMEOUT",
        "SABACAN_PLANTUML_TIMEOUT",
        "SABACAN_REDPEN_TIMEOUT",
        "SABACAN_LOG",
        "REDPEN_HOME",
    ] {
        cmd.env_remove(var);
    }
    cmd.env("NO_COLOR", "1").env("NO_EMOJI", "1");
    cmd
}

/// What the fake server saw.
#[derive(Debug)]
pub struct Captured {
    pub method: String,
    /// Path plus query, as sent on the request line.
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Captured {
    pub fn path(&self) -> &str {
        self.target.split_once('?').map_or(&self.target, |(p, _)| p)
    }

    pub fn query(&self) -> Vec<(String, String)> {
        let Some((_, q)) = self.target.split_once('?') else {
            return Vec::new();
        };
        url::form_urlencoded::parse(q.as_bytes())
            .into_owned()
            .collect()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// One-shot HTTP server answering the first request with a canned reply.
pub struct FakeServer {
    pub base: String,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<Option<Captured>>,
}

impl FakeServer {
    pub fn start(status: u16, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let stop = Arc::new(AtomicBool::new(false));
        let reply = Reply {
            status,
            content_type: content_type.to_string(),
            body: body.into(),
        };
        let flag = Arc::clone(&stop);
        let handle = std::thread::spawn(move || {
            loop {
                match listener.accept() {
                    Ok((stream, _)) => return Some(serve(stream, &reply)),
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        if flag.load(Ordering::SeqCst) {
                            return None;
                        }
                        std::thread::sleep(Duration::from_millis(10));
                    }
                    Err(e) => panic!("accept failed: {e}"),
                }
            }
        });
        FakeServer { base, stop, handle }
    }

    /// Stop listening and return the request, if one arrived. Call after the
    /// command under test has exited.
    pub fn finish(self) -> Option<Captured> {
        self.stop.store(true, Ordering::SeqCst);
        self.handle.join().unwrap()
    }
}

struct Reply {
    status: u16,
    content_type: String,
    body: Vec<u8>,
}

fn serve(stream: TcpStream, reply: &Reply) -> Captured {
    stream.set_nonblocking(false).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
    let mut reader = BufReader::new(stream.try_clone().unwrap());

    let mut request_line = String::new();
    reader.read_line(&mut request_line).unwrap();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((k, v)) = line.split_once(':') {
            headers.push((k.trim().to_string(), v.trim().to_string()));
        }
    }

    let length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).unwrap();

    let mut out = stream;
    write!(
        out,
        "HTTP/1.1 {} Fake\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        reply.status,
        reply.content_type,
        reply.body.len()
    )
    .unwrap();
    out.write_all(&reply.body).unwrap();
    out.flush().unwrap();

    Captured {
        method,
        target,
        headers,
        body,
    }
}

/// A base URL on which nothing is listening.
pub fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
