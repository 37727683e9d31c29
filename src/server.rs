//! Ephemeral static file server for the staged output tree

use crate::{Error, Result};
use log::{debug, info, warn};
use std::fs::File;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use tiny_http::{Header, Method, Request, Response, Server};

/// A loopback file server that lives for the duration of one run.
///
/// The socket is bound before `start` returns, so callers may navigate to
/// [`StaticServer::base_url`] immediately. Dropping the server stops it.
pub struct StaticServer {
    server: Arc<Server>,
    handle: Option<JoinHandle<()>>,
    port: u16,
}

impl StaticServer {
    /// Bind `127.0.0.1:<port>` and serve `root`, mapping directories to `entry_file`.
    pub fn start(root: impl Into<PathBuf>, port: u16, entry_file: &str) -> Result<Self> {
        let root = root.into();
        let server = Server::http(("127.0.0.1", port))
            .map_err(|e| Error::Setup(format!("failed to bind 127.0.0.1:{}: {}", port, e)))?;
        let port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .unwrap_or(port);
        let server = Arc::new(server);

        let worker = Arc::clone(&server);
        let entry_file = entry_file.to_string();
        let handle = std::thread::Builder::new()
            .name("prerender-static".into())
            .spawn(move || {
                for request in worker.incoming_requests() {
                    serve(&root, &entry_file, request);
                }
                debug!("Static server loop exited");
            })
            .map_err(|e| Error::Setup(format!("failed to spawn server thread: {}", e)))?;

        info!("Server listening on http://127.0.0.1:{}", port);
        Ok(Self {
            server,
            handle: Some(handle),
            port,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}/", self.port)
    }

    /// Stop accepting requests, join the serving thread and release the port.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.server.unblock();
            if handle.join().is_err() {
                warn!("Static server thread panicked");
            }
            info!("Server on port {} stopped", self.port);
        }
    }
}

impl Drop for StaticServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn serve(root: &Path, entry_file: &str, request: Request) {
    let method = request.method().clone();
    if method != Method::Get && method != Method::Head {
        let _ = request.respond(Response::from_string("Method Not Allowed").with_status_code(405));
        return;
    }

    let Some(path) = resolve(root, request.url(), entry_file) else {
        debug!("404 {}", request.url());
        let _ = request.respond(Response::from_string("Not Found").with_status_code(404));
        return;
    };

    let file = match File::open(&path) {
        Ok(f) => f,
        Err(e) => {
            debug!("404 {} ({})", request.url(), e);
            let _ = request.respond(Response::from_string("Not Found").with_status_code(404));
            return;
        }
    };

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    let mut response = Response::from_file(file);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], mime.as_ref().as_bytes()) {
        response.add_header(header);
    }
    // tiny_http omits the body of HEAD responses but keeps the real length.
    let _ = request.respond(response);
}

/// Map a request target onto a file below `root`.
///
/// Query strings and fragments are ignored, directories resolve to their entry
/// file, and any `..` segment is rejected.
fn resolve(root: &Path, target: &str, entry_file: &str) -> Option<PathBuf> {
    let path = target.split(&['?', '#'][..]).next().unwrap_or("");
    let decoded = percent_decode(path)?;
    let rel = Path::new(decoded.trim_start_matches('/'));

    if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
        return None;
    }

    let mut candidate = root.join(rel);
    if candidate.is_dir() {
        candidate.push(entry_file);
    }
    candidate.is_file().then_some(candidate)
}

fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
