//! Development server for the bridge host page
//!
//! Serves `index.html`, the wasm-bindgen output under `pkg/` and guest
//! modules from the current directory. Guest modules must come back as
//! `application/wasm` or the browser refuses to compile them from a
//! streaming fetch.
//!
//! Usage: `serve [port] [root]`

use std::fs;
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};
use tiny_http::{Header, Response, Server};

const DEFAULT_PORT: u16 = 8080;

fn main() {
    let mut args = std::env::args().skip(1);
    let port = args
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let root = PathBuf::from(args.next().unwrap_or_else(|| ".".to_string()));

    let addr = format!("0.0.0.0:{}", port);
    let server = match Server::http(&addr) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("serve: cannot listen on {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    println!("mty-bridge dev server: http://localhost:{} ({})", port, root.display());

    for request in server.incoming_requests() {
        let response = match resolve(&root, request.url()) {
            Some(path) => serve_file(&path),
            None => not_found(),
        };
        println!("{} {} -> {}", request.method(), request.url(), response.status_code().0);
        if let Err(e) = request.respond(response) {
            eprintln!("serve: failed to respond: {}", e);
        }
    }
}

/// Map a request URL onto a file under `root`, refusing to leave it
fn resolve(root: &Path, url: &str) -> Option<PathBuf> {
    let path = url.split(['?', '#']).next().unwrap_or("/");
    let relative = match path.trim_start_matches('/') {
        "" => "index.html",
        p => p,
    };

    let relative = Path::new(relative);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(root.join(relative))
}

fn header(name: &str, value: &str) -> Option<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}

fn serve_file(path: &Path) -> Response<Cursor<Vec<u8>>> {
    match fs::read(path) {
        Ok(contents) => {
            let mut response = Response::from_data(contents);
            if let Some(h) = header("Content-Type", mime_type(path)) {
                response = response.with_header(h);
            }
            // Guest modules change on every rebuild
            if let Some(h) = header("Cache-Control", "no-store") {
                response = response.with_header(h);
            }
            response
        }
        Err(_) => not_found(),
    }
}

fn not_found() -> Response<Cursor<Vec<u8>>> {
    let response = Response::from_string("404 Not Found").with_status_code(404);
    match header("Content-Type", "text/plain") {
        Some(h) => response.with_header(h),
        None => response,
    }
}

fn mime_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("js") => "application/javascript",
        Some("wasm") => "application/wasm",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}
