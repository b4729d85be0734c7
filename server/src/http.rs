//! A small HTTP static file server: one accept loop per configured server,
//! one thread per accepted client.
//!
//! GET requests resolve beneath the configured document root (with `..`
//! components stripped so requests cannot escape it) and serve files by
//! extension-based content type, the configured index file for
//! directories, or a generated listing when a directory has no index.
//! POST echoes the submitted form data back.  This server only exists to
//! host player pages next to the RTMP ingest; it deliberately supports
//! nothing beyond that.

use crate::config::WebServerSettings;
use log::{error, info, warn};
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::thread;

pub struct WebServer {
    settings: WebServerSettings,
}

impl WebServer {
    pub fn new(settings: WebServerSettings) -> WebServer {
        WebServer { settings }
    }

    /// Binds the listener and serves clients until the process exits.
    pub fn run(self) {
        let settings = self.settings;
        ensure_document_root(&settings);

        let listener = match TcpListener::bind((settings.bind_address, settings.port)) {
            Ok(listener) => listener,
            Err(err) => {
                error!(
                    "Web server {} could not bind {}:{}: {}",
                    settings.id, settings.bind_address, settings.port, err
                );
                return;
            }
        };

        info!(
            "Web server {} running on http://{}:{}",
            settings.id,
            format_address(&settings),
            settings.port
        );

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let root = PathBuf::from(settings.root_dir.clone());
                    let index = settings.index.clone();
                    let id = settings.id.clone();
                    thread::spawn(move || handle_client(stream, root, index, id));
                }
                Err(err) => {
                    warn!("Web server {} accept failed: {}", settings.id, err);
                }
            }
        }
    }
}

fn format_address(settings: &WebServerSettings) -> String {
    if settings.bind_address.is_ipv6() {
        format!("[{}]", settings.bind_address)
    } else {
        settings.bind_address.to_string()
    }
}

/// Creates the document root (with a placeholder index page) the first
/// time the server runs.
fn ensure_document_root(settings: &WebServerSettings) {
    let root = Path::new(&settings.root_dir);
    if root.is_dir() {
        return;
    }

    if let Err(err) = fs::create_dir_all(root) {
        error!(
            "Web server {} could not create document root {}: {}",
            settings.id, settings.root_dir, err
        );
        return;
    }

    let index_path = root.join(&settings.index);
    let placeholder = "<html><body><h1>It works</h1></body></html>\n";
    if let Err(err) = fs::write(&index_path, placeholder) {
        error!(
            "Web server {} could not create {}: {}",
            settings.id,
            index_path.display(),
            err
        );
    }
}

fn handle_client(stream: TcpStream, root: PathBuf, index: String, server_id: String) {
    if let Err(err) = serve_request(stream, &root, &index, &server_id) {
        warn!("Web server {} connection error: {}", server_id, err);
    }
}

fn serve_request(
    stream: TcpStream,
    root: &Path,
    index: &str,
    server_id: &str,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    if reader.read_line(&mut request_line)? == 0 {
        return Ok(());
    }

    let (method, url) = match parse_request_line(&request_line) {
        Some(parts) => parts,
        None => {
            let stream = reader.into_inner();
            return send_error(stream, "400", "Bad Request");
        }
    };

    let mut content_length = 0_usize;
    loop {
        let mut header_line = String::new();
        if reader.read_line(&mut header_line)? == 0 {
            break;
        }

        let header_line = header_line.trim_end();
        if header_line.is_empty() {
            break;
        }

        if let Some((name, value)) = header_line.split_once(':') {
            if name.eq_ignore_ascii_case("Content-Length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    match method.as_str() {
        "GET" => {
            let response = build_get_response(root, index, &url);
            info!("Web server {}: GET {} -> {}", server_id, url, response.status);
            write_response(reader.into_inner(), response)
        }

        "POST" => {
            let mut body = vec![0_u8; content_length];
            reader.read_exact(&mut body)?;
            let data = String::from_utf8_lossy(&body).into_owned();

            info!("Web server {}: POST {} -> 200", server_id, url);
            write_response(
                reader.into_inner(),
                Response::html("200", format!("Data:{}", data)),
            )
        }

        _ => {
            info!("Web server {}: {} {} -> 501", server_id, method, url);
            send_error(reader.into_inner(), "501", "Not Implemented")
        }
    }
}

struct Response {
    status: &'static str,
    content_type: &'static str,
    body: Vec<u8>,
}

impl Response {
    fn html(status: &'static str, body: String) -> Response {
        Response {
            status,
            content_type: "text/html; charset=UTF-8",
            body: body.into_bytes(),
        }
    }
}

fn build_get_response(root: &Path, index: &str, url: &str) -> Response {
    let relative = sanitize_request_path(url);
    let requested = root.join(&relative);

    if requested.is_file() {
        return serve_file(&requested);
    }

    if requested.is_dir() {
        let index_path = requested.join(index);
        if index_path.is_file() {
            return serve_file(&index_path);
        }

        return Response::html("200", list_directory(&requested, url));
    }

    Response::html("404", "<html><body><h1>404 Not Found</h1></body></html>".to_string())
}

fn serve_file(path: &Path) -> Response {
    match fs::read(path) {
        Ok(body) => Response {
            status: "200",
            content_type: content_type_for(path),
            body,
        },
        Err(_) => Response::html(
            "404",
            "<html><body><h1>404 Not Found</h1></body></html>".to_string(),
        ),
    }
}

/// Strips the query string and any `..` components, yielding a relative
/// path that always stays beneath the document root.
fn sanitize_request_path(url: &str) -> PathBuf {
    let path = url.split(&['?', '#'][..]).next().unwrap_or("");

    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .collect()
}

fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .unwrap_or("");

    match extension.to_ascii_lowercase().as_str() {
        "htm" | "html" => "text/html; charset=UTF-8",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "txt" => "text/plain; charset=UTF-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "mp4" => "video/mp4",
        "flv" => "video/x-flv",
        "swf" => "application/x-shockwave-flash",
        _ => "application/octet-stream",
    }
}

fn list_directory(directory: &Path, url: &str) -> String {
    let mut entries = Vec::new();

    if url.trim_matches('/') != "" {
        entries.push("<li><a href=\"../\">../</a></li>".to_string());
    }

    if let Ok(listing) = fs::read_dir(directory) {
        let mut names: Vec<(String, bool)> = listing
            .flatten()
            .filter_map(|entry| {
                let is_dir = entry.file_type().map(|kind| kind.is_dir()).unwrap_or(false);
                entry
                    .file_name()
                    .into_string()
                    .ok()
                    .map(|name| (name, is_dir))
            })
            .collect();
        names.sort();

        for (name, is_dir) in names {
            let display = if is_dir { format!("{}/", name) } else { name };
            entries.push(format!(
                "<li><a href=\"{0}\">{0}</a></li>",
                display
            ));
        }
    }

    format!(
        "<html><head><title>Index of /{0}</title></head>\
         <body><h1>Index of /{0}</h1><br/><ul>{1}</ul></body></html>",
        url.trim_matches('/'),
        entries.concat()
    )
}

fn parse_request_line(line: &str) -> Option<(String, String)> {
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let url = parts.next()?.to_string();
    Some((method, url))
}

fn write_response(mut stream: TcpStream, response: Response) -> std::io::Result<()> {
    let head = format!(
        "HTTP/1.1 {} \r\nServer: minnow-server\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        response.content_type,
        response.body.len()
    );

    stream.write_all(head.as_bytes())?;
    stream.write_all(&response.body)?;
    stream.flush()
}

fn send_error(stream: TcpStream, status: &'static str, text: &str) -> std::io::Result<()> {
    write_response(
        stream,
        Response::html(status, format!("<html><body><h1>{}</h1></body></html>", text)),
    )
}
