//! HTTP surface for uploads, clearing and liveness
//!
//! Plain tokio sockets with minimal HTTP/1.1 handling:
//! - `POST /upload`: raw CSV body, acknowledged before ingestion starts
//! - `POST /clear`: delete every stored row
//! - `GET /`: store liveness check

use crate::config::LoaderConfig;
use crate::db::UserStore;
use crate::error::{LoaderError, Result};
use crate::ingestion::{ready_signal, spawn_file_ingestion};
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// Largest request accepted, headers included.
pub const MAX_REQUEST_BYTES: usize = 256 * 1024 * 1024;

const READ_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_UPLOAD_NAME: &str = "upload.csv";

pub struct ServerState {
    pub store: Arc<dyn UserStore>,
    pub config: LoaderConfig,
}

#[derive(Debug)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    /// Header names lower-cased.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Bind on `config.port` and serve until the listener fails.
pub async fn serve(state: Arc<ServerState>) -> Result<()> {
    let addr = format!("0.0.0.0:{}", state.config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server running on http://localhost:{}", state.config.port);

    loop {
        let (stream, peer) = listener.accept().await?;
        debug!("New connection from: {}", peer);
        tokio::spawn(handle_connection(stream, Arc::clone(&state)));
    }
}

async fn handle_connection(mut stream: TcpStream, state: Arc<ServerState>) {
    let request = match tokio::time::timeout(READ_TIMEOUT, read_request(&mut stream)).await {
        Ok(Ok(Some(request))) => request,
        Ok(Ok(None)) => return,
        Ok(Err(e)) => {
            warn!("Failed to read request: {}", e);
            let body = json!({ "error": e.to_string() }).to_string();
            let _ = stream
                .write_all(create_response(400, "Bad Request", &body).as_bytes())
                .await;
            return;
        }
        Err(_) => {
            warn!("Request read timeout");
            return;
        }
    };

    let response = handle_request(request, &state).await;
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        error!("Failed to write response: {}", e);
    }
}

async fn read_request(stream: &mut TcpStream) -> Result<Option<HttpRequest>> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);

        if let Some(header_end) = find_header_end(&buffer) {
            let head = String::from_utf8_lossy(&buffer[..header_end]);
            let content_length = extract_content_length(&head).unwrap_or(0);
            if header_end + content_length > MAX_REQUEST_BYTES {
                return Err(LoaderError::Upload("request too large".to_string()));
            }
            if buffer.len() >= header_end + content_length {
                break;
            }
        } else if buffer.len() > MAX_REQUEST_BYTES {
            return Err(LoaderError::Upload("request headers too large".to_string()));
        }
    }

    if buffer.is_empty() {
        return Ok(None);
    }
    parse_request(&buffer).map(Some)
}

/// Offset just past the blank line ending the header block.
fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

fn extract_content_length(head: &str) -> Option<usize> {
    head.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

pub fn parse_request(buffer: &[u8]) -> Result<HttpRequest> {
    let header_end = find_header_end(buffer)
        .ok_or_else(|| LoaderError::Upload("incomplete request headers".to_string()))?;
    let head = std::str::from_utf8(&buffer[..header_end])
        .map_err(|e| LoaderError::Upload(format!("request headers are not UTF-8: {}", e)))?;

    let mut lines = head.lines();
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let (method, target) = match (parts.next(), parts.next()) {
        (Some(method), Some(target)) => (method.to_string(), target),
        _ => return Err(LoaderError::Upload(format!("malformed request line: {:?}", request_line))),
    };

    // Query strings are not used by any route.
    let path = target.split('?').next().unwrap_or(target);
    let mut path = path.trim_end_matches('/').to_string();
    if path.is_empty() {
        path = "/".to_string();
    }

    let headers = lines
        .take_while(|line| !line.is_empty())
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
        .collect::<HashMap<_, _>>();

    let content_length = headers
        .get("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(buffer.len() - header_end);
    let body_end = (header_end + content_length).min(buffer.len());

    Ok(HttpRequest {
        method,
        path,
        headers,
        body: buffer[header_end..body_end].to_vec(),
    })
}

pub async fn handle_request(request: HttpRequest, state: &ServerState) -> String {
    debug!("Request: {} {}", request.method, request.path);

    match (request.method.as_str(), request.path.as_str()) {
        ("OPTIONS", _) => create_response(204, "No Content", ""),
        ("POST", "/upload") => handle_upload(request, state).await,
        ("POST", "/clear") => match state.store.clear().await {
            Ok(deleted) => {
                info!("Cleared {} rows", deleted);
                create_response(
                    200,
                    "OK",
                    &json!({
                        "status": "success",
                        "message": "Database cleared successfully."
                    })
                    .to_string(),
                )
            }
            Err(e) => {
                error!("Error clearing database: {}", e);
                create_response(
                    500,
                    "Internal Server Error",
                    &json!({ "error": "Failed to clear database" }).to_string(),
                )
            }
        },
        ("GET", "/") => match state.store.now().await {
            Ok(time) => create_response(
                200,
                "OK",
                &json!({ "status": "ok", "time": time }).to_string(),
            ),
            Err(e) => {
                error!("DB connection error: {}", e);
                create_response(
                    500,
                    "Internal Server Error",
                    &json!({ "error": "Database not connected" }).to_string(),
                )
            }
        },
        _ => create_response(404, "Not Found", &json!({ "error": "Not found" }).to_string()),
    }
}

async fn handle_upload(request: HttpRequest, state: &ServerState) -> String {
    let is_csv = request
        .header("content-type")
        .map(|ct| ct.to_ascii_lowercase().starts_with("text/csv"))
        .unwrap_or(false);
    if !is_csv {
        return create_response(
            400,
            "Bad Request",
            &json!({ "error": "Only CSV files are allowed!" }).to_string(),
        );
    }

    let original_name = upload_name(request.header("x-file-name"));
    let filename = format!("{}-{}", Utc::now().timestamp_millis(), original_name);
    let path = state.config.upload_dir.join(&filename);
    let size = request.body.len();

    let (trigger, signal) = ready_signal();
    let ingestion = spawn_file_ingestion(
        Arc::clone(&state.store),
        state.config.batch_size,
        path.clone(),
        Some(signal),
        state.config.poll_interval,
    );

    let body = request.body;
    let upload_path = path.clone();
    tokio::spawn(async move {
        if let Err(e) = write_upload(&upload_path, &body).await {
            error!("Failed to store upload {}: {}", upload_path.display(), e);
            ingestion.abort();
            return;
        }
        trigger.fire();

        match ingestion.await {
            Ok(Ok(summary)) => info!(
                run_id = %summary.run_id,
                "Ingestion of {} finished: {} rows processed, {} batches",
                upload_path.display(),
                summary.rows_processed,
                summary.batches_submitted
            ),
            Ok(Err(e)) => error!("Ingestion of {} failed: {}", upload_path.display(), e),
            Err(e) => error!(
                "Ingestion task for {} ended abnormally: {}",
                upload_path.display(),
                e
            ),
        }
    });

    create_response(
        200,
        "OK",
        &json!({
            "status": "success",
            "message": "File uploaded successfully. Wait for results to be printed in console.",
            "file": {
                "originalname": original_name,
                "filename": filename,
                "path": path.display().to_string(),
                "size": size,
            }
        })
        .to_string(),
    )
}

/// Keep only the final path component of a client-supplied name.
fn upload_name(requested: Option<&str>) -> String {
    requested
        .map(str::trim)
        .and_then(|name| Path::new(name).file_name())
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_UPLOAD_NAME)
        .to_string()
}

async fn write_upload(path: &Path, body: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(path, body).await?;
    Ok(())
}

pub fn create_response(status: u16, status_text: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: application/json\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
         Access-Control-Allow-Headers: Content-Type, X-File-Name\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        status,
        status_text,
        body.len(),
        body
    )
}
