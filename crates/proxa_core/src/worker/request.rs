use std::collections::BTreeMap;

use bytes::BytesMut;
use proxa_config::ServerConfig;
use proxa_http::responses::{send_400, send_408, send_413, send_431};
use tokio::time::Duration;
use tracing::{debug, warn};

use super::ClientStream;
use super::timeouts::{ReadOutcome, read_more};

/// One parsed inbound request: the raw header section plus the metadata the
/// worker needs to read the body and pick a response mode.
#[derive(Debug)]
pub(crate) struct ParsedRequest {
    pub(crate) headers: String,
    pub(crate) method: String,
    pub(crate) path: String,
    pub(crate) content_length: usize,
    pub(crate) is_chunked: bool,
    pub(crate) close_after: bool,
    pub(crate) body_start: usize,
}

/// Reads one request's header section:
/// - accumulates until `\r\n\r\n`
/// - enforces the configured header-size limit
/// - parses the request line and the framing headers
///
/// Returns `None` when the worker already answered the client (or the peer
/// went away) and the connection should be dropped.
pub(crate) async fn read_http_request(
    stream: &mut dyn ClientStream,
    buf: &mut BytesMut,
    server: &ServerConfig,
    idle_timeout: Duration,
) -> anyhow::Result<Option<ParsedRequest>> {
    let read_timeout = Duration::from_secs(server.client_read_timeout_secs);
    let max_headers = server.max_request_headers_bytes as usize;
    let max_body = server.max_request_body_bytes as usize;

    let headers_end = loop {
        if let Some(pos) = find_headers_end(buf) {
            break pos;
        }

        if max_headers > 0 && buf.len() > max_headers {
            send_431(stream).await?;
            return Ok(None);
        }

        let timeout_dur = if buf.is_empty() {
            idle_timeout
        } else {
            read_timeout
        };
        match read_more(stream, buf, timeout_dur).await? {
            ReadOutcome::Timeout => {
                if buf.is_empty() {
                    return Ok(None);
                }
                send_408(stream).await?;
                return Ok(None);
            }
            ReadOutcome::Read(0) => return Ok(None),
            ReadOutcome::Read(_) => {}
        }
    };

    let headers_str = String::from_utf8_lossy(&buf[..headers_end]).to_string();

    debug!(
        target: "proxa::worker",
        header_len = headers_str.len(),
        "Read HTTP header section"
    );

    let meta = match parse_request_metadata(&headers_str) {
        Ok(meta) => meta,
        Err(err) => {
            warn!(
                target: "proxa::worker",
                error = ?err,
                "Invalid request headers"
            );
            send_400(stream).await?;
            return Ok(None);
        }
    };

    if !meta.is_chunked && max_body > 0 && meta.content_length > max_body {
        send_413(stream).await?;
        return Ok(None);
    }

    Ok(Some(ParsedRequest {
        headers: headers_str,
        method: meta.method,
        path: meta.path,
        content_length: meta.content_length,
        is_chunked: meta.is_chunked,
        close_after: meta.close_after,
        body_start: headers_end + 4,
    }))
}

/// Splits the header section into a lowercased name → value map for the
/// cache entry. Duplicate headers are combined with ", " as HTTP allows.
pub(crate) fn parse_header_map(headers: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();

    for line in headers.lines().skip(1) {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();
        if name.is_empty() || value.is_empty() {
            continue;
        }

        map.entry(name)
            .and_modify(|existing: &mut String| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }

    map
}

fn find_headers_end(buf: &BytesMut) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

#[derive(Debug)]
struct RequestMetadata {
    method: String,
    path: String,
    content_length: usize,
    close_after: bool,
    is_chunked: bool,
}

#[derive(Debug)]
enum HeaderParseError {
    MissingMethod,
    InvalidContentLength,
    ConflictingContentLength,
}

fn parse_request_metadata(headers: &str) -> Result<RequestMetadata, HeaderParseError> {
    let mut lines = headers.lines();
    let request_line = lines.next().unwrap_or("");
    let mut parts = request_line.split_whitespace();

    let method = match parts.next() {
        Some(m) if !m.is_empty() => m.to_string(),
        _ => return Err(HeaderParseError::MissingMethod),
    };
    let path = parts.next().unwrap_or("/").to_string();
    let http_version = parts.next().unwrap_or("HTTP/1.1").to_string();

    let mut content_lengths: Vec<usize> = Vec::new();
    let mut connection_close = false;
    let mut connection_keep_alive = false;
    let mut is_chunked = false;

    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();

        match name.trim().to_ascii_lowercase().as_str() {
            "content-length" => {
                for part in value.split(',') {
                    let trimmed = part.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let len = trimmed
                        .parse::<usize>()
                        .map_err(|_| HeaderParseError::InvalidContentLength)?;
                    content_lengths.push(len);
                }
            }
            "connection" | "proxy-connection" => {
                for token in split_header_tokens(value) {
                    match token.as_str() {
                        "close" => connection_close = true,
                        "keep-alive" => connection_keep_alive = true,
                        _ => {}
                    }
                }
            }
            "transfer-encoding" => {
                for token in split_header_tokens(value) {
                    if token == "chunked" {
                        is_chunked = true;
                    }
                }
            }
            _ => {}
        }
    }

    let content_length = match content_lengths.first() {
        None => 0,
        Some(&first) => {
            if content_lengths.iter().any(|&len| len != first) {
                return Err(HeaderParseError::ConflictingContentLength);
            }
            first
        }
    };

    // A chunked body overrides any Content-Length per the framing rules.
    let content_length = if is_chunked { 0 } else { content_length };

    let close_after = if http_version == "HTTP/1.0" {
        !connection_keep_alive || connection_close
    } else {
        connection_close
    };

    Ok(RequestMetadata {
        method,
        path,
        content_length,
        close_after,
        is_chunked,
    })
}

fn split_header_tokens(value: &str) -> impl Iterator<Item = String> + '_ {
    value.split(',').filter_map(|token| {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(
                trimmed
                    .trim_matches(|c| c == '"' || c == '\'')
                    .to_ascii_lowercase(),
            )
        }
    })
}
