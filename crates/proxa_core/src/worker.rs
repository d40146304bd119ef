use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use proxa_config::ProxaConfig;
use proxa_http::responses::{send_408, send_411, send_502, send_error_status, send_response};
use proxa_proxy::{FetchError, ProxyError, ProxyHandler};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Duration;
use tracing::{debug, error, info, instrument, warn};

mod request;
mod timeouts;

use request::{parse_header_map, read_http_request};
use timeouts::{ReadOutcome, read_more};

pub trait ClientStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> ClientStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Entry point for a "logical worker" that handles a single connection.
///
/// Every well-formed request on the connection, regardless of method or
/// path, goes to the one catch-all proxy handler.
#[instrument(
    skip(stream, handler, cfg),
    fields(
        client = %client_addr,
    )
)]
pub async fn handle_connection<S>(
    mut stream: S,
    client_addr: SocketAddr,
    handler: Arc<ProxyHandler>,
    cfg: Arc<ProxaConfig>,
) -> anyhow::Result<()>
where
    S: ClientStream,
{
    info!(target: "proxa::worker", "Handling new client connection");

    let mut buf = BytesMut::new();
    let mut first_request = true;
    let read_timeout = Duration::from_secs(cfg.server.client_read_timeout_secs);

    loop {
        let idle_timeout = if first_request {
            read_timeout
        } else {
            Duration::from_secs(cfg.server.keepalive_timeout_secs)
        };
        first_request = false;

        // 1) Read one request's header section
        let req = match read_http_request(&mut stream, &mut buf, &cfg.server, idle_timeout).await? {
            Some(req) => req,
            None => break,
        };

        // 2) A cache entry embeds the body verbatim, so it must be
        //    length-delimited up front.
        if req.is_chunked {
            warn!(
                target: "proxa::worker",
                method = %req.method,
                path = %req.path,
                "Chunked request body rejected"
            );
            send_411(&mut stream).await?;
            break;
        }

        // Drop the header section; keep leftovers as the start of the body.
        buf.advance(req.body_start);

        // 3) Read the body
        let body = match read_body(&mut stream, &mut buf, req.content_length, read_timeout).await? {
            Some(body) => body,
            None => {
                send_408(&mut stream).await?;
                break;
            }
        };

        // 4) Dispatch to the catch-all handler. The cache identifies a
        //    request by its path alone, so the query string is not
        //    forwarded either; both sides stay consistent.
        let path = strip_query(&req.path).to_string();
        let headers = parse_header_map(&req.headers);

        debug!(
            target: "proxa::worker",
            method = %req.method,
            %path,
            body_len = body.len(),
            "Dispatching request to proxy handler"
        );

        let keep_alive = !req.close_after;
        match handler.handle(&req.method, &path, &headers, &body).await {
            Ok(proxied) => {
                debug!(
                    target: "proxa::worker",
                    method = %req.method,
                    %path,
                    outcome = ?proxied.outcome,
                    payload_len = proxied.payload.len(),
                    "Request served"
                );
                send_response(
                    &mut stream,
                    "200 OK",
                    "application/octet-stream",
                    &proxied.payload,
                    keep_alive,
                )
                .await?;
            }
            Err(ProxyError::Origin(FetchError::Status { status })) => {
                warn!(
                    target: "proxa::worker",
                    method = %req.method,
                    %path,
                    status,
                    "Origin answered with an error status"
                );
                send_error_status(&mut stream, status).await?;
                break;
            }
            Err(ProxyError::Origin(FetchError::Transport { reason })) => {
                error!(
                    target: "proxa::worker",
                    method = %req.method,
                    %path,
                    %reason,
                    "Origin unreachable; returning 502"
                );
                send_502(&mut stream).await?;
                break;
            }
        }

        if req.close_after {
            break;
        }
    }

    Ok(())
}

/// Reads exactly `content_length` body bytes, reusing whatever already sits
/// in `buf`. Returns `None` on a read timeout (the caller answers 408).
async fn read_body(
    stream: &mut dyn ClientStream,
    buf: &mut BytesMut,
    content_length: usize,
    read_timeout: Duration,
) -> anyhow::Result<Option<Vec<u8>>> {
    while buf.len() < content_length {
        match read_more(stream, buf, read_timeout).await? {
            ReadOutcome::Timeout => return Ok(None),
            ReadOutcome::Read(0) => anyhow::bail!("client closed connection mid-body"),
            ReadOutcome::Read(_) => {}
        }
    }
    Ok(Some(buf.split_to(content_length).to_vec()))
}

fn strip_query(path: &str) -> &str {
    match path.find('?') {
        Some(idx) => &path[..idx],
        None => path,
    }
}
