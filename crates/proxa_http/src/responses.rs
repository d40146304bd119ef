use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Writes a full HTTP/1.1 response with a binary body.
///
/// `keep_alive` controls the Connection header; error helpers below always
/// close, matching what their callers do with the connection afterwards.
pub async fn send_response<W>(
    stream: &mut W,
    status: &str,
    content_type: &str,
    body: &[u8],
    keep_alive: bool,
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let head = format_head(status, content_type, body.len(), keep_alive);
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(body).await?;
    stream.flush().await?;
    Ok(())
}

fn format_head(status: &str, content_type: &str, body_len: usize, keep_alive: bool) -> String {
    let connection = if keep_alive { "keep-alive" } else { "close" };
    format!(
        "HTTP/1.1 {status}\r\n\
         Server: proxa/0.1.0\r\n\
         Content-Type: {content_type}\r\n\
         Content-Length: {body_len}\r\n\
         Connection: {connection}\r\n\
         \r\n"
    )
}

/// Helper for plain-text responses that end the connection.
async fn send_text_response<W>(stream: &mut W, status: &str, body: &str) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    send_response(
        stream,
        status,
        "text/plain; charset=utf-8",
        body.as_bytes(),
        false,
    )
    .await
}

/// Mirrors an arbitrary upstream status back to the client, e.g. when the
/// origin answered 404 and the proxy must relay exactly that.
pub async fn send_error_status<W>(stream: &mut W, code: u16) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let reason = reason_phrase(code);
    let status = format!("{code} {reason}");
    let body = format!("{code} {reason}\n");
    send_text_response(stream, &status, &body).await
}

pub async fn send_400<W>(stream: &mut W) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    send_text_response(stream, "400 Bad Request", "400 Bad Request\n").await
}

pub async fn send_408<W>(stream: &mut W) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    send_text_response(stream, "408 Request Timeout", "408 Request Timeout\n").await
}

pub async fn send_411<W>(stream: &mut W) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    send_text_response(stream, "411 Length Required", "411 Length Required\n").await
}

pub async fn send_413<W>(stream: &mut W) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    send_text_response(stream, "413 Payload Too Large", "413 Payload Too Large\n").await
}

pub async fn send_431<W>(stream: &mut W) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    send_text_response(
        stream,
        "431 Request Header Fields Too Large",
        "431 Request Header Fields Too Large\n",
    )
    .await
}

pub async fn send_500<W>(stream: &mut W) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    send_text_response(
        stream,
        "500 Internal Server Error",
        "Internal Server Error\n",
    )
    .await
}

pub async fn send_502<W>(stream: &mut W) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    send_text_response(stream, "502 Bad Gateway", "502 Bad Gateway\n").await
}

fn reason_phrase(code: u16) -> &'static str {
    match code {
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Error",
    }
}
