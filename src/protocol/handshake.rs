//! WebSocket handshake implementation (RFC 6455).
//!
//! This module drives the HTTP Upgrade exchange over raw byte streams, for
//! both the connecting client and the accepting server.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::IpAddr;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use log::debug;
use sha1::{Digest, Sha1};

use crate::config::Limits;
use crate::error::{Error, Result};

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Forwarding headers consulted for the peer address, in priority order.
const FORWARDED_HEADERS: [&str; 4] = ["real-ip", "x-real-ip", "forwarded", "x-forwarded-for"];

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// The accept key is calculated as: Base64(SHA-1(key + GUID))
///
/// # Example
///
/// ```
/// use websock::protocol::handshake::compute_accept_key;
///
/// let key = "dGhlIHNhbXBsZSBub25jZQ==";
/// let accept = compute_accept_key(key);
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
#[must_use]
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    let hash = hasher.finalize();
    BASE64.encode(hash)
}

/// Generate a fresh random 16-byte base64 Sec-WebSocket-Key.
fn generate_key() -> String {
    let mut nonce = [0u8; 16];
    if getrandom::getrandom(&mut nonce).is_err() {
        use std::time::{SystemTime, UNIX_EPOCH};
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0x1234_5678);
        nonce[..16].copy_from_slice(&nanos.to_le_bytes());
    }
    BASE64.encode(nonce)
}

/// Parse HTTP headers from an iterator of lines into a case-insensitive map.
///
/// Optionally checks for duplicate security-critical headers when
/// `security_headers` is provided.
///
/// # Errors
/// Returns `Error::HandshakeFailed` if a security-critical header is duplicated.
fn parse_headers<'a, I>(
    lines: I,
    security_headers: Option<&[&str]>,
) -> Result<HashMap<String, String>>
where
    I: Iterator<Item = &'a str>,
{
    let mut headers: HashMap<String, String> = HashMap::new();

    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name_lower = name.trim().to_lowercase();

            if let Some(sec_headers) = security_headers {
                if sec_headers.contains(&name_lower.as_str()) && headers.contains_key(&name_lower) {
                    return Err(Error::HandshakeFailed(format!(
                        "Duplicate header: {}",
                        name.trim()
                    )));
                }
            }

            headers.insert(name_lower, value.trim().to_string());
        }
    }

    Ok(headers)
}

/// Validate that a header value does not contain CR or LF characters.
///
/// # Errors
/// Returns `Error::InvalidHeaderValue` if the value contains `\r` or `\n`.
fn validate_header_value(header_name: &str, value: &str) -> Result<()> {
    if value.contains('\r') || value.contains('\n') {
        return Err(Error::InvalidHeaderValue {
            header: header_name.to_string(),
            reason: "contains CR or LF characters".to_string(),
        });
    }
    Ok(())
}

/// Read one HTTP head (request or status line plus headers) from a stream,
/// up to and including the blank-line terminator.
///
/// Reads byte-at-a-time so no bytes beyond the terminator are consumed; any
/// frames the peer pipelines after the handshake stay in the stream. The
/// head size is capped by `limits.max_handshake_size`.
fn read_http_head<R: Read>(input: &mut R, limits: &Limits) -> Result<Vec<u8>> {
    let mut head = Vec::with_capacity(256);
    let mut byte = [0u8; 1];
    loop {
        input.read_exact(&mut byte)?;
        head.push(byte[0]);
        limits.check_handshake_size(head.len())?;
        if head.ends_with(b"\r\n\r\n") {
            return Ok(head);
        }
    }
}

/// Map an HTTP status code to its reason phrase.
fn reason_phrase(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Error",
    }
}

/// Write a plain (non-upgraded) HTTP response with a diagnostic body.
fn write_plain_response<W: Write>(output: &mut W, status: u16, body: &str) -> Result<()> {
    let reason = reason_phrase(status);
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\n\
         Content-Type: text/plain\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {body}",
        body.len()
    );
    output.write_all(response.as_bytes())?;
    output.flush()?;
    Ok(())
}

/// An accepted WebSocket upgrade request.
///
/// Wraps the parsed HTTP request together with the peer address resolved from
/// the forwarding headers (`Real-Ip`, `X-Real-Ip`, `Forwarded`,
/// `X-Forwarded-For`; first present wins, first comma-separated entry,
/// trimmed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The raw request line (e.g., `GET /chat HTTP/1.1`).
    pub request_line: String,
    /// The request path (e.g., `/chat`).
    pub path: String,
    /// All request headers, keyed by lowercase name.
    pub headers: HashMap<String, String>,
    /// The resolved forwarded-for address, if any header carried a parsable IP.
    pub forwarded_for: Option<IpAddr>,
}

impl Request {
    /// Parse a WebSocket upgrade request head.
    ///
    /// # Errors
    ///
    /// Returns `Error::HandshakeFailed` if the head is not valid UTF-8, the
    /// request line is malformed, the method is not `GET`, the version is not
    /// `HTTP/1.1`, or a security-critical header is duplicated.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| Error::HandshakeFailed("Invalid UTF-8 in request head".into()))?;

        let mut lines = text.lines();
        let request_line = lines
            .next()
            .ok_or_else(|| Error::HandshakeFailed("Empty request".into()))?
            .to_string();

        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(Error::HandshakeFailed("Invalid request line".into()));
        }
        if parts[0] != "GET" {
            return Err(Error::HandshakeFailed(format!(
                "Expected GET method, got {}",
                parts[0]
            )));
        }
        if !parts[2].starts_with("HTTP/1.1") {
            return Err(Error::HandshakeFailed(format!(
                "Expected HTTP/1.1, got {}",
                parts[2]
            )));
        }
        let path = parts[1].to_string();

        let security_headers = [
            "host",
            "upgrade",
            "connection",
            "sec-websocket-key",
            "sec-websocket-version",
        ];
        let headers = parse_headers(lines, Some(&security_headers))?;
        let forwarded_for = resolve_forwarded_for(&headers);

        Ok(Self {
            request_line,
            path,
            headers,
            forwarded_for,
        })
    }

    /// Look up a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }
}

/// Resolve the peer address from the forwarding headers.
///
/// Headers are consulted in a fixed priority order; the first one present
/// wins. Its value is comma-split, the first entry trimmed and parsed as an
/// IP address.
fn resolve_forwarded_for(headers: &HashMap<String, String>) -> Option<IpAddr> {
    let value = FORWARDED_HEADERS.iter().find_map(|name| headers.get(*name))?;
    let first = value.split(',').next()?.trim();
    first.parse().ok()
}

/// Perform the client side of the WebSocket handshake.
///
/// Writes the HTTP upgrade request with a fresh random key, then reads and
/// validates the server's 101 response. Returns the key that was used. The
/// response head is capped by `limits.max_handshake_size`.
///
/// # Errors
///
/// Returns `Error::HandshakeFailed` on any status, header, or accept-key
/// mismatch; the connection must not be wrapped in a session on failure.
pub fn client_handshake<R: Read, W: Write>(
    input: &mut R,
    output: &mut W,
    host: &str,
    path: &str,
    limits: &Limits,
) -> Result<String> {
    let key = generate_key();

    let request = format!(
        "GET {path} HTTP/1.1\r\n\
         Host: {host}\r\n\
         Connection: Upgrade\r\n\
         Upgrade: websocket\r\n\
         Sec-WebSocket-Version: 13\r\n\
         Sec-WebSocket-Key: {key}\r\n\
         \r\n"
    );
    output.write_all(request.as_bytes())?;
    output.flush()?;

    let head = read_http_head(input, limits)?;
    let text = std::str::from_utf8(&head)
        .map_err(|_| Error::HandshakeFailed("Invalid UTF-8 in response head".into()))?;

    let mut lines = text.lines();
    let status_line = lines
        .next()
        .ok_or_else(|| Error::HandshakeFailed("Empty response".into()))?;
    if !status_line.starts_with("HTTP/1.1 101") {
        return Err(Error::HandshakeFailed(format!(
            "Expected 101 status, got: {status_line}"
        )));
    }

    let headers = parse_headers(lines, None)?;

    let upgrade = headers
        .get("upgrade")
        .ok_or_else(|| Error::HandshakeFailed("Missing Upgrade header in response".into()))?;
    if !upgrade.eq_ignore_ascii_case("websocket") {
        return Err(Error::HandshakeFailed(format!(
            "Invalid Upgrade header: {upgrade}"
        )));
    }

    let connection = headers
        .get("connection")
        .ok_or_else(|| Error::HandshakeFailed("Missing Connection header in response".into()))?;
    if !connection.to_lowercase().contains("upgrade") {
        return Err(Error::HandshakeFailed(format!(
            "Invalid Connection header: {connection}"
        )));
    }

    let accept = headers
        .get("sec-websocket-accept")
        .ok_or_else(|| Error::HandshakeFailed("Missing Sec-WebSocket-Accept header".into()))?;
    let expected = compute_accept_key(&key);
    if *accept != expected {
        return Err(Error::HandshakeFailed(format!(
            "Sec-WebSocket-Accept mismatch: expected {expected}, got {accept}"
        )));
    }

    debug!("client handshake completed for {host}{path}");
    Ok(key)
}

/// Perform the server side of the WebSocket handshake.
///
/// The caller has already routed this connection as a websocket: a request
/// without an `Upgrade: websocket` header is a hard failure, not a 4xx
/// fallback. `request_filter` may reject the request by returning an HTTP
/// status; a rejection writes a plain response with a diagnostic body and
/// fails the call without upgrading. On acceptance the 101 response is
/// written with the computed accept key plus any `response_headers`.
///
/// A parse failure is answered with a best-effort plain 400 (secondary I/O
/// errors are swallowed so the original error is not masked), then re-thrown.
/// The request head is capped by `limits.max_handshake_size`.
///
/// # Errors
///
/// `Error::HandshakeFailed` for malformed, non-upgrade, rejected, or
/// keyless requests; `Error::HandshakeTooLarge` for an oversized head;
/// I/O errors propagate.
pub fn server_handshake<R, W, F>(
    input: &mut R,
    output: &mut W,
    request_filter: F,
    response_headers: &[(&str, &str)],
    limits: &Limits,
) -> Result<Request>
where
    R: Read,
    W: Write,
    F: FnOnce(&Request) -> Option<u16>,
{
    let head = read_http_head(input, limits)?;

    let request = match Request::parse(&head) {
        Ok(request) => request,
        Err(err) => {
            let _ = write_plain_response(output, 400, &format!("Malformed upgrade request: {err}\n"));
            return Err(err);
        }
    };

    match request.header("upgrade") {
        Some(upgrade) if upgrade.eq_ignore_ascii_case("websocket") => {}
        Some(upgrade) => {
            return Err(Error::HandshakeFailed(format!(
                "Invalid Upgrade header: {upgrade}"
            )));
        }
        None => {
            return Err(Error::HandshakeFailed("Missing Upgrade header".into()));
        }
    }

    if let Some(status) = request_filter(&request) {
        debug!("upgrade request rejected with status {status}: {}", request.request_line);
        write_plain_response(
            output,
            status,
            &format!("Rejected: {}\n", request.request_line),
        )?;
        return Err(Error::HandshakeFailed(format!(
            "Request rejected with status {status}"
        )));
    }

    let key = request
        .header("sec-websocket-key")
        .ok_or_else(|| Error::HandshakeFailed("Missing Sec-WebSocket-Key header".into()))?;
    let accept = compute_accept_key(key);

    let mut response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Connection: Upgrade\r\n\
         Upgrade: websocket\r\n\
         Sec-WebSocket-Accept: {accept}\r\n"
    );
    for (name, value) in response_headers {
        validate_header_value(name, value)?;
        response.push_str(&format!("{name}: {value}\r\n"));
    }
    response.push_str("\r\n");
    output.write_all(response.as_bytes())?;
    output.flush()?;

    debug!("accepted websocket upgrade: {}", request.request_line);
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE_REQUEST: &[u8] = b"GET /chat HTTP/1.1\r\n\
        Host: server.example.com\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Sec-WebSocket-Version: 13\r\n\
        \r\n";

    #[test]
    fn test_compute_accept_key_rfc_example() {
        // RFC 6455 Section 1.3 example
        let key = "dGhlIHNhbXBsZSBub25jZQ==";
        assert_eq!(compute_accept_key(key), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn test_generated_key_is_16_bytes() {
        let key = generate_key();
        let decoded = BASE64.decode(&key).unwrap();
        assert_eq!(decoded.len(), 16);
    }

    #[test]
    fn test_parse_valid_request() {
        let req = Request::parse(SAMPLE_REQUEST).unwrap();
        assert_eq!(req.path, "/chat");
        assert_eq!(req.request_line, "GET /chat HTTP/1.1");
        assert_eq!(req.header("host"), Some("server.example.com"));
        assert_eq!(req.header("Sec-WebSocket-Key"), Some("dGhlIHNhbXBsZSBub25jZQ=="));
        assert!(req.forwarded_for.is_none());
    }

    #[test]
    fn test_parse_request_case_insensitive_headers() {
        let request = b"GET /chat HTTP/1.1\r\n\
            HOST: server.example.com\r\n\
            UPGRADE: WebSocket\r\n\
            CONNECTION: upgrade\r\n\
            SEC-WEBSOCKET-KEY: dGhlIHNhbXBsZSBub25jZQ==\r\n\
            SEC-WEBSOCKET-VERSION: 13\r\n\
            \r\n";
        let req = Request::parse(request).unwrap();
        assert_eq!(req.header("host"), Some("server.example.com"));
        assert_eq!(req.header("upgrade"), Some("WebSocket"));
    }

    #[test]
    fn test_parse_rejects_bad_method() {
        let request = b"POST /chat HTTP/1.1\r\nHost: x\r\n\r\n";
        let err = Request::parse(request).unwrap_err();
        assert!(matches!(err, Error::HandshakeFailed(msg) if msg.contains("GET")));
    }

    #[test]
    fn test_parse_rejects_bad_version() {
        let request = b"GET /chat HTTP/1.0\r\nHost: x\r\n\r\n";
        let err = Request::parse(request).unwrap_err();
        assert!(matches!(err, Error::HandshakeFailed(msg) if msg.contains("HTTP/1.1")));
    }

    #[test]
    fn test_parse_rejects_duplicate_host() {
        let request = b"GET / HTTP/1.1\r\n\
            Host: example.com\r\n\
            Host: evil.com\r\n\
            Upgrade: websocket\r\n\
            \r\n";
        let err = Request::parse(request).unwrap_err();
        assert!(matches!(err, Error::HandshakeFailed(msg) if msg.contains("Duplicate")));
    }

    #[test]
    fn test_forwarded_for_priority() {
        let mut headers = HashMap::new();
        headers.insert("x-forwarded-for".to_string(), "10.0.0.4".to_string());
        headers.insert("x-real-ip".to_string(), "10.0.0.2".to_string());
        // x-real-ip outranks x-forwarded-for
        assert_eq!(
            resolve_forwarded_for(&headers),
            Some("10.0.0.2".parse().unwrap())
        );

        headers.insert("real-ip".to_string(), "10.0.0.1".to_string());
        assert_eq!(
            resolve_forwarded_for(&headers),
            Some("10.0.0.1".parse().unwrap())
        );
    }

    #[test]
    fn test_forwarded_for_first_comma_entry() {
        let mut headers = HashMap::new();
        headers.insert(
            "x-forwarded-for".to_string(),
            " 192.168.1.9 , 10.0.0.1, 10.0.0.2".to_string(),
        );
        assert_eq!(
            resolve_forwarded_for(&headers),
            Some("192.168.1.9".parse().unwrap())
        );
    }

    #[test]
    fn test_forwarded_for_unparseable_is_none() {
        let mut headers = HashMap::new();
        headers.insert("forwarded".to_string(), "for=10.0.0.1;proto=https".to_string());
        assert_eq!(resolve_forwarded_for(&headers), None);
    }

    #[test]
    fn test_forwarded_for_ipv6() {
        let mut headers = HashMap::new();
        headers.insert("x-real-ip".to_string(), "::1".to_string());
        assert_eq!(resolve_forwarded_for(&headers), Some("::1".parse().unwrap()));
    }

    #[test]
    fn test_server_handshake_accepts() {
        let mut input = Cursor::new(SAMPLE_REQUEST.to_vec());
        let mut output = Vec::new();

        let req = server_handshake(&mut input, &mut output, |_| None, &[], &Limits::default()).unwrap();
        assert_eq!(req.path, "/chat");

        let response = String::from_utf8(output).unwrap();
        assert!(response.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(response.contains("Upgrade: websocket\r\n"));
        assert!(response.contains("Connection: Upgrade\r\n"));
        assert!(response.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
        assert!(response.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_server_handshake_extra_headers() {
        let mut input = Cursor::new(SAMPLE_REQUEST.to_vec());
        let mut output = Vec::new();

        server_handshake(
            &mut input,
            &mut output,
            |_| None,
            &[("Sec-WebSocket-Protocol", "chat")],
            &Limits::default(),
        )
        .unwrap();

        let response = String::from_utf8(output).unwrap();
        assert!(response.contains("Sec-WebSocket-Protocol: chat\r\n"));
    }

    #[test]
    fn test_server_handshake_crlf_in_extra_header_rejected() {
        let mut input = Cursor::new(SAMPLE_REQUEST.to_vec());
        let mut output = Vec::new();

        let result = server_handshake(
            &mut input,
            &mut output,
            |_| None,
            &[("X-Custom", "value\r\nX-Injected: evil")],
            &Limits::default(),
        );
        assert!(matches!(result, Err(Error::InvalidHeaderValue { .. })));
    }

    #[test]
    fn test_server_handshake_filter_rejection() {
        let mut input = Cursor::new(SAMPLE_REQUEST.to_vec());
        let mut output = Vec::new();

        let result =
            server_handshake(&mut input, &mut output, |_| Some(403), &[], &Limits::default());
        assert!(matches!(result, Err(Error::HandshakeFailed(_))));

        let response = String::from_utf8(output).unwrap();
        assert!(response.starts_with("HTTP/1.1 403 Forbidden\r\n"));
        assert!(response.contains("Rejected: GET /chat HTTP/1.1"));
        // The connection was not upgraded.
        assert!(!response.contains("101"));
    }

    #[test]
    fn test_server_handshake_missing_upgrade_is_hard_failure() {
        let request = b"GET /chat HTTP/1.1\r\n\
            Host: server.example.com\r\n\
            Connection: keep-alive\r\n\
            \r\n";
        let mut input = Cursor::new(request.to_vec());
        let mut output = Vec::new();

        let result = server_handshake(&mut input, &mut output, |_| None, &[], &Limits::default());
        assert!(matches!(result, Err(Error::HandshakeFailed(msg)) if msg.contains("Upgrade")));
        // Hard failure: no 4xx fallback was written.
        assert!(output.is_empty());
    }

    #[test]
    fn test_server_handshake_parse_error_writes_400() {
        let request = b"BOGUS\r\n\r\n\r\n\r\n";
        let mut input = Cursor::new(request.to_vec());
        let mut output = Vec::new();

        let result = server_handshake(&mut input, &mut output, |_| None, &[], &Limits::default());
        assert!(matches!(result, Err(Error::HandshakeFailed(_))));

        let response = String::from_utf8(output).unwrap();
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(response.contains("Malformed upgrade request"));
    }

    #[test]
    fn test_server_handshake_missing_key() {
        let request = b"GET /chat HTTP/1.1\r\n\
            Host: server.example.com\r\n\
            Upgrade: websocket\r\n\
            Connection: Upgrade\r\n\
            Sec-WebSocket-Version: 13\r\n\
            \r\n";
        let mut input = Cursor::new(request.to_vec());
        let mut output = Vec::new();

        let result = server_handshake(&mut input, &mut output, |_| None, &[], &Limits::default());
        assert!(
            matches!(result, Err(Error::HandshakeFailed(msg)) if msg.contains("Sec-WebSocket-Key"))
        );
    }

    #[test]
    fn test_server_handshake_oversized_head() {
        let mut request = b"GET / HTTP/1.1\r\n".to_vec();
        request.extend(std::iter::repeat(b'A').take(10_000));
        let mut input = Cursor::new(request);
        let mut output = Vec::new();

        let result = server_handshake(&mut input, &mut output, |_| None, &[], &Limits::default());
        assert!(matches!(result, Err(Error::HandshakeTooLarge { .. })));
    }

    #[test]
    fn test_handshake_size_limit_is_configurable() {
        // A head over the default 8 KB cap is accepted with a raised limit.
        let mut request = b"GET /chat HTTP/1.1\r\n".to_vec();
        request.extend_from_slice(b"X-Padding: ");
        request.extend(std::iter::repeat(b'A').take(12_000));
        request.extend_from_slice(
            b"\r\n\
            Host: server.example.com\r\n\
            Upgrade: websocket\r\n\
            Connection: Upgrade\r\n\
            Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
            \r\n",
        );
        let roomy = Limits {
            max_handshake_size: 32 * 1024,
            ..Limits::default()
        };

        let mut input = Cursor::new(request.clone());
        let mut output = Vec::new();
        let req = server_handshake(&mut input, &mut output, |_| None, &[], &roomy).unwrap();
        assert_eq!(req.path, "/chat");

        // The same head is still rejected under the default cap.
        let mut input = Cursor::new(request);
        let mut output = Vec::new();
        let result = server_handshake(&mut input, &mut output, |_| None, &[], &Limits::default());
        assert!(matches!(result, Err(Error::HandshakeTooLarge { .. })));

        // And the client side honors a deliberately tiny ceiling.
        let response = b"HTTP/1.1 101 Switching Protocols\r\n\r\n";
        let mut input = Cursor::new(response.to_vec());
        let mut output = Vec::new();
        let tiny = Limits {
            max_handshake_size: 8,
            ..Limits::default()
        };
        let result = client_handshake(&mut input, &mut output, "example.com", "/", &tiny);
        assert!(matches!(result, Err(Error::HandshakeTooLarge { max: 8, .. })));
    }

    #[test]
    fn test_server_handshake_does_not_consume_pipelined_frames() {
        let mut data = SAMPLE_REQUEST.to_vec();
        data.extend_from_slice(&[0x81, 0x01, b'x']); // a frame right behind the head
        let mut input = Cursor::new(data);
        let mut output = Vec::new();

        server_handshake(&mut input, &mut output, |_| None, &[], &Limits::default()).unwrap();
        let mut rest = Vec::new();
        input.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, &[0x81, 0x01, b'x']);
    }

    #[test]
    fn test_client_handshake_request_format() {
        // Capture the request the client writes; the EOF from the empty
        // response side is expected and discarded.
        let mut request_buf = Vec::new();
        let mut empty = Cursor::new(Vec::new());
        let _ = client_handshake(
            &mut empty,
            &mut request_buf,
            "example.com",
            "/ws",
            &Limits::default(),
        );

        let key = String::from_utf8(request_buf.clone())
            .unwrap()
            .lines()
            .find_map(|l| l.strip_prefix("Sec-WebSocket-Key: ").map(str::to_string))
            .unwrap();
        assert_eq!(BASE64.decode(&key).unwrap().len(), 16);

        let request = String::from_utf8(request_buf).unwrap();
        assert!(request.starts_with("GET /ws HTTP/1.1\r\n"));
        assert!(request.contains("Host: example.com\r\n"));
        assert!(request.contains("Connection: Upgrade\r\n"));
        assert!(request.contains("Upgrade: websocket\r\n"));
        assert!(request.contains("Sec-WebSocket-Version: 13\r\n"));
    }

    #[test]
    fn test_client_handshake_rejects_bad_status() {
        let response = b"HTTP/1.1 200 OK\r\n\r\n";
        let mut input = Cursor::new(response.to_vec());
        let mut output = Vec::new();

        let result = client_handshake(&mut input, &mut output, "example.com", "/", &Limits::default());
        assert!(matches!(result, Err(Error::HandshakeFailed(msg)) if msg.contains("101")));
    }

    #[test]
    fn test_client_handshake_rejects_accept_mismatch() {
        let response = b"HTTP/1.1 101 Switching Protocols\r\n\
            Upgrade: websocket\r\n\
            Connection: Upgrade\r\n\
            Sec-WebSocket-Accept: bm90LXRoZS1yaWdodC1rZXk=\r\n\
            \r\n";
        let mut input = Cursor::new(response.to_vec());
        let mut output = Vec::new();

        // The client generates a random key, so a fixed accept value cannot match.
        let result = client_handshake(&mut input, &mut output, "example.com", "/", &Limits::default());
        assert!(matches!(result, Err(Error::HandshakeFailed(msg)) if msg.contains("mismatch")));
    }

    #[test]
    fn test_client_handshake_rejects_missing_upgrade() {
        let response = b"HTTP/1.1 101 Switching Protocols\r\n\
            Connection: Upgrade\r\n\
            Sec-WebSocket-Accept: x\r\n\
            \r\n";
        let mut input = Cursor::new(response.to_vec());
        let mut output = Vec::new();

        let result = client_handshake(&mut input, &mut output, "example.com", "/", &Limits::default());
        assert!(matches!(result, Err(Error::HandshakeFailed(msg)) if msg.contains("Upgrade")));
    }

    #[test]
    fn test_reason_phrases() {
        assert_eq!(reason_phrase(400), "Bad Request");
        assert_eq!(reason_phrase(403), "Forbidden");
        assert_eq!(reason_phrase(999), "Error");
    }
}
