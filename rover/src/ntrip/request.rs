//! NTRIP request line and caster response header.

use base64::{engine::general_purpose::STANDARD, Engine};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, trace};

use crate::{config::NtripSettings, error::NtripError};

pub const USER_AGENT: &str = concat!("NTRIP rover/", env!("CARGO_PKG_VERSION"));

/// Longest header line accepted from the caster
const MAX_HEADER_LINE: usize = 1024;

/// What follows the response header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// RTCM3 correction data
    Stream,
    /// `STR` records terminated by `ENDSOURCETABLE`
    Sourcetable,
}

/// GET request for `mountpoint`, the sourcetable when it is empty
pub fn build_request(settings: &NtripSettings, mountpoint: &str) -> String {
    let mut request = format!(
        "GET /{} HTTP/1.1\r\nUser-Agent: {}\r\nHost: {}:{}\r\n",
        mountpoint, USER_AGENT, settings.server, settings.port
    );
    if let Some(user) = &settings.user {
        let credentials = STANDARD.encode(format!("{}:{}", user, settings.password));
        request.push_str(&format!("Authorization: Basic {}\r\n", credentials));
    }
    request.push_str(&format!("Ntrip-Version: Ntrip/{}\r\n\r\n", settings.version));
    request
}

/// Protocol and code of a status line
fn parse_status(line: &str) -> Result<(&str, u16), NtripError> {
    let mut parts = line.split_whitespace();
    let protocol = parts.next().ok_or(NtripError::Protocol("empty status line"))?;
    let code = parts
        .next()
        .and_then(|code| code.parse().ok())
        .ok_or(NtripError::Protocol("status line without code"))?;
    Ok((protocol, code))
}

/// One line up to and including `\n`, `None` at end of stream. Casters are
/// not consistent about encodings, so bytes that are not UTF-8 are replaced
/// instead of failing the read.
pub(crate) async fn read_text_line<R>(reader: &mut R) -> Result<Option<String>, NtripError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    if reader.read_until(b'\n', &mut line).await? == 0 {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&line).into_owned()))
}

async fn read_header_line<R>(reader: &mut R) -> Result<Option<String>, NtripError>
where
    R: AsyncBufRead + Unpin,
{
    let Some(line) = read_text_line(reader).await? else {
        return Ok(None);
    };
    if line.len() > MAX_HEADER_LINE {
        return Err(NtripError::Protocol("header line too long"));
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Read the status line and the header fields up to the blank line.
///
/// `ICY 200 OK` has no header fields and is followed by the stream at once.
pub async fn read_response<R>(reader: &mut R) -> Result<Response, NtripError>
where
    R: AsyncBufRead + Unpin,
{
    let status = read_header_line(reader)
        .await?
        .ok_or(NtripError::Protocol("connection closed before status line"))?;
    debug!(status = %status, "caster response");
    let (protocol, code) = parse_status(&status)?;
    if code != 200 {
        return Err(NtripError::Status(status));
    }
    let mut response = match protocol {
        "ICY" => return Ok(Response::Stream),
        "SOURCETABLE" => Response::Sourcetable,
        p if p.starts_with("HTTP/") => Response::Stream,
        _ => return Err(NtripError::Protocol("unknown protocol in status line")),
    };
    while let Some(line) = read_header_line(reader).await? {
        if line.is_empty() {
            return Ok(response);
        }
        trace!(header = %line);
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-type")
                && value.to_ascii_lowercase().contains("sourcetable")
            {
                response = Response::Sourcetable;
            }
        }
    }
    Err(NtripError::Protocol("connection closed inside header"))
}
