use crate::error::{Error, Result};
use crate::models::{LogRecord, RequestFacts, ServerIdentity, UserIdentity};
use crate::parser::ParsedEntry;

/// Method, target and protocol of a request line such as `GET /a?b=1 HTTP/1.1`.
///
/// Tokens past the third are ignored, fewer than three is an error.
pub fn split_request_line(line: &str) -> Result<(&str, &str, &str)> {
    let mut parts = line.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(method), Some(target), Some(http)) => Ok((method, target, http)),
        _ => Err(Error::MalformedRequestLine {
            line: line.to_owned(),
        }),
    }
}

/// Path and query string, split on the first `?`.
pub fn split_target(target: &str) -> (&str, &str) {
    target.split_once('?').unwrap_or((target, ""))
}

pub fn extract(entry: &ParsedEntry) -> Result<LogRecord> {
    let (method, target, http) = split_request_line(&entry.request_line)?;
    let (path, params) = split_target(target);

    Ok(LogRecord {
        server: ServerIdentity {
            vhost: entry.virtual_host.clone(),
            port: entry.server_port,
        },
        user: UserIdentity {
            remote: entry.remote_host.clone(),
            referer: entry.header("Referer").to_owned(),
            agent: entry.header("User-agent").to_owned(),
        },
        request: RequestFacts {
            time: entry.request_time,
            method: method.to_owned(),
            path: path.to_owned(),
            params: params.to_owned(),
            http: http.to_owned(),
            status: entry.final_status,
            bytes: entry.bytes_out,
        },
    })
}
