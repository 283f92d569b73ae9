use chrono::{DateTime, FixedOffset};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

#[derive(Debug)]
pub struct ParseError(String);

impl ParseError {
    pub fn new(line: impl AsRef<str>) -> Self {
        ParseError(line.as_ref().to_owned())
    }
}

impl std::error::Error for ParseError {}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unable to parse line '{}'", self.0)
    }
}

/// One line as understood by the log grammar, before any interpretation of
/// the request line.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ParsedEntry {
    pub virtual_host: String,
    pub server_port: u16,
    pub remote_host: String,
    pub headers: Vec<(String, String)>,
    pub request_line: String,
    pub request_time: DateTime<FixedOffset>,
    pub final_status: u16,
    pub bytes_out: i64,
}

impl ParsedEntry {
    /// Request header by case-insensitive name, empty when it was not logged.
    pub fn header(&self, name: &str) -> &str {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
            .unwrap_or("")
    }
}

/// Turns raw text lines into parsed entries, one result per line.
pub trait LogGrammar {
    fn parse_line(&self, line: &str) -> Result<ParsedEntry, ParseError>;

    fn parse_entries(&self, lines: &[String]) -> Vec<Result<ParsedEntry, ParseError>> {
        lines.iter().map(|line| self.parse_line(line)).collect()
    }
}

// https://httpd.apache.org/docs/2.4/logs.html
// Quoted fields use Apache's backslash escaping, so `\"` may appear inside them.
const COMBINED_TAIL: &str = r#"(?P<remote>[^ ]+) [^ ]+ (?:"(?:[^"\\]|\\.)*"|[^ ]+) \[(?P<date>[^\]]+)\] "(?P<request>(?:[^"\\]|\\.)*)" (?P<status>\d{3}) (?P<bytes>\d+|-) "(?P<referer>(?:[^"\\]|\\.)*)" "(?P<useragent>(?:[^"\\]|\\.)*)"\s*$"#;

// LogFormat "%v:%p %h %l %u %t \"%r\" %>s %O \"%{Referer}i\" \"%{User-Agent}i\"" vhost_combined
static VHOST_COMBINED_LOG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r#"^(?P<vhost>[^ ]*):(?P<port>\d+) {}"#, COMBINED_TAIL)).unwrap()
});

// LogFormat "%h %l %u %t \"%r\" %>s %O \"%{Referer}i\" \"%{User-Agent}i\"" combined
static COMBINED_LOG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^{}", COMBINED_TAIL)).unwrap());

const DATE_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum AccessLogFormat {
    VhostCombined,
    /// Lines carry no server identity, so every entry gets this one.
    Combined { vhost: String, port: u16 },
}

impl LogGrammar for AccessLogFormat {
    fn parse_line(&self, line: &str) -> Result<ParsedEntry, ParseError> {
        let (captures, vhost, port) = match self {
            AccessLogFormat::VhostCombined => {
                let captures = VHOST_COMBINED_LOG_REGEX
                    .captures(line)
                    .ok_or_else(|| ParseError::new(line))?;
                let vhost = captures["vhost"].to_owned();
                let port = captures["port"]
                    .parse::<u16>()
                    .map_err(|_| ParseError::new(line))?;
                (captures, vhost, port)
            }
            AccessLogFormat::Combined { vhost, port } => {
                let captures = COMBINED_LOG_REGEX
                    .captures(line)
                    .ok_or_else(|| ParseError::new(line))?;
                (captures, vhost.clone(), *port)
            }
        };
        entry_from_captures(line, &captures, vhost, port)
    }
}

fn entry_from_captures(
    line: &str,
    captures: &Captures<'_>,
    virtual_host: String,
    server_port: u16,
) -> Result<ParsedEntry, ParseError> {
    let request_time = DateTime::parse_from_str(&captures["date"], DATE_FORMAT)
        .map_err(|_| ParseError::new(line))?;
    let final_status = captures["status"]
        .parse::<u16>()
        .map_err(|_| ParseError::new(line))?;
    let bytes_out = match &captures["bytes"] {
        "-" => 0,
        bytes => bytes.parse::<i64>().map_err(|_| ParseError::new(line))?,
    };

    // "-" is how Apache logs a header the client did not send
    let headers = [("Referer", "referer"), ("User-Agent", "useragent")]
        .into_iter()
        .filter(|(_, group)| &captures[*group] != "-")
        .map(|(name, group)| (name.to_owned(), unescape(&captures[group])))
        .collect();

    Ok(ParsedEntry {
        virtual_host,
        server_port,
        remote_host: captures["remote"].to_owned(),
        headers,
        request_line: unescape(&captures["request"]),
        request_time,
        final_status,
        bytes_out,
    })
}

/// Reverses Apache's log item escaping (`\"`, `\\`, `\xhh` and the C escapes).
///
/// Bytes map one to one onto Latin-1 characters, so distinct escapes never
/// collapse into the same text.
fn unescape(field: &str) -> String {
    if !field.contains('\\') {
        return field.to_owned();
    }
    let raw = field.as_bytes();
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] != b'\\' || i + 1 == raw.len() {
            out.push(raw[i]);
            i += 1;
            continue;
        }
        match raw[i + 1] {
            b'x' => match field
                .get(i + 2..i + 4)
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            {
                Some(byte) => {
                    out.push(byte);
                    i += 4;
                }
                None => {
                    out.push(b'\\');
                    i += 1;
                }
            },
            escaped => {
                out.push(match escaped {
                    b'n' => b'\n',
                    b'r' => b'\r',
                    b't' => b'\t',
                    b'b' => 0x08,
                    b'v' => 0x0b,
                    other => other,
                });
                i += 2;
            }
        }
    }
    out.iter().map(|&b| b as char).collect()
}
