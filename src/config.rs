use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::parser::AccessLogFormat;

#[derive(Parser, Debug)]
#[command(
    name = "llllogs",
    version,
    about = "Parse access logs into SQLite, keeping visitor details in droppable hash tables"
)]
pub struct Cli {
    /// Access log files, ingested in order
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// SQLite database to write to, created if missing
    #[arg(long, env = "LLLLOGS_DATABASE", default_value = "logs.db")]
    pub database: String,

    /// Log line format
    #[arg(long, env = "LLLLOGS_FORMAT", value_enum, default_value_t = Format::VhostCombined)]
    pub format: Format,

    /// Virtual host recorded for `combined` lines
    #[arg(long, env = "LLLLOGS_DEFAULT_VHOST", default_value = "-")]
    pub default_vhost: String,

    /// Server port recorded for `combined` lines
    #[arg(long, env = "LLLLOGS_DEFAULT_PORT", default_value_t = 80)]
    pub default_port: u16,

    /// Roll back a whole file if any of its lines is rejected
    #[arg(long, env = "LLLLOGS_STRICT")]
    pub strict: bool,

    /// Stop at the first file that fails instead of moving on
    #[arg(long, env = "LLLLOGS_FAIL_FAST")]
    pub fail_fast: bool,

    /// Emit logs as JSON
    #[arg(long, env = "LLLLOGS_LOG_JSON")]
    pub log_json: bool,
}

#[derive(ValueEnum, Clone, Copy, PartialEq, Eq, Debug)]
pub enum Format {
    /// `%v:%p %h %l %u %t "%r" %>s %O "%{Referer}i" "%{User-Agent}i"`
    VhostCombined,
    /// `%h %l %u %t "%r" %>s %O "%{Referer}i" "%{User-Agent}i"`
    Combined,
}

impl Cli {
    pub fn log_format(&self) -> AccessLogFormat {
        match self.format {
            Format::VhostCombined => AccessLogFormat::VhostCombined,
            Format::Combined => AccessLogFormat::Combined {
                vhost: self.default_vhost.clone(),
                port: self.default_port,
            },
        }
    }
}
