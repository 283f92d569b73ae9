//! Liberated, light-weight, leak-proof logs.
//!
//! Parses access log files into a SQLite database. Visitor-identifying fields
//! (remote host, referer, user agent) are stored in the `log` table only as
//! SHA3-224 digests; the original values live in the `remote`, `referer` and
//! `agent` lookup tables. Dropping a lookup table pseudonymises the data
//! without touching `log`, and ingesting the same file again adds nothing.

use clap::Parser;
use tracing::{error, info};

use crate::config::Cli;
use crate::error::exit;
use crate::ingest::Ingestor;

mod config;
mod db;
mod error;
mod extract;
mod ingest;
mod logging;
mod models;
mod parser;
mod pseudonym;
mod utils;

fn main() {
    dotenvy::dotenv().ok();
    // Usage errors exit with clap's status 2
    let cli = Cli::parse();
    logging::init_logging(cli.log_json);
    std::process::exit(run(cli));
}

fn run(cli: Cli) -> i32 {
    info!(
        database = %cli.database,
        hash = pseudonym::HASH_ALGORITHM,
        files = cli.files.len(),
        "starting"
    );

    let con = match db::open(&cli.database) {
        Ok(con) => con,
        Err(err) => {
            error!(database = %cli.database, "unable to open database: {}", err);
            return exit::STORAGE_UNAVAILABLE;
        }
    };

    let mut ingestor = Ingestor::new(con, cli.log_format())
        .strict(cli.strict)
        .fail_fast(cli.fail_fast);

    match ingestor.ingest_files(&cli.files) {
        Ok(summary) => {
            info!(
                files = summary.reports.len(),
                failed = summary.failed.len(),
                remote = summary.totals.remote,
                referer = summary.totals.referer,
                agent = summary.totals.agent,
                log = summary.totals.log,
                "done"
            );
            summary.exit_code()
        }
        Err(err) => {
            error!("{}", err);
            exit::STORAGE_UNAVAILABLE
        }
    }
}
