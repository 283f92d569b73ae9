use std::path::{Path, PathBuf};

use crossbeam_channel::{Receiver, Sender};
use rusqlite::Connection;
use tracing::{error, info, warn};

use crate::db::{write_record, TableCounts};
use crate::error::{exit, Error, Result};
use crate::extract::extract;
use crate::parser::LogGrammar;
use crate::utils::SendErrorsExt;

/// Outcome of one committed file.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct FileReport {
    pub path: PathBuf,
    /// Records written, including ones already present in the database.
    pub records: usize,
    pub rejected: usize,
    /// Rows the file added to `log`.
    pub new_rows: usize,
}

#[derive(Debug)]
pub struct BatchSummary {
    pub reports: Vec<FileReport>,
    pub failed: Vec<(PathBuf, Error)>,
    pub totals: TableCounts,
}

impl BatchSummary {
    pub fn exit_code(&self) -> i32 {
        if self.failed.is_empty() {
            exit::OK
        } else {
            exit::FILES_FAILED
        }
    }
}

/// Feeds access log files into the database, one transaction per file.
///
/// Lines that cannot be turned into a record are reported and skipped. A file
/// that cannot be read or written is rolled back as a whole and the batch moves
/// on to the next one, unless `fail_fast` is set.
pub struct Ingestor<G> {
    con: Connection,
    grammar: G,
    strict: bool,
    fail_fast: bool,
    rejections: Sender<Error>,
    rejected: Receiver<Error>,
}

impl<G: LogGrammar> Ingestor<G> {
    pub fn new(con: Connection, grammar: G) -> Self {
        let (rejections, rejected) = crossbeam_channel::unbounded();
        Ingestor {
            con,
            grammar,
            strict: false,
            fail_fast: false,
            rejections,
            rejected,
        }
    }

    /// Roll back any file that had a rejected line.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Stop at the first file that fails.
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    #[cfg(test)]
    pub fn connection(&self) -> &Connection {
        &self.con
    }

    pub fn ingest_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<BatchSummary> {
        let mut reports = Vec::new();
        let mut failed = Vec::new();

        for path in paths {
            let path = path.as_ref();
            info!("Reading {}...", path.display());
            match self.ingest_file(path) {
                Ok(report) => {
                    info!(
                        file = %report.path.display(),
                        records = report.records,
                        rejected = report.rejected,
                        new_rows = report.new_rows,
                        "committed"
                    );
                    reports.push(report);
                }
                Err(err) => {
                    error!(file = %path.display(), "{}", err);
                    failed.push((path.to_owned(), err));
                    if self.fail_fast {
                        warn!("stopping after first failed file");
                        break;
                    }
                }
            }
        }

        Ok(BatchSummary {
            reports,
            failed,
            totals: TableCounts::read(&self.con)?,
        })
    }

    pub fn ingest_file(&mut self, path: &Path) -> Result<FileReport> {
        let contents = std::fs::read_to_string(path).map_err(|source| Error::FileRead {
            path: path.to_owned(),
            source,
        })?;
        let lines = contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_owned)
            .collect::<Vec<_>>();
        self.ingest_lines(path, &lines)
    }

    /// Writes every line of one file and commits once at the end. On error
    /// nothing from this file is kept.
    pub fn ingest_lines(&mut self, path: &Path, lines: &[String]) -> Result<FileReport> {
        let tx = self.con.transaction()?;

        let written = write_entries(&tx, &self.grammar, lines, &self.rejections);
        let rejected = report_rejections(&self.rejected, path);
        let (records, new_rows) = written?;

        if self.strict && rejected > 0 {
            // dropping `tx` rolls the file back
            return Err(Error::Rejected {
                path: path.to_owned(),
                count: rejected,
            });
        }
        tx.commit()?;

        Ok(FileReport {
            path: path.to_owned(),
            records,
            rejected,
            new_rows,
        })
    }
}

/// Returns how many records were written and how many of them were new `log` rows.
fn write_entries<G: LogGrammar>(
    con: &Connection,
    grammar: &G,
    lines: &[String],
    rejections: &Sender<Error>,
) -> Result<(usize, usize)> {
    let mut records = 0;
    let mut new_rows = 0;
    for record in grammar
        .parse_entries(lines)
        .into_iter()
        .map(|entry| entry.map_err(Error::from).and_then(|entry| extract(&entry)))
        .send_errors(rejections)
    {
        new_rows += write_record(con, &record)?;
        records += 1;
    }
    Ok((records, new_rows))
}

fn report_rejections(rejected: &Receiver<Error>, path: &Path) -> usize {
    rejected
        .try_iter()
        .inspect(|err| warn!(file = %path.display(), "skipping record: {}", err))
        .count()
}
