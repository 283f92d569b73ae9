use crate::models::LogRecord;
use rusqlite::{params, Connection};

const SCHEMA: &str = include_str!("schema.sql");

/// Text form of the request time, matching what Python's sqlite3 adapter
/// writes for timezone-aware datetimes.
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

pub fn create_schema(con: &Connection) -> rusqlite::Result<()> {
    con.execute_batch(SCHEMA)
}

/// Opens (or creates) the database and makes sure all tables exist.
pub fn open(path: &str) -> rusqlite::Result<Connection> {
    let con = Connection::open(path)?;
    // Hash columns only point at the lookup tables, they must never block
    // deleting from them.
    con.execute_batch("PRAGMA foreign_keys = OFF;")?;
    create_schema(&con)?;
    Ok(con)
}

fn insert_lookup(con: &Connection, table: &str, hash: &str, value: &str) -> rusqlite::Result<()> {
    let mut stmt = con.prepare_cached(&format!(
        "INSERT OR IGNORE INTO {}(hash, value) VALUES(?, ?)",
        table
    ))?;
    stmt.execute(params![hash, value])?;
    Ok(())
}

/// Writes one record: the three lookup rows, then the `log` row. Rows that
/// already exist are left untouched. Returns 1 if the `log` row is new, else 0.
pub fn write_record(con: &Connection, record: &LogRecord) -> rusqlite::Result<usize> {
    let remote = record.user.hashed_remote();
    let referer = record.user.hashed_referer();
    let agent = record.user.hashed_agent();

    insert_lookup(con, "remote", remote.as_str(), &record.user.remote)?;
    insert_lookup(con, "referer", referer.as_str(), &record.user.referer)?;
    insert_lookup(con, "agent", agent.as_str(), &record.user.agent)?;

    let mut stmt = con.prepare_cached(
        "
            INSERT OR IGNORE INTO
            log(vhost, port, remote, time, method, path, params, http, status, bytes, referer, agent)
            VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
    )?;
    stmt.execute(params![
        record.server.vhost,
        record.server.port,
        remote,
        record.request.time.format(TIME_FORMAT).to_string(),
        record.request.method,
        record.request.path,
        record.request.params,
        record.request.http,
        record.request.status,
        record.request.bytes,
        referer,
        agent,
    ])
}

#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
pub struct TableCounts {
    pub remote: i64,
    pub referer: i64,
    pub agent: i64,
    pub log: i64,
}

impl TableCounts {
    pub fn read(con: &Connection) -> rusqlite::Result<Self> {
        let count = |table: &str| -> rusqlite::Result<i64> {
            con.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })
        };
        Ok(TableCounts {
            remote: count("remote")?,
            referer: count("referer")?,
            agent: count("agent")?,
            log: count("log")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{create_schema, open, write_record, TableCounts};
    use crate::models::*;
    use crate::pseudonym::hash;
    use chrono::DateTime;
    use itertools::Itertools;

    fn record() -> LogRecord {
        LogRecord {
            server: ServerIdentity {
                vhost: "example.com".to_owned(),
                port: 443,
            },
            user: UserIdentity {
                remote: "1.2.3.4".to_owned(),
                referer: "".to_owned(),
                agent: "curl/8.0".to_owned(),
            },
            request: RequestFacts {
                time: DateTime::parse_from_rfc3339("2023-10-10T13:55:36+02:00").unwrap(),
                method: "GET".to_owned(),
                path: "/index.html".to_owned(),
                params: "".to_owned(),
                http: "HTTP/1.1".to_owned(),
                status: 200,
                bytes: 512,
            },
        }
    }

    #[test]
    fn test_init_schema() {
        let con = open(":memory:").unwrap();
        // Safe to run again on a populated database
        write_record(&con, &record()).unwrap();
        create_schema(&con).unwrap();
        create_schema(&con).unwrap();
        assert_eq!(1, TableCounts::read(&con).unwrap().log);
    }

    #[test]
    fn test_write_record() {
        let con = open(":memory:").unwrap();
        write_record(&con, &record()).unwrap();

        assert_eq!(
            TableCounts {
                remote: 1,
                referer: 1,
                agent: 1,
                log: 1
            },
            TableCounts::read(&con).unwrap()
        );

        let lookups = ["remote", "referer", "agent"]
            .iter()
            .map(|table| {
                con.query_row(
                    &format!("SELECT hash, value FROM {}", table),
                    [],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                )
                .unwrap()
            })
            .collect_vec();
        assert_eq!(
            vec![
                (hash("1.2.3.4").to_string(), "1.2.3.4".to_owned()),
                (hash("").to_string(), "".to_owned()),
                (hash("curl/8.0").to_string(), "curl/8.0".to_owned()),
            ],
            lookups
        );

        let row = con
            .query_row(
                "SELECT vhost, port, remote, time, method, path, params, http, status, bytes, referer, agent FROM log",
                [],
                |f| {
                    Ok((
                        (
                            f.get::<_, String>(0)?,
                            f.get::<_, i64>(1)?,
                            f.get::<_, String>(2)?,
                            f.get::<_, String>(3)?,
                            f.get::<_, String>(4)?,
                            f.get::<_, String>(5)?,
                        ),
                        (
                            f.get::<_, String>(6)?,
                            f.get::<_, String>(7)?,
                            f.get::<_, i64>(8)?,
                            f.get::<_, i64>(9)?,
                            f.get::<_, String>(10)?,
                            f.get::<_, String>(11)?,
                        ),
                    ))
                },
            )
            .unwrap();
        assert_eq!(
            (
                (
                    "example.com".to_owned(),
                    443,
                    hash("1.2.3.4").to_string(),
                    "2023-10-10 13:55:36+02:00".to_owned(),
                    "GET".to_owned(),
                    "/index.html".to_owned(),
                ),
                (
                    "".to_owned(),
                    "HTTP/1.1".to_owned(),
                    200,
                    512,
                    hash("").to_string(),
                    hash("curl/8.0").to_string(),
                )
            ),
            row
        );
    }

    #[test]
    fn identical_records_store_one_row() {
        let con = open(":memory:").unwrap();
        assert_eq!(1, write_record(&con, &record()).unwrap());
        assert_eq!(0, write_record(&con, &record()).unwrap());
        assert_eq!(
            TableCounts {
                remote: 1,
                referer: 1,
                agent: 1,
                log: 1
            },
            TableCounts::read(&con).unwrap()
        );
    }

    #[test]
    fn any_changed_column_is_a_new_row() {
        let variants: Vec<Box<dyn Fn(&mut LogRecord)>> = vec![
            Box::new(|r: &mut LogRecord| r.server.vhost = "other.example".to_owned()),
            Box::new(|r: &mut LogRecord| r.server.port = 80),
            Box::new(|r: &mut LogRecord| r.user.remote = "5.6.7.8".to_owned()),
            Box::new(|r: &mut LogRecord| {
                r.request.time = DateTime::parse_from_rfc3339("2023-10-10T13:55:37+02:00").unwrap()
            }),
            Box::new(|r: &mut LogRecord| r.request.method = "HEAD".to_owned()),
            Box::new(|r: &mut LogRecord| r.request.path = "/other".to_owned()),
            Box::new(|r: &mut LogRecord| r.request.params = "a=1".to_owned()),
            Box::new(|r: &mut LogRecord| r.request.http = "HTTP/2.0".to_owned()),
            Box::new(|r: &mut LogRecord| r.request.status = 304),
            Box::new(|r: &mut LogRecord| r.request.bytes = 513),
            Box::new(|r: &mut LogRecord| r.user.referer = "https://ref.example/".to_owned()),
            Box::new(|r: &mut LogRecord| r.user.agent = "wget".to_owned()),
        ];
        for change in variants {
            let con = open(":memory:").unwrap();
            let mut changed = record();
            change(&mut changed);
            write_record(&con, &record()).unwrap();
            write_record(&con, &changed).unwrap();
            assert_eq!(2, TableCounts::read(&con).unwrap().log);
        }
    }

    #[test]
    fn lookup_rows_are_first_write_wins() {
        let con = open(":memory:").unwrap();
        write_record(&con, &record()).unwrap();
        let mut second = record();
        second.request.path = "/second".to_owned();
        write_record(&con, &second).unwrap();

        let counts = TableCounts::read(&con).unwrap();
        assert_eq!((1, 1, 1, 2), (counts.remote, counts.referer, counts.agent, counts.log));
    }

    #[test]
    fn erasing_a_lookup_table_does_not_touch_log() {
        let con = open(":memory:").unwrap();
        write_record(&con, &record()).unwrap();

        con.execute("DELETE FROM referer", []).unwrap();
        let counts = TableCounts::read(&con).unwrap();
        assert_eq!(0, counts.referer);
        assert_eq!(1, counts.log);
        let referer: String = con
            .query_row("SELECT referer FROM log", [], |row| row.get(0))
            .unwrap();
        assert_eq!(hash("").to_string(), referer);

        // Unrelated inserts keep working, and the erased value comes back only
        // if it is seen again.
        let mut next = record();
        next.request.path = "/next".to_owned();
        write_record(&con, &next).unwrap();
        let counts = TableCounts::read(&con).unwrap();
        assert_eq!(2, counts.log);
        assert_eq!(1, counts.referer);
    }

    #[test]
    fn dropping_a_lookup_table_does_not_touch_log() {
        let con = open(":memory:").unwrap();
        write_record(&con, &record()).unwrap();
        con.execute_batch("DROP TABLE agent").unwrap();
        let log_rows: i64 = con
            .query_row("SELECT COUNT(*) FROM log", [], |row| row.get(0))
            .unwrap();
        assert_eq!(1, log_rows);
    }
}
