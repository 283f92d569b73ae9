use derive_more::Display;
use rusqlite::types::{ToSql, ToSqlOutput};
use sha3::{Digest as _, Sha3_224};

/// Name of the digest used for every pseudonymised column. Databases written
/// with a different algorithm will not dedupe against this one.
pub const HASH_ALGORITHM: &str = "SHA3-224";

/// Lowercase hex digest of a visitor-identifying value.
#[derive(PartialEq, Eq, Clone, Hash, Debug, Display)]
pub struct Digest(String);

impl Digest {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ToSql for Digest {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.0.to_sql()
    }
}

/// One-way, deterministic digest of `value`. The empty string hashes like any
/// other input, which is what absent headers become.
pub fn hash(value: &str) -> Digest {
    Digest(format!("{:x}", Sha3_224::digest(value.as_bytes())))
}
