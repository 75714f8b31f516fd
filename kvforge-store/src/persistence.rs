//! The append-only log: a text-line record of every mutation, replayed on
//! startup to reconstruct the unified store.
//!
//! Unlike the binary, checksummed, length-prefixed write-ahead log this
//! project's storage layer was originally built around, this format is
//! deliberately plain text — one human-readable record per line — because
//! the externally visible file format is part of this system's contract
//! rather than an internal implementation detail.

use kvforge_core::{Error, Result, SyncMode, Token};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// One durable mutation record.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Set { key: Token, value: Token },
    Del { key: Token },
    Zadd { key: Token, score: f64, member: Token },
    Zrem { key: Token, member: Token },
}

impl Record {
    fn encode(&self) -> String {
        match self {
            Record::Set { key, value } => format!("SET {key} {value}"),
            Record::Del { key } => format!("DEL {key}"),
            Record::Zadd { key, score, member } => format!("ZADD {key} {score} {member}"),
            Record::Zrem { key, member } => format!("ZREM {key} {member}"),
        }
    }

    /// Parses one AOF line. Returns `None` on any malformed line — the
    /// caller is expected to log and skip rather than abort replay, since
    /// this plain-text format offers no way to distinguish a genuinely
    /// corrupt line from a value that happened to contain a delimiter.
    fn parse(line: &str) -> Option<Record> {
        let mut parts = line.splitn(2, ' ');
        let cmd = parts.next()?;
        let rest = parts.next().unwrap_or("");
        match cmd {
            "SET" => {
                let mut fields = rest.splitn(2, ' ');
                let key = fields.next()?;
                let value = fields.next()?;
                Some(Record::Set {
                    key: Token::from_bytes(key.as_bytes().to_vec())?,
                    value: Token::from_bytes(value.as_bytes().to_vec())?,
                })
            }
            "DEL" => {
                if rest.is_empty() {
                    return None;
                }
                Some(Record::Del {
                    key: Token::from_bytes(rest.as_bytes().to_vec())?,
                })
            }
            "ZADD" => {
                let mut fields = rest.splitn(3, ' ');
                let key = fields.next()?;
                let score = fields.next()?;
                let member = fields.next()?;
                Some(Record::Zadd {
                    key: Token::from_bytes(key.as_bytes().to_vec())?,
                    score: score.parse().ok()?,
                    member: Token::from_bytes(member.as_bytes().to_vec())?,
                })
            }
            "ZREM" => {
                let mut fields = rest.splitn(2, ' ');
                let key = fields.next()?;
                let member = fields.next()?;
                Some(Record::Zrem {
                    key: Token::from_bytes(key.as_bytes().to_vec())?,
                    member: Token::from_bytes(member.as_bytes().to_vec())?,
                })
            }
            _ => None,
        }
    }
}

/// Appends records to the AOF file, honoring the configured [`SyncMode`].
///
/// # Example
///
/// ```no_run
/// use kvforge_store::persistence::{AppendLog, Record};
/// use kvforge_core::{SyncMode, Token};
///
/// let mut log = AppendLog::open("appendonly.aof", SyncMode::Normal)?;
/// log.append(&Record::Set { key: Token::new("k"), value: Token::new("v") })?;
/// # Ok::<(), kvforge_core::Error>(())
/// ```
pub struct AppendLog {
    file: BufWriter<File>,
    path: PathBuf,
    sync_mode: SyncMode,
}

impl AppendLog {
    pub fn open(path: impl AsRef<Path>, sync_mode: SyncMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(AppendLog {
            file: BufWriter::new(file),
            path,
            sync_mode,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends and, per [`SyncMode`], flushes/fsyncs `record`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] on any I/O failure, so callers can
    /// log it at `warn` and still apply the in-memory mutation rather than
    /// fail the whole command.
    pub fn append(&mut self, record: &Record) -> Result<()> {
        let line = record.encode();
        self.file
            .write_all(line.as_bytes())
            .and_then(|_| self.file.write_all(b"\n"))
            .map_err(|e| Error::Persistence(e.to_string()))?;

        match self.sync_mode {
            SyncMode::None => {}
            SyncMode::Normal => {
                self.file
                    .flush()
                    .map_err(|e| Error::Persistence(e.to_string()))?;
            }
            SyncMode::Full => {
                self.file
                    .flush()
                    .map_err(|e| Error::Persistence(e.to_string()))?;
                self.file
                    .get_ref()
                    .sync_all()
                    .map_err(|e| Error::Persistence(e.to_string()))?;
            }
        }
        Ok(())
    }
}

/// Reads an AOF file line by line for replay. Yields a `None` item
/// wrapper-free `Option<Record>` per line — malformed lines surface as
/// `None`, letting the caller log and continue rather than abort startup.
pub struct AppendLogReader {
    lines: std::io::Lines<BufReader<File>>,
}

impl AppendLogReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Ok(AppendLogReader {
            lines: BufReader::new(file).lines(),
        })
    }
}

impl Iterator for AppendLogReader {
    /// `Ok(record)` for a well-formed line, `Err(line_number)` for a
    /// malformed one (1-indexed, for the replay warning), ending at EOF.
    type Item = std::result::Result<Record, usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line_number = 0;
        loop {
            let raw = self.lines.next()?;
            line_number += 1;
            let line = match raw {
                Ok(l) => l,
                Err(_) => return Some(Err(line_number)),
            };
            if line.is_empty() {
                continue;
            }
            return match Record::parse(&line) {
                Some(record) => Some(Ok(record)),
                None => Some(Err(line_number)),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn append_and_replay_round_trips_all_record_kinds() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.aof");

        let mut log = AppendLog::open(&path, SyncMode::Full).unwrap();
        log.append(&Record::Set {
            key: Token::new("k"),
            value: Token::new("v"),
        })
        .unwrap();
        log.append(&Record::Zadd {
            key: Token::new("z"),
            score: 1.5,
            member: Token::new("m"),
        })
        .unwrap();
        log.append(&Record::Zrem {
            key: Token::new("z"),
            member: Token::new("m"),
        })
        .unwrap();
        log.append(&Record::Del { key: Token::new("k") }).unwrap();

        let replayed: Vec<Record> = AppendLogReader::open(&path)
            .unwrap()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(
            replayed,
            vec![
                Record::Set { key: Token::new("k"), value: Token::new("v") },
                Record::Zadd { key: Token::new("z"), score: 1.5, member: Token::new("m") },
                Record::Zrem { key: Token::new("z"), member: Token::new("m") },
                Record::Del { key: Token::new("k") },
            ]
        );
    }

    #[test]
    fn malformed_line_surfaces_as_line_number_not_aborting_replay() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.aof");
        std::fs::write(&path, "SET onlykey\nGARBAGE\nDEL onlykey\n").unwrap();

        let results: Vec<_> = AppendLogReader::open(&path).unwrap().collect();
        assert!(results[0].is_err());
        assert!(results[1].is_err());
        assert_eq!(results[2], Ok(Record::Del { key: Token::new("onlykey") }));
    }

    #[test]
    fn value_containing_spaces_is_captured_verbatim() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.aof");
        let mut log = AppendLog::open(&path, SyncMode::None).unwrap();
        log.append(&Record::Set {
            key: Token::new("k"),
            value: Token::new("hello world"),
        })
        .unwrap();
        drop(log);

        let mut reader = AppendLogReader::open(&path).unwrap();
        assert_eq!(
            reader.next(),
            Some(Ok(Record::Set {
                key: Token::new("k"),
                value: Token::new("hello world"),
            }))
        );
    }
}
