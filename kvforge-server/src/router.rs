//! The command router: dispatches a parsed request to the unified store
//! and the append-only log, and encodes the result as `(Status, String)`.

use kvforge_core::{Status, Token};
use kvforge_store::persistence::{AppendLog, Record};
use kvforge_store::UnifiedStore;

const ERR_WRONG_ARITY: &str = "wrong number of arguments";
const ERR_UNKNOWN_COMMAND: &str = "unknown command";
const ERR_SCORE: &str = "score must be a number";

pub struct Router {
    store: UnifiedStore,
    log: AppendLog,
}

impl Router {
    pub fn new(store: UnifiedStore, log: AppendLog) -> Self {
        Router { store, log }
    }

    /// Applies a replayed record directly to the store, skipping the log
    /// append (the record already exists on disk) and the per-command
    /// logging a live request would otherwise emit.
    pub fn apply_replayed(&mut self, record: Record) {
        match record {
            Record::Set { key, value } => {
                self.store.set(key, value);
            }
            Record::Del { key } => {
                self.store.delete(&key);
            }
            Record::Zadd { key, score, member } => {
                self.store.zadd(key, score, member.as_str());
            }
            Record::Zrem { key, member } => {
                self.store.zrem(&key, member.as_str());
            }
        }
    }

    /// Dispatches one already-decoded request. `args[0]` is the command
    /// name, matched case-insensitively.
    pub fn dispatch(&mut self, args: &[Token]) -> (Status, String) {
        let Some(cmd) = args.first() else {
            return (Status::Err, ERR_UNKNOWN_COMMAND.to_string());
        };
        match cmd.as_str().to_ascii_uppercase().as_str() {
            "GET" => self.get(args),
            "SET" => self.set(args),
            "DEL" => self.del(args),
            "ZADD" => self.zadd(args),
            "ZRANGE" => self.zrange(args),
            "ZRANK" => self.zrank(args),
            "ZREM" => self.zrem(args),
            _ => (Status::Err, ERR_UNKNOWN_COMMAND.to_string()),
        }
    }

    fn append(&mut self, record: Record) {
        if let Err(e) = self.log.append(&record) {
            log::warn!("failed to append record to append-only log: {e}");
        }
    }

    fn get(&mut self, args: &[Token]) -> (Status, String) {
        if args.len() != 2 {
            return (Status::Err, ERR_WRONG_ARITY.to_string());
        }
        match self.store.get(&args[1]) {
            Some(value) => (Status::Ok, value.as_str().to_string()),
            None => (Status::Nx, String::new()),
        }
    }

    fn set(&mut self, args: &[Token]) -> (Status, String) {
        if args.len() != 3 {
            return (Status::Err, ERR_WRONG_ARITY.to_string());
        }
        let key = args[1].clone();
        let value = args[2].clone();
        self.store.set(key.clone(), value.clone());
        log::debug!("SET applied");
        self.append(Record::Set { key, value });
        (Status::Ok, "OK".to_string())
    }

    fn del(&mut self, args: &[Token]) -> (Status, String) {
        if args.len() != 2 {
            return (Status::Err, ERR_WRONG_ARITY.to_string());
        }
        let key = args[1].clone();
        let existed = self.store.delete(&key);
        log::debug!("DEL applied");
        self.append(Record::Del { key });
        if existed {
            (Status::Ok, "OK".to_string())
        } else {
            (Status::Nx, String::new())
        }
    }

    fn zadd(&mut self, args: &[Token]) -> (Status, String) {
        if args.len() != 4 {
            return (Status::Err, ERR_WRONG_ARITY.to_string());
        }
        let Ok(score) = args[2].as_str().parse::<f64>() else {
            return (Status::Err, ERR_SCORE.to_string());
        };
        if !score.is_finite() {
            return (Status::Err, ERR_SCORE.to_string());
        }
        let key = args[1].clone();
        let member = args[3].clone();
        self.store.zadd(key.clone(), score, member.as_str());
        log::debug!("ZADD applied");
        self.append(Record::Zadd { key, score, member });
        (Status::Ok, "OK".to_string())
    }

    fn zrange(&mut self, args: &[Token]) -> (Status, String) {
        if args.len() != 4 {
            return (Status::Err, ERR_WRONG_ARITY.to_string());
        }
        let (Ok(lo), Ok(hi)) = (
            args[2].as_str().parse::<f64>(),
            args[3].as_str().parse::<f64>(),
        ) else {
            return (Status::Err, ERR_SCORE.to_string());
        };
        let entries = self.store.zrange(&args[1], lo, hi);
        if entries.is_empty() {
            return (Status::Nx, String::new());
        }
        let payload = entries
            .into_iter()
            .map(|(score, member)| format!("{score}:{member}"))
            .collect::<Vec<_>>()
            .join(",");
        (Status::Ok, payload)
    }

    fn zrank(&mut self, args: &[Token]) -> (Status, String) {
        if args.len() != 3 {
            return (Status::Err, ERR_WRONG_ARITY.to_string());
        }
        match self.store.zrank(&args[1], args[2].as_str()) {
            Some(rank) => (Status::Ok, rank.to_string()),
            None => (Status::Nx, String::new()),
        }
    }

    fn zrem(&mut self, args: &[Token]) -> (Status, String) {
        if args.len() != 3 {
            return (Status::Err, ERR_WRONG_ARITY.to_string());
        }
        let key = args[1].clone();
        let member = args[2].clone();
        let removed = self.store.zrem(&key, member.as_str());
        if removed {
            log::debug!("ZREM applied");
            self.append(Record::Zrem { key, member });
            (Status::Ok, "OK".to_string())
        } else {
            (Status::Nx, String::new())
        }
    }
}
