//! One database-writer process: consumes RecorderMessages off a single
//! shard queue and maintains a SQLite catalog of the latest record per
//! path.

use clap::Parser;
use polimor_agent::{CommonArgs, OrBail};
use polimor_config::ConfigView;
use polimor_messaging::Backend;
use rusqlite::Connection;

const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS Records( \
    path TEXT PRIMARY KEY, type TEXT, atime INTEGER, mtime INTEGER, \
    size INTEGER, uid INTEGER, gid INTEGER, filesys TEXT, \
    ost_pool TEXT, stripe_count INTEGER, fid TEXT, \
    timestamp INTEGER)";

const INSERT_SQL: &str = "INSERT OR REPLACE INTO Records( \
    path, type, atime, mtime, size, uid, gid, filesys, ost_pool, stripe_count, fid, timestamp) \
    VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, CURRENT_TIMESTAMP)";

fn require<T>(value: Option<T>, message: &str) -> T {
    match value {
        Some(v) => v,
        None => {
            tracing::error!(message);
            std::process::exit(polimor_agent::EXIT_CONFIG_ERROR);
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "recorder-writer")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Path to the SQLite catalog file for this shard.
    #[arg(long)]
    db: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    polimor_agent::init_logging(&args.common.log);
    polimor_agent::set_parent_death_signal();

    let config = args
        .common
        .config
        .as_deref()
        .map(ConfigView::load)
        .transpose()
        .or_bail("failed to load configuration");
    let agent = config.as_ref().and_then(|c| c.agent(&args.common.id));

    let queue = agent.and_then(|a| a.queue.clone());
    let queue_props = queue.as_deref().and_then(|q| config.as_ref()?.queue(q));

    let stream = require(
        args.common
            .stream
            .clone()
            .or_else(|| queue_props.map(|q| q.stream_name.clone())),
        "--stream is required (via CLI or config)",
    );
    let consumer = require(
        args.common
            .consumer
            .clone()
            .or_else(|| queue_props.map(|q| q.consumer_name.clone())),
        "--consumer is required (via CLI or config)",
    );
    let subject = require(
        args.common
            .subject
            .clone()
            .or_else(|| queue_props.map(|q| q.subject.clone())),
        "--subject is required (via CLI or config)",
    );

    let backend = match config.as_ref().map(|c| c.backend()) {
        Some("nats") | None => Backend::Nats,
        Some(_) => Backend::Local,
    };
    let endpoints = polimor_agent::resolve_endpoints(
        &args.common.nats_server,
        config.as_ref().map(ConfigView::servers).unwrap_or(&[]),
    );

    let service = polimor_messaging::open(backend, &endpoints)
        .await
        .or_bail("failed to connect to the messaging backend");
    let mut subscriber = service
        .create_subscriber(&stream, &consumer, &subject)
        .await
        .or_bail("failed to create recorder-writer subscriber");

    let conn = Connection::open(&args.db).or_bail("failed to open the SQLite catalog");
    conn.execute(CREATE_TABLE_SQL, ())
        .or_bail("failed to create the Records table");

    let stop = polimor_agent::StopFlag::new();
    polimor_agent::install_signal_handler(stop.clone());

    while !stop.is_stopped() {
        let payload = subscriber
            .receive()
            .await
            .or_bail("failed to receive a recorder message");

        let line = match std::str::from_utf8(&payload) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "skipping non-UTF-8 recorder payload");
                continue;
            }
        };

        let msg = match polimor_message::decode_recorder(line) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(error = %e, line = %line, "skipping unparseable recorder message");
                continue;
            }
        };

        if let Err(e) = insert_record(&conn, &msg) {
            tracing::error!(error = %e, path = %msg.path, "failed to write record to the catalog");
        }
    }

    Ok(())
}

fn insert_record(conn: &Connection, msg: &polimor_message::RecorderMessage) -> rusqlite::Result<()> {
    conn.execute(
        INSERT_SQL,
        rusqlite::params![
            msg.path,
            msg.kind.as_wire(),
            msg.atime as i64,
            msg.mtime as i64,
            msg.size as i64,
            msg.uid as i64,
            msg.gid as i64,
            msg.filesys,
            msg.ost_pool,
            msg.stripe_count as i64,
            msg.fid,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polimor_message::{EntryKind, RecorderMessage};

    fn sample() -> RecorderMessage {
        RecorderMessage {
            kind: EntryKind::File,
            path: "/a".into(),
            atime: 1,
            mtime: 2,
            size: 3,
            uid: 4,
            gid: 5,
            filesys: "x".into(),
            ost_pool: "performance".into(),
            stripe_count: 1,
            fid: "z".into(),
        }
    }

    #[test]
    fn insert_then_replace_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(CREATE_TABLE_SQL, ()).unwrap();

        let mut msg = sample();
        insert_record(&conn, &msg).unwrap();

        msg.size = 99;
        insert_record(&conn, &msg).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM Records", (), |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);

        let size: i64 = conn
            .query_row("SELECT size FROM Records WHERE path = '/a'", (), |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(size, 99);
    }
}
