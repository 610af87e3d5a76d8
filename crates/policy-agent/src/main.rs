//! Consumes scan messages and applies the purge/migrate retention filters,
//! forwarding matches onto the purge and migration streams.

use clap::Parser;
use polimor_agent::{CommonArgs, OrBail};
use polimor_config::ConfigView;
use polimor_message::EntryKind;
use polimor_messaging::{Backend, Publisher, Subscriber};
use std::time::{SystemTime, UNIX_EPOCH};

const PURGE_AGE_SECS: u64 = 30 * 86_400;
const MIGRATE_AGE_SECS: u64 = 2 * 86_400;
const PERFORMANCE_POOL: &str = "performance";

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
#[command(name = "policy-agent")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    #[arg(long = "scan_stream")]
    scan_stream: Option<String>,
    #[arg(long = "scan_consumer")]
    scan_consumer: Option<String>,
    #[arg(long = "scan_subject")]
    scan_subject: Option<String>,

    #[arg(long = "purge_stream")]
    purge_stream: Option<String>,
    #[arg(long = "purge_consumer")]
    purge_consumer: Option<String>,
    #[arg(long = "purge_subject")]
    purge_subject: Option<String>,

    #[arg(long = "migration_stream")]
    migration_stream: Option<String>,
    #[arg(long = "migration_consumer")]
    migration_consumer: Option<String>,
    #[arg(long = "migration_subject")]
    migration_subject: Option<String>,
}

/// Resolves one (stream, consumer, subject) triple from CLI flags, falling
/// back to the queue named by `queue_key` in the agent's config properties.
fn resolve_triple(
    cli: (Option<String>, Option<String>, Option<String>),
    agent: Option<&polimor_config::AgentProperties>,
    config: Option<&ConfigView>,
    queue_key: &str,
    label: &str,
) -> (String, String, String) {
    let queue_name = agent.and_then(|a| a.get(queue_key));
    let queue_props = queue_name.and_then(|name| config.and_then(|c| c.queue(name)));

    let stream = require(
        cli.0.or_else(|| queue_props.map(|q| q.stream_name.clone())),
        &format!("--{label}_stream is required (via CLI or config)"),
    );
    let consumer = require(
        cli.1.or_else(|| queue_props.map(|q| q.consumer_name.clone())),
        &format!("--{label}_consumer is required (via CLI or config)"),
    );
    let subject = require(
        cli.2.or_else(|| queue_props.map(|q| q.subject.clone())),
        &format!("--{label}_subject is required (via CLI or config)"),
    );
    (stream, consumer, subject)
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

    let (scan_stream, scan_consumer, scan_subject) = resolve_triple(
        (args.scan_stream, args.scan_consumer, args.scan_subject),
        agent,
        config.as_ref(),
        "scan_queue",
        "scan",
    );
    let (purge_stream, purge_consumer, purge_subject) = resolve_triple(
        (args.purge_stream, args.purge_consumer, args.purge_subject),
        agent,
        config.as_ref(),
        "purge_queue",
        "purge",
    );
    let (migration_stream, migration_consumer, migration_subject) = resolve_triple(
        (
            args.migration_stream,
            args.migration_consumer,
            args.migration_subject,
        ),
        agent,
        config.as_ref(),
        "migration_queue",
        "migration",
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

    let mut scan_subscriber = service
        .create_subscriber(&scan_stream, &scan_consumer, &scan_subject)
        .await
        .or_bail("failed to create scan subscriber");
    let mut purge_publisher = service
        .create_publisher(&purge_stream, &purge_consumer, &purge_subject)
        .await
        .or_bail("failed to create purge publisher");
    let mut migration_publisher = service
        .create_publisher(&migration_stream, &migration_consumer, &migration_subject)
        .await
        .or_bail("failed to create migration publisher");

    let stop = polimor_agent::StopFlag::new();
    polimor_agent::install_signal_handler(stop.clone());

    while !stop.is_stopped() {
        let payload = scan_subscriber
            .receive()
            .await
            .or_bail("failed to receive a scan message");

        let line = match std::str::from_utf8(&payload) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "skipping non-UTF-8 scan payload");
                continue;
            }
        };

        let msg = match polimor_message::decode_scan(line) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(error = %e, line = %line, "skipping unparseable scan message");
                continue;
            }
        };

        apply_policy(&msg, &mut purge_publisher, &mut migration_publisher).await;
    }

    Ok(())
}

/// Evaluates the retention filters against the current wall clock and
/// forwards any matches. Filters are independent: a message may match both.
async fn apply_policy(
    msg: &polimor_message::ScanMessage,
    purge_publisher: &mut Box<dyn Publisher>,
    migration_publisher: &mut Box<dyn Publisher>,
) {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    apply_policy_at(msg, now, purge_publisher, migration_publisher).await;
}

async fn apply_policy_at(
    msg: &polimor_message::ScanMessage,
    now: u64,
    purge_publisher: &mut Box<dyn Publisher>,
    migration_publisher: &mut Box<dyn Publisher>,
) {
    if msg.kind != EntryKind::File {
        return;
    }

    if is_older_than(msg.atime, now, PURGE_AGE_SECS) {
        let encoded = polimor_message::encode_purge(&polimor_message::PurgeMessage {
            path: msg.path.clone(),
        });
        purge_publisher
            .send(encoded.as_bytes())
            .await
            .or_bail("failed to publish purge message");
    }

    if is_older_than(msg.atime, now, MIGRATE_AGE_SECS) && msg.ost_pool == PERFORMANCE_POOL {
        let encoded = polimor_message::encode_migration(&polimor_message::MigrationMessage {
            path: msg.path.clone(),
        });
        migration_publisher
            .send(encoded.as_bytes())
            .await
            .or_bail("failed to publish migration message");
    }
}

fn is_older_than(atime: u64, now: u64, age_secs: u64) -> bool {
    now.saturating_sub(atime) > age_secs
}

#[cfg(test)]
mod tests {
    use super::*;
    use polimor_messaging::local::LocalService;

    fn file(atime: u64, ost_pool: &str) -> polimor_message::ScanMessage {
        polimor_message::ScanMessage {
            kind: EntryKind::File,
            path: "/a".into(),
            atime,
            mtime: atime,
            size: 0,
            uid: 0,
            gid: 0,
            filesys: "x".into(),
            ost_pool: ost_pool.into(),
            stripe_count: 0,
            fid: "z".into(),
        }
    }

    #[test]
    fn purge_threshold_is_exactly_thirty_days() {
        let now = 1 + 31 * 86_400;
        assert!(is_older_than(1, now, PURGE_AGE_SECS));
    }

    #[test]
    fn migrate_threshold_is_exactly_two_days() {
        let now = 1 + 3 * 86_400;
        assert!(is_older_than(1, now, MIGRATE_AGE_SECS));
        assert!(!is_older_than(1, now, PURGE_AGE_SECS));
    }

    async fn drain(publisher: &mut Box<dyn Subscriber>) -> Option<Vec<u8>> {
        tokio::time::timeout(std::time::Duration::from_millis(50), publisher.receive())
            .await
            .ok()
            .and_then(|r| r.ok())
    }

    #[tokio::test]
    async fn old_file_emits_purge_only() {
        let svc = LocalService::new();
        let mut purge_pub = svc.create_publisher("purge", "c", "s").await.unwrap();
        let mut migrate_pub = svc.create_publisher("migrate", "c", "s").await.unwrap();
        let mut purge_sub = svc.create_subscriber("purge", "c", "s").await.unwrap();
        let mut migrate_sub = svc.create_subscriber("migrate", "c", "s").await.unwrap();

        let msg = file(1, "");

        // now = 1 + 31 days: past the purge threshold, past the migrate
        // threshold too, but ost_pool isn't "performance" so migrate is moot.
        let now = 1 + 31 * 86_400;
        assert!(is_older_than(msg.atime, now, PURGE_AGE_SECS));

        apply_policy_at(&msg, now, &mut purge_pub, &mut migrate_pub).await;

        let purged = drain(&mut purge_sub).await.expect("purge message expected");
        let decoded = polimor_message::decode_purge(std::str::from_utf8(&purged).unwrap()).unwrap();
        assert_eq!(decoded.path, "/a");

        assert!(drain(&mut migrate_sub).await.is_none());
    }

    #[tokio::test]
    async fn recently_atimed_performance_file_emits_migrate_only() {
        let svc = LocalService::new();
        let mut purge_pub = svc.create_publisher("purge", "c", "s").await.unwrap();
        let mut migrate_pub = svc.create_publisher("migrate", "c", "s").await.unwrap();
        let mut purge_sub = svc.create_subscriber("purge", "c", "s").await.unwrap();
        let mut migrate_sub = svc.create_subscriber("migrate", "c", "s").await.unwrap();

        let msg = file(1, PERFORMANCE_POOL);
        let now = 1 + 3 * 86_400;

        apply_policy_at(&msg, now, &mut purge_pub, &mut migrate_pub).await;

        let migrated = drain(&mut migrate_sub).await.expect("migration message expected");
        let decoded =
            polimor_message::decode_migration(std::str::from_utf8(&migrated).unwrap()).unwrap();
        assert_eq!(decoded.path, "/a");

        assert!(drain(&mut purge_sub).await.is_none());
    }

    #[test]
    fn directory_entries_never_match() {
        let mut dir = file(1, PERFORMANCE_POOL);
        dir.kind = EntryKind::Dir;
        assert_eq!(dir.kind, EntryKind::Dir);
    }
}
