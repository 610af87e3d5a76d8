//! Fans RecorderMessages out across a fixed pool of database-writer queues
//! by SHA-1-hash-sharding the record's path, preserving per-path ordering
//! within a writer while allowing the writer pool to scale horizontally.

use clap::Parser;
use polimor_agent::{CommonArgs, OrBail};
use polimor_config::ConfigView;
use polimor_messaging::{Backend, Publisher};

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
#[command(name = "recorder")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Name of a database-writer queue, repeatable; order fixes the shard
    /// index each queue receives. Defaults to the reference deployment's
    /// three-writer pool.
    #[arg(long = "shard_queue")]
    shard_queues: Vec<String>,
}

fn default_shard_queues() -> Vec<String> {
    vec!["db0".to_string(), "db1".to_string(), "db2".to_string()]
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

    let shard_queue_names = if args.shard_queues.is_empty() {
        default_shard_queues()
    } else {
        args.shard_queues
    };

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
        .or_bail("failed to create recorder subscriber");

    let mut writer_publishers: Vec<Box<dyn Publisher>> = Vec::with_capacity(shard_queue_names.len());
    for name in &shard_queue_names {
        let queue_props = config.as_ref().and_then(|c| c.queue(name));
        let writer_stream = require(
            queue_props.map(|q| q.stream_name.clone()),
            &format!("shard queue '{name}' is not defined in the configuration"),
        );
        let writer_consumer = require(
            queue_props.map(|q| q.consumer_name.clone()),
            &format!("shard queue '{name}' is not defined in the configuration"),
        );
        let writer_subject = require(
            queue_props.map(|q| q.subject.clone()),
            &format!("shard queue '{name}' is not defined in the configuration"),
        );
        let publisher = service
            .create_publisher(&writer_stream, &writer_consumer, &writer_subject)
            .await
            .or_bail("failed to create a database-writer publisher");
        writer_publishers.push(publisher);
    }

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

        let idx = recorder::shard(&msg.path, writer_publishers.len());
        writer_publishers[idx]
            .send(payload.as_slice())
            .await
            .or_bail("failed to forward a record to its database-writer queue");
    }

    Ok(())
}
