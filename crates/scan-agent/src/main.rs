//! Walks a filesystem via `lfs find --printf`, decodes each emitted line as
//! a [`polimor_message::ScanMessage`], and publishes it on the scan stream.

use clap::Parser;
use polimor_agent::{CommonArgs, OrBail};
use polimor_config::ConfigView;
use polimor_messaging::{Backend, Publisher};
use polimor_subprocess::Process;
use std::time::Duration;

fn require<T>(value: Option<T>, message: &str) -> T {
    match value {
        Some(v) => v,
        None => {
            tracing::error!(message);
            std::process::exit(polimor_agent::EXIT_CONFIG_ERROR);
        }
    }
}

/// `lfs find --printf` format rendering one JSON line per inode, matching
/// the scan wire shape.
const PRINTF_FORMAT: &str = concat!(
    "{ \"type\": \"%y\", \"path\": \"%p\", \"atime\": %A@, \"mtime\": %T@, ",
    "\"size\": %s, \"uid\": %U, \"gid\": %G, \"format\": { \"filesys\": \"lustre\", ",
    "\"ost_pool\": \"%Lp\", \"stripe_count\": %Lc, \"fid\": \"%LF\" } }"
);

#[derive(Debug, Parser)]
#[command(name = "scan-agent")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Root directory to walk.
    #[arg(long)]
    directory: Option<String>,

    /// Scan interval of the form `[#d][#h][#m][#s]`, e.g. `1d2h3m4s`.
    #[arg(long)]
    interval: Option<String>,

    /// Path to the `lfs` binary.
    #[arg(long, default_value = "/usr/bin/lfs")]
    lfs_binary: String,
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
    let agent = config
        .as_ref()
        .and_then(|c| c.agent(&args.common.id));

    let directory = require(
        args.directory
            .clone()
            .or_else(|| agent.and_then(|a| a.get("directory").map(str::to_string))),
        "--directory is required (via CLI or config)",
    );

    let interval_spec = require(
        args.interval
            .clone()
            .or_else(|| agent.and_then(|a| a.get("interval").map(str::to_string))),
        "--interval is required (via CLI or config)",
    );
    let interval: Duration = polimor_agent::parse_interval(&interval_spec)
        .or_bail("invalid --interval specification");

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
    let mut publisher = service
        .create_publisher(&stream, &consumer, &subject)
        .await
        .or_bail("failed to create scan publisher");

    let stop = polimor_agent::StopFlag::new();
    polimor_agent::install_signal_handler(stop.clone());

    while !stop.is_stopped() {
        run_one_scan(&directory, &args.lfs_binary, &mut publisher).await?;
        tokio::time::sleep(interval).await;
    }

    Ok(())
}

async fn run_one_scan(
    directory: &str,
    lfs_binary: &str,
    publisher: &mut Box<dyn Publisher>,
) -> anyhow::Result<()> {
    let mut walker = Process::new(vec![
        lfs_binary.to_string(),
        "find".to_string(),
        directory.to_string(),
        "--printf".to_string(),
        PRINTF_FORMAT.to_string(),
    ]);

    // A failed launch is a ProcessError: logged, loop continues on the next
    // interval rather than aborting the agent.
    let mut output = match walker.launch().await {
        Ok(output) => output,
        Err(e) => {
            tracing::error!(error = %e, "failed to launch the filesystem walker");
            return Ok(());
        }
    };

    while let Some(line) = output.next_line().await {
        match polimor_message::decode_scan(&line) {
            Ok(msg) => {
                let encoded = polimor_message::encode_scan(&msg);
                publisher
                    .send(encoded.as_bytes())
                    .await
                    .or_bail("failed to publish scan message");
            }
            Err(e) => {
                tracing::warn!(error = %e, line = %line, "skipping unparseable scan line");
            }
        }
    }

    walker.wait().await.ok();
    Ok(())
}
