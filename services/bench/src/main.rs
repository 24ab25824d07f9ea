//! RTMA throughput benchmark
//!
//! Usage:
//!   rtma-bench -s 127.0.0.1:7111 -n 100000 -m 128 -p 1 -S 2
//!   rtma-bench --config config/client.toml --log-level debug
//!
//! A coordinator session starts the publishers, waits until each reports
//! ready, then starts the subscribers. Publishers begin once every
//! subscriber is ready. If the run has not finished after
//! `max(num_msgs / 10000, 10)` seconds the coordinator broadcasts EXIT.
//! The clock starts before any worker is spawned, so a publisher that
//! never reports ready also ends the run.

mod stats;
mod workers;

use anyhow::{anyhow, ensure, Context, Result};
use clap::Parser;
use rtma_client::{Client, ControlVerb, MessageHeader, MessageType};
use rtma_codec::MAX_DATA_BYTES;
use rtma_config::ClientConfig;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use workers::{WaitOutcome, PUBLISHER_DONE, PUBLISHER_READY, SUBSCRIBER_DONE};

#[derive(Parser, Debug)]
#[command(name = "rtma-bench")]
#[command(about = "RTMA publish/subscribe throughput benchmark")]
#[command(version)]
struct Args {
    /// Message manager address, host:port (overrides the config file)
    #[arg(short, long)]
    server: Option<String>,

    /// Total number of messages to publish
    #[arg(short, long, default_value_t = 100_000)]
    num_msgs: u64,

    /// Payload size in bytes
    #[arg(short, long, default_value_t = 128)]
    msg_size: usize,

    /// Number of concurrent publishers
    #[arg(short = 'p', long, default_value_t = 1)]
    num_publishers: usize,

    /// Number of concurrent subscribers
    #[arg(short = 'S', long, default_value_t = 1)]
    num_subscribers: usize,

    /// Path to a client configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    ensure!(
        args.msg_size <= MAX_DATA_BYTES,
        "message size {} exceeds the {} byte payload limit",
        args.msg_size,
        MAX_DATA_BYTES
    );
    ensure!(args.num_publishers > 0, "at least one publisher is required");

    let mut config = ClientConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(server) = &args.server {
        config.server = server.clone();
    }
    config.validate()?;
    // Every benchmark session asks for a broker-assigned id
    config.module_id = 0;

    run(&args, &config)
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(args: &Args, config: &ClientConfig) -> Result<()> {
    let mut coordinator = workers::open_session(
        config,
        &[
            ControlVerb::Exit.into(),
            PUBLISHER_READY.into(),
            PUBLISHER_DONE.into(),
            SUBSCRIBER_DONE.into(),
        ],
    )?;
    let deadline = Instant::now() + stats::abort_timeout(args.num_msgs);

    println!("Initializing publisher threads...");
    let per_publisher = args.num_msgs / args.num_publishers as u64;
    let mut handles = Vec::new();
    for id in 1..=args.num_publishers {
        let config = config.clone();
        let (msg_size, num_subscribers) = (args.msg_size, args.num_subscribers);
        handles.push(spawn_worker(format!("publisher-{id}"), move || {
            workers::publisher_loop(id, &config, per_publisher, msg_size, num_subscribers)
        })?);
    }

    match workers::wait_for_signals(
        &mut coordinator,
        PUBLISHER_READY,
        args.num_publishers,
        Some(deadline),
    )? {
        WaitOutcome::Complete => {
            println!("Waiting for subscriber threads...");
            for id in 1..=args.num_subscribers {
                let config = config.clone();
                let (num_msgs, msg_size) =
                    (per_publisher * args.num_publishers as u64, args.msg_size);
                handles.push(spawn_worker(format!("subscriber-{id}"), move || {
                    workers::subscriber_loop(id, &config, num_msgs, msg_size)
                })?);
            }

            println!("Starting Test...");
            println!(
                "Total RTMA Packet Size: {} bytes",
                MessageHeader::SIZE + args.msg_size
            );

            supervise(&mut coordinator, args, deadline)?;
        }
        WaitOutcome::Exited => warn!("EXIT received while waiting for publishers"),
        WaitOutcome::TimedOut => abort(&mut coordinator, "publishers never reported ready")?,
    }

    for handle in handles {
        match handle.join() {
            Ok(Ok(report)) => println!("{}", report),
            Ok(Err(e)) => error!("Worker failed: {:#}", e),
            Err(_) => error!("Worker thread panicked"),
        }
    }

    coordinator.disconnect()?;
    println!("Done!");
    Ok(())
}

fn spawn_worker<F>(name: String, body: F) -> Result<JoinHandle<Result<stats::Throughput>>>
where
    F: FnOnce() -> Result<stats::Throughput> + Send + 'static,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn(body)
        .map_err(|e| anyhow!("spawning {}: {}", name, e))
}

/// Count DONE signals until every worker finished or `deadline` passes
fn supervise(coordinator: &mut Client, args: &Args, deadline: Instant) -> Result<()> {
    let mut publishers_done = 0;
    let mut subscribers_done = 0;
    while publishers_done < args.num_publishers || subscribers_done < args.num_subscribers {
        if let Some(msg) = coordinator.receive(0.1)? {
            match msg.message_type() {
                MessageType::Application(PUBLISHER_DONE) => publishers_done += 1,
                MessageType::Application(SUBSCRIBER_DONE) => subscribers_done += 1,
                _ => {}
            }
        }

        if Instant::now() > deadline {
            info!(publishers_done, subscribers_done, "Workers still running at deadline");
            return abort(coordinator, "workers did not finish");
        }
    }

    info!(publishers_done, subscribers_done, "Benchmark finished");
    Ok(())
}

/// Broadcast EXIT so every worker unblocks and can be joined
fn abort(coordinator: &mut Client, reason: &str) -> Result<()> {
    println!("Test Timeout! Sending Exit Signal...");
    warn!(reason, "Benchmark timed out");
    coordinator.send_signal(ControlVerb::Exit)?;
    Ok(())
}
