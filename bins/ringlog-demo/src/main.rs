//! End-to-end exercise of the transport: one consumer owning a region,
//! four producer threads hammering it concurrently, drained to the
//! console and a rotating file under `/tmp/ringlog-demo`.
//!
//! Producers normally live in a different process than the consumer; this
//! binary runs both in one process (as separate threads attaching to the
//! same named region) purely so the whole pipeline can be exercised with
//! one invocation.

use ringlog_consumer::{ConsumerCore, ConsumerSettings};
use ringlog_core::{Level, NotifyKind};
use ringlog_producer::ProducerCore;
use ringlog_writers::{ConsoleWriter, RotatingFileWriter, Writer};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const REGION_NAME: &str = "/ringlog_demo";
const PRODUCER_THREADS: usize = 4;
const MESSAGES_PER_PRODUCER: usize = 1000;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("INFO")))
        .init();

    let console: Box<dyn Writer> = Box::new(ConsoleWriter::new(Level::Debug, true));
    let rotating: Box<dyn Writer> = Box::new(
        RotatingFileWriter::create("/tmp/ringlog-demo/demo.log", 1 << 20, 5, Level::Trace)
            .expect("failed to open demo log file"),
    );

    let settings = ConsumerSettings {
        poll_interval: Duration::from_millis(20),
        ..ConsumerSettings::default()
    };

    let consumer = ConsumerCore::start(
        REGION_NAME,
        1 << 20,
        512,
        NotifyKind::SocketPath,
        None,
        settings,
        vec![console, rotating],
        true,
    )
    .expect("failed to start consumer");

    tracing::info!(region = REGION_NAME, "consumer started");

    let handles: Vec<_> = (0..PRODUCER_THREADS)
        .map(|i| {
            std::thread::spawn(move || {
                ringlog_producer::set_process_name("demo");
                ringlog_producer::set_module_name(&format!("prod{i}"));
                let producer = ProducerCore::attach(
                    REGION_NAME,
                    Some(Duration::from_millis(500)),
                    true,
                    "ringlog-demo",
                    None,
                )
                .expect("producer failed to attach");

                for n in 0..MESSAGES_PER_PRODUCER {
                    let payload = format!("producer {i} message {n}");
                    producer
                        .log(Level::Info, payload.as_bytes())
                        .expect("log failed");
                }
            })
        })
        .collect();

    for h in handles {
        let _ = h.join();
    }

    // Give the drainer a moment to catch up with the final burst before
    // tearing the region down.
    std::thread::sleep(Duration::from_millis(200));

    let stats = consumer.ring_stats();
    tracing::info!(
        capacity = stats.capacity,
        current_usage = stats.current_usage,
        total_reads = consumer.total_reads(),
        stale_reclaimed = consumer.stale_reclaimed(),
        "drained producer burst"
    );

    consumer.stop();
}
