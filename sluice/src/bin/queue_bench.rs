//! Queue throughput and ping-pong latency benchmark.
//!
//! Usage:
//!     cargo run --release --bin queue_bench
//!
//! Environment variables:
//!     PRODUCERS=2        Number of producer threads (default: 2)
//!     CONSUMERS=2        Number of consumer threads (default: 2)
//!     ITEMS=4194304      Total items per run (default: 1 << 22)
//!     PRODUCER_CPU=0     Pin the first producer to CPU 0, the rest to the following CPUs
//!     CONSUMER_CPU=2     Pin the first consumer to CPU 2, the rest to the following CPUs
//!     RUST_LOG=...       Log filter when built with `--features tracing`

use std::env;
use std::str::FromStr;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Instant;

use sluice::{AsyncQueue, CancellationToken};

const RTT_ITERATIONS: usize = 100_000;

type Payload = u64;

/// Benchmark settings, read from the environment.
#[derive(Debug, Clone)]
struct BenchConfig {
    producers: usize,
    consumers: usize,
    items: usize,
    producer_cpu: Option<usize>,
    consumer_cpu: Option<usize>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            producers: 2,
            consumers: 2,
            items: 1 << 22,
            producer_cpu: Some(0),
            consumer_cpu: Some(2),
        }
    }
}

impl BenchConfig {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            producers: env_or("PRODUCERS", defaults.producers).max(1),
            consumers: env_or("CONSUMERS", defaults.consumers).max(1),
            items: env_or("ITEMS", defaults.items),
            producer_cpu: env_parse("PRODUCER_CPU").or(defaults.producer_cpu),
            consumer_cpu: env_parse("CONSUMER_CPU").or(defaults.consumer_cpu),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env_parse(key).unwrap_or(default)
}

fn pin_to_cpu(cpu: Option<usize>, offset: usize) {
    if let Some(id) = cpu {
        core_affinity::set_for_current(core_affinity::CoreId { id: id + offset });
    }
}

fn bench_throughput(config: &BenchConfig) {
    let queue = Arc::new(AsyncQueue::<Payload>::new());
    let cancel = CancellationToken::new();
    let per_producer = config.items / config.producers;
    let total = per_producer * config.producers;
    let start_line = Arc::new(Barrier::new(config.producers + config.consumers + 1));

    let consumers: Vec<_> = (0..config.consumers)
        .map(|c| {
            let queue = Arc::clone(&queue);
            let cancel = cancel.clone();
            let start_line = Arc::clone(&start_line);
            let cpu = config.consumer_cpu;
            thread::spawn(move || {
                pin_to_cpu(cpu, c);
                start_line.wait();
                queue
                    .consuming_iter(&cancel)
                    .map(|item| item.expect("consumer failed"))
                    .count()
            })
        })
        .collect();

    let producers: Vec<_> = (0..config.producers)
        .map(|p| {
            let queue = Arc::clone(&queue);
            let start_line = Arc::clone(&start_line);
            let cpu = config.producer_cpu;
            thread::spawn(move || {
                pin_to_cpu(cpu, p);
                start_line.wait();
                for i in 0..per_producer as Payload {
                    queue.add(i).expect("queue closed early");
                }
            })
        })
        .collect();

    start_line.wait();
    let start = Instant::now();

    for h in producers {
        h.join().unwrap();
    }
    queue.complete_adding().unwrap();
    let received: usize = consumers.into_iter().map(|h| h.join().unwrap()).sum();
    let elapsed = start.elapsed();

    assert_eq!(received, total, "items lost or duplicated");
    let ops_per_ms = total as u128 * 1_000_000 / elapsed.as_nanos().max(1);
    println!(
        "  throughput ({}P/{}C): {} ops/ms",
        config.producers, config.consumers, ops_per_ms
    );
}

fn bench_rtt(config: &BenchConfig) {
    let ping = Arc::new(AsyncQueue::<Payload>::new());
    let pong = Arc::new(AsyncQueue::<Payload>::new());
    let cancel = CancellationToken::new();

    let responder = {
        let ping = Arc::clone(&ping);
        let pong = Arc::clone(&pong);
        let cancel = cancel.clone();
        let cpu = config.consumer_cpu;
        thread::spawn(move || {
            pin_to_cpu(cpu, 0);
            for value in ping.consuming_iter(&cancel) {
                pong.add(value.unwrap()).unwrap();
            }
        })
    };

    pin_to_cpu(config.producer_cpu, 0);
    let start = Instant::now();

    for i in 0..RTT_ITERATIONS as Payload {
        ping.add(i).unwrap();
        let echoed = pong.take(&cancel).unwrap();
        assert_eq!(echoed, i, "data corruption");
    }

    let elapsed = start.elapsed();
    ping.complete_adding().unwrap();
    responder.join().unwrap();

    let rtt_ns = elapsed.as_nanos() / RTT_ITERATIONS as u128;
    println!("  {rtt_ns} ns RTT (blocking take)");
}

fn main() {
    sluice::init_tracing();
    let config = BenchConfig::from_env();

    println!(
        "sluice AsyncQueue (producers={}, consumers={}, items={}):",
        config.producers, config.consumers, config.items
    );
    bench_throughput(&config);
    bench_rtt(&config);
}
