//! Two-stage pipeline: sensors feed an MPSC queue, one aggregator drains it
//! and fans batches out to workers over an SPMC queue.
//!
//! Run with: `cargo run -p seqring-rs --example pipeline --features tracing`

use seqring_rs::{AlignedBuffer, Config, Mpsc, QueueError, Spmc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Instant;

#[derive(Debug, Clone, Copy)]
struct Reading {
    sensor: u32,
    seq: u32,
    value: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Batch {
    count: u32,
    sum: f64,
}

const SENSORS: usize = 4;
const READINGS_PER_SENSOR: u32 = 250_000;
const BATCH: u32 = 64;
const WORKERS: usize = 3;

fn main() {
    seqring_rs::init_tracing();

    println!("seqring pipeline example");
    println!("========================\n");

    let config = Config {
        enable_metrics: true,
        ..Config::default()
    };

    // Phase one: size. Phase two: hand over caller-owned memory.
    let bytes = Mpsc::<Reading>::size_query_with(&config, 1024).unwrap();
    let buffer = AlignedBuffer::zeroed(bytes).unwrap();
    let readings = Mpsc::<Reading>::initialize_with(config, 1024, buffer).unwrap();
    let batches = Spmc::<Batch>::allocate_with(config, 64).unwrap();

    println!("Configuration:");
    println!("  Sensors: {}", SENSORS);
    println!("  Readings per sensor: {}", READINGS_PER_SENSOR);
    println!("  Reading queue: {} cells, {} bytes", readings.capacity(), bytes);
    println!("  Workers: {}\n", WORKERS);

    let processed = AtomicU64::new(0);
    let start = Instant::now();
    let total = SENSORS as u64 * u64::from(READINGS_PER_SENSOR);

    thread::scope(|s| {
        for sensor in 0..SENSORS as u32 {
            let mut tx = readings.producer().unwrap();
            s.spawn(move || {
                for seq in 0..READINGS_PER_SENSOR {
                    let reading = Reading {
                        sensor,
                        seq,
                        value: f64::from(seq % 100) * 0.5,
                    };
                    while let Err(QueueError::Full) = tx.enqueue(reading) {
                        thread::yield_now();
                    }
                }
            });
        }

        for _ in 0..WORKERS {
            let mut rx = batches.consumer().unwrap();
            let processed = &processed;
            s.spawn(move || {
                while processed.load(Ordering::Acquire) < total {
                    match rx.dequeue() {
                        Ok(batch) => {
                            processed.fetch_add(u64::from(batch.count), Ordering::AcqRel);
                        }
                        Err(_) => thread::yield_now(),
                    }
                }
            });
        }

        // Aggregator: the single consumer of readings, single producer of batches.
        let mut rx = readings.consumer().unwrap();
        let mut tx = batches.producer().unwrap();
        let mut last_seq = [None::<u32>; SENSORS];
        let mut current = Batch::default();
        let mut seen = 0u64;

        while seen < total {
            match rx.dequeue() {
                Ok(reading) => {
                    let slot = &mut last_seq[reading.sensor as usize];
                    assert!(slot.map_or(true, |prev| reading.seq == prev + 1));
                    *slot = Some(reading.seq);

                    current.count += 1;
                    current.sum += reading.value;
                    seen += 1;

                    if current.count == BATCH || seen == total {
                        while tx.enqueue(current).is_err() {
                            thread::yield_now();
                        }
                        current = Batch::default();
                    }
                }
                Err(_) => thread::yield_now(),
            }
        }
    });

    let elapsed = start.elapsed();
    let stats = readings.metrics();

    println!("Results:");
    println!("  Readings processed: {}", processed.load(Ordering::Relaxed));
    println!("  Full retries: {}", stats.full);
    println!("  Empty polls: {}", stats.empty);
    println!("  Duration: {:.2?}", elapsed);
    println!(
        "  Throughput: {:.2} M readings/sec",
        total as f64 / elapsed.as_secs_f64() / 1_000_000.0
    );
}
