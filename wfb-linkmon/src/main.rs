use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use rand::Rng;
use wfb_telemetry::SignalQualityMonitor;

const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(name = "wfb-linkmon")]
#[command(about = "Feeds a simulated receiver pipeline into the link-quality monitor")]
struct Args {
    /// Run duration in seconds
    #[arg(long, short = 'd', default_value_t = 10)]
    duration: u64,

    /// RSSI/SNR samples per second
    #[arg(long, default_value_t = 500)]
    sample_rate: u64,

    /// FEC batches per second
    #[arg(long, default_value_t = 60)]
    fec_rate: u64,

    /// Probability that a FEC batch reports lost packets
    #[arg(long, default_value_t = 0.05)]
    loss_probability: f64,
}

fn spawn_signal_producer(
    monitor: Arc<SignalQualityMonitor>,
    running: Arc<AtomicBool>,
    sample_rate: u64,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let interval = Duration::from_nanos(1_000_000_000 / sample_rate.max(1));
        let mut rng = rand::thread_rng();

        while running.load(Ordering::Relaxed) {
            // Antenna 2 trails antenna 1 to exercise diversity selection
            let rssi = rng.gen_range(60u8..=90);
            let snr = rng.gen_range(20i8..=40);

            monitor.record_rssi(rssi, rssi.saturating_sub(10));
            monitor.record_snr(snr, snr - 5);

            thread::sleep(interval);
        }
    })
}

fn spawn_fec_producer(
    monitor: Arc<SignalQualityMonitor>,
    running: Arc<AtomicBool>,
    fec_rate: u64,
    loss_probability: f64,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let interval = Duration::from_nanos(1_000_000_000 / fec_rate.max(1));
        let mut rng = rand::thread_rng();

        while running.load(Ordering::Relaxed) {
            let all = rng.gen_range(8u32..=12);
            let recovered = rng.gen_range(0u32..=2);
            let lost = if rng.gen_bool(loss_probability) {
                rng.gen_range(1u32..=3)
            } else {
                0
            };

            monitor.record_fec(all, recovered, lost);

            thread::sleep(interval);
        }
    })
}

fn main() {
    simple_logger::SimpleLogger::new().env().init().ok();

    let args = Args::parse();
    let version = env!("CARGO_PKG_VERSION");

    log::info!("WFB Link Monitor: v{}", version);
    log::info!(
        "Simulating {} samples/s, {} FEC batches/s, {:.0}% loss for {}s",
        args.sample_rate,
        args.fec_rate,
        args.loss_probability * 100.0,
        args.duration
    );

    let monitor = Arc::new(SignalQualityMonitor::new());
    let running = Arc::new(AtomicBool::new(true));

    let producers = [
        spawn_signal_producer(Arc::clone(&monitor), Arc::clone(&running), args.sample_rate),
        spawn_fec_producer(
            Arc::clone(&monitor),
            Arc::clone(&running),
            args.fec_rate,
            args.loss_probability,
        ),
    ];

    for _ in 0..args.duration {
        thread::sleep(SNAPSHOT_INTERVAL);

        let quality = monitor.compute_snapshot();

        log::info!(
            "score {:>3} | rssi {:>3} | snr {:>3} | recovered {:>4} | lost {:>4} | idr {}",
            quality.link_score,
            quality.rssi,
            quality.snr,
            quality.recovered_last_second,
            quality.lost_last_second,
            quality.idr_code
        );
    }

    running.store(false, Ordering::Relaxed);

    for producer in producers {
        let _ = producer.join();
    }
}
