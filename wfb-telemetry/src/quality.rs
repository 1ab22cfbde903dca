use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use rand::Rng;

use crate::sample::{AntennaPair, FecBatch, RssiSample, SnrSample, Timestamped};
use crate::window::SampleWindow;

/// Samples older than this no longer contribute to the quality figures.
const AVERAGING_WINDOW: Duration = Duration::from_secs(1);

/// Reported for both FEC counters when no FEC batch arrived inside the
/// window. Consumers key on this exact pair to detect a stale link.
const FEC_STALE_SENTINEL: (u64, u64) = (300, 300);

/// Link score weighting between normalized RSSI and normalized SNR.
const RSSI_WEIGHT: f32 = 0.5;
const SNR_WEIGHT: f32 = 0.5;

const IDR_CODE_LEN: usize = 4;

/// Composite link-quality figure over the last second.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalQuality {
    pub lost_last_second: i32,
    pub recovered_last_second: i32,
    /// Best-antenna RSSI average, in raw receiver units
    pub rssi: i32,
    /// Best-antenna SNR average, in dB
    pub snr: i32,
    /// Weighted RSSI/SNR composite, 0..100
    pub link_score: i32,
    /// Rotates whenever a FEC batch reports lost packets
    pub idr_code: String,
}

struct Windows {
    rssi: SampleWindow<RssiSample>,
    snr: SampleWindow<SnrSample>,
    fec: SampleWindow<FecBatch>,
    idr_code: String,
}

/// Aggregates per-packet receiver telemetry over a sliding one-second
/// window and derives a [`SignalQuality`] snapshot on demand.
///
/// All methods take `&self`; producers and the reporting consumer share
/// one instance through an `Arc`. Every operation runs inside a single
/// mutex critical section, so eviction, averaging and snapshot assembly
/// never interleave with a concurrent append.
pub struct SignalQualityMonitor {
    windows: Mutex<Windows>,
}

impl SignalQualityMonitor {
    pub fn new() -> Self {
        Self::with_window(AVERAGING_WINDOW)
    }

    /// Monitor with a non-default averaging window. Production code wants
    /// [`new`]; short windows keep the eviction tests fast.
    ///
    /// [`new`]: SignalQualityMonitor::new
    pub fn with_window(duration: Duration) -> Self {
        Self {
            windows: Mutex::new(Windows {
                rssi: SampleWindow::new(duration),
                snr: SampleWindow::new(duration),
                fec: SampleWindow::new(duration),
                idr_code: "aaaa".to_string(),
            }),
        }
    }

    /// Append one RSSI reading, timestamped on arrival.
    pub fn record_rssi(&self, ant1: u8, ant2: u8) {
        let mut windows = self.locked();
        windows.rssi.push(RssiSample {
            timestamp: Instant::now(),
            ant1,
            ant2,
        });
    }

    /// Append one SNR reading, timestamped on arrival.
    pub fn record_snr(&self, ant1: i8, ant2: i8) {
        let mut windows = self.locked();
        windows.snr.push(SnrSample {
            timestamp: Instant::now(),
            ant1,
            ant2,
        });
    }

    /// Append one FEC batch. A batch with lost packets rotates the IDR
    /// code before the append.
    pub fn record_fec(&self, all: u32, recovered: u32, lost: u32) {
        let mut windows = self.locked();

        if lost > 0 {
            windows.idr_code = generate_idr_code();
        }

        windows.fec.push(FecBatch {
            timestamp: Instant::now(),
            all,
            recovered,
            lost,
        });
    }

    /// Derive the quality snapshot from the current window contents.
    ///
    /// Always succeeds: empty antenna windows average to 0.0 and an empty
    /// FEC window reports the stale sentinel pair (300, 300).
    pub fn compute_snapshot(&self) -> SignalQuality {
        let mut windows = self.locked();
        let now = Instant::now();

        let (avg_rssi1, avg_rssi2) = average_pair(&mut windows.rssi, now);
        let (avg_snr1, avg_snr2) = average_pair(&mut windows.snr, now);

        // Normalize both metrics to 0..100 before weighting
        let rssi1 = map_range(avg_rssi1, 0.0, 126.0, 0.0, 100.0);
        let rssi2 = map_range(avg_rssi2, 0.0, 126.0, 0.0, 100.0);

        let snr1 = map_range(avg_snr1, 0.0, 60.0, 0.0, 100.0);
        let snr2 = map_range(avg_snr2, 0.0, 60.0, 0.0, 100.0);

        let link_score1 = RSSI_WEIGHT * rssi1 + SNR_WEIGHT * snr1;
        let link_score2 = RSSI_WEIGHT * rssi2 + SNR_WEIGHT * snr2;

        let (recovered, lost) = accumulate_fec(&mut windows.fec, now);

        // Diversity receiver: report the better antenna, in raw units
        let quality = SignalQuality {
            lost_last_second: saturate(lost),
            recovered_last_second: saturate(recovered),
            rssi: avg_rssi1.max(avg_rssi2) as i32,
            snr: avg_snr1.max(avg_snr2) as i32,
            link_score: link_score1.max(link_score2) as i32,
            idr_code: windows.idr_code.clone(),
        };

        windows.rssi.evict(now);
        windows.snr.evict(now);
        windows.fec.evict(now);

        log::debug!(
            "link quality: score {}, rssi {}, snr {}, recovered {}, lost {}",
            quality.link_score,
            quality.rssi,
            quality.snr,
            quality.recovered_last_second,
            quality.lost_last_second,
        );

        quality
    }

    fn locked(&self) -> MutexGuard<'_, Windows> {
        // A writer that panicked mid-append leaves the windows one sample
        // short at worst, so a poisoned lock is still usable
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SignalQualityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Evict aged entries, then average both antennas independently over the
/// remainder. An empty window averages to (0.0, 0.0).
fn average_pair<T: AntennaPair + Timestamped>(
    window: &mut SampleWindow<T>,
    now: Instant,
) -> (f32, f32) {
    window.evict(now);

    if window.is_empty() {
        return (0.0, 0.0);
    }

    let mut sum1 = 0.0f32;
    let mut sum2 = 0.0f32;

    for sample in window.iter() {
        sum1 += sample.ant1();
        sum2 += sample.ant2();
    }

    let count = window.len() as f32;

    (sum1 / count, sum2 / count)
}

/// Evict aged FEC batches, then sum the recovered and lost counters over
/// the remainder. An empty window yields the stale sentinel instead.
fn accumulate_fec(window: &mut SampleWindow<FecBatch>, now: Instant) -> (u64, u64) {
    window.evict(now);

    if window.is_empty() {
        return FEC_STALE_SENTINEL;
    }

    let mut recovered = 0u64;
    let mut lost = 0u64;

    // u64 accumulator so a window full of large u32 counters can't wrap
    for batch in window.iter() {
        recovered += batch.recovered as u64;
        lost += batch.lost as u64;
    }

    (recovered, lost)
}

/// Linear map of `value` from `[in_min, in_max]` onto
/// `[out_min, out_max]`, clamped to the output range.
fn map_range(value: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    let mapped = out_min + (value - in_min) * (out_max - out_min) / (in_max - in_min);
    mapped.max(out_min).min(out_max)
}

fn saturate(value: u64) -> i32 {
    value.min(i32::MAX as u64) as i32
}

fn generate_idr_code() -> String {
    let mut rng = rand::thread_rng();

    (0..IDR_CODE_LEN)
        .map(|_| rng.gen_range(b'a'..=b'z') as char)
        .collect()
}

#[cfg(test)]
mod tests {

    use super::*;
    use std::thread;

    const TEST_WINDOW: Duration = Duration::from_millis(50);

    #[test]
    fn test_average_over_window() {
        let monitor = SignalQualityMonitor::new();

        monitor.record_rssi(10, 20);
        monitor.record_rssi(20, 30);
        monitor.record_rssi(30, 40);

        let mut windows = monitor.locked();
        let (ant1, ant2) = average_pair(&mut windows.rssi, Instant::now());

        assert_eq!(ant1, 20.0);
        assert_eq!(ant2, 30.0);
    }

    #[test]
    fn test_average_of_empty_window() {
        let monitor = SignalQualityMonitor::new();

        let mut windows = monitor.locked();
        let (ant1, ant2) = average_pair(&mut windows.snr, Instant::now());

        assert_eq!(ant1, 0.0);
        assert_eq!(ant2, 0.0);
    }

    #[test]
    fn test_map_range_midpoint() {
        assert_eq!(map_range(63.0, 0.0, 126.0, 0.0, 100.0), 50.0);
    }

    #[test]
    fn test_map_range_clamps_both_edges() {
        assert_eq!(map_range(200.0, 0.0, 126.0, 0.0, 100.0), 100.0);
        assert_eq!(map_range(-5.0, 0.0, 126.0, 0.0, 100.0), 0.0);
    }

    #[test]
    fn test_diversity_reports_best_antenna() {
        let monitor = SignalQualityMonitor::new();

        monitor.record_rssi(40, 80);
        monitor.record_snr(10, 30);

        let quality = monitor.compute_snapshot();

        assert_eq!(quality.rssi, 80);
        assert_eq!(quality.snr, 30);
    }

    #[test]
    fn test_link_score_weighting() {
        let monitor = SignalQualityMonitor::new();

        // RSSI 63/126 maps to 50, SNR 30/60 maps to 50
        monitor.record_rssi(63, 0);
        monitor.record_snr(30, 0);

        let quality = monitor.compute_snapshot();

        assert_eq!(quality.link_score, 50);
    }

    #[test]
    fn test_link_score_takes_best_antenna() {
        let monitor = SignalQualityMonitor::new();

        // Antenna 1: score 0.5 * 100 + 0.5 * 0 = 50
        // Antenna 2: score 0.5 * 0 + 0.5 * 100 = 50, same on both
        monitor.record_rssi(126, 0);
        monitor.record_snr(0, 60);

        let quality = monitor.compute_snapshot();

        assert_eq!(quality.link_score, 50);
    }

    #[test]
    fn test_fec_sentinel_without_data() {
        let monitor = SignalQualityMonitor::new();

        let quality = monitor.compute_snapshot();

        assert_eq!(quality.lost_last_second, 300);
        assert_eq!(quality.recovered_last_second, 300);
    }

    #[test]
    fn test_fec_totals_within_window() {
        let monitor = SignalQualityMonitor::new();

        monitor.record_fec(10, 2, 0);
        monitor.record_fec(10, 3, 0);

        let quality = monitor.compute_snapshot();

        assert_eq!(quality.recovered_last_second, 5);
        assert_eq!(quality.lost_last_second, 0);
    }

    #[test]
    fn test_fec_sentinel_returns_after_window() {
        let monitor = SignalQualityMonitor::with_window(TEST_WINDOW);

        monitor.record_fec(10, 5, 0);
        thread::sleep(TEST_WINDOW * 2);

        let quality = monitor.compute_snapshot();

        assert_eq!(quality.recovered_last_second, 300);
        assert_eq!(quality.lost_last_second, 300);
    }

    #[test]
    fn test_averages_decay_after_window() {
        let monitor = SignalQualityMonitor::with_window(TEST_WINDOW);

        monitor.record_rssi(100, 100);
        monitor.record_snr(40, 40);
        thread::sleep(TEST_WINDOW * 2);

        let quality = monitor.compute_snapshot();

        assert_eq!(quality.rssi, 0);
        assert_eq!(quality.snr, 0);
        assert_eq!(quality.link_score, 0);
    }

    #[test]
    fn test_idr_code_stable_without_loss() {
        let monitor = SignalQualityMonitor::new();

        let before = monitor.compute_snapshot().idr_code;

        monitor.record_fec(10, 4, 0);
        monitor.record_fec(10, 0, 0);

        let after = monitor.compute_snapshot().idr_code;

        assert_eq!(before, "aaaa");
        assert_eq!(after, before);
    }

    #[test]
    fn test_idr_code_rotates_on_loss() {
        let monitor = SignalQualityMonitor::new();

        let before = monitor.compute_snapshot().idr_code;

        monitor.record_fec(10, 0, 3);

        let after = monitor.compute_snapshot().idr_code;

        assert_ne!(after, before);
        assert_eq!(after.len(), 4);
        assert!(after.chars().all(|c| c.is_ascii_lowercase()));
    }

    #[test]
    fn test_snapshot_is_idempotent() {
        let monitor = SignalQualityMonitor::new();

        monitor.record_rssi(60, 70);
        monitor.record_snr(20, 25);
        monitor.record_fec(10, 1, 0);

        let first = monitor.compute_snapshot();
        let second = monitor.compute_snapshot();

        assert_eq!(first, second);
    }
}
