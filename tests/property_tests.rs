//! Property and fuzz-style tests for robustness of core data structures.
//!
//! Runs on host (x86_64) only; proptest does not build for ESP32 targets.
//! On ESP32, these tests are compiled out.

#![cfg(not(target_os = "espidf"))]

use labsentinel::adapters::device_id::DeviceIdString;
use labsentinel::app::commands::{FrameAssembler, PeerCommand};
use labsentinel::app::retry_queue::RetryQueue;
use labsentinel::config::RETRY_QUEUE_MAX;
use labsentinel::scheduler::Interval;
use labsentinel::sensors::bmp280::Calibration;
use labsentinel::sensors::light::trimmed_mean;
use labsentinel::sensors::{Bmp280Reading, Environment, LightReading, SensorReading};
use labsentinel::transport::TransportError;
use proptest::prelude::*;

// ── BMP280 compensation ───────────────────────────────────────

/// Trimming values from the Bosch datasheet worked example.
fn datasheet_calibration() -> Calibration {
    Calibration {
        dig_t1: 27504,
        dig_t2: 26435,
        dig_t3: -1000,
        dig_p1: 36477,
        dig_p2: -10685,
        dig_p3: 3024,
        dig_p4: 2855,
        dig_p5: 140,
        dig_p6: -7,
        dig_p7: 15500,
        dig_p8: -14600,
        dig_p9: 6000,
    }
}

/// Double-precision compensation, returns (°C, t_fine).
fn float_temperature(c: &Calibration, adc_t: i32) -> (f64, f64) {
    let adc_t = f64::from(adc_t);
    let var1 = (adc_t / 16384.0 - f64::from(c.dig_t1) / 1024.0) * f64::from(c.dig_t2);
    let d = adc_t / 131_072.0 - f64::from(c.dig_t1) / 8192.0;
    let var2 = d * d * f64::from(c.dig_t3);
    let t_fine = var1 + var2;
    (t_fine / 5120.0, t_fine)
}

/// Double-precision compensation, returns Pa.
fn float_pressure(c: &Calibration, adc_p: i32, t_fine: f64) -> f64 {
    let mut var1 = t_fine / 2.0 - 64000.0;
    let mut var2 = var1 * var1 * f64::from(c.dig_p6) / 32768.0;
    var2 += var1 * f64::from(c.dig_p5) * 2.0;
    var2 = var2 / 4.0 + f64::from(c.dig_p4) * 65536.0;
    var1 = (f64::from(c.dig_p3) * var1 * var1 / 524_288.0 + f64::from(c.dig_p2) * var1) / 524_288.0;
    var1 = (1.0 + var1 / 32768.0) * f64::from(c.dig_p1);
    let mut p = 1_048_576.0 - f64::from(adc_p);
    p = (p - var2 / 4096.0) * 6250.0 / var1;
    let v1 = f64::from(c.dig_p9) * p * p / 2_147_483_648.0;
    let v2 = p * f64::from(c.dig_p8) / 32768.0;
    p + (v1 + v2 + f64::from(c.dig_p7)) / 16.0
}

#[test]
fn datasheet_example_values() {
    let cal = datasheet_calibration();
    let (centi, t_fine) = cal.compensate_temperature(519_888);
    assert_eq!(centi, 2508);
    let pa = f64::from(cal.compensate_pressure(415_148, t_fine)) / 256.0;
    assert!((pa - 100_653.27).abs() < 1.0, "got {pa}");
}

proptest! {
    /// Fixed-point temperature stays within 0.02 °C of the float formula
    /// across roughly 0..50 °C.
    #[test]
    fn temperature_matches_float_reference(adc_t in 440_000i32..600_000) {
        let cal = datasheet_calibration();
        let (centi, _) = cal.compensate_temperature(adc_t);
        let (expected, _) = float_temperature(&cal, adc_t);
        prop_assert!((f64::from(centi) / 100.0 - expected).abs() <= 0.02);
    }

    /// Fixed-point pressure stays within 0.05 hPa of the float formula.
    #[test]
    fn pressure_matches_float_reference(
        adc_t in 440_000i32..600_000,
        adc_p in 300_000i32..500_000,
    ) {
        let cal = datasheet_calibration();
        let (_, t_fine) = cal.compensate_temperature(adc_t);
        let (_, t_fine_f) = float_temperature(&cal, adc_t);
        let hpa = f64::from(cal.compensate_pressure(adc_p, t_fine)) / 25_600.0;
        let expected = float_pressure(&cal, adc_p, t_fine_f) / 100.0;
        prop_assert!((hpa - expected).abs() <= 0.05, "{} vs {}", hpa, expected);
    }

    /// Arbitrary raw words and trimming never panic.
    #[test]
    fn compensation_is_total(
        raw in proptest::array::uniform24(any::<u8>()),
        adc_t in 0i32..(1 << 20),
        adc_p in 0i32..(1 << 20),
    ) {
        let cal = Calibration::from_registers(&raw);
        let (_, t_fine) = cal.compensate_temperature(adc_t);
        let _ = cal.compensate_pressure(adc_p, t_fine);
    }
}

// ── Light filter ──────────────────────────────────────────────

proptest! {
    /// Two extreme lows and two extreme highs never move the result.
    #[test]
    fn trimmed_mean_ignores_outliers(
        samples in proptest::collection::vec(0u16..=4095, 1..=20),
    ) {
        let plain = (samples.iter().map(|&s| u32::from(s)).sum::<u32>() / samples.len() as u32) as u16;
        let mut window = samples.clone();
        window.extend_from_slice(&[0, 0, 4095, 4095]);
        prop_assert_eq!(trimmed_mean(&mut window), plain);
    }

    #[test]
    fn trimmed_mean_within_sample_range(
        mut samples in proptest::collection::vec(0u16..=4095, 1..=32),
    ) {
        let lo = *samples.iter().min().unwrap();
        let hi = *samples.iter().max().unwrap();
        let m = trimmed_mean(&mut samples);
        prop_assert!(lo <= m && m <= hi);
    }
}

// ── Retry queue ───────────────────────────────────────────────

fn reading(ts: u64) -> SensorReading {
    SensorReading {
        device_id: DeviceIdString::new(),
        timestamp: ts,
        environment: Environment {
            bmp280: Bmp280Reading::unavailable(),
            light: LightReading::default(),
        },
    }
}

proptest! {
    /// Never exceeds capacity; always holds the newest entries in order.
    #[test]
    fn retry_queue_keeps_newest(n in 0u64..100) {
        let mut q = RetryQueue::new(3000, 0);
        for ts in 0..n {
            q.push(reading(ts), 0);
        }
        let kept = (n as usize).min(RETRY_QUEUE_MAX);
        prop_assert_eq!(q.len(), kept);
        prop_assert_eq!(u64::from(q.dropped()), n - kept as u64);
        let stamps: Vec<u64> = q.iter().map(|r| r.timestamp).collect();
        let expected: Vec<u64> = (n - kept as u64..n).collect();
        prop_assert_eq!(stamps, expected);
    }

    /// Disconnected enqueues are at least one cooldown apart.
    #[test]
    fn disconnected_enqueues_respect_cooldown(
        gaps in proptest::collection::vec(1u32..5000, 1..60),
    ) {
        let mut q = RetryQueue::new(3000, 0);
        let mut now = 0u32;
        let mut last: Option<u32> = None;
        for (i, gap) in gaps.iter().enumerate() {
            now += gap;
            if q.offer(reading(i as u64), &TransportError::Disconnected, now) {
                prop_assert!(now - last.unwrap_or(0) >= 3000);
                last = Some(now);
            }
        }
    }
}

// ── Frame assembly ────────────────────────────────────────────

proptest! {
    /// However a write is chunked, the same command comes out.
    #[test]
    fn chunking_does_not_change_the_command(size in 1usize..=40) {
        let msg = b"{\"type\":\"threshold\",\"temp_high\":31.5,\"temp_low\":\"9\"}\n";
        let mut asm = FrameAssembler::new();
        let mut frames = Vec::new();
        for chunk in msg.chunks(size) {
            frames.extend(asm.push(chunk));
        }
        prop_assert_eq!(frames.len(), 1);
        prop_assert_eq!(
            PeerCommand::parse(&frames[0]),
            PeerCommand::Threshold { temp_high: 31.5, temp_low: 9.0 }
        );
        prop_assert_eq!(asm.pending_len(), 0);
    }

    /// Arbitrary bytes never panic the assembler or the parser.
    #[test]
    fn assembler_survives_garbage(
        chunks in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..=20), 0..40),
    ) {
        let mut asm = FrameAssembler::new();
        for c in &chunks {
            if let Some(frame) = asm.push(c) {
                let _ = PeerCommand::parse(&frame);
            }
        }
    }
}

// ── Scheduler ─────────────────────────────────────────────────

proptest! {
    /// An interval fires exactly one period after its anchor, wherever the
    /// counter is.
    #[test]
    fn interval_fires_across_wrap(start in any::<u32>(), period in 1u32..100_000) {
        let mut iv = Interval::new(period, start);
        prop_assert!(!iv.poll(start.wrapping_add(period - 1)));
        prop_assert!(iv.poll(start.wrapping_add(period)));
    }
}
