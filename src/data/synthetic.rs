//! Synthetic stations for the demo: noise with occasional events, each event
//! marked by a P detection and a theoretical phase window around it.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

use crate::data::datetime::epoch_seconds;
use crate::state::entities::{
    Channel, DataSegment, Mask, SignalDetection, Station, TheoreticalPhaseWindow,
};

pub const SAMPLE_RATE: f64 = 40.0;

const DETECTION_COLOR: [u8; 4] = [255, 0, 0, 255];
const PHASE_WINDOW_COLORS: [[u8; 4]; 3] = [
    [255, 215, 0, 255],   // gold
    [221, 160, 221, 255], // plum
    [0, 255, 255, 255],   // cyan
];
const MASK_COLORS: [[u8; 4]; 2] = [[200, 60, 60, 90], [60, 160, 60, 90]];
const CHANNEL_NAMES: [&str; 3] = ["BHZ", "BHN", "BHE"];

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    format!("{prefix}-{}", NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

/// Start of every synthetic trace, 2016-01-01T00:00:00Z.
pub fn default_start_time() -> f64 {
    epoch_seconds(2016, 1, 1).unwrap_or(0.0)
}

/// One synthetic channel of `samples` points.
///
/// Events start at random sample positions, grow quickly towards a random
/// peak below `event_amplitude`, then decay. Noise is uniform within
/// `noise_amplitude`.
pub fn dummy_channel<R: Rng + ?Sized>(
    rng: &mut R,
    name: &str,
    start_time: f64,
    samples: usize,
    event_amplitude: f64,
    noise_amplitude: f64,
) -> Channel {
    let mut data = Vec::with_capacity(samples);
    let mut detections = Vec::new();
    let mut phase_windows = Vec::new();

    let mut amplitude = 0.0f64;
    let mut peak = 0.0f64;
    let mut building = false;
    let n = samples.max(1) as f64;

    for i in 1..samples {
        let time = start_time + (i - 1) as f64 / SAMPLE_RATE;

        let period = (n / (rng.gen::<f64>() * 10.0)).round() as usize;
        if period > 0 && i % period == 0 {
            amplitude = 0.05;
            peak = rng.gen::<f64>() * event_amplitude;
            building = true;
            detections.push(SignalDetection {
                id: next_id("sd"),
                time,
                label: "P".to_string(),
                color: DETECTION_COLOR,
            });
            phase_windows.push(TheoreticalPhaseWindow {
                id: next_id("tpw"),
                start_time: time - 1.0,
                end_time: time + 1.0,
                label: "P".to_string(),
                color: PHASE_WINDOW_COLORS[rng.gen_range(0..PHASE_WINDOW_COLORS.len())],
            });
        }

        if amplitude >= peak {
            building = false;
        }
        if building {
            amplitude += amplitude * (1.0 / n) * 125.0;
        } else {
            amplitude -= amplitude * (1.0 / n) * 62.0;
        }
        amplitude = amplitude.max(0.0);

        let sample = amplitude + noise_amplitude
            - rng.gen::<f64>() * noise_amplitude * 2.0
            - rng.gen::<f64>() * amplitude * 2.0;
        data.push(sample as f32);
    }

    let mut channel = Channel::new(next_id("ch"), name, SAMPLE_RATE)
        .with_segments(vec![DataSegment::new(start_time, data)]);
    channel.description = Some(format!(
        "eventAmplitude: {event_amplitude:.2}, noiseAmplitude: {noise_amplitude:.2}"
    ));
    channel.signal_detections = detections;
    channel.theoretical_phase_windows = phase_windows;
    channel
}

/// A few masks spread over `[start, end]`, some overlapping.
pub fn random_masks<R: Rng + ?Sized>(rng: &mut R, start: f64, end: f64, count: usize) -> Vec<Mask> {
    let span = end - start;
    (0..count)
        .map(|_| {
            let a = start + rng.gen::<f64>() * span;
            let len = span * rng.gen_range(0.01..0.1);
            Mask {
                id: next_id("mask"),
                start_time: a,
                end_time: (a + len).min(end),
                color: MASK_COLORS[rng.gen_range(0..MASK_COLORS.len())],
            }
        })
        .collect()
}

/// A station with a vertical default channel and two horizontals.
pub fn dummy_station<R: Rng + ?Sized>(
    rng: &mut R,
    index: usize,
    start_time: f64,
    samples: usize,
) -> Station {
    let duration = samples as f64 / SAMPLE_RATE;
    let mut channels: Vec<Channel> = CHANNEL_NAMES
        .iter()
        .map(|name| {
            let event = rng.gen_range(0.5..3.0);
            let noise = rng.gen_range(0.05..0.3);
            dummy_channel(rng, name, start_time, samples, event, noise)
        })
        .collect();
    for channel in channels.iter_mut().skip(1) {
        channel.masks = random_masks(rng, start_time, start_time + duration, 3);
    }
    if index % 4 == 0 {
        channels[0].masks = random_masks(rng, start_time, start_time + duration, 2);
    }

    let default_channel = channels.remove(0);
    let mut station = Station::new(next_id("st"), format!("STA{index:02}"), default_channel);
    station.non_default_channels = channels;
    station.distance_km = Some(rng.gen_range(100.0..9_000.0));
    station
}

/// `count` stations sharing one start time.
pub fn dummy_stations<R: Rng + ?Sized>(
    rng: &mut R,
    count: usize,
    start_time: f64,
    samples: usize,
) -> Vec<Station> {
    let stations: Vec<Station> = (0..count)
        .map(|i| dummy_station(rng, i, start_time, samples))
        .collect();
    tracing::info!(
        "Generated {} synthetic stations, {} samples per channel",
        stations.len(),
        samples
    );
    stations
}
