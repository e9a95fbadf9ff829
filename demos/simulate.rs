//! Stream synthetic data for every chart type
//!
//! ```text
//! cargo run --example simulate
//! ```
//!
//! Subscribe with any WebSocket client at `ws://127.0.0.1:8765/data` by
//! sending `{"chart_type": "line", "key_word": "test"}`.

use std::thread;
use std::time::Duration;

use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use chartcast::{ChartType, ServerConfig, ServerHandle};

const LABELS: [&str; 7] = ["A", "B", "C", "D", "E", "F", "G"];

/// Smooth pseudo-random value in `[low, high]`
fn wave(tick: u64, phase: f64, low: f64, high: f64) -> f64 {
    let t = tick as f64 * 0.1 + phase;
    let unit = 0.5 + 0.35 * t.sin() + 0.15 * (t * 2.7).cos();
    let value = low + (high - low) * unit;
    (value * 100.0).round() / 100.0
}

fn generate(chart_type: ChartType, tick: u64) -> Value {
    match chart_type {
        ChartType::Sequence | ChartType::Line | ChartType::Bar => json!(wave(tick, 0.0, 50.0, 150.0)),
        ChartType::Sequences | ChartType::Lines | ChartType::Bars => json!({
            "A": wave(tick, 0.0, 50.0, 150.0),
            "B": wave(tick, 1.3, 30.0, 130.0),
        }),
        ChartType::Scatter => json!([wave(tick, 0.0, 50.0, 150.0), wave(tick, 2.1, 30.0, 130.0)]),
        ChartType::Area | ChartType::Pie => {
            let values: Vec<f64> = (0..LABELS.len())
                .map(|i| wave(tick, i as f64, 50.0, 150.0))
                .collect();
            json!([LABELS, values])
        }
        ChartType::Areas => {
            let a: Vec<f64> = (0..LABELS.len()).map(|i| wave(tick, i as f64, 50.0, 150.0)).collect();
            let b: Vec<f64> = (0..LABELS.len()).map(|i| wave(tick, i as f64 + 0.7, 50.0, 150.0)).collect();
            json!([LABELS, ["A", "B"], [a, b]])
        }
        ChartType::Radar => {
            let max = vec![150; LABELS.len()];
            let values: Vec<f64> = (0..LABELS.len())
                .map(|i| wave(tick, i as f64, 50.0, 150.0))
                .collect();
            json!([LABELS, max, values])
        }
        ChartType::Surface => {
            let range: Vec<i64> = (-10..10).collect();
            let points: Vec<Value> = range
                .iter()
                .flat_map(|&x| range.iter().map(move |&y| (x, y)))
                .map(|(x, y)| {
                    let noise = wave(tick, (x * 20 + y) as f64, 0.0, 50.0);
                    json!([x, y, (3 * x * x + y) as f64 + noise])
                })
                .collect();
            json!([["moneyness", "dte", "vega"], [range.len(), range.len()], points])
        }
        ChartType::Text => json!(format!("You have a text:\n {}", wave(tick, 0.0, 0.0, 50.0))),
    }
}

fn main() -> chartcast::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chartcast=info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };

    let server = ServerHandle::start(config)?;
    tracing::info!(url = %server.url(), "Simulating all chart types with keyword `test`");

    let workers: Vec<_> = ChartType::ALL
        .iter()
        .map(|&chart_type| {
            server.stream(chart_type, "test").execute(move |stream| {
                for tick in 0..20_000 {
                    stream.fresh(generate(chart_type, tick));
                    thread::sleep(Duration::from_millis(100));
                }
            })
        })
        .collect();

    for worker in workers {
        let _ = worker.join();
    }

    server.stop();
    Ok(())
}
