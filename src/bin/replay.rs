//! # Replay: drive a running router with a fixed prompt set
//!
//! Sends short, medium and long prompts to `POST /infer` once per mode and
//! prints the routing outcome of each call. Every call is also appended to
//! the service's CSV log, so a replay produces a comparable dataset across
//! modes.
//!
//! ## Usage
//!
//! ```bash
//! replay
//! replay --url http://127.0.0.1:8000 --pause-ms 500 --modes adaptive,gpu
//! ```

use std::time::{Duration, Instant};

use adaptive_inference_router::Mode;
use serde_json::{json, Value};

/// Prompts of increasing length: the first two fall under the small-prompt
/// threshold, the last one over the large-prompt threshold.
const PROMPTS: &[&str] = &[
    "What is AI?",
    "Explain how photosynthesis works.",
    "Describe the architecture of convolutional neural networks in deep learning.",
    "Walk through how a large transformer language model is trained end to end. \
     Cover tokenization and dataset preparation, self-supervised pretraining, \
     supervised fine-tuning, and preference-based alignment. Explain attention \
     and why it scales quadratically with sequence length. Then describe how \
     training is spread across many accelerators with data, tensor and pipeline \
     parallelism, how mixed precision and gradient checkpointing reduce memory, \
     and how optimizers such as AdamW with warmup schedules keep training stable. \
     Finish by comparing serving the model on a CPU against a GPU for interactive \
     workloads, including the effect of quantization and batching on latency.",
];

/// Parsed CLI arguments.
struct Args {
    /// Service base URL.
    url: String,
    /// Pause between calls.
    pause: Duration,
    /// Modes to replay, in order.
    modes: Vec<Mode>,
}

/// Parse command-line arguments manually (no external arg parser dependency).
fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = std::env::args().collect();
    let mut url = "http://127.0.0.1:8000".to_string();
    let mut pause_ms: u64 = 2000;
    let mut modes = vec![Mode::Cpu, Mode::Gpu, Mode::Adaptive];

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--url" | "-u" => {
                i += 1;
                url = args.get(i).ok_or("--url requires a value")?.clone();
            }
            "--pause-ms" | "-p" => {
                i += 1;
                let raw = args.get(i).ok_or("--pause-ms requires a value")?;
                pause_ms = raw
                    .parse()
                    .map_err(|_| format!("invalid pause: {raw}"))?;
            }
            "--modes" | "-m" => {
                i += 1;
                let raw = args.get(i).ok_or("--modes requires a value")?;
                modes = raw
                    .split(',')
                    .map(|m| m.trim().parse::<Mode>())
                    .collect::<Result<_, _>>()?;
            }
            "--help" | "-h" => {
                return Err(usage());
            }
            other => {
                return Err(format!("unknown argument: {other}\n\n{}", usage()));
            }
        }
        i += 1;
    }

    Ok(Args {
        url: url.trim_end_matches('/').to_string(),
        pause: Duration::from_millis(pause_ms),
        modes,
    })
}

fn usage() -> String {
    "Usage: replay [--url URL] [--pause-ms N] [--modes cpu,gpu,adaptive]".to_string()
}

fn describe(body: &Value, mode: Mode) -> String {
    format!(
        "prompt_len={} | model={} | latency={:.2}s | backend_ok={} | mode={}",
        body["prompt_length"],
        body["selected_model"].as_str().unwrap_or("?"),
        body["latency_s"].as_f64().unwrap_or(0.0),
        body["backend_ok"].as_bool().unwrap_or(false),
        mode,
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };

    let client = reqwest::Client::new();
    let endpoint = format!("{}/infer", args.url);
    let mut failures = 0usize;

    for mode in &args.modes {
        println!("\n== {} mode ==", mode.as_str().to_uppercase());
        for prompt in PROMPTS {
            let started = Instant::now();
            let result = client
                .post(&endpoint)
                .json(&json!({ "prompt": prompt, "mode": mode }))
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => {
                    let body: Value = resp.json().await?;
                    println!("ok   {}", describe(&body, *mode));
                }
                Ok(resp) => {
                    failures += 1;
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    println!("err  HTTP {status}: {text}");
                }
                Err(e) => {
                    failures += 1;
                    println!(
                        "err  request failed after {:.2}s: {e}",
                        started.elapsed().as_secs_f64()
                    );
                }
            }
            tokio::time::sleep(args.pause).await;
        }
    }

    let total = args.modes.len() * PROMPTS.len();
    println!("\n{} of {total} calls succeeded", total - failures);
    Ok(())
}
