//! Probe: QuadrigaCX ticker endpoint
//!
//! Hits GET https://api.quadrigacx.com/v2/ticker?book=<book> and documents:
//! - Response shape and fields
//! - The parsed last trade price
//! - Latency over multiple requests

use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use serde_json::Value;

use quadriga_bot::alert::format_price;
use quadriga_bot::ticker::{QuadrigaClient, parse_last_price};
use quadriga_bot::types::OrderBook;

#[derive(Parser)]
#[command(name = "probe_ticker", about = "Probe the QuadrigaCX ticker endpoint")]
struct Args {
    /// Order book to query
    #[arg(long, default_value = "eth_cad")]
    book: OrderBook,

    /// Number of requests for the latency measurement
    #[arg(long, default_value_t = 5)]
    count: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let client = QuadrigaClient::new()?;
    let book = args.book;

    println!("=== Probe: Ticker ===");
    println!("Book: {book}");
    println!();

    // 1. Single request, raw body
    println!("--- 1. Raw response ---");
    let start = Instant::now();
    let body = client.ticker_body(book).await?;
    println!("Latency: {:?}", start.elapsed());
    match serde_json::from_str::<Value>(&body) {
        Ok(json) => {
            println!("{}", serde_json::to_string_pretty(&json)?);
            if let Some(obj) = json.as_object() {
                println!("\nFields present:");
                for key in obj.keys() {
                    println!("  - {key}");
                }
            }
        }
        Err(_) => println!("Non-JSON body: {body}"),
    }
    println!();

    // 2. Parsed price
    println!("--- 2. Parsed last price ---");
    match parse_last_price(&body) {
        Ok(price) => println!(
            "{} last trade: ${} {}",
            book.coin(),
            format_price(price),
            book.currency()
        ),
        Err(e) => println!("Parse failed: {e:#}"),
    }
    println!();

    // 3. Latency measurements
    println!("--- 3. Latency over {} requests ---", args.count);
    let mut latencies = Vec::new();
    for i in 0..args.count {
        let start = Instant::now();
        let result = client.ticker_body(book).await;
        let latency = start.elapsed();
        match result {
            Ok(_) => println!("  Request {}: {:?}", i + 1, latency),
            Err(e) => println!("  Request {}: failed after {:?}: {e:#}", i + 1, latency),
        }
        latencies.push(latency);
    }
    if !latencies.is_empty() {
        let avg = latencies.iter().sum::<Duration>() / latencies.len() as u32;
        println!("  Average: {avg:?}");
    }
    println!();

    println!("=== Probe Complete ===");
    Ok(())
}
