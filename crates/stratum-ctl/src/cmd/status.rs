//! Daemon status and stats commands.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json};

#[derive(Deserialize)]
struct StatusResponse {
    object_backend: String,
    kv_backend: String,
    uptime_secs: u64,
}

#[derive(Deserialize)]
struct StatsResponse {
    requests: u64,
    bytes_read: u64,
    bytes_written: u64,
}

pub async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/status", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  Stratum Daemon Status");
    println!("═══════════════════════════════════════");
    println!("  Object backend   : {}", resp.object_backend);
    println!("  KV backend       : {}", resp.kv_backend);
    println!("  Uptime           : {}s", resp.uptime_secs);

    Ok(())
}

pub async fn cmd_stats(port: u16) -> Result<()> {
    let resp: StatsResponse = get_json(&format!("{}/stats", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  Stratum Daemon Stats");
    println!("═══════════════════════════════════════");
    println!("  Requests served  : {}", resp.requests);
    println!("  Bytes read       : {}", resp.bytes_read);
    println!("  Bytes written    : {}", resp.bytes_written);

    Ok(())
}
