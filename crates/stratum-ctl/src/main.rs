//! stratum-ctl — command-line interface for the stratum daemon's admin HTTP
//! surface.

use anyhow::{Context, Result};

mod cmd;

const DEFAULT_PORT: u16 = 4712;

fn print_usage() {
    println!("Usage: stratum-ctl [--port <port>] <command>");
    println!();
    println!("  status                          Backend module names and uptime");
    println!("  stats                           Requests served and bytes moved");
    println!();
    println!(
        "Options:\n  --port <port>                   Admin API port (default: {DEFAULT_PORT})"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut port = DEFAULT_PORT;
    let mut remaining: Vec<String> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--port" {
            i += 1;
            port = args
                .get(i)
                .context("--port requires a value")?
                .parse()
                .context("--port must be a number")?;
        } else {
            remaining.push(args[i].clone());
        }
        i += 1;
    }

    let remaining_refs: Vec<&str> = remaining.iter().map(|s| s.as_str()).collect();

    match remaining_refs.as_slice() {
        ["status"] | [] => cmd::status::cmd_status(port).await,
        ["stats"] => cmd::status::cmd_stats(port).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
