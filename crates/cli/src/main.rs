// Copyright 2025 Benchstore Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchstore CLI entry point.

use clap::Parser;
use benchstore_cli::{init_tracing, run, Cli};

#[tokio::main]
async fn main() {
    // A missing .env file is not an error.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}
