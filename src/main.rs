// File: src/main.rs
mod app;
mod audit;
mod config;
mod error;
mod network;
mod sip;

use std::process;

#[tokio::main]
async fn main() {
    let app = match app::App::bootstrap().await {
        Ok(app) => app,
        Err(e) => {
            // logging is not up yet, write straight to stderr
            eprintln!("### CONFIGURATION ERROR: {:?}", e);
            process::exit(1);
        }
    };

    if let Err(e) = app.run().await {
        tracing::error!(error = ?e, "service exited with an error");
        process::exit(1);
    }
}
