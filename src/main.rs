#[tokio::main]
async fn main() {
    // Delegate to the server framework entry point.
    if let Err(e) = arena_server::run_with_config().await {
        eprintln!("arena server failed: {e}");
        std::process::exit(1);
    }
}
