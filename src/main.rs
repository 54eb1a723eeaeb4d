#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = kambaz_quiz::run().await {
        eprintln!("kambaz-quiz fatal: {e:#}");
        std::process::exit(1);
    }
    // The stdin reader may still be parked on a blocking read.
    std::process::exit(0);
}
