#[tokio::main]
async fn main() {
    abg_narrative::init_tracing();

    if let Err(e) = abg_narrative::run().await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}
