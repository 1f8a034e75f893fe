#[tokio::main]
async fn main() {
    if let Err(err) = cm_api::run().await {
        eprintln!("cm-api failed: {err}");
        std::process::exit(1);
    }
}
