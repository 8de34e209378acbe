#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = exam_runner::run().await {
        eprintln!("exam-runner fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
