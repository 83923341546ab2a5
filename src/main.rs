#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracker_recorder::run().await
}
