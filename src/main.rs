#[tokio::main]
async fn main() -> anyhow::Result<()> {
    vitalwatch_lib::run().await
}
