mod card;
mod host;
mod sink;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
