use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    chatmark_cli::run().await
}
