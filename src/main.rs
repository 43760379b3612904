#[tokio::main]
async fn main() -> anyhow::Result<()> {
    peerchain::node::run_cli().await
}
