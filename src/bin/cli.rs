#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stackwatch_ui_terminal::cli::run().await
}
