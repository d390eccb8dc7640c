use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    qbank::cli::run().await
}
