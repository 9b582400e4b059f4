#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dwelltrack_lib::run(std::env::args()).await
}
