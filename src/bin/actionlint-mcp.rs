use actionlint_mcp::mcp::serve;
use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    serve().await
}
