//! posture - local security posture auditor

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    posture_cli::run().await
}
