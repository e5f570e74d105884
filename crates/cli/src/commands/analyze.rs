//! `mindscope analyze` — Run one pre-classified turn and print the result.

use std::path::{Path, PathBuf};

use mindscope_engine::ClassifiedTurn;
use tokio::io::AsyncReadExt;

pub async fn run(input: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let raw = if input == Path::new("-") {
        let mut buf = String::new();
        tokio::io::stdin().read_to_string(&mut buf).await?;
        buf
    } else {
        tokio::fs::read_to_string(&input)
            .await
            .map_err(|e| format!("Failed to read {}: {e}", input.display()))?
    };

    let turn: ClassifiedTurn =
        serde_json::from_str(&raw).map_err(|e| format!("Invalid turn JSON: {e}"))?;

    let config = super::load_config()?;
    let pipeline = super::build_pipeline(&config)?;
    let result = pipeline.process_classified(turn).await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
