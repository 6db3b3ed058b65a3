use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::sink::{to_lines, Point, Sink};
use crate::Result;

/// Prints points as line protocol. Used for dry runs.
#[derive(Debug, Default)]
pub struct Stdout;

#[async_trait]
impl Sink for Stdout {
    async fn write(&self, points: &[Point]) -> Result<()> {
        let mut lines = to_lines(points);
        if lines.is_empty() {
            return Ok(());
        }
        lines.push('\n');

        let mut stdout = tokio::io::stdout();
        stdout.write_all(lines.as_bytes()).await?;
        stdout.flush().await?;
        Ok(())
    }
}
