use async_trait::async_trait;

use crate::Result;

pub mod influx;
mod point;
pub mod stdout;

pub use point::{FieldValue, Point};

/// Destination for collected points.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn write(&self, points: &[Point]) -> Result<()>;
}

// Render the points that carry at least one field, one per line.
pub(crate) fn to_lines(points: &[Point]) -> String {
    points
        .iter()
        .filter(|p| p.has_fields())
        .map(Point::to_line)
        .collect::<Vec<_>>()
        .join("\n")
}
