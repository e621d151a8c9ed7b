pub mod pictogram;

pub use pictogram::{PictogramFetchTool, PictogramSearchTool};

use crate::pictogram::PictogramProvider;
use crate::tools::ToolRegistry;
use std::sync::Arc;

/// Register the pictogram lookup tools backed by `provider`
pub async fn register_pictogram_tools(registry: &ToolRegistry, provider: Arc<PictogramProvider>) {
    registry
        .register(Arc::new(PictogramSearchTool::new(Arc::clone(&provider))))
        .await;
    registry
        .register(Arc::new(PictogramFetchTool::new(provider)))
        .await;
}
