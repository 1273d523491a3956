//! Analytics tools for genbi.
//!
//! Tools give the reasoning loop the ability to explore and query a SQL
//! database, analyze the rows it gets back, reshape them into a table, and
//! draw a chart. Three of them are producers the dispatcher understands:
//! `sql_db_query_checker`, `convert_to_table` and `visualize_table`.

pub mod analysis;
pub mod chart;
pub mod llm;
pub mod sql;

#[cfg(test)]
pub(crate) mod testing;

use genbi_core::artifact::ArtifactStore;
use genbi_core::tool::ToolRegistry;
use std::sync::Arc;

pub use analysis::{AnalyzeDataTool, ConvertToTableTool};
pub use chart::{ChartRenderer, CommandChartRenderer, RenderedChart, VisualizeTableTool};
pub use llm::ModelHandle;
pub use sql::database::SqlDatabase;
pub use sql::{DatabaseError, Dialect, ListTablesTool, QueryCheckerTool, QueryTool, SchemaTool};

/// Everything the analytics tools need.
pub struct Toolkit {
    pub db: Arc<SqlDatabase>,
    pub model: ModelHandle,
    /// Without a renderer the chart tool is not offered to the model.
    pub renderer: Option<Arc<dyn ChartRenderer>>,
    pub artifacts: Arc<dyn ArtifactStore>,
}

/// Build the registry of analytics tools.
pub fn analytics_registry(toolkit: Toolkit) -> ToolRegistry {
    let Toolkit {
        db,
        model,
        renderer,
        artifacts,
    } = toolkit;
    let dialect = db.dialect().name();

    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ListTablesTool::new(db.clone())));
    registry.register(Box::new(SchemaTool::new(db.clone())));
    registry.register(Box::new(QueryTool::new(db)));
    registry.register(Box::new(QueryCheckerTool::new(model.clone(), dialect)));
    registry.register(Box::new(AnalyzeDataTool::new(model.clone())));
    registry.register(Box::new(ConvertToTableTool::new(model.clone())));
    if let Some(renderer) = renderer {
        registry.register(Box::new(VisualizeTableTool::new(model, renderer, artifacts)));
    }
    registry
}
