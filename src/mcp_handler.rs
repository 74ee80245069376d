use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::tool::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo};
use rmcp::{schemars, serve_server, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::{Deserialize, Serialize};

use crate::cache_system::OutlineCache;
use crate::config::ReaderConfig;
use crate::dispatcher::{Dispatcher, FileKind};
use crate::exporters::{export, ExportFormat};
use crate::outline_node::OutlineNode;
use crate::render_adapter::to_graph;
use crate::shared_utils::validate_file_path;
use crate::transformer::{transform, TransformConfig};

/// Input for the outline_document tool
#[derive(Serialize, Deserialize, Debug, schemars::JsonSchema)]
pub struct OutlineDocumentRequest {
    #[schemars(description = "Path to the PDF, DOCX or PPTX file")]
    pub file_path: String,
    #[schemars(description = "pdf, docx or pptx; detected from the extension or content when omitted")]
    pub file_kind: Option<String>,
    #[schemars(description = "Deepest level to keep (1 = top-level entries only, 0 = no limit)")]
    pub max_depth: Option<u32>,
    #[schemars(description = "Merge chains of single-child entries into one entry")]
    pub collapse_chains: Option<bool>,
    #[schemars(description = "Output format: json (default), markdown, opml or dot")]
    pub format: Option<String>,
}

/// Input for the outline_graph tool
#[derive(Serialize, Deserialize, Debug, schemars::JsonSchema)]
pub struct OutlineGraphRequest {
    #[schemars(description = "Path to the PDF, DOCX or PPTX file")]
    pub file_path: String,
    #[schemars(description = "pdf, docx or pptx; detected from the extension or content when omitted")]
    pub file_kind: Option<String>,
    #[schemars(description = "Deepest level to keep (1 = top-level entries only, 0 = no limit)")]
    pub max_depth: Option<u32>,
    #[schemars(description = "Merge chains of single-child entries into one entry")]
    pub collapse_chains: Option<bool>,
}

/// Outline extraction exposed as MCP tools
#[derive(Clone)]
pub struct OutlineReader {
    dispatcher: Arc<Dispatcher>,
    config: Arc<ReaderConfig>,
    tool_router: ToolRouter<Self>,
}

impl OutlineReader {
    pub fn new(config: ReaderConfig) -> Self {
        let cache = OutlineCache::new(config.cache_capacity, Duration::from_secs(config.cache_max_age_secs));
        let dispatcher = Dispatcher::new(config.heuristics.clone()).with_cache(cache);
        Self::with_dispatcher(dispatcher, config)
    }

    pub fn with_dispatcher(dispatcher: Dispatcher, config: ReaderConfig) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            config: Arc::new(config),
            tool_router: Self::tool_router(),
        }
    }

    /// Per-call transform settings; omitted values fall back to the server config.
    pub fn transform_config(&self, max_depth: Option<u32>, collapse_chains: Option<bool>) -> TransformConfig {
        let max_depth = match max_depth {
            Some(0) => None,
            Some(depth) => Some(depth),
            None => self.config.default_max_depth,
        };
        TransformConfig::new(max_depth, collapse_chains.unwrap_or(self.config.default_collapse_chains))
            .with_separator(self.config.chain_separator.clone())
    }

    /// Extract and transform one file on the blocking thread pool.
    pub async fn outline(
        &self,
        file_path: String,
        file_kind: Option<String>,
        transform_config: TransformConfig,
    ) -> Result<OutlineNode> {
        FileKind::declared(file_kind.as_deref())?;
        validate_file_path(&file_path).map_err(anyhow::Error::msg)?;

        let dispatcher = Arc::clone(&self.dispatcher);
        let tree = tokio::task::spawn_blocking(move || {
            dispatcher
                .dispatch_path(Path::new(&file_path), file_kind.as_deref())
                .map(|tree| transform(&tree, &transform_config))
        })
        .await
        .context("Extraction task failed")??;

        if let Some(stats) = self.dispatcher.cache().map(OutlineCache::stats) {
            log::debug!(
                "Outline cache: {} entries, {} hits, {} misses",
                stats.entries,
                stats.hits,
                stats.misses
            );
        }
        Ok(tree)
    }
}

fn tool_error(message: String) -> CallToolResult {
    log::warn!("{}", message);
    CallToolResult::error(vec![Content::text(message)])
}

#[tool_router]
impl OutlineReader {
    #[tool(description = "Extract the heading outline of a PDF, DOCX or PPTX file as a tree, optionally depth-limited and with single-child chains merged, serialized as json, markdown, opml or dot")]
    async fn outline_document(
        &self,
        Parameters(request): Parameters<OutlineDocumentRequest>,
    ) -> Result<CallToolResult, McpError> {
        let format = match request.format.as_deref() {
            None => ExportFormat::Json,
            Some(raw) => match ExportFormat::parse(raw) {
                Some(format) => format,
                None => {
                    return Ok(tool_error(format!(
                        "Unsupported output format: {} (expected json, markdown, opml or dot)",
                        raw
                    )));
                }
            },
        };

        let config = self.transform_config(request.max_depth, request.collapse_chains);
        match self.outline(request.file_path, request.file_kind, config).await {
            Ok(tree) => Ok(CallToolResult::success(vec![Content::text(export(&tree, format))])),
            Err(e) => Ok(tool_error(format!("{:#}", e))),
        }
    }

    #[tool(description = "Extract the heading outline of a PDF, DOCX or PPTX file as graph nodes and parent-child edges (JSON) for rendering")]
    async fn outline_graph(
        &self,
        Parameters(request): Parameters<OutlineGraphRequest>,
    ) -> Result<CallToolResult, McpError> {
        let config = self.transform_config(request.max_depth, request.collapse_chains);
        let tree = match self.outline(request.file_path, request.file_kind, config).await {
            Ok(tree) => tree,
            Err(e) => return Ok(tool_error(format!("{:#}", e))),
        };

        match serde_json::to_string_pretty(&to_graph(&tree)) {
            Ok(json) => Ok(CallToolResult::success(vec![Content::text(json)])),
            Err(e) => Ok(tool_error(format!("Failed to serialize graph: {}", e))),
        }
    }
}

#[tool_handler]
impl ServerHandler for OutlineReader {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "This server extracts the outline (bookmarks, headings, slides and bullets) of PDF, DOCX and PPTX files and returns it as a tree in JSON, Markdown, OPML or Graphviz DOT.".to_string()
            ),
        }
    }
}

/// Serve the outline tools over stdio until the client disconnects
pub async fn start_server(config: ReaderConfig) -> Result<()> {
    use tokio::io::{stdin, stdout};
    let transport = (stdin(), stdout());

    let reader = OutlineReader::new(config);

    let server = serve_server(reader, transport)
        .await
        .context("Failed to start MCP server")?;

    let quit_reason = server.waiting().await?;
    log::info!("Server stopped: {:?}", quit_reason);

    Ok(())
}
