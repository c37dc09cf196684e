use chrono::NaiveDate;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    AnnotateAble, Implementation, ListResourcesResult, PaginatedRequestParam, ProtocolVersion,
    RawResource, ReadResourceRequestParam, ReadResourceResult, ResourceContents,
    ServerCapabilities, ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{
    ErrorData as McpError, Json, RoleServer, ServerHandler, ServiceExt, tool, tool_handler,
    tool_router,
};

use crate::calendar;
use crate::config::Config;
use crate::context::AppContext;
use crate::types::{Intensity, SessionId, UserId, YearMonth};
use crate::utils::{format_minutes, format_timestamp};

use super::types::*;

#[cfg(test)]
mod tests;

mod resource_uris {
    pub const TODAY: &str = "trainmap://today";
}

/// The trainmap MCP server. Each call opens its own store connection.
#[derive(Clone)]
pub struct TrainmapMcpServer {
    tool_router: ToolRouter<Self>,
    config: Config,
}

impl TrainmapMcpServer {
    pub fn new() -> Self {
        Self::with_config(Config::load_or_default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            tool_router: Self::tool_router(),
            config,
        }
    }

    fn context(&self) -> Result<AppContext, McpError> {
        AppContext::from_config(&self.config).map_err(|e| {
            McpError::internal_error(format!("Failed to open training store: {e:#}"), None)
        })
    }

    fn subject(ctx: &AppContext, user: Option<&str>) -> UserId {
        match user.map(str::trim).filter(|u| !u.is_empty()) {
            Some(user) => UserId::new(user),
            None => ctx.user.clone(),
        }
    }
}

fn parse_date(value: Option<&str>, field: &str) -> Result<Option<NaiveDate>, String> {
    value
        .map(|s| {
            s.trim()
                .parse::<NaiveDate>()
                .map_err(|_| format!("Invalid {field} '{s}'. Expected YYYY-MM-DD"))
        })
        .transpose()
}

#[tool_router]
impl TrainmapMcpServer {
    #[tool(
        name = "get_month_grid",
        description = "Get the 6x7 training heatmap grid for a month (Sunday-first weeks). Each cell has the date, minutes trained, whether it belongs to the month, and an intensity level from NONE to FULL."
    )]
    async fn get_month_grid(
        &self,
        Parameters(req): Parameters<GetMonthGridRequest>,
    ) -> Result<Json<MonthGridResponse>, String> {
        let ctx = self.context().map_err(|e| e.to_string())?;
        let month = match req.month.as_deref() {
            Some(month) => month.parse::<YearMonth>().map_err(|e| format!("{e:#}"))?,
            None => ctx.current_month(),
        };
        let user = Self::subject(&ctx, req.user.as_deref());
        let grid = ctx.grid_for(&user, month).map_err(|e| format!("{e:#}"))?;

        Ok(Json(MonthGridResponse::new(user.as_str(), &grid)))
    }

    #[tool(
        name = "get_daily_minutes",
        description = "Get minutes trained per calendar day, most recent first. Can filter by user, date range, or limit to recent days."
    )]
    async fn get_daily_minutes(
        &self,
        Parameters(req): Parameters<GetDailyMinutesRequest>,
    ) -> Result<Json<DailyMinutesResponse>, String> {
        let start = parse_date(req.start_date.as_deref(), "start_date")?;
        let end = parse_date(req.end_date.as_deref(), "end_date")?;

        let ctx = self.context().map_err(|e| e.to_string())?;
        let user = Self::subject(&ctx, req.user.as_deref());
        let daily = ctx.daily_minutes_for(&user).map_err(|e| format!("{e:#}"))?;

        let mut results: Vec<DailyMinutesEntry> = daily
            .iter()
            .rev()
            .filter(|(date, _)| start.is_none_or(|s| *date >= s))
            .filter(|(date, _)| end.is_none_or(|e| *date <= e))
            .map(|(date, minutes)| DailyMinutesEntry::new(date, minutes))
            .collect();

        if let Some(limit) = req.limit {
            results.truncate(limit);
        }

        let total_minutes = results.iter().map(|r| u64::from(r.minutes)).sum();
        Ok(Json(DailyMinutesResponse {
            user: user.to_string(),
            results,
            total_minutes,
        }))
    }

    #[tool(
        name = "start_training",
        description = "Start a training session for the configured user now. Returns the new session id."
    )]
    async fn start_training(
        &self,
        Parameters(_req): Parameters<StartTrainingRequest>,
    ) -> Result<Json<StartTrainingResponse>, String> {
        let ctx = self.context().map_err(|e| e.to_string())?;
        let now = crate::store::now_millis();
        let session_id = ctx
            .store
            .start_training_at(&ctx.user, now)
            .map_err(|e| format!("{e:#}"))?;

        Ok(Json(StartTrainingResponse {
            session_id: session_id.to_string(),
            start_time: format_timestamp(&now),
        }))
    }

    #[tool(
        name = "finish_training",
        description = "Finish a training session for the configured user now. Without a session id, finishes the most recent unfinished session."
    )]
    async fn finish_training(
        &self,
        Parameters(req): Parameters<FinishTrainingRequest>,
    ) -> Result<Json<FinishTrainingResponse>, String> {
        let ctx = self.context().map_err(|e| e.to_string())?;
        let session_id = match req.session_id.filter(|s| !s.trim().is_empty()) {
            Some(id) => SessionId(id.trim().to_string()),
            None => ctx
                .store
                .active_session(&ctx.user)
                .map_err(|e| format!("{e:#}"))?
                .map(|s| s.id)
                .ok_or_else(|| "No training in progress".to_string())?,
        };

        let now = crate::store::now_millis();
        ctx.store
            .finish_training_at(&ctx.user, &session_id, now)
            .map_err(|e| format!("{e:#}"))?;

        let duration_minutes = ctx
            .store
            .list_sessions(&ctx.user)
            .map_err(|e| format!("{e:#}"))?
            .into_iter()
            .find(|s| s.id == session_id)
            .and_then(|s| s.duration_minutes())
            .unwrap_or(0);

        Ok(Json(FinishTrainingResponse {
            session_id: session_id.to_string(),
            end_time: format_timestamp(&now),
            duration_minutes,
        }))
    }

    #[tool(
        name = "list_following",
        description = "List the users the configured user follows, in follow order. Users without a profile are omitted."
    )]
    async fn list_following(
        &self,
        Parameters(_req): Parameters<ListFollowingRequest>,
    ) -> Result<Json<FollowingResponse>, String> {
        let ctx = self.context().map_err(|e| e.to_string())?;
        let carousel = ctx.carousel().map_err(|e| format!("{e:#}"))?;

        Ok(Json(FollowingResponse {
            users: carousel.entries().iter().map(FollowingEntry::from).collect(),
        }))
    }
}

#[tool_handler]
impl ServerHandler for TrainmapMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: "trainmap".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some("Trainmap Training Heatmap".to_string()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Trainmap MCP Server - training session log and monthly heatmaps. \
                 Start and finish sessions, read month grids and daily minutes, list followed users."
                    .to_string(),
            ),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            resources: vec![
                RawResource::new(resource_uris::TODAY, "Today's Training".to_string())
                    .no_annotation(),
            ],
            next_cursor: None,
            meta: None,
        })
    }

    async fn read_resource(
        &self,
        ReadResourceRequestParam { uri }: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        match uri.as_str() {
            resource_uris::TODAY => {
                let content = self.today_summary()?;
                Ok(ReadResourceResult {
                    contents: vec![ResourceContents::text(content, uri)],
                })
            }
            _ => Err(McpError::resource_not_found(
                "resource_not_found",
                Some(rmcp::serde_json::json!({ "uri": uri })),
            )),
        }
    }
}

impl TrainmapMcpServer {
    fn today_summary(&self) -> Result<String, McpError> {
        let ctx = self.context()?;
        let internal = |e: anyhow::Error| McpError::internal_error(format!("{e:#}"), None);

        let today = calendar::today(ctx.tz);
        let minutes = ctx.daily_minutes_for(&ctx.user).map_err(internal)?.minutes_on(today);
        let mut summary = format!(
            "Date: {today}\nUser: {}\nTrained: {}\nIntensity: {}",
            ctx.user,
            format_minutes(u64::from(minutes)),
            Intensity::from_minutes(minutes)
        );
        if let Some(active) = ctx.store.active_session(&ctx.user).map_err(internal)? {
            summary.push_str(&format!(
                "\nIn progress since: {}",
                format_timestamp(&active.start_time)
            ));
        }
        Ok(summary)
    }
}

/// Run the MCP server with stdio transport
pub async fn run_mcp_server() -> anyhow::Result<()> {
    use rmcp::transport::stdio;

    let server = TrainmapMcpServer::new();
    let service = server.serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}
