//! Agent tool-call surface over stdio.
//!
//! Every tool is one [`TaskService`] call. The process writes the data files
//! directly; a running server picks the writes up through its file watch.

mod summary;

use control_tower_core::models::*;
use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars::JsonSchema,
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::service::{parse_status, TaskService};

pub use summary::TaskSummary;

const NO_SPEC: &str = "No spec exists for this task yet.";

#[derive(Clone)]
pub struct McpServer {
    service: TaskService,
    tool_router: ToolRouter<Self>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskIdRequest {
    #[schemars(description = "The task ID")]
    pub task_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[schemars(description = "Concise summary of the work")]
    pub title: String,
    #[schemars(description = "Detailed task description")]
    #[serde(default)]
    pub description: Option<String>,
    #[schemars(description = "GitHub repository URL")]
    #[serde(default)]
    pub github_repo: Option<String>,
    #[schemars(description = "Git branch name")]
    #[serde(default)]
    pub branch: Option<String>,
    #[schemars(description = "Topic label; classified from the title and description when omitted")]
    #[serde(default)]
    pub topic: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[schemars(description = "The task ID to update")]
    pub task_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[schemars(description = "One of: pending, in-progress, done, failed, blocked")]
    #[serde(default)]
    pub status: Option<String>,
    #[schemars(description = "Progress percentage 0-100")]
    #[serde(default)]
    pub progress: Option<u32>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub github_repo: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[schemars(description = "Pull request URL")]
    #[serde(default)]
    pub pr_url: Option<String>,
    #[schemars(description = "Files touched by the task; replaces the current list")]
    #[serde(default)]
    pub associated_files: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddSubtaskRequest {
    #[schemars(description = "Parent task ID")]
    pub task_id: String,
    #[schemars(description = "Subtask title")]
    pub title: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubtaskRequest {
    #[schemars(description = "Parent task ID")]
    pub task_id: String,
    #[schemars(description = "Subtask ID")]
    pub subtask_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[schemars(description = "One of: pending, in-progress, done, failed, blocked")]
    #[serde(default)]
    pub status: Option<String>,
    #[schemars(description = "Subtask progress 0-100")]
    #[serde(default)]
    pub progress: Option<u32>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogTaskRequest {
    #[schemars(description = "Task ID")]
    pub task_id: String,
    #[schemars(description = "Log message to append")]
    pub message: String,
    #[schemars(description = "Subtask ID to log against instead of the task")]
    #[serde(default)]
    pub subtask_id: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSpecRequest {
    #[schemars(description = "Task ID")]
    pub task_id: String,
    #[schemars(description = "Full Markdown content for the spec document")]
    pub content: String,
}

impl McpServer {
    pub fn new(service: TaskService) -> Self {
        Self {
            service,
            tool_router: Self::tool_router(),
        }
    }
}

/// Not-found is an answer the agent should read, not a protocol failure.
fn respond<T>(
    result: crate::error::Result<T>,
    render: impl FnOnce(T) -> Result<String, McpError>,
) -> Result<CallToolResult, McpError> {
    match result {
        Ok(value) => Ok(CallToolResult::success(vec![Content::text(render(value)?)])),
        Err(e @ ServiceError::NotFound { .. }) => {
            Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
        }
        Err(e @ ServiceError::Validation { .. }) => {
            Err(McpError::invalid_params(e.to_string(), None))
        }
        Err(e) => {
            tracing::error!(error = %e, "Tool call failed");
            Err(McpError::internal_error(e.to_string(), None))
        }
    }
}

fn pretty<T: Serialize>(value: &T) -> Result<String, McpError> {
    serde_json::to_string_pretty(value).map_err(|e| McpError::internal_error(e.to_string(), None))
}

fn status_arg(label: Option<String>) -> Result<Option<TaskStatus>, McpError> {
    label
        .map(|label| parse_status(&label))
        .transpose()
        .map_err(|e| McpError::invalid_params(e.to_string(), None))
}

#[tool_router]
impl McpServer {
    #[tool(description = "List all tasks with their status, progress, topic and done/total subtask counts")]
    async fn list_tasks(&self) -> Result<CallToolResult, McpError> {
        respond(self.service.list_tasks().await, |tasks| {
            let rows: Vec<TaskSummary> = tasks.iter().map(TaskSummary::from).collect();
            pretty(&rows)
        })
    }

    #[tool(description = "Get full details of a task, including subtasks and logs")]
    async fn get_task(
        &self,
        params: Parameters<TaskIdRequest>,
    ) -> Result<CallToolResult, McpError> {
        respond(self.service.get_task(&params.0.task_id).await, |task| pretty(&task))
    }

    #[tool(description = "Create a task to track a piece of work. Returns the created task with its ID")]
    async fn create_task(
        &self,
        params: Parameters<CreateTaskRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let input = CreateTaskInput {
            title: req.title,
            description: req.description,
            github_repo: req.github_repo,
            branch: req.branch,
            topic: req.topic.as_deref().map(Topic::parse),
        };
        respond(self.service.create_task(input).await, |task| {
            Ok(format!("Task created\n\n{}", pretty(&task)?))
        })
    }

    #[tool(description = "Update a task's fields: status, progress, description, topic, GitHub links, files")]
    async fn update_task(
        &self,
        params: Parameters<UpdateTaskRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let patch = TaskPatch {
            title: req.title,
            description: req.description,
            status: status_arg(req.status)?,
            progress: req.progress,
            topic: req.topic.as_deref().map(Topic::parse),
            github_repo: req.github_repo,
            branch: req.branch,
            pr_url: req.pr_url,
            associated_files: req.associated_files,
        };
        respond(self.service.update_task(&req.task_id, patch).await, |task| {
            Ok(format!("Task updated\n\n{}", pretty(&task)?))
        })
    }

    #[tool(description = "Add a subtask to a task")]
    async fn add_subtask(
        &self,
        params: Parameters<AddSubtaskRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        respond(self.service.add_subtask(&req.task_id, &req.title).await, |subtask| {
            Ok(format!("Subtask added\n\nID: {}\nTitle: {}", subtask.id, subtask.title))
        })
    }

    #[tool(description = "Update a subtask's title, status or progress. Recomputes the parent's progress")]
    async fn update_subtask(
        &self,
        params: Parameters<UpdateSubtaskRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let patch = SubtaskPatch {
            title: req.title,
            status: status_arg(req.status)?,
            progress: req.progress,
        };
        let result = match self.service.update_subtask(&req.task_id, &req.subtask_id, patch).await {
            Ok(_) => self.service.get_task(&req.task_id).await,
            Err(e) => Err(e),
        };
        respond(result, |task| {
            Ok(format!(
                "Subtask updated. Parent progress: {}% ({})",
                task.progress, task.status
            ))
        })
    }

    #[tool(description = "Append a log entry to a task, or to one of its subtasks")]
    async fn log_task(
        &self,
        params: Parameters<LogTaskRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let result = self
            .service
            .append_log(&req.task_id, &req.message, req.subtask_id.as_deref())
            .await;
        respond(result, |()| Ok(format!("Log entry added to task {}", req.task_id)))
    }

    #[tool(description = "Get the Markdown spec document for a task")]
    async fn get_spec(
        &self,
        params: Parameters<TaskIdRequest>,
    ) -> Result<CallToolResult, McpError> {
        respond(self.service.get_spec(&params.0.task_id).await, |spec| {
            Ok(if spec.is_empty() { NO_SPEC.to_string() } else { spec })
        })
    }

    #[tool(description = "Create or replace the Markdown spec document for a task")]
    async fn update_spec(
        &self,
        params: Parameters<UpdateSpecRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        respond(self.service.put_spec(&req.task_id, req.content).await, |()| {
            Ok(format!("Spec updated for task {}", req.task_id))
        })
    }

    #[tool(description = "Delete a task, its subtasks, logs and spec document permanently")]
    async fn delete_task(
        &self,
        params: Parameters<TaskIdRequest>,
    ) -> Result<CallToolResult, McpError> {
        let task_id = params.0.task_id;
        respond(self.service.delete_task(&task_id).await, |()| {
            Ok(format!("Task {} deleted", task_id))
        })
    }
}

#[tool_handler]
impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Control Tower task tracker. Create a task for each piece of work, break it into subtasks, \
                 log progress as you go and keep its spec document current."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

pub async fn run_stdio_server(service: TaskService) -> anyhow::Result<()> {
    use tokio::io::{stdin, stdout};

    tracing::info!(tasks_file = %service.store().path().display(), "Starting MCP server via stdio");

    let server = McpServer::new(service).serve((stdin(), stdout())).await?;

    let quit_reason = server.waiting().await?;
    tracing::info!("MCP server stopped: {:?}", quit_reason);

    Ok(())
}
