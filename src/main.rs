use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use control_tower::api::{self, AppState, Health};
use control_tower::config::{DataArgs, ServeArgs, ServerConfig, DEFAULT_PORT};
use control_tower::live::{self, SessionBroadcaster};
use control_tower::mcp;
use control_tower::service::{parse_status, TaskService};
use control_tower_core::models::{CreateTaskInput, SubtaskPatch, TaskPatch, Topic};

#[derive(Parser)]
#[command(name = "ctower")]
#[command(about = "Task tracking dashboard for AI-assisted development")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(flatten)]
    data: DataArgs,

    /// Used when no subcommand is given
    #[command(flatten)]
    serve: ServeArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API and live socket (default)
    Serve(ServeArgs),
    /// Start the MCP server via stdio
    Mcp,
    /// Check whether a server is running
    Status {
        #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Create a task
    Create(CreateArgs),
    /// Update a task, add a subtask to it, or update one of its subtasks
    Update(UpdateArgs),
    /// Append a log entry to a task or subtask
    Log {
        task_id: String,
        message: String,
        #[arg(long)]
        subtask_id: Option<String>,
    },
}

#[derive(Args)]
struct CreateArgs {
    title: String,
    #[arg(short, long)]
    description: Option<String>,
    #[arg(long)]
    repo: Option<String>,
    #[arg(long)]
    branch: Option<String>,
    /// Classified from the title and description when omitted
    #[arg(long)]
    topic: Option<String>,
}

#[derive(Args)]
struct UpdateArgs {
    task_id: String,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    /// pending, in-progress, done, failed or blocked
    #[arg(long)]
    status: Option<String>,
    #[arg(long)]
    progress: Option<u32>,
    #[arg(long)]
    topic: Option<String>,
    #[arg(long)]
    pr_url: Option<String>,
    /// Add a subtask with this title instead of updating the task
    #[arg(long, conflicts_with = "subtask_id")]
    add_subtask: Option<String>,
    /// Apply title/status/progress to this subtask instead of the task
    #[arg(long)]
    subtask_id: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout belongs to the MCP protocol, so logs always go to stderr.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| {
                "control_tower=debug,control_tower_core=info,tower_http=debug".into()
            }),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve(args)) => serve(ServerConfig::new(&args, &cli.data)).await?,
        None => serve(ServerConfig::new(&cli.serve, &cli.data)).await?,
        Some(Commands::Mcp) => {
            mcp::run_stdio_server(TaskService::open(&cli.data.paths())).await?;
        }
        Some(Commands::Status { port }) => status(port).await?,
        Some(Commands::Create(args)) => {
            let service = TaskService::open(&cli.data.paths());
            let task = service
                .create_task(CreateTaskInput {
                    title: args.title,
                    description: args.description,
                    github_repo: args.repo,
                    branch: args.branch,
                    topic: args.topic.as_deref().map(Topic::parse),
                })
                .await?;
            println!("Created task {} ({}): {}", task.id, task.topic, task.title);
        }
        Some(Commands::Update(args)) => update(TaskService::open(&cli.data.paths()), args).await?,
        Some(Commands::Log {
            task_id,
            message,
            subtask_id,
        }) => {
            let service = TaskService::open(&cli.data.paths());
            service
                .append_log(&task_id, &message, subtask_id.as_deref())
                .await?;
            println!("Logged to task {}", task_id);
        }
    }

    Ok(())
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let service = TaskService::open(&config.paths);

    if config.backfill_topics {
        match service.backfill_topics().await {
            Ok(0) => {}
            Ok(count) => tracing::info!(count, "Classified tasks without a topic"),
            Err(e) => tracing::warn!(error = %e, "Topic backfill failed; continuing"),
        }
    }

    let broadcaster = SessionBroadcaster::default();
    let changes = live::start(service.store().clone(), broadcaster.clone(), config.notifier.clone());
    let live_updates = changes.is_some();
    let service = match changes {
        Some(handle) => service.with_change_handle(handle),
        None => service,
    };

    let mut app = api::create_router(AppState::new(service, broadcaster, live_updates));
    if let Some(dir) = &config.static_dir {
        tracing::info!(dir = %dir.display(), "Serving dashboard files");
        app = api::with_static_files(app, dir);
    }

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("cannot bind {}", config.addr))?;
    tracing::info!(
        tasks_file = %config.paths.tasks_file.display(),
        "Control Tower listening on http://{}",
        config.addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Cannot listen for shutdown signal");
            }
        })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn status(port: u16) -> anyhow::Result<()> {
    let url = format!("http://127.0.0.1:{}/api/health", port);
    let health: Health = reqwest::get(&url)
        .await
        .with_context(|| format!("no server answering on port {}", port))?
        .error_for_status()?
        .json()
        .await?;

    println!(
        "Control Tower is {} on port {} ({} live sessions, live updates {})",
        health.status,
        port,
        health.sessions,
        if health.live_updates { "on" } else { "off" }
    );
    Ok(())
}

async fn update(service: TaskService, args: UpdateArgs) -> anyhow::Result<()> {
    let status = args.status.as_deref().map(parse_status).transpose()?;

    if let Some(title) = args.add_subtask {
        let subtask = service.add_subtask(&args.task_id, &title).await?;
        println!("Added subtask {} to task {}", subtask.id, args.task_id);
        return Ok(());
    }

    if let Some(subtask_id) = args.subtask_id {
        let patch = SubtaskPatch {
            title: args.title,
            status,
            progress: args.progress,
        };
        service.update_subtask(&args.task_id, &subtask_id, patch).await?;
        let task = service.get_task(&args.task_id).await?;
        println!(
            "Updated subtask {}; task {} is {} at {}%",
            subtask_id, task.id, task.status, task.progress
        );
        return Ok(());
    }

    let patch = TaskPatch {
        title: args.title,
        description: args.description,
        status,
        progress: args.progress,
        topic: args.topic.as_deref().map(Topic::parse),
        pr_url: args.pr_url,
        ..Default::default()
    };
    let task = service.update_task(&args.task_id, patch).await?;
    println!("Updated task {}: {} at {}%", task.id, task.status, task.progress);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn default_serve_reads_the_environment() {
        std::env::set_var("PORT", "5123");
        std::env::set_var("TASK_MANAGER_STATIC_DIR", "/srv/dashboard");
        let bare = Cli::try_parse_from(["ctower"]).unwrap();
        let explicit = Cli::try_parse_from(["ctower", "serve"]).unwrap();
        std::env::remove_var("PORT");
        std::env::remove_var("TASK_MANAGER_STATIC_DIR");

        assert!(bare.command.is_none());
        assert_eq!(bare.serve.port, 5123);
        assert_eq!(bare.serve.static_dir.as_deref(), Some(std::path::Path::new("/srv/dashboard")));

        let Some(Commands::Serve(args)) = explicit.command else {
            panic!("expected the serve subcommand");
        };
        assert_eq!(args.port, bare.serve.port);
        assert_eq!(args.static_dir, bare.serve.static_dir);
    }

    #[test]
    fn flags_work_without_the_serve_subcommand() {
        let cli = Cli::try_parse_from(["ctower", "--port", "6000", "--no-backfill"]).unwrap();
        assert_eq!(cli.serve.port, 6000);
        assert!(cli.serve.no_backfill);
    }
}
