use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use webscout_agent::{Agent, AgentConfig, BrowserProvider, Task};
use webscout_cdp::{CdpBrowser, CdpConfig};
use webscout_cli::config::AppConfig;
use webscout_cli::llm::OpenAiProvider;
use webscout_research::{DeepResearcher, ResearchConfig};

#[derive(Parser)]
#[command(name = "webscout", version, about = "LLM browser agent and deep-research pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single browser task to completion.
    Run {
        /// Natural-language task instruction.
        task: String,

        /// Extra free-form context for the agent.
        #[arg(long)]
        add_info: Option<String>,

        /// Maximum loop steps.
        #[arg(long, default_value_t = 25)]
        max_steps: u32,

        /// Maximum actions per planning call.
        #[arg(long, default_value_t = 3)]
        max_actions_per_step: u32,

        /// Attach screenshots to the page state.
        #[arg(long)]
        vision: bool,

        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Research a topic across multiple search rounds and write a report.
    Research {
        /// Research task, e.g. "Write a brief report about AI agents".
        task: String,

        /// Maximum outer-loop rounds.
        #[arg(long, default_value_t = 3)]
        max_search_iterations: u32,

        /// Maximum queries planned per round.
        #[arg(long, default_value_t = 3)]
        max_query_num: usize,

        /// Report output directory (overrides WEBSCOUT_OUTPUT_DIR).
        #[arg(long)]
        output_dir: Option<PathBuf>,

        #[command(flatten)]
        browser: BrowserArgs,
    },
}

#[derive(Args)]
struct BrowserArgs {
    /// Attach to a running Chrome via its CDP endpoint,
    /// e.g. http://localhost:9222.
    #[arg(long)]
    cdp_url: Option<String>,

    /// Launch with a visible window instead of headless.
    #[arg(long)]
    headful: bool,

    /// Disable the browser sandbox (container environments).
    #[arg(long)]
    disable_security: bool,
}

impl BrowserArgs {
    fn to_config(&self) -> CdpConfig {
        let mut config = CdpConfig::default()
            .headless(!self.headful)
            .disable_security(self.disable_security);
        if let Some(url) = &self.cdp_url {
            config = config.with_cdp_url(url);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("webscout=info")),
        )
        .init();

    let cli = Cli::parse();
    let app = AppConfig::from_env();

    // Cooperative stop: first ctrl-c cancels between steps/rounds, work
    // in flight finishes its current step.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("stop requested; finishing current step");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Commands::Run {
            task,
            add_info,
            max_steps,
            max_actions_per_step,
            vision,
            browser,
        } => {
            let llm = Arc::new(OpenAiProvider::new(app.llm.clone()));
            let cdp = CdpBrowser::new(browser.to_config())
                .await
                .context("browser setup failed")?;

            let mut agent_task = Task::new(task);
            if let Some(info) = add_info {
                agent_task = agent_task.with_supplementary(info);
            }
            let config = AgentConfig::default()
                .max_steps(max_steps)
                .actions_per_step(max_actions_per_step)
                .vision(vision);

            let agent = Agent::new(agent_task, llm, config);
            let session = cdp.new_session().await.context("cannot open page")?;
            let result = agent.run(session.as_ref(), &cancel).await;
            if let Err(err) = session.close().await {
                warn!(%err, "session close failed");
            }
            cdp.shutdown().await;

            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "status": result.status,
                    "steps_taken": result.steps_taken,
                    "final_result": result.final_result(),
                    "errors": result.errors(),
                    "total_time_ms": result.total_time_ms,
                }))?
            );
        }

        Commands::Research {
            task,
            max_search_iterations,
            max_query_num,
            output_dir,
            browser,
        } => {
            let llm = Arc::new(OpenAiProvider::new(app.llm.clone()));
            let cdp = Arc::new(
                CdpBrowser::new(browser.to_config())
                    .await
                    .context("browser setup failed")?,
            );

            let config = ResearchConfig::default()
                .iterations(max_search_iterations)
                .queries_per_round(max_query_num)
                .output_dir(output_dir.unwrap_or(app.output_dir));

            let provider: Arc<dyn BrowserProvider> = cdp.clone();
            let researcher = DeepResearcher::new(llm, provider, config);
            let outcome = researcher.research(&task, &cancel).await;
            cdp.shutdown().await;

            let report = outcome.context("research failed")?;
            info!(path = %report.path.display(), "research complete");
            println!("Report written to: {}", report.path.display());
            println!("\n{}", report.text);
        }
    }

    Ok(())
}
