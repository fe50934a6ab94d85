use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use testnet_supervisor::api;
use testnet_supervisor::config::ClusterContext;
use testnet_supervisor::dispatch::{CleanMode, Dispatcher, NodeAction};
use testnet_supervisor::error::SupervisorError;
use testnet_supervisor::node::NodeCtl;
use testnet_supervisor::shutdown;

#[derive(Parser, Debug)]
#[command(name = "testnet-supervisor")]
#[command(version)]
#[command(about = "Supervisor and node control for disposable test clusters")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the supervisor with its HTTP control API
    Serve(ServeArgs),

    /// Apply one action to one node (supervisor jobs run this subcommand)
    Node(NodeArgs),
}

#[derive(Parser, Debug)]
struct ServeArgs {
    /// Directory holding cluster and per-node configuration
    #[arg(long, default_value = ".")]
    conf_dir: PathBuf,

    /// Directory for runtime state (defaults to the configuration directory)
    #[arg(long)]
    private_dir: Option<PathBuf>,

    /// Address for the HTTP control API
    #[arg(long, default_value = "127.0.0.1:7070")]
    listen: SocketAddr,

    /// Terminate a superseded job's worker instead of waiting for it
    #[arg(long)]
    kill_jobs: bool,
}

#[derive(Parser, Debug)]
struct NodeArgs {
    /// Directory holding cluster and per-node configuration
    #[arg(short = 'd', long, default_value = ".")]
    conf_dir: PathBuf,

    /// Directory for runtime state (defaults to the configuration directory)
    #[arg(short = 'p', long)]
    private_dir: Option<PathBuf>,

    /// Name of the node to operate on
    node: String,

    /// Action to apply: start, stop, restart or lead
    action: String,

    /// With stop or restart, also remove the node's data directory
    #[arg(short = 'c', long, conflicts_with = "clean_all")]
    clean_data: bool,

    /// With stop or restart, remove all node state including its private
    /// directory
    #[arg(short = 'C', long)]
    clean_all: bool,
}

impl NodeArgs {
    fn clean_mode(&self) -> Option<CleanMode> {
        if self.clean_all {
            Some(CleanMode::All)
        } else if self.clean_data {
            Some(CleanMode::Data)
        } else {
            None
        }
    }
}

async fn run_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = ClusterContext::new(args.conf_dir).with_kill_jobs(args.kill_jobs);
    if let Some(private_dir) = args.private_dir {
        ctx = ctx.with_private_dir(private_dir);
    }

    tracing::info!(
        conf_dir = %ctx.conf_dir.display(),
        private_dir = %ctx.private_dir.display(),
        kill_jobs = ctx.kill_jobs,
        "Starting testnet supervisor"
    );

    let shutdown = shutdown::install_shutdown_handler()?;
    let dispatcher = Dispatcher::new(&ctx)?.with_shutdown_token(shutdown.clone());
    api::serve(dispatcher, args.listen, shutdown).await?;

    Ok(())
}

fn run_node(args: NodeArgs) -> testnet_supervisor::Result<()> {
    let action: NodeAction = args.action.parse()?;
    let clean = args.clean_mode();
    if clean.is_some() && !matches!(action, NodeAction::Stop | NodeAction::Restart) {
        return Err(SupervisorError::InvalidRequest(format!(
            "clean flags do not apply to {action}"
        )));
    }

    let mut ctx = ClusterContext::new(args.conf_dir);
    if let Some(private_dir) = args.private_dir {
        ctx = ctx.with_private_dir(private_dir);
    }

    let ctl = NodeCtl::new(&ctx, &args.node);
    match action {
        NodeAction::Start => ctl.start(),
        NodeAction::Stop => ctl.stop(clean),
        NodeAction::Restart => ctl.restart(clean),
        NodeAction::Lead => ctl.make_leader(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Serve(serve_args) => {
            run_serve(serve_args).await?;
        }
        Commands::Node(node_args) => {
            if let Err(err) = run_node(node_args) {
                eprintln!("ERROR: {err}");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
