pub mod admin;
pub mod auth;
pub mod context;
pub mod dates;
pub mod engineer;
pub mod output;
pub mod process;
pub mod queue;
pub mod sync_path;

use std::path::PathBuf;

use admin::{ApprovalCommand, CustomerCommand};
use anyhow::Result;
use auth::ThemeCommand;
use clap::{Parser, Subcommand};
use context::AppContext;
use engineer::{BreakArgs, CheckinArgs, CheckoutArgs, ShiftArgs};
use process::{kill_previous_servers, restart_sync_daemon, sync_executable};
use queue::QueueCommand;
use tracing::{info, level_filters::LevelFilter};

use crate::{
    sync::start_sync,
    utils::{
        dir::resolve_application_path,
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "fieldtrack", version, long_about = None)]
#[command(about = "Check-ins, shifts and breaks for field engineers", long_about = None)]
pub(crate) struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, global = true, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(
        long = "api-base",
        global = true,
        help = "Server address. Overrides the config file and FIELDTRACK_API_BASE"
    )]
    api_base: Option<String>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Log in and remember the session")]
    Login {
        #[arg(long, short)]
        email: String,
        #[arg(long, short)]
        password: String,
    },
    #[command(about = "Forget the session. A running check-in is kept")]
    Logout,
    #[command(about = "Show who is logged in")]
    Whoami,
    #[command(about = "Show or change the colour theme")]
    Theme {
        #[command(subcommand)]
        command: Option<ThemeCommand>,
    },
    #[command(about = "Browse and manage customers")]
    Customers {
        #[command(subcommand)]
        command: CustomerCommand,
    },
    #[command(about = "Check in at a customer site")]
    Checkin(CheckinArgs),
    #[command(about = "Check out of the running check-in")]
    Checkout(CheckoutArgs),
    #[command(about = "Show the running check-in and its timer")]
    Status {
        #[arg(long, short, help = "Keep the timer running until Ctrl-C")]
        watch: bool,
    },
    #[command(about = "Own check-ins, newest first")]
    History {
        #[arg(long, short, help = "Refresh every 20 seconds until Ctrl-C")]
        watch: bool,
    },
    #[command(about = "Request approval for a worked shift")]
    Shift(ShiftArgs),
    #[command(about = "Request approval for a break")]
    Break(BreakArgs),
    #[command(about = "Own shift and break requests")]
    Requests,
    #[command(about = "Review shift and break requests (admin)")]
    Approvals {
        #[command(subcommand)]
        command: ApprovalCommand,
    },
    #[command(about = "Check-ins of every employee or of one (admin)")]
    Checkins {
        #[arg(long, help = "Employee id")]
        employee: Option<u64>,
    },
    #[command(about = "Totals and recent activity (admin)")]
    Dashboard,
    #[command(about = "Check-ins per person this week (admin)")]
    Activity {
        #[arg(long, help = "Count from the check-in list instead of the server report")]
        from_checkins: bool,
    },
    #[command(about = "Submissions waiting to be delivered")]
    Queue {
        #[command(subcommand)]
        command: QueueCommand,
    },
    #[command(about = "Control the background sync daemon")]
    Sync {
        #[command(subcommand)]
        command: SyncCommand,
    },
}

#[derive(Subcommand, Debug)]
enum SyncCommand {
    #[command(about = "Starts the sync daemon, replacing a running one")]
    Init,
    #[command(about = "Stop currently running sync daemon")]
    Stop,
    #[command(
        about = "Run the sync loop directly in current console. Used for debugging"
    )]
    Serve,
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();
    let dir = resolve_application_path(args.dir)?;

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(CLI_PREFIX, &dir, logging_level, args.log)?;

    let context = AppContext::load(dir, args.api_base.clone()).await?;
    let user = context.session.user().await?;
    let api = context.api(user.as_ref())?;

    match args.commands {
        Commands::Login { email, password } => {
            auth::login(&context, &context.api(None)?, &email, &password).await
        }
        Commands::Logout => auth::logout(&context).await,
        Commands::Whoami => auth::whoami(&context).await,
        Commands::Theme { command } => auth::theme(&context, command).await,
        Commands::Customers { command } => admin::customers(&context, &api, command).await,
        Commands::Checkin(checkin) => engineer::checkin(&context, &api, checkin).await,
        Commands::Checkout(checkout) => engineer::checkout(&context, &api, checkout).await,
        Commands::Status { watch } => engineer::status(&context, &api, watch).await,
        Commands::History { watch } => engineer::history(&context, &api, watch).await,
        Commands::Shift(shift) => engineer::shift(&context, &api, shift).await,
        Commands::Break(request) => engineer::break_request(&context, &api, request).await,
        Commands::Requests => engineer::requests(&context, &api).await,
        Commands::Approvals { command } => admin::approvals(&context, &api, command).await,
        Commands::Checkins { employee } => admin::checkins(&context, &api, employee).await,
        Commands::Dashboard => admin::dashboard(&context, &api).await,
        Commands::Activity { from_checkins } => {
            admin::activity(&context, &api, from_checkins).await
        }
        Commands::Queue { command } => queue::queue(&context, &api, command).await,
        Commands::Sync { command } => match command {
            SyncCommand::Init => {
                restart_sync_daemon(&context.dir, args.api_base.as_deref())?;
                println!("Sync daemon started");
                Ok(())
            }
            SyncCommand::Stop => {
                let stopped = kill_previous_servers(&sync_executable()?)?;
                info!("Stopped {stopped} sync daemons");
                println!("Stopped {stopped} sync daemons");
                Ok(())
            }
            SyncCommand::Serve => start_sync(context.dir, context.config).await,
        },
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Args, Commands, SyncCommand};

    #[test]
    fn global_options_follow_the_subcommand() {
        let args = Args::try_parse_from([
            "fieldtrack",
            "status",
            "--watch",
            "--dir",
            "/tmp/ft",
            "--api-base",
            "http://localhost:9000",
        ])
        .unwrap();
        assert!(matches!(args.commands, Commands::Status { watch: true }));
        assert_eq!(args.dir.unwrap().to_str(), Some("/tmp/ft"));
        assert_eq!(args.api_base.as_deref(), Some("http://localhost:9000"));
    }

    #[test]
    fn log_flag_is_accepted_after_the_subcommand() {
        let args = Args::try_parse_from(["fieldtrack", "status", "--log"]).unwrap();
        assert!(args.log);
        let args = Args::try_parse_from(["fieldtrack", "--log", "whoami"]).unwrap();
        assert!(args.log);
    }

    #[test]
    fn sync_subcommands_parse() {
        let args = Args::try_parse_from(["fieldtrack", "sync", "stop"]).unwrap();
        assert!(matches!(
            args.commands,
            Commands::Sync {
                command: SyncCommand::Stop
            }
        ));
        assert!(Args::try_parse_from(["fieldtrack", "sync"]).is_err());
    }

    #[test]
    fn command_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
