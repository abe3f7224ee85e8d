//! apcctl: switch, cut or power-cycle APC PDU outlets from the command line.
//!
//! # Usage
//!
//! ```bash
//! apcctl 10.0.0.5 --off 3
//! APC_HOST=pdu1 APC_PASSWORD=secret apcctl --reboot '*'
//! apcctl pdu1 --debug
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use log::{info, warn};

use apcctl::lock::{DEFAULT_LOCK_ATTEMPTS, DEFAULT_LOCK_PATH};
use apcctl::transport::{DEFAULT_PASSWORD, DEFAULT_USERNAME};
use apcctl::{ControllerBuilder, Notification, Notifier, Pacing, PowerAction, TransportKind};

#[derive(Parser, Debug)]
#[command(name = "apcctl", version, about = "Control APC PDU outlets via the telnet/SSH menu")]
struct Cli {
    /// PDU hostname or IP address
    #[arg(env = "APC_HOST")]
    host: Option<String>,

    /// Menu username
    #[arg(short, long, env = "APC_USER", default_value = DEFAULT_USERNAME)]
    user: String,

    /// Menu password
    #[arg(
        long,
        env = "APC_PASSWORD",
        default_value = DEFAULT_PASSWORD,
        hide_env_values = true,
        hide_default_value = true
    )]
    password: String,

    /// Port (default: 23 for telnet, 22 for SSH)
    #[arg(long)]
    port: Option<u16>,

    /// Transport protocol
    #[arg(long, default_value_t = TransportKind::Telnet, value_name = "telnet|ssh")]
    transport: TransportKind,

    /// Seconds to wait for each menu screen
    #[arg(long, default_value_t = 10, value_name = "SECS")]
    timeout: u64,

    /// Lock file serializing access to the PDU
    #[arg(long, env = "APC_LOCK_PATH", default_value = DEFAULT_LOCK_PATH)]
    lock_path: PathBuf,

    /// Attempts, one second apart, to take the lock
    #[arg(long, default_value_t = DEFAULT_LOCK_ATTEMPTS, value_name = "ATTEMPTS")]
    lock_timeout: u32,

    /// Milliseconds between menu keystrokes (0 sends them back to back)
    #[arg(long, default_value_t = 0, value_name = "MS")]
    key_delay: u64,

    /// Print notifications as JSON lines
    #[arg(long)]
    json: bool,

    /// Log protocol details
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Log warnings and errors only
    #[arg(short, long)]
    quiet: bool,

    /// Log in and hand the menu over to this terminal
    #[arg(long)]
    debug: bool,

    /// Power-cycle an outlet (`*`, `+` or `9` for all)
    #[arg(long, value_name = "OUTLET")]
    reboot: Option<String>,

    /// Switch an outlet on
    #[arg(long, value_name = "OUTLET")]
    on: Option<String>,

    /// Switch an outlet off
    #[arg(long, value_name = "OUTLET")]
    off: Option<String>,
}

/// What the invocation asked for.
#[derive(Debug, PartialEq, Eq)]
enum Request<'a> {
    Debug,
    Power(PowerAction, &'a str),
}

impl Cli {
    /// The requested operation. When several are given, debug wins, then
    /// reboot, on and off.
    fn request(&self) -> Option<Request<'_>> {
        if self.debug {
            return Some(Request::Debug);
        }
        [
            (PowerAction::Reboot, &self.reboot),
            (PowerAction::On, &self.on),
            (PowerAction::Off, &self.off),
        ]
        .into_iter()
        .find_map(|(action, outlet)| outlet.as_deref().map(|o| Request::Power(action, o)))
    }

    fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }

    fn pacing(&self) -> Pacing {
        match self.key_delay {
            0 => Pacing::Blind,
            ms => Pacing::Delay(Duration::from_millis(ms)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("no PDU host given (pass HOST or set APC_HOST)")]
    MissingHost,

    #[error("nothing to do: pass --debug, --reboot, --on or --off")]
    MissingCommand,

    #[error(transparent)]
    Apc(#[from] apcctl::Error),
}

/// Prints each completed command to stdout.
struct ConsoleNotifier {
    json: bool,
}

impl ConsoleNotifier {
    fn render(&self, notification: &Notification) -> String {
        if !self.json {
            return notification.to_string();
        }
        serde_json::to_string(notification).unwrap_or_else(|e| {
            warn!("cannot encode notification as JSON: {}", e);
            notification.to_string()
        })
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: &Notification) {
        println!("{}", self.render(notification));
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("error: cannot start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(&cli));
    // Blocking stdin reads from --debug cannot be cancelled
    runtime.shutdown_background();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<(), CliError> {
    let request = cli.request().ok_or(CliError::MissingCommand)?;
    let host = cli.host.as_deref().ok_or(CliError::MissingHost)?;

    let mut builder = ControllerBuilder::new(host)
        .username(&cli.user)
        .password(&cli.password)
        .transport(cli.transport)
        .timeout(Duration::from_secs(cli.timeout))
        .lock_path(&cli.lock_path)
        .lock_attempts(cli.lock_timeout)
        .pacing(cli.pacing())
        .notifier(ConsoleNotifier { json: cli.json });
    if let Some(port) = cli.port {
        builder = builder.port(port);
    }
    let pdu = builder.build()?;

    match request {
        Request::Power(action, outlet) => {
            pdu.run(action, outlet).await?;
        }
        Request::Debug => {
            let mut session = pdu.interactive_debug().await?;
            if let Some(version) = session.firmware() {
                info!(
                    "firmware {} ({} menu), type menu keys followed by Enter",
                    version,
                    version.dialect()
                );
            }
            let result = session
                .passthrough(tokio::io::stdin(), &mut tokio::io::stdout())
                .await;
            session.close().await;
            result?;
        }
    }
    Ok(())
}
