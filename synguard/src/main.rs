use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use synguard_lib::blacklist::IpsetBackend;
use synguard_lib::clock::SystemClock;
use synguard_lib::probe::ProcNetTcpProbe;
use synguard_lib::supervisor::Supervisor;
use tracing_subscriber::EnvFilter;

/// Host-based TCP SYN-flood detector and mitigation daemon.
#[derive(Parser, Debug)]
#[command(name = "synguard", version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, env = "SYNGUARD_CONFIG", default_value = "/etc/synguard/config.toml")]
    config: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let clock = Arc::new(SystemClock::new());

    let supervisor = match Supervisor::bootstrap(
        &cli.config,
        clock,
        |config| Arc::new(IpsetBackend::new(config.enforcement.ipset_name.clone())) as Arc<_>,
        |_config| Arc::new(ProcNetTcpProbe::default()) as Arc<_>,
    ) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to start synguard");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = supervisor.run() {
        tracing::error!(error = %e, "synguard exited with error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
