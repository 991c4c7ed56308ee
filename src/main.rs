use anyhow::Context;
use clap::Parser;
use repo_pulse::core::ConfigProvider;
use repo_pulse::utils::error::ErrorCategory;
use repo_pulse::utils::{logger, validation::Validate};
use repo_pulse::{CliConfig, Dashboard, PulseError, TomlConfig};
use std::io::BufRead;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::time::Instant;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting repo-pulse");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    match cli.config.clone() {
        Some(path) => {
            let config = TomlConfig::from_file(&path)
                .with_context(|| format!("failed to load config file {}", path.display()))?;
            tracing::info!("📄 Loaded settings from {}", path.display());
            run(config).await
        }
        None => run(cli).await,
    }
}

async fn run<C: ConfigProvider + Validate>(config: C) -> anyhow::Result<()> {
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let dashboard = Dashboard::from_config(&config).context("failed to build the HTTP client")?;
    let mut events = dashboard.subscribe();

    tracing::info!(
        "⏱️ Counter ticks every {:?} ({} mode)",
        config.tick_interval(),
        dashboard.counter_sync()
    );
    if !config.offline() {
        tracing::info!("🌐 Repository endpoint: {}", config.api_endpoint());
    }
    println!("Commands: [m] run mutation, [r] refresh repository, [q] quit");

    dashboard.start();

    let mut commands = spawn_command_reader();
    let mut input_open = true;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let deadline = wait_for_deadline(config.run_for().map(|d| Instant::now() + d));
    tokio::pin!(deadline);

    let mut last_line = String::new();

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("Received Ctrl-C, shutting down");
                break;
            }
            _ = &mut deadline => {
                tracing::info!("Run time elapsed, shutting down");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => {
                    tracing::debug!("Cache event: {:?}", event);
                    render(&dashboard, &mut last_line);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Status view skipped {} cache events", skipped);
                    render(&dashboard, &mut last_line);
                }
                Err(RecvError::Closed) => break,
            },
            command = commands.recv(), if input_open => match command {
                Some(command) => {
                    if !handle_command(&dashboard, command.trim()) {
                        break;
                    }
                }
                None => {
                    tracing::debug!("stdin closed, commands disabled");
                    input_open = false;
                }
            },
        }
    }

    dashboard.shutdown();
    if let Some(exit_code) = report_final_state(&dashboard) {
        std::process::exit(exit_code);
    }
    Ok(())
}

/// 用獨立執行緒讀 stdin，結束時不會卡住 runtime
fn spawn_command_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to read command: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

/// 回傳 false 代表要結束
fn handle_command(dashboard: &Dashboard, command: &str) -> bool {
    match command {
        "q" | "quit" => return false,
        "m" | "mutate" => {
            let dashboard = dashboard.clone();
            tokio::spawn(async move {
                tracing::info!("✏️ Running repository mutation");
                match dashboard.mutate_repo().await {
                    Ok(()) => tracing::info!("✅ Mutation finished, refreshing repository data"),
                    Err(e) => tracing::error!("❌ Mutation failed: {}", e),
                }
            });
        }
        "r" | "refresh" => {
            dashboard.refresh_repo();
        }
        "" => {}
        other => println!("Unknown command '{}'. Use m, r or q.", other),
    }
    true
}

fn render(dashboard: &Dashboard, last_line: &mut String) {
    let line = dashboard.snapshot().to_string();
    if line != *last_line {
        println!("{}", line);
        *last_line = line;
    }
}

/// 最後一次抓取失敗時回傳對應的退出碼
fn report_final_state(dashboard: &Dashboard) -> Option<i32> {
    tracing::info!(
        "Counter stopped at {}",
        dashboard.counter_service().get_value()
    );

    let err = dashboard.repo_data().error?;
    let err: &PulseError = &err;
    tracing::error!(
        "❌ Last repository fetch failed: {} (Category: {:?})",
        err,
        err.category()
    );
    tracing::error!("💡 Recovery suggestion: {}", err.recovery_suggestion());
    eprintln!("❌ {}", err.user_friendly_message());
    eprintln!("💡 {}", err.recovery_suggestion());

    let exit_code = match err.category() {
        ErrorCategory::Network => 2,
        ErrorCategory::Data => 3,
        ErrorCategory::Configuration => 1,
        ErrorCategory::Cache | ErrorCategory::System => 4,
    };
    Some(exit_code)
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
