use clap::Parser;
use tokio::sync::mpsc;

use yt_grab::cli::Cli;
use yt_grab::downloader::{
    DownloaderConfig, JobEvent, JobRunner, Orchestrator, Severity, ToolManager,
};
use yt_grab::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    if cli.check_tools {
        print_tools();
        return Ok(());
    }

    let config = cli.apply_to(DownloaderConfig::from_env());
    let job = cli.job()?;
    let orchestrator = match Orchestrator::from_config(&config) {
        Ok(orchestrator) => orchestrator,
        Err(e) => anyhow::bail!("Failed to initialize downloader: {}", e),
    };

    println!("Saving to {}", job.output_dir().display());

    let runner = JobRunner::new(orchestrator);
    let (tx, mut rx) = mpsc::unbounded_channel::<JobEvent>();
    let handle = runner.submit(job, tx)?;

    // closes once the job task drops its sender
    while let Some(event) = rx.recv().await {
        match event.severity {
            Severity::Info => println!("{}", event),
            Severity::Error => eprintln!("{}", event),
        }
    }

    let report = handle.wait().await?;
    println!(
        "Finished: {} downloaded, {} failed",
        report.succeeded(),
        report.failed()
    );

    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_tools() {
    for tool in ToolManager::new().get_all_tools() {
        let path = tool
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        if tool.is_available {
            println!(
                "[OK] {} {} ({})",
                tool.name,
                tool.version.as_deref().unwrap_or(""),
                path
            );
        } else {
            println!("[MISSING] {} ({})", tool.name, path);
        }
    }
}
