use anyhow::Context;
use chrono::Utc;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use digestbot::settings::{LogSettings, Settings};
use digestbot::DigestStore;

fn init_tracing(log: &LogSettings) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_writer, guard) = match &log.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "digestbot.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter);

    if log.json {
        registry
            .with(fmt::layer().json())
            .with(file_writer.map(|w| fmt::layer().json().with_writer(w)))
            .init();
    } else {
        registry
            .with(fmt::layer())
            .with(file_writer.map(|w| fmt::layer().with_ansi(false).with_writer(w)))
            .init();
    }

    guard
}

fn run(settings: &Settings) -> anyhow::Result<()> {
    let store = DigestStore::open(&settings.database_url, settings.pool_size)
        .context("Failed to open digest store")?;
    store.run_migrations()?;

    let now = Utc::now();

    if let Some(meeting) = &settings.meeting {
        for team in &settings.teams {
            store.schedule_meetings_from_cron(team, &meeting.cron, now, meeting.lookahead)?;
        }
    }

    for team in &settings.teams {
        let report = store.team_report(team, now)?;
        println!("{}\n", report);
    }

    info!("Reported on {} teams", settings.teams.len());

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let settings = Settings::new().context("Failed to load settings")?;
    let _guard = init_tracing(&settings.log);

    if let Err(e) = run(&settings) {
        error!("{:#}", e);
        return Err(e);
    }

    Ok(())
}
