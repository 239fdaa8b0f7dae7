mod cache;
mod config;
mod error;
mod integrations;
mod sync;

use std::process::ExitCode;

use chrono::Utc;

use crate::cache::SyncCache;
use crate::config::Config;
use crate::error::SyncError;
use crate::integrations::habitica::HabiticaClient;
use crate::integrations::rtm::{BrowserPrompt, RtmClient};
use crate::sync::{AliasSets, apply_plan, build_plan};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("rtmhabit: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), SyncError> {
    let config = Config::load()?;
    let cache_path = config::cache_path();
    let mut cache = SyncCache::load(&cache_path)?;

    let mut rtm = RtmClient::new(&config.rtm, &config.http, cache.token.clone())?;
    let prompt = BrowserPrompt::new(config.http.auth_timeout_minutes);
    if rtm.ensure_token(&prompt)? {
        // Persist a fresh token right away so a failure later in the run
        // does not send the user back through the browser flow.
        cache.token = rtm.token().map(str::to_string);
        cache.save(&cache_path)?;
    }

    let timeline = rtm.create_timeline()?;

    let habitica = HabiticaClient::new(&config.habitica, &config.http)?;
    let open_todos = habitica.open_todos()?;
    let completed_todos = habitica.completed_todos()?;
    let aliases = AliasSets::from_todos(&open_todos, &completed_todos);
    println!(
        "› Habitica: {} open, {} completed to-dos",
        open_todos.len(),
        completed_todos.len()
    );

    // Computed before the fetches so the next incremental window overlaps
    // this run instead of leaving a gap.
    let now = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    let last_sync = cache.last_sync.as_deref();
    let open_filter = format!("{} AND status:incomplete", config.rtm.filter);
    let closed_filter = format!("{} AND status:complete", config.rtm.filter);
    let open_tasks = rtm.get_tasks(&open_filter, last_sync)?;
    let closed_tasks = rtm.get_tasks(&closed_filter, last_sync)?;
    println!(
        "› Remember The Milk: {} open, {} closed tasks match the sync filter",
        open_tasks.len(),
        closed_tasks.len()
    );

    let plan = build_plan(&open_tasks, &closed_tasks, &aliases);
    let report = apply_plan(&plan, &rtm, &timeline, &habitica)?;

    // Only a fully successful run advances the incremental window.
    cache.last_sync = Some(now);
    cache.save(&cache_path)?;

    println!(
        "Habitica and Remember The Milk are up-to-date ({})",
        report.summary()
    );
    Ok(())
}
