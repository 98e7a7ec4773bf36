//! Headless insight session.
//!
//! Loads the insight listing, analyzes every headline given on the command
//! line, then prints the custom-result card and the confidence trend.
//!
//! Usage: market-insight [HEADLINE ...]
//! Env:   INSIGHT_API_BASE, INSIGHT_TIMEOUT_SECS, INSIGHT_ORDERING, LOG_LEVEL, LOG_DOMAINS

use anyhow::Result;
use serde_json::json;

use market_insight::logging::{log, obj, v_str, Domain, Level};
use market_insight::{Config, InsightSession, SessionSnapshot};

fn print_grid(snap: &SessionSnapshot) {
    println!("== AI Market Insights ({})", snap.insights.len());
    for item in &snap.insights {
        println!("{}\n", item.card());
    }
}

fn print_current(snap: &SessionSnapshot) {
    if let Some(current) = &snap.current {
        println!("== Custom Headline");
        println!("{}\n", current.card());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    cfg.validate()?;
    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("api_base", v_str(&cfg.api_base)),
            ("ordering", v_str(&format!("{:?}", cfg.ordering).to_lowercase())),
        ]),
    );

    let headlines: Vec<String> = std::env::args().skip(1).collect();
    let mut session = InsightSession::from_config(&cfg);

    session.spawn_load();
    session.settle().await;
    let snap = session.snapshot();
    match &snap.last_error {
        Some(err) => eprintln!("{}", err),
        None => print_grid(&snap),
    }

    for headline in headlines {
        session.set_draft(headline);
        session.submit_draft();
    }
    session.settle().await;

    let snap = session.snapshot();
    if let Some(err) = &snap.last_error {
        eprintln!("{}", err);
    }
    print_current(&snap);

    println!("== Confidence Trend (Last Headlines)");
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "label": snap.chart.label,
            "labels": snap.chart.labels,
            "data": snap.chart.values,
        }))?
    );

    log(
        Level::Info,
        Domain::System,
        "shutdown",
        obj(&[("history_len", json!(snap.history.len()))]),
    );
    Ok(())
}
