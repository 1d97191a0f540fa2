use std::fmt::Write as _;
use std::io::{self, Read};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use time::OffsetDateTime;

use crate::app::{App, Route};
use crate::config::AppConfig;
use crate::remote::RemoteBlobClient;
use crate::store::{sort_newest_first, StatusEntry, StatusStore};
use crate::timefmt::{Clock, TimeFormatter};

#[derive(Args, Debug, Clone)]
pub struct PostArgs {
    /// Status text (read from stdin if omitted)
    #[arg()]
    pub text: Option<String>,
}

pub fn run_tui(
    config: Arc<AppConfig>,
    client: RemoteBlobClient,
    clock: Arc<dyn Clock>,
    route: Route,
) -> Result<()> {
    let mut app = App::new(config, client, clock, route)?;
    app.run()
}

pub fn list_statuses(config: &AppConfig, client: &RemoteBlobClient, clock: &dyn Clock) -> Result<()> {
    let loaded = client.load().context("loading statuses")?;
    if loaded.skipped > 0 {
        tracing::warn!(skipped = loaded.skipped, "some statuses had unreadable times");
    }
    let mut entries = loaded.entries;
    sort_newest_first(&mut entries);
    let formatter = TimeFormatter::new(config.display.zone());
    print!("{}", render_feed_text(&entries, &formatter, clock.now()));
    Ok(())
}

fn render_feed_text(entries: &[StatusEntry], formatter: &TimeFormatter, now: OffsetDateTime) -> String {
    if entries.is_empty() {
        return "No statuses yet.\n".to_string();
    }
    let mut out = String::new();
    for entry in entries {
        let time = formatter.format(entry.time, now);
        let _ = writeln!(
            &mut out,
            "{} · {} · {}",
            time.clock_time, time.long_date, time.relative
        );
        for line in entry.text.lines() {
            let _ = writeln!(&mut out, "  {line}");
        }
    }
    out
}

/// Loads the document, prepends one status stamped with the current time and
/// writes the whole list back.
pub fn post_status(client: &RemoteBlobClient, clock: &dyn Clock, args: PostArgs) -> Result<()> {
    let text = match args.text {
        Some(text) => text,
        None => read_stdin()?.unwrap_or_default(),
    };
    let text = text.trim_end_matches(['\n', '\r']);
    if text.trim().is_empty() {
        bail!("status text cannot be empty");
    }

    let loaded = client.load().context("loading statuses before posting")?;
    if loaded.skipped > 0 {
        tracing::warn!(
            skipped = loaded.skipped,
            "statuses with unreadable times will be dropped by this save"
        );
    }
    let mut store = StatusStore::from_entries(loaded.entries);
    store.insert_front(StatusEntry::new(text, clock.now()));
    let receipt = client
        .save(&store.snapshot(), loaded.etag.as_deref())
        .context("uploading statuses")?;
    println!("Posted status ({} total)", receipt.saved);
    Ok(())
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("reading status text from stdin")?;
    Ok(Some(buf))
}
