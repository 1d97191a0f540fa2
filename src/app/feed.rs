use time::{Duration, OffsetDateTime};

use crate::remote::{FetchFailure, LoadedStatuses};
use crate::store::{sort_newest_first, StatusEntry};
use crate::timefmt::{Clock, FormattedTime, NowTicker, TimeFormatter};

const FADE_FLOOR: f32 = 0.2;
const FADE_SPAN: f32 = 0.8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedPhase {
    Loading,
    Loaded {
        entries: Vec<StatusEntry>,
        skipped: usize,
    },
    Errored(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedCard {
    pub text: String,
    pub time: FormattedTime,
    pub weight: f32,
}

/// Opacity for the card at `rank` (0 = newest) out of `total`: 1.0 at the
/// top, falling linearly to the 0.2 floor at the bottom.
pub fn fade_weight(rank: usize, total: usize) -> f32 {
    let span = total.saturating_sub(1).max(1) as f32;
    (1.0 - (rank as f32 / span) * FADE_SPAN).max(FADE_FLOOR)
}

/// Read-only feed. Loads once per mount; `Loaded` and `Errored` are final.
#[derive(Debug, Clone)]
pub struct FeedView {
    phase: FeedPhase,
    ticker: NowTicker,
    scroll: usize,
}

impl FeedView {
    pub fn mount(clock: &dyn Clock, refresh: Duration) -> Self {
        Self {
            phase: FeedPhase::Loading,
            ticker: NowTicker::start(clock, refresh),
            scroll: 0,
        }
    }

    pub fn phase(&self) -> &FeedPhase {
        &self.phase
    }

    pub fn now(&self) -> OffsetDateTime {
        self.ticker.now()
    }

    pub fn apply_load(&mut self, result: Result<LoadedStatuses, FetchFailure>) {
        if self.phase != FeedPhase::Loading {
            tracing::debug!("feed already settled, ignoring late load");
            return;
        }
        self.phase = match result {
            Ok(loaded) => {
                let mut entries = loaded.entries;
                sort_newest_first(&mut entries);
                FeedPhase::Loaded {
                    entries,
                    skipped: loaded.skipped,
                }
            }
            Err(err) => FeedPhase::Errored(err.to_string()),
        };
    }

    /// Advances "now" once per refresh interval. Returns true when labels
    /// need redrawing.
    pub fn tick(&mut self, clock: &dyn Clock) -> bool {
        self.ticker.poll(clock)
    }

    pub fn entries(&self) -> &[StatusEntry] {
        match &self.phase {
            FeedPhase::Loaded { entries, .. } => entries,
            _ => &[],
        }
    }

    pub fn skipped(&self) -> usize {
        match &self.phase {
            FeedPhase::Loaded { skipped, .. } => *skipped,
            _ => 0,
        }
    }

    pub fn cards(&self, formatter: &TimeFormatter) -> Vec<FeedCard> {
        let entries = self.entries();
        let now = self.now();
        entries
            .iter()
            .enumerate()
            .map(|(rank, entry)| FeedCard {
                text: entry.text.clone(),
                time: formatter.format(entry.time, now),
                weight: fade_weight(rank, entries.len()),
            })
            .collect()
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    pub fn scroll_by(&mut self, delta: isize) {
        let len = self.entries().len();
        if len == 0 {
            self.scroll = 0;
            return;
        }
        let next = (self.scroll as isize + delta).clamp(0, len as isize - 1);
        self.scroll = next as usize;
    }
}
