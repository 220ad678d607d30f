//! One sync run: refresh the token, fetch recent activities, merge them
//! into the archive and write it back.

use crate::store::{StoredActivity, existing_ids, sort_by_start_date};
use crate::{ActivityStore, Result, StravaApi, TokenRefresher, TokenStore, normalize};

/// Default page size when fetching recent activities
pub const DEFAULT_LIMIT: u32 = 30;

/// Largest page size Strava accepts
pub const MAX_LIMIT: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Append fetched activities whose id is not yet in the archive
    #[default]
    Incremental,
    /// Replace the archive with the fetched activities
    FullRefresh,
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub mode: SyncMode,
    /// Number of most recent activities to fetch
    pub limit: u32,
    /// Abort instead of starting over when the archive is not valid JSON
    pub strict_store: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            mode: SyncMode::Incremental,
            limit: DEFAULT_LIMIT,
            strict_store: false,
        }
    }
}

/// Progress of a run, logged on each transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    TokenObtained,
    Fetched,
    Merged,
    Persisted,
    Failed,
}

/// What a run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Activities returned by Strava
    pub fetched: usize,
    /// Activities dropped because they could not be converted
    pub skipped: usize,
    /// Records new to the archive (all records on a full refresh)
    pub added: usize,
    /// Records in the archive after the run
    pub total: usize,
    /// Whether the activities file was rewritten
    pub written: bool,
}

/// Orchestrates a sync run against a [`StravaApi`]
///
/// Nothing is written unless every step up to the merge succeeded: a token
/// or fetch failure leaves both files untouched, apart from the rotated
/// tokens a successful refresh already saved.
pub struct ActivitySync<'a, A: StravaApi + ?Sized> {
    api: &'a A,
    tokens: &'a TokenStore,
    store: &'a ActivityStore,
}

impl<'a, A: StravaApi + ?Sized> ActivitySync<'a, A> {
    pub fn new(api: &'a A, tokens: &'a TokenStore, store: &'a ActivityStore) -> Self {
        Self { api, tokens, store }
    }

    pub fn run(&self, options: &SyncOptions) -> Result<SyncOutcome> {
        let mut state = SyncState::Idle;
        let result = self.run_from(&mut state, options);
        if let Err(e) = &result {
            tracing::error!(state = ?state, error = %e, "Sync run failed");
            advance(&mut state, SyncState::Failed);
        }
        result
    }

    fn run_from(&self, state: &mut SyncState, options: &SyncOptions) -> Result<SyncOutcome> {
        match options.mode {
            SyncMode::Incremental => tracing::info!(limit = options.limit, "Mode: incremental update"),
            SyncMode::FullRefresh => tracing::info!(limit = options.limit, "Mode: full refresh"),
        }

        let access_token = TokenRefresher::new(self.api, self.tokens).get_valid_access_token()?;
        advance(state, SyncState::TokenObtained);

        tracing::info!(limit = options.limit, "Fetching activities from Strava...");
        let fetched = self.api.list_activities(&access_token, options.limit)?;
        tracing::info!(count = fetched.len(), "Fetched activities");
        advance(state, SyncState::Fetched);

        let mut outcome = SyncOutcome {
            fetched: fetched.len(),
            ..SyncOutcome::default()
        };
        let mut normalized = Vec::with_capacity(fetched.len());
        for activity in &fetched {
            match normalize(activity) {
                Ok(record) => normalized.push(record),
                Err(e) => {
                    tracing::warn!(activity_id = ?activity.id(), error = %e, "Skipping activity");
                    outcome.skipped += 1;
                }
            }
        }

        let existing = match options.mode {
            SyncMode::FullRefresh => {
                tracing::info!("Full refresh: existing activities will be replaced");
                Vec::new()
            }
            SyncMode::Incremental if options.strict_store => self.store.try_load()?,
            SyncMode::Incremental => self.store.load()?,
        };

        // Seeding with the archive drops known ids; inserting as we go also
        // drops an id repeated within the fetched page.
        let mut seen = existing_ids(&existing);
        let new: Vec<_> = normalized.into_iter().filter(|r| seen.insert(r.id)).collect();
        outcome.added = new.len();
        advance(state, SyncState::Merged);

        if new.is_empty() && options.mode == SyncMode::Incremental {
            tracing::info!("No new activities found");
            outcome.total = existing.len();
            return Ok(outcome);
        }

        let mut merged = existing;
        merged.extend(new.into_iter().map(StoredActivity::from));
        sort_by_start_date(&mut merged);

        tracing::info!(
            added = outcome.added,
            total = merged.len(),
            path = %self.store.path().display(),
            "Saving activities"
        );
        self.store.save(&merged)?;
        advance(state, SyncState::Persisted);

        outcome.total = merged.len();
        outcome.written = true;
        Ok(outcome)
    }
}

fn advance(state: &mut SyncState, next: SyncState) {
    tracing::debug!(from = ?state, to = ?next, "Sync state");
    *state = next;
}
