//! The reconcile pass: visible rows → cache / batch lookup → painted hearts.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;

use crate::cache::SavedStateCache;
use crate::client::{LibraryMutation, SavedStateClient, Transport};
use crate::config::{LookupPolicy, SyncConfig};
use crate::credentials::Credentials;
use crate::error::Result;
use crate::toggle::ToggleState;
use crate::track::TrackId;

/// Page-lifetime state shared by every component of the content context.
///
/// Credentials have one writer (the storage refresh before each pass);
/// the cache is only cleared through [`SyncContext::clear_cache`], which
/// the refresh signal drives. Every clear starts a new cache epoch; answers
/// requested in an older epoch are dropped.
pub struct SyncContext {
    pub config: SyncConfig,
    credentials: RefCell<Credentials>,
    cache: RefCell<SavedStateCache>,
    epoch: Cell<u64>,
}

impl SyncContext {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            credentials: RefCell::new(Credentials::default()),
            cache: RefCell::new(SavedStateCache::default()),
            epoch: Cell::new(0),
        }
    }

    pub fn credentials(&self) -> Credentials {
        self.credentials.borrow().clone()
    }

    pub fn set_credentials(&self, credentials: Credentials) {
        *self.credentials.borrow_mut() = credentials;
    }

    /// Replaces the credentials with a freshly loaded pair. A failed load
    /// keeps the current pair.
    pub async fn reload_credentials(&self, load: impl Future<Output = Result<Credentials>>) {
        match load.await {
            Ok(credentials) => self.set_credentials(credentials),
            Err(err) => log::warn!("could not read stored credentials: {err}"),
        }
    }

    pub fn cached(&self, id: &TrackId) -> Option<bool> {
        self.cache.borrow().get(id)
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.get()
    }

    pub fn clear_cache(&self) {
        let mut cache = self.cache.borrow_mut();
        log::debug!("dropping {} cached saved states", cache.len());
        cache.clear();
        self.epoch.set(self.epoch.get() + 1);
    }
}

/// A row binding produced fresh by the view on every pass.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackRow<R> {
    pub handle: R,
    pub track_id: TrackId,
}

/// The page as the reconciler sees it.
///
/// Controls are not tracked anywhere outside the page: `paint` creates the
/// heart if the row has none and updates it otherwise.
pub trait TrackView {
    type Row;

    /// Rows of the first supported section on the page, in page order.
    /// Only rows with a track id and a native add control are returned.
    fn visible_rows(&self) -> Vec<TrackRow<Self::Row>>;

    fn now_playing(&self) -> Option<TrackRow<Self::Row>>;

    fn paint(&self, row: &TrackRow<Self::Row>, state: ToggleState);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassReport {
    pub rows: usize,
    pub from_cache: usize,
    pub fetched: usize,
    /// The lookup failed; rows without a cached value were left unpainted.
    pub failed: bool,
    /// A newer pass started while this one waited on the lookup.
    pub superseded: bool,
    /// The cache was cleared while this pass waited on the lookup; its
    /// answers were dropped unpainted.
    pub stale: bool,
    /// Rows left alone because a click on that track is still in flight.
    pub held: usize,
}

pub struct Reconciler<T> {
    ctx: Rc<SyncContext>,
    client: SavedStateClient<T>,
    generation: Cell<u64>,
    in_flight: RefCell<HashMap<TrackId, usize>>,
    /// Refresh signals still expected back from our own mutations.
    echoes: Cell<usize>,
}

impl<T: Transport> Reconciler<T> {
    pub fn new(ctx: Rc<SyncContext>, transport: T) -> Self {
        let client = SavedStateClient::new(
            transport,
            ctx.config.api.clone(),
            ctx.config.operations.clone(),
        );
        Self {
            ctx,
            client,
            generation: Cell::new(0),
            in_flight: RefCell::new(HashMap::new()),
            echoes: Cell::new(0),
        }
    }

    pub fn context(&self) -> &Rc<SyncContext> {
        &self.ctx
    }

    pub fn client(&self) -> &SavedStateClient<T> {
        &self.client
    }

    /// Drops every cached saved state.
    pub fn refresh(&self) {
        self.ctx.clear_cache();
    }

    /// Handles a refresh signal from the relay. Returns whether the cache
    /// was cleared.
    ///
    /// The relay also reports our own add/remove calls; each of those is
    /// already reflected in the cache, so its echo is swallowed.
    pub fn on_refresh_signal(&self) -> bool {
        let echoes = self.echoes.get();
        if echoes > 0 {
            self.echoes.set(echoes - 1);
            log::debug!("ignoring refresh caused by our own mutation");
            return false;
        }
        self.refresh();
        true
    }

    /// True while a click on `id` waits for its mutation. Such tracks keep
    /// their optimistic heart; lookups answered before the mutation landed
    /// are not allowed to repaint them.
    pub fn is_in_flight(&self, id: &TrackId) -> bool {
        self.in_flight.borrow().contains_key(id)
    }

    pub async fn reconcile_rows<V: TrackView>(&self, view: &V) -> PassReport {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);

        let rows = view.visible_rows();
        let mut report = PassReport {
            rows: rows.len(),
            ..PassReport::default()
        };
        if rows.is_empty() {
            return report;
        }

        let policy = self.ctx.config.lookup_policy;
        let mut pending = Vec::new();
        for (idx, row) in rows.iter().enumerate() {
            if self.is_in_flight(&row.track_id) {
                report.held += 1;
                continue;
            }
            match self.ctx.cached(&row.track_id) {
                Some(saved) => {
                    view.paint(row, ToggleState::row(saved));
                    report.from_cache += 1;
                    if policy == LookupPolicy::AllVisible {
                        pending.push(idx);
                    }
                }
                None => pending.push(idx),
            }
        }
        if pending.is_empty() {
            log::debug!("pass {generation}: {} rows, all cached", rows.len());
            return report;
        }

        let ids: Vec<TrackId> = pending.iter().map(|&idx| rows[idx].track_id.clone()).collect();
        let creds = self.ctx.credentials();
        let epoch = self.ctx.epoch();
        let saved = match self.client.check_saved(&ids, &creds).await {
            Ok(saved) => saved,
            Err(err) => {
                log::warn!("saved-state lookup failed: {err}");
                report.failed = true;
                return report;
            }
        };

        report.fetched = ids.len();
        if self.ctx.epoch() != epoch {
            report.stale = true;
            return report;
        }

        let mut fresh = Vec::with_capacity(pending.len());
        for (&idx, &saved) in pending.iter().zip(&saved) {
            if self.is_in_flight(&rows[idx].track_id) {
                report.held += 1;
                continue;
            }
            fresh.push((idx, saved));
        }
        let (fresh_ids, fresh_saved): (Vec<TrackId>, Vec<bool>) = fresh
            .iter()
            .map(|&(idx, saved)| (rows[idx].track_id.clone(), saved))
            .unzip();
        self.ctx.cache.borrow_mut().set_many(&fresh_ids, &fresh_saved);

        if self.generation.get() != generation {
            report.superseded = true;
            return report;
        }
        for (idx, saved) in fresh {
            view.paint(&rows[idx], ToggleState::row(saved));
        }
        log::debug!(
            "pass {generation}: {} rows, {} from cache, {} fetched",
            report.rows,
            report.from_cache,
            report.fetched
        );
        report
    }

    /// Paints the now-playing heart. Returns the state painted, if any.
    pub async fn reconcile_now_playing<V: TrackView>(
        &self,
        view: &V,
        bypass_cache: bool,
    ) -> Option<bool> {
        let row = view.now_playing()?;
        if self.is_in_flight(&row.track_id) {
            return None;
        }
        if !bypass_cache {
            if let Some(saved) = self.ctx.cached(&row.track_id) {
                view.paint(&row, ToggleState::now_playing(saved));
                return Some(saved);
            }
        }

        let creds = self.ctx.credentials();
        let epoch = self.ctx.epoch();
        let ids = std::slice::from_ref(&row.track_id);
        match self.client.check_saved(ids, &creds).await {
            Ok(_) if self.is_in_flight(&row.track_id) || self.ctx.epoch() != epoch => None,
            Ok(saved) => {
                let saved = saved.first().copied().unwrap_or(false);
                self.ctx.cache.borrow_mut().insert(row.track_id.clone(), saved);
                view.paint(&row, ToggleState::now_playing(saved));
                Some(saved)
            }
            Err(err) => {
                log::warn!("now-playing lookup failed: {err}");
                None
            }
        }
    }

    /// Makes the remote library agree with a clicked heart.
    ///
    /// The caller has already flipped the heart; on failure the cache keeps
    /// its previous value and the error is handed back without retrying.
    pub async fn set_saved(&self, id: &TrackId, saved: bool) -> Result<()> {
        let mutation = if saved {
            LibraryMutation::Add
        } else {
            LibraryMutation::Remove
        };
        let creds = self.ctx.credentials();

        *self.in_flight.borrow_mut().entry(id.clone()).or_insert(0) += 1;
        self.echoes.set(self.echoes.get() + 1);
        let result = self.client.mutate(id, mutation, &creds).await;
        {
            let mut in_flight = self.in_flight.borrow_mut();
            if let Some(count) = in_flight.get_mut(id) {
                *count -= 1;
                if *count == 0 {
                    in_flight.remove(id);
                }
            }
        }

        result?;
        self.ctx.cache.borrow_mut().insert(id.clone(), saved);
        Ok(())
    }

    /// A heart click: reloads the credentials, then [`Reconciler::set_saved`].
    ///
    /// The background may have captured a newer token since the last pass.
    pub async fn apply_click(
        &self,
        id: &TrackId,
        saved: bool,
        load_credentials: impl Future<Output = Result<Credentials>>,
    ) -> Result<()> {
        self.ctx.reload_credentials(load_credentials).await;
        self.set_saved(id, saved).await
    }
}
