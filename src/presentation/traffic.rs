//! Traffic view state
//!
//! The consumer side of the ledger: remembers the user's ordering choice,
//! hands out stable slots and pages the sorted view.

use std::sync::{Mutex, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::stable_index::StableIndex;
use crate::config::ViewConfig;
use crate::connection::{apply_query, Connection, ConnectionLedger, SortKey, ViewFilter, ViewQuery};
use crate::Result;

/// Remembered ordering of the connection list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct ViewPreferences {
    pub sort_key: SortKey,
    pub descending: bool,
}

impl From<&ViewConfig> for ViewPreferences {
    fn from(config: &ViewConfig) -> Self {
        Self {
            sort_key: config.sort_key,
            descending: config.descending,
        }
    }
}

/// One render request. Unset ordering falls back to the preferences.
#[derive(Debug, Clone, Default)]
pub struct RenderRequest {
    pub sort_key: Option<SortKey>,
    pub descending: Option<bool>,
    pub filter: ViewFilter,
    /// 1-based
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

/// A connection together with its display slot
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionRow {
    pub slot: u64,
    #[serde(flatten)]
    pub connection: Connection,
}

/// One rendered page of the connection list
#[derive(Debug, Clone, Serialize)]
pub struct TrafficFrame {
    /// No active connections at all, regardless of filter
    pub empty: bool,
    pub generation: u64,
    pub total: usize,
    pub matched: usize,
    pub page: usize,
    pub limit: usize,
    pub sort_key: SortKey,
    pub descending: bool,
    pub rows: Vec<ConnectionRow>,
}

#[derive(Debug, Clone, Copy)]
struct PageLimits {
    default_limit: usize,
    max_limit: usize,
}

pub struct TrafficView {
    preferences: RwLock<ViewPreferences>,
    limits: RwLock<PageLimits>,
    index: Mutex<StableIndex>,
}

impl TrafficView {
    pub fn new(config: &ViewConfig) -> Self {
        Self {
            preferences: RwLock::new(ViewPreferences::from(config)),
            limits: RwLock::new(PageLimits {
                default_limit: config.default_limit,
                max_limit: config.max_limit,
            }),
            index: Mutex::new(StableIndex::new()),
        }
    }

    pub fn preferences(&self) -> ViewPreferences {
        match self.preferences.read() {
            Ok(prefs) => *prefs,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn set_preferences(&self, preferences: ViewPreferences) {
        match self.preferences.write() {
            Ok(mut prefs) => *prefs = preferences,
            Err(poisoned) => *poisoned.into_inner() = preferences,
        }
        info!(
            sort_key = %preferences.sort_key,
            descending = preferences.descending,
            "View preferences updated"
        );
    }

    /// Adopt a reloaded `[view]` section
    pub fn apply_config(&self, config: &ViewConfig) {
        self.set_preferences(ViewPreferences::from(config));
        let limits = PageLimits {
            default_limit: config.default_limit,
            max_limit: config.max_limit,
        };
        match self.limits.write() {
            Ok(mut current) => *current = limits,
            Err(poisoned) => *poisoned.into_inner() = limits,
        }
    }

    fn limits(&self) -> PageLimits {
        match self.limits.read() {
            Ok(limits) => *limits,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Sort, filter and page the ledger's current snapshot
    pub fn render(&self, ledger: &ConnectionLedger, request: RenderRequest) -> TrafficFrame {
        let prefs = self.preferences();
        let limits = self.limits();

        let query = ViewQuery::new(
            request.sort_key.unwrap_or(prefs.sort_key),
            request.descending.unwrap_or(prefs.descending),
        )
        .with_filter(request.filter);

        let snapshot = ledger.snapshot();
        let matched = apply_query(&snapshot, &query);

        let limit = request
            .limit
            .unwrap_or(limits.default_limit)
            .clamp(1, limits.max_limit.max(1));
        let page = request.page.unwrap_or(1).max(1);
        let skip = (page - 1).saturating_mul(limit);

        let matched_count = matched.len();
        let rows: Vec<ConnectionRow> = {
            let mut index = match self.index.lock() {
                Ok(index) => index,
                Err(poisoned) => poisoned.into_inner(),
            };
            let pruned = index.prune(&snapshot);
            if pruned > 0 {
                debug!(pruned, tracked = index.len(), "Pruned display slots of closed connections");
            }
            matched
                .into_iter()
                .skip(skip)
                .take(limit)
                .map(|connection| ConnectionRow {
                    slot: index.slot(&connection.uuid),
                    connection,
                })
                .collect()
        };

        debug!(
            generation = snapshot.generation,
            matched = matched_count,
            rows = rows.len(),
            "Rendered traffic frame"
        );

        TrafficFrame {
            empty: snapshot.is_empty(),
            generation: snapshot.generation,
            total: snapshot.len(),
            matched: matched_count,
            page,
            limit,
            sort_key: query.sort_key,
            descending: query.descending,
            rows,
        }
    }

    /// Number of uuids currently holding a display slot
    pub fn tracked_slots(&self) -> usize {
        match self.index.lock() {
            Ok(index) => index.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Single connection with its slot, if currently open
    pub fn detail(&self, ledger: &ConnectionLedger, uuid: &str) -> Option<ConnectionRow> {
        let connection = ledger.get(uuid)?;
        let slot = match self.index.lock() {
            Ok(mut index) => index.slot(uuid),
            Err(poisoned) => poisoned.into_inner().slot(uuid),
        };
        Some(ConnectionRow { slot, connection })
    }

    /// Pretty JSON document of one connection, for copying out
    pub fn detail_json(&self, ledger: &ConnectionLedger, uuid: &str) -> Result<Option<String>> {
        match ledger.get(uuid) {
            Some(connection) => Ok(Some(serde_json::to_string_pretty(&connection)?)),
            None => Ok(None),
        }
    }
}
