use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use relay_config::HeaderCaptureConfig;
use relay_domain::{HeaderCacheStatus, MatchPattern, ObservedRequest, TrafficObserver};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct HarvestState {
    initialized_at: Option<DateTime<Utc>>,
    last_captured_at: Option<DateTime<Utc>>,
    captured: BTreeMap<String, String>,
}

/// Keeps the latest value of each whitelisted anti-abuse header seen on live traffic.
///
/// The harvester is the only writer of the captured set. Values are merged, so a
/// header missing from one request keeps its previous value.
pub struct HeaderHarvester {
    wanted: BTreeSet<String>,
    url_patterns: Vec<MatchPattern>,
    enabled: bool,
    active: AtomicBool,
    state: RwLock<HarvestState>,
}

impl HeaderHarvester {
    pub fn new(config: &HeaderCaptureConfig) -> Self {
        let wanted = config
            .header_names
            .iter()
            .map(|name| name.trim().to_ascii_lowercase())
            .filter(|name| !name.is_empty())
            .collect();

        let url_patterns = config
            .url_patterns
            .iter()
            .filter_map(|raw| {
                let parsed = MatchPattern::parse(raw);
                if parsed.is_none() {
                    warn!("Ignoring invalid header capture pattern: {}", raw);
                }
                parsed
            })
            .collect();

        Self {
            wanted,
            url_patterns,
            enabled: config.enabled,
            active: AtomicBool::new(false),
            state: RwLock::new(HarvestState::default()),
        }
    }

    /// Starts harvesting when the host can observe outbound traffic.
    /// Returns whether harvesting is active.
    pub fn init(&self, observation_available: bool) -> bool {
        if !self.enabled || self.wanted.is_empty() {
            info!("Header capture disabled (no header whitelist)");
            return false;
        }
        if !observation_available {
            warn!("Traffic observation unavailable; header capture disabled");
            return false;
        }

        self.write_state().initialized_at = Some(Utc::now());
        self.active.store(true, Ordering::SeqCst);
        info!(
            "Header capture started for {} header(s) on {} pattern(s)",
            self.wanted.len(),
            self.url_patterns.len()
        );
        true
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Merges whitelisted, non-empty headers into the captured set.
    pub fn capture(&self, headers: &[(String, String)]) {
        let found: BTreeMap<String, String> = headers
            .iter()
            .filter_map(|(name, value)| {
                let name = name.to_ascii_lowercase();
                (self.wanted.contains(&name) && !value.is_empty()).then(|| (name, value.clone()))
            })
            .collect();

        if found.is_empty() {
            return;
        }

        let mut state = self.write_state();
        debug!("Captured headers: {:?}", found.keys().collect::<Vec<_>>());
        state.captured.extend(found);
        state.last_captured_at = Some(Utc::now());
    }

    /// A copy of the captured set; later captures never show up in it.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.read_state().captured.clone()
    }

    pub fn status(&self) -> HeaderCacheStatus {
        let state = self.read_state();
        HeaderCacheStatus {
            enabled: self.is_active(),
            initialized_at: state.initialized_at,
            last_captured_at: state.last_captured_at,
            header_count: state.captured.len(),
            names: state.captured.keys().cloned().collect(),
        }
    }

    fn matches(&self, url: &str) -> bool {
        self.url_patterns.iter().any(|p| p.matches(url))
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, HarvestState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, HarvestState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl TrafficObserver for HeaderHarvester {
    fn observe(&self, request: &ObservedRequest) {
        if !self.is_active() || !self.matches(&request.url) {
            return;
        }
        self.capture(&request.headers);
    }
}
