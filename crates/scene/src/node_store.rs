//! Registry of every node heard on the mesh.
//!
//! Reports arrive partial and out of order, so [`NodeStore::apply`] merges
//! rather than replaces: a report that only proves a node is alive refreshes
//! `last_seen` without touching its last known position. Records are never
//! removed; staleness is derived from `last_seen` at query time.

use std::collections::HashMap;

use foundation::ids::NodeId;
use foundation::math::{GeoFix, Vec2, project, stable_total_cmp_f64};
use foundation::time::Time;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::info;

/// A decoded, already-validated report about one node.
///
/// Every field except `id` is optional; absent fields leave the stored value
/// untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeUpdate {
    pub id: NodeId,
    pub name: Option<String>,
    pub lat_deg: Option<f64>,
    pub lon_deg: Option<f64>,
    pub timestamp: Option<Time>,
}

impl NodeUpdate {
    pub fn new(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            lat_deg: None,
            lon_deg: None,
            timestamp: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_fix(mut self, lat_deg: f64, lon_deg: f64) -> Self {
        self.lat_deg = Some(lat_deg);
        self.lon_deg = Some(lon_deg);
        self
    }

    pub fn at(mut self, timestamp: Time) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// The fix carried by this report, if it has both coordinates.
    pub fn fix(&self) -> Option<GeoFix> {
        GeoFix::from_parts(self.lat_deg, self.lon_deg)
    }
}

/// Stored state for one node. Coordinates are kept raw and projected on demand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub name: String,
    pub fix: Option<GeoFix>,
    pub last_seen: Time,
}

/// Anchor of the planar frame: the first fix ever received.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
pub struct Origin {
    fix: Option<GeoFix>,
}

impl Origin {
    pub fn is_set(&self) -> bool {
        self.fix.is_some()
    }

    pub fn fix(&self) -> Option<GeoFix> {
        self.fix
    }

    pub fn lat_deg(&self) -> Option<f64> {
        self.fix.map(|f| f.lat_deg)
    }

    pub fn lon_deg(&self) -> Option<f64> {
        self.fix.map(|f| f.lon_deg)
    }

    /// Sets the origin unless it is already set. Returns true if it changed.
    fn set_if_empty(&mut self, fix: GeoFix) -> bool {
        if self.fix.is_some() {
            return false;
        }
        self.fix = Some(fix);
        true
    }
}

/// What a single [`NodeStore::apply`] did.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ApplyReport {
    /// The id had never been seen before.
    pub created: bool,
    /// This report established the origin.
    pub origin_initialized: bool,
}

/// One row of a snapshot: a record plus derived position and age.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeView {
    pub id: NodeId,
    pub name: String,
    pub fix: Option<GeoFix>,
    /// Metres east/north of the origin; `None` until both a fix and an origin exist.
    pub position: Option<Vec2>,
    pub last_seen: Time,
    pub age_s: f64,
}

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<NodeId, NodeRecord>,
    origin: Origin,
}

/// Thread-safe node registry.
///
/// Writers (`apply`) and readers (`snapshot`, `origin_state`) are serialized
/// through one `RwLock`, so a snapshot never observes a half-merged record and
/// the origin is always read together with the records it anchors.
#[derive(Debug, Default)]
pub struct NodeStore {
    inner: RwLock<Inner>,
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `update` into the store, stamping it with the current time if it
    /// carries no timestamp of its own.
    pub fn apply(&self, update: NodeUpdate) -> ApplyReport {
        self.apply_at(update, Time::now())
    }

    /// Like [`apply`](Self::apply) with an explicit notion of "now".
    pub fn apply_at(&self, update: NodeUpdate, now: Time) -> ApplyReport {
        let fix = update.fix();
        let last_seen = update.timestamp.unwrap_or(now);

        let mut inner = self.inner.write();
        let mut report = ApplyReport::default();

        let record = inner.records.entry(update.id.clone()).or_insert_with(|| {
            report.created = true;
            NodeRecord {
                name: update.id.to_string(),
                id: update.id.clone(),
                fix: None,
                last_seen,
            }
        });

        if let Some(name) = update.name.filter(|n| !n.is_empty()) {
            record.name = name;
        }
        record.last_seen = last_seen;
        if let Some(fix) = fix {
            record.fix = Some(fix);
        }

        if let Some(fix) = fix
            && inner.origin.set_if_empty(fix)
        {
            report.origin_initialized = true;
            info!(
                lat = fix.lat_deg,
                lon = fix.lon_deg,
                node = %update.id,
                "origin established"
            );
        }

        report
    }

    /// Current origin. Once set it never changes.
    pub fn origin_state(&self) -> Origin {
        self.inner.read().origin
    }

    pub fn get(&self, id: &NodeId) -> Option<NodeRecord> {
        self.inner.read().records.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All records younger than `max_age_s` (or all records when `None`).
    pub fn snapshot(&self, max_age_s: Option<f64>) -> Vec<NodeView> {
        self.snapshot_at(Time::now(), max_age_s)
    }

    /// Snapshot evaluated at `now`.
    ///
    /// Ordered by ascending age, then case-insensitive name, then id.
    pub fn snapshot_at(&self, now: Time, max_age_s: Option<f64>) -> Vec<NodeView> {
        let inner = self.inner.read();
        let origin = inner.origin.fix();

        let mut out: Vec<NodeView> = inner
            .records
            .values()
            .filter_map(|rec| {
                let age_s = now.since(rec.last_seen);
                if max_age_s.is_some_and(|max| age_s > max) {
                    return None;
                }
                let position = match (rec.fix, origin) {
                    (Some(fix), Some(origin)) => Some(project(fix, origin)),
                    _ => None,
                };
                Some(NodeView {
                    id: rec.id.clone(),
                    name: rec.name.clone(),
                    fix: rec.fix,
                    position,
                    last_seen: rec.last_seen,
                    age_s,
                })
            })
            .collect();
        drop(inner);

        out.sort_by(|a, b| {
            stable_total_cmp_f64(a.age_s, b.age_s)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
                .then_with(|| a.id.cmp(&b.id))
        });
        out
    }
}
