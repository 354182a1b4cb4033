//! Side-panel tables derived from a node snapshot.
//!
//! Both tables are built from an unfiltered snapshot; hiding stale nodes only
//! affects the map.

use foundation::ids::NodeId;
use foundation::math::stable_total_cmp_f64;
use serde::Serialize;

use crate::node_store::NodeView;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub id: NodeId,
    pub name: String,
    /// Distance from the origin in metres, when the node is plottable.
    pub range_m: Option<f64>,
    pub age_s: f64,
}

impl From<&NodeView> for TableRow {
    fn from(view: &NodeView) -> Self {
        Self {
            id: view.id.clone(),
            name: view.name.clone(),
            range_m: view.position.map(|p| p.length()),
            age_s: view.age_s,
        }
    }
}

/// Plottable nodes, nearest first, then freshest.
pub fn mapped_rows(views: &[NodeView]) -> Vec<TableRow> {
    let mut rows: Vec<TableRow> = views
        .iter()
        .filter(|v| v.position.is_some())
        .map(TableRow::from)
        .collect();
    rows.sort_by(|a, b| {
        let ra = a.range_m.unwrap_or(f64::INFINITY);
        let rb = b.range_m.unwrap_or(f64::INFINITY);
        stable_total_cmp_f64(ra, rb)
            .then_with(|| stable_total_cmp_f64(a.age_s, b.age_s))
            .then_with(|| a.id.cmp(&b.id))
    });
    rows
}

/// Every node, freshest first, then by case-insensitive name.
pub fn all_rows(views: &[NodeView]) -> Vec<TableRow> {
    let mut rows: Vec<TableRow> = views.iter().map(TableRow::from).collect();
    rows.sort_by(|a, b| {
        stable_total_cmp_f64(a.age_s, b.age_s)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            .then_with(|| a.id.cmp(&b.id))
    });
    rows
}
