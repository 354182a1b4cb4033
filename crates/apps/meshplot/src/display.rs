//! Per-frame pipeline: ingest, snapshot, topology, camera, output.

use std::sync::Arc;

use foundation::ids::NodeId;
use foundation::math::{GeoFix, Vec2};
use foundation::time::Time;
use runtime::budget::FrameBudget;
use runtime::event_bus::{Event, EventBus};
use runtime::frame::{Frame, MIN_FRAME_DT_S};
use scene::node_store::{NodeStore, NodeView};
use scene::tables::{TableRow, all_rows, mapped_rows};
use scene::topology::{LinkMode, TopologyBuilder};
use serde::Serialize;
use streaming::queue::UpdateQueue;
use streaming::source::{SourceStatus, StatusSnapshot};
use tracing::info;
use view::flow::FlowConfig;
use view::grid::{GridLine, geo_grid};
use view::input::{DisplayToggles, ViewEvent, ViewSession};
use view::viewport::{Reticle, ScreenRect, ViewState, ViewportController};

use crate::config::DisplayConfig;

/// A node placed on the map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlottedNode {
    pub id: NodeId,
    pub name: String,
    pub world: Vec2,
    pub screen: Vec2,
    pub age_s: f64,
    pub stale: bool,
    /// Present when labels are enabled.
    pub label: Option<String>,
}

/// A link in screen space. `a` and `b` index into [`FrameOutput::nodes`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenEdge {
    pub a: usize,
    pub b: usize,
    pub from: Vec2,
    pub to: Vec2,
    pub flow: Vec<Vec2>,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub applied: usize,
    pub dropped: usize,
    pub pending: usize,
    /// The drain budget ran out this frame.
    pub backlog: bool,
    pub total_applied: u64,
    pub total_dropped: u64,
}

/// Everything an external renderer needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameOutput {
    pub frame: u64,
    pub time: Time,
    pub origin: Option<GeoFix>,
    pub link_mode: LinkMode,
    pub toggles: DisplayToggles,
    pub view: ViewState,
    pub viewport: ScreenRect,
    pub fit_scale: f64,
    pub effective_scale: f64,
    /// Nodes ever heard.
    pub heard: usize,
    pub nodes: Vec<PlottedNode>,
    pub edges: Vec<ScreenEdge>,
    pub grid: Vec<GridLine>,
    pub reticle: Option<Reticle>,
    pub mapped: Vec<TableRow>,
    pub all: Vec<TableRow>,
    pub status: StatusSnapshot,
    pub ingest: IngestSummary,
}

/// Owns the consumer side of the display.
#[derive(Debug)]
pub struct Display {
    config: DisplayConfig,
    store: Arc<NodeStore>,
    queue: UpdateQueue,
    status: Arc<SourceStatus>,
    session: ViewSession,
    topology: TopologyBuilder,
    flow: FlowConfig,
    events: EventBus,
    next_frame: u64,
    total_applied: u64,
    total_dropped: u64,
    /// Producer-side rejections already folded into `total_dropped`.
    seen_rejected: u64,
    source_closed: bool,
}

impl Display {
    pub fn new(
        config: DisplayConfig,
        store: Arc<NodeStore>,
        queue: UpdateQueue,
        status: Arc<SourceStatus>,
    ) -> Self {
        let viewport =
            ViewportController::new(config.view, ScreenRect::from_size(config.width, config.height));
        let session = ViewSession::new(viewport, config.link_mode);
        let topology = TopologyBuilder::new(config.k_neighbors, config.link_max_m);
        Self {
            config,
            store,
            queue,
            status,
            session,
            topology,
            flow: FlowConfig::default(),
            events: EventBus::new(),
            next_frame: 0,
            total_applied: 0,
            total_dropped: 0,
            seen_rejected: 0,
            source_closed: false,
        }
    }

    pub fn config(&self) -> &DisplayConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<NodeStore> {
        &self.store
    }

    pub fn session(&self) -> &ViewSession {
        &self.session
    }

    pub fn handle(&mut self, event: ViewEvent) {
        self.session.handle(event);
    }

    /// True once the producer is gone and everything it sent was drained.
    pub fn is_source_closed(&self) -> bool {
        self.source_closed
    }

    /// Diagnostic events raised since the last call.
    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain()
    }

    pub fn step(&mut self, now: Time, dt: f64) -> FrameOutput {
        let frame = Frame::new(self.next_frame, dt.max(MIN_FRAME_DT_S), now);
        self.next_frame += 1;

        let ingest = self.ingest(frame);

        let stale_after = self.config.stale_after_s;
        let max_age = self.session.toggles.hide_stale.then_some(stale_after);
        let visible = self.store.snapshot_at(now, max_age);
        let everything = self.store.snapshot_at(now, None);
        let origin = self.store.origin_state().fix();

        let plotted: Vec<(&NodeView, Vec2)> = visible
            .iter()
            .filter_map(|v| v.position.map(|p| (v, p)))
            .collect();
        let points: Vec<Vec2> = plotted.iter().map(|(_, p)| *p).collect();

        let links = self.topology.build(&points, self.session.link_mode);
        let fit_scale = self.session.viewport.update_fit(&points);
        self.session.tick(frame.dt_s);

        let viewport = &self.session.viewport;
        let toggles = self.session.toggles;

        let nodes: Vec<PlottedNode> = plotted
            .iter()
            .map(|(v, world)| PlottedNode {
                id: v.id.clone(),
                name: v.name.clone(),
                world: *world,
                screen: viewport.world_to_screen(*world),
                age_s: v.age_s,
                stale: v.age_s >= stale_after,
                label: toggles.labels.then(|| v.name.clone()),
            })
            .collect();

        let phase = self.flow.phase(now.seconds());
        let edges: Vec<ScreenEdge> = links
            .iter()
            .map(|e| {
                let from = nodes[e.a].screen;
                let to = nodes[e.b].screen;
                let flow = if toggles.flow {
                    self.flow.dots(from, to, phase)
                } else {
                    Vec::new()
                };
                ScreenEdge {
                    a: e.a,
                    b: e.b,
                    from,
                    to,
                    flow,
                }
            })
            .collect();

        let grid = geo_grid(viewport, origin, &self.config.grid);
        let reticle = if toggles.target {
            viewport.reticle(origin)
        } else {
            None
        };

        let out = FrameOutput {
            frame: frame.index,
            time: now,
            origin,
            link_mode: self.session.link_mode,
            toggles,
            view: *viewport.state(),
            viewport: viewport.rect(),
            fit_scale,
            effective_scale: viewport.effective_scale(),
            heard: everything.len(),
            nodes,
            edges,
            grid,
            reticle,
            mapped: mapped_rows(&everything),
            all: all_rows(&everything),
            status: self.status.snapshot(),
            ingest,
        };

        let every = self.config.summary_every;
        if every > 0 && frame.index % every == 0 {
            info!(
                frame = out.frame,
                heard = out.heard,
                plotted = out.nodes.len(),
                links = out.edges.len(),
                mode = %out.link_mode,
                received = out.status.received,
                dropped = self.total_dropped,
                "frame summary"
            );
        }
        out
    }

    fn ingest(&mut self, frame: Frame) -> IngestSummary {
        let mut budget = FrameBudget::new(self.config.drain_budget);
        let report = self.queue.drain_into(&self.store, frame.time, &mut budget);

        let rejected = self.status.snapshot().rejected;
        let newly_rejected = rejected.saturating_sub(self.seen_rejected);
        self.seen_rejected = rejected;
        let dropped = report.dropped.len() + newly_rejected as usize;

        self.total_applied += report.applied as u64;
        self.total_dropped += dropped as u64;

        if newly_rejected > 0 {
            self.events.emit(
                frame,
                "ingest.drop",
                format!("{newly_rejected} lines were not valid JSON"),
            );
        }
        for reason in &report.dropped {
            self.events.emit(frame, "ingest.drop", reason.to_string());
        }
        for id in &report.created {
            self.events.emit(frame, "node.new", id.as_str());
        }
        if report.origin_set
            && let Some(origin) = self.store.origin_state().fix()
        {
            self.events.emit(
                frame,
                "origin.set",
                format!("{:.5}, {:.5}", origin.lat_deg, origin.lon_deg),
            );
        }
        if report.exhausted {
            self.events.emit(
                frame,
                "ingest.backlog",
                format!("{} records waiting", self.queue.pending()),
            );
        }
        if report.closed && !self.source_closed {
            self.source_closed = true;
            self.events.emit(frame, "source.closed", "producer finished");
            info!(applied = self.total_applied, dropped = self.total_dropped, "ingest complete");
        }

        IngestSummary {
            applied: report.applied,
            dropped,
            pending: self.queue.pending(),
            backlog: report.exhausted,
            total_applied: self.total_applied,
            total_dropped: self.total_dropped,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::Display;
    use crate::config::DisplayConfig;
    use foundation::math::METERS_PER_DEGREE;
    use foundation::time::Time;
    use scene::node_store::NodeStore;
    use scene::topology::LinkMode;
    use serde_json::json;
    use streaming::queue::{UpdateSender, update_channel};
    use streaming::source::{SourceStatus, pump_lines};
    use tokio::io::BufReader;
    use view::input::ViewEvent;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    fn display(config: DisplayConfig) -> (UpdateSender, Display) {
        let (tx, queue) = update_channel();
        let store = Arc::new(NodeStore::new());
        let status = Arc::new(SourceStatus::new("test"));
        (tx, Display::new(config, store, queue, status))
    }

    fn send_triangle(tx: &UpdateSender, t: f64) {
        tx.send(json!({"id": "A", "latitude": 0.0, "longitude": 0.0, "timestamp": t}))
            .unwrap();
        tx.send(json!({"id": "B", "latitude": 0.01, "longitude": 0.0, "timestamp": t}))
            .unwrap();
        tx.send(json!({"id": "C", "latitude": 0.0, "longitude": 0.01, "timestamp": t}))
            .unwrap();
    }

    #[test]
    fn three_node_triangle() {
        let (tx, mut display) = display(DisplayConfig::default());
        send_triangle(&tx, 1000.0);
        display.handle(ViewEvent::CycleLinkMode);

        let out = display.step(Time(1000.0), 0.05);
        assert_eq!(out.link_mode, LinkMode::Mst);
        assert_eq!(out.nodes.len(), 3);
        assert_eq!(out.edges.len(), 2);
        assert_eq!(out.ingest.applied, 3);

        let b = out.nodes.iter().find(|n| n.id.as_str() == "B").unwrap();
        assert_close(b.world.y, 0.01 * METERS_PER_DEGREE, 1e-6);
        // Farthest node is 1113.2 m out on an 1280x720 plot.
        assert_close(out.fit_scale, 360.0 * 0.92 / 1113.2, 1e-9);
        assert!(b.screen.y < out.viewport.height * 0.5);

        let origin = out.origin.unwrap();
        assert_eq!((origin.lat_deg, origin.lon_deg), (0.0, 0.0));
        assert_eq!(out.mapped.len(), 3);

        let events = display.drain_events();
        assert_eq!(events.iter().filter(|e| e.kind == "node.new").count(), 3);
        assert_eq!(events.iter().filter(|e| e.kind == "origin.set").count(), 1);
    }

    #[test]
    fn hybrid_mode_contains_tree_links() {
        let (tx, mut display) = display(DisplayConfig::default());
        send_triangle(&tx, 1000.0);
        let out = display.step(Time(1000.0), 0.05);
        assert_eq!(out.link_mode, LinkMode::MstKnn);
        assert_eq!(out.edges.len(), 3);
        assert!(out.edges.iter().all(|e| !e.flow.is_empty()));

        display.handle(ViewEvent::ToggleFlow);
        let out = display.step(Time(1000.05), 0.05);
        assert!(out.edges.iter().all(|e| e.flow.is_empty()));
    }

    #[test]
    fn stale_nodes_hidden_then_dimmed() {
        let (tx, mut display) = display(DisplayConfig::default());
        tx.send(json!({"id": "fresh", "lat": 1.0, "lon": 1.0, "timestamp": 1000.0}))
            .unwrap();
        tx.send(json!({"id": "old", "lat": 1.001, "lon": 1.0, "timestamp": 600.0}))
            .unwrap();

        let out = display.step(Time(1000.0), 0.05);
        let ids: Vec<_> = out.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["fresh"]);
        assert_eq!(out.heard, 2);
        assert_eq!(out.all.len(), 2);
        assert_eq!(out.mapped.len(), 2);

        display.handle(ViewEvent::ToggleHideStale);
        let out = display.step(Time(1000.0), 0.05);
        assert_eq!(out.nodes.len(), 2);
        let old = out.nodes.iter().find(|n| n.id.as_str() == "old").unwrap();
        assert!(old.stale);
        assert_close(old.age_s, 400.0, 1e-9);
    }

    #[test]
    fn drops_are_counted_and_reported() {
        let (tx, mut display) = display(DisplayConfig::default());
        tx.send(json!({"name": "no id"})).unwrap();
        tx.send(json!({"id": "x", "latitude": "north"})).unwrap();
        tx.send(json!({"id": "ok"})).unwrap();

        let out = display.step(Time(5.0), 0.05);
        assert_eq!(out.ingest.applied, 1);
        assert_eq!(out.ingest.dropped, 2);
        assert_eq!(out.ingest.total_dropped, 2);
        assert!(out.nodes.is_empty());
        assert!(out.origin.is_none());
        assert!(out.grid.is_empty());
        assert!(out.reticle.is_none());
        assert_eq!(display.drain_events().iter().filter(|e| e.kind == "ingest.drop").count(), 2);
    }

    #[tokio::test]
    async fn rejected_source_lines_count_as_drops() {
        let (tx, queue) = update_channel();
        let store = Arc::new(NodeStore::new());
        let status = Arc::new(SourceStatus::new("test"));
        let mut display =
            Display::new(DisplayConfig::default(), store, queue, Arc::clone(&status));

        let input = b"{\"id\":\"a\"}\nnot json\n{\"id\":\"\xff\"}\n{\"name\":\"no id\"}\n";
        let summary = pump_lines(BufReader::new(&input[..]), tx, Arc::clone(&status))
            .await
            .unwrap();
        assert_eq!(summary.rejected, 2);

        let out = display.step(Time(5.0), 0.05);
        assert_eq!(out.ingest.applied, 1);
        assert_eq!(out.ingest.dropped, 3);
        assert_eq!(out.ingest.total_dropped, 3);
        assert_eq!(out.status.rejected, 2);
        let drops: Vec<String> = display
            .drain_events()
            .into_iter()
            .filter(|e| e.kind == "ingest.drop")
            .map(|e| e.message)
            .collect();
        assert_eq!(drops.len(), 2);
        assert_eq!(drops[0], "2 lines were not valid JSON");

        let out = display.step(Time(6.0), 0.05);
        assert_eq!(out.ingest.dropped, 0);
        assert_eq!(out.ingest.total_dropped, 3);
    }

    #[test]
    fn budget_spreads_bursts_over_frames() {
        let config = DisplayConfig {
            drain_budget: 2,
            ..DisplayConfig::default()
        };
        let (tx, mut display) = display(config);
        for i in 0..5 {
            tx.send(json!({"id": format!("n{i}")})).unwrap();
        }
        drop(tx);

        let first = display.step(Time(1.0), 0.05);
        assert_eq!(first.ingest.applied, 2);
        assert!(first.ingest.backlog);
        assert_eq!(first.ingest.pending, 3);

        display.step(Time(1.05), 0.05);
        let third = display.step(Time(1.1), 0.05);
        assert_eq!(third.ingest.total_applied, 5);
        assert_eq!(third.heard, 5);
        assert!(display.is_source_closed());
        assert_eq!(third.frame, 2);
    }

    #[test]
    fn labels_and_target_follow_toggles() {
        let (tx, mut display) = display(DisplayConfig::default());
        send_triangle(&tx, 10.0);
        let out = display.step(Time(10.0), 0.05);
        assert!(out.nodes.iter().all(|n| n.label.is_some()));
        assert!(out.reticle.is_some());
        assert!(!out.grid.is_empty());

        display.handle(ViewEvent::ToggleLabels);
        display.handle(ViewEvent::ToggleTarget);
        let out = display.step(Time(10.05), 0.05);
        assert!(out.nodes.iter().all(|n| n.label.is_none()));
        assert!(out.reticle.is_none());
    }

    #[test]
    fn output_serializes() {
        let (tx, mut display) = display(DisplayConfig::default());
        send_triangle(&tx, 10.0);
        let out = display.step(Time(10.0), 0.05);
        let value = serde_json::to_value(&out).unwrap();
        assert_eq!(value["link_mode"], "mst_knn");
        assert_eq!(value["nodes"].as_array().unwrap().len(), 3);
        assert_eq!(value["view"]["zoom_mode"], "fit");
    }
}
