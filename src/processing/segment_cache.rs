use std::collections::HashMap;
use std::sync::Arc;

use crate::processing::geometry::{BufferId, GeometryInput, VertexBuffer};
use crate::processing::geometry_pool::{GeometryRequest, GeometryResponse};
use crate::processing::statistics::SegmentStats;
use crate::render::scene::{ChannelScene, SceneObject};
use crate::state::entities::{Channel, DataSegment, DisplayType, SegmentId};

/// The time window and render-space bounds geometry is built against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderWindow {
    pub display_start: f64,
    pub display_end: f64,
    pub gl_min: f64,
    pub gl_max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Request sent, no result yet.
    Pending,
    Loaded,
    /// No samples; kept so it is not requested again.
    Empty,
}

#[derive(Debug)]
struct CacheEntry {
    segment: Arc<DataSegment>,
    stats: Option<SegmentStats>,
    state: EntryState,
    buffer: Option<Arc<VertexBuffer>>,
}

/// Result of one reconciliation pass.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    pub requests: Vec<GeometryRequest>,
    /// Vertex buffers no scene object refers to anymore.
    pub retired: Vec<BufferId>,
    pub added: Vec<SegmentId>,
    pub removed: Vec<SegmentId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    Applied,
    /// Segment no longer tracked, already loaded, or from an older generation.
    Discarded,
    Failed(crate::error::GeometryError),
}

/// Tracks which of a channel's segments are resident in its scene.
///
/// Keys are segment identities, so replacing a segment with a structurally
/// equal one still reloads it.
#[derive(Debug)]
pub struct SegmentCache {
    owner: String,
    entries: HashMap<SegmentId, CacheEntry>,
    generation: u64,
    window: Option<RenderWindow>,
    display_types: Vec<DisplayType>,
}

impl SegmentCache {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            entries: HashMap::new(),
            generation: 0,
            window: None,
            display_types: Vec::new(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, segment_id: SegmentId) -> bool {
        self.entries.contains_key(&segment_id)
    }

    pub fn state(&self, segment_id: SegmentId) -> Option<EntryState> {
        self.entries.get(&segment_id).map(|e| e.state)
    }

    pub fn pending(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.state == EntryState::Pending)
            .count()
    }

    /// Statistics of every tracked segment that has samples.
    pub fn stats(&self) -> impl Iterator<Item = &SegmentStats> {
        self.entries.values().filter_map(|e| e.stats.as_ref())
    }

    /// Diffs the channel's declared segments against the cache.
    ///
    /// Stale segments leave the scene right away. Each new segment with
    /// samples yields a request; the caller submits them. A changed render
    /// window reloads everything under a new generation.
    pub fn reconcile(
        &mut self,
        channel: &Channel,
        display_types: &[DisplayType],
        window: RenderWindow,
        scene: &mut ChannelScene,
    ) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();

        if self.window != Some(window) {
            if self.window.is_some() {
                tracing::debug!(
                    "Render window changed for {}, reloading {} segments",
                    self.owner,
                    self.entries.len()
                );
            }
            outcome.retired.extend(self.invalidate(scene));
            self.window = Some(window);
        }

        if self.display_types != display_types {
            self.display_types = display_types.to_vec();
            self.rebuild_objects(scene);
        }

        let stale: Vec<SegmentId> = self
            .entries
            .keys()
            .copied()
            .filter(|id| !channel.segments.iter().any(|s| s.id() == *id))
            .collect();
        for id in stale {
            self.entries.remove(&id);
            outcome.retired.extend(scene.remove_segment(id));
            outcome.removed.push(id);
        }

        for segment in &channel.segments {
            let id = segment.id();
            if self.entries.contains_key(&id) {
                continue;
            }

            let stats = SegmentStats::compute(&segment.samples);
            let state = if segment.is_empty() {
                EntryState::Empty
            } else {
                outcome.requests.push(GeometryRequest {
                    owner: self.owner.clone(),
                    generation: self.generation,
                    input: GeometryInput {
                        segment: Arc::clone(segment),
                        sample_rate: channel.sample_rate,
                        display_start: window.display_start,
                        display_end: window.display_end,
                        gl_min: window.gl_min,
                        gl_max: window.gl_max,
                    },
                });
                EntryState::Pending
            };

            self.entries.insert(
                id,
                CacheEntry {
                    segment: Arc::clone(segment),
                    stats,
                    state,
                    buffer: None,
                },
            );
            outcome.added.push(id);
        }

        if !outcome.added.is_empty() || !outcome.removed.is_empty() {
            tracing::debug!(
                "{}: {} segments added, {} removed, {} requests",
                self.owner,
                outcome.added.len(),
                outcome.removed.len(),
                outcome.requests.len()
            );
        }

        outcome
    }

    /// Adds a finished build to the scene if it still belongs here.
    ///
    /// A failed build drops the entry, so the next reconciliation asks for
    /// it again.
    pub fn apply(&mut self, response: GeometryResponse, scene: &mut ChannelScene) -> ApplyOutcome {
        if response.owner != self.owner || response.generation != self.generation {
            tracing::debug!(
                "Dropping geometry from generation {} for {} (now {})",
                response.generation,
                response.owner,
                self.generation
            );
            return ApplyOutcome::Discarded;
        }

        let Some(entry) = self.entries.get_mut(&response.segment_id) else {
            tracing::debug!("Dropping geometry for untracked segment {:?}", response.segment_id);
            return ApplyOutcome::Discarded;
        };
        if entry.state != EntryState::Pending {
            return ApplyOutcome::Discarded;
        }

        match response.result {
            Ok(buffer) => {
                for &display_type in &self.display_types {
                    scene.add(SceneObject {
                        segment_id: response.segment_id,
                        display_type,
                        buffer: Arc::clone(&buffer),
                    });
                }
                entry.buffer = Some(buffer);
                entry.state = EntryState::Loaded;
                ApplyOutcome::Applied
            }
            Err(e) => {
                tracing::warn!(
                    "Geometry for segment {:?} of {} failed: {e}",
                    response.segment_id,
                    self.owner
                );
                self.entries.remove(&response.segment_id);
                ApplyOutcome::Failed(e)
            }
        }
    }

    /// Forgets every segment and starts a new generation, so in-flight
    /// results are discarded on arrival.
    pub fn invalidate(&mut self, scene: &mut ChannelScene) -> Vec<BufferId> {
        self.entries.clear();
        self.generation += 1;
        scene.clear_objects()
    }

    /// Re-creates scene objects from loaded buffers, for a display-type change.
    fn rebuild_objects(&mut self, scene: &mut ChannelScene) {
        for (id, entry) in &self.entries {
            let Some(buffer) = &entry.buffer else {
                continue;
            };
            scene.remove_segment(*id);
            for &display_type in &self.display_types {
                scene.add(SceneObject {
                    segment_id: *id,
                    display_type,
                    buffer: Arc::clone(buffer),
                });
            }
        }
    }

    /// Segment handles currently tracked, in no particular order.
    pub fn segments(&self) -> impl Iterator<Item = &Arc<DataSegment>> {
        self.entries.values().map(|e| &e.segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeometryError;
    use crate::processing::geometry::build_vertex_buffer;

    const WINDOW: RenderWindow = RenderWindow {
        display_start: 0.0,
        display_end: 10.0,
        gl_min: 0.0,
        gl_max: 100.0,
    };

    fn build(request: &GeometryRequest) -> GeometryResponse {
        GeometryResponse {
            owner: request.owner.clone(),
            generation: request.generation,
            segment_id: request.segment_id(),
            result: build_vertex_buffer(&request.input).map(Arc::new),
        }
    }

    fn channel(segments: Vec<Arc<DataSegment>>) -> Channel {
        Channel::new("c1", "BHZ", 1.0).with_segments(segments)
    }

    #[test]
    fn new_segments_are_requested_once() {
        let mut cache = SegmentCache::new("c1");
        let mut scene = ChannelScene::new();
        let ch = channel(vec![DataSegment::new(0.0, vec![1.0, 2.0])]);

        let first = cache.reconcile(&ch, &[DisplayType::Line], WINDOW, &mut scene);
        assert_eq!(first.requests.len(), 1);
        let second = cache.reconcile(&ch, &[DisplayType::Line], WINDOW, &mut scene);
        assert!(second.requests.is_empty());
        assert_eq!(cache.pending(), 1);

        assert_eq!(cache.apply(build(&first.requests[0]), &mut scene), ApplyOutcome::Applied);
        assert_eq!(scene.objects().len(), 1);
        assert_eq!(cache.pending(), 0);
    }

    #[test]
    fn removed_segment_leaves_the_scene() {
        let mut cache = SegmentCache::new("c1");
        let mut scene = ChannelScene::new();
        let keep = DataSegment::new(0.0, vec![1.0]);
        let drop = DataSegment::new(5.0, vec![2.0]);
        let ch = channel(vec![Arc::clone(&keep), Arc::clone(&drop)]);
        let out = cache.reconcile(&ch, &[DisplayType::Line], WINDOW, &mut scene);
        for r in &out.requests {
            cache.apply(build(r), &mut scene);
        }
        assert!(scene.has_segment(drop.id()));

        let out = cache.reconcile(&channel(vec![Arc::clone(&keep)]), &[DisplayType::Line], WINDOW, &mut scene);
        assert_eq!(out.removed, vec![drop.id()]);
        assert_eq!(out.retired.len(), 1);
        assert!(!scene.has_segment(drop.id()));
        assert!(scene.has_segment(keep.id()));
    }

    #[test]
    fn structurally_equal_replacement_reloads() {
        let mut cache = SegmentCache::new("c1");
        let mut scene = ChannelScene::new();
        let a = DataSegment::new(0.0, vec![1.0, 2.0]);
        cache.reconcile(&channel(vec![Arc::clone(&a)]), &[DisplayType::Line], WINDOW, &mut scene);

        let b = DataSegment::new(0.0, vec![1.0, 2.0]);
        let out = cache.reconcile(&channel(vec![Arc::clone(&b)]), &[DisplayType::Line], WINDOW, &mut scene);
        assert_eq!(out.removed, vec![a.id()]);
        assert_eq!(out.added, vec![b.id()]);
        assert_eq!(out.requests.len(), 1);
    }

    #[test]
    fn empty_segment_is_a_placeholder() {
        let mut cache = SegmentCache::new("c1");
        let mut scene = ChannelScene::new();
        let empty = DataSegment::new(0.0, Vec::new());
        let ch = channel(vec![Arc::clone(&empty)]);
        let out = cache.reconcile(&ch, &[DisplayType::Line], WINDOW, &mut scene);
        assert!(out.requests.is_empty());
        assert_eq!(cache.state(empty.id()), Some(EntryState::Empty));
        let again = cache.reconcile(&ch, &[DisplayType::Line], WINDOW, &mut scene);
        assert!(again.requests.is_empty() && again.added.is_empty());
    }

    #[test]
    fn late_result_for_removed_segment_is_dropped() {
        let mut cache = SegmentCache::new("c1");
        let mut scene = ChannelScene::new();
        let seg = DataSegment::new(0.0, vec![1.0]);
        let out = cache.reconcile(&channel(vec![Arc::clone(&seg)]), &[DisplayType::Line], WINDOW, &mut scene);
        cache.reconcile(&channel(Vec::new()), &[DisplayType::Line], WINDOW, &mut scene);

        assert_eq!(cache.apply(build(&out.requests[0]), &mut scene), ApplyOutcome::Discarded);
        assert!(scene.objects().is_empty());
    }

    #[test]
    fn window_change_reloads_under_new_generation() {
        let mut cache = SegmentCache::new("c1");
        let mut scene = ChannelScene::new();
        let ch = channel(vec![DataSegment::new(0.0, vec![1.0])]);
        let old = cache.reconcile(&ch, &[DisplayType::Line], WINDOW, &mut scene);

        let wider = RenderWindow {
            display_end: 20.0,
            gl_max: 200.0,
            ..WINDOW
        };
        let new = cache.reconcile(&ch, &[DisplayType::Line], wider, &mut scene);
        assert_eq!(new.requests.len(), 1);
        assert!(new.requests[0].generation > old.requests[0].generation);

        assert_eq!(cache.apply(build(&old.requests[0]), &mut scene), ApplyOutcome::Discarded);
        assert_eq!(cache.apply(build(&new.requests[0]), &mut scene), ApplyOutcome::Applied);
    }

    #[test]
    fn failed_build_is_retried_on_next_update() {
        let mut cache = SegmentCache::new("c1");
        let mut scene = ChannelScene::new();
        let ch = channel(vec![DataSegment::new(0.0, vec![1.0])]);
        let out = cache.reconcile(&ch, &[DisplayType::Line], WINDOW, &mut scene);
        let failed = GeometryResponse {
            result: Err(GeometryError::WorkerPanicked("boom".into())),
            ..build(&out.requests[0])
        };
        assert!(matches!(cache.apply(failed, &mut scene), ApplyOutcome::Failed(_)));
        assert!(scene.objects().is_empty());

        let retry = cache.reconcile(&ch, &[DisplayType::Line], WINDOW, &mut scene);
        assert_eq!(retry.requests.len(), 1);
    }

    #[test]
    fn both_display_types_share_a_buffer() {
        let mut cache = SegmentCache::new("c1");
        let mut scene = ChannelScene::new();
        let ch = channel(vec![DataSegment::new(0.0, vec![1.0, 2.0])]);
        let both = [DisplayType::Line, DisplayType::Scatter];
        let out = cache.reconcile(&ch, &both, WINDOW, &mut scene);
        cache.apply(build(&out.requests[0]), &mut scene);
        let objects = scene.objects();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].buffer.id(), objects[1].buffer.id());

        // Dropping scatter rebuilds objects without a worker round trip.
        let out = cache.reconcile(&ch, &[DisplayType::Line], WINDOW, &mut scene);
        assert!(out.requests.is_empty());
        assert_eq!(scene.objects().len(), 1);
    }
}
