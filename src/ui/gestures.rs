//! Pointer drag state machine shared by every drag interaction.
//!
//! `Idle -> Armed` on press, `Armed -> Dragging` once the pointer travels
//! past the threshold along the gesture's axis, and `-> Committed` on
//! release. A release from `Armed` commits as a click.

use egui::{Pos2, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Armed,
    Dragging,
    Committed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragAxis {
    Horizontal,
    Vertical,
    Both,
}

impl DragAxis {
    fn distance(&self, delta: Vec2) -> f32 {
        match self {
            DragAxis::Horizontal => delta.x.abs(),
            DragAxis::Vertical => delta.y.abs(),
            DragAxis::Both => delta.length(),
        }
    }
}

/// What a pointer move did to the gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// Nothing to react to.
    None,
    /// Crossed the threshold on this move.
    Started { delta: Vec2 },
    /// Already dragging; `delta` is since the previous move.
    Moved { delta: Vec2 },
}

/// Emitted once on release.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Commit<K> {
    pub kind: K,
    pub origin: Pos2,
    pub end: Pos2,
    /// False when the threshold was never crossed, i.e. a click.
    pub dragged: bool,
}

#[derive(Debug, Clone)]
pub struct DragGesture<K> {
    phase: Phase,
    kind: Option<K>,
    origin: Pos2,
    last: Pos2,
    threshold: f32,
    axis: DragAxis,
}

impl<K: Copy> DragGesture<K> {
    pub fn new(threshold: f32, axis: DragAxis) -> Self {
        Self {
            phase: Phase::Idle,
            kind: None,
            origin: Pos2::ZERO,
            last: Pos2::ZERO,
            threshold: threshold.max(0.0),
            axis,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn kind(&self) -> Option<K> {
        match self.phase {
            Phase::Armed | Phase::Dragging => self.kind,
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, Phase::Armed | Phase::Dragging)
    }

    pub fn is_dragging(&self) -> bool {
        self.phase == Phase::Dragging
    }

    pub fn origin(&self) -> Pos2 {
        self.origin
    }

    pub fn current(&self) -> Pos2 {
        self.last
    }

    /// Press. Ignored while another gesture is in progress.
    pub fn arm(&mut self, kind: K, pos: Pos2) -> bool {
        if self.is_active() {
            return false;
        }
        self.phase = Phase::Armed;
        self.kind = Some(kind);
        self.origin = pos;
        self.last = pos;
        true
    }

    /// Re-arms with a different threshold, e.g. one relative to the current
    /// view width.
    pub fn arm_with_threshold(&mut self, kind: K, pos: Pos2, threshold: f32) -> bool {
        if self.is_active() {
            return false;
        }
        self.threshold = threshold.max(0.0);
        self.arm(kind, pos)
    }

    pub fn update(&mut self, pos: Pos2) -> Step {
        match self.phase {
            Phase::Armed => {
                if self.axis.distance(pos - self.origin) > self.threshold {
                    let delta = pos - self.last;
                    self.last = pos;
                    self.phase = Phase::Dragging;
                    Step::Started { delta }
                } else {
                    Step::None
                }
            }
            Phase::Dragging => {
                let delta = pos - self.last;
                self.last = pos;
                if delta == Vec2::ZERO {
                    Step::None
                } else {
                    Step::Moved { delta }
                }
            }
            Phase::Idle | Phase::Committed => Step::None,
        }
    }

    /// Release. Returns the commit for an active gesture.
    pub fn release(&mut self, pos: Pos2) -> Option<Commit<K>> {
        if !self.is_active() {
            return None;
        }
        // A final move may cross the threshold on the release frame.
        self.update(pos);
        let kind = self.kind?;
        let commit = Commit {
            kind,
            origin: self.origin,
            end: self.last,
            dragged: self.phase == Phase::Dragging,
        };
        self.phase = Phase::Committed;
        Some(commit)
    }

    pub fn cancel(&mut self) {
        self.phase = Phase::Idle;
        self.kind = None;
    }

    /// Moves the last-accepted position without producing a step. Used when
    /// an owner rejects a move and wants the next delta measured from the
    /// last accepted point.
    pub fn hold_at(&mut self, pos: Pos2) {
        self.last = pos;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Kind {
        Zoom,
        Other,
    }

    #[test]
    fn click_without_crossing_threshold() {
        let mut g = DragGesture::new(5.0, DragAxis::Horizontal);
        assert!(g.arm(Kind::Zoom, Pos2::new(10.0, 10.0)));
        assert_eq!(g.update(Pos2::new(13.0, 40.0)), Step::None);
        let commit = g.release(Pos2::new(14.0, 40.0));
        assert_eq!(commit.map(|c| c.dragged), Some(false));
        assert_eq!(g.phase(), Phase::Committed);
    }

    #[test]
    fn crossing_threshold_starts_drag() {
        let mut g = DragGesture::new(5.0, DragAxis::Horizontal);
        g.arm(Kind::Zoom, Pos2::new(0.0, 0.0));
        assert_eq!(
            g.update(Pos2::new(6.0, 0.0)),
            Step::Started {
                delta: Vec2::new(6.0, 0.0)
            }
        );
        assert_eq!(
            g.update(Pos2::new(8.0, 1.0)),
            Step::Moved {
                delta: Vec2::new(2.0, 1.0)
            }
        );
        let commit = g.release(Pos2::new(8.0, 1.0));
        assert!(matches!(commit, Some(Commit { kind: Kind::Zoom, dragged: true, .. })));
    }

    #[test]
    fn second_press_is_ignored_while_active() {
        let mut g = DragGesture::new(1.0, DragAxis::Both);
        g.arm(Kind::Zoom, Pos2::ZERO);
        assert!(!g.arm(Kind::Other, Pos2::ZERO));
        assert_eq!(g.kind(), Some(Kind::Zoom));
        g.cancel();
        assert!(g.arm(Kind::Other, Pos2::ZERO));
    }

    #[test]
    fn release_when_idle_is_nothing() {
        let mut g: DragGesture<Kind> = DragGesture::new(1.0, DragAxis::Vertical);
        assert!(g.release(Pos2::ZERO).is_none());
        assert_eq!(g.update(Pos2::new(0.0, 50.0)), Step::None);
    }

    #[test]
    fn release_frame_can_cross_threshold() {
        let mut g = DragGesture::new(1.0, DragAxis::Vertical);
        g.arm(Kind::Other, Pos2::ZERO);
        let commit = g.release(Pos2::new(0.0, 3.0));
        assert_eq!(commit.map(|c| c.dragged), Some(true));
    }
}
