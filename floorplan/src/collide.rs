//! Obstacle avoidance along the drag vector.
//!
//! Dragged tables must never come to rest overlapping a no-go zone. Rather
//! than rejecting a colliding pointer position outright (which makes the table
//! stick as soon as the pointer crosses an obstacle), the engine slides the
//! table as far along the drag vector as it can go: a bisection over
//! `t ∈ [0, 1]` between the last known free centre and the proposed centre
//! finds the largest `t` whose footprint is still free.

#[cfg(test)]
#[path = "collide_test.rs"]
mod collide_test;

use crate::camera::Point;
use crate::consts::COLLISION_SEARCH_ITERS;
use crate::doc::Obstacle;
use crate::geometry::Footprint;

/// True when `footprint` overlaps any obstacle.
#[must_use]
pub fn collides_any(footprint: &Footprint, obstacles: &[Obstacle]) -> bool {
    obstacles
        .iter()
        .any(|obstacle| footprint.intersects(&obstacle.footprint()))
}

/// Resolve the centre a dragged footprint can actually reach.
///
/// `from` is the last centre known to be free, `to` the centre the pointer
/// proposes. Returns `to` unchanged when it is free, otherwise bisects the
/// segment `from → to` and returns the furthest free centre found. `from`
/// itself is the fallback when no progress is possible.
#[must_use]
pub fn resolve_drag(footprint: &Footprint, from: Point, to: Point, obstacles: &[Obstacle]) -> Point {
    if obstacles.is_empty() || !collides_any(&footprint.at(to), obstacles) {
        return to;
    }
    if collides_any(&footprint.at(from), obstacles) {
        // The gesture's free anchor is itself bad (stale data); don't fight it.
        return to;
    }

    // Invariant: `lo` is always free, `hi` always colliding.
    let mut lo = 0.0_f64;
    let mut hi = 1.0_f64;
    for _ in 0..COLLISION_SEARCH_ITERS {
        let mid = (lo + hi) * 0.5;
        let candidate = lerp(from, to, mid);
        if collides_any(&footprint.at(candidate), obstacles) {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    lerp(from, to, lo)
}

fn lerp(a: Point, b: Point, t: f64) -> Point {
    Point::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
}
