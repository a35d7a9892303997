use std::collections::{BTreeMap, BTreeSet};

use azimuth_common::types::{Point, PointNumber};

/// Working copy of the points touched by one page of events.
///
/// The controller loads every point a page may read before resolving it, so
/// resolvers work synchronously against this set. A point that was loaded but
/// does not exist is remembered as absent. Changed points are collected with
/// [`PointSet::into_dirty`] and committed together with the page.
#[derive(Debug, Default, Clone)]
pub struct PointSet {
    points: BTreeMap<PointNumber, Option<Point>>,
    dirty: BTreeSet<PointNumber>,
}

impl PointSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self, number: PointNumber) -> bool {
        self.points.contains_key(&number)
    }

    /// Records the stored state of `number`. Ignored once the point is loaded,
    /// so changes made earlier in the page are never overwritten.
    pub fn preload(&mut self, number: PointNumber, point: Option<Point>) {
        self.points.entry(number).or_insert(point);
    }

    pub fn get(&self, number: PointNumber) -> Option<&Point> {
        self.points.get(&number).and_then(Option::as_ref)
    }

    /// Mutable access; marks the point as changed.
    pub fn get_mut(&mut self, number: PointNumber) -> Option<&mut Point> {
        let point = self.points.get_mut(&number).and_then(Option::as_mut)?;
        self.dirty.insert(number);
        Some(point)
    }

    pub fn contains(&self, number: PointNumber) -> bool {
        self.get(number).is_some()
    }

    pub fn insert(&mut self, point: Point) {
        self.dirty.insert(point.number);
        self.points.insert(point.number, Some(point));
    }

    /// Points changed since loading, in number order.
    pub fn into_dirty(mut self) -> Vec<Point> {
        self.dirty
            .iter()
            .filter_map(|number| self.points.remove(number).flatten())
            .collect()
    }
}
