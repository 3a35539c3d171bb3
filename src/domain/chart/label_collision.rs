//! Greedy collision filtering of label boxes.

use super::value_objects::LabelBox;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Seed of the adaptive search when the given spacing is not positive.
pub const MIN_ADAPTIVE_SPACING_PX: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    pub min_spacing_px: f64,
    pub target_density: f64,
    pub density_tolerance: f64,
    pub max_iterations: usize,
    pub grow_factor: f64,
    pub shrink_factor: f64,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            min_spacing_px: 8.0,
            target_density: 0.7,
            density_tolerance: 0.05,
            max_iterations: 10,
            grow_factor: 1.25,
            shrink_factor: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelResolution {
    pub visible: Vec<LabelBox>,
    pub hidden: Vec<LabelBox>,
    /// Candidates rejected for overlapping an accepted label.
    pub collision_count: usize,
    /// Share of the candidate extent covered by accepted labels.
    pub density: f64,
    pub spacing: f64,
}

impl LabelResolution {
    pub fn visible_ids(&self) -> Vec<usize> {
        self.visible.iter().map(|b| b.id).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct LabelCollisionResolver {
    config: LabelConfig,
}

impl LabelCollisionResolver {
    pub fn new(config: LabelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LabelConfig {
        &self.config
    }

    pub fn resolve(&self, boxes: &[LabelBox], min_spacing: f64) -> LabelResolution {
        self.resolve_with_critical(boxes, &[], min_spacing)
    }

    /// Critical boxes are accepted first and unconditionally.
    pub fn resolve_with_critical(&self, boxes: &[LabelBox], critical_ids: &[usize], min_spacing: f64) -> LabelResolution {
        let margin = if min_spacing.is_finite() { min_spacing.max(0.0) / 2.0 } else { 0.0 };
        let critical: HashSet<usize> = critical_ids.iter().copied().collect();

        let mut accepted: Vec<(LabelBox, LabelBox)> = Vec::with_capacity(boxes.len());
        let mut hidden = Vec::new();
        let mut collisions = 0;

        let (forced, mut rest): (Vec<&LabelBox>, Vec<&LabelBox>) =
            boxes.iter().filter(|b| is_usable(b)).partition(|b| critical.contains(&b.id));
        accepted.extend(forced.into_iter().map(|b| (*b, b.expanded(margin))));

        // majors first, then priority; sort_by is stable for equal keys
        rest.sort_by(|a, b| b.is_major.cmp(&a.is_major).then(b.priority.cmp(&a.priority)));
        for candidate in rest {
            let grown = candidate.expanded(margin);
            if accepted.iter().any(|(_, other)| grown.overlaps(other)) {
                collisions += 1;
                hidden.push(*candidate);
            } else {
                accepted.push((*candidate, grown));
            }
        }
        hidden.extend(boxes.iter().filter(|b| !is_usable(b)).copied());

        let density = density(boxes, &accepted, margin);
        LabelResolution {
            visible: accepted.into_iter().map(|(b, _)| b).collect(),
            hidden,
            collision_count: collisions,
            density,
            spacing: min_spacing,
        }
    }

    /// Search spacing toward the target density and return the closest result.
    pub fn resolve_adaptive(&self, boxes: &[LabelBox], initial_spacing: f64) -> LabelResolution {
        let cfg = &self.config;
        let mut spacing =
            if initial_spacing.is_finite() && initial_spacing > 0.0 { initial_spacing } else { MIN_ADAPTIVE_SPACING_PX };
        let mut best: Option<LabelResolution> = None;

        for _ in 0..cfg.max_iterations.max(1) {
            let current = self.resolve(boxes, spacing);
            let error = (current.density - cfg.target_density).abs();
            let settled = error <= cfg.density_tolerance;
            let next = spacing * if current.density > cfg.target_density { cfg.grow_factor } else { cfg.shrink_factor };
            if best.as_ref().is_none_or(|b| error < (b.density - cfg.target_density).abs()) {
                best = Some(current);
            }
            if settled {
                break;
            }
            spacing = next;
        }
        best.unwrap_or_else(|| self.resolve(boxes, spacing))
    }
}

fn is_usable(b: &LabelBox) -> bool {
    [b.x, b.y, b.width, b.height].iter().all(|v| v.is_finite()) && b.width >= 0.0 && b.height >= 0.0
}

/// Union length of accepted x-intervals over the span of all candidates,
/// both measured on expanded boxes.
fn density(candidates: &[LabelBox], accepted: &[(LabelBox, LabelBox)], margin: f64) -> f64 {
    let usable = candidates.iter().filter(|b| is_usable(b));
    let (lo, hi) = usable.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), b| {
        (lo.min(b.x - margin), hi.max(b.x + b.width + margin))
    });
    let extent = hi - lo;
    if !extent.is_finite() || extent <= 0.0 {
        return 0.0;
    }

    let mut intervals: Vec<(f64, f64)> = accepted.iter().map(|(_, g)| (g.x, g.x + g.width)).collect();
    intervals.sort_by(|a, b| a.0.total_cmp(&b.0));
    let mut covered = 0.0;
    let mut current: Option<(f64, f64)> = None;
    for (start, end) in intervals {
        current = match current {
            Some((cs, ce)) if start <= ce => Some((cs, ce.max(end))),
            Some((cs, ce)) => {
                covered += ce - cs;
                Some((start, end))
            }
            None => Some((start, end)),
        };
    }
    if let Some((cs, ce)) = current {
        covered += ce - cs;
    }
    covered / extent
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_boxes_do_not_collide() {
        let resolver = LabelCollisionResolver::default();
        let boxes = [LabelBox::new(0, 0.0, 0.0, 10.0, 10.0), LabelBox::new(1, 10.0, 0.0, 10.0, 10.0)];
        let out = resolver.resolve(&boxes, 0.0);
        assert_eq!(out.visible.len(), 2);
        assert_eq!(out.collision_count, 0);
        assert!((out.density - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_input_has_zero_density() {
        let out = LabelCollisionResolver::default().resolve(&[], 8.0);
        assert!(out.visible.is_empty());
        assert_eq!(out.density, 0.0);
    }
}
