//! Distance-limited join between unit centroids and catchment anchors.

use rstar::RTree;
use rstar::primitives::GeomWithData;
use walkability_geography_models::{AnchorPoint, CatchmentLink, GeographicUnit};

type AnchorEntry = GeomWithData<[f64; 2], usize>;

/// R-tree over catchment anchors (transit stops, park entrances).
pub struct AnchorIndex {
    tree: RTree<AnchorEntry>,
    anchors: Vec<AnchorPoint>,
}

impl AnchorIndex {
    /// Bulk-loads `anchors` into the R-tree.
    #[must_use]
    pub fn new(anchors: Vec<AnchorPoint>) -> Self {
        let entries = anchors
            .iter()
            .enumerate()
            .map(|(i, anchor)| GeomWithData::new([anchor.location.x, anchor.location.y], i))
            .collect();

        Self {
            tree: RTree::bulk_load(entries),
            anchors,
        }
    }

    /// Number of indexed anchors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// Whether the index holds no anchors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Links every unit centroid to every anchor at planar distance
    /// `<= radius_ft`.
    ///
    /// Units without a centroid produce no links. Links are ordered by unit
    /// id, then anchor id.
    #[must_use]
    pub fn links_within(&self, units: &[GeographicUnit], radius_ft: f64) -> Vec<CatchmentLink> {
        let radius_sq = radius_ft * radius_ft;
        let mut links = Vec::new();
        let mut skipped = 0_usize;

        for unit in units {
            let Some(centroid) = unit.centroid else {
                skipped += 1;
                continue;
            };

            for entry in self
                .tree
                .locate_within_distance([centroid.x, centroid.y], radius_sq)
            {
                let anchor = &self.anchors[entry.data];
                let length_ft = centroid.distance_to(anchor.location);
                if length_ft <= radius_ft {
                    links.push(CatchmentLink {
                        unit_id: unit.id.clone(),
                        anchor_id: anchor.id.clone(),
                        length_ft,
                    });
                }
            }
        }

        if skipped > 0 {
            log::warn!("{skipped} unit(s) have no centroid and get no catchment links");
        }

        links.sort_by(|a, b| a.unit_id.cmp(&b.unit_id).then_with(|| a.anchor_id.cmp(&b.anchor_id)));
        log::debug!(
            "{} catchment link(s) within {radius_ft} ft of {} anchor(s)",
            links.len(),
            self.anchors.len()
        );

        links
    }
}
