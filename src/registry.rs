//! Photo identity to live overlay entity bookkeeping.

use crate::ir::{Photo, PhotoId};
use crate::layout::{AnchorNode, LabelNode};
use crate::map::ScreenPoint;
use crate::render::{OverlayRenderer, VisualHandle};
use std::collections::{BTreeMap, HashSet};

/// Handles of the pin, connector and callout drawn for one photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityVisuals {
    pub pin: VisualHandle,
    pub connector: VisualHandle,
    pub callout: VisualHandle,
}

impl EntityVisuals {
    fn destroy<R: OverlayRenderer>(self, renderer: &mut R) {
        renderer.destroy(self.connector);
        renderer.destroy(self.callout);
        renderer.destroy(self.pin);
    }
}

/// The visual triple bound to a photo, plus the geometry it is drawn from.
#[derive(Debug, Clone)]
pub struct OverlayEntity {
    photo: Photo,
    visuals: EntityVisuals,
    anchor: AnchorNode,
    label: LabelNode,
    separation: f64,
}

impl OverlayEntity {
    pub fn new(
        photo: Photo,
        visuals: EntityVisuals,
        anchor: AnchorNode,
        label: LabelNode,
        separation: f64,
    ) -> Self {
        Self {
            photo,
            visuals,
            anchor,
            label,
            separation,
        }
    }

    pub fn photo(&self) -> &Photo {
        &self.photo
    }

    pub fn visuals(&self) -> EntityVisuals {
        self.visuals
    }

    pub fn anchor(&self) -> &AnchorNode {
        &self.anchor
    }

    pub fn label(&self) -> &LabelNode {
        &self.label
    }

    /// Connector target separation; fixed for the entity's lifetime.
    pub fn separation(&self) -> f64 {
        self.separation
    }

    /// Move the anchor and re-seed the label on top of it.
    pub fn reposition(&mut self, anchor: ScreenPoint) {
        self.anchor = AnchorNode::at(anchor);
        self.label = LabelNode::seeded(&self.anchor, self.label.width, self.label.height);
    }

    pub(crate) fn set_label_position(&mut self, position: ScreenPoint) {
        self.label.position = position;
    }

    pub(crate) fn replace_photo(&mut self, photo: Photo) {
        self.photo = photo;
    }
}

#[derive(Debug, Default)]
pub struct OverlayEntityRegistry {
    entities: BTreeMap<PhotoId, OverlayEntity>,
}

impl OverlayEntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &PhotoId) -> Option<&OverlayEntity> {
        self.entities.get(id)
    }

    pub fn get_mut(&mut self, id: &PhotoId) -> Option<&mut OverlayEntity> {
        self.entities.get_mut(id)
    }

    pub fn contains(&self, id: &PhotoId) -> bool {
        self.entities.contains_key(id)
    }

    /// Insert or replace the entity for `id`. A displaced entity is handed
    /// back so its visuals can be destroyed.
    #[must_use]
    pub fn upsert(&mut self, id: PhotoId, entity: OverlayEntity) -> Option<OverlayEntity> {
        self.entities.insert(id, entity)
    }

    /// Destroy the visual triple for `id` and forget it.
    pub fn remove<R: OverlayRenderer>(&mut self, id: &PhotoId, renderer: &mut R) -> bool {
        match self.entities.remove(id) {
            Some(entity) => {
                entity.visuals.destroy(renderer);
                true
            }
            None => false,
        }
    }

    /// Destroy every entity. Returns how many were removed.
    pub fn remove_all<R: OverlayRenderer>(&mut self, renderer: &mut R) -> usize {
        let count = self.entities.len();
        for (_, entity) in std::mem::take(&mut self.entities) {
            entity.visuals.destroy(renderer);
        }
        count
    }

    /// Remove every entity whose identity is not in `keep`.
    pub fn retain<R: OverlayRenderer>(
        &mut self,
        keep: &HashSet<PhotoId>,
        renderer: &mut R,
    ) -> Vec<PhotoId> {
        let stale: Vec<PhotoId> = self
            .entities
            .keys()
            .filter(|id| !keep.contains(*id))
            .cloned()
            .collect();
        for id in &stale {
            self.remove(id, renderer);
        }
        stale
    }

    pub fn values(&self) -> impl Iterator<Item = &OverlayEntity> {
        self.entities.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &PhotoId> {
        self.entities.keys()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
