// ============================================================================
// SESSION — extracted-selection records owned for the lifetime of the app
// ============================================================================

use std::sync::Arc;

use image::RgbaImage;
use uuid::Uuid;

use crate::selection::Selection;

/// One completed extraction: the polygon that produced it, the clipped
/// raster, and a stable id.  Records are shared (`Arc`) with the template's
/// assignment map, which does not own their lifetime — deletion here must be
/// followed by an explicit cascade through
/// `FortuneTemplate::remove_assignments_for`.
#[derive(Debug)]
pub struct SelectionRecord {
    pub id: String,
    pub name: String,
    pub source_image_id: String,
    pub selection: Selection,
    pub raster: RgbaImage,
}

/// Ordered store of selection records for the current session.  Nothing is
/// persisted; state lives and dies with the process.
#[derive(Default)]
pub struct SelectionStore {
    records: Vec<Arc<SelectionRecord>>,
    counter: usize,
}

impl SelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<SelectionRecord>> {
        self.records.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Arc<SelectionRecord>> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Store a hand-drawn selection ("Selection N").
    pub fn add_drawn(
        &mut self,
        source_image_id: &str,
        selection: Selection,
        raster: RgbaImage,
    ) -> Arc<SelectionRecord> {
        self.add_named("Selection", source_image_id, selection, raster)
    }

    /// Store an auto-segmented region ("Face N").
    pub fn add_region(
        &mut self,
        source_image_id: &str,
        selection: Selection,
        raster: RgbaImage,
    ) -> Arc<SelectionRecord> {
        self.add_named("Face", source_image_id, selection, raster)
    }

    fn add_named(
        &mut self,
        prefix: &str,
        source_image_id: &str,
        selection: Selection,
        raster: RgbaImage,
    ) -> Arc<SelectionRecord> {
        self.counter += 1;
        let record = Arc::new(SelectionRecord {
            id: format!("sel_{}", Uuid::new_v4().simple()),
            name: format!("{} {}", prefix, self.counter),
            source_image_id: source_image_id.to_string(),
            selection,
            raster,
        });
        self.records.push(record.clone());
        record
    }

    /// Remove a record by id.  Returns whether anything was removed; the
    /// caller is responsible for cascading into the template's assignments.
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        self.records.len() != before
    }

    /// Drop every record and reset the display-name counter.
    pub fn clear(&mut self) {
        self.records.clear();
        self.counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::{bounds_of, Point};

    fn dummy_selection() -> Selection {
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 4.0),
        ];
        Selection {
            bounds: bounds_of(&points).unwrap(),
            points,
        }
    }

    #[test]
    fn names_run_on_a_shared_counter() {
        let mut store = SelectionStore::new();
        let a = store.add_drawn("img1", dummy_selection(), RgbaImage::new(4, 4));
        let b = store.add_region("img1", dummy_selection(), RgbaImage::new(4, 4));
        assert_eq!(a.name, "Selection 1");
        assert_eq!(b.name, "Face 2");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn delete_removes_by_id_and_reports() {
        let mut store = SelectionStore::new();
        let a = store.add_drawn("img1", dummy_selection(), RgbaImage::new(4, 4));
        assert!(store.delete(&a.id));
        assert!(!store.delete(&a.id));
        assert!(store.is_empty());
    }
}
