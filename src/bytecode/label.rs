//! Label manager
//!
//! Labels are forward references to byte offsets of the raw stream. A
//! label is allocated before its position is known; jumps record the
//! operand offset that refers to it and bump its reference count.

/// Identifier of a label within one function
pub type LabelId = u32;

/// Book-keeping for one label
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSlot {
    pub ref_count: u32,
    /// Offset just past the label marker, once bound
    pub pos: Option<usize>,
    /// Offsets of the operands that reference this label
    pub relocs: Vec<usize>,
}

/// Allocator and registry for the labels of one function
#[derive(Debug, Clone, Default)]
pub struct LabelManager {
    labels: Vec<LabelSlot>,
}

impl LabelManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new unbound label
    pub fn new_label(&mut self) -> LabelId {
        self.labels.push(LabelSlot::default());
        (self.labels.len() - 1) as LabelId
    }

    /// Record the bound position of a label
    pub fn bind(&mut self, label: LabelId, pos: usize) {
        if let Some(slot) = self.labels.get_mut(label as usize) {
            slot.pos = Some(pos);
        }
    }

    /// Record a jump operand at `site` referencing `label`
    pub fn add_ref(&mut self, label: LabelId, site: usize) {
        if let Some(slot) = self.labels.get_mut(label as usize) {
            slot.ref_count += 1;
            slot.relocs.push(site);
        }
    }

    /// Drop one reference, e.g. when a jump is deleted
    pub fn release(&mut self, label: LabelId) {
        if let Some(slot) = self.labels.get_mut(label as usize) {
            slot.ref_count = slot.ref_count.saturating_sub(1);
        }
    }

    pub fn get(&self, label: LabelId) -> Option<&LabelSlot> {
        self.labels.get(label as usize)
    }

    pub fn is_bound(&self, label: LabelId) -> bool {
        self.get(label).map(|s| s.pos.is_some()).unwrap_or(false)
    }

    /// Number of labels allocated so far; the next id
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Labels that are referenced but were never bound
    pub fn unbound_referenced(&self) -> impl Iterator<Item = LabelId> + '_ {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, s)| s.ref_count > 0 && s.pos.is_none())
            .map(|(i, _)| i as LabelId)
    }
}
