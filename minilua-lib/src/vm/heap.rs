/// This Heap represents the interpreters Heap (as in memory area, not as in data structure).
///
/// Every global variable owns one slot, addressed by the symbol's address. The heap grows
/// on demand when a slot beyond its end is written, and reading a slot that was never
/// written yields `T::default()`.
#[derive(Debug, Clone, Default)]
pub struct Heap<T> {
    data: Vec<T>,
}

/// the VM refuses to address slots beyond this
pub const MAX_HEAP_SLOTS: usize = 1 << 20;

impl<T: Default + Clone> Heap<T> {
    pub fn new() -> Self {
        Self { data: vec![] }
    }

    pub fn get(&self, slot: usize) -> T {
        self.data.get(slot).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, slot: usize, val: T) {
        if slot >= self.data.len() {
            self.data.resize(slot + 1, T::default());
        }
        self.data[slot] = val;
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.data.iter()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}
