/// A branch target local to one compiled unit.
///
/// Branches may name a label before its `SetLabel` op; the backend
/// records each such branch as a fixup and patches it once the label
/// is placed.
#[derive(Debug, Clone)]
pub struct Label {
    pub id: u32,
    /// Absolute code position, known once `SetLabel` is lowered.
    pub target: Option<usize>,
    /// Positions, relative to the unit, of branches to patch.
    pub fixups: Vec<usize>,
}

impl Label {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            target: None,
            fixups: Vec::new(),
        }
    }

    pub fn place(&mut self, at: usize) {
        self.target = Some(at);
    }

    /// Remember a branch at `at` that jumps here.
    pub fn refer(&mut self, at: usize) {
        self.fixups.push(at);
    }

    pub fn is_placed(&self) -> bool {
        self.target.is_some()
    }
}
