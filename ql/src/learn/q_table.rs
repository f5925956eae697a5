use std::hash::Hash;

use rustc_hash::FxHashMap;

/// Action-value table: one row of `action_space` values per discrete state.
///
/// Rows are created explicitly through [QTable::get_or_insert] with all values at `0.0`.
/// Read-only access via [QTable::get] never creates a row.
#[derive(Clone, Debug, PartialEq)]
pub struct QTable<S>
where S: Eq + Hash
{
    action_space: usize,
    rows: FxHashMap<S, Vec<f32>>,
}

impl<S> QTable<S>
where S: Copy + Eq + Hash
{
    pub fn new(action_space: usize) -> Self {
        assert!(action_space > 0);
        Self {
            action_space,
            rows: FxHashMap::default(),
        }
    }

    pub fn action_space(&self) -> usize { self.action_space }

    /// Number of materialized states
    pub fn len(&self) -> usize { self.rows.len() }

    pub fn is_empty(&self) -> bool { self.rows.is_empty() }

    pub fn contains(&self, state: &S) -> bool { self.rows.contains_key(state) }

    pub fn get(&self, state: &S) -> Option<&[f32]> { self.rows.get(state).map(|row| row.as_slice()) }

    /// Returns the row of `state`, inserting a zero row first if the state was never seen.
    pub fn get_or_insert(&mut self, state: S) -> &mut [f32] {
        let action_space = self.action_space;
        self.rows
            .entry(state)
            .or_insert_with(|| vec![0.0; action_space])
            .as_mut_slice()
    }

    /// Highest action value of `state` (inserting its row if missing)
    pub fn max_value(&mut self, state: S) -> f32 {
        self.get_or_insert(state)
            .iter()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&S, &[f32])> {
        self.rows.iter().map(|(state, row)| (state, row.as_slice()))
    }
}
