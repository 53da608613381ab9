use super::TrailedInteger;

/// The value `reference` held before it was overwritten.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TrailedChange {
    pub(crate) old_value: i64,
    pub(crate) reference: TrailedInteger,
}
