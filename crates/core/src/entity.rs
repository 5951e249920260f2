//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// A part keeps its identity through regrading and retirement; two parts with
/// identical attributes but different ids are different parts.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier (immutable once assigned).
    fn id(&self) -> &Self::Id;

    /// Whether the entity is still live (not soft-retired).
    fn is_active(&self) -> bool {
        true
    }
}
