//! Inventory status state machine.
//!
//! ```text
//! in-stock ──▶ reserved ──▶ sold
//!    │  ▲          │
//!    │  └──────────┘ (cancel)
//!    └──▶ damaged ──▶ disposed
//! ```
//!
//! `sold` and `disposed` are terminal. Self-transitions are rejected.

use serde::{Deserialize, Serialize};

use autotraq_core::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InventoryStatus {
    #[default]
    InStock,
    Reserved,
    Sold,
    Damaged,
    Disposed,
}

impl InventoryStatus {
    pub const ALL: [InventoryStatus; 5] = [
        InventoryStatus::InStock,
        InventoryStatus::Reserved,
        InventoryStatus::Sold,
        InventoryStatus::Damaged,
        InventoryStatus::Disposed,
    ];

    /// Stored/serialized spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            InventoryStatus::InStock => "in-stock",
            InventoryStatus::Reserved => "reserved",
            InventoryStatus::Sold => "sold",
            InventoryStatus::Damaged => "damaged",
            InventoryStatus::Disposed => "disposed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, InventoryStatus::Sold | InventoryStatus::Disposed)
    }

    /// Statuses reachable from `self` in one step.
    pub fn successors(self) -> &'static [InventoryStatus] {
        use InventoryStatus::*;
        match self {
            InStock => &[Reserved, Damaged],
            Reserved => &[Sold, InStock],
            Damaged => &[Disposed],
            Sold | Disposed => &[],
        }
    }

    pub fn can_transition_to(self, next: InventoryStatus) -> bool {
        self.successors().contains(&next)
    }

    pub fn ensure_transition(self, next: InventoryStatus) -> DomainResult<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(DomainError::invalid_transition(self.as_str(), next.as_str()))
        }
    }
}

impl core::fmt::Display for InventoryStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for InventoryStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "unknown inventory status '{wanted}' \
                     (expected one of: in-stock, reserved, sold, damaged, disposed)"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use InventoryStatus::*;

    #[test]
    fn default_is_in_stock() {
        assert_eq!(InventoryStatus::default(), InStock);
    }

    #[test]
    fn permitted_edges() {
        assert!(InStock.can_transition_to(Reserved));
        assert!(InStock.can_transition_to(Damaged));
        assert!(Reserved.can_transition_to(Sold));
        assert!(Reserved.can_transition_to(InStock));
        assert!(Damaged.can_transition_to(Disposed));
    }

    #[test]
    fn in_stock_cannot_be_sold_directly() {
        let err = InStock.ensure_transition(Sold).unwrap_err();
        assert_eq!(err, DomainError::invalid_transition("in-stock", "sold"));
    }

    #[test]
    fn terminal_states_have_no_successors() {
        for status in InventoryStatus::ALL {
            assert_eq!(status.is_terminal(), status.successors().is_empty());
        }
    }

    #[test]
    fn parse_accepts_stored_spelling_only() {
        assert_eq!("in-stock".parse::<InventoryStatus>().unwrap(), InStock);
        assert_eq!(" Reserved ".parse::<InventoryStatus>().unwrap(), Reserved);
        let err = "lost".parse::<InventoryStatus>().unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!("in_stock".parse::<InventoryStatus>().is_err());
    }

    #[test]
    fn serde_uses_kebab_case() {
        assert_eq!(serde_json::to_string(&InStock).unwrap(), "\"in-stock\"");
        let parsed: InventoryStatus = serde_json::from_str("\"disposed\"").unwrap();
        assert_eq!(parsed, Disposed);
    }

    fn any_status() -> impl Strategy<Value = InventoryStatus> {
        prop::sample::select(InventoryStatus::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn display_and_parse_agree(status in any_status()) {
            prop_assert_eq!(status.to_string().parse::<InventoryStatus>().unwrap(), status);
        }

        /// Property: a random walk that only follows permitted edges never
        /// leaves a terminal state.
        #[test]
        fn nothing_escapes_a_terminal_state(steps in prop::collection::vec(any_status(), 0..30)) {
            let mut current = InStock;
            let mut seen_terminal = false;
            for next in steps {
                if current.ensure_transition(next).is_ok() {
                    prop_assert!(!seen_terminal);
                    current = next;
                }
                seen_terminal |= current.is_terminal();
            }
        }
    }
}
