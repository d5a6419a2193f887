//! Selection state machine: `Unselected` or `Selected(candidate)`.

use rand::Rng;
use serde::Serialize;

use crate::catalog::Catalog;
use crate::error::Result;
use crate::types::{AvatarCandidate, SelectionMode};

/// The active candidate and how it was chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selected {
    pub candidate: AvatarCandidate,
    pub origin: SelectionMode,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SelectionState {
    #[default]
    Unselected,
    Selected(Selected),
}

impl SelectionState {
    /// Any state → `Selected(candidate)`.
    pub fn select(&mut self, candidate: AvatarCandidate, origin: SelectionMode) {
        *self = SelectionState::Selected(Selected { candidate, origin });
    }

    /// Uniform pick from `catalog`; fails with `EmptyCatalog` and leaves the
    /// current state untouched when there is nothing to pick.
    pub fn select_random<R: Rng + ?Sized>(
        &mut self,
        catalog: &Catalog,
        rng: &mut R,
    ) -> Result<AvatarCandidate> {
        let picked = catalog.pick_random(rng)?.clone();
        self.select(picked.clone(), SelectionMode::Random);
        Ok(picked)
    }

    /// Any state → `Unselected`. Idempotent.
    pub fn clear(&mut self) {
        *self = SelectionState::Unselected;
    }

    pub fn selected(&self) -> Option<&Selected> {
        match self {
            SelectionState::Unselected => None,
            SelectionState::Selected(s) => Some(s),
        }
    }

    pub fn candidate(&self) -> Option<&AvatarCandidate> {
        self.selected().map(|s| &s.candidate)
    }

    pub fn is_selected(&self) -> bool {
        matches!(self, SelectionState::Selected(_))
    }

    /// Drop the selection if its candidate left the catalog.
    /// Returns true when the selection was cleared.
    pub fn retain_in(&mut self, catalog: &Catalog) -> bool {
        let stale = self
            .candidate()
            .is_some_and(|c| !catalog.contains(&c.name));
        if stale {
            self.clear();
        }
        stale
    }
}
