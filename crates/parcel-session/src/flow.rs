//! Wizard flow state machine.
//!
//! Two linear flows share a first page where the user picks between them:
//!
//! ```text
//! CreatePackage: Start → SelectContent → ChooseProfile → AssignTypes
//!                      → EditProperties → Review → Generate
//! OpenExisting:  Start → OpenPackage → EditProperties → Review → Generate
//! ```
//!
//! A [`WizardFlow`] is created per session and holds the active flow and the
//! position in it. Nothing is global.

use parcel_core::error::{ErrorCode, ToolError};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    CreatePackage,
    OpenExisting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    Start,
    SelectContent,
    ChooseProfile,
    AssignTypes,
    OpenPackage,
    EditProperties,
    Review,
    Generate,
}

const CREATE_PAGES: &[Page] = &[
    Page::Start,
    Page::SelectContent,
    Page::ChooseProfile,
    Page::AssignTypes,
    Page::EditProperties,
    Page::Review,
    Page::Generate,
];

const OPEN_PAGES: &[Page] = &[
    Page::Start,
    Page::OpenPackage,
    Page::EditProperties,
    Page::Review,
    Page::Generate,
];

impl FlowKind {
    #[must_use]
    pub const fn pages(self) -> &'static [Page] {
        match self {
            Self::CreatePackage => CREATE_PAGES,
            Self::OpenExisting => OPEN_PAGES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("already on the first page")]
    AtStart,

    #[error("already on the last page")]
    AtEnd,

    #[error("the flow can only change on the start page (currently on {0:?})")]
    SwitchAfterStart(Page),
}

impl FlowError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::InvalidNavigation
    }
}

impl From<FlowError> for ToolError {
    fn from(err: FlowError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

/// A page change. `left` is the page whose in-flight work should be
/// discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub left: Page,
    pub entered: Page,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardFlow {
    kind: FlowKind,
    position: usize,
}

impl Default for WizardFlow {
    fn default() -> Self {
        Self::new(FlowKind::CreatePackage)
    }
}

impl WizardFlow {
    #[must_use]
    pub const fn new(kind: FlowKind) -> Self {
        Self { kind, position: 0 }
    }

    #[must_use]
    pub const fn kind(&self) -> FlowKind {
        self.kind
    }

    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub fn current(&self) -> Page {
        self.kind
            .pages()
            .get(self.position)
            .copied()
            .unwrap_or(Page::Start)
    }

    #[must_use]
    pub const fn is_first(&self) -> bool {
        self.position == 0
    }

    #[must_use]
    pub const fn is_last(&self) -> bool {
        self.position + 1 == self.kind.pages().len()
    }

    /// Pick the flow. Only allowed on the start page.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::SwitchAfterStart`] past the start page.
    pub fn choose(&mut self, kind: FlowKind) -> Result<(), FlowError> {
        if !self.is_first() {
            return Err(FlowError::SwitchAfterStart(self.current()));
        }
        self.kind = kind;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`FlowError::AtEnd`] on the last page.
    pub fn forward(&mut self) -> Result<Transition, FlowError> {
        if self.is_last() {
            return Err(FlowError::AtEnd);
        }
        self.step(self.position + 1)
    }

    /// # Errors
    ///
    /// Returns [`FlowError::AtStart`] on the first page.
    pub fn back(&mut self) -> Result<Transition, FlowError> {
        if self.is_first() {
            return Err(FlowError::AtStart);
        }
        self.step(self.position - 1)
    }

    /// Return to the start page, keeping the chosen flow.
    pub fn restart(&mut self) -> Option<Transition> {
        (!self.is_first()).then(|| {
            let left = self.current();
            self.position = 0;
            Transition {
                left,
                entered: self.current(),
            }
        })
    }

    fn step(&mut self, to: usize) -> Result<Transition, FlowError> {
        let left = self.current();
        self.position = to;
        let entered = self.current();
        debug!(flow = ?self.kind, ?left, ?entered, "page changed");
        Ok(Transition { left, entered })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_flow_walks_every_page() {
        let mut flow = WizardFlow::default();
        let mut visited = vec![flow.current()];
        while !flow.is_last() {
            visited.push(flow.forward().expect("next").entered);
        }
        assert_eq!(visited, CREATE_PAGES);
        assert_eq!(flow.forward(), Err(FlowError::AtEnd));
    }

    #[test]
    fn open_flow_is_chosen_on_start_page() {
        let mut flow = WizardFlow::default();
        flow.choose(FlowKind::OpenExisting).expect("choose");
        let step = flow.forward().expect("next");
        assert_eq!(step.left, Page::Start);
        assert_eq!(step.entered, Page::OpenPackage);
        assert_eq!(
            flow.choose(FlowKind::CreatePackage),
            Err(FlowError::SwitchAfterStart(Page::OpenPackage))
        );
    }

    #[test]
    fn back_and_restart() {
        let mut flow = WizardFlow::new(FlowKind::OpenExisting);
        assert_eq!(flow.back(), Err(FlowError::AtStart));
        assert_eq!(flow.restart(), None);

        flow.forward().expect("next");
        flow.forward().expect("next");
        assert_eq!(flow.current(), Page::EditProperties);
        assert_eq!(flow.back().expect("back").entered, Page::OpenPackage);

        let restart = flow.restart().expect("restart");
        assert_eq!(restart.left, Page::OpenPackage);
        assert_eq!(flow.position(), 0);
        assert_eq!(flow.kind(), FlowKind::OpenExisting);
        assert_eq!(FlowError::AtEnd.code(), ErrorCode::InvalidNavigation);
    }
}
