//! parcel-session library.
//!
//! Interactive state on top of `parcel-core`: the editing session that keeps
//! a package description and its content tree in step, the wizard flow,
//! the expandable tree view, chooser gating, and background tree rebuilds.
//!
//! # Threading
//!
//! An [`EditSession`] is driven from one thread. Tree rebuilds run on worker
//! threads through [`TreeRebuilder`] and only ever hand back owned results;
//! installing one goes through [`EditSession::install_rebuild`], which
//! rejects results built from an older package state.

#![forbid(unsafe_code)]

pub mod chooser;
pub mod flow;
pub mod rebuild;
pub mod session;
pub mod view;

pub use chooser::{ChooserGate, ChooserPermit};
pub use flow::{FlowError, FlowKind, Page, Transition, WizardFlow};
pub use rebuild::{RebuildError, RebuildRequest, Rebuilt, Ticket, TreeRebuilder, run_rebuild};
pub use session::{
    EditSession, RetypeReport, SessionError, TransformReport, load_description, save_description,
};
pub use view::{ExpansionState, RowFlags, TreeRow, TreeView};
