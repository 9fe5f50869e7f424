//! Content tree rebuilds off the interactive thread.
//!
//! [`TreeRebuilder::request`] hands a snapshot of the package to a worker
//! thread and returns a ticket. Only the most recent ticket is ever
//! delivered: results of superseded or invalidated requests are dropped
//! when they arrive. There is no cancellation of running work.
//!
//! Each [`Rebuilt`] also records the content hash of the snapshot it was
//! built from, so the session can refuse a result built from an older
//! package state.

use std::mem;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parcel_core::config::HierarchyConfig;
use parcel_core::error::{ErrorCode, ToolError};
use parcel_core::tree::{AssignError, TreeError, assign_node_types};
use parcel_core::{ContentTree, DomainProfile, PackageDescription};
use tracing::{debug, info, warn};

use crate::view::{ExpansionState, TreeView};

pub type Ticket = u64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RebuildError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Assign(#[from] AssignError),

    /// No worker thread could be started for the rebuild.
    #[error("could not start a rebuild worker: {0}")]
    WorkerUnavailable(String),
}

impl RebuildError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Tree(err) => err.code(),
            Self::Assign(err) => err.code(),
            Self::WorkerUnavailable(_) => ErrorCode::InternalUnexpected,
        }
    }
}

impl From<RebuildError> for ToolError {
    fn from(err: RebuildError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

/// Snapshot handed to a rebuild worker.
#[derive(Debug, Clone)]
pub struct RebuildRequest {
    pub description: PackageDescription,
    pub hierarchy: HierarchyConfig,
    pub expansion: ExpansionState,
    /// Assign node types with this profile when some node is untyped.
    pub assign_with: Option<Arc<DomainProfile>>,
}

#[derive(Debug, Clone)]
pub struct Rebuilt {
    pub ticket: Ticket,
    /// [`PackageDescription::content_hash`] of the snapshot.
    pub source_hash: String,
    pub tree: ContentTree,
    pub expansion: ExpansionState,
    pub view: TreeView,
    /// Nodes whose type the assignment changed.
    pub assigned: usize,
}

/// Rebuild synchronously. Workers run exactly this.
///
/// # Errors
///
/// Returns an error if the description does not form a tree or the type
/// assignment finds no legal types.
pub fn run_rebuild(ticket: Ticket, request: &RebuildRequest) -> Result<Rebuilt, RebuildError> {
    let mut tree = ContentTree::from_description(&request.description, &request.hierarchy)?;

    let mut assigned = 0;
    if let Some(profile) = &request.assign_with {
        if tree.iter().iter().any(|n| n.node_type.is_none()) {
            assigned = assign_node_types(&mut tree, profile)?;
        }
    }

    let mut expansion = request.expansion.clone();
    let forgotten = expansion.retain_existing(&tree);
    if let Some(root) = tree.root_id() {
        expansion.expand(root);
    }
    let view = TreeView::build(&tree, &expansion);

    debug!(ticket, nodes = tree.len(), rows = view.len(), forgotten, "tree rebuilt");
    Ok(Rebuilt {
        ticket,
        source_hash: request.description.content_hash(),
        tree,
        expansion,
        view,
        assigned,
    })
}

struct Delivery {
    ticket: Ticket,
    result: Result<Rebuilt, RebuildError>,
}

/// Runs rebuilds on worker threads and delivers the latest result.
pub struct TreeRebuilder {
    sender: Sender<Delivery>,
    receiver: Receiver<Delivery>,
    last_ticket: Ticket,
    current: Option<Ticket>,
    workers: Vec<JoinHandle<()>>,
}

impl Default for TreeRebuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TreeRebuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeRebuilder")
            .field("last_ticket", &self.last_ticket)
            .field("current", &self.current)
            .field("workers", &self.workers.len())
            .finish_non_exhaustive()
    }
}

impl TreeRebuilder {
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver,
            last_ticket: 0,
            current: None,
            workers: Vec::new(),
        }
    }

    /// Start a rebuild, superseding any pending one.
    pub fn request(&mut self, request: RebuildRequest) -> Ticket {
        self.reap();
        self.last_ticket += 1;
        let ticket = self.last_ticket;
        if let Some(previous) = self.current.replace(ticket) {
            debug!(previous, ticket, "rebuild superseded");
        }

        let sender = self.sender.clone();
        let spawned = thread::Builder::new()
            .name(format!("parcel-rebuild-{ticket}"))
            .spawn(move || {
                let result = run_rebuild(ticket, &request);
                // the rebuilder is gone; nobody wants the result
                let _ = sender.send(Delivery { ticket, result });
            });

        match spawned {
            Ok(handle) => self.workers.push(handle),
            Err(err) => self.spawn_failed(ticket, &err),
        }
        ticket
    }

    /// Deliver a failure for `ticket` so waiters see it instead of timing out.
    fn spawn_failed(&self, ticket: Ticket, err: &std::io::Error) {
        warn!(ticket, error = %err, "could not spawn rebuild worker");
        // the receiver lives in `self`, so the send cannot fail
        let _ = self.sender.send(Delivery {
            ticket,
            result: Err(RebuildError::WorkerUnavailable(err.to_string())),
        });
    }

    /// Ticket of the rebuild whose result is still wanted.
    #[must_use]
    pub const fn pending(&self) -> Option<Ticket> {
        self.current
    }

    /// Stop waiting for the pending rebuild; its result will be dropped.
    pub fn invalidate(&mut self) -> Option<Ticket> {
        let abandoned = self.current.take();
        if let Some(ticket) = abandoned {
            debug!(ticket, "rebuild invalidated");
        }
        abandoned
    }

    /// Deliver the pending result if it has arrived.
    pub fn poll(&mut self) -> Option<Result<Rebuilt, RebuildError>> {
        while let Ok(delivery) = self.receiver.try_recv() {
            if let Some(result) = self.accept(delivery) {
                return Some(result);
            }
        }
        None
    }

    /// Block up to `timeout` for the pending result.
    ///
    /// Returns `None` when nothing is pending or the timeout expires.
    pub fn wait(&mut self, timeout: Duration) -> Option<Result<Rebuilt, RebuildError>> {
        let deadline = Instant::now() + timeout;
        while self.current.is_some() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let Ok(delivery) = self.receiver.recv_timeout(remaining) else {
                return None;
            };
            if let Some(result) = self.accept(delivery) {
                return Some(result);
            }
        }
        None
    }

    fn accept(&mut self, delivery: Delivery) -> Option<Result<Rebuilt, RebuildError>> {
        self.reap();
        if self.current == Some(delivery.ticket) {
            self.current = None;
            info!(ticket = delivery.ticket, ok = delivery.result.is_ok(), "rebuild delivered");
            Some(delivery.result)
        } else {
            warn!(
                ticket = delivery.ticket,
                current = ?self.current,
                "discarding stale rebuild"
            );
            None
        }
    }

    fn reap(&mut self) {
        let (finished, running): (Vec<_>, Vec<_>) =
            mem::take(&mut self.workers).into_iter().partition(JoinHandle::is_finished);
        for handle in finished {
            if handle.join().is_err() {
                warn!("rebuild worker panicked");
            }
        }
        self.workers = running;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parcel_core::package::{PackageArtifact, PackageRelationship};
    use parcel_core::profile::builtin::business_object_profile;

    const WAIT: Duration = Duration::from_secs(10);

    fn description(extra_collections: usize) -> PackageDescription {
        let mut desc = PackageDescription::new();
        desc.insert_artifact(PackageArtifact::new("p", "")).expect("root");
        for i in 0..extra_collections {
            let mut child = PackageArtifact::new(format!("c{i}"), "");
            child.add_relationship(
                PackageRelationship::new("isMemberOf", ["p"], false).expect("relationship"),
            );
            desc.insert_artifact(child).expect("child");
        }
        desc
    }

    fn request(desc: PackageDescription) -> RebuildRequest {
        RebuildRequest {
            description: desc,
            hierarchy: HierarchyConfig::default(),
            expansion: ExpansionState::new(),
            assign_with: None,
        }
    }

    #[test]
    fn run_rebuild_assigns_and_expands_root() {
        let profile = Arc::new(business_object_profile().expect("profile"));
        let mut req = request(description(2));
        req.assign_with = Some(profile);
        req.expansion.expand("gone");

        let rebuilt = run_rebuild(7, &req).expect("rebuild");
        assert_eq!(rebuilt.ticket, 7);
        assert_eq!(rebuilt.assigned, 3);
        assert!(rebuilt.expansion.is_expanded("p"));
        assert!(!rebuilt.expansion.is_expanded("gone"));
        assert_eq!(rebuilt.view.len(), 3);
        assert_eq!(rebuilt.source_hash, req.description.content_hash());
    }

    #[test]
    fn only_the_latest_request_is_delivered() {
        let mut rebuilder = TreeRebuilder::new();
        let first = rebuilder.request(request(description(1)));
        let second = rebuilder.request(request(description(3)));
        assert!(second > first);
        assert_eq!(rebuilder.pending(), Some(second));

        let rebuilt = rebuilder.wait(WAIT).expect("delivery").expect("rebuild");
        assert_eq!(rebuilt.ticket, second);
        assert_eq!(rebuilt.tree.len(), 4);
        assert_eq!(rebuilder.pending(), None);

        // the first result, whenever it lands, is dropped
        thread::sleep(Duration::from_millis(50));
        assert!(rebuilder.poll().is_none());
    }

    #[test]
    fn invalidated_rebuild_is_never_delivered() {
        let mut rebuilder = TreeRebuilder::new();
        let ticket = rebuilder.request(request(description(2)));
        assert_eq!(rebuilder.invalidate(), Some(ticket));
        assert!(rebuilder.wait(Duration::from_millis(50)).is_none());
        thread::sleep(Duration::from_millis(50));
        assert!(rebuilder.poll().is_none());
    }

    #[test]
    fn failures_are_delivered_too() {
        let mut desc = description(0);
        desc.insert_artifact(PackageArtifact::new("q", "")).expect("second root");

        let mut rebuilder = TreeRebuilder::new();
        rebuilder.request(request(desc));
        let err = rebuilder.wait(WAIT).expect("delivery").unwrap_err();
        assert!(matches!(err, RebuildError::Tree(TreeError::AmbiguousRoot(_))));
        assert_eq!(err.code(), ErrorCode::TreeStructureInvalid);
    }

    #[test]
    fn worker_spawn_failure_is_delivered() {
        let mut rebuilder = TreeRebuilder::new();
        rebuilder.last_ticket = 4;
        rebuilder.current = Some(4);
        rebuilder.spawn_failed(4, &std::io::Error::other("thread limit reached"));

        assert_eq!(rebuilder.pending(), Some(4));
        let err = rebuilder.wait(WAIT).expect("delivery").unwrap_err();
        assert!(matches!(err, RebuildError::WorkerUnavailable(ref m) if m.contains("thread limit")));
        assert_eq!(err.code(), ErrorCode::InternalUnexpected);
        assert_eq!(rebuilder.pending(), None);
    }
}
