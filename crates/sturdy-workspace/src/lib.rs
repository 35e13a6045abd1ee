//! # sturdy-workspace
//!
//! The draft-change layer of Sturdy: workspaces and their state machine,
//! views that check drafts out onto disk, suggestions that move hunks
//! between peers, and the entity stores behind them.
//!
//! ## Key components
//!
//! - [`WorkspaceService`] — create/fork drafts, diff them against trunk,
//!   land them as changes, archive/unarchive, detach from views.
//! - [`ViewService`] — open a workspace on a view, including the rebasing
//!   state when the draft conflicts with new trunk.
//! - [`SuggestionService`] — fork a workspace as a suggestion, decorate its
//!   hunks with the applied/dismissed/outdated ledger, apply or dismiss
//!   them selectively.
//! - Entity records and JSON-file stores: [`Codebase`], [`User`], [`View`],
//!   [`Workspace`], [`Change`], [`Suggestion`].

pub mod change;
pub mod codebase;
pub mod error;
pub mod notification;
pub mod service;
pub mod suggestion;
pub mod suggestion_service;
pub mod user;
pub mod view;
pub mod view_service;
pub mod workspace;

pub use change::{Change, ChangeStore};
pub use codebase::{Codebase, CodebaseService, CodebaseStore};
pub use error::WorkspaceError;
pub use notification::{LogSink, NotificationKind, NotificationSender};
pub use service::WorkspaceService;
pub use suggestion::{HunkRef, Suggestion, SuggestionStore};
pub use suggestion_service::SuggestionService;
pub use user::{User, UserStore};
pub use view::{View, ViewStore};
pub use view_service::ViewService;
pub use workspace::{Workspace, WorkspaceStore};
