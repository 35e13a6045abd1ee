// mod.rs — Command implementations and the wired-up application state.

pub mod codebase;
pub mod suggestion;
pub mod user;
pub mod view;
pub mod workspace;

use std::sync::Arc;

use sturdy_events::EventBus;
use sturdy_snapshots::{SnapshotStore, Snapshotter};
use sturdy_vcs::{ExecutorProvider, OperationContext, RepoProvider};
use sturdy_workspace::{
    ChangeStore, CodebaseService, CodebaseStore, LogSink, SuggestionService, SuggestionStore,
    UserStore, ViewService, ViewStore, WorkspaceService, WorkspaceStore,
};

use crate::config::SturdyConfig;

/// Everything a command needs, built once per invocation.
pub struct App {
    pub ctx: OperationContext,
    pub codebases: CodebaseService,
    pub workspaces: Arc<WorkspaceService>,
    pub views: ViewService,
    pub suggestions: SuggestionService,
    pub users: Arc<UserStore>,
    pub snapshotter: Arc<Snapshotter>,
    pub snapshot_store: Arc<SnapshotStore>,
    pub view_store: Arc<ViewStore>,
}

impl App {
    pub fn build(config: &SturdyConfig) -> anyhow::Result<Self> {
        let provider = Arc::new(RepoProvider::new(&config.repos_dir));
        let executors = Arc::new(ExecutorProvider::new(Arc::clone(&provider)));
        let bus = EventBus::new();

        let data = &config.data_dir;
        let codebase_store = Arc::new(CodebaseStore::new(data.join("codebases"))?);
        let workspace_store = Arc::new(WorkspaceStore::new(data.join("workspaces"))?);
        let view_store = Arc::new(ViewStore::new(data.join("views"))?);
        let change_store = Arc::new(ChangeStore::new(data.join("changes"))?);
        let user_store = Arc::new(UserStore::new(data.join("users"))?);
        let suggestion_store = Arc::new(SuggestionStore::new(data.join("suggestions"))?);
        let snapshot_store = Arc::new(SnapshotStore::new(data.join("snapshots"))?);

        let snapshotter = Arc::new(Snapshotter::new(
            Arc::clone(&executors),
            Arc::clone(&snapshot_store),
            Arc::clone(&workspace_store) as Arc<dyn sturdy_snapshots::WorkspaceHook>,
            bus.clone(),
        ));

        let codebases = CodebaseService::new(
            codebase_store,
            Arc::clone(&provider),
            Arc::clone(&executors),
        );
        let workspaces = Arc::new(WorkspaceService::new(
            Arc::clone(&workspace_store),
            Arc::clone(&view_store),
            change_store,
            Arc::clone(&user_store),
            Arc::clone(&snapshot_store),
            Arc::clone(&snapshotter),
            Arc::clone(&executors),
            bus.clone(),
        ));
        let views = ViewService::new(
            Arc::clone(&view_store),
            Arc::clone(&workspace_store),
            Arc::clone(&snapshot_store),
            Arc::clone(&snapshotter),
            Arc::clone(&executors),
            bus.clone(),
        );
        let suggestions = SuggestionService::new(
            suggestion_store,
            Arc::clone(&workspaces),
            Arc::clone(&snapshot_store),
            Arc::clone(&snapshotter),
            Arc::clone(&executors),
            bus,
            Arc::new(LogSink::new(&config.notifications_log)),
        );

        Ok(Self {
            ctx: OperationContext::new(),
            codebases,
            workspaces,
            views,
            suggestions,
            users: user_store,
            snapshotter,
            snapshot_store,
            view_store,
        })
    }
}
