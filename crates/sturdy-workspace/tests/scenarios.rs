// scenarios.rs — End-to-end flows across codebases, views, workspaces and
// suggestions, against real on-disk repositories.

use std::fs;
use std::sync::Arc;

use uuid::Uuid;

use sturdy_diff::Unidiff;
use sturdy_events::EventBus;
use sturdy_snapshots::{Action, SnapshotError, SnapshotOptions, SnapshotStore, Snapshotter};
use sturdy_vcs::{ExecutorProvider, OperationContext, RepoProvider};
use sturdy_workspace::{
    Change, ChangeStore, CodebaseService, CodebaseStore, LogSink, SuggestionService,
    SuggestionStore, User, UserStore, ViewService, ViewStore, Workspace, WorkspaceError,
    WorkspaceService, WorkspaceStore,
};

struct Harness {
    _tmp: tempfile::TempDir,
    provider: Arc<RepoProvider>,
    executors: Arc<ExecutorProvider>,
    snapshot_store: Arc<SnapshotStore>,
    snapshotter: Arc<Snapshotter>,
    workspace_store: Arc<WorkspaceStore>,
    view_store: Arc<ViewStore>,
    user_store: Arc<UserStore>,
    codebases: CodebaseService,
    workspaces: Arc<WorkspaceService>,
    views: ViewService,
    suggestions: SuggestionService,
    notifications_path: std::path::PathBuf,
}

fn harness() -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();

    let provider = Arc::new(RepoProvider::new(root.join("repos")));
    let executors = Arc::new(ExecutorProvider::new(Arc::clone(&provider)));
    let bus = EventBus::new();

    let codebase_store = Arc::new(CodebaseStore::new(root.join("db/codebases")).unwrap());
    let workspace_store = Arc::new(WorkspaceStore::new(root.join("db/workspaces")).unwrap());
    let view_store = Arc::new(ViewStore::new(root.join("db/views")).unwrap());
    let change_store = Arc::new(ChangeStore::new(root.join("db/changes")).unwrap());
    let user_store = Arc::new(UserStore::new(root.join("db/users")).unwrap());
    let suggestion_store = Arc::new(SuggestionStore::new(root.join("db/suggestions")).unwrap());
    let snapshot_store = Arc::new(SnapshotStore::new(root.join("db/snapshots")).unwrap());

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
    let notifications_path = root.join("notifications.jsonl");
    let suggestions = SuggestionService::new(
        suggestion_store,
        Arc::clone(&workspaces),
        Arc::clone(&snapshot_store),
        Arc::clone(&snapshotter),
        Arc::clone(&executors),
        bus,
        Arc::new(LogSink::new(&notifications_path)),
    );

    Harness {
        _tmp: tmp,
        provider,
        executors,
        snapshot_store,
        snapshotter,
        workspace_store,
        view_store,
        user_store,
        codebases,
        workspaces,
        views,
        suggestions,
        notifications_path,
    }
}

impl Harness {
    fn new_user(&self, name: &str) -> User {
        let user = User::new(name, format!("{name}@example.com"));
        self.user_store.save(&user).unwrap();
        user
    }

    fn view_file(&self, codebase_id: Uuid, view_id: Uuid, file: &str) -> std::path::PathBuf {
        self.provider
            .view_path(&codebase_id.to_string(), &view_id.to_string())
            .join(file)
    }

    fn write_in_view(&self, codebase_id: Uuid, view_id: Uuid, file: &str, content: &str) {
        fs::write(self.view_file(codebase_id, view_id, file), content).unwrap();
    }

    fn read_in_view(&self, codebase_id: Uuid, view_id: Uuid, file: &str) -> String {
        fs::read_to_string(self.view_file(codebase_id, view_id, file)).unwrap()
    }

    fn snapshot(&self, ctx: &OperationContext, workspace: &Workspace, view_id: Uuid) {
        self.snapshotter
            .snapshot(
                ctx,
                workspace.codebase_id,
                workspace.id,
                &view_id.to_string(),
                Action::Snapshot,
            )
            .unwrap();
    }

    fn land(&self, ctx: &OperationContext, workspace_id: Uuid, message: &str) -> (Workspace, Change) {
        self.workspaces
            .update_draft_description(workspace_id, message)
            .unwrap();
        self.workspaces.land(ctx, workspace_id).unwrap()
    }
}

const BASE_FILE: &str = "one\ntwo\nthree\nfour\nfive\nsix\nseven\neight\nnine\nten\n\
eleven\ntwelve\nthirteen\nfourteen\nfifteen\n";

#[test]
fn snapshot_detach_and_reopen_restores_exact_bytes() {
    let h = harness();
    let ctx = OperationContext::new();
    let ada = h.new_user("ada");
    let codebase = h.codebases.create("c", false).unwrap();

    let ws = h
        .workspaces
        .create(codebase.id, ada.id, Some("w".to_string()))
        .unwrap();
    let v1 = h.views.create(&ctx, codebase.id, ada.id, ws.id).unwrap();

    h.write_in_view(codebase.id, v1.id, "hello.txt", "hi\n");
    h.snapshot(&ctx, &ws, v1.id);

    let ws = h.workspaces.close_view(&ctx, ws.id).unwrap();
    assert!(ws.view_id.is_none());
    let snapshot_id = ws.latest_snapshot_id.expect("snapshot survives detach");

    // The snapshot commit resolves in the trunk object database.
    let snapshot = h.snapshot_store.get(snapshot_id).unwrap();
    let trunk = h.provider.trunk_repo(&codebase.id.to_string()).unwrap();
    assert!(trunk.ref_exists(&snapshot.commit_sha));

    let v2 = h.views.create(&ctx, codebase.id, ada.id, ws.id).unwrap();
    assert_eq!(h.read_in_view(codebase.id, v2.id, "hello.txt"), "hi\n");

    let ws = h.workspaces.get(ws.id).unwrap();
    assert_eq!(ws.view_id, Some(v2.id));
}

#[test]
fn landing_archives_the_workspace_and_invalidates_peers() {
    let h = harness();
    let ctx = OperationContext::new();
    let ada = h.new_user("ada");
    let codebase = h.codebases.create("c", false).unwrap();

    let ws = h.workspaces.create(codebase.id, ada.id, None).unwrap();
    let view = h.views.create(&ctx, codebase.id, ada.id, ws.id).unwrap();
    h.write_in_view(codebase.id, view.id, "hello.txt", "hi\n");
    h.snapshot(&ctx, &ws, view.id);

    // A peer workspace with a freshly computed up-to-date flag.
    let peer = h.workspaces.create(codebase.id, ada.id, None).unwrap();
    assert!(h.workspaces.up_to_date_with_trunk(&ctx, peer.id).unwrap());
    assert_eq!(
        h.workspace_store.get(peer.id).unwrap().up_to_date_with_trunk,
        Some(true)
    );

    let (landed, change) = h.land(&ctx, ws.id, "greet");

    assert!(landed.is_archived());
    assert_eq!(landed.change_id, Some(change.id));
    assert!(landed.last_landed_at.is_some());
    assert!(landed.view_id.is_none());

    let log = h.codebases.list_changes(&ctx, codebase.id, 0).unwrap();
    assert_eq!(log.len(), 1);
    assert!(log[0].message.starts_with("greet"));
    assert_eq!(log[0].commit_sha, change.commit_sha);

    // Trunk moved: the peer's flag drops back to unknown.
    assert_eq!(
        h.workspace_store.get(peer.id).unwrap().up_to_date_with_trunk,
        None
    );
}

/// Common setup for the suggestion scenarios: Ada lands a base file, drafts
/// an edit of lines two and thirteen, and Bob forks it as a suggestion
/// editing line two his own way.
struct SuggestionSetup {
    h: Harness,
    ctx: OperationContext,
    codebase_id: Uuid,
    ws_a: Uuid,
    view_a: Uuid,
    suggestion_id: Uuid,
}

fn suggestion_setup() -> SuggestionSetup {
    let h = harness();
    let ctx = OperationContext::new();
    let ada = h.new_user("ada");
    let bob = h.new_user("bob");
    let codebase = h.codebases.create("c", false).unwrap();

    // Land the base file.
    let base_ws = h.workspaces.create(codebase.id, ada.id, None).unwrap();
    let base_view = h
        .views
        .create(&ctx, codebase.id, ada.id, base_ws.id)
        .unwrap();
    h.write_in_view(codebase.id, base_view.id, "a.txt", BASE_FILE);
    h.snapshot(&ctx, &base_ws, base_view.id);
    h.land(&ctx, base_ws.id, "base");

    // Ada drafts edits in two regions.
    let ws_a = h.workspaces.create(codebase.id, ada.id, None).unwrap();
    h.views
        .open_workspace(&ctx, base_view.id, ws_a.id)
        .unwrap();
    let edited = BASE_FILE
        .replace("two\n", "two edited\n")
        .replace("thirteen\n", "thirteen edited\n");
    h.write_in_view(codebase.id, base_view.id, "a.txt", &edited);
    h.snapshot(&ctx, &ws_a, base_view.id);

    let diffs = h
        .workspaces
        .diffs(&ctx, &h.workspaces.get(ws_a.id).unwrap())
        .unwrap();
    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].hunks.len(), 2, "two separate edit regions");

    // Bob forks Ada's workspace as a suggestion and edits line two again.
    let suggestion = h.suggestions.create(&ctx, bob.id, ws_a.id).unwrap();
    let view_b = h
        .views
        .create(&ctx, codebase.id, bob.id, suggestion.workspace_id)
        .unwrap();
    let suggested = edited.replace("two edited\n", "two suggested\n");
    h.write_in_view(codebase.id, view_b.id, "a.txt", &suggested);
    let fork = h.workspaces.get(suggestion.workspace_id).unwrap();
    h.snapshot(&ctx, &fork, view_b.id);
    h.suggestions
        .record_activity(&ctx, suggestion.workspace_id)
        .unwrap();

    SuggestionSetup {
        ctx,
        codebase_id: codebase.id,
        ws_a: ws_a.id,
        view_a: base_view.id,
        suggestion_id: suggestion.id,
        h,
    }
}

#[test]
fn suggestion_hunks_apply_into_the_target_view() {
    let s = suggestion_setup();

    // The suggester's first activity notified the target owner.
    let notifications = fs::read_to_string(&s.h.notifications_path).unwrap();
    assert!(notifications.contains("new_suggestion"));

    let suggestion = s.h.suggestions.get(s.suggestion_id).unwrap();
    let diffs = s.h.suggestions.diffs(&s.ctx, &suggestion).unwrap();
    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].preferred_name, "a.txt");
    assert_eq!(diffs[0].hunks.len(), 1, "only line two differs");
    assert!(!diffs[0].hunks[0].is_outdated);

    s.h.suggestions
        .apply_hunks(&s.ctx, s.suggestion_id, &[diffs[0].hunks[0].id.clone()])
        .unwrap();

    let suggestion = s.h.suggestions.get(s.suggestion_id).unwrap();
    let refs: Vec<String> = suggestion
        .applied_hunks
        .iter()
        .map(|r| r.to_string())
        .collect();
    assert_eq!(refs, vec!["a.txt#0".to_string()]);

    let content = s.h.read_in_view(s.codebase_id, s.view_a, "a.txt");
    assert!(content.contains("two suggested"));

    // The apply re-snapshotted the target.
    let ws_a = s.h.workspaces.get(s.ws_a).unwrap();
    let latest = s.h.snapshot_store.get(ws_a.latest_snapshot_id.unwrap()).unwrap();
    assert_eq!(latest.action, Action::SuggestionApply);

    // Re-reading the diffs shows the hunk as applied.
    let diffs = s.h.suggestions.diffs(&s.ctx, &suggestion).unwrap();
    assert!(diffs[0].hunks[0].is_applied);
}

#[test]
fn drifted_target_marks_the_hunk_outdated_and_refuses_apply() {
    let s = suggestion_setup();

    // Ada edits the same region before the suggestion is applied.
    let drifted = s
        .h
        .read_in_view(s.codebase_id, s.view_a, "a.txt")
        .replace("two edited\n", "two conflicting\n");
    s.h.write_in_view(s.codebase_id, s.view_a, "a.txt", &drifted);

    let suggestion = s.h.suggestions.get(s.suggestion_id).unwrap();
    let diffs = s.h.suggestions.diffs(&s.ctx, &suggestion).unwrap();
    assert_eq!(diffs[0].hunks.len(), 1);
    assert!(diffs[0].hunks[0].is_outdated);

    let hunk_id = diffs[0].hunks[0].id.clone();
    let result = s
        .h
        .suggestions
        .apply_hunks(&s.ctx, s.suggestion_id, &[hunk_id.clone()]);
    assert!(matches!(result, Err(WorkspaceError::Conflict(_))));

    // Dismissing the same hunk succeeds and only touches the ledger.
    s.h.suggestions
        .dismiss_hunks(&s.ctx, s.suggestion_id, &[hunk_id])
        .unwrap();
    let suggestion = s.h.suggestions.get(s.suggestion_id).unwrap();
    assert_eq!(suggestion.dismissed_hunks.len(), 1);
    assert!(suggestion.applied_hunks.is_empty());
}

#[test]
fn concurrent_snapshots_serialize_into_a_chain() {
    let h = harness();
    let ctx = OperationContext::new();
    let ada = h.new_user("ada");
    let codebase = h.codebases.create("c", false).unwrap();
    let ws = h.workspaces.create(codebase.id, ada.id, None).unwrap();
    let view = h.views.create(&ctx, codebase.id, ada.id, ws.id).unwrap();

    let spawn_snapshot = |file: &'static str| {
        let executors = Arc::clone(&h.executors);
        let snapshotter = Arc::clone(&h.snapshotter);
        let codebase_id = codebase.id;
        let workspace_id = ws.id;
        let view_id = view.id.to_string();
        std::thread::spawn(move || {
            let ctx = OperationContext::new();
            executors
                .executor::<SnapshotError>()
                .write(|repo| {
                    let path = repo.path().join(file);
                    fs::write(&path, file).map_err(|source| SnapshotError::IoError {
                        path,
                        source,
                    })?;
                    snapshotter.snapshot_on_repo(
                        codebase_id,
                        workspace_id,
                        Action::Snapshot,
                        repo,
                        SnapshotOptions::mark_as_latest(),
                    )?;
                    Ok(())
                })
                .exec_view(&ctx, &codebase_id.to_string(), &view_id, "concurrentSnapshot")
        })
    };

    let first = spawn_snapshot("left.txt");
    let second = spawn_snapshot("right.txt");
    first.join().unwrap().unwrap();
    second.join().unwrap().unwrap();

    // Two records forming a chain, not a fork.
    let snapshots = h.snapshot_store.list_by_workspace(ws.id).unwrap();
    assert_eq!(snapshots.len(), 2);
    let newest = &snapshots[0];
    let oldest = &snapshots[1];
    assert_ne!(newest.id, oldest.id);
    assert_eq!(newest.previous_snapshot_id, Some(oldest.id));
    assert_eq!(oldest.previous_snapshot_id, None);
}

#[test]
fn conflicting_trunk_leaves_the_view_rebasing() {
    let h = harness();
    let ctx = OperationContext::new();
    let ada = h.new_user("ada");
    let codebase = h.codebases.create("c", false).unwrap();

    // Ada drafts against the empty trunk, then detaches.
    let ws_a = h.workspaces.create(codebase.id, ada.id, None).unwrap();
    let view = h.views.create(&ctx, codebase.id, ada.id, ws_a.id).unwrap();
    h.write_in_view(codebase.id, view.id, "conflict.txt", "original\n");
    h.snapshot(&ctx, &ws_a, view.id);
    h.workspaces.close_view(&ctx, ws_a.id).unwrap();

    // Someone lands a conflicting version of the same file.
    let ws_b = h.workspaces.create(codebase.id, ada.id, None).unwrap();
    let view_b = h.views.create(&ctx, codebase.id, ada.id, ws_b.id).unwrap();
    h.write_in_view(codebase.id, view_b.id, "conflict.txt", "landed change\n");
    h.snapshot(&ctx, &ws_b, view_b.id);
    h.land(&ctx, ws_b.id, "land conflicting file");

    // Reopening Ada's draft cannot rebase cleanly.
    let result = h.views.open_workspace(&ctx, view.id, ws_a.id);
    assert!(matches!(result, Err(WorkspaceError::Rebasing)));

    let view_record = h.view_store.get(view.id).unwrap();
    assert!(h.views.is_rebasing(&ctx, &view_record).unwrap());
    let conflicted = h.read_in_view(codebase.id, view.id, "conflict.txt");
    assert!(conflicted.contains("<<<<<<<"));

    // No other workspace can take the view while it is rebasing.
    let ws_c = h.workspaces.create(codebase.id, ada.id, None).unwrap();
    let result = h.views.open_workspace(&ctx, view.id, ws_c.id);
    assert!(matches!(result, Err(WorkspaceError::Rebasing)));

    // Aborting returns the view to a usable state.
    h.views.abort_rebase(&ctx, view.id).unwrap();
    assert!(!h.views.is_rebasing(&ctx, &view_record).unwrap());
}

#[test]
fn diff_applied_to_base_reproduces_the_target_tree() {
    let h = harness();
    let ctx = OperationContext::new();
    let ada = h.new_user("ada");
    let codebase = h.codebases.create("c", false).unwrap();

    let ws = h.workspaces.create(codebase.id, ada.id, None).unwrap();
    let view = h.views.create(&ctx, codebase.id, ada.id, ws.id).unwrap();
    h.write_in_view(codebase.id, view.id, "a.txt", BASE_FILE);
    h.write_in_view(codebase.id, view.id, "b.txt", "left\n");
    h.snapshot(&ctx, &ws, view.id);

    let edited = BASE_FILE
        .replace("two\n", "two edited\n")
        .replace("fourteen\n", "fourteen edited\n");
    h.write_in_view(codebase.id, view.id, "a.txt", &edited);
    h.write_in_view(codebase.id, view.id, "b.txt", "right\n");
    let ws = h.workspaces.get(ws.id).unwrap();
    h.snapshot(&ctx, &ws, view.id);

    let snapshots = h.snapshot_store.list_by_workspace(ws.id).unwrap();
    assert_eq!(snapshots.len(), 2);
    let (target, base) = (&snapshots[0], &snapshots[1]);

    // Decorate the diff into per-hunk patches, apply them onto the base
    // state in a fresh working copy, and compare trees.
    let mut target_tree = String::new();
    let mut rebuilt_tree = String::new();
    h.executors
        .executor::<WorkspaceError>()
        .write(|repo| {
            repo.fetch_ref(&format!(
                "+refs/snapshots/{ws}:refs/snapshots/{ws}",
                ws = ws.id
            ))?;
            let raw = repo.diff_commits(&base.commit_sha, &target.commit_sha)?;
            let patches: Vec<Vec<u8>> = Unidiff::new(raw)
                .with_expanded_hunks()
                .decorate()?
                .iter()
                .flat_map(|fd| fd.hunks.iter())
                .map(|hunk| hunk.patch.clone().into_bytes())
                .collect();

            repo.checkout_branch("rebuild", &base.commit_sha)?;
            repo.apply_patches_to_workdir(&patches)?;
            rebuilt_tree = repo.write_tree()?;
            target_tree = repo.tree_of_commit(&target.commit_sha)?;
            Ok(())
        })
        .exec_temporary_view(&ctx, &codebase.id.to_string(), "diffApplyRoundTrip")
        .unwrap();

    assert_eq!(rebuilt_tree, target_tree);
}
