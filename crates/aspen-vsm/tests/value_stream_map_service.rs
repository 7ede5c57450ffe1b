//! End-to-end tests for the value-stream map service over in-memory collaborators.

use std::sync::Arc;

use aspen_vsm::Identity;
use aspen_vsm::InMemoryPermissions;
use aspen_vsm::InMemoryPipelineConfig;
use aspen_vsm::InMemoryTriggerHistory;
use aspen_vsm::MaterialRevision;
use aspen_vsm::NodeId;
use aspen_vsm::PipelineConfig;
use aspen_vsm::PipelineRun;
use aspen_vsm::Revision;
use aspen_vsm::ScmMaterial;
use aspen_vsm::StageState;
use aspen_vsm::StageSummary;
use aspen_vsm::TriggerEntry;
use aspen_vsm::ValueStreamMapConfig;
use aspen_vsm::ValueStreamMapModel;
use aspen_vsm::ValueStreamMapService;
use aspen_vsm::ViewState;
use aspen_vsm::error::keys;
use aspen_vsm::error::status;
use chrono::TimeZone;
use chrono::Utc;

// ============================================================================
// Fixtures
// ============================================================================

struct Fixture {
    config: Arc<InMemoryPipelineConfig>,
    history: Arc<InMemoryTriggerHistory>,
    permissions: Arc<InMemoryPermissions>,
}

impl Fixture {
    fn new(pipelines: impl IntoIterator<Item = PipelineConfig>) -> Self {
        Self {
            config: InMemoryPipelineConfig::with_pipelines(pipelines),
            history: InMemoryTriggerHistory::new(),
            permissions: InMemoryPermissions::new(),
        }
    }

    async fn run(&self, name: &str, counter: u64, cause: Vec<TriggerEntry>) {
        self.history.record_run(run(name, counter), cause, Vec::new()).await;
    }

    fn service(&self) -> ValueStreamMapService {
        self.service_with(ValueStreamMapConfig::default())
    }

    fn service_with(&self, settings: ValueStreamMapConfig) -> ValueStreamMapService {
        ValueStreamMapService::new(self.config.clone(), self.history.clone(), self.permissions.clone(), settings)
    }
}

fn viewer() -> Identity {
    Identity::new("alice")
}

fn git(fingerprint: &str) -> ScmMaterial {
    ScmMaterial {
        fingerprint: fingerprint.to_string(),
        display_name: format!("https://example.com/{fingerprint}.git"),
        material_type: "git".to_string(),
        name: None,
    }
}

fn modification(fingerprint: &str, revision_id: &str) -> MaterialRevision {
    MaterialRevision {
        fingerprint: fingerprint.to_string(),
        revision_id: revision_id.to_string(),
        timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        author: "dev".to_string(),
        comment: format!("commit {revision_id}"),
    }
}

fn run(name: &str, counter: u64) -> PipelineRun {
    PipelineRun {
        name: name.to_string(),
        counter,
        label: counter.to_string(),
    }
}

fn upstream(name: &str, counter: u64) -> TriggerEntry {
    TriggerEntry::Pipeline {
        pipeline_name: name.to_string(),
        counter,
        label: counter.to_string(),
    }
}

fn scm(fingerprint: &str, revisions: &[&str]) -> TriggerEntry {
    TriggerEntry::Scm {
        material: git(fingerprint),
        modifications: revisions.iter().map(|revision| modification(fingerprint, revision)).collect(),
    }
}

fn level_names(model: &ValueStreamMapModel) -> Vec<Vec<String>> {
    model
        .nodes_at_each_level()
        .iter()
        .map(|level| {
            level
                .iter()
                .map(|node| if node.is_filler() { "*".to_string() } else { node.id().to_string() })
                .collect()
        })
        .collect()
}

fn counters(model: &ValueStreamMapModel, pipeline: &str) -> Vec<u64> {
    model
        .find(&NodeId::pipeline(pipeline))
        .unwrap()
        .revisions()
        .iter()
        .filter_map(Revision::as_pipeline)
        .map(|run| run.counter)
        .collect()
}

fn revision_ids(model: &ValueStreamMapModel, fingerprint: &str) -> Vec<String> {
    model
        .find(&NodeId::material(fingerprint))
        .unwrap()
        .revisions()
        .iter()
        .filter_map(Revision::as_material)
        .map(|m| m.revision_id.clone())
        .collect()
}

fn assert_one_level_edges(model: &ValueStreamMapModel) {
    for node in model.nodes_at_each_level().iter().flatten() {
        for child in node.children() {
            assert_eq!(model.find(child).unwrap().level(), node.level() + 1, "edge {} -> {child}", node.id());
        }
    }
}

// ============================================================================
// Pipeline map structure
// ============================================================================

#[tokio::test]
async fn test_differently_cased_upstreams_merge() {
    let fixture = Fixture::new([
        PipelineConfig::new("MyPipeline"),
        PipelineConfig::new("deploy").with_dependency("MyPipeline", "build"),
    ]);
    fixture.run("deploy", 1, vec![upstream("MYPIPELINE", 3), upstream("myPipeline", 3)]).await;
    fixture.run("MyPipeline", 3, Vec::new()).await;

    let model = fixture.service().get_value_stream_map("DEPLOY", 1, &viewer()).await.unwrap();

    assert_eq!(model.node_count(), 2);
    assert_eq!(level_names(&model), vec![vec!["mypipeline"], vec!["deploy"]]);
    let upstream = model.find(&NodeId::pipeline("mypipeline")).unwrap();
    assert_eq!(upstream.display_name(), "MyPipeline");
    assert_eq!(counters(&model, "mypipeline"), vec![3]);
    assert_eq!(model.current_pipeline().unwrap().id(), &NodeId::pipeline("deploy"));
}

#[tokio::test]
async fn test_diamond_dependency() {
    let fixture = Fixture::new([
        PipelineConfig::new("build").with_scm(git("g")),
        PipelineConfig::new("lint").with_dependency("build", "s"),
        PipelineConfig::new("test").with_dependency("build", "s"),
        PipelineConfig::new("release").with_dependency("lint", "s").with_dependency("test", "s"),
    ]);
    fixture.run("release", 1, vec![upstream("lint", 1), upstream("test", 1)]).await;
    fixture.run("lint", 1, vec![upstream("build", 1)]).await;
    fixture.run("test", 1, vec![upstream("build", 1)]).await;
    fixture.run("build", 1, vec![scm("g", &["r1"])]).await;

    let model = fixture.service().get_value_stream_map("release", 1, &viewer()).await.unwrap();

    assert_eq!(level_names(&model), vec![vec!["g"], vec!["build"], vec!["lint", "test"], vec!["release"]]);
    assert_eq!(model.find(&NodeId::pipeline("build")).unwrap().children().len(), 2);
    assert_eq!(counters(&model, "build"), vec![1]);
    assert_one_level_edges(&model);
}

#[tokio::test]
async fn test_cascading_relocation_inserts_fillers() {
    let fixture = Fixture::new([
        PipelineConfig::new("p1").with_scm(git("g")),
        PipelineConfig::new("p2").with_scm(git("g")).with_dependency("p1", "s"),
        PipelineConfig::new("p3").with_dependency("p1", "s").with_dependency("p2", "s"),
    ]);
    fixture.run("p3", 1, vec![upstream("p1", 1), upstream("p2", 1)]).await;
    fixture.run("p2", 1, vec![upstream("p1", 1), scm("g", &["r1"])]).await;
    fixture.run("p1", 1, vec![scm("g", &["r1"])]).await;

    let model = fixture.service().get_value_stream_map("p3", 1, &viewer()).await.unwrap();

    assert_eq!(level_names(&model), vec![vec!["g"], vec!["p1", "*"], vec!["p2", "*"], vec!["p3"]]);
    for filler in model.nodes_at_each_level().iter().flatten().filter(|node| node.is_filler()) {
        assert_eq!(filler.parents().len(), 1);
        assert_eq!(filler.children().len(), 1);
        assert!(filler.revisions().is_empty());
    }
    assert_one_level_edges(&model);
    assert_eq!(model.current_pipeline().unwrap().view_state(), ViewState::Normal);
}

#[tokio::test]
async fn test_fan_in_deduplicates_modifications() {
    let fixture = Fixture::new([
        PipelineConfig::new("p1").with_scm(git("g")),
        PipelineConfig::new("p2").with_scm(git("g")),
        PipelineConfig::new("p3").with_dependency("p1", "s").with_dependency("p2", "s"),
    ]);
    fixture.run("p3", 1, vec![upstream("p1", 4), upstream("p2", 2)]).await;
    fixture.run("p1", 4, vec![scm("g", &["m2", "m1", "m0"])]).await;
    fixture.run("p2", 2, vec![scm("g", &["m2", "m1"])]).await;

    let model = fixture.service().get_value_stream_map("p3", 1, &viewer()).await.unwrap();

    assert_eq!(revision_ids(&model, "g"), vec!["m2", "m1", "m0"]);
    assert_eq!(model.find(&NodeId::material("g")).unwrap().children().len(), 2);
    assert_eq!(model.current_pipeline().unwrap().view_state(), ViewState::Normal);
}

#[tokio::test]
async fn test_fan_in_keeps_most_recent_first_across_paths() {
    let fixture = Fixture::new([
        PipelineConfig::new("p1").with_scm(git("g")),
        PipelineConfig::new("p2").with_scm(git("g")),
        PipelineConfig::new("p3").with_dependency("p1", "s").with_dependency("p2", "s"),
    ]);
    fixture.run("p3", 1, vec![upstream("p1", 1), upstream("p2", 1)]).await;
    fixture.run("p1", 1, vec![scm("g", &["m1", "m0"])]).await;
    fixture.run("p2", 1, vec![scm("g", &["m2", "m1"])]).await;

    let model = fixture.service().get_value_stream_map("p3", 1, &viewer()).await.unwrap();

    assert_eq!(revision_ids(&model, "g"), vec!["m2", "m1", "m0"]);
}

#[tokio::test]
async fn test_deleted_ancestor_is_marked_not_expanded() {
    let fixture = Fixture::new([PipelineConfig::new("p3").with_scm(git("g")).with_dependency("p1", "s")]);
    fixture.run("p3", 1, vec![upstream("p1", 5), scm("g", &["r1"])]).await;

    let model = fixture.service().get_value_stream_map("p3", 1, &viewer()).await.unwrap();

    let deleted = model.find(&NodeId::pipeline("p1")).unwrap();
    assert_eq!(deleted.view_state(), ViewState::Deleted);
    assert_eq!(deleted.message(), Some("Pipeline has been deleted."));
    assert!(deleted.parents().is_empty());
    assert!(deleted.revisions().is_empty());
    assert_eq!(revision_ids(&model, "g"), vec!["r1"]);
    assert_eq!(level_names(&model), vec![vec!["p1", "g"], vec!["p3"]]);
}

#[tokio::test]
async fn test_custom_deleted_message() {
    let fixture = Fixture::new([PipelineConfig::new("p3").with_dependency("p1", "s")]);
    fixture.run("p3", 1, vec![upstream("p1", 5)]).await;
    let settings = ValueStreamMapConfig {
        deleted_pipeline_message: "Gone.".to_string(),
        ..ValueStreamMapConfig::default()
    };

    let model = fixture.service_with(settings).get_value_stream_map("p3", 1, &viewer()).await.unwrap();

    assert_eq!(model.find(&NodeId::pipeline("p1")).unwrap().message(), Some("Gone."));
}

// ============================================================================
// Downstream
// ============================================================================

fn delivery() -> Fixture {
    Fixture::new([
        PipelineConfig::new("build").with_scm(git("g")).with_stage("compile"),
        PipelineConfig::new("test").with_dependency("build", "compile").with_stage("unit"),
        PipelineConfig::new("deploy")
            .with_dependency("build", "compile")
            .with_dependency("test", "unit")
            .with_stage("package")
            .with_stage("ship"),
    ])
}

#[tokio::test]
async fn test_downstream_consumers_with_fillers() {
    let fixture = delivery();
    fixture.run("build", 1, vec![scm("g", &["r1"])]).await;

    let model = fixture.service().get_value_stream_map("build", 1, &viewer()).await.unwrap();

    assert_eq!(level_names(&model), vec![vec!["g"], vec!["build"], vec!["test", "*"], vec!["deploy"]]);
    assert_one_level_edges(&model);
    assert!(model.find(&NodeId::pipeline("deploy")).unwrap().revisions().is_empty());
}

#[tokio::test]
async fn test_downstream_disabled() {
    let fixture = delivery();
    fixture.run("build", 1, vec![scm("g", &["r1"])]).await;
    let settings = ValueStreamMapConfig {
        include_downstream: false,
        ..ValueStreamMapConfig::default()
    };

    let model = fixture.service_with(settings).get_value_stream_map("build", 1, &viewer()).await.unwrap();

    assert_eq!(level_names(&model), vec![vec!["g"], vec!["build"]]);
}

#[tokio::test]
async fn test_downstream_instances_and_stages() {
    let fixture = delivery();
    fixture.run("build", 1, vec![scm("g", &["r1"])]).await;
    fixture.run("test", 4, vec![upstream("build", 1)]).await;
    fixture
        .history
        .record_run(
            run("deploy", 2),
            vec![upstream("build", 1), upstream("test", 4)],
            vec![StageSummary {
                name: "package".to_string(),
                counter: 1,
                state: StageState::Passed,
            }],
        )
        .await;

    let model = fixture.service().get_value_stream_map("build", 1, &viewer()).await.unwrap();

    assert_eq!(counters(&model, "test"), vec![4]);
    assert_eq!(counters(&model, "deploy"), vec![2]);

    let deploy = model.find(&NodeId::pipeline("deploy")).unwrap();
    let stages = &deploy.revisions()[0].as_pipeline().unwrap().stages;
    let summary: Vec<(&str, u32, StageState)> = stages.iter().map(|s| (s.name.as_str(), s.counter, s.state)).collect();
    assert_eq!(summary, vec![("package", 1, StageState::Passed), ("ship", 0, StageState::Unknown)]);

    let test = model.find(&NodeId::pipeline("test")).unwrap();
    let stages = &test.revisions()[0].as_pipeline().unwrap().stages;
    assert_eq!(stages.len(), 1);
    assert_eq!(stages[0].state, StageState::Unknown);
}

#[tokio::test]
async fn test_unviewable_pipeline_is_masked() {
    let fixture = delivery();
    fixture.run("build", 1, vec![scm("g", &["r1"])]).await;
    fixture.run("test", 4, vec![upstream("build", 1)]).await;
    fixture.run("deploy", 2, vec![upstream("build", 1), upstream("test", 4)]).await;
    fixture.permissions.deny_pipeline(&viewer(), "TEST").await;

    let model = fixture.service().get_value_stream_map("build", 1, &viewer()).await.unwrap();

    let test = model.find(&NodeId::pipeline("test")).unwrap();
    assert_eq!(test.view_state(), ViewState::Unauthorized);
    assert_eq!(test.message(), Some(keys::VSM_PIPELINE_UNAUTHORIZED));
    assert!(test.revisions().is_empty());
    assert_eq!(counters(&model, "deploy"), vec![2]);
    assert_eq!(counters(&model, "build"), vec![1]);
}

fn linear() -> Fixture {
    Fixture::new([
        PipelineConfig::new("p1").with_scm(git("g")),
        PipelineConfig::new("p2").with_dependency("p1", "s"),
    ])
}

#[tokio::test]
async fn test_edit_permissions_per_pipeline() {
    let fixture = linear();
    fixture.run("p2", 1, vec![upstream("p1", 1)]).await;
    fixture.run("p1", 1, vec![scm("g", &["r1"])]).await;
    fixture.permissions.deny_edit(&viewer(), "p2").await;

    let model = fixture.service().get_value_stream_map("p2", 1, &viewer()).await.unwrap();

    let levels = model.nodes_at_each_level();
    assert_eq!(levels[1][0].id(), &NodeId::pipeline("p1"));
    assert!(levels[1][0].can_edit());
    assert_eq!(levels[2][0].id(), &NodeId::pipeline("p2"));
    assert!(!levels[2][0].can_edit());
    assert!(!levels[0][0].can_edit());
}

#[tokio::test]
async fn test_edit_refusal_leaves_map_untouched() {
    let fixture = linear();
    fixture.run("p2", 1, vec![upstream("p1", 1)]).await;
    fixture.run("p1", 1, vec![scm("g", &["r1"])]).await;
    fixture.permissions.deny_edit(&viewer(), "p2").await;
    fixture.permissions.deny_edit(&viewer(), "p1").await;

    let model = fixture.service().get_value_stream_map("p2", 1, &viewer()).await.unwrap();

    let p1 = model.find(&NodeId::pipeline("p1")).unwrap();
    assert!(!p1.can_edit());
    assert_eq!(p1.view_state(), ViewState::Normal);
    assert!(p1.message().is_none());
    assert_eq!(counters(&model, "p1"), vec![1]);
    let root = model.current_pipeline().unwrap();
    assert_eq!(root.view_state(), ViewState::Normal);
    assert!(root.message().is_none());
}

// ============================================================================
// Incompatible revisions
// ============================================================================

#[tokio::test]
async fn test_incompatible_revisions_warn_on_root() {
    let fixture = Fixture::new([
        PipelineConfig::new("p1").with_scm(git("g")),
        PipelineConfig::new("p2").with_scm(git("g")),
        PipelineConfig::new("p3").with_dependency("p1", "s").with_dependency("p2", "s"),
    ]);
    fixture.run("p3", 1, vec![upstream("p1", 1), upstream("p2", 1)]).await;
    fixture.run("p1", 1, vec![scm("g", &["rev1"])]).await;
    fixture.run("p2", 1, vec![scm("g", &["rev2", "rev1"])]).await;

    let model = fixture.service().get_value_stream_map("p3", 1, &viewer()).await.unwrap();

    let root = model.current_pipeline().unwrap();
    assert_eq!(root.view_state(), ViewState::Warning);
    assert_eq!(
        root.message(),
        Some("Value Stream Map has been built from incompatible revisions of: https://example.com/g.git.")
    );
    assert_eq!(revision_ids(&model, "g"), vec!["rev1", "rev2"]);
}

#[tokio::test]
async fn test_shared_head_revision_does_not_warn() {
    let fixture = Fixture::new([
        PipelineConfig::new("p1").with_scm(git("g")),
        PipelineConfig::new("p2").with_scm(git("g")),
        PipelineConfig::new("p3").with_dependency("p1", "s").with_dependency("p2", "s"),
    ]);
    fixture.run("p3", 1, vec![upstream("p1", 1), upstream("p2", 1)]).await;
    fixture.run("p1", 1, vec![scm("g", &["rev1"])]).await;
    fixture.run("p2", 1, vec![scm("g", &["rev1", "rev2"])]).await;

    let model = fixture.service().get_value_stream_map("p3", 1, &viewer()).await.unwrap();

    assert_eq!(model.current_pipeline().unwrap().view_state(), ViewState::Normal);
    assert_eq!(revision_ids(&model, "g"), vec!["rev1", "rev2"]);
}

#[tokio::test]
async fn test_warning_can_be_disabled() {
    let fixture = Fixture::new([
        PipelineConfig::new("p1").with_scm(git("g")),
        PipelineConfig::new("p2").with_scm(git("g")),
        PipelineConfig::new("p3").with_dependency("p1", "s").with_dependency("p2", "s"),
    ]);
    fixture.run("p3", 1, vec![upstream("p1", 1), upstream("p2", 1)]).await;
    fixture.run("p1", 1, vec![scm("g", &["rev1"])]).await;
    fixture.run("p2", 1, vec![scm("g", &["rev2"])]).await;
    let settings = ValueStreamMapConfig {
        warn_on_incompatible_revisions: false,
        ..ValueStreamMapConfig::default()
    };

    let model = fixture.service_with(settings).get_value_stream_map("p3", 1, &viewer()).await.unwrap();

    assert_eq!(model.current_pipeline().unwrap().view_state(), ViewState::Normal);
}

// ============================================================================
// Pipeline map failures
// ============================================================================

#[tokio::test]
async fn test_unauthorized_root() {
    let fixture = Fixture::new([PipelineConfig::new("p3")]);
    fixture.run("p3", 1, Vec::new()).await;
    fixture.permissions.deny_pipeline(&viewer(), "p3").await;

    let failure = fixture.service().get_value_stream_map("p3", 1, &viewer()).await.unwrap_err();

    assert_eq!(failure.status, status::UNAUTHORIZED);
    assert_eq!(failure.message_key, keys::VSM_PIPELINE_UNAUTHORIZED);
    assert_eq!(failure.message, "You do not have view permissions for pipeline 'p3'.");
}

#[tokio::test]
async fn test_missing_run() {
    let fixture = Fixture::new([PipelineConfig::new("p3")]);

    let failure = fixture.service().get_value_stream_map("p3", 9, &viewer()).await.unwrap_err();

    assert_eq!(failure.status, status::INTERNAL_SERVER_ERROR);
    assert_eq!(failure.message_key, keys::VSM_INTERNAL_ERROR);
    assert_eq!(
        failure.message,
        "Value Stream Map of pipeline 'p3' with counter '9' can not be rendered. Please check the server log for details."
    );
}

#[tokio::test]
async fn test_history_cycle() {
    let fixture = Fixture::new([PipelineConfig::new("p1"), PipelineConfig::new("p2")]);
    fixture.run("p1", 2, vec![upstream("p2", 1)]).await;
    fixture.run("p2", 1, vec![upstream("p1", 1)]).await;
    fixture.run("p1", 1, Vec::new()).await;

    let failure = fixture.service().get_value_stream_map("p1", 2, &viewer()).await.unwrap_err();

    assert_eq!(failure.status, status::NOT_IMPLEMENTED);
    assert_eq!(failure.message_key, keys::VSM_CYCLIC_DEPENDENCY);
    assert!(
        failure
            .message
            .starts_with("Value Stream Map of Pipeline 'p1' with counter '2' can not be rendered. Changes to the configuration")
    );
}

#[tokio::test]
async fn test_collaborator_failure_is_sanitized() {
    let fixture = Fixture::new([PipelineConfig::new("p3")]);
    fixture.run("p3", 1, Vec::new()).await;
    fixture.history.fail_with("database offline").await;

    let failure = fixture.service().get_value_stream_map("p3", 1, &viewer()).await.unwrap_err();

    assert_eq!(failure.status, status::INTERNAL_SERVER_ERROR);
    assert!(!failure.message.contains("database offline"));
}

// ============================================================================
// Material maps
// ============================================================================

#[tokio::test]
async fn test_material_map() {
    let fixture = delivery();
    fixture.run("build", 1, vec![scm("g", &["r2", "r1"])]).await;
    fixture.run("test", 3, vec![upstream("build", 1)]).await;

    let model = fixture.service().get_material_value_stream_map("g", "r1", &viewer()).await.unwrap();

    assert!(model.current_pipeline().is_none());
    assert_eq!(model.current_material().unwrap().id(), &NodeId::material("g"));
    assert_eq!(level_names(&model), vec![vec!["g"], vec!["build"], vec!["test", "*"], vec!["deploy"]]);
    assert_eq!(revision_ids(&model, "g"), vec!["r1"]);
    assert_eq!(counters(&model, "build"), vec![1]);
    assert_eq!(counters(&model, "test"), vec![3]);
    assert!(counters(&model, "deploy").is_empty());
}

#[tokio::test]
async fn test_material_map_failures() {
    let fixture = Fixture::new([
        PipelineConfig::new("build").with_scm(git("g")),
        PipelineConfig::new("fresh").with_scm(git("new")),
    ]);
    fixture.run("build", 1, vec![scm("g", &["r1"])]).await;
    let service = fixture.service();

    let failure = service.get_material_value_stream_map("nope", "r1", &viewer()).await.unwrap_err();
    assert_eq!(failure.status, status::NOT_FOUND);
    assert_eq!(failure.message, "Material with fingerprint 'nope' not found.");

    let failure = service.get_material_value_stream_map("new", "r1", &viewer()).await.unwrap_err();
    assert_eq!(failure.status, status::NOT_FOUND);
    assert_eq!(failure.message, "Material Instance with fingerprint 'new' not found.");

    let failure = service.get_material_value_stream_map("g", "r9", &viewer()).await.unwrap_err();
    assert_eq!(failure.status, status::NOT_FOUND);
    assert_eq!(failure.message_key, keys::VSM_MODIFICATION_NOT_FOUND);
    assert_eq!(failure.message, "Modification 'r9' for material with fingerprint 'g' not found.");

    fixture.permissions.deny_material(&viewer(), "g").await;
    let failure = service.get_material_value_stream_map("g", "r1", &viewer()).await.unwrap_err();
    assert_eq!(failure.status, status::UNAUTHORIZED);
    assert_eq!(failure.message_key, keys::VSM_MATERIAL_UNAUTHORIZED);
    assert_eq!(failure.message, "You do not have view permissions for material with fingerprint 'g'.");
}
