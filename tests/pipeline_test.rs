//! End-to-end tests of manifest parsing, detection, context building and
//! generation over real directory trees.

use octopilot::context::{self, WarningKind};
use octopilot::detection::{self, Confidence};
use octopilot::fs::RealFileSystem;
use octopilot::generate::{
    render_build_manifest, render_ci_workflow, reject_promotion_args, ArtifactRequest,
    BuildManifestRequest, WorkflowOptions,
};
use octopilot::{ErrorKind, LanguageId};
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn manifest(artifacts: &[(&str, &str)]) -> String {
    let mut yaml = String::from("apiVersion: skaffold/v4beta1\nkind: Config\nbuild:\n  artifacts:\n");
    for (image, context) in artifacts {
        yaml.push_str(&format!("    - image: {}\n      context: {}\n", image, context));
    }
    yaml
}

/// Go service declaring 1.22 plus a directory with no markers
fn go_and_static_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "services/api/go.mod", "module example.com/api\n\ngo 1.22\n");
    fs::create_dir_all(dir.path().join("static")).unwrap();
    write(
        dir.path(),
        "skaffold.yaml",
        &manifest(&[("ghcr.io/acme/api", "services/api"), ("ghcr.io/acme/static", "static")]),
    );
    dir
}

#[test]
fn test_go_and_unknown_artifacts() {
    let repo = go_and_static_repo();
    let pipeline = context::detect_workspace(&RealFileSystem::new(), repo.path()).unwrap();

    assert_eq!(
        serde_json::to_value(&pipeline.languages).unwrap(),
        json!([{"language": "go", "version": "1.22"}])
    );

    let api = &pipeline.artifacts[0];
    assert_eq!(api.image, "ghcr.io/acme/api");
    assert_eq!(api.language, LanguageId::Go);
    assert_eq!(api.version.as_deref(), Some("1.22"));
    assert_eq!(api.confidence, Confidence::Exact);

    let assets = &pipeline.artifacts[1];
    assert_eq!(assets.image, "ghcr.io/acme/static");
    assert_eq!(assets.language, LanguageId::Unknown);
    assert_eq!(assets.version, None);

    assert_eq!(pipeline.warnings.len(), 1);
    assert_eq!(pipeline.warnings[0].kind, WarningKind::Undetected);
}

#[test]
fn test_unknown_artifact_still_generates_workflow() {
    let repo = go_and_static_repo();
    let pipeline = context::detect_workspace(&RealFileSystem::new(), repo.path()).unwrap();

    let workflow = render_ci_workflow(&pipeline, &WorkflowOptions::new("ghcr.io/acme")).unwrap();
    let doc: serde_yaml::Value = serde_yaml::from_str(&workflow.content).unwrap();
    let jobs: Vec<String> = doc["jobs"]
        .as_mapping()
        .unwrap()
        .keys()
        .map(|k| k.as_str().unwrap().to_string())
        .collect();

    assert_eq!(jobs, vec!["lint", "test", "custom-ghcr-io-acme-static", "build"]);
    assert!(workflow.content.contains("actions/setup-go@v5"));
}

#[test]
fn test_pipeline_is_idempotent() {
    let repo = go_and_static_repo();
    let fs = RealFileSystem::new();
    let options = WorkflowOptions::new("ghcr.io/acme");

    let first = context::detect_workspace(&fs, repo.path()).unwrap();
    let second = context::detect_workspace(&fs, repo.path()).unwrap();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );

    let a = render_ci_workflow(&first, &options).unwrap();
    let b = render_ci_workflow(&second, &options).unwrap();
    assert_eq!(a.content, b.content);
}

#[test]
fn test_languages_follow_artifact_order() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "web/package.json", r#"{"engines": {"node": "20"}}"#);
    write(dir.path(), "api/go.mod", "module api\n\ngo 1.21\n");
    write(dir.path(), "worker/go.mod", "module worker\n\ngo 1.21\n");
    write(
        dir.path(),
        "skaffold.yaml",
        &manifest(&[("web", "web"), ("api", "api"), ("worker", "worker")]),
    );

    let pipeline = context::detect_workspace(&RealFileSystem::new(), dir.path()).unwrap();
    let languages: Vec<&str> = pipeline.languages.iter().map(|l| l.language.as_str()).collect();
    assert_eq!(languages, vec!["node", "go"]);

    write(
        dir.path(),
        "skaffold.yaml",
        &manifest(&[("api", "api"), ("web", "web"), ("worker", "worker")]),
    );
    let reordered = context::detect_workspace(&RealFileSystem::new(), dir.path()).unwrap();
    let languages: Vec<&str> = reordered.languages.iter().map(|l| l.language.as_str()).collect();
    let images: Vec<&str> = reordered.artifacts.iter().map(|a| a.image.as_str()).collect();
    assert_eq!(languages, vec!["go", "node"]);
    assert_eq!(images, vec!["api", "web", "worker"]);
}

#[test]
fn test_single_marker_confidence() {
    let cases: &[(&str, &str, &str, Confidence)] = &[
        ("go.mod", "module x\n\ngo 1.22\n", "go", Confidence::Exact),
        ("go.mod", "module x\n", "go", Confidence::Inferred),
        ("Cargo.toml", "[package]\nname = \"x\"\nrust-version = \"1.75\"\n", "rust", Confidence::Exact),
        ("package.json", "{}", "node", Confidence::Inferred),
        ("requirements.txt", "flask\n", "python", Confidence::Inferred),
        ("pom.xml", "<project></project>", "java", Confidence::Default),
    ];

    for (marker, content, language, confidence) in cases {
        let dir = TempDir::new().unwrap();
        write(dir.path(), marker, content);

        let detected = detection::detect(&RealFileSystem::new(), dir.path());

        assert_eq!(detected.language.as_str(), *language, "{}", marker);
        assert_eq!(detected.confidence, *confidence, "{}", marker);
    }
}

#[test]
fn test_missing_manifest() {
    let dir = TempDir::new().unwrap();
    let err = context::detect_workspace(&RealFileSystem::new(), dir.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ManifestNotFound);
}

#[test]
fn test_generated_manifest_detects_back() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "api/go.mod", "module api\n\ngo 1.22\n");

    let generated = render_build_manifest(&BuildManifestRequest {
        artifacts: vec![ArtifactRequest::new("api", "api")],
        builder: None,
    })
    .unwrap();
    write(dir.path(), &generated.path, &generated.content);

    let pipeline = context::detect_workspace(&RealFileSystem::new(), dir.path()).unwrap();
    assert_eq!(pipeline.artifacts[0].language, LanguageId::Go);
}

#[test]
fn test_promotion_never_generated() {
    let repo = go_and_static_repo();
    let pipeline = context::detect_workspace(&RealFileSystem::new(), repo.path()).unwrap();

    let mut options = WorkflowOptions::new("ghcr.io/acme");
    options.promote_gate_placeholder = true;
    let workflow = render_ci_workflow(&pipeline, &options).unwrap();
    let doc: serde_yaml::Value = serde_yaml::from_str(&workflow.content).unwrap();
    for (id, _) in doc["jobs"].as_mapping().unwrap() {
        assert!(!id.as_str().unwrap().contains("promot"));
    }

    options.promotion = Some(json!({"to": "prod"}));
    let err = render_ci_workflow(&pipeline, &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);

    let err = reject_promotion_args(&json!({"registry": "r", "promote": null})).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
}
