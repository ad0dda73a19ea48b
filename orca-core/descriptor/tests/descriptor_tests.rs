//! 描述文件加载集成测试

use orca_descriptor::{
    DescriptorError, DescriptorLoader, NoRequirements, TaskKind, VarSource,
};

const SCENARIO: &str = r#"
name: demo-{{env}}
provision:
  - name: h1
    groups: web
    provisioner: beaker
  - name: h2
    groups: web
    provisioner: beaker
  - name: h3
    groups: db
    ip_address: 10.0.0.3
    credentials:
      user: root
      password: secret
orchestrate:
  - name: setup
    orchestrator: local
    targets: [web, h3]
    command: "echo {{greeting}}"
"#;

fn sources() -> Vec<VarSource> {
    vec![
        VarSource::from_pairs("defaults", [("env", "dev"), ("greeting", "hi")]),
        VarSource::from_pairs("override", [("env", "prod")]),
    ]
}

#[test]
fn test_load_model_with_templating() {
    let model = DescriptorLoader::new()
        .load_model(SCENARIO, &sources(), &NoRequirements)
        .unwrap();

    assert_eq!(model.name(), "demo-prod");
    let task = model.task(TaskKind::Orchestrate, "setup").unwrap();
    assert_eq!(task.params["command"], "echo hi");
    assert_eq!(task.targets, vec!["web", "h3"]);
}

#[test]
fn test_undefined_variable_is_template_error() {
    let only_env = vec![VarSource::from_pairs("v", [("env", "dev")])];
    let err = DescriptorLoader::new()
        .load_model(SCENARIO, &only_env, &NoRequirements)
        .unwrap_err();

    assert!(matches!(err, DescriptorError::Template(_)));
}

#[test]
fn test_rendered_syntax_error() {
    let sources = vec![VarSource::from_pairs("v", [("items", "[a, b")])];
    let err = DescriptorLoader::new()
        .load("name: x\ngroups: {{items}}\n", &sources)
        .unwrap_err();

    assert!(matches!(err, DescriptorError::Syntax(_)));
}

#[test]
fn test_load_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scenario.yml");
    std::fs::write(&path, SCENARIO).unwrap();

    let raw = DescriptorLoader::new().load_file(&path, &sources()).unwrap();
    assert_eq!(raw.provision.len(), 3);
}

#[test]
fn test_missing_file_is_io_error() {
    let err = DescriptorLoader::new()
        .load_file("/nonexistent/orca/scenario.yml", &[])
        .unwrap_err();
    assert!(matches!(err, DescriptorError::IoError(_)));
}

#[test]
fn test_json_descriptor_accepted() {
    let json = r#"{"name": "from-json", "provision": [{"name": "h1"}]}"#;
    let model = DescriptorLoader::new()
        .load_model(json, &[], &NoRequirements)
        .unwrap();

    assert_eq!(model.name(), "from-json");
    assert_eq!(model.assets()[0].name, "h1");
}
