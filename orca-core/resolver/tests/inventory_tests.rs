//! 清单构建集成测试

use orca_descriptor::{parse_document, ConnectionAttributes, ModelBuilder, NoRequirements, ResourceModel};
use orca_resolver::{InventoryBuilder, TargetResolver, UNGROUPED};
use std::collections::HashMap;

const SCENARIO: &str = r#"
name: inventory
provision:
  - name: h1
    groups: web
    provisioner: dummy
  - name: h2
    groups: web
    provisioner: dummy
  - name: h3
    groups: db
    ip_address: 10.0.0.3
    credentials:
      user: root
      password: secret
  - name: solo
    hostname: solo.example.com
"#;

fn model() -> ResourceModel {
    ModelBuilder::new(&NoRequirements)
        .build(parse_document(SCENARIO).unwrap())
        .unwrap()
}

fn targets(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn provisioned() -> HashMap<String, ConnectionAttributes> {
    let mut connections = HashMap::new();
    connections.insert("h1".to_string(), ConnectionAttributes::with_ip("10.0.0.1"));
    connections.insert("h2".to_string(), ConnectionAttributes::with_ip("10.0.0.2"));
    connections
}

#[test]
fn test_inventory_hosts_and_groups() {
    let model = model();
    let resolved = TargetResolver::new(&model)
        .resolve("setup", &targets(&["web", "h3"]), false)
        .unwrap();

    let inventory = InventoryBuilder::build(&model, &resolved, &provisioned());

    assert_eq!(inventory.host_names(), vec!["h1", "h2", "h3"]);
    assert_eq!(inventory.group("web").unwrap().hosts, vec!["h1", "h2"]);
    assert_eq!(inventory.group("db").unwrap().hosts, vec!["h3"]);
    assert!(inventory.group(UNGROUPED).is_none());

    assert_eq!(
        inventory.host("h1").unwrap().connection.address(),
        Some("10.0.0.1")
    );
    // 静态资产使用声明的连接属性
    assert_eq!(
        inventory.host("h3").unwrap().connection.address(),
        Some("10.0.0.3")
    );
}

#[test]
fn test_groupless_host_is_addressable() {
    let model = model();
    let resolved = TargetResolver::new(&model)
        .resolve("t", &targets(&["solo", "h1"]), false)
        .unwrap();

    let inventory = InventoryBuilder::build(&model, &resolved, &provisioned());

    let solo = inventory.host("solo").unwrap();
    assert!(solo.groups.is_empty());
    assert_eq!(inventory.group(UNGROUPED).unwrap().hosts, vec!["solo"]);
    assert!(inventory.to_ini().contains("[ungrouped]\nsolo\n"));
}

#[test]
fn test_inventory_is_idempotent() {
    let model = model();
    let resolved = TargetResolver::new(&model)
        .resolve("t", &targets(&["all"]), false)
        .unwrap();
    let connections = provisioned();

    let first = InventoryBuilder::build(&model, &resolved, &connections);
    let second = InventoryBuilder::build(&model, &resolved, &connections);
    assert_eq!(first, second);
}

#[test]
fn test_ini_masks_credentials() {
    let model = model();
    let resolved = TargetResolver::new(&model)
        .resolve("t", &targets(&["h3"]), false)
        .unwrap();

    let inventory = InventoryBuilder::build(&model, &resolved, &HashMap::new());
    let ini = inventory.to_ini();

    assert!(ini.starts_with("h3 ip_address=10.0.0.3"));
    assert!(ini.contains("user=root"));
    assert!(!ini.contains("secret"));
    assert!(ini.contains("[db]\nh3\n"));

    // 未脱敏的 JSON 保留原始凭据，供编排后端使用
    assert!(inventory.to_json().unwrap().contains("secret"));
    assert!(!inventory.masked().to_json().unwrap().contains("secret"));
}

#[test]
fn test_declared_ungrouped_group_is_merged() {
    let model = ModelBuilder::new(&NoRequirements)
        .build(
            parse_document("name: d\nprovision:\n  - name: a\n    groups: ungrouped\n  - name: b\n").unwrap(),
        )
        .unwrap();
    let resolved = TargetResolver::new(&model)
        .resolve("t", &targets(&["a", "b"]), false)
        .unwrap();

    let inventory = InventoryBuilder::build(&model, &resolved, &HashMap::new());

    let matching = inventory.groups.iter().filter(|g| g.name == UNGROUPED).count();
    assert_eq!(matching, 1);
    assert_eq!(inventory.group(UNGROUPED).unwrap().hosts, vec!["a", "b"]);
    assert_eq!(inventory.to_ini().matches("[ungrouped]").count(), 1);
}
