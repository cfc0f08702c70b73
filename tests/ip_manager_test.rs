// ==========================================
// IP 管理器集成测试
// ==========================================
// 测试目标: 条件查询、分类子树查询、发布、更新、打包、完整性检查、配置覆写
// ==========================================


use iplm::api::{ApiError, IpManager};
use iplm::config::{config_keys, CatalogSettings};
use iplm::domain::{DanglingParentPolicy, IpStatus, IpUpdate, UnknownKeyPolicy};
use iplm::engine::IntegrityIssue;
use iplm::query::SearchCriteria;
use iplm::repository::{SqliteGateway, StorageGateway};
use rusqlite::types::Value;
use std::sync::Arc;
use test_helpers::{names, seed_catalog, RecordingGateway, Seed};

fn manager_with(gateway: Arc<dyn StorageGateway>, settings: CatalogSettings) -> (IpManager, Seed) {
    let seed = seed_catalog(Arc::clone(&gateway));
    (IpManager::from_gateway(gateway, settings), seed)
}

fn memory_settings() -> CatalogSettings {
    test_helpers::test_settings(":memory:")
}

fn setup() -> (IpManager, Seed) {
    manager_with(Arc::new(test_helpers::memory_gateway()), memory_settings())
}

// ==========================================
// 查询
// ==========================================

#[test]
fn test_find_with_three_criteria() {
    let (manager, _) = setup();

    let criteria = SearchCriteria::new()
        .type_name("CPU")
        .process_name("SoC_1")
        .status(IpStatus::Alpha);
    let found = manager.find(&criteria).unwrap();

    assert_eq!(names(&found), vec!["CPU_Subsystem"]);
}

#[test]
fn test_find_with_empty_criteria_returns_all_sorted() {
    let (manager, _) = setup();

    let found = manager.find(&SearchCriteria::new()).unwrap();

    assert_eq!(
        names(&found),
        vec!["CPU_Subsystem", "Cortex_A53", "Mem_Subsystem", "PLL", "SoC"]
    );
}

#[test]
fn test_find_by_fab_and_node() {
    let (manager, _) = setup();

    let found = manager
        .find(&SearchCriteria::new().fab("SMIC").node("40nm"))
        .unwrap();
    assert_eq!(names(&found), vec!["PLL"]);

    let none = manager
        .find(&SearchCriteria::new().fab("SMIC").provider("ARM"))
        .unwrap();
    assert!(none.is_empty());
}

#[test]
fn test_find_by_pairs_policies() {
    let (manager, _) = setup();

    let found = manager
        .find_by_pairs(&[("provider", "ARM"), ("colour", "red")])
        .unwrap();
    assert_eq!(names(&found), vec!["CPU_Subsystem", "Cortex_A53"]);

    let err = manager.find_by_pairs(&[("status", "bogus")]).unwrap_err();
    assert!(err.is_input_error());

    let mut settings = memory_settings();
    settings.unknown_key_policy = UnknownKeyPolicy::Reject;
    let (strict, _) = manager_with(Arc::new(test_helpers::memory_gateway()), settings);
    assert!(strict.find_by_pairs(&[("colour", "red")]).is_err());
}

#[test]
fn test_find_by_type_tree_binds_subtree_ids() {
    let recording = Arc::new(RecordingGateway::new(test_helpers::memory_gateway()));
    let gateway: Arc<dyn StorageGateway> = recording.clone();
    let (manager, seed) = manager_with(gateway, memory_settings());
    recording.clear();

    let found = manager.find_by_type_tree("Digital", true).unwrap();

    assert_eq!(
        names(&found),
        vec!["CPU_Subsystem", "Cortex_A53", "Mem_Subsystem", "SoC"]
    );

    let queries = recording.recorded_queries();
    let (_, params) = queries
        .iter()
        .find(|(sql, _)| sql.contains("type_id IN"))
        .expect("type tree query recorded");
    let expected: Vec<Value> = [seed.digital.id, seed.cpu.id, seed.arm.id]
        .iter()
        .map(|id| Value::Integer(id.unwrap()))
        .collect();
    assert_eq!(params, &expected);
}

#[test]
fn test_find_by_type_tree_without_descendants() {
    let (manager, _) = setup();

    let found = manager.find_by_type_tree("Digital", false).unwrap();
    assert_eq!(names(&found), vec!["Mem_Subsystem", "SoC"]);

    let leaf = manager.find_by_type_tree("ARM", true).unwrap();
    assert_eq!(names(&leaf), vec!["Cortex_A53"]);

    assert!(manager.find_by_type_tree("Mixed", true).unwrap().is_empty());
}

// ==========================================
// 生命周期
// ==========================================

#[test]
fn test_release_persists_production() {
    let (manager, _) = setup();

    assert!(manager.release("SoC").unwrap());
    assert_eq!(
        manager.fetch("SoC").unwrap().unwrap().status,
        IpStatus::Production
    );

    // 已是 production 时再次发布仍成功
    assert!(manager.release("PLL").unwrap());
    assert!(!manager.release("Missing").unwrap());
}

#[test]
fn test_update_applies_only_supplied_fields() {
    let (manager, _) = setup();

    let update = IpUpdate::new().revision("2.1").status(IpStatus::Beta);
    assert!(manager.update("Cortex_A53", &update).unwrap());

    let cortex = manager.fetch("Cortex_A53").unwrap().unwrap();
    assert_eq!(cortex.revision, "2.1");
    assert_eq!(cortex.status, IpStatus::Beta);
    assert_eq!(cortex.provider, "ARM");
    assert_eq!(cortex.description, "64-bit application core");

    assert!(!manager.update("Missing", &update).unwrap());
}

#[test]
fn test_update_fields_invalid_status_leaves_storage_unchanged() {
    let (manager, _) = setup();

    let err = manager
        .update_fields("SoC", &[("provider", "Vendor"), ("status", "bogus")])
        .unwrap_err();

    assert!(matches!(err, ApiError::ValidationError(_)));
    let soc = manager.fetch("SoC").unwrap().unwrap();
    assert_eq!(soc.status, IpStatus::Beta);
    assert_eq!(soc.provider, "Internal");
}

#[test]
fn test_update_fields_parent_link_is_not_updatable() {
    let (manager, seed) = setup();

    assert!(manager
        .update_fields("Mem_Subsystem", &[("parent_ip_id", "999"), ("provider", "Arteris")])
        .unwrap());
    let mem = manager.fetch("Mem_Subsystem").unwrap().unwrap();
    assert_eq!(mem.parent_ip_id, seed.soc.id);
    assert_eq!(mem.provider, "Arteris");

    let mut settings = memory_settings();
    settings.unknown_key_policy = UnknownKeyPolicy::Reject;
    let (strict, _) = manager_with(Arc::new(test_helpers::memory_gateway()), settings);
    let err = strict
        .update_fields("Mem_Subsystem", &[("parent_ip_id", "999")])
        .unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)));
}

#[test]
fn test_update_rename_conflict_is_business_rule_violation() {
    let (manager, _) = setup();

    let err = manager
        .update("PLL", &IpUpdate::new().name("SoC"))
        .unwrap_err();

    assert!(matches!(err, ApiError::BusinessRuleViolation(_)));
    assert!(manager.fetch("PLL").unwrap().is_some());
}

// ==========================================
// 打包
// ==========================================

#[test]
fn test_pack_resolves_related_records() {
    let (manager, _) = setup();
    let criteria = SearchCriteria::new().process_name("SoC_1").provider("ARM");

    let document = manager.pack(&criteria).unwrap();

    assert_eq!(document.metadata.total_ips, 2);
    assert_eq!(document.metadata.criteria, criteria);

    let cpu = &document.ips[0];
    assert_eq!(cpu.ip.name, "CPU_Subsystem");
    assert_eq!(cpu.type_node.as_ref().unwrap().name, "CPU");
    assert_eq!(cpu.process.as_ref().unwrap().fab, "TSMC");
    assert_eq!(cpu.parent.as_ref().unwrap().name, "SoC");
    assert_eq!(names(&cpu.children), vec!["Cortex_A53"]);

    let cortex = &document.ips[1];
    assert!(cortex.children.is_empty());

    let json = document.to_json_pretty().unwrap();
    assert!(json.contains("\"type\""));
    assert!(json.contains("\"pack_id\""));

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["metadata"]["criteria"]["provider"], "ARM");
    assert_eq!(value["ips"][0]["name"], "CPU_Subsystem");
    assert_eq!(value["ips"][0]["type"]["path"], "Digital/CPU");
}

#[test]
fn test_pack_with_no_matches() {
    let (manager, _) = setup();

    let document = manager
        .pack(&SearchCriteria::new().name("Missing"))
        .unwrap();

    assert_eq!(document.metadata.total_ips, 0);
    assert!(document.ips.is_empty());
}

// ==========================================
// 完整性
// ==========================================

#[test]
fn test_integrity_clean_on_seed() {
    let (manager, _) = setup();

    let report = manager.check_integrity().unwrap();

    assert!(report.is_clean());
    assert_eq!(report.checked_types, 4);
    assert_eq!(report.checked_ips, 5);
    assert_eq!(report.checked_processes, 2);
}

#[test]
fn test_integrity_reports_dangling_ip_parents() {
    let (manager, seed) = setup();

    assert!(manager.ips().delete(&seed.soc).unwrap());
    let report = manager.check_integrity().unwrap();

    assert_eq!(report.issue_count(), 2);
    for issue in &report.issues {
        match issue {
            IntegrityIssue::DanglingIpParent { parent_ip_id, .. } => {
                assert_eq!(Some(*parent_ip_id), seed.soc.id)
            }
            other => panic!("unexpected issue: {:?}", other),
        }
    }
}

// ==========================================
// 打开数据库与配置覆写
// ==========================================

#[test]
fn test_open_applies_config_overrides_on_reopen() {
    let (_temp_file, db_path) = test_helpers::create_test_db().unwrap();

    {
        let manager = IpManager::open(test_helpers::test_settings(&db_path)).unwrap();
        assert_eq!(
            manager.settings().dangling_parent_policy,
            DanglingParentPolicy::TreatAsRoot
        );
        manager
            .config()
            .set_config_value(config_keys::DANGLING_PARENT_POLICY, "reject")
            .unwrap();
    }

    let manager = IpManager::open(test_helpers::test_settings(&db_path)).unwrap();
    assert_eq!(
        manager.settings().dangling_parent_policy,
        DanglingParentPolicy::Reject
    );
    assert_eq!(manager.types().policy(), DanglingParentPolicy::Reject);
}

#[test]
fn test_open_ignores_invalid_stored_override() {
    let (_temp_file, db_path) = test_helpers::create_test_db().unwrap();
    {
        let gateway = SqliteGateway::new(&db_path).unwrap();
        gateway
            .execute_statement(
                "INSERT INTO config_kv (key, value) VALUES (?, ?)",
                &[
                    Value::Text(config_keys::UNKNOWN_KEY_POLICY.to_string()),
                    Value::Text("sometimes".to_string()),
                ],
            )
            .unwrap();
    }

    let manager = IpManager::open(test_helpers::test_settings(&db_path)).unwrap();
    assert_eq!(manager.settings().unknown_key_policy, UnknownKeyPolicy::Ignore);
}
