// ==========================================
// 分类树集成测试
// ==========================================
// 测试目标: 物化路径在文件库上的保存、级联、删除重挂、前缀查询
// ==========================================


use iplm::domain::TypeNode;
use iplm::logging;
use iplm::repository::{SqliteGateway, TypeRepository};
use std::sync::Arc;

fn open_repo(db_path: &str) -> TypeRepository {
    TypeRepository::new(Arc::new(SqliteGateway::new(db_path).unwrap()))
}

fn create(repo: &TypeRepository, name: &str, parent: Option<&TypeNode>) -> TypeNode {
    let mut node = TypeNode::new(name, parent.and_then(|p| p.id));
    repo.save(&mut node).unwrap();
    node
}

fn paths(nodes: &[TypeNode]) -> Vec<String> {
    nodes.iter().map(|n| n.path.clone()).collect()
}

#[test]
fn test_digital_cpu_arm_scenario() {
    logging::init_test();
    let (_temp_file, db_path) = test_helpers::create_test_db().unwrap();
    let repo = open_repo(&db_path);

    let digital = create(&repo, "Digital", None);
    let cpu = create(&repo, "CPU", Some(&digital));
    let arm = create(&repo, "ARM", Some(&cpu));

    assert_eq!((digital.path.as_str(), digital.level), ("Digital", 0));
    assert_eq!((cpu.path.as_str(), cpu.level), ("Digital/CPU", 1));
    assert_eq!((arm.path.as_str(), arm.level), ("Digital/CPU/ARM", 2));

    assert_eq!(
        paths(&repo.find_descendants(&digital).unwrap()),
        vec!["Digital/CPU", "Digital/CPU/ARM"]
    );
    assert_eq!(
        paths(&repo.find_ancestors(&arm).unwrap()),
        vec!["Digital", "Digital/CPU"]
    );
}

#[test]
fn test_prefix_predicates_are_inverse() {
    let (_temp_file, db_path) = test_helpers::create_test_db().unwrap();
    let repo = open_repo(&db_path);

    let digital = create(&repo, "Digital", None);
    let cpu = create(&repo, "CPU", Some(&digital));
    let arm = create(&repo, "ARM", Some(&cpu));
    let analog = create(&repo, "Analog", None);

    let all = [&digital, &cpu, &arm, &analog];
    for a in all {
        for b in all {
            assert_eq!(a.is_ancestor_of(b), b.is_descendant_of(a));
        }
    }
    assert!(digital.is_ancestor_of(&arm));
    assert!(!analog.is_ancestor_of(&arm));
    assert!(!arm.is_ancestor_of(&arm));
}

#[test]
fn test_tree_survives_reopen() {
    let (_temp_file, db_path) = test_helpers::create_test_db().unwrap();
    {
        let repo = open_repo(&db_path);
        let digital = create(&repo, "Digital", None);
        create(&repo, "CPU", Some(&digital));
    }

    let repo = open_repo(&db_path);
    let cpu = repo.find_by_path("Digital/CPU").unwrap().unwrap();
    assert_eq!(cpu.level, 1);
    assert_eq!(repo.find_ancestors(&cpu).unwrap()[0].name, "Digital");
}

#[test]
fn test_reparent_cascade_reaches_every_descendant() {
    let (_temp_file, db_path) = test_helpers::create_test_db().unwrap();
    let repo = open_repo(&db_path);

    let digital = create(&repo, "Digital", None);
    let mut cpu = create(&repo, "CPU", Some(&digital));
    let arm = create(&repo, "ARM", Some(&cpu));
    create(&repo, "RISCV", Some(&cpu));
    create(&repo, "Cortex", Some(&arm));
    let soc = create(&repo, "SoC", None);

    cpu.parent_id = soc.id;
    repo.save(&mut cpu).unwrap();

    let moved = repo.find_descendants(&cpu).unwrap();
    assert_eq!(
        paths(&moved),
        vec!["SoC/CPU/ARM", "SoC/CPU/ARM/Cortex", "SoC/CPU/RISCV"]
    );
    for node in &moved {
        let parent = repo.find_by_id(node.parent_id.unwrap()).unwrap().unwrap();
        assert_eq!(node.level, parent.level + 1);
        assert_eq!(node.path, format!("{}/{}", parent.path, node.name));
    }
    assert!(repo.find_descendants(&digital).unwrap().is_empty());
}

#[test]
fn test_delete_middle_node_reparents_subtree() {
    let (_temp_file, db_path) = test_helpers::create_test_db().unwrap();
    let repo = open_repo(&db_path);

    let digital = create(&repo, "Digital", None);
    let cpu = create(&repo, "CPU", Some(&digital));
    let arm = create(&repo, "ARM", Some(&cpu));
    create(&repo, "Cortex", Some(&arm));

    assert!(repo.delete(&cpu).unwrap());

    assert_eq!(
        paths(&repo.find_all().unwrap()),
        vec!["Digital", "Digital/ARM", "Digital/ARM/Cortex"]
    );
    let cortex = repo.find_by_path("Digital/ARM/Cortex").unwrap().unwrap();
    assert_eq!(cortex.level, 2);
}
