//! Tests for dirty-flag propagation.

use std::sync::Arc;

use mockall::predicate::eq;
use rstest::rstest;

use super::*;
use crate::domain::ports::MockInventoryStore;
use crate::domain::{Role, ThreadAssignment, ThreadAssignmentId};

fn propagator(store: MockInventoryStore) -> DirtyPropagator<MockInventoryStore> {
    DirtyPropagator::new(Arc::new(store), Arc::new(NamingRules::default()))
}

fn role(id: i64, name: &str) -> Role {
    Role {
        id: RoleId::new(id),
        name: name.to_owned(),
        ipadr: String::new(),
        accounts: AccountSet::default(),
        cpu: CpuAssignment::Unassigned,
        has_data: false,
        description: String::new(),
    }
}

fn assignment(id: i64, role: i64, edge_file: i64) -> ThreadAssignment {
    ThreadAssignment {
        id: ThreadAssignmentId::new(id),
        role_id: RoleId::new(role),
        account: "vdl".to_owned(),
        edge_file_id: Some(EdgeFileId::new(edge_file)),
        tag: "Q330".to_owned(),
        args: String::new(),
    }
}

fn assigned(id: i64) -> CpuAssignment {
    CpuAssignment::Assigned(CpuId::new(id))
}

#[rstest]
#[tokio::test]
async fn cpu_move_marks_both_ends() {
    let mut store = MockInventoryStore::new();
    store
        .expect_mark_cpu_dirty()
        .with(eq(CpuId::new(1)))
        .times(1)
        .returning(|_| Ok(()));
    store
        .expect_mark_cpu_dirty()
        .with(eq(CpuId::new(2)))
        .times(1)
        .returning(|_| Ok(()));

    let marks = propagator(store)
        .on_cpu_reassignment(assigned(1), assigned(2))
        .await
        .expect("marks succeed");

    assert_eq!(
        marks.cpus.into_iter().collect::<Vec<_>>(),
        [CpuId::new(1), CpuId::new(2)]
    );
    assert!(marks.roles.is_empty());
}

#[rstest]
#[case(CpuAssignment::Unassigned, assigned(4), 4)]
#[case(assigned(4), CpuAssignment::Unassigned, 4)]
#[tokio::test]
async fn unassigned_end_is_skipped(
    #[case] old: CpuAssignment,
    #[case] new: CpuAssignment,
    #[case] marked: i64,
) {
    let mut store = MockInventoryStore::new();
    store
        .expect_mark_cpu_dirty()
        .with(eq(CpuId::new(marked)))
        .times(1)
        .returning(|_| Ok(()));

    let marks = propagator(store)
        .on_cpu_reassignment(old, new)
        .await
        .expect("marks succeed");
    assert_eq!(marks.cpus.len(), 1);
}

#[rstest]
#[tokio::test]
async fn unchanged_cpu_marks_nothing() {
    let mut store = MockInventoryStore::new();
    store.expect_mark_cpu_dirty().times(0);

    let marks = propagator(store)
        .on_cpu_reassignment(assigned(3), assigned(3))
        .await
        .expect("no-op");
    assert!(marks.is_empty());
}

#[rstest]
#[case("a b", "a b", false)]
#[case("a  b", "a b", false)]
#[case("a b", "b a", true)]
#[case("a b", "a c", true)]
#[tokio::test]
async fn accounts_change_uses_string_inequality(
    #[case] old: &str,
    #[case] new: &str,
    #[case] dirty: bool,
) {
    let mut store = MockInventoryStore::new();
    store
        .expect_mark_role_dirty()
        .with(eq(RoleId::new(8)))
        .times(usize::from(dirty))
        .returning(|_| Ok(()));

    let marks = propagator(store)
        .on_accounts_changed(RoleId::new(8), &AccountSet::parse(old), &AccountSet::parse(new))
        .await
        .expect("marks succeed");
    assert_eq!(marks.roles.contains(&RoleId::new(8)), dirty);
}

#[rstest]
#[tokio::test]
async fn edge_file_save_marks_each_referencing_role_once() {
    let mut store = MockInventoryStore::new();
    store
        .expect_list_thread_assignments_by_edge_file()
        .with(eq(EdgeFileId::new(30)))
        .return_once(|_| {
            Ok(vec![
                assignment(1, 7, 30),
                assignment(2, 7, 30),
                assignment(3, 9, 30),
            ])
        });
    store
        .expect_mark_role_dirty()
        .with(eq(RoleId::new(7)))
        .times(1)
        .returning(|_| Ok(()));
    store
        .expect_mark_role_dirty()
        .with(eq(RoleId::new(9)))
        .times(1)
        .returning(|_| Ok(()));
    store.expect_find_role_by_name().times(0);

    let marks = propagator(store)
        .on_edge_file_saved(EdgeFileId::new(30), "edgemom.setup")
        .await
        .expect("marks succeed");
    assert_eq!(marks.roles.len(), 2);
}

#[rstest]
#[tokio::test]
async fn reftek_file_marks_gacq4_without_references() {
    let mut store = MockInventoryStore::new();
    store
        .expect_list_thread_assignments_by_edge_file()
        .return_once(|_| Ok(Vec::new()));
    store
        .expect_find_role_by_name()
        .with(eq("gacq4"))
        .times(1)
        .return_once(|_| Ok(Some(role(44, "gacq4"))));
    store
        .expect_mark_role_dirty()
        .with(eq(RoleId::new(44)))
        .times(1)
        .returning(|_| Ok(()));

    let marks = propagator(store)
        .on_edge_file_saved(EdgeFileId::new(2), "etc.gacq4.~reftek.cfg")
        .await
        .expect("marks succeed");
    assert!(marks.roles.contains(&RoleId::new(44)));
}

#[rstest]
#[tokio::test]
async fn naming_rule_does_not_remark_referenced_role() {
    let mut store = MockInventoryStore::new();
    store
        .expect_list_thread_assignments_by_edge_file()
        .return_once(|_| Ok(vec![assignment(1, 12, 5)]));
    store
        .expect_find_role_by_name()
        .with(eq("gacq1"))
        .return_once(|_| Ok(Some(role(12, "gacq1"))));
    store
        .expect_mark_role_dirty()
        .with(eq(RoleId::new(12)))
        .times(1)
        .returning(|_| Ok(()));

    let marks = propagator(store)
        .on_edge_file_saved(EdgeFileId::new(5), "crontab.gacq1.vdl")
        .await
        .expect("marks succeed");
    assert_eq!(marks.roles.len(), 1);
}

#[rstest]
#[tokio::test]
async fn unknown_role_from_naming_rule_is_skipped() {
    let mut store = MockInventoryStore::new();
    store
        .expect_list_thread_assignments_by_edge_file()
        .return_once(|_| Ok(Vec::new()));
    store
        .expect_find_role_by_name()
        .with(eq("gacq7"))
        .return_once(|_| Ok(None));
    store.expect_mark_role_dirty().times(0);

    let marks = propagator(store)
        .on_edge_file_saved(EdgeFileId::new(5), "import_gacq7.cfg")
        .await
        .expect("nothing to mark");
    assert!(marks.is_empty());
}

#[rstest]
#[tokio::test]
async fn failure_reports_marks_already_made() {
    let mut store = MockInventoryStore::new();
    store.expect_mark_cpu_dirty().with(eq(CpuId::new(1))).returning(|_| Ok(()));
    store
        .expect_mark_cpu_dirty()
        .with(eq(CpuId::new(2)))
        .returning(|_| Err(InventoryStoreError::query("disk full")));

    let failure = propagator(store)
        .on_cpu_reassignment(assigned(1), assigned(2))
        .await
        .expect_err("second mark fails");

    assert!(failure.marked.cpus.contains(&CpuId::new(1)));
    assert_eq!(failure.source, InventoryStoreError::query("disk full"));
}
