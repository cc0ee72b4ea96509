//! Tests for the planner

use super::*;
use pretty_assertions::assert_eq;

fn unit(source: &str, partition: &str) -> WorkUnit {
    WorkUnit::new(source, partition, format!("https://api.example.com/{source}"))
}

fn keys(units: &[WorkUnit]) -> Vec<String> {
    units.iter().map(WorkUnit::id).collect()
}

// ============================================================================
// plan
// ============================================================================

#[test]
fn test_plan_keeps_declared_order() {
    let required = vec![unit("a", "1"), unit("b", "1"), unit("c", "1")];
    let completed = HashSet::from([UnitKey::new("b", "1")]);

    let planned = plan(&required, &completed);
    assert_eq!(keys(&planned), vec!["a/1", "c/1"]);
}

#[test]
fn test_plan_all_completed_is_empty() {
    let required = vec![unit("a", "1")];
    let completed = HashSet::from([UnitKey::new("a", "1")]);

    assert!(plan(&required, &completed).is_empty());
}

#[test]
fn test_plan_nothing_completed() {
    let required = vec![unit("z", "2020"), unit("a", "2019")];
    let planned = plan(&required, &HashSet::new());
    assert_eq!(planned, required);
}

#[test]
fn test_plan_ignores_unrelated_completed_units() {
    let required = vec![unit("a", "1"), unit("a", "2")];
    let completed = HashSet::from([UnitKey::new("x", "1"), UnitKey::new("a", "3")]);

    assert_eq!(keys(&plan(&required, &completed)), vec!["a/1", "a/2"]);
}

// ============================================================================
// required_units
// ============================================================================

#[test]
fn test_required_units_pairs_partitions_with_locators() {
    let sources = vec![
        SourceDecl::new("boston", "https://api.example.com/boston"),
        SourceDecl::new("chicago", "https://api.example.com/chicago"),
    ];
    let partitions = vec![
        PartitionDecl::new("chicago", "2023"),
        PartitionDecl::new("boston", "2024"),
        PartitionDecl::new("boston", "2022"),
    ];

    let units = required_units(&sources, &partitions);
    assert_eq!(keys(&units), vec!["chicago/2023", "boston/2024", "boston/2022"]);
    assert_eq!(units[1].origin_locator, "https://api.example.com/boston");
}

#[test]
fn test_required_units_drops_undeclared_sources() {
    let sources = vec![SourceDecl::new("boston", "u")];
    let partitions = vec![
        PartitionDecl::new("nowhere", "2024"),
        PartitionDecl::new("boston", "2024"),
    ];

    assert_eq!(keys(&required_units(&sources, &partitions)), vec!["boston/2024"]);
}

#[test]
fn test_required_units_are_unique() {
    let sources = vec![SourceDecl::new("boston", "u")];
    let partitions = vec![
        PartitionDecl::new("boston", "2024"),
        PartitionDecl::new("boston", "2023"),
        PartitionDecl::new("boston", "2024"),
    ];

    assert_eq!(
        keys(&required_units(&sources, &partitions)),
        vec!["boston/2024", "boston/2023"]
    );
}

#[test]
fn test_required_units_first_locator_wins() {
    let sources = vec![SourceDecl::new("s", "first"), SourceDecl::new("s", "second")];
    let partitions = vec![PartitionDecl::new("s", "1")];

    assert_eq!(required_units(&sources, &partitions)[0].origin_locator, "first");
}

// ============================================================================
// completed_units
// ============================================================================

#[test]
fn test_completed_units_without_ledger_uses_output() {
    let output = HashSet::from([UnitKey::new("a", "1")]);
    let completed = completed_units(&output, &Checkpoint::new());
    assert_eq!(completed, output);
}

#[test]
fn test_completed_units_excludes_partial_units() {
    let output = HashSet::from([UnitKey::new("a", "1"), UnitKey::new("b", "1")]);
    let mut checkpoint = Checkpoint::new();
    checkpoint.mark_unit("a/1", UnitStatus::InProgress, None);
    checkpoint.mark_unit("b/1", UnitStatus::Failed, Some("HTTP 500".into()));

    assert!(completed_units(&output, &checkpoint).is_empty());
}

#[test]
fn test_completed_units_includes_empty_complete_units() {
    let mut checkpoint = Checkpoint::new();
    checkpoint.mark_unit("quiet/2020", UnitStatus::Complete, None);

    let completed = completed_units(&HashSet::new(), &checkpoint);
    assert_eq!(completed, HashSet::from([UnitKey::new("quiet", "2020")]));
}

#[test]
fn test_unit_display() {
    let u = unit("boston", "2024");
    assert_eq!(u.to_string(), "boston/2024");
    assert_eq!(u.key().to_string(), "boston/2024");
}
