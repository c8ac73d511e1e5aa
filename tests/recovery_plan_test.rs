//! Recovery plan document tests
//!
//! Plans are declarative and validated entirely at load time.

use std::fs;
use tempfile::TempDir;

use syncmesh::error::RecoveryError;
use syncmesh::recovery::{RecoveryAction, RecoveryPlan};

#[test]
fn test_load_plan_from_file() {
	let dir = TempDir::new().unwrap();
	let path = dir.path().join("plan.yaml");
	fs::write(
		&path,
		r#"
phases:
  - id: fs_verification
    actions: [fs_check]
  - id: connectivity
    actions: [link_check]
  - id: repair
    actions: [intelligent_repair, resync]
"#,
	)
	.unwrap();

	let plan = RecoveryPlan::load(&path).unwrap();
	assert_eq!(plan.phases.len(), 3);
	assert_eq!(plan.phases[0].id, "fs_verification");
	assert_eq!(
		plan.phases[2].actions,
		vec![RecoveryAction::IntelligentRepair, RecoveryAction::Resync]
	);
}

#[test]
fn test_missing_plan_file() {
	let err = RecoveryPlan::load(std::path::Path::new("/no/such/plan.yaml")).unwrap_err();
	assert!(matches!(err, RecoveryError::NotFound { .. }));
}

#[test]
fn test_unknown_action_is_a_load_error() {
	let err = RecoveryPlan::from_yaml(
		r#"
phases:
  - id: repair
    actions: [intelligent_repair, reboot_universe]
"#,
	)
	.unwrap_err();

	match err {
		RecoveryError::UnknownAction { phase, action } => {
			assert_eq!(phase, "repair");
			assert_eq!(action, "reboot_universe");
		}
		other => panic!("expected UnknownAction, got {}", other),
	}
}

#[test]
fn test_malformed_document_is_a_parse_error() {
	let err = RecoveryPlan::from_yaml("phases: \"not a list\"").unwrap_err();
	assert!(matches!(err, RecoveryError::Parse { .. }));
}

#[test]
fn test_default_plan_checks_then_repairs() {
	let plan = RecoveryPlan::default_plan();
	assert!(plan.phases.len() >= 2);
	assert!(plan.phases[0].actions.contains(&RecoveryAction::FsCheck));
	assert!(plan
		.phases
		.iter()
		.any(|p| p.actions.contains(&RecoveryAction::IntelligentRepair)));
}

// vim: ts=4
