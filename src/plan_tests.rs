use super::*;
use crate::operation::{Operation, Secret, SignatureSetup};

fn halting_op() -> Operation {
    Operation::SetupElectronicSignature(SignatureSetup {
        access: Secret::new("a"),
        verify: Secret::new("v"),
        new_verify: Secret::new("n"),
        signature: Secret::new("s"),
    })
}

fn stage_names(plan: &ProvisionPlan) -> Vec<&str> {
    plan.stages().iter().map(|stage| stage.name.as_str()).collect()
}

#[test]
fn default_plan_orders_stages_by_dependency() {
    let plan = provisioning_plan(&PlanInputs::default()).expect("default plan");
    assert_eq!(
        stage_names(&plan),
        vec![
            "connect",
            "users",
            "doctor-signature",
            "nurse-signature",
            "clerk-signature",
            "patients",
        ]
    );

    let phases: Vec<Phase> = plan.stages().iter().map(|stage| stage.phase).collect();
    assert_eq!(
        phases,
        vec![
            Phase::Connect,
            Phase::Users,
            Phase::Users,
            Phase::Users,
            Phase::Users,
            Phase::Patients,
        ]
    );
}

#[test]
fn default_user_stage_creates_accounts_before_grants_and_ends_with_clinic() {
    let plan = provisioning_plan(&PlanInputs::default()).expect("default plan");
    let users = &plan.stages()[1];
    assert_eq!(users.session, SessionPolicy::Reuse);
    let ops: Vec<&str> = users.operations.iter().map(|op| op.name()).collect();
    assert_eq!(
        ops,
        vec![
            "add_system_manager",
            "seed_strep_test",
            "sign_on",
            "add_doctor",
            "add_nurse",
            "add_clerk",
            "add_pharmacist",
            "create_order_menu",
            "grant_allergies_permission",
            "grant_template_permission",
            "create_clinic",
        ]
    );
    assert!(users.halts_session());
}

#[test]
fn every_stage_after_a_halt_reconnects() {
    let plan = provisioning_plan(&PlanInputs::default()).expect("default plan");
    for pair in plan.stages().windows(2) {
        if pair[0].halts_session() {
            assert_eq!(
                pair[1].session,
                SessionPolicy::Fresh,
                "{} follows halting {}",
                pair[1].name,
                pair[0].name
            );
        }
    }
}

#[test]
fn patient_stage_uses_supplied_data_file() {
    let inputs = PlanInputs {
        patient_data: PathBuf::from("/srv/data/patients.csv"),
    };
    let plan = provisioning_plan(&inputs).expect("plan");
    let patients = plan.stages().last().expect("patients stage");
    match patients.operations.as_slice() {
        [Operation::RegisterPatients { data_file }] => {
            assert_eq!(data_file, &PathBuf::from("/srv/data/patients.csv"));
        }
        other => panic!("unexpected patient operations: {other:?}"),
    }
}

#[test]
fn rejects_empty_plan() {
    assert_eq!(ProvisionPlan::new(Vec::new()).unwrap_err(), PlanError::Empty);
}

#[test]
fn rejects_first_stage_without_session() {
    let err = ProvisionPlan::new(vec![Stage::new(
        "users",
        Phase::Users,
        SessionPolicy::Reuse,
    )])
    .unwrap_err();
    assert_eq!(err, PlanError::FirstStageReuses("users".to_string()));
}

#[test]
fn rejects_operations_after_halt_within_stage() {
    let err = ProvisionPlan::new(vec![Stage::new("users", Phase::Users, SessionPolicy::Fresh)
        .with(halting_op())
        .with(Operation::CreateOrderMenu)])
    .unwrap_err();
    assert_eq!(
        err,
        PlanError::HaltNotLast {
            stage: "users".to_string(),
            operation: "create_order_menu".to_string(),
        }
    );
}

#[test]
fn rejects_session_reuse_after_halting_stage() {
    let err = ProvisionPlan::new(vec![
        Stage::new("sig", Phase::Users, SessionPolicy::Fresh).with(halting_op()),
        Stage::new("menu", Phase::Users, SessionPolicy::Reuse).with(Operation::CreateOrderMenu),
    ])
    .unwrap_err();
    assert_eq!(
        err,
        PlanError::ReuseAfterHalt {
            stage: "menu".to_string(),
            previous: "sig".to_string(),
        }
    );
}

#[test]
fn rejects_duplicate_names_and_backwards_phases() {
    let dup = ProvisionPlan::new(vec![
        Stage::new("a", Phase::Connect, SessionPolicy::Fresh),
        Stage::new("a", Phase::Users, SessionPolicy::Reuse),
    ])
    .unwrap_err();
    assert_eq!(dup, PlanError::DuplicateStage("a".to_string()));

    let backwards = ProvisionPlan::new(vec![
        Stage::new("patients", Phase::Patients, SessionPolicy::Fresh),
        Stage::new("users", Phase::Users, SessionPolicy::Reuse),
    ])
    .unwrap_err();
    assert_eq!(
        backwards,
        PlanError::PhaseOrder {
            stage: "users".to_string(),
            phase: Phase::Users,
            previous: Phase::Patients,
        }
    );
}

#[test]
fn plan_json_masks_credentials() {
    let plan = provisioning_plan(&PlanInputs::default()).expect("default plan");
    let json = serde_json::to_string(&plan).expect("serialize plan");
    assert!(!json.contains("fakedoc1"));
    assert!(!json.contains("SM1234"));
    assert!(!json.contains("ROBA123"));
    assert!(json.contains("ALEXANDER,ROBERT"));
}
