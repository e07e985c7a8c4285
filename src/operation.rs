//! Typed provisioning operations issued against a live backend session.
//!
//! Operations are opaque to the orchestrator: it only needs to know each
//! operation's name (for diagnostics) and whether its successful completion
//! tears down the session it ran on.
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

/// Credential text (access, verify, or signature code).
///
/// Masked in `Debug` and `Serialize` output so plan dumps, reports, and logs
/// never carry the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("***")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Doctor,
    Nurse,
    Clerk,
    Pharmacist,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Doctor => "doctor",
            UserRole::Nurse => "nurse",
            UserRole::Clerk => "clerk",
            UserRole::Pharmacist => "pharmacist",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Sex {
    pub fn code(&self) -> &'static str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
        }
    }
}

/// Identity, demographic, and credential parameters for a new account.
///
/// The verify code is temporary: the backend forces a reset, which the
/// electronic-signature setup performs later in the run.
#[derive(Debug, Clone, Serialize)]
pub struct UserAccount {
    pub role: UserRole,
    pub name: String,
    pub initials: String,
    pub ssn: String,
    pub sex: Sex,
    pub access: Secret,
    pub verify: Secret,
}

#[derive(Debug, Clone, Serialize)]
pub struct Clinic {
    pub name: String,
    pub abbreviation: String,
    pub kind: String,
}

/// Electronic-signature handshake for an existing account: signs on with the
/// temporary verify code, replaces it, and sets the signature code.
#[derive(Debug, Clone, Serialize)]
pub struct SignatureSetup {
    pub access: Secret,
    pub verify: Secret,
    pub new_verify: Secret,
    pub signature: Secret,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    AddSystemManager,
    SeedStrepTest,
    SignOn { access: Secret, verify: Secret },
    AddUser(UserAccount),
    CreateOrderMenu,
    GrantAllergiesPermission,
    GrantTemplatePermission { initials: String },
    CreateClinic(Clinic),
    SetupElectronicSignature(SignatureSetup),
    RegisterPatients { data_file: PathBuf },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::AddSystemManager => "add_system_manager",
            Operation::SeedStrepTest => "seed_strep_test",
            Operation::SignOn { .. } => "sign_on",
            Operation::AddUser(account) => match account.role {
                UserRole::Doctor => "add_doctor",
                UserRole::Nurse => "add_nurse",
                UserRole::Clerk => "add_clerk",
                UserRole::Pharmacist => "add_pharmacist",
            },
            Operation::CreateOrderMenu => "create_order_menu",
            Operation::GrantAllergiesPermission => "grant_allergies_permission",
            Operation::GrantTemplatePermission { .. } => "grant_template_permission",
            Operation::CreateClinic(_) => "create_clinic",
            Operation::SetupElectronicSignature(_) => "setup_electronic_signature",
            Operation::RegisterPatients { .. } => "register_patients",
        }
    }

    /// Whether the backend terminates the session as a side effect of this
    /// operation succeeding.
    pub fn halts_session(&self) -> bool {
        matches!(
            self,
            Operation::CreateClinic(_) | Operation::SetupElectronicSignature(_)
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
