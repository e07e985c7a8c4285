//! Demonstration accounts, clinic, and signatures seeded into a fresh instance.
use crate::operation::{Secret, Sex, UserAccount, UserRole};

pub const SYSTEM_MANAGER_ACCESS: &str = "SM1234";
pub const SYSTEM_MANAGER_VERIFY: &str = "SM1234!!";

/// Initials of the user allowed to create shared templates.
pub const TEMPLATE_EDITOR_INITIALS: &str = "MS";

pub const CLINIC_NAME: &str = "VISTA HEALTH CARE";
pub const CLINIC_ABBREVIATION: &str = "VHC";
pub const CLINIC_KIND: &str = "M";

/// An account whose temporary verify code is replaced during signature setup.
#[derive(Debug, Clone)]
pub struct Signer {
    pub account: UserAccount,
    pub new_verify: &'static str,
    pub signature: &'static str,
}

fn account(
    role: UserRole,
    name: &str,
    initials: &str,
    ssn: &str,
    sex: Sex,
    access: &str,
    verify: &str,
) -> UserAccount {
    UserAccount {
        role,
        name: name.to_string(),
        initials: initials.to_string(),
        ssn: ssn.to_string(),
        sex,
        access: Secret::new(access),
        verify: Secret::new(verify),
    }
}

fn doctor() -> UserAccount {
    account(
        UserRole::Doctor,
        "ALEXANDER,ROBERT",
        "RA",
        "000000029",
        Sex::Male,
        "fakedoc1",
        "2Doc!@#$",
    )
}

fn nurse() -> UserAccount {
    account(
        UserRole::Nurse,
        "SMITH,MARY",
        "MS",
        "000000030",
        Sex::Female,
        "fakenurse1",
        "2Nur!@#$",
    )
}

// Clerk has Problem List data entry permissions.
fn clerk() -> UserAccount {
    account(
        UserRole::Clerk,
        "CLERK,JOE",
        "JC",
        "000000112",
        Sex::Male,
        "fakeclerk1",
        "2Cle!@#$",
    )
}

fn pharmacist() -> UserAccount {
    account(
        UserRole::Pharmacist,
        "SHARMA,FRED",
        "FS",
        "000000031",
        Sex::Male,
        "fakepharma1",
        "2Pha!@#$",
    )
}

/// Accounts in creation order.
pub fn accounts() -> Vec<UserAccount> {
    vec![doctor(), nurse(), clerk(), pharmacist()]
}

/// Accounts that get an electronic signature, in setup order.
pub fn signers() -> Vec<Signer> {
    vec![
        Signer {
            account: doctor(),
            new_verify: "1Doc!@#$",
            signature: "ROBA123",
        },
        Signer {
            account: nurse(),
            new_verify: "1Nur!@#$",
            signature: "MARYS123",
        },
        Signer {
            account: clerk(),
            new_verify: "1Cle!@#$",
            signature: "CLERKJ123",
        },
    ]
}
