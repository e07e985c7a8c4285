//! Bridge from typed operations to the provisioning routine on the backend.
//!
//! The business logic of each operation (menu navigation, FileMan edits, the
//! signature handshake) lives in an M routine installed on the instance; this
//! module only renders the call and interprets how the session finished.
use crate::operation::Operation;
use crate::session::mumps::MumpsSession;
use crate::session::Completion;
use anyhow::{anyhow, Context, Result};
use std::path::Path;

/// Default name of the M routine holding the provisioning entry points.
pub const DEFAULT_ROUTINE: &str = "ZVSETUP";

/// Performs one provisioning operation on a live session.
///
/// Returning `Ok` for a halt-inducing operation means it succeeded; the
/// session may be unusable afterwards and must not be handed back.
pub trait Provisioner<S> {
    fn perform(&mut self, session: &mut S, operation: &Operation) -> Result<()>;
}

/// Calls `LABEL^ROUTINE(args)` for each operation.
#[derive(Debug, Clone)]
pub struct RoutineProvisioner {
    routine: String,
}

impl RoutineProvisioner {
    pub fn new(routine: impl Into<String>) -> Result<Self> {
        let routine = routine.into();
        if !is_routine_name(&routine) {
            return Err(anyhow!("invalid M routine name {routine:?}"));
        }
        Ok(Self { routine })
    }

    /// Render the direct-mode command for an operation.
    pub fn command_for(&self, operation: &Operation) -> Result<String> {
        let (label, args) = entry_point(operation)?;
        let call = format!("{label}^{}", self.routine);
        if args.is_empty() {
            return Ok(format!("D {call}"));
        }
        let rendered = args
            .iter()
            .map(|arg| m_string(arg))
            .collect::<Result<Vec<_>>>()?;
        Ok(format!("D {call}({})", rendered.join(",")))
    }
}

impl Provisioner<MumpsSession> for RoutineProvisioner {
    fn perform(&mut self, session: &mut MumpsSession, operation: &Operation) -> Result<()> {
        let command = self.command_for(operation)?;
        let completion = session
            .execute(&command, operation.name())
            .with_context(|| format!("run {operation}"))?;
        match completion {
            Completion::Returned => Ok(()),
            Completion::Halted if operation.halts_session() => Ok(()),
            Completion::Halted => Err(anyhow!("session halted unexpectedly during {operation}")),
        }
    }
}

fn entry_point(operation: &Operation) -> Result<(&'static str, Vec<String>)> {
    let entry = match operation {
        Operation::AddSystemManager => ("SYSMGR", Vec::new()),
        Operation::SeedStrepTest => ("STREP", Vec::new()),
        Operation::SignOn { access, verify } => (
            "SIGNON",
            vec![access.expose().to_string(), verify.expose().to_string()],
        ),
        Operation::AddUser(account) => (
            "ADDUSER",
            vec![
                account.role.as_str().to_ascii_uppercase(),
                account.name.clone(),
                account.initials.clone(),
                account.ssn.clone(),
                account.sex.code().to_string(),
                account.access.expose().to_string(),
                account.verify.expose().to_string(),
            ],
        ),
        Operation::CreateOrderMenu => ("ORDMENU", Vec::new()),
        Operation::GrantAllergiesPermission => ("ALLERGY", Vec::new()),
        Operation::GrantTemplatePermission { initials } => ("TEMPLATE", vec![initials.clone()]),
        Operation::CreateClinic(clinic) => (
            "CLINIC",
            vec![
                clinic.name.clone(),
                clinic.abbreviation.clone(),
                clinic.kind.clone(),
            ],
        ),
        Operation::SetupElectronicSignature(setup) => (
            "ESIG",
            vec![
                setup.access.expose().to_string(),
                setup.verify.expose().to_string(),
                setup.new_verify.expose().to_string(),
                setup.signature.expose().to_string(),
            ],
        ),
        Operation::RegisterPatients { data_file } => {
            ("PATIENTS", vec![absolute_display(data_file)?])
        }
    };
    Ok(entry)
}

fn absolute_display(path: &Path) -> Result<String> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("resolve current directory")?
            .join(path)
    };
    absolute
        .to_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("path is not valid UTF-8: {}", absolute.display()))
}

/// Quote a value as an M string literal.
fn m_string(value: &str) -> Result<String> {
    if value.chars().any(char::is_control) {
        return Err(anyhow!("argument contains control characters: {value:?}"));
    }
    Ok(format!("\"{}\"", value.replace('"', "\"\"")))
}

fn is_routine_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first == '%' || first.is_ascii_alphabetic())
        && chars.all(|ch| ch.is_ascii_alphanumeric())
        && name.len() <= 31
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{Clinic, Secret, SignatureSetup};
    use crate::roster;
    use std::path::PathBuf;

    fn provisioner() -> RoutineProvisioner {
        RoutineProvisioner::new(DEFAULT_ROUTINE).expect("routine")
    }

    #[test]
    fn argumentless_operations_render_plain_do() {
        let provisioner = provisioner();
        assert_eq!(
            provisioner
                .command_for(&Operation::AddSystemManager)
                .expect("render"),
            "D SYSMGR^ZVSETUP"
        );
        assert_eq!(
            provisioner
                .command_for(&Operation::CreateOrderMenu)
                .expect("render"),
            "D ORDMENU^ZVSETUP"
        );
    }

    #[test]
    fn add_user_passes_role_identity_and_credentials() {
        let account = roster::accounts().remove(0);
        let command = provisioner()
            .command_for(&Operation::AddUser(account))
            .expect("render");
        assert_eq!(
            command,
            r#"D ADDUSER^ZVSETUP("DOCTOR","ALEXANDER,ROBERT","RA","000000029","M","fakedoc1","2Doc!@#$")"#
        );
    }

    #[test]
    fn clinic_and_signature_render_their_parameters() {
        let provisioner = provisioner();
        let clinic = Operation::CreateClinic(Clinic {
            name: "VISTA HEALTH CARE".to_string(),
            abbreviation: "VHC".to_string(),
            kind: "M".to_string(),
        });
        assert_eq!(
            provisioner.command_for(&clinic).expect("render"),
            r#"D CLINIC^ZVSETUP("VISTA HEALTH CARE","VHC","M")"#
        );

        let signature = Operation::SetupElectronicSignature(SignatureSetup {
            access: Secret::new("fakenurse1"),
            verify: Secret::new("2Nur!@#$"),
            new_verify: Secret::new("1Nur!@#$"),
            signature: Secret::new("MARYS123"),
        });
        assert_eq!(
            provisioner.command_for(&signature).expect("render"),
            r#"D ESIG^ZVSETUP("fakenurse1","2Nur!@#$","1Nur!@#$","MARYS123")"#
        );
    }

    #[test]
    fn quotes_are_doubled_and_control_characters_rejected() {
        let provisioner = provisioner();
        let quoted = Operation::GrantTemplatePermission {
            initials: "M\"S".to_string(),
        };
        assert_eq!(
            provisioner.command_for(&quoted).expect("render"),
            r#"D TEMPLATE^ZVSETUP("M""S")"#
        );

        let broken = Operation::GrantTemplatePermission {
            initials: "MS\nH".to_string(),
        };
        assert!(provisioner.command_for(&broken).is_err());
    }

    #[test]
    fn patient_data_path_is_made_absolute() {
        let op = Operation::RegisterPatients {
            data_file: PathBuf::from("/srv/data/patdata0.csv"),
        };
        assert_eq!(
            provisioner().command_for(&op).expect("render"),
            r#"D PATIENTS^ZVSETUP("/srv/data/patdata0.csv")"#
        );

        let relative = Operation::RegisterPatients {
            data_file: PathBuf::from("dataFiles/patdata0.csv"),
        };
        let command = provisioner().command_for(&relative).expect("render");
        let cwd = std::env::current_dir().expect("cwd");
        assert!(
            command.contains(&cwd.join("dataFiles/patdata0.csv").display().to_string()),
            "{command}"
        );
    }

    #[test]
    fn routine_names_are_validated() {
        assert!(RoutineProvisioner::new("ZVSETUP").is_ok());
        assert!(RoutineProvisioner::new("%ZVS").is_ok());
        assert!(RoutineProvisioner::new("").is_err());
        assert!(RoutineProvisioner::new("ZV SETUP").is_err());
        assert!(RoutineProvisioner::new("9ZV").is_err());
    }
}
