//! Exit codes and error rendering.

use arm_core::{ArmError, ErrorKind};

/// Exit code for a failed command, from the first [`ArmError`] in the chain.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    let Some(arm) = err.chain().find_map(|e| e.downcast_ref::<ArmError>()) else {
        return 1;
    };
    match arm.kind() {
        ErrorKind::Configuration => 2,
        ErrorKind::Resolution => 3,
        ErrorKind::Integrity => 4,
        ErrorKind::Transport => 5,
        ErrorKind::Filesystem => 6,
        ErrorKind::Parsing => 7,
        ErrorKind::Cancelled => 130,
    }
}

/// The error chain on one line, without repeating causes a message
/// already embeds.
pub fn render(err: &anyhow::Error) -> String {
    let mut out = String::new();
    for cause in err.chain() {
        let msg = cause.to_string();
        if out.ends_with(&msg) {
            continue;
        }
        if !out.is_empty() {
            out.push_str(": ");
        }
        out.push_str(&msg);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn exit_codes_follow_kind() {
        let err: anyhow::Error = ArmError::NoMatchingVersion("^3.0.0".into()).into();
        assert_eq!(exit_code(&err), 3);

        let err = Err::<(), _>(ArmError::config("unknown sink 'x'"))
            .context("install failed")
            .unwrap_err();
        assert_eq!(exit_code(&err), 2);

        assert_eq!(exit_code(&anyhow::anyhow!("plain")), 1);
        assert_eq!(exit_code(&ArmError::Cancelled.into()), 130);
    }

    #[test]
    fn render_skips_embedded_causes() {
        let err: anyhow::Error = ArmError::NotFound("v9".into()).for_package("reg/pkg").into();
        assert_eq!(render(&err), "reg/pkg: not found: v9");

        let err = Err::<(), _>(ArmError::config("bad"))
            .context("loading arm.json")
            .unwrap_err();
        assert_eq!(render(&err), "loading arm.json: bad");
    }
}
