use super::runner::CommandSpec;
use super::ExecutionTarget;
use crate::error::{OctopilotError, Result};
use std::path::Path;

/// Verbs `op` may be invoked with
pub const ALLOWED_VERBS: &[&str] = &["build", "verify", "version"];

const CONTAINER_WORKDIR: &str = "/workspace";
const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Check an `op` argument list against the verb policy.
///
/// Promotion is refused with its own message so callers can tell it apart from a
/// merely unsupported verb; both are [`OctopilotError::ForbiddenOperation`].
pub fn validate_args(args: &[String]) -> Result<()> {
    let Some(verb) = args.first() else {
        return Err(OctopilotError::InvalidCommand(
            "no op verb given".to_string(),
        ));
    };

    if args.iter().any(|a| a.contains('\0')) {
        return Err(OctopilotError::InvalidCommand(
            "arguments must not contain NUL bytes".to_string(),
        ));
    }

    let verb = verb.trim();
    if verb.is_empty() || verb.starts_with('-') {
        return Err(OctopilotError::InvalidCommand(format!(
            "expected a verb as the first argument, got '{}'",
            verb
        )));
    }

    if verb.to_ascii_lowercase().starts_with("promote") {
        return Err(OctopilotError::ForbiddenOperation(format!(
            "'{}' promotes images between environments; promotion only runs from a reviewed CI workflow",
            verb
        )));
    }

    if let Some(flag) = args.iter().skip(1).find(|a| is_promote_flag(a)) {
        return Err(OctopilotError::ForbiddenOperation(format!(
            "flag '{}' requests promotion; promotion only runs from a reviewed CI workflow",
            flag
        )));
    }

    if !ALLOWED_VERBS.contains(&verb) {
        return Err(OctopilotError::ForbiddenOperation(format!(
            "verb '{}' is not allowed; expected one of {}",
            verb,
            ALLOWED_VERBS.join(", ")
        )));
    }

    Ok(())
}

fn is_promote_flag(arg: &str) -> bool {
    arg.strip_prefix("--")
        .map(|flag| flag.to_ascii_lowercase().starts_with("promote"))
        .unwrap_or(false)
}

/// Argument vector for a validated `op` invocation. Nothing goes through a shell.
pub(super) fn build_command(target: &ExecutionTarget, context_dir: &Path, args: &[String]) -> CommandSpec {
    match target {
        ExecutionTarget::Binary { path } => CommandSpec {
            program: path.clone(),
            args: args.to_vec(),
            cwd: context_dir.to_path_buf(),
            env: Vec::new(),
        },
        ExecutionTarget::Container { runtime, image } => {
            let mut argv = vec![
                "run".to_string(),
                "--rm".to_string(),
                "-v".to_string(),
                format!("{}:{}", DOCKER_SOCKET, DOCKER_SOCKET),
                "-v".to_string(),
                format!("{}:{}", context_dir.display(), CONTAINER_WORKDIR),
                "-w".to_string(),
                CONTAINER_WORKDIR.to_string(),
                "-e".to_string(),
                "GITHUB_ACTIONS=true".to_string(),
                "--entrypoint".to_string(),
                "op".to_string(),
                image.clone(),
            ];
            argv.extend(args.iter().cloned());
            CommandSpec {
                program: runtime.clone(),
                args: argv,
                cwd: context_dir.to_path_buf(),
                env: Vec::new(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use yare::parameterized;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[parameterized(
        build = { &["build", "--repo", "ghcr.io/acme"] },
        verify = { &["verify"] },
        version = { &["version"] },
        unrelated_value = { &["build", "--repo", "ghcr.io/promote"] },
    )]
    fn allowed(list: &[&str]) {
        assert!(validate_args(&args(list)).is_ok());
    }

    #[parameterized(
        promote = { &["promote", "prod"] },
        promote_image = { &["promote-image", "--to", "prod"] },
        upper_case = { &["PROMOTE"] },
        promote_flag = { &["build", "--promote"] },
        promote_to_flag = { &["build", "--promote-to=prod"] },
        other_verb = { &["deploy"] },
        shell = { &["sh", "-c", "op promote"] },
    )]
    fn forbidden(list: &[&str]) {
        assert!(matches!(
            validate_args(&args(list)),
            Err(OctopilotError::ForbiddenOperation(_))
        ));
    }

    #[parameterized(
        empty = { &[] },
        flag_first = { &["--push"] },
        blank = { &["  "] },
        nul = { &["build", "a\0b"] },
    )]
    fn invalid(list: &[&str]) {
        assert!(matches!(
            validate_args(&args(list)),
            Err(OctopilotError::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_binary_command() {
        let target = ExecutionTarget::Binary {
            path: PathBuf::from("/usr/local/bin/op"),
        };
        let spec = build_command(&target, Path::new("/repo"), &args(&["build", "--push"]));

        assert_eq!(spec.program, PathBuf::from("/usr/local/bin/op"));
        assert_eq!(spec.args, args(&["build", "--push"]));
        assert_eq!(spec.cwd, PathBuf::from("/repo"));
    }

    #[test]
    fn test_container_command() {
        let target = ExecutionTarget::Container {
            runtime: PathBuf::from("/usr/bin/docker"),
            image: "ghcr.io/octopilot/op:v1.0.0".to_string(),
        };
        let spec = build_command(&target, Path::new("/repo"), &args(&["build", "--repo", "r"]));

        assert_eq!(spec.program, PathBuf::from("/usr/bin/docker"));
        assert_eq!(
            spec.args,
            args(&[
                "run",
                "--rm",
                "-v",
                "/var/run/docker.sock:/var/run/docker.sock",
                "-v",
                "/repo:/workspace",
                "-w",
                "/workspace",
                "-e",
                "GITHUB_ACTIONS=true",
                "--entrypoint",
                "op",
                "ghcr.io/octopilot/op:v1.0.0",
                "build",
                "--repo",
                "r",
            ])
        );
    }
}
