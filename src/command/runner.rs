use crate::command::builder::CommandLine;
use crate::command::outcome::InvocationResult;
use crate::error::CdoError;
use log::debug;
use std::collections::HashMap;
use std::process::Stdio;
use tokio::process::Command;

#[cfg(unix)]
fn shell(line: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(line);
    command
}

#[cfg(not(unix))]
fn shell(line: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(line);
    command
}

/// Runs a command line through the shell and waits for it to finish.
///
/// `env` is applied to the child only. With `echo` set, the call, environment
/// and captured output are printed whatever the outcome.
pub(crate) async fn execute(
    line: &CommandLine,
    env: &HashMap<String, String>,
    echo: bool,
) -> Result<InvocationResult, CdoError> {
    let rendered = line.render();
    debug!("Running: {}", rendered);

    let output = shell(&rendered)
        .envs(env)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| CdoError::Spawn(rendered.clone(), e))?;

    let result = InvocationResult {
        command: rendered,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        returncode: output.status.code().unwrap_or(-1),
    };
    if echo {
        print_debug_block(&result, env);
    }
    Ok(result)
}

fn print_debug_block(result: &InvocationResult, env: &HashMap<String, String>) {
    println!("# DEBUG - start =============================================================");
    let mut keys: Vec<&String> = env.keys().collect();
    keys.sort();
    for key in keys {
        println!("ENV: {} = {}", key, env[key]);
    }
    println!("CALL  :{}", result.command);
    println!("STDOUT:");
    if !result.stdout.trim().is_empty() {
        println!("{}", result.stdout);
    }
    println!("STDERR:");
    if !result.stderr.trim().is_empty() {
        println!("{}", result.stderr);
    }
    println!("RETURNCODE:{}", result.returncode);
    println!("# DEBUG - end ===============================================================");
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::command::request::OperatorChain;
    use std::path::Path;

    #[tokio::test]
    async fn test_env_is_scoped_to_child() -> Result<(), CdoError> {
        let line = CommandLine::assemble(
            Path::new("echo"),
            &[],
            &OperatorChain::new("$CDO_RS_TEST_VALUE"),
            &[],
            &[],
        )?;
        let env = HashMap::from([("CDO_RS_TEST_VALUE".to_string(), "from-child".to_string())]);

        let result = execute(&line, &env, false).await?;
        assert_eq!(result.returncode, 0);
        assert_eq!(result.lines(), vec!["-O from-child"]);
        assert!(std::env::var_os("CDO_RS_TEST_VALUE").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_exit_code_and_stderr_are_captured() -> Result<(), CdoError> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("failing tool");
        std::fs::write(&script, "#!/bin/sh\necho oops >&2\nexit 3\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let line = CommandLine::assemble(&script, &[], &OperatorChain::new("x"), &[], &[])?;
        let result = execute(&line, &HashMap::new(), true).await?;
        assert_eq!(result.returncode, 3);
        assert_eq!(result.stderr.trim(), "oops");
        Ok(())
    }
}
