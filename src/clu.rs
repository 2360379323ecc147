use crate::cli::{Arguments, Command};
use crate::prompt::TerminalPrompt;
use config::{HOST, HostRecord, Paths};
use hosts::{HostManager, Report, Source, for_each};
use std::env;
use std::path::{Path, PathBuf};
use std::process::{ExitCode, ExitStatus};

/// Runs the parsed command.
pub fn run(args: Arguments) -> anyhow::Result<ExitCode> {
    let paths = Paths::resolve(args.root, args.mounts, args.user_scripts)?;
    tracing::debug!(?paths, "resolved paths");
    let manager = HostManager::new(paths);

    let code = match args.command {
        Command::LsHosts => {
            println!("{}", manager.aliases()?.join(" "));
            ExitCode::SUCCESS
        }
        Command::SendKeys { targets, keys } => {
            let keys = keys.options();
            finish(for_each(
                &targets.target(),
                || manager.aliases(),
                |alias| manager.send_keys(alias, &keys),
            )?)
        }
        Command::SetupHost {
            config,
            fields,
            setup,
        } => {
            let source = if config.is_empty() {
                Source::Record(HostRecord::new())
            } else {
                Source::Files(config)
            };
            finish(manager.setup(
                source,
                &fields.to_record(),
                &setup.options(),
                &mut TerminalPrompt,
            )?)
        }
        Command::RemoveHost { targets } => finish(for_each(
            &targets.target(),
            || manager.aliases(),
            |alias| manager.remove(alias),
        )?),
        Command::UpdateHostConfig {
            targets,
            fields,
            setup,
        } => {
            let overrides = fields.to_record();
            let options = setup.options();
            let mut prompt = TerminalPrompt;
            finish(for_each(
                &targets.target(),
                || manager.aliases(),
                |alias| manager.update(alias, &overrides, &options, &mut prompt),
            )?)
        }
        Command::SetupHostScripts { targets } => finish(for_each(
            &targets.target(),
            || manager.aliases(),
            |alias| manager.setup_scripts(alias),
        )?),
        Command::LsMounts => {
            println!("{}", manager.mounts()?.mounted()?.join(" "));
            ExitCode::SUCCESS
        }
        Command::Mount { targets, options } => {
            let mounts = manager.mounts()?;
            let registry = manager.store().hosts()?;
            finish(for_each(
                &targets.target(),
                || Ok(registry.aliases()),
                |alias| {
                    let mut record = registry.get(alias)?.clone();
                    if !record.contains(HOST) {
                        record.set(HOST, alias);
                    }
                    Ok(mounts.mount(&record, &options)?)
                },
            )?)
        }
        Command::Unmount { targets } => {
            let mounts = manager.mounts()?;
            finish(for_each(
                &targets.target(),
                || Ok(mounts.mounted()?),
                |alias| Ok(mounts.unmount(alias).map(|_| ())?),
            )?)
        }
        Command::Fssh { command } => {
            let (alias, remote) = manager.path_to_host(&env::current_dir()?)?;
            let args = if command.is_empty() {
                vec![alias, "-t".to_string(), login_shell(&remote)]
            } else {
                vec![alias, remote_command(&remote, &command)]
            };
            exit_code(ssh::session(args)?)
        }
        Command::RemoteJupyterNb { host, port, path } => {
            let (host, path) = match host {
                Some(host) => (host, path),
                None => {
                    let local = if path.is_empty() {
                        env::current_dir()?
                    } else {
                        PathBuf::from(path)
                    };
                    let (host, remote) = manager.path_to_host(&local)?;
                    (host, remote.display().to_string())
                }
            };
            exit_code(ssh::session(jupyter_args(&host, port, &path))?)
        }
        Command::Path { path } => {
            let paths = manager.paths();
            let path = path.map_or_else(|| paths.root.clone(), |p| paths.get(p));
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
    };

    Ok(code)
}

/// Prints every failure of a fan-out.
fn finish<T>(report: Report<T>) -> ExitCode {
    if report.is_success() {
        return ExitCode::SUCCESS;
    }

    for (alias, e) in &report.failed {
        eprintln!("clu: {alias}: {e}");
    }
    tracing::debug!(
        failed = report.failed.len(),
        total = report.len(),
        "some hosts failed"
    );
    ExitCode::FAILURE
}

fn exit_code(status: ExitStatus) -> ExitCode {
    match status.code() {
        Some(0) => ExitCode::SUCCESS,
        Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        None => ExitCode::FAILURE,
    }
}

/// Interactive login shell that starts in `remote`.
fn login_shell(remote: &Path) -> String {
    format!(
        r#"bash --init-file <(echo ". \$HOME/.bash_profile; cd {}")"#,
        remote.display()
    )
}

fn remote_command(remote: &Path, command: &[String]) -> String {
    format!("cd {}; {}", remote.display(), command.join(" "))
}

fn jupyter_args(host: &str, port: u16, path: &str) -> Vec<String> {
    vec![
        "-L".to_string(),
        format!("{port}:localhost:{port}"),
        host.to_string(),
        "-t".to_string(),
        format!("jupyter notebook {path} --port {port}"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_shell() {
        assert_eq!(
            login_shell(Path::new("/scratch/alice/runs")),
            r#"bash --init-file <(echo ". \$HOME/.bash_profile; cd /scratch/alice/runs")"#
        );
    }

    #[test]
    fn test_remote_command() {
        let command = ["make".to_string(), "-j4".to_string()];
        assert_eq!(
            remote_command(Path::new("project"), &command),
            "cd project; make -j4"
        );
    }

    #[test]
    fn test_jupyter_args() {
        assert_eq!(
            jupyter_args("gpu1", 8003, "/scratch/nb"),
            [
                "-L",
                "8003:localhost:8003",
                "gpu1",
                "-t",
                "jupyter notebook /scratch/nb --port 8003"
            ]
        );
    }
}
