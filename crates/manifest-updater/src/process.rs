//! Closing and relaunching the target application.

use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sysinfo::{Pid, Process, ProcessStatus, Signal, System};
use tracing::{debug, info, warn};

use crate::config::CloseConfig;
use crate::error::UpdateError;
use crate::settings::CloseMethod;

/// Terminates and launches the target application.
#[async_trait]
pub trait ProcessControl: Send + Sync {
    /// Apply `method` to every running process named `exe_name`.
    ///
    /// A target that is not running counts as already terminated.
    async fn terminate(&self, exe_name: &str, method: CloseMethod) -> Result<(), UpdateError>;

    /// Start `exe` with `cwd` as its working directory without waiting for it.
    fn launch(&self, exe: &Path, cwd: &Path) -> Result<(), UpdateError>;
}

/// Process control against the real operating system.
pub struct SystemProcessControl {
    close: CloseConfig,
}

impl SystemProcessControl {
    pub fn new(close: CloseConfig) -> Self {
        Self { close }
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.close.poll_interval_ms.max(1))
    }

    fn find(system: &System, exe_name: &str) -> Vec<Pid> {
        let own_pid = sysinfo::get_current_pid().ok();
        system
            .processes()
            .iter()
            .filter(|(pid, _)| Some(**pid) != own_pid)
            .filter(|(_, process)| process_matches(process, exe_name))
            .map(|(pid, _)| *pid)
            .collect()
    }

    fn alive(system: &System, pids: &[Pid]) -> Vec<Pid> {
        pids.iter()
            .copied()
            .filter(|pid| {
                system
                    .process(*pid)
                    .is_some_and(|p| p.status() != ProcessStatus::Zombie)
            })
            .collect()
    }

    /// Poll until every pid has exited or `timeout` elapses. Returns the
    /// pids still running.
    async fn wait_for_exit(&self, system: &mut System, pids: &[Pid], timeout: Duration) -> Vec<Pid> {
        let started = Instant::now();
        loop {
            system.refresh_processes();
            let remaining = Self::alive(system, pids);
            if remaining.is_empty() || started.elapsed() >= timeout {
                return remaining;
            }
            tokio::time::sleep(self.poll_interval()).await;
        }
    }

    fn kill_all(system: &System, pids: &[Pid]) {
        for pid in pids {
            if let Some(process) = system.process(*pid) {
                if !process.kill() {
                    warn!(pid = %pid, "Failed to send kill signal");
                }
            }
        }
    }
}

#[async_trait]
impl ProcessControl for SystemProcessControl {
    async fn terminate(&self, exe_name: &str, method: CloseMethod) -> Result<(), UpdateError> {
        if method == CloseMethod::None {
            debug!("Close method is none, leaving {} running", exe_name);
            return Ok(());
        }

        let mut system = System::new();
        system.refresh_processes();
        let pids = Self::find(&system, exe_name);
        if pids.is_empty() {
            info!("{} is not running", exe_name);
            return Ok(());
        }

        let grace = Duration::from_millis(self.close.grace_period_ms);
        let targets = match method {
            CloseMethod::WaitAndKill => {
                info!("Asking {} ({} processes) to exit...", exe_name, pids.len());
                for pid in &pids {
                    if let Some(process) = system.process(*pid) {
                        if process.kill_with(Signal::Term).is_none() {
                            info!(
                                pid = %pid,
                                "No close request sent (not supported here), waiting for exit"
                            );
                        }
                    }
                }
                self.wait_for_exit(&mut system, &pids, grace).await
            }
            _ => pids,
        };

        if targets.is_empty() {
            info!("{} exited", exe_name);
            return Ok(());
        }

        info!("Killing {} ({} processes)...", exe_name, targets.len());
        Self::kill_all(&system, &targets);

        let survivors = self.wait_for_exit(&mut system, &targets, grace).await;
        if !survivors.is_empty() {
            return Err(UpdateError::ProcessError(format!(
                "{} processes named {} are still running",
                survivors.len(),
                exe_name
            )));
        }
        Ok(())
    }

    fn launch(&self, exe: &Path, cwd: &Path) -> Result<(), UpdateError> {
        let program = if exe.is_absolute() {
            exe.to_path_buf()
        } else {
            cwd.join(exe)
        };
        info!("Relaunching {}", program.display());

        Command::new(&program)
            .current_dir(cwd)
            .spawn()
            .map_err(|source| UpdateError::LaunchFailed {
                exe: program.clone(),
                source,
            })?;
        Ok(())
    }
}

/// Linux truncates the process name to 15 bytes, so the executable path
/// and `argv[0]` are checked as well.
fn process_matches(process: &Process, exe_name: &str) -> bool {
    let file_name = |path: &Path| {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| names_match(name, exe_name))
    };
    names_match(process.name(), exe_name)
        || process.exe().is_some_and(file_name)
        || process.cmd().first().is_some_and(|arg0| file_name(Path::new(arg0)))
}

/// Process names are compared case-insensitively, ignoring an `.exe`
/// suffix on either side.
pub fn names_match(process_name: &str, exe_name: &str) -> bool {
    fn stem(name: &str) -> &str {
        let len = name.len();
        if len > 4 && name[len - 4..].eq_ignore_ascii_case(".exe") {
            &name[..len - 4]
        } else {
            name
        }
    }
    !exe_name.is_empty() && stem(process_name).eq_ignore_ascii_case(stem(exe_name))
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn control() -> SystemProcessControl {
        SystemProcessControl::new(CloseConfig {
            grace_period_ms: 50,
            poll_interval_ms: 10,
        })
    }

    #[test]
    fn test_names_match() {
        assert!(names_match("app.exe", "app.exe"));
        assert!(names_match("APP.EXE", "app.exe"));
        assert!(names_match("app", "app.exe"));
        assert!(names_match("app.exe", "app"));
        assert!(!names_match("app-helper", "app"));
        assert!(!names_match(".exe", ""));
        assert!(!names_match("anything", ""));
    }

    #[tokio::test]
    async fn test_terminate_none_is_noop() {
        control()
            .terminate("definitely-not-running-9f3c", CloseMethod::None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_terminate_missing_process_succeeds() {
        let control = control();
        control
            .terminate("definitely-not-running-9f3c", CloseMethod::Kill)
            .await
            .unwrap();
        control
            .terminate("definitely-not-running-9f3c", CloseMethod::WaitAndKill)
            .await
            .unwrap();
    }

    /// Copy `sleep` under `name` and start it.
    #[cfg(unix)]
    fn spawn_renamed_sleep(dir: &TempDir, name: &str) -> std::process::Child {
        let exe = dir.path().join(name);
        std::fs::copy("/bin/sleep", &exe).unwrap();
        Command::new(&exe).arg("30").spawn().unwrap()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_kill_long_named_process() {
        let dir = TempDir::new().unwrap();
        let name = "manifest_target_killed_app";
        let mut child = spawn_renamed_sleep(&dir, name);
        tokio::time::sleep(Duration::from_millis(200)).await;

        let result = control().terminate(name, CloseMethod::Kill).await;
        let status = child.try_wait().unwrap();
        if status.is_none() {
            let _ = child.kill();
        }

        result.unwrap();
        assert!(status.is_some(), "{} is still running", name);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_wait_and_kill_long_named_process() {
        let dir = TempDir::new().unwrap();
        let name = "manifest_target_closed_app";
        let mut child = spawn_renamed_sleep(&dir, name);
        tokio::time::sleep(Duration::from_millis(200)).await;

        let control = SystemProcessControl::new(CloseConfig {
            grace_period_ms: 2000,
            poll_interval_ms: 20,
        });
        let result = control.terminate(name, CloseMethod::WaitAndKill).await;
        let status = child.try_wait().unwrap();
        if status.is_none() {
            let _ = child.kill();
        }

        result.unwrap();
        assert!(status.is_some(), "{} is still running", name);
    }

    #[test]
    fn test_launch_missing_executable() {
        let dir = TempDir::new().unwrap();
        let result = control().launch(Path::new("no-such-program"), dir.path());
        match result {
            Err(UpdateError::LaunchFailed { exe, .. }) => {
                assert_eq!(exe, dir.path().join("no-such-program"));
            }
            other => panic!("expected LaunchFailed, got {:?}", other),
        }
    }
}
