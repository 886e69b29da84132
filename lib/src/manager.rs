use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::Local;
use log::{error, info, warn};
use tokio::sync::Notify;

use crate::error::Error;
use crate::process_helper::ProcessHandle;
use crate::sink::open_sink;
use crate::settings::Settings;
use crate::task::{Task, TaskStatus, TerminalReason};

/// How often a waiter thread polls its task's process for completion.
const REAP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A point-in-time view of the scheduler's id sets, as returned by `list`.
/// The four sets are pairwise disjoint and together cover every live task (P7).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListSnapshot {
    pub max_cpus: usize,
    pub active: Vec<usize>,
    pub queued: Vec<usize>,
    pub paused: Vec<usize>,
    pub runnable_paused: Vec<usize>,
}

/// Arguments to `submit`, grouped so the RPC boundary can build one from wire parameters
/// without a long positional call.
#[derive(Clone, Debug, Default)]
pub struct SubmitRequest {
    pub command: Vec<String>,
    pub submitter: String,
    pub cwd: PathBuf,
    pub env: HashMap<String, String>,
    pub stdout_path: Option<PathBuf>,
    pub stderr_path: Option<PathBuf>,
}

struct Inner {
    max_cpus: usize,
    max_queue_len: Option<usize>,
    next_id: usize,
    tasks: HashMap<usize, Task>,
    processes: HashMap<usize, ProcessHandle>,
}

impl Inner {
    fn active_count(&self) -> usize {
        self.tasks.values().filter(|t| t.status.is_active()).count()
    }

    /// The highest-priority admission-eligible candidate: a runnable-paused task before any
    /// queued task, FIFO by id within each class.
    fn next_candidate(&self) -> Option<usize> {
        let runnable_paused = self
            .tasks
            .values()
            .filter(|t| matches!(t.status, TaskStatus::Paused { runnable: true, .. }))
            .map(|t| t.id)
            .min();

        runnable_paused.or_else(|| {
            self.tasks
                .values()
                .filter(|t| t.status.is_queued())
                .map(|t| t.id)
                .min()
        })
    }

    /// Admit eligible candidates until the bound is reached or none remain. Invoked after
    /// every event that can change admission state.
    ///
    /// Returns the ids of tasks freshly spawned (Queued → Active) during this pass — these,
    /// and only these, need a new waiter thread; a resumed (Paused → Active) task keeps the
    /// waiter it was given when it first went Active, since `wait()` stays blocked through a
    /// stop/continue cycle.
    fn run_admission(&mut self) -> Vec<usize> {
        let mut spawned = Vec::new();

        while self.active_count() < self.max_cpus {
            let Some(id) = self.next_candidate() else {
                break;
            };

            let was_paused = matches!(
                self.tasks.get(&id).map(|t| &t.status),
                Some(TaskStatus::Paused { .. })
            );

            if was_paused {
                self.admit_paused(id);
            } else if self.admit_queued(id) {
                spawned.push(id);
            }
        }

        spawned
    }

    fn admit_paused(&mut self, id: usize) {
        let pid = match self.processes.get_mut(&id) {
            Some(handle) => match handle.cont(id) {
                Ok(()) => handle.pid(),
                Err(err) => {
                    warn!("Failed to resume task {id}, treating as gone: {err}");
                    self.processes.remove(&id);
                    self.tasks.remove(&id);
                    return;
                }
            },
            None => {
                warn!("Runnable task {id} has no process handle, discarding");
                self.tasks.remove(&id);
                return;
            }
        };

        if let Some(task) = self.tasks.get_mut(&id) {
            task.status = TaskStatus::Active { pid };
            info!("Task {id} resumed");
        }
    }

    /// Spawn the Queued task `id`. Returns `true` iff it went Active and needs a waiter.
    fn admit_queued(&mut self, id: usize) -> bool {
        let task = match self.tasks.get(&id) {
            Some(task) => task,
            None => return false,
        };

        let stdout = match open_sink(&task.stdout_path) {
            Ok(sink) => sink,
            Err(err) => {
                self.fail_spawn(id, err);
                return false;
            }
        };
        let stderr = match open_sink(&task.stderr_path) {
            Ok(sink) => sink,
            Err(err) => {
                self.fail_spawn(id, err);
                return false;
            }
        };

        match ProcessHandle::spawn(&task.command, &task.cwd, &task.env, stdout, stderr) {
            Ok(handle) => {
                let pid = handle.pid();
                self.processes.insert(id, handle);
                if let Some(task) = self.tasks.get_mut(&id) {
                    task.status = TaskStatus::Active { pid };
                }
                info!("Task {id} started, pid {pid}");
                true
            }
            Err(err) => {
                self.fail_spawn(id, err);
                false
            }
        }
    }

    fn fail_spawn(&mut self, id: usize, err: Error) {
        error!("{}", Error::SpawnFailed(id, err.to_string()));
        self.tasks.remove(&id);
    }
}

/// The scheduler: owns every task and its process handle, enforces the admission bound, and
/// serializes every mutation behind a single mutex.
///
/// Cloning a `TaskManager` clones the shared handle, not the state; every clone observes and
/// mutates the same scheduler. Waiter threads hold only a task id and one such clone — never
/// the process handle or task record directly, which is what keeps reaping safe against a
/// concurrent `kill`.
#[derive(Clone)]
pub struct TaskManager {
    inner: Arc<Mutex<Inner>>,
    shutdown: Arc<Notify>,
}

impl TaskManager {
    pub fn new(settings: &Settings) -> TaskManager {
        TaskManager {
            inner: Arc::new(Mutex::new(Inner {
                max_cpus: settings.max_cpus,
                max_queue_len: settings.max_queue_len,
                next_id: 0,
                tasks: HashMap::new(),
                processes: HashMap::new(),
            })),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Queue `request` and invoke admission. Returns the assigned id.
    pub fn submit(&self, request: SubmitRequest) -> Result<usize, Error> {
        if request.command.is_empty() {
            return Err(Error::BadRequest("command must not be empty".to_string()));
        }

        let mut inner = self.inner.lock().unwrap();

        if let Some(bound) = inner.max_queue_len {
            let pending = inner
                .tasks
                .values()
                .filter(|t| !t.status.is_active())
                .count();
            if pending >= bound {
                return Err(Error::BadRequest(format!(
                    "queue length bound of {bound} exceeded"
                )));
            }
        }

        let id = inner.next_id;
        inner.next_id += 1;

        let task = Task::new(
            id,
            request.command,
            request.submitter,
            request.cwd,
            request.env,
            request.stdout_path,
            request.stderr_path,
            Local::now(),
        );
        info!("Task {id} submitted: {:?}", task.command);
        inner.tasks.insert(id, task);
        let spawned = inner.run_admission();
        drop(inner);

        for spawned_id in spawned {
            self.spawn_waiter(spawned_id);
        }

        Ok(id)
    }

    /// A disjoint-set snapshot of every live task. Never fails (P6/P7).
    pub fn list(&self) -> ListSnapshot {
        let inner = self.inner.lock().unwrap();

        let mut active = Vec::new();
        let mut queued = Vec::new();
        let mut paused = Vec::new();
        let mut runnable_paused = Vec::new();

        for task in inner.tasks.values() {
            match task.status {
                TaskStatus::Active { .. } => active.push(task.id),
                TaskStatus::Queued => queued.push(task.id),
                TaskStatus::Paused { runnable: false, .. } => paused.push(task.id),
                TaskStatus::Paused { runnable: true, .. } => runnable_paused.push(task.id),
                TaskStatus::Terminal(_) => {}
            }
        }

        active.sort_unstable();
        queued.sort_unstable();
        paused.sort_unstable();
        runnable_paused.sort_unstable();

        ListSnapshot {
            max_cpus: inner.max_cpus,
            active,
            queued,
            paused,
            runnable_paused,
        }
    }

    /// The command of task `id`, or `None` if it's unknown (P5).
    pub fn id_task(&self, id: usize) -> Option<Vec<String>> {
        let inner = self.inner.lock().unwrap();
        inner.tasks.get(&id).map(|t| t.command.clone())
    }

    /// Active → Paused. Returns `false` for an unknown id or one that isn't Active.
    pub fn suspend(&self, id: usize) -> bool {
        let mut inner = self.inner.lock().unwrap();

        let pid = match inner.tasks.get(&id).map(|t| t.status.clone()) {
            Some(TaskStatus::Active { pid }) => pid,
            _ => return false,
        };

        let Some(handle) = inner.processes.get_mut(&id) else {
            return false;
        };

        match handle.stop(id) {
            Ok(()) => {
                if let Some(task) = inner.tasks.get_mut(&id) {
                    task.status = TaskStatus::Paused {
                        pid,
                        runnable: false,
                    };
                }
                info!("Task {id} suspended");
                let spawned = inner.run_admission();
                drop(inner);
                for spawned_id in spawned {
                    self.spawn_waiter(spawned_id);
                }
                true
            }
            Err(err) => {
                warn!("Failed to suspend task {id}: {err}");
                false
            }
        }
    }

    /// Paused → runnable-Paused. The continue signal is sent during the next admission pass,
    /// not here.
    pub fn resume(&self, id: usize) -> bool {
        let mut inner = self.inner.lock().unwrap();

        match inner.tasks.get_mut(&id) {
            Some(task) if task.status.is_paused() => {
                if let TaskStatus::Paused { pid, .. } = &task.status {
                    let pid = *pid;
                    task.status = TaskStatus::Paused {
                        pid,
                        runnable: true,
                    };
                }
                info!("Task {id} marked runnable");
                let spawned = inner.run_admission();
                drop(inner);
                for spawned_id in spawned {
                    self.spawn_waiter(spawned_id);
                }
                true
            }
            _ => false,
        }
    }

    /// Terminate task `id` with `signal`. Queued tasks are discarded without a signal; Active
    /// or Paused tasks are signaled and handed off to their waiter for the actual reap.
    pub fn kill(&self, id: usize, signal: i32) -> bool {
        let mut inner = self.inner.lock().unwrap();

        if matches!(inner.tasks.get(&id).map(|t| &t.status), Some(TaskStatus::Queued)) {
            inner.tasks.remove(&id);
            info!("Queued task {id} killed before it ran");
            let spawned = inner.run_admission();
            drop(inner);
            for spawned_id in spawned {
                self.spawn_waiter(spawned_id);
            }
            return true;
        }

        let Some(nix_signal) = crate::process_helper::signal_from_i32(signal) else {
            return false;
        };

        match inner.tasks.get(&id).map(|t| t.status.clone()) {
            Some(TaskStatus::Active { .. }) | Some(TaskStatus::Paused { .. }) => {
                match inner.processes.get_mut(&id) {
                    Some(handle) => match handle.signal(id, nix_signal) {
                        Ok(()) => {
                            inner.tasks.remove(&id);
                            info!("Task {id} signaled with {signal}");
                            let spawned = inner.run_admission();
                            drop(inner);
                            for spawned_id in spawned {
                                self.spawn_waiter(spawned_id);
                            }
                            true
                        }
                        Err(err) => {
                            warn!("Failed to signal task {id}: {err}");
                            false
                        }
                    },
                    None => false,
                }
            }
            _ => false,
        }
    }

    /// Acknowledge a shutdown request. The RPC/daemon layer awaits [TaskManager::shutdown_requested]
    /// to drive the HTTP server's graceful shutdown; this call never fails.
    pub fn stop(&self) -> bool {
        info!("Shutdown requested");
        self.shutdown.notify_waiters();
        true
    }

    /// Resolves once `stop` has been called. Intended as the future passed to
    /// `axum::Server::with_graceful_shutdown`.
    pub async fn shutdown_requested(&self) {
        self.shutdown.notified().await;
    }

    /// Launch the dedicated waiter thread for a newly Active task.
    fn spawn_waiter(&self, id: usize) {
        let manager = self.clone();
        thread::spawn(move || manager.reap(id));
    }

    /// Poll the task's process for completion outside the manager's lock between checks, then
    /// reap it and invoke admission. The handle stays in `processes` for the task's whole
    /// Active/Paused lifetime — this thread only ever peeks at it through a short-lived lock,
    /// so `suspend`/`resume`/`kill` can always reach it too. A stopped (suspended) child simply
    /// polls as not-yet-exited until it's continued and either exits or is killed.
    fn reap(&self, id: usize) {
        loop {
            let outcome = {
                let mut inner = self.inner.lock().unwrap();
                match inner.processes.get_mut(&id) {
                    Some(handle) => handle.try_wait(),
                    None => return,
                }
            };

            let result = match outcome {
                Ok(None) => {
                    thread::sleep(REAP_POLL_INTERVAL);
                    continue;
                }
                Ok(Some(status)) => Ok(status),
                Err(err) => Err(err),
            };

            let mut inner = self.inner.lock().unwrap();
            inner.processes.remove(&id);
            if inner.tasks.remove(&id).is_some() {
                match result {
                    Ok(status) => info!("Task {id} finished: {:?}", TerminalReason::from(status)),
                    Err(err) => warn!("Task {id} waiter failed to collect exit status: {err}"),
                }
            }
            let spawned = inner.run_admission();
            drop(inner);
            for spawned_id in spawned {
                self.spawn_waiter(spawned_id);
            }
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread::sleep;
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::tempdir;

    use super::*;

    fn settings(max_cpus: usize) -> Settings {
        Settings {
            max_cpus,
            ..Settings::default()
        }
    }

    fn submit(manager: &TaskManager, command: &[&str]) -> usize {
        let dir = tempdir().unwrap();
        manager
            .submit(SubmitRequest {
                command: command.iter().map(|s| s.to_string()).collect(),
                submitter: "tester".to_string(),
                cwd: dir.into_path(),
                env: HashMap::new(),
                stdout_path: None,
                stderr_path: None,
            })
            .unwrap()
    }

    fn wait_until<F: Fn() -> bool>(condition: F) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            sleep(Duration::from_millis(10));
        }
        panic!("condition not met in time");
    }

    #[test]
    fn test_submit_assigns_increasing_ids() {
        let manager = TaskManager::new(&settings(4));
        let a = submit(&manager, &["true"]);
        let b = submit(&manager, &["true"]);
        assert!(b > a);
    }

    #[test]
    fn test_submit_rejects_empty_command() {
        let manager = TaskManager::new(&settings(2));
        let err = manager
            .submit(SubmitRequest {
                command: vec![],
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[test]
    fn test_admission_respects_max_cpus() {
        let manager = TaskManager::new(&settings(1));
        let first = submit(&manager, &["sleep", "0.3"]);
        let second = submit(&manager, &["true"]);

        let snapshot = manager.list();
        assert_eq!(snapshot.active, vec![first]);
        assert_eq!(snapshot.queued, vec![second]);

        wait_until(|| manager.id_task(first).is_none());
        wait_until(|| manager.list().active == vec![second] || manager.list().queued.is_empty());
    }

    #[test]
    fn test_id_task_round_trip() {
        let manager = TaskManager::new(&settings(4));
        let id = submit(&manager, &["sleep", "0.2"]);
        assert_eq!(manager.id_task(id), Some(vec!["sleep".to_string(), "0.2".to_string()]));
    }

    #[test]
    fn test_id_task_unknown_is_none() {
        let manager = TaskManager::new(&settings(4));
        assert_eq!(manager.id_task(9999), None);
    }

    #[test]
    fn test_suspend_then_resume_round_trip() {
        let manager = TaskManager::new(&settings(1));
        let id = submit(&manager, &["sleep", "0.5"]);
        wait_until(|| manager.list().active == vec![id]);

        assert!(manager.suspend(id));
        wait_until(|| manager.list().paused == vec![id]);

        assert!(manager.resume(id));
        wait_until(|| manager.list().active == vec![id] || manager.id_task(id).is_none());
    }

    #[test]
    fn test_suspend_unknown_task_fails() {
        let manager = TaskManager::new(&settings(2));
        assert!(!manager.suspend(9999));
    }

    #[test]
    fn test_resume_is_deferred_when_saturated() {
        let manager = TaskManager::new(&settings(1));
        let first = submit(&manager, &["sleep", "0.4"]);
        wait_until(|| manager.list().active == vec![first]);
        assert!(manager.suspend(first));
        wait_until(|| manager.list().paused == vec![first]);

        let second = submit(&manager, &["sleep", "0.1"]);
        wait_until(|| manager.list().active == vec![second]);

        assert!(manager.resume(first));
        assert_eq!(manager.list().runnable_paused, vec![first]);
    }

    #[test]
    fn test_kill_queued_task() {
        let manager = TaskManager::new(&settings(1));
        let first = submit(&manager, &["sleep", "0.3"]);
        let second = submit(&manager, &["true"]);
        assert_eq!(manager.list().queued, vec![second]);

        assert!(manager.kill(second, 9));
        assert_eq!(manager.id_task(second), None);
        let _ = first;
    }

    #[test]
    fn test_kill_active_task() {
        let manager = TaskManager::new(&settings(1));
        let id = submit(&manager, &["sleep", "30"]);
        wait_until(|| manager.list().active == vec![id]);

        assert!(manager.kill(id, 9));
        wait_until(|| manager.id_task(id).is_none());
    }

    #[test]
    fn test_kill_unknown_task_fails() {
        let manager = TaskManager::new(&settings(2));
        assert!(!manager.kill(9999, 9));
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(5)]
    fn test_submit_respects_queue_length_bound(#[case] bound: usize) {
        let manager = TaskManager::new(&Settings {
            max_cpus: 0,
            max_queue_len: Some(bound),
            ..Settings::default()
        });

        for _ in 0..bound {
            submit(&manager, &["true"]);
        }

        let err = manager
            .submit(SubmitRequest {
                command: vec!["true".to_string()],
                cwd: tempdir().unwrap().into_path(),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[test]
    fn test_list_is_idempotent_without_mutation() {
        let manager = TaskManager::new(&settings(2));
        submit(&manager, &["sleep", "0.2"]);
        assert_eq!(manager.list(), manager.list());
    }
}
