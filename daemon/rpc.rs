//! Translates inbound XML-RPC calls into [TaskManager] calls and their results back into wire
//! form. The wire format is XML-RPC over HTTP rather than a bincode/TLS socket protocol.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::Router;
use batchq_lib::manager::{SubmitRequest, TaskManager};
use dxr::{DxrError, Fault, TryFromValue, TryToValue, Value};
use dxr_server::{Handler, HandlerResult, RouteBuilder};

fn param<T: TryFromValue>(params: &[Value], index: usize, name: &str) -> Result<T, Fault> {
    params
        .get(index)
        .ok_or_else(|| Fault::new(1, format!("missing parameter `{name}`")))
        .and_then(|value| {
            T::try_from_value(value).map_err(|err: DxrError| {
                Fault::new(1, format!("invalid parameter `{name}`: {err}"))
            })
        })
}

struct SubmitTask(TaskManager);

#[async_trait]
impl Handler for SubmitTask {
    async fn handle(&self, params: &[Value]) -> HandlerResult {
        let command: Vec<String> = param(params, 0, "command")?;
        let submitter: String = param(params, 1, "user")?;
        let path: String = param(params, 2, "path")?;
        let env: HashMap<String, String> = param(params, 3, "env")?;
        let log_stdout: Option<String> = param(params, 4, "log_stdout").unwrap_or(None);
        let log_stderr: Option<String> = param(params, 5, "log_stderr").unwrap_or(None);

        let request = SubmitRequest {
            command,
            submitter,
            cwd: path.into(),
            env,
            stdout_path: log_stdout.map(Into::into),
            stderr_path: log_stderr.map(Into::into),
        };

        let id = self
            .0
            .submit(request)
            .map_err(|err| Fault::new(1, err.to_string()))?;

        (id as i32)
            .try_to_value()
            .map_err(|err| Fault::new(1, err.to_string()))
    }
}

struct ListTasks(TaskManager);

#[async_trait]
impl Handler for ListTasks {
    async fn handle(&self, _params: &[Value]) -> HandlerResult {
        let snapshot = self.0.list();

        let as_ints = |ids: Vec<usize>| -> Vec<i32> { ids.into_iter().map(|id| id as i32).collect() };

        let mut fields: HashMap<String, Value> = HashMap::new();
        fields.insert(
            "max_cpus".to_string(),
            (snapshot.max_cpus as i32)
                .try_to_value()
                .map_err(|err: DxrError| Fault::new(1, err.to_string()))?,
        );
        fields.insert(
            "active".to_string(),
            as_ints(snapshot.active)
                .try_to_value()
                .map_err(|err: DxrError| Fault::new(1, err.to_string()))?,
        );
        fields.insert(
            "queued".to_string(),
            as_ints(snapshot.queued)
                .try_to_value()
                .map_err(|err: DxrError| Fault::new(1, err.to_string()))?,
        );
        fields.insert(
            "paused".to_string(),
            as_ints(snapshot.paused)
                .try_to_value()
                .map_err(|err: DxrError| Fault::new(1, err.to_string()))?,
        );
        fields.insert(
            "runnable_paused".to_string(),
            as_ints(snapshot.runnable_paused)
                .try_to_value()
                .map_err(|err: DxrError| Fault::new(1, err.to_string()))?,
        );

        fields
            .try_to_value()
            .map_err(|err| Fault::new(1, err.to_string()))
    }
}

struct IdTask(TaskManager);

#[async_trait]
impl Handler for IdTask {
    async fn handle(&self, params: &[Value]) -> HandlerResult {
        let id: i32 = param(params, 0, "id")?;
        self.0
            .id_task(id as usize)
            .try_to_value()
            .map_err(|err| Fault::new(1, err.to_string()))
    }
}

struct SuspendTask(TaskManager);

#[async_trait]
impl Handler for SuspendTask {
    async fn handle(&self, params: &[Value]) -> HandlerResult {
        let id: i32 = param(params, 0, "id")?;
        self.0
            .suspend(id as usize)
            .try_to_value()
            .map_err(|err| Fault::new(1, err.to_string()))
    }
}

struct ResumeTask(TaskManager);

#[async_trait]
impl Handler for ResumeTask {
    async fn handle(&self, params: &[Value]) -> HandlerResult {
        let id: i32 = param(params, 0, "id")?;
        self.0
            .resume(id as usize)
            .try_to_value()
            .map_err(|err| Fault::new(1, err.to_string()))
    }
}

struct KillTask(TaskManager);

#[async_trait]
impl Handler for KillTask {
    async fn handle(&self, params: &[Value]) -> HandlerResult {
        let id: i32 = param(params, 0, "id")?;
        let signal: i32 = param(params, 1, "signal")?;
        self.0
            .kill(id as usize, signal)
            .try_to_value()
            .map_err(|err| Fault::new(1, err.to_string()))
    }
}

struct StopServer(TaskManager);

#[async_trait]
impl Handler for StopServer {
    async fn handle(&self, _params: &[Value]) -> HandlerResult {
        self.0.stop();
        true.try_to_value().map_err(|err| Fault::new(1, err.to_string()))
    }
}

/// Build the axum router serving the XML-RPC endpoint at `/RPC2`. Unknown methods and
/// parameter decode failures surface as an XML-RPC Fault with code 1.
pub fn build_router(manager: TaskManager) -> Router {
    RouteBuilder::new()
        .add_method("submit_task", Box::new(SubmitTask(manager.clone())))
        .add_method("list_tasks", Box::new(ListTasks(manager.clone())))
        .add_method("id_task", Box::new(IdTask(manager.clone())))
        .add_method("suspend_task", Box::new(SuspendTask(manager.clone())))
        .add_method("resume_task", Box::new(ResumeTask(manager.clone())))
        .add_method("kill_task", Box::new(KillTask(manager.clone())))
        .add_method("stop_server", Box::new(StopServer(manager)))
        .build()
}
