//! A thin wrapper around `dxr_client`, translating the daemon's RPC methods into typed
//! method calls.

use std::collections::HashMap;

use anyhow::{Context, Result};
use dxr_client::{Client, ClientBuilder, Url};

pub struct BatchQueueClient {
    inner: Client,
}

impl BatchQueueClient {
    pub fn connect(host: &str, port: u16) -> Result<BatchQueueClient> {
        let url = Url::parse(&format!("http://{host}:{port}/RPC2"))
            .with_context(|| format!("invalid daemon address {host}:{port}"))?;

        let inner = ClientBuilder::new(url)
            .user_agent("batchq")
            .build();

        Ok(BatchQueueClient { inner })
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn submit_task(
        &self,
        command: Vec<String>,
        user: String,
        path: String,
        env: HashMap<String, String>,
        log_stdout: Option<String>,
        log_stderr: Option<String>,
    ) -> Result<i32> {
        self.inner
            .call("submit_task", (command, user, path, env, log_stdout, log_stderr))
            .await
            .context("submit_task RPC failed")
    }

    pub async fn list_tasks(&self) -> Result<ListTasksResponse> {
        self.inner
            .call("list_tasks", ())
            .await
            .context("list_tasks RPC failed")
    }

    pub async fn id_task(&self, id: i32) -> Result<Option<Vec<String>>> {
        self.inner
            .call("id_task", (id,))
            .await
            .context("id_task RPC failed")
    }

    pub async fn suspend_task(&self, id: i32) -> Result<bool> {
        self.inner
            .call("suspend_task", (id,))
            .await
            .context("suspend_task RPC failed")
    }

    pub async fn resume_task(&self, id: i32) -> Result<bool> {
        self.inner
            .call("resume_task", (id,))
            .await
            .context("resume_task RPC failed")
    }

    pub async fn kill_task(&self, id: i32, signal: i32) -> Result<bool> {
        self.inner
            .call("kill_task", (id, signal))
            .await
            .context("kill_task RPC failed")
    }

    pub async fn stop_server(&self) -> Result<bool> {
        self.inner
            .call("stop_server", ())
            .await
            .context("stop_server RPC failed")
    }
}

/// Mirrors the `list_tasks` struct return shape.
#[derive(Debug, Clone, dxr::TryFromValue)]
pub struct ListTasksResponse {
    pub max_cpus: i32,
    pub active: Vec<i32>,
    pub queued: Vec<i32>,
    pub paused: Vec<i32>,
    pub runnable_paused: Vec<i32>,
}
