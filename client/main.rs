use std::collections::HashMap;
use std::process::Command;

use anyhow::{bail, Context, Result};
use clap::Parser;

mod cli;
mod client;
mod output;

use cli::{CliArguments, SubCommand};
use client::BatchQueueClient;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArguments::parse();

    if let SubCommand::Start { max_cpus } = &args.cmd {
        return start_daemon(*max_cpus);
    }

    let client = BatchQueueClient::connect(&args.host, args.port)?;

    match args.cmd {
        SubCommand::Start { .. } => unreachable!("handled above"),
        SubCommand::Submit {
            command,
            log_stdout,
            log_stderr,
        } => submit(&client, command, log_stdout, log_stderr).await,
        SubCommand::List => list(&client).await,
        SubCommand::Id { task_id } => id(&client, task_id).await,
        SubCommand::Kill { task_ids, signal } => {
            for_each_id(task_ids, |id| {
                let client = &client;
                async move { client.kill_task(id, signal).await }
            })
            .await
        }
        SubCommand::Suspend { task_ids } => {
            for_each_id(task_ids, |id| {
                let client = &client;
                async move { client.suspend_task(id).await }
            })
            .await
        }
        SubCommand::Resume { task_ids } => {
            for_each_id(task_ids, |id| {
                let client = &client;
                async move { client.resume_task(id).await }
            })
            .await
        }
        SubCommand::Stop => stop(&client).await,
    }
}

/// Launches `batchqd` as a detached child process.
/// Returns as soon as the process is spawned; it does not wait for the RPC socket to open.
fn start_daemon(max_cpus: usize) -> Result<()> {
    let daemon_path = sibling_daemon_binary()?;

    Command::new(daemon_path)
        .env("MAX_CPUS", max_cpus.to_string())
        .spawn()
        .context("failed to launch batchqd")?;

    println!("batchqd started with max_cpus={max_cpus}");
    Ok(())
}

fn sibling_daemon_binary() -> Result<std::path::PathBuf> {
    let mut path = std::env::current_exe().context("failed to resolve the batchq binary path")?;
    path.set_file_name("batchqd");
    Ok(path)
}

async fn submit(
    client: &BatchQueueClient,
    command: Vec<String>,
    log_stdout: Option<std::path::PathBuf>,
    log_stderr: Option<std::path::PathBuf>,
) -> Result<()> {
    let cwd = std::env::current_dir().context("failed to resolve the current directory")?;

    let id = client
        .submit_task(
            command,
            whoami::username(),
            cwd.to_string_lossy().into_owned(),
            HashMap::new(),
            log_stdout.map(|p| p.to_string_lossy().into_owned()),
            log_stderr.map(|p| p.to_string_lossy().into_owned()),
        )
        .await?;

    println!("{id}");
    Ok(())
}

async fn list(client: &BatchQueueClient) -> Result<()> {
    let response = client.list_tasks().await?;
    println!("{}", output::render_list(&response));
    Ok(())
}

async fn id(client: &BatchQueueClient, task_id: usize) -> Result<()> {
    match client.id_task(task_id as i32).await? {
        Some(command) => {
            println!("{}", output::render_command(&command));
            Ok(())
        }
        None => bail!("no such task: {task_id}"),
    }
}

async fn stop(client: &BatchQueueClient) -> Result<()> {
    client.stop_server().await?;
    println!("stop requested");
    Ok(())
}

/// Issue one RPC call per id, since the server has no batch methods for suspend/resume/kill.
async fn for_each_id<F, Fut>(task_ids: Vec<usize>, mut call: F) -> Result<()>
where
    F: FnMut(i32) -> Fut,
    Fut: std::future::Future<Output = Result<bool>>,
{
    let mut failures = Vec::new();

    for task_id in task_ids {
        let outcome = call(task_id as i32).await?;
        if !outcome {
            failures.push(task_id);
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        bail!("the daemon rejected these task ids: {failures:?}")
    }
}
