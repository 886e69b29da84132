use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Subcommand, Debug)]
pub enum SubCommand {
    /// Launch the daemon as a detached background process.
    Start {
        /// The admission bound passed to the daemon as `MAX_CPUS`.
        #[arg(long, default_value_t = 2)]
        max_cpus: usize,
    },
    /// Queue a command for execution.
    #[command(trailing_var_arg = true)]
    Submit {
        /// The command to run, e.g. `batchq submit -- sleep 30`.
        #[arg(required = true)]
        command: Vec<String>,

        /// Redirect the task's stdout to this file.
        #[arg(long)]
        log_stdout: Option<PathBuf>,

        /// Redirect the task's stderr to this file.
        #[arg(long)]
        log_stderr: Option<PathBuf>,
    },
    /// Show the ids of every live task, grouped by state.
    List,
    /// Print the command of a single task.
    Id {
        /// The task id to inspect.
        task_id: usize,
    },
    /// Send a signal to one or more tasks.
    Kill {
        /// The task ids to signal.
        #[arg(required = true)]
        task_ids: Vec<usize>,

        /// The signal number to send.
        #[arg(short, long, default_value_t = 15)]
        signal: i32,
    },
    /// Suspend one or more running tasks.
    Suspend {
        /// The task ids to suspend.
        #[arg(required = true)]
        task_ids: Vec<usize>,
    },
    /// Resume one or more suspended tasks.
    Resume {
        /// The task ids to resume.
        #[arg(required = true)]
        task_ids: Vec<usize>,
    },
    /// Ask the daemon to shut down.
    Stop,
}

#[derive(Parser, Debug)]
#[command(name = "batchq", about = "Interact with the batch queue daemon", version)]
pub struct CliArguments {
    /// The daemon's RPC host.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// The daemon's RPC port.
    #[arg(long, default_value_t = 7080)]
    pub port: u16,

    #[command(subcommand)]
    pub cmd: SubCommand,
}
