use std::collections::HashMap;
use std::net::TcpListener;

use anyhow::Result;
use batchq_lib::settings::Settings;
use dxr_client::{Client, ClientBuilder, Url};

/// Picks a free loopback port by briefly binding to port 0, then dropping the listener.
/// Good enough for a test daemon that starts immediately after.
fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("failed to reserve a test port")
        .local_addr()
        .unwrap()
        .port()
}

async fn start_daemon(max_cpus: usize) -> (Client, tokio::task::JoinHandle<()>) {
    let port = free_port();
    let settings = Settings {
        max_cpus,
        port,
        ..Settings::default()
    };

    let url = Url::parse(&format!("http://127.0.0.1:{port}/RPC2")).unwrap();
    let client = ClientBuilder::new(url).user_agent("batchq-test").build();

    let handle = tokio::spawn(async move {
        batchq_daemon_lib::run(settings, false)
            .await
            .expect("daemon exited unexpectedly");
    });

    // Give the HTTP listener a moment to come up before the first request.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    (client, handle)
}

#[tokio::test]
async fn test_submit_then_list_then_id_round_trip() -> Result<()> {
    let (client, daemon) = start_daemon(2).await;

    let id: i32 = client
        .call(
            "submit_task",
            (
                vec!["true".to_string()],
                "tester".to_string(),
                "/tmp".to_string(),
                HashMap::<String, String>::new(),
                None::<String>,
                None::<String>,
            ),
        )
        .await?;
    assert_eq!(id, 0);

    let command: Option<Vec<String>> = client.call("id_task", (id,)).await?;
    assert_eq!(command, Some(vec!["true".to_string()]));

    let stopped: bool = client.call("stop_server", ()).await?;
    assert!(stopped);

    let _ = daemon.await;
    Ok(())
}

#[tokio::test]
async fn test_unknown_task_id_returns_nil() -> Result<()> {
    let (client, daemon) = start_daemon(2).await;

    let command: Option<Vec<String>> = client.call("id_task", (9999,)).await?;
    assert_eq!(command, None);

    let outcome: bool = client.call("suspend_task", (9999,)).await?;
    assert!(!outcome);

    let _ = client.call::<_, bool>("stop_server", ()).await?;
    let _ = daemon.await;
    Ok(())
}

#[tokio::test]
async fn test_admission_bound_is_respected_over_rpc() -> Result<()> {
    let (client, daemon) = start_daemon(1).await;

    let first: i32 = client
        .call(
            "submit_task",
            (
                vec!["sleep".to_string(), "0.3".to_string()],
                "tester".to_string(),
                "/tmp".to_string(),
                HashMap::<String, String>::new(),
                None::<String>,
                None::<String>,
            ),
        )
        .await?;
    let second: i32 = client
        .call(
            "submit_task",
            (
                vec!["true".to_string()],
                "tester".to_string(),
                "/tmp".to_string(),
                HashMap::<String, String>::new(),
                None::<String>,
                None::<String>,
            ),
        )
        .await?;

    let snapshot: HashMap<String, dxr::Value> = client.call("list_tasks", ()).await?;
    let active: Vec<i32> = dxr::TryFromValue::try_from_value(&snapshot["active"])?;
    let queued: Vec<i32> = dxr::TryFromValue::try_from_value(&snapshot["queued"])?;
    assert_eq!(active, vec![first]);
    assert_eq!(queued, vec![second]);

    let _ = client.call::<_, bool>("stop_server", ()).await?;
    let _ = daemon.await;
    Ok(())
}
