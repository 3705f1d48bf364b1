//! Supervisor behaviour with real listeners.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{extract::Request, middleware::Next, routing::get, Router};

use baas_gateway::http::{ApiApp, DashboardApp};
use baas_gateway::lifecycle::supervisor::{ExitFn, FATAL_EXIT_CODE};
use baas_gateway::lifecycle::{spawn_supervised, ListenerState, ProcessEvents, Shutdown, Supervisor};

mod common;

fn exit_recorder() -> (ExitFn, Arc<Mutex<Vec<i32>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = calls.clone();
    (Arc::new(move |code| sink.lock().unwrap().push(code)), calls)
}

#[tokio::test]
async fn test_termination_closes_both_listeners_without_exit() {
    let config = Arc::new(common::config(&[("NODE_ENV", "test")]));
    let events = ProcessEvents::new();
    let (exit, calls) = exit_recorder();

    let api = Supervisor::new("api", events.clone(), exit.clone());
    let dashboard = Supervisor::new("dashboard", events.clone(), exit);
    let mut api_state = api.state();
    let mut dashboard_state = dashboard.state();

    let api_listener = api.bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let dashboard_listener = dashboard.bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let api_addr = api_listener.local_addr().unwrap();

    let api_task = tokio::spawn(api.run(api_listener, ApiApp::new(config.clone()).into_router()));
    let dashboard_task = tokio::spawn(
        dashboard.run(dashboard_listener, DashboardApp::new(config).into_router()),
    );
    api_state.wait_for(|s| *s == ListenerState::Listening).await.unwrap();
    dashboard_state.wait_for(|s| *s == ListenerState::Listening).await.unwrap();

    let client = common::client();
    let response = client.get(format!("http://{}/", api_addr)).send().await.unwrap();
    assert_eq!(response.status(), 200);
    drop(client);

    events.terminate();

    let api_result = tokio::time::timeout(Duration::from_secs(10), api_task).await.unwrap().unwrap();
    let dashboard_result = tokio::time::timeout(Duration::from_secs(10), dashboard_task)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(api_result, Shutdown::Terminated);
    assert_eq!(dashboard_result, Shutdown::Terminated);
    assert_eq!(*api_state.borrow(), ListenerState::Closed);
    assert_eq!(*dashboard_state.borrow(), ListenerState::Closed);
    assert!(calls.lock().unwrap().is_empty());

    assert!(common::client()
        .get(format!("http://{}/", api_addr))
        .send()
        .await
        .is_err());
}

#[tokio::test]
async fn test_failed_background_task_closes_then_exits() {
    let config = Arc::new(common::config(&[("NODE_ENV", "test")]));
    let events = ProcessEvents::new();
    let (exit, calls) = exit_recorder();

    let api = Supervisor::new("api", events.clone(), exit);
    let mut state = api.state();
    let listener = api.bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let task = tokio::spawn(api.run(listener, ApiApp::new(config).into_router()));
    state.wait_for(|s| *s == ListenerState::Listening).await.unwrap();

    spawn_supervised(&events, "mail-queue", async {
        Err::<(), _>("connection reset")
    });

    let result = tokio::time::timeout(Duration::from_secs(10), task).await.unwrap().unwrap();
    assert_eq!(result, Shutdown::Fatal("mail-queue: connection reset".to_string()));
    assert_eq!(*state.borrow(), ListenerState::Closed);
    assert_eq!(*calls.lock().unwrap(), vec![FATAL_EXIT_CODE]);
}

#[tokio::test]
async fn test_panic_escaping_the_stages_closes_then_exits() {
    let config = Arc::new(common::config(&[]));
    let events = ProcessEvents::new();
    let (exit, calls) = exit_recorder();

    let baas = Router::new().route(
        "/boom",
        get(|| async {
            if true {
                panic!("handler exploded");
            }
            "unreachable"
        }),
    );
    let router = ApiApp::new(config)
        .with_baas(baas)
        .into_router()
        .layer(axum::middleware::from_fn(|request: Request, next: Next| async move {
            if request.uri().path() == "/crash" {
                panic!("outer layer exploded");
            }
            next.run(request).await
        }));

    let api = Supervisor::new("api", events.clone(), exit);
    let mut state = api.state();
    let listener = api.bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let task = tokio::spawn(api.run(listener, router));
    state.wait_for(|s| *s == ListenerState::Listening).await.unwrap();

    // A handler panic is answered by the stages and is not fatal.
    let response = common::client()
        .get(format!("http://{}/parse/boom", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
    assert_eq!(*state.borrow(), ListenerState::Listening);
    assert!(calls.lock().unwrap().is_empty());

    let _ = common::client()
        .get(format!("http://{}/crash", addr))
        .send()
        .await;

    let result = tokio::time::timeout(Duration::from_secs(10), task).await.unwrap().unwrap();
    assert_eq!(result, Shutdown::Fatal("api panicked: outer layer exploded".to_string()));
    assert_eq!(*state.borrow(), ListenerState::Closed);
    assert_eq!(*calls.lock().unwrap(), vec![FATAL_EXIT_CODE]);
}
