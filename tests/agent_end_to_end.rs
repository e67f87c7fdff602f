//! End-to-end: real WebSocket orchestrator, real health listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

use nexus_agent::connection::{ConnectionManager, FixedDelay, InboundHandler, WebSocketConnector};
use nexus_agent::{health, AgentIdentity, ConnectionState, NexusError};

const WAIT: Duration = Duration::from_secs(5);
const HEARTBEAT: &str = "Test Agent: Integration running.";

struct ForwardHandler(mpsc::UnboundedSender<String>);

impl InboundHandler for ForwardHandler {
    fn handle(&self, _agent: &str, message: &str) {
        let _ = self.0.send(message.to_string());
    }
}

fn identity() -> Arc<AgentIdentity> {
    Arc::new(AgentIdentity::new(
        "Test Agent",
        "Integration running.",
        Duration::from_secs(1),
        0,
    ))
}

async fn spawn_health(body: String) -> SocketAddr {
    let listener = health::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { health::serve(listener, body).await });
    addr
}

async fn probe(addr: SocketAddr) -> (u16, String) {
    let resp = reqwest::get(format!("http://{}/agent/health", addr))
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.text().await.unwrap())
}

async fn wait_state(rx: &mut watch::Receiver<ConnectionState>, target: ConnectionState) {
    timeout(WAIT, rx.wait_for(|s| *s == target))
        .await
        .expect("timed out waiting for state")
        .unwrap();
}

#[tokio::test]
async fn test_agent_reconnects_and_health_stays_up() {
    let identity = identity();
    let health_addr = spawn_health(identity.health_body()).await;

    // (a) before any connection attempt
    assert_eq!(probe(health_addr).await, (200, "Test Agent is alive.".to_string()));

    // Reserve a port with nothing listening on it yet.
    let orchestrator_addr = {
        let reserved = TcpListener::bind("127.0.0.1:0").await.unwrap();
        reserved.local_addr().unwrap()
    };

    let (tx, mut inbound) = mpsc::unbounded_channel();
    let manager = ConnectionManager::new(
        Arc::clone(&identity),
        Box::new(WebSocketConnector::new()),
        Box::new(FixedDelay(Duration::from_millis(300))),
    )
    .with_handler(Arc::new(ForwardHandler(tx)));
    let mut state = manager.subscribe();

    let url = format!("ws://{}/", orchestrator_addr);
    let agent = tokio::spawn(async move { manager.run(Some(url.as_str())).await });

    // Target unreachable: the agent keeps retrying and never connects.
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_ne!(*state.borrow(), ConnectionState::Connected);
    assert_eq!(probe(health_addr).await.0, 200);

    // Orchestrator comes up.
    let orchestrator = TcpListener::bind(orchestrator_addr).await.unwrap();
    let (tcp, _) = timeout(WAIT, orchestrator.accept()).await.unwrap().unwrap();
    let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
    wait_state(&mut state, ConnectionState::Connected).await;

    let first = timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(first, Message::Text(HEARTBEAT.to_string()));

    ws.send(Message::Text("status?".into())).await.unwrap();
    assert_eq!(timeout(WAIT, inbound.recv()).await.unwrap().unwrap(), "status?");

    // (b) while connected
    assert_eq!(probe(health_addr).await.0, 200);

    // Orchestrator drops the session.
    ws.close(None).await.unwrap();
    drop(ws);
    wait_state(&mut state, ConnectionState::Disconnected).await;

    // (c) during the retry delay
    assert_eq!(probe(health_addr).await.0, 200);

    // Fresh session, heartbeat starts again.
    let (tcp, _) = timeout(WAIT, orchestrator.accept()).await.unwrap().unwrap();
    let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
    let again = timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(again, Message::Text(HEARTBEAT.to_string()));

    agent.abort();
}

#[tokio::test]
async fn test_missing_url_leaves_health_untouched() {
    let identity = identity();
    let health_addr = spawn_health(identity.health_body()).await;

    let manager = ConnectionManager::new(
        Arc::clone(&identity),
        Box::new(WebSocketConnector::new()),
        Box::new(FixedDelay(Duration::from_millis(100))),
    );
    let result = manager.run(None).await;
    assert!(matches!(result, Err(NexusError::Config(_))));
    assert_eq!(manager.state(), ConnectionState::Disconnected);

    let first = probe(health_addr).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = probe(health_addr).await;
    assert_eq!(first, second);
    assert_eq!(first.0, 200);
}

#[tokio::test]
async fn test_silent_orchestrator_does_not_stall_reconnects() {
    // Accepts TCP, then never completes the WebSocket handshake.
    let orchestrator = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let orchestrator_addr = orchestrator.local_addr().unwrap();
    let (accepted_tx, mut accepted) = mpsc::unbounded_channel();
    let server = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = orchestrator.accept().await {
            held.push(socket);
            let _ = accepted_tx.send(());
        }
    });

    let manager = ConnectionManager::new(
        identity(),
        Box::new(WebSocketConnector::with_timeout(Duration::from_millis(200))),
        Box::new(FixedDelay(Duration::from_millis(100))),
    );
    let state = manager.subscribe();
    let url = format!("ws://{}/", orchestrator_addr);
    let agent = tokio::spawn(async move { manager.run(Some(url.as_str())).await });

    for _ in 0..2 {
        timeout(WAIT, accepted.recv())
            .await
            .expect("agent stopped attempting to connect")
            .unwrap();
    }
    assert_ne!(*state.borrow(), ConnectionState::Connected);

    agent.abort();
    server.abort();
}
