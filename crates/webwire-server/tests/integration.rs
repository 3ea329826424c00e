//! End-to-end client/server scenarios (§8) over a real TCP loopback
//! socket, mirroring the teacher's `lockframe-server` transport
//! integration tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use webwire_client::{Client, ClientConfig, ClientError, NoopHooks as ClientNoopHooks};
use webwire_core::{SystemEnv, WebWireError};
use webwire_proto::{Payload, SessionDescriptor};
use webwire_server::{RequestContext, Server, ServerConfig, ServerHooks};

/// Echoes every request's payload back, except for two special names used
/// to exercise session creation and slow handlers.
struct TestHooks {
    /// How long `on_request` sleeps for the `"sleep"` handler name.
    sleep_for: Duration,
}

#[async_trait]
impl ServerHooks for TestHooks {
    async fn on_request(
        &self,
        ctx: &RequestContext,
        name: &[u8],
        payload: Payload,
    ) -> Result<Payload, WebWireError> {
        match name {
            b"create-session" => {
                let info = serde_json::json!({"role": "admin"});
                let descriptor = ctx.create_session("alice", info).await?;
                let bytes = descriptor.to_bytes().map_err(|err| WebWireError::Protocol(err.to_string()))?;
                Ok(Payload::binary(bytes))
            },
            b"sleep" => {
                tokio::time::sleep(self.sleep_for).await;
                Ok(payload)
            },
            _ => Ok(payload),
        }
    }
}

async fn spawn_server(config: ServerConfig, sleep_for: Duration) -> (Arc<Server<SystemEnv, TestHooks>>, String) {
    let server = Server::bind("127.0.0.1:0", SystemEnv::new(), TestHooks { sleep_for }, config)
        .await
        .expect("bind");
    let addr = server.local_addr().expect("local_addr").to_string();
    let server = Arc::new(server);
    let running = Arc::clone(&server);
    tokio::spawn(async move {
        let _ = running.run().await;
    });
    // Give the accept loop a moment to start listening for real; the bind
    // above already reserves the socket, so this is a generous margin
    // rather than a strict requirement.
    tokio::time::sleep(Duration::from_millis(10)).await;
    (server, addr)
}

fn client_config() -> ClientConfig {
    ClientConfig {
        dial_timeout: Duration::from_secs(2),
        heartbeat_interval: Duration::from_secs(30),
        dead_peer_timeout: Duration::from_secs(60),
        default_request_timeout: Duration::from_secs(5),
        ..ClientConfig::default()
    }
}

#[tokio::test]
async fn echo_request_round_trips() {
    let (_server, addr) = spawn_server(ServerConfig::default(), Duration::from_millis(100)).await;
    let client = Client::new(addr, SystemEnv::new(), ClientNoopHooks, client_config());
    client.connect().await.expect("connect");

    let payload = Payload::binary(vec![0xDE, 0xAD, 0xBE, 0xEF]);
    let reply = client.request("echo", payload.clone(), Duration::from_secs(2)).await.expect("request");
    assert_eq!(reply, payload);

    client.close().await;
}

#[tokio::test]
async fn signal_delivers_with_no_reply() {
    let (_server, addr) = spawn_server(ServerConfig::default(), Duration::from_millis(100)).await;
    let client = Client::new(addr, SystemEnv::new(), ClientNoopHooks, client_config());
    client.connect().await.expect("connect");

    client
        .signal("notify", Payload::utf8("hello"))
        .await
        .expect("signal delivers without error");

    client.close().await;
}

#[tokio::test]
async fn empty_request_is_rejected_before_send() {
    let (_server, addr) = spawn_server(ServerConfig::default(), Duration::from_millis(100)).await;
    let client = Client::new(addr, SystemEnv::new(), ClientNoopHooks, client_config());
    client.connect().await.expect("connect");

    let result = client.request(Bytes::new(), Payload::empty(), Duration::from_secs(1)).await;
    assert!(matches!(result, Err(ClientError::EmptyMessage)));

    client.close().await;
}

#[tokio::test]
async fn session_create_and_restore_round_trips() {
    let (_server, addr) = spawn_server(ServerConfig::default(), Duration::from_millis(100)).await;
    let client = Client::new(addr, SystemEnv::new(), ClientNoopHooks, client_config());
    client.connect().await.expect("connect");

    let reply = client.request("create-session", Payload::empty(), Duration::from_secs(2)).await.expect("request");
    let descriptor = SessionDescriptor::from_bytes(&reply.data).expect("valid descriptor");
    assert_eq!(descriptor.key, "alice");
    assert_eq!(client.session().await.as_ref().map(|s| s.key.clone()), Some("alice".to_string()));

    client.close_session(Duration::from_secs(2)).await.expect("close session");
    assert!(client.session().await.is_none());

    client.close().await;
}

#[tokio::test]
async fn restoring_an_unknown_session_fails_without_disconnecting() {
    let (_server, addr) = spawn_server(ServerConfig::default(), Duration::from_millis(100)).await;
    let client = Client::new(addr, SystemEnv::new(), ClientNoopHooks, client_config());
    client.connect().await.expect("connect");

    let result = client.restore_session("nonexistent", Duration::from_secs(2)).await;
    assert!(matches!(result, Err(ClientError::WebWire(WebWireError::SessionNotFound))));
    assert_eq!(client.status().await, webwire_client::Status::Connected);
    assert!(client.session().await.is_none());

    client.close().await;
}

#[tokio::test]
async fn session_fan_out_close_affects_every_bound_connection() {
    let (server, addr) = spawn_server(ServerConfig::default(), Duration::from_millis(100)).await;

    let clients: Vec<_> =
        (0..4).map(|_| Client::new(addr.clone(), SystemEnv::new(), ClientNoopHooks, client_config())).collect();
    for client in &clients {
        client.connect().await.expect("connect");
        let reply =
            client.request("create-session", Payload::empty(), Duration::from_secs(2)).await.expect("request");
        let _descriptor = SessionDescriptor::from_bytes(&reply.data).expect("valid descriptor");
    }

    assert_eq!(server.session_connections_num("alice").await, 4);
    let outcome = server.close_session("alice").await;
    assert_eq!(outcome.affected.len(), 4);
    assert_eq!(outcome.errors.len(), 4);
    assert!(outcome.errors.iter().all(|(_, err)| err.is_none()));
    assert!(!outcome.has_general_error());

    let empty_outcome = server.close_session("nonexistent").await;
    assert!(empty_outcome.affected.is_empty());
    assert!(empty_outcome.errors.is_empty());
    assert!(!empty_outcome.has_general_error());
}

#[tokio::test]
async fn graceful_shutdown_waits_for_in_flight_requests() {
    let (server, addr) = spawn_server(ServerConfig::default(), Duration::from_millis(100)).await;
    let client = Client::new(addr.clone(), SystemEnv::new(), ClientNoopHooks, client_config());
    client.connect().await.expect("connect");

    let in_flight = {
        let client = client.clone();
        tokio::spawn(async move { client.request("sleep", Payload::empty(), Duration::from_secs(2)).await })
    };
    // Give the slow handler time to enter before the shutdown flag flips.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let server_for_shutdown = Arc::clone(&server);
    let shutdown = tokio::spawn(async move { server_for_shutdown.shutdown().await });

    // A fresh dial after shutdown has begun should fail: the accept loop
    // stops once it next checks the flag.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let late_dial = Client::new(addr, SystemEnv::new(), ClientNoopHooks, client_config());
    let late_connect = late_dial.connect().await;

    let in_flight_result = in_flight.await.expect("task join");
    assert!(in_flight_result.is_ok(), "the request admitted before shutdown must still get a normal reply");

    shutdown.await.expect("shutdown task join");
    assert!(late_connect.is_err() || matches!(late_dial.status().await, webwire_client::Status::Disconnected));
}
