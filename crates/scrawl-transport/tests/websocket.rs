//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener on an OS-assigned port and talk to it
//! with a plain `tokio-tungstenite` client.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use scrawl_transport::{Connection, Transport, TransportError, WebSocketTransport};
    use tokio_tungstenite::tungstenite::Message;

    type Client = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    /// Binds a transport on a free port, connects one client, and returns
    /// both ends.
    async fn connected_pair() -> (scrawl_transport::WebSocketConnection, Client) {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("bound address");

        let server = tokio::spawn(async move { transport.accept().await.expect("should accept") });
        let (client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        let conn = server.await.expect("accept task");
        (conn, client)
    }

    #[tokio::test]
    async fn test_text_frames_flow_both_ways() {
        let (conn, mut client) = connected_pair().await;
        assert!(conn.id().into_inner() > 0);
        assert!(conn.peer_addr().is_some());

        conn.send("hello from server").await.expect("send");
        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.to_text().unwrap(), "hello from server");

        client
            .send(Message::Text("hello from client".into()))
            .await
            .unwrap();
        assert_eq!(conn.recv().await.unwrap().as_deref(), Some("hello from client"));
    }

    #[tokio::test]
    async fn test_binary_utf8_is_accepted_as_text() {
        let (conn, mut client) = connected_pair().await;
        client
            .send(Message::Binary(b"{\"type\":\"x\"}".to_vec().into()))
            .await
            .unwrap();
        assert_eq!(conn.recv().await.unwrap().as_deref(), Some("{\"type\":\"x\"}"));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_recoverable() {
        let (conn, mut client) = connected_pair().await;
        client
            .send(Message::Binary(vec![0xff, 0xfe].into()))
            .await
            .unwrap();
        client.send(Message::Text("still here".into())).await.unwrap();

        let err = conn.recv().await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidUtf8));
        assert!(err.is_recoverable());
        assert_eq!(conn.recv().await.unwrap().as_deref(), Some("still here"));
    }

    #[tokio::test]
    async fn test_client_close_yields_none() {
        let (conn, mut client) = connected_pair().await;
        client.close(None).await.unwrap();
        assert_eq!(conn.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_send_while_recv_is_pending() {
        let (conn, mut client) = connected_pair().await;
        let conn = std::sync::Arc::new(conn);

        // A reader parked in recv() must not block a concurrent sender.
        let reader = {
            let conn = std::sync::Arc::clone(&conn);
            tokio::spawn(async move { conn.recv().await })
        };
        tokio::time::timeout(Duration::from_secs(2), conn.send("ping"))
            .await
            .expect("send must not wait on the reader")
            .expect("send");

        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.to_text().unwrap(), "ping");

        client.send(Message::Text("pong".into())).await.unwrap();
        let got = reader.await.unwrap().unwrap();
        assert_eq!(got.as_deref(), Some("pong"));
    }

    #[tokio::test]
    async fn test_health_check_answered_before_handshake() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind")
            .with_health_check("/health", || "{\"status\":\"ok\"}".to_owned());
        let addr = transport.local_addr().expect("bound address");
        let server = tokio::spawn(async move { transport.accept().await.expect("should accept") });

        let mut raw = tokio::net::TcpStream::connect(addr).await.unwrap();
        raw.write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        tokio::time::timeout(Duration::from_secs(2), raw.read_to_string(&mut response))
            .await
            .expect("health response should arrive")
            .unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Content-Type: application/json"));
        assert!(response.ends_with("\r\n\r\n{\"status\":\"ok\"}"));

        // The health request never surfaced; the next upgrade does.
        let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/health-not"))
            .await
            .expect("client should connect");
        let conn = server.await.expect("accept task");
        conn.send("after health").await.unwrap();
        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.to_text().unwrap(), "after health");
    }
}
