//! HttpGateway against a throwaway local server that answers each
//! connection with one canned response.

use std::sync::Arc;

use market_insight::{AnalysisGateway, Config, GatewayError, HttpGateway, InsightSession, ResponseOrdering};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

struct Captured {
    request_line: String,
    body: String,
}

fn header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse().ok())
        .unwrap_or(0)
}

/// Serve `responses` in order, one per connection, and hand back what was received.
async fn serve(responses: Vec<(&'static str, String)>) -> (String, JoinHandle<Vec<Captured>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        let mut captured = Vec::new();
        for (status, body) in responses {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            let head_len = loop {
                let n = stream.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);
                if let Some(end) = header_end(&buf) {
                    break end;
                }
                assert!(n > 0, "client closed before sending headers");
            };
            let head = String::from_utf8_lossy(&buf[..head_len]).to_string();
            let want = head_len + content_length(&head);
            while buf.len() < want {
                let n = stream.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            captured.push(Captured {
                request_line: head.lines().next().unwrap_or_default().to_string(),
                body: String::from_utf8_lossy(&buf[head_len..]).to_string(),
            });

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            let _ = stream.shutdown().await;
        }
        captured
    });
    (base, handle)
}

const LISTING: &str = r#"{"insights":[
    {"headline":"Gold rallies on rate cut bets","sentiment":"positive","confidence":0.91,"linked_asset":"GLD","latest_price":184.2},
    {"headline":"Pipeline outage in the Gulf","sentiment":"negative","confidence":0.64,"linked_asset":"USO","latest_price":null}
]}"#;

#[tokio::test]
async fn fetch_insights_decodes_listing() {
    let (base, server) = serve(vec![("200 OK", LISTING.to_string())]).await;
    let gateway = HttpGateway::new(&Config::with_base(base));

    let insights = gateway.fetch_insights().await.unwrap();
    assert_eq!(insights.len(), 2);
    assert_eq!(insights[0].linked_asset, "GLD");
    assert_eq!(insights[0].latest_price, Some(184.2));
    assert_eq!(insights[1].latest_price, None);

    let captured = server.await.unwrap();
    assert_eq!(captured[0].request_line, "GET /news-insights HTTP/1.1");
}

#[tokio::test]
async fn analyze_posts_headline_as_json() {
    let reply = r#"{"headline":"","sentiment":"neutral","confidence":0.5,"linked_asset":"SPY","latest_price":501.0}"#;
    let (base, server) = serve(vec![("200 OK", reply.to_string())]).await;
    let gateway = HttpGateway::new(&Config::with_base(format!("{}/", base)));

    let insight = gateway.analyze("").await.unwrap();
    assert_eq!(insight.headline, "");
    assert_eq!(insight.latest_price, Some(501.0));

    let captured = server.await.unwrap();
    assert_eq!(captured[0].request_line, "POST /analyze-headline HTTP/1.1");
    let sent: serde_json::Value = serde_json::from_str(&captured[0].body).unwrap();
    assert_eq!(sent, serde_json::json!({ "headline": "" }));
}

#[tokio::test]
async fn non_success_status_is_network_error() {
    let (base, server) = serve(vec![("503 Service Unavailable", "{}".to_string())]).await;
    let gateway = HttpGateway::new(&Config::with_base(base));

    let err = gateway.fetch_insights().await.unwrap_err();
    assert!(matches!(err, GatewayError::Network(_)), "got {:?}", err);
    server.await.unwrap();
}

#[tokio::test]
async fn wrong_shape_is_decode_error() {
    let (base, server) = serve(vec![
        ("200 OK", r#"{"items":[]}"#.to_string()),
        ("200 OK", r#"{"headline":"x","sentiment":"neutral"}"#.to_string()),
    ])
    .await;
    let gateway = HttpGateway::new(&Config::with_base(base));

    assert!(matches!(gateway.fetch_insights().await, Err(GatewayError::Decode(_))));
    assert!(matches!(gateway.analyze("x").await, Err(GatewayError::Decode(_))));
    server.await.unwrap();
}

#[tokio::test]
async fn unreachable_host_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let gateway = HttpGateway::new(&Config::with_base(base));
    assert!(matches!(gateway.analyze("anything").await, Err(GatewayError::Network(_))));
}

#[tokio::test]
async fn session_over_http_degrades_on_malformed_listing() {
    let (base, server) = serve(vec![("200 OK", r#"{"data":[]}"#.to_string())]).await;
    let mut cfg = Config::with_base(base);
    cfg.ordering = ResponseOrdering::Arrival;
    let mut session = InsightSession::new(Arc::new(HttpGateway::new(&cfg)), cfg.ordering);

    session.spawn_load();
    session.settle().await;

    let snap = session.snapshot();
    assert!(snap.insights.is_empty());
    assert!(snap.history.is_empty());
    assert_eq!(snap.last_error.map(|e| e.gateway_error().kind()), Some("decode"));
    server.await.unwrap();
}
