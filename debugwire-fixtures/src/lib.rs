//! Bindings generated at build time from `protocol/fixture.json`
//!
//! The build script runs the schema compiler over the fixture protocol and
//! this crate compiles its output, so any generated code that fails to build
//! fails the workspace build.

include!(concat!(env!("OUT_DIR"), "/protocol.rs"));

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use debugwire_protocol::{Command, Event, MethodKind, Response};
    use serde_json::{json, Value};

    use super::protocol::{self, log, methods, network, page, tree};

    #[test]
    fn test_method_type_map_covers_fixture() {
        let map = protocol::method_type_map();

        let body = map.lookup("Network.getResponseBody").unwrap();
        assert_eq!(body.kind(), MethodKind::Command);
        assert!(body.type_name().ends_with("NetworkGetResponseBodyResponse"));

        let received = map.lookup("Network.responseReceived").unwrap();
        assert_eq!(received.kind(), MethodKind::Event);
        assert!(received.type_name().ends_with("NetworkResponseReceivedPayload"));

        assert!(map.lookup("Log.entryAdded").is_some());
        assert!(map.lookup("Page.frameNavigated").is_some());
        assert!(map.lookup("network.responseReceived").is_none());
    }

    #[test]
    fn test_method_constants() {
        assert_eq!(methods::network::GET_RESPONSE_BODY, "Network.getResponseBody");
        assert_eq!(methods::log::ENTRY_ADDED, "Log.entryAdded");
        assert_eq!(methods::page::NAVIGATE, "Page.navigate");
        assert_eq!(methods::page::NAVIGATE_EVENT, "Page.navigate");
        assert_eq!(page::PageNavigateRequest::METHOD, methods::page::NAVIGATE);
        assert_eq!(page::PageNavigatePayload::METHOD, methods::page::NAVIGATE_EVENT);
        assert_eq!(
            <network::NetworkGetResponseBodyRequest as Command>::METHOD,
            <network::NetworkGetResponseBodyResponse as Response>::METHOD
        );
    }

    #[test]
    fn test_decode_response_received() {
        let params = json!({
            "requestId": "1000.1",
            "type": "XHR",
            "response": {
                "url": "https://example.com/api",
                "status": 200,
                "statusText": "OK",
                "headers": {"content-type": "application/json"},
                "mimeType": "application/json",
                "encodedDataLength": 512.0,
                "type": "Fetch"
            }
        });

        let map = protocol::method_type_map();
        let payload = map
            .decode_event(methods::network::RESPONSE_RECEIVED, params.clone())
            .unwrap()
            .unwrap();
        let event = payload
            .downcast_ref::<network::NetworkResponseReceivedPayload>()
            .unwrap();

        assert_eq!(event.request_id, "1000.1");
        assert_eq!(event.r#type, network::ResourceType::XHR);
        assert_eq!(event.response.status, 200);
        assert_eq!(event.response.r#type, Some(network::ResourceType::Fetch));
        assert_eq!(event.response.from_disk_cache, None);
        assert_eq!(
            event.response.headers.get("content-type").map(String::as_str),
            Some("application/json")
        );

        // Absent optional fields stay absent on the way back out
        let encoded = serde_json::to_value(event).unwrap();
        assert!(encoded["response"].get("fromDiskCache").is_none());
        assert_eq!(encoded, params);
    }

    #[test]
    fn test_decode_failure_is_reported() {
        let map = protocol::method_type_map();
        let result = map
            .decode_event(methods::network::RESPONSE_RECEIVED, json!({"requestId": 5}))
            .unwrap();
        assert!(result.is_err());
    }

    #[test]
    fn test_request_serialization() {
        let request = network::NetworkGetResponseBodyRequest {
            request_id: "1".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"requestId": "1"})
        );

        let navigate = page::PageNavigateRequest {
            url: "https://example.com".to_string(),
            referrer: None,
        };
        assert_eq!(
            serde_json::to_value(&navigate).unwrap(),
            json!({"url": "https://example.com"})
        );

        let response: page::PageNavigateResponse =
            serde_json::from_value(json!({"frameId": "F1"})).unwrap();
        assert_eq!(response.frame_id, "F1");
        assert_eq!(response.request_id, None);
    }

    #[test]
    fn test_types_named_like_protocol_traits() {
        let entry = log::LogEntry {
            source: "network".to_string(),
            text: "GET /".to_string(),
            event: Some(log::Event {
                command: Some(log::Command {
                    name: "fetch".to_string(),
                }),
            }),
        };
        let payload: log::LogEntryAddedPayload = serde_json::from_value(json!({
            "entry": serde_json::to_value(&entry).unwrap()
        }))
        .unwrap();
        assert_eq!(payload.entry, entry);
        assert_eq!(<log::LogEntryAddedPayload as Event>::METHOD, "Log.entryAdded");
    }

    #[test]
    fn test_recursive_types_round_trip() {
        let params = json!({
            "leaf": {
                "parent": {"leaf": {"peers": []}, "label": "inner"},
                "peers": [{"peers": []}],
                "frame": {
                    "id": "F1",
                    "url": "about:blank",
                    "owner": {"leaf": {"peers": []}, "label": "owner"},
                    "securityDetails": [{"protocol": "TLS 1.3"}]
                }
            },
            "label": "outer"
        });

        let branch: tree::Branch = serde_json::from_value(params.clone()).unwrap();
        assert_eq!(branch.label, "outer");
        let parent = branch.leaf.parent.as_ref().unwrap();
        assert_eq!(parent.label, "inner");
        assert_eq!(branch.leaf.peers.len(), 1);

        let frame = branch.leaf.frame.as_ref().unwrap();
        assert_eq!(frame.owner.as_ref().unwrap().label, "owner");
        let details = frame.security_details.as_ref().unwrap();
        assert_eq!(details[0].protocol, "TLS 1.3");

        assert_eq!(serde_json::to_value(&branch).unwrap(), params);
    }

    #[test]
    fn test_recursive_types_build_in_code() {
        let leaf = tree::Leaf {
            parent: None,
            peers: vec![tree::Leaf::default()],
            frame: None,
        };
        let branch = tree::Branch {
            leaf: Box::new(leaf),
            label: "root".to_string(),
        };
        let frame = page::Frame {
            id: "F2".to_string(),
            owner: Some(Box::new(branch.clone())),
            ..page::Frame::default()
        };
        assert_eq!(frame.owner.as_deref(), Some(&branch));
        assert_eq!(tree::Branch::default().leaf.peers.len(), 0);
    }

    #[test]
    fn test_string_map_override() {
        let mut headers: network::Headers = HashMap::new();
        headers.insert("accept".to_string(), "*/*".to_string());
        let request = network::Request {
            url: "https://example.com".to_string(),
            method: "GET".to_string(),
            headers,
            post_data: None,
        };
        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(encoded["headers"], json!({"accept": "*/*"}));
        assert!(encoded.get("postData").is_none());
    }

    #[tokio::test]
    async fn test_session_over_generated_bindings() {
        use debugwire_client::Session;
        use debugwire_protocol::JsonFrameCodec;
        use futures::{SinkExt, StreamExt};
        use tokio::net::TcpListener;
        use tokio::sync::mpsc;
        use tokio_util::codec::Framed;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(stream, JsonFrameCodec::new());
            let request: Value = serde_json::from_str(&framed.next().await.unwrap().unwrap()).unwrap();
            assert_eq!(request["method"], "Network.getResponseBody");
            assert_eq!(request["params"], json!({"requestId": "7"}));

            let event = json!({
                "method": "Network.requestWillBeSent",
                "params": {
                    "requestId": "7",
                    "request": {"url": "https://example.com", "method": "GET", "headers": {}},
                    "timestamp": 1.5
                }
            });
            framed.send(event.to_string()).await.unwrap();
            let reply = json!({
                "id": request["id"],
                "result": {"body": "aGk=", "base64Encoded": true}
            });
            framed.send(reply.to_string()).await.unwrap();
            while framed.next().await.is_some() {}
        });

        let session = Session::new(
            format!("tcp://127.0.0.1:{}", port),
            Arc::new(protocol::method_type_map()),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        session.subscribe::<network::NetworkRequestWillBeSentPayload, _>(move |e| {
            let _ = tx.send((e.request.url.clone(), e.r#type));
        });

        let response = session
            .send(&network::NetworkGetResponseBodyRequest {
                request_id: "7".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(response.body, "aGk=");
        assert!(response.base64_encoded);

        let (url, kind) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(url, "https://example.com");
        assert_eq!(kind, None);

        session.dispose().await;
        server.await.unwrap();
    }
}
