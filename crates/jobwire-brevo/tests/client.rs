//! Integration tests for the Brevo client against a local fake API.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use jobwire_brevo::{Client, Error, Paging};

/// Requests captured by the fake server.
type Captured = Arc<Mutex<Vec<String>>>;

/// Starts a server answering each connection with the next canned response.
async fn fake_server(responses: Vec<(u16, &'static str)>) -> (String, Captured) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}/", listener.local_addr().unwrap());
    let captured: Captured = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&captured);

    tokio::spawn(async move {
        for (status, body) in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            sink.lock().unwrap().push(request);

            let response = format!(
                "HTTP/1.1 {status} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        }
    });

    (base, captured)
}

/// Reads one HTTP/1.1 request (headers plus `Content-Length` body).
async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0_u8; 1024];

    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }

    String::from_utf8_lossy(&buf).to_string()
}

const PAGE_ONE: &str = r#"{"contacts":[
    {"id":1,"attributes":{"SMS":"15551230001"}},
    {"id":2,"attributes":{"SMS":"15551230002","OPT_OUT":true}}
],"count":3}"#;

const PAGE_TWO: &str = r#"{"contacts":[
    {"id":3,"smsBlacklisted":true,"attributes":{"SMS":"15551230003"}}
],"count":3}"#;

#[tokio::test]
async fn test_list_contacts_walks_pages() {
    let (base, captured) = fake_server(vec![(200, PAGE_ONE), (200, PAGE_TWO)]).await;
    let client = Client::with_api_base("xkeysib-test", &base).unwrap();

    let contacts = client
        .list_contacts(
            12,
            Paging {
                page_size: 2,
                max_pages: 10,
            },
        )
        .await
        .unwrap();

    assert_eq!(contacts.len(), 3);
    assert!(contacts[1].attribute_flag("OPT_OUT"));
    assert!(contacts[2].is_blacklisted());

    let requests = captured.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].starts_with("GET /contacts/lists/12/contacts?limit=2&offset=0"));
    assert!(requests[1].starts_with("GET /contacts/lists/12/contacts?limit=2&offset=2"));
    assert!(requests[0].to_lowercase().contains("api-key: xkeysib-test"));
}

#[tokio::test]
async fn test_list_contacts_respects_max_pages() {
    let (base, captured) = fake_server(vec![(200, PAGE_ONE), (200, PAGE_ONE)]).await;
    let client = Client::with_api_base("xkeysib-test", &base).unwrap();

    let contacts = client
        .list_contacts(
            12,
            Paging {
                page_size: 2,
                max_pages: 1,
            },
        )
        .await
        .unwrap();

    assert_eq!(contacts.len(), 2);
    assert_eq!(captured.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_api_error_is_mapped() {
    let (base, _captured) = fake_server(vec![(
        401,
        r#"{"code":"unauthorized","message":"Key not found"}"#,
    )])
    .await;
    let client = Client::with_api_base("bad", &base).unwrap();

    match client.account().await.unwrap_err() {
        Error::Api {
            status,
            code,
            message,
        } => {
            assert_eq!(status, 401);
            assert_eq!(code.as_deref(), Some("unauthorized"));
            assert_eq!(message, "Key not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_lists() {
    let (base, captured) = fake_server(vec![(
        200,
        r#"{"lists":[
            {"id":4,"name":"Engineering - Senior","totalSubscribers":120,"folderId":2},
            {"id":5,"name":"Engineering - Junior","totalSubscribers":80,"folderId":2}
        ],"count":2}"#,
    )])
    .await;
    let client = Client::with_api_base("xkeysib-test", &base).unwrap();

    let lists = client.lists().await.unwrap();
    assert_eq!(lists.len(), 2);
    assert_eq!(lists[0].name, "Engineering - Senior");
    assert_eq!(lists[1].total_subscribers, 80);
    assert_eq!(lists[1].folder_id, Some(2));
    assert_eq!(captured.lock().unwrap().len(), 1);
}
