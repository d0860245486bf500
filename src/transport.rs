use std::net::TcpStream;
use std::time::Duration;

use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use tracing::{debug, trace, warn};

use crate::error::{ConfigError, SyncError};
use crate::record::{FeedbackRecord, RemoteAverage};

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Blocking link to the remote store of averages.
///
/// Callers check [`Transport::is_connected`] first; `send` and `fetch` are
/// only attempted while associated.
pub trait Transport {
    /// One association attempt; returns whether the link is now up.
    fn associate(&mut self) -> bool;

    /// Link state at the time of the call
    fn is_connected(&self) -> bool;

    fn send(&mut self, record: &FeedbackRecord) -> Result<(), SyncError>;

    fn fetch(&mut self) -> Result<RemoteAverage, SyncError>;
}

/// HTTP transport posting to and reading from one fixed URL
#[derive(Debug)]
pub struct HttpTransport {
    client: HttpClient,
    endpoint: Url,
}

impl HttpTransport {
    pub fn new(endpoint: &str) -> Result<Self, ConfigError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| ConfigError::Endpoint(endpoint.to_string(), e.to_string()))?;
        let client = HttpClient::builder()
            .no_proxy()
            .build()
            .map_err(|e| ConfigError::Endpoint(endpoint.to_string(), e.to_string()))?;
        Ok(Self { client, endpoint })
    }

    /// Reachability of the endpoint's host stands in for radio association.
    fn probe(&self) -> bool {
        let addrs = match self.endpoint.socket_addrs(|| None) {
            Ok(addrs) => addrs,
            Err(e) => {
                debug!(error = %e, "endpoint does not resolve");
                return false;
            }
        };
        addrs
            .iter()
            .any(|addr| TcpStream::connect_timeout(addr, PROBE_TIMEOUT).is_ok())
    }
}

impl Transport for HttpTransport {
    fn associate(&mut self) -> bool {
        let connected = self.probe();
        trace!(connected, endpoint = %self.endpoint, "association attempt");
        connected
    }

    fn is_connected(&self) -> bool {
        self.probe()
    }

    fn send(&mut self, record: &FeedbackRecord) -> Result<(), SyncError> {
        let body = record.to_json()?;
        let resp = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(|e| {
                warn!(error = %e, "post failed");
                SyncError::TransportFailure(e.to_string())
            })?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(SyncError::TransportFailure(format!("HTTP {status}")))
        }
    }

    fn fetch(&mut self) -> Result<RemoteAverage, SyncError> {
        let resp = self
            .client
            .get(self.endpoint.clone())
            .send()
            .map_err(|e| {
                warn!(error = %e, "get failed");
                SyncError::TransportFailure(e.to_string())
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SyncError::TransportFailure(format!("HTTP {status}")));
        }
        let body = resp
            .bytes()
            .map_err(|e| SyncError::TransportFailure(e.to_string()))?;
        RemoteAverage::from_json(&body)
    }
}

/// In-memory stand-in for the remote sheet.
///
/// Posted records are kept and the latest one is served back on fetch, so a
/// host without a network can still exercise the whole flow.
#[derive(Debug, Clone, Default)]
pub struct LoopbackTransport {
    reachable: bool,
    attempts_needed: u32,
    attempts: u32,
    connected: bool,
    failing: bool,
    body: Option<Vec<u8>>,
    sent: Vec<FeedbackRecord>,
    fetches: u32,
}

impl LoopbackTransport {
    /// Associates on the first attempt
    pub fn online() -> Self {
        Self {
            reachable: true,
            attempts_needed: 1,
            ..Self::default()
        }
    }

    /// Never associates
    pub fn offline() -> Self {
        Self::default()
    }

    /// Associates after `n` attempts
    pub fn reachable_after(mut self, n: u32) -> Self {
        self.reachable = true;
        self.attempts_needed = n.max(1);
        self
    }

    /// Associates, but every send and fetch fails
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Serve this body on fetch until something is posted
    pub fn with_body(mut self, body: &[u8]) -> Self {
        self.body = Some(body.to_vec());
        self
    }

    pub fn sent(&self) -> &[FeedbackRecord] {
        &self.sent
    }

    pub fn fetches(&self) -> u32 {
        self.fetches
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Drop the link, as if the access point went away
    pub fn disconnect(&mut self) {
        self.connected = false;
        self.reachable = false;
    }

    /// Bring the access point back; the next association attempt succeeds.
    pub fn restore(&mut self) {
        self.reachable = true;
        self.attempts_needed = 0;
    }
}

impl Transport for LoopbackTransport {
    fn associate(&mut self) -> bool {
        self.attempts += 1;
        self.connected = self.reachable && self.attempts >= self.attempts_needed;
        self.connected
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn send(&mut self, record: &FeedbackRecord) -> Result<(), SyncError> {
        if self.failing {
            return Err(SyncError::TransportFailure("loopback refused post".into()));
        }
        self.body = Some(record.to_json()?);
        self.sent.push(*record);
        Ok(())
    }

    fn fetch(&mut self) -> Result<RemoteAverage, SyncError> {
        self.fetches += 1;
        if self.failing {
            return Err(SyncError::TransportFailure("loopback refused get".into()));
        }
        match &self.body {
            Some(body) => RemoteAverage::from_json(body),
            None => Err(SyncError::TransportFailure("HTTP 404 Not Found".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn record(average: f64, num_students: u32) -> FeedbackRecord {
        FeedbackRecord {
            average,
            num_students,
        }
    }

    #[test]
    fn loopback_serves_last_post() {
        let mut t = LoopbackTransport::online();
        assert!(t.associate());
        t.send(&record(3.0, 1)).unwrap();
        t.send(&record(4.25, 4)).unwrap();
        assert_eq!(t.sent().len(), 2);
        assert_eq!(t.fetch().unwrap().average, 4.25);
        assert_eq!(t.fetches(), 1);
    }

    #[test]
    fn loopback_empty_fetch_fails() {
        let mut t = LoopbackTransport::online();
        assert_matches!(t.fetch(), Err(SyncError::TransportFailure(_)));
    }

    #[test]
    fn loopback_offline_never_associates() {
        let mut t = LoopbackTransport::offline();
        for _ in 0..5 {
            assert!(!t.associate());
        }
        assert_eq!(t.attempts(), 5);
        assert!(!t.is_connected());
    }

    #[test]
    fn loopback_reachable_after_attempts() {
        let mut t = LoopbackTransport::offline().reachable_after(3);
        assert!(!t.associate());
        assert!(!t.associate());
        assert!(t.associate());
        t.disconnect();
        assert!(!t.is_connected());
        assert!(!t.associate());

        t.restore();
        assert!(t.associate());
        assert!(t.is_connected());
    }

    #[test]
    fn loopback_failing_rejects_calls() {
        let mut t = LoopbackTransport::online().failing().with_body(br#"{"average":1}"#);
        assert!(t.associate());
        assert_matches!(t.send(&record(1.0, 1)), Err(SyncError::TransportFailure(_)));
        assert_matches!(t.fetch(), Err(SyncError::TransportFailure(_)));
        assert!(t.sent().is_empty());
    }

    #[test]
    fn loopback_malformed_body() {
        let mut t = LoopbackTransport::online().with_body(br#"{"avg": 2}"#);
        assert_matches!(t.fetch(), Err(SyncError::MalformedResponse(_)));
    }

    #[test]
    fn http_rejects_bad_endpoint() {
        assert_matches!(
            HttpTransport::new("not a url"),
            Err(ConfigError::Endpoint(_, _))
        );
    }

    /// Read one HTTP request: headers, then `content-length` bytes of body.
    fn read_request(stream: &mut std::net::TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = stream.read(&mut buf).unwrap_or(0);
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&data).into_owned();
            if let Some(end) = text.find("\r\n\r\n") {
                let body_len = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if data.len() >= end + 4 + body_len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&data).into_owned()
    }

    /// Serve one canned HTTP response and hand back the raw request.
    fn one_shot_server(response: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/feedback", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            // the association probe connects and hangs up first
            for stream in listener.incoming() {
                let mut stream = stream.unwrap();
                let request = read_request(&mut stream);
                if request.is_empty() {
                    continue;
                }
                stream.write_all(response.as_bytes()).unwrap();
                return request;
            }
            String::new()
        });
        (url, handle)
    }

    #[test]
    fn http_posts_json_record() {
        let (url, server) = one_shot_server(
            "HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        );
        let mut t = HttpTransport::new(&url).unwrap();
        assert!(t.associate());
        t.send(&record(3.0, 1)).unwrap();

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /feedback"));
        assert!(request.to_lowercase().contains("content-type: application/json"));
        assert!(request.contains(r#"{"average":3.0,"num_students":1}"#));
    }

    #[test]
    fn http_fetch_reads_average() {
        let (url, server) = one_shot_server(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 17\r\nconnection: close\r\n\r\n{\"average\": 4.25}",
        );
        let mut t = HttpTransport::new(&url).unwrap();
        assert!(t.associate());
        assert_eq!(t.fetch().unwrap().average, 4.25);
        assert!(server.join().unwrap().starts_with("GET /feedback"));
    }

    #[test]
    fn http_error_status_is_transport_failure() {
        let (url, server) = one_shot_server(
            "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        );
        let mut t = HttpTransport::new(&url).unwrap();
        assert!(t.associate());
        assert_matches!(t.send(&record(2.0, 2)), Err(SyncError::TransportFailure(_)));
        server.join().unwrap();
    }

    #[test]
    fn http_unreachable_host_does_not_associate() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/feedback", listener.local_addr().unwrap());
        drop(listener);
        let mut t = HttpTransport::new(&url).unwrap();
        assert!(!t.associate());
        assert!(!t.is_connected());
    }

    #[test]
    fn http_link_state_is_checked_live() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/feedback", listener.local_addr().unwrap());
        let t = HttpTransport::new(&url).unwrap();
        assert!(t.is_connected());

        drop(listener);
        assert!(!t.is_connected());
    }
}
