pub mod habitica;
pub mod rtm;

#[cfg(test)]
pub(crate) mod fake_http {
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::mpsc::{self, Receiver};
    use std::thread;

    pub struct CapturedRequest {
        pub request_line: String,
        pub body: String,
    }

    /// Serves exactly one HTTP request on a loopback port and reports what
    /// was received. Returns the base URL to point a client at.
    pub fn serve_one(
        status_line: &'static str,
        response_body: &'static str,
    ) -> (String, Receiver<CapturedRequest>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let (mut stream, _addr) = listener.accept().expect("accept");
            let raw = read_request(&mut stream);
            let (request_line, body) = split_request(&raw);
            let response = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{response_body}",
                response_body.len()
            );
            stream.write_all(response.as_bytes()).expect("write response");
            let _ = tx.send(CapturedRequest { request_line, body });
        });
        (format!("http://{addr}"), rx)
    }

    fn read_request(stream: &mut TcpStream) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).expect("read request");
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(header_end) = find_header_end(&buf) {
                let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
                if buf.len() >= header_end + 4 + content_length(&headers) {
                    break;
                }
            }
        }
        buf
    }

    fn find_header_end(buf: &[u8]) -> Option<usize> {
        buf.windows(4).position(|window| window == b"\r\n\r\n")
    }

    fn content_length(headers: &str) -> usize {
        headers
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                if name.trim() == "content-length" {
                    value.trim().parse().ok()
                } else {
                    None
                }
            })
            .unwrap_or(0)
    }

    fn split_request(raw: &[u8]) -> (String, String) {
        let text = String::from_utf8_lossy(raw).to_string();
        let request_line = text.lines().next().unwrap_or_default().to_string();
        let body = text
            .split_once("\r\n\r\n")
            .map(|(_, body)| body.to_string())
            .unwrap_or_default();
        (request_line, body)
    }
}
