// SeismoNode: Minimal HTTP
//
// Just enough HTTP for three routes and one POST.

use std::fmt::Write as _;

/// Static dashboard served at `/`.
pub const INDEX_HTML: &str = include_str!("index.html");

const NOT_FOUND_BODY: &str = "<h1>404 Not Found</h1>";

/// Routes the node answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Index,
    SensorApi,
    Favicon,
    NotFound,
}

/// Classify a raw request by its request line. Only `GET` is served.
pub fn classify(request: &[u8]) -> Route {
    if !request.starts_with(b"GET /") {
        return Route::NotFound;
    }
    // "GET " is 4 bytes; the path runs to the next space or the end of what we have
    let rest = &request[4..];
    let path = match rest.iter().position(|&b| b == b' ') {
        Some(end) => &rest[..end],
        None => rest,
    };

    if path == b"/" {
        Route::Index
    } else if path.starts_with(b"/api/sensor") {
        Route::SensorApi
    } else if path.starts_with(b"/favicon.ico") {
        Route::Favicon
    } else {
        Route::NotFound
    }
}

/// A complete response; every one closes the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub reason: &'static str,
    pub content_type: Option<&'static str>,
    pub cors: bool,
    pub body: String,
}

impl Response {
    pub fn index() -> Self {
        Self {
            status: 200,
            reason: "OK",
            content_type: Some("text/html; charset=utf-8"),
            cors: false,
            body: INDEX_HTML.to_owned(),
        }
    }

    pub fn json(body: String) -> Self {
        Self {
            status: 200,
            reason: "OK",
            content_type: Some("application/json; charset=utf-8"),
            cors: true,
            body,
        }
    }

    pub fn no_content() -> Self {
        Self {
            status: 204,
            reason: "No Content",
            content_type: None,
            cors: false,
            body: String::new(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: 404,
            reason: "Not Found",
            content_type: Some("text/html; charset=utf-8"),
            cors: false,
            body: NOT_FOUND_BODY.to_owned(),
        }
    }

    pub fn header(&self) -> String {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, self.reason);
        if let Some(content_type) = self.content_type {
            let _ = write!(head, "Content-Type: {content_type}\r\n");
            let _ = write!(head, "Content-Length: {}\r\n", self.body.len());
        }
        if self.cors {
            head.push_str("Access-Control-Allow-Origin: *\r\n");
        }
        head.push_str("Connection: close\r\n\r\n");
        head
    }

    /// Bytes on the wire: header plus body.
    pub fn wire_len(&self) -> usize {
        self.header().len() + self.body.len()
    }
}

/// Full `POST` request for the collector.
pub fn post_request(host: &str, path: &str, json: &str) -> String {
    format!(
        "POST {path} HTTP/1.1\r\n\
         Host: {host}\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {json}",
        json.len()
    )
}
