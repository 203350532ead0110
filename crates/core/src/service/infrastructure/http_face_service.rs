use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

use crate::persons::domain::person::Person;
use crate::service::domain::face_service::{FaceService, ServiceError};
use crate::shared::settings::Settings;
use crate::staging::domain::staged_image::StagedImage;

const PERSON_PATH: &str = "/person/";
const PERSON_IMAGE_PATH: &str = "/person/image/";
const PERSON_TRAIN_PATH: &str = "/person/train/";
const RECOGNIZE_PATH: &str = "/recognize/";

#[derive(Serialize)]
struct PersonNameBody<'a> {
    person_name: &'a str,
}

#[derive(Deserialize)]
struct RecognizeBody {
    #[serde(default)]
    results: Option<Vec<String>>,
}

/// [`FaceService`] over the service's HTTP API using a blocking `reqwest` client.
pub struct HttpFaceService {
    base_url: String,
    http: Client,
}

impl HttpFaceService {
    /// `timeout` of `None` lets requests run until the server answers.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Network(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ServiceError> {
        Self::new(&settings.api_url, settings.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, ServiceError> {
        let response = request
            .send()
            .map_err(|e| ServiceError::Network(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        log::debug!("Service rejected request with {status}: {body}");
        Err(ServiceError::Server {
            status: status.as_u16(),
            body,
        })
    }

    fn read_json<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, ServiceError> {
        let text = response
            .text()
            .map_err(|e| ServiceError::Network(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| ServiceError::InvalidResponse(e.to_string()))
    }
}

/// Appends one `file` part per image, in slice order.
fn with_files(mut form: Form, images: &[StagedImage]) -> Result<Form, ServiceError> {
    for image in images {
        let part = Part::bytes(image.payload().to_vec())
            .file_name(image.file_name().to_string())
            .mime_str(image.mime_type())
            .map_err(|e| ServiceError::Network(format!("invalid part {}: {e}", image.file_name())))?;
        form = form.part("file", part);
    }
    Ok(form)
}

impl FaceService for HttpFaceService {
    fn list_persons(&self) -> Result<Vec<Person>, ServiceError> {
        let url = self.url(PERSON_PATH);
        log::debug!("GET {url}");
        let response = self.send(self.http.get(url))?;
        Self::read_json(response)
    }

    fn create_person(&self, name: &str) -> Result<(), ServiceError> {
        let url = self.url(PERSON_PATH);
        log::debug!("POST {url} person_name={name}");
        self.send(self.http.post(url).json(&PersonNameBody { person_name: name }))?;
        Ok(())
    }

    fn delete_person(&self, name: &str) -> Result<(), ServiceError> {
        let url = self.url(PERSON_PATH);
        log::debug!("DELETE {url} person_name={name}");
        let form = Form::new().text("person_name", name.to_string());
        self.send(self.http.delete(url).multipart(form))?;
        Ok(())
    }

    fn attach_images(&self, name: &str, images: &[StagedImage]) -> Result<(), ServiceError> {
        let url = self.url(PERSON_IMAGE_PATH);
        log::debug!("POST {url} person_name={name} with {} image(s)", images.len());
        let form = with_files(Form::new().text("person_name", name.to_string()), images)?;
        self.send(self.http.post(url).multipart(form))?;
        Ok(())
    }

    fn train_person(&self, name: &str) -> Result<(), ServiceError> {
        let url = self.url(PERSON_TRAIN_PATH);
        log::debug!("POST {url} person_name={name}");
        self.send(self.http.post(url).json(&PersonNameBody { person_name: name }))?;
        Ok(())
    }

    fn recognize(&self, images: &[StagedImage]) -> Result<Vec<String>, ServiceError> {
        let url = self.url(RECOGNIZE_PATH);
        log::debug!("POST {url} with {} image(s)", images.len());
        let form = with_files(Form::new(), images)?;
        let response = self.send(self.http.post(url).multipart(form))?;
        let body: RecognizeBody = Self::read_json(response)?;
        Ok(body.results.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staging::domain::capture_buffer::CaptureBuffer;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::mpsc;
    use std::thread;

    // --- Canned HTTP server ---

    /// Serves one canned `(status, body)` per connection and reports each raw request.
    fn serve(responses: Vec<(u16, &'static str)>) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let request = read_request(&mut stream);
                tx.send(request).unwrap();
                let reply = format!(
                    "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(reply.as_bytes()).unwrap();
            }
        });

        (format!("http://{addr}"), rx)
    }

    fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if request_complete(&buf) {
                break;
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn request_complete(buf: &[u8]) -> bool {
        let text = String::from_utf8_lossy(buf);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let headers = text[..header_end].to_ascii_lowercase();
        let body_len = buf.len() - (header_end + 4);
        if let Some(line) = headers
            .lines()
            .find(|l| l.starts_with("content-length:"))
        {
            let expected: usize = line["content-length:".len()..].trim().parse().unwrap();
            return body_len >= expected;
        }
        if headers.contains("transfer-encoding: chunked") {
            return text.ends_with("0\r\n\r\n");
        }
        true
    }

    fn staged(names: &[&str]) -> Vec<StagedImage> {
        let mut buffer = CaptureBuffer::new();
        for name in names {
            buffer.add_file(vec![0xAB; 16], name).unwrap();
        }
        buffer.snapshot()
    }

    // --- Tests ---

    #[test]
    fn test_list_persons_parses_listing() {
        let (url, requests) = serve(vec![(
            200,
            r#"[{"name":"Alice","trained":false},{"name":"Bob","trained":true}]"#,
        )]);
        let service = HttpFaceService::new(&url, None).unwrap();

        let people = service.list_persons().unwrap();
        assert_eq!(
            people,
            vec![Person::new("Alice", false), Person::new("Bob", true)]
        );
        assert!(requests.recv().unwrap().starts_with("GET /person/ HTTP/1.1"));
    }

    #[test]
    fn test_create_person_posts_json_name() {
        let (url, requests) = serve(vec![(200, r#"{"message":"created"}"#)]);
        let service = HttpFaceService::new(&url, None).unwrap();

        service.create_person("Alice").unwrap();
        let request = requests.recv().unwrap();
        assert!(request.starts_with("POST /person/ HTTP/1.1"));
        assert!(request.to_ascii_lowercase().contains("content-type: application/json"));
        assert!(request.ends_with(r#"{"person_name":"Alice"}"#));
    }

    #[test]
    fn test_train_person_posts_json_name() {
        let (url, requests) = serve(vec![(200, r#"{"message":"trained"}"#)]);
        let service = HttpFaceService::new(&url, None).unwrap();

        service.train_person("Alice").unwrap();
        let request = requests.recv().unwrap();
        assert!(request.starts_with("POST /person/train/ HTTP/1.1"));
        assert!(request.ends_with(r#"{"person_name":"Alice"}"#));
    }

    #[test]
    fn test_delete_person_sends_form_field() {
        let (url, requests) = serve(vec![(200, r#"{"message":"deleted"}"#)]);
        let service = HttpFaceService::new(&url, None).unwrap();

        service.delete_person("Alice").unwrap();
        let request = requests.recv().unwrap();
        assert!(request.starts_with("DELETE /person/ HTTP/1.1"));
        assert!(request.contains(r#"name="person_name""#));
        assert!(request.contains("Alice"));
    }

    #[test]
    fn test_non_success_status_keeps_body_verbatim() {
        let (url, _requests) = serve(vec![(404, r#"{"error":"Person not found."}"#)]);
        let service = HttpFaceService::new(&url, None).unwrap();

        assert_eq!(
            service.delete_person("Ghost"),
            Err(ServiceError::Server {
                status: 404,
                body: r#"{"error":"Person not found."}"#.to_string(),
            })
        );
    }

    #[test]
    fn test_attach_images_sends_name_and_files_in_order() {
        let (url, requests) = serve(vec![(200, r#"{"message":"2 images uploaded"}"#)]);
        let service = HttpFaceService::new(&url, None).unwrap();

        service
            .attach_images("Alice", &staged(&["first.jpg", "second.png"]))
            .unwrap();
        let request = requests.recv().unwrap();
        assert!(request.starts_with("POST /person/image/ HTTP/1.1"));
        assert!(request.contains(r#"name="person_name""#));
        assert_eq!(request.matches(r#"name="file""#).count(), 2);

        let first = request.find(r#"filename="first.jpg""#).unwrap();
        let second = request.find(r#"filename="second.png""#).unwrap();
        assert!(first < second);
        assert!(request.contains("image/jpeg"));
        assert!(request.contains("image/png"));
    }

    #[test]
    fn test_recognize_returns_labels() {
        let (url, requests) = serve(vec![(200, r#"{"results":["Alice","Bob"]}"#)]);
        let service = HttpFaceService::new(&url, None).unwrap();

        let labels = service.recognize(&staged(&["probe.jpg"])).unwrap();
        assert_eq!(labels, vec!["Alice", "Bob"]);
        let request = requests.recv().unwrap();
        assert!(request.starts_with("POST /recognize/ HTTP/1.1"));
        assert!(!request.contains(r#"name="person_name""#));
    }

    #[test]
    fn test_recognize_missing_or_null_results_is_empty() {
        let (url, _requests) = serve(vec![(200, r#"{}"#), (200, r#"{"results":null}"#)]);
        let service = HttpFaceService::new(&url, None).unwrap();

        assert!(service.recognize(&staged(&["a.jpg"])).unwrap().is_empty());
        assert!(service.recognize(&staged(&["a.jpg"])).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_body_is_invalid_response() {
        let (url, _requests) = serve(vec![(200, "<html>oops</html>")]);
        let service = HttpFaceService::new(&url, None).unwrap();

        assert!(matches!(
            service.list_persons(),
            Err(ServiceError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_unreachable_service_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let service = HttpFaceService::new(&format!("http://{addr}"), None).unwrap();
        assert!(matches!(
            service.list_persons(),
            Err(ServiceError::Network(_))
        ));
    }

    #[test]
    fn test_trailing_slash_trimmed_from_base_url() {
        let service = HttpFaceService::new("http://localhost:8000/", None).unwrap();
        assert_eq!(service.base_url(), "http://localhost:8000");
        assert_eq!(service.url(PERSON_PATH), "http://localhost:8000/person/");
    }
}
