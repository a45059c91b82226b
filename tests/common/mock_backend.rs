use actix_web::dev::ServerHandle;
use actix_web::http::StatusCode;
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, web};
use bytes::Bytes;
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;

pub const PREDICT_PATH: &str = "/v1/models/plant_disease_detector:predict";

/// How the mock inference server answers every predict call
#[derive(Clone, Debug)]
pub enum MockReply {
    /// 200 with this exact body text
    Body(String),
    /// Non-2xx status with a text body
    Status(u16, String),
    /// Wait before answering with an empty prediction list
    Delay(Duration),
}

/// A request as the mock backend saw it
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub content_type: Option<String>,
    pub body: Value,
}

struct MockState {
    reply: MockReply,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Mock inference server for testing
pub struct MockBackend {
    pub url: String,
    state: web::Data<MockState>,
    handle: ServerHandle,
}

impl MockBackend {
    /// Start the mock backend on an ephemeral port
    pub fn start(reply: MockReply) -> Self {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = web::Data::new(MockState {
            reply,
            requests: Mutex::new(Vec::new()),
        });

        let app_state = state.clone();
        let server = HttpServer::new(move || {
            App::new()
                .app_data(app_state.clone())
                .app_data(web::PayloadConfig::new(64 * 1024 * 1024))
                .route(PREDICT_PATH, web::post().to(predict_handler))
        })
        .workers(1)
        .listen(listener)
        .unwrap()
        .run();
        let handle = server.handle();
        actix_web::rt::spawn(server);

        Self {
            url: format!("http://127.0.0.1:{}{}", port, PREDICT_PATH),
            state,
            handle,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub async fn stop(self) {
        self.handle.stop(false).await;
    }
}

async fn predict_handler(
    req: HttpRequest,
    body: Bytes,
    state: web::Data<MockState>,
) -> HttpResponse {
    let content_type = req
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
    state
        .requests
        .lock()
        .unwrap()
        .push(RecordedRequest { content_type, body });

    match &state.reply {
        MockReply::Body(text) => HttpResponse::Ok()
            .content_type("application/json")
            .body(text.clone()),
        MockReply::Status(code, text) => {
            HttpResponse::build(StatusCode::from_u16(*code).unwrap()).body(text.clone())
        }
        MockReply::Delay(delay) => {
            tokio::time::sleep(*delay).await;
            HttpResponse::Ok().body(r#"{"predictions": []}"#)
        }
    }
}

/// A local URL with nothing listening on it
pub fn refused_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}{}", port, PREDICT_PATH)
}
