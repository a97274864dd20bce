//! A small user service driven through the public API, with a hand-written
//! transport sink in place of `BufferedResponse`.

use std::sync::Arc;
use std::time::Duration;

use futures::stream;
use transport::Recorder;
use serde_json::{Value, json};
use tether::core::InternalWarning;
use tether::prelude::*;
use tokio_util::sync::CancellationToken;

mod transport {
    use std::sync::Arc;

    use http::StatusCode;
    use parking_lot::Mutex;
    use serde_json::Value;
    use tether::core::{InternalWarning, ResponseSink};

    /// What a transport would have put on the wire.
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct Wire {
        pub status: Option<u16>,
        pub body: Option<String>,
        pub content_type: Option<&'static str>,
        pub warnings: Vec<String>,
    }

    #[derive(Clone, Default)]
    pub struct Recorder(pub Arc<Mutex<Wire>>);

    impl Recorder {
        pub fn wire(&self) -> Wire {
            self.0.lock().clone()
        }

        fn update(&self, f: impl FnOnce(&mut Wire)) {
            f(&mut self.0.lock());
        }
    }

    impl ResponseSink for Recorder {
        fn headers_sent(&self) -> bool {
            self.wire().body.is_some()
        }

        fn set_status(&mut self, status: StatusCode) {
            self.update(|w| w.status = Some(status.as_u16()));
        }

        fn write_json(&mut self, body: &Value) {
            let text = body.to_string();
            self.update(|w| {
                w.body = Some(text);
                w.content_type = Some("application/json");
            });
        }

        fn write_raw(&mut self, body: &str) {
            self.update(|w| {
                w.body = Some(body.to_owned());
                w.content_type = Some("text/plain");
            });
        }

        fn end(&mut self) {
            self.update(|w| w.body = Some(String::new()));
        }

        fn emit_warning(&mut self, warning: &InternalWarning) {
            let message = warning.message().to_owned();
            self.update(|w| w.warnings.push(message));
        }
    }
}

fn users() -> Router {
    let mut router = Router::new();
    router
        .param("id", |_ex: Exchange, id: String| async move {
            match id.as_str() {
                "1" => Ok(json!({ "id": 1, "name": "ada" })),
                _ => Err(DomainError::not_found(json!({ "error": "unknown user" }))),
            }
        })
        .get("/users/:id", |ResolvedParam(user): ResolvedParam| async move {
            Reply::map([
                ("user", Reply::Value(user)),
                ("friends", Reply::deferred(async { json!(["grace", "linus"]) })),
                ("status", Reply::stream(stream::iter(["online", "away"]))),
            ])
        })
        .post("/users", |JsonBody(body): JsonBody<Value>| async move {
            Respond::new(StatusCode::CREATED, body)
        })
        .get("/slow", || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            "finally"
        });
    router
}

#[tokio::test]
async fn resolves_user_dashboard() {
    let router = users();
    let sink = Recorder::default();

    let flow = router.dispatch(Request::new(Method::GET, "/users/1"), sink.clone()).await;

    assert_eq!(flow, Flow::Halt);
    let wire = sink.wire();
    assert_eq!(wire.status, Some(200));
    assert_eq!(wire.content_type, Some("application/json"));
    let body: Value = serde_json::from_str(wire.body.as_deref().unwrap_or_default()).unwrap();
    assert_eq!(
        body,
        json!({
            "user": { "id": 1, "name": "ada" },
            "friends": ["grace", "linus"],
            "status": "online",
        })
    );
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let router = users();
    let sink = Recorder::default();

    router.dispatch(Request::new(Method::GET, "/users/2"), sink.clone()).await;

    let wire = sink.wire();
    assert_eq!(wire.status, Some(404));
    assert_eq!(wire.body.as_deref(), Some(r#"{"error":"unknown user"}"#));
}

#[tokio::test]
async fn create_echoes_with_created() {
    let router = users();
    let sink = Recorder::default();

    let request = Request::new(Method::POST, "/users").with_body(json!({ "name": "grace" }));
    router.dispatch(request, sink.clone()).await;

    let wire = sink.wire();
    assert_eq!(wire.status, Some(201));
    assert_eq!(wire.body.as_deref(), Some(r#"{"name":"grace"}"#));
}

#[tokio::test]
async fn unmatched_request_falls_through() {
    let router = users();
    let sink = Recorder::default();

    let flow = router.dispatch(Request::new(Method::DELETE, "/users/1"), sink.clone()).await;

    assert_eq!(flow, Flow::Next);
    assert_eq!(sink.wire(), Default::default());
}

#[tokio::test(start_paused = true)]
async fn disconnect_leaves_response_untouched() {
    let router = Arc::new(users());
    let token = CancellationToken::new();
    let sink = Recorder::default();

    let request = Request::new(Method::GET, "/slow").with_cancellation(token.clone());
    let task = tokio::spawn({
        let router = Arc::clone(&router);
        let sink = sink.clone();
        async move { router.dispatch(request, sink).await }
    });

    tokio::time::sleep(Duration::from_secs(1)).await;
    token.cancel();

    assert_eq!(task.await.unwrap(), Flow::Halt);
    assert_eq!(sink.wire(), Default::default());
}

#[tokio::test]
async fn warnings_reach_the_transport() {
    let mut router = users();
    router
        .get("/broken", || async { Reply::map([("next", Reply::from(Next))]) })
        .silence_warnings(true);
    let sink = Recorder::default();

    router.dispatch(Request::new(Method::GET, "/broken"), sink.clone()).await;

    let wire = sink.wire();
    assert_eq!(wire.status, None);
    assert_eq!(wire.warnings.len(), 1);
    assert_ne!(wire.warnings[0], InternalWarning::headers_sent().message());
}
