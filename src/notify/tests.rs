//! Unit tests for the dispatcher.

use super::*;
use crate::config::Config;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

const T: i64 = 1_700_000_000;

/// Records every message and fails the calls whose (0-based) index is listed.
struct MockMailTransport {
    sent: Mutex<Vec<OutgoingMail>>,
    calls: AtomicU32,
    fail_on: HashSet<u32>,
}

impl MockMailTransport {
    fn new() -> Self {
        Self::failing_on(&[])
    }

    fn failing_on(calls: &[u32]) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
            fail_on: calls.iter().copied().collect(),
        }
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailTransport for MockMailTransport {
    async fn send_mail(&self, mail: &OutgoingMail) -> Result<(), SendError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on.contains(&call) {
            return Err(SendError::Smtp {
                class: "permanent",
                message: "550 mailbox unavailable".to_string(),
                detail: Some("rejected by mock".to_string()),
            });
        }
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

/// Captures WARN events as `field=value` strings.
#[derive(Clone, Default)]
struct WarnCapture {
    lines: Arc<Mutex<Vec<String>>>,
    count: Arc<AtomicUsize>,
}

struct FieldWriter<'a>(&'a mut String);

impl tracing::field::Visit for FieldWriter<'_> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.push_str(&format!("{}={:?} ", field.name(), value));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.push_str(&format!("{}={} ", field.name(), value));
    }
}

impl<S: tracing::Subscriber> Layer<S> for WarnCapture {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == tracing::Level::WARN {
            self.count.fetch_add(1, Ordering::SeqCst);
            let mut line = String::new();
            event.record(&mut FieldWriter(&mut line));
            self.lines.lock().unwrap().push(line);
        }
    }
}

fn runtime_config(yaml: &str) -> RuntimeConfig {
    let config = Config::from_yaml(yaml).unwrap();
    config.validate().unwrap();
    config.compile().unwrap()
}

fn templated_config() -> RuntimeConfig {
    runtime_config(
        r#"
host: smtp.example.com
port: 2525
from: alerts@example.com
to: ops@example.com
message: "%s [%s] %s"
message_out_keys: tag,time,value
subject: "Alert: %s"
subject_out_keys: value
time_key: time
time_format: "%Y/%m/%d %H:%M:%S"
localtime: false
"#,
    )
}

fn records(values: &[&str]) -> Vec<Record> {
    values
        .iter()
        .map(|v| Record::new(T).with_field("value", *v))
        .collect()
}

#[tokio::test]
async fn process_sends_one_message_per_record_in_order() {
    let mock = Arc::new(MockMailTransport::new());
    let sink = MailSink::with_transport(&templated_config(), mock.clone());

    let outcomes = sink.process("test", &records(&["a", "b", "c"])).await;

    assert_eq!(outcomes, vec![DispatchOutcome::Sent; 3]);
    let bodies: Vec<String> = mock
        .sent()
        .iter()
        .map(|m| m.raw.split_once("\r\n\r\n").unwrap().1.to_string())
        .collect();
    assert_eq!(
        bodies,
        vec![
            "test [2023/11/14 22:13:20] a",
            "test [2023/11/14 22:13:20] b",
            "test [2023/11/14 22:13:20] c",
        ]
    );
}

#[tokio::test]
async fn process_continues_after_a_failed_message() {
    let mock = Arc::new(MockMailTransport::failing_on(&[1]));
    let sink = MailSink::with_transport(&templated_config(), mock.clone());

    let outcomes = sink.process("test", &records(&["a", "b", "c"])).await;

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].is_sent());
    assert!(
        matches!(&outcomes[1], DispatchOutcome::Failed { reason } if reason.contains("550"))
    );
    assert!(outcomes[2].is_sent());
    assert_eq!(mock.call_count(), 3);
    assert_eq!(mock.sent().len(), 2);
}

#[tokio::test(flavor = "current_thread")]
async fn failed_message_logs_exactly_one_warning() {
    let config = templated_config();
    let capture = WarnCapture::default();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let mock = Arc::new(MockMailTransport::failing_on(&[1]));
    let sink = MailSink::with_transport(&config, mock);
    sink.process("test", &records(&["a", "b", "c"])).await;

    assert_eq!(capture.count.load(Ordering::SeqCst), 1);
    let line = capture.lines.lock().unwrap()[0].clone();
    assert!(line.contains("host=smtp.example.com"), "{}", line);
    assert!(line.contains("port=2525"), "{}", line);
    assert!(line.contains("subject=Alert: b"), "{}", line);
    assert!(line.contains("body=test [2023/11/14 22:13:20] b"), "{}", line);
    assert!(line.contains("error_class=permanent"), "{}", line);
    assert!(line.contains("error_source=rejected by mock"), "{}", line);
}

#[tokio::test]
async fn process_empty_batch_sends_nothing() {
    let mock = Arc::new(MockMailTransport::new());
    let sink = MailSink::with_transport(&templated_config(), mock.clone());

    assert!(sink.process("test", &[]).await.is_empty());
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn every_record_gets_its_own_session_even_with_same_recipients() {
    let mock = Arc::new(MockMailTransport::new());
    let sink = MailSink::with_transport(&templated_config(), mock.clone());

    sink.process("test", &records(&["same", "same"])).await;

    let sent = mock.sent();
    assert_eq!(mock.call_count(), 2);
    assert_ne!(sent[0].message_id, sent[1].message_id);
    assert_eq!(sent[0].to, sent[1].to);
}

#[tokio::test]
async fn key_value_body_and_per_record_recipients() {
    let config = runtime_config(
        r#"
host: smtp.example.com
from: alerts@example.com
to: fallback@example.com
to_key: owner
bcc: audit@example.com
out_keys: [tag, time, value]
time_key: time
time_format: "%Y/%m/%d %H:%M:%S"
localtime: false
"#,
    );
    let mock = Arc::new(MockMailTransport::new());
    let sink = MailSink::with_transport(&config, mock.clone());

    let batch = vec![
        Record::new(T)
            .with_field("value", "hello")
            .with_field("owner", "dev@example.com"),
        Record::new(T).with_field("value", "bye"),
    ];
    sink.process("test", &batch).await;

    let sent = mock.sent();
    assert_eq!(sent[0].to, vec!["dev@example.com"]);
    assert_eq!(sent[1].to, vec!["fallback@example.com"]);
    assert_eq!(sent[0].bcc, vec!["audit@example.com"]);
    assert!(sent[0].raw.contains("Subject: mailsink notification\r\n"));
    assert!(
        sent[0]
            .raw
            .ends_with("\r\n\r\ntest\r\n2023/11/14 22:13:20\r\nvalue: hello")
    );
}

#[tokio::test]
async fn invalid_bytes_are_scrubbed_before_sending() {
    let mock = Arc::new(MockMailTransport::new());
    let sink = MailSink::with_transport(&templated_config(), mock.clone());

    let batch = vec![Record::new(T).with_field("value", vec![b'o', 0xFF, b'k'])];
    let outcomes = sink.process("test", &batch).await;

    assert!(outcomes[0].is_sent());
    let raw = &mock.sent()[0].raw;
    assert!(raw.contains("Subject: Alert: o?k\r\n"));
    assert!(raw.ends_with("test [2023/11/14 22:13:20] o?k"));
}

#[test]
fn dispatch_outcome_is_sent() {
    assert!(DispatchOutcome::Sent.is_sent());
    assert!(
        !DispatchOutcome::Failed {
            reason: "x".to_string()
        }
        .is_sent()
    );
}

#[test]
fn from_config_builds_smtp_sink() {
    let sink = MailSink::from_config(&templated_config()).unwrap();
    let debug = format!("{:?}", sink);
    assert!(debug.contains("smtp.example.com"));
    assert!(debug.contains("2525"));
}
