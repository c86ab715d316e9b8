use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::time::{sleep, timeout};

use agentbus::{Agent, AgentBusError, AgentDescriptor, Coordinator, Message, MessageContext};

/// Logs every delivered payload and returns it unchanged.
struct RecorderAgent {
    descriptor: AgentDescriptor,
    log: Arc<Mutex<Vec<String>>>,
}

impl RecorderAgent {
    fn new(name: &str, capability: &str, log: Arc<Mutex<Vec<String>>>) -> Arc<dyn Agent> {
        Arc::new(Self {
            descriptor: AgentDescriptor::builder(name).capability(capability).build(),
            log,
        })
    }
}

fn render(input: &Value) -> String {
    input
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| input.to_string())
}

#[async_trait::async_trait]
impl Agent for RecorderAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn process(&self, input: Value) -> agentbus::Result<Value> {
        self.log
            .lock()
            .push(format!("{}:{}", self.name(), render(&input)));
        Ok(input)
    }
}

/// Logs delivered payloads but raises, so it never generates a reply of
/// its own. Used as a terminal capture point for reply envelopes.
struct CaptureAgent {
    descriptor: AgentDescriptor,
    log: Arc<Mutex<Vec<String>>>,
}

impl CaptureAgent {
    fn new(name: &str, log: Arc<Mutex<Vec<String>>>) -> Arc<dyn Agent> {
        Arc::new(Self {
            descriptor: AgentDescriptor::new(name),
            log,
        })
    }
}

#[async_trait::async_trait]
impl Agent for CaptureAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn process(&self, input: Value) -> agentbus::Result<Value> {
        self.log.lock().push(render(&input));
        Err(AgentBusError::Processing("capture only".to_string()))
    }

    async fn handle_error(&self, _error: &AgentBusError) {}
}

struct FailingAgent {
    descriptor: AgentDescriptor,
    errors: Arc<Mutex<Vec<String>>>,
}

impl FailingAgent {
    fn new(name: &str, errors: Arc<Mutex<Vec<String>>>) -> Arc<dyn Agent> {
        Arc::new(Self {
            descriptor: AgentDescriptor::new(name),
            errors,
        })
    }
}

#[async_trait::async_trait]
impl Agent for FailingAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn process(&self, _input: Value) -> agentbus::Result<Value> {
        Err(AgentBusError::Processing("broken agent".to_string()))
    }

    async fn handle_error(&self, error: &AgentBusError) {
        self.errors.lock().push(error.to_string());
    }
}

fn spawn_loop(coordinator: &Coordinator) -> tokio::task::JoinHandle<agentbus::Result<()>> {
    let coordinator = coordinator.clone();
    tokio::spawn(async move { coordinator.start().await })
}

/// Routes a request through `receiver` and waits for its completion. The
/// loop is a single sequential consumer, so everything enqueued before
/// this request has been routed once it returns, including any envelope
/// that earlier routing enqueued before this one.
async fn probe(coordinator: &Coordinator, receiver: &str) -> anyhow::Result<Value> {
    let handle = coordinator.send_request(Message::new(
        "probe_driver",
        receiver,
        json!("probe"),
        "process",
    ))?;
    Ok(timeout(Duration::from_secs(2), handle.wait()).await??)
}

#[tokio::test]
async fn delivery_order_matches_enqueue_order() -> anyhow::Result<()> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let coordinator = Coordinator::new();
    coordinator.register_agent(RecorderAgent::new("sink", "record", Arc::clone(&log)));

    for index in 1..=5 {
        coordinator.send_message(Message::new(
            "test",
            "sink",
            json!(format!("m{index}")),
            "process",
        ))?;
    }

    let loop_task = spawn_loop(&coordinator);
    probe(&coordinator, "sink").await?;
    coordinator.stop();
    loop_task.await??;

    let history = log.lock();
    assert_eq!(
        *history,
        ["sink:m1", "sink:m2", "sink:m3", "sink:m4", "sink:m5", "sink:probe"]
    );
    Ok(())
}

#[tokio::test]
async fn duplicate_name_leaves_one_resolvable_entry() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let coordinator = Coordinator::new();
    coordinator.register_agent(RecorderAgent::new("worker", "old_cap", Arc::clone(&log)));
    coordinator.register_agent(RecorderAgent::new("worker", "new_cap", Arc::clone(&log)));

    let capabilities = coordinator.capabilities_by_agent();
    assert_eq!(capabilities.len(), 1);
    assert_eq!(capabilities["worker"], ["new_cap"]);
    assert!(coordinator.find_by_capability("old_cap").is_none());
    assert!(coordinator.find_by_capability("new_cap").is_some());
}

#[tokio::test]
async fn unknown_receiver_is_dropped_without_stopping_the_loop() -> anyhow::Result<()> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let coordinator = Coordinator::new();
    coordinator.register_agent(RecorderAgent::new("sink", "record", Arc::clone(&log)));

    let loop_task = spawn_loop(&coordinator);
    coordinator.send_message(Message::new("test", "nobody", json!("lost"), "process"))?;
    probe(&coordinator, "sink").await?;
    coordinator.stop();
    loop_task.await??;

    // only the probe was delivered; the misaddressed message left no trace
    assert_eq!(*log.lock(), ["sink:probe"]);
    Ok(())
}

#[tokio::test]
async fn reply_is_routed_back_to_a_registered_sender() -> anyhow::Result<()> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let replies = Arc::new(Mutex::new(Vec::new()));
    let coordinator = Coordinator::new();
    coordinator.register_agent(RecorderAgent::new("upper", "record", Arc::clone(&log)));
    coordinator.register_agent(CaptureAgent::new("driver", Arc::clone(&replies)));

    let loop_task = spawn_loop(&coordinator);
    let handle = coordinator.send_request(Message::new("driver", "upper", json!("hi"), "process"))?;
    let direct = timeout(Duration::from_secs(2), handle.wait()).await??;
    assert_eq!(direct, json!("hi"));

    // the reply envelope was enqueued while the request was routed; one
    // probe later it has been delivered to the sender name
    probe(&coordinator, "upper").await?;
    coordinator.stop();
    loop_task.await??;

    assert_eq!(*replies.lock(), ["hi"]);
    Ok(())
}

#[tokio::test]
async fn no_reply_is_enqueued_without_requires_response() -> anyhow::Result<()> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let replies = Arc::new(Mutex::new(Vec::new()));
    let coordinator = Coordinator::new();
    coordinator.register_agent(RecorderAgent::new("upper", "record", Arc::clone(&log)));
    coordinator.register_agent(CaptureAgent::new("driver", Arc::clone(&replies)));

    let loop_task = spawn_loop(&coordinator);
    coordinator.send_message(Message::new("driver", "upper", json!("hi"), "process"))?;
    // two probes: the first guarantees the message was routed, the second
    // flushes anything that routing might have enqueued afterwards
    probe(&coordinator, "upper").await?;
    probe(&coordinator, "upper").await?;
    coordinator.stop();
    loop_task.await??;

    assert_eq!(*log.lock(), ["upper:hi", "upper:probe", "upper:probe"]);
    assert!(replies.lock().is_empty());
    Ok(())
}

#[tokio::test]
async fn processing_failure_reaches_handle_error_once_and_yields_no_reply() -> anyhow::Result<()> {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let replies = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::new(Mutex::new(Vec::new()));
    let coordinator = Coordinator::new();
    coordinator.register_agent(FailingAgent::new("flaky", Arc::clone(&errors)));
    coordinator.register_agent(CaptureAgent::new("driver", Arc::clone(&replies)));
    coordinator.register_agent(RecorderAgent::new("sink", "record", Arc::clone(&log)));

    let loop_task = spawn_loop(&coordinator);
    let handle = coordinator.send_request(Message::new("driver", "flaky", json!("boom"), "process"))?;
    let outcome = timeout(Duration::from_secs(2), handle.wait()).await?;
    assert!(matches!(outcome, Err(AgentBusError::ResponseDropped(_))));

    probe(&coordinator, "sink").await?;
    coordinator.stop();
    loop_task.await??;

    let seen = errors.lock();
    assert_eq!(seen.len(), 1, "handle_error should run exactly once");
    assert!(seen[0].contains("broken agent"));
    assert!(
        replies.lock().is_empty(),
        "a failed request must not produce a reply"
    );
    Ok(())
}

#[tokio::test]
async fn echo_request_from_unregistered_sender() -> anyhow::Result<()> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let coordinator = Coordinator::new();
    coordinator.register_agent(RecorderAgent::new("echo", "echo", Arc::clone(&log)));

    let loop_task = spawn_loop(&coordinator);
    // "t" is not registered: the reply envelope is generated, then dropped
    // on its own dispatch cycle, and the loop keeps running
    coordinator.send_message(
        Message::new("t", "echo", json!("hi"), "process")
            .with_context(MessageContext::requiring_response()),
    )?;
    probe(&coordinator, "echo").await?;
    let after_drop = probe(&coordinator, "echo").await?;
    coordinator.stop();
    loop_task.await??;

    assert_eq!(after_drop, json!("probe"));
    assert_eq!(*log.lock(), ["echo:hi", "echo:probe", "echo:probe"]);
    Ok(())
}

#[tokio::test]
async fn capability_lookup_follows_registration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let coordinator = Coordinator::new();
    coordinator.register_agent(RecorderAgent::new("echo", "echo", Arc::clone(&log)));
    coordinator.register_agent(RecorderAgent::new("echo_2", "echo", Arc::clone(&log)));

    let found = coordinator
        .find_by_capability("echo")
        .expect("capability should resolve");
    assert_eq!(found.name(), "echo");
    assert!(coordinator.find_by_capability("nonexistent").is_none());
}

#[tokio::test]
async fn stop_terminates_an_idle_loop() -> anyhow::Result<()> {
    let coordinator = Coordinator::new();
    let loop_task = spawn_loop(&coordinator);

    sleep(Duration::from_millis(20)).await;
    coordinator.stop();

    timeout(Duration::from_secs(1), loop_task)
        .await
        .expect("idle loop should stop promptly")??;
    Ok(())
}

#[tokio::test]
async fn second_start_is_rejected_while_running() -> anyhow::Result<()> {
    let coordinator = Coordinator::new();
    let loop_task = spawn_loop(&coordinator);
    sleep(Duration::from_millis(20)).await;

    let second = coordinator.start().await;
    assert!(matches!(second, Err(AgentBusError::DispatchLoopRunning)));

    coordinator.stop();
    loop_task.await??;
    Ok(())
}

#[tokio::test]
async fn loop_can_be_restarted_after_stop() -> anyhow::Result<()> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let coordinator = Coordinator::new();
    coordinator.register_agent(RecorderAgent::new("sink", "record", Arc::clone(&log)));

    let first = spawn_loop(&coordinator);
    sleep(Duration::from_millis(20)).await;
    coordinator.stop();
    first.await??;

    let second = spawn_loop(&coordinator);
    probe(&coordinator, "sink").await?;
    coordinator.stop();
    second.await??;

    assert_eq!(*log.lock(), ["sink:probe"]);
    Ok(())
}
