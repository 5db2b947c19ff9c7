//! Functional tests for streaming multi-agent generation.
//!
//! Several agents run concurrently against one request. These tests pin the
//! fan-in contract:
//! - Every producer event reaches the caller, tagged with its agent.
//! - One producer failing never aborts its siblings.
//! - Exactly one terminal `done` arrives, after everything else.
//! - Dropping the stream cancels every outstanding producer.

use foundry_core::{
    Agent, FoundryConfig, Mode, Orchestrator, StreamEvent, StreamRequest,
};
use foundry_test_utils::{fenced, ScriptedModel, StreamScript, TestProject};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

fn register(orch: &Orchestrator, id: &str, model: &str) {
    orch.agents()
        .add(
            Agent::new(id.to_uppercase(), format!("You are agent {id}."))
                .with_id(id)
                .with_model(model),
        )
        .unwrap();
}

async fn collect(orch: &Orchestrator, request: StreamRequest) -> Vec<StreamEvent> {
    orch.stream_generate(request).await.collect().await
}

/// Scenario: A errors immediately, B emits one preview. The caller sees B's
/// preview, an error for A, and one terminal done, whatever the arrival order.
#[tokio::test]
async fn failing_agent_does_not_abort_sibling() {
    let project = TestProject::new().with_file("calc.py", "pass\n");
    let model = Arc::new(
        ScriptedModel::new()
            .with_stream(
                "model-a",
                StreamScript::Fail(foundry_core::ModelError::Request("boom".into())),
            )
            .with_stream(
                "model-b",
                StreamScript::Delayed(
                    Duration::from_millis(5),
                    vec![fenced("def add(a, b):\n    return a + b")],
                ),
            ),
    );
    let orch = project.orchestrator(model, FoundryConfig::default());
    register(&orch, "a", "model-a");
    register(&orch, "b", "model-b");

    let events = collect(
        &orch,
        StreamRequest::new("write add")
            .with_target_file("calc.py")
            .with_agents(["a", "b"]),
    )
    .await;

    let errors: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, StreamEvent::Error { .. }))
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].agent_id(), Some("a"));

    let previews: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Preview {
                agent_id,
                filename,
                code,
                ..
            } => Some((agent_id.as_str(), filename.as_str(), code.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(
        previews,
        vec![("b", "calc.py", "def add(a, b):\n    return a + b")]
    );

    assert_eq!(events.iter().filter(|e| e.is_done()).count(), 1);
    assert!(events.last().unwrap().is_done());
    assert_eq!(project.read("calc.py").as_deref(), Some("pass\n"));
}

/// Tenet: within one agent, chunks arrive in generation order.
#[tokio::test]
async fn chunks_preserve_per_agent_order() {
    let project = TestProject::new();
    let parts: Vec<String> = (0..20).map(|i| format!("part-{i} ")).collect();
    let model = Arc::new(
        ScriptedModel::new()
            .with_stream("model-a", StreamScript::Chunks(parts.clone()))
            .with_stream(
                "model-b",
                StreamScript::Delayed(Duration::from_millis(1), parts.clone()),
            ),
    );
    let orch = project.orchestrator(model, FoundryConfig::default());
    register(&orch, "a", "model-a");
    register(&orch, "b", "model-b");

    let events = collect(&orch, StreamRequest::new("count").with_agents(["a", "b"])).await;

    for agent in ["a", "b"] {
        let seen: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Chunk {
                    agent_id, content, ..
                } if agent_id == agent => Some(content.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(seen, parts, "chunk order for agent {agent}");
    }
    assert_eq!(orch.agent_usage().get("a"), Some(&20));
}

/// Tenet: a mid-stream failure keeps the chunks already sent and adds an
/// error; no preview is produced from partial output.
#[tokio::test]
async fn mid_stream_failure_reports_error() {
    let project = TestProject::new();
    let model = Arc::new(ScriptedModel::new().with_default_stream(StreamScript::FailAfter(
        vec!["```python\nx = ".to_string()],
        foundry_core::ModelError::Stream("connection reset".into()),
    )));
    let orch = project.orchestrator(model, FoundryConfig::default());

    let events = collect(&orch, StreamRequest::new("go")).await;

    // Two active default agents.
    let errors = events
        .iter()
        .filter(|e| matches!(e, StreamEvent::Error { message, .. } if message.contains("connection reset")))
        .count();
    assert_eq!(errors, 2);
    assert!(!events.iter().any(|e| matches!(e, StreamEvent::Preview { .. })));
    assert!(events.last().unwrap().is_done());
}

/// Tenet: dropping the stream cancels every producer and releases its
/// model stream.
#[tokio::test]
async fn dropping_stream_cancels_producers() {
    let project = TestProject::new();
    let model = Arc::new(ScriptedModel::new().with_default_stream(StreamScript::Hang(vec![
        "thinking...".to_string(),
    ])));
    let orch = project.orchestrator(model.clone(), FoundryConfig::default());

    let mut stream = orch.stream_generate(StreamRequest::new("go")).await;
    // One chunk from each of the two active agents.
    for _ in 0..2 {
        let event = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("chunk arrives")
            .unwrap();
        assert!(matches!(event, StreamEvent::Chunk { .. }));
    }
    assert_eq!(model.dropped_streams(), 0);
    drop(stream);

    tokio::time::timeout(Duration::from_secs(5), async {
        while model.dropped_streams() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("both hanging producers are aborted");
}

/// Tenet: explicit cancellation drains to a single done.
#[tokio::test]
async fn cancel_ends_with_done() {
    let project = TestProject::new();
    let model = Arc::new(ScriptedModel::new().with_default_stream(StreamScript::Hang(Vec::new())));
    let orch = project.orchestrator(model, FoundryConfig::default());

    let mut stream = orch.stream_generate(StreamRequest::new("go")).await;
    stream.cancel();
    let rest: Vec<_> = tokio::time::timeout(Duration::from_secs(5), stream.collect::<Vec<_>>())
        .await
        .expect("stream ends after cancel");
    assert_eq!(rest, vec![StreamEvent::Done {}]);
}

/// Tenet: without a target file, agents receive a bounded project summary;
/// the model override applies to every agent; planning mode is announced.
#[tokio::test]
async fn project_context_model_override_and_planning() {
    let project = TestProject::new()
        .with_file("README.md", "# Demo")
        .with_file("src/main.py", "print('x')");
    let model = Arc::new(ScriptedModel::new().with_default_stream(StreamScript::chunks(&["ok"])));
    let orch = project.orchestrator(model.clone(), FoundryConfig::default());

    let events = collect(
        &orch,
        StreamRequest::new("describe")
            .with_model("override-model")
            .with_mode(Mode::Planning),
    )
    .await;
    assert!(events.last().unwrap().is_done());

    let requests = model.requests();
    assert_eq!(requests.len(), 2);
    for request in &requests {
        assert_eq!(request.model, "override-model");
        assert!(request.system.contains("PLANNING MODE"));
        assert!(request.system.contains("/tools/history"));
        let text = request.prompt_text();
        assert!(text.contains("PROJECT STRUCTURE:"));
        assert!(text.contains("src/main.py"));
        assert!(text.contains("KEY FILE README.md:\n# Demo"));
    }
}

/// Tenet: unknown agent ids are ignored; if nothing remains, the caller gets
/// an error and done.
#[tokio::test]
async fn unknown_agents_are_ignored() {
    let project = TestProject::new();
    let model = Arc::new(ScriptedModel::new().with_default_stream(StreamScript::chunks(&["hi"])));
    let orch = project.orchestrator(model, FoundryConfig::default());
    register(&orch, "a", "model-a");

    let events = collect(&orch, StreamRequest::new("go").with_agents(["ghost", "a"])).await;
    assert!(events.iter().all(|e| e.is_done() || e.agent_id() == Some("a")));

    let events = collect(&orch, StreamRequest::new("go").with_agents(["ghost"])).await;
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], StreamEvent::Error { .. }));
}

/// Tenet: every event serializes as one NDJSON line with a `type` tag.
#[tokio::test]
async fn events_serialize_as_ndjson() {
    let project = TestProject::new();
    let model = Arc::new(
        ScriptedModel::new().with_default_stream(StreamScript::Chunks(vec![fenced("y = 2")])),
    );
    let orch = project.orchestrator(model, FoundryConfig::default());

    let events = collect(&orch, StreamRequest::new("go")).await;
    let body: String = events
        .iter()
        .map(|e| e.to_ndjson_line().unwrap())
        .collect();

    let types: Vec<String> = body
        .lines()
        .map(|l| {
            let value: serde_json::Value = serde_json::from_str(l).unwrap();
            value["type"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(types.last().map(String::as_str), Some("done"));
    assert!(types.iter().any(|t| t == "preview"));
    assert!(types.iter().any(|t| t == "chunk"));
}
