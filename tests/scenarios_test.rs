//! End-to-end scenarios exercising the public API the way an application
//! would: wiring a real `Agent` with real tools against a scripted
//! `StubClient`, rather than reaching into module internals.

use agent_loom::{
    Agent, AgentConfig, Block, CompletionResponse, ModelClient, StopReason, StubClient,
    ToolParameter, ToolResult, TokenUsage, tool,
};
use std::sync::Arc;

fn text_response(text: &str) -> agent_loom::Result<CompletionResponse> {
    Ok(CompletionResponse {
        content_blocks: vec![Block::text(text)],
        stop_reason: StopReason::EndTurn,
        usage: TokenUsage { input: 10, output: 5 },
    })
}

fn tool_use_response(id: &str, name: &str, input: serde_json::Value) -> agent_loom::Result<CompletionResponse> {
    Ok(CompletionResponse {
        content_blocks: vec![Block::tool_use(id, name, input)],
        stop_reason: StopReason::ToolUse,
        usage: TokenUsage { input: 10, output: 5 },
    })
}

fn add_tool() -> Arc<dyn agent_loom::Tool> {
    Arc::new(
        tool("add", "Add two numbers")
            .param(ToolParameter::number("a", "first addend"))
            .param(ToolParameter::number("b", "second addend"))
            .handler(|input| async move {
                let a = input.get("a").and_then(serde_json::Value::as_f64).unwrap_or(0.0);
                let b = input.get("b").and_then(serde_json::Value::as_f64).unwrap_or(0.0);
                ToolResult::success((a + b).to_string())
            }),
    )
}

#[tokio::test]
async fn two_step_arithmetic_reaches_final_answer_in_two_iterations() {
    let client: Arc<dyn ModelClient> = Arc::new(StubClient::new(vec![
        tool_use_response("call_1", "add", serde_json::json!({"a": 3, "b": 4})),
        tool_use_response("call_2", "add", serde_json::json!({"a": 7, "b": 5})),
        text_response("The answer is 12"),
    ]));
    let config = AgentConfig::builder().model("test").build().unwrap();
    let mut agent = Agent::builder().client(client).config(config).tool(add_tool()).build().unwrap();

    let result = agent.run("Compute (3+4)+5").await;

    assert!(result.success);
    assert!(result.answer.unwrap().contains("12"));
    assert_eq!(result.iterations, 2);
    assert!(result.token_usage.total() > 0);
    assert_eq!(result.tool_calls.len(), 2);
}

#[tokio::test]
async fn unknown_tool_call_is_logged_as_a_failed_tool_call_and_the_loop_continues() {
    let client: Arc<dyn ModelClient> = Arc::new(StubClient::new(vec![
        tool_use_response("call_1", "nope", serde_json::json!({})),
        text_response("recovered"),
    ]));
    let config = AgentConfig::builder().model("test").build().unwrap();
    let mut agent = Agent::builder().client(client).config(config).tool(add_tool()).build().unwrap();

    let result = agent.run("try a bad tool").await;

    assert!(result.success);
    assert_eq!(result.tool_calls.len(), 1);
    assert!(result.tool_calls[0].is_error);
    assert!(result.tool_calls[0].result.contains("Unknown tool"));
}

#[tokio::test]
async fn retry_recovers_from_rate_limiting_before_the_attempt_budget_is_exhausted() {
    let client: Arc<dyn ModelClient> = Arc::new(StubClient::new(vec![
        Err(agent_loom::Error::rate_limit("slow down")),
        Err(agent_loom::Error::rate_limit("slow down again")),
        text_response("hi"),
    ]));
    let config = AgentConfig::builder().model("test").build().unwrap();
    let retry_config = agent_loom::RetryConfig::new(3, 10, 100, 2.0).unwrap();
    let mut agent = Agent::builder().client(client).config(config).retry_config(retry_config).build().unwrap();

    let result = agent.run("task").await;

    assert!(result.success);
    assert_eq!(result.answer.unwrap(), "hi");
}

struct SumAgent {
    id: String,
    from: i64,
    to: i64,
}

#[async_trait::async_trait]
impl agent_loom::CollaborativeAgent for SumAgent {
    fn id(&self) -> &str {
        &self.id
    }
    fn capabilities(&self) -> &[String] {
        &[]
    }
    async fn run(&self, _task: &str) -> agent_loom::Result<String> {
        let sum: i64 = (self.from..=self.to).sum();
        Ok(sum.to_string())
    }
}

#[tokio::test]
async fn multi_agent_parallel_execution_sums_three_independent_ranges() {
    use agent_loom::AsyncCollaborationManager;
    use std::collections::HashMap;

    let client: Arc<dyn ModelClient> = Arc::new(StubClient::new(vec![]));
    let config = AgentConfig::builder().model("test").build().unwrap();
    let mut manager = AsyncCollaborationManager::new(client, config);
    manager.register(Arc::new(SumAgent { id: "a".to_string(), from: 1, to: 10 }));
    manager.register(Arc::new(SumAgent { id: "b".to_string(), from: 11, to: 20 }));
    manager.register(Arc::new(SumAgent { id: "c".to_string(), from: 21, to: 30 }));

    let tasks: HashMap<String, String> = [
        ("a".to_string(), "sum 1..10".to_string()),
        ("b".to_string(), "sum 11..20".to_string()),
        ("c".to_string(), "sum 21..30".to_string()),
    ]
    .into_iter()
    .collect();

    let outcomes = manager.execute_parallel(tasks).await;

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes["a"].result.as_deref(), Some("55"));
    assert_eq!(outcomes["b"].result.as_deref(), Some("155"));
    assert_eq!(outcomes["c"].result.as_deref(), Some("255"));
}

#[tokio::test]
async fn checkpoint_restore_round_trip_preserves_context_fields() {
    use agent_loom::{AgentContext, Message};

    let mut ctx = AgentContext::new("original task", 10, 0);
    ctx.add_message(Message::user("original task"));

    let id = ctx.create_checkpoint(Some("before".to_string()));
    ctx.add_message(Message::assistant("mutated"));
    ctx.increment_iteration();

    ctx.restore_checkpoint(&id).unwrap();
    assert_eq!(ctx.messages().len(), 1);
    assert_eq!(ctx.iteration(), 0);
}

#[tokio::test]
async fn shared_memory_export_then_import_yields_identical_reads() {
    use agent_loom::SharedMemory;

    let original = SharedMemory::new();
    original.write("k1", serde_json::json!("v1"), "writer", None, 0).await;
    original.write("k2", serde_json::json!(42), "writer", None, 0).await;

    let exported = original.export().await;
    let restored = SharedMemory::new();
    restored.import(exported).await;

    assert_eq!(restored.read("k1", "reader", None, 1).await, Some(serde_json::json!("v1")));
    assert_eq!(restored.read("k2", "reader", None, 1).await, Some(serde_json::json!(42)));
}
