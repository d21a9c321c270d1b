//! Interactive chat loop example
//!
//! This example builds a two-node graph: a research step that accumulates
//! findings, and a chat step that suspends for user input and routes on the
//! classified intent. The "user" here is scripted, but the resume calls are
//! exactly what a real frontend would issue.

use flowgraph_core::{
    field_key, intent_router, Engine, GraphBuilder, NodeContext, NodeFuture, RunInput, RunResult,
    Snapshot, StateSchema, Update, END,
};
use flowgraph_checkpoint::InMemoryStore;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

fn research(_snapshot: Snapshot, _ctx: NodeContext) -> NodeFuture {
    Box::pin(async move {
        Ok(Update::from([(
            "findings".to_string(),
            json!([{"title": "Cut cloud spend"}, {"title": "Consolidate vendors"}]),
        )]))
    })
}

fn chat(snapshot: Snapshot, ctx: NodeContext) -> NodeFuture {
    Box::pin(async move {
        let count = snapshot
            .get("findings")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);
        let reply = ctx.interrupt(json!({"ask": format!("{count} findings. What next?")}))?;

        let message = reply.as_str().unwrap_or("");
        let intent = if message.contains("bye") { "end" } else { "continue" };
        Ok(Update::from([("intent".to_string(), json!(intent))]))
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let graph = GraphBuilder::new(
        StateSchema::new()
            .accumulating("findings", field_key("title"))
            .scalar("intent"),
    )
    .add_node("research", research)
    .add_node("chat", chat)
    .add_edge("research", "chat")
    .add_conditional_edge(
        "chat",
        intent_router("intent"),
        HashMap::from([
            ("continue".to_string(), "chat".to_string()),
            ("end".to_string(), END.to_string()),
        ]),
    )
    .set_entry("research")
    .build()?;

    let engine = Engine::new(graph, Arc::new(InMemoryStore::new()));

    let mut result = engine
        .start_or_resume("demo", RunInput::Input(Update::new()))
        .await?;

    for message in ["tell me more", "bye"] {
        result = match result {
            RunResult::Interrupted(payload) => {
                println!("engine asks: {payload}");
                println!("user says:   {message}");
                engine
                    .start_or_resume("demo", RunInput::Resume(json!(message)))
                    .await?
            }
            other => {
                println!("unexpected outcome: {other:?}");
                return Ok(());
            }
        };
    }

    if let RunResult::Completed(snapshot) = result {
        println!("conversation finished with state: {}", json!(snapshot));
    }
    Ok(())
}
