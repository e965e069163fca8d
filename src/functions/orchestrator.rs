//! `agent-orchestrator`
//!
//! Fans a goal out to several role-prompted agents in parallel, then asks the
//! gateway to merge their answers. Agents that fail are reported back and
//! left out of the synthesis prompt. If none succeed the call fails.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::backend::UsageRecord;
use crate::functions::auth::authenticate;
use crate::functions::{parse_body, record_usage, require_text, FunctionContext, FunctionError, FunctionResult};
use crate::providers::{ChatProvider, ChatRequest};
use crate::types::message::ChatMessage;

pub const FUNCTION_NAME: &str = "agent-orchestrator";

const SYNTHESIS_PROMPT: &str = "You merge the work of several specialist agents into one answer. \
Resolve disagreements explicitly, keep the strongest points, and answer the goal directly.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    /// Role prompt; built-in roles supply their own when omitted
    #[serde(default)]
    pub instructions: Option<String>,
}

impl AgentSpec {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            instructions: None,
        }
    }

    fn role_prompt(&self) -> String {
        if let Some(instructions) = self.instructions.as_deref().filter(|i| !i.trim().is_empty()) {
            return instructions.to_string();
        }
        match self.name.to_lowercase().as_str() {
            "researcher" => "You are a researcher. Gather the relevant facts, data points and open unknowns for the goal.".into(),
            "strategist" => "You are a strategist. Propose a concrete, prioritised plan to reach the goal.".into(),
            "critic" => "You are a critic. Point out risks, weak assumptions and what could go wrong.".into(),
            "writer" => "You are a writer. Draft clear, audience-ready copy for the goal.".into(),
            "analyst" => "You are an analyst. Quantify trade-offs and estimate impact where you can.".into(),
            other => format!("You are the {} agent. Contribute your specialty to the goal.", other),
        }
    }
}

pub fn default_agents() -> Vec<AgentSpec> {
    ["researcher", "strategist", "critic"]
        .into_iter()
        .map(AgentSpec::named)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OrchestratorAction {
    Run {
        goal: String,
        #[serde(default)]
        agents: Vec<AgentSpec>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentContribution {
    pub agent: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedAgent {
    pub agent: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorResponse {
    pub synthesis: String,
    pub contributions: Vec<AgentContribution>,
    pub failed_agents: Vec<FailedAgent>,
}

pub async fn handle(
    State(ctx): State<FunctionContext>,
    headers: HeaderMap,
    body: Result<Json<OrchestratorAction>, JsonRejection>,
) -> FunctionResult<Json<OrchestratorResponse>> {
    let user = authenticate(&ctx, &headers).await?;
    let OrchestratorAction::Run { goal, agents } = parse_body(body)?;

    require_text("goal", &goal)?;
    let agents = if agents.is_empty() { default_agents() } else { agents };
    let max = ctx.settings.orchestrator_max_agents;
    if agents.len() > max {
        return Err(FunctionError::BadRequest(format!(
            "At most {} agents per run, got {}",
            max,
            agents.len()
        )));
    }
    if agents.iter().any(|a| a.name.trim().is_empty()) {
        return Err(FunctionError::BadRequest("Agent names must not be empty".into()));
    }

    tracing::info!(function = FUNCTION_NAME, action = "run", user_id = %user.id, agents = agents.len(), "Handling request");

    let response = run(ctx.chat.as_ref(), &goal, &agents).await?;

    record_usage(
        &ctx,
        UsageRecord::new(user.id, FUNCTION_NAME, "run").with_metadata(json!({
            "agents": agents.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
            "failed": response.failed_agents.len(),
        })),
    )
    .await;

    Ok(Json(response))
}

/// Fan out, collect, synthesise
pub async fn run(
    chat: &dyn ChatProvider,
    goal: &str,
    agents: &[AgentSpec],
) -> FunctionResult<OrchestratorResponse> {
    let calls = agents.iter().map(|agent| async move {
        let request = ChatRequest::new(vec![
            ChatMessage::system(agent.role_prompt()),
            ChatMessage::user(goal),
        ]);
        (agent, chat.complete(request).await)
    });

    let mut contributions = Vec::new();
    let mut failed_agents = Vec::new();
    for (agent, result) in join_all(calls).await {
        match result {
            Ok(completion) => contributions.push(AgentContribution {
                agent: agent.name.clone(),
                content: completion.content,
            }),
            Err(e) => {
                tracing::warn!(agent = %agent.name, "Agent failed: {}", e);
                failed_agents.push(FailedAgent {
                    agent: agent.name.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    if contributions.is_empty() {
        return Err(FunctionError::AllAgentsFailed(agents.len()));
    }

    let synthesis = chat
        .complete(ChatRequest::new(vec![
            ChatMessage::system(SYNTHESIS_PROMPT),
            ChatMessage::user(synthesis_prompt(goal, &contributions)),
        ]))
        .await?;

    Ok(OrchestratorResponse {
        synthesis: synthesis.content,
        contributions,
        failed_agents,
    })
}

fn synthesis_prompt(goal: &str, contributions: &[AgentContribution]) -> String {
    let mut prompt = format!("## Goal\n{}\n", goal.trim());
    for contribution in contributions {
        prompt.push_str(&format!(
            "\n## {}\n{}\n",
            contribution.agent,
            contribution.content.trim()
        ));
    }
    prompt
}
