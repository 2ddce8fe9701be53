//! Prompt text for each pipeline stage.

/// System prompt sent ahead of every stage prompt.
pub const SYSTEM_PROMPT: &str = r#"You are a causal reasoning assistant. Follow the output format each request asks for exactly. When a JSON object is requested, return only that object."#;

/// Asks the WHY question for one level of the chain.
pub fn five_why_prompt(level: u8, question: &str) -> String {
    format!(
        r#"You are a diagnostic assistant applying the 5-Why method.

Problem statement:
"{question}"

Ask WHY question number {level} that uncovers a deeper causal factor.

Guidelines:
- Ask exactly one question
- The question must be causal, not descriptive
- Move toward a systemic cause
- Do not propose solutions or explanations

WHY QUESTION:"#
    )
}

/// Evaluates an answer against the question that produced it.
pub fn evaluation_prompt(question: &str, answer: &str) -> String {
    format!(
        r#"You are an analytical evaluator.

Question:
"{question}"

Answer:
"{answer}"

Assess the answer for causal relevance, clarity, specificity, logical depth and systemic nature.

Guidelines:
- Do not ask new questions
- Do not propose solutions
- Do not rephrase the answer

ANALYSIS:"#
    )
}

/// Turns an answer into the next, deeper WHY question.
pub fn next_why_prompt(answer: &str) -> String {
    format!(
        r#"You are a causal reasoning engine.

Answer:
"{answer}"

Write the next WHY question that goes one level deeper in causality.

Guidelines:
- Avoid symptoms and surface-level causes
- Do not repeat the structure of the previous question

NEXT WHY:"#
    )
}

/// Extracts a structured root cause from the rendered chain.
pub fn root_cause_prompt(chain: &str) -> String {
    format!(
        r#"You are a root-cause analysis system.

5-Why chain:
{chain}

Identify the true root cause and classify it as one of: organizational, process, technical, human, structural, systemic.

Your response MUST be valid JSON in this exact format:
{{
  "root_cause": "systemic cause statement",
  "confidence": 0.8,
  "evidence": ["supporting observation"],
  "category": "technical",
  "impact_scope": "what the cause affects"
}}

Guidelines:
- The root cause must be systemic and structurally actionable
- Not a symptom, not a surface cause, not a blame statement
- confidence should be between 0.0 and 1.0

Always respond with valid JSON only, no other text."#
    )
}

/// Synthesizes a layered remediation plan.
pub fn solution_prompt(root_cause: &str, evidence: &str) -> String {
    format!(
        r#"You are a solution engineering assistant.

Root cause:
"{root_cause}"

5-Why evidence:
{evidence}

Produce a multi-layer remediation strategy.

Your response MUST be valid JSON in this exact format:
{{
  "immediate_actions": ["action"],
  "strategic_actions": ["action"],
  "preventive_actions": ["action"],
  "automation_opportunities": ["action"],
  "owner": "accountable role",
  "complexity": "low | medium | high",
  "time_horizon": "expected delivery window"
}}

Guidelines:
- Every action must map to the root cause
- Actions must be operational and implementable
- No generic advice

Always respond with valid JSON only, no other text."#
    )
}

/// Reframes the caller's question toward the root cause.
pub fn reframe_prompt(original: &str, root_cause: &str) -> String {
    format!(
        r#"You are a cognitive reframing assistant.

Original question:
"{original}"

Root cause:
"{root_cause}"

Reframe the question so it targets the real problem rather than the symptom.

Your response MUST be valid JSON in this exact format:
{{
  "original": "the original question",
  "reframed": "the reframed question",
  "intent": "what the asker is trying to achieve",
  "goal": "the outcome that resolves the root cause"
}}

Guidelines:
- The reframed question must be actionable, strategic and precise

Always respond with valid JSON only, no other text."#
    )
}

/// Compresses a session transcript into long-term memory.
pub fn memory_summary_prompt(conversation: &str) -> String {
    format!(
        r#"You are a memory compression assistant.

Conversation:
{conversation}

Summarize the conversation into long-term semantic memory.

Guidelines:
- Preserve meaning, intent and causal information
- Remove noise

MEMORY:"#
    )
}
