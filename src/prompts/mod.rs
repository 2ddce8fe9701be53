//! Prompt rendering and model-output parsing.
//!
//! [`PromptBuilder`] is the seam between the pipeline and prompt text: one
//! render function per template and one parse function per structured
//! record. [`TemplateBuilder`] is the stock implementation over the
//! prompts in [`templates`].

mod extract;
pub mod templates;

pub use extract::{extract_json, parse_structured};
pub use templates::*;

use std::fmt::Write;

use crate::error::PromptResult;
use crate::memory::MemoryMessage;
use crate::pipeline::{CausalStep, ReframedQuestion, RootCauseResult, SolutionResult};

/// Renders stage prompts and parses structured stage outputs.
pub trait PromptBuilder: Send + Sync {
    /// WHY question for `level` of the chain.
    fn build_five_why_prompt(&self, level: u8, question: &str) -> String;
    /// Evaluation of an answer.
    fn build_evaluation_prompt(&self, question: &str, answer: &str) -> String;
    /// Next, deeper WHY question from an answer.
    fn build_next_why_prompt(&self, answer: &str) -> String;
    /// Root-cause extraction over the full chain.
    fn build_root_cause_prompt(&self, steps: &[CausalStep]) -> String;
    /// Remediation plan from the root cause and step analyses.
    fn build_solution_prompt(&self, root_cause: &RootCauseResult, steps: &[CausalStep]) -> String;
    /// Reframing of the original question.
    fn build_reframe_prompt(&self, original: &str, root_cause: &RootCauseResult) -> String;

    /// Parse a root-cause record from model output.
    fn parse_root_cause(&self, raw: &str) -> PromptResult<RootCauseResult>;
    /// Parse a solution record from model output.
    fn parse_solution(&self, raw: &str) -> PromptResult<SolutionResult>;
    /// Parse a reframed question from model output.
    fn parse_reframe(&self, raw: &str) -> PromptResult<ReframedQuestion>;
}

/// [`PromptBuilder`] over the built-in templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateBuilder;

impl TemplateBuilder {
    /// Create a new template builder
    pub fn new() -> Self {
        Self
    }
}

impl PromptBuilder for TemplateBuilder {
    fn build_five_why_prompt(&self, level: u8, question: &str) -> String {
        five_why_prompt(level, question)
    }

    fn build_evaluation_prompt(&self, question: &str, answer: &str) -> String {
        evaluation_prompt(question, answer)
    }

    fn build_next_why_prompt(&self, answer: &str) -> String {
        next_why_prompt(answer)
    }

    fn build_root_cause_prompt(&self, steps: &[CausalStep]) -> String {
        let mut chain = String::new();
        for step in steps {
            let _ = write!(
                chain,
                "WHY {}:\nQ: {}\nA: {}\nANALYSIS: {}\n\n",
                step.level, step.question, step.answer, step.analysis
            );
        }
        root_cause_prompt(&chain)
    }

    fn build_solution_prompt(&self, root_cause: &RootCauseResult, steps: &[CausalStep]) -> String {
        let evidence: String = steps
            .iter()
            .map(|s| format!("- {}\n", s.analysis))
            .collect();
        solution_prompt(&root_cause.root_cause, &evidence)
    }

    fn build_reframe_prompt(&self, original: &str, root_cause: &RootCauseResult) -> String {
        reframe_prompt(original, &root_cause.root_cause)
    }

    fn parse_root_cause(&self, raw: &str) -> PromptResult<RootCauseResult> {
        parse_structured::<RootCauseResult>(raw).map(RootCauseResult::normalized)
    }

    fn parse_solution(&self, raw: &str) -> PromptResult<SolutionResult> {
        parse_structured(raw)
    }

    fn parse_reframe(&self, raw: &str) -> PromptResult<ReframedQuestion> {
        parse_structured(raw)
    }
}

/// Summarization prompt over a session transcript.
pub fn build_memory_summary_prompt(messages: &[MemoryMessage]) -> String {
    let conversation = serde_json::to_string(messages).unwrap_or_else(|_| {
        messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n")
    });
    memory_summary_prompt(&conversation)
}
