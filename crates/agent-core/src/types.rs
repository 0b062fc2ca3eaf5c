//! Core data types for the agent loop.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable description of one agent task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique id for this run.
    pub id: String,
    /// Natural-language instruction.
    pub instruction: String,
    /// Optional free-form context appended to every prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplementary: Option<String>,
}

impl Task {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            instruction: instruction.into(),
            supplementary: None,
        }
    }

    pub fn with_supplementary(mut self, info: impl Into<String>) -> Self {
        self.supplementary = Some(info.into());
        self
    }
}

/// Closed set of operations the LLM may request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Go directly to a URL.
    Navigate,
    /// Click an indexed element.
    Click,
    /// Type into an indexed input, optionally submitting.
    TypeText,
    /// Choose an option from an indexed dropdown.
    Select,
    /// Scroll the page.
    Scroll,
    /// Wait for a fixed duration.
    Wait,
    /// Run a web search for a query.
    Search,
    /// Extract the readable text of the current page.
    ExtractContent,
    /// Signal task completion.
    Done,
    /// Anything the model invented that we do not recognize. Executing it
    /// yields an error observation rather than a crash.
    #[serde(other)]
    Unknown,
}

/// Scroll direction for scroll actions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
}

/// Kind-specific action parameters, flattened into the action JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionParams {
    /// URL for `navigate`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Text for `type_text`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Whether to press Enter after `type_text`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit: Option<bool>,

    /// Option value for `select`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Direction for `scroll`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<ScrollDirection>,

    /// Scroll amount in pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i32>,

    /// Wait duration in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ms: Option<u64>,

    /// Query string for `search`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    /// `done`: whether the task succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,

    /// `done`: the final answer or completion message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One structured operation decision emitted by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentAction {
    #[serde(rename = "action")]
    pub kind: ActionKind,

    /// Element index for element-targeting actions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_index: Option<u32>,

    #[serde(flatten)]
    pub params: ActionParams,
}

impl AgentAction {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            element_index: None,
            params: ActionParams::default(),
        }
    }

    pub fn navigate(url: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::Navigate,
            element_index: None,
            params: ActionParams {
                url: Some(url.into()),
                ..Default::default()
            },
        }
    }

    pub fn search(query: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::Search,
            element_index: None,
            params: ActionParams {
                query: Some(query.into()),
                ..Default::default()
            },
        }
    }

    pub fn extract_content() -> Self {
        Self::new(ActionKind::ExtractContent)
    }

    pub fn done(success: bool, message: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::Done,
            element_index: None,
            params: ActionParams {
                success: Some(success),
                message: Some(message.into()),
                ..Default::default()
            },
        }
    }
}

/// Result of executing exactly one action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Observation {
    /// Whether the action executed without error.
    pub success: bool,

    /// Extracted text or completion message, when the action produced any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Page URL after the action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Page title after the action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Error description when the action failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Base64 screenshot captured after the action (vision mode only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_base64: Option<String>,
}

impl Observation {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_page(mut self, url: impl Into<String>, title: Option<String>) -> Self {
        self.url = Some(url.into());
        self.title = title;
        self
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Observation recorded for a `done` action. `success` carries the
    /// task-level verdict reported by the model.
    pub fn finished(success: bool, message: impl Into<String>) -> Self {
        Self {
            success,
            content: Some(message.into()),
            ..Default::default()
        }
    }
}

/// LLM output for a single loop iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutput {
    /// Reasoning trace about the current state.
    #[serde(default)]
    pub thinking: String,

    /// Assessment of whether the previous step achieved its goal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation_previous_goal: Option<String>,

    /// Facts the model wants carried forward.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,

    /// Immediate objective for this step.
    #[serde(default)]
    pub next_goal: String,

    /// Actions to execute, in order.
    #[serde(default)]
    pub actions: Vec<AgentAction>,
}

impl AgentOutput {
    /// Build an output holding a single action, used by mocks and tests.
    pub fn single(thinking: impl Into<String>, action: AgentAction) -> Self {
        Self {
            thinking: thinking.into(),
            evaluation_previous_goal: None,
            memory: None,
            next_goal: String::new(),
            actions: vec![action],
        }
    }

    /// Build a done output.
    pub fn done(success: bool, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::single(
            format!("Task finished: {message}"),
            AgentAction::done(success, message),
        )
    }

    pub fn is_done(&self) -> bool {
        self.actions.iter().any(|a| a.kind == ActionKind::Done)
    }
}

/// One entry of the append-only run history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step number, 1-indexed.
    pub step_number: u32,

    /// Brief page summary at the time the step was planned.
    pub state_summary: String,

    /// LLM reasoning trace for this step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,

    /// LLM's stated objective for this step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_goal: Option<String>,

    /// LLM's evaluation of the previous step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<String>,

    /// LLM memory notes carried forward.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,

    /// Actions taken this step, in execution order.
    pub actions: Vec<AgentAction>,

    /// One observation per executed action, same order.
    pub observations: Vec<Observation>,

    /// Step-level error, if the step failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepRecord {
    /// Build a record from an LLM output and the executed observations.
    pub fn from_output(
        step_number: u32,
        state_summary: impl Into<String>,
        output: &AgentOutput,
        actions: Vec<AgentAction>,
        observations: Vec<Observation>,
        error: Option<String>,
    ) -> Self {
        Self {
            step_number,
            state_summary: state_summary.into(),
            thought: Some(output.thinking.clone()),
            next_goal: Some(output.next_goal.clone()),
            evaluation: output.evaluation_previous_goal.clone(),
            memory: output.memory.clone(),
            actions,
            observations,
            error,
        }
    }

    /// Record for a step that failed before any action ran.
    pub fn from_error(step_number: u32, error: impl Into<String>) -> Self {
        Self {
            step_number,
            state_summary: "error".to_string(),
            thought: None,
            next_goal: None,
            evaluation: None,
            memory: None,
            actions: Vec::new(),
            observations: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Comma-separated action kinds, used in history prompts and logs.
    pub fn actions_summary(&self) -> String {
        self.actions
            .iter()
            .map(|a| format!("{:?}", a.kind))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
