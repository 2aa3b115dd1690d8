use serde::{Deserialize, Serialize};

/// Block identifier, unique within one session timeline.
pub type BlockId = u64;

/// Milliseconds since the Unix epoch.
pub type Millis = u64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlockSource {
    #[default]
    User,
    AiSuggested,
    AiExecuted,
}

/// Label of a contiguous run of lines inside a block's output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    Thinking,
    Command,
    #[default]
    Output,
    Response,
}

impl SectionType {
    /// Output sections start folded; everything else starts open.
    pub fn collapsed_by_default(self) -> bool {
        matches!(self, SectionType::Output)
    }

    pub fn label(self) -> &'static str {
        match self {
            SectionType::Thinking => "thinking",
            SectionType::Command => "command",
            SectionType::Output => "output",
            SectionType::Response => "response",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TerminalEvent {
    UserSubmittedCommand {
        text: String,
        #[serde(default)]
        source: BlockSource,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context_block_ids: Option<Vec<BlockId>>,
    },
    BlockCreated {
        block_id: BlockId,
        command_text: String,
        #[serde(default)]
        source: BlockSource,
    },
    BlockStarted {
        block_id: BlockId,
        started_at: Millis,
    },
    BlockOutputChunk {
        block_id: BlockId,
        payload: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        section_type: Option<SectionType>,
    },
    BlockEnded {
        block_id: BlockId,
        exit_code: i32,
        ended_at: Millis,
    },
    BlockCancelled {
        block_id: BlockId,
        reason: String,
        ended_at: Millis,
    },
    UserScrolled,
    UserSelectedBlock {
        block_id: Option<BlockId>,
    },
    UserToggledFollowMode {
        on: bool,
    },
    UserToggledSearch {
        open: bool,
    },
    AiThinkingStarted {
        query_id: String,
    },
    AiThinkingEnded,
    AiErrorOccurred {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        query_id: Option<String>,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        suggestion: Option<String>,
    },
}

impl TerminalEvent {
    /// The block an event targets, if it is a block lifecycle or output event.
    pub fn block_id(&self) -> Option<BlockId> {
        match self {
            TerminalEvent::BlockCreated { block_id, .. }
            | TerminalEvent::BlockStarted { block_id, .. }
            | TerminalEvent::BlockOutputChunk { block_id, .. }
            | TerminalEvent::BlockEnded { block_id, .. }
            | TerminalEvent::BlockCancelled { block_id, .. } => Some(*block_id),
            TerminalEvent::UserSelectedBlock { block_id } => *block_id,
            _ => None,
        }
    }
}
