//! System prompt loader.
//!
//! Prompts live as Markdown files in the `prompts/` directory at the
//! project root. Call sites keep an inline fallback so a missing file
//! never breaks generation.

use std::path::PathBuf;

use crate::{Error, Result};

/// Available prompts.
#[derive(Debug, Clone, Copy)]
pub enum Prompt {
    /// System prompt for hook generation.
    HookSystem,
    /// Instruction scaffold for quiz generation.
    QuizInstructions,
}

impl Prompt {
    /// Prompt file name (Markdown).
    pub fn filename(&self) -> &'static str {
        match self {
            Prompt::HookSystem => "hook_system.md",
            Prompt::QuizInstructions => "quiz_instructions.md",
        }
    }

    /// Load the prompt from its file.
    pub fn load(&self) -> Result<String> {
        load_prompt(self.filename())
    }
}

/// Load a prompt by file name.
pub fn load_prompt(filename: &str) -> Result<String> {
    let path = prompts_dir().join(filename);
    std::fs::read_to_string(&path)
        .map_err(|e| Error::InvalidArgument(format!("failed to load prompt {}: {}", filename, e)))
}

/// Path to the prompts directory.
pub fn prompts_dir() -> PathBuf {
    let candidates = [
        PathBuf::from("prompts"),
        PathBuf::from("../prompts"),
        PathBuf::from("../../prompts"),
    ];

    for path in candidates {
        if path.exists() {
            return path;
        }
    }

    PathBuf::from("prompts")
}
