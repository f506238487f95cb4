// Request Domain Model

use std::borrow::Cow;

/// One decoded request: a shell command line plus optional stdin payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Command text handed to the shell, delimiter excluded
    pub command: Vec<u8>,
    /// Bytes piped into the command's stdin; `None` closes stdin immediately
    pub input: Option<Vec<u8>>,
}

impl Request {
    pub fn new(command: impl Into<Vec<u8>>) -> Self {
        Self {
            command: command.into(),
            input: None,
        }
    }

    pub fn with_input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Command text for logging (invalid UTF-8 replaced)
    pub fn command_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.command)
    }

    pub fn input_len(&self) -> usize {
        self.input.as_ref().map_or(0, Vec::len)
    }
}
