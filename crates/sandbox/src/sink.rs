use crate::error::ExecutionError;

/// Destination of `console.log` lines for one run.
pub trait OutputSink {
    /// Append one line (without terminator).
    ///
    /// # Errors
    /// Returns [`ExecutionError::OutputLimit`] when the line does not fit the budget.
    fn write_line(&mut self, line: &str) -> Result<(), ExecutionError>;
}

/// Per-run capture buffer. Every line is stored with a trailing `\n`.
#[derive(Debug)]
pub struct CaptureBuffer {
    text: String,
    limit_bytes: usize,
    echo: bool,
}

impl CaptureBuffer {
    #[must_use]
    pub fn new(limit_bytes: usize, echo: bool) -> Self {
        Self {
            text: String::new(),
            limit_bytes,
            echo,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.text
    }
}

impl OutputSink for CaptureBuffer {
    fn write_line(&mut self, line: &str) -> Result<(), ExecutionError> {
        if self.text.len() + line.len() + 1 > self.limit_bytes {
            return Err(ExecutionError::OutputLimit {
                limit_bytes: self.limit_bytes,
            });
        }
        if self.echo {
            tracing::debug!(target: "sandbox::console", "{line}");
        }
        self.text.push_str(line);
        self.text.push('\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_newline_terminated() {
        let mut buffer = CaptureBuffer::new(1024, false);
        buffer.write_line("Hello").unwrap();
        buffer.write_line("").unwrap();
        assert_eq!(buffer.as_str(), "Hello\n\n");
    }

    #[test]
    fn refuses_lines_past_the_limit() {
        let mut buffer = CaptureBuffer::new(8, false);
        buffer.write_line("1234").unwrap();
        let err = buffer.write_line("5678").unwrap_err();
        assert_eq!(err, ExecutionError::OutputLimit { limit_bytes: 8 });
        assert_eq!(buffer.into_string(), "1234\n");
    }
}
