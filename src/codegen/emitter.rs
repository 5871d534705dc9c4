use log::trace;
use std::fmt::Display;

/// Text sink for AT&T-syntax assembly.
#[derive(Debug, Default)]
pub struct Emitter {
    output: String,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn op0(&mut self, opcode: &str) {
        self.push(format!("\t{}", opcode));
    }

    pub fn op1(&mut self, opcode: &str, operand: impl Display) {
        self.push(format!("\t{}\t{}", opcode, operand));
    }

    pub fn op2(&mut self, opcode: &str, source: impl Display, destination: impl Display) {
        self.push(format!("\t{}\t{}, {}", opcode, source, destination));
    }

    pub fn label(&mut self, label: impl Display) {
        self.push(format!("{}:", label));
    }

    /// An indented directive such as `.globl`.
    pub fn directive(&mut self, directive: &str, arguments: impl Display) {
        self.push(format!("\t{}\t{}", directive, arguments));
    }

    /// A section switch or other text that starts in the first column.
    pub fn section(&mut self, name: &str) {
        self.push(name.to_string());
    }

    pub fn blank(&mut self) {
        self.output.push('\n');
    }

    fn push(&mut self, line: String) {
        trace!("{}", line.trim_start());
        self.output.push_str(&line);
        self.output.push('\n');
    }

    pub fn into_string(self) -> String {
        self.output
    }
}
