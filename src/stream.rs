//! Indentation-aware line writer for kernel source.

use std::fmt;

const TAB: &str = "    ";

/// Accumulates kernel source one line at a time.
#[derive(Clone, Debug, Default)]
pub struct KernelStream {
    out: String,
    indent_level: usize,
}

impl KernelStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one indented line.
    pub fn line(&mut self, text: impl AsRef<str>) {
        for _ in 0..self.indent_level {
            self.out.push_str(TAB);
        }
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    pub fn inc_tab(&mut self) {
        self.indent_level += 1;
    }

    pub fn dec_tab(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    /// `{` then indent.
    pub fn open_block(&mut self) {
        self.line("{");
        self.inc_tab();
    }

    /// Dedent then `}`.
    pub fn close_block(&mut self) {
        self.dec_tab();
        self.line("}");
    }

    pub fn as_str(&self) -> &str {
        &self.out
    }

    pub fn into_string(self) -> String {
        self.out
    }
}

impl fmt::Display for KernelStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.out)
    }
}
