use super::{emitter::Emitter, operand::Label};

#[derive(Debug, Clone, PartialEq)]
enum Literal {
    String(String),
    Double(String),
}

/// String and double constants referenced by the current function. They are
/// written out in `.data` once the function's code is complete.
#[derive(Debug, Default)]
pub struct LiteralPool {
    entries: Vec<(Label, Literal)>,
}

impl LiteralPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_string(&mut self, label: Label, value: &str) {
        self.entries.push((label, Literal::String(value.to_string())));
    }

    pub fn add_double(&mut self, label: Label, text: &str) {
        self.entries.push((label, Literal::Double(text.to_string())));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn flush(self, out: &mut Emitter) {
        if self.is_empty() {
            return;
        }

        out.section(".data");
        for (label, literal) in self.entries {
            match literal {
                Literal::String(value) => {
                    out.section(&format!("{}:\t.asciz\t\"{}\"", label, escape(&value)))
                }
                Literal::Double(text) => out.section(&format!("{}:\t.double\t{}", label, text)),
            }
        }
        out.blank();
    }
}

/// Quote a string for `.asciz`.
pub fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'"' => escaped.push_str("\\\""),
            b'\\' => escaped.push_str("\\\\"),
            b'\n' => escaped.push_str("\\n"),
            b'\t' => escaped.push_str("\\t"),
            b'\r' => escaped.push_str("\\r"),
            0x20..=0x7e => escaped.push(byte as char),
            _ => escaped.push_str(&format!("\\{:03o}", byte)),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::operand::LabelAllocator;

    #[test]
    fn test_escape() {
        assert_eq!(escape("a\"b\\c\n"), "a\\\"b\\\\c\\n");
        assert_eq!(escape("\0"), "\\000");
        assert_eq!(escape("\u{7f}"), "\\177");
    }

    #[test]
    fn test_flush_in_insertion_order() {
        let mut labels = LabelAllocator::default();
        let mut pool = LiteralPool::new();
        pool.add_string(labels.next(), "hi\n");
        pool.add_double(labels.next(), "2.5");
        assert!(!pool.is_empty());

        let mut out = Emitter::new();
        pool.flush(&mut out);
        assert_eq!(
            out.into_string(),
            ".data\n.L0:\t.asciz\t\"hi\\n\"\n.L1:\t.double\t2.5\n\n"
        );
    }

    #[test]
    fn test_empty_pool_writes_nothing() {
        let mut out = Emitter::new();
        LiteralPool::new().flush(&mut out);
        assert!(out.into_string().is_empty());
    }
}
