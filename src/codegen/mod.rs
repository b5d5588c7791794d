use crate::ast::Program;
use crate::target::Target;
use crate::types::StructRegistry;
use std::collections::HashMap;
use thiserror::Error;

pub mod aarch64;
pub mod arm32;
pub mod assembly;
pub mod x86_64;

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("{construct} is not supported by the {target} backend yet")]
    Unsupported {
        target: &'static str,
        construct: String,
    },
}

/// Lower the checked program to assembly text for the requested target.
pub fn generate(
    program: &Program,
    registry: &StructRegistry,
    target: Target,
) -> Result<String, CodegenError> {
    match target {
        Target::X86_64 => x86_64::generate(program, registry),
        Target::Aarch64 => aarch64::generate(program),
        Target::Arm32 => arm32::generate(program),
    }
}

/// The interned literal pool: one `str_N` label per distinct content, in
/// first-reference order. Labels are handed out lazily.
#[derive(Debug, Default)]
pub struct LiteralPool {
    labels: HashMap<String, usize>,
    order: Vec<String>,
}

impl LiteralPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, content: &str) -> String {
        if let Some(&index) = self.labels.get(content) {
            return Self::label(index);
        }
        let index = self.order.len();
        self.labels.insert(content.to_string(), index);
        self.order.push(content.to_string());
        Self::label(index)
    }

    fn label(index: usize) -> String {
        format!("str_{}", index)
    }

    /// `(label, content)` pairs in emission order.
    pub fn entries(&self) -> impl Iterator<Item = (String, &str)> {
        self.order
            .iter()
            .enumerate()
            .map(|(index, content)| (Self::label(index), content.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_deduplicates_contents() {
        let mut pool = LiteralPool::new();
        let a = pool.intern("foo");
        let b = pool.intern("bar");
        let c = pool.intern("foo");
        assert_eq!(a, "str_0");
        assert_eq!(b, "str_1");
        assert_eq!(a, c);
        assert_eq!(pool.entries().count(), 2);
    }
}
