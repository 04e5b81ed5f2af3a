use rustc_hash::FxHashSet;

use crate::error::{KernelSelectorError, Result};

/// Accumulates the header text of one kernel specialisation.
///
/// Macro names (the part before any `(`) may only be defined once.
#[derive(Debug, Default)]
pub struct CodeBuilder {
    text: String,
    defined: FxHashSet<String>,
}

impl CodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_line(&mut self, line: &str) -> &mut Self {
        self.text.push_str(line);
        self.text.push('\n');
        self
    }

    fn register(&mut self, name: &str) -> Result<()> {
        let bare = name.split('(').next().unwrap_or(name);
        if !self.defined.insert(bare.to_string()) {
            return Err(KernelSelectorError::DuplicateJitDefinition { name: bare.to_string() });
        }
        Ok(())
    }

    /// `#define NAME(name) <prefix> _##name##_<postfix>`
    pub fn decoration_macro(&mut self, name: &str, prefix: &str, postfix: &str) -> Result<&mut Self> {
        self.register(name)?;
        let joiner = if postfix.is_empty() { "" } else { "##_" };
        self.text
            .push_str(&format!("#define {name}(name) {prefix} _##name{joiner}{postfix}\n"));
        Ok(self)
    }

    pub fn value_macro(&mut self, name: &str, value: &str) -> Result<&mut Self> {
        self.register(name)?;
        self.text.push_str(&format!("#define {name} {value}\n"));
        Ok(self)
    }

    pub fn build(self) -> String {
        let mut text = self.text;
        text.push('\n');
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoration_macros_splice_the_kernel_id() {
        let mut code = CodeBuilder::new();
        code.value_macro("KERNEL(name)", "__kernel void conv1_3").unwrap();
        code.decoration_macro("FUNC", "", "conv1_3").unwrap();
        let text = code.build();
        assert!(text.contains("#define KERNEL(name) __kernel void conv1_3\n"));
        assert!(text.contains("#define FUNC(name)  _##name##_conv1_3\n"));
    }

    #[test]
    fn duplicate_macro_names_are_rejected() {
        let mut code = CodeBuilder::new();
        code.value_macro("LWS", "16").unwrap();
        match code.value_macro("LWS(x)", "x") {
            Err(KernelSelectorError::DuplicateJitDefinition { name }) => assert_eq!(name, "LWS"),
            other => panic!("expected duplicate definition error, got {other:?}"),
        }
    }
}
