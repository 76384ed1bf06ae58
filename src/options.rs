// ABOUTME: CompileOptions carrier and the .options datum-level form (spec §6, §10)

/// Boolean toggles that affect the decorator and checker. Mirrors the
/// teacher's `config.rs` convention: a plain `Default`-deriving struct of
/// flags and constants rather than a builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    pub checked: bool,
    pub debug: bool,
    pub optimize: bool,
    pub allow_redefinition: bool,
    pub optimistic_inlining: bool,
    pub promote_on_overflow: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            checked: true,
            debug: false,
            optimize: false,
            allow_redefinition: true,
            optimistic_inlining: false,
            promote_on_overflow: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_allow_redefinition() {
        let options = CompileOptions::default();
        assert!(options.allow_redefinition);
        assert!(options.checked);
    }
}
