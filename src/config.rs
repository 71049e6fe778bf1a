//! Compiler configuration.
//!
//! Mirrors the external-extensibility shape of a builder-pattern config
//! struct, scoped down to what this compiler actually varies: which `cc`
//! to shell out to for preprocessing/assembling/linking, whether to keep
//! the intermediate `.i`/`.s` files around, and any extra flags to forward.

use std::env;
use std::path::PathBuf;

/// Configuration for a single compilation run.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// The C compiler driver used for preprocessing and for assembling +
    /// linking the final emitted assembly. Defaults to the `CC` environment
    /// variable if set, otherwise `"cc"`, resolved through `PATH` the way a
    /// shell invocation would.
    pub cc_path: PathBuf,

    /// Keep the preprocessed `.i` file and emitted `.s` file next to the
    /// output instead of deleting them once the pipeline finishes.
    pub keep_intermediate: bool,

    /// Extra arguments forwarded verbatim to every `cc` invocation (both
    /// the preprocess step and the assemble/link step).
    pub extra_cc_args: Vec<String>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        let cc_path = env::var("CC").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("cc"));
        CompilerConfig { cc_path, keep_intermediate: false, extra_cc_args: Vec::new() }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        CompilerConfig::default()
    }

    /// Use a specific `cc`-compatible driver instead of the `PATH`-resolved
    /// default.
    pub fn with_cc_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cc_path = path.into();
        self
    }

    pub fn with_keep_intermediate(mut self, keep: bool) -> Self {
        self.keep_intermediate = keep;
        self
    }

    pub fn with_extra_cc_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_cc_args.push(arg.into());
        self
    }

    pub fn with_extra_cc_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.extra_cc_args.extend(args);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uses_cc_on_path_when_cc_env_unset() {
        unsafe {
            env::remove_var("CC");
        }
        let config = CompilerConfig::default();
        assert_eq!(config.cc_path, PathBuf::from("cc"));
        assert!(!config.keep_intermediate);
    }

    #[test]
    fn default_respects_cc_env_var() {
        unsafe {
            env::set_var("CC", "/usr/bin/clang");
        }
        let config = CompilerConfig::default();
        assert_eq!(config.cc_path, PathBuf::from("/usr/bin/clang"));
        unsafe {
            env::remove_var("CC");
        }
    }

    #[test]
    fn builder_accumulates_extra_args() {
        let config = CompilerConfig::new().with_extra_cc_arg("-m64").with_extra_cc_arg("-static");
        assert_eq!(config.extra_cc_args, vec!["-m64", "-static"]);
    }

    #[test]
    fn with_cc_path_overrides_default() {
        let config = CompilerConfig::new().with_cc_path("/usr/bin/gcc-13");
        assert_eq!(config.cc_path, PathBuf::from("/usr/bin/gcc-13"));
    }
}
