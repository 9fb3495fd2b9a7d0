//! Kernel runtimes the proxy path can generate code for - Python or Deno

/// Language of the execution session a request is proxied through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Runtime {
    #[default]
    Python,
    Deno,
}

impl std::fmt::Display for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Runtime::Python => write!(f, "python"),
            Runtime::Deno => write!(f, "deno"),
        }
    }
}

/// Parses the `language_info.name` a kernel reports in its
/// `kernel_info_reply` (`python`, `typescript`, ...), case-insensitively.
impl std::str::FromStr for Runtime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "python" | "py" | "python3" => Ok(Runtime::Python),
            "deno" | "typescript" | "ts" => Ok(Runtime::Deno),
            _ => Err(format!("Unknown runtime: {}", s)),
        }
    }
}
