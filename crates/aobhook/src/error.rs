//! Call-site tagged, causally chained diagnostics.
//!
//! Every failure raised by this crate is a [`Diagnostic`] node. When a lower
//! layer fails, the layer above wraps it with [`ResultExt::chain_err`], so a
//! single rendered report walks from "failed to hook function" down to
//! "section not found in module".

use std::fmt;

use strum::{Display, IntoStaticStr};
use thiserror::Error;

/// Separator written between nodes by [`Diagnostic::render`].
pub const CAUSED_BY: &str = "--- Caused by ---";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum ErrorKind {
    /// No loaded image matches the requested module name.
    ModuleNotFound,
    /// The module's section table has no entry with the requested name.
    SectionNotFound,
    /// No region of the section contains the pattern.
    PatternNotFound,
    /// A RIP-relative base could not be derived from a pattern match.
    BaseNotFound,
    HookTargetNotFound,
    PatchTargetNotFound,
    HookInstallFailed,
    PatchInstallFailed,
    SubsystemInitFailed,
    SubsystemApplyFailed,
    /// A pattern or replacement byte string failed to parse.
    InvalidPattern,
    /// A read outside any mapped image.
    MemoryAccess,
    /// File I/O or (de)serialization failure.
    Io,
}

/// Where a diagnostic was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    pub function: &'static str,
    pub file: &'static str,
    pub line: u32,
}

impl CallSite {
    pub const fn new(function: &'static str, file: &'static str, line: u32) -> Self {
        Self {
            function,
            file,
            line,
        }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\n  in function {}\n  at {}:{}",
            self.function, self.file, self.line
        )
    }
}

/// Reduces the type name of the marker fn emitted by [`diag!`] to the short
/// name of the function that encloses it.
pub fn short_fn_name(full: &'static str) -> &'static str {
    let mut name = full.strip_suffix("::__here").unwrap_or(full);
    while let Some(outer) = name.strip_suffix("::{{closure}}") {
        name = outer;
    }
    name.rsplit("::").next().unwrap_or(name)
}

/// Builds a [`Diagnostic`] tagged with the enclosing function, file and line.
///
/// ```
/// use aobhook::{diag, ErrorKind};
///
/// let err = diag!(PatternNotFound, "Failed to locate pattern: {}", "48 8B ??");
/// assert_eq!(err.kind(), ErrorKind::PatternNotFound);
/// ```
#[macro_export]
macro_rules! diag {
    ($kind:ident, $($arg:tt)+) => {{
        fn __here() {}
        $crate::error::Diagnostic::new(
            $crate::error::ErrorKind::$kind,
            $crate::error::CallSite::new(
                $crate::error::short_fn_name(::std::any::type_name_of_val(&__here)),
                file!(),
                line!(),
            ),
            format!($($arg)+),
        )
    }};
}

/// A single failure report, optionally caused by another.
#[derive(Debug, Error)]
#[error("{message}{site}")]
pub struct Diagnostic {
    kind: ErrorKind,
    message: String,
    site: CallSite,
    #[source]
    cause: Option<Box<Diagnostic>>,
}

pub type Result<T> = std::result::Result<T, Diagnostic>;

impl Diagnostic {
    pub fn new(kind: ErrorKind, site: CallSite, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            site,
            cause: None,
        }
    }

    /// Links `cause` as the failure this node was raised while handling.
    pub fn with_cause(mut self, cause: Diagnostic) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn site(&self) -> &CallSite {
        &self.site
    }

    pub fn cause(&self) -> Option<&Diagnostic> {
        self.cause.as_deref()
    }

    /// Iterates the chain from this node down to the innermost cause.
    pub fn chain(&self) -> Chain<'_> {
        Chain { next: Some(self) }
    }

    pub fn root_cause(&self) -> &Diagnostic {
        self.chain().last().unwrap_or(self)
    }

    /// True if any node in the chain has the given kind.
    pub fn has_kind(&self, kind: ErrorKind) -> bool {
        self.chain().any(|node| node.kind == kind)
    }

    /// Renders the whole chain, outermost failure first.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (level, node) in self.chain().enumerate() {
            if level > 0 {
                out.push_str("\n\n");
                out.push_str(CAUSED_BY);
                out.push('\n');
            }
            out.push_str(&node.to_string());
        }
        out
    }
}

impl Drop for Diagnostic {
    fn drop(&mut self) {
        // Unlink iteratively so a long chain is not dropped recursively.
        let mut next = self.cause.take();
        while let Some(mut node) = next {
            next = node.cause.take();
        }
    }
}

/// Iterator over a diagnostic chain.
pub struct Chain<'a> {
    next: Option<&'a Diagnostic>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a Diagnostic;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = node.cause();
        Some(node)
    }
}

pub trait ResultExt<T> {
    /// Wraps an in-flight failure as the cause of the diagnostic built by `outer`.
    fn chain_err<F>(self, outer: F) -> Result<T>
    where
        F: FnOnce() -> Diagnostic;
}

impl<T> ResultExt<T> for Result<T> {
    fn chain_err<F>(self, outer: F) -> Result<T>
    where
        F: FnOnce() -> Diagnostic,
    {
        self.map_err(|cause| outer().with_cause(cause))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    fn locate() -> Result<u64> {
        Err(diag!(SectionNotFound, "Section {} not found", ".text"))
    }

    fn scan() -> Result<u64> {
        locate().chain_err(|| diag!(PatternNotFound, "Failed to locate pattern"))
    }

    fn hook() -> Result<u64> {
        scan().chain_err(|| diag!(HookTargetNotFound, "Failed to locate function to hook"))
    }

    #[test]
    fn test_diag_captures_call_site() {
        let err = locate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SectionNotFound);
        assert_eq!(err.site().function, "locate");
        assert!(err.site().file.ends_with("error.rs"));
        assert!(err.site().line > 0);
        assert_eq!(err.message(), "Section .text not found");
    }

    #[test]
    fn test_closure_call_site_uses_enclosing_function() {
        let err = scan().unwrap_err();
        assert_eq!(err.site().function, "scan");
    }

    #[test]
    fn test_short_fn_name() {
        assert_eq!(short_fn_name("aobhook::scan::Scanner<L>::find::__here"), "find");
        assert_eq!(
            short_fn_name("aobhook::a::b::{{closure}}::{{closure}}::__here"),
            "b"
        );
        assert_eq!(short_fn_name("plain"), "plain");
    }

    #[test]
    fn test_display_shows_single_node() {
        let err = hook().unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("Failed to locate function to hook"));
        assert!(text.contains("in function hook"));
        assert!(!text.contains("Failed to locate pattern"));
    }

    #[test]
    fn test_render_three_causes_in_order() {
        let root = diag!(SectionNotFound, "innermost");
        let middle = diag!(PatternNotFound, "middle").with_cause(root);
        let upper = diag!(BaseNotFound, "upper").with_cause(middle);
        let outer = diag!(HookTargetNotFound, "outer").with_cause(upper);

        let rendered = outer.render();
        assert_eq!(rendered.matches(CAUSED_BY).count(), 3);

        let positions: Vec<usize> = ["outer", "upper", "middle", "innermost"]
            .iter()
            .map(|m| rendered.find(m).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_render_single_node_has_no_separator() {
        let err = diag!(PatternNotFound, "alone");
        assert!(!err.render().contains(CAUSED_BY));
    }

    #[test]
    fn test_chain_and_root_cause() {
        let err = hook().unwrap_err();
        let kinds: Vec<ErrorKind> = err.chain().map(Diagnostic::kind).collect();
        assert_eq!(
            kinds,
            vec![
                ErrorKind::HookTargetNotFound,
                ErrorKind::PatternNotFound,
                ErrorKind::SectionNotFound,
            ]
        );
        assert_eq!(err.root_cause().kind(), ErrorKind::SectionNotFound);
        assert!(err.has_kind(ErrorKind::PatternNotFound));
        assert!(!err.has_kind(ErrorKind::ModuleNotFound));
    }

    #[test]
    fn test_source_follows_cause() {
        let err = scan().unwrap_err();
        let source = err.source().unwrap();
        assert!(source.to_string().starts_with("Section .text not found"));
        assert!(source.source().is_none());
    }

    #[test]
    fn test_deep_chain_renders_and_drops() {
        let mut err = diag!(SectionNotFound, "level 0");
        for level in 1..50_000 {
            err = diag!(PatternNotFound, "level {}", level).with_cause(err);
        }
        assert_eq!(err.chain().count(), 50_000);
        assert_eq!(err.root_cause().message(), "level 0");
        drop(err);
    }

    #[test]
    fn test_error_kind_names() {
        assert_eq!(ErrorKind::SubsystemApplyFailed.to_string(), "SubsystemApplyFailed");
        let name: &'static str = ErrorKind::ModuleNotFound.into();
        assert_eq!(name, "ModuleNotFound");
    }
}
