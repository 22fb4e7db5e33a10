// crates/strata-engine/src/git/classify.rs
// Commit-type tag from the summary line

use regex::Regex;
use std::sync::LazyLock;

/// Conventional-commit prefix: `type(scope)!: subject`
static CONVENTIONAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    // SAFETY: This is a static literal regex pattern; compilation cannot fail.
    #[allow(clippy::expect_used)]
    Regex::new(
        r"(?i)^\s*(feat|fix|docs|style|refactor|perf|test|build|ci|chore|revert)(\([^)]*\))?!?\s*:",
    )
    .expect("conventional commit regex")
});

/// Keyword fallbacks, checked in order. Revert comes first so git's
/// default `Revert "fix ..."` message is not tagged as a fix.
static KEYWORD_RES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)\brevert", "revert"),
        (r"(?i)\b(fix|fixe[sd]|fixing|bug|bugs|hotfix)\b", "fix"),
        (r"(?i)\btests?\b", "test"),
        (r"(?i)\bdoc", "docs"),
        (r"(?i)\brefactor", "refactor"),
    ]
    .into_iter()
    .filter_map(|(pattern, tag)| Regex::new(pattern).ok().map(|re| (re, tag)))
    .collect()
});

/// Classify a commit summary. Unrecognized summaries are `other`.
pub fn classify_commit(summary: &str) -> String {
    if let Some(caps) = CONVENTIONAL_RE.captures(summary)
        && let Some(kind) = caps.get(1)
    {
        return kind.as_str().to_lowercase();
    }

    KEYWORD_RES
        .iter()
        .find(|(re, _)| re.is_match(summary))
        .map(|(_, tag)| tag.to_string())
        .unwrap_or_else(|| "other".to_string())
}
