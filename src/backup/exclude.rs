/// Patterns every run excludes on top of the configured ones.
pub const DEFAULT_EXCLUDES: &[&str] = &["/.Trash-1000/", "/lost+found", "*/*Cache*/*", "*/*cache*/*"];

/// Built-in defaults followed by the user patterns, order preserved, duplicates kept.
pub fn effective_patterns(user: &[String]) -> Vec<String> {
    DEFAULT_EXCLUDES
        .iter()
        .map(|p| p.to_string())
        .chain(user.iter().cloned())
        .collect()
}

/// One `--exclude PATTERN` pair per pattern. Each pattern is its own argv element,
/// so no quoting is involved.
pub fn exclusion_args(patterns: &[String]) -> Vec<String> {
    patterns
        .iter()
        .flat_map(|pattern| ["--exclude".to_string(), pattern.clone()])
        .collect()
}
