const LOCKED_SIGNATURES: &[&str] = &["database is locked", "busyerror"];
const INSTANCE_SIGNATURES: &[&str] = &["another calibre program", "calibre-server"];
const MISSING_SIGNATURES: &[&str] = &["no such file or directory", "not found"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureSignature {
    DatabaseLocked,
    InstanceRunning,
    Missing,
    Unrecognized,
}

// Matches English tool messages only; a localized calibredb falls through to Unrecognized.
pub fn classify_failure(text: &str) -> FailureSignature {
    let lowered = text.to_ascii_lowercase();
    let contains_any = |signatures: &[&str]| signatures.iter().any(|s| lowered.contains(s));

    if contains_any(LOCKED_SIGNATURES) {
        FailureSignature::DatabaseLocked
    } else if contains_any(INSTANCE_SIGNATURES) {
        FailureSignature::InstanceRunning
    } else if contains_any(MISSING_SIGNATURES) {
        FailureSignature::Missing
    } else {
        FailureSignature::Unrecognized
    }
}
