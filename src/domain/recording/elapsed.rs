//! Elapsed recording time formatting

/// Format whole seconds as `MM:SS`.
///
/// Minutes are zero-padded to two digits and keep counting past 59
/// (there is no hour field), so 3725 seconds is `62:05`.
pub fn format_elapsed(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
