use crate::api::ProgressMarker;

/// Anti-spoiler rule: a comment is obscured for readers who have not yet
/// reached the point in the book it was written at. Equal progress is not
/// gated.
///
/// The viewer's progress can change between renders (reading status is
/// updated elsewhere in the app), so callers must re-evaluate this on every
/// render rather than cache the result on the comment.
pub fn should_obscure(viewer_progress: ProgressMarker, comment_marker: ProgressMarker) -> bool {
    viewer_progress < comment_marker
}
