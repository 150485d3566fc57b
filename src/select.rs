//! Selecting leaf parts by media-type pattern and attachment classification.

use tracing::debug;

use crate::error::Result;
use crate::model::part::{PartId, PartTree};
use crate::pattern::Pattern;

/// Return the leaf parts matching `media_type_pattern` whose attachment
/// flag equals `want_attachment`, in document order.
///
/// Multipart nodes are never candidates; only their leaf descendants are.
/// Fails only if the pattern does not compile.
pub fn select_parts(
    tree: &PartTree,
    media_type_pattern: &str,
    want_attachment: bool,
) -> Result<Vec<PartId>> {
    let pattern = Pattern::compile(media_type_pattern)?;

    let mut selected = Vec::new();
    for id in tree.leaves() {
        let part = tree.part(id);
        debug!(
            media_type = %part.media_type,
            attachment = part.is_attachment(),
            "visiting leaf"
        );
        if part.is_attachment() == want_attachment && pattern.matches(&part.media_type) {
            selected.push(id);
        }
    }

    Ok(selected)
}
