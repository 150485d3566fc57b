//! The end-to-end pipeline: envelope matching, tree building, part
//! selection, and the output actions.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::envelope::match_header;
use crate::error::{MailknifeError, Result};
use crate::model::part::{PartId, PartTree};
use crate::parser::header::{decode_encoded_words, split_message, HeaderMap};
use crate::parser::mime::extension_for_media_type;
use crate::parser::part::build_tree_from;
use crate::select::select_parts;

/// Everything the pipeline needs to know, threaded explicitly (no process
/// globals).
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Envelope criterion `Header:pattern`, matched in address mode.
    pub match_address: Option<String>,
    /// Envelope criterion `Header:pattern`, matched as a plain value.
    pub match_header: Option<String>,

    /// Media-type pattern selecting non-attachment leaf parts.
    pub select_part: Option<String>,
    /// Media-type pattern selecting attachment leaf parts.
    pub select_attachment: Option<String>,

    /// Print each selected part's decoded content.
    pub print_content: bool,
    /// Print the decoded value of this whole-message header.
    pub print_header: Option<String>,
    /// Print the raw input bytes, unmodified.
    pub print_raw: bool,
    /// Save each selected part as a file and print its path.
    pub save_file: bool,

    /// Delimiter appended after each printed value (default `"\n"`).
    pub delimiter: Option<String>,
    /// Directory for `--save-file`; a fresh temp directory when unset.
    pub output_dir: Option<PathBuf>,
}

/// A selection target: either a leaf of the part tree or the synthetic
/// whole-message part.
///
/// The whole message stands for the literal wire bytes of the entire input
/// (its own header block included); no transfer-encoding or charset
/// decoding is ever applied to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    Whole,
    Node(PartId),
}

/// Run the pipeline over one buffered message.
///
/// `input` is the complete wire message; decoded/raw output goes to `out`.
/// Fails with [`MailknifeError::HeaderMatchFailed`] when a requested
/// envelope criterion does not pass and [`MailknifeError::NoPartSelected`]
/// when a requested selection matches nothing; both are expected outcomes.
pub fn run(opts: &Options, input: &[u8], out: &mut impl Write) -> Result<()> {
    let (header_bytes, body) = split_message(input)?;
    let header = HeaderMap::parse(header_bytes);

    // Envelope criteria AND together and short-circuit before any body
    // parsing happens.
    let mut pass = true;
    if let Some(spec) = &opts.match_address {
        if !match_header(&header, spec, true)? {
            pass = false;
        }
    }
    if let Some(spec) = &opts.match_header {
        if !match_header(&header, spec, false)? {
            pass = false;
        }
    }
    if !pass {
        return Err(MailknifeError::HeaderMatchFailed);
    }

    let mut tree = build_tree_from(header, body)?;

    let mut selected: Vec<Selection> = Vec::new();
    if let Some(pattern) = &opts.select_part {
        selected.extend(select_parts(&tree, pattern, false)?.into_iter().map(Selection::Node));
    }
    if let Some(pattern) = &opts.select_attachment {
        selected.extend(select_parts(&tree, pattern, true)?.into_iter().map(Selection::Node));
    }
    if (opts.select_part.is_some() || opts.select_attachment.is_some()) && selected.is_empty() {
        return Err(MailknifeError::NoPartSelected);
    }

    // Default-action resolution: with no action requested, print content;
    // printing the content of an unselected message means printing it raw.
    let mut print_content = opts.print_content;
    let mut print_raw = opts.print_raw;
    if opts.print_header.is_none() && !opts.save_file && !print_raw {
        print_content = true;
    }
    if selected.is_empty() && print_content {
        print_content = false;
        print_raw = true;
    }
    if selected.is_empty() {
        selected.push(Selection::Whole);
    }

    let delimiter = opts.delimiter.as_deref().unwrap_or("\n");

    if let Some(name) = &opts.print_header {
        let raw = tree.part(tree.root()).header.get(name).unwrap_or("");
        let value = decode_encoded_words(raw)?;
        out.write_all(value.as_bytes())?;
        out.write_all(delimiter.as_bytes())?;
    }

    if print_content {
        for &sel in &selected {
            let content = selection_content(&mut tree, sel, input)?;
            out.write_all(&content)?;
            out.write_all(delimiter.as_bytes())?;
        }
    }

    if print_raw {
        out.write_all(input)?;
    }

    if opts.save_file {
        let dir = save_dir(opts)?;
        for &sel in &selected {
            let path = save_selection(&mut tree, sel, input, &dir)?;
            out.write_all(path.to_string_lossy().as_bytes())?;
            out.write_all(delimiter.as_bytes())?;
        }
    }

    Ok(())
}

/// Decoded content of a selection target.
///
/// The whole-message part yields the captured wire bytes verbatim; a tree
/// leaf is drained through its decode pipeline.
fn selection_content(tree: &mut PartTree, sel: Selection, input: &[u8]) -> Result<Vec<u8>> {
    match sel {
        Selection::Whole => Ok(input.to_vec()),
        Selection::Node(id) => tree.take_decoded(id),
    }
}

/// The directory saved parts go to: the configured one, or a fresh
/// temporary directory that outlives the process.
fn save_dir(opts: &Options) -> Result<PathBuf> {
    match &opts.output_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            Ok(dir.clone())
        }
        None => Ok(tempfile::tempdir()?.keep()),
    }
}

/// Save one selection as a file and return its path.
///
/// The part's own disposition filename wins; otherwise the name is
/// generated with a suffix derived from the media type (`.eml` for the
/// whole message).
fn save_selection(
    tree: &mut PartTree,
    sel: Selection,
    input: &[u8],
    dir: &Path,
) -> Result<PathBuf> {
    let filename = match sel {
        Selection::Whole => None,
        Selection::Node(id) => tree.part(id).attachment_filename().map(sanitize_filename),
    };
    let content = selection_content(tree, sel, input)?;

    let path = match filename {
        Some(name) => {
            let path = dir.join(name);
            std::fs::write(&path, &content)?;
            path
        }
        None => {
            let ext = match sel {
                Selection::Whole => ".eml",
                Selection::Node(id) => extension_for_media_type(&tree.part(id).media_type),
            };
            let file = tempfile::Builder::new().suffix(ext).tempfile_in(dir)?;
            let (mut file, path) = file.keep().map_err(|e| MailknifeError::Io(e.error))?;
            file.write_all(&content)?;
            path
        }
    };

    debug!(path = %path.display(), bytes = content.len(), "saved part");
    Ok(path)
}

/// Keep only the final path component of a disposition filename so a
/// crafted header cannot escape the output directory.
fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .trim()
        .to_string();
    if base.is_empty() || base == "." || base == ".." {
        "unnamed".to_string()
    } else {
        base
    }
}
