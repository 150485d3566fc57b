//! End-to-end tests for the filter pipeline over fixture messages.

use std::path::Path;

use mailknife::app::{run, Options};
use mailknife::error::MailknifeError;

fn fixture(name: &str) -> Vec<u8> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read(path).expect("fixture exists")
}

fn run_knife(opts: &Options, name: &str) -> Result<Vec<u8>, MailknifeError> {
    let input = fixture(name);
    let mut out = Vec::new();
    run(opts, &input, &mut out)?;
    Ok(out)
}

// ─── print-content ──────────────────────────────────────────────────

#[test]
fn test_select_plain_part_from_multipart() {
    let opts = Options {
        select_part: Some("text/plain".into()),
        ..Options::default()
    };
    let out = run_knife(&opts, "multipart.eml").unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Hello! 😊"), "got: {text:?}");
    assert!(!text.contains("<p>"));
}

#[test]
fn test_select_html_part_from_multipart() {
    let opts = Options {
        select_part: Some("text/html".into()),
        ..Options::default()
    };
    let out = run_knife(&opts, "multipart.eml").unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("<p>Hello! 😊</p>"));
}

#[test]
fn test_select_star_prints_parts_in_document_order() {
    let opts = Options {
        select_part: Some("*".into()),
        ..Options::default()
    };
    let out = run_knife(&opts, "multipart.eml").unwrap();
    let text = String::from_utf8(out).unwrap();
    let plain_pos = text.find("Hello! 😊").unwrap();
    let html_pos = text.find("<p>Hello! 😊</p>").unwrap();
    assert!(plain_pos < html_pos, "plain part appears first in the source");
}

#[test]
fn test_prints_raw_input_if_none_selected() {
    let out = run_knife(&Options::default(), "plain.eml").unwrap();
    assert_eq!(out, fixture("plain.eml"), "unparsed input equals output");
}

#[test]
fn test_decodes_quoted_printable_single_part() {
    let opts = Options {
        select_part: Some("text/html".into()),
        ..Options::default()
    };
    let out = run_knife(&opts, "singlepart-quotedprintable.eml").unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "<div>Hello</div><div><a href=\"https://www.example.com/\">Example Link</a></div>\n\n",
    );
}

#[test]
fn test_empty_multipart_selects_as_empty_content() {
    // A body holding only the closing delimiter is a valid, empty message.
    let input = b"Content-Type: multipart/mixed; boundary=b\n\n--b--\n";
    let opts = Options {
        select_part: Some("*".into()),
        ..Options::default()
    };
    let mut out = Vec::new();
    run(&opts, input, &mut out).unwrap();
    assert_eq!(out, b"\n", "empty content followed by the delimiter");
}

// ─── envelope matching ──────────────────────────────────────────────

#[test]
fn test_match_header_decoded_subject() {
    let opts = Options {
        match_header: Some("Subject:*mail ✉️".into()),
        ..Options::default()
    };
    assert!(run_knife(&opts, "plain.eml").is_ok());

    let opts = Options {
        match_header: Some("Subject:Hello".into()),
        ..Options::default()
    };
    assert!(matches!(
        run_knife(&opts, "plain.eml"),
        Err(MailknifeError::HeaderMatchFailed)
    ));
}

#[test]
fn test_match_address_glob() {
    let opts = Options {
        match_address: Some("From:*@gmail.com".into()),
        ..Options::default()
    };
    assert!(run_knife(&opts, "plain.eml").is_ok());

    let opts = Options {
        match_address: Some("From:motemen@gmail.com".into()),
        ..Options::default()
    };
    assert!(run_knife(&opts, "plain.eml").is_ok());
}

#[test]
fn test_envelope_criteria_and_together() {
    // Address criterion passes, header criterion fails: the whole
    // envelope check fails.
    let opts = Options {
        match_address: Some("From:*@gmail.com".into()),
        match_header: Some("Subject:nope".into()),
        ..Options::default()
    };
    assert!(matches!(
        run_knife(&opts, "plain.eml"),
        Err(MailknifeError::HeaderMatchFailed)
    ));
}

#[test]
fn test_malformed_spec_is_distinct_from_match_failure() {
    let opts = Options {
        match_header: Some("SubjectNoColon".into()),
        ..Options::default()
    };
    assert!(matches!(
        run_knife(&opts, "plain.eml"),
        Err(MailknifeError::MalformedSpec(_))
    ));
}

// ─── selection failure ──────────────────────────────────────────────

#[test]
fn test_no_matching_part_is_select_failure() {
    let opts = Options {
        select_part: Some("image/tiff".into()),
        ..Options::default()
    };
    assert!(matches!(
        run_knife(&opts, "multipart.eml"),
        Err(MailknifeError::NoPartSelected)
    ));
}

#[test]
fn test_attachment_selection_excludes_inline_parts() {
    // text/plain exists but only as a non-attachment.
    let opts = Options {
        select_attachment: Some("text/plain".into()),
        ..Options::default()
    };
    assert!(matches!(
        run_knife(&opts, "multipart.eml"),
        Err(MailknifeError::NoPartSelected)
    ));
}

// ─── print-header ───────────────────────────────────────────────────

#[test]
fn test_print_header_is_decoded() {
    let opts = Options {
        print_header: Some("Subject".into()),
        print_raw: true, // keep the default-content fallback out of the way
        ..Options::default()
    };
    let out = run_knife(&opts, "plain.eml").unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("test mail ✉️\n"), "got: {text:?}");
}

// ─── save-file ──────────────────────────────────────────────────────

#[test]
fn test_save_whole_message_as_eml() {
    let dir = tempfile::tempdir().unwrap();
    let opts = Options {
        save_file: true,
        output_dir: Some(dir.path().to_path_buf()),
        ..Options::default()
    };
    let out = run_knife(&opts, "plain.eml").unwrap();
    let printed = String::from_utf8(out).unwrap();
    let path = printed.lines().next().unwrap();
    assert!(path.ends_with(".eml"), "got path: {path}");

    let saved = std::fs::read(path).unwrap();
    assert_eq!(saved, fixture("plain.eml"));
}

#[test]
fn test_save_parts_as_txt_and_html() {
    let dir = tempfile::tempdir().unwrap();
    let opts = Options {
        select_part: Some("*".into()),
        save_file: true,
        output_dir: Some(dir.path().to_path_buf()),
        ..Options::default()
    };
    let out = run_knife(&opts, "multipart.eml").unwrap();
    let printed = String::from_utf8(out).unwrap();
    let paths: Vec<&str> = printed.lines().collect();
    assert_eq!(paths.len(), 2);
    assert!(paths.iter().any(|p| p.ends_with(".txt")));
    assert!(paths.iter().any(|p| p.ends_with(".html")));
}

#[test]
fn test_save_attachment_with_original_filename() {
    let dir = tempfile::tempdir().unwrap();
    let opts = Options {
        select_attachment: Some("*".into()),
        save_file: true,
        output_dir: Some(dir.path().to_path_buf()),
        ..Options::default()
    };
    let out = run_knife(&opts, "multipart.eml").unwrap();
    let printed = String::from_utf8(out).unwrap();
    let path = printed.lines().next().unwrap();
    assert!(path.ends_with("4x4.png"), "got path: {path}");

    // Saved content is the base64-decoded payload.
    let saved = std::fs::read(path).unwrap();
    assert!(saved.starts_with(b"\x89PNG\r\n\x1a\n"));
}

// ─── hard parse failures ────────────────────────────────────────────

#[test]
fn test_garbage_input_is_fatal() {
    let mut out = Vec::new();
    let err = run(&Options::default(), b"no separator at all", &mut out).unwrap_err();
    assert!(matches!(err, MailknifeError::MalformedMessage(_)));
    assert!(out.is_empty(), "no partial output on fatal errors");
}
