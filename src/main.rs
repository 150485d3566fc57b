//! CLI entry point for `mailknife`.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use mailknife::app::{run, Options};

/// Reads one MIME mail message from stdin; filters it by header and address
/// patterns, selects body parts and attachments, and prints or saves them.
///
/// Patterns are literal strings, globs (`*` matches one or more
/// characters), or `/regexp/`.
#[derive(Parser)]
#[command(name = "mailknife", version, about)]
struct Cli {
    /// Shortcut for --match-address 'From:<PATTERN>'
    #[arg(long, value_name = "PATTERN")]
    from: Option<String>,

    /// Shortcut for --match-header 'Subject:<PATTERN>'
    #[arg(long, value_name = "PATTERN")]
    subject: Option<String>,

    /// Shortcut for --select-part text/html
    #[arg(long)]
    html: bool,

    /// Shortcut for --select-part text/plain
    #[arg(long)]
    plain: bool,

    /// Filter: address header, e.g. "From:*@example.com"
    #[arg(long, value_name = "HEADER:PATTERN")]
    match_address: Option<String>,

    /// Filter: plain header, e.g. "Subject:foobar"
    #[arg(long, value_name = "HEADER:PATTERN")]
    match_header: Option<String>,

    /// Select: non-attachment parts by content type
    #[arg(long, value_name = "CONTENT_TYPE")]
    select_part: Option<String>,

    /// Select: attachments by content type
    #[arg(long, value_name = "CONTENT_TYPE")]
    select_attachment: Option<String>,

    /// Action: print decoded content
    #[arg(long)]
    print_content: bool,

    /// Action: print a header of the message
    #[arg(long, value_name = "HEADER")]
    print_header: Option<String>,

    /// Action: print raw input as-is
    #[arg(long)]
    print_raw: bool,

    /// Action: save parts as files and print their paths
    #[arg(long)]
    save_file: bool,

    /// Directory for --save-file (default: a fresh temporary directory)
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Resolve shortcut flags and produce the pipeline options.
    fn into_options(self) -> Options {
        let mut opts = Options {
            match_address: self.match_address,
            match_header: self.match_header,
            select_part: self.select_part,
            select_attachment: self.select_attachment,
            print_content: self.print_content,
            print_header: self.print_header,
            print_raw: self.print_raw,
            save_file: self.save_file,
            output_dir: self.output_dir,
            ..Options::default()
        };

        if let Some(pattern) = self.from {
            opts.match_address = Some(format!("From:{pattern}"));
        }
        if let Some(pattern) = self.subject {
            opts.match_header = Some(format!("Subject:{pattern}"));
        }
        if self.html {
            opts.select_part = Some("text/html".to_string());
        }
        if self.plain {
            opts.select_part = Some("text/plain".to_string());
        }

        opts
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let opts = cli.into_options();

    let input = match read_stdin() {
        Ok(input) => input,
        Err(e) => {
            tracing::error!("{e:#}");
            return ExitCode::from(2);
        }
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match run(&opts, &input, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        // Expected outcomes: a requested criterion simply did not match.
        Err(e) if e.is_match_failure() => {
            tracing::info!("{e}");
            ExitCode::from(1)
        }
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::from(2)
        }
    }
}

/// Buffer the whole message; it is needed twice (parsing and raw
/// re-emission).
fn read_stdin() -> anyhow::Result<Vec<u8>> {
    use anyhow::Context as _;

    let mut input = Vec::new();
    std::io::stdin()
        .lock()
        .read_to_end(&mut input)
        .context("reading message from stdin")?;
    Ok(input)
}

/// Set up tracing on stderr; stdout stays a clean data channel.
fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}
