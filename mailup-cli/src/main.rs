mod options {
    use std::path::PathBuf;

    use clap::AppSettings;

    #[derive(Debug, clap::Parser)]
    #[clap(name = "mailup", about = "Upload local mail stores to a hosted mailbox", version = clap::crate_version!())]
    #[clap(setting = AppSettings::SubcommandRequiredElseHelp)]
    pub struct Args {
        /// Enable tracing for all components.
        #[clap(short = 'v', long)]
        pub verbose: bool,

        #[clap(subcommand)]
        pub cmds: SubCommands,
    }

    #[derive(Debug, clap::Parser)]
    pub enum SubCommands {
        /// Scan the mail folders and print the mailbox outline with counts.
        List {
            /// The kind of mail store, valid values are 'apple', 'maildir' and 'mbox'.
            #[clap(parse(try_from_str = parse_format))]
            mail_format: mu_core::FormatType,

            /// The folders in which the mail is stored. Defaults to the
            /// system location of the format, if it has one.
            mail_folders: Vec<PathBuf>,
        },
        /// Scan the mail folders and upload every message in them.
        Upload {
            /// Do not use the mailbox names as labels on the uploaded
            /// messages.
            #[clap(long)]
            no_labels: bool,

            /// Do not preserve mail properties such as unread state.
            #[clap(long)]
            no_properties: bool,

            /// File every uploaded message into the inbox.
            #[clap(long)]
            all_mail_to_inbox: bool,

            /// An additional label to put on every uploaded message.
            #[clap(short = 'l', long)]
            label: Option<String>,

            /// Write the skipped-messages report to this file, as JSON.
            #[clap(short = 'r', long)]
            report: Option<PathBuf>,

            /// Artificial transport latency per message, in milliseconds.
            #[clap(long, default_value = "20")]
            latency_ms: u64,

            /// Fraction of uploads that fail transiently, for exercising
            /// the retry machinery.
            #[clap(long, default_value = "0.0")]
            failure_rate: f64,

            /// The kind of mail store, valid values are 'apple', 'maildir' and 'mbox'.
            #[clap(parse(try_from_str = parse_format))]
            mail_format: mu_core::FormatType,

            /// The folders in which the mail is stored. Defaults to the
            /// system location of the format, if it has one.
            mail_folders: Vec<PathBuf>,
        },
    }

    fn parse_format(s: &str) -> Result<mu_core::FormatType, String> {
        use mu_core::FormatType::*;
        Ok(match s {
            "apple" | "Apple Mail" => AppleMail,
            #[cfg(unix)]
            "maildir" | "Maildir" => Maildir,
            "mbox" | "Mbox" => Mbox,
            unknown => {
                let valid: Vec<String> =
                    mu_core::FormatType::all_cases().map(String::from).collect();
                return Err(format!(
                    "'{}' isn't a valid format (one of: {})",
                    unknown,
                    valid.join(", ")
                ));
            }
        })
    }
}

use clap::Parser;
use options::{Args, SubCommands};

use mu_core::eyre::{bail, Result};
use mu_core::model::{CheckState, NodeId, OutlineTree};
use mu_core::{crossbeam_channel, Config, FormatType, MailSource, SkipReason, UploadOptions};
use mu_sources::{controller_for, default_folder, Controller};
use mu_uploader::{Adapter, Coordinator, SimulatedUploader, UploadReport};

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    let args = Args::parse();
    if args.verbose {
        mu_core::setup_tracing();
    }

    match args.cmds {
        SubCommands::List {
            mail_format,
            mail_folders,
        } => {
            let sources = scan(mail_format, mail_folders, UploadOptions::default())?;
            for source in &sources {
                print_outline(source.tree());
            }
            let total: usize = sources.iter().map(|s| s.count_selected_messages()).sum();
            println!("{} messages in {} folder(s)", total, sources.len());
        }
        SubCommands::Upload {
            no_labels,
            no_properties,
            all_mail_to_inbox,
            label,
            report,
            latency_ms,
            failure_rate,
            mail_format,
            mail_folders,
        } => {
            let options = UploadOptions {
                mailbox_names_as_labels: !no_labels,
                preserve_mail_properties: !no_properties,
                put_all_mail_in_inbox: all_mail_to_inbox,
                additional_label: label,
            };
            let sources = scan(mail_format, mail_folders, options)?;
            let transport = SimulatedUploader::new()
                .latency(Duration::from_millis(latency_ms))
                .failure_rate(failure_rate);
            let coordinator = Coordinator::new(sources, Arc::new(transport));
            let (handle, join) = coordinator.start();

            let adapter = Adapter::new();
            let processor = adapter.process(handle.status().clone());
            watch_progress(&adapter)?;

            let upload_report = join.join().expect("no panic")?;
            processor.join().expect("no panic")?;
            print_report(&upload_report);
            if let Some(path) = report {
                let file = std::fs::File::create(&path)?;
                serde_json::to_writer_pretty(file, &upload_report.skipped)?;
                println!("Skipped-messages report written to {}", path.display());
            }
        }
    };
    Ok(())
}

/// Scan every given folder (or the format's default location) into a
/// mail source. Scanning failures of any folder abort the whole run.
fn scan(
    format: FormatType,
    folders: Vec<PathBuf>,
    options: UploadOptions,
) -> Result<Vec<Box<dyn MailSource>>> {
    let folders = if folders.is_empty() {
        match default_folder(format) {
            Some(folder) => vec![folder],
            None => bail!("No mail folder given, and '{}' has no default location", format.name()),
        }
    } else {
        folders
    };

    // Scan progress goes to a channel nobody reads interactively; keep
    // the receiver alive until the scan is over.
    let (sender, _receiver) = crossbeam_channel::unbounded();
    let mut sources: Vec<Box<dyn MailSource>> = Vec::new();
    for folder in folders {
        if !folder.is_dir() {
            bail!("The mail folder at '{}' isn't accessible", folder.display())
        }
        let config = Config::new(folder, format, options.clone())?;
        let controller: Controller = controller_for(config, &sender)?;
        sources.push(Box::new(controller));
    }
    Ok(sources)
}

fn print_outline(tree: &OutlineTree) {
    print_item(tree, tree.root());
}

fn print_item(tree: &OutlineTree, id: NodeId) {
    let item = tree.item(id);
    let mark = match item.state() {
        CheckState::Checked => "x",
        CheckState::Unchecked => " ",
        CheckState::Mixed => "-",
    };
    let count = tree.recursive_message_count(id);
    println!("{}[{}] {} ({})", "  ".repeat(item.level), mark, item.name, count);
    for child in item.children() {
        print_item(tree, *child);
    }
}

/// Redraw one status line until the run is over.
fn watch_progress(adapter: &Adapter) -> Result<()> {
    loop {
        if let Some(report) = adapter.error()? {
            return Err(report);
        }
        let progress = adapter.upload_count()?;
        let state = adapter.state()?;

        let mut line = format!(
            "\rUploading {} / {} [{}]",
            progress.count,
            progress.total,
            state.mode.name()
        );
        if state.skipped > 0 {
            line.push_str(&format!(" {} skipped", state.skipped));
        }
        if let Some(delay) = state.backing_off {
            line.push_str(&format!(" backing off {:?}", delay));
        }
        if let Some(seconds) = state.estimated_seconds_remaining {
            line.push_str(&format!(" ~{}s left", seconds));
        }
        if state.finishing {
            line.push_str(" finishing up");
        }
        print!("{:<72}", line);
        std::io::stdout().flush().ok();

        if state.done {
            println!();
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(100));
    }
}

fn print_report(report: &UploadReport) {
    if report.stopped {
        println!("Stopped early.");
    }
    println!(
        "Uploaded {} of {} selected message(s), {} skipped",
        report.uploaded,
        report.selected,
        report.skipped.len()
    );
    if report.skipped.is_empty() {
        return;
    }
    for reason in [SkipReason::Duplicate, SkipReason::Server, SkipReason::Parsing] {
        let group: Vec<_> = report
            .skipped
            .iter()
            .filter(|s| s.reason == reason)
            .collect();
        if group.is_empty() {
            continue;
        }
        let name: &'static str = (&reason).into();
        println!("Skipped as {} ({}):", name, group.len());
        for skipped in group {
            println!("  {}", skipped);
        }
    }
}
