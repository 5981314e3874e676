//! tutor-confirm: booking notifications in, confirmed sessions out.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

use tutor_confirm::collaborators::{CalendarWriter, MailSource, NoCalendar, NotificationSender};
use tutor_confirm::compose::Envelope;
use tutor_confirm::config::{self, Config, DeliveryKind, MailSourceKind};
use tutor_confirm::extract::{Extraction, Extractor};
use tutor_confirm::google_calendar::GoogleCalendar;
use tutor_confirm::ledger::{self, Ledger};
use tutor_confirm::mail::{self, DirectoryMailSource, GmailMailSource};
use tutor_confirm::notify::{GmailSender, OutboxSender};
use tutor_confirm::store;
use tutor_confirm::workflow::{Pipeline, RunOptions};
use tutor_confirm::zoom::ZoomMeetings;
use tutor_confirm::ScheduleError;

/// Turns booking-tool notification emails into confirmed tutoring sessions
#[derive(Parser, Debug)]
#[command(name = "tutor-confirm")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: ~/.tutor-confirm/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default config file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },
    /// Ingest new booking mail and send due confirmations
    Run {
        /// Write confirmations to the outbox instead of sending them
        #[arg(long)]
        dry_run: bool,
    },
    /// List every appointment in the ledger
    List,
    /// Find appointments by invitee name (case-insensitive substring)
    Search { name: String },
    /// Show unnotified appointments in the notification window
    Due {
        /// Days ahead of today to include
        #[arg(short, long)]
        days: Option<u32>,
    },
    /// Drop appointments dated before today
    Cleanup,
    /// Forget every appointment
    Purge {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Parse one saved message and print the appointment it holds
    Extract { file: PathBuf },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let args = Args::parse();
    let config_path = args.config.clone().unwrap_or_else(config::config_path);

    match args.command {
        Command::Init { force } => run_init(&config_path, force),
        Command::Extract { file } => run_extract(&config_path, &file),
        command => {
            let config = config::load_config(&config_path).map_err(with_suggestion)?;
            let state_path = config.state_path();
            let mut ledger = store::load_ledger(&state_path);

            match command {
                Command::Run { dry_run } => {
                    run_confirmations(&config, &mut ledger, dry_run)?;
                    save(&ledger, &state_path)
                }
                Command::List => {
                    print_records(ledger.appointments().iter());
                    Ok(())
                }
                Command::Search { name } => {
                    print_records(ledger.search_by_name(&name).into_iter());
                    Ok(())
                }
                Command::Due { days } => {
                    let due = ledger.due_for_notification(days.unwrap_or(config.days_ahead));
                    print_records(due.iter());
                    Ok(())
                }
                Command::Cleanup => {
                    let removed = ledger.cleanup();
                    println!("{} old appointments cleared", removed);
                    save(&ledger, &state_path)
                }
                Command::Purge { yes } => {
                    if !yes && !confirm("Are you sure you want to clear all appointments? (y/n) ")? {
                        println!("Appointments not cleared");
                        return Ok(());
                    }
                    let removed = ledger.clear();
                    println!("{} appointments cleared", removed);
                    save(&ledger, &state_path)
                }
                Command::Init { .. } | Command::Extract { .. } => Ok(()),
            }
        }
    }
}

fn with_suggestion(err: ScheduleError) -> anyhow::Error {
    let suggestion = err.recovery_suggestion();
    anyhow::Error::new(err).context(suggestion)
}

fn save(ledger: &Ledger, path: &Path) -> anyhow::Result<()> {
    store::save_ledger(ledger, path)
        .map_err(with_suggestion)
        .with_context(|| format!("saving ledger to {}", path.display()))
}

fn run_init(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    config::save_config(&Config::default(), path).map_err(with_suggestion)?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

fn run_extract(config_path: &Path, file: &Path) -> anyhow::Result<()> {
    // Markers come from the config when there is one.
    let extractor = match config::load_config(config_path) {
        Ok(config) => Extractor::with_markers(config.start_marker, config.end_marker),
        Err(_) => Extractor::default(),
    };

    let raw = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let text = if file.extension().is_some_and(|e| e == "eml") {
        mail::decode_message(&raw).map_err(with_suggestion)?
    } else {
        String::from_utf8_lossy(&raw).into_owned()
    };

    match extractor.extract(&text) {
        Extraction::Found(record) => println!("{}", record),
        Extraction::Invalid(reason) => println!("No appointment found: {:?}", reason),
    }
    Ok(())
}

fn run_confirmations(config: &Config, ledger: &mut Ledger, dry_run: bool) -> anyhow::Result<()> {
    let mail = mail_source(config)?;
    let meetings = ZoomMeetings::from_config(&config.zoom).map_err(with_suggestion)?;
    let calendar = calendar_writer(config)?;
    let sender = notification_sender(config, dry_run)?;
    let extractor = Extractor::with_markers(config.start_marker.clone(), config.end_marker.clone());
    let envelope = Envelope {
        cc: config.delivery.cc.clone(),
        attachment: config.delivery.attachment.as_ref().map(PathBuf::from),
    };

    let pipeline = Pipeline {
        extractor: &extractor,
        mail: mail.as_ref(),
        meetings: &meetings,
        calendar: calendar.as_ref(),
        sender: sender.as_ref(),
        template: &config.template,
        envelope: &envelope,
    };
    let options = RunOptions {
        label: config.label.clone(),
        days_ahead: config.days_ahead,
        allow_backdate: config.allow_backdate,
    };

    let summary = pipeline
        .run(ledger, &options, ledger::today())
        .map_err(with_suggestion)?;

    println!(
        "{} booked, {} confirmations sent, {} confirmations failed",
        summary.ingest.booked, summary.notify.sent, summary.notify.failed
    );
    Ok(())
}

fn mail_source(config: &Config) -> anyhow::Result<Box<dyn MailSource>> {
    match config.mail_source {
        MailSourceKind::Directory => {
            let root = config
                .mail_dir
                .as_ref()
                .context("mailDir is required when mailSource is \"directory\"")?;
            Ok(Box::new(DirectoryMailSource::new(root)))
        }
        MailSourceKind::Gmail => {
            let token = config
                .gmail_token
                .clone()
                .ok_or(ScheduleError::MissingToken("Gmail"))
                .map_err(with_suggestion)?;
            Ok(Box::new(GmailMailSource::new(token, config.max_messages)))
        }
    }
}

fn calendar_writer(config: &Config) -> anyhow::Result<Box<dyn CalendarWriter>> {
    if !config.calendar.enabled {
        return Ok(Box::new(NoCalendar));
    }
    let calendar = GoogleCalendar::from_config(&config.calendar).map_err(with_suggestion)?;
    Ok(Box::new(calendar))
}

fn notification_sender(
    config: &Config,
    dry_run: bool,
) -> anyhow::Result<Box<dyn NotificationSender>> {
    let gateways = config.delivery.mms_gateways.clone();
    if dry_run || config.delivery.kind == DeliveryKind::Outbox {
        let dir = config.outbox_dir();
        log::info!("Writing confirmations to {}", dir.display());
        return Ok(Box::new(OutboxSender::new(dir, gateways)));
    }

    let token = config
        .delivery_token()
        .ok_or(ScheduleError::MissingToken("Gmail"))
        .map_err(with_suggestion)?;
    Ok(Box::new(GmailSender::new(
        token,
        config.delivery.from.clone(),
        gateways,
    )))
}

fn print_records<'a>(records: impl Iterator<Item = &'a tutor_confirm::AppointmentRecord>) {
    let mut count = 0;
    for record in records {
        println!("{}\n", record);
        count += 1;
    }
    if count == 0 {
        println!("No appointments.");
    }
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}
