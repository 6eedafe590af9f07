use std::fmt;

use chrono::{DateTime, Utc};
use storage::repository::Storage;
use storage::seed::{MASTER_DATA, SeedExam, seed_exams};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    only: Vec<String>,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    UnknownExam { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::UnknownExam { raw } => write!(f, "unknown exam code for --only: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("PREP_DB_URL").unwrap_or_else(|_| "sqlite:prep.sqlite3".into());
        let mut only = Vec::new();
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--only" => {
                    let value = require_value(&mut args, "--only")?.trim().to_uppercase();
                    if !MASTER_DATA.iter().any(|exam| exam.code == value) {
                        return Err(ArgsError::UnknownExam { raw: value });
                    }
                    only.push(value);
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self { db_url, only, now })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:prep.sqlite3)");
    eprintln!("  --only <EXAM_CODE>        Seed only this exam; repeatable");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  PREP_DB_URL               Same as --db");
    eprintln!();
    eprintln!("Exams:");
    for exam in MASTER_DATA {
        eprintln!("  {:<10} {}", exam.code, exam.name);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let selected: Vec<&SeedExam> = MASTER_DATA
        .iter()
        .filter(|exam| args.only.is_empty() || args.only.iter().any(|c| c == exam.code))
        .collect();

    let mut created = 0;
    let mut skipped = 0;
    let mut topics = 0;
    for exam in selected {
        let report = seed_exams(&storage, std::slice::from_ref(exam), now).await?;
        created += report.exams_created;
        skipped += report.exams_skipped;
        topics += report.topics_created;
    }

    println!(
        "Seeded {created} exams ({topics} topics), skipped {skipped} existing, into {}",
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
