use carelink_core::availability::DateRange;
use carelink_core::matching::MatchCriteria;
use carelink_core::{EntityId, PageRequest};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "carelink")]
#[command(about = "Carelink care-access coordination CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load users, practitioner and clinic profiles from a YAML file
    Seed {
        /// Path to the seed file
        file: PathBuf,
    },
    /// List practitioner profiles
    Practitioners,
    /// Rank practitioners against symptoms and preferences
    Match {
        /// Symptom (repeatable)
        #[arg(long = "symptom", required = true)]
        symptoms: Vec<String>,
        /// Preferred language (repeatable)
        #[arg(long = "language")]
        languages: Vec<String>,
        /// Maximum consultation fee
        #[arg(long)]
        max_fee: Option<Decimal>,
    },
    /// Issue a verification code for an email address or phone number
    RequestCode {
        identifier: String,
    },
    /// Verify a code and log in
    VerifyCode {
        identifier: String,
        code: String,
    },
    /// List a practitioner's availability windows
    Slots {
        /// Practitioner id
        practitioner_id: String,
        /// Inclusive start date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Inclusive end date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("carelink_core=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("Use 'carelink --help' for commands");
        return Ok(());
    };

    let services = api_shared::bootstrap::services_from_env()?;

    match command {
        Commands::Seed { file } => match services.directory.load_seed_file(&file) {
            Ok(summary) => println!(
                "Seeded {} user(s), skipped {} existing",
                summary.created, summary.skipped
            ),
            Err(e) => eprintln!("Error loading seed file: {}", e),
        },
        Commands::Practitioners => match services.directory.practitioners() {
            Ok(listings) if listings.is_empty() => println!("No practitioners found."),
            Ok(listings) => {
                for listing in listings {
                    println!(
                        "ID: {}, Name: {}, Specializations: {}, Languages: {}, Fee: {}, Accepting: {}",
                        listing.profile.id,
                        listing.name,
                        listing.profile.specializations.join(", "),
                        listing.profile.languages.join(", "),
                        listing.profile.consultation_fee,
                        listing.profile.accepting_new_patients
                    );
                }
            }
            Err(e) => eprintln!("Error listing practitioners: {}", e),
        },
        Commands::Match {
            symptoms,
            languages,
            max_fee,
        } => {
            let criteria = MatchCriteria {
                symptoms,
                languages: (!languages.is_empty()).then_some(languages),
                max_fee,
                ..Default::default()
            };
            match services.matching.run_match(criteria, None) {
                Ok(outcome) => {
                    println!("Match run {}", outcome.test_id);
                    if outcome.matches.is_empty() {
                        println!("No practitioners scored above the threshold.");
                    }
                    for m in outcome.matches {
                        println!(
                            "{:>3}  {} ({}) fee {}",
                            m.score,
                            m.practitioner.name,
                            m.practitioner.id,
                            m.practitioner.fee
                        );
                    }
                }
                Err(e) => eprintln!("Error running match: {}", e),
            }
        }
        Commands::RequestCode { identifier } => match services.challenges.issue(&identifier) {
            Ok(issued) => {
                println!(
                    "{} to {} (expires {})",
                    issued.message(),
                    issued.identifier,
                    issued.expires_at
                );
                if let Some(code) = issued.code {
                    println!("Code: {}", code);
                }
            }
            Err(e) => eprintln!("Error issuing code: {}", e),
        },
        Commands::VerifyCode { identifier, code } => {
            match services.auth.login(&identifier, &code) {
                Ok(outcome) => {
                    let verb = if outcome.created { "Registered" } else { "Logged in" };
                    println!(
                        "{} {} as {} ({})",
                        verb,
                        outcome.user.id,
                        outcome.user.role,
                        outcome.user.display_name()
                    );
                    println!("Access token: {}", outcome.tokens.access_token);
                    println!("Refresh token: {}", outcome.tokens.refresh_token);
                }
                Err(e) => eprintln!("Error verifying code: {}", e),
            }
        }
        Commands::Slots {
            practitioner_id,
            from,
            to,
            page,
            limit,
        } => {
            let practitioner_id = EntityId::parse(&practitioner_id)?;
            let range = DateRange {
                start: from,
                end: to,
            };
            match services
                .availability
                .list(&practitioner_id, range, PageRequest::new(page, limit))
            {
                Ok(page) if page.data.is_empty() => println!("No availability found."),
                Ok(page) => {
                    for slot in &page.data {
                        println!(
                            "{} {} {}-{} open: {}",
                            slot.id,
                            slot.date,
                            slot.start_time.format("%H:%M"),
                            slot.end_time.format("%H:%M"),
                            slot.open_labels().join(" ")
                        );
                    }
                    println!(
                        "Page {} of {} ({} total)",
                        page.meta.page, page.meta.total_pages, page.meta.total
                    );
                }
                Err(e) => eprintln!("Error listing availability: {}", e),
            }
        }
    }

    Ok(())
}
