pub mod config;
pub mod db;
pub mod models;
pub mod monitoring;
pub mod pipeline;
pub mod workflow;

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::db::SqliteStore;
use crate::monitoring::{MonitorEvent, SimulatedPositionSource, TracingAlertSink};
use crate::pipeline::OllamaClient;
use crate::workflow::{Action, CompanionError, Destination, Orchestrator, QueryServices};

/// Largest per-reading drift of the simulated position feed, in degrees.
const SIMULATED_STEP_DEG: f64 = 0.01;
const SIMULATED_POSITION_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(name = "careline")]
#[command(about = "Health companion: vitals and geofence watchdog, care search and chat")]
#[command(version)]
pub struct Cli {
    /// Defaults to `monitor`
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Watch vitals and position until Ctrl-C
    Monitor,
    /// Analyse symptoms and save the result to history
    Analyze {
        /// Symptom description
        #[arg(required = true)]
        symptoms: Vec<String>,
    },
    /// Find nearby hospitals
    Hospitals {
        /// Specialty or need (optional)
        need: Vec<String>,
    },
    /// Look up financial aid schemes
    Aid {
        /// What help is needed
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Ask the assistant a question
    Chat {
        #[arg(required = true)]
        message: Vec<String>,
    },
    /// Show past analyses
    History,
    /// Delete past analyses
    ClearHistory,
    /// Switch between light and dark theme
    Theme,
    /// Set the emergency contact; no value clears it
    Contact { contact: Vec<String> },
}

pub fn run() -> Result<(), CompanionError> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let app_config = AppConfig::from_env();

    let store = Arc::new(SqliteStore::open(&config::database_path(&app_config.data_dir))?);
    let client = Arc::new(OllamaClient::new(
        &app_config.ollama_url,
        &app_config.model,
        app_config.timeout_secs,
    )?);
    let positions = Arc::new(SimulatedPositionSource::new(
        app_config.origin,
        SIMULATED_STEP_DEG,
        SIMULATED_POSITION_INTERVAL,
    ));

    let mut orchestrator = Orchestrator::new(
        QueryServices::shared(client),
        store,
        positions,
        Arc::new(TracingAlertSink),
    )?;
    if let Some(contact) = &app_config.emergency_contact {
        orchestrator.set_emergency_contact(contact)?;
    }

    execute(&mut orchestrator, cli.command.unwrap_or(Commands::Monitor))
}

fn execute(orchestrator: &mut Orchestrator, command: Commands) -> Result<(), CompanionError> {
    match command {
        Commands::Monitor => monitor(orchestrator),
        Commands::Analyze { symptoms } => {
            orchestrator.apply(Action::Submit)?;
            orchestrator.analyze_symptoms(&symptoms.join(" "))?;
            if let Some(analysis) = &orchestrator.session().analysis {
                println!("{analysis}");
            }
            Ok(())
        }
        Commands::Hospitals { need } => {
            open(orchestrator, Destination::HospitalSearch)?;
            let need = need.join(" ");
            orchestrator.search_hospitals(Some(&need))?;
            for hospital in &orchestrator.session().hospitals {
                println!(
                    "{}\n  Contact: {}\n  Best doctor: {}\n  Rating: {}\n  {}",
                    hospital.hit.display_name,
                    hospital.contact_number,
                    hospital.specialist_name,
                    hospital.rating_label,
                    hospital.hit.resource_uri
                );
            }
            Ok(())
        }
        Commands::Aid { query } => {
            open(orchestrator, Destination::FinancialAidQuery)?;
            orchestrator.query_financial_aid(&query.join(" "))?;
            for record in &orchestrator.session().aid_records {
                println!(
                    "{}\n  {}\n  How to access: {}\n  {}",
                    record.scheme_name,
                    record.description,
                    record.access_instructions,
                    record.website_url
                );
            }
            Ok(())
        }
        Commands::Chat { message } => {
            open(orchestrator, Destination::Chat)?;
            orchestrator.send_chat_message(&message.join(" "))?;
            if let Some(reply) = orchestrator.session().chat.last() {
                println!("{}", reply.text);
            }
            Ok(())
        }
        Commands::History => {
            for entry in &orchestrator.session().history {
                println!(
                    "[{}] {}\n  {}",
                    entry.recorded_at.format("%Y-%m-%d %H:%M"),
                    entry.symptoms,
                    entry.analysis
                );
            }
            Ok(())
        }
        Commands::ClearHistory => orchestrator.clear_history(),
        Commands::Theme => {
            let theme = orchestrator.toggle_theme()?;
            println!("Theme: {theme}");
            Ok(())
        }
        Commands::Contact { contact } => orchestrator.set_emergency_contact(&contact.join(" ")),
    }
}

fn open(orchestrator: &mut Orchestrator, destination: Destination) -> Result<(), CompanionError> {
    orchestrator.apply(Action::Submit)?;
    orchestrator.apply(Action::Navigate(destination))?;
    Ok(())
}

/// Watch vitals and position until Ctrl-C.
///
/// The blocking HTTP client inside the orchestrator must never be dropped on
/// a runtime thread, so the runtime only drives the event wait.
fn monitor(orchestrator: &mut Orchestrator) -> Result<(), CompanionError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CompanionError::Startup(format!("tokio runtime: {e}")))?;

    {
        let _guard = runtime.enter();
        orchestrator.start_monitoring()?;
    }
    tracing::info!("Monitoring; press Ctrl-C to stop");

    runtime.block_on(async {
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                event = orchestrator.next_monitor_event() => match event {
                    Some(MonitorEvent::Alert(alert)) => {
                        println!("ALERT [{}] {}", alert.kind, alert.message);
                    }
                    Some(MonitorEvent::Stopped) | None => break,
                    Some(_) => {}
                },
            }
        }
    });

    if orchestrator.is_monitoring() {
        orchestrator.stop_monitoring()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::error::ErrorKind;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("careline").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn no_subcommand_means_monitor() {
        assert_eq!(parse(&[]).command, None);
        assert_eq!(parse(&["monitor"]).command, Some(Commands::Monitor));
    }

    #[test]
    fn free_text_words_are_collected() {
        assert_eq!(
            parse(&["analyze", "sore", "throat"]).command,
            Some(Commands::Analyze {
                symptoms: vec!["sore".into(), "throat".into()]
            })
        );
        assert_eq!(
            parse(&["hospitals"]).command,
            Some(Commands::Hospitals { need: vec![] })
        );
        assert_eq!(
            parse(&["hospitals", "cardiology"]).command,
            Some(Commands::Hospitals {
                need: vec!["cardiology".into()]
            })
        );
        assert_eq!(
            parse(&["clear-history"]).command,
            Some(Commands::ClearHistory)
        );
    }

    #[test]
    fn analyze_requires_symptoms() {
        let err = Cli::try_parse_from(["careline", "analyze"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        let err = Cli::try_parse_from(["careline", "dance"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
    }
}
