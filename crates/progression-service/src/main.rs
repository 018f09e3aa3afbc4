use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use progression_core::{calculate_level, ProgressionConfig, StatsPatch, UserId, XpEvent};
use progression_service::ProgressionService;
use progression_store::JsonFileStore;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn user_arg() -> Arg {
    Arg::new("user")
        .long("user")
        .required(true)
        .help("User id")
}

fn cli() -> Command {
    Command::new("progressionctl")
        .version(progression_service::VERSION)
        .about("Inspect and administer learner progression records")
        .subcommand_required(true)
        .arg(
            Arg::new("store-dir")
                .long("store-dir")
                .global(true)
                .default_value("progression-data")
                .value_parser(value_parser!(PathBuf))
                .help("Directory of the JSON file store"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Output as JSON"),
        )
        .subcommand(
            Command::new("level")
                .about("Show the level for an XP total")
                .arg(
                    Arg::new("xp")
                        .long("xp")
                        .required(true)
                        .value_parser(value_parser!(u64))
                        .help("Total XP"),
                ),
        )
        .subcommand(Command::new("badges").about("List the badge catalog"))
        .subcommand(
            Command::new("show")
                .about("Show a user's progression record")
                .arg(user_arg()),
        )
        .subcommand(
            Command::new("award")
                .about("Award XP to a user")
                .arg(user_arg())
                .arg(Arg::new("kind").long("kind").required(true).help("Event kind"))
                .arg(
                    Arg::new("xp")
                        .long("xp")
                        .required(true)
                        .allow_negative_numbers(true)
                        .value_parser(value_parser!(i64))
                        .help("XP to award"),
                )
                .arg(Arg::new("detail").long("detail").help("Event detail")),
        )
        .subcommand(
            Command::new("stats")
                .about("Merge stat counters without evaluating badges")
                .arg(user_arg())
                .arg(
                    Arg::new("set")
                        .long("set")
                        .required(true)
                        .action(ArgAction::Append)
                        .help("Counter assignment, e.g. lessonsCompleted=3"),
                ),
        )
        .subcommand(
            Command::new("progress")
                .about("Show badge progress for a user")
                .arg(user_arg()),
        )
        .subcommand(
            Command::new("reset")
                .about("Reset a user's progression to zero")
                .arg(user_arg()),
        )
}

fn user_id(args: &ArgMatches) -> Result<UserId> {
    let raw = args
        .get_one::<String>("user")
        .context("--user is required")?;
    Ok(UserId::new(raw.as_str())?)
}

fn parse_patch(assignments: impl Iterator<Item = String>) -> Result<StatsPatch> {
    let mut patch = StatsPatch::new();
    for assignment in assignments {
        let (name, value) = assignment
            .split_once('=')
            .with_context(|| format!("expected name=value, got {assignment:?}"))?;
        let value: i64 = value
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {name}"))?;
        patch = patch.set(name.trim(), value)?;
    }
    Ok(patch)
}

fn emit<T: Serialize + std::fmt::Debug>(json: bool, value: &T) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{value:#?}");
    }
    Ok(())
}

async fn load_config(matches: &ArgMatches) -> Result<ProgressionConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => {
            let source = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            Ok(ProgressionConfig::from_toml_str(&source)?)
        }
        None => Ok(ProgressionConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    let json = matches.get_flag("json");
    let config = load_config(&matches).await?;

    if let Some(("level", args)) = matches.subcommand() {
        let xp = *args.get_one::<u64>("xp").context("--xp is required")?;
        return emit(json, &calculate_level(xp));
    }

    let store_dir = matches
        .get_one::<PathBuf>("store-dir")
        .context("--store-dir is required")?;
    let store = JsonFileStore::open(store_dir).await?;
    let service = ProgressionService::with_config(Arc::new(store), config)?;

    match matches.subcommand() {
        Some(("badges", _)) => {
            if json {
                emit(true, service.engine().catalog())?;
            } else {
                for badge in service.engine().catalog().iter() {
                    println!(
                        "{:<16} {} {:<16} {:<10} {:?} >= {}",
                        badge.id,
                        badge.icon,
                        badge.name,
                        badge.rarity.to_string(),
                        badge.requirement.kind,
                        badge.requirement.threshold
                    );
                }
            }
        }
        Some(("show", args)) => {
            let user = user_id(args)?;
            let state = service.get_state(&user).await;
            if json {
                emit(true, &state)?;
            } else {
                let level = state.level();
                println!("User:         {user}");
                println!("Total XP:     {}", state.total_xp());
                println!(
                    "Level:        {} ({}/{} XP)",
                    level.level,
                    level.current_xp,
                    level.level_span()
                );
                println!("Badges:       {}", state.earned_badges().len());
                println!("Achievements: {}", state.achievements().len());
                println!("Stats:        {:?}", state.stats());
            }
        }
        Some(("award", args)) => {
            let user = user_id(args)?;
            let kind = args.get_one::<String>("kind").context("--kind is required")?;
            let xp = *args.get_one::<i64>("xp").context("--xp is required")?;
            let mut event = XpEvent::new(kind.as_str(), xp)?;
            if let Some(detail) = args.get_one::<String>("detail") {
                event = event.with_detail(detail.as_str());
            }
            let outcome = service.award_xp(&user, &event).await?;
            if json {
                emit(true, &outcome.achievements)?;
            } else {
                println!("Total XP: {}", outcome.state.total_xp());
                for achievement in &outcome.achievements {
                    println!("  {} (+{} XP)", achievement.title, achievement.xp_gained);
                }
                if outcome.leveled_up {
                    println!("Now level {}", outcome.level.level);
                }
            }
        }
        Some(("stats", args)) => {
            let user = user_id(args)?;
            let assignments = args
                .get_many::<String>("set")
                .context("--set is required")?
                .cloned();
            let patch = parse_patch(assignments)?;
            let state = service.update_stats(&user, &patch).await?;
            emit(json, state.stats())?;
        }
        Some(("progress", args)) => {
            let user = user_id(args)?;
            let progress = service.get_badge_progress(&user).await;
            if json {
                emit(true, &progress)?;
            } else {
                for entry in progress {
                    let mark = if entry.earned { "x" } else { " " };
                    println!(
                        "[{mark}] {:<16} {:>5.1}% ({}/{})",
                        entry.badge.id, entry.progress_percent, entry.current, entry.threshold
                    );
                }
            }
        }
        Some(("reset", args)) => {
            let user = user_id(args)?;
            service.reset(&user).await?;
            println!("Reset progression for {user}");
        }
        _ => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use progression_core::StatField;

    #[test]
    fn cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn patch_parsing() {
        let patch = parse_patch(
            ["lessonsCompleted=3".to_string(), "current_streak = 2".to_string()].into_iter(),
        )
        .unwrap();
        assert_eq!(patch.get(StatField::LessonsCompleted), Some(3));
        assert_eq!(patch.get(StatField::CurrentStreak), Some(2));
        assert!(parse_patch(["coins=1".to_string()].into_iter()).is_err());
        assert!(parse_patch(["lessonsCompleted".to_string()].into_iter()).is_err());
    }
}
