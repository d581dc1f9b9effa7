mod app;
mod cache;
mod clock;
mod directory;
mod error;
mod normalizer;
mod notify;
mod refresher;
mod resolver;
mod scheduler;
mod settings;
mod store;
mod upstream;

#[cfg(test)]
mod testutil;

use crate::app::App;
use crate::refresher::PeriodicRefresher;
use crate::resolver::Feed;
use crate::settings::Settings;
use crate::store::{StreamOverride, User};
use anyhow::{Context, bail};
use chrono::NaiveDate;
use gamecast_api::{Game, League};
use log::{error, info, warn};
use std::sync::Arc;

enum Command {
    Serve,
    Games { league: League, date: Option<NaiveDate> },
    Game { id: String },
    Resolve { id: String, feed: Feed },
    Alert { game_id: String, user_id: String, lead_minutes: u32 },
    Cancel { alert_id: String },
    User { id: String, email: String },
    Override {
        game_id: String,
        home: Option<String>,
        away: Option<String>,
        league: Option<League>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Some(command) = handle_cli_args()? else {
        return Ok(());
    };

    dotenvy::dotenv().ok();
    let settings = Settings::load();
    tracing_subscriber::fmt().with_max_level(settings.log_level).init();
    for warning in &settings.warnings {
        warn!("{warning}");
    }

    let app = Arc::new(App::new(settings).await?);

    match command {
        Command::Serve => serve(app).await,
        Command::Games { league, date } => {
            let date = date.unwrap_or_else(|| app.today());
            let games = app.fetch_games(league, date).await;
            if games.is_empty() {
                println!("No {} games on {date}", league.label());
            }
            for game in &games {
                println!("{}", game_line(game));
            }
            Ok(())
        }
        Command::Game { id } => {
            let game =
                app.fetch_game(&id).await.with_context(|| format!("game {id} not found"))?;
            println!("{}", serde_json::to_string_pretty(&game)?);
            Ok(())
        }
        Command::Resolve { id, feed } => {
            app.start().await;
            let resolution = app.resolve(&id, feed).await?;
            println!("{}", serde_json::to_string_pretty(&resolution)?);
            Ok(())
        }
        Command::Alert { game_id, user_id, lead_minutes } => {
            let handle = app.schedule(&game_id, &user_id, lead_minutes).await?;
            println!("alert {} fires at {}", handle.alert.id, handle.fire_at);
            Ok(())
        }
        Command::Cancel { alert_id } => {
            if app.cancel(&alert_id).await {
                println!("alert {alert_id} cancelled");
            } else {
                println!("no pending alert {alert_id}");
            }
            Ok(())
        }
        Command::User { id, email } => {
            app.register_user(User { id: id.clone(), email }).await?;
            println!("user {id} saved");
            Ok(())
        }
        Command::Override { game_id, home, away, league } => {
            let mut record = StreamOverride::new(game_id.clone());
            record.home_stream_url = home;
            record.away_stream_url = away;
            record.league = league;
            app.put_override(record).await?;
            println!("override for {game_id} saved");
            Ok(())
        }
    }
}

async fn serve(app: Arc<App>) -> anyhow::Result<()> {
    let armed = app.start().await;
    info!("gamecast {} serving, {armed} alert(s) armed", env!("CARGO_PKG_VERSION"));

    let refresher = tokio::spawn(PeriodicRefresher::new(app.clone()).run());

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("could not listen for ctrl-c: {e}");
    }
    info!("shutting down");
    refresher.abort();
    Ok(())
}

fn game_line(game: &Game) -> String {
    format!(
        "{:<12} {}  {:<10} {}  [{}]",
        game.id,
        game.start_time.format("%Y-%m-%d %H:%MZ"),
        game.state,
        game.matchup(),
        game.status_detail
    )
}

/// `Ok(None)` when the invocation was fully handled (help, version).
fn handle_cli_args() -> anyhow::Result<Option<Command>> {
    parse_args(std::env::args().skip(1).collect())
}

fn parse_args(args: Vec<String>) -> anyhow::Result<Option<Command>> {
    let mut args = args.into_iter();
    let Some(arg) = args.next() else {
        return Ok(Some(Command::Serve));
    };

    let command = match arg.as_str() {
        "-h" | "--help" => {
            println!("{}", usage_text());
            return Ok(None);
        }
        "-V" | "--version" => {
            println!("gamecast {}", env!("CARGO_PKG_VERSION"));
            return Ok(None);
        }
        "serve" => Command::Serve,
        "games" => {
            let Some(league) = args.next() else {
                bail!("games needs a league\n\n{}", usage_text());
            };
            let league = league.parse::<League>().map_err(anyhow::Error::msg)?;
            let date = args
                .next()
                .map(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d"))
                .transpose()
                .context("date must be YYYY-MM-DD")?;
            Command::Games { league, date }
        }
        "game" => {
            let Some(id) = args.next() else {
                bail!("game needs an id\n\n{}", usage_text());
            };
            Command::Game { id }
        }
        "resolve" => {
            let Some(id) = args.next() else {
                bail!("resolve needs a game id\n\n{}", usage_text());
            };
            let feed = match args.next() {
                Some(feed) => feed.parse::<Feed>().map_err(anyhow::Error::msg)?,
                None => Feed::Home,
            };
            Command::Resolve { id, feed }
        }
        "alert" => {
            let (Some(game_id), Some(user_id), Some(lead)) =
                (args.next(), args.next(), args.next())
            else {
                bail!("alert needs <game_id> <user_id> <lead_minutes>\n\n{}", usage_text());
            };
            let lead_minutes = lead.parse::<u32>().context("lead_minutes must be a whole number")?;
            Command::Alert { game_id, user_id, lead_minutes }
        }
        "cancel" => {
            let Some(alert_id) = args.next() else {
                bail!("cancel needs an alert id\n\n{}", usage_text());
            };
            Command::Cancel { alert_id }
        }
        "user" => {
            let (Some(id), Some(email)) = (args.next(), args.next()) else {
                bail!("user needs <user_id> <email>\n\n{}", usage_text());
            };
            Command::User { id, email }
        }
        "override" => {
            let (Some(game_id), Some(home)) = (args.next(), args.next()) else {
                bail!(
                    "override needs <game_id> <home_url|-> [away_url|-] [league]\n\n{}",
                    usage_text()
                );
            };
            let away = args.next().unwrap_or_else(|| "-".to_owned());
            let league = args
                .next()
                .map(|l| l.parse::<League>())
                .transpose()
                .map_err(anyhow::Error::msg)?;
            let url = |raw: String| (raw != "-").then_some(raw);
            Command::Override { game_id, home: url(home), away: url(away), league }
        }
        _ => bail!("Unknown argument: {arg}\n\n{}", usage_text()),
    };

    if let Some(extra) = args.next() {
        bail!("Unexpected argument: {extra}\n\n{}", usage_text());
    }
    Ok(Some(command))
}

fn usage_text() -> &'static str {
    "gamecast - live game schedules, stream resolution and start-time alerts

Usage:
  gamecast [serve]
  gamecast games <nba|nfl|nhl|mlb> [YYYY-MM-DD]
  gamecast game <id>
  gamecast resolve <id> [home|away]
  gamecast alert <game_id> <user_id> <lead_minutes>
  gamecast cancel <alert_id>
  gamecast user <user_id> <email>
  gamecast override <game_id> <home_url|-> [away_url|-] [league]
  gamecast --help
  gamecast --version

Environment (also read from .env):
  GAMECAST_FEED_URL                Scoreboard API base URL
  GAMECAST_PLAYLIST_URL            Channel playlist (M3U) URL
  GAMECAST_STREAM_URL_TEMPLATE     Stream URL with an {id} placeholder
  GAMECAST_CURATED_PATH            Curated name → stream id JSON file
  GAMECAST_STORE_PATH              JSON file for overrides, alerts and users
  GAMECAST_WEBHOOK_URL             Alert delivery webhook (log only if unset)
  GAMECAST_GAMES_TTL_SECS          Game cache freshness (default 150)
  GAMECAST_STREAM_TTL_SECS         Stream URL cache freshness (default 600)
  GAMECAST_TICK_SECS               Alert sweep interval (default 60)
  GAMECAST_DIRECTORY_REFRESH_SECS  Playlist rebuild interval (default 21600)
  GAMECAST_SEARCH_DAYS             Forward search window for game ids (default 7)
  GAMECAST_WARMUP_MINUTES          Pre-game warmup window (default 30)
  GAMECAST_LIVE_GRACE_MINUTES      Assume live this long after start (default 5)
  GAMECAST_POSTPONE_AFTER_HOURS    Flag possible postponement after (default 3)
  GAMECAST_LOG                     Log level (default info)"
}
