use std::{
  future::pending,
  io::{self, Write},
  path::PathBuf,
  time::Duration,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clap_verbosity_flag::Verbosity;
use colored::Colorize;
use prettytable::{format, Attr, Cell, Row, Table};
use tokio::io::{AsyncBufReadExt, BufReader};

use clocky::config::{self, Config};
use clocky::render;
use clocky::status::StatusFile;
use clocky::time::DurationExt;
use clocky::{RunState, Session};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
  #[command(subcommand)]
  command: Command,
  /// Config file to use. [default: ${XDG_CONFIG_DIR}/clocky/config.toml]
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,
  #[command(flatten)]
  verbose: Verbosity,
}

#[derive(Debug, Subcommand)]
enum Command {
  /// Start the stopwatch and show it until you quit
  ///
  /// While running, type a command and press enter:
  ///
  /// p (or just enter) - pause or resume
  ///
  /// s - start
  ///
  /// r - stop and reset
  ///
  /// q - quit
  Run {
    /// Print one JSON frame per redraw instead of drawing the stopwatch
    #[arg(short, long, default_value_t = false)]
    json: bool,
    /// Quit once the stopwatch shows this much time, e.g. 90s or 1h30m
    #[arg(short = 'f', long = "for", value_parser = Duration::from_human)]
    limit: Option<Duration>,
  },
  /// Inspect or create the config file
  Config {
    #[command(subcommand)]
    action: ConfigAction,
  },
  /// Delete the status and configuration files
  Purge,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
  /// Print the configuration in effect
  Show,
  /// Write a default config file if there is none
  Init,
}

enum Input {
  Toggle,
  Start,
  Reset,
  Quit,
  Unknown,
}

impl Input {
  fn parse(line: &str) -> Self {
    match line.trim() {
      "" | "p" => Input::Toggle,
      "s" => Input::Start,
      "r" => Input::Reset,
      "q" => Input::Quit,
      _ => Input::Unknown,
    }
  }
}

fn draw(session: &Session, json: bool) -> Result<()> {
  let frame = session.frame();

  if json {
    println!("{}", serde_json::to_string(&frame)?);
    return Ok(());
  }

  let state = match frame.state {
    RunState::Running => frame.state.to_string().green(),
    RunState::Paused => frame.state.to_string().yellow(),
    RunState::Reset => frame.state.to_string().dimmed(),
  };

  let prefilled = render::prefilled(frame.lap_count);
  let ring: String = render::full_circle()
    .step_by(3)
    .map(|angle| {
      let opacity = frame
        .ring
        .iter()
        .find(|dot| dot.angle == angle)
        .map_or(0.0, |dot| dot.opacity);

      if opacity >= 1.0 {
        "●"
      } else if opacity > 0.0 {
        "•"
      } else if prefilled {
        "·"
      } else {
        " "
      }
    })
    .collect();

  print!("\r{:>7}  {}  {}", state, frame.text.bold(), ring.cyan());
  io::stdout().flush()?;

  Ok(())
}

async fn run(config: Config, json: bool, limit: Option<Duration>) -> Result<()> {
  let status_file = StatusFile::new(&config.status_file_path);
  let mut session = Session::new(&config)
    .with_hooks(config.hooks_directory.clone())
    .with_status(config.status_format.clone(), status_file);

  if !json {
    println!("{}", "(p: pause/resume, s: start, r: reset, q: quit)".dimmed());
  }

  let mut elapsed = session.elapsed_millis();
  let reached_limit = async move {
    match limit {
      Some(limit) => {
        let limit_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
        if elapsed.wait_for(|ms| *ms >= limit_ms).await.is_err() {
          pending::<()>().await;
        }
      },
      None => pending::<()>().await,
    }
  };
  tokio::pin!(reached_limit);

  let ctrl_c = tokio::signal::ctrl_c();
  tokio::pin!(ctrl_c);

  let mut lines = BufReader::new(tokio::io::stdin()).lines();
  let mut stdin_open = true;
  let mut redraw = tokio::time::interval(config.refresh_interval);

  session.start_stopwatch();

  loop {
    tokio::select! {
      _ = redraw.tick() => draw(&session, json)?,
      line = lines.next_line(), if stdin_open => {
        match line.with_context(|| "Failed to read from stdin")? {
          Some(line) => match Input::parse(&line) {
            Input::Toggle => session.toggle(),
            Input::Start => session.start_stopwatch(),
            Input::Reset => session.stop_and_reset_stopwatch(),
            Input::Quit => break,
            Input::Unknown => log::warn!("Unknown command {:?}", line.trim()),
          },
          None => stdin_open = false,
        }
      },
      _ = &mut reached_limit => break,
      _ = &mut ctrl_c => break,
    }
  }

  session.pause_stopwatch();
  draw(&session, json)?;

  if !json {
    println!();
    let elapsed = session.stopwatch().elapsed();
    println!("Stopped after {}", elapsed.to_human().cyan());
  }

  session.shutdown().await;

  Ok(())
}

fn print_config(config: &Config, config_path: &std::path::Path) {
  let mut table = Table::new();

  table.set_titles(Row::new(vec![
    Cell::new("Setting").with_style(Attr::Underline(true)),
    Cell::new("Value").with_style(Attr::Underline(true)),
  ]));

  let rows = [
    ("config file", config_path.display().to_string()),
    ("tick interval", config.tick_interval.to_human()),
    ("sweep interval", config.sweep_interval.to_human()),
    ("refresh interval", config.refresh_interval.to_human()),
    ("display format", config.display_format.to_string()),
    ("status format", config.status_format.to_string()),
    ("utc offset", config.offset().to_string()),
    ("hooks directory", config.hooks_directory.display().to_string()),
    ("status file", config.status_file_path.display().to_string()),
  ];

  for (name, value) in rows {
    table.add_row(Row::new(vec![
      Cell::new(name).with_style(Attr::ForegroundColor(prettytable::color::BLUE)),
      Cell::new(&value),
    ]));
  }

  table.set_format(*format::consts::FORMAT_CLEAN);
  table.printstd();
}

#[tokio::main]
async fn main() -> Result<()> {
  human_panic::setup_panic!();

  let args = Args::parse();

  env_logger::Builder::new()
    .filter_level(args.verbose.log_level_filter())
    .init();

  let config_path =
    if let Some(conf_path) = args.config {
      conf_path
    } else {
      config::default_config_path()?
    };

  match args.command {
    Command::Run { json, limit } => {
      let config = Config::load(&config_path)?.unwrap_or_default();

      run(config, json, limit).await?;
    },
    Command::Config { action: ConfigAction::Show } => {
      let config = Config::load(&config_path)?.unwrap_or_default();

      print_config(&config, &config_path);
    },
    Command::Config { action: ConfigAction::Init } => {
      Config::init(&config_path)?;
    },
    Command::Purge => {
      let config = Config::load(&config_path)?.unwrap_or_default();

      if config.status_file_path.exists() {
        println!("Removing status file at {}", config.status_file_path.display().to_string().cyan());
        std::fs::remove_file(&config.status_file_path)?;
      }

      if config_path.exists() {
        println!("Removing config file at {}", config_path.display().to_string().cyan());
        std::fs::remove_file(&config_path)?;
      }
    },
  }

  Ok(())
}
