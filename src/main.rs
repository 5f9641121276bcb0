use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

mod analytics;
mod app;
mod cli;
mod config;
mod corpus;
mod dates;
mod semantic;
mod source;
#[cfg(test)]
mod tests;
mod web;

use app::factory::AppFactory;
use cli::Command;
use source::Table;

fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = cli::Args::parse();
    let mut config = AppFactory::load_config(args.base_path)?;

    if let Command::Serve { bind: Some(bind) } = &args.command {
        config.server.bind = bind.clone();
    }

    let app = AppFactory::create_app(config);

    match args.command {
        Command::Serve { .. } => web::start_daemon(app),

        Command::Recommend { description, top_n } => {
            app.validate_recommend(&description, top_n)?;

            if !app.engine_status().initialized {
                let spinner = spinner("loading embedding model and movie descriptions");
                let warmed = app.warm_up();
                spinner.finish_and_clear();
                warmed?;
            }

            print_json(&app.recommend(&description, top_n)?)
        }

        Command::Movies { limit, csv } => {
            if csv {
                print_csv(&app.movies_table()?)
            } else {
                print_json(&app.movies(limit)?)
            }
        }

        Command::Check { csv } => {
            let table = app.connection_check()?;
            if csv {
                print_csv(&table)
            } else {
                print_json(&table)
            }
        }

        Command::Rentals { year } => print_json(&app.daily_rentals(year)?),

        Command::Revenue {} => print_json(&app.revenue()?),

        Command::TopMovies { year, limit } => print_json(&app.top_movies(year, limit)?),

        Command::Customer { id, history, top } => {
            let mut value = json!({ "customer": app.customer(id)? });
            if history {
                value["rentals"] = serde_json::to_value(app.rental_history(id)?)?;
            }
            if top {
                value["top_movies"] = serde_json::to_value(app.customer_top_movies(id, None)?)?;
            }
            print_json(&value)
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} ({elapsed})") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_csv(table: &Table) -> anyhow::Result<()> {
    table.write_csv(std::io::stdout().lock())?;
    Ok(())
}
