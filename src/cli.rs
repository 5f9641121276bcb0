use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Directory holding config.yaml and cached models.
    /// Defaults to $SAKILA_BASE_PATH, then ~/.local/share/sakila
    #[clap(long, global = true)]
    pub base_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP service.
    Serve {
        /// Address to listen on, overrides server.bind
        #[clap(long)]
        bind: Option<String>,
    },

    /// Recommend movies whose descriptions match free text
    Recommend {
        /// What the movie should be about
        description: String,

        /// Number of movies to return
        #[clap(short = 'n', long, allow_hyphen_values = true)]
        top_n: Option<i64>,
    },

    /// Show the movies available for recommendation
    Movies {
        /// Number of movies to preview
        #[clap(short, long, default_value = "10")]
        limit: usize,

        /// Print every movie as CSV instead
        #[clap(long, default_value = "false")]
        csv: bool,
    },

    /// Check the database connection
    Check {
        /// Print the result as CSV
        #[clap(long, default_value = "false")]
        csv: bool,
    },

    /// Daily rentals per store
    Rentals {
        /// Overrides analytics.year
        #[clap(short, long)]
        year: Option<i32>,
    },

    /// Total revenue per store
    Revenue {},

    /// Most rented movies per store
    TopMovies {
        /// Overrides analytics.year
        #[clap(short, long)]
        year: Option<i32>,

        /// Movies per store
        #[clap(short, long)]
        limit: Option<usize>,
    },

    /// Customer details
    Customer {
        id: i64,

        /// Include the full rental history
        #[clap(long, default_value = "false")]
        history: bool,

        /// Include the customer's most rented movies
        #[clap(long, default_value = "false")]
        top: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_recommend() {
        let args = Args::try_parse_from(["sakila", "recommend", "a dog saves the day", "-n", "5"])
            .unwrap();
        match args.command {
            Command::Recommend { description, top_n } => {
                assert_eq!(description, "a dog saves the day");
                assert_eq!(top_n, Some(5));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_negative_top_n() {
        let args = Args::try_parse_from(["sakila", "recommend", "dog", "-n", "-2"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Recommend { top_n: Some(-2), .. }
        ));
    }

    #[test]
    fn test_global_base_path() {
        let args =
            Args::try_parse_from(["sakila", "check", "--csv", "--base-path", "/tmp/x"]).unwrap();
        assert_eq!(args.base_path, Some(PathBuf::from("/tmp/x")));
        assert!(matches!(args.command, Command::Check { csv: true }));
    }
}
