// Solide - Solidity Workspace Engine
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Solide - a Solidity workspace from the terminal.
//!
//! Manages the files of a disk-backed workspace and compiles them through
//! the same engine an editor front end would use.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use eyre::Result;
use solide_common::{logging, SolideConfig};

mod cmd;

/// Command-line interface for Solide
#[derive(Debug, Parser)]
#[command(name = "solide")]
#[command(about = "Solide - a Solidity workspace with a virtual file system and a managed compiler")]
#[command(version)]
pub struct Cli {
    /// Configuration file (default: ~/.solide/config.toml)
    #[arg(long, env = "SOLIDE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the workspace files
    #[arg(long, env = "SOLIDE_STORE_DIR")]
    pub store_dir: Option<PathBuf>,

    /// Also write logs to a daily-rotated file
    #[arg(long)]
    pub log_file: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the workspace tree
    Ls,
    /// Create or overwrite a file from --file or standard input
    Write {
        /// Workspace path
        path: String,
        /// Read the content from this local file
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Print a file
    Cat {
        /// Workspace path
        path: String,
    },
    /// Delete a file, or a directory with --dir
    Rm {
        /// Workspace path
        path: String,
        /// Delete a directory and everything below it
        #[arg(long)]
        dir: bool,
    },
    /// Move or rename a file, or a directory with --dir
    Mv {
        /// Current path
        from: String,
        /// New path
        to: String,
        /// Pick a free name instead of failing when the target exists
        #[arg(long)]
        auto_rename: bool,
        /// Move a directory and everything below it
        #[arg(long)]
        dir: bool,
    },
    /// Create an empty directory
    Mkdir {
        /// Workspace path
        path: String,
    },
    /// Compile a file and print its diagnostics and interface
    Compile {
        /// Workspace path
        path: String,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete every file in the workspace
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    logging::init_logging("solide", cli.log_file)?;

    let mut config = SolideConfig::load(cli.config.clone())?;
    if let Some(dir) = &cli.store_dir {
        config.store.root = Some(dir.clone());
    }
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Ls => cmd::list(&config).await,
        Commands::Write { path, file } => cmd::write(&config, &path, file).await,
        Commands::Cat { path } => cmd::cat(&config, &path).await,
        Commands::Rm { path, dir } => cmd::remove(&config, &path, dir).await,
        Commands::Mv { from, to, auto_rename, dir } => {
            cmd::rename(&config, &from, &to, auto_rename, dir).await
        }
        Commands::Mkdir { path } => cmd::mkdir(&config, &path).await,
        Commands::Compile { path, json } => cmd::compile(&config, &path, json).await,
        Commands::Clear => cmd::clear(&config).await,
    }
}
