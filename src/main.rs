// main.rs - main program
//
// mini-irc-server - simple IRC server
// Copyright (C) 2022  Mateusz Szpakowski
//
// This library is free software; you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public
// License as published by the Free Software Foundation; either
// version 2.1 of the License, or (at your option) any later version.
//
// This library is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this library; if not, write to the Free Software
// Foundation, Inc., 51 Franklin Street, Fifth Floor, Boston, MA  02110-1301  USA

use clap::Parser;
use std::error::Error;
use tracing::*;

mod command;
mod config;
mod reply;
mod state;
mod utils;

use config::{Cli, MainConfig};

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if cli.gen_password_hash {
        let password = rpassword::prompt_password("Password: ")?;
        println!("Password hash: {}", utils::argon2_hash_password(&password));
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = MainConfig::new(cli)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        match state::run_server(config).await {
            Ok((_, handle)) => {
                if let Err(e) = handle.await {
                    error!("Server error: {}", e);
                }
            }
            Err(e) => {
                error!("Can't run server: {}", e);
            }
        }
    });
    Ok(())
}
