use anyhow::Result;
use clap::{Parser, Subcommand};

mod annotate;
mod config;
mod display;
mod enroll;
mod run;
mod session;

use config::Config;

#[derive(Parser)]
#[command(name = "rollcall", about = "Face-recognition attendance tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the live attendance loop
    Run,
    /// List enrolled identities
    List,
    /// List available capture devices
    Devices,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Run => run::run(config),
        Commands::List => list(&config),
        Commands::Devices => {
            devices();
            Ok(())
        }
    }
}

fn list(config: &Config) -> Result<()> {
    let store = rollcall_store::GalleryStore::new(&config.faces_dir);
    let gallery = store.load()?;

    if gallery.is_empty() {
        println!("No identities enrolled in {}", store.dir().display());
        return Ok(());
    }

    for identity in gallery.iter() {
        println!(
            "{}\t{}\t{}",
            identity.name, identity.roll_number, identity.section
        );
    }
    Ok(())
}

fn devices() {
    let devices = rollcall_hw::Camera::list_devices();
    if devices.is_empty() {
        println!("No video capture devices found");
        return;
    }
    for device in devices {
        println!("{}\t{}\t({})", device.path, device.name, device.driver);
    }
}
