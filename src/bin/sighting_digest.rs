//! sighting_digest - pick one sighting from a day's partition
//!
//! Prints a JSON summary of the choice. Delivery (e-mail etc.) is left to
//! whatever consumes the output.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use birdcam::digest::{partition_for_date, pick_from_partition, pick_sighting};
use birdcam::storage::FilesystemBlobStore;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Root directory of the sighting blob store.
    #[arg(long, env = "BIRDCAM_BLOB_ROOT", default_value = "sightings")]
    root: PathBuf,
    /// Day to pick from (YYYY-MM-DD). Defaults to yesterday, local time.
    #[arg(long)]
    date: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let store = FilesystemBlobStore::new(&args.root)?;
    let mut rng = rand::thread_rng();

    let pick = match args.date.as_deref() {
        Some(date) => pick_from_partition(&store, &partition_for_date(date)?, &mut rng)?,
        None => pick_sighting(&store, &chrono::Local::now(), &mut rng)?,
    };
    match &pick.selected {
        Some(entry) => log::info!("selected {} of {} sightings", entry.key, pick.candidates),
        None => log::info!("no sightings found for {}", pick.partition),
    }

    println!("{}", serde_json::to_string_pretty(&pick)?);
    Ok(())
}
