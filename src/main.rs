use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use photonotes::capture::{CaptureSession, FileImportDevice};
use photonotes::config::Config;
use photonotes::storage::{self, KeyValueStore, MemoryStore};
use photonotes::{logging, GalleryController, PhotoCollection, PhotoRef};

enum Command {
    Import(Vec<PathBuf>),
    Gallery(GalleryCommand),
}

/// Commands that work on the notes of existing photos
enum GalleryCommand {
    List,
    Show(String),
    Edit {
        target: String,
        location: Option<String>,
        description: Option<String>,
    },
    Delete(String),
    Prune,
}

struct Args {
    config_path: Option<PathBuf>,
    command: Command,
}

fn usage_error(message: &str) -> ! {
    eprintln!("Error: {}", message);
    print_help();
    std::process::exit(1);
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut config_path = None;
    let mut positional = Vec::new();
    let mut location = None;
    let mut description = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("photonotes {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" | "--location" | "-l" | "--description" | "-d" => {
                let flag = args[i].as_str();
                let value = match args.get(i + 1) {
                    Some(v) => v.clone(),
                    None => usage_error(&format!("{} requires a value", flag)),
                };
                match flag {
                    "--config" | "-c" => config_path = Some(PathBuf::from(value)),
                    "--location" | "-l" => location = Some(value),
                    _ => description = Some(value),
                }
                i += 1;
            }
            other if other.starts_with('-') && other.len() > 1 => {
                usage_error(&format!("unknown option {}", other));
            }
            other => positional.push(other.to_string()),
        }
        i += 1;
    }

    let mut positional = positional.into_iter();
    let command = match positional.next().as_deref() {
        Some("import") => {
            let files: Vec<PathBuf> = positional.by_ref().map(PathBuf::from).collect();
            if files.is_empty() {
                usage_error("import needs at least one file");
            }
            Command::Import(files)
        }
        Some("list") | None => Command::Gallery(GalleryCommand::List),
        Some("show") => Command::Gallery(GalleryCommand::Show(required(positional.next(), "show"))),
        Some("edit") => {
            let target = required(positional.next(), "edit");
            if location.is_none() && description.is_none() {
                usage_error("edit needs --location and/or --description");
            }
            Command::Gallery(GalleryCommand::Edit {
                target,
                location: location.take(),
                description: description.take(),
            })
        }
        Some("delete") => {
            Command::Gallery(GalleryCommand::Delete(required(positional.next(), "delete")))
        }
        Some("prune") => Command::Gallery(GalleryCommand::Prune),
        Some(other) => usage_error(&format!("unknown command {}", other)),
    };

    if let Some(extra) = positional.next() {
        usage_error(&format!("unexpected argument {}", extra));
    }
    if location.is_some() || description.is_some() {
        usage_error("--location and --description only apply to edit");
    }

    Args {
        config_path,
        command,
    }
}

fn required(value: Option<String>, command: &str) -> String {
    match value {
        Some(v) => v,
        None => usage_error(&format!("{} needs a photo (number, path or URI)", command)),
    }
}

fn print_help() {
    println!(
        r#"photonotes - keep location and description notes for your photos

USAGE:
    photonotes [OPTIONS] [COMMAND]

COMMANDS:
    import FILE...                  Copy image files into the photo library
    list                            List photos with their notes (default)
    show PHOTO                      Show the notes of one photo
    edit PHOTO [-l TEXT] [-d TEXT]  Set location and/or description
    delete PHOTO                    Clear the notes of a photo (the photo is kept)
    prune                           Drop notes of photos no longer in the library

PHOTO is a number from `list`, a file path or a photo URI.

OPTIONS:
    --config, -c PATH        Path to config file
    --location, -l TEXT      Location for edit
    --description, -d TEXT   Description for edit
    --version, -V            Show version
    --help, -h               Show this help message

ENVIRONMENT:
    PHOTONOTES_CONFIG   Path to config file (overrides default location)
    PHOTONOTES_LOG      Log filter (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/photonotes/config.toml"#
    );
}

/// Accept a 1-based index into the collection, a URI, or a file path.
fn resolve_photo(target: &str, photos: &PhotoCollection) -> Result<PhotoRef> {
    if let Ok(index) = target.parse::<usize>() {
        return index
            .checked_sub(1)
            .and_then(|i| photos.get(i))
            .cloned()
            .with_context(|| format!("No photo number {} (library has {})", index, photos.len()));
    }
    if target.contains("://") {
        return Ok(PhotoRef::new(target));
    }
    let path = PathBuf::from(target)
        .canonicalize()
        .with_context(|| format!("Cannot find photo {}", target))?;
    Ok(PhotoRef::from_path(&path))
}

fn import(config: &Config, photos: PhotoCollection, files: Vec<PathBuf>) -> Result<()> {
    let device = FileImportDevice::new(config.library.path.clone());
    let mut session = CaptureSession::with_photos(device, photos);

    if !session.request_permission().is_granted() {
        bail!(
            "Cannot write to photo library {}",
            config.library.path.display()
        );
    }

    for file in files {
        session.device_mut().queue(file);
    }
    while session.device_mut().pending() > 0 {
        match session.take_picture() {
            Ok(photo) => println!("{}  {}", session.photos().len(), photo),
            Err(e) => eprintln!("Skipped: {}", e),
        }
    }
    Ok(())
}

fn print_tile(number: usize, photo: &PhotoRef, location: &str, description: &str) {
    println!("{:>3}  {}", number, photo);
    if !location.is_empty() {
        println!("     location:    {}", location);
    }
    if !description.is_empty() {
        println!("     description: {}", description);
    }
}

fn run(gallery: &mut GalleryController, command: GalleryCommand) -> Result<()> {
    match command {
        GalleryCommand::List => {
            let tiles = gallery.tiles();
            if tiles.is_empty() {
                println!("No photos yet. Use `photonotes import FILE...`.");
            }
            for (i, tile) in tiles.iter().enumerate() {
                print_tile(
                    i + 1,
                    &tile.photo,
                    &tile.metadata.location,
                    &tile.metadata.description,
                );
            }
        }
        GalleryCommand::Show(target) => {
            let photo = resolve_photo(&target, gallery.photos())?;
            let notes = gallery.current_metadata(&photo);
            let number = gallery
                .photos()
                .iter()
                .position(|p| p == &photo)
                .map(|i| i + 1)
                .unwrap_or(0);
            print_tile(number, &photo, &notes.location, &notes.description);
        }
        GalleryCommand::Edit {
            target,
            location,
            description,
        } => {
            let photo = resolve_photo(&target, gallery.photos())?;
            let session = gallery.select_photo(&photo)?;
            // Fields left out keep their current value
            let mut values = session.values();
            if let Some(location) = location {
                values.location = location;
            }
            if let Some(description) = description {
                values.description = description;
            }
            gallery.save(&values.location, &values.description)?;
            println!("Saved notes for {}", photo);
        }
        GalleryCommand::Delete(target) => {
            let photo = resolve_photo(&target, gallery.photos())?;
            if gallery.delete_photo(&photo)? {
                println!("Cleared notes for {}", photo);
            } else {
                println!("{} had no notes", photo);
            }
        }
        GalleryCommand::Prune => {
            let removed = gallery.prune();
            println!("Removed notes for {} missing photo(s)", removed);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();

    let config = match &args.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    // Logging is best effort; a broken log directory must not block the notes
    let log_guard = logging::init(&config.logging).ok().flatten();

    let photos =
        PhotoCollection::from_directory(&config.library.path, &config.library.image_extensions)?;

    let command = match args.command {
        Command::Import(files) => return import(&config, photos, files),
        Command::Gallery(command) => command,
    };

    let backend: Arc<dyn KeyValueStore> = match storage::open(&config.storage) {
        Ok(backend) => backend,
        Err(e) => {
            tracing::error!(error = %e, "Metadata storage unavailable, changes will not be saved");
            eprintln!("Warning: {} (changes will not be saved)", e);
            Arc::new(MemoryStore::new())
        }
    };

    let mut gallery = GalleryController::open(photos, backend);
    if !gallery.is_persistent() {
        eprintln!("Warning: stored notes could not be read, changes will not be saved");
    }
    let result = run(&mut gallery, command);
    gallery.flush().await;

    if gallery.writer().stats().failed() > 0 {
        eprintln!("Warning: notes could not be written to storage, see the log for details");
    }

    // Write out buffered log lines before exit
    drop(log_guard);
    result
}
