use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::error;

use ometiff::io::ometiff::OmeTiffError;
use ometiff::prelude::*;
use ometiff::shape::normalize_shape;

#[derive(Parser, Debug)]
#[command(name = "ometiff", version, about = "Inspect OME-TIFF files and their metadata")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the canonical shape, dimension order and metadata of an image series
    Info {
        path: PathBuf,
        /// The image series to read
        #[arg(long, default_value_t = 0)]
        series: usize,
        /// Print the metadata record as JSON
        #[cfg(feature = "serde")]
        #[arg(long)]
        json: bool,
    },
    /// Write the embedded OME-XML document to a sidecar file
    ExportXml {
        path: PathBuf,
        /// Where to write the document, the input path with an `.xml` extension by default
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show how a shape and dimension order are expanded to the canonical five axes
    Normalize {
        /// Comma separated axis lengths, e.g. 2,10,3,20,20
        #[arg(long, value_delimiter = ',')]
        shape: Vec<usize>,
        #[arg(long, default_value = "STZCYX")]
        order: String,
    },
}

fn info(path: PathBuf, series: usize, json: bool) -> Result<(), OmeTiffError> {
    let outcome = OmeTiffReader::new(path).with_series(series).read()?;
    if json {
        #[cfg(feature = "serde")]
        {
            let text = serde_json::to_string_pretty(&outcome.metadata)
                .map_err(|e| OmeTiffError::IOError(e.into()))?;
            println!("{text}");
            return Ok(());
        }
    }
    println!(
        "{} {:?} {}",
        outcome.dimension_order,
        outcome.array.shape(),
        outcome.array.dtype()
    );
    for (name, value) in outcome.metadata.present_fields() {
        println!("{name}: {value}");
    }
    for (i, (name, channel)) in outcome.metadata.channels.iter().enumerate() {
        let fields: Vec<String> = channel
            .fields()
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        println!("Channel {i} {name}: {}", fields.join(" "));
    }
    for diagnostic in outcome.diagnostics.iter() {
        println!("note: {diagnostic}");
    }
    Ok(())
}

fn export_xml(path: PathBuf, out: Option<PathBuf>) -> Result<(), OmeTiffError> {
    let reader = OmeTiffReader::new(path);
    match reader.export_metadata_document(out.as_deref())? {
        Some(written) => println!("{}", written.display()),
        None => error!("{} has no OME-XML document", reader.path().display()),
    }
    Ok(())
}

fn normalize(shape: Vec<usize>, order: String) -> Result<(), OmeTiffError> {
    let order: DimensionOrder = order.parse()?;
    let (dims, canonical) = normalize_shape(&shape, &order)?;
    println!("{canonical} {dims:?}");
    println!("stored as {}", canonical.storage_form());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    let result = match cli.cmd {
        #[cfg(feature = "serde")]
        Command::Info { path, series, json } => info(path, series, json),
        #[cfg(not(feature = "serde"))]
        Command::Info { path, series } => info(path, series, false),
        Command::ExportXml { path, out } => export_xml(path, out),
        Command::Normalize { shape, order } => normalize(shape, order),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
