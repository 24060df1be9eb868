//! # mmview
//!
//! Lists the groups and datasets of a container, marking the datasets that
//! are not contiguous, and prints elements of the selected ones through a
//! memory mapping of the file.
//!
//! ```bash
//! # List every dataset
//! mmview grid.npz
//!
//! # Also print the first 4 rows of `c`
//! mmview grid.npz -d c --rows 4
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use mmview::{
    AnyView, DatasetDescriptor, MappedFile, MetadataIndex, NpzContainer, ObjectKind, ObjectSource,
    VisitedObject,
};
use std::path::PathBuf;

/// mmview - zero-copy views of array containers
#[derive(Parser)]
#[command(name = "mmview")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Container file
    #[arg(value_name = "CONTAINER", default_value = "grid.npz")]
    container: PathBuf,

    /// Dataset whose elements are printed (repeatable)
    #[arg(short, long = "dataset", value_name = "NAME")]
    datasets: Vec<String>,

    /// Number of leading rows printed per dataset
    #[arg(short, long, default_value = "12")]
    rows: usize,

    /// Group whose datasets are indexed
    #[arg(long, default_value = "/")]
    root: String,

    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let mut container = NpzContainer::open(&cli.container)?;
    let index = MetadataIndex::build_from(&mut container, &cli.root)
        .with_context(|| format!("cannot enumerate {}", cli.container.display()))?;
    info!("{} datasets indexed", index.len());
    list(&mut container, &cli.root, &index)?;

    let file = MappedFile::open(&cli.container)?;
    for name in &cli.datasets {
        let desc = index
            .get(name)
            .with_context(|| format!("no contiguous dataset named {name:?}"))?;
        let view = file
            .any_view(desc)
            .with_context(|| format!("cannot view dataset {name:?}"))?;
        print_rows(name, &view, cli.rows)?;
    }
    Ok(())
}

/// Prints one line per object below `root`, in enumeration order.
fn list(container: &mut NpzContainer, root: &str, index: &MetadataIndex) -> Result<()> {
    let mut indexed = index.iter().peekable();
    container.visit(root, &mut |object: VisitedObject<'_>| match object.kind {
        ObjectKind::Group => println!("{} group", object.name),
        ObjectKind::Dataset(dataset) => {
            let offset = dataset.contiguous_offset();
            let is_this = |desc: &&DatasetDescriptor| {
                desc.name() == object.name && Some(desc.byte_offset()) == offset
            };
            match indexed.next_if(is_this) {
                Some(desc) => println!(
                    "{} dataset at offset {}, shape {:?}, {}",
                    desc.name(),
                    desc.byte_offset(),
                    desc.shape(),
                    desc.element_type()
                ),
                None => println!("{} dataset skipped", object.name),
            }
        }
    })?;
    Ok(())
}

/// Prints every element whose first index is below `rows`, one per line.
fn print_rows(name: &str, view: &AnyView<'_>, rows: usize) -> Result<()> {
    if view.ndim() == 0 {
        println!("{name} = {}", view.get(&[])?);
        return Ok(());
    }
    for row in 0..rows.min(view.shape()[0]) {
        let slab = view.subview(row)?;
        for (flat, value) in slab.values().enumerate() {
            let index = unravel(flat, slab.shape());
            let suffix: String = index.iter().map(|i| format!("[{i}]")).collect();
            println!("{name}[{row}]{suffix} = {value}");
        }
    }
    Ok(())
}

/// Row-major multi-index of the element at position `flat`.
fn unravel(mut flat: usize, shape: &[usize]) -> Vec<usize> {
    let mut index = vec![0; shape.len()];
    for (i, &extent) in index.iter_mut().zip(shape).rev() {
        *i = flat % extent;
        flat /= extent;
    }
    index
}
