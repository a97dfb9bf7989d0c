use std::fs::{self, File};
use std::io::Write;
use std::path::{Component, Path};

use anyhow::{bail, Context, Result};
use log::info;
use ustarfs::io::{BlockStorage, FileDisk, FileDiskBuilder};
use ustarfs::layout::IMAGE_SECTORS;
use ustarfs::{Image, Mode, Node, Stats};

/// Packs `source` and writes the image to `output`. Nothing is written unless
/// the whole tree could be placed.
pub fn build(source: &Path, output: &Path, root_name: &str) -> Result<Stats> {
    let tree = Node::from_path(source, root_name)
        .with_context(|| format!("Failed to read source tree {:?}", source))?;
    let image = ustarfs::build(&tree).context("Failed to build image")?;

    let mut disk = open_output(output)?;
    image
        .write_to(&mut disk)
        .with_context(|| format!("Failed to write image to {:?}", output))?;
    info!("image written to {:?}", output);

    Ok(image.reader()?.stats())
}

/// Block devices and other special files are written in place, anything else
/// is created or truncated.
fn open_output(output: &Path) -> Result<FileDisk> {
    match fs::metadata(output) {
        Ok(meta) if !meta.is_file() => FileDisk::open_disk(output, IMAGE_SECTORS)
            .with_context(|| format!("Failed to open {:?}", output)),
        _ => {
            let file = File::create(output)
                .with_context(|| format!("Failed to create {:?}", output))?;
            Ok(FileDiskBuilder::from(file)
                .with_sector_count(IMAGE_SECTORS)
                .clear_medium(false)
                .build()?)
        }
    }
}

fn load(image: &Path) -> Result<Image> {
    let mut disk = FileDisk::open_disk(image, IMAGE_SECTORS)
        .with_context(|| format!("Failed to open image {:?}", image))?;
    Image::read_from(&mut disk).with_context(|| format!("Failed to read image {:?}", image))
}

pub fn ls<W: Write>(image: &Path, out: &mut W) -> Result<()> {
    let image = load(image)?;
    let reader = image.reader()?;

    let mut lines = Vec::new();
    reader.walk(reader.root_address(), |depth, at, header| {
        let mode = match header.mode {
            Mode::Short => "short",
            Mode::Long => "long",
        };
        let suffix = if header.is_dir() { "/" } else { "" };
        lines.push(format!(
            "{:indent$}{}{}  {} {} {} bytes",
            "",
            header.name,
            suffix,
            at,
            mode,
            header.size,
            indent = depth * 2
        ));
    })?;

    for line in lines {
        writeln!(out, "{}", line)?;
    }
    let stats = reader.stats();
    writeln!(out, "{} sectors used, {} free", stats.used, stats.free)?;
    Ok(())
}

pub fn extract(image: &Path, dest: &Path) -> Result<()> {
    let image = load(image)?;
    let reader = image.reader()?;
    let tree = reader.load_tree(reader.root_address())?;

    match tree {
        Node::Directory { children, .. } => {
            fs::create_dir(dest).with_context(|| format!("Failed to create {:?}", dest))?;
            for child in &children {
                write_node(dest, child)?;
            }
        }
        Node::File { data, .. } => {
            fs::write(dest, data).with_context(|| format!("Failed to write {:?}", dest))?
        }
    }
    Ok(())
}

fn write_node(parent: &Path, node: &Node) -> Result<()> {
    let mut components = Path::new(node.name()).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => (),
        _ => bail!("Refusing to extract {:?} outside of {:?}", node.name(), parent),
    }
    let path = parent.join(node.name());
    match node {
        Node::File { data, .. } => {
            fs::write(&path, data).with_context(|| format!("Failed to write {:?}", path))
        }
        Node::Directory { children, .. } => {
            fs::create_dir(&path).with_context(|| format!("Failed to create {:?}", path))?;
            children.iter().try_for_each(|child| write_node(&path, child))
        }
    }
}
