use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "mkustar",
    about = "Build ustar disk images from a directory tree",
    version
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Pack a directory into a new image
    Build {
        /// Directory to pack
        source: PathBuf,

        /// Image file or block device to write
        #[arg(short = 'o', long = "output", default_value = "disk.img")]
        output: PathBuf,

        /// Name given to the top level directory
        #[arg(long = "root-name", default_value = "root")]
        root_name: String,
    },
    /// List the content of an image
    Ls {
        image: PathBuf,
    },
    /// Recreate the tree stored in an image on the host
    Extract {
        image: PathBuf,

        /// Directory to create, must not exist yet
        dest: PathBuf,
    },
}
