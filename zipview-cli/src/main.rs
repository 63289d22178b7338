use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use log::*;
use memmap2::Mmap;
use structopt::*;

use piz::read::{FileMetadata, ZipArchive};
use zipview::native::*;
use zipview::persist::blob::ObjectUrl;
use zipview::persist::handle::DirectHandle;
use zipview::persist::proxy::{ProxyConfig, ProxyStream};
use zipview::*;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "zipview",
    about = "Lists a directory inside a .zip file, or saves one of its files"
)]
struct Opt {
    /// Pass multiple times for additional verbosity (info, debug, trace)
    #[structopt(short, long, parse(from_occurrences))]
    verbosity: usize,

    /// Change to the given directory before perfoming any operations.
    #[structopt(short = "C", long)]
    directory: Option<PathBuf>,

    /// The directory in the archive to list
    #[structopt(short, long, default_value = "")]
    prefix: String,

    /// Prefixes deeper than this are cut back to this many directories.
    #[structopt(long, default_value = "10")]
    max_depth: usize,

    /// Saves the file in the archive at this path instead of listing.
    #[structopt(short, long)]
    save: Option<String>,

    /// Where saved files go when there's no prompt to ask.
    #[structopt(long, default_value = ".")]
    downloads: Utf8PathBuf,

    /// The directory expected to serve streamsaver/mitm.html and streamsaver/sw.js
    #[structopt(long, default_value = ".")]
    served_root: Utf8PathBuf,

    /// Act as if we're in an insecure context: no prompt, no streaming.
    #[structopt(long)]
    insecure: bool,

    #[structopt(name("ZIP file"))]
    zip_path: PathBuf,
}

/// An entry in a piz archive, along with the archive to read it from.
struct PizEntry<'a> {
    archive: &'a ZipArchive<'a>,
    metadata: &'a FileMetadata<'a>,
}

impl ArchiveEntry for PizEntry<'_> {
    fn filename(&self) -> &str {
        self.metadata.path.as_str()
    }

    fn is_directory(&self) -> bool {
        self.metadata.is_dir()
    }

    fn uncompressed_size(&self) -> Option<u64> {
        Some(self.metadata.size as u64)
    }

    fn open(&self) -> io::Result<Box<dyn io::Read + Send + '_>> {
        self.archive.read(self.metadata).map_err(io::Error::other)
    }
}

fn main() -> Result<()> {
    let args = Opt::from_args();

    let mut errlog = stderrlog::new();
    errlog.verbosity(args.verbosity + 1);
    errlog.init()?;

    if let Some(chto) = &args.directory {
        std::env::set_current_dir(chto)
            .with_context(|| format!("Couldn't set working directory to {}", chto.display()))?;
    }

    info!("Memory mapping {:#?}", &args.zip_path);
    let zip_file = File::open(&args.zip_path).context("Couldn't open zip file")?;
    let mapping = unsafe { Mmap::map(&zip_file).context("Couldn't mmap zip file")? };

    let archive = ZipArchive::with_prepended_data(&mapping)
        .context("Couldn't load archive")?
        .0;
    let entries: Vec<PizEntry> = archive
        .entries()
        .iter()
        .map(|metadata| PizEntry {
            archive: &archive,
            metadata,
        })
        .collect();

    match &args.save {
        Some(path) => save(&args, &entries, path),
        None => {
            print_listing(&entries, &ListingScope::new(args.prefix.as_str(), args.max_depth));
            Ok(())
        }
    }
}

fn print_listing(entries: &[PizEntry], scope: &ListingScope) {
    let listing = list(entries, scope);
    if listing.is_empty() {
        warn!("Nothing in {:?}", scope.canonical_prefix());
    }
    for dir in &listing.directories {
        println!("{:>12}  {dir}/", "");
    }
    for file in &listing.files {
        println!("{:>12}  {}", file.metadata.size, file.filename());
    }
}

fn save(args: &Opt, entries: &[PizEntry], path: &str) -> Result<()> {
    let entry = entries
        .iter()
        .find(|e| e.filename() == path)
        .with_context(|| format!("No file in the archive with the path {path}"))?;

    let secure = !args.insecure;
    // Only offer a prompt if someone's there to answer it.
    let stdin = io::stdin();
    let picker = stdin
        .is_terminal()
        .then(|| TerminalPicker::new(stdin.lock(), args.downloads.clone()));

    let downloader = Downloader::standard(
        DirectHandle::new(secure, picker),
        ProxyStream::new(
            secure,
            ProxyConfig::default(),
            ServedDir::new(args.served_root.clone()),
            DownloadsDir::new(args.downloads.clone()),
        ),
        ObjectUrl::new(DownloadsDir::new(args.downloads.clone())),
    );

    match downloader
        .download(entry)
        .with_context(|| format!("Couldn't save {path}"))?
    {
        DownloadMethod::Cancelled => info!("Didn't save {path}"),
        method => println!("Saved {path} ({method})"),
    }
    Ok(())
}
