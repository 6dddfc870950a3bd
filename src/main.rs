use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

mod cli;

use cli::{Cli, Commands, ProgressReporter};
use extcarve::custody::{CustodyRecord, CustodySource};
use extcarve::reconstruct::{self, ExtractionResult, OffsetExtraction};
use extcarve::{logging, BlockSource, DiskImage, InodeRecord, ScanConfig, SignatureScanner};
use extcarve::{SignatureSet, Superblock};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Scan {
            image,
            out,
            chunk_size,
            types,
        } => run_scan(&image, out.as_deref(), chunk_size, types),
        Commands::Extract {
            image,
            offset,
            maxsize,
            outdir,
            ext,
            custody,
        } => {
            let request = OffsetExtraction::new(offset)
                .with_max_size(maxsize)
                .with_out_dir(outdir)
                .with_extension(ext);
            let result = reconstruct::extract_offset_from_image(&image, &request)
                .with_context(|| format!("Failed to extract from {:?} at {offset}", image))?;
            print_extraction(&result);
            if custody {
                write_custody(&image, &result, CustodySource::offset(offset, maxsize))?;
            }
            Ok(())
        }
        Commands::Superblock { image, json } => {
            let superblock = extcarve::ext::read_superblock(&image)
                .with_context(|| format!("Failed to read superblock of {:?}", image))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&superblock)?);
            } else {
                print_superblock(&superblock);
            }
            Ok(())
        }
        Commands::Inode { image, num, json } => {
            let record = extcarve::ext::read_inode(&image, num)
                .with_context(|| format!("Failed to read inode {num} of {:?}", image))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print_inode(&record);
            }
            Ok(())
        }
        Commands::RecoverInode {
            image,
            num,
            outdir,
            filename,
            custody,
        } => {
            let mut disk = DiskImage::open(&image)
                .with_context(|| format!("Failed to open image: {:?}", image))?;
            let (record, result) =
                reconstruct::recover_inode(&mut disk, num, &outdir, filename.as_deref())
                    .with_context(|| format!("Failed to recover inode {num}"))?;
            print_extraction(&result);
            if custody {
                let source = CustodySource::blocks(
                    Some(num),
                    record.superblock.block_size,
                    &record.inode.block,
                );
                write_custody(&image, &result, source)?;
            }
            Ok(())
        }
    }
}

fn run_scan(
    image: &Path,
    out: Option<&Path>,
    chunk_size: usize,
    types: Option<Vec<String>>,
) -> Result<()> {
    let mut signatures = SignatureSet::default();
    if let Some(names) = types {
        signatures.retain_names(&names);
        if signatures.is_empty() {
            bail!("None of the requested types are known: {}", names.join(","));
        }
    }

    let config = ScanConfig::default().with_chunk_size(chunk_size);
    let scanner =
        SignatureScanner::new(signatures, config).context("Invalid scan configuration")?;
    let mut disk =
        DiskImage::open(image).with_context(|| format!("Failed to open image: {:?}", image))?;

    // The bar would interleave with JSON on stdout.
    let progress = match out {
        Some(_) => ProgressReporter::for_scan(disk.size()?),
        None => ProgressReporter::hidden(),
    };

    let mut matches = Vec::new();
    scanner
        .scan_with_progress(
            &mut disk,
            |m| {
                matches.push(m);
                progress.set_matches(matches.len());
            },
            |scanned| progress.set_position(scanned),
        )
        .with_context(|| format!("Scan of {:?} failed", image))?;
    progress.finish("scan complete");

    match out {
        Some(path) => {
            let mut writer = BufWriter::new(
                File::create(path).with_context(|| format!("Failed to create {:?}", path))?,
            );
            serde_json::to_writer_pretty(&mut writer, &matches)?;
            writer.flush()?;
            println!("{} matches written to {}", matches.len(), path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            serde_json::to_writer_pretty(&mut lock, &matches)?;
            writeln!(lock)?;
        }
    }
    Ok(())
}

fn write_custody(
    image: &Path,
    result: &ExtractionResult,
    source: CustodySource,
) -> Result<PathBuf> {
    let sidecar = CustodyRecord::new(image, result, source)
        .write_sidecar(&result.path)
        .context("Failed to write chain-of-custody record")?;
    println!("Custody:  {}", sidecar.display());
    Ok(sidecar)
}

fn print_extraction(result: &ExtractionResult) {
    println!("Output:   {}", result.path.display());
    println!("Bytes:    {}", result.bytes_written);
    println!("SHA-256:  {}", result.sha256);
}

fn print_superblock(sb: &Superblock) {
    println!(
        "Magic:             0x{:04X}{}",
        sb.magic,
        if sb.is_valid() { "" } else { " (not ext2/3/4)" }
    );
    println!("Block size:        {}", sb.block_size);
    println!("Inode size:        {}", sb.inode_size);
    println!("Inodes:            {} ({} free)", sb.inodes_count, sb.free_inodes_count);
    println!("Blocks:            {} ({} free)", sb.blocks_count_lo, sb.free_blocks_count_lo);
    println!("Blocks per group:  {}", sb.blocks_per_group);
    println!("Inodes per group:  {}", sb.inodes_per_group);
    println!("First data block:  {}", sb.first_data_block);
    println!("UUID:              {}", sb.uuid_hex());
}

fn print_inode(record: &InodeRecord) {
    let inode = &record.inode;
    println!("Inode:       {} at offset {}", record.number, record.offset);
    println!("Kind:        {:?}", inode.file_kind());
    println!("Mode:        0o{:06o}", inode.mode);
    println!("Owner:       {}:{}", inode.uid, inode.gid);
    println!("Size:        {}", inode.size);
    println!("Links:       {}", inode.links_count);
    println!(
        "Times:       a={} c={} m={} d={}",
        inode.atime, inode.ctime, inode.mtime, inode.dtime
    );
    if inode.is_deleted() {
        println!("Status:      deleted");
    }
    if inode.uses_extents() {
        println!("Layout:      extent tree");
    }
    let direct: Vec<String> = inode.direct_blocks().map(|b| b.to_string()).collect();
    println!("Direct:      [{}]", direct.join(", "));
    println!("Pointers:    {:?}", inode.block);
}
