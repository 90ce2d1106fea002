//! Console rendering of filesystem results
//!
//! These helpers turn [`Filesystem`] results into text on any
//! [`core::fmt::Write`] sink. Failures are printed as an `ERROR` line and do
//! not end the command loop; only a failing sink returns `Err`.

use crate::FsError;
use crate::fat::{Filesystem, Usage};
use core::fmt::{self, Write};
use drivers::BlockDevice;

/// Width of the `ps` usage bar in cells
pub const BAR_WIDTH: u64 = 50;

const RED: &str = "\x1b[31m";
const MAGENTA: &str = "\x1b[35m";
const BLUE: &str = "\x1b[34m";
const RESET: &str = "\x1b[0m";

pub fn error<W: Write>(out: &mut W, err: &FsError) -> fmt::Result {
    writeln!(out, "{RED}ERROR{RESET} {err}")
}

pub fn prompt<D: BlockDevice, W: Write>(out: &mut W, fs: &Filesystem<'_, D>) -> fmt::Result {
    write!(out, "{}> ", fs.current_path())
}

/// List the current directory in on-disk order, directories as `name/`
pub fn ls<D: BlockDevice, W: Write>(out: &mut W, fs: &Filesystem<'_, D>) -> fmt::Result {
    for entry in fs.list() {
        match entry {
            Ok(e) if e.is_dir() => writeln!(out, "{BLUE}{}/{RESET}", e.name)?,
            Ok(e) => writeln!(out, "{}  {}", e.name, e.size)?,
            Err(err) => return error(out, &err),
        }
    }
    Ok(())
}

pub fn cd<D: BlockDevice, W: Write>(
    out: &mut W,
    fs: &mut Filesystem<'_, D>,
    path: &str,
) -> fmt::Result {
    match fs.cd(path) {
        Ok(()) => Ok(()),
        Err(FsError::NotFound) => {
            writeln!(out, "{RED}ERROR{RESET} no such directory: {path}")
        }
        Err(err) => error(out, &err),
    }
}

/// Print a file through `scratch`, which bounds how much is shown
pub fn cat<D: BlockDevice, W: Write>(
    out: &mut W,
    fs: &Filesystem<'_, D>,
    path: &str,
    scratch: &mut [u8],
) -> fmt::Result {
    let n = match fs.read_file(path, scratch) {
        Ok(n) => n,
        Err(err) => return error(out, &err),
    };
    match core::str::from_utf8(&scratch[..n]) {
        Ok(text) => out.write_str(text)?,
        Err(_) => {
            for &b in &scratch[..n] {
                out.write_char(char::from(b))?;
            }
        }
    }
    if n > 0 && scratch[n - 1] != b'\n' {
        out.write_char('\n')?;
    }
    Ok(())
}

/// Disk usage as a bar plus used/total MiB
pub fn ps<D: BlockDevice, W: Write>(out: &mut W, fs: &Filesystem<'_, D>) -> fmt::Result {
    match fs.usage() {
        Ok(usage) => disk_line(out, &usage),
        Err(err) => error(out, &err),
    }
}

fn disk_line<W: Write>(out: &mut W, usage: &Usage) -> fmt::Result {
    write!(out, "{MAGENTA}Disk{RESET}   ")?;
    bar(out, usage.used_mib(), usage.total_mib(), BAR_WIDTH)?;
    writeln!(out, " {}MB / {}MB", usage.used_mib(), usage.total_mib())
}

pub fn bar<W: Write>(out: &mut W, used: u64, total: u64, width: u64) -> fmt::Result {
    let filled = if total == 0 {
        0
    } else {
        (used.min(total) * width) / total
    };
    out.write_char('[')?;
    for i in 0..width {
        out.write_char(if i < filled { '#' } else { ' ' })?;
    }
    out.write_char(']')
}
