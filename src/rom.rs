// Copyright 2018 Ian Johnson

// This file is part of Chip-8 Harness.

// Chip-8 Harness is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Chip-8 Harness is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Chip-8 Harness.  If not, see <http://www.gnu.org/licenses/>.

//! Sources of ROM images.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use failure::{Error, ResultExt};

/// An error resulting from a ROM that does not exist.
#[derive(Debug, Fail)]
#[fail(display = "no ROM named '{}'", _0)]
pub struct RomNotFoundError(pub String);

/// An error resulting from a ROM name that points outside its directory.
#[derive(Debug, Fail)]
#[fail(display = "invalid ROM name '{}'", _0)]
pub struct InvalidRomNameError(pub String);

/// Something ROMs can be fetched from by name.
pub trait RomSource {
    /// Returns the bytes of the named ROM.
    fn fetch(&self, name: &str) -> Result<Vec<u8>, Error>;
}

impl RomSource for HashMap<String, Vec<u8>> {
    fn fetch(&self, name: &str) -> Result<Vec<u8>, Error> {
        self.get(name)
            .cloned()
            .ok_or_else(|| RomNotFoundError(name.to_owned()).into())
    }
}

/// A directory of ROM files.
#[derive(Debug, Clone)]
pub struct RomDirectory {
    root: PathBuf,
}

impl RomDirectory {
    /// Returns a source reading ROMs from the given directory.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        RomDirectory {
            root: root.as_ref().to_owned(),
        }
    }

    /// Returns the names of the files in the directory, sorted.
    pub fn list(&self) -> Result<Vec<String>, Error> {
        let mut names = Vec::new();
        let entries = fs::read_dir(&self.root)
            .with_context(|_| format!("could not read directory '{}'", self.root.display()))?;
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Resolves a ROM name to a path, refusing anything but a plain file
    /// name.
    fn resolve(&self, name: &str) -> Result<PathBuf, InvalidRomNameError> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.root.join(name)),
            _ => Err(InvalidRomNameError(name.to_owned())),
        }
    }
}

impl RomSource for RomDirectory {
    fn fetch(&self, name: &str) -> Result<Vec<u8>, Error> {
        let path = self.resolve(name)?;
        if !path.is_file() {
            return Err(RomNotFoundError(name.to_owned()).into());
        }
        let mut data = Vec::new();
        File::open(&path)
            .with_context(|_| format!("could not open file '{}'", path.display()))?
            .read_to_end(&mut data)
            .with_context(|_| format!("could not read file '{}'", path.display()))?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::env;
    use std::fs::{self, File};
    use std::io::Write;

    use super::*;

    #[test]
    fn in_memory_source() {
        let mut roms: HashMap<String, Vec<u8>> = HashMap::new();
        roms.insert("pong".to_owned(), vec![0x12, 0x00]);

        assert_eq!(roms.fetch("pong").unwrap(), vec![0x12, 0x00]);
        assert!(roms.fetch("tetris").is_err());
    }

    #[test]
    fn directory_source() {
        let dir = env::temp_dir().join(format!("chip8-harness-roms-{}", ::std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        File::create(dir.join("b.ch8"))
            .unwrap()
            .write_all(&[0x00, 0xE0])
            .unwrap();
        File::create(dir.join("a.ch8"))
            .unwrap()
            .write_all(&[0x12, 0x00])
            .unwrap();

        let roms = RomDirectory::new(&dir);
        assert_eq!(roms.list().unwrap(), vec!["a.ch8", "b.ch8"]);
        assert_eq!(roms.fetch("b.ch8").unwrap(), vec![0x00, 0xE0]);
        assert!(roms.fetch("c.ch8").is_err());
        assert!(roms.fetch("../a.ch8").is_err());
        assert!(roms.fetch("/etc/passwd").is_err());
        assert!(roms.fetch("").is_err());

        fs::remove_dir_all(&dir).unwrap();
    }
}
