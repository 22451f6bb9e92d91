use crate::coverage::SourceLineMap;
use crate::debugger::address::GlobalAddress;
use crate::debugger::error::Error;
use gimli::{Reader, RunTimeEndian};
use object::{Object, ObjectKind, ObjectSection, SectionKind};
use std::borrow::Cow;
use std::fs;
use std::ops::Range;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

/// Statement start of a source line, as recorded in `.debug_line`.
#[derive(Debug, Clone, PartialEq)]
pub struct LineRecord {
    /// Normalized source file path.
    pub file: PathBuf,
    pub line: u64,
    pub address: GlobalAddress,
}

/// Line information of an object file (executable or shared library).
pub struct DebugInformation {
    /// true for position independent objects, they are loaded at some base address.
    relocatable: bool,
    records: Vec<LineRecord>,
}

impl DebugInformation {
    /// Read line programs of an object file.
    /// Only statement starts located in code sections are kept.
    ///
    /// # Arguments
    ///
    /// * `path`: path to object file
    pub fn load(path: &Path) -> Result<Self, Error> {
        let file = fs::File::open(path)?;
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        let object = object::File::parse(&*mmap)?;

        let code_ranges: Vec<Range<u64>> = object
            .sections()
            .filter(|section| section.kind() == SectionKind::Text)
            .map(|section| section.address()..section.address() + section.size())
            .collect();

        let endian = if object.is_little_endian() {
            RunTimeEndian::Little
        } else {
            RunTimeEndian::Big
        };
        let dwarf = gimli::Dwarf::load(|id| load_section(id, &object, endian))?;

        let mut records = vec![];
        let mut units = dwarf.units();
        while let Some(header) = units.next()? {
            let unit = dwarf.unit(header)?;
            let Some(program) = unit.line_program.clone() else {
                continue;
            };

            let files = parse_files(&dwarf, &unit, program.header())?;
            let mut rows = program.rows();
            while let Some((_, row)) = rows.next_row()? {
                if row.end_sequence() || !row.is_stmt() {
                    continue;
                }
                let Some(line) = row.line() else {
                    continue;
                };
                let address = GlobalAddress::from(row.address());
                if !code_ranges.iter().any(|range| address.in_range(range)) {
                    continue;
                }
                let Some(file) = files.get(row.file_index() as usize) else {
                    continue;
                };

                records.push(LineRecord {
                    file: file.clone(),
                    line: line.get(),
                    address,
                });
            }
        }

        Ok(Self {
            relocatable: object.kind() == ObjectKind::Dynamic,
            records,
        })
    }

    /// True if object is position independent and its addresses must be relocated.
    pub fn is_relocatable(&self) -> bool {
        self.relocatable
    }

    pub fn records(&self) -> &[LineRecord] {
        &self.records
    }

    /// Build source line map with addresses relocated by module base.
    ///
    /// # Arguments
    ///
    /// * `base`: module load base
    pub fn source_lines(&self, base: u64) -> SourceLineMap {
        let mut map = SourceLineMap::default();
        for record in &self.records {
            map.insert(&record.file, record.line, record.address.relocate(base));
        }
        map
    }
}

fn load_section<'a: 'b, 'b, OBJ, Endian>(
    id: gimli::SectionId,
    file: &'a OBJ,
    endian: Endian,
) -> Result<gimli::EndianRcSlice<Endian>, Error>
where
    OBJ: object::Object<'a, 'b>,
    Endian: gimli::Endianity,
{
    let data = file
        .section_by_name(id.name())
        .and_then(|section| section.uncompressed_data().ok())
        .unwrap_or(Cow::Borrowed(&[]));
    Ok(gimli::EndianRcSlice::new(Rc::from(&*data), endian))
}

fn parse_files<R: Reader>(
    dwarf: &gimli::Dwarf<R>,
    unit: &gimli::Unit<R>,
    header: &gimli::LineProgramHeader<R, R::Offset>,
) -> gimli::Result<Vec<PathBuf>> {
    let mut files = vec![];
    match header.file(0) {
        Some(file) => files.push(render_file_path(unit, file, header, dwarf)?),
        None => files.push(PathBuf::from("")),
    }
    let mut index = 1;
    while let Some(file) = header.file(index) {
        files.push(render_file_path(unit, file, header, dwarf)?);
        index += 1;
    }

    Ok(files)
}

fn render_file_path<R: Reader>(
    dw_unit: &gimli::Unit<R>,
    file: &gimli::FileEntry<R, R::Offset>,
    header: &gimli::LineProgramHeader<R, R::Offset>,
    sections: &gimli::Dwarf<R>,
) -> Result<PathBuf, gimli::Error> {
    let mut path = if let Some(ref comp_dir) = dw_unit.comp_dir {
        PathBuf::from(comp_dir.to_string_lossy()?.as_ref())
    } else {
        PathBuf::new()
    };

    if file.directory_index() != 0 {
        if let Some(directory) = file.directory(header) {
            path.push(
                sections
                    .attr_string(dw_unit, directory)?
                    .to_string_lossy()?
                    .as_ref(),
            );
        }
    }

    path.push(
        sections
            .attr_string(dw_unit, file.path_name())?
            .to_string_lossy()?
            .as_ref(),
    );

    Ok(normalize_path(&path))
}

/// Lexically collapse `.`, `..` and repeated separators, so different spellings
/// of a path produce the same key. Symlinks are not resolved.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) => {}
                _ => normalized.push(".."),
            },
            c => normalized.push(c.as_os_str()),
        }
    }

    if normalized.as_os_str().is_empty() {
        return PathBuf::from(".");
    }
    normalized
}
