//! Hand-assembled ELF images for the integration tests.

#![allow(dead_code)]

pub const PT_LOAD: u32 = 1;
pub const PT_DYNAMIC: u32 = 2;

pub const SHT_PROGBITS: u32 = 1;
pub const SHT_SYMTAB: u32 = 2;
pub const SHT_STRTAB: u32 = 3;
pub const SHT_DYNAMIC: u32 = 6;
pub const SHT_DYNSYM: u32 = 11;

pub const DT_NULL: i64 = 0;
pub const DT_NEEDED: i64 = 1;
pub const DT_STRSZ: i64 = 10;
pub const DT_SONAME: i64 = 14;

pub const PF_X: u32 = 1;
pub const PF_W: u32 = 2;
pub const PF_R: u32 = 4;

pub const EM_X86_64: u16 = 0x3e;
pub const EM_386: u16 = 0x03;

struct Segment {
    p_type: u32,
    flags: u32,
    offset: u64,
    vaddr: u64,
    filesz: u64,
    memsz: u64,
    align: u64,
}

struct Section {
    name: String,
    sh_type: u32,
    addr: u64,
    offset: u64,
    size: u64,
    link: u32,
    entsize: u64,
}

/// Builds little-endian ELF images.
///
/// Layout: file header, payload blobs in the order added, `.shstrtab`,
/// program headers, section headers. Section index 0 is the null section and
/// `.shstrtab` is always the last section.
pub struct ElfBuilder {
    is_64: bool,
    machine: u16,
    entry: u64,
    payload: Vec<u8>,
    segments: Vec<Segment>,
    sections: Vec<Section>,
}

impl ElfBuilder {
    pub fn elf64() -> Self {
        Self::new(true, EM_X86_64)
    }

    pub fn elf32() -> Self {
        Self::new(false, EM_386)
    }

    fn new(is_64: bool, machine: u16) -> Self {
        Self {
            is_64,
            machine,
            entry: 0,
            payload: Vec::new(),
            segments: Vec::new(),
            sections: Vec::new(),
        }
    }

    pub fn machine(mut self, machine: u16) -> Self {
        self.machine = machine;
        self
    }

    pub fn entry(mut self, entry: u64) -> Self {
        self.entry = entry;
        self
    }

    fn header_size(&self) -> usize {
        if self.is_64 {
            64
        } else {
            52
        }
    }

    /// Append raw bytes to the file, returning their file offset.
    pub fn blob(&mut self, bytes: &[u8]) -> u64 {
        while self.payload.len() % 8 != 0 {
            self.payload.push(0);
        }
        let offset = (self.header_size() + self.payload.len()) as u64;
        self.payload.extend_from_slice(bytes);
        offset
    }

    pub fn segment(&mut self, p_type: u32, flags: u32, offset: u64, vaddr: u64, filesz: u64, memsz: u64) {
        self.segments.push(Segment {
            p_type,
            flags,
            offset,
            vaddr,
            filesz,
            memsz,
            align: 0x10,
        });
    }

    /// Add a section, returning its index in the final section table.
    pub fn section(&mut self, name: &str, sh_type: u32, offset: u64, size: u64, link: u32, entsize: u64) -> u32 {
        self.sections.push(Section {
            name: name.to_string(),
            sh_type,
            addr: 0,
            offset,
            size,
            link,
            entsize,
        });
        self.sections.len() as u32
    }

    /// Add a string table section holding `strings`, returning its index and the
    /// offset of each string.
    pub fn string_table(&mut self, name: &str, strings: &[&str]) -> (u32, Vec<u32>) {
        let mut bytes = vec![0u8];
        let mut offsets = Vec::new();
        for string in strings {
            offsets.push(bytes.len() as u32);
            bytes.extend_from_slice(string.as_bytes());
            bytes.push(0);
        }
        let offset = self.blob(&bytes);
        let index = self.section(name, SHT_STRTAB, offset, bytes.len() as u64, 0, 0);
        (index, offsets)
    }

    pub fn symbol_size(&self) -> u64 {
        if self.is_64 {
            24
        } else {
            16
        }
    }

    /// Encode symbols as `(name offset, value, section index)`.
    pub fn symbols(&self, symbols: &[(u32, u64, u16)]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for &(name, value, shndx) in symbols {
            bytes.extend_from_slice(&name.to_le_bytes());
            if self.is_64 {
                bytes.push(0x12); // STB_GLOBAL, STT_FUNC
                bytes.push(0);
                bytes.extend_from_slice(&shndx.to_le_bytes());
                bytes.extend_from_slice(&value.to_le_bytes());
                bytes.extend_from_slice(&0u64.to_le_bytes());
            } else {
                bytes.extend_from_slice(&(value as u32).to_le_bytes());
                bytes.extend_from_slice(&0u32.to_le_bytes());
                bytes.push(0x12);
                bytes.push(0);
                bytes.extend_from_slice(&shndx.to_le_bytes());
            }
        }
        bytes
    }

    /// Add a symbol table section linked to string table `strtab`.
    pub fn symbol_table(&mut self, name: &str, sh_type: u32, strtab: u32, symbols: &[(u32, u64, u16)]) -> u32 {
        let bytes = self.symbols(symbols);
        let offset = self.blob(&bytes);
        let entsize = self.symbol_size();
        self.section(name, sh_type, offset, bytes.len() as u64, strtab, entsize)
    }

    /// Encode `(d_tag, d_val)` pairs.
    pub fn dynamic_entries(&self, entries: &[(i64, u64)]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for &(tag, value) in entries {
            if self.is_64 {
                bytes.extend_from_slice(&tag.to_le_bytes());
                bytes.extend_from_slice(&value.to_le_bytes());
            } else {
                bytes.extend_from_slice(&(tag as i32).to_le_bytes());
                bytes.extend_from_slice(&(value as u32).to_le_bytes());
            }
        }
        bytes
    }

    fn word(&self, out: &mut Vec<u8>, value: u64) {
        if self.is_64 {
            out.extend_from_slice(&value.to_le_bytes());
        } else {
            out.extend_from_slice(&(value as u32).to_le_bytes());
        }
    }

    pub fn build(mut self) -> Vec<u8> {
        let mut shstrtab = vec![0u8];
        let mut name_offsets = Vec::new();
        for section in &self.sections {
            name_offsets.push(shstrtab.len() as u32);
            shstrtab.extend_from_slice(section.name.as_bytes());
            shstrtab.push(0);
        }
        let shstrtab_name = shstrtab.len() as u32;
        shstrtab.extend_from_slice(b".shstrtab\0");
        let shstrtab_offset = self.blob(&shstrtab);

        let mut out = vec![0u8; self.header_size()];
        out.extend_from_slice(&self.payload);
        while out.len() % 8 != 0 {
            out.push(0);
        }

        let phoff = out.len() as u64;
        for segment in &self.segments {
            let mut entry = Vec::new();
            entry.extend_from_slice(&segment.p_type.to_le_bytes());
            if self.is_64 {
                entry.extend_from_slice(&segment.flags.to_le_bytes());
            }
            self.word(&mut entry, segment.offset);
            self.word(&mut entry, segment.vaddr);
            self.word(&mut entry, segment.vaddr);
            self.word(&mut entry, segment.filesz);
            self.word(&mut entry, segment.memsz);
            if !self.is_64 {
                entry.extend_from_slice(&segment.flags.to_le_bytes());
            }
            self.word(&mut entry, segment.align);
            out.extend_from_slice(&entry);
        }

        let shoff = out.len() as u64;
        let shnum = self.sections.len() as u16 + 2;
        let shstrndx = shnum - 1;
        let null = Section {
            name: String::new(),
            sh_type: 0,
            addr: 0,
            offset: 0,
            size: 0,
            link: 0,
            entsize: 0,
        };
        let shstr = Section {
            name: ".shstrtab".to_string(),
            sh_type: SHT_STRTAB,
            addr: 0,
            offset: shstrtab_offset,
            size: shstrtab.len() as u64,
            link: 0,
            entsize: 0,
        };
        let mut table: Vec<(u32, &Section)> = vec![(0, &null)];
        for (section, &name) in self.sections.iter().zip(&name_offsets) {
            table.push((name, section));
        }
        table.push((shstrtab_name, &shstr));
        for (name, section) in table {
            let mut entry = Vec::new();
            entry.extend_from_slice(&name.to_le_bytes());
            entry.extend_from_slice(&section.sh_type.to_le_bytes());
            self.word(&mut entry, 0);
            self.word(&mut entry, section.addr);
            self.word(&mut entry, section.offset);
            self.word(&mut entry, section.size);
            entry.extend_from_slice(&section.link.to_le_bytes());
            entry.extend_from_slice(&0u32.to_le_bytes());
            self.word(&mut entry, 1);
            self.word(&mut entry, section.entsize);
            out.extend_from_slice(&entry);
        }

        let (phentsize, shentsize): (u16, u16) = if self.is_64 { (56, 64) } else { (32, 40) };
        let mut header = Vec::new();
        header.extend_from_slice(&[0x7f, b'E', b'L', b'F']);
        header.push(if self.is_64 { 2 } else { 1 });
        header.push(1); // little-endian
        header.push(1); // EI_VERSION
        header.extend_from_slice(&[0; 9]);
        header.extend_from_slice(&2u16.to_le_bytes()); // ET_EXEC
        header.extend_from_slice(&self.machine.to_le_bytes());
        header.extend_from_slice(&1u32.to_le_bytes());
        self.word(&mut header, self.entry);
        self.word(&mut header, phoff);
        self.word(&mut header, shoff);
        header.extend_from_slice(&0u32.to_le_bytes());
        header.extend_from_slice(&(self.header_size() as u16).to_le_bytes());
        header.extend_from_slice(&phentsize.to_le_bytes());
        header.extend_from_slice(&(self.segments.len() as u16).to_le_bytes());
        header.extend_from_slice(&shentsize.to_le_bytes());
        header.extend_from_slice(&shnum.to_le_bytes());
        header.extend_from_slice(&shstrndx.to_le_bytes());
        assert_eq!(header.len(), self.header_size());

        out[..header.len()].copy_from_slice(&header);
        out
    }
}

/// Offsets of interesting header fields in an ELF64 file.
pub mod elf64 {
    pub const EI_CLASS: usize = 4;
    pub const EI_DATA: usize = 5;
    pub const EI_VERSION: usize = 6;
    pub const E_MACHINE: usize = 18;
    pub const E_VERSION: usize = 20;
    pub const E_EHSIZE: usize = 52;
    pub const E_SHSTRNDX: usize = 62;
}
