//! Target profiles: which ELF images a loader is willing to accept.

use crate::header::{ElfClass, ElfData};

/// ELF machine identifier (`e_machine`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Machine(pub u16);

impl Machine {
    /// Intel 80386
    pub const X86: Machine = Machine(0x03);
    /// ARM (32-bit)
    pub const ARM: Machine = Machine(0x28);
    /// x86-64
    pub const X86_64: Machine = Machine(0x3e);
    /// AArch64
    pub const AARCH64: Machine = Machine(0xb7);
    /// RISC-V
    pub const RISCV: Machine = Machine(0xf3);

    /// Machine type of the architecture this crate was compiled for, if known.
    pub const fn host() -> Option<Machine> {
        if cfg!(target_arch = "x86") {
            Some(Machine::X86)
        } else if cfg!(target_arch = "x86_64") {
            Some(Machine::X86_64)
        } else if cfg!(target_arch = "arm") {
            Some(Machine::ARM)
        } else if cfg!(target_arch = "aarch64") {
            Some(Machine::AARCH64)
        } else if cfg!(any(target_arch = "riscv32", target_arch = "riscv64")) {
            Some(Machine::RISCV)
        } else {
            None
        }
    }
}

/// The word size, byte order and machine an image must have to be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetProfile {
    /// Required ELF class
    pub class: ElfClass,
    /// Required byte order
    pub encoding: ElfData,
    /// Required machine, `None` accepts any
    pub machine: Option<Machine>,
}

impl TargetProfile {
    /// Profile accepting any machine with the given class and byte order.
    pub const fn new(class: ElfClass, encoding: ElfData) -> Self {
        Self {
            class,
            encoding,
            machine: None,
        }
    }

    /// Restrict the profile to one machine type.
    pub const fn with_machine(mut self, machine: Machine) -> Self {
        self.machine = Some(machine);
        self
    }

    /// Accept any machine type.
    pub const fn any_machine(mut self) -> Self {
        self.machine = None;
        self
    }

    /// Profile matching the machine running this code.
    pub const fn host() -> Self {
        let class = if cfg!(target_pointer_width = "64") {
            ElfClass::Elf64
        } else {
            ElfClass::Elf32
        };

        Self {
            class,
            encoding: ElfData::host(),
            machine: Machine::host(),
        }
    }

    /// 32-bit little-endian x86.
    pub const fn x86() -> Self {
        Self::new(ElfClass::Elf32, ElfData::LittleEndian).with_machine(Machine::X86)
    }

    /// 64-bit little-endian x86-64.
    pub const fn x86_64() -> Self {
        Self::new(ElfClass::Elf64, ElfData::LittleEndian).with_machine(Machine::X86_64)
    }

    /// 64-bit little-endian AArch64.
    pub const fn aarch64() -> Self {
        Self::new(ElfClass::Elf64, ElfData::LittleEndian).with_machine(Machine::AARCH64)
    }

    /// 32-bit little-endian RISC-V.
    pub const fn riscv32() -> Self {
        Self::new(ElfClass::Elf32, ElfData::LittleEndian).with_machine(Machine::RISCV)
    }

    /// 64-bit little-endian RISC-V.
    pub const fn riscv64() -> Self {
        Self::new(ElfClass::Elf64, ElfData::LittleEndian).with_machine(Machine::RISCV)
    }
}

impl Default for TargetProfile {
    fn default() -> Self {
        Self::host()
    }
}
