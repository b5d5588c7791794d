use std::fmt;
use std::process::Command;

/// Instruction sets the compiler can emit for. The assembler and linker
/// program names follow the Debian cross-toolchain convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    X86_64,
    Aarch64,
    Arm32,
}

impl Target {
    /// Accepts the canonical names plus the usual aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "x86_64" | "x86-64" | "amd64" => Self::X86_64,
            "arm64" | "aarch64" => Self::Aarch64,
            "arm" | "arm32" | "armv7" | "armv7l" => Self::Arm32,
            _ => return None,
        })
    }

    /// Ask the running machine via `uname -m`; unknown or unreachable
    /// answers fall back to x86-64.
    pub fn detect() -> Self {
        Command::new("uname")
            .arg("-m")
            .output()
            .ok()
            .and_then(|output| String::from_utf8(output.stdout).ok())
            .and_then(|machine| Self::from_name(machine.trim()))
            .unwrap_or(Self::X86_64)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Aarch64 => "arm64",
            Self::Arm32 => "arm32",
        }
    }

    pub const fn assembler(self) -> &'static str {
        match self {
            Self::X86_64 => "as",
            Self::Aarch64 => "aarch64-linux-gnu-as",
            Self::Arm32 => "arm-linux-gnueabihf-as",
        }
    }

    pub const fn assembler_args(self) -> &'static [&'static str] {
        match self {
            Self::X86_64 => &["--64"],
            Self::Aarch64 | Self::Arm32 => &[],
        }
    }

    pub const fn linker(self) -> &'static str {
        match self {
            Self::X86_64 => "ld",
            Self::Aarch64 => "aarch64-linux-gnu-ld",
            Self::Arm32 => "arm-linux-gnueabihf-ld",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve() {
        assert_eq!(Target::from_name("x86_64"), Some(Target::X86_64));
        assert_eq!(Target::from_name("x86-64"), Some(Target::X86_64));
        assert_eq!(Target::from_name("amd64"), Some(Target::X86_64));
        assert_eq!(Target::from_name("aarch64"), Some(Target::Aarch64));
        assert_eq!(Target::from_name("arm64"), Some(Target::Aarch64));
        assert_eq!(Target::from_name("armv7"), Some(Target::Arm32));
        assert_eq!(Target::from_name("armv7l"), Some(Target::Arm32));
        assert_eq!(Target::from_name("riscv64"), None);
    }

    #[test]
    fn toolchain_names() {
        assert_eq!(Target::X86_64.assembler(), "as");
        assert_eq!(Target::X86_64.assembler_args(), &["--64"]);
        assert_eq!(Target::Aarch64.linker(), "aarch64-linux-gnu-ld");
        assert_eq!(Target::Arm32.assembler(), "arm-linux-gnueabihf-as");
    }
}
