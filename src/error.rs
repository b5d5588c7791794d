use std::error;
use std::fmt;

/// A phase error: a kind, the position it was raised at, and a breadcrumb
/// trail of contexts ("parsing statement", "parsing expression", ...).
#[derive(Debug, Clone)]
pub struct Error<K> {
    pub kind: K,
    file: Option<std::path::PathBuf>,
    position: Option<Position>,
    contexts: Vec<&'static str>,
}

/// 1-based line/column pair. A line feed bumps `line` and resets `col` to 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl Position {
    pub const fn start() -> Self {
        Self { line: 1, col: 1 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// The compiled file's name and text, threaded through every phase so errors
/// can name their origin.
#[derive(Debug)]
pub struct SourceMetadata<'a> {
    file: Option<std::path::PathBuf>,
    source: &'a str,
}

impl<'a> SourceMetadata<'a> {
    pub const fn new(source: &'a str) -> Self {
        Self { file: None, source }
    }
    pub const fn input(&self) -> &'a str {
        self.source
    }
    #[must_use]
    pub fn with_file(mut self, file: std::path::PathBuf) -> Self {
        self.file = Some(file);
        self
    }
    pub fn file(&self) -> Option<&std::path::Path> {
        self.file.as_deref()
    }
}

impl<K> Error<K> {
    pub const fn new(kind: K) -> Self {
        Self {
            kind,
            file: None,
            position: None,
            contexts: Vec::new(),
        }
    }
    pub fn map_kind<F, U>(self, mapper: F) -> Error<U>
    where
        F: FnOnce(K) -> U,
    {
        Error {
            kind: mapper(self.kind),
            file: self.file,
            position: self.position,
            contexts: self.contexts,
        }
    }
    #[must_use]
    pub fn with_position(mut self, position: Position, source: &SourceMetadata) -> Self {
        self.position = Some(position);
        self.file = source.file().map(|p| p.to_path_buf());
        self
    }
    /// Applied only when no position was recorded yet, so the innermost
    /// failure keeps its own location.
    #[must_use]
    pub fn with_backup_position(self, position: Position, source: &SourceMetadata) -> Self {
        if self.position.is_some() {
            self
        } else {
            self.with_position(position, source)
        }
    }
    #[must_use]
    pub fn add_context(mut self, ctx: &'static str) -> Self {
        self.contexts.push(ctx);
        self
    }
}

/// What a failing phase wanted to see: either a specific token/character or a
/// free-form description.
#[derive(Debug, Clone)]
pub enum WantedSpec<T> {
    Specific(T),
    Description(&'static str),
}

impl<T: fmt::Display> fmt::Display for WantedSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Description(desc) => f.write_str(desc),
            Self::Specific(t) => write!(f, "{}", t),
        }
    }
}

impl<K: error::Error + 'static> error::Error for Error<K> {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        Some(&self.kind)
    }
}

// Single-line rendering: `<kind> at <file>:<line>:<col> (while <ctx>, ...)`.
impl<K: fmt::Display> fmt::Display for Error<K> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(position) = self.position {
            write!(f, " at ")?;
            if let Some(file) = self.file.as_ref().and_then(|x| x.to_str()) {
                write!(f, "{}:", file)?;
            }
            write!(f, "{}", position)?;
        }
        if !self.contexts.is_empty() {
            write!(f, " (while ")?;
            for (i, ctx) in self.contexts.iter().enumerate() {
                if i != 0 {
                    write!(f, ", ")?;
                }
                f.write_str(ctx)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}
