//! Source attribution for elements and diagnostics.
//!
//! A [`Context`] tells where an element comes from: a file on disk, an
//! in-memory source text (optionally associated with a path), or another
//! context it was derived from. Contexts are shared through [`Arc`] and never
//! mutated once built, so a parent chain cannot loop.

use std::{
    borrow::Cow,
    fmt, fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

/// Display name used for sources that have no path.
pub const ANONYMOUS_SOURCE: &str = "<string>";

#[derive(Debug)]
enum Source {
    Path(PathBuf),
    Content {
        path: Option<PathBuf>,
        content: Arc<str>,
    },
    Parent(Arc<Context>),
}

/// Where a piece of the element tree comes from.
#[derive(Debug)]
pub struct Context {
    source: Source,
}

/// A resolved 0-based line/column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Context {
    /// A context backed by a file; its content is read lazily.
    pub fn from_path(path: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            source: Source::Path(path.into()),
        })
    }

    /// A context backed by an in-memory source text.
    pub fn from_content(content: impl Into<Arc<str>>, path: Option<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            source: Source::Content {
                path,
                content: content.into(),
            },
        })
    }

    /// A context derived from another one, used for synthesized elements.
    pub fn nested(parent: Arc<Context>) -> Arc<Self> {
        Arc::new(Self {
            source: Source::Parent(parent),
        })
    }

    /// The first context in the parent chain that carries a source.
    pub fn resolve(&self) -> &Context {
        let mut current = self;
        while let Source::Parent(parent) = &current.source {
            current = parent;
        }
        current
    }

    /// Path of the underlying source, if any.
    pub fn path(&self) -> Option<&Path> {
        match &self.resolve().source {
            Source::Path(path) => Some(path),
            Source::Content { path, .. } => path.as_deref(),
            Source::Parent(_) => None,
        }
    }

    /// Path used in rendered diagnostics.
    pub fn display_path(&self) -> String {
        self.path()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| ANONYMOUS_SOURCE.to_string())
    }

    /// The source text, reading it from disk when only a path is known.
    pub fn content(&self) -> Option<Cow<'_, str>> {
        match &self.resolve().source {
            Source::Content { content, .. } => Some(Cow::Borrowed(content.as_ref())),
            Source::Path(path) => fs::read_to_string(path).ok().map(Cow::Owned),
            Source::Parent(_) => None,
        }
    }

    /// Resolve a byte offset into a 0-based line and column.
    ///
    /// Offsets past the end of the content are clamped to the end.
    pub fn locate(&self, offset: usize) -> Option<Location> {
        let content = self.content()?;
        Some(locate_in(&content, offset))
    }
}

/// Resolve a byte offset into a 0-based line and character column.
pub fn locate_in(content: &str, offset: usize) -> Location {
    let mut offset = offset.min(content.len());
    while !content.is_char_boundary(offset) {
        offset -= 1;
    }
    let before = &content[..offset];
    let line = before.matches('\n').count();
    let line_start = before.rfind('\n').map_or(0, |index| index + 1);
    Location {
        line,
        column: before[line_start..].chars().count(),
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_path())
    }
}

/// The serialized form of a context: only the path, never the content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl ContextData {
    pub fn from_context(context: &Context) -> Self {
        Self {
            path: context.path().map(Path::to_path_buf),
        }
    }

    /// Rebuild a context; a missing path yields an anonymous empty source.
    pub fn into_context(self) -> Arc<Context> {
        match self.path {
            Some(path) => Context::from_path(path),
            None => Context::from_content("", None),
        }
    }
}
